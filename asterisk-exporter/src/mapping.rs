//! Prometheus naming rules for metric and label names.

/// Make a metric name match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
///
/// Only the configurable prefix can carry invalid characters; each one is
/// replaced by `_`.
pub fn sanitize_metric_name(name: &str) -> String {
    sanitize(name, |c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Make a label name match `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn sanitize_label_name(name: &str) -> String {
    sanitize(name, |c| c.is_ascii_alphanumeric() || c == '_')
}

fn sanitize(name: &str, valid: impl Fn(char) -> bool) -> String {
    let mut result: String = name
        .chars()
        .map(|c| if valid(c) { c } else { '_' })
        .collect();

    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }

    result
}

/// Build a fully-qualified metric name from its components.
///
/// Format: `{namespace}_{subsystem}_{name}`. Empty components are skipped, so
/// an empty prefix yields `{subsystem}_{name}`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    let joined = [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_");

    sanitize_metric_name(&joined)
}
