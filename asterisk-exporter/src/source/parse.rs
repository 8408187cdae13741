//! Parsers for the text output of the `sip show ...` CLI commands.
//!
//! chan_sip prints fixed-width tables. Column positions are taken from the
//! header line so that values containing spaces ("OK (12 ms)",
//! "Request Sent") are read as a whole.

use asterisk_common::sip::{Peer, PeersInfo, RegistriesInfo, Registration, UsersInfo};

use super::SourceError;

pub const SHOW_PEERS: &str = "sip show peers";
pub const SHOW_CHANNELS: &str = "sip show channels";
pub const SHOW_SUBSCRIPTIONS: &str = "sip show subscriptions";
pub const SHOW_CHANNELSTATS: &str = "sip show channelstats";
pub const SHOW_USERS: &str = "sip show users";
pub const SHOW_REGISTRY: &str = "sip show registry";

/// Parse `sip show peers`.
///
/// The summary line
/// `N sip peers [Monitored: a online, b offline Unmonitored: c online, d offline]`
/// provides the totals; the rows provide the individual peers.
pub fn parse_peers(output: &str) -> Result<PeersInfo, SourceError> {
    let mut lines = output.lines();
    let header = lines
        .by_ref()
        .find(|l| l.trim_start().starts_with("Name/username"))
        .ok_or_else(|| SourceError::parse(SHOW_PEERS, "missing table header"))?;
    let status_col = header
        .find("Status")
        .ok_or_else(|| SourceError::parse(SHOW_PEERS, "missing Status column"))?;

    let mut info = PeersInfo::default();
    let mut summary = None;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if is_summary(line, "sip peer") {
            summary = Some(line);
            break;
        }

        let name = line
            .split_whitespace()
            .next()
            .and_then(|n| n.split('/').next())
            .unwrap_or_default();
        let status = line
            .get(status_col..)
            .and_then(|s| s.split_whitespace().next())
            .ok_or_else(|| {
                SourceError::parse(SHOW_PEERS, format!("missing status for peer '{}'", name))
            })?;

        match status {
            "OK" => info.status_qualified += 1,
            "UNKNOWN" => info.status_unknown += 1,
            _ => {}
        }
        info.peers.push(Peer::new(name, status));
    }

    let summary = summary.ok_or_else(|| SourceError::parse(SHOW_PEERS, "missing summary line"))?;
    let numbers = numbers_in(summary);
    let [total, mon_on, mon_off, unmon_on, unmon_off] = numbers[..] else {
        return Err(SourceError::parse(
            SHOW_PEERS,
            format!("unexpected summary line '{}'", summary.trim()),
        ));
    };

    info.total = total;
    info.monitored_online = mon_on;
    info.monitored_offline = mon_off;
    info.unmonitored_online = unmon_on;
    info.unmonitored_offline = unmon_off;

    Ok(info)
}

/// Parse the `N active SIP <noun>s` line printed by `sip show channels`,
/// `sip show subscriptions` and `sip show channelstats`.
///
/// `noun` is singular ("dialog"); chan_sip drops the plural for a count of 1.
pub fn parse_active_count(command: &str, output: &str, noun: &str) -> Result<u64, SourceError> {
    output
        .lines()
        .rev()
        .find_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens[..] {
                [count, "active", "SIP", what, ..] if what.starts_with(noun) => {
                    count.parse::<u64>().ok()
                }
                _ => None,
            }
        })
        .ok_or_else(|| SourceError::parse(command, format!("missing active SIP {} count", noun)))
}

/// Parse `sip show users`: one row per user under the `Username` header.
pub fn parse_users(output: &str) -> Result<UsersInfo, SourceError> {
    let mut lines = output.lines();
    lines
        .by_ref()
        .find(|l| l.trim_start().starts_with("Username"))
        .ok_or_else(|| SourceError::parse(SHOW_USERS, "missing table header"))?;

    let users = lines.filter(|l| !l.trim().is_empty()).count() as u64;

    Ok(UsersInfo { users })
}

/// Parse `sip show registry`.
pub fn parse_registry(output: &str) -> Result<RegistriesInfo, SourceError> {
    let mut lines = output.lines();
    let header = lines
        .by_ref()
        .find(|l| l.trim_start().starts_with("Host") && l.contains("Username"))
        .ok_or_else(|| SourceError::parse(SHOW_REGISTRY, "missing table header"))?;

    let column = |name: &str| {
        header.find(name).ok_or_else(|| {
            SourceError::parse(SHOW_REGISTRY, format!("missing {} column", name))
        })
    };
    let username_col = column("Username")?;
    let state_col = column("State")?;
    let regtime_col = header.find("Reg.Time");

    let mut registrations = Vec::new();
    let mut summary = None;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if is_summary(line, "SIP registration") {
            summary = Some(line);
            break;
        }

        let username = line
            .get(username_col..)
            .and_then(|s| s.split_whitespace().next())
            .unwrap_or_default();
        let state = match regtime_col {
            Some(end) => line.get(state_col..end.min(line.len())),
            None => line.get(state_col..),
        }
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            SourceError::parse(
                SHOW_REGISTRY,
                format!("missing state for registration '{}'", username),
            )
        })?;

        registrations.push(Registration::new(username, state));
    }

    let summary =
        summary.ok_or_else(|| SourceError::parse(SHOW_REGISTRY, "missing summary line"))?;
    let info = RegistriesInfo::from_registrations(registrations);
    if numbers_in(summary).first() != Some(&info.total) {
        return Err(SourceError::parse(
            SHOW_REGISTRY,
            format!(
                "summary '{}' does not match {} listed registrations",
                summary.trim(),
                info.total
            ),
        ));
    }

    Ok(info)
}

/// Whether `line` is a `<count> <what>...` summary line.
fn is_summary(line: &str, what: &str) -> bool {
    let line = line.trim();
    match line.split_once(' ') {
        Some((count, rest)) => count.parse::<u64>().is_ok() && rest.starts_with(what),
        None => false,
    }
}

/// Every unsigned integer appearing as a word in `line`.
fn numbers_in(line: &str) -> Vec<u64> {
    line.split_whitespace()
        .filter_map(|word| {
            word.trim_matches(|c: char| !c.is_ascii_digit())
                .parse::<u64>()
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEERS_FORMAT_WIDTHS: [usize; 9] = [25, 39, 3, 10, 10, 3, 8, 11, 32];

    fn columns(widths: &[usize], values: &[&str]) -> String {
        widths
            .iter()
            .zip(values)
            .map(|(w, v)| format!("{:<w$}", v, w = *w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn peer_line(name: &str, host: &str, port: &str, status: &str) -> String {
        columns(
            &PEERS_FORMAT_WIDTHS,
            &[name, host, "D", "Auto (No)", "No", "", port, status, ""],
        )
    }

    fn peers_output(rows: &[String], summary: &str) -> String {
        let header = columns(
            &PEERS_FORMAT_WIDTHS,
            &[
                "Name/username",
                "Host",
                "Dyn",
                "Forcerport",
                "Comedia",
                "ACL",
                "Port",
                "Status",
                "Description",
            ],
        );

        let mut out = vec![header];
        out.extend(rows.iter().cloned());
        out.push(summary.to_string());
        out.join("\n")
    }

    fn registry_line(host: &str, username: &str, refresh: &str, state: &str, regtime: &str) -> String {
        format!(
            "{:<39} {:<6} {:<12}  {:>8} {:<20} {:<25}",
            host, "N", username, refresh, state, regtime
        )
    }

    fn registry_output(rows: &[String], summary: &str) -> String {
        let header = format!(
            "{:<39} {:<6} {:<12}  {:>8} {:<20} {:<25}",
            "Host", "dnsmgr", "Username", "Refresh", "State", "Reg.Time"
        );

        let mut out = vec![header];
        out.extend(rows.iter().cloned());
        out.push(summary.to_string());
        out.join("\n")
    }

    #[test]
    fn test_parse_peers() {
        let output = peers_output(
            &[
                peer_line("alice/alice", "192.168.1.20", "5060", "OK (12 ms)"),
                peer_line("bob", "(Unspecified)", "0", "UNKNOWN"),
                peer_line("carol/carol", "192.168.1.21", "5060", "OK (8 ms)"),
                peer_line("trunk", "203.0.113.5", "5060", "Unmonitored"),
            ],
            "4 sip peers [Monitored: 2 online, 1 offline Unmonitored: 1 online, 0 offline]",
        );

        let info = parse_peers(&output).unwrap();

        assert_eq!(info.total, 4);
        assert_eq!(info.monitored_online, 2);
        assert_eq!(info.monitored_offline, 1);
        assert_eq!(info.unmonitored_online, 1);
        assert_eq!(info.unmonitored_offline, 0);
        assert_eq!(info.status_qualified, 2);
        assert_eq!(info.status_unknown, 1);
        assert_eq!(
            info.peers,
            vec![
                Peer::new("alice", "OK"),
                Peer::new("bob", "UNKNOWN"),
                Peer::new("carol", "OK"),
                Peer::new("trunk", "Unmonitored"),
            ]
        );
    }

    #[test]
    fn test_parse_peers_empty() {
        let output = peers_output(
            &[],
            "0 sip peers [Monitored: 0 online, 0 offline Unmonitored: 0 online, 0 offline]",
        );

        let info = parse_peers(&output).unwrap();

        assert_eq!(info, PeersInfo::default());
    }

    #[test]
    fn test_parse_peers_module_not_loaded() {
        let output = "No such command 'sip show peers' (type 'core show help sip show' for other possible commands)";

        let err = parse_peers(output).unwrap_err();
        assert!(err.to_string().contains("missing table header"));
    }

    #[test]
    fn test_parse_peers_truncated() {
        let output = peers_output(&[peer_line("alice", "10.0.0.1", "5060", "OK (1 ms)")], "");

        let err = parse_peers(&output).unwrap_err();
        assert!(err.to_string().contains("missing summary line"));
    }

    #[test]
    fn test_parse_active_count() {
        let channels = "Peer             User/ANR         Call ID          Format           Hold     Last Message    Expiry     Peer\n\
                        192.168.1.20     alice            3c2a1b9f5e       (ulaw)           No       Rx: ACK                    alice\n\
                        192.168.1.21     carol            7d8e9f0a1b       (ulaw)           No       Rx: ACK                    carol\n\
                        2 active SIP dialogs";
        assert_eq!(parse_active_count(SHOW_CHANNELS, channels, "dialog").unwrap(), 2);

        let subscriptions = "Peer             User             Call ID          Extension        Last state     Type            Mailbox    Expiry\n\
                             1 active SIP subscription";
        assert_eq!(
            parse_active_count(SHOW_SUBSCRIPTIONS, subscriptions, "subscription").unwrap(),
            1
        );

        let channelstats = "Peer             Call ID      Duration Recv: Pack  Lost       (     %) Jitter Send: Pack  Lost       (     %) Jitter\n\
                            0 active SIP channels";
        assert_eq!(
            parse_active_count(SHOW_CHANNELSTATS, channelstats, "channel").unwrap(),
            0
        );
    }

    #[test]
    fn test_parse_active_count_missing() {
        let err = parse_active_count(SHOW_CHANNELS, "Unable to connect to remote asterisk", "dialog")
            .unwrap_err();

        assert!(matches!(err, SourceError::Parse { ref command, .. } if command == SHOW_CHANNELS));
    }

    #[test]
    fn test_parse_users() {
        let output = "Username                   Secret           Accountcode      Def.Context      ACL  Forcerport\n\
                      alice                      s3cret                            internal         No   No\n\
                      carol                      s3cret                            internal         No   No\n\
                      \n";

        assert_eq!(parse_users(output).unwrap().users, 2);
    }

    #[test]
    fn test_parse_users_header_only() {
        let output = "Username                   Secret           Accountcode      Def.Context      ACL  Forcerport\n";
        assert_eq!(parse_users(output).unwrap().users, 0);
    }

    #[test]
    fn test_parse_users_missing_header() {
        assert!(parse_users("").is_err());
    }

    #[test]
    fn test_parse_registry() {
        let output = registry_output(
            &[
                registry_line(
                    "sip.provider.example:5060",
                    "trunk1",
                    "105",
                    "Registered",
                    "Mon, 01 Jan 2024 10:00:00",
                ),
                registry_line("backup.example:5060", "trunk2", "120", "Request Sent", ""),
            ],
            "2 SIP registrations.",
        );

        let info = parse_registry(&output).unwrap();

        assert_eq!(info.total, 2);
        assert_eq!(info.registered, 1);
        assert_eq!(info.unregistered, 1);
        assert_eq!(
            info.registrations,
            vec![
                Registration::new("trunk1", "Registered"),
                Registration::new("trunk2", "Request Sent"),
            ]
        );
    }

    #[test]
    fn test_parse_registry_empty() {
        let output = registry_output(&[], "0 SIP registrations.");

        let info = parse_registry(&output).unwrap();

        assert_eq!(info, RegistriesInfo::default());
    }

    #[test]
    fn test_parse_registry_summary_mismatch() {
        let output = registry_output(
            &[registry_line(
                "sip.provider.example:5060",
                "trunk1",
                "105",
                "Registered",
                "",
            )],
            "3 SIP registrations.",
        );

        assert!(parse_registry(&output).is_err());
    }

    #[test]
    fn test_numbers_in() {
        assert_eq!(
            numbers_in("3 sip peers [Monitored: 1 online, 1 offline Unmonitored: 1 online, 0 offline]"),
            vec![3, 1, 1, 1, 0]
        );
        assert_eq!(numbers_in("1 SIP registration."), vec![1]);
    }
}
