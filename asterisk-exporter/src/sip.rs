//! Collector for the `sip show ...` family of commands.

use std::sync::Arc;

use asterisk_common::sip::SipSnapshot;
use tracing::{debug, error};

use crate::collector::{CollectError, Collector};
use crate::metric::{CollectorHealth, Descriptor, MetricSample, MetricSink};
use crate::source::SipDataSource;

const SUBSYSTEM: &str = "sip";

/// Exposes SIP peers, dialogs, channels, users and registrations.
pub struct SipCollector {
    source: Arc<dyn SipDataSource>,
    health: CollectorHealth,

    // sip show peers
    total_peers: Arc<Descriptor>,
    monitored_online: Arc<Descriptor>,
    monitored_offline: Arc<Descriptor>,
    unmonitored_online: Arc<Descriptor>,
    unmonitored_offline: Arc<Descriptor>,
    status_unknown: Arc<Descriptor>,
    status_qualified: Arc<Descriptor>,
    peer_status: Arc<Descriptor>,

    // sip show channels / subscriptions / channelstats
    active_dialogs: Arc<Descriptor>,
    active_subscriptions: Arc<Descriptor>,
    active_channels: Arc<Descriptor>,

    // sip show users
    users: Arc<Descriptor>,

    // sip show registry
    total_registrations: Arc<Descriptor>,
    registered: Arc<Descriptor>,
    unregistered: Arc<Descriptor>,
    registration_status: Arc<Descriptor>,
}

impl SipCollector {
    pub const NAME: &'static str = "sip";

    /// Build the collector and all of its descriptors, named
    /// `{prefix}_sip_{metric}`.
    pub fn new(prefix: &str, source: Arc<dyn SipDataSource>, health: CollectorHealth) -> Self {
        let scalar = |name: &str, help: &str| Descriptor::new(prefix, SUBSYSTEM, name, help, &[]);

        Self {
            source,
            health,
            total_peers: scalar("current_peers", "Number of SIP peers"),
            monitored_online: scalar(
                "current_monitored_online",
                "Number of currently monitored online SIP",
            ),
            monitored_offline: scalar(
                "current_monitored_offline",
                "Number of currently monitored offline SIP",
            ),
            unmonitored_online: scalar(
                "current_unmonitored_online",
                "Number of currently unmonitored online SIP",
            ),
            unmonitored_offline: scalar(
                "current_unmonitored_offline",
                "Number of currently unmonitored offline SIP",
            ),
            status_unknown: scalar("current_unknown", "Current number of unknown SIP"),
            status_qualified: scalar("current_qualified", "Current number of qualified SIP"),
            peer_status: Descriptor::new(
                prefix,
                SUBSYSTEM,
                "peer_status",
                "Status of individual SIP peers",
                &["peer_name", "peer_status"],
            ),
            active_dialogs: scalar("active_dialogs", "Number of active SIP dialogs"),
            active_subscriptions: scalar(
                "active_subscriptions",
                "Number of active SIP subscriptions",
            ),
            active_channels: scalar("active_channels", "Number of active SIP channels"),
            users: scalar("users", "Number of users"),
            total_registrations: scalar(
                "total_registrations",
                "Total number of SIP registrations",
            ),
            registered: scalar(
                "registered_count",
                "Number of successfully registered SIP accounts",
            ),
            unregistered: scalar("unregistered_count", "Number of unregistered SIP accounts"),
            registration_status: Descriptor::new(
                prefix,
                SUBSYSTEM,
                "registration_status",
                "Status of individual SIP registrations",
                &["username", "state"],
            ),
        }
    }

    fn fetch(&self) -> Result<SipSnapshot, CollectError> {
        Ok(self.source.snapshot()?)
    }

    /// Emit every domain sample derived from `snapshot`.
    fn emit_snapshot(&self, snapshot: &SipSnapshot, sink: &mut dyn MetricSink) {
        let peers = &snapshot.peers;
        gauge(sink, &self.total_peers, peers.total);
        gauge(sink, &self.monitored_online, peers.monitored_online);
        gauge(sink, &self.monitored_offline, peers.monitored_offline);
        gauge(sink, &self.unmonitored_online, peers.unmonitored_online);
        gauge(sink, &self.unmonitored_offline, peers.unmonitored_offline);
        gauge(sink, &self.status_unknown, peers.status_unknown);
        gauge(sink, &self.status_qualified, peers.status_qualified);

        // Presence only: a listed peer is 1, an unlisted one has no sample.
        for peer in &peers.peers {
            presence(sink, &self.peer_status, [&peer.name, &peer.status]);
        }

        let channels = &snapshot.channels;
        gauge(sink, &self.active_dialogs, channels.active_dialogs);
        gauge(sink, &self.active_subscriptions, channels.active_subscriptions);
        gauge(sink, &self.active_channels, channels.active_channels);

        gauge(sink, &self.users, snapshot.users.users);

        let registrations = &snapshot.registrations;
        gauge(sink, &self.total_registrations, registrations.total);
        gauge(sink, &self.registered, registrations.registered);
        gauge(sink, &self.unregistered, registrations.unregistered);

        for registration in &registrations.registrations {
            presence(
                sink,
                &self.registration_status,
                [&registration.username, &registration.state],
            );
        }
    }
}

impl Collector for SipCollector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        [
            &self.total_peers,
            &self.monitored_online,
            &self.monitored_offline,
            &self.unmonitored_online,
            &self.unmonitored_offline,
            &self.status_unknown,
            &self.status_qualified,
            &self.peer_status,
            &self.active_dialogs,
            &self.active_subscriptions,
            &self.active_channels,
            &self.users,
            &self.total_registrations,
            &self.registered,
            &self.unregistered,
            &self.registration_status,
        ]
        .into_iter()
        .cloned()
        .collect()
    }

    fn collect(&self, sink: &mut dyn MetricSink) {
        debug!(collector = Self::NAME, "Collecting SIP metrics");

        let snapshot = match self.fetch() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                sink.emit(self.health.failure(Self::NAME));
                error!(collector = Self::NAME, error = %e, "SIP collection failed");
                return;
            }
        };

        debug!(
            collector = Self::NAME,
            peers = snapshot.peers.peers.len(),
            registrations = snapshot.registrations.registrations.len(),
            "SIP metrics collected"
        );

        sink.emit(self.health.success(Self::NAME));

        self.emit_snapshot(&snapshot, sink);

        debug!(collector = Self::NAME, "SIP metrics built");
    }
}

// Descriptors are built in `SipCollector::new`, so label arity always matches.
fn gauge(sink: &mut dyn MetricSink, desc: &Arc<Descriptor>, value: u64) {
    sink.emit(MetricSample::from_parts(
        Arc::clone(desc),
        value as f64,
        Vec::new(),
    ));
}

fn presence(sink: &mut dyn MetricSink, desc: &Arc<Descriptor>, labels: [&String; 2]) {
    let labels = labels.into_iter().cloned().collect();
    sink.emit(MetricSample::from_parts(Arc::clone(desc), 1.0, labels));
}
