//! SIP domain data as reported by the Asterisk `sip show ...` commands.
//!
//! Every type here is scrape-scoped: a fresh [`SipSnapshot`] is produced for
//! each scrape and dropped once its metrics have been emitted.

/// A SIP peer row from `sip show peers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Peer name (the part before `/` in the `Name/username` column).
    pub name: String,

    /// First word of the status column (e.g. "OK", "UNKNOWN", "UNREACHABLE").
    pub status: String,
}

impl Peer {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }
}

/// Output of `sip show peers`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeersInfo {
    /// Total number of SIP peers.
    pub total: u64,
    pub monitored_online: u64,
    pub monitored_offline: u64,
    pub unmonitored_online: u64,
    pub unmonitored_offline: u64,
    /// Peers whose status is `UNKNOWN`.
    pub status_unknown: u64,
    /// Peers whose status is `OK` (qualify succeeded).
    pub status_qualified: u64,
    /// Individual peers, in the order Asterisk listed them.
    pub peers: Vec<Peer>,
}

/// Output of `sip show channels`, `sip show subscriptions` and
/// `sip show channelstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SipChannelsInfo {
    pub active_dialogs: u64,
    pub active_subscriptions: u64,
    pub active_channels: u64,
}

/// Output of `sip show users`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsersInfo {
    pub users: u64,
}

/// An outbound registration row from `sip show registry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,

    /// Registration state (e.g. "Registered", "Request Sent", "Rejected").
    pub state: String,
}

impl Registration {
    pub fn new(username: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            state: state.into(),
        }
    }

    /// Whether the registration is currently established.
    pub fn is_registered(&self) -> bool {
        self.state == "Registered"
    }
}

/// Output of `sip show registry`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistriesInfo {
    pub total: u64,
    pub registered: u64,
    pub unregistered: u64,
    pub registrations: Vec<Registration>,
}

impl RegistriesInfo {
    /// Build the registry info from individual rows, deriving the counts.
    pub fn from_registrations(registrations: Vec<Registration>) -> Self {
        let registered = registrations.iter().filter(|r| r.is_registered()).count() as u64;
        let total = registrations.len() as u64;

        Self {
            total,
            registered,
            unregistered: total - registered,
            registrations,
        }
    }
}

/// Everything the SIP collector needs for one scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SipSnapshot {
    pub peers: PeersInfo,
    pub channels: SipChannelsInfo,
    pub users: UsersInfo,
    pub registrations: RegistriesInfo,
}
