//! Data sources that provide SIP snapshots to the collector.

pub mod cli;
pub mod parse;

use std::time::Duration;

use asterisk_common::sip::{PeersInfo, RegistriesInfo, SipChannelsInfo, SipSnapshot, UsersInfo};
use thiserror::Error;

pub use cli::AsteriskCli;

/// Errors returned by a [`SipDataSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("'{command}' timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("Failed to parse output of '{command}': {message}")]
    Parse { command: String, message: String },
}

impl SourceError {
    pub fn parse(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Provider of SIP data for one scrape.
///
/// Every query is synchronous and blocking; implementations own their
/// timeout policy.
pub trait SipDataSource: Send + Sync {
    /// `sip show peers`.
    fn peers(&self) -> Result<PeersInfo, SourceError>;

    /// `sip show channels`, `sip show subscriptions`, `sip show channelstats`.
    fn channels(&self) -> Result<SipChannelsInfo, SourceError>;

    /// `sip show users`.
    fn users(&self) -> Result<UsersInfo, SourceError>;

    /// `sip show registry`.
    fn registrations(&self) -> Result<RegistriesInfo, SourceError>;

    /// Run every query. The first failing query fails the whole snapshot.
    fn snapshot(&self) -> Result<SipSnapshot, SourceError> {
        Ok(SipSnapshot {
            peers: self.peers()?,
            channels: self.channels()?,
            users: self.users()?,
            registrations: self.registrations()?,
        })
    }
}
