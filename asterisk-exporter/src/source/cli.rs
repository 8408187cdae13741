//! [`SipDataSource`] backed by `asterisk -rx`.

use std::time::Duration;

use asterisk_common::sip::{PeersInfo, RegistriesInfo, SipChannelsInfo, UsersInfo};
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use super::parse::{
    SHOW_CHANNELS, SHOW_CHANNELSTATS, SHOW_PEERS, SHOW_REGISTRY, SHOW_SUBSCRIPTIONS, SHOW_USERS,
    parse_active_count, parse_peers, parse_registry, parse_users,
};
use super::{SipDataSource, SourceError};
use crate::config::AsteriskConfig;

/// Runs Asterisk CLI commands against the local PBX.
///
/// Commands run on the tokio runtime behind `runtime`; callers block until
/// the command exits or the timeout elapses. Must not be called from an
/// async context.
pub struct AsteriskCli {
    binary: String,
    timeout: Duration,
    runtime: Handle,
}

impl AsteriskCli {
    pub fn new(config: &AsteriskConfig, runtime: Handle) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout(),
            runtime,
        }
    }

    /// Run `{binary} -rx "{command}"` and return its stdout.
    pub fn run(&self, command: &str) -> Result<String, SourceError> {
        debug!(binary = %self.binary, command, "Running Asterisk CLI command");

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-rx").arg(command).kill_on_drop(true);

        let output = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, cmd.output()).await })
            .map_err(|_| SourceError::Timeout {
                command: command.to_string(),
                after: self.timeout,
            })?
            .map_err(|source| SourceError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(command, bytes = stdout.len(), "Asterisk CLI command finished");

        Ok(stdout)
    }
}

impl SipDataSource for AsteriskCli {
    fn peers(&self) -> Result<PeersInfo, SourceError> {
        parse_peers(&self.run(SHOW_PEERS)?)
    }

    fn channels(&self) -> Result<SipChannelsInfo, SourceError> {
        let active = |command: &str, noun: &str| {
            self.run(command)
                .and_then(|output| parse_active_count(command, &output, noun))
        };

        Ok(SipChannelsInfo {
            active_dialogs: active(SHOW_CHANNELS, "dialog")?,
            active_subscriptions: active(SHOW_SUBSCRIPTIONS, "subscription")?,
            active_channels: active(SHOW_CHANNELSTATS, "channel")?,
        })
    }

    fn users(&self) -> Result<UsersInfo, SourceError> {
        parse_users(&self.run(SHOW_USERS)?)
    }

    fn registrations(&self) -> Result<RegistriesInfo, SourceError> {
        parse_registry(&self.run(SHOW_REGISTRY)?)
    }
}
