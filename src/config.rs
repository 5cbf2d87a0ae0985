//! Standby executor configuration.

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Default age after which a pending task triggers a history fetch.
pub const DEFAULT_RESEND_DELAY: Duration = Duration::from_secs(15 * 60);

/// Default age after which a pending task is discarded.
pub const DEFAULT_DISCARD_DELAY: Duration = Duration::from_secs(25 * 60);

/// Byte encoding requested for the activity-timer refresh write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventEncoding {
    #[default]
    Json,
    Proto3,
}

impl EventEncoding {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(EventEncoding::Json),
            "proto3" => Ok(EventEncoding::Proto3),
            other => bail!("unknown event encoding {other:?} (expected json or proto3)"),
        }
    }
}

/// Configuration for the standby timer executor, loaded from environment
/// variables.
#[derive(Debug, Clone)]
pub struct StandbyConfig {
    /// Pending tasks younger than this only wait for replication.
    pub resend_delay: Duration,

    /// Pending tasks older than this are discarded.
    pub discard_delay: Duration,

    /// Encoding for the single persistence write path.
    pub event_encoding: EventEncoding,
}

impl Default for StandbyConfig {
    fn default() -> Self {
        Self {
            resend_delay: DEFAULT_RESEND_DELAY,
            discard_delay: DEFAULT_DISCARD_DELAY,
            event_encoding: EventEncoding::default(),
        }
    }
}

impl StandbyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let resend_delay =
            read_millis("BELAY_STANDBY_RESEND_DELAY_MS")?.unwrap_or(DEFAULT_RESEND_DELAY);
        let discard_delay =
            read_millis("BELAY_STANDBY_DISCARD_DELAY_MS")?.unwrap_or(DEFAULT_DISCARD_DELAY);

        let event_encoding = match std::env::var("BELAY_EVENT_ENCODING") {
            Ok(value) => EventEncoding::parse(&value)?,
            Err(_) => EventEncoding::default(),
        };

        let config = Self {
            resend_delay,
            discard_delay,
            event_encoding,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject delay pairs the reconciliation gate cannot order.
    pub fn validate(&self) -> Result<()> {
        if self.resend_delay.is_zero() {
            bail!("resend delay must be positive");
        }
        if self.resend_delay >= self.discard_delay {
            bail!(
                "resend delay {:?} must be shorter than discard delay {:?}",
                self.resend_delay,
                self.discard_delay
            );
        }
        Ok(())
    }
}

fn read_millis(var: &str) -> Result<Option<Duration>> {
    match std::env::var(var) {
        Ok(value) => {
            let millis: u64 = value
                .parse()
                .with_context(|| format!("{var} must be an integer millisecond count"))?;
            Ok(Some(Duration::from_millis(millis)))
        }
        Err(_) => Ok(None),
    }
}
