use crate::error::{LiveError, LiveErrorKind};

use serde::{Deserialize, Serialize};
use std::time::Duration;


pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_millis(60000);
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_millis(30000);


/// Everything a live view needs, supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    pub query: String,
    pub refresh_period: Duration,
    pub page_size: usize,
    /// `None` waits on a job forever.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            refresh_period: DEFAULT_REFRESH_PERIOD,
            page_size: DEFAULT_PAGE_SIZE,
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff_initial: DEFAULT_BACKOFF_INITIAL,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl LiveConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), LiveError> {
        let invalid = |reason: &str| -> Result<(), LiveError> {
            Err(LiveError::new(LiveErrorKind::InvalidConfig(reason.to_string())))
        };

        if self.page_size == 0 {
            return invalid("page size must be positive");
        }
        if self.refresh_period.is_zero() {
            return invalid("refresh period must be positive");
        }
        if self.poll_interval.is_zero() {
            return invalid("poll interval must be positive");
        }
        if self.backoff_initial > self.backoff_max {
            return invalid("initial backoff delay exceeds the maximum delay");
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LiveConfig::new("select * from t");

        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_period, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases: Vec<(LiveConfig, &str)> = vec![
            (LiveConfig { page_size: 0, ..Default::default() }, "page size"),
            (LiveConfig { refresh_period: Duration::ZERO, ..Default::default() }, "refresh period"),
            (LiveConfig { poll_interval: Duration::ZERO, ..Default::default() }, "poll interval"),
            (
                LiveConfig { backoff_initial: Duration::from_secs(60), ..Default::default() },
                "initial backoff",
            ),
        ];

        for (config, expect) in cases {
            let text = config.validate().unwrap_err().to_string();
            assert!(text.contains(expect), "Expected `{}` in `{}`", expect, text);
        }
    }
}
