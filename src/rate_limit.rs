use std::time::Duration;

use crate::config::LlmConfig;

// Total provider calls per chat request, first attempt included
pub const MAX_ATTEMPTS: u32 = 3;

// Backoff between attempts when the provider rate-limits us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub default_delay: Duration, // used when the provider suggests nothing
    pub max_delay: Duration,     // suggestions are clamped to this
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            default_delay: config.default_retry_delay,
            max_delay: config.max_retry_delay,
        }
    }

    pub fn delay_for(&self, suggested: Option<Duration>) -> Duration {
        suggested.unwrap_or(self.default_delay).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            default_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_is_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(Some(Duration::from_secs(90))), Duration::from_secs(30));
        assert_eq!(policy.delay_for(Some(Duration::from_secs(4))), Duration::from_secs(4));
    }

    #[test]
    fn missing_suggestion_uses_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(None), Duration::from_secs(1));
    }

    #[test]
    fn default_is_clamped_too() {
        let policy = RetryPolicy {
            default_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_for(None), Duration::from_secs(2));
    }
}
