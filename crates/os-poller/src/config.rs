use os_core::validation::MIN_REVIEW_POLL_INTERVAL_SECS;
use std::time::Duration;

pub const DEFAULT_PR_POLL_SECS: u64 = 60;
pub const DEFAULT_REVIEW_POLL_SECS: u64 = 300;

/// Tick periods for the two poller loops.
///
/// `review_interval` is the longest the review loop may sleep. The loop never
/// sleeps past the shortest interval a review watch may have, since each watch
/// keeps its own schedule and only due watches are polled on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub pr_interval: Duration,
    pub review_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            pr_interval: Duration::from_secs(DEFAULT_PR_POLL_SECS),
            review_interval: Duration::from_secs(DEFAULT_REVIEW_POLL_SECS),
        }
    }
}

impl PollerConfig {
    pub fn review_tick(&self) -> Duration {
        self.review_interval
            .min(Duration::from_secs(u64::from(MIN_REVIEW_POLL_INTERVAL_SECS)))
    }

    /// Reads `OVERSEER_PR_POLL_SECS` and `OVERSEER_REVIEW_POLL_SECS`.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("OVERSEER_PR_POLL_SECS").ok().as_deref(),
            std::env::var("OVERSEER_REVIEW_POLL_SECS").ok().as_deref(),
        )
    }

    fn from_values(pr: Option<&str>, review: Option<&str>) -> Self {
        Self {
            pr_interval: Duration::from_secs(parse_secs(pr, DEFAULT_PR_POLL_SECS)),
            review_interval: Duration::from_secs(parse_secs(review, DEFAULT_REVIEW_POLL_SECS)),
        }
    }
}

fn parse_secs(raw: Option<&str>, default: u64) -> u64 {
    match raw.map(str::trim).map(str::parse::<u64>) {
        Some(Ok(secs)) if secs > 0 => secs,
        Some(_) => {
            tracing::warn!(value = raw.unwrap_or_default(), default, "invalid poll interval; using default");
            default
        }
        None => default,
    }
}
