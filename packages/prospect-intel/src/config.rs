//! Engine configuration.
//!
//! TTLs are workload-specific: live search probes go stale in minutes,
//! scraped site content is stable for days, synthesized intelligence sits
//! in between. Callers pick the TTL per gateway call; the cache itself
//! enforces no default.

use std::time::Duration;

/// TTL for live search probes (short: results churn quickly).
pub const PROBE_TTL: Duration = Duration::from_secs(10 * 60);

/// TTL for scraped site content (long: practice sites rarely change).
pub const SCRAPE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// TTL for synthesized intelligence and planner passes (medium).
pub const SYNTHESIS_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Configuration for the research engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout applied to each individual provider call.
    ///
    /// A single slow source degrades to empty rather than delaying the
    /// whole request. Default: 25s.
    pub call_timeout: Duration,

    /// Hard deadline for the stages after the initial probe.
    ///
    /// When it elapses the orchestrator stops waiting and returns the best
    /// partial record it has. Default: 90s.
    pub overall_deadline: Duration,

    /// Retry budget per gateway call (first attempt included).
    ///
    /// Default: 3.
    pub max_attempts: usize,

    /// Result count requested from the search provider for the probe.
    ///
    /// Default: 6.
    pub probe_results: usize,

    /// Result count for each follow-up query probe.
    ///
    /// Default: 3.
    pub query_results: usize,

    /// Capacity ceiling for the volatile cache tier (entries).
    ///
    /// `None` disables eviction. Default: 512.
    pub volatile_capacity: Option<usize>,

    /// Whether the subject's identity came from a verified registry lookup
    /// upstream. Drives the confidence base and clamp range.
    ///
    /// Default: true.
    pub identity_verified: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(25),
            overall_deadline: Duration::from_secs(90),
            max_attempts: 3,
            probe_results: 6,
            query_results: 3,
            volatile_capacity: Some(512),
            identity_verified: true,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the overall deadline.
    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = deadline;
        self
    }

    /// Set the gateway retry budget.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the probe result count.
    pub fn with_probe_results(mut self, count: usize) -> Self {
        self.probe_results = count;
        self
    }

    /// Set the volatile tier capacity.
    pub fn with_volatile_capacity(mut self, capacity: Option<usize>) -> Self {
        self.volatile_capacity = capacity;
        self
    }

    /// Mark the subject identity as unverified.
    pub fn with_unverified_identity(mut self) -> Self {
        self.identity_verified = false;
        self
    }
}
