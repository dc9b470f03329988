use std::{fmt, sync::Arc, time::Duration};

/// Default number of times a transaction failing with a stale map is retried.
///
/// Repeated map-resized failures signal rapid growth from another process,
/// or a bug.
pub const DEFAULT_MAX_RESIZE_RETRIES: MaxRetries = MaxRetries::Limited(2);

/// Default wait before adopting the map size on retries after the first.
pub const DEFAULT_RESIZE_DELAY: Duration = Duration::from_millis(1);

/// Bound on how often a transaction is re-run after a map-resized failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxRetries {
    /// Retry until the transaction stops failing with a stale map.
    Unbounded,
    /// Never retry; surface the map-resized error immediately.
    Disabled,
    /// Adopt the new map size at most this many times.
    Limited(u32),
}

impl MaxRetries {
    /// Interpret a signed count: negative is unbounded, zero disables retries,
    /// positive is a limit.
    pub fn from_count(count: i64) -> Self {
        match count {
            i64::MIN..=-1 => Self::Unbounded,
            0 => Self::Disabled,
            n => Self::Limited(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    /// True if another adoption is allowed after `attempt` adoptions have
    /// already been made.
    pub const fn allows(&self, attempt: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Disabled => false,
            Self::Limited(max) => attempt < *max,
        }
    }
}

impl Default for MaxRetries {
    fn default() -> Self {
        DEFAULT_MAX_RESIZE_RETRIES
    }
}

impl From<i64> for MaxRetries {
    fn from(count: i64) -> Self {
        Self::from_count(count)
    }
}

/// Wait applied before adopting a resized map, as a function of the retry
/// attempt.
///
/// Only consulted from the second retry onward; the first adoption never
/// waits.
#[derive(Clone)]
pub struct ResizeDelay(Arc<dyn Fn(u32) -> Duration + Send + Sync>);

impl fmt::Debug for ResizeDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResizeDelay").finish_non_exhaustive()
    }
}

impl ResizeDelay {
    /// Delay computed by `f` from the attempt index.
    pub fn new(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// The same delay for every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(move |_| delay)
    }

    /// `step` multiplied by the attempt index.
    pub fn linear(step: Duration) -> Self {
        Self::new(move |attempt| step.saturating_mul(attempt))
    }

    /// Delay before the given attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        (self.0)(attempt)
    }
}

impl Default for ResizeDelay {
    fn default() -> Self {
        Self::fixed(DEFAULT_RESIZE_DELAY)
    }
}

/// Defaults for resize handling, shared by every environment built with them.
#[derive(Debug, Clone, Default)]
pub struct ResizePolicy {
    /// Retry bound.
    pub max_retries: MaxRetries,
    /// Inter-attempt delay.
    pub delay: ResizeDelay,
}

/// What to do after a transaction reported a stale map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retry {
    /// Give up and return the map-resized error.
    Surface,
    /// Adopt the new map size, waiting this long under the exclusive lock.
    Adopt(Duration),
}

/// Retry decisions for one environment: the supplied policy, overridden
/// per instance where an override is set.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResizeRetryDriver {
    policy: ResizePolicy,
    max_retries: Option<MaxRetries>,
    delay: Option<ResizeDelay>,
}

impl ResizeRetryDriver {
    pub(crate) const fn new(
        policy: ResizePolicy,
        max_retries: Option<MaxRetries>,
        delay: Option<ResizeDelay>,
    ) -> Self {
        Self { policy, max_retries, delay }
    }

    pub(crate) fn max_retries(&self) -> MaxRetries {
        self.max_retries.unwrap_or(self.policy.max_retries)
    }

    pub(crate) const fn set_max_retries(&mut self, max_retries: Option<MaxRetries>) {
        self.max_retries = max_retries;
    }

    pub(crate) fn set_delay(&mut self, delay: Option<ResizeDelay>) {
        self.delay = delay;
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.delay.as_ref().unwrap_or(&self.policy.delay).delay(attempt)
    }

    /// Decide the next step after `attempt` adoptions have already been made
    /// for this call and the transaction failed with a stale map again.
    pub(crate) fn next(&self, attempt: u32) -> Retry {
        if !self.max_retries().allows(attempt) {
            return Retry::Surface;
        }
        let delay = if attempt == 0 { Duration::ZERO } else { self.delay(attempt) };
        Retry::Adopt(delay)
    }
}
