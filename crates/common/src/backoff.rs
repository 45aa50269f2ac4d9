use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Delay between teardown and the next connection attempt when nothing else
/// is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(10);

/// A reconnect delay policy.
pub trait Backoff: Send + fmt::Debug {
    /// Delay to wait before the next attempt; advances the attempt counter.
    fn next_delay(&mut self) -> Duration;

    /// Reset the attempt counter (call after a stable connection).
    fn reset(&mut self);

    /// Number of delays handed out since the last reset.
    fn attempt(&self) -> u32;
}

/// Fixed delay between attempts, no cap on the number of attempts.
#[derive(Debug, Clone)]
pub struct ConstantBackoff {
    delay: Duration,
    attempt: u32,
}

impl ConstantBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay, attempt: 0 }
    }
}

impl Default for ConstantBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl Backoff for ConstantBackoff {
    fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.delay
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Exponential backoff with optional jitter.
///
/// Formula: min(max_delay, base * 2^attempt) + random_jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    attempt: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.1,
            attempt: 0,
        }
    }
}

impl ExponentialBackoff {
    /// Create a new ExponentialBackoff.
    ///
    /// # Arguments
    /// * `base` - Initial delay duration
    /// * `max_delay` - Maximum delay cap
    /// * `jitter_factor` - Jitter as a fraction of delay (0.0 to 1.0). Negative values are clamped to 0.
    pub fn new(base: Duration, max_delay: Duration, jitter_factor: f64) -> Self {
        Self {
            base,
            max_delay,
            // Clamp negative jitter to 0 to prevent gen_range panic
            jitter_factor: jitter_factor.max(0.0),
            attempt: 0,
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&mut self) -> Duration {
        let exp_delay = self.base.saturating_mul(2u32.saturating_pow(self.attempt));
        let capped_delay = exp_delay.min(self.max_delay);

        // Add jitter: random value in [-jitter_factor, +jitter_factor] of the delay
        let jitter_range = capped_delay.as_secs_f64() * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_secs = (capped_delay.as_secs_f64() + jitter).max(0.0);

        self.attempt = self.attempt.saturating_add(1);

        Duration::from_secs_f64(final_secs)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Configured reconnect policy.
///
/// Textual forms (see `FromStr`):
/// - `constant:<ms>`
/// - `exponential:<base_ms>:<max_ms>`
/// - `jittered:<base_ms>:<max_ms>:<factor>`
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffConfig {
    Constant(Duration),
    Exponential { base: Duration, max_delay: Duration },
    Jittered {
        base: Duration,
        max_delay: Duration,
        jitter_factor: f64,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::Constant(DEFAULT_RECONNECT_DELAY)
    }
}

impl BackoffConfig {
    /// Build a fresh policy instance with its attempt counter at zero.
    pub fn build(&self) -> Box<dyn Backoff> {
        match *self {
            Self::Constant(delay) => Box::new(ConstantBackoff::new(delay)),
            Self::Exponential { base, max_delay } => {
                Box::new(ExponentialBackoff::new(base, max_delay, 0.0))
            }
            Self::Jittered {
                base,
                max_delay,
                jitter_factor,
            } => Box::new(ExponentialBackoff::new(base, max_delay, jitter_factor)),
        }
    }

    /// Upper bound of any single delay this policy can produce.
    pub fn max_delay(&self) -> Duration {
        match *self {
            Self::Constant(delay) => delay,
            Self::Exponential { max_delay, .. } => max_delay,
            Self::Jittered {
                max_delay,
                jitter_factor,
                ..
            } => max_delay.mul_f64(1.0 + jitter_factor.max(0.0)),
        }
    }
}

impl FromStr for BackoffConfig {
    type Err = ParseBackoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseBackoffError(s.to_string());
        let parts: Vec<&str> = s.trim().split(':').collect();
        let millis = |v: &str| v.parse::<u64>().map(Duration::from_millis).map_err(|_| err());

        match parts.as_slice() {
            [kind, delay] if kind.eq_ignore_ascii_case("constant") => {
                Ok(Self::Constant(millis(delay)?))
            }
            [kind, base, max] if kind.eq_ignore_ascii_case("exponential") => Ok(Self::Exponential {
                base: millis(base)?,
                max_delay: millis(max)?,
            }),
            [kind, base, max, factor] if kind.eq_ignore_ascii_case("jittered") => {
                let jitter_factor: f64 = factor.parse().map_err(|_| err())?;
                if !(0.0..=1.0).contains(&jitter_factor) {
                    return Err(err());
                }
                Ok(Self::Jittered {
                    base: millis(base)?,
                    max_delay: millis(max)?,
                    jitter_factor,
                })
            }
            _ => Err(err()),
        }
    }
}

/// Error parsing a backoff policy string.
#[derive(Debug, Clone)]
pub struct ParseBackoffError(String);

impl fmt::Display for ParseBackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid backoff policy '{}', expected 'constant:<ms>', \
             'exponential:<base_ms>:<max_ms>' or 'jittered:<base_ms>:<max_ms>:<factor>'",
            self.0
        )
    }
}

impl std::error::Error for ParseBackoffError {}
