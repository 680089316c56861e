//! Randomized delays that approximate human timing between browser actions.

use rand::Rng;
use std::time::Duration;

/// Inclusive delay range in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    fn sample(&self, rng: &mut impl Rng) -> f64 {
        rng.gen_range(self.min_secs..=self.max_secs)
    }
}

/// Shaping parameters applied on top of every base draw.
#[derive(Debug, Clone, Copy)]
pub struct PacingProfile {
    /// Applied to the base draw with 20% probability.
    pub multiplier: DelayRange,
    /// Always added.
    pub jitter: DelayRange,
    /// Added with 10% probability.
    pub long_jitter: DelayRange,
}

impl Default for PacingProfile {
    fn default() -> Self {
        Self {
            multiplier: DelayRange::new(1.2, 2.0),
            jitter: DelayRange::new(0.3, 0.8),
            long_jitter: DelayRange::new(3.0, 6.0),
        }
    }
}

/// Named delay ranges for each stage of the pipeline, mirroring observed
/// human browsing rhythm. All values in seconds.
#[derive(Debug, Clone, Copy)]
pub struct Delays {
    pub general: DelayRange,
    pub after_click: DelayRange,
    pub between_jobs: DelayRange,
    pub page_settle: DelayRange,
    pub between_pages: DelayRange,
    pub refresh_settle: DelayRange,
    pub error_retry: DelayRange,
    pub pre_rotation: DelayRange,
    pub post_rotation: DelayRange,
    pub post_login: DelayRange,
    /// Delay between typed characters.
    pub typing_char: Duration,
    /// Interval between login-verification polls.
    pub verification_poll: Duration,
    /// Upper bound on waiting for login verification.
    pub verification_wait: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            general: DelayRange::new(1.0, 3.0),
            after_click: DelayRange::new(2.0, 3.0),
            between_jobs: DelayRange::new(1.0, 2.0),
            page_settle: DelayRange::new(3.0, 5.0),
            between_pages: DelayRange::new(5.0, 10.0),
            refresh_settle: DelayRange::new(5.0, 7.0),
            error_retry: DelayRange::new(2.0, 4.0),
            pre_rotation: DelayRange::new(5.0, 10.0),
            post_rotation: DelayRange::new(8.0, 15.0),
            post_login: DelayRange::new(5.0, 10.0),
            typing_char: Duration::from_millis(100),
            verification_poll: Duration::from_secs(5),
            verification_wait: Duration::from_secs(600),
        }
    }
}

/// Bounded retry counts for transient UI failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub title_field_attempts: usize,
    pub job_card_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            title_field_attempts: 3,
            job_card_attempts: 2,
        }
    }
}

/// Draw one delay: uniform base, occasional multiplier, small jitter,
/// occasional long pause. Never negative.
pub fn sample_delay(range: DelayRange, profile: &PacingProfile, rng: &mut impl Rng) -> Duration {
    let mut secs = range.sample(rng);

    if rng.gen::<f64>() < 0.2 {
        secs *= profile.multiplier.sample(rng);
    }

    secs += profile.jitter.sample(rng);

    if rng.gen::<f64>() < 0.1 {
        secs += profile.long_jitter.sample(rng);
    }

    Duration::from_secs_f64(secs.max(0.0))
}

/// Sleeps with humanized randomness between actions.
#[derive(Debug, Clone, Default)]
pub struct Pacer {
    profile: PacingProfile,
    pub delays: Delays,
}

impl Pacer {
    pub fn new(delays: Delays) -> Self {
        Self {
            profile: PacingProfile::default(),
            delays,
        }
    }

    /// Block the (single) pipeline task for a humanized delay drawn from
    /// the given range.
    pub async fn pause(&self, range: DelayRange) {
        let duration = {
            let mut rng = rand::thread_rng();
            sample_delay(range, &self.profile, &mut rng)
        };
        tracing::trace!(delay_ms = duration.as_millis() as u64, "pacing pause");
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_stay_within_shaped_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let range = DelayRange::new(1.0, 3.0);
        let profile = PacingProfile::default();

        let upper = range.max_secs * profile.multiplier.max_secs
            + profile.jitter.max_secs
            + profile.long_jitter.max_secs;
        let lower = range.min_secs + profile.jitter.min_secs;

        for _ in 0..10_000 {
            let d = sample_delay(range, &profile, &mut rng).as_secs_f64();
            assert!(d >= lower, "delay {d} below lower bound {lower}");
            assert!(d <= upper, "delay {d} above upper bound {upper}");
        }
    }

    #[test]
    fn zero_width_range_is_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        let d = sample_delay(
            DelayRange::new(2.0, 2.0),
            &PacingProfile::default(),
            &mut rng,
        );
        assert!(d.as_secs_f64() >= 2.0);
    }
}
