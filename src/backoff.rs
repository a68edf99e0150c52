use std::fmt;
use std::future::Future;
use std::time::Duration;


/// Exponentially (doubling) backs off repeats so that we aren't spamming an api.
///
/// The delay before the n-th retry (n starting at 0) is
/// `min(2^n * initial_delay, max_delay)`. The only state is the attempt
/// counter, which [`reset`](Self::reset) clears after a success.
///
/// ```
/// # tokio_test::block_on(async {
/// use datahub_live::BackoffRepeater;
/// use std::time::Duration;
///
/// let mut backoff = BackoffRepeater::new(Duration::from_millis(1), Duration::from_millis(4));
/// let mut calls = 0;
/// let result: Result<u32, String> = backoff
///     .retry(Some(3), || {
///         calls += 1;
///         let ready = calls == 2;
///         async move { if ready { Ok(7) } else { Err("not yet".to_string()) } }
///     })
///     .await;
///
/// assert_eq!(result, Ok(7));
/// assert_eq!(backoff.attempt(), 0);
/// # })
/// ```
#[derive(Clone, Debug)]
pub struct BackoffRepeater {
    initial_delay: Duration,
    max_delay: Duration,
    attempt: u32,
}

impl BackoffRepeater {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self { initial_delay, max_delay, attempt: 0 }
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Number of retries handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before retry `attempt`, saturating at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay for the current attempt; advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Run `op` until it succeeds, sleeping [`next_delay`](Self::next_delay) between failures.
    ///
    /// With `max_attempts` set, gives up and returns the last error once that
    /// many calls have failed. The counter is reset on success.
    pub async fn retry<T, E, F, Fut>(
        &mut self,
        max_attempts: Option<u32>,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut failures = 0u32;
        loop {
            match op().await {
                Ok(value) => {
                    self.reset();
                    return Ok(value);
                }
                Err(error) => {
                    failures = failures.saturating_add(1);
                    if max_attempts.is_some_and(|max| failures >= max) {
                        return Err(error);
                    }
                    let delay = self.next_delay();
                    tracing::debug!("Attempt {} failed ({}), retrying in {:?}", failures, error, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for BackoffRepeater {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(30000))
    }
}
