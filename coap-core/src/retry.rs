use crate::clock::Millis;
use embedded_time::duration::Milliseconds;

/// A number of attempts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempts(pub u16);

/// What a [`RetryTimer`] advises after a failed attempt.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Attempts are exhausted; the thing being retried should be considered
  /// dead.
  Cry,
  /// Not enough time has passed yet; keep waiting.
  WouldBlock,
  /// Time has passed; retry now.
  Retry,
}

/// Exponential backoff: `delay(attempt) = init * 2^(attempt - 1)`, matching
/// RFC7252's CON retransmission timing and `toad::retry::Strategy::Exponential`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
  pub init: Millis,
}

impl Strategy {
  pub const fn new(init: Millis) -> Self {
    Self { init }
  }

  const fn total_delay(&self, attempt: u16) -> u64 {
    let Milliseconds(init) = self.init;
    init * 2u64.pow((attempt - 1) as u32)
  }

  /// Total time (from the first send) all attempts up to `max_attempts`
  /// will have consumed if every one of them times out.
  pub fn max_time(&self, max_attempts: Attempts) -> u64 {
    self.total_delay(max_attempts.0)
  }
}

/// Tracks elapsed time against an exponential-backoff [`Strategy`] for one
/// in-flight confirmable message, grounded on `toad::retry::RetryTimer` but
/// driven by plain millisecond timestamps instead of a generic
/// `embedded_time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer {
  start_ms: u64,
  strategy: Strategy,
  attempts: Attempts,
  max_attempts: Attempts,
}

impl RetryTimer {
  pub fn new(start_ms: u64, strategy: Strategy, max_attempts: Attempts) -> Self {
    Self { start_ms, strategy, attempts: Attempts(1), max_attempts }
  }

  pub fn attempts(&self) -> Attempts {
    self.attempts
  }

  /// Ask whether it's time to retry yet, given the current time.
  ///
  /// On `Retry`, the internal attempt counter advances; calling this
  /// again immediately without an intervening failed send would
  /// incorrectly count a second attempt, so callers must only call this
  /// once per tick per pending message.
  ///
  /// Once `max_attempts` have been sent, `Cry` does not fire immediately -
  /// a full extra backoff period (the same doubling schedule, one step
  /// further) must elapse first, so a message sent at t=0 with
  /// `ACK_TIMEOUT_MS=2000`/`MAX_RETRANSMITS=4` is retransmitted at
  /// t~=2,4,8,16s and only declared dead at t~=32s (spec section 8
  /// scenario 6), not the instant the 4th retransmission is granted.
  pub fn what_should_i_do(&mut self, now_ms: u64) -> YouShould {
    let elapsed = now_ms.saturating_sub(self.start_ms);

    if self.attempts >= self.max_attempts {
      return if elapsed >= self.strategy.total_delay(self.max_attempts.0) {
        YouShould::Cry
      } else {
        YouShould::WouldBlock
      };
    }

    if elapsed >= self.strategy.total_delay(self.attempts.0) {
      self.attempts.0 += 1;
      YouShould::Retry
    } else {
      YouShould::WouldBlock
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exponential_retrier() {
    let strategy = Strategy::new(Milliseconds(1000));
    let mut retry = RetryTimer::new(0, strategy, Attempts(5));

    assert_eq!(retry.what_should_i_do(999), YouShould::WouldBlock);
    assert_eq!(retry.what_should_i_do(1000), YouShould::Retry);

    assert_eq!(retry.what_should_i_do(1999), YouShould::WouldBlock);
    assert_eq!(retry.what_should_i_do(2000), YouShould::Retry);

    assert_eq!(retry.what_should_i_do(3999), YouShould::WouldBlock);
    assert_eq!(retry.what_should_i_do(4000), YouShould::Retry);

    assert_eq!(retry.what_should_i_do(8000), YouShould::Retry);

    // attempts is now at max_attempts; one more full backoff period must
    // pass before Cry, not an instant short-circuit.
    assert_eq!(retry.what_should_i_do(15_999), YouShould::WouldBlock);
    assert_eq!(retry.what_should_i_do(16_000), YouShould::Cry);
  }

  #[test]
  fn exp_calculation() {
    let s = Strategy::new(Milliseconds(100));
    assert_eq!(s.total_delay(1), 100);
    assert_eq!(s.total_delay(2), 200);
    assert_eq!(s.total_delay(3), 400);
  }

  #[test]
  fn max_time_matches_spec_ack_timeout_sum() {
    // ACK_TIMEOUT_MS=2000, MAX_RETRANSMITS=4 -> attempts up to 5th send.
    // Sum of waits: 2000 + 4000 + 8000 + 16000 = 30000, cumulative from
    // t=0 is the last retry fired at t=2+4+8+16=30s, failure ~32s later
    // per spec section 8 scenario 6 (2+4+8+16+32=62s total span).
    let strategy = Strategy::new(Milliseconds(2000));
    assert_eq!(strategy.total_delay(1), 2000);
    assert_eq!(strategy.total_delay(2), 4000);
    assert_eq!(strategy.total_delay(3), 8000);
    assert_eq!(strategy.total_delay(4), 16000);
    assert_eq!(strategy.total_delay(5), 32000);
  }
}
