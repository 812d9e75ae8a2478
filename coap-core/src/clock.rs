/// A millisecond duration, matching `toad::time::Millis`.
pub type Millis = embedded_time::duration::Milliseconds<u64>;

/// A monotonic millisecond clock.
///
/// spec section 1 assumes "a monotonic millisecond clock" as an external
/// collaborator; this is the minimal interface that gives the engine what
/// it needs (`now_ms`) without requiring the full generic
/// `embedded_time::Clock` (epoch, scaling factor, fallible `try_now`) at
/// every call site.
pub trait Clock {
  fn now_ms(&self) -> u64;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test {
  use std::cell::Cell;

  use super::Clock;

  /// A clock whose time is set directly by the test, modeled on
  /// `toad::retry::test::FakeClock`.
  #[derive(Debug, Default)]
  pub struct FakeClock(Cell<u64>);

  impl FakeClock {
    pub fn new() -> Self {
      Self(Cell::new(0))
    }

    pub fn set(&self, ms: u64) {
      self.0.set(ms);
    }

    pub fn advance(&self, ms: u64) {
      self.0.set(self.0.get() + ms);
    }
  }

  impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
      self.0.get()
    }
  }
}
