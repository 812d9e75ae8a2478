use std::time::Instant;

use coap_core::clock::Clock;

/// Wall-clock `Clock` implementation, grounded on `toad::std::Clock`: a
/// monotonic `std::time::Instant` captured at construction, with
/// millisecond elapsed-time queries.
#[derive(Debug, Clone)]
pub struct SystemClock {
  start: Instant,
}

impl SystemClock {
  pub fn new() -> Self {
    Self { start: Instant::now() }
  }
}

impl Default for SystemClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for SystemClock {
  fn now_ms(&self) -> u64 {
    self.start.elapsed().as_millis() as u64
  }
}
