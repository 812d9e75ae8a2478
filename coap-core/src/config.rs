use crate::clock::Millis;
use crate::retry::{Attempts, Strategy};
use embedded_time::duration::Milliseconds;

/// Tunables for the reliability, Observe, and block-transfer engines,
/// grounded on `toad::config::Config`. All defaults are the constants
/// spec section 9 calls out as "configuration" (Open Question 2), not
/// hard-coded literals scattered through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Initial ACK timeout before the first retransmission (spec section 4.3:
  /// `ACK_TIMEOUT_MS` = 2000).
  pub ack_timeout: Millis,
  /// Maximum retransmissions of a CON before giving up (spec section 4.3:
  /// `MAX_RETRANSMITS` = 4).
  pub max_retransmits: Attempts,
  /// Size of the pending-message (retransmission) table (spec section 3:
  /// `MAX_PENDING_MESSAGES` = 10).
  pub max_pending_messages: usize,
  /// Size of each direction's duplicate-detection ring (spec section 4.4:
  /// `RECENT_MSG_HISTORY` = 16).
  pub recent_msg_history: usize,
  /// Size of the Observe subscriber table (spec section 4.7:
  /// `MAX_SUBSCRIBERS` = 5).
  pub max_subscribers: usize,
  /// Silence window after which a subscriber is charged a strike (spec
  /// section 4.7: `SUBSCRIBER_TIMEOUT_MS` = 3 hours).
  pub subscriber_timeout_ms: u64,
  /// Strikes before a subscriber is pruned (spec section 4.7:
  /// `TIMEOUT_THRESHOLD` = 3).
  pub timeout_threshold: u16,
  /// Block2 size exponent used for all transfers (spec section 4.5/6/9:
  /// SZX clamped to 6, 1024-byte blocks).
  pub block_size_szx: u8,
}

impl Config {
  pub fn retry_strategy(&self) -> Strategy {
    Strategy::new(self.ack_timeout)
  }
}

impl Default for Config {
  fn default() -> Self {
    Self { ack_timeout: Milliseconds(2_000),
           max_retransmits: Attempts(4),
           max_pending_messages: 10,
           recent_msg_history: 16,
           max_subscribers: 5,
           subscriber_timeout_ms: 3 * 60 * 60 * 1_000,
           timeout_threshold: 3,
           block_size_szx: 6 }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_spec_constants() {
    let c = Config::default();
    assert_eq!(c.ack_timeout, Milliseconds(2_000u64));
    assert_eq!(c.max_retransmits, Attempts(4));
    assert_eq!(c.max_pending_messages, 10);
    assert_eq!(c.recent_msg_history, 16);
    assert_eq!(c.max_subscribers, 5);
    assert_eq!(c.subscriber_timeout_ms, 10_800_000);
    assert_eq!(c.timeout_threshold, 3);
    assert_eq!(c.block_size_szx, 6);
  }
}
