use no_std_net::SocketAddr;
use tinyvec::ArrayVec;

use coap_msg::Id;

use crate::config::Config;
use crate::error::RegisterError;
use crate::net::Addrd;
use crate::retry::{Attempts, RetryTimer, YouShould};

/// Largest wire message this engine will hold pending: one full block plus
/// option overhead (spec section 9: "≈ 1224 bytes in the source").
pub const MAX_PENDING_MESSAGE_LEN: usize = 1232;

/// One slot of the retransmission table (spec section 3).
#[derive(Debug, Clone)]
struct PendingMessage {
  id: Id,
  peer: SocketAddr,
  bytes: ArrayVec<[u8; MAX_PENDING_MESSAGE_LEN]>,
  retry: RetryTimer,
}

/// Cleanup performed when a confirmable send is abandoned after
/// `max_retransmits` attempts (spec section 4.3/5: aborting a routed file
/// transfer, charging a subscriber strike). Expressed as a trait so the
/// engine never holds a function pointer - spec section 9: "express as an
/// interface the transport layer invokes".
pub trait RetransmitFailure {
  fn on_retransmit_failure(&mut self, id: Id, peer: SocketAddr);
}

/// Confirmable-message reliability: registers outbound CONs, retransmits
/// on a schedule, and clears slots on ACK (spec section 4.3).
#[derive(Debug)]
pub struct ReliabilityEngine {
  pending: ArrayVec<[Option<PendingMessage>; 10]>,
  config: Config,
}

impl ReliabilityEngine {
  pub fn new(config: Config) -> Self {
    let mut pending = ArrayVec::new();
    for _ in 0..config.max_pending_messages.min(10) {
      pending.push(None);
    }
    Self { pending, config }
  }

  /// Number of currently active (unacknowledged) pending messages.
  pub fn active_count(&self) -> usize {
    self.pending.iter().filter(|p| p.is_some()).count()
  }

  /// Copy `bytes` into a free slot and schedule its first retransmission.
  /// Fails if every slot is occupied (spec section 4.3).
  pub fn register(&mut self, now_ms: u64, id: Id, peer: SocketAddr, bytes: &[u8]) -> Result<(), RegisterError> {
    let slot = self.pending.iter_mut().find(|p| p.is_none()).ok_or(RegisterError::PendingQueueFull)?;

    let mut wire = ArrayVec::new();
    wire.extend_from_slice(&bytes[..bytes.len().min(wire.capacity())]);

    let max_attempts = Attempts(self.config.max_retransmits.0 + 1);
    *slot = Some(PendingMessage { id,
                                  peer,
                                  bytes: wire,
                                  retry: RetryTimer::new(now_ms, self.config.retry_strategy(), max_attempts) });
    Ok(())
  }

  /// Clear the slot matching `id`, if any (an ACK arrived). No-op if absent.
  pub fn clear(&mut self, id: Id) {
    for slot in self.pending.iter_mut() {
      if slot.as_ref().is_some_and(|p| p.id == id) {
        *slot = None;
        return;
      }
    }
  }

  /// Drive retransmission: re-send every due slot via `send`, and retire
  /// (invoking `on_failure`) any slot that has exhausted its attempts.
  pub fn tick(&mut self,
              now_ms: u64,
              mut send: impl FnMut(Addrd<&[u8]>),
              on_failure: &mut impl RetransmitFailure) {
    for slot in self.pending.iter_mut() {
      let Some(pending) = slot else { continue };

      match pending.retry.what_should_i_do(now_ms) {
        | YouShould::WouldBlock => {},
        | YouShould::Retry => send(Addrd(&pending.bytes, pending.peer)),
        | YouShould::Cry => {
          on_failure.on_retransmit_failure(pending.id, pending.peer);
          *slot = None;
        },
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use no_std_net::{IpAddr, Ipv4Addr};

  use super::*;

  fn addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)).into(), 5683)
  }

  #[derive(Default)]
  struct Failures(Vec<(Id, SocketAddr)>);
  impl RetransmitFailure for Failures {
    fn on_retransmit_failure(&mut self, id: Id, peer: SocketAddr) {
      self.0.push((id, peer));
    }
  }

  #[test]
  fn register_and_clear() {
    let mut engine = ReliabilityEngine::new(Config::default());
    engine.register(0, Id(1), addr(), b"hello").unwrap();
    assert_eq!(engine.active_count(), 1);
    engine.clear(Id(1));
    assert_eq!(engine.active_count(), 0);
  }

  #[test]
  fn register_fails_when_full() {
    let mut cfg = Config::default();
    cfg.max_pending_messages = 1;
    let mut engine = ReliabilityEngine::new(cfg);
    engine.register(0, Id(1), addr(), b"a").unwrap();
    assert_eq!(engine.register(0, Id(2), addr(), b"b"), Err(RegisterError::PendingQueueFull));
  }

  #[test]
  fn retransmits_then_fails_per_spec_schedule() {
    let mut engine = ReliabilityEngine::new(Config::default());
    engine.register(0, Id(1), addr(), b"hello").unwrap();

    let mut sent_at = Vec::new();
    let mut failures = Failures::default();

    // spec: re-emissions at t~=2s,4s,8s,16s; failure after the 5th
    // would-be attempt (max_retransmits=4 -> 5 total sends allowed).
    for t in [2_000u64, 4_000, 8_000, 16_000] {
      engine.tick(t, |_| sent_at.push(t), &mut failures);
    }
    assert_eq!(sent_at, vec![2_000, 4_000, 8_000, 16_000]);
    assert_eq!(engine.active_count(), 1);

    // A full extra backoff period must pass after the last retransmission
    // before the message is declared dead - not the instant the 4th retry
    // was granted.
    engine.tick(31_999, |_| sent_at.push(31_999), &mut failures);
    assert_eq!(engine.active_count(), 1);
    assert!(failures.0.is_empty());

    engine.tick(32_000, |_| sent_at.push(32_000), &mut failures);
    assert_eq!(engine.active_count(), 0);
    assert_eq!(failures.0, vec![(Id(1), addr())]);
  }
}
