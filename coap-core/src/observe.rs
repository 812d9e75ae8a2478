use no_std_net::SocketAddr;
use tinyvec::ArrayVec;

use coap_msg::Token;

use crate::config::Config;
use crate::error::SubscribeError;

/// An Observe (RFC7641) subscriber: the peer, the token it registered with,
/// its current sequence number, and its liveness counters (spec section
/// 3/4.7).
#[derive(Debug, Clone, Copy)]
struct Subscriber {
  peer: SocketAddr,
  token: Token,
  seq: u32,
  last_ack_ms: u64,
  timeout_sessions: u16,
}

/// Fixed-capacity table of Observe subscribers, keyed by `(peer, token)`
/// (spec section 4.7 / 9).
#[derive(Debug)]
pub struct ObserveRegistry {
  subscribers: ArrayVec<[Option<Subscriber>; 5]>,
  subscriber_timeout_ms: u64,
  timeout_threshold: u16,
}

impl ObserveRegistry {
  pub fn new(config: Config) -> Self {
    let mut subscribers = ArrayVec::new();
    for _ in 0..config.max_subscribers.min(5) {
      subscribers.push(None);
    }
    Self { subscribers,
           subscriber_timeout_ms: config.subscriber_timeout_ms,
           timeout_threshold: config.timeout_threshold }
  }

  pub fn active_count(&self) -> usize {
    self.subscribers.iter().filter(|s| s.is_some()).count()
  }

  /// Register `(peer, token)`, reusing an existing entry for the same pair
  /// rather than duplicating it (spec section 9: "recommends
  /// deduplication").
  pub fn register(&mut self, now_ms: u64, peer: SocketAddr, token: Token) -> Result<(), SubscribeError> {
    if let Some(existing) = self.subscribers.iter_mut().flatten().find(|s| s.peer == peer && s.token == token) {
      existing.last_ack_ms = now_ms;
      existing.timeout_sessions = 0;
      return Ok(());
    }

    let slot = self.subscribers
                   .iter_mut()
                   .find(|s| s.is_none())
                   .ok_or(SubscribeError::SubscriberSlotsFull)?;
    *slot = Some(Subscriber { peer, token, seq: 0, last_ack_ms: now_ms, timeout_sessions: 0 });
    Ok(())
  }

  /// Remove a subscription on an explicit Observe=1 deregistration
  /// (RFC7641 section 3.6).
  pub fn deregister(&mut self, peer: SocketAddr, token: Token) {
    for slot in self.subscribers.iter_mut() {
      if slot.as_ref().is_some_and(|s| s.peer == peer && s.token == token) {
        *slot = None;
        return;
      }
    }
  }

  /// Reset liveness for the subscriber matching `peer`, e.g. on receipt of
  /// an ACK for a notification (spec section 4.7).
  pub fn on_ack(&mut self, now_ms: u64, peer: SocketAddr) {
    if let Some(s) = self.subscribers.iter_mut().flatten().find(|s| s.peer == peer) {
      s.last_ack_ms = now_ms;
      s.timeout_sessions = 0;
    }
  }

  /// Charge a strike to the subscriber matching `peer` (invoked by the
  /// retransmission failure callback when a notification to them was
  /// never ACKed).
  pub fn charge_strike(&mut self, peer: SocketAddr) {
    if let Some(s) = self.subscribers.iter_mut().flatten().find(|s| s.peer == peer) {
      s.timeout_sessions += 1;
    }
  }

  /// Charge a strike to every subscriber silent for longer than
  /// `subscriber_timeout_ms`, and remove those at or past
  /// `timeout_threshold` strikes (spec section 4.7).
  pub fn prune(&mut self, now_ms: u64) {
    for slot in self.subscribers.iter_mut() {
      let done = match slot {
        | Some(s) if now_ms.saturating_sub(s.last_ack_ms) > self.subscriber_timeout_ms => {
          s.timeout_sessions += 1;
          s.last_ack_ms = now_ms;
          s.timeout_sessions >= self.timeout_threshold
        },
        | Some(s) => s.timeout_sessions >= self.timeout_threshold,
        | None => false,
      };
      if done {
        *slot = None;
      }
    }
  }

  /// Invoke `notify(peer, token, seq)` for every active subscriber, then
  /// advance its sequence number (spec section 4.7: "broadcast").
  pub fn broadcast(&mut self, mut notify: impl FnMut(SocketAddr, Token, u32)) {
    for s in self.subscribers.iter_mut().flatten() {
      notify(s.peer, s.token, s.seq);
      s.seq = s.seq.wrapping_add(1) & 0x00FF_FFFF;
    }
  }
}

#[cfg(test)]
mod tests {
  use no_std_net::{IpAddr, Ipv4Addr};

  use super::*;

  fn addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)).into(), port)
  }

  #[test]
  fn register_dedupes_same_peer_and_token() {
    let mut reg = ObserveRegistry::new(Config::default());
    let token = Token::from_bytes_truncating(b"A1");
    reg.register(0, addr(1), token).unwrap();
    reg.register(10, addr(1), token).unwrap();
    assert_eq!(reg.active_count(), 1);
  }

  #[test]
  fn register_fails_when_full() {
    let mut cfg = Config::default();
    cfg.max_subscribers = 1;
    let mut reg = ObserveRegistry::new(cfg);
    reg.register(0, addr(1), Token::from_bytes_truncating(b"A")).unwrap();
    assert_eq!(reg.register(0, addr(2), Token::from_bytes_truncating(b"B")),
               Err(SubscribeError::SubscriberSlotsFull));
  }

  #[test]
  fn broadcast_sequence_strictly_increases() {
    let mut reg = ObserveRegistry::new(Config::default());
    let token = Token::from_bytes_truncating(b"A1");
    reg.register(0, addr(1), token).unwrap();

    let mut seqs = Vec::new();
    reg.broadcast(|_, _, seq| seqs.push(seq));
    reg.broadcast(|_, _, seq| seqs.push(seq));
    reg.broadcast(|_, _, seq| seqs.push(seq));
    assert_eq!(seqs, vec![0, 1, 2]);
  }

  #[test]
  fn prune_removes_after_three_silent_windows() {
    let mut cfg = Config::default();
    cfg.subscriber_timeout_ms = 100;
    cfg.timeout_threshold = 3;
    let mut reg = ObserveRegistry::new(cfg);
    let token = Token::from_bytes_truncating(b"A1");
    reg.register(0, addr(1), token).unwrap();

    reg.prune(101);
    assert_eq!(reg.active_count(), 1);
    reg.prune(202);
    assert_eq!(reg.active_count(), 1);
    reg.prune(303);
    assert_eq!(reg.active_count(), 0);
  }

  #[test]
  fn deregister_removes_immediately() {
    let mut reg = ObserveRegistry::new(Config::default());
    let token = Token::from_bytes_truncating(b"A1");
    reg.register(0, addr(1), token).unwrap();
    reg.deregister(addr(1), token);
    assert_eq!(reg.active_count(), 0);
  }
}
