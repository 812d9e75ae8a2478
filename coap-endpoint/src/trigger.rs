use no_std_net::SocketAddr;

use coap_msg::{Code, Id, Message, OptionNumber, Token, Type};

use coap_core::ids::IdGenerator;
use coap_core::net::{Addrd, MAX_DGRAM_LEN};
use coap_core::observe::ObserveRegistry;
use coap_core::reliability::ReliabilityEngine;

/// Turns a hardware event (a button press, a sensor reading) into a
/// confirmable notification fanned out to every active Observe subscriber
/// (spec section 4.7/6 - the endpoint's abstracted "hardware trigger"
/// interface). Owns nothing about sockets; callers take the built
/// datagrams and send them.
pub struct Notifier {
  ids: IdGenerator,
}

impl Notifier {
  pub fn new(seed: u64) -> Self {
    Self { ids: IdGenerator::new(seed) }
  }

  /// Build and register one confirmable notification per active
  /// subscriber of `observe`, returning the wire bytes and destination of
  /// each so the caller's event loop can send them. Every notification is
  /// also registered with `reliability` so it gets retried on the normal
  /// schedule.
  pub fn notify(&mut self,
                now_ms: u64,
                observe: &mut ObserveRegistry,
                reliability: &mut ReliabilityEngine,
                payload: &[u8])
                -> Vec<Addrd<Vec<u8>>> {
    let mut out = Vec::new();
    let ids = &mut self.ids;

    observe.broadcast(|peer, token, seq| {
                  let dgram = build_notification(ids.next_id(), token, seq, payload);
                  let mut buf = [0u8; MAX_DGRAM_LEN];
                  if let Ok(n) = dgram.build(&mut buf) {
                    let _ = reliability.register(now_ms, dgram.id, peer, &buf[..n]);
                    out.push(Addrd(buf[..n].to_vec(), peer));
                  }
                });

    out
  }

  /// Build a notification for exactly one subscriber, without touching
  /// `ObserveRegistry`'s sequence counter - used when re-sending a
  /// specific peer's current state (e.g. on (re)registration).
  pub fn notify_one(&mut self, token: Token, seq: u32, payload: &[u8]) -> Message {
    build_notification(self.ids.next_id(), token, seq, payload)
  }
}

fn build_notification(id: Id, token: Token, seq: u32, payload: &[u8]) -> Message {
  let mut msg = Message::new(Type::Con, Code::CONTENT, id, token);
  msg.options.push_uint(OptionNumber::CONTENT_FORMAT, 0);
  msg.options.push_uint(OptionNumber::OBSERVE, seq);
  msg.set_payload(payload);
  msg
}

#[cfg(test)]
mod tests {
  use no_std_net::{IpAddr, Ipv4Addr};

  use super::*;

  fn addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)).into(), port)
  }

  #[test]
  fn notify_builds_one_con_per_subscriber() {
    let mut observe = ObserveRegistry::new(coap_core::config::Config::default());
    let mut reliability = ReliabilityEngine::new(coap_core::config::Config::default());
    let mut notifier = Notifier::new(7);

    observe.register(0, addr(1), Token::from_bytes_truncating(b"a")).unwrap();
    observe.register(0, addr(2), Token::from_bytes_truncating(b"b")).unwrap();

    let sent = notifier.notify(0, &mut observe, &mut reliability, b"PRESSED");
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().any(|d| d.addr() == addr(1)));
    assert!(sent.iter().any(|d| d.addr() == addr(2)));
    assert_eq!(reliability.active_count(), 2);
  }

  #[test]
  fn notify_one_carries_given_sequence() {
    let mut notifier = Notifier::new(1);
    let msg = notifier.notify_one(Token::from_bytes_truncating(b"x"), 42, b"on");
    assert_eq!(msg.options.get_uint(OptionNumber::OBSERVE), Some(42));
    assert_eq!(msg.payload.as_slice(), b"on");
  }
}
