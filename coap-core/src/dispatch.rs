use no_std_net::SocketAddr;
use tinyvec::ArrayVec;

use coap_msg::{Code, CodeKind, Id, Message, Token, Type};

use crate::duplicate::DuplicateDetector;
use crate::error::DispatchError;
use crate::net::MAX_DGRAM_LEN;

/// Handles one matched `(method, path)` request, building the response
/// body/options. Dispatch itself (ACK/RST wrapping, duplicate suppression,
/// not-found) is the caller's (`Dispatcher`'s) job.
pub trait ResourceHandler {
  fn handle(&mut self, req: &Message, peer: SocketAddr) -> Result<Message, DispatchError>;
}

struct Endpoint {
  method: Code,
  path: &'static [&'static str],
  handler: Box<dyn ResourceHandler>,
}

/// The cached reply for one recently-seen duplicate CON/NON, so a
/// retransmitted request gets the original answer replayed instead of
/// re-running the handler (spec section 4.4, and Open Question 1: this is
/// the RFC7252-correct behavior the spec recommends preferring over the
/// source's "just skip duplicate detection for GET /file" shortcut).
struct CachedReply {
  peer: SocketAddr,
  id: Id,
  bytes: ArrayVec<[u8; MAX_DGRAM_LEN]>,
}

/// Parses-and-matches one inbound datagram against the endpoint table
/// (spec section 4.8). Implemented as a linear scan over a `Vec` per spec
/// section 9's explicit design note ("a vector of (method, path_segments,
/// handler), not via inheritance").
pub struct Dispatcher {
  table: Vec<Endpoint>,
  reply_cache: ArrayVec<[Option<CachedReply>; 16]>,
  next_cache_slot: usize,
}

/// What the caller should do with the result of [`Dispatcher::dispatch`].
pub enum DispatchOutcome {
  /// Send this message back to the peer.
  Reply(Message),
  /// RFC7252 forbids responding to a malformed message, or this is a
  /// non-confirmable duplicate - do nothing.
  Drop,
}

impl Dispatcher {
  pub fn new() -> Self {
    let mut reply_cache = ArrayVec::new();
    for _ in 0..16 {
      reply_cache.push(None);
    }
    Self { table: Vec::new(), reply_cache, next_cache_slot: 0 }
  }

  pub fn register(&mut self, method: Code, path: &'static [&'static str], handler: Box<dyn ResourceHandler>) {
    self.table.push(Endpoint { method, path, handler });
  }

  fn path_matches(path: &[&str], req: &Message) -> bool {
    let segments: Vec<&[u8]> = req.options.uri_path().collect();
    if segments.len() != path.len() {
      return false;
    }
    segments.iter().zip(path.iter()).all(|(a, b)| *a == b.as_bytes())
  }

  fn find_handler(&mut self, req: &Message) -> Option<&mut Box<dyn ResourceHandler>> {
    self.table
        .iter_mut()
        .find(|e| e.method == req.code && Self::path_matches(e.path, req))
        .map(|e| &mut e.handler)
  }

  fn cache_reply(&mut self, peer: SocketAddr, id: Id, reply: &Message) {
    let mut bytes = ArrayVec::new();
    bytes.set_len(MAX_DGRAM_LEN);
    if let Ok(n) = reply.build(&mut bytes) {
      bytes.truncate(n);
      let slot = self.next_cache_slot;
      self.reply_cache[slot] = Some(CachedReply { peer, id, bytes });
      self.next_cache_slot = (self.next_cache_slot + 1) % self.reply_cache.len();
    }
  }

  fn cached_reply(&self, peer: SocketAddr, id: Id) -> Option<Message> {
    self.reply_cache
        .iter()
        .flatten()
        .find(|c| c.peer == peer && c.id == id)
        .and_then(|c| Message::parse(&c.bytes).ok())
  }

  fn empty_ack(req: &Message) -> Message {
    Message::new(Type::Ack, Code::EMPTY, req.id, req.token)
  }

  fn reset(req: &Message) -> Message {
    Message::new(Type::Reset, Code::EMPTY, req.id, Token::empty())
  }

  fn error_reply(req: &Message, err: DispatchError) -> Message {
    let mut reply = Message::new(response_type(req.ty), err.response_code(), req.id, req.token);
    reply.set_payload(err.diagnostic().as_bytes());
    reply
  }

  /// Handle one parsed, non-duplicate-suppressed inbound message (spec
  /// section 4.8 steps 1-3f). Ping handling and unknown-critical-option
  /// rejection run before duplicate detection and handler dispatch, per
  /// RFC7252 sections 4.3 and 5.4.1.
  pub fn dispatch(&mut self, req: &Message, peer: SocketAddr, dup: &mut DuplicateDetector) -> DispatchOutcome {
    if req.ty == Type::Con && req.code.kind() == CodeKind::Empty {
      return DispatchOutcome::Reply(Self::reset(req));
    }

    if req.options.unknown_critical().is_some() {
      return match req.ty {
        | Type::Con => DispatchOutcome::Reply(Self::reset(req)),
        | _ => DispatchOutcome::Drop,
      };
    }

    if matches!(req.ty, Type::Con | Type::Non) {
      if dup.inbound_server.is_duplicate(req.id) {
        return match self.cached_reply(peer, req.id) {
          | Some(reply) => DispatchOutcome::Reply(reply),
          | None if req.ty == Type::Con => DispatchOutcome::Reply(Self::empty_ack(req)),
          | None => DispatchOutcome::Drop,
        };
      }
      dup.inbound_server.record(req.id);
    }

    let reply = match self.find_handler(req) {
      | Some(handler) => match handler.handle(req, peer) {
        | Ok(reply) => reply,
        | Err(e) => Self::error_reply(req, e),
      },
      | None => Self::error_reply(req, DispatchError::ResourceNotFound),
    };

    if matches!(req.ty, Type::Con | Type::Non) {
      self.cache_reply(peer, req.id, &reply);
    }

    DispatchOutcome::Reply(reply)
  }
}

impl Default for Dispatcher {
  fn default() -> Self {
    Self::new()
  }
}

/// A CON request gets a piggy-backed ACK response; a NON request gets a
/// NON response (RFC7252 section 5.2).
fn response_type(request_ty: Type) -> Type {
  match request_ty {
    | Type::Con => Type::Ack,
    | _ => Type::Non,
  }
}

#[cfg(test)]
mod tests {
  use no_std_net::{IpAddr, Ipv4Addr};

  use coap_msg::OptionNumber;

  use crate::config::Config;

  use super::*;

  fn addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)).into(), 5683)
  }

  struct Echo;
  impl ResourceHandler for Echo {
    fn handle(&mut self, req: &Message, _peer: SocketAddr) -> Result<Message, DispatchError> {
      let mut reply = Message::new(Type::Ack, Code::CONTENT, req.id, req.token);
      reply.set_payload(b"ok");
      Ok(reply)
    }
  }

  fn get_req(id: u16, path: &str) -> Message {
    let mut req = Message::new(Type::Con, Code::GET, Id(id), Token::from_bytes_truncating(b"t"));
    req.options.push(OptionNumber::URI_PATH, path.as_bytes());
    req
  }

  #[test]
  fn dispatches_to_matching_handler() {
    let mut d = Dispatcher::new();
    d.register(Code::GET, &["buttons"], Box::new(Echo));
    let mut dup = DuplicateDetector::new(Config::default());

    let req = get_req(1, "buttons");
    match d.dispatch(&req, addr(), &mut dup) {
      | DispatchOutcome::Reply(reply) => {
        assert_eq!(reply.code, Code::CONTENT);
        assert_eq!(reply.ty, Type::Ack);
      },
      | DispatchOutcome::Drop => panic!("expected reply"),
    }
  }

  #[test]
  fn not_found_for_unregistered_path() {
    let mut d = Dispatcher::new();
    let mut dup = DuplicateDetector::new(Config::default());
    let req = get_req(1, "nope");
    match d.dispatch(&req, addr(), &mut dup) {
      | DispatchOutcome::Reply(reply) => assert_eq!(reply.code, Code::NOT_FOUND),
      | DispatchOutcome::Drop => panic!("expected reply"),
    }
  }

  #[test]
  fn duplicate_replays_cached_reply_without_rerunning_handler() {
    let mut d = Dispatcher::new();
    d.register(Code::GET, &["buttons"], Box::new(Echo));
    let mut dup = DuplicateDetector::new(Config::default());

    let req = get_req(9, "buttons");
    d.dispatch(&req, addr(), &mut dup);

    match d.dispatch(&req, addr(), &mut dup) {
      | DispatchOutcome::Reply(reply) => {
        assert_eq!(reply.code, Code::CONTENT);
        assert_eq!(reply.id, Id(9));
      },
      | DispatchOutcome::Drop => panic!("expected replayed reply"),
    }
  }

  #[test]
  fn ping_gets_reset() {
    let mut d = Dispatcher::new();
    let mut dup = DuplicateDetector::new(Config::default());
    let ping = Message::new(Type::Con, Code::EMPTY, Id(5), Token::empty());
    match d.dispatch(&ping, addr(), &mut dup) {
      | DispatchOutcome::Reply(reply) => assert_eq!(reply.ty, Type::Reset),
      | DispatchOutcome::Drop => panic!("expected reset"),
    }
  }
}
