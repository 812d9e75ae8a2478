use std::cell::RefCell;
use std::rc::Rc;

use coap_core::clock::Clock;
use coap_core::config::Config;
use coap_core::dispatch::{DispatchOutcome, Dispatcher};
use coap_core::duplicate::DuplicateDetector;
use coap_core::net::{Addrd, Socket, MAX_DGRAM_LEN};
use coap_core::observe::ObserveRegistry;
use coap_core::reliability::{ReliabilityEngine, RetransmitFailure};
use coap_msg::Message;
use log::{debug, warn};

use crate::resources::buttons::format_state;
use crate::trigger::Notifier;

/// A cooperative, single-threaded CoAP endpoint: one inbound datagram is
/// fully parsed, dispatched, and replied to before the next is read (spec
/// section 5 - no worker pool, no cross-request mutable-state races by
/// construction).
///
/// The Observe registry is shared (`Rc<RefCell<_>>`) with whichever
/// resource handlers register/deregister subscribers - the endpoint only
/// drives its liveness bookkeeping and notification fan-out.
pub struct Endpoint<S: Socket, C: Clock> {
  socket: S,
  clock: C,
  dispatcher: Dispatcher,
  dup: DuplicateDetector,
  reliability: ReliabilityEngine,
  observe: Rc<RefCell<ObserveRegistry>>,
  notifier: Notifier,
  last_tick_ms: u64,
  tick_interval_ms: u64,
}

/// Charges the matching subscriber a strike when one of their
/// notifications is never ACKed (spec section 4.3 meets 4.7).
struct SubscriberStrikes<'a>(&'a Rc<RefCell<ObserveRegistry>>);

impl RetransmitFailure for SubscriberStrikes<'_> {
  fn on_retransmit_failure(&mut self, id: coap_msg::Id, peer: no_std_net::SocketAddr) {
    warn!("notification {:?} to {} never acked, charging a strike", id, peer);
    self.0.borrow_mut().charge_strike(peer);
  }
}

impl<S: Socket, C: Clock> Endpoint<S, C> {
  pub fn new(socket: S,
             clock: C,
             config: Config,
             dispatcher: Dispatcher,
             observe: Rc<RefCell<ObserveRegistry>>,
             seed: u64)
             -> Self {
    let now = clock.now_ms();
    Self { socket,
           clock,
           dispatcher,
           dup: DuplicateDetector::new(config),
           reliability: ReliabilityEngine::new(config),
           observe,
           notifier: Notifier::new(seed),
           last_tick_ms: now,
           tick_interval_ms: 5_000 }
  }

  /// Read and answer exactly one inbound datagram, if any is ready.
  /// Returns `true` if a datagram was processed.
  pub fn poll_once(&mut self) -> bool {
    let mut buf = [0u8; MAX_DGRAM_LEN];
    let Addrd(n, peer) = match self.socket.recv(&mut buf) {
      | Ok(d) => d,
      | Err(nb::Error::WouldBlock) => return false,
      | Err(nb::Error::Other(e)) => {
        warn!("socket error on recv: {:?}", e);
        return false;
      },
    };

    let req = match Message::parse(&buf[..n]) {
      | Ok(req) => req,
      | Err(e) => {
        debug!("dropping malformed datagram from {}: {:?}", peer, e);
        return true;
      },
    };

    if req.ty == coap_msg::Type::Ack {
      self.reliability.clear(req.id);
      self.observe.borrow_mut().on_ack(self.clock.now_ms(), peer);
      return true;
    }
    if req.ty == coap_msg::Type::Reset {
      self.reliability.clear(req.id);
      return true;
    }

    match self.dispatcher.dispatch(&req, peer, &mut self.dup) {
      | DispatchOutcome::Reply(reply) => self.send(&reply, peer),
      | DispatchOutcome::Drop => {},
    }

    true
  }

  fn send(&self, msg: &Message, peer: no_std_net::SocketAddr) {
    let mut buf = [0u8; MAX_DGRAM_LEN];
    match msg.build(&mut buf) {
      | Ok(n) => {
        if let Err(e) = nb::block!(self.socket.send(Addrd(&buf[..n], peer))) {
          warn!("socket error on send to {}: {:?}", peer, e);
        }
      },
      | Err(e) => warn!("reply to {} did not fit in the datagram buffer: {:?}", peer, e),
    }
  }

  /// Drive periodic housekeeping. Retransmission runs on every call - the
  /// ACK timeout schedule (spec section 4.3: first retry at ~2s) is far
  /// finer-grained than subscriber pruning, so gating it behind the same
  /// interval as `prune` would quantize retransmit timing onto that
  /// coarser grid. Only Observe liveness pruning is rate-limited by
  /// `tick_interval_ms`, since it doesn't need sub-second resolution.
  pub fn tick(&mut self) {
    let now = self.clock.now_ms();

    let socket = &self.socket;
    let mut strikes = SubscriberStrikes(&self.observe);
    self.reliability.tick(now,
                           |dgram| {
                             if let Err(e) = nb::block!(socket.send(dgram)) {
                               warn!("retransmit failed: {:?}", e);
                             }
                           },
                           &mut strikes);

    if now.saturating_sub(self.last_tick_ms) < self.tick_interval_ms {
      return;
    }
    self.last_tick_ms = now;

    self.observe.borrow_mut().prune(now);
  }

  /// Push `payload` to every current subscriber as a confirmable
  /// notification (spec section 4.7 / 6's hardware-trigger interface).
  pub fn notify_subscribers(&mut self, payload: &[u8]) {
    let now = self.clock.now_ms();
    let datagrams =
      self.notifier.notify(now, &mut self.observe.borrow_mut(), &mut self.reliability, payload);
    for Addrd(bytes, peer) in datagrams {
      if let Err(e) = nb::block!(self.socket.send(Addrd(&bytes, peer))) {
        warn!("notification send failed for {}: {:?}", peer, e);
      }
    }
  }

  /// External trigger: a one-byte hardware reading changed on `resource`
  /// (spec section 6: `notify_byte(resource, byte)`). For `"buttons"`,
  /// bits 0-2 of `byte` are BTN1-BTN3 and the broadcast payload matches
  /// `GET /buttons`'s own `BTN1=b,BTN2=b,BTN3=b` formatting. Unrecognized
  /// resources are logged and dropped.
  pub fn notify_byte(&mut self, resource: &str, byte: u8) {
    if resource != "buttons" {
      warn!("notify_byte: unrecognized resource {:?}", resource);
      return;
    }
    let state = [byte & 0b001 != 0, byte & 0b010 != 0, byte & 0b100 != 0];
    self.notify_subscribers(format_state(&state).as_bytes());
  }

  /// External trigger: a short ASCII string changed on `resource` (spec
  /// section 6: `notify_text(resource, text)`).
  pub fn notify_text(&mut self, resource: &str, text: &str) {
    if resource != "buttons" {
      warn!("notify_text: unrecognized resource {:?}", resource);
      return;
    }
    self.notify_subscribers(text.as_bytes());
  }

  /// Run forever, answering requests and ticking housekeeping, with no
  /// external trigger input. Library users that need `notify_byte`/
  /// `notify_text` (spec section 6) should drive [`poll_once`]/[`tick`]
  /// from their own loop instead, as `demos/server.rs` does.
  pub fn run_forever(&mut self) -> ! {
    loop {
      self.poll_once();
      self.tick();
    }
  }
}
