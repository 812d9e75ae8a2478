use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use no_std_net::SocketAddr;

use coap_msg::{Code, Message, OptionNumber, Type};

use coap_core::clock::Clock;
use coap_core::dispatch::ResourceHandler;
use coap_core::error::DispatchError;
use coap_core::observe::ObserveRegistry;

/// Live state of the three physical buttons, updated by whatever reads the
/// hardware and shared with the notification trigger (spec section 4.9:
/// `buttons` resource, and section 6's notification input).
pub type ButtonState = Rc<RefCell<[bool; 3]>>;

/// `GET /buttons` (observable) - spec section 4.9.
pub struct Buttons<C: Clock> {
  state: ButtonState,
  registry: Rc<RefCell<ObserveRegistry>>,
  clock: C,
}

impl<C: Clock> Buttons<C> {
  pub fn new(state: ButtonState, registry: Rc<RefCell<ObserveRegistry>>, clock: C) -> Self {
    Self { state, registry, clock }
  }
}

/// Format as `BTN1=b,BTN2=b,BTN3=b`.
pub fn format_state(state: &[bool; 3]) -> String {
  let mut out = String::new();
  for (i, &on) in state.iter().enumerate() {
    if i > 0 {
      out.push(',');
    }
    write!(out, "BTN{}={}", i + 1, on as u8).unwrap();
  }
  out
}

impl<C: Clock> ResourceHandler for Buttons<C> {
  fn handle(&mut self, req: &Message, peer: SocketAddr) -> Result<Message, DispatchError> {
    let mut reply = Message::new(Type::Ack, Code::CONTENT, req.id, req.token);

    match req.options.get_uint(OptionNumber::OBSERVE) {
      | Some(0) => {
        self.registry
            .borrow_mut()
            .register(self.clock.now_ms(), peer, req.token)
            .map_err(|_| DispatchError::BadRequest)?;
        reply.options.push_uint(OptionNumber::OBSERVE, 0);
      },
      | Some(1) => {
        self.registry.borrow_mut().deregister(peer, req.token);
      },
      | _ => {
        reply.set_payload(format_state(&self.state.borrow()).as_bytes());
      },
    }

    Ok(reply)
  }
}
