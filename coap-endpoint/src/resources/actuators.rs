use std::cell::RefCell;
use std::rc::Rc;

use no_std_net::SocketAddr;

use coap_msg::{Code, Message, Type};

use coap_core::dispatch::ResourceHandler;
use coap_core::error::DispatchError;

/// Live LED/buzzer state, shared with whatever drives the real hardware.
pub type ActuatorState = Rc<RefCell<Actuators>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Actuators {
  pub led: bool,
  pub buzzer: bool,
}

/// `GET`/`PUT /actuators` - spec section 4.9.
pub struct ActuatorsHandler {
  state: ActuatorState,
}

impl ActuatorsHandler {
  pub fn new(state: ActuatorState) -> Self {
    Self { state }
  }
}

fn format_state(s: Actuators) -> String {
  format!("LED={},BUZZER={}", if s.led { "ON" } else { "OFF" }, if s.buzzer { "ON" } else { "OFF" })
}

/// Apply every `LED=ON|OFF`/`BUZZER=ON|OFF` directive found in `payload` as
/// a substring match (spec section 4.9). Each directive sets its state
/// exactly once - no spurious toggle (spec section 9, Design Note 4).
fn apply_directives(state: &mut Actuators, payload: &str) {
  if payload.contains("LED=ON") {
    state.led = true;
  } else if payload.contains("LED=OFF") {
    state.led = false;
  }

  if payload.contains("BUZZER=ON") {
    state.buzzer = true;
  } else if payload.contains("BUZZER=OFF") {
    state.buzzer = false;
  }
}

impl ResourceHandler for ActuatorsHandler {
  fn handle(&mut self, req: &Message, _peer: SocketAddr) -> Result<Message, DispatchError> {
    match req.code {
      | Code::GET => {
        let mut reply = Message::new(Type::Ack, Code::CONTENT, req.id, req.token);
        reply.set_payload(format_state(*self.state.borrow()).as_bytes());
        Ok(reply)
      },
      | Code::PUT => {
        if req.payload.is_empty() {
          return Err(DispatchError::BadRequest);
        }
        let text = String::from_utf8_lossy(&req.payload);
        apply_directives(&mut self.state.borrow_mut(), &text);

        let mut reply = Message::new(Type::Ack, Code::CHANGED, req.id, req.token);
        reply.set_payload(b"OK");
        Ok(reply)
      },
      | _ => Err(DispatchError::ResourceNotFound),
    }
  }
}
