//! Runs a CoAP server exposing `/buttons` (observable), `/actuators`, and
//! `/file` on UDP port 5683, backed by files under `./data`. Button
//! presses (spec section 6's "notification trigger" input) are simulated
//! from stdin: a line `byte <0-255>` or `text <...>` pushes a notification
//! to every `/buttons` subscriber.

use std::cell::RefCell;
use std::io::BufRead;
use std::net::UdpSocket;
use std::rc::Rc;
use std::sync::mpsc;

use log::{info, warn};

use coap_core::config::Config;
use coap_core::dispatch::Dispatcher;
use coap_core::net::Socket;
use coap_core::observe::ObserveRegistry;
use coap_msg::Code;

use coap_endpoint::resources::actuators::{Actuators, ActuatorsHandler};
use coap_endpoint::resources::buttons::{Buttons, ButtonState};
use coap_endpoint::resources::file::FileResource;
use coap_endpoint::server::Endpoint;
use coap_endpoint::std_clock::SystemClock;
use coap_endpoint::std_fs::DirFs;

fn main() {
  simple_logger::init_with_level(log::Level::Info).expect("logger already initialized");

  let data_dir = std::env::var("COAP_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
  std::fs::create_dir_all(&data_dir).expect("create data directory");

  let socket = UdpSocket::bind("0.0.0.0:5683").expect("bind UDP socket");
  info!("listening on {}", Socket::local_addr(&socket));

  let clock = SystemClock::new();
  let config = Config::default();

  let button_state: ButtonState = Rc::new(RefCell::new([false; 3]));
  let actuator_state = Rc::new(RefCell::new(Actuators::default()));
  let observe = Rc::new(RefCell::new(ObserveRegistry::new(config)));
  let fs = Rc::new(RefCell::new(DirFs::new(data_dir)));

  let mut dispatcher = Dispatcher::new();
  dispatcher.register(Code::GET,
                       &["buttons"],
                       Box::new(Buttons::new(button_state, observe.clone(), clock.clone())));
  dispatcher.register(Code::GET, &["actuators"], Box::new(ActuatorsHandler::new(actuator_state.clone())));
  dispatcher.register(Code::PUT, &["actuators"], Box::new(ActuatorsHandler::new(actuator_state)));
  dispatcher.register(Code::GET,
                       &["file"],
                       Box::new(FileResource::new(fs.clone(), "file.txt", "file.img", config)));
  dispatcher.register(Code::IPATCH,
                       &["file"],
                       Box::new(FileResource::new(fs.clone(), "file.txt", "file.img", config)));
  dispatcher.register(Code::FETCH, &["file"], Box::new(FileResource::new(fs, "file.txt", "file.img", config)));

  let mut endpoint = Endpoint::new(socket, clock, config, dispatcher, observe, 0xC0A9);

  let triggers = spawn_stdin_trigger_reader();
  loop {
    endpoint.poll_once();
    endpoint.tick();
    while let Ok(trigger) = triggers.try_recv() {
      match trigger {
        | Trigger::Byte(b) => endpoint.notify_byte("buttons", b),
        | Trigger::Text(t) => endpoint.notify_text("buttons", &t),
      }
    }
  }
}

/// A parsed line of simulated hardware trigger input (spec section 6).
enum Trigger {
  Byte(u8),
  Text(String),
}

/// `Endpoint` holds a raw socket and isn't `Send`, so trigger input is read
/// from stdin on its own thread and handed to the main loop over a
/// channel rather than calling `notify_byte`/`notify_text` directly.
fn spawn_stdin_trigger_reader() -> mpsc::Receiver<Trigger> {
  let (tx, rx) = mpsc::channel();
  std::thread::spawn(move || {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
      let Ok(line) = line else { break };
      let line = line.trim();
      let trigger = match line.split_once(' ') {
        | Some(("byte", rest)) => rest.trim().parse().ok().map(Trigger::Byte),
        | Some(("text", rest)) => Some(Trigger::Text(rest.to_string())),
        | _ => {
          if !line.is_empty() {
            warn!("unrecognized trigger line: {:?}", line);
          }
          None
        },
      };
      if let Some(trigger) = trigger {
        if tx.send(trigger).is_err() {
          break;
        }
      }
    }
  });
  rx
}
