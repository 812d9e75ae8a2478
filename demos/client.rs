//! A minimal interactive client: `coap-client <get|observe|put|fetch|ipatch> <host:port> [args...]`.

use std::env;
use std::net::UdpSocket;
use std::time::Duration;

use log::info;

use coap_core::ids::IdGenerator;
use coap_core::net::{Addrd, Socket};
use coap_msg::{Block2, Code, Message, OptionNumber, Token, Type};

fn usage() -> ! {
  eprintln!("usage: coap-client <get|observe|put|fetch|ipatch> <host:port> [payload]");
  std::process::exit(2);
}

fn main() {
  simple_logger::init_with_level(log::Level::Info).expect("logger already initialized");

  let args: Vec<String> = env::args().collect();
  if args.len() < 3 {
    usage();
  }
  let command = args[1].as_str();
  let target = &args[2];
  let payload = args.get(3).map(String::as_str).unwrap_or("");

  let socket = UdpSocket::bind("0.0.0.0:0").expect("bind ephemeral UDP socket");
  socket.set_read_timeout(Some(Duration::from_secs(5))).expect("set read timeout");

  let peer: no_std_net::SocketAddr =
    target.parse().unwrap_or_else(|_| panic!("invalid socket address: {}", target));

  let seed = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH)
                                          .unwrap()
                                          .as_nanos() as u64;
  let mut ids = IdGenerator::new(seed);

  match command {
    | "get" => send_and_print(&socket, peer, Code::GET, &["buttons"], &[], &[], &mut ids),
    | "observe" => observe_forever(&socket, peer, &mut ids),
    | "put" => send_and_print(&socket, peer, Code::PUT, &["actuators"], &[], payload.as_bytes(), &mut ids),
    | "fetch" => {
      let opts = vec![(OptionNumber::CONTENT_FORMAT, 0u32)];
      send_and_print(&socket, peer, Code::FETCH, &["file"], &opts, payload.as_bytes(), &mut ids);
    },
    | "ipatch" => send_and_print(&socket, peer, Code::IPATCH, &["file"], &[], payload.as_bytes(), &mut ids),
    | "download" => download_file(&socket, peer, &mut ids),
    | _ => usage(),
  }
}

fn send_and_print(socket: &UdpSocket,
                   peer: no_std_net::SocketAddr,
                   code: Code,
                   path: &[&str],
                   opts: &[(u16, u32)],
                   payload: &[u8],
                   ids: &mut IdGenerator) {
  let mut req = Message::new(Type::Con, code, ids.next_id(), ids.next_token());
  for seg in path {
    req.options.push(OptionNumber::URI_PATH, seg.as_bytes());
  }
  for (number, value) in opts {
    req.options.push_uint(*number, *value);
  }
  req.set_payload(payload);

  let mut buf = [0u8; coap_core::net::MAX_DGRAM_LEN];
  let n = req.build(&mut buf).expect("request fits in one datagram");
  Socket::send(socket, Addrd(&buf[..n], peer)).expect("send request");

  let mut reply_buf = [0u8; coap_core::net::MAX_DGRAM_LEN];
  match Socket::recv(socket, &mut reply_buf) {
    | Ok(Addrd(n, _)) => match Message::parse(&reply_buf[..n]) {
      | Ok(reply) => info!("{:?} {}", reply.code, String::from_utf8_lossy(&reply.payload)),
      | Err(e) => eprintln!("malformed reply: {:?}", e),
    },
    | Err(e) => eprintln!("no reply: {:?}", e),
  }
}

/// Register once with `Observe=0`, ACK the first notification, then print
/// every subsequent push until the server goes silent.
fn observe_forever(socket: &UdpSocket, peer: no_std_net::SocketAddr, ids: &mut IdGenerator) -> ! {
  let token = ids.next_token();
  let mut req = Message::new(Type::Con, Code::GET, ids.next_id(), token);
  req.options.push(OptionNumber::URI_PATH, b"buttons");
  req.options.push_uint(OptionNumber::OBSERVE, 0);

  let mut buf = [0u8; coap_core::net::MAX_DGRAM_LEN];
  let n = req.build(&mut buf).expect("request fits in one datagram");
  Socket::send(socket, Addrd(&buf[..n], peer)).expect("send registration");

  loop {
    let mut reply_buf = [0u8; coap_core::net::MAX_DGRAM_LEN];
    let Addrd(n, _) = Socket::recv(socket, &mut reply_buf).expect("receive notification");
    let notification = Message::parse(&reply_buf[..n]).expect("parse notification");
    info!("seq={:?} {}",
          notification.options.get_uint(OptionNumber::OBSERVE),
          String::from_utf8_lossy(&notification.payload));

    if notification.ty == Type::Con {
      let ack = Message::new(Type::Ack, Code::EMPTY, notification.id, Token::empty());
      let mut ack_buf = [0u8; coap_core::net::MAX_DGRAM_LEN];
      let n = ack.build(&mut ack_buf).expect("ack fits in one datagram");
      Socket::send(socket, Addrd(&ack_buf[..n], peer)).expect("send ack");
    }
  }
}

fn download_file(socket: &UdpSocket, peer: no_std_net::SocketAddr, ids: &mut IdGenerator) {
  let mut num = 0u32;
  let mut file = Vec::new();
  loop {
    let mut req = Message::new(Type::Con, Code::GET, ids.next_id(), ids.next_token());
    req.options.push(OptionNumber::URI_PATH, b"file");
    req.options.push_uint(OptionNumber::BLOCK2, Block2::new(num, false, 6).to_uint());

    let mut buf = [0u8; coap_core::net::MAX_DGRAM_LEN];
    let n = req.build(&mut buf).expect("request fits in one datagram");
    Socket::send(socket, Addrd(&buf[..n], peer)).expect("send request");

    let mut reply_buf = [0u8; coap_core::net::MAX_DGRAM_LEN];
    let Addrd(n, _) = Socket::recv(socket, &mut reply_buf).expect("receive block");
    let reply = Message::parse(&reply_buf[..n]).expect("parse block reply");
    file.extend_from_slice(&reply.payload);

    let more = reply.options
                     .get_uint(OptionNumber::BLOCK2)
                     .map(Block2::from_uint)
                     .map(|b| b.more())
                     .unwrap_or(false);
    if !more {
      break;
    }
    num += 1;
  }
  info!("downloaded {} bytes", file.len());
}
