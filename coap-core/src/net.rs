use core::fmt::Debug;

use no_std_net::{SocketAddr, ToSocketAddrs};
use tinyvec::ArrayVec;

/// Maximum datagram size this endpoint sends or receives: one 1024-byte
/// block plus header/option/token overhead (spec section 5: "Scratch
/// buffer... sized to the maximum response (1536 bytes)").
pub const MAX_DGRAM_LEN: usize = 1536;

/// Bytes received from, or to be sent to, a peer endpoint.
pub type Dgram = ArrayVec<[u8; MAX_DGRAM_LEN]>;

/// Data paired with the peer address it came from or is going to.
///
/// Every inbound datagram and outbound reply threads through one of these
/// so peer identity survives handler dispatch (used to key subscribers and
/// retransmission slots by `(peer, token)` / `(peer, msg_id)`).
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  pub fn unwrap(self) -> T {
    self.0
  }

  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  pub fn map_with_addr<R>(self, f: impl FnOnce(T, SocketAddr) -> R) -> Addrd<R> {
    Addrd(f(self.0, self.1), self.1)
  }

  pub fn data(&self) -> &T {
    &self.0
  }

  pub fn data_mut(&mut self) -> &mut T {
    &mut self.0
  }

  pub fn addr(&self) -> SocketAddr {
    self.1
  }

  pub fn fold<R>(self, f: impl FnOnce(T, SocketAddr) -> R) -> R {
    f(self.0, self.1)
  }
}

/// A CoAP network socket: send/receive complete datagrams to/from a peer.
///
/// Mirrors `embedded-nal`'s UDP socket traits closely enough to be
/// implementable for foreign types like `std::net::UdpSocket`, while
/// allowing non-blocking polling via `nb::Result`.
pub trait Socket: Sized {
  type Error: Debug;

  fn local_addr(&self) -> SocketAddr;

  fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error>;

  /// Send a datagram to the address it is paired with.
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Pull the next datagram off the socket, along with the sender's
  /// address. Returns `WouldBlock` if nothing is buffered.
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test {
  use std::cell::RefCell;
  use std::collections::VecDeque;

  use super::*;

  /// An in-memory `Socket` double: every `send` is captured, and `recv`
  /// drains a queue seeded by the test, modeled on `toad`'s own test
  /// sockets.
  #[derive(Debug, Default)]
  pub struct FakeSocket {
    pub addr: Option<SocketAddr>,
    pub sent: RefCell<Vec<Addrd<Vec<u8>>>>,
    pub inbound: RefCell<VecDeque<Addrd<Vec<u8>>>>,
  }

  impl FakeSocket {
    pub fn new(addr: SocketAddr) -> Self {
      Self { addr: Some(addr), sent: RefCell::new(Vec::new()), inbound: RefCell::new(VecDeque::new()) }
    }

    pub fn push_inbound(&self, dgram: Addrd<Vec<u8>>) {
      self.inbound.borrow_mut().push_back(dgram);
    }
  }

  impl Socket for FakeSocket {
    type Error = core::convert::Infallible;

    fn local_addr(&self) -> SocketAddr {
      self.addr.unwrap()
    }

    fn bind<A: ToSocketAddrs>(_addr: A) -> Result<Self, Self::Error> {
      unimplemented!("FakeSocket is constructed directly in tests")
    }

    fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
      self.sent.borrow_mut().push(msg.map(|b| b.to_vec()));
      Ok(())
    }

    fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
      match self.inbound.borrow_mut().pop_front() {
        | Some(Addrd(bytes, addr)) => {
          let n = bytes.len().min(buffer.len());
          buffer[..n].copy_from_slice(&bytes[..n]);
          Ok(Addrd(n, addr))
        },
        | None => Err(nb::Error::WouldBlock),
      }
    }
  }
}
