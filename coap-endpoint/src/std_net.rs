use std::io;
use std::net::UdpSocket;

use no_std_net::{SocketAddr, ToSocketAddrs};

use coap_core::net::{Addrd, Socket};

use crate::convert::{io_to_nb, to_no_std, to_std};

impl Socket for UdpSocket {
  type Error = io::Error;

  fn local_addr(&self) -> SocketAddr {
    to_no_std(UdpSocket::local_addr(self).expect("socket bound to a local address"))
  }

  fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error> {
    let addrs: Vec<std::net::SocketAddr> =
      addr.to_socket_addrs().ok().into_iter().flatten().map(to_std).collect();
    let sock = UdpSocket::bind(addrs.as_slice())?;
    sock.set_nonblocking(true)?;
    Ok(sock)
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.send_to(msg.data(), to_std(msg.addr())).map(|_| ()).map_err(io_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    self.recv_from(buffer).map(|(n, addr)| Addrd(n, to_no_std(addr))).map_err(io_to_nb)
  }
}
