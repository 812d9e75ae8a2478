//! `std::net::SocketAddr` <-> `no_std_net::SocketAddr` conversion and
//! `io::Error` <-> `nb::Error` mapping, grounded on `toad::std::net::convert`.

use std::io;
use std::net::{IpAddr as StdIpAddr, SocketAddr as StdSocketAddr};

use no_std_net::{IpAddr as NoStdIpAddr, SocketAddr as NoStdSocketAddr};

pub(crate) fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

pub(crate) fn to_no_std(addr: StdSocketAddr) -> NoStdSocketAddr {
  let ip = match addr.ip() {
    | StdIpAddr::V4(v4) => NoStdIpAddr::V4(v4.octets().into()),
    | StdIpAddr::V6(v6) => NoStdIpAddr::V6(v6.segments().into()),
  };
  NoStdSocketAddr::new(ip, addr.port())
}

pub(crate) fn to_std(addr: NoStdSocketAddr) -> StdSocketAddr {
  let ip = match addr.ip() {
    | NoStdIpAddr::V4(v4) => StdIpAddr::V4(v4.octets().into()),
    | NoStdIpAddr::V6(v6) => StdIpAddr::V6(v6.segments().into()),
  };
  StdSocketAddr::new(ip, addr.port())
}
