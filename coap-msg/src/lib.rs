//! CoAP (RFC 7252) message wire format.
//!
//! This crate knows nothing about sockets, clocks, or files - it only
//! encodes and decodes the bytes that travel on the wire, per
//! [RFC7252 section 3](https://datatracker.ietf.org/doc/html/rfc7252#section-3).

#![deny(missing_debug_implementations)]

mod code;
mod error;
mod message;
mod option;
mod token;
mod ty;

pub use code::{Code, CodeKind};
pub use error::{BuildError, ParseError};
pub use message::Message;
pub use option::{Block2, ContentFormat, Opt, OptionNumber, OptionSet};
pub use token::Token;
pub use ty::Type;

/// Message ID: a 16-bit value used to match ACK/RST to CON/NON and to
/// detect duplicates (RFC7252 section 4).
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Id(pub u16);

impl Id {
  pub fn from_be_bytes(bs: [u8; 2]) -> Self {
    Self(u16::from_be_bytes(bs))
  }

  pub fn to_be_bytes(self) -> [u8; 2] {
    self.0.to_be_bytes()
  }
}
