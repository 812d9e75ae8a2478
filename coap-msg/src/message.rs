use tinyvec::ArrayVec;

use crate::option::OptionSet;
use crate::{BuildError, Code, Id, ParseError, Token, Type};

/// Maximum message size this endpoint will encode or decode, matching the
/// IPv4/IPv6 path-MTU-safe datagram size `toad` uses for its own `Dgram`
/// buffers.
pub const MAX_MESSAGE_LEN: usize = 1152;

/// Maximum payload this endpoint will hold in memory, used for the
/// non-block-wise fast path. Larger bodies go through
/// `coap-core`'s block-wise transfer instead of this single buffer.
pub const MAX_PAYLOAD_LEN: usize = 1024;

/// A fully decoded (or not-yet-encoded) CoAP message (RFC7252 section 3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
  pub ty: Type,
  pub code: Code,
  pub id: Id,
  pub token: Token,
  pub options: OptionSet,
  pub payload: ArrayVec<[u8; MAX_PAYLOAD_LEN]>,
}

impl Message {
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { ty, code, id, token, options: OptionSet::new(), payload: ArrayVec::new() }
  }

  pub fn set_payload(&mut self, bytes: &[u8]) {
    self.payload.clear();
    self.payload.extend_from_slice(&bytes[..bytes.len().min(self.payload.capacity())]);
  }

  /// Decode a message from its wire representation.
  ///
  /// Layout (RFC7252 section 3):
  /// ```text
  ///  0                   1                   2                   3
  ///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
  /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  /// |Ver| T |  TKL  |      Code     |          Message ID          |
  /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  /// |   Token (if any, TKL bytes) ...
  /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  /// |   Options (if any) ...
  /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  /// |1 1 1 1 1 1 1 1|    Payload (if any) ...
  /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  /// ```
  pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
    if bytes.len() < 4 {
      return Err(ParseError::Truncated);
    }

    let byte0 = bytes[0];
    let ver = byte0 >> 6;
    if ver != 1 {
      return Err(ParseError::BadFormat(byte0));
    }
    let ty = Type::try_from_bits((byte0 >> 4) & 0b11)?;
    let tkl = byte0 & 0b1111;
    if tkl > 8 {
      return Err(ParseError::BadTokenLength(tkl));
    }

    let code = Code::from(bytes[1]);
    let id = Id::from_be_bytes([bytes[2], bytes[3]]);

    let mut pos = 4usize;
    let token_bytes = bytes.get(pos..pos + tkl as usize).ok_or(ParseError::Truncated)?;
    let token = Token::from_bytes_truncating(token_bytes);
    pos += tkl as usize;

    let options = OptionSet::decode(bytes, &mut pos)?;

    let mut payload = ArrayVec::new();
    if bytes.get(pos) == Some(&0xFF) {
      pos += 1;
      let rest = &bytes[pos..];
      if rest.is_empty() {
        return Err(ParseError::EmptyPayloadAfterMarker);
      }
      payload.extend_from_slice(&rest[..rest.len().min(payload.capacity())]);
    }

    Ok(Self { ty, code, id, token, options, payload })
  }

  /// Encode this message into `buf`, returning the number of bytes
  /// written. The payload marker `0xFF` is only emitted when the payload
  /// is non-empty (RFC7252 section 3: "a message with no payload has no
  /// marker").
  pub fn build(&self, buf: &mut [u8]) -> Result<usize, BuildError> {
    let mut out: ArrayVec<[u8; MAX_MESSAGE_LEN]> = ArrayVec::new();

    let byte0 = (1 << 6) | (self.ty.bits() << 4) | (self.token.len() as u8);
    out.push(byte0);
    out.push(self.code.into());
    out.extend_from_slice(&self.id.to_be_bytes());
    out.extend_from_slice(self.token.as_bytes());

    self.options.encode(&mut out);

    if !self.payload.is_empty() {
      out.push(0xFF);
      out.extend_from_slice(&self.payload);
    }

    if out.len() > buf.len() {
      return Err(BuildError::BufferTooSmall);
    }
    buf[..out.len()].copy_from_slice(&out);
    Ok(out.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::option::OptionNumber;

  #[test]
  fn roundtrip_request_with_options_and_payload() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(0x1234), Token::from_bytes_truncating(&[0xAB, 0xCD]));
    msg.options.push(OptionNumber::URI_PATH, b"file");
    msg.options.push_uint(OptionNumber::CONTENT_FORMAT, 42);
    msg.set_payload(b"hello");

    let mut buf = [0u8; 64];
    let n = msg.build(&mut buf).unwrap();

    let decoded = Message::parse(&buf[..n]).unwrap();
    assert_eq!(decoded, msg);
  }

  #[test]
  fn no_payload_marker_when_empty() {
    let msg = Message::new(Type::Con, Code::GET, Id(1), Token::empty());
    let mut buf = [0u8; 16];
    let n = msg.build(&mut buf).unwrap();
    assert!(!buf[..n].contains(&0xFF));
  }

  #[test]
  fn rejects_bad_version() {
    let bytes = [0b0010_0000, 0, 0, 0];
    assert_eq!(Message::parse(&bytes), Err(ParseError::BadFormat(0b0010_0000)));
  }

  #[test]
  fn rejects_truncated_header() {
    assert_eq!(Message::parse(&[0x40, 0x01]), Err(ParseError::Truncated));
  }

  #[test]
  fn rejects_truncated_token() {
    // TKL=4 but no token bytes follow.
    let bytes = [0b0100_0100, 0x01, 0, 0];
    assert_eq!(Message::parse(&bytes), Err(ParseError::Truncated));
  }

  #[test]
  fn rejects_payload_marker_with_no_payload() {
    // TKL=0, no options, then a bare marker byte and nothing after it.
    let bytes = [0b0100_0000, 0x01, 0, 0, 0xFF];
    assert_eq!(Message::parse(&bytes), Err(ParseError::EmptyPayloadAfterMarker));
  }

  #[test]
  fn buffer_too_small_on_build() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::empty());
    msg.set_payload(&[0u8; 32]);
    let mut buf = [0u8; 4];
    assert_eq!(msg.build(&mut buf), Err(BuildError::BufferTooSmall));
  }

  #[test]
  fn empty_message_is_ping() {
    let msg = Message::new(Type::Con, Code::EMPTY, Id(7), Token::empty());
    assert_eq!(msg.code.kind(), crate::CodeKind::Empty);
    let mut buf = [0u8; 8];
    let n = msg.build(&mut buf).unwrap();
    assert_eq!(Message::parse(&buf[..n]).unwrap(), msg);
  }
}
