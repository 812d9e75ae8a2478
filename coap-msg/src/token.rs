use tinyvec::ArrayVec;

/// 0-8 opaque bytes correlating a response with a request across multiple
/// Message IDs (needed for Observe and delayed responses).
///
/// See [RFC7252 section 5.3.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.3.1).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  pub fn empty() -> Self {
    Self(ArrayVec::new())
  }

  /// Build a token from a byte slice, truncating to 8 bytes.
  ///
  /// RFC7252 bounds tokens to 8 bytes; rather than silently truncate a
  /// caller-supplied token this is reserved for trusted construction paths
  /// (e.g. generating our own tokens). Parsing a token from the wire
  /// (`Message::parse`) rejects `TKL > 8` instead - see [`ParseError`](crate::ParseError).
  pub fn from_bytes_truncating(bytes: &[u8]) -> Self {
    let mut v = ArrayVec::new();
    v.extend_from_slice(&bytes[..bytes.len().min(8)]);
    Self(v)
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl From<&[u8]> for Token {
  fn from(bytes: &[u8]) -> Self {
    Self::from_bytes_truncating(bytes)
  }
}
