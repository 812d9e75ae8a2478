/// Failures that can occur while decoding a message from the wire.
///
/// See spec section 4.1 ("Codec"): every malformed-input case the decoder
/// can hit maps to one of these variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
  /// Version field was not `1` (RFC7252 section 3), or an otherwise
  /// malformed fixed header. Carries the offending byte/value for logging.
  BadFormat(u8),
  /// TKL nibble named a token length outside `0..=8` (RFC7252 section 3).
  BadTokenLength(u8),
  /// Option delta nibble/extended-delta field was malformed (reserved
  /// value `15`, or delta overflowed `u16`).
  BadOptionDelta,
  /// Option length nibble/extended-length field used the reserved value
  /// `15`.
  BadOptionLength,
  /// Fewer bytes were available than the header, token length, or an
  /// option/payload length declared.
  Truncated,
  /// The payload marker `0xFF` was present but no payload bytes followed it
  /// (RFC7252 section 3: the marker is present iff a payload is present).
  EmptyPayloadAfterMarker,
  /// The message carried more options than this endpoint is willing to
  /// hold (see `coap_msg::option::MAX_OPTIONS`).
  TooManyOptions,
}

/// Failures that can occur while encoding a message to a caller-supplied
/// buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
  /// The destination buffer is too small to hold the encoded message.
  BufferTooSmall,
}
