use coap_msg::Code;

/// Error taxonomy for request handling (spec section 7). Each variant maps
/// to exactly one CoAP response behavior via [`DispatchError::response_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
  /// No endpoint matched the request's method + URI path.
  ResourceNotFound,
  /// Missing payload, malformed FETCH range, or empty PUT body.
  BadRequest,
  /// FETCH with no Content-Format option at all (spec section 8 scenario
  /// 4: distinct from `UnsupportedContentFormat` - a present-but-wrong
  /// value gets 4.15, an absent one gets 4.00).
  ContentFormatRequired,
  /// FETCH with a Content-Format option present but not text/plain (0).
  UnsupportedContentFormat,
  /// File open/read/write failure.
  ServiceUnavailable,
  /// The response could not fit in the scratch buffer.
  BufferFull,
}

impl DispatchError {
  /// The CoAP response code this error is reported with, per spec section 7.
  pub fn response_code(self) -> Code {
    match self {
      | DispatchError::ResourceNotFound => Code::NOT_FOUND,
      | DispatchError::BadRequest | DispatchError::BufferFull | DispatchError::ContentFormatRequired => {
        Code::BAD_REQUEST
      },
      | DispatchError::UnsupportedContentFormat => Code::UNSUPPORTED_CONTENT_FORMAT,
      | DispatchError::ServiceUnavailable => Code::SERVICE_UNAVAILABLE,
    }
  }

  /// A short diagnostic body to send alongside the response code, per the
  /// worked examples in spec section 8 (e.g. `"Content-Format required"`).
  pub fn diagnostic(self) -> &'static str {
    match self {
      | DispatchError::ResourceNotFound => "Not Found",
      | DispatchError::BadRequest => "Bad Request",
      | DispatchError::ContentFormatRequired => "Content-Format required",
      | DispatchError::UnsupportedContentFormat => "Unsupported Content-Format",
      | DispatchError::ServiceUnavailable => "Service Unavailable",
      | DispatchError::BufferFull => "Response too large",
    }
  }
}

/// Result of attempting to register a pending confirmable message (spec
/// section 4.3: "Fails (returns false) when no slot is free").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
  PendingQueueFull,
}

/// Result of attempting to register an Observe subscriber (spec section 4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeError {
  SubscriberSlotsFull,
}
