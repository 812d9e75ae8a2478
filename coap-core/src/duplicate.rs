use tinyvec::ArrayVec;

use coap_msg::Id;

use crate::config::Config;

/// Fixed-size ring of the most recently seen message IDs, one per traffic
/// direction so request IDs and notification IDs never collide (spec
/// section 4.4). `N` bounds the backing storage at compile time; `cap`
/// lets a hosting binary shrink the effective window below `N` at runtime
/// via `Config::recent_msg_history` without changing the type.
#[derive(Debug, Clone)]
pub struct DuplicateWindow<const N: usize> {
  recent: ArrayVec<[Id; N]>,
  next: usize,
  cap: usize,
}

impl<const N: usize> Default for DuplicateWindow<N> {
  fn default() -> Self {
    Self::with_capacity(N)
  }
}

impl<const N: usize> DuplicateWindow<N> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Cap the effective window at `cap` entries (clamped to `N`, the
  /// storage's compile-time maximum).
  pub fn with_capacity(cap: usize) -> Self {
    Self { recent: ArrayVec::new(), next: 0, cap: cap.min(N) }
  }

  /// Record `id` as seen, overwriting the oldest entry once the window is
  /// full.
  pub fn record(&mut self, id: Id) {
    if self.cap == 0 {
      return;
    }
    if self.recent.len() < self.cap {
      self.recent.push(id);
    } else {
      self.recent[self.next] = id;
      self.next = (self.next + 1) % self.cap;
    }
  }

  /// Whether `id` is present in the window (an O(N) linear scan, per spec
  /// section 4.4).
  pub fn is_duplicate(&self, id: Id) -> bool {
    self.recent.iter().any(|&i| i == id)
  }
}

/// Detects retransmitted confirmable/non-confirmable messages by recent
/// Message ID, maintaining independent windows for server-inbound requests
/// and client-inbound notifications (spec section 4.4).
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
  pub inbound_server: DuplicateWindow<16>,
  pub inbound_client: DuplicateWindow<16>,
}

impl DuplicateDetector {
  pub fn new(config: Config) -> Self {
    Self { inbound_server: DuplicateWindow::with_capacity(config.recent_msg_history),
           inbound_client: DuplicateWindow::with_capacity(config.recent_msg_history) }
  }
}
