//! Protocol engine for a CoAP endpoint: confirmable-message reliability,
//! Observe subscriptions, Block2 transfer, and request dispatch, built on
//! top of the wire format in `coap_msg`.
//!
//! This crate knows nothing about how bytes actually reach a peer, how
//! time is actually measured, or where files actually live - those are
//! the [`net::Socket`], [`clock::Clock`], and [`fs::FileSystem`]
//! collaborator traits, implemented by the hosting crate.

pub mod block;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod duplicate;
pub mod error;
pub mod fs;
pub mod ids;
pub mod net;
pub mod observe;
pub mod reliability;
pub mod retry;

pub use config::Config;
