//! Host glue (sockets, clocks, the filesystem) and the resource handlers
//! that turn [`coap_core`]'s protocol engine into a runnable CoAP
//! endpoint over UDP.

pub mod convert;
pub mod resources;
pub mod server;
pub mod std_clock;
pub mod std_fs;
pub mod std_net;
pub mod trigger;

pub use server::Endpoint;
