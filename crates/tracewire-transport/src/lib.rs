//! Byte channel abstraction and local socket transport.
//!
//! The tracing session never touches a socket directly. It writes through a
//! [`ByteChannel`] and is fed incoming bytes by whoever owns the read side.
//! This crate provides that trait plus a Unix domain socket implementation
//! ([`StreamChannel`] over an [`IpcStream`]) for talking to a local daemon.

pub mod channel;
pub mod error;
#[cfg(unix)]
pub mod traits;
#[cfg(unix)]
pub mod uds;

pub use channel::ByteChannel;
#[cfg(unix)]
pub use channel::StreamChannel;
pub use error::{Result, TransportError};
#[cfg(unix)]
pub use traits::IpcStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
