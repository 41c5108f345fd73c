//! Socket primitives.
//!
//! The sockets created here are plain standard library sockets set up via
//! `socket2` and switched to non-blocking mode. They can be handed to Tokio
//! through `from_std` or used directly with a readiness loop of your own.

pub mod tcp;
pub mod udp;
