//! Socket primitives and an asynchronous host name resolver.
//!
//! This crate provides a small set of building blocks for talking to the
//! network without pulling in a full DNS library. The modules are:
//!
//! * [base] contains the DNS wire format bits needed to ask a server for
//!   the address of a host: host names, the message header, and an encoder
//!   and decoder for single-question queries and their replies.
//! * [net] has the socket primitives: a non-blocking, dual-stack UDP socket
//!   and a non-blocking TCP connect.
//! * [resolv] is an asynchronous stub resolver. A single background worker
//!   multiplexes any number of outstanding lookups over one UDP socket and
//!   reports each result through a completion callback.
//!
//! The quickest way to resolve a name is through the process-wide
//! resolver:
//!
//! ```no_run
//! use std::time::Duration;
//! use netlookup::resolv::{self, Handle};
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! resolv::resolve(
//!     Handle::new(), "example.com", Duration::from_secs(5),
//!     move |res| { let _ = tx.send(res); }
//! ).unwrap();
//! println!("{:?}", rx.recv().unwrap());
//! resolv::shutdown();
//! ```

#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]

pub mod base;
pub mod net;
pub mod resolv;
