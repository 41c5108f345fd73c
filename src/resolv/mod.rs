//! An asynchronous stub resolver.
//!
//! This module resolves host names into IP addresses by asking a
//! recursive name server over UDP. All lookups of a [`Resolver`] are
//! processed by a single background thread. A lookup is started with
//! [`Resolver::resolve`] and its result is delivered through a callback
//! that runs on that thread.
//!
//! Each lookup is identified by a [`Handle`] chosen by the caller. Only one
//! lookup per handle can be outstanding at a time and the handle is used
//! to [cancel][Resolver::cancel] a lookup.
//!
//! A lookup first asks for the host’s IPv6 address. If the server says
//! there is none, it asks for the IPv4 address instead. Only the first
//! address in the answer is reported.
//!
//! Most applications only need one resolver. The functions in this module
//! use the process-wide resolver returned by [`Resolver::global`].
//!
//! The server to ask is taken from the system’s resolver configuration
//! unless configured otherwise via [`Config::set_discovery`]. See the
//! [`conf`] module for the available sources.

#![warn(missing_docs)]

pub use self::error::Error;
pub use self::lookups::{Callback, Handle};
pub use self::resolver::{Config, Resolver};

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

mod arena;
pub mod clock;
pub mod conf;
mod error;
mod ids;
mod lookups;
mod queue;
mod resolver;
mod timeout;
mod worker;

/// Starts a lookup using the global resolver.
///
/// See [`Resolver::resolve`] for details.
pub fn resolve<F>(
    handle: Handle,
    host: &str,
    timeout: Duration,
    callback: F,
) -> Result<(), Error>
where
    F: FnOnce(Result<IpAddr, Error>) + Send + 'static,
{
    Resolver::global().resolve(handle, host, timeout, callback)
}

/// Starts a lookup using a specific server and the global resolver.
///
/// See [`Resolver::resolve_with_server`] for details.
pub fn resolve_with_server<F>(
    handle: Handle,
    host: &str,
    timeout: Duration,
    server: SocketAddr,
    callback: F,
) -> Result<(), Error>
where
    F: FnOnce(Result<IpAddr, Error>) + Send + 'static,
{
    Resolver::global().resolve_with_server(
        handle, host, timeout, server, callback,
    )
}

/// Cancels a lookup of the global resolver.
///
/// See [`Resolver::cancel`] for details.
pub fn cancel(handle: Handle) -> bool {
    Resolver::global().cancel(handle)
}

/// Shuts down the worker of the global resolver.
///
/// See [`Resolver::shutdown`] for details.
pub fn shutdown() {
    Resolver::global().shutdown()
}
