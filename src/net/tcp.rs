//! Non-blocking TCP connections.

use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

/// Starts connecting to `addr` without waiting for the connection.
///
/// The returned stream is in non-blocking mode. The connection is usually
/// still in progress when this returns. It is established once the stream
/// becomes writable. Connection failures are reported by the first read or
/// write or through `take_error`.
pub fn connect(addr: SocketAddr) -> Result<TcpStream, io::Error> {
    let sock = Socket::new(
        Domain::for_address(addr),
        Type::STREAM,
        Some(Protocol::TCP),
    )?;
    sock.set_nonblocking(true)?;
    match sock.connect(&SockAddr::from(addr)) {
        Ok(()) => {}
        Err(err) if is_in_progress(&err) => {}
        Err(err) => return Err(err),
    }
    Ok(sock.into())
}

/// Disables Nagle’s algorithm on a stream.
pub fn disable_nagle(stream: &TcpStream) -> Result<(), io::Error> {
    SockRef::from(stream).set_nodelay(true)
}

/// Returns the local port a stream is bound to.
pub fn local_port(stream: &TcpStream) -> Result<u16, io::Error> {
    stream.local_addr().map(|addr| addr.port())
}

/// Returns the address of the peer a stream is connected to.
pub fn remote_addr(stream: &TcpStream) -> Result<SocketAddr, io::Error> {
    stream.peer_addr()
}

/// Writes as much of `data` as the stream takes right now.
///
/// Returns the number of octets written which is zero if the stream can’t
/// take any data at the moment.
pub fn send(mut stream: &TcpStream, data: &[u8]) -> Result<usize, io::Error> {
    match stream.write(data) {
        Ok(len) => Ok(len),
        Err(err) if is_retry(&err) => Ok(0),
        Err(err) => Err(err),
    }
}

/// Reads whatever data is available into `buf`.
///
/// Returns `None` if there is no data right now. A return value of
/// `Some(0)` means that the peer has closed the connection.
pub fn recv(
    mut stream: &TcpStream,
    buf: &mut [u8],
) -> Result<Option<usize>, io::Error> {
    match stream.read(buf) {
        Ok(len) => Ok(Some(len)),
        Err(err) if is_retry(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Returns whether an I/O error means trying again later.
fn is_retry(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Returns whether a connect error means the connection is underway.
#[cfg(unix)]
fn is_in_progress(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINPROGRESS)
        || err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(not(unix))]
fn is_in_progress(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}
