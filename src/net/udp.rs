//! Non-blocking UDP sockets.
//!
//! [`open`] creates a socket bound to an ephemeral port that can talk to
//! both IPv4 and IPv6 peers if the host supports IPv6. On such a socket,
//! IPv4 peers need to be addressed through their v4-mapped IPv6 address
//! which [`map_destination`] takes care of.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{
    Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, UdpSocket,
};
use tracing::debug;

//------------ open ------------------------------------------------------------

/// Opens a non-blocking UDP socket bound to an ephemeral port.
///
/// Prefers a dual-stack IPv6 socket bound to `[::]:0`. If IPv6 isn’t
/// available, falls back to an IPv4 socket bound to `0.0.0.0:0`.
pub fn open() -> Result<UdpSocket, io::Error> {
    match open_dual_stack() {
        Ok(sock) => Ok(sock),
        Err(err) => {
            debug!("no dual-stack UDP socket, using IPv4: {}", err);
            open_v4()
        }
    }
}

/// Opens a dual-stack socket.
fn open_dual_stack() -> Result<UdpSocket, io::Error> {
    let sock = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_only_v6(false)?;
    sock.set_nonblocking(true)?;
    let addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0);
    sock.bind(&SockAddr::from(addr))?;
    Ok(sock.into())
}

/// Opens an IPv4 socket.
fn open_v4() -> Result<UdpSocket, io::Error> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_nonblocking(true)?;
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
    sock.bind(&SockAddr::from(addr))?;
    Ok(sock.into())
}

//------------ Addressing ------------------------------------------------------

/// Returns the local port a socket is bound to.
pub fn local_port(sock: &UdpSocket) -> Result<u16, io::Error> {
    sock.local_addr().map(|addr| addr.port())
}

/// Returns whether a socket bound to `local` can send to `dest`.
///
/// The destination must have a specific address and a non-zero port. An
/// IPv4 socket can’t reach IPv6 destinations.
pub fn can_reach(local: &SocketAddr, dest: &SocketAddr) -> bool {
    dest.port() != 0
        && !dest.ip().is_unspecified()
        && !(local.is_ipv4() && dest.is_ipv6())
}

/// Converts `dest` into the form a socket bound to `local` needs.
///
/// IPv4 destinations become v4-mapped addresses on IPv6 sockets. All other
/// destinations are returned unchanged.
pub fn map_destination(local: &SocketAddr, dest: SocketAddr) -> SocketAddr {
    match (local, dest) {
        (SocketAddr::V6(_), SocketAddr::V4(dest)) => SocketAddrV6::new(
            dest.ip().to_ipv6_mapped(),
            dest.port(),
            0,
            0,
        )
        .into(),
        _ => dest,
    }
}

//------------ Transfer --------------------------------------------------------

/// Sends a datagram to `dest`.
///
/// Returns the number of octets sent. If the socket can’t take the datagram
/// right now, nothing is sent and zero is returned.
pub fn send(
    sock: &UdpSocket,
    data: &[u8],
    dest: SocketAddr,
) -> Result<usize, io::Error> {
    match sock.send_to(data, dest) {
        Ok(len) => Ok(len),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(err) => Err(err),
    }
}

/// Receives a datagram into `buf`.
///
/// Returns the length of the datagram and its source or `None` if no
/// datagram is waiting. Datagrams longer than `buf` are cut short.
pub fn receive(
    sock: &UdpSocket,
    buf: &mut [u8],
) -> Result<Option<(usize, SocketAddr)>, io::Error> {
    match sock.recv_from(buf) {
        Ok(res) => Ok(Some(res)),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(err) => Err(err),
    }
}

//------------ Error Classification --------------------------------------------

/// Returns whether a send error only concerns the destination.
///
/// Such errors fail the one datagram. The socket itself is still fine.
pub fn is_destination_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::ConnectionRefused
    ) || is_unreachable(err)
}

/// Returns whether the system says the destination can’t be reached.
#[cfg(unix)]
fn is_unreachable(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(
            libc::ENETUNREACH
                | libc::EHOSTUNREACH
                | libc::EAFNOSUPPORT
                | libc::EADDRNOTAVAIL
        )
    )
}

#[cfg(not(unix))]
fn is_unreachable(_err: &io::Error) -> bool {
    false
}

/// Returns whether a receive error was left behind by an earlier send.
///
/// Some systems report an ICMP port unreachable for an earlier datagram on
/// the next receive. This says nothing about the socket itself.
pub fn is_stale_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

//============ Tests =========================================================
