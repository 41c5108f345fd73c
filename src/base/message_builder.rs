//! Building query messages.

use super::header::{Header, HEADER_LEN};
use super::iana::{Class, Rtype};
use super::name::HostName;
use bytes::{Bytes, BytesMut};

/// The maximum size of a DNS message sent over UDP without EDNS.
///
/// See section 4.2.1 of RFC 1035.
pub const MAX_UDP_MESSAGE_LEN: usize = 512;

/// Creates a query message asking for records of `rtype` for `name`.
///
/// The message has a standard query header with the given ID, the RD flag
/// set, and a single question of class IN. The name is not compressed.
/// Because [`HostName`] limits the length of the name, the resulting
/// message never exceeds [`MAX_UDP_MESSAGE_LEN`] octets.
pub fn encode_query(id: u16, name: &HostName, rtype: Rtype) -> Bytes {
    let mut buf = BytesMut::with_capacity(
        HEADER_LEN + name.compose_len() + Rtype::COMPOSE_LEN
            + Class::COMPOSE_LEN,
    );
    Header::query(id).compose(&mut buf);
    name.compose(&mut buf);
    rtype.compose(&mut buf);
    Class::IN.compose(&mut buf);
    debug_assert!(buf.len() <= MAX_UDP_MESSAGE_LEN);
    buf.freeze()
}

//============ Testing =======================================================
