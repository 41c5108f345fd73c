//! Decoding reply messages.
//!
//! A reply is only of interest if it answers the exact question we asked.
//! The functions in this module therefore take the ID, host name, and
//! record type of the query and check the reply against them before
//! digging out the address.
//!
//! Decoding fails closed: anything unexpected, including data that runs
//! past the end of the datagram, turns into a [`ReplyError`].

use super::header::{Header, HEADER_LEN};
use super::iana::{Class, Rcode, Rtype};
use super::name::HostName;
use core::fmt;
use octseq::parse::{Parser, ShortInput};
use std::error;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// The shortest datagram that is worth looking at.
///
/// A header followed by at least one octet of question.
pub const MIN_REPLY_LEN: usize = HEADER_LEN + 1;

//------------ Quick Checks --------------------------------------------------

/// Returns the message ID of a datagram if it is long enough to be a reply.
pub fn reply_id(data: &[u8]) -> Option<u16> {
    if data.len() < MIN_REPLY_LEN {
        None
    } else {
        Some(u16::from_be_bytes([data[0], data[1]]))
    }
}

/// Returns whether the question of a message is for `name`.
///
/// Only the name of the first question is compared. Anything that can’t be
/// parsed counts as a mismatch.
pub fn question_matches(data: &[u8], name: &HostName) -> bool {
    let mut parser = Parser::from_ref(data);
    match Header::parse(&mut parser) {
        Ok(header) if header.qdcount() > 0 => {}
        _ => return false,
    }
    name.parse_eq(&mut parser).unwrap_or(false)
}

//------------ decode_reply --------------------------------------------------

/// Decodes the reply to an address query.
///
/// The reply must be a response with the given `id` and carry exactly one
/// question for `name`, `rtype`, and class IN. The address of the first
/// answer record of type `rtype` is returned. Answer records of other types,
/// such as the CNAME records leading up to the address, are skipped.
///
/// A response code of NXDOMAIN as well as a successful response without any
/// answers result in [`ReplyError::NoSuchHost`]. Every other problem is a
/// [`ReplyError::Protocol`].
pub fn decode_reply(
    data: &[u8],
    id: u16,
    name: &HostName,
    rtype: Rtype,
) -> Result<IpAddr, ReplyError> {
    let mut parser = Parser::from_ref(data);
    let header =
        Header::parse(&mut parser).map_err(|_| ProtocolError::ShortMessage)?;
    if header.id() != id {
        return Err(ProtocolError::IdMismatch.into());
    }
    if !header.qr() {
        return Err(ProtocolError::NotResponse.into());
    }
    match header.rcode() {
        Rcode::NOERROR => {}
        Rcode::NXDOMAIN => return Err(ReplyError::NoSuchHost),
        rcode => return Err(ProtocolError::Rcode(rcode).into()),
    }
    if header.qdcount() != 1 {
        return Err(ProtocolError::QuestionCount(header.qdcount()).into());
    }
    if header.ancount() == 0 {
        return Err(ReplyError::NoSuchHost);
    }

    if !name.parse_eq(&mut parser)? {
        return Err(ProtocolError::QuestionMismatch.into());
    }
    if Rtype::parse(&mut parser)? != rtype
        || Class::parse(&mut parser)? != Class::IN
    {
        return Err(ProtocolError::QuestionMismatch.into());
    }

    for _ in 0..header.ancount() {
        HostName::skip(&mut parser)?;
        let record_type = Rtype::parse(&mut parser)?;
        let _class = Class::parse(&mut parser)?;
        let _ttl = parser.parse_u32_be()?;
        let rdlen = usize::from(parser.parse_u16_be()?);
        let start = parser.pos();
        parser.advance(rdlen)?;
        if record_type != rtype {
            continue;
        }
        return parse_address(rtype, &data[start..start + rdlen]);
    }
    Err(ProtocolError::NoMatchingAnswer.into())
}

/// Converts the record data of an address record into an address.
fn parse_address(rtype: Rtype, rdata: &[u8]) -> Result<IpAddr, ReplyError> {
    match rtype.address_len() {
        Some(4) if rdata.len() >= 4 => Ok(IpAddr::V4(Ipv4Addr::new(
            rdata[0], rdata[1], rdata[2], rdata[3],
        ))),
        Some(16) if rdata.len() >= 16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&rdata[..16]);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        Some(_) => Err(ProtocolError::ShortRdata.into()),
        None => Err(ProtocolError::NoMatchingAnswer.into()),
    }
}

//------------ ReplyError ----------------------------------------------------

/// A reply could not be turned into an address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplyError {
    /// The server says that the host doesn’t exist or has no such records.
    NoSuchHost,

    /// The reply was broken or didn’t answer our question.
    Protocol(ProtocolError),
}

impl From<ProtocolError> for ReplyError {
    fn from(err: ProtocolError) -> Self {
        ReplyError::Protocol(err)
    }
}

impl From<ShortInput> for ReplyError {
    fn from(_: ShortInput) -> Self {
        ReplyError::Protocol(ProtocolError::Truncated)
    }
}

//--- Display and Error

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReplyError::NoSuchHost => f.write_str("no such host"),
            ReplyError::Protocol(err) => err.fmt(f),
        }
    }
}

impl error::Error for ReplyError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ReplyError::NoSuchHost => None,
            ReplyError::Protocol(err) => Some(err),
        }
    }
}

//------------ ProtocolError -------------------------------------------------

/// The ways a reply can be broken.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProtocolError {
    /// The message is shorter than a header.
    ShortMessage,

    /// The message ID differs from the query’s.
    IdMismatch,

    /// The QR bit is not set.
    NotResponse,

    /// The server responded with an error other than NXDOMAIN.
    Rcode(Rcode),

    /// The reply doesn’t have exactly one question.
    QuestionCount(u16),

    /// The question is not the one we asked.
    QuestionMismatch,

    /// A field extends beyond the end of the message.
    Truncated,

    /// An address record has record data too short for an address.
    ShortRdata,

    /// None of the answer records is of the requested type.
    NoMatchingAnswer,
}

//--- Display and Error

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolError::ShortMessage => {
                f.write_str("message too short for header")
            }
            ProtocolError::IdMismatch => f.write_str("message ID mismatch"),
            ProtocolError::NotResponse => f.write_str("message is a query"),
            ProtocolError::Rcode(rcode) => {
                write!(f, "server responded with {}", rcode)
            }
            ProtocolError::QuestionCount(count) => {
                write!(f, "expected one question, got {}", count)
            }
            ProtocolError::QuestionMismatch => {
                f.write_str("reply does not match query")
            }
            ProtocolError::Truncated => f.write_str("unexpected end of message"),
            ProtocolError::ShortRdata => {
                f.write_str("record data too short for address")
            }
            ProtocolError::NoMatchingAnswer => {
                f.write_str("no answer of requested type")
            }
        }
    }
}

impl error::Error for ProtocolError {}

//============ Testing =======================================================
