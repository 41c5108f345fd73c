//! The header of a DNS message.
//!
//! Each DNS message starts with a twelve octet long header section
//! containing some general information related to the message as well as
//! the number of records in each of the four sections that follow the
//! header. Its content and format are defined in section 4.1.1 of
//! [RFC 1035].
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035

use super::iana::Rcode;
use bytes::BufMut;
use octseq::parse::{Parser, ShortInput};

//------------ Header --------------------------------------------------------

/// The header section of a DNS message.
///
/// The data is layed out like this:
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|Z |AD|CD|   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    QDCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ANCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    NSCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ARCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// Unlike in a full DNS library, the fields are kept in host byte order
/// since we only ever read a header once and write it once.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    /// The message ID.
    id: u16,

    /// The flags, opcode, and rcode.
    flags: u16,

    /// The number of entries in the question section.
    qdcount: u16,

    /// The number of records in the answer section.
    ancount: u16,

    /// The number of records in the authority section.
    nscount: u16,

    /// The number of records in the additional section.
    arcount: u16,
}

/// The length of the header in wire format.
pub const HEADER_LEN: usize = 12;

/// The QR bit in the flags.
const FLAG_QR: u16 = 0x8000;

/// The RD bit in the flags.
const FLAG_RD: u16 = 0x0100;

/// # Creation and Conversion
///
impl Header {
    /// Creates the header for a standard query with a single question.
    ///
    /// The opcode is QUERY and recursion is desired.
    pub fn query(id: u16) -> Self {
        Header {
            id,
            flags: FLAG_RD,
            qdcount: 1,
            ..Default::default()
        }
    }

    /// Takes a header from the beginning of a parser.
    pub fn parse(parser: &mut Parser<[u8]>) -> Result<Self, ShortInput> {
        parser.check_len(HEADER_LEN)?;
        Ok(Header {
            id: parser.parse_u16_be()?,
            flags: parser.parse_u16_be()?,
            qdcount: parser.parse_u16_be()?,
            ancount: parser.parse_u16_be()?,
            nscount: parser.parse_u16_be()?,
            arcount: parser.parse_u16_be()?,
        })
    }

    /// Appends the wire format of the header to a buffer.
    pub fn compose<B: BufMut>(&self, target: &mut B) {
        target.put_u16(self.id);
        target.put_u16(self.flags);
        target.put_u16(self.qdcount);
        target.put_u16(self.ancount);
        target.put_u16(self.nscount);
        target.put_u16(self.arcount);
    }
}

/// # Field Access
///
impl Header {
    /// Returns the value of the ID field.
    pub fn id(self) -> u16 {
        self.id
    }

    /// Returns whether the QR bit is set, i.e., whether this is a response.
    pub fn qr(self) -> bool {
        self.flags & FLAG_QR != 0
    }

    /// Sets the QR bit.
    pub fn set_qr(&mut self, set: bool) {
        if set {
            self.flags |= FLAG_QR
        } else {
            self.flags &= !FLAG_QR
        }
    }

    /// Returns whether the RD bit is set.
    pub fn rd(self) -> bool {
        self.flags & FLAG_RD != 0
    }

    /// Returns the raw flags field.
    pub fn flags(self) -> u16 {
        self.flags
    }

    /// Returns the response code.
    pub fn rcode(self) -> Rcode {
        Rcode::from_header_octet(self.flags as u8)
    }

    /// Sets the response code.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.flags = (self.flags & 0xFFF0) | u16::from(rcode.to_int() & 0x0F)
    }

    /// Returns the number of entries in the question section.
    pub fn qdcount(self) -> u16 {
        self.qdcount
    }

    /// Returns the number of records in the answer section.
    pub fn ancount(self) -> u16 {
        self.ancount
    }

    /// Sets the number of records in the answer section.
    pub fn set_ancount(&mut self, value: u16) {
        self.ancount = value
    }

    /// Returns the number of records in the authority section.
    pub fn nscount(self) -> u16 {
        self.nscount
    }

    /// Returns the number of records in the additional section.
    pub fn arcount(self) -> u16 {
        self.arcount
    }
}

//============ Testing =======================================================
