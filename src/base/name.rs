//! Host names.
//!
//! A host name is what a caller hands to the resolver: a dotted sequence of
//! labels in presentation format such as `www.example.com`. In a message,
//! the name is encoded as a sequence of labels, each preceded by a length
//! octet, and terminated by an empty label.
//!
//! We never compress names when composing. When parsing the question of a
//! reply we expect the name in the same form we sent it. Names in answer
//! records may use compression pointers; these are only skipped.

use bytes::BufMut;
use core::{fmt, str};
use octseq::parse::{Parser, ShortInput};
use std::error;

//------------ Configuration Constants ---------------------------------------

/// The maximum length of a host name in presentation format.
pub const MAX_NAME_LEN: usize = 253;

/// The maximum length of a single label.
///
/// The length octet could express more, but the two top bits mark a
/// compression pointer.
pub const MAX_LABEL_LEN: usize = 63;

//------------ HostName ------------------------------------------------------

/// A validated host name.
///
/// The name is kept in presentation format without a trailing dot. It is
/// guaranteed to be at most [`MAX_NAME_LEN`] octets long and to consist of
/// non-empty labels of at most [`MAX_LABEL_LEN`] octets each. Thus its
/// wire format always fits comfortably into a 512 octet query.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct HostName(String);

impl HostName {
    /// Creates a host name from its presentation format.
    ///
    /// A single trailing dot is accepted and dropped. The length limit is
    /// checked against the name as given.
    pub fn new(name: &str) -> Result<Self, NameError> {
        if name.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong);
        }
        let name = name.strip_suffix('.').unwrap_or(name);
        for label in name.split('.') {
            if label.is_empty() {
                return Err(NameError::EmptyLabel);
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(NameError::LongLabel);
            }
        }
        Ok(HostName(name.into()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns an iterator over the labels of the name.
    pub fn labels(&self) -> str::Split<'_, char> {
        self.0.split('.')
    }

    /// Returns the length of the name in wire format.
    ///
    /// That is one length octet per label plus the label, plus the final
    /// empty label.
    pub fn compose_len(&self) -> usize {
        self.0.len() + 2
    }

    /// Appends the uncompressed wire format of the name to a buffer.
    pub fn compose<B: BufMut>(&self, target: &mut B) {
        for label in self.labels() {
            // Label lengths are checked in `new`.
            target.put_u8(label.len() as u8);
            target.put_slice(label.as_bytes());
        }
        target.put_u8(0)
    }

    /// Parses an uncompressed name and checks whether it equals `self`.
    ///
    /// Labels are compared ignoring ASCII case. A compression pointer
    /// never matches. Upon success, the parser is positioned right after
    /// the name. If the name runs past the end of the input, an error is
    /// returned.
    pub fn parse_eq(
        &self,
        parser: &mut Parser<[u8]>,
    ) -> Result<bool, ShortInput> {
        let mut labels = self.labels();
        let mut matches = true;
        loop {
            let len = parser.parse_u8()?;
            if len == 0 {
                return Ok(matches && labels.next().is_none());
            }
            if len & 0xC0 != 0 {
                // Compression pointer or one of the obsolete label types.
                // We can’t read past it, so stop here.
                parser.advance(1)?;
                return Ok(false);
            }
            let len = usize::from(len);
            let label = parser.peek(len)?;
            match labels.next() {
                Some(expected) => {
                    if !expected.as_bytes().eq_ignore_ascii_case(label) {
                        matches = false
                    }
                }
                None => matches = false,
            }
            parser.advance(len)?;
        }
    }

    /// Skips over a possibly compressed name.
    ///
    /// The name is either a sequence of labels ending in the root label,
    /// a sequence of labels ending in a compression pointer, or only a
    /// compression pointer. Pointers are not followed.
    pub fn skip(parser: &mut Parser<[u8]>) -> Result<(), ShortInput> {
        loop {
            let len = parser.parse_u8()?;
            if len == 0 {
                return Ok(());
            }
            if len & 0xC0 == 0xC0 {
                return parser.advance(1);
            }
            parser.advance(usize::from(len & 0x3F))?;
        }
    }
}

//--- FromStr

impl str::FromStr for HostName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostName::new(s)
    }
}

//--- AsRef

impl AsRef<str> for HostName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

//--- Display and Debug

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for HostName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostName({})", self.0)
    }
}

//------------ NameError -----------------------------------------------------

/// A host name was not acceptable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    /// The name is longer than [`MAX_NAME_LEN`] octets.
    TooLong,

    /// The name contains an empty label or is empty altogether.
    EmptyLabel,

    /// A label is longer than [`MAX_LABEL_LEN`] octets.
    LongLabel,
}

//--- Display and Error

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NameError::TooLong => f.write_str("host name too long"),
            NameError::EmptyLabel => f.write_str("empty label in host name"),
            NameError::LongLabel => f.write_str("label in host name too long"),
        }
    }
}

impl error::Error for NameError {}

//============ Testing =======================================================
