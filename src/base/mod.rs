//! Handling of the DNS wire format.
//!
//! This module contains just enough of the DNS to ask a recursive server
//! for the address records of a single host name and to make sense of its
//! answer. Messages always carry exactly one question. There is no support
//! for name compression when composing and compressed names in answers are
//! skipped rather than followed.
//!
//! The module is split up as follows:
//!
//! * [iana] has the registry values we need: record types, classes, and
//!   response codes,
//! * [name] provides [`HostName`], a validated host name in presentation
//!   format,
//! * [header] deals with the twelve octet message header,
//! * [message_builder] creates query messages via [`encode_query`], and
//! * [message] checks and decodes replies via [`decode_reply`].

pub use self::header::Header;
pub use self::iana::{Class, Rcode, Rtype};
pub use self::message::{decode_reply, ProtocolError, ReplyError};
pub use self::message_builder::encode_query;
pub use self::name::{HostName, NameError};

pub mod header;
pub mod iana;
pub mod message;
pub mod message_builder;
pub mod name;
