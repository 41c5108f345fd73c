//! IANA Definitions for DNS.
//!
//! This module contains types for the parameters defined in IANA registries
//! that are relevant for looking up host addresses.
//!
//! All types defined hereunder follow the same basic structure. They are
//! newtypes around the raw integer with an associated constant for each
//! well-defined value. Since the constants are just values of the type,
//! a raw integer that happens to be a well-defined value compares equal to
//! its constant.
//!
//! There are two methods `from_int()` and `to_int()` to convert from and
//! to raw integer values as well as implementations of the `From` trait
//! for these. `Display` prints the mnemonic.

pub use self::class::Class;
pub use self::rcode::Rcode;
pub use self::rtype::Rtype;

#[macro_use]
mod macros;

pub mod class;
pub mod rcode;
pub mod rtype;
