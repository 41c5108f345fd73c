//! DNS response codes.
//!
//! The original DNS specification in [RFC 1035] specified four bits of the
//! message header as response code. Extended response codes transmitted in
//! the OPT record are of no concern to us since our queries never carry
//! one.
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035

//------------ Rcode --------------------------------------------------------

int_enum! {
    /// DNS Response Codes.
    ///
    /// The response code of a response indicates what happend on the server
    /// when trying to answer the query. The code is a 4 bit value and part
    /// of the header of a DNS message.
    =>
    Rcode, u8, "RCODE";

    /// No error condition.
    ///
    /// (Otherwise known as success.)
    (NOERROR => 0, "NOERROR")

    /// Format error.
    ///
    /// The name server was unable to interpret the query.
    (FORMERR => 1, "FORMERR")

    /// Server failure.
    ///
    /// The name server was unable to process this query due to a problem
    /// with the name server.
    (SERVFAIL => 2, "SERVFAIL")

    /// Name error.
    ///
    /// The domain name given in the query does not exist at the name server.
    (NXDOMAIN => 3, "NXDOMAIN")

    /// Not implemented.
    (NOTIMP => 4, "NOTIMP")

    /// Query refused.
    (REFUSED => 5, "REFUSED")
}

impl Rcode {
    /// Creates an rcode from the second flags octet of a message header.
    ///
    /// Only the lower four bits are used.
    #[must_use]
    pub const fn from_header_octet(octet: u8) -> Self {
        Rcode::from_int(octet & 0x0F)
    }
}

//============ Testing =======================================================
