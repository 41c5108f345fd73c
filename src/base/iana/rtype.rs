//! Resource Record (RR) TYPEs

//------------ Rtype ---------------------------------------------------------

int_enum! {
    /// Resource Record Types.
    ///
    /// Each resource records has a 16 bit type value indicating what kind of
    /// information is represented by the record. A query includes the type
    /// of record information is requested for.
    ///
    /// Only the handful of types a host name lookup may run into have
    /// constants here. Everything else is still representable through
    /// [`Rtype::from_int`].
    ///
    /// The currently assigned values are maintained in an [IANA registry].
    ///
    /// [IANA registry]: http://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
    =>
    Rtype, u16, "TYPE";

    /// A host address.
    (A => 1, "A")

    /// The canonical name for an alias.
    (CNAME => 5, "CNAME")

    /// IPv6 address.
    ///
    /// See RFC 3596.
    (AAAA => 28, "AAAA")
}

int_enum_wire_u16!(Rtype);

impl Rtype {
    /// Returns the length of the record data for an address record type.
    ///
    /// This is 4 for A records, 16 for AAAA records, and `None` for any
    /// type that doesn’t carry an address.
    #[must_use]
    pub fn address_len(self) -> Option<usize> {
        match self {
            Rtype::A => Some(4),
            Rtype::AAAA => Some(16),
            _ => None,
        }
    }
}

//============ Testing =======================================================
