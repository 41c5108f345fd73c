//! DNS CLASSes.

//------------ Class ---------------------------------------------------------

int_enum! {
    /// DNS CLASSes.
    ///
    /// The domain name space is partitioned into separate classes for
    /// different network types. In practice, only the IN class is relevant
    /// and it is the only one our queries ever use.
    ///
    /// See [RFC 1034] for the introduction of classes.
    ///
    /// [RFC 1034]: https://tools.ietf.org/html/rfc1034
    =>
    Class, u16, "CLASS";

    /// Internet (IN).
    (IN => 1, "IN")

    /// Chaosnet (CH).
    (CH => 3, "CH")

    /// Hesiod (HS).
    (HS => 4, "HS")
}

int_enum_wire_u16!(Class);
