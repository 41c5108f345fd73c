//! Macros making implementing IANA types easier.

/// Creates a standard IANA type wrapping an integer.
///
/// The type is a newtype around the raw integer with associated constants
/// for the well-defined values. This adds impls for `From`, `PartialEq`,
/// `Eq`, `PartialOrd`, `Ord`, `Hash`, and `Debug` as well as `Display`
/// which prints the mnemonic or, for undefined values, the given prefix
/// followed by the decimal value.
macro_rules! int_enum {
    ( $(#[$attr:meta])* =>
      $ianatype:ident, $inttype:path, $prefix:expr;
      $( $(#[$variant_attr:meta])* ( $variant:ident =>
                                        $value:expr, $mnemonic:expr) )* ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $ianatype($inttype);

        impl $ianatype {
            $(
                $(#[$variant_attr])*
                pub const $variant: $ianatype = $ianatype($value);
            )*
        }

        impl $ianatype {
            /// Returns a value from its raw integer value.
            #[must_use]
            pub const fn from_int(value: $inttype) -> Self {
                Self(value)
            }

            /// Returns the raw integer value for a value.
            #[must_use]
            pub const fn to_int(self) -> $inttype {
                self.0
            }

            /// Returns the mnemonic for this value if there is one.
            #[must_use]
            pub const fn to_mnemonic(self) -> Option<&'static str> {
                match self {
                    $(
                        $ianatype::$variant => {
                            Some($mnemonic)
                        }
                    )*
                    _ => None
                }
            }
        }

        //--- From

        impl From<$inttype> for $ianatype {
            fn from(value: $inttype) -> Self {
                $ianatype::from_int(value)
            }
        }

        impl From<$ianatype> for $inttype {
            fn from(value: $ianatype) -> Self {
                value.to_int()
            }
        }

        //--- Display and Debug

        impl core::fmt::Display for $ianatype {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                match self.to_mnemonic() {
                    Some(mnemonic) => f.write_str(mnemonic),
                    None => write!(f, "{}{}", $prefix, self.0),
                }
            }
        }

        impl core::fmt::Debug for $ianatype {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                match self.to_mnemonic() {
                    Some(mnemonic) => {
                        write!(
                            f,
                            concat!(stringify!($ianatype), "::{}"),
                            mnemonic
                        )
                    }
                    None => {
                        f.debug_tuple(stringify!($ianatype))
                            .field(&self.0)
                            .finish()
                    }
                }
            }
        }
    }
}

/// Adds wire format parsing and composing for a 16 bit IANA type.
macro_rules! int_enum_wire_u16 {
    ($ianatype:ident) => {
        impl $ianatype {
            /// The length of the value in wire format.
            pub const COMPOSE_LEN: usize = 2;

            /// Takes a value from the beginning of a parser.
            pub fn parse(
                parser: &mut octseq::parse::Parser<[u8]>,
            ) -> Result<Self, octseq::parse::ShortInput> {
                parser.parse_u16_be().map(Self::from_int)
            }

            /// Appends the value in wire format to a buffer.
            pub fn compose<B: bytes::BufMut>(&self, target: &mut B) {
                target.put_u16(self.to_int())
            }
        }
    };
}
