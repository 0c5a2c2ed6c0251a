//! Macros generating codec implementations for user-defined types.

/// Defines a struct that encodes and decodes as an ASN.1 SEQUENCE.
///
/// Every field is followed by `=>` and either a field parameter string
/// (see [`FieldParams`](crate::FieldParams) for the grammar) or the
/// keyword `flatten` for a nested struct whose fields are inlined into
/// this sequence (the nested struct must itself be defined through this
/// macro). A trailing `...` marks the sequence as extensible: unknown
/// trailing data values are tolerated when decoding.
///
/// The struct must be `Default` and `PartialEq` (usually derived); the
/// macro implements [`BerEncode`](crate::ber::BerEncode) and
/// [`BerDecode`](crate::ber::BerDecode).
///
/// ```
/// use ber_stream::ber_sequence;
///
/// ber_sequence! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Record {
///         num: i64 => "",
///         name: String => "optional",
///         data: ber_stream::OctetString => "application,tag:5",
///     }
/// }
///
/// let bytes = ber_stream::ber::to_vec(&Record {
///     num: 7,
///     name: "x".into(),
///     data: vec![0xff].into(),
/// }).unwrap();
/// let back: Record = ber_stream::ber::from_bytes(&bytes).unwrap();
/// assert_eq!(back.num, 7);
/// ```
#[macro_export]
macro_rules! ber_sequence {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $fname:ident : $fty:ty => $params:tt ),* $(,)?
        }
    ) => {
        $crate::ber_sequence!(@impl
            $(#[$meta])* $vis struct $name, false, { $( $fname : $fty => $params ),* }
        );
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $fname:ident : $fty:ty => $params:tt , )* ...
        }
    ) => {
        $crate::ber_sequence!(@impl
            $(#[$meta])* $vis struct $name, true, { $( $fname : $fty => $params ),* }
        );
    };
    (@impl
        $(#[$meta:meta])* $vis:vis struct $name:ident, $ext:expr,
        { $( $fname:ident : $fty:ty => $params:tt ),* }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( pub $fname : $fty, )*
        }

        impl $name {
            #[doc(hidden)]
            pub fn ber_fields() -> &'static $crate::ber::SequenceFields<$name> {
                static FIELDS: $crate::ber::SequenceFields<$name> =
                    $crate::ber::SequenceFields {
                        fields: &[
                            $( $crate::ber_sequence!(@field $name, $fname, $fty, $params), )*
                        ],
                        extensible: $ext,
                    };
                &FIELDS
            }
        }

        impl $crate::ber::BerDecode for $name {
            fn ber_match(&self, tag: $crate::Tag) -> bool {
                tag == $crate::Tag::SEQUENCE
            }

            fn ber_decode(
                &mut self,
                _tag: $crate::Tag,
                el: &mut $crate::ber::Element<'_>,
            ) -> Result<(), $crate::Error> {
                $crate::ber::decode_fields(self, Self::ber_fields(), el)
            }
        }

        impl $crate::ber::BerEncode for $name {
            fn ber_header(&self) -> Result<$crate::tlv::Header, $crate::Error> {
                Ok($crate::tlv::Header::constructed(
                    $crate::Tag::SEQUENCE,
                    $crate::ber::encoded_fields_len(self, Self::ber_fields())?,
                ))
            }

            fn ber_write_value(
                &self,
                w: &mut $crate::ber::ValueSink<'_>,
            ) -> Result<(), $crate::Error> {
                $crate::ber::encode_fields(self, Self::ber_fields(), w)
            }

            fn ber_is_zero(&self) -> bool {
                *self == Self::default()
            }
        }
    };
    (@field $S:ty, $fname:ident, $fty:ty, flatten) => {
        $crate::ber::SequenceField {
            params: "",
            ops: $crate::ber::FieldOps::Flatten {
                decode: |s: &mut $S, el, pending| {
                    $crate::ber::decode_flattened(
                        &mut s.$fname,
                        <$fty>::ber_fields(),
                        el,
                        pending,
                    )
                },
                encode: |s: &$S, sink| {
                    $crate::ber::encode_fields(&s.$fname, <$fty>::ber_fields(), sink)
                },
                encoded_len: |s: &$S| {
                    $crate::ber::encoded_fields_len(&s.$fname, <$fty>::ber_fields())
                },
            },
        }
    };
    (@field $S:ty, $fname:ident, $fty:ty, $params:literal) => {
        $crate::ber::SequenceField {
            params: $params,
            ops: $crate::ber::FieldOps::Leaf {
                decode: |s: &mut $S, tag, el, p| {
                    $crate::ber::decode_value(&mut s.$fname, tag, el, p)
                },
                encode: |s: &$S, sink, p| sink.encode_value(&s.$fname, p),
                encoded_len: |s: &$S, p| $crate::ber::encoded_value_len(&s.$fname, p),
            },
        }
    };
}

/// Defines a fieldless enum that encodes and decodes as an ASN.1
/// ENUMERATED with a fixed set of valid values.
///
/// Decoding a value outside the declared set fails with a structural
/// error; the declared discriminants are validated on both sides.
///
/// ```
/// use ber_stream::ber_enumerated;
///
/// ber_enumerated! {
///     pub enum Version {
///         V1 = 0,
///         V2 = 1,
///     }
/// }
///
/// assert_eq!(ber_stream::ber::to_vec(&Version::V2).unwrap(), [0x0a, 0x01, 0x01]);
/// ```
#[macro_export]
macro_rules! ber_enumerated {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl Default for $name {
            fn default() -> Self {
                // the first declared variant
                $crate::ber_enumerated!(@first $($name::$variant),+)
            }
        }

        impl $crate::ber::BerDecode for $name {
            fn ber_match(&self, tag: $crate::Tag) -> bool {
                tag == $crate::Tag::ENUMERATED
            }

            fn ber_decode(
                &mut self,
                tag: $crate::Tag,
                el: &mut $crate::ber::Element<'_>,
            ) -> Result<(), $crate::Error> {
                let mut raw = $crate::Enumerated::default();
                $crate::ber::BerDecode::ber_decode(&mut raw, tag, el)?;
                *self = match raw.0 {
                    $( x if x == $value => $name::$variant, )+
                    _ => {
                        return Err($crate::ber::invalid_enumerated::<Self>(tag));
                    }
                };
                Ok(())
            }
        }

        impl $crate::ber::BerEncode for $name {
            fn ber_header(&self) -> Result<$crate::tlv::Header, $crate::Error> {
                $crate::ber::BerEncode::ber_header(&$crate::Enumerated(*self as i64))
            }

            fn ber_write_value(
                &self,
                w: &mut $crate::ber::ValueSink<'_>,
            ) -> Result<(), $crate::Error> {
                $crate::ber::BerEncode::ber_write_value(&$crate::Enumerated(*self as i64), w)
            }

            fn ber_is_zero(&self) -> bool {
                *self == Self::default()
            }
        }
    };
    (@first $first:expr $(, $rest:expr)*) => { $first };
}
