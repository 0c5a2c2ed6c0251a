//! # Streaming BER codec
//!
//! A streaming codec for the tag-length-value format of the ASN.1 Basic
//! Encoding Rules (BER, [[X.690]]), plus a typed value layer mapping the
//! ASN.1 UNIVERSAL types ([[X.680]]) to Rust values.
//!
//! The crate is split into two layers:
//!
//! * The [`tlv`] module handles the syntactic layer: identifier and
//!   length octets, the nesting of constructed values, definite and
//!   indefinite lengths, and end-of-contents markers. Its [`tlv::Decoder`]
//!   and [`tlv::Encoder`] process one header at a time over arbitrary
//!   readers and writers, never pulling bytes of the next top-level value
//!   ahead of time, and tolerate transient I/O errors: a failed call can
//!   be retried and resumes exactly where it stopped.
//! * The [`ber`] module handles the semantic layer: the
//!   [`ber::BerEncode`] and [`ber::BerDecode`] traits together with
//!   implementations for every supported UNIVERSAL type, field parameters
//!   (implicit and explicit tags, `optional`, `omitzero`, `nullable`), and
//!   a descriptor-driven SEQUENCE codec for structs.
//!
//! # Decoding and encoding values
//!
//! ```
//! use ber_stream::ber;
//!
//! let bytes = ber::to_vec(&723i64).unwrap();
//! assert_eq!(bytes, [0x02, 0x02, 0x02, 0xd3]);
//! let value: i64 = ber::from_bytes(&bytes).unwrap();
//! assert_eq!(value, 723);
//! ```
//!
//! Structs map to ASN.1 SEQUENCE through the [`ber_sequence!`] macro:
//!
//! ```
//! use ber_stream::{ber, ber_sequence};
//!
//! ber_sequence! {
//!     #[derive(Debug, Default, PartialEq)]
//!     pub struct Pair {
//!         a: i64 => "",
//!         b: i64 => "",
//!     }
//! }
//!
//! let bytes = ber::to_vec(&Pair { a: 1, b: 2 }).unwrap();
//! assert_eq!(bytes, [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
//! ```
//!
//! # Streaming
//!
//! [`ber::Decoder`] and [`ber::Encoder`] process a stream of top-level
//! values incrementally; the [`tlv`] layer can be used on its own to walk
//! arbitrary TLV structures one header at a time.
//!
//! # Limitations
//!
//! * The ASN.1 CHOICE type has no built-in support; implement the codec
//!   traits manually for types containing CHOICE components.
//! * TeletexString, VideotexString, GraphicString, GeneralString,
//!   EMBEDDED PDV, EXTERNAL and CHARACTER STRING are not supported.
//! * Only the Basic Encoding Rules are implemented; there is no DER or
//!   CER validation mode.
//!
//! [X.680]: https://www.itu.int/rec/T-REC-X.680/en
//! [X.690]: https://www.itu.int/rec/T-REC-X.690/en

#![deny(unstable_features, unused_import_braces, unused_qualifications)]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod macros;

pub mod ber;
mod error;
mod oid;
mod params;
mod tag;
pub mod time;
pub mod tlv;
mod types;
mod vlq;

pub use error::{Action, BerResult, EncodeError, Error, IoError, StructuralError, SyntaxError};
pub use oid::{Oid, RelativeOid};
pub use params::FieldParams;
pub use tag::{Class, Tag, MAX_TAG};
pub use types::{
    BitString, BmpString, Enumerated, Ia5String, Null, NumericString, OctetString,
    PrintableString, UniversalString, VisibleString,
};
