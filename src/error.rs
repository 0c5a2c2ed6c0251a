//! Error types for the TLV and BER codecs.

use core::fmt;
use std::io;

use displaydoc::Display;
use thiserror::Error;

use crate::tag::Tag;

/// Holds the result of encoding and decoding functions.
pub type BerResult<T> = Result<T, Error>;

/// The error type shared by the TLV streaming layer and the BER value layer.
///
/// Transient I/O errors are reported as [`Error::Io`] and leave the codec in
/// the state before the failed call; the same call can be retried. All other
/// decoding errors describe either the wire bytes ([`Error::Syntax`]) or a
/// mismatch between valid wire bytes and the destination type
/// ([`Error::Structural`]).
#[derive(Debug, Error)]
pub enum Error {
    /// Ill-formed wire bytes or an ill-formed primitive payload.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Wire-syntactically valid bytes that do not fit the destination type.
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// The destination type has no codec for the encountered data.
    #[error("unsupported type: {0}")]
    UnsupportedType(&'static str),

    /// The caller passed an unusable decode target.
    #[error("invalid decode target: {0}")]
    InvalidDecodeTarget(&'static str),

    /// A value failed validation during encoding.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The underlying byte stream failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Clean end of the input stream at a top-level boundary.
    #[error("end of input")]
    Eof,

    /// Internal sentinel: the value does not want this tag.
    ///
    /// Used by the sequence codec to implement OPTIONAL fields. This variant
    /// is matched internally and never surfaced to callers.
    #[error("tag does not match")]
    TagMismatch,
}

impl Error {
    /// Returns true if the error is a transient I/O error and the failed
    /// call may be retried.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    pub(crate) fn is_tag_mismatch(&self) -> bool {
        match self {
            Error::TagMismatch => true,
            Error::Structural(e) => e.tag_mismatch,
            _ => false,
        }
    }

    pub(crate) fn io_read(source: io::Error) -> Self {
        Error::Io(IoError {
            action: Action::Read,
            source,
        })
    }

    pub(crate) fn io_write(source: io::Error) -> Self {
        Error::Io(IoError {
            action: Action::Write,
            source,
        })
    }
}

/// The ASN.1 data is not a valid BER encoding.
///
/// Carries the tag of the enclosing data value and the byte offset of the
/// first misencoded byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub struct SyntaxError {
    /// Tag of the constructed data value whose content contained the
    /// malformed bytes. [`Tag::END_OF_CONTENTS`] stands for the stream root.
    pub tag: Tag,
    /// Location of the error within the input.
    pub offset: u64,
    pub(crate) msg: &'static str,
}

impl SyntaxError {
    pub(crate) fn new(tag: Tag, offset: u64, msg: &'static str) -> Self {
        SyntaxError { tag, offset, msg }
    }

    /// A short description of the malformation.
    pub fn message(&self) -> &'static str {
        self.msg
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error")?;
        if self.tag != Tag::END_OF_CONTENTS {
            write!(f, " within {}", self.tag)?;
        }
        if self.offset > 0 {
            write!(f, " at offset {}", self.offset)?;
        }
        write!(f, ": {}", self.msg)
    }
}

/// The ASN.1 data is valid, but the destination type does not match or
/// cannot fit the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub struct StructuralError {
    /// Tag of the data value being decoded.
    pub tag: Tag,
    /// Name of the destination type.
    pub target: &'static str,
    pub(crate) msg: &'static str,
    pub(crate) tag_mismatch: bool,
}

impl StructuralError {
    pub(crate) fn new(tag: Tag, target: &'static str, msg: &'static str) -> Self {
        StructuralError {
            tag,
            target,
            msg,
            tag_mismatch: false,
        }
    }

    /// Marks this error as a tag mismatch so the sequence codec can offer
    /// the data value to the next OPTIONAL field.
    pub(crate) fn mismatch(mut self) -> Self {
        self.tag_mismatch = true;
        self
    }

    /// A short description of the mismatch.
    pub fn message(&self) -> &'static str {
        self.msg
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "structural error decoding {} into {}: {}",
            self.tag, self.target, self.msg
        )
    }
}

/// A value failed validation during encoding.
///
/// Errors returned by custom [`BerEncode`](crate::ber::BerEncode)
/// implementations are wrapped in an `EncodeError` identifying the offending
/// value's type.
#[derive(Debug, Error)]
#[error("encode error for {target}: {source}")]
pub struct EncodeError {
    /// Name of the type that failed to encode.
    pub target: &'static str,
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl EncodeError {
    pub(crate) fn new(
        target: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        EncodeError {
            target,
            source: source.into(),
        }
    }

    pub(crate) fn msg(target: &'static str, msg: &'static str) -> Self {
        EncodeError {
            target,
            source: msg.into(),
        }
    }
}

/// The direction of the stream operation that failed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// read
    Read,
    /// write
    Write,
}

/// A transport-level error from the underlying reader or writer.
///
/// The codec state is rewound to the last committed point, so the failed
/// call can be retried once the stream recovers.
#[derive(Debug, Error)]
#[error("{action} error: {source}")]
pub struct IoError {
    /// Whether the error occurred while reading or writing.
    pub action: Action,
    source: io::Error,
}

impl IoError {
    /// The underlying I/O error.
    pub fn get_ref(&self) -> &io::Error {
        &self.source
    }

    /// Consumes the error, returning the underlying I/O error.
    pub fn into_inner(self) -> io::Error {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_display() {
        let e = SyntaxError::new(Tag::SEQUENCE, 2, "data value exceeds parent");
        assert_eq!(
            e.to_string(),
            "syntax error within [UNIVERSAL 16] at offset 2: data value exceeds parent"
        );
    }

    #[test]
    fn structural_error_display() {
        let e = StructuralError::new(Tag::INTEGER, "u8", "integer too large");
        assert_eq!(
            e.to_string(),
            "structural error decoding [UNIVERSAL 2] into u8: integer too large"
        );
    }

    #[test]
    fn errors_are_std_errors() {
        let e = Error::from(SyntaxError::new(Tag::INTEGER, 0, "empty integer"));
        let _: &dyn std::error::Error = &e;
    }
}
