//! The field parameter grammar.

use crate::tag::{Class, Tag, MAX_TAG};

/// Parsed field parameters, attached to a sequence field or a top-level
/// value to adjust how it is encoded and decoded.
///
/// The textual form is a comma-separated list of the following parts;
/// unknown parts are ignored:
///
/// | part          | meaning                                              |
/// |---------------|------------------------------------------------------|
/// | `-`           | ignore this field entirely                           |
/// | `tag:N`       | implicit tag number N (context-specific by default)  |
/// | `application` | the tag uses the application class                   |
/// | `private`     | the tag uses the private class                       |
/// | `universal`   | the tag uses the universal class                     |
/// | `explicit`    | wrap the value in an explicit tag (requires `tag:N`) |
/// | `optional`    | the field may be absent when decoding                |
/// | `omitzero`    | omit the field when encoding its zero value          |
/// | `nullable`    | ASN.1 NULL stands in for the zero value              |
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FieldParams {
    /// The field takes no part in encoding or decoding.
    pub ignore: bool,
    /// Implicit (or, with `explicit`, explicit) tag override.
    pub tag: Option<Tag>,
    /// Wrap the intrinsic encoding in a constructed value with the
    /// override tag.
    pub explicit: bool,
    /// Leave the field at its current value if the next data value does
    /// not match its tag.
    pub optional: bool,
    /// Skip the field when encoding a zero value.
    pub omit_zero: bool,
    /// Accept NULL for the zero value and encode the zero value as NULL.
    pub nullable: bool,
}

impl FieldParams {
    /// No parameters: the intrinsic encoding of the type applies.
    pub const NONE: FieldParams = FieldParams {
        ignore: false,
        tag: None,
        explicit: false,
        optional: false,
        omit_zero: false,
        nullable: false,
    };

    /// Parses a parameter string. Unknown parts are ignored.
    pub fn parse(s: &str) -> FieldParams {
        let mut ret = FieldParams::default();
        let mut number = None;
        let mut class = None;
        for part in s.split(',') {
            match part.trim() {
                "-" => ret.ignore = true,
                "optional" => ret.optional = true,
                "explicit" => ret.explicit = true,
                "omitzero" => ret.omit_zero = true,
                "nullable" => ret.nullable = true,
                "application" => class = Some(Class::Application),
                "private" => class = Some(Class::Private),
                "universal" => class = Some(Class::Universal),
                part => {
                    if let Some(n) = part.strip_prefix("tag:") {
                        if let Ok(n) = n.parse::<u32>() {
                            if n <= MAX_TAG {
                                number = Some(n);
                            }
                        }
                    }
                }
            }
        }
        if let Some(number) = number {
            ret.tag = Some(Tag {
                class: class.unwrap_or(Class::ContextSpecific),
                number,
            });
        }
        ret
    }
}
