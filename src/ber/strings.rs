//! Reassembly of constructed string encodings.

use super::element::Element;
use crate::error::{Error, SyntaxError};
use crate::tag::Tag;

/// A reader flattening the ASN.1 string types.
///
/// String types (OCTET STRING, BIT STRING, the character strings) may use
/// the constructed encoding, nesting segments arbitrarily deep. Every
/// nested data value must carry the same tag as the outer string. A
/// `StringReader` walks all primitive leaves in order, either one leaf at
/// a time through [`StringReader::for_each_leaf`] or materialized through
/// [`StringReader::bytes`] and [`StringReader::string`].
pub struct StringReader<'r, 'a> {
    tag: Tag,
    el: &'r mut Element<'a>,
}

impl core::fmt::Debug for StringReader<'_, '_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StringReader")
            .field("tag", &self.tag)
            .field("element", &self.el)
            .finish()
    }
}

impl<'r, 'a> StringReader<'r, 'a> {
    /// Creates a reader for the string read by `el`, which may use the
    /// primitive or the constructed encoding. Nested data values must
    /// carry `tag`.
    pub fn new(tag: Tag, el: &'r mut Element<'a>) -> StringReader<'r, 'a> {
        StringReader { tag, el }
    }

    /// Calls `f` once for every primitive leaf of the string, in order.
    /// Empty leaves are visited as well.
    pub fn for_each_leaf(
        &mut self,
        f: &mut dyn FnMut(&mut Element<'_>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        walk(self.el, self.tag, f)
    }

    /// Reads the entire string as a single byte sequence, combining all
    /// segments of a constructed encoding.
    pub fn bytes(&mut self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(self.el.len().unwrap_or(0));
        self.for_each_leaf(&mut |leaf| {
            out.append(&mut leaf.read_all()?);
            Ok(())
        })?;
        Ok(out)
    }

    /// Reads the entire string as UTF-8 text.
    pub fn string(&mut self) -> Result<String, Error> {
        let tag = self.tag;
        let offset = self.el.offset();
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|_| {
            Error::Syntax(SyntaxError::new(tag, offset, "string contains invalid characters"))
        })
    }
}

fn walk(
    el: &mut Element<'_>,
    tag: Tag,
    f: &mut dyn FnMut(&mut Element<'_>) -> Result<(), Error>,
) -> Result<(), Error> {
    if !el.constructed() {
        return f(el);
    }
    while let Some(h) = el.next_child_header()? {
        if h.tag != tag {
            return Err(Error::Syntax(SyntaxError::new(
                tag,
                el.offset(),
                "non-matching encoding in constructed string",
            )));
        }
        let mut child = el.child(h);
        walk(&mut child, tag, f)?;
        child.close()?;
    }
    Ok(())
}
