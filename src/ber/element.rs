//! Readers for the content octets of a single data value.

use crate::error::{Error, SyntaxError};
use crate::tag::Tag;
use crate::tlv::header::{Header, Length};
use crate::tlv::TlvRead;

/// A reader for the content octets of one BER data value.
///
/// A data value is either primitive, in which case its content octets are
/// read directly through [`Element::read`], or constructed, in which case
/// the content consists of further data values iterated with
/// [`Element::next`]. Reading methods report the end of the content even
/// if the underlying stream has more data.
///
/// Closing an element is optional but recommended: [`Element::close`]
/// discards unread content and, for constructed values, validates that the
/// remaining data values are syntactically well-formed.
///
/// An unrecoverable syntax error latches the element: subsequent calls
/// return the same error. Transient I/O errors do not latch and the failed
/// call can be retried.
pub struct Element<'a> {
    dec: &'a mut dyn TlvRead,
    header: Header,
    /// Decoder stack depth of this element's own entry. Zero marks the
    /// virtual element spanning the whole stream.
    depth: usize,
    /// A constructed element is done once its end-of-contents was seen.
    done: bool,
    closed: bool,
    latched: Option<SyntaxError>,
}

impl core::fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Element")
            .field("header", &self.header)
            .field("depth", &self.depth)
            .field("done", &self.done)
            .finish()
    }
}

impl<'a> Element<'a> {
    /// A reader for the data value whose header was just read from `dec`.
    pub(crate) fn new(dec: &'a mut dyn TlvRead, header: Header) -> Element<'a> {
        let depth = dec.depth();
        Element {
            dec,
            header,
            depth,
            done: false,
            closed: false,
            latched: None,
        }
    }

    /// A constructed pseudo-element spanning all top-level data values of
    /// the stream.
    pub(crate) fn stream(dec: &'a mut dyn TlvRead) -> Element<'a> {
        Element {
            dec,
            header: Header::constructed(Tag::END_OF_CONTENTS, Length::Indefinite),
            depth: 0,
            done: false,
            closed: false,
            latched: None,
        }
    }

    /// The header of the data value this element is reading.
    pub fn header(&self) -> Header {
        self.header
    }

    /// The tag of the data value.
    pub fn tag(&self) -> Tag {
        self.header.tag
    }

    /// Whether this element reads a constructed encoding.
    pub fn constructed(&self) -> bool {
        self.header.constructed
    }

    /// The number of bytes remaining in the value, or `None` if unknown
    /// (indefinite-length encoding). While a child element returned by
    /// [`Element::next`] is being read, the result is undefined.
    pub fn len(&self) -> Option<usize> {
        if self.header.constructed {
            if self.done {
                return Some(0);
            }
            self.dec.remaining()
        } else {
            Some(self.dec.value_remaining())
        }
    }

    /// Whether the element is in a valid state to read more data. This
    /// does not guarantee that the next read will produce data; it returns
    /// false once the end of the content has been reached or the element
    /// has latched an error.
    pub fn more(&self) -> bool {
        self.latched.is_none() && !self.done && !self.closed && self.len() != Some(0)
    }

    fn check(&self) -> Result<(), Error> {
        if let Some(e) = self.latched {
            return Err(Error::Syntax(e));
        }
        Ok(())
    }

    /// Records syntax errors so they are replayed by later calls.
    fn latch(&mut self, e: Error) -> Error {
        if let Error::Syntax(s) = &e {
            self.latched = Some(*s);
        }
        e
    }

    /// The current input offset, for error reporting.
    pub(crate) fn offset(&self) -> u64 {
        self.dec.offset()
    }

    /// A syntax error at the current position, attributed to this element.
    pub(crate) fn syntax(&self, msg: &'static str) -> Error {
        Error::Syntax(SyntaxError::new(self.header.tag, self.dec.offset(), msg))
    }

    /// Skips any descendants opened below this element so the decoder is
    /// positioned at this element's next child.
    fn resync(&mut self) -> Result<(), Error> {
        while self.dec.depth() > self.depth {
            self.dec.skip_value()?;
        }
        Ok(())
    }

    /// The header of the next child of this constructed element, or `None`
    /// at the end of the content. The child's content must then be
    /// consumed through [`Element::child`] (or the combined
    /// [`Element::next`]) before the following call.
    pub(crate) fn next_child_header(&mut self) -> Result<Option<Header>, Error> {
        if !self.constructed() {
            return Err(self.syntax("primitive encoding"));
        }
        self.check()?;
        if self.done {
            return Ok(None);
        }
        let step = match self.resync() {
            Ok(()) => self.dec.next_header(),
            Err(e) => Err(e),
        };
        match step {
            Ok(h) if h.is_end_of_contents() => {
                self.done = true;
                Ok(None)
            }
            Ok(h) => Ok(Some(h)),
            Err(Error::Eof) if self.depth == 0 => {
                // clean end of the stream closes the virtual element
                self.done = true;
                Ok(None)
            }
            Err(e) => Err(self.latch(e)),
        }
    }

    /// A reader for the child whose header was just returned by
    /// [`Element::next_child_header`].
    pub(crate) fn child(&mut self, h: Header) -> Element<'_> {
        Element::new(self.dec, h)
    }

    /// Parses the next data value of a constructed encoding, returning its
    /// header and a reader for its content. Returns `None` at the end of
    /// the content.
    ///
    /// The returned reader borrows this element; any content it leaves
    /// unread is discarded by the following call.
    pub fn next(&mut self) -> Result<Option<(Header, Element<'_>)>, Error> {
        match self.next_child_header()? {
            Some(h) => Ok(Some((h, self.child(h)))),
            None => Ok(None),
        }
    }

    /// Reads content octets of a primitive encoding. Returns 0 exactly at
    /// the end of the value.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.constructed() {
            return Err(self.syntax("constructed encoding"));
        }
        self.check()?;
        self.dec.value_read(buf).map_err(|e| self.latch(e))
    }

    /// Reads a single content octet, or `None` at the end of the value.
    pub fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut b = [0u8; 1];
        match self.read(&mut b)? {
            0 => Ok(None),
            _ => Ok(Some(b[0])),
        }
    }

    /// Reads the remaining content octets of a primitive encoding into a
    /// vector.
    pub fn read_all(&mut self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(self.len().unwrap_or(0));
        let mut buf = [0u8; 256];
        loop {
            match self.read(&mut buf)? {
                0 => return Ok(out),
                n => out.extend_from_slice(&buf[..n]),
            }
        }
    }

    /// Finishes the element. Unread content of a primitive encoding is
    /// discarded; the remaining children of a constructed encoding are
    /// read and syntactically validated, reporting the first error found.
    ///
    /// Closing is idempotent: repeated calls return the latched result.
    pub fn close(&mut self) -> Result<(), Error> {
        self.check()?;
        if self.closed {
            return Ok(());
        }
        if !self.constructed() {
            // no syntax requirements on primitive contents
            self.dec.skip_value().map_err(|e| self.latch(e))?;
            self.closed = true;
            return Ok(());
        }
        if self.depth == 0 {
            loop {
                match self.dec.next_header() {
                    Ok(_) => {}
                    Err(Error::Eof) => break,
                    Err(e) => return Err(self.latch(e)),
                }
            }
        } else {
            while !self.done {
                match self.dec.next_header() {
                    Ok(_) => {
                        if self.dec.depth() < self.depth {
                            self.done = true;
                        }
                    }
                    Err(e) => return Err(self.latch(e)),
                }
            }
        }
        self.done = true;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::Decoder;

    fn with_element<T>(
        data: &[u8],
        f: impl FnOnce(Header, &mut Element<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut dec = Decoder::new(data);
        let h = TlvRead::next_header(&mut dec)?;
        let mut el = Element::new(&mut dec, h);
        let res = f(h, &mut el)?;
        el.close()?;
        Ok(res)
    }

    #[test]
    fn primitive_element_reads_to_boundary() {
        let data = [0x04, 0x03, 0x61, 0x62, 0x63];
        let content = with_element(&data, |h, el| {
            assert!(!el.constructed());
            assert_eq!(h.tag, Tag::OCTET_STRING);
            assert_eq!(el.len(), Some(3));
            el.read_all()
        })
        .unwrap();
        assert_eq!(content, b"abc");
    }

    #[test]
    fn constructed_element_iterates_children() {
        let data = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        let values = with_element(&data, |_, el| {
            let mut out = Vec::new();
            while let Some((h, mut child)) = el.next()? {
                assert_eq!(h.tag, Tag::INTEGER);
                out.extend(child.read_all()?);
                child.close()?;
            }
            Ok(out)
        })
        .unwrap();
        assert_eq!(values, [1, 2]);
    }

    #[test]
    fn close_discards_unread_children() {
        let data = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02, 0x04, 0x00];
        let mut dec = Decoder::new(&data[..]);
        let h = TlvRead::next_header(&mut dec).unwrap();
        let mut el = Element::new(&mut dec, h);
        el.close().unwrap();
        el.close().unwrap(); // idempotent
        drop(el);
        // the stream continues after the closed element
        let h = TlvRead::next_header(&mut dec).unwrap();
        assert_eq!(h.tag, Tag::OCTET_STRING);
    }

    #[test]
    fn close_validates_nested_syntax() {
        // inner child exceeds its parent
        let data = [0x30, 0x05, 0x30, 0x03, 0x02, 0x03, 0x01];
        let mut dec = Decoder::new(&data[..]);
        let h = TlvRead::next_header(&mut dec).unwrap();
        let mut el = Element::new(&mut dec, h);
        let err = el.close().unwrap_err();
        match err {
            Error::Syntax(e) => assert_eq!(e.message(), "data value exceeds parent"),
            other => panic!("unexpected error: {other}"),
        }
        // the element is latched
        assert!(!el.more());
        assert!(el.close().is_err());
    }

    #[test]
    fn abandoned_child_is_skipped_on_next() {
        let data = [
            0x30, 0x08, 0x30, 0x03, 0x02, 0x01, 0x07, 0x02, 0x01, 0x2a,
        ];
        let value = with_element(&data, |_, el| {
            let (h, _) = el.next()?.expect("first child");
            assert_eq!(h.tag, Tag::SEQUENCE);
            // the nested sequence is dropped unread
            let (h, mut child) = el.next()?.expect("second child");
            assert_eq!(h.tag, Tag::INTEGER);
            let v = child.read_all()?;
            child.close()?;
            Ok(v)
        })
        .unwrap();
        assert_eq!(value, [0x2a]);
    }

    #[test]
    fn stream_element_ends_at_eof() {
        let data = [0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        let mut dec = Decoder::new(&data[..]);
        let mut root = Element::stream(&mut dec);
        let mut count = 0;
        while let Some((h, mut child)) = root.next().unwrap() {
            assert_eq!(h.tag, Tag::INTEGER);
            child.close().unwrap();
            count += 1;
        }
        assert_eq!(count, 2);
        assert!(!root.more());
    }
}
