//! The streaming TLV decoder.

use std::io::{self, Read};

use super::header::{Header, Length, END_OF_CONTENTS};
use super::io::FillReader;
use super::state::State;
use crate::error::{Error, SyntaxError};
use crate::tag::Tag;
use crate::vlq;

/// Upper bound on the bytes of a single header kept for replay: one
/// identifier byte, up to six tag bytes (a 30-bit tag number errors out
/// within six), one length byte and up to eight length bytes. Redundant
/// leading zero length bytes are dropped from the buffer as they arrive.
const PEEK_BUF_SIZE: usize = 16;

/// Tag numbers are limited to 30 bits.
const MAX_TAG_BITS: u32 = 30;

/// An intermediate decoding error, before it is attributed to a location.
enum Raw {
    Io(io::Error),
    /// Clean end of stream before any byte of a header.
    Eof,
    /// End of stream inside a header or value.
    UnexpectedEof,
    Syntax(&'static str),
}

/// Maps a clean end of stream to an unexpected one, for reads past the
/// first header byte.
fn no_eof(e: Raw) -> Raw {
    match e {
        Raw::Eof => Raw::UnexpectedEof,
        e => e,
    }
}

/// The progress of an open primitive value: unread content octets and the
/// full effective content length.
#[derive(Debug, Clone, Copy)]
struct OpenValue {
    remaining: usize,
    full: usize,
}

/// A streaming decoder for the TLV format used by the ASN.1 basic encoding
/// rules. It reads a stream of tag-length-value constructs, maintaining a
/// stack of the open constructed values to validate the structure.
///
/// The decoder can be used in the presence of transient errors from the
/// underlying reader: if [`Decoder::read_header`] fails with
/// [`Error::Io`], no decoder state has changed and the call can be
/// retried. Bytes already taken from the reader are replayed from an
/// internal buffer, so a retry resumes exactly where the failed call
/// stopped.
#[derive(Debug)]
pub struct Decoder<R> {
    state: State,
    reader: FillReader<R>,

    /// Offset of the first byte of the next header (or of the current
    /// primitive value's content).
    base_offset: u64,
    /// Bytes consumed from the reader during the current (uncommitted)
    /// header parse. Dropped leading zero length bytes are included.
    peek_offset: usize,

    /// Replay buffer for the header currently being parsed. `peek_at` is
    /// the next read/write position, `peek_len` the number of valid bytes.
    peek_buf: [u8; PEEK_BUF_SIZE],
    peek_at: usize,
    peek_len: usize,

    /// The primitive value whose content octets are being read, if any.
    val: Option<OpenValue>,
}

impl<R: Read> Decoder<R> {
    /// Creates a new decoder reading from `r`.
    ///
    /// The decoder buffers at most the bytes belonging to the current
    /// top-level TLV: between top-level values the internal fill limit is
    /// zero so that no byte of the next value is pulled from the reader
    /// ahead of time. If a top-level value uses the indefinite-length
    /// format, the decoder may buffer past its end.
    pub fn new(r: R) -> Decoder<R> {
        Decoder {
            state: State::new(),
            reader: FillReader::new(r),
            base_offset: 0,
            peek_offset: 0,
            peek_buf: [0; PEEK_BUF_SIZE],
            peek_at: 0,
            peek_len: 0,
            val: None,
        }
    }

    /// Reads the next TLV header from the input.
    ///
    /// At the end of a constructed value an [`END_OF_CONTENTS`] header is
    /// returned, for both the definite and the indefinite-length encoding.
    /// For a primitive header the second return value is a [`Value`]
    /// reading the content octets; it is valid until the next header
    /// operation, and unread content is discarded at that point. A
    /// constructed header opens an enclosure on the decoder's stack.
    ///
    /// At a clean end of the stream between top-level values,
    /// [`Error::Eof`] is returned.
    pub fn read_header(&mut self) -> Result<(Header, Option<Value<'_, R>>), Error> {
        self.peek_at = 0;
        let h = match self.next_header(true) {
            Ok(h) => h,
            Err(e) => return Err(self.attribute(e)),
        };

        // The header is committed: drop the replay buffer and move the base
        // offset past it.
        self.base_offset += self.peek_offset as u64;
        self.peek_len = 0;
        self.peek_offset = 0;

        // Keep buffering confined to the current top-level value.
        match self.state.depth() {
            1 => self.reader.set_limit(self.state.curr.remaining().definite()),
            0 => match self.val {
                Some(v) => self.reader.set_limit(Some(v.remaining)),
                None => self.reader.set_limit(Some(0)),
            },
            _ => {}
        }

        if h.constructed || h.is_end_of_contents() {
            return Ok((h, None));
        }
        Ok((h, Some(Value { d: self })))
    }

    /// Returns the header the next [`Decoder::read_header`] call will
    /// produce, without committing it.
    ///
    /// Peeking does not move the stream position from the caller's
    /// perspective and does not change the stack: the stack depth before
    /// and after a peek is the same, and a subsequent `read_header` returns
    /// the identical header. Any unread content of a previously returned
    /// [`Value`] is discarded, exactly as `read_header` would do.
    pub fn peek_header(&mut self) -> Result<Header, Error> {
        self.peek_at = 0;
        let res = self.next_header(false);
        // rewind so the committing read replays the same bytes
        self.peek_at = 0;
        res.map_err(|e| self.attribute(e))
    }

    /// Discards the remainder of the current value.
    ///
    /// For a primitive value only the unread content octets are dropped.
    /// For a constructed value, everything up to and including its matching
    /// end-of-contents is read and structurally validated.
    ///
    /// Like `read_header`, a failed `skip` can be retried after a transient
    /// I/O error and resumes where it stopped.
    pub fn skip(&mut self) -> Result<(), Error> {
        if self.val.is_some() {
            self.peek_at = 0;
            return self.discard_value().map_err(|e| self.attribute(e));
        }
        let depth = self.stack_depth();
        while self.stack_depth() >= depth {
            self.read_header()?;
        }
        Ok(())
    }

    /// The number of constructed TLVs open at the current location.
    ///
    /// Level zero is the virtual top-level value representing the stream as
    /// a whole; primitive values do not appear on the stack.
    pub fn stack_depth(&self) -> usize {
        self.state.depth()
    }

    /// The header at stack level `i`, between 0 and
    /// [`Decoder::stack_depth`] inclusive. Level 0 is the virtual
    /// top-level value: constructed, indefinite length, tag 0.
    pub fn stack_index(&self, i: usize) -> Header {
        self.state.index(i)
    }

    /// The current input byte offset. Due to buffering, more bytes may have
    /// been taken from the underlying reader.
    pub fn input_offset(&self) -> u64 {
        match self.val {
            Some(v) => self.base_offset + (v.full - v.remaining) as u64,
            None => self.base_offset,
        }
    }

    /// The input offset at which the content octets of the current data
    /// value begin.
    pub fn data_value_offset(&self) -> u64 {
        match self.val {
            Some(_) => self.base_offset,
            None => self.base_offset - self.state.curr.offset as u64,
        }
    }

    /// Attributes a raw error to the current location.
    fn attribute(&self, e: Raw) -> Error {
        match e {
            Raw::Io(e) => Error::io_read(e),
            Raw::Eof => Error::Eof,
            Raw::UnexpectedEof => Error::Syntax(SyntaxError::new(
                self.state.curr.header.tag,
                self.input_offset(),
                "unexpected end of input",
            )),
            Raw::Syntax(msg) => Error::Syntax(SyntaxError::new(
                self.state.curr.header.tag,
                self.base_offset,
                msg,
            )),
        }
    }

    /// Advances one header, optionally committing state changes.
    ///
    /// Completing a pending primitive value always commits (the bytes are
    /// consumed either way); the stack push/pop and the opening of a new
    /// value are only applied when `commit` is true.
    fn next_header(&mut self, commit: bool) -> Result<Header, Raw> {
        if self.val.is_some() {
            self.discard_value()?;
        }
        if self.state.curr.remaining() == Length::Definite(0) {
            if commit {
                self.state.pop();
            }
            return Ok(END_OF_CONTENTS);
        }

        let h = match self.decode_header() {
            Ok(h) => h,
            Err(e) if self.state.root() => return Err(e),
            Err(e) => return Err(no_eof(e)),
        };

        if h.is_end_of_contents() {
            if !self.state.root() && self.state.curr.header.length == Length::Indefinite {
                if commit {
                    self.state.pop();
                }
                return Ok(h);
            }
            return Err(Raw::Syntax("unexpected end of contents"));
        }
        if h.tag == Tag::END_OF_CONTENTS {
            // tag 0 is reserved for the end-of-contents marker
            return Err(Raw::Syntax("invalid end of contents"));
        }
        if !h.constructed && h.length == Length::Indefinite {
            return Err(Raw::Syntax("indefinite-length primitive data value"));
        }
        if let (Length::Definite(l), Length::Definite(rem)) = (h.length, self.state.curr.remaining())
        {
            if l > rem {
                return Err(Raw::Syntax("data value exceeds parent"));
            }
        }
        if commit {
            if h.constructed {
                self.state.push(h);
            } else {
                let full = match (h.length, self.state.curr.remaining()) {
                    (Length::Definite(l), Length::Definite(rem)) => l.min(rem),
                    (Length::Definite(l), Length::Indefinite) => l,
                    // rejected above
                    (Length::Indefinite, _) => 0,
                };
                self.val = Some(OpenValue {
                    remaining: full,
                    full,
                });
            }
        }
        Ok(h)
    }

    /// Decodes the identifier and length octets of the next header.
    fn decode_header(&mut self) -> Result<Header, Raw> {
        let b0 = self.parse_byte()?;
        let (class, constructed, low) = super::header::split_identifier(b0);

        let number = if low == 0x1f {
            let mut acc = vlq::Accumulator::new(true, MAX_TAG_BITS);
            loop {
                let b = self.parse_byte().map_err(no_eof)?;
                match acc.push(b) {
                    Ok(Some(v)) => break v as u32,
                    Ok(None) => {}
                    Err(vlq::VlqError::NotMinimal) => {
                        return Err(Raw::Syntax("tag number is not minimally encoded"))
                    }
                    Err(_) => return Err(Raw::Syntax("tag number too large")),
                }
            }
        } else {
            u32::from(low)
        };
        let tag = Tag { class, number };

        let b = self.parse_byte().map_err(no_eof)?;
        let length = if b & 0x80 == 0 {
            Length::Definite(usize::from(b))
        } else if b == 0x80 {
            Length::Indefinite
        } else {
            // Long form: the low seven bits give the number of length bytes.
            // peek_at points one past the count byte, which is always in the
            // replay buffer.
            let count_idx = self.peek_at - 1;
            let mut num_bytes = usize::from(b & 0x7f);
            let mut len: usize = 0;
            while num_bytes > 0 {
                let b = self.parse_byte().map_err(no_eof)?;
                if len > usize::MAX >> 8 {
                    return Err(Raw::Syntax("length too large"));
                }
                len = len << 8 | usize::from(b);
                num_bytes -= 1;
                if len == 0 && num_bytes > 0 {
                    // Redundant leading zero length byte: drop it from the
                    // replay buffer and patch the stored count so a replay
                    // parses the normalized header.
                    self.peek_at -= 1;
                    self.peek_len -= 1;
                    self.peek_buf[count_idx] -= 1;
                }
            }
            if tag == Tag::END_OF_CONTENTS && !constructed && len == 0 {
                // a long-form zero length is not a valid end-of-contents
                return Err(Raw::Syntax("invalid end of contents"));
            }
            Length::Definite(len)
        };

        Ok(Header {
            tag,
            constructed,
            length,
        })
    }

    /// Reads one header byte, replaying from the peek buffer first. Fresh
    /// bytes are appended to the peek buffer so a failed parse can resume.
    fn parse_byte(&mut self) -> Result<u8, Raw> {
        if self.state.curr.remaining() == Length::Definite(0) {
            return Err(Raw::Syntax("truncated data value"));
        }
        if self.peek_at < self.peek_len {
            let b = self.peek_buf[self.peek_at];
            self.peek_at += 1;
            return Ok(b);
        }
        if self.peek_at >= PEEK_BUF_SIZE {
            return Err(Raw::Syntax("header too large"));
        }
        match self.reader.read_byte() {
            Ok(Some(b)) => {
                self.peek_buf[self.peek_at] = b;
                self.peek_at += 1;
                self.peek_len += 1;
                self.peek_offset += 1;
                self.state.curr.offset += 1;
                Ok(b)
            }
            Ok(None) => Err(Raw::Eof),
            Err(e) => Err(Raw::Io(e)),
        }
    }

    /// Discards the rest of the open primitive value and accounts for it.
    ///
    /// A transient error leaves the progress recorded, so a retry resumes
    /// with the bytes still to be discarded.
    fn discard_value(&mut self) -> Result<(), Raw> {
        let Some(mut val) = self.val else {
            return Ok(());
        };

        let mut scratch = [0u8; 256];
        while val.remaining > 0 {
            let chunk = val.remaining.min(scratch.len());
            match self.reader.read(&mut scratch[..chunk]) {
                Ok(0) => {
                    self.val = Some(val);
                    return Err(Raw::UnexpectedEof);
                }
                Ok(n) => {
                    val.remaining -= n;
                    self.val = Some(val);
                }
                Err(e) => {
                    self.val = Some(val);
                    return Err(Raw::Io(e));
                }
            }
        }

        // The whole value is consumed; account for it exactly once.
        self.val = None;
        self.base_offset += (self.peek_offset + val.full) as u64;
        self.peek_offset = 0;
        self.peek_len = 0;
        self.state.curr.offset += val.full;
        if self.state.root() {
            self.reader.set_limit(Some(0));
        }
        Ok(())
    }
}

impl<R: Read> super::TlvRead for Decoder<R> {
    fn next_header(&mut self) -> Result<Header, Error> {
        self.read_header().map(|(h, _)| h)
    }

    fn skip_value(&mut self) -> Result<(), Error> {
        self.skip()
    }

    fn depth(&self) -> usize {
        self.stack_depth()
    }

    fn offset(&self) -> u64 {
        self.input_offset()
    }

    fn remaining(&self) -> Option<usize> {
        self.state.curr.remaining().definite()
    }

    fn value_remaining(&self) -> usize {
        self.val.map(|v| v.remaining).unwrap_or(0)
    }

    fn value_read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let Some(mut val) = self.val else {
            return Ok(0);
        };
        if val.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(val.remaining);
        match self.reader.read(&mut buf[..want]) {
            Ok(0) => Err(Error::Syntax(SyntaxError::new(
                self.state.curr.header.tag,
                self.input_offset(),
                "unexpected end of input",
            ))),
            Ok(n) => {
                val.remaining -= n;
                self.val = Some(val);
                Ok(n)
            }
            Err(e) => Err(Error::io_read(e)),
        }
    }
}

/// The content octets of a primitive TLV value.
///
/// `Value` implements [`std::io::Read`] and reports end of file exactly at
/// the value boundary. Reading less than the full value is valid; the
/// remaining bytes are discarded by the next header operation on the
/// decoder. If the underlying reader ends before the value is complete, an
/// [`io::ErrorKind::UnexpectedEof`] error is returned.
#[derive(Debug)]
pub struct Value<'a, R> {
    d: &'a mut Decoder<R>,
}

impl<R: Read> Value<'_, R> {
    /// The number of bytes in the unread portion of the value.
    pub fn len(&self) -> usize {
        self.d.val.map(|v| v.remaining).unwrap_or(0)
    }

    /// Whether the value has been read to completion.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a single content octet, or `None` at the value boundary.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut b = [0u8; 1];
        match self.read(&mut b)? {
            0 => Ok(None),
            _ => Ok(Some(b[0])),
        }
    }
}

impl<R: Read> Read for Value<'_, R> {
    fn read(&mut self, p: &mut [u8]) -> io::Result<usize> {
        let Some(mut val) = self.d.val else {
            return Ok(0);
        };
        if val.remaining == 0 || p.is_empty() {
            return Ok(0);
        }
        let want = p.len().min(val.remaining);
        let n = self.d.reader.read(&mut p[..want])?;
        val.remaining -= n;
        self.d.val = Some(val);
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::header::Length;

    fn decoder(data: &[u8]) -> Decoder<&[u8]> {
        Decoder::new(data)
    }

    #[test]
    fn primitive_top_level() {
        let mut d = decoder(&[0x02, 0x02, 0x02, 0xd3]);
        let (h, val) = d.read_header().unwrap();
        assert_eq!(h, Header::primitive(Tag::INTEGER, 2));
        let mut buf = Vec::new();
        val.unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, [0x02, 0xd3]);
        assert_eq!(d.stack_depth(), 0);
        assert!(matches!(d.read_header(), Err(Error::Eof)));
        assert_eq!(d.input_offset(), 4);
    }

    #[test]
    fn definite_sequence_with_synthetic_eoc() {
        let mut d = decoder(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
        let (h, _) = d.read_header().unwrap();
        assert!(h.constructed);
        assert_eq!(d.stack_depth(), 1);
        let (h1, v1) = d.read_header().unwrap();
        assert_eq!(h1, Header::primitive(Tag::INTEGER, 1));
        assert_eq!(v1.unwrap().read_byte().unwrap(), Some(1));
        let (h2, _) = d.read_header().unwrap();
        assert_eq!(h2, Header::primitive(Tag::INTEGER, 1));
        // unread value is discarded by the next header operation
        let (eoc, none) = d.read_header().unwrap();
        assert!(eoc.is_end_of_contents());
        assert!(none.is_none());
        assert_eq!(d.stack_depth(), 0);
        assert!(matches!(d.read_header(), Err(Error::Eof)));
    }

    #[test]
    fn nested_indefinite() {
        // SEQUENCE (indef) { SEQUENCE (indef) { INTEGER 0x15 } }
        let data = [0x30, 0x80, 0x30, 0x80, 0x02, 0x01, 0x15, 0x00, 0x00, 0x00, 0x00];
        let mut d = decoder(&data);
        for _ in 0..3 {
            d.read_header().unwrap();
        }
        assert_eq!(d.stack_depth(), 2);
        let (eoc1, _) = d.read_header().unwrap(); // discards the integer, closes the inner seq
        assert!(eoc1.is_end_of_contents());
        let (eoc2, _) = d.read_header().unwrap();
        assert!(eoc2.is_end_of_contents());
        assert_eq!(d.stack_depth(), 0);
        assert_eq!(d.input_offset(), 11);
    }

    #[test]
    fn child_exceeding_parent_is_rejected() {
        let mut d = decoder(&[0x30, 0x03, 0x02, 0x02, 0x15, 0x15]);
        d.read_header().unwrap();
        match d.read_header() {
            Err(Error::Syntax(e)) => {
                assert_eq!(e.message(), "data value exceeds parent");
                assert_eq!(e.offset, 2);
                assert_eq!(e.tag, Tag::SEQUENCE);
            }
            other => panic!("unexpected result: {:?}", other.map(|(h, _)| h)),
        }
    }

    #[test]
    fn unexpected_eoc_at_root() {
        let mut d = decoder(&[0x00, 0x00]);
        match d.read_header() {
            Err(Error::Syntax(e)) => assert_eq!(e.message(), "unexpected end of contents"),
            other => panic!("unexpected result: {:?}", other.map(|(h, _)| h)),
        }
    }

    #[test]
    fn primitive_indefinite_is_rejected() {
        let mut d = decoder(&[0x02, 0x80, 0x00, 0x00]);
        match d.read_header() {
            Err(Error::Syntax(e)) => {
                assert_eq!(e.message(), "indefinite-length primitive data value")
            }
            other => panic!("unexpected result: {:?}", other.map(|(h, _)| h)),
        }
    }

    #[test]
    fn redundant_length_zeros_are_tolerated() {
        // INTEGER, long-form length with three redundant zero bytes
        let mut d = decoder(&[0x02, 0x84, 0x00, 0x00, 0x00, 0x01, 0x2a]);
        let (h, val) = d.read_header().unwrap();
        assert_eq!(h.length, Length::Definite(1));
        assert_eq!(val.unwrap().read_byte().unwrap(), Some(0x2a));
    }

    #[test]
    fn peek_is_idempotent_and_depth_invariant() {
        let mut d = decoder(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
        for _ in 0..4 {
            let depth = d.stack_depth();
            let h1 = d.peek_header().unwrap();
            assert_eq!(d.stack_depth(), depth);
            let h2 = d.peek_header().unwrap();
            assert_eq!(h1, h2);
            let (h3, _) = d.read_header().unwrap();
            assert_eq!(h1, h3);
        }
        assert_eq!(d.stack_depth(), 0);
        assert!(matches!(d.peek_header(), Err(Error::Eof)));
    }

    #[test]
    fn skip_primitive_and_constructed() {
        let data = [
            0x30, 0x80, 0x02, 0x01, 0x01, 0x00, 0x00, // SEQUENCE (indef) { INTEGER 1 }
            0x02, 0x01, 0x2a, // INTEGER 42
        ];
        let mut d = decoder(&data);
        d.read_header().unwrap();
        d.skip().unwrap(); // recursively skips to the matching end-of-contents
        assert_eq!(d.stack_depth(), 0);
        let (h, mut val) = d.read_header().unwrap();
        assert_eq!(h, Header::primitive(Tag::INTEGER, 1));
        assert_eq!(val.as_mut().unwrap().read_byte().unwrap(), Some(0x2a));
    }

    /// A reader failing with a transient error before every successful read.
    struct Flaky<'a> {
        data: &'a [u8],
        pos: usize,
        ready: bool,
    }

    impl Read for Flaky<'_> {
        fn read(&mut self, p: &mut [u8]) -> io::Result<usize> {
            if !self.ready {
                self.ready = true;
                return Err(io::ErrorKind::WouldBlock.into());
            }
            self.ready = false;
            if self.pos == self.data.len() {
                return Ok(0);
            }
            p[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn transient_errors_converge() {
        let data = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        let mut d = Decoder::new(Flaky {
            data: &data,
            pos: 0,
            ready: false,
        });
        let mut headers = Vec::new();
        loop {
            match d.read_header() {
                Ok((h, mut val)) => {
                    if let Some(v) = val.as_mut() {
                        let mut buf = Vec::new();
                        loop {
                            match v.read_to_end(&mut buf) {
                                Ok(_) => break,
                                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                                Err(e) => panic!("value read failed: {e}"),
                            }
                        }
                    }
                    let done = h.is_end_of_contents();
                    headers.push(h);
                    if done {
                        break;
                    }
                }
                Err(Error::Io(_)) => continue,
                Err(e) => panic!("decode failed: {e}"),
            }
        }
        assert_eq!(headers.len(), 4);
        assert_eq!(headers[1], Header::primitive(Tag::INTEGER, 1));
        assert_eq!(d.input_offset(), 8);
    }

    #[test]
    fn long_form_tags_round_trip_through_decoder() {
        for number in [30u32, 31, 128, 16383, 16384] {
            let mut bytes = Vec::new();
            Header::primitive(Tag::universal(number), 0)
                .write_into(|b| -> Result<(), ()> {
                    bytes.push(b);
                    Ok(())
                })
                .unwrap();
            let mut d = decoder(&bytes);
            let (h, _) = d.read_header().unwrap();
            assert_eq!(h.tag.number, number);
        }
    }

    #[test]
    fn non_minimal_tag_rejected() {
        let mut d = decoder(&[0x1f, 0x80, 0x01, 0x00]);
        match d.read_header() {
            Err(Error::Syntax(e)) => {
                assert_eq!(e.message(), "tag number is not minimally encoded")
            }
            other => panic!("unexpected result: {:?}", other.map(|(h, _)| h)),
        }
    }

    #[test]
    fn truncated_header_inside_parent() {
        // parent claims 1 byte of content, child header needs two
        let mut d = decoder(&[0x30, 0x01, 0x02]);
        d.read_header().unwrap();
        match d.read_header() {
            Err(Error::Syntax(e)) => assert_eq!(e.message(), "truncated data value"),
            other => panic!("unexpected result: {:?}", other.map(|(h, _)| h)),
        }
    }
}
