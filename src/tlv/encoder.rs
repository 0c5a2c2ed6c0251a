//! The streaming TLV encoder.

use std::io::{self, Write};

use super::header::{Header, Length, END_OF_CONTENTS};
use super::io::FlushWriter;
use super::state::State;
use crate::error::{Error, SyntaxError};
use crate::tag::Tag;

/// Upper bound on the bytes of a single serialized header kept in the
/// scratch buffer: one identifier byte, up to five tag bytes, one length
/// byte and up to eight length bytes.
const SCRATCH_SIZE: usize = 16;

/// The progress of an open primitive value: unwritten content octets and
/// the full content length.
#[derive(Debug, Clone, Copy)]
struct OpenValue {
    remaining: usize,
    full: usize,
}

/// A streaming encoder for the TLV format used by the ASN.1 basic encoding
/// rules. It writes a stream of tag-length-value constructs, maintaining a
/// stack of the open constructed values to validate the structure.
///
/// At the end of every constructed value an [`END_OF_CONTENTS`] header must
/// be written, for both the definite and the indefinite-length encoding;
/// the two end-of-contents octets appear on the wire only for the
/// indefinite form. The internal buffer is flushed whenever a top-level
/// data value completes.
///
/// The encoder can be used in the presence of transient errors from the
/// underlying writer: when [`Encoder::write_header`] fails with
/// [`Error::Io`], retrying the call with the *same* header resumes the
/// interrupted write. Retrying with a different header fails with an
/// "unwritten data after write error" syntax error.
#[derive(Debug)]
pub struct Encoder<W> {
    state: State,
    writer: FlushWriter<W>,

    /// Committed output bytes.
    offset: u64,

    /// Serialized header bytes not yet accepted by the write buffer.
    /// `pending_header` identifies the header they belong to so that a
    /// retry can tell resumption from a conflicting write.
    scratch: [u8; SCRATCH_SIZE],
    scratch_len: usize,
    pending_header: Option<Header>,

    /// A completed call still owes a top-level flush. `resume` names the
    /// header of that call so its retry can be recognized and succeed.
    pending_flush: bool,
    resume: Option<Header>,

    /// The primitive value whose content octets are being written, if any.
    val: Option<OpenValue>,
}

impl<W: Write> Encoder<W> {
    /// Creates a new encoder writing to `w`.
    pub fn new(w: W) -> Encoder<W> {
        Encoder {
            state: State::new(),
            writer: FlushWriter::new(w),
            offset: 0,
            scratch: [0; SCRATCH_SIZE],
            scratch_len: 0,
            pending_header: None,
            pending_flush: false,
            resume: None,
            val: None,
        }
    }

    /// Writes the next TLV header to the output.
    ///
    /// For a primitive header with a non-zero length, the returned
    /// [`ValueWriter`] accepts exactly `h.length` content octets; the full
    /// value must be written before the next header. Writing a constructed
    /// header opens an enclosure that must later be closed by writing
    /// [`END_OF_CONTENTS`]. The encoder validates that `h` is permitted at
    /// the current position of the TLV structure.
    pub fn write_header(&mut self, h: Header) -> Result<Option<ValueWriter<'_, W>>, Error> {
        if self.pending_flush {
            self.writer.flush_all().map_err(Error::io_write)?;
            self.pending_flush = false;
        }
        if let Some(r) = self.resume.take() {
            if r == h {
                // retry of a call that only owed its final flush
                return Ok(None);
            }
        }
        if self.val.is_some() {
            return Err(self.syntax("data value not fully written"));
        }

        if h.tag == Tag::END_OF_CONTENTS {
            self.write_end_of_contents(h)?;
            return Ok(None);
        }

        if !h.constructed && h.length == Length::Indefinite {
            return Err(self.syntax("indefinite-length primitive data value"));
        }
        if let (Length::Definite(l), Length::Definite(rem)) =
            (h.total_len(), self.state.curr.remaining())
        {
            if l > rem {
                return Err(self.syntax("data value exceeds parent"));
            }
        }

        self.encode_scratch(h)?;
        self.flush_scratch()?;
        self.pending_header = None;
        self.writer.checkpoint();

        if h.constructed {
            self.state.push(h);
            return Ok(None);
        }
        let full = match (h.length, self.state.curr.remaining()) {
            (Length::Definite(l), Length::Definite(rem)) => l.min(rem),
            (Length::Definite(l), Length::Indefinite) => l,
            // rejected above
            (Length::Indefinite, _) => 0,
        };
        if full == 0 {
            if let Err(e) = self.finish_value(0) {
                self.resume = Some(h);
                return Err(e);
            }
            return Ok(None);
        }
        self.val = Some(OpenValue {
            remaining: full,
            full,
        });
        Ok(Some(ValueWriter { e: self }))
    }

    /// Flushes all buffered output to the underlying writer.
    ///
    /// The buffer is flushed automatically when a top-level value
    /// completes; an explicit flush is only needed to retry after such an
    /// automatic flush failed, or to push out a partially written stream.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush_all().map_err(Error::io_write)?;
        self.pending_flush = false;
        Ok(())
    }

    /// The number of constructed TLVs that have been opened and not yet
    /// closed. Level zero is the virtual top-level value; primitive values
    /// do not appear on the stack.
    pub fn stack_depth(&self) -> usize {
        self.state.depth()
    }

    /// The header at stack level `i`, between 0 and
    /// [`Encoder::stack_depth`] inclusive. Level 0 is the virtual top-level
    /// value: constructed, indefinite length, tag 0.
    pub fn stack_index(&self, i: usize) -> Header {
        self.state.index(i)
    }

    /// The current output byte offset: the location of the next byte after
    /// the most recently written header or value. Due to buffering, fewer
    /// bytes may have reached the underlying writer.
    pub fn output_offset(&self) -> u64 {
        match self.val {
            Some(v) => self.offset + (v.full - v.remaining) as u64,
            None => self.offset,
        }
    }

    /// The output offset at which the content octets of the current data
    /// value begin.
    pub fn data_value_offset(&self) -> u64 {
        match self.val {
            Some(_) => self.offset,
            None => self.offset - self.state.curr.offset as u64,
        }
    }

    /// A reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    fn syntax(&mut self, msg: &'static str) -> Error {
        // nothing of the offending header has been written
        self.scratch_len = 0;
        self.pending_header = None;
        Error::Syntax(SyntaxError::new(
            self.state.curr.header.tag,
            self.offset,
            msg,
        ))
    }

    /// Closes the current enclosure. The two end-of-contents octets are
    /// only emitted if the enclosure uses the indefinite-length encoding.
    fn write_end_of_contents(&mut self, h: Header) -> Result<(), Error> {
        if h != END_OF_CONTENTS {
            return Err(self.syntax("invalid end of contents"));
        }
        if self.state.root() {
            return Err(self.syntax("unexpected end of contents"));
        }
        match self.state.curr.header.length {
            Length::Indefinite => {
                self.encode_scratch(h)?;
                self.flush_scratch()?;
                self.pending_header = None;
            }
            Length::Definite(_) => {
                if self.state.curr.remaining() != Length::Definite(0) {
                    return Err(self.syntax("unexpected end of contents"));
                }
            }
        }
        self.state.pop();
        self.writer.checkpoint();
        if self.state.root() {
            if let Err(e) = self.writer.flush_all() {
                self.pending_flush = true;
                self.resume = Some(h);
                return Err(Error::io_write(e));
            }
        }
        Ok(())
    }

    /// Completes a primitive value: accounts for its content octets and
    /// flushes if it was a top-level value. On a flush error the value is
    /// committed anyway and the flush is owed to the next operation.
    fn finish_value(&mut self, full: usize) -> Result<(), Error> {
        self.val = None;
        self.state.curr.offset += full;
        self.offset += full as u64;
        if self.state.root() {
            self.writer.checkpoint();
            if let Err(e) = self.writer.flush_all() {
                self.pending_flush = true;
                return Err(Error::io_write(e));
            }
        }
        Ok(())
    }

    /// Serializes `h` into the scratch buffer. If the scratch buffer still
    /// holds bytes from an interrupted write, they must belong to the same
    /// header; the serialized form is then reused as is.
    fn encode_scratch(&mut self, h: Header) -> Result<(), Error> {
        if self.scratch_len > 0 {
            if self.pending_header != Some(h) {
                return Err(self.syntax("unwritten data after write error"));
            }
            return Ok(());
        }
        let mut len = 0usize;
        let mut buf = [0u8; SCRATCH_SIZE];
        let full = h.write_into(|b| -> Result<(), ()> {
            if len >= SCRATCH_SIZE {
                return Err(());
            }
            buf[len] = b;
            len += 1;
            Ok(())
        });
        if full.is_err() {
            return Err(self.syntax("header too large"));
        }
        // The header bytes count against the enclosure's remaining space.
        if let Length::Definite(rem) = self.state.curr.remaining() {
            if len > rem {
                return Err(self.syntax("truncated data value"));
            }
        }
        self.scratch[..len].copy_from_slice(&buf[..len]);
        self.scratch_len = len;
        self.pending_header = Some(h);
        Ok(())
    }

    /// Moves the scratch buffer into the write buffer. On error the
    /// remaining scratch bytes are retained for a retry.
    fn flush_scratch(&mut self) -> Result<(), Error> {
        if self.scratch_len == 0 {
            return Ok(());
        }
        let (n, res) = self.writer.write_buffered(&self.scratch[..self.scratch_len]);
        self.scratch.copy_within(n..self.scratch_len, 0);
        self.scratch_len -= n;
        self.offset += n as u64;
        self.state.curr.offset += n;
        res.map_err(Error::io_write)
    }
}

impl<W: Write> super::TlvWrite for Encoder<W> {
    fn put_header(&mut self, h: Header) -> Result<(), Error> {
        self.write_header(h).map(|_| ())
    }

    fn value_write(&mut self, buf: &[u8]) -> Result<(), Error> {
        let Some(mut val) = self.val else {
            if buf.is_empty() {
                return Ok(());
            }
            return Err(self.syntax("data value larger than its header indicates"));
        };
        if buf.len() > val.remaining {
            return Err(self.syntax("data value larger than its header indicates"));
        }
        let mut p = buf;
        while !p.is_empty() {
            let (n, res) = self.writer.write_buffered(p);
            val.remaining -= n;
            self.val = Some(val);
            p = &p[n..];
            res.map_err(Error::io_write)?;
        }
        if val.remaining == 0 {
            self.finish_value(val.full)?;
        }
        Ok(())
    }

    fn value_remaining(&self) -> usize {
        self.val.map(|v| v.remaining).unwrap_or(0)
    }
}

/// A writer for the content octets of a primitive TLV value.
///
/// The writer accepts exactly the number of content octets promised by the
/// value's header. Once the last octet is written the value is closed
/// automatically; if it was a top-level value the encoder's buffer is
/// flushed. Should that final flush fail transiently, an empty `write`
/// retries it.
#[derive(Debug)]
pub struct ValueWriter<'a, W: Write> {
    e: &'a mut Encoder<W>,
}

impl<W: Write> ValueWriter<'_, W> {
    /// The number of bytes in the unwritten portion of the value.
    pub fn len(&self) -> usize {
        self.e.val.map(|v| v.remaining).unwrap_or(0)
    }

    /// Whether the value has been written to completion.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<W: Write> Write for ValueWriter<'_, W> {
    fn write(&mut self, p: &[u8]) -> io::Result<usize> {
        if p.is_empty() {
            if self.e.pending_flush {
                self.e.writer.flush_all()?;
                self.e.pending_flush = false;
            }
            return Ok(0);
        }
        let Some(mut val) = self.e.val else {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write exceeds data value length",
            ));
        };
        let want = p.len().min(val.remaining);
        let (n, res) = self.e.writer.write_buffered(&p[..want]);
        val.remaining -= n;
        self.e.val = Some(val);
        if n == 0 {
            return res.map(|_| 0);
        }
        if val.remaining == 0 {
            // The value is complete either way; a failing top-level flush
            // is owed to the next operation (or an empty write).
            let _ = self.e.finish_value(val.full);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.e.writer.flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::header::Length;

    fn written(f: impl FnOnce(&mut Encoder<&mut Vec<u8>>)) -> Vec<u8> {
        let mut out = Vec::new();
        let mut e = Encoder::new(&mut out);
        f(&mut e);
        out
    }

    #[test]
    fn single_primitive_value() {
        let out = written(|e| {
            let mut w = e
                .write_header(Header::primitive(Tag::INTEGER, 1))
                .unwrap()
                .unwrap();
            w.write_all(&[0x15]).unwrap();
        });
        assert_eq!(out, [0x02, 0x01, 0x15]);
    }

    #[test]
    fn definite_constructed_value() {
        let out = written(|e| {
            e.write_header(Header::constructed(Tag::SEQUENCE, Length::Definite(3)))
                .unwrap();
            let mut w = e
                .write_header(Header::primitive(Tag::OCTET_STRING, 1))
                .unwrap()
                .unwrap();
            w.write_all(&[0x15]).unwrap();
            e.write_header(END_OF_CONTENTS).unwrap();
        });
        assert_eq!(out, [0x30, 0x03, 0x04, 0x01, 0x15]);
    }

    #[test]
    fn indefinite_constructed_value() {
        let out = written(|e| {
            e.write_header(Header::constructed(Tag::SEQUENCE, Length::Indefinite))
                .unwrap();
            let mut w = e
                .write_header(Header::primitive(Tag::OCTET_STRING, 1))
                .unwrap()
                .unwrap();
            w.write_all(&[0x15]).unwrap();
            e.write_header(END_OF_CONTENTS).unwrap();
        });
        assert_eq!(out, [0x30, 0x80, 0x04, 0x01, 0x15, 0x00, 0x00]);
    }

    #[test]
    fn zero_length_value_completes_immediately() {
        let out = written(|e| {
            assert!(e
                .write_header(Header::primitive(Tag::NULL, 0))
                .unwrap()
                .is_none());
            assert_eq!(e.stack_depth(), 0);
        });
        assert_eq!(out, [0x05, 0x00]);
    }

    #[test]
    fn large_tag_number() {
        let out = written(|e| {
            e.write_header(Header::primitive(Tag::universal(215), 0))
                .unwrap();
        });
        assert_eq!(out, [0x1f, 0x81, 0x57, 0x00]);
    }

    #[test]
    fn value_exceeding_parent_is_rejected() {
        let mut out = Vec::new();
        let mut e = Encoder::new(&mut out);
        e.write_header(Header::constructed(Tag::SEQUENCE, Length::Definite(3)))
            .unwrap();
        match e.write_header(Header::primitive(Tag::INTEGER, 2)) {
            Err(Error::Syntax(err)) => assert_eq!(err.message(), "data value exceeds parent"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn early_end_of_contents_is_rejected() {
        let mut out = Vec::new();
        let mut e = Encoder::new(&mut out);
        e.write_header(Header::constructed(Tag::SEQUENCE, Length::Definite(3)))
            .unwrap();
        match e.write_header(END_OF_CONTENTS) {
            Err(Error::Syntax(err)) => assert_eq!(err.message(), "unexpected end of contents"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn end_of_contents_at_root_is_rejected() {
        let mut out = Vec::new();
        let mut e = Encoder::new(&mut out);
        match e.write_header(END_OF_CONTENTS) {
            Err(Error::Syntax(err)) => assert_eq!(err.message(), "unexpected end of contents"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn incomplete_value_blocks_next_header() {
        let mut out = Vec::new();
        let mut e = Encoder::new(&mut out);
        e.write_header(Header::primitive(Tag::OCTET_STRING, 2))
            .unwrap();
        match e.write_header(Header::primitive(Tag::OCTET_STRING, 1)) {
            Err(Error::Syntax(err)) => assert_eq!(err.message(), "data value not fully written"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    /// A writer failing with a transient error before every successful write.
    struct Flaky {
        out: Vec<u8>,
        ready: bool,
    }

    impl Write for Flaky {
        fn write(&mut self, p: &[u8]) -> io::Result<usize> {
            if !self.ready {
                self.ready = true;
                return Err(io::ErrorKind::WouldBlock.into());
            }
            self.ready = false;
            let n = p.len().min(1);
            self.out.extend_from_slice(&p[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transient_write_errors_converge() {
        let mut e = Encoder::new(Flaky {
            out: Vec::new(),
            ready: false,
        });
        let seq = Header::constructed(Tag::SEQUENCE, Length::Indefinite);
        while let Err(err) = e.write_header(seq) {
            assert!(err.is_io(), "unexpected error: {err}");
        }
        let int = Header::primitive(Tag::INTEGER, 1);
        let mut done = false;
        while !done {
            match e.write_header(int) {
                Ok(Some(mut w)) => {
                    let mut buf: &[u8] = &[0x2a];
                    while !buf.is_empty() {
                        match w.write(buf) {
                            Ok(n) => buf = &buf[n..],
                            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                            Err(e) => panic!("value write failed: {e}"),
                        }
                    }
                    done = true;
                }
                Ok(None) => unreachable!(),
                Err(err) => assert!(err.is_io(), "unexpected error: {err}"),
            }
        }
        while let Err(err) = e.write_header(END_OF_CONTENTS) {
            assert!(err.is_io(), "unexpected error: {err}");
        }
        assert_eq!(e.stack_depth(), 0);
        // all bytes reached the flaky writer, exactly once
        assert_eq!(e.get_ref().out, [0x30, 0x80, 0x02, 0x01, 0x2a, 0x00, 0x00]);
    }

    /// A writer that never accepts any bytes.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn conflicting_retry_header_is_rejected() {
        let mut e = Encoder::new(Broken);
        // Open an enclosure so that no top-level flush interferes, then fill
        // the internal buffer to within one byte of its capacity.
        e.write_header(Header::constructed(Tag::SEQUENCE, Length::Definite(2000)))
            .unwrap();
        let mut w = e
            .write_header(Header::primitive(Tag::OCTET_STRING, 1015))
            .unwrap()
            .unwrap();
        assert_eq!(w.write(&[0u8; 1015]).unwrap(), 1015);
        drop(w);
        // The next header only partially fits the buffer; the rest stays in
        // the scratch buffer when the flush fails.
        let h = Header::primitive(Tag::OCTET_STRING, 10);
        match e.write_header(h) {
            Err(err) => assert!(err.is_io(), "unexpected error: {err}"),
            Ok(_) => panic!("write_header should not succeed on a broken writer"),
        }
        // Retrying with a different header while scratch bytes remain fails.
        match e.write_header(Header::primitive(Tag::OCTET_STRING, 11)) {
            Err(Error::Syntax(err)) => {
                assert_eq!(err.message(), "unwritten data after write error")
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
