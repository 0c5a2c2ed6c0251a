//! Internal buffered I/O with bounded look-ahead.

use std::io::{self, Read, Write};

const BUF_SIZE: usize = 1024;

/// A buffered reader with a limit on how far ahead buffer fills may read.
///
/// The limit controls the number of additional bytes that may be read from
/// the underlying reader to fill the buffer:
///
/// * `Some(0)` disables read-ahead; reads pass through to the underlying
///   reader.
/// * `None` allows buffer fills to read arbitrarily far ahead.
/// * `Some(n)` allows at most `n` bytes to be read during buffer fills.
///
/// The limit is decremented by bytes actually consumed from the underlying
/// reader. Even with a limit of `Some(0)`, reads are served from the buffer
/// while it holds data.
#[derive(Debug)]
pub(crate) struct FillReader<R> {
    inner: R,
    buf: Box<[u8]>,
    r: usize,
    w: usize,
    limit: Option<usize>,
}

impl<R: Read> FillReader<R> {
    pub fn new(inner: R) -> Self {
        FillReader {
            inner,
            buf: vec![0; BUF_SIZE].into_boxed_slice(),
            r: 0,
            w: 0,
            limit: Some(0),
        }
    }

    /// Configures the fill limit relative to the current read position.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.w - self.r
    }

    /// How many bytes one fill may request from the underlying reader.
    fn fill_budget(&self) -> usize {
        match self.limit {
            Some(n) => n.min(self.buf.len()),
            None => self.buf.len(),
        }
    }

    fn consume_budget(&mut self, n: usize) {
        if let Some(l) = self.limit.as_mut() {
            *l = l.saturating_sub(n);
        }
    }

    /// Reads one chunk from the underlying reader into the buffer. Returns
    /// the number of new bytes, with 0 signalling end of stream.
    fn fill(&mut self) -> io::Result<usize> {
        if self.r > 0 {
            self.buf.copy_within(self.r..self.w, 0);
            self.w -= self.r;
            self.r = 0;
        }
        let budget = self.fill_budget();
        if budget == 0 || self.w >= budget {
            return Ok(0);
        }
        let n = self.inner.read(&mut self.buf[self.w..budget])?;
        self.w += n;
        self.consume_budget(n);
        Ok(n)
    }

    /// Reads a single byte. `Ok(None)` signals a clean end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.r == self.w {
            if self.fill_budget() == 0 {
                let mut b = [0u8; 1];
                loop {
                    match self.inner.read(&mut b) {
                        Ok(0) => return Ok(None),
                        Ok(_) => return Ok(Some(b[0])),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
            if self.fill()? == 0 {
                return Ok(None);
            }
        }
        let b = self.buf[self.r];
        self.r += 1;
        Ok(Some(b))
    }

}

impl<R: Read> Read for FillReader<R> {
    fn read(&mut self, p: &mut [u8]) -> io::Result<usize> {
        if p.is_empty() {
            return Ok(0);
        }
        if self.r == self.w {
            if p.len() >= self.buf.len() || self.fill_budget() == 0 {
                // Read directly into p to avoid a copy. The caller asked for
                // these bytes, so the fill limit does not apply.
                return self.inner.read(p);
            }
            if self.fill()? == 0 {
                return Ok(0);
            }
        }
        let n = p.len().min(self.buffered());
        p[..n].copy_from_slice(&self.buf[self.r..self.r + n]);
        self.r += n;
        Ok(n)
    }
}

/// A buffered writer with a flushable checkpoint.
///
/// Internal flushes only write up to the last checkpoint, so a partially
/// serialized TLV header is never split across writes to the underlying
/// writer. [`FlushWriter::flush_all`] accepts the current position as
/// flushable and writes everything.
#[derive(Debug)]
pub(crate) struct FlushWriter<W> {
    inner: W,
    buf: Box<[u8]>,
    n: usize,
    /// Flushable checkpoint: bytes before it form complete TLV units.
    cp: usize,
}

impl<W> FlushWriter<W> {
    /// A reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> FlushWriter<W> {
    pub fn new(inner: W) -> Self {
        FlushWriter {
            inner,
            buf: vec![0; BUF_SIZE].into_boxed_slice(),
            n: 0,
            cp: 0,
        }
    }

    /// Marks the current buffer position as safe to flush.
    pub fn checkpoint(&mut self) {
        self.cp = self.n;
    }

    /// Flushes the entire buffer, implicitly accepting the current position
    /// as flushable.
    pub fn flush_all(&mut self) -> io::Result<()> {
        self.checkpoint();
        self.flush_checkpointed()
    }

    /// Flushes the buffer up to the checkpoint. On error, unwritten bytes
    /// stay in the buffer and the flush can be retried.
    fn flush_checkpointed(&mut self) -> io::Result<()> {
        let write = if self.cp == 0 { self.n } else { self.cp };
        let mut written = 0;
        let result = loop {
            if written >= write {
                break Ok(());
            }
            match self.inner.write(&self.buf[written..write]) {
                Ok(0) => break Err(io::ErrorKind::WriteZero.into()),
                Ok(k) => written += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        if written > 0 {
            self.buf.copy_within(written..self.n, 0);
            self.n -= written;
            self.cp = self.cp.saturating_sub(written);
        }
        result
    }

    pub fn available(&self) -> usize {
        self.buf.len() - self.n
    }

    /// Buffers as much of `p` as possible, flushing to make room. Returns
    /// the number of bytes accepted together with the first flush error;
    /// accepted bytes are safely buffered even when an error is reported.
    pub fn write_buffered(&mut self, p: &[u8]) -> (usize, io::Result<()>) {
        let mut consumed = 0;
        while consumed < p.len() {
            if self.available() == 0 {
                // flush complete TLV units first; without a checkpoint the
                // whole buffer is flushed
                if let Err(e) = self.flush_checkpointed() {
                    return (consumed, Err(e));
                }
            }
            let n = self.available().min(p.len() - consumed);
            self.buf[self.n..self.n + n].copy_from_slice(&p[consumed..consumed + n]);
            self.n += n;
            consumed += n;
        }
        (consumed, Ok(()))
    }
}
