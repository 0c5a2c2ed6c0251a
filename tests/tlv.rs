//! End-to-end tests for the TLV streaming layer.

use std::io::{self, Read, Write};

use hex_literal::hex;
use pretty_assertions::assert_eq;

use ber_stream::tlv::{Decoder, Encoder, Header, Length, END_OF_CONTENTS};
use ber_stream::{Error, Tag};

#[test]
fn integer_round_trip() {
    let mut out = Vec::new();
    let mut e = Encoder::new(&mut out);
    let mut w = e
        .write_header(Header::primitive(Tag::INTEGER, 2))
        .unwrap()
        .unwrap();
    w.write_all(&[0x02, 0xd3]).unwrap();
    drop(e);
    assert_eq!(out, hex!("02 02 02 D3"));

    let mut d = Decoder::new(&out[..]);
    let (h, val) = d.read_header().unwrap();
    assert_eq!(h, Header::primitive(Tag::INTEGER, 2));
    let mut bytes = Vec::new();
    val.unwrap().read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes, [0x02, 0xd3]);
}

#[test]
fn definite_sequence_of_integers() {
    let mut out = Vec::new();
    let mut e = Encoder::new(&mut out);
    e.write_header(Header::constructed(Tag::SEQUENCE, Length::Definite(6)))
        .unwrap();
    for v in [1u8, 2] {
        let mut w = e
            .write_header(Header::primitive(Tag::INTEGER, 1))
            .unwrap()
            .unwrap();
        w.write_all(&[v]).unwrap();
    }
    e.write_header(END_OF_CONTENTS).unwrap();
    drop(e);
    assert_eq!(out, hex!("30 06 02 01 01 02 01 02"));

    let mut d = Decoder::new(&out[..]);
    let (h, _) = d.read_header().unwrap();
    assert_eq!(h.length, Length::Definite(6));
    let mut values = Vec::new();
    loop {
        let (h, val) = d.read_header().unwrap();
        if h.is_end_of_contents() {
            break;
        }
        let mut v = val.unwrap();
        let mut bytes = Vec::new();
        v.read_to_end(&mut bytes).unwrap();
        values.push(bytes[0]);
    }
    assert_eq!(values, [1, 2]);
    assert_eq!(d.stack_depth(), 0);
}

#[test]
fn indefinite_sequence_of_integers() {
    let mut out = Vec::new();
    let mut e = Encoder::new(&mut out);
    e.write_header(Header::constructed(Tag::SEQUENCE, Length::Indefinite))
        .unwrap();
    for v in [1u8, 2] {
        let mut w = e
            .write_header(Header::primitive(Tag::INTEGER, 1))
            .unwrap()
            .unwrap();
        w.write_all(&[v]).unwrap();
    }
    e.write_header(END_OF_CONTENTS).unwrap();
    drop(e);
    assert_eq!(out, hex!("30 80 02 01 01 02 01 02 00 00"));

    let mut d = Decoder::new(&out[..]);
    d.read_header().unwrap();
    let mut values = Vec::new();
    loop {
        let (h, val) = d.read_header().unwrap();
        if h.is_end_of_contents() {
            break;
        }
        let mut bytes = Vec::new();
        val.unwrap().read_to_end(&mut bytes).unwrap();
        values.push(bytes[0]);
    }
    assert_eq!(values, [1, 2]);
    assert_eq!(d.stack_depth(), 0);
}

#[test]
fn nested_indefinite_offsets() {
    let data = hex!("30 80 30 80 02 01 15 00 00 00 00");
    let mut d = Decoder::new(&data[..]);
    let mut headers = 0;
    loop {
        match d.read_header() {
            Ok((_, mut val)) => {
                if let Some(v) = val.as_mut() {
                    io::copy(v, &mut io::sink()).unwrap();
                }
                headers += 1;
            }
            Err(Error::Eof) => break,
            Err(e) => panic!("decode failed: {e}"),
        }
    }
    assert_eq!(headers, 5);
    assert_eq!(d.stack_depth(), 0);
    assert_eq!(d.input_offset(), 11);
}

#[test]
fn child_exceeding_parent() {
    // the child claims 2 content bytes but the parent only holds 3
    // including the child's header
    let data = hex!("30 03 02 02 15 15");
    let mut d = Decoder::new(&data[..]);
    d.read_header().unwrap();
    match d.read_header() {
        Err(Error::Syntax(e)) => {
            assert_eq!(e.message(), "data value exceeds parent");
            assert_eq!(e.offset, 2);
        }
        other => panic!("unexpected result: {:?}", other.map(|(h, _)| h)),
    }
}

#[test]
fn peek_does_not_disturb_the_stream() {
    let data = hex!("30 06 02 01 01 02 01 02");
    let mut d = Decoder::new(&data[..]);
    for _ in 0..4 {
        let depth = d.stack_depth();
        let peeked = d.peek_header().unwrap();
        assert_eq!(d.stack_depth(), depth);
        let again = d.peek_header().unwrap();
        assert_eq!(peeked, again);
        let (read, _) = d.read_header().unwrap();
        assert_eq!(peeked, read);
    }
    assert!(matches!(d.peek_header(), Err(Error::Eof)));
}

#[test]
fn header_boundaries_round_trip() {
    for number in [30u32, 31, 128, 16383, 16384] {
        for len in [0usize, 127, 128, 255, 256, 65535, 65536] {
            let h = Header::primitive(Tag::universal(number), len);
            let mut out = Vec::new();
            let mut e = Encoder::new(&mut out);
            let mut w = e.write_header(h).unwrap();
            if let Some(w) = w.as_mut() {
                let chunk = vec![0xaa; len];
                w.write_all(&chunk).unwrap();
            }
            drop(e);

            let mut d = Decoder::new(&out[..]);
            let (decoded, mut val) = d.read_header().unwrap();
            assert_eq!(decoded, h);
            if let Some(v) = val.as_mut() {
                assert_eq!(v.len(), len);
            }
        }
    }
}

/// A stream that interleaves transient errors with one-byte reads.
struct FlakyReader<'a> {
    data: &'a [u8],
    pos: usize,
    fail: bool,
}

impl Read for FlakyReader<'_> {
    fn read(&mut self, p: &mut [u8]) -> io::Result<usize> {
        self.fail = !self.fail;
        if self.fail {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        if self.pos == self.data.len() {
            return Ok(0);
        }
        p[0] = self.data[self.pos];
        self.pos += 1;
        Ok(1)
    }
}

#[test]
fn decoder_retries_converge_to_the_same_stream() {
    let data = hex!("30 80 02 01 01 02 01 02 00 00 02 01 2a");
    let mut d = Decoder::new(FlakyReader {
        data: &data,
        pos: 0,
        fail: false,
    });
    let mut headers = Vec::new();
    let mut contents = Vec::new();
    loop {
        match d.read_header() {
            Ok((h, mut val)) => {
                if let Some(v) = val.as_mut() {
                    loop {
                        match v.read_to_end(&mut contents) {
                            Ok(_) => break,
                            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                            Err(e) => panic!("value read failed: {e}"),
                        }
                    }
                }
                headers.push(h);
            }
            Err(Error::Eof) => break,
            Err(e) if e.is_io() => continue,
            Err(e) => panic!("decode failed: {e}"),
        }
    }
    assert_eq!(headers.len(), 5);
    assert_eq!(contents, [0x01, 0x02, 0x2a]);
    assert_eq!(d.input_offset(), data.len() as u64);
}

/// A writer that interleaves transient errors with one-byte writes.
struct FlakyWriter {
    out: Vec<u8>,
    fail: bool,
}

impl Write for FlakyWriter {
    fn write(&mut self, p: &[u8]) -> io::Result<usize> {
        self.fail = !self.fail;
        if self.fail {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = p.len().min(1);
        self.out.extend_from_slice(&p[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn encoder_retries_converge_to_the_same_stream() {
    let mut e = Encoder::new(FlakyWriter {
        out: Vec::new(),
        fail: false,
    });
    let headers = [
        Header::constructed(Tag::SEQUENCE, Length::Indefinite),
        Header::primitive(Tag::INTEGER, 1),
    ];
    while e.write_header(headers[0]).is_err() {}
    loop {
        match e.write_header(headers[1]) {
            Ok(Some(mut w)) => {
                let mut buf: &[u8] = &[0x15];
                while !buf.is_empty() {
                    match w.write(buf) {
                        Ok(n) => buf = &buf[n..],
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => panic!("value write failed: {e}"),
                    }
                }
                break;
            }
            Ok(None) => unreachable!(),
            Err(err) if err.is_io() => continue,
            Err(err) => panic!("encode failed: {err}"),
        }
    }
    while e.write_header(END_OF_CONTENTS).is_err() {}
    assert_eq!(e.get_ref().out, hex!("30 80 02 01 15 00 00"));
}

#[test]
fn skip_discards_whole_subtrees() {
    let data = hex!(
        "30 80"          // SEQUENCE, indefinite
        "30 06 02 01 01 02 01 02" // nested definite SEQUENCE
        "00 00"          // end of outer sequence
        "04 01 aa"       // next top-level value
    );
    let mut d = Decoder::new(&data[..]);
    d.read_header().unwrap();
    d.skip().unwrap();
    let (h, mut val) = d.read_header().unwrap();
    assert_eq!(h.tag, Tag::OCTET_STRING);
    assert_eq!(val.as_mut().unwrap().read_byte().unwrap(), Some(0xaa));
}

#[test]
fn stack_index_reports_enclosures() {
    let data = hex!("30 80 31 80 02 01 15 00 00 00 00");
    let mut d = Decoder::new(&data[..]);
    d.read_header().unwrap();
    d.read_header().unwrap();
    d.read_header().unwrap();
    // only constructed values live on the stack
    assert_eq!(d.stack_depth(), 2);
    assert!(d.stack_index(0).constructed);
    assert_eq!(d.stack_index(1).tag, Tag::SEQUENCE);
    assert_eq!(d.stack_index(2).tag, Tag::SET);
}
