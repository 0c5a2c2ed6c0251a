//! The encode side of the BER value codec.

use std::io::Write;

use crate::error::{EncodeError, Error};
use crate::params::FieldParams;
use crate::tag::Tag;
use crate::tlv::{self, Header, Length, TlvRead, TlvWrite, END_OF_CONTENTS};

/// A type that can encode itself as a BER data value.
///
/// Encoding is a two-step process: [`BerEncode::ber_header`] computes the
/// intrinsic header, including the content length, and
/// [`BerEncode::ber_write_value`] writes exactly that many content octets
/// (for primitive encodings) or the nested data values (for constructed
/// encodings). Tag overrides from field parameters are applied by the
/// encoding engine; implementations always report their intrinsic tag.
pub trait BerEncode {
    /// The intrinsic header: tag, primitive/constructed attribute and
    /// content length. Constructed types unable to predict their length
    /// may report [`Length::Indefinite`].
    fn ber_header(&self) -> Result<Header, Error>;

    /// Writes the content octets promised by the header.
    fn ber_write_value(&self, w: &mut ValueSink<'_>) -> Result<(), Error>;

    /// Whether this is the zero value of its type. Consulted by the
    /// `omitzero` and `nullable` field parameters.
    fn ber_is_zero(&self) -> bool {
        false
    }
}

/// Builds an encode error for the value type `T`.
pub(crate) fn encode_error<T: ?Sized>(msg: &'static str) -> Error {
    Error::Encode(EncodeError::msg(core::any::type_name::<T>(), msg))
}

/// The sink passed to [`BerEncode::ber_write_value`].
///
/// For a primitive encoding the sink accepts raw content octets; for a
/// constructed encoding it accepts nested data values through
/// [`ValueSink::encode_value`].
pub struct ValueSink<'a> {
    enc: &'a mut dyn TlvWrite,
    constructed: bool,
}

impl core::fmt::Debug for ValueSink<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValueSink")
            .field("constructed", &self.constructed)
            .finish()
    }
}

impl ValueSink<'_> {
    /// Writes raw content octets of a primitive encoding.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.constructed {
            return Err(encode_error::<Self>(
                "raw bytes written into a constructed encoding",
            ));
        }
        self.enc.value_write(bytes)
    }

    /// Writes a single content octet of a primitive encoding.
    pub fn write_byte(&mut self, b: u8) -> Result<(), Error> {
        self.write_all(&[b])
    }

    /// Encodes a nested data value of a constructed encoding.
    pub fn encode_value<V: BerEncode + ?Sized>(
        &mut self,
        v: &V,
        params: &FieldParams,
    ) -> Result<(), Error> {
        if !self.constructed {
            return Err(encode_error::<Self>(
                "nested data value written into a primitive encoding",
            ));
        }
        encode_value(self.enc, v, params)
    }

    /// Copies pre-encoded data values into a constructed encoding,
    /// validating their TLV structure on the way.
    pub fn write_raw_values(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if !self.constructed {
            return Err(encode_error::<Self>(
                "nested data value written into a primitive encoding",
            ));
        }
        copy_values(self.enc, bytes)
    }
}

/// Re-encodes the TLV stream in `bytes` through the encoder.
///
/// Both the decoder and the encoder produce and expect end-of-contents
/// headers at the end of every constructed value, so the copy is a plain
/// relay of headers and content octets.
fn copy_values(enc: &mut dyn TlvWrite, bytes: &[u8]) -> Result<(), Error> {
    let mut dec = tlv::Decoder::new(bytes);
    loop {
        let h = match TlvRead::next_header(&mut dec) {
            Ok(h) => h,
            Err(Error::Eof) => return Ok(()),
            Err(e) => return Err(e),
        };
        enc.put_header(h)?;
        let mut buf = [0u8; 256];
        loop {
            let rem = TlvRead::value_remaining(&dec);
            if rem == 0 {
                break;
            }
            let take = rem.min(buf.len());
            let n = dec.value_read(&mut buf[..take])?;
            enc.value_write(&buf[..n])?;
        }
    }
}

/// The central encoding dispatch: applies the field parameters, then
/// writes the header and content of `v` through the encoder.
///
/// A zero value with `omitzero` writes nothing; a zero value with
/// `nullable` writes NULL in place of the intrinsic encoding.
pub(crate) fn encode_value<V: BerEncode + ?Sized>(
    enc: &mut dyn TlvWrite,
    v: &V,
    params: &FieldParams,
) -> Result<(), Error> {
    if v.ber_is_zero() {
        if params.omit_zero {
            return Ok(());
        }
        if params.nullable {
            let null_params = FieldParams {
                nullable: false,
                omit_zero: false,
                ..*params
            };
            return encode_value(enc, &crate::types::Null, &null_params);
        }
    }
    let h = v.ber_header()?;
    if !h.constructed && h.length == Length::Indefinite {
        return Err(encode_error::<V>("primitive, indefinite-length encoding"));
    }
    if params.explicit {
        let Some(t) = params.tag else {
            return Err(encode_error::<V>("explicit tagging requires a tag"));
        };
        enc.put_header(Header::constructed(t, h.total_len()))?;
        write_value(enc, h, v)?;
        return enc.put_header(END_OF_CONTENTS);
    }
    let mut h = h;
    if let Some(t) = params.tag {
        h.tag = t;
    }
    write_value(enc, h, v)
}

/// Writes one complete TLV: the (possibly overridden) header, the content,
/// and the end-of-contents for constructed values.
fn write_value<V: BerEncode + ?Sized>(
    enc: &mut dyn TlvWrite,
    h: Header,
    v: &V,
) -> Result<(), Error> {
    enc.put_header(h)?;
    let mut sink = ValueSink {
        enc: &mut *enc,
        constructed: h.constructed,
    };
    v.ber_write_value(&mut sink)?;
    if h.constructed {
        enc.put_header(END_OF_CONTENTS)?;
    } else if enc.value_remaining() > 0 {
        return Err(encode_error::<V>("value shorter than its header indicates"));
    }
    Ok(())
}

/// The total encoded length of `v` under `params` (header plus content),
/// or `None` if the value would be omitted.
pub fn encoded_value_len<V: BerEncode + ?Sized>(
    v: &V,
    params: &FieldParams,
) -> Result<Option<Length>, Error> {
    let h = if v.ber_is_zero() {
        if params.omit_zero {
            return Ok(None);
        }
        if params.nullable {
            Header::primitive(Tag::NULL, 0)
        } else {
            v.ber_header()?
        }
    } else {
        v.ber_header()?
    };
    let mut h = h;
    if let Some(t) = params.tag {
        if params.explicit {
            let outer = Header::constructed(t, h.total_len());
            return Ok(Some(outer.total_len()));
        }
        h.tag = t;
    }
    Ok(Some(h.total_len()))
}

/// A streaming encoder for BER-encoded ASN.1 values, the counterpart of
/// [`Decoder`](super::Decoder).
#[derive(Debug)]
pub struct Encoder<W> {
    tlv: tlv::Encoder<W>,
}

impl<W: Write> Encoder<W> {
    /// Creates an encoder writing to `w`. The internal buffer is flushed
    /// after every encoded top-level value.
    pub fn new(w: W) -> Encoder<W> {
        Encoder {
            tlv: tlv::Encoder::new(w),
        }
    }

    /// Encodes `v` as the next top-level data value.
    pub fn encode<T: BerEncode + ?Sized>(&mut self, v: &T) -> Result<(), Error> {
        self.encode_with_params(v, "")
    }

    /// Like [`Encoder::encode`] with field parameters applied to the
    /// top-level data value. The `optional` and `-` parameters have no
    /// effect here.
    pub fn encode_with_params<T: BerEncode + ?Sized>(
        &mut self,
        v: &T,
        params: &str,
    ) -> Result<(), Error> {
        let fp = FieldParams::parse(params);
        encode_value(&mut self.tlv, v, &fp)
    }

    /// A reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.tlv.get_ref()
    }
}

/// Encodes `v` as a single BER data value into a new byte vector.
pub fn to_vec<T: BerEncode + ?Sized>(v: &T) -> Result<Vec<u8>, Error> {
    to_vec_with_params(v, "")
}

/// Like [`to_vec`] with field parameters applied to the top-level data
/// value.
pub fn to_vec_with_params<T: BerEncode + ?Sized>(v: &T, params: &str) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut enc = Encoder::new(&mut out);
    enc.encode_with_params(v, params)?;
    drop(enc);
    Ok(out)
}
