//! Length-prefixed codecs for byte strings and text
//!
//! Layout: `varint(len) || payload`. Decoding returns a view that borrows the
//! payload in place.

use bytes::BufMut;

use super::errors::{CodecError, CodecResult};
use super::{varint, Codec};

/// Reads a length prefix and splits the payload off `buf`.
fn take_prefixed<'a>(buf: &mut &'a [u8]) -> CodecResult<&'a [u8]> {
    let mut cursor: &'a [u8] = *buf;
    let len = varint::read(&mut cursor)?;
    let len = usize::try_from(len).map_err(|_| CodecError::LengthOverflow(len))?;
    if cursor.len() < len {
        return Err(CodecError::EndOfBuffer {
            needed: len,
            remaining: cursor.len(),
        });
    }
    let (payload, rest) = cursor.split_at(len);
    *buf = rest;
    Ok(payload)
}

fn prefixed_size(len: usize) -> usize {
    len + varint::size(len as u64)
}

impl Codec for [u8] {
    const FIXED_SIZE: Option<usize> = None;

    type Borrowed = [u8];
    type View<'a> = &'a [u8];

    fn as_borrowed<'v>(view: &'v Self::View<'_>) -> &'v Self::Borrowed {
        view
    }

    fn encoded_size(value: &Self::Borrowed) -> usize {
        prefixed_size(value.len())
    }

    fn encode(value: &Self::Borrowed, buf: &mut impl BufMut) {
        varint::write(value.len() as u64, buf);
        buf.put_slice(value);
    }

    fn decode<'a>(buf: &mut &'a [u8]) -> CodecResult<Self::View<'a>> {
        take_prefixed(buf)
    }
}

impl Codec for str {
    const FIXED_SIZE: Option<usize> = None;

    type Borrowed = str;
    type View<'a> = &'a str;

    fn as_borrowed<'v>(view: &'v Self::View<'_>) -> &'v Self::Borrowed {
        view
    }

    fn encoded_size(value: &Self::Borrowed) -> usize {
        prefixed_size(value.len())
    }

    fn encode(value: &Self::Borrowed, buf: &mut impl BufMut) {
        varint::write(value.len() as u64, buf);
        buf.put_slice(value.as_bytes());
    }

    fn decode<'a>(buf: &mut &'a [u8]) -> CodecResult<Self::View<'a>> {
        let payload = take_prefixed(buf)?;
        std::str::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)
    }
}
