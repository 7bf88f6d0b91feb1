//! Fixed-width codecs
//!
//! Integers are stored little-endian and decoded into owned values, since a
//! record position carries no alignment guarantee. Byte arrays decode into a
//! borrowed view of the mapped bytes.

use bytes::BufMut;

use super::errors::{CodecError, CodecResult};
use super::Codec;

/// Splits `N` bytes off the front of `buf`.
pub(crate) fn take_array<'a, const N: usize>(buf: &mut &'a [u8]) -> CodecResult<&'a [u8; N]> {
    let bytes: &'a [u8] = *buf;
    match bytes.split_first_chunk::<N>() {
        Some((head, rest)) => {
            *buf = rest;
            Ok(head)
        }
        None => Err(CodecError::EndOfBuffer {
            needed: N,
            remaining: bytes.len(),
        }),
    }
}

macro_rules! impl_fixed_int {
    ($($ty:ty),* $(,)?) => {$(
        impl Codec for $ty {
            const FIXED_SIZE: Option<usize> = Some(std::mem::size_of::<$ty>());

            type Borrowed = $ty;
            type View<'a> = $ty;

            fn as_borrowed<'v>(view: &'v Self::View<'_>) -> &'v Self::Borrowed {
                view
            }

            fn encoded_size(_value: &Self::Borrowed) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn encode(value: &Self::Borrowed, buf: &mut impl BufMut) {
                buf.put_slice(&value.to_le_bytes());
            }

            fn decode<'a>(buf: &mut &'a [u8]) -> CodecResult<Self::View<'a>> {
                let bytes = take_array::<{ std::mem::size_of::<$ty>() }>(buf)?;
                Ok(<$ty>::from_le_bytes(*bytes))
            }
        }
    )*};
}

impl_fixed_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl Codec for bool {
    const FIXED_SIZE: Option<usize> = Some(1);

    type Borrowed = bool;
    type View<'a> = bool;

    fn as_borrowed<'v>(view: &'v Self::View<'_>) -> &'v Self::Borrowed {
        view
    }

    fn encoded_size(_value: &Self::Borrowed) -> usize {
        1
    }

    fn encode(value: &Self::Borrowed, buf: &mut impl BufMut) {
        buf.put_u8(u8::from(*value));
    }

    fn decode<'a>(buf: &mut &'a [u8]) -> CodecResult<Self::View<'a>> {
        match take_array::<1>(buf)? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(CodecError::InvalidBool(*other)),
        }
    }
}

impl<const N: usize> Codec for [u8; N] {
    const FIXED_SIZE: Option<usize> = Some(N);

    type Borrowed = [u8; N];
    type View<'a> = &'a [u8; N];

    fn as_borrowed<'v>(view: &'v Self::View<'_>) -> &'v Self::Borrowed {
        view
    }

    fn encoded_size(_value: &Self::Borrowed) -> usize {
        N
    }

    fn encode(value: &Self::Borrowed, buf: &mut impl BufMut) {
        buf.put_slice(value);
    }

    fn decode<'a>(buf: &mut &'a [u8]) -> CodecResult<Self::View<'a>> {
        take_array::<N>(buf)
    }
}
