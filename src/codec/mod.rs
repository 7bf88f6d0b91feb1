//! Record codecs for flat-file keys and mapped values
//!
//! A codec maps a logical value to the bytes stored in the flat file and back.
//! Every key or mapped type has exactly one codec, selected by its type:
//!
//! - Fixed-width types (`u8`..`u128`, `i8`..`i128`, `bool`, `[u8; N]`) copy
//!   their bytes verbatim. `FIXED_SIZE` is `Some(width)`.
//! - Variable-length types (`str`, `[u8]`) write a varint length prefix
//!   followed by the payload. `FIXED_SIZE` is `None`.
//!
//! Records are self-describing: given only a start position, `decode` knows
//! where the record ends, so no external length table exists.
//!
//! # Views
//!
//! `decode` returns a [`Codec::View`]. Whether a view owns its data (integers)
//! or borrows the flat-file bytes (`&str`, `&[u8]`, `&[u8; N]`) is decided here,
//! never by the index.

mod errors;
mod fixed;
mod variable;
pub mod varint;

pub use errors::{CodecError, CodecResult};

use bytes::BufMut;

/// Bidirectional mapping between a value and its flat-file encoding.
pub trait Codec {
    /// Encoded width of every value of a fixed-size type; `None` otherwise.
    const FIXED_SIZE: Option<usize>;

    /// The form callers pass in, and the form comparators see.
    type Borrowed: ?Sized + 'static;

    /// The decoded proxy, which may borrow the bytes it was decoded from.
    type View<'a>;

    /// Borrows the comparable value out of a decoded view.
    fn as_borrowed<'v>(view: &'v Self::View<'_>) -> &'v Self::Borrowed;

    /// Exact number of bytes `encode` writes for `value`, prefix included.
    fn encoded_size(value: &Self::Borrowed) -> usize;

    /// Writes exactly `encoded_size(value)` bytes and advances `buf`.
    ///
    /// Panics if `buf` cannot hold them.
    fn encode(value: &Self::Borrowed, buf: &mut impl BufMut);

    /// Decodes one value from the front of `buf` and advances past it.
    fn decode<'a>(buf: &mut &'a [u8]) -> CodecResult<Self::View<'a>>;
}

/// Encodes `value` into a freshly allocated buffer of exactly its encoded size.
pub fn encode_to_vec<C: Codec + ?Sized>(value: &C::Borrowed) -> Vec<u8> {
    let mut buf = Vec::with_capacity(C::encoded_size(value));
    C::encode(value, &mut buf);
    buf
}
