//! Variant descriptors binding key and mapped types to an index shape
//!
//! [`IndexBase`](super::IndexBase) is generic over one of these descriptors.
//! A descriptor fixes the key codec, the optional mapped-value codec, whether
//! equal keys are allowed, and what an element decodes to.

use std::marker::PhantomData;

use super::errors::{IndexError, IndexResult};
use crate::codec::Codec;
use crate::storage::Position;
use crate::tree::VariantKind;

/// Uniqueness policy marker
pub trait Uniqueness {
    const UNIQUE: bool;
}

/// Equal keys are rejected (Set, Map)
#[derive(Debug, Clone, Copy, Default)]
pub struct Unique;

/// Equal keys are kept in insertion order (Multiset, Multimap)
#[derive(Debug, Clone, Copy, Default)]
pub struct Multi;

impl Uniqueness for Unique {
    const UNIQUE: bool = true;
}

impl Uniqueness for Multi {
    const UNIQUE: bool = false;
}

/// Describes one index shape
pub trait Variant {
    /// Codec of the key at the start of every record
    type Key: Codec + ?Sized;

    /// What a cursor yields for one element
    type Item<'a>;

    const UNIQUE: bool;
    const KIND: VariantKind;

    /// Decodes a whole record starting at `position`.
    fn decode_item<'a>(position: Position, bytes: &mut &'a [u8]) -> IndexResult<Self::Item<'a>>;
}

/// Records hold a key alone
pub struct SetKind<K: ?Sized, U>(PhantomData<(fn(&K), U)>);

/// Records hold a key followed by its mapped value
pub struct MapKind<K: ?Sized, T: ?Sized, U>(PhantomData<(fn(&K), fn(&T), U)>);

impl<K: Codec + ?Sized, U: Uniqueness> Variant for SetKind<K, U> {
    type Key = K;
    type Item<'a> = K::View<'a>;

    const UNIQUE: bool = U::UNIQUE;
    const KIND: VariantKind = if U::UNIQUE {
        VariantKind::Set
    } else {
        VariantKind::Multiset
    };

    fn decode_item<'a>(position: Position, bytes: &mut &'a [u8]) -> IndexResult<Self::Item<'a>> {
        K::decode(bytes).map_err(|e| IndexError::decode(position, e))
    }
}

impl<K: Codec + ?Sized, T: Codec + ?Sized, U: Uniqueness> Variant for MapKind<K, T, U> {
    type Key = K;
    type Item<'a> = (K::View<'a>, T::View<'a>);

    const UNIQUE: bool = U::UNIQUE;
    const KIND: VariantKind = if U::UNIQUE {
        VariantKind::Map
    } else {
        VariantKind::Multimap
    };

    fn decode_item<'a>(position: Position, bytes: &mut &'a [u8]) -> IndexResult<Self::Item<'a>> {
        let key = K::decode(bytes).map_err(|e| IndexError::decode(position, e))?;
        let mapped = T::decode(bytes).map_err(|e| IndexError::decode(position, e))?;
        Ok((key, mapped))
    }
}
