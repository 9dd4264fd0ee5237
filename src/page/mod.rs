//! Typed views over raw 4096-byte pages.
//!
//! Every page type owns the exact byte layout described by the file format:
//! little-endian integers, packed, no padding beyond what each field implies.
//! `PageCodec::encode`/`decode` are the only place that layout is known; the
//! rest of the engine works with the typed structs.

mod free;
mod header;
mod internal;
mod leaf;
mod value;

pub use free::FreePage;
pub use header::HeaderPage;
pub use internal::{ChildSlot, InternalPage, InternalRecord};
pub use leaf::{LeafPage, LeafRecord};
pub use value::Value;

use crate::error::{Error, Result};

/// Size of every page in the file, including the header page.
pub const PAGE_SIZE: usize = 4096;

/// A page number. `0` is reserved for the header page and also serves as the
/// "null" child/sibling/free-list-terminator sentinel.
pub type PageNo = u64;

/// The page number of the header page.
pub const HEADER_PAGE_NO: PageNo = 0;

/// Sentinel used in place of a page number meaning "no such page".
pub const NULL_PAGE: PageNo = 0;

/// Width of a stored value, in bytes.
pub const VALUE_LEN: usize = 120;

/// Maximum live records on a leaf page.
///
/// Test builds use a much smaller capacity so that splits, coalesces, and
/// redistributions can be exercised with a handful of keys instead of
/// thousands (see the scenarios in `src/tests.rs`). This only changes the
/// array length compiled into `LeafPage`/`InternalPage` for test binaries;
/// the byte-level layout rules are unchanged.
#[cfg(not(test))]
pub const LEAF_MAX: usize = 31;
#[cfg(test)]
pub const LEAF_MAX: usize = 3;

/// Maximum keys on an internal page (one fewer than its child count).
#[cfg(not(test))]
pub const INTL_MAX: usize = 248;
#[cfg(test)]
pub const INTL_MAX: usize = 3;

/// Offset of the `is_leaf` tag byte shared by leaf and internal pages.
const OFFSET_IS_LEAF: usize = 8;

pub type RawPage = [u8; PAGE_SIZE];

pub fn zeroed_page() -> RawPage {
    [0u8; PAGE_SIZE]
}

/// Decode/encode a typed page from/to a raw 4096-byte buffer.
pub trait PageCodec: Sized {
    fn decode(page_no: PageNo, buf: &RawPage) -> Result<Self>;
    fn encode(&self, buf: &mut RawPage);
}

/// Peek the `is_leaf` tag without fully decoding, so callers can pick the
/// right `PageCodec` impl before reading the rest of the page.
pub fn is_leaf_tag(buf: &RawPage) -> bool {
    buf[OFFSET_IS_LEAF] != 0
}

pub(crate) fn corrupt(page_no: PageNo, reason: impl Into<String>) -> Error {
    Error::Corrupt {
        page_no,
        reason: reason.into(),
    }
}

pub(crate) fn put_u64(buf: &mut RawPage, offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn get_u64(buf: &RawPage, offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

pub(crate) fn put_i64(buf: &mut RawPage, offset: usize, value: i64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn get_i64(buf: &RawPage, offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_le_bytes(bytes)
}
