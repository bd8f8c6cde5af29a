//! Fixed-size octree node record and rank-based child addressing.
//!
//! A node never stores eight child pointers. Existing children are written
//! contiguously, in increasing slot order, starting at `children_base`, so the
//! absolute index of the child in slot `i` is `children_base` plus the number
//! of set `childmask` bits below `i`.
//!
//! ```text
//! childmask = 0b0010_0101      children_base = 10
//! slot:       7 6 5 4 3 2 1 0
//! bit:        0 0 1 0 0 1 0 1
//! index:          12    11  10
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{CHILD_SLOTS, NODE_RECORD_SIZE, NO_CHILDREN, NO_DATA};
use crate::errors::{OctreeError, OctreeResult};

/// Number of set bits for every byte value
const BIT_COUNT: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).count_ones() as u8;
        i += 1;
    }
    table
};

#[cfg(target_endian = "little")]
fn record_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

#[cfg(target_endian = "big")]
fn record_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_big_endian()
}

/// One node of a sparse voxel octree as stored in the node array.
///
/// The default value is a null node: no children and no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OctreeNode {
    /// Bit `i` is set when child slot `i` exists
    pub childmask: u8,
    /// Node index of the first existing child
    pub children_base: u32,
    /// Data index of the payload, `NO_DATA` if there is none
    pub data: u32,
}

impl OctreeNode {
    pub const fn new(childmask: u8, children_base: u32, data: u32) -> Self {
        Self {
            childmask,
            children_base,
            data,
        }
    }

    /// A node without children carrying the payload at `data`
    pub const fn leaf(data: u32) -> Self {
        Self::new(0, NO_CHILDREN, data)
    }

    /// Size in bytes of an encoded node. Independent of the child count.
    pub const fn record_size() -> usize {
        NODE_RECORD_SIZE
    }

    /// Encode as childmask, children_base, data in native byte order.
    pub fn encode(&self) -> OctreeResult<[u8; NODE_RECORD_SIZE]> {
        let mut buffer = [0u8; NODE_RECORD_SIZE];
        let written = bincode::serde::encode_into_slice(self, &mut buffer, record_config())
            .map_err(|e| OctreeError::Serialization(e.to_string()))?;
        debug_assert_eq!(written, NODE_RECORD_SIZE);
        Ok(buffer)
    }

    /// Decode one node from the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> OctreeResult<Self> {
        if bytes.len() < NODE_RECORD_SIZE {
            return Err(OctreeError::TruncatedRecord {
                expected: NODE_RECORD_SIZE,
                actual: bytes.len(),
            });
        }

        bincode::serde::decode_from_slice(&bytes[..NODE_RECORD_SIZE], record_config())
            .map(|(node, _)| node)
            .map_err(|e| OctreeError::Serialization(e.to_string()))
    }

    /// Whether child slot `slot` (0-7) exists.
    #[inline]
    pub fn has_child(&self, slot: u8) -> OctreeResult<bool> {
        check_slot(slot)?;
        Ok(self.childmask & (1 << slot) != 0)
    }

    /// Absolute node index of the child in `slot`, or `NO_CHILDREN` if the
    /// slot is empty.
    #[inline]
    pub fn child_index(&self, slot: u8) -> OctreeResult<u32> {
        if !self.has_child(slot)? {
            return Ok(NO_CHILDREN);
        }

        let below = self.childmask & ((1u8 << slot) - 1);
        self.children_base
            .checked_add(BIT_COUNT[below as usize] as u32)
            .ok_or_else(|| {
                OctreeError::InvalidOperation(format!(
                    "child index overflows u32 (base {}, slot {})",
                    self.children_base, slot
                ))
            })
    }

    /// Like [`child_index`](Self::child_index) but with `None` for an empty slot.
    pub fn child(&self, slot: u8) -> OctreeResult<Option<u32>> {
        if self.has_child(slot)? {
            self.child_index(slot).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn child_count(&self) -> u32 {
        BIT_COUNT[self.childmask as usize] as u32
    }

    /// Existing children as `(slot, absolute index)` in increasing slot order.
    pub fn children(&self) -> Children {
        Children {
            mask: self.childmask,
            base: self.children_base,
            rank: 0,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.childmask == 0
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.data != NO_DATA
    }

    /// A leaf without payload
    #[inline]
    pub fn is_null(&self) -> bool {
        self.is_leaf() && !self.has_data()
    }
}

#[inline]
fn check_slot(slot: u8) -> OctreeResult<()> {
    if slot >= CHILD_SLOTS {
        Err(OctreeError::InvalidSlot(slot))
    } else {
        Ok(())
    }
}

/// Iterator over the existing children of a node.
#[derive(Debug, Clone)]
pub struct Children {
    mask: u8,
    base: u32,
    rank: u32,
}

impl Iterator for Children {
    type Item = (u8, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.mask == 0 {
            return None;
        }

        let slot = self.mask.trailing_zeros() as u8;
        self.mask &= self.mask - 1;
        let index = self.base.checked_add(self.rank)?;
        self.rank += 1;
        Some((slot, index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = BIT_COUNT[self.mask as usize] as usize;
        (0, Some(remaining))
    }
}
