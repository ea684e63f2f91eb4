// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Virtual address types, alignment helpers and page-granular ranges.
//!
//! All alignment helpers require `align` to be a power of two. The checked
//! variants return `None` instead of wrapping when rounding up would overflow
//! the address space.
#![cfg_attr(not(test), no_std)]

mod addr;
mod range;


pub use self::{
    addr::{MemoryAddr, VirtAddr},
    range::VirtAddrRange,
};

/// The smallest page size on every supported architecture.
pub const PAGE_SIZE_4K: usize = 0x1000;

/// Rounds `addr` down to a multiple of `align`.
#[inline]
pub const fn align_down(addr: usize, align: usize) -> usize {
    addr & !(align - 1)
}

/// Rounds `addr` up to a multiple of `align`.
///
/// Panics on overflow; use [`checked_align_up`] for untrusted input.
#[inline]
pub const fn align_up(addr: usize, align: usize) -> usize {
    match checked_align_up(addr, align) {
        Some(v) => v,
        None => panic!("overflow in `align_up`"),
    }
}

/// Rounds `addr` up to a multiple of `align`, or `None` on overflow.
#[inline]
pub const fn checked_align_up(addr: usize, align: usize) -> Option<usize> {
    match addr.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Distance from `addr` to the previous multiple of `align`.
#[inline]
pub const fn align_offset(addr: usize, align: usize) -> usize {
    addr & (align - 1)
}

#[inline]
pub const fn is_aligned(addr: usize, align: usize) -> bool {
    align_offset(addr, align) == 0
}

/// Number of `page_size` pages needed to cover `len` bytes.
#[inline]
pub const fn pages_spanning(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size)
}
