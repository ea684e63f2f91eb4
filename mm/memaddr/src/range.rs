// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::fmt;

use crate::{MemoryAddr, VirtAddr};

/// A half-open virtual address range `[start, end)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VirtAddrRange {
    pub start: VirtAddr,
    pub end: VirtAddr,
}

impl VirtAddrRange {
    /// Panics if `start > end`.
    #[inline]
    pub const fn new(start: VirtAddr, end: VirtAddr) -> Self {
        assert!(start.as_usize() <= end.as_usize(), "invalid `VirtAddrRange`");
        Self { start, end }
    }

    /// `None` if `start + size` overflows.
    #[inline]
    pub fn from_start_size(start: VirtAddr, size: usize) -> Option<Self> {
        start.checked_add(size).map(|end| Self { start, end })
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.end.as_usize() - self.start.as_usize()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start.as_usize() == self.end.as_usize()
    }

    /// `other` lies entirely inside `self`.
    #[inline]
    pub fn contains_range(&self, other: Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest page-aligned range covering `self`, or `None` if the end
    /// cannot be rounded up.
    pub fn page_cover(&self, page_size: usize) -> Option<Self> {
        let end = self.end.checked_align_up(page_size)?;
        Some(Self {
            start: self.start.align_down(page_size),
            end,
        })
    }
}

impl fmt::Debug for VirtAddrRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:?}, {:?})", self.start, self.end)
    }
}
