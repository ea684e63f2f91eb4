// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

/// Per-page residency as reported by `mincore`.
///
/// A snapshot: pages may be evicted or faulted in as soon as it is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidencyVector {
    pages: Vec<u8>,
}

impl ResidencyVector {
    pub(crate) fn new(pages: Vec<u8>) -> Self {
        Self { pages }
    }

    /// Number of pages covered.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// `None` past the last page.
    pub fn is_resident(&self, page: usize) -> Option<bool> {
        self.pages.get(page).map(|b| b & 1 != 0)
    }

    pub fn resident_count(&self) -> usize {
        self.iter().filter(|&r| r).count()
    }

    pub fn all_resident(&self) -> bool {
        self.iter().all(|r| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.pages.iter().map(|b| b & 1 != 0)
    }

    /// The raw bytes; bits other than bit 0 are reserved by the kernel.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pages
    }
}
