// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use std::os::fd::BorrowedFd;

use kerrno::{KError, KErrorKind, KResult, Op, kensure};
use log::{debug, warn};
use memaddr::{MemoryAddr, VirtAddr};

use crate::{
    config::MmanConfig,
    flags::{MapFlags, ProtFlags},
    mapping::Mapping,
    page::granule_of,
    sys,
};

/// Whether writes are visible to other mappings of the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sharing {
    /// Copy-on-write; writes stay in this process.
    #[default]
    Private,
    /// Writes reach the backing object and every other shared mapping of it.
    Shared,
}

impl Sharing {
    const fn flag(self) -> MapFlags {
        match self {
            Self::Private => MapFlags::PRIVATE,
            Self::Shared => MapFlags::SHARED,
        }
    }
}

/// Builder for new mappings.
///
/// Defaults to a private anonymous read-write mapping placed by the kernel.
///
/// ```ignore
/// let mut map = MapOptions::new(4096).map()?;
/// map.write_at(0, b"hello")?;
/// ```
#[derive(Debug, Clone)]
pub struct MapOptions<'fd> {
    len: usize,
    prot: ProtFlags,
    sharing: Sharing,
    extra: MapFlags,
    file: Option<(BorrowedFd<'fd>, u64)>,
    hint: VirtAddr,
}

impl<'fd> MapOptions<'fd> {
    pub fn new(len: usize) -> Self {
        let extra = if MmanConfig::current().populate_by_default {
            MapFlags::POPULATE
        } else {
            MapFlags::empty()
        };
        Self {
            len,
            prot: ProtFlags::READ_WRITE,
            sharing: Sharing::Private,
            extra,
            file: None,
            hint: VirtAddr::default(),
        }
    }

    pub fn prot(&mut self, prot: ProtFlags) -> &mut Self {
        self.prot = prot;
        self
    }

    pub fn sharing(&mut self, sharing: Sharing) -> &mut Self {
        self.sharing = sharing;
        self
    }

    pub fn shared(&mut self) -> &mut Self {
        self.sharing(Sharing::Shared)
    }

    pub fn private(&mut self) -> &mut Self {
        self.sharing(Sharing::Private)
    }

    /// Backs the mapping with `fd` starting at page-aligned `offset`.
    pub fn file(&mut self, fd: BorrowedFd<'fd>, offset: u64) -> &mut Self {
        self.file = Some((fd, offset));
        self
    }

    /// Advisory placement for [`map`](Self::map).
    pub fn hint(&mut self, addr: VirtAddr) -> &mut Self {
        self.hint = addr;
        self
    }

    /// Extra modifiers such as `LOCKED` or `NORESERVE`.
    ///
    /// Sharing, backing and placement bits are chosen by the builder; passing
    /// them here makes every map call fail with `InvalidArgument`.
    pub fn flags(&mut self, flags: MapFlags) -> &mut Self {
        self.extra = flags;
        self
    }

    pub fn populate(&mut self, yes: bool) -> &mut Self {
        self.extra.set(MapFlags::POPULATE, yes);
        self
    }

    pub fn locked(&mut self, yes: bool) -> &mut Self {
        self.extra.set(MapFlags::LOCKED, yes);
        self
    }

    pub fn no_reserve(&mut self, yes: bool) -> &mut Self {
        self.extra.set(MapFlags::NORESERVE, yes);
        self
    }

    /// Backs the mapping with huge pages of the default size.
    ///
    /// The mapping is then sized, unmapped and split in whole huge pages;
    /// mapping fails with `Unsupported` if the kernel reports no huge page
    /// size.
    pub fn huge_tlb(&mut self, yes: bool) -> &mut Self {
        self.extra.set(MapFlags::HUGETLB, yes);
        self
    }

    /// The flags a map call will pass, without placement bits.
    pub fn map_flags(&self) -> MapFlags {
        let backing = if self.file.is_some() {
            MapFlags::empty()
        } else {
            MapFlags::ANONYMOUS
        };
        self.sharing.flag() | backing | self.extra
    }

    unsafe fn map_at(&self, addr: VirtAddr, placement: MapFlags) -> KResult<Mapping> {
        kensure!(
            !self.extra.intersects(MapFlags::PLACEMENT),
            InvalidArgument,
            Op::Mmap
        );
        let flags = self.map_flags() | placement;
        let (fd, offset) = match self.file {
            Some((fd, offset)) => (Some(fd), offset),
            None => (None, 0),
        };
        let granule = granule_of(flags, Op::Mmap)?;
        if !placement.is_empty() {
            kensure!(addr.is_aligned(granule), InvalidArgument, Op::Mmap);
        }
        let base = unsafe { sys::mmap(addr, self.len, self.prot, flags, fd, offset)? };
        debug!(
            "map {base:?} len {:#x} prot {:?} flags {flags:?}",
            self.len, self.prot
        );
        Ok(unsafe { Mapping::from_parts(base, self.len, self.prot, flags, granule) })
    }

    /// Maps anywhere; the hint, if any, is advisory.
    pub fn map(&self) -> KResult<Mapping> {
        // SAFETY: without FIXED the kernel never replaces existing mappings.
        unsafe { self.map_at(self.hint, MapFlags::empty()) }
    }

    /// Maps at exactly `addr`, failing instead of replacing anything there.
    ///
    /// Kernels older than 4.17 treat the request as a hint; the stray mapping
    /// is removed again and `Unsupported` returned.
    pub fn map_exact(&self, addr: VirtAddr) -> KResult<Mapping> {
        // SAFETY: FIXED_NOREPLACE never replaces existing mappings.
        let map = unsafe { self.map_at(addr, MapFlags::FIXED_NOREPLACE)? };
        if map.addr() != addr {
            warn!(
                "map_exact: kernel placed {:?} instead of {addr:?}",
                map.addr()
            );
            map.unmap()?;
            return Err(KError::new(KErrorKind::Unsupported, Op::Mmap));
        }
        Ok(map)
    }

    /// Maps at exactly `addr`, silently replacing whatever is mapped there.
    ///
    /// # Safety
    ///
    /// Every existing mapping overlapping the range is discarded. No handle
    /// or reference to those pages may be used afterwards, and a handle that
    /// owned them must be released with `Mapping::into_raw` first.
    pub unsafe fn map_exact_replacing(&self, addr: VirtAddr) -> KResult<Mapping> {
        unsafe { self.map_at(addr, MapFlags::FIXED) }
    }
}
