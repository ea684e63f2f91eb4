// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::{mem::ManuallyDrop, ptr, slice};

use kerrno::{KError, KResult, Op, kbail, kensure};
use log::{debug, warn};
use memaddr::{MemoryAddr, VirtAddr, VirtAddrRange};

use crate::{
    advice::{Advice, UncheckedAdvice},
    cursor::MappingCursor,
    flags::{MapFlags, ProtFlags, RemapFlags, SyncFlags},
    page::{granule_of, page_size},
    residency::ResidencyVector,
    sys,
};

/// An owned, live memory mapping.
///
/// The range is unmapped when the handle is dropped. Operations that change
/// the range or its accessibility take `&mut self`, so they cannot race with
/// borrowed views handed out by the same handle.
///
/// `len()` is the length that was requested; the kernel always maps whole
/// pages (whole huge pages for `MapFlags::HUGETLB`), see
/// [`aligned_len`](Self::aligned_len).
#[derive(Debug)]
pub struct Mapping {
    addr: VirtAddr,
    len: usize,
    prot: ProtFlags,
    flags: MapFlags,
    granule: usize,
}

// SAFETY: the handle only owns an address range; shared access goes through
// `&self` methods that read.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    /// # Safety
    ///
    /// `[addr, addr + len)` must be a live mapping with protection `prot`
    /// created with `flags`, owned by nobody else. `granule` is the page size
    /// the kernel used for it.
    pub(crate) unsafe fn from_parts(
        addr: VirtAddr,
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
        granule: usize,
    ) -> Self {
        Self {
            addr,
            len,
            prot,
            flags: flags - (MapFlags::FIXED | MapFlags::FIXED_NOREPLACE),
            granule,
        }
    }

    /// Takes ownership of a mapping created elsewhere.
    ///
    /// # Safety
    ///
    /// Same contract as the value returned by [`into_raw`](Self::into_raw):
    /// `range` must be a live mapping with protection `prot` that nothing
    /// else unmaps.
    ///
    /// Empty ranges and unaligned starts fail with `InvalidArgument`.
    pub unsafe fn from_raw(
        range: VirtAddrRange,
        prot: ProtFlags,
        flags: MapFlags,
    ) -> KResult<Self> {
        let granule = granule_of(flags, Op::Mmap)?;
        kensure!(!range.is_empty(), InvalidArgument, Op::Mmap);
        kensure!(range.start.is_aligned(granule), InvalidArgument, Op::Mmap);
        Ok(unsafe { Self::from_parts(range.start, range.size(), prot, flags, granule) })
    }

    /// Releases ownership without unmapping.
    pub fn into_raw(self) -> VirtAddrRange {
        let this = ManuallyDrop::new(self);
        VirtAddrRange::new(this.addr, this.addr.add(this.len))
    }

    #[inline]
    pub fn addr(&self) -> VirtAddr {
        self.addr
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.addr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.addr.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length rounded up to whole pages of the mapping's page size.
    pub fn aligned_len(&self) -> usize {
        memaddr::align_up(self.len, self.granule)
    }

    /// Page size backing this mapping: the huge page size for
    /// `MapFlags::HUGETLB` mappings, [`page_size`] otherwise.
    #[inline]
    pub fn granule(&self) -> usize {
        self.granule
    }

    /// The requested range.
    pub fn range(&self) -> VirtAddrRange {
        VirtAddrRange::new(self.addr, self.addr.add(self.len))
    }

    /// Protection guaranteed for every page of the mapping.
    #[inline]
    pub fn prot(&self) -> ProtFlags {
        self.prot
    }

    #[inline]
    pub fn flags(&self) -> MapFlags {
        self.flags
    }

    #[inline]
    pub fn is_file_backed(&self) -> bool {
        !self.flags.contains(MapFlags::ANONYMOUS)
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.flags.contains(MapFlags::SHARED)
    }

    /// `[offset, offset + len)` as addresses, inside the mapped pages.
    fn sub_range(&self, offset: usize, len: usize, op: Op) -> KResult<VirtAddrRange> {
        kensure!(len > 0, InvalidArgument, op);
        let whole = VirtAddrRange::from_start_size(self.addr, self.aligned_len())
            .ok_or(KError::invalid(op))?;
        let sub = self
            .addr
            .checked_add(offset)
            .and_then(|start| VirtAddrRange::from_start_size(start, len))
            .ok_or(KError::invalid(op))?;
        kensure!(whole.contains_range(sub), InvalidArgument, op);
        Ok(sub)
    }

    /// Unmaps the whole range, reporting failure.
    ///
    /// If the kernel refuses, the range is leaked rather than retried.
    pub fn unmap(self) -> KResult {
        let this = ManuallyDrop::new(self);
        debug!("unmap {:?}", this.range());
        unsafe { sys::munmap(this.addr, this.aligned_len()) }
    }

    /// Splits the mapping at `at`, aligned to [`granule`](Self::granule).
    ///
    /// `self` keeps `[0, at)` and the returned handle owns `[at, len)`.
    pub fn split_off(&mut self, at: usize) -> KResult<Mapping> {
        kensure!(at > 0 && at < self.len, InvalidArgument, Op::Munmap);
        kensure!(
            memaddr::is_aligned(at, self.granule),
            InvalidArgument,
            Op::Munmap
        );
        let tail = Mapping {
            addr: self.addr.add(at),
            len: self.len - at,
            prot: self.prot,
            flags: self.flags,
            granule: self.granule,
        };
        self.len = at;
        debug!("split {:?} | {:?}", self.range(), tail.range());
        Ok(tail)
    }

    /// Shrinks the mapping to `new_len`, unmapping whole tail pages.
    pub fn truncate(&mut self, new_len: usize) -> KResult {
        kensure!(new_len > 0 && new_len <= self.len, InvalidArgument, Op::Munmap);
        let keep = memaddr::align_up(new_len, self.granule);
        let old = self.aligned_len();
        if keep < old {
            unsafe { sys::munmap(self.addr.add(keep), old - keep)? };
        }
        self.len = new_len;
        Ok(())
    }

    /// Grows or shrinks the mapping.
    ///
    /// Without `RemapFlags::MAYMOVE` the base address is kept and the call
    /// fails with `OutOfAddressSpace` if the range cannot grow in place. On
    /// failure the mapping is unchanged.
    pub fn remap(&mut self, new_len: usize, flags: RemapFlags) -> KResult {
        kensure!(!flags.contains(RemapFlags::FIXED), InvalidArgument, Op::Mremap);
        let new_addr = unsafe {
            sys::mremap(
                self.addr,
                self.aligned_len(),
                new_len,
                flags,
                VirtAddr::default(),
            )?
        };
        debug!(
            "remap {:?} -> {:?} ({new_len:#x} bytes)",
            self.range(),
            new_addr
        );
        self.addr = new_addr;
        self.len = new_len;
        Ok(())
    }

    /// Moves the mapping to `dest`, resizing it to `new_len`.
    ///
    /// # Safety
    ///
    /// Whatever is mapped in `[dest, dest + new_len)` is unmapped first, as
    /// with [`MapOptions::map_exact_replacing`](crate::MapOptions::map_exact_replacing).
    pub unsafe fn remap_to(&mut self, dest: VirtAddr, new_len: usize) -> KResult {
        let new_addr = unsafe {
            sys::mremap(
                self.addr,
                self.aligned_len(),
                new_len,
                RemapFlags::MAYMOVE | RemapFlags::FIXED,
                dest,
            )?
        };
        debug!("remap {:?} -> {:?} (fixed)", self.range(), new_addr);
        self.addr = new_addr;
        self.len = new_len;
        Ok(())
    }

    /// Replaces the protection of the whole mapping.
    pub fn protect(&mut self, prot: ProtFlags) -> KResult {
        unsafe { sys::mprotect(self.addr, self.aligned_len(), prot)? };
        self.prot = prot;
        Ok(())
    }

    /// Replaces the protection of `[offset, offset + len)`; `offset` must be
    /// page-aligned.
    pub fn protect_range(&mut self, offset: usize, len: usize, prot: ProtFlags) -> KResult {
        let sub = self.sub_range(offset, len, Op::Mprotect)?;
        unsafe { sys::mprotect(sub.start, sub.size(), prot)? };
        if offset == 0 && len >= self.len {
            self.prot = prot;
        } else {
            self.prot &= prot;
        }
        Ok(())
    }

    /// Writes dirty pages back to the backing object.
    pub fn sync(&self, flags: SyncFlags) -> KResult {
        unsafe { sys::msync(self.addr, self.aligned_len(), flags) }
    }

    /// Syncs the pages covering `[offset, offset + len)`.
    pub fn sync_range(&self, offset: usize, len: usize, flags: SyncFlags) -> KResult {
        let cover = self
            .sub_range(offset, len, Op::Msync)?
            .page_cover(page_size())
            .ok_or(KError::invalid(Op::Msync))?;
        unsafe { sys::msync(cover.start, cover.size(), flags) }
    }

    pub fn advise(&self, advice: Advice) -> KResult {
        // SAFETY: `Advice` never changes observable contents.
        unsafe { sys::madvise(self.addr, self.aligned_len(), advice.code()) }
    }

    /// # Safety
    ///
    /// The advice may zero the range or hide it from forked children; no
    /// outstanding view may depend on the current contents.
    pub unsafe fn advise_unchecked(&self, advice: UncheckedAdvice) -> KResult {
        unsafe { sys::madvise(self.addr, self.aligned_len(), advice.code()) }
    }

    pub fn lock(&self) -> KResult {
        sys::mlock(self.addr, self.aligned_len())
    }

    pub fn unlock(&self) -> KResult {
        sys::munlock(self.addr, self.aligned_len())
    }

    /// Which pages are resident right now.
    pub fn residency(&self) -> KResult<ResidencyVector> {
        sys::mincore(self.addr, self.aligned_len()).map(ResidencyVector::new)
    }

    /// Makes `[offset, offset + len)` show file page `pgoff` onward.
    ///
    /// Only shared file mappings qualify.
    pub fn remap_file_pages(&mut self, offset: usize, len: usize, pgoff: usize) -> KResult {
        kensure!(
            self.is_shared() && self.is_file_backed(),
            InvalidArgument,
            Op::RemapFilePages
        );
        let sub = self.sub_range(offset, len, Op::RemapFilePages)?;
        unsafe { sys::remap_file_pages(sub.start, sub.size(), pgoff, MapFlags::empty()) }
    }

    /// Copies from `offset` into `buf`; returns the number of bytes copied.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> KResult<usize> {
        kensure!(self.prot.contains(ProtFlags::READ), PermissionDenied, Op::Copy);
        kensure!(offset <= self.len, InvalidArgument, Op::Copy);
        let n = buf.len().min(self.len - offset);
        // SAFETY: `[offset, offset + n)` is inside the readable mapping.
        unsafe { ptr::copy(self.addr.as_ptr().add(offset), buf.as_mut_ptr(), n) };
        Ok(n)
    }

    /// Copies `data` to `offset`; returns the number of bytes copied.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> KResult<usize> {
        kensure!(self.prot.contains(ProtFlags::WRITE), PermissionDenied, Op::Copy);
        kensure!(offset <= self.len, InvalidArgument, Op::Copy);
        let n = data.len().min(self.len - offset);
        // SAFETY: `[offset, offset + n)` is inside the writable mapping.
        unsafe { ptr::copy(data.as_ptr(), self.addr.as_mut_ptr().add(offset), n) };
        Ok(n)
    }

    /// Copies `len` bytes from `self[src_off..]` to `dst[dst_off..]`.
    ///
    /// Both ranges must fit entirely.
    pub fn copy_to(
        &self,
        dst: &mut Mapping,
        len: usize,
        src_off: usize,
        dst_off: usize,
    ) -> KResult<usize> {
        kensure!(self.prot.contains(ProtFlags::READ), PermissionDenied, Op::Copy);
        kensure!(dst.prot.contains(ProtFlags::WRITE), PermissionDenied, Op::Copy);
        let fits = |off: usize, total: usize| off.checked_add(len).is_some_and(|end| end <= total);
        if !fits(src_off, self.len) || !fits(dst_off, dst.len) {
            kbail!(InvalidArgument, Op::Copy);
        }
        // SAFETY: both ranges were bounds-checked; `copy` tolerates overlap
        // between handles created through `from_raw`.
        unsafe {
            ptr::copy(
                self.addr.as_ptr().add(src_off),
                dst.addr.as_mut_ptr().add(dst_off),
                len,
            )
        };
        Ok(len)
    }

    /// Fills the requested range with zeroes.
    pub fn zero(&mut self) -> KResult {
        kensure!(self.prot.contains(ProtFlags::WRITE), PermissionDenied, Op::Copy);
        unsafe { ptr::write_bytes(self.addr.as_mut_ptr(), 0, self.len) };
        Ok(())
    }

    /// Borrows the mapping as bytes.
    ///
    /// # Safety
    ///
    /// The mapping must be readable, and for shared or file-backed mappings
    /// no other process or handle may write the range while the slice lives.
    pub unsafe fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.addr.as_ptr(), self.len) }
    }

    /// # Safety
    ///
    /// The mapping must be readable and writable, and no other process or
    /// handle may access the range while the slice lives.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.addr.as_mut_ptr(), self.len) }
    }

    /// A `Read + Write + Seek` view starting at offset 0.
    pub fn cursor(&mut self) -> MappingCursor<'_> {
        MappingCursor::new(self)
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(e) = unsafe { sys::munmap(self.addr, self.aligned_len()) } {
            warn!("drop: failed to unmap {:?}: {e}", self.range());
        }
    }
}
