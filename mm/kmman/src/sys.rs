// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Raw mapping calls.
//!
//! Each function checks what can be checked without the kernel, performs
//! exactly one call, and converts the failure into a [`KError`] tagged with
//! the call. Nothing is retried, including on `EINTR`.
//!
//! Functions that take an address are `unsafe`: the caller must make sure no
//! live Rust reference covers memory the call unmaps, moves, replaces, or
//! makes inaccessible.

use core::ffi::{CStr, c_int, c_void};
use std::{
    ffi::CString,
    os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd},
};

use kerrno::{KError, KResult, Op, kbail, kensure};
use log::trace;
use memaddr::{MemoryAddr, VirtAddr};

use crate::{
    config,
    flags::{MapFlags, MlockAllFlags, ProtFlags, RemapFlags, ShmOpenFlags, SyncFlags},
    page::{is_page_aligned, page_size, pages_in},
};

/// Longest accepted shared-memory name, leading `/` included.
pub const SHM_NAME_MAX: usize = 255;

fn check_ret(ret: c_int, op: Op) -> KResult {
    if ret == 0 {
        Ok(())
    } else {
        Err(KError::last_os_error(op))
    }
}

fn check_prot(prot: ProtFlags, op: Op) -> KResult {
    if prot.is_write_exec() && config::deny_write_exec() {
        kbail!(PermissionDenied, op);
    }
    Ok(())
}

fn to_off_t(offset: u64, op: Op) -> KResult<libc::off_t> {
    libc::off_t::try_from(offset).map_err(|_| KError::invalid(op))
}

/// Maps `len` bytes.
///
/// Anonymous mappings ignore `fd` and `offset`. File-backed mappings need a
/// descriptor and a page-aligned `offset`. With `MAP_FIXED` or
/// `MAP_FIXED_NOREPLACE`, `addr` must be page-aligned.
///
/// # Safety
///
/// With `MAP_FIXED`, any existing mapping overlapping the range is silently
/// replaced.
pub unsafe fn mmap(
    addr: VirtAddr,
    len: usize,
    prot: ProtFlags,
    flags: MapFlags,
    fd: Option<BorrowedFd<'_>>,
    offset: u64,
) -> KResult<VirtAddr> {
    kensure!(len > 0, InvalidArgument, Op::Mmap);
    flags.validate(Op::Mmap)?;
    check_prot(prot, Op::Mmap)?;
    if flags.intersects(MapFlags::FIXED | MapFlags::FIXED_NOREPLACE) {
        kensure!(is_page_aligned(addr), InvalidArgument, Op::Mmap);
    }

    let (raw_fd, raw_off) = if flags.contains(MapFlags::ANONYMOUS) {
        (-1, 0)
    } else {
        let Some(fd) = fd else {
            kbail!(InvalidArgument, Op::Mmap);
        };
        kensure!(
            offset % page_size() as u64 == 0,
            InvalidArgument,
            Op::Mmap
        );
        (fd.as_raw_fd(), to_off_t(offset, Op::Mmap)?)
    };

    trace!(
        "mmap <= addr: {addr:?}, len: {len:#x}, prot: {prot:?}, flags: {flags:?}, fd: {raw_fd}, \
         offset: {raw_off:#x}"
    );
    let ret = unsafe {
        libc::mmap(
            addr.as_mut_ptr_of::<c_void>(),
            len,
            prot.bits() as c_int,
            flags.bits() as c_int,
            raw_fd,
            raw_off,
        )
    };
    if ret == libc::MAP_FAILED {
        return Err(KError::last_os_error(Op::Mmap));
    }
    Ok(VirtAddr::from_mut_ptr(ret))
}

/// # Safety
///
/// The range must not be referenced after the call.
pub unsafe fn munmap(addr: VirtAddr, len: usize) -> KResult {
    kensure!(len > 0, InvalidArgument, Op::Munmap);
    kensure!(is_page_aligned(addr), InvalidArgument, Op::Munmap);
    trace!("munmap <= addr: {addr:?}, len: {len:#x}");
    check_ret(unsafe { libc::munmap(addr.as_mut_ptr_of(), len) }, Op::Munmap)
}

/// Resizes or moves a mapping.
///
/// `new_addr` is only consulted with `RemapFlags::FIXED`.
///
/// # Safety
///
/// The old range must not be referenced after a move. With `FIXED`, any
/// mapping at `new_addr` is replaced.
pub unsafe fn mremap(
    old_addr: VirtAddr,
    old_len: usize,
    new_len: usize,
    flags: RemapFlags,
    new_addr: VirtAddr,
) -> KResult<VirtAddr> {
    kensure!(new_len > 0, InvalidArgument, Op::Mremap);
    kensure!(is_page_aligned(old_addr), InvalidArgument, Op::Mremap);
    flags.validate()?;
    if flags.contains(RemapFlags::FIXED) {
        kensure!(is_page_aligned(new_addr), InvalidArgument, Op::Mremap);
    }

    trace!(
        "mremap <= old: {old_addr:?}, old_len: {old_len:#x}, new_len: {new_len:#x}, flags: \
         {flags:?}, new: {new_addr:?}"
    );
    let ret = unsafe {
        libc::mremap(
            old_addr.as_mut_ptr_of(),
            old_len,
            new_len,
            flags.bits() as c_int,
            new_addr.as_mut_ptr_of::<c_void>(),
        )
    };
    if ret == libc::MAP_FAILED {
        return Err(KError::last_os_error(Op::Mremap));
    }
    Ok(VirtAddr::from_mut_ptr(ret))
}

/// Replaces the protection of every page in the range.
///
/// # Safety
///
/// No live reference may rely on an access the new protection removes.
pub unsafe fn mprotect(addr: VirtAddr, len: usize, prot: ProtFlags) -> KResult {
    kensure!(is_page_aligned(addr), InvalidArgument, Op::Mprotect);
    check_prot(prot, Op::Mprotect)?;
    trace!("mprotect <= addr: {addr:?}, len: {len:#x}, prot: {prot:?}");
    check_ret(
        unsafe { libc::mprotect(addr.as_mut_ptr_of(), len, prot.bits() as c_int) },
        Op::Mprotect,
    )
}

/// Flushes a file-backed or shared range.
///
/// # Safety
///
/// `MS_INVALIDATE` may replace cached contents seen through references.
pub unsafe fn msync(addr: VirtAddr, len: usize, flags: SyncFlags) -> KResult {
    flags.validate()?;
    kensure!(is_page_aligned(addr), InvalidArgument, Op::Msync);
    trace!("msync <= addr: {addr:?}, len: {len:#x}, flags: {flags:?}");
    check_ret(
        unsafe { libc::msync(addr.as_mut_ptr_of(), len, flags.bits() as c_int) },
        Op::Msync,
    )
}

/// Passes `advice` to the kernel unchanged.
///
/// # Safety
///
/// Some advice codes discard contents or change fork behavior.
pub unsafe fn madvise(addr: VirtAddr, len: usize, advice: u32) -> KResult {
    kensure!(is_page_aligned(addr), InvalidArgument, Op::Madvise);
    let Ok(code) = c_int::try_from(advice) else {
        kbail!(InvalidArgument, Op::Madvise);
    };
    trace!("madvise <= addr: {addr:?}, len: {len:#x}, advice: {advice}");
    check_ret(
        unsafe { libc::madvise(addr.as_mut_ptr_of(), len, code) },
        Op::Madvise,
    )
}

/// Keeps the pages of the range resident. Locks do not nest.
pub fn mlock(addr: VirtAddr, len: usize) -> KResult {
    trace!("mlock <= addr: {addr:?}, len: {len:#x}");
    check_ret(unsafe { libc::mlock(addr.as_ptr().cast(), len) }, Op::Mlock)
}

pub fn munlock(addr: VirtAddr, len: usize) -> KResult {
    trace!("munlock <= addr: {addr:?}, len: {len:#x}");
    check_ret(unsafe { libc::munlock(addr.as_ptr().cast(), len) }, Op::Munlock)
}

pub fn mlockall(flags: MlockAllFlags) -> KResult {
    flags.validate()?;
    trace!("mlockall <= flags: {flags:?}");
    check_ret(unsafe { libc::mlockall(flags.bits() as c_int) }, Op::Mlockall)
}

pub fn munlockall() -> KResult {
    trace!("munlockall");
    check_ret(unsafe { libc::munlockall() }, Op::Munlockall)
}

/// One byte per page of `[addr, addr + len)`; bit 0 set means resident.
///
/// Fails with `NotMapped` if any page in the range is unmapped.
pub fn mincore(addr: VirtAddr, len: usize) -> KResult<Vec<u8>> {
    kensure!(is_page_aligned(addr), InvalidArgument, Op::Mincore);
    kensure!(addr.checked_add(len).is_some(), InvalidArgument, Op::Mincore);
    let mut vec = vec![0u8; pages_in(len)];
    trace!("mincore <= addr: {addr:?}, len: {len:#x}");
    // SAFETY: the kernel only reads the page tables for the range and writes
    // `pages_in(len)` bytes into `vec`.
    check_ret(
        unsafe { libc::mincore(addr.as_mut_ptr_of(), len, vec.as_mut_ptr()) },
        Op::Mincore,
    )?;
    Ok(vec)
}

/// Rearranges the file pages behind a shared file mapping.
///
/// `prot` must be zero and `flags` may only carry `MAP_NONBLOCK`. Recent
/// kernels emulate the call, older configurations may return `Unsupported`.
///
/// # Safety
///
/// Contents seen through references into the range change.
pub unsafe fn remap_file_pages(
    addr: VirtAddr,
    len: usize,
    pgoff: usize,
    flags: MapFlags,
) -> KResult {
    kensure!(is_page_aligned(addr), InvalidArgument, Op::RemapFilePages);
    kensure!(
        (flags - MapFlags::NONBLOCK).is_empty(),
        InvalidArgument,
        Op::RemapFilePages
    );
    trace!("remap_file_pages <= addr: {addr:?}, len: {len:#x}, pgoff: {pgoff:#x}");
    let ret = unsafe {
        libc::syscall(
            libc::SYS_remap_file_pages,
            addr.as_usize(),
            len,
            0usize,
            pgoff,
            flags.bits() as usize,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(KError::last_os_error(Op::RemapFilePages))
    }
}

/// Checks a segment name: leading `/`, no other `/`, no NUL, at most
/// [`SHM_NAME_MAX`] bytes.
pub fn shm_name(name: &str, op: Op) -> KResult<CString> {
    let Some(rest) = name.strip_prefix('/') else {
        kbail!(InvalidArgument, op);
    };
    kensure!(!rest.is_empty(), InvalidArgument, op);
    kensure!(!rest.contains('/'), InvalidArgument, op);
    kensure!(name.len() <= SHM_NAME_MAX, InvalidArgument, op);
    CString::new(name).map_err(|_| KError::invalid(op))
}

/// Opens or creates a named segment. `mode` is only used on creation.
pub fn shm_open(name: &str, flags: ShmOpenFlags, mode: u32) -> KResult<OwnedFd> {
    let cname = shm_name(name, Op::ShmOpen)?;
    trace!("shm_open <= name: {name}, flags: {flags:?}, mode: {mode:#o}");
    let fd = shm_open_c(&cname, flags, mode)?;
    // SAFETY: `fd` was just returned by shm_open and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn shm_open_c(name: &CStr, flags: ShmOpenFlags, mode: u32) -> KResult<c_int> {
    let oflag = flags.bits() as c_int | libc::O_CLOEXEC;
    let fd = unsafe { libc::shm_open(name.as_ptr(), oflag, mode as libc::mode_t) };
    if fd < 0 {
        Err(KError::last_os_error(Op::ShmOpen))
    } else {
        Ok(fd)
    }
}

/// Removes a segment name; open descriptors and mappings stay valid.
pub fn shm_unlink(name: &str) -> KResult {
    let cname = shm_name(name, Op::ShmUnlink)?;
    trace!("shm_unlink <= name: {name}");
    check_ret(unsafe { libc::shm_unlink(cname.as_ptr()) }, Op::ShmUnlink)
}

pub fn ftruncate(fd: BorrowedFd<'_>, len: u64) -> KResult {
    let len = to_off_t(len, Op::Ftruncate)?;
    trace!("ftruncate <= fd: {}, len: {len:#x}", fd.as_raw_fd());
    check_ret(
        unsafe { libc::ftruncate(fd.as_raw_fd(), len) },
        Op::Ftruncate,
    )
}

/// Size in bytes of the object behind `fd`.
pub fn fd_len(fd: BorrowedFd<'_>) -> KResult<u64> {
    let mut st = core::mem::MaybeUninit::<libc::stat>::uninit();
    check_ret(
        unsafe { libc::fstat(fd.as_raw_fd(), st.as_mut_ptr()) },
        Op::Fstat,
    )?;
    // SAFETY: fstat succeeded and filled `st`.
    let st = unsafe { st.assume_init() };
    u64::try_from(st.st_size).map_err(|_| KError::invalid(Op::Fstat))
}
