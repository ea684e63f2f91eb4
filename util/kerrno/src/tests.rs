// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Unit tests for kerrno
#![cfg(test)]

use linux_raw_sys::errno;
use strum::IntoEnumIterator;

use crate::{KError, KErrorKind, KResult, Op, kbail, kensure};

fn kind(op: Op, code: u32) -> KErrorKind {
    KErrorKind::from_errno(op, code as i32)
}

#[test]
fn test_enomem_depends_on_op() {
    assert_eq!(kind(Op::Mmap, errno::ENOMEM), KErrorKind::OutOfAddressSpace);
    assert_eq!(kind(Op::Mremap, errno::ENOMEM), KErrorKind::OutOfAddressSpace);
    assert_eq!(kind(Op::Munmap, errno::ENOMEM), KErrorKind::ResourceExhausted);
    assert_eq!(kind(Op::Mlockall, errno::ENOMEM), KErrorKind::ResourceExhausted);
    for op in [
        Op::Mprotect,
        Op::Msync,
        Op::Madvise,
        Op::Mincore,
        Op::Mlock,
        Op::Munlock,
        Op::RemapFilePages,
    ] {
        assert_eq!(kind(op, errno::ENOMEM), KErrorKind::NotMapped, "{op}");
    }
}

#[test]
fn test_eexist_and_efault() {
    assert_eq!(kind(Op::Mmap, errno::EEXIST), KErrorKind::InvalidArgument);
    assert_eq!(kind(Op::ShmOpen, errno::EEXIST), KErrorKind::AlreadyExists);
    assert_eq!(kind(Op::Mremap, errno::EFAULT), KErrorKind::NotMapped);
    assert_eq!(kind(Op::Mincore, errno::EFAULT), KErrorKind::InvalidArgument);
}

#[test]
fn test_common_codes() {
    assert_eq!(kind(Op::Mmap, errno::EINVAL), KErrorKind::InvalidArgument);
    assert_eq!(kind(Op::Mmap, errno::EOVERFLOW), KErrorKind::InvalidArgument);
    assert_eq!(kind(Op::ShmOpen, errno::ENAMETOOLONG), KErrorKind::InvalidArgument);
    assert_eq!(kind(Op::Mmap, errno::EACCES), KErrorKind::PermissionDenied);
    assert_eq!(kind(Op::Mlock, errno::EPERM), KErrorKind::PermissionDenied);
    assert_eq!(kind(Op::Mmap, errno::ETXTBSY), KErrorKind::PermissionDenied);
    assert_eq!(kind(Op::Mlock, errno::EAGAIN), KErrorKind::ResourceExhausted);
    assert_eq!(kind(Op::ShmOpen, errno::EMFILE), KErrorKind::ResourceExhausted);
    assert_eq!(kind(Op::Mmap, errno::ENODEV), KErrorKind::Unsupported);
    assert_eq!(kind(Op::RemapFilePages, errno::ENOSYS), KErrorKind::Unsupported);
    assert_eq!(kind(Op::Msync, errno::EINTR), KErrorKind::Interrupted);
    assert_eq!(kind(Op::ShmUnlink, errno::ENOENT), KErrorKind::NotFound);
    assert_eq!(kind(Op::Mmap, errno::EBADF), KErrorKind::BadDescriptor);
    assert_eq!(kind(Op::Msync, errno::EBUSY), KErrorKind::Busy);
    assert_eq!(kind(Op::Mmap, errno::EIO), KErrorKind::Other);
    assert_eq!(KErrorKind::from_errno(Op::Mmap, -1), KErrorKind::Other);
}

#[test]
fn test_display_format() {
    let e = KError::from_errno(Op::Mprotect, errno::ENOMEM as i32);
    assert_eq!(e.to_string(), "mprotect: range not mapped (errno 12)");

    let e = KError::invalid(Op::RemapFilePages);
    assert_eq!(e.to_string(), "remap_file_pages: invalid argument");
    assert_eq!(e.errno(), None);
}

#[test]
fn test_names_are_unique() {
    let kinds: Vec<&str> = KErrorKind::iter().map(KErrorKind::name).collect();
    let mut dedup = kinds.clone();
    dedup.sort();
    dedup.dedup();
    assert_eq!(kinds.len(), dedup.len());
    assert!(Op::iter().all(|op| !op.as_str().is_empty()));
    assert_eq!(Op::ShmOpen.as_str(), "shm_open");
}

#[test]
fn test_io_error_conversion() {
    let raw: std::io::Error = KError::from_errno(Op::Mmap, errno::EACCES as i32).into();
    assert_eq!(raw.raw_os_error(), Some(errno::EACCES as i32));

    let synthetic: std::io::Error = KError::invalid(Op::Copy).into();
    assert_eq!(synthetic.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn test_bail_macros() {
    fn check(len: usize) -> KResult<usize> {
        kensure!(len > 0, InvalidArgument, Op::Mmap);
        if len > 16 {
            kbail!(OutOfAddressSpace, Op::Mmap);
        }
        Ok(len)
    }

    assert_eq!(check(4), Ok(4));
    assert_eq!(check(0).unwrap_err().kind(), KErrorKind::InvalidArgument);
    assert_eq!(check(32).unwrap_err().kind(), KErrorKind::OutOfAddressSpace);
    assert_eq!(check(0).unwrap_err().with_op(Op::Mremap).op(), Op::Mremap);
}
