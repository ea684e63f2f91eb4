// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Named POSIX shared-memory segments.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use kerrno::{KResult, Op, kensure};
use log::debug;

use crate::{
    config::MmanConfig,
    flags::{ProtFlags, ShmOpenFlags},
    mapping::Mapping,
    options::MapOptions,
    sys,
};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// An open descriptor on a named segment.
///
/// Dropping it closes the descriptor but leaves the segment in place; call
/// [`remove`](Self::remove) to delete the name.
#[derive(Debug)]
pub struct SharedMemory {
    fd: OwnedFd,
    name: String,
}

impl SharedMemory {
    /// Opens `name` with explicit flags. `mode` only applies on creation.
    pub fn open(name: &str, flags: ShmOpenFlags, mode: u32) -> KResult<Self> {
        let fd = sys::shm_open(name, flags, mode)?;
        debug!("shm open {name} ({flags:?})");
        Ok(Self {
            fd,
            name: name.to_owned(),
        })
    }

    /// Creates a new read-write segment, failing with `AlreadyExists` if the
    /// name is taken.
    pub fn create(name: &str, mode: u32) -> KResult<Self> {
        Self::open(
            name,
            ShmOpenFlags::CREATE | ShmOpenFlags::EXCL | ShmOpenFlags::RDWR,
            mode,
        )
    }

    /// Opens an existing segment, read-write if `writable`.
    pub fn open_existing(name: &str, writable: bool) -> KResult<Self> {
        let flags = if writable {
            ShmOpenFlags::RDWR
        } else {
            ShmOpenFlags::READ_ONLY
        };
        Self::open(name, flags, 0)
    }

    /// Deletes the name. Open descriptors and mappings keep working.
    pub fn remove(name: &str) -> KResult {
        sys::shm_unlink(name)?;
        debug!("shm remove {name}");
        Ok(())
    }

    /// A name no other live process is likely to pick, built from the
    /// configured prefix, the pid, and a per-process counter.
    pub fn unique_name(tag: &str) -> String {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        format!(
            "/{}-{tag}-{}-{id}",
            MmanConfig::current().shm_prefix,
            std::process::id()
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resizes the segment.
    pub fn set_len(&self, len: u64) -> KResult {
        sys::ftruncate(self.fd.as_fd(), len)
    }

    /// Current size in bytes.
    pub fn len(&self) -> KResult<u64> {
        sys::fd_len(self.fd.as_fd())
    }

    pub fn is_empty(&self) -> KResult<bool> {
        self.len().map(|len| len == 0)
    }

    /// Maps the first `len` bytes shared.
    ///
    /// `len` may not exceed the segment's current size: pages past the end
    /// of the segment fault with SIGBUS on access.
    pub fn map(&self, len: usize, prot: ProtFlags) -> KResult<Mapping> {
        kensure!(len > 0, InvalidArgument, Op::Mmap);
        kensure!((len as u64) <= self.len()?, InvalidArgument, Op::Mmap);
        MapOptions::new(len)
            .prot(prot)
            .shared()
            .file(self.fd.as_fd(), 0)
            .map()
    }
}

impl AsFd for SharedMemory {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl From<SharedMemory> for OwnedFd {
    fn from(shm: SharedMemory) -> Self {
        shm.fd
    }
}
