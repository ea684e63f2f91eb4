// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Memory mapping for Linux processes.
//!
//! This crate covers the whole mapping call family:
//! - Mapping lifecycle (mmap, munmap, mremap) through [`MapOptions`] and the
//!   owned [`Mapping`] handle
//! - Access control (mprotect)
//! - Synchronization and residency (msync, mlock, mlockall, mincore)
//! - Advisory hints (madvise, remap_file_pages)
//! - Named shared memory (shm_open, shm_unlink) through [`SharedMemory`]
//!
//! The raw calls live in [`sys`]; everything else builds on them. The OS
//! mapping table is never mirrored: every query is a fresh call.
//!
//! Errors are [`kerrno::KError`] values carrying the failed call and the raw
//! errno. Calls are logged through `log` at `trace` level, lifecycle events
//! at `debug`.

cfg_if::cfg_if! {
    if #[cfg(not(target_os = "linux"))] {
        compile_error!("kmman only supports Linux");
    }
}

mod advice;
mod config;
mod cursor;
mod file;
mod flags;
mod lock;
mod mapping;
mod options;
mod page;
mod residency;
mod shm;
pub mod sys;


pub use kerrno::{KError, KErrorKind, KResult, Op};
pub use memaddr::{VirtAddr, VirtAddrRange};

pub use self::{
    advice::{Advice, UncheckedAdvice},
    config::{CONFIG_ENV, MmanConfig},
    cursor::MappingCursor,
    file::MappedFile,
    flags::{MapFlags, MlockAllFlags, ProtFlags, RemapFlags, ShmOpenFlags, SyncFlags},
    lock::{lock_all, unlock_all},
    mapping::Mapping,
    options::{MapOptions, Sharing},
    page::{huge_page_size, page_size},
    residency::ResidencyVector,
    shm::SharedMemory,
};
