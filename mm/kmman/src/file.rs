// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::ops::{Deref, DerefMut};
use std::{
    fs::{File, OpenOptions},
    os::fd::AsFd,
    path::{Path, PathBuf},
};

use kerrno::{KError, KErrorKind, KResult, Op, kensure};
use log::{debug, warn};

use crate::{
    flags::{ProtFlags, RemapFlags},
    mapping::Mapping,
    options::MapOptions,
    sys,
};

/// A file mapped shared in its entirety.
///
/// The file length and the mapping length move together: [`resize`]
/// changes both.
///
/// [`resize`]: Self::resize
#[derive(Debug)]
pub struct MappedFile {
    map: Mapping,
    file: File,
    path: PathBuf,
}

fn open_err(e: std::io::Error) -> KError {
    match e.raw_os_error() {
        Some(code) => KError::from_errno(Op::Open, code),
        None => KError::new(KErrorKind::Other, Op::Open),
    }
}

fn len_to_usize(len: u64) -> KResult<usize> {
    usize::try_from(len).map_err(|_| KError::invalid(Op::Mmap))
}

impl MappedFile {
    /// Creates `path` (or truncates it) with `len` zero bytes and maps it
    /// read-write.
    pub fn create(path: impl AsRef<Path>, len: usize) -> KResult<Self> {
        kensure!(len > 0, InvalidArgument, Op::Mmap);
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(open_err)?;
        sys::ftruncate(file.as_fd(), len as u64)?;
        Self::map_file(file, path, len, ProtFlags::READ_WRITE)
    }

    /// Maps an existing, non-empty file at its current length.
    ///
    /// The file is opened read-write only when `prot` contains `WRITE`.
    pub fn open(path: impl AsRef<Path>, prot: ProtFlags) -> KResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(prot.contains(ProtFlags::WRITE))
            .open(path)
            .map_err(open_err)?;
        let len = len_to_usize(sys::fd_len(file.as_fd())?)?;
        kensure!(len > 0, InvalidArgument, Op::Mmap);
        Self::map_file(file, path, len, prot)
    }

    fn map_file(file: File, path: &Path, len: usize, prot: ProtFlags) -> KResult<Self> {
        let map = MapOptions::new(len)
            .prot(prot)
            .shared()
            .file(file.as_fd(), 0)
            .map()?;
        debug!("mapped file {} ({len:#x} bytes)", path.display());
        Ok(Self {
            map,
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Sets file and mapping length to `new_len`; the base address may move.
    ///
    /// Returns `false` when the length is already `new_len`.
    pub fn resize(&mut self, new_len: usize) -> KResult<bool> {
        kensure!(new_len > 0, InvalidArgument, Op::Mremap);
        let old_len = self.map.len();
        if new_len == old_len {
            return Ok(false);
        }
        // Shrink the view before the file so no page past EOF stays mapped;
        // grow the file before the view for the same reason.
        if new_len < old_len {
            self.map.remap(new_len, RemapFlags::MAYMOVE)?;
            if let Err(e) = sys::ftruncate(self.file.as_fd(), new_len as u64) {
                if let Err(undo) = self.map.remap(old_len, RemapFlags::MAYMOVE) {
                    warn!(
                        "resize {}: view stuck at {new_len:#x} bytes: {undo}",
                        self.path.display()
                    );
                }
                return Err(e);
            }
        } else {
            sys::ftruncate(self.file.as_fd(), new_len as u64)?;
            self.map.remap(new_len, RemapFlags::MAYMOVE)?;
        }
        debug!(
            "resized {} {old_len:#x} -> {new_len:#x}",
            self.path.display()
        );
        Ok(true)
    }

    /// Grows to `min_len` if currently smaller.
    pub fn grow_if_needed(&mut self, min_len: usize) -> KResult<bool> {
        if self.map.len() >= min_len {
            return Ok(false);
        }
        self.resize(min_len)
    }

    /// Shrinks to `max_len` if currently larger.
    pub fn shrink_if_needed(&mut self, max_len: usize) -> KResult<bool> {
        if self.map.len() <= max_len {
            return Ok(false);
        }
        self.resize(max_len)
    }

    /// Unmaps and closes, reporting an unmap failure.
    pub fn close(self) -> KResult {
        self.map.unmap()
    }
}

impl Deref for MappedFile {
    type Target = Mapping;

    fn deref(&self) -> &Mapping {
        &self.map
    }
}

impl DerefMut for MappedFile {
    fn deref_mut(&mut self) -> &mut Mapping {
        &mut self.map
    }
}
