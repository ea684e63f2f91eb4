//! Shared setup for the integration tests

#![allow(unused)]

use std::path::PathBuf;

use kmman::{SharedMemory, page_size};

#[ctor::ctor]
unsafe fn init_logger() {
    klogger::init_from_env("KMMAN_LOG");
}

/// A segment name unique to this process and call.
pub fn shm_name(tag: &str) -> String {
    SharedMemory::unique_name(tag)
}

/// A scratch file path unique to this process.
pub fn scratch_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("kmman-{}-{tag}", std::process::id()))
}

/// Removes the path when dropped.
pub struct ScratchFile(pub PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Removes the segment name when dropped, ignoring a prior removal.
pub struct ShmGuard(pub String);

impl Drop for ShmGuard {
    fn drop(&mut self) {
        let _ = SharedMemory::remove(&self.0);
    }
}

pub fn pages(n: usize) -> usize {
    n * page_size()
}
