// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Flag sets for the mapping calls.
//!
//! Bit values come straight from the kernel headers, so `bits()` can be
//! passed to the OS unchanged and `from_bits()` accepts the raw ABI values.

use bitflags::bitflags;
use kerrno::{KResult, Op, kensure};
use linux_raw_sys::general::{
    MAP_ANONYMOUS, MAP_DENYWRITE, MAP_EXECUTABLE, MAP_FIXED, MAP_FIXED_NOREPLACE, MAP_GROWSDOWN,
    MAP_HUGETLB, MAP_LOCKED, MAP_NONBLOCK, MAP_NORESERVE, MAP_POPULATE, MAP_PRIVATE, MAP_SHARED,
    MAP_STACK, MAP_SYNC, MCL_CURRENT, MCL_FUTURE, MCL_ONFAULT, MREMAP_FIXED, MREMAP_MAYMOVE,
    MS_ASYNC, MS_INVALIDATE, MS_SYNC, O_CREAT, O_EXCL, O_RDWR, O_TRUNC, PROT_EXEC, PROT_READ,
    PROT_WRITE,
};

bitflags! {
    /// Page protection. The empty set is `PROT_NONE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProtFlags: u32 {
        const READ = PROT_READ;
        const WRITE = PROT_WRITE;
        const EXEC = PROT_EXEC;
    }
}

impl ProtFlags {
    pub const NONE: Self = Self::empty();
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);

    pub const fn is_write_exec(self) -> bool {
        self.contains(Self::WRITE.union(Self::EXEC))
    }
}

bitflags! {
    /// Mapping kind and placement modifiers for `mmap`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapFlags: u32 {
        const SHARED = MAP_SHARED;
        const PRIVATE = MAP_PRIVATE;
        const FIXED = MAP_FIXED;
        const ANONYMOUS = MAP_ANONYMOUS;
        const GROWSDOWN = MAP_GROWSDOWN;
        const DENYWRITE = MAP_DENYWRITE;
        const EXECUTABLE = MAP_EXECUTABLE;
        const LOCKED = MAP_LOCKED;
        const NORESERVE = MAP_NORESERVE;
        const POPULATE = MAP_POPULATE;
        const NONBLOCK = MAP_NONBLOCK;
        const STACK = MAP_STACK;
        const HUGETLB = MAP_HUGETLB;
        const SYNC = MAP_SYNC;
        const FIXED_NOREPLACE = MAP_FIXED_NOREPLACE;
    }
}

impl MapFlags {
    /// Bits chosen by `MapOptions` itself rather than by modifiers.
    pub const PLACEMENT: Self = Self::SHARED
        .union(Self::PRIVATE)
        .union(Self::ANONYMOUS)
        .union(Self::FIXED)
        .union(Self::FIXED_NOREPLACE);

    /// Exactly one of `SHARED` and `PRIVATE` must be present.
    pub(crate) fn validate(self, op: Op) -> KResult {
        kensure!(
            self.contains(Self::SHARED) != self.contains(Self::PRIVATE),
            InvalidArgument,
            op
        );
        kensure!(
            !self.contains(Self::FIXED | Self::FIXED_NOREPLACE),
            InvalidArgument,
            op
        );
        Ok(())
    }
}

bitflags! {
    /// `msync` mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SyncFlags: u32 {
        const ASYNC = MS_ASYNC;
        const INVALIDATE = MS_INVALIDATE;
        const SYNC = MS_SYNC;
    }
}

impl SyncFlags {
    /// Exactly one of `ASYNC` and `SYNC`, `INVALIDATE` optional.
    pub(crate) fn validate(self) -> KResult {
        kensure!(
            self.contains(Self::ASYNC) != self.contains(Self::SYNC),
            InvalidArgument,
            Op::Msync
        );
        Ok(())
    }
}

bitflags! {
    /// `mlockall` scope.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MlockAllFlags: u32 {
        const CURRENT = MCL_CURRENT;
        const FUTURE = MCL_FUTURE;
        const ONFAULT = MCL_ONFAULT;
    }
}

impl MlockAllFlags {
    /// `ONFAULT` only modifies `CURRENT`/`FUTURE`; an empty set locks nothing.
    pub(crate) fn validate(self) -> KResult {
        kensure!(
            self.intersects(Self::CURRENT | Self::FUTURE),
            InvalidArgument,
            Op::Mlockall
        );
        Ok(())
    }
}

bitflags! {
    /// `mremap` behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RemapFlags: u32 {
        const MAYMOVE = MREMAP_MAYMOVE;
        const FIXED = MREMAP_FIXED;
    }
}

impl RemapFlags {
    /// `FIXED` is only meaningful together with `MAYMOVE`.
    pub(crate) fn validate(self) -> KResult {
        kensure!(
            !self.contains(Self::FIXED) || self.contains(Self::MAYMOVE),
            InvalidArgument,
            Op::Mremap
        );
        Ok(())
    }
}

bitflags! {
    /// Open mode for `shm_open`. The empty set opens read-only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShmOpenFlags: u32 {
        const RDWR = O_RDWR;
        const CREATE = O_CREAT;
        const EXCL = O_EXCL;
        const TRUNC = O_TRUNC;
    }
}

impl ShmOpenFlags {
    pub const READ_ONLY: Self = Self::empty();
}
