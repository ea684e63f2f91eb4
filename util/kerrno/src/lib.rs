// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Structured errors for memory-mapping calls.
//!
//! Every failure carries three things: a [`KErrorKind`] that callers match
//! on, the [`Op`] that failed, and the raw errno when the OS produced one.
//! The same errno means different things to different calls (`ENOMEM` from
//! `mmap` is an exhausted address space, from `mprotect` it is an unmapped
//! range), so translation goes through [`KErrorKind::from_errno`] with the
//! operation as context.
#![cfg_attr(not(feature = "std"), no_std)]

use core::fmt;

use linux_raw_sys::errno;
use strum::{EnumIter, IntoStaticStr};

mod tests;

/// Caller-visible failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, EnumIter)]
pub enum KErrorKind {
    /// Bad length, alignment, offset, flag combination or name.
    InvalidArgument,
    /// The requested access conflicts with the backing object or policy.
    PermissionDenied,
    /// No virtual address range of the requested size could be found.
    OutOfAddressSpace,
    /// A process or system resource limit was hit.
    ResourceExhausted,
    /// The range, or part of it, is not mapped.
    NotMapped,
    /// The backing object or kernel does not support the request.
    Unsupported,
    /// A signal arrived during a blocking call.
    Interrupted,
    NotFound,
    AlreadyExists,
    BadDescriptor,
    Busy,
    Other,
}

impl KErrorKind {
    /// Short lowercase description, used by `Display`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::PermissionDenied => "permission denied",
            Self::OutOfAddressSpace => "out of address space",
            Self::ResourceExhausted => "resource exhausted",
            Self::NotMapped => "range not mapped",
            Self::Unsupported => "operation not supported",
            Self::Interrupted => "interrupted",
            Self::NotFound => "no such object",
            Self::AlreadyExists => "object already exists",
            Self::BadDescriptor => "bad file descriptor",
            Self::Busy => "resource busy",
            Self::Other => "unclassified error",
        }
    }

    /// Variant name, e.g. `"NotMapped"`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Classifies `errno` as reported by `op`.
    pub fn from_errno(op: Op, errno: i32) -> Self {
        let Ok(code) = u32::try_from(errno) else {
            return Self::Other;
        };

        // Codes whose meaning depends on the call.
        match code {
            errno::ENOMEM => {
                return match op {
                    Op::Mmap | Op::Mremap => Self::OutOfAddressSpace,
                    Op::Mprotect
                    | Op::Msync
                    | Op::Madvise
                    | Op::Mincore
                    | Op::Mlock
                    | Op::Munlock
                    | Op::RemapFilePages => Self::NotMapped,
                    _ => Self::ResourceExhausted,
                };
            }
            errno::EEXIST => {
                return match op {
                    Op::ShmOpen | Op::Open => Self::AlreadyExists,
                    _ => Self::InvalidArgument,
                };
            }
            errno::EFAULT => {
                return match op {
                    Op::Mremap => Self::NotMapped,
                    _ => Self::InvalidArgument,
                };
            }
            _ => {}
        }

        match code {
            errno::EINVAL | errno::EOVERFLOW | errno::ENAMETOOLONG => Self::InvalidArgument,
            errno::EACCES | errno::EPERM | errno::ETXTBSY => Self::PermissionDenied,
            errno::EAGAIN | errno::EMFILE | errno::ENFILE => Self::ResourceExhausted,
            errno::ENODEV | errno::ENOSYS | errno::EOPNOTSUPP => Self::Unsupported,
            errno::EINTR => Self::Interrupted,
            errno::ENOENT => Self::NotFound,
            errno::EBADF => Self::BadDescriptor,
            errno::EBUSY => Self::Busy,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for KErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The call a [`KError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Op {
    Mmap,
    Munmap,
    Mremap,
    Mprotect,
    Msync,
    Madvise,
    Mlock,
    Munlock,
    Mlockall,
    Munlockall,
    Mincore,
    RemapFilePages,
    ShmOpen,
    ShmUnlink,
    Ftruncate,
    Fstat,
    Open,
    Sysconf,
    /// Reading or parsing configuration.
    Config,
    /// Byte copies between a mapping and a caller buffer.
    Copy,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed memory-mapping operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KError {
    kind: KErrorKind,
    op: Op,
    errno: Option<i32>,
}

/// Result alias used across the mapping crates.
pub type KResult<T = ()> = Result<T, KError>;

impl KError {
    /// An error detected before any call was made.
    pub const fn new(kind: KErrorKind, op: Op) -> Self {
        Self {
            kind,
            op,
            errno: None,
        }
    }

    /// Shorthand for a validation failure.
    pub const fn invalid(op: Op) -> Self {
        Self::new(KErrorKind::InvalidArgument, op)
    }

    /// Translates a raw errno returned by `op`.
    pub fn from_errno(op: Op, errno: i32) -> Self {
        Self {
            kind: KErrorKind::from_errno(op, errno),
            op,
            errno: Some(errno),
        }
    }

    /// Captures the calling thread's errno after `op` failed.
    #[cfg(feature = "std")]
    pub fn last_os_error(op: Op) -> Self {
        match std::io::Error::last_os_error().raw_os_error() {
            Some(code) => Self::from_errno(op, code),
            None => Self::new(KErrorKind::Other, op),
        }
    }

    #[inline]
    pub const fn kind(&self) -> KErrorKind {
        self.kind
    }

    #[inline]
    pub const fn op(&self) -> Op {
        self.op
    }

    /// The OS error code, if the OS produced this error.
    #[inline]
    pub const fn errno(&self) -> Option<i32> {
        self.errno
    }

    /// Re-tags the error with a different operation, keeping kind and errno.
    pub const fn with_op(self, op: Op) -> Self {
        Self { op, ..self }
    }
}

impl fmt::Display for KError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.op, self.kind)?;
        if let Some(code) = self.errno {
            write!(f, " (errno {code})")?;
        }
        Ok(())
    }
}

impl core::error::Error for KError {}

impl From<KError> for KErrorKind {
    fn from(e: KError) -> Self {
        e.kind
    }
}

#[cfg(feature = "std")]
impl From<KErrorKind> for std::io::ErrorKind {
    fn from(kind: KErrorKind) -> Self {
        use std::io::ErrorKind as E;
        match kind {
            KErrorKind::InvalidArgument => E::InvalidInput,
            KErrorKind::PermissionDenied => E::PermissionDenied,
            KErrorKind::OutOfAddressSpace | KErrorKind::ResourceExhausted => E::OutOfMemory,
            KErrorKind::NotMapped => E::AddrNotAvailable,
            KErrorKind::Unsupported => E::Unsupported,
            KErrorKind::Interrupted => E::Interrupted,
            KErrorKind::NotFound => E::NotFound,
            KErrorKind::AlreadyExists => E::AlreadyExists,
            KErrorKind::BadDescriptor | KErrorKind::Busy | KErrorKind::Other => E::Other,
        }
    }
}

#[cfg(feature = "std")]
impl From<KError> for std::io::Error {
    fn from(e: KError) -> Self {
        match e.errno {
            Some(code) => std::io::Error::from_raw_os_error(code),
            None => std::io::Error::new(e.kind.into(), e),
        }
    }
}

/// Returns early with a validation error.
///
/// ```ignore
/// kbail!(InvalidArgument, Op::Mmap);
/// ```
#[macro_export]
macro_rules! kbail {
    ($kind:ident, $op:expr) => {
        return Err($crate::KError::new($crate::KErrorKind::$kind, $op))
    };
}

/// Returns early with a validation error unless `cond` holds.
#[macro_export]
macro_rules! kensure {
    ($cond:expr, $kind:ident, $op:expr) => {
        if !$cond {
            $crate::kbail!($kind, $op);
        }
    };
}
