// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use kerrno::KResult;
use log::debug;

use crate::{flags::MlockAllFlags, sys};

/// Locks the whole address space in RAM.
///
/// `flags` needs `CURRENT`, `FUTURE` or both; `ONFAULT` alone is rejected.
pub fn lock_all(flags: MlockAllFlags) -> KResult {
    sys::mlockall(flags)?;
    debug!("locked address space ({flags:?})");
    Ok(())
}

/// Drops every lock taken by [`lock_all`] or `Mapping::lock`.
pub fn unlock_all() -> KResult {
    sys::munlockall()?;
    debug!("unlocked address space");
    Ok(())
}
