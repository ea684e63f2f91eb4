// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use kerrno::{KError, KErrorKind, KResult, Op};
use log::{debug, warn};
use memaddr::{PAGE_SIZE_4K, VirtAddr};
use spin::Once;

use crate::flags::MapFlags;

static PAGE_SIZE: Once<usize> = Once::new();
static HUGE_PAGE_SIZE: Once<Option<usize>> = Once::new();

/// The system page size, queried once with `sysconf(_SC_PAGESIZE)`.
pub fn page_size() -> usize {
    *PAGE_SIZE.call_once(|| {
        // SAFETY: sysconf has no memory-safety preconditions.
        let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        match usize::try_from(raw) {
            Ok(size) if size.is_power_of_two() => size,
            _ => {
                warn!("sysconf(_SC_PAGESIZE) returned {raw}, assuming {PAGE_SIZE_4K:#x}");
                PAGE_SIZE_4K
            }
        }
    })
}

/// The default huge page size, from the `Hugepagesize:` line of
/// `/proc/meminfo`. `None` when the kernel has no hugetlb support.
pub fn huge_page_size() -> Option<usize> {
    *HUGE_PAGE_SIZE.call_once(|| {
        let size = std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|info| parse_huge_page_size(&info));
        debug!("default huge page size: {size:?}");
        size
    })
}

pub(crate) fn parse_huge_page_size(meminfo: &str) -> Option<usize> {
    let line = meminfo
        .lines()
        .find_map(|line| line.strip_prefix("Hugepagesize:"))?;
    let kib = line.trim().strip_suffix("kB")?.trim().parse::<usize>().ok()?;
    kib.checked_mul(1024).filter(|size| size.is_power_of_two())
}

/// Granularity the kernel uses for a mapping created with `flags`.
///
/// Huge-page mappings are sized and split in whole huge pages.
pub(crate) fn granule_of(flags: MapFlags, op: Op) -> KResult<usize> {
    if flags.contains(MapFlags::HUGETLB) {
        huge_page_size().ok_or(KError::new(KErrorKind::Unsupported, op))
    } else {
        Ok(page_size())
    }
}

pub(crate) fn is_page_aligned(addr: VirtAddr) -> bool {
    memaddr::is_aligned(addr.as_usize(), page_size())
}

pub(crate) fn pages_in(len: usize) -> usize {
    memaddr::pages_spanning(len, page_size())
}
