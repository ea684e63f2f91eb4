// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use linux_raw_sys::general::{
    MADV_COLD, MADV_DODUMP, MADV_DOFORK, MADV_DONTDUMP, MADV_DONTFORK, MADV_DONTNEED, MADV_FREE,
    MADV_HUGEPAGE, MADV_KEEPONFORK, MADV_MERGEABLE, MADV_NOHUGEPAGE, MADV_NORMAL, MADV_PAGEOUT,
    MADV_RANDOM, MADV_REMOVE, MADV_SEQUENTIAL, MADV_UNMERGEABLE, MADV_WILLNEED, MADV_WIPEONFORK,
};
use strum::{EnumIter, IntoStaticStr};

/// Hints that never change what the program observes in the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Advice {
    Normal,
    Random,
    Sequential,
    WillNeed,
    HugePage,
    NoHugePage,
    Mergeable,
    Unmergeable,
    DontDump,
    DoDump,
    Cold,
    PageOut,
}

impl Advice {
    pub const fn code(self) -> u32 {
        match self {
            Self::Normal => MADV_NORMAL,
            Self::Random => MADV_RANDOM,
            Self::Sequential => MADV_SEQUENTIAL,
            Self::WillNeed => MADV_WILLNEED,
            Self::HugePage => MADV_HUGEPAGE,
            Self::NoHugePage => MADV_NOHUGEPAGE,
            Self::Mergeable => MADV_MERGEABLE,
            Self::Unmergeable => MADV_UNMERGEABLE,
            Self::DontDump => MADV_DONTDUMP,
            Self::DoDump => MADV_DODUMP,
            Self::Cold => MADV_COLD,
            Self::PageOut => MADV_PAGEOUT,
        }
    }
}

/// Hints that may discard contents or change what a forked child sees.
///
/// After `DontNeed` or `Free` a private anonymous range can read back as
/// zeroes, and after `DontFork` a child faults on the range. Any reference
/// into the range held across the call can therefore observe different data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum UncheckedAdvice {
    DontNeed,
    Free,
    Remove,
    DontFork,
    DoFork,
    WipeOnFork,
    KeepOnFork,
}

impl UncheckedAdvice {
    pub const fn code(self) -> u32 {
        match self {
            Self::DontNeed => MADV_DONTNEED,
            Self::Free => MADV_FREE,
            Self::Remove => MADV_REMOVE,
            Self::DontFork => MADV_DONTFORK,
            Self::DoFork => MADV_DOFORK,
            Self::WipeOnFork => MADV_WIPEONFORK,
            Self::KeepOnFork => MADV_KEEPONFORK,
        }
    }
}
