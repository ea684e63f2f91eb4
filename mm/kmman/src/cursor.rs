// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::{flags::SyncFlags, mapping::Mapping};

/// Stream access to a mapping.
///
/// The position may be moved past the end; reads there return 0 bytes and
/// writes fail with `WriteZero`. `flush` syncs shared and file-backed
/// mappings synchronously.
pub struct MappingCursor<'a> {
    map: &'a mut Mapping,
    pos: u64,
}

impl<'a> MappingCursor<'a> {
    pub fn new(map: &'a mut Mapping) -> Self {
        Self { map, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn set_position(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Bytes between the position and the end of the mapping.
    pub fn remaining(&self) -> usize {
        self.offset().map_or(0, |off| self.map.len() - off)
    }

    pub fn get_ref(&self) -> &Mapping {
        &*self.map
    }

    /// Position as an in-bounds offset.
    fn offset(&self) -> Option<usize> {
        usize::try_from(self.pos)
            .ok()
            .filter(|&off| off <= self.map.len())
    }
}

impl Read for MappingCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(off) = self.offset() else {
            return Ok(0);
        };
        let n = self.map.read_at(off, buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MappingCursor<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match self.offset() {
            Some(off) => self.map.write_at(off, buf)?,
            None => 0,
        };
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write past the end of the mapping",
            ));
        }
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.map.is_shared() || self.map.is_file_backed() {
            self.map.sync(SyncFlags::SYNC)?;
        }
        Ok(())
    }
}

impl Seek for MappingCursor<'_> {
    fn seek(&mut self, style: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match style {
            SeekFrom::Start(n) => {
                self.pos = n;
                return Ok(n);
            }
            SeekFrom::End(n) => (self.map.len() as u64, n),
            SeekFrom::Current(n) => (self.pos, n),
        };
        match base.checked_add_signed(delta) {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
