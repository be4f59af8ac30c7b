//! Per-SV NAV subframe cache (`NAV_<NN>.dat`, spec.md §6), grounded on
//! `fast_fsgps/nav.c`'s `nav_save_frame`/`nav_read_in_cached_data`.
//!
//! Five fixed 40-byte slots, one per subframe 1..5, each ten little-endian
//! `u32` words holding the raw 30-bit NAV words right-justified. Opened
//! lazily per SV (spec.md §5: "at most one writer per file"); a missing
//! file on startup is not an error (spec.md §7).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

const SLOT_BYTES: u64 = 40;
const WORDS_PER_SLOT: usize = 10;

/// A lazily-opened read/write handle to one SV's `NAV_<NN>.dat`.
pub struct NavCache {
    file: File,
}

impl NavCache {
    /// Opens (creating if absent) the cache file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        Ok(NavCache { file })
    }

    /// Writes subframe `frame_type` (1..=5) as its ten raw words.
    pub fn write_subframe(&mut self, frame_type: u8, words: &[u32; 10]) -> std::io::Result<()> {
        debug_assert!((1..=5).contains(&frame_type));
        let offset = SLOT_BYTES * (frame_type as u64 - 1);
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; SLOT_BYTES as usize];
        for (i, &word) in words.iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        self.file.write_all(&buf)?;
        self.file.flush()
    }

    /// Reads back subframe `frame_type` if the file is large enough to
    /// hold it; used at startup to seed a NAV framer from a prior run.
    pub fn read_subframe(&mut self, frame_type: u8) -> std::io::Result<Option<[u32; 10]>> {
        debug_assert!((1..=5).contains(&frame_type));
        let offset = SLOT_BYTES * (frame_type as u64 - 1);
        let len = self.file.metadata()?.len();
        if len < offset + SLOT_BYTES {
            return Ok(None);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; SLOT_BYTES as usize];
        self.file.read_exact(&mut buf)?;
        let mut words = [0u32; WORDS_PER_SLOT];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u32::from_le_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap());
        }
        Ok(Some(words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_through_a_temp_file() {
        let dir = std::env::temp_dir().join(format!("nav_cache_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("NAV_05.dat");

        let mut words = [0u32; 10];
        words[0] = 0x3FFF_FFFF;
        words[3] = 0x1234_5678 & 0x3FFF_FFFF;

        {
            let mut cache = NavCache::open(&path).unwrap();
            cache.write_subframe(1, &words).unwrap();
        }

        let mut cache = NavCache::open(&path).unwrap();
        assert_eq!(cache.read_subframe(1).unwrap(), Some(words));
        assert_eq!(cache.read_subframe(2).unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn slots_are_independent_offsets() {
        let dir = std::env::temp_dir().join(format!("nav_cache_test2_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("NAV_12.dat");

        let mut cache = NavCache::open(&path).unwrap();
        let mut a = [0u32; 10];
        a[0] = 1;
        let mut b = [0u32; 10];
        b[0] = 2;
        cache.write_subframe(1, &a).unwrap();
        cache.write_subframe(2, &b).unwrap();

        assert_eq!(cache.read_subframe(1).unwrap(), Some(a));
        assert_eq!(cache.read_subframe(2).unwrap(), Some(b));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
