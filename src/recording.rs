//! Raw 1-bit sample file reader (C9, spec.md §6), replacing the teacher's
//! IQ-float `IQRecording`: this system samples the IF directly at 1
//! bit/sample, not in-phase/quadrature pairs.
//!
//! Each input byte is bit-reversed (LSB<->MSB) via a precomputed 256-entry
//! table, then four consecutive (post-reversal) bytes are packed MSB-first
//! into the 32-bit words the pipeline consumes, matching `fsgps.c`'s sample
//! feed.

use bytesize::ByteSize;
use colored::Colorize;
use once_cell::sync::Lazy;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use crate::error::Result;

static BIT_REVERSE: Lazy<[u8; 256]> = Lazy::new(|| {
    let mut table = [0u8; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut b = i as u8;
        let mut r = 0u8;
        for _ in 0..8 {
            r = (r << 1) | (b & 1);
            b >>= 1;
        }
        *slot = r;
    }
    table
});

/// Buffered reader over a raw-sample file, yielding 32-bit, bit-reversed,
/// MSB-first-packed words one at a time.
pub struct SampleSource {
    reader: BufReader<File>,
}

impl SampleSource {
    pub fn open(file_path: PathBuf) -> Result<Self> {
        let file = File::open(&file_path)?;
        let file_size = file.metadata()?.len();
        println!(
            "sample file: {} -- {}",
            file_path.display().to_string().green(),
            ByteSize::b(file_size).to_string_as(false).bold(),
        );
        Ok(SampleSource { reader: BufReader::new(file) })
    }

    /// Reads the next 4 raw bytes and returns the bit-reversed, MSB-first
    /// packed word, or `None` at end of stream. A short final read (fewer
    /// than 4 bytes left) is treated as end of stream — spec.md §5 permits
    /// dropping a truncated trailing word.
    pub fn next_word(&mut self) -> Option<u32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf).ok()?;
        let table = &*BIT_REVERSE;
        Some(
            (table[buf[0] as usize] as u32) << 24
                | (table[buf[1] as usize] as u32) << 16
                | (table[buf[2] as usize] as u32) << 8
                | (table[buf[3] as usize] as u32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bit_reverse_table_is_involutive() {
        let table = &*BIT_REVERSE;
        for i in 0..=255u8 {
            assert_eq!(table[table[i as usize] as usize], i);
        }
        assert_eq!(table[0b1000_0000], 0b0000_0001);
        assert_eq!(table[0b0000_0001], 0b1000_0000);
    }

    #[test]
    fn next_word_reverses_bytes_and_packs_msb_first() {
        let dir = std::env::temp_dir().join(format!("sample_source_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("samples.bin");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&[0b1000_0000, 0x00, 0x00, 0x00]).unwrap();
        }

        let mut source = SampleSource::open(path).unwrap();
        let word = source.next_word().unwrap();
        assert_eq!(word, 0x01 << 24);
        assert!(source.next_word().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn truncated_trailing_word_is_dropped_not_errored() {
        let dir = std::env::temp_dir().join(format!("sample_source_test2_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("samples.bin");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&[0x01, 0x02]).unwrap();
        }

        let mut source = SampleSource::open(path).unwrap();
        assert!(source.next_word().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
