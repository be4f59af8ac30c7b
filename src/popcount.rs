//! 32-bit population count, the inner-loop correlator kernel (C3).
//!
//! Grounded on `acquire.c`/`channel.c`'s `setup_count_ones`/`count_ones`:
//! a 256-entry byte lookup table applied to each of the four bytes of the
//! word, built once via `once_cell`.

use once_cell::sync::Lazy;

static ONES_LOOKUP: Lazy<[u8; 256]> = Lazy::new(|| {
    let mut table = [0u8; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = i.count_ones() as u8;
    }
    table
});

/// Number of set bits in `a`, via the byte-wise lookup table.
pub fn popcount(a: u32) -> u32 {
    let table = &*ONES_LOOKUP;
    table[(a & 0xFF) as usize] as u32
        + table[((a >> 8) & 0xFF) as usize] as u32
        + table[((a >> 16) & 0xFF) as usize] as u32
        + table[((a >> 24) & 0xFF) as usize] as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_boundaries() {
        assert_eq!(popcount(0), 0);
        assert_eq!(popcount(0xFFFF_FFFF), 32);
        assert_eq!(popcount(1), 1);
        assert_eq!(popcount(0x8000_0000), 1);
        assert_eq!(popcount(0xAAAA_AAAA), 16);
    }

    #[test]
    fn matches_reference_fuzz() {
        let mut x: u32 = 0x1234_5678;
        for _ in 0..100_000 {
            // cheap xorshift, deterministic without rand/Math.random
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            assert_eq!(popcount(x), x.count_ones());
        }
    }
}
