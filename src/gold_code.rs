//! Gold-code generator and packed-code table (C1).
//!
//! Grounded on `fast_fsgps/gold_codes.c`: two 10-bit LFSRs (G1 fixed,
//! G2 per-SV tapped) combined by XOR to produce the 1023-chip C/A code,
//! plus a 32-oversampled, 32-bit-packed lookup table used directly by the
//! acquisition correlator (spec §9 permits either representation; this
//! crate keeps the packed table, matching the original's
//! `gold_codes_32_cycles`, since acquisition's inner loop indexes it as a
//! straight array lookup).

pub const CODE_LEN: usize = 1023;
pub const OVERSAMPLE: usize = 16;
pub const PACKED_LEN: usize = CODE_LEN * OVERSAMPLE;

/// SV -> (tap0, tap1) table, 1-indexed taps as used by the G2 LFSR,
/// verbatim from `gold_codes.c`'s `space_vehicles[]`.
const SV_TAPS: [(u8, u8); 32] = [
    (2, 6), (3, 7), (4, 8), (5, 9), (1, 9), (2, 10), (1, 8), (2, 9),
    (3, 10), (2, 3), (3, 4), (5, 6), (6, 7), (7, 8), (8, 9), (9, 10),
    (1, 4), (2, 5), (3, 6), (4, 7), (5, 8), (6, 9), (1, 3), (4, 6),
    (5, 7), (6, 8), (7, 9), (8, 10), (1, 6), (2, 7), (3, 8), (4, 9),
];

fn g1_lfsr() -> [bool; CODE_LEN] {
    let mut out = [false; CODE_LEN];
    let mut state: u32 = 0x3FF;
    for bit in out.iter_mut() {
        *bit = (state >> 9) & 1 != 0;
        let new_bit = ((state >> 9) ^ (state >> 2)) & 1;
        state = ((state << 1) | new_bit) & 0x3FF;
    }
    out
}

fn g2_lfsr(tap0: u8, tap1: u8) -> [bool; CODE_LEN] {
    let tap0 = tap0 - 1;
    let tap1 = tap1 - 1;
    let mut out = [false; CODE_LEN];
    let mut state: u32 = 0x3FF;
    for bit in out.iter_mut() {
        *bit = ((state >> tap0) ^ (state >> tap1)) & 1 != 0;
        let new_bit =
            ((state >> 9) ^ (state >> 8) ^ (state >> 7) ^ (state >> 5) ^ (state >> 2) ^ (state >> 1)) & 1;
        state = ((state << 1) | new_bit) & 0x3FF;
    }
    out
}

/// Immutable, per-SV Gold-code table: a 1023-chip sequence and the
/// 32-oversampled packed bitmap table derived from it.
pub struct GoldCode {
    pub chips: [bool; CODE_LEN],
    pub packed: Vec<u32>,
}

impl GoldCode {
    fn build(tap0: u8, tap1: u8) -> Self {
        let g1 = g1_lfsr();
        let g2 = g2_lfsr(tap0, tap1);
        let mut chips = [false; CODE_LEN];
        for i in 0..CODE_LEN {
            chips[i] = g1[i] ^ g2[i];
        }

        let mut packed = vec![0u32; PACKED_LEN];
        for (i, entry) in packed.iter_mut().enumerate() {
            let mut t: u32 = 0;
            for j in 0..32 {
                t <<= 1;
                if chips[((i + j) >> 4) % CODE_LEN] {
                    t |= 1;
                }
            }
            *entry = t;
        }

        GoldCode { chips, packed }
    }
}

/// All 32 per-SV Gold-code tables, built once at startup and shared
/// read-only thereafter.
pub struct GoldCodeTable {
    codes: Vec<GoldCode>,
}

impl GoldCodeTable {
    pub fn new() -> Self {
        let mut codes = Vec::with_capacity(SV_TAPS.len());
        for &(tap0, tap1) in &SV_TAPS {
            codes.push(GoldCode::build(tap0, tap1));
        }
        GoldCodeTable { codes }
    }

    pub fn get(&self, sv_id: u8) -> &GoldCode {
        &self.codes[(sv_id - 1) as usize]
    }
}

impl Default for GoldCodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_holds_for_every_sv() {
        let table = GoldCodeTable::new();
        for sv_id in 1..=32u8 {
            let code = table.get(sv_id);
            let ones = code.chips.iter().filter(|&&b| b).count();
            assert_eq!(ones, 512, "sv {sv_id}");
            assert_eq!(CODE_LEN - ones, 511, "sv {sv_id}");
        }
    }

    #[test]
    fn packed_table_coherence() {
        let table = GoldCodeTable::new();
        let code = table.get(1);
        for i in [0usize, 1, 17, 1022 * 16 + 3, PACKED_LEN - 1] {
            let word = code.packed[i];
            for j in 0..32u32 {
                let expected = code.chips[((i + j as usize) >> 4) % CODE_LEN];
                let bit = (word >> (31 - j)) & 1 != 0;
                assert_eq!(bit, expected, "i={i} j={j}");
            }
        }
    }

    #[test]
    fn autocorrelation_is_three_valued() {
        let table = GoldCodeTable::new();
        let code = table.get(1);
        let as_pm1: Vec<i32> = code.chips.iter().map(|&b| if b { 1 } else { -1 }).collect();
        for shift in [-65i32, -1, 63] {
            let mut sum = 0i32;
            for i in 0..CODE_LEN as i32 {
                let j = (i + shift).rem_euclid(CODE_LEN as i32);
                sum += as_pm1[i as usize] * as_pm1[j as usize];
            }
            assert!(sum == -65 || sum == -1 || sum == 63, "shift={shift} sum={sum}");
        }
    }
}
