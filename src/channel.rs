//! Per-satellite tracking channel: code/carrier NCOs, early/prompt/late
//! correlators, DLL/PLL discriminators and the NAV bit-sync front end (C5).
//!
//! Grounded on `fast_fsgps/channel.c`. The packed-word correlator and the
//! carrier NCO reuse [`crate::popcount::popcount`] and [`crate::nco::nco`]
//! directly, the same kernels acquisition uses. `fast_code_nco`'s
//! chip-boundary bookkeeping is reworked around a single boundary-distance
//! computation (see [`fast_code_nco`]) instead of the original's four
//! hand-unrolled `wrap0..wrap3` branches; both compute the same two
//! quantities a 32-sample word needs when a code repeat ends mid-word: did
//! it wrap, and how many of the word's samples belong to the repeat that
//! just finished.

use crate::config::{
    CODE_STEP_DEFAULT, CODE_TUNE_STEP, LATE_EARLY_IIR_FACTOR, LOCK_ANGLE_IIR_FACTOR,
    LOCK_DELTA_IIR_FACTOR, MAX_CHANNELS, MAX_SV_ID,
};
use crate::gold_code::{GoldCode, GoldCodeTable, CODE_LEN};
use crate::navigation::Navigation;
use crate::nco;
use crate::popcount::popcount;

const CODE_PHASE_ONE_CHIP: u32 = 1 << 22;
const CODE_PERIOD: u32 = (CODE_LEN as u32) << 22;

/// Early/prompt/late correlator arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arm {
    Early,
    Prompt,
    Late,
}

/// Running per-repeat correlator accumulator for one arm.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    sine: u32,
    cosine: u32,
    samples: u32,
    power_filtered: i64,
}

impl Accumulator {
    /// Fold in a 32-sample word's sine/cosine ones-counts, optionally
    /// finalising the just-completed repeat if `split` is `Some(n0)` (the
    /// number of this word's samples belonging to the repeat that ends
    /// here; the remaining `32-n0` start the next repeat).
    fn fold(&mut self, sine_word: u32, cosine_word: u32, split: Option<u32>) -> Option<(i64, i64)> {
        let Some(n0) = split else {
            self.sine += popcount(sine_word);
            self.cosine += popcount(cosine_word);
            self.samples += 32;
            return None;
        };

        let (old_sine, new_sine) = split_word(sine_word, n0);
        let (old_cosine, new_cosine) = split_word(cosine_word, n0);

        let total_sine = self.sine + popcount(old_sine);
        let total_cosine = self.cosine + popcount(old_cosine);
        let total_samples = self.samples + n0;

        let sine_val = total_sine as i64 - total_samples as i64 / 2;
        let cosine_val = total_cosine as i64 - total_samples as i64 / 2;

        self.sine = popcount(new_sine);
        self.cosine = popcount(new_cosine);
        self.samples = 32 - n0;

        Some((sine_val, cosine_val))
    }

    fn update_power(&mut self, sine_val: i64, cosine_val: i64) -> i64 {
        let power = sine_val * sine_val + cosine_val * cosine_val;
        self.power_filtered += (power - self.power_filtered) / LATE_EARLY_IIR_FACTOR as i64;
        self.power_filtered
    }
}

/// Split a 32-bit word (MSB = first sample) into the bits belonging to the
/// repeat ending at sample `n0` and the bits starting the next repeat.
fn split_word(word: u32, n0: u32) -> (u32, u32) {
    if n0 == 0 {
        (0, word)
    } else if n0 >= 32 {
        (word, 0)
    } else {
        (word >> (32 - n0), word & ((1u32 << (32 - n0)) - 1))
    }
}

/// Result of advancing the code NCO by one 32-sample word.
struct FastCodeResult {
    early: u32,
    prompt: u32,
    late: u32,
    new_nco_code: u32,
    /// Number of this word's samples belonging to the repeat ending here,
    /// if the code period wraps within this word.
    repeat_split: Option<u32>,
}

/// Advance a code NCO by 32 samples, producing early/prompt/late bitmaps
/// one chip apart and reporting whether the 1023-chip code period wrapped
/// within this word.
fn fast_code_nco(code: &GoldCode, nco_code: u32, step: u32) -> FastCodeResult {
    let chip = (nco_code >> 22) as usize;
    let frac = nco_code & (CODE_PHASE_ONE_CHIP - 1);

    let code_sub1 = code.chips[if chip == 0 { CODE_LEN - 1 } else { chip - 1 }];
    let code0 = code.chips[chip];
    let code1 = code.chips[(chip + 1) % CODE_LEN];
    let code2 = code.chips[(chip + 2) % CODE_LEN];
    let code3 = code.chips[(chip + 3) % CODE_LEN];

    let n0 = ((CODE_PHASE_ONE_CHIP + step - 1 - frac) / step).min(32);
    let n0_plus_n1 = (((2 * CODE_PHASE_ONE_CHIP) + step - 1 - frac) / step).min(32);
    let n1 = n0_plus_n1.saturating_sub(n0);
    let n2 = 32 - n0 - n1;

    let build = |bit_m1: bool, bit0: bool, bit1: bool| -> u32 {
        let mut word = if bit_m1 { 0xFFFF_FFFFu32 } else { 0 };
        word <<= n1;
        if bit0 {
            word |= (1u32 << n1) - 1;
        }
        if n2 > 0 {
            word <<= n2;
            if bit1 {
                word |= (1u32 << n2) - 1;
            }
        }
        word
    };

    let late = build(code_sub1, code0, code1);
    let prompt = build(code0, code1, code2);
    let early = build(code1, code2, code3);

    let new_nco_code = nco_code.wrapping_add(step.wrapping_mul(32));
    let distance_to_period_end = CODE_PERIOD.wrapping_sub(nco_code);
    let repeat_split = if (distance_to_period_end as u64) < (step as u64) * 32 {
        Some((((distance_to_period_end + step - 1) / step) as u32).min(32))
    } else {
        None
    };

    FastCodeResult { early, prompt, late, new_nco_code, repeat_split }
}

/// Events a channel emits as it tracks or loses lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A full NAV subframe has been decoded and cached for `sv_id`.
    SubframeReady { sv_id: u8 },
}

/// One tracked satellite: code/carrier NCOs, DLL/PLL discriminators and a
/// NAV bit-sync front end.
pub struct TrackChannel {
    pub sv_id: u8,
    carrier_phase: u32,
    pub step_if: u32,
    nco_code: u32,
    code_tune: i32,
    no_adjust: bool,
    early: Accumulator,
    prompt: Accumulator,
    late: Accumulator,
    last_angle: i32,
    angle_filtered: i32,
    delta_filtered: i32,
    pub bit_errors: i32,
    pub nav: Navigation,
}

impl TrackChannel {
    /// Current code NCO phase, `code_nco_phase` of spec.md §3/§6's Snapshot.
    pub fn code_nco_phase(&self) -> u32 {
        self.nco_code
    }

    pub fn early_power(&self) -> i64 {
        self.early.power_filtered
    }

    pub fn prompt_power(&self) -> i64 {
        self.prompt.power_filtered
    }

    pub fn late_power(&self) -> i64 {
        self.late.power_filtered
    }

    fn new(sv_id: u8, step_if: u32, nco_code: u32) -> Self {
        TrackChannel {
            sv_id,
            carrier_phase: 0,
            step_if,
            nco_code,
            code_tune: 0,
            no_adjust: false,
            early: Accumulator::default(),
            prompt: Accumulator::default(),
            late: Accumulator::default(),
            last_angle: 0,
            angle_filtered: 0,
            delta_filtered: 0,
            bit_errors: 0,
            nav: Navigation::new(),
        }
    }

    fn update(&mut self, data: u32, code: &GoldCode, events: &mut Vec<ChannelEvent>) {
        let (sine, cosine) = nco::nco(self.carrier_phase, self.step_if);
        self.carrier_phase = self.carrier_phase.wrapping_add(self.step_if.wrapping_mul(32));

        let fcn = fast_code_nco(code, self.nco_code, CODE_STEP_DEFAULT);

        let mut new_nco_code = fcn.new_nco_code;
        if new_nco_code < self.nco_code {
            new_nco_code = new_nco_code.wrapping_add(1 << 22);
        }
        if new_nco_code >= CODE_PERIOD {
            new_nco_code -= CODE_PERIOD;
        }
        self.nco_code = new_nco_code;

        let early_mix_s = data ^ fcn.early ^ sine;
        let early_mix_c = data ^ fcn.early ^ cosine;
        let prompt_mix_s = data ^ fcn.prompt ^ sine;
        let prompt_mix_c = data ^ fcn.prompt ^ cosine;
        let late_mix_s = data ^ fcn.late ^ sine;
        let late_mix_c = data ^ fcn.late ^ cosine;

        if let Some((sine_val, cosine_val)) = self.early.fold(early_mix_s, early_mix_c, fcn.repeat_split) {
            self.early.update_power(sine_val, cosine_val);
        }
        if let Some((sine_val, cosine_val)) = self.prompt.fold(prompt_mix_s, prompt_mix_c, fcn.repeat_split) {
            self.prompt.update_power(sine_val, cosine_val);
            self.adjust_prompt(sine_val, cosine_val, events);
        }
        if let Some((sine_val, cosine_val)) = self.late.fold(late_mix_s, late_mix_c, fcn.repeat_split) {
            self.late.update_power(sine_val, cosine_val);
            self.run_dll();
        }

        // `channel.c` clears this unconditionally at the end of every word,
        // after the (at most once per word) DLL run above has had its
        // chance to set it.
        self.no_adjust = false;
    }

    /// Carrier phase discriminator (atan2 on the prompt correlator), run
    /// once per code repeat (~1ms), driving both the carrier NCO step and
    /// the NAV bit-sync front end.
    ///
    /// `channel.c` drives this from a packed atan2 lookup table; this port
    /// computes the angle directly with `f64::atan2`, which is
    /// mathematically equivalent and far less error-prone to reconstruct
    /// than the original's bit-packed table index, at the cost of a
    /// floating-point call per millisecond (see DESIGN.md).
    fn adjust_prompt(&mut self, sine_val: i64, cosine_val: i64, events: &mut Vec<ChannelEvent>) {
        let angle = (cosine_val as f64).atan2(sine_val as f64);
        let angle_u8 = ((angle / (2.0 * std::f64::consts::PI)) * 256.0).round() as i32 & 0xFF;

        let mut delta = angle_u8 - self.last_angle;
        if delta > 128 {
            delta -= 256;
        } else if delta < -128 {
            delta += 256;
        }
        self.last_angle = angle_u8;

        self.delta_filtered -= self.delta_filtered / LOCK_DELTA_IIR_FACTOR;
        self.delta_filtered += delta;

        self.angle_filtered -= self.angle_filtered / LOCK_ANGLE_IIR_FACTOR;
        self.angle_filtered += angle_u8;
        if angle_u8 >= 128 {
            self.angle_filtered -= 256;
        }

        // (1<<24) / 32 / LOCK_DELTA_IIR_FACTOR / 16368, folded to its
        // integer value of 4.
        let adjust = self.angle_filtered / 8 + 4 * self.delta_filtered;
        self.step_if = (self.step_if as i64 - adjust as i64) as u32;

        let subframe = self.nav.add_bit(sine_val > 0);
        self.bit_errors = self.nav.bit_errors;
        events.extend(subframe.map(|_| ChannelEvent::SubframeReady { sv_id: self.sv_id }));
    }

    /// Delay-lock loop: compares the filtered early/late powers and nudges
    /// the code NCO. Runs once per code repeat, guarded by `no_adjust`
    /// against firing twice within the same word.
    fn run_dll(&mut self) {
        if self.no_adjust {
            return;
        }

        let mut adjust = self.code_tune;
        if self.early.power_filtered / 5 > self.late.power_filtered / 4 {
            self.early.power_filtered = (self.early.power_filtered * 7 + self.late.power_filtered) / 8;
            adjust += CODE_TUNE_STEP;
            self.code_tune += 2;
        } else if self.late.power_filtered / 5 > self.early.power_filtered / 4 {
            self.late.power_filtered = (self.late.power_filtered * 7 + self.early.power_filtered) / 8;
            adjust -= CODE_TUNE_STEP;
            self.code_tune -= 2;
        }

        self.nco_code = self.nco_code.wrapping_add(adjust as u32);
        self.no_adjust = true;
    }
}

/// A fixed pool of tracking channels, addressed by SV id, mirroring
/// `channel.c`'s global `channels[MAX_CHANNELS]` array.
pub struct ChannelPool {
    codes: GoldCodeTable,
    channels: Vec<TrackChannel>,
}

impl ChannelPool {
    pub fn new(codes: GoldCodeTable) -> Self {
        ChannelPool { codes, channels: Vec::with_capacity(MAX_CHANNELS) }
    }

    pub fn is_tracked(&self, sv_id: u8) -> bool {
        self.channels.iter().any(|c| c.sv_id == sv_id)
    }

    pub fn power_by_sv(&self, sv_id: u8) -> Option<i64> {
        self.channels.iter().find(|c| c.sv_id == sv_id).map(|c| c.prompt.power_filtered)
    }

    pub fn bit_errors(&self, sv_id: u8) -> Option<i32> {
        self.channels.iter().find(|c| c.sv_id == sv_id).map(|c| c.bit_errors)
    }

    pub fn clear_bit_errors(&mut self, sv_id: u8) {
        if let Some(c) = self.channels.iter_mut().find(|c| c.sv_id == sv_id) {
            c.bit_errors = 0;
            c.nav.bit_errors = 0;
        }
    }

    /// Replace (or add) the channel tracking `sv_id`, starting its code
    /// NCO at `offset` and its carrier NCO step at `step_if`. Returns
    /// `false` if `sv_id` is out of range and no channel was added.
    pub fn add(&mut self, sv_id: u8, step_if: u32, offset: u32) -> bool {
        if sv_id == 0 || sv_id > MAX_SV_ID {
            return false;
        }
        if let Some(c) = self.channels.iter_mut().find(|c| c.sv_id == sv_id) {
            *c = TrackChannel::new(sv_id, step_if, offset);
            return true;
        }
        if self.channels.len() >= MAX_CHANNELS {
            return false;
        }
        self.channels.push(TrackChannel::new(sv_id, step_if, offset));
        true
    }

    pub fn remove(&mut self, sv_id: u8) {
        self.channels.retain(|c| c.sv_id != sv_id);
    }

    pub fn tracked_sv_ids(&self) -> Vec<u8> {
        self.channels.iter().map(|c| c.sv_id).collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackChannel> {
        self.channels.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackChannel> {
        self.channels.iter()
    }

    /// Advance every tracked channel by one 32-sample word.
    pub fn update(&mut self, data: u32, events: &mut Vec<ChannelEvent>) {
        for channel in self.channels.iter_mut() {
            let code = self.codes.get(channel.sv_id);
            channel.update(data, code, events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_code_nco_covers_exactly_32_samples() {
        let table = GoldCodeTable::new();
        let code = table.get(1);
        for nco_code in [0u32, 1 << 21, (1 << 22) - 1, 500 << 22, (CODE_LEN as u32 - 1) << 22] {
            let result = fast_code_nco(code, nco_code, CODE_STEP_DEFAULT);
            assert_eq!(result.new_nco_code, nco_code.wrapping_add(CODE_STEP_DEFAULT * 32));
            if let Some(n0) = result.repeat_split {
                assert!(n0 <= 32);
            }
        }
    }

    #[test]
    fn split_word_reconstitutes_original() {
        let word = 0xA5A5_1234u32;
        for n0 in [0u32, 1, 16, 31, 32] {
            let (old, new) = split_word(word, n0);
            if n0 == 0 {
                assert_eq!(new, word);
            } else if n0 == 32 {
                assert_eq!(old, word);
            } else {
                assert_eq!(old, word >> (32 - n0));
                assert_eq!(new, word & ((1u32 << (32 - n0)) - 1));
            }
        }
    }

    #[test]
    fn pool_respects_max_channels() {
        let mut pool = ChannelPool::new(GoldCodeTable::new());
        for sv in 1..=MAX_CHANNELS as u8 {
            assert!(pool.add(sv, 0x4000_0000, 0));
        }
        assert!(!pool.add(MAX_CHANNELS as u8 + 1, 0x4000_0000, 0));
        assert_eq!(pool.tracked_sv_ids().len(), MAX_CHANNELS);
    }

    #[test]
    fn adding_existing_sv_replaces_rather_than_grows() {
        let mut pool = ChannelPool::new(GoldCodeTable::new());
        pool.add(5, 0x4000_0000, 0);
        pool.add(5, 0x4001_0000, 0);
        assert_eq!(pool.tracked_sv_ids(), vec![5]);
    }
}
