//! Parallel-frequency-bin, sequential-code-phase acquisition search (C4).
//!
//! Grounded on `fast_fsgps/acquire.c`: up to [`crate::config::N_PARALLEL`]
//! space vehicles are searched concurrently, each across
//! [`crate::config::N_BANDS`] Doppler bins simultaneously (via the
//! bit-parallel [`crate::nco`] evaluator) and 1023 code phases in sequence
//! (stepping the code-phase index by two chips per call, matching the
//! original's 2x-oversampled search). Results are reported as
//! [`AcqEvent`] values collected into a caller-supplied `Vec` rather than
//! through trait-object callbacks, so that a single `update()` call can
//! mutate acquisition state and still hand events back to the dispatcher
//! (spec §9: "dispatched by tagged enums, not pointers").

use crate::config::{ACQUISITION_TRIES, BAND_CENTRE, BAND_STEP, CARRIER_STEP_CENTRE, N_BANDS, N_PARALLEL};
use crate::gold_code::GoldCodeTable;
use crate::nco;
use crate::popcount::popcount;

/// DC bias of the per-band correlator sum over one full code period:
/// `ACQUISITION_TRIES` words, each contributing a popcount whose
/// expectation is 16 (half of 32) under no correlation. Subtracted before
/// squaring so `power` reflects correlation energy, not offset.
const DC_BIAS: i64 = 16368;

/// A single acquisition search in flight for one space vehicle, sweeping
/// all Doppler bins in parallel at each code phase.
struct Slot {
    sv_id: u8,
    carrier_phase: [u32; N_BANDS],
    carrier_step: [u32; N_BANDS],
    code_phase: usize,
    /// Per-band correlator sums, integrated across every word of the
    /// in-flight code period (`acquire.c`'s `ones_s`/`ones_c`).
    ones_s: [i64; N_BANDS],
    ones_c: [i64; N_BANDS],
    tries: u32,
    max_power: [u32; N_BANDS],
    max_step: [u32; N_BANDS],
}

impl Slot {
    fn new(sv_id: u8) -> Self {
        let mut carrier_step = [0u32; N_BANDS];
        for (i, step) in carrier_step.iter_mut().enumerate() {
            let offset = i as i64 - BAND_CENTRE as i64;
            *step = (CARRIER_STEP_CENTRE as i64 + offset * BAND_STEP) as u32;
        }
        Slot {
            sv_id,
            carrier_phase: [0u32; N_BANDS],
            carrier_step,
            code_phase: 0,
            ones_s: [0i64; N_BANDS],
            ones_c: [0i64; N_BANDS],
            tries: 0,
            max_power: [0u32; N_BANDS],
            max_step: carrier_step,
        }
    }
}

/// Output of a single [`Acquisition::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcqEvent {
    /// A new interior-band correlation-power maximum was found for `sv_id`;
    /// `step_if` is that band's carrier NCO step. `offset` always reports
    /// zero (the original never feeds its own decaying `max_offset` into
    /// the callback) and `power` is the raw power divided by four.
    Power { sv_id: u8, step_if: u32, offset: u32, power: u32 },
    /// The 1023-code-phase sweep for `sv_id` has completed; `power` is the
    /// raw, un-divided peak power observed across all bands and phases.
    Finished { sv_id: u8, power: u32 },
}

/// Parallel acquisition search over up to [`N_PARALLEL`] space vehicles.
pub struct Acquisition {
    codes: GoldCodeTable,
    slots: [Option<Slot>; N_PARALLEL],
}

impl Acquisition {
    pub fn new(codes: GoldCodeTable) -> Self {
        Acquisition { codes, slots: Default::default() }
    }

    /// Begin searching for `sv_id`, if a slot is free and it isn't already
    /// being searched. Returns `false` if no slot was available.
    pub fn start(&mut self, sv_id: u8) -> bool {
        if self.slots.iter().flatten().any(|s| s.sv_id == sv_id) {
            return false;
        }
        for slot in self.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(Slot::new(sv_id));
                return true;
            }
        }
        false
    }

    pub fn is_searching(&self, sv_id: u8) -> bool {
        self.slots.iter().flatten().any(|s| s.sv_id == sv_id)
    }

    /// Advance every active slot by one 32-sample word, appending any
    /// resulting [`AcqEvent`]s to `events`. Correlator sums accumulate
    /// every word; only once a full code period (`ACQUISITION_TRIES`
    /// words) has been integrated are they turned into a power and reset,
    /// exactly as `acquire.c`'s `ones_s`/`ones_c` bookkeeping does.
    pub fn update(&mut self, data: u32, events: &mut Vec<AcqEvent>) {
        for slot_idx in 0..N_PARALLEL {
            let Some(slot) = self.slots[slot_idx].as_mut() else { continue };
            let code = self.codes.get(slot.sv_id);
            let code_word = code.packed[(slot.code_phase * 16) % code.packed.len()];

            let mut finished_power: Option<u32> = None;

            for band in 0..N_BANDS {
                let (sine, cosine) = nco::nco(slot.carrier_phase[band], slot.carrier_step[band]);
                slot.carrier_phase[band] =
                    slot.carrier_phase[band].wrapping_add(slot.carrier_step[band].wrapping_mul(32));

                slot.ones_s[band] += popcount(data ^ sine ^ code_word) as i64;
                slot.ones_c[band] += popcount(data ^ cosine ^ code_word) as i64;
            }

            slot.code_phase += 2;
            if slot.code_phase >= 1023 {
                slot.code_phase -= 1023;
            }

            slot.tries += 1;
            if slot.tries >= ACQUISITION_TRIES {
                for band in 0..N_BANDS {
                    let ones_s = slot.ones_s[band] - DC_BIAS;
                    let ones_c = slot.ones_c[band] - DC_BIAS;
                    let power = (ones_s * ones_s + ones_c * ones_c) as u32;

                    if power > slot.max_power[band] {
                        slot.max_power[band] = power;
                        slot.max_step[band] = slot.carrier_step[band];
                        if band != 0 && band != N_BANDS - 1 {
                            events.push(AcqEvent::Power {
                                sv_id: slot.sv_id,
                                step_if: slot.carrier_step[band],
                                offset: 0,
                                power: power / 4,
                            });
                        }
                    }

                    slot.ones_s[band] = 0;
                    slot.ones_c[band] = 0;
                }

                finished_power = Some(slot.max_power.iter().copied().max().unwrap_or(0));
            }

            if let Some(power) = finished_power {
                let sv_id = slot.sv_id;
                events.push(AcqEvent::Finished { sv_id, power });
                self.slots[slot_idx] = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_starts_and_frees_on_completion() {
        let mut acq = Acquisition::new(GoldCodeTable::new());
        assert!(acq.start(3));
        assert!(!acq.start(3));
        assert!(acq.is_searching(3));

        let mut events = Vec::new();
        for _ in 0..ACQUISITION_TRIES {
            acq.update(0, &mut events);
        }
        assert!(!acq.is_searching(3));
        assert!(events.iter().any(|e| matches!(e, AcqEvent::Finished { sv_id: 3, .. })));
    }

    #[test]
    fn only_interior_bands_emit_power_events() {
        let mut acq = Acquisition::new(GoldCodeTable::new());
        acq.start(1);
        let mut events = Vec::new();
        for _ in 0..ACQUISITION_TRIES {
            acq.update(0xDEAD_BEEF, &mut events);
        }
        for e in &events {
            if let AcqEvent::Power { step_if, .. } = e {
                assert_ne!(*step_if, Slot::new(1).carrier_step[0]);
                assert_ne!(*step_if, Slot::new(1).carrier_step[N_BANDS - 1]);
            }
        }
    }

    #[test]
    fn respects_parallel_slot_limit() {
        let mut acq = Acquisition::new(GoldCodeTable::new());
        for sv in 1..=N_PARALLEL as u8 {
            assert!(acq.start(sv));
        }
        assert!(!acq.start(N_PARALLEL as u8 + 1));
    }
}
