//! Acquisition scheduler (C7): a per-SV priority table driving which
//! satellite the next free acquisition slot searches for, grounded on
//! `fast_fsgps/schedule.c`'s `schedule_finished`/`schedule_run`.

use std::path::Path;

use crate::acquisition::Acquisition;
use crate::channel::ChannelPool;
use crate::config::{
    BIT_ERROR_DECAY_THRESHOLD, BIT_ERROR_HEALTHY_THRESHOLD, MAX_SV_ID, PRIORITY_LAUNCH_PENALTY,
    SNIFF_LIMIT,
};
use crate::priority_store;

const TABLE_LEN: usize = MAX_SV_ID as usize + 1;

/// `priority[1..=32]`, per spec.md §3's `AcquisitionPriority`. Index 0 is
/// unused padding so SV ids can index the array directly.
pub struct Scheduler {
    priority: [i32; TABLE_LEN],
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { priority: [0; TABLE_LEN] }
    }

    /// Boosts every SV listed in `path` by `PRIORITY_FILE_BOOST` (spec.md
    /// §4.7). A missing file is not an error.
    pub fn load_priority_file(&mut self, path: &Path) {
        priority_store::load(path, &mut self.priority);
    }

    /// Persists the currently tracked SV set to `path` (spec.md §4.7).
    pub fn save_priority_file(&self, path: &Path, channels: &ChannelPool) -> std::io::Result<()> {
        priority_store::save(path, &channels.tracked_sv_ids())
    }

    /// Called when an acquisition sweep for `sv_id` completes, carrying the
    /// peak power observed (spec.md §4.7's `finished_callback`). Bumps
    /// `sv_id`'s priority by its search outcome, then decays every SV's
    /// priority based on tracking/bit-error state.
    pub fn on_finished(&mut self, sv_id: u8, power: u32, channels: &ChannelPool) {
        if let Some(slot) = self.priority.get_mut(sv_id as usize) {
            if power > SNIFF_LIMIT {
                *slot += 16;
            } else if power > SNIFF_LIMIT / 2 {
                *slot += 8;
            }
        }

        for sv in 1..=MAX_SV_ID {
            let entry = &mut self.priority[sv as usize];
            match channels.bit_errors(sv) {
                Some(errors) if errors < BIT_ERROR_HEALTHY_THRESHOLD => *entry = 0,
                Some(errors) if errors > BIT_ERROR_DECAY_THRESHOLD => *entry += 4,
                _ => *entry += 1,
            }
        }
    }

    /// Picks the highest-priority SV that is neither tracked nor currently
    /// being searched, launches its acquisition and applies the launch
    /// penalty. Returns the SV id started, if any.
    pub fn try_launch(&mut self, acq: &mut Acquisition, channels: &ChannelPool) -> Option<u8> {
        let candidate = (1..=MAX_SV_ID)
            .filter(|&sv| !channels.is_tracked(sv) && !acq.is_searching(sv))
            .max_by_key(|&sv| self.priority[sv as usize])?;

        if !acq.start(candidate) {
            return None;
        }
        let entry = &mut self.priority[candidate as usize];
        *entry = (*entry - PRIORITY_LAUNCH_PENALTY).max(0);
        Some(candidate)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gold_code::GoldCodeTable;

    #[test]
    fn launch_prefers_highest_priority_untracked_sv() {
        let mut sched = Scheduler::new();
        sched.priority[5] = 10;
        sched.priority[7] = 50;
        let mut acq = Acquisition::new(GoldCodeTable::new());
        let channels = ChannelPool::new(GoldCodeTable::new());

        let launched = sched.try_launch(&mut acq, &channels);
        assert_eq!(launched, Some(7));
        assert!(acq.is_searching(7));
        assert_eq!(sched.priority[7], 50 - PRIORITY_LAUNCH_PENALTY);
    }

    #[test]
    fn launch_skips_tracked_and_already_searching_svs() {
        let mut sched = Scheduler::new();
        sched.priority[1] = 100;
        sched.priority[2] = 90;
        let mut acq = Acquisition::new(GoldCodeTable::new());
        acq.start(1);
        let mut channels = ChannelPool::new(GoldCodeTable::new());
        channels.add(2, 0, 0);

        assert_eq!(sched.try_launch(&mut acq, &channels), Some(3));
    }

    #[test]
    fn finished_callback_bumps_and_decays() {
        let mut sched = Scheduler::new();
        let channels = ChannelPool::new(GoldCodeTable::new());
        sched.on_finished(9, SNIFF_LIMIT + 1, &channels);
        assert_eq!(sched.priority[9], 16 + 1); // bump, then decay's untracked +1
        for sv in 1..=MAX_SV_ID {
            if sv != 9 {
                assert_eq!(sched.priority[sv as usize], 1);
            }
        }
    }
}
