//! Snapshot: a timestamped view of every tracked channel's state, for
//! status presentation and the position solver (spec.md §3/§6).

use crate::channel::ChannelPool;

/// One tracked channel's state at the instant the snapshot was taken.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSnapshot {
    pub sv: u8,
    pub week_no: Option<u32>,
    pub subframe_of_week: u32,
    pub ms_of_frame: u8,
    pub code_nco_phase: u32,
    pub early_p: i64,
    pub prompt_p: i64,
    pub late_p: i64,
    pub valid_subframes_mask: u8,
    pub bit_errors: i32,
}

/// All tracked channels' state at one instant.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub channels: Vec<ChannelSnapshot>,
}

impl Snapshot {
    /// Builds a snapshot from the current state of every tracked channel.
    pub fn capture(channels: &ChannelPool) -> Self {
        let channels = channels
            .iter()
            .map(|c| ChannelSnapshot {
                sv: c.sv_id,
                week_no: c.nav.week_no(),
                subframe_of_week: c.nav.subframe_of_week(),
                ms_of_frame: c.nav.ms_of_frame(),
                code_nco_phase: c.code_nco_phase(),
                early_p: c.early_power(),
                prompt_p: c.prompt_power(),
                late_p: c.late_power(),
                valid_subframes_mask: c.nav.valid_subframes_mask(),
                bit_errors: c.bit_errors,
            })
            .collect();
        Snapshot { channels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gold_code::GoldCodeTable;

    #[test]
    fn capture_reflects_tracked_channel_count() {
        let mut pool = ChannelPool::new(GoldCodeTable::new());
        pool.add(3, 0, 0);
        pool.add(9, 0, 0);
        let snapshot = Snapshot::capture(&pool);
        assert_eq!(snapshot.channels.len(), 2);
        assert!(snapshot.channels.iter().any(|c| c.sv == 3));
        assert!(snapshot.channels.iter().any(|c| c.sv == 9));
    }

    #[test]
    fn fresh_channel_has_no_week_and_zero_bit_errors() {
        let mut pool = ChannelPool::new(GoldCodeTable::new());
        pool.add(1, 0, 0);
        let snapshot = Snapshot::capture(&pool);
        let ch = &snapshot.channels[0];
        assert_eq!(ch.week_no, None);
        assert_eq!(ch.bit_errors, 0);
    }
}
