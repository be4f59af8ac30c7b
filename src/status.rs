//! Status presentation (C9, reduced per spec.md §1/§4.11): one structured
//! log line per tracked channel every `SHOW_STATUS_PERIOD_MS`, in place of
//! the teacher's `egui`/`plotters` GUI. Grounded on `fast_fsgps/status.c`'s
//! `show_status` cadence.

use colored::Colorize;

use crate::state::Snapshot;

/// Logs one line per tracked channel in `snapshot`.
pub fn show(snapshot: &Snapshot) {
    if snapshot.channels.is_empty() {
        log::info!("status: no channels tracked");
        return;
    }
    for ch in &snapshot.channels {
        log::info!(
            "{} week={:?} sfow={} ms={} code_phase={} early={} prompt={} late={} subframes={:05b} bit_errors={}",
            ch.sv.to_string().yellow(),
            ch.week_no,
            ch.subframe_of_week,
            ch.ms_of_frame,
            ch.code_nco_phase,
            ch.early_p,
            ch.prompt_p,
            ch.late_p,
            ch.valid_subframes_mask,
            ch.bit_errors,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_handles_empty_snapshot_without_panicking() {
        show(&Snapshot::default());
    }
}
