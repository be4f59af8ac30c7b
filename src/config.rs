//! Fixed design constants and CLI-controlled knobs for the receiver.
//!
//! Centralises the tunables the original C implementation scattered as
//! module-scope `#define`s across `acquire.c`, `channel.c`, `nav.c` and
//! `schedule.c`, following the way the teacher crate's `constants.rs`
//! gathers its own magic numbers in one place.

use std::path::PathBuf;

/// Samples per millisecond at the fixed 16.368 MS/s sample rate.
pub const SAMPLES_PER_MS: u32 = 16368;
pub const SAMPLE_RATE_HZ: f64 = 16_368_000.0;
/// Samples delivered per 32-bit word.
pub const WORD_SAMPLES: u32 = 32;

/// Number of Doppler bins searched in parallel during acquisition.
/// Odd and centred on zero Doppler, matching `acquire.c`'s `N_BANDS`.
pub const N_BANDS: usize = 31;
pub const BAND_CENTRE: usize = N_BANDS / 2;
/// Raw NCO-step spacing between adjacent bands (`if_band` in `acquire.c`).
pub const BAND_STEP: i64 = 525 * 5000 / (N_BANDS as i64 / 2);

/// Number of acquisition slots that may run concurrently.
pub const N_PARALLEL: usize = 2;

/// Maximum number of simultaneously tracked channels.
pub const MAX_CHANNELS: usize = 16;

/// Highest valid GPS space-vehicle id.
pub const MAX_SV_ID: u8 = 32;

/// Power threshold above which acquisition requests channel registration
/// (`SNIFF_LIMIT`, named in spec.md's acquisition/scheduler sections).
pub const SNIFF_LIMIT: u32 = 70_000;

/// Complete-sweep count for one acquisition attempt: one full code period
/// worth of 2-chip steps (1023 code phases).
pub const ACQUISITION_TRIES: u32 = 1023;

/// Nominal zero-Doppler carrier NCO step: quarter-turn per sample, i.e.
/// IF == sample_rate / 4.
pub const CARRIER_STEP_CENTRE: u32 = 0x4000_0000;

/// Code NCO step for an un-Doppler-corrected C/A code (one chip every
/// ~16 samples), matching `channel.c`'s `step_code = 0x00040000`.
pub const CODE_STEP_DEFAULT: u32 = 0x0004_0000;

/// IIR filter factors from `channel.c`.
pub const LATE_EARLY_IIR_FACTOR: u32 = 8;
pub const LOCK_DELTA_IIR_FACTOR: i32 = 8;
pub const LOCK_ANGLE_IIR_FACTOR: i32 = 8;

/// Fixed code NCO nudge applied by the DLL on an early/late imbalance
/// (`channel.c`'s `adjust += 16368*1`).
pub const CODE_TUNE_STEP: i32 = 16368;

/// Size of the atan2 lookup table (`ATAN2_SIZE` in `channel.c`).
pub const ATAN2_SIZE: usize = 128;

/// Bit-error threshold above which the scheduler aggressively decays a
/// tracked SV's priority (`finished_callback`'s `> 500` branch).
pub const BIT_ERROR_DECAY_THRESHOLD: i32 = 500;
/// Bit-error threshold below which a tracked SV is considered healthy and
/// its priority reset to zero.
pub const BIT_ERROR_HEALTHY_THRESHOLD: i32 = 10;

/// Priority bump applied to every SV listed in `priority.txt` at startup.
pub const PRIORITY_FILE_BOOST: i32 = 32;
/// Priority penalty applied to an SV the moment its acquisition is launched.
pub const PRIORITY_LAUNCH_PENALTY: i32 = 32;

/// How often, in milliseconds of processed samples, a status snapshot is
/// logged (`SHOW_STATUS_PERIOD_MS`, generalising `main.c`'s `% ((16368000/32)/100)`
/// cadence check). Computed from the sample rate directly rather than via
/// `SAMPLES_PER_MS / WORD_SAMPLES` (511, truncated) to preserve the
/// original's exact period of 5115 words.
pub const SHOW_STATUS_PERIOD_MS: u32 = 10;
pub const STATUS_PERIOD_WORDS: u64 =
    (SAMPLES_PER_MS as u64 * 1000 / WORD_SAMPLES as u64) * SHOW_STATUS_PERIOD_MS as u64 / 1000;

/// Runtime configuration derived from the CLI, as opposed to the fixed
/// design constants above.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub sample_file: PathBuf,
    pub priority_file: PathBuf,
    pub nav_cache_dir: PathBuf,
}

impl ReceiverConfig {
    pub fn nav_cache_path(&self, sv_id: u8) -> PathBuf {
        self.nav_cache_dir.join(format!("NAV_{sv_id:02}.dat"))
    }
}
