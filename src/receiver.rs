//! Top-level dispatcher (C8): pulls 32-sample words from the sample
//! source and drives acquisition, tracking and periodic status, in that
//! fixed order, exactly as `fsgps.c`'s main loop does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::acquisition::{AcqEvent, Acquisition};
use crate::channel::{ChannelEvent, ChannelPool};
use crate::config::{ReceiverConfig, SNIFF_LIMIT, STATUS_PERIOD_WORDS};
use crate::error::Result;
use crate::gold_code::GoldCodeTable;
use crate::nav_cache::NavCache;
use crate::recording::SampleSource;
use crate::scheduler::Scheduler;
use crate::state::Snapshot;
use crate::status;

/// Owns every pipeline component; the single value the dispatcher loop
/// mutates, replacing the original's module-scope globals (spec.md §9).
pub struct Receiver {
    config: ReceiverConfig,
    acquisition: Acquisition,
    channels: ChannelPool,
    scheduler: Scheduler,
    words_processed: u64,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.load_priority_file(&config.priority_file);

        Receiver {
            config,
            acquisition: Acquisition::new(GoldCodeTable::new()),
            channels: ChannelPool::new(GoldCodeTable::new()),
            scheduler,
            words_processed: 0,
        }
    }

    /// Runs the dispatcher until the sample source is exhausted or `stop`
    /// is set (by a `ctrlc` handler installed in `main`). Returns the
    /// number of words processed.
    pub fn run(&mut self, source: &mut SampleSource, stop: &Arc<AtomicBool>) -> Result<u64> {
        let mut acq_events = Vec::new();
        let mut chan_events = Vec::new();

        while !stop.load(Ordering::Relaxed) {
            let Some(word) = source.next_word() else { break };
            self.process_word(word, &mut acq_events, &mut chan_events);
        }

        self.scheduler.save_priority_file(&self.config.priority_file, &self.channels)?;
        Ok(self.words_processed)
    }

    /// One 32-sample word through the full pipeline (spec.md §4.8):
    /// acquisition strictly before tracking, then periodic status, then
    /// giving the scheduler a chance to launch a new acquisition.
    fn process_word(&mut self, word: u32, acq_events: &mut Vec<AcqEvent>, chan_events: &mut Vec<ChannelEvent>) {
        acq_events.clear();
        self.acquisition.update(word, acq_events);
        for event in acq_events.drain(..) {
            self.handle_acq_event(event);
        }

        chan_events.clear();
        self.channels.update(word, chan_events);
        for event in chan_events.drain(..) {
            self.handle_channel_event(event);
        }

        self.words_processed += 1;
        if self.words_processed % STATUS_PERIOD_WORDS == 0 {
            status::show(&Snapshot::capture(&self.channels));
        }

        self.scheduler.try_launch(&mut self.acquisition, &self.channels);
    }

    /// `power_cb`/`finished_cb` of spec.md §6: a power event above the
    /// sniff threshold requests channel registration; a finished event
    /// feeds the scheduler's priority update.
    fn handle_acq_event(&mut self, event: AcqEvent) {
        match event {
            AcqEvent::Power { sv_id, step_if, offset, power } if power > SNIFF_LIMIT => {
                if self.channels.add(sv_id, step_if, offset) {
                    log::warn!("{sv_id}: channel registered from acquisition (power={power})");
                    self.attach_nav_cache(sv_id);
                }
            }
            AcqEvent::Power { .. } => {}
            AcqEvent::Finished { sv_id, power } => {
                self.scheduler.on_finished(sv_id, power, &self.channels);
            }
        }
    }

    fn attach_nav_cache(&mut self, sv_id: u8) {
        match NavCache::open(&self.config.nav_cache_path(sv_id)) {
            Ok(cache) => {
                if let Some(channel) = self.channels.iter_mut().find(|c| c.sv_id == sv_id) {
                    channel.nav.attach_cache(cache);
                }
            }
            Err(e) => log::warn!("{sv_id}: failed to open NAV cache: {e}"),
        }
    }

    /// `phase_callback`'s downstream effect reaching the dispatcher: a
    /// freshly committed subframe, logged at `warn` per spec.md §4.9.
    fn handle_channel_event(&mut self, event: ChannelEvent) {
        let ChannelEvent::SubframeReady { sv_id } = event;
        log::warn!("{sv_id}: NAV subframe committed");
    }
}
