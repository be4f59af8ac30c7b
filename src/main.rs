use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use structopt::StructOpt;

use gnss_rcv::config::ReceiverConfig;
use gnss_rcv::error::Result;
use gnss_rcv::receiver::Receiver;
use gnss_rcv::recording::SampleSource;

#[derive(StructOpt)]
#[structopt(name = "gnss-rcv", about = "software GPS L1 C/A baseband receiver")]
struct Options {
    /// Raw 1-bit sample file, 16.368 MS/s.
    file: PathBuf,

    #[structopt(long, default_value = "priority.txt")]
    priority_file: PathBuf,

    #[structopt(long, default_value = ".")]
    nav_cache_dir: PathBuf,

    #[structopt(short = "v", long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let opt = Options::from_args();

    let level = if opt.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = ReceiverConfig {
        sample_file: opt.file.clone(),
        priority_file: opt.priority_file,
        nav_cache_dir: opt.nav_cache_dir,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        log::warn!("received interrupt, shutting down");
        stop_handler.store(true, Ordering::Relaxed);
    })
    .expect("failed to install ctrlc handler");

    let mut source = SampleSource::open(config.sample_file.clone())?;
    let mut receiver = Receiver::new(config);

    let ts = Instant::now();
    let words = receiver.run(&mut source, &stop)?;
    log::info!("processed {words} words in {} ms", ts.elapsed().as_millis());

    Ok(())
}
