use clap::Parser;
use derby_common::state_store::MemoryStore;
use log::*;
#[cfg(debug_assertions)]
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::{
    append::rolling_file::{
        RollingFileAppender,
        policy::compound::{
            CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
        },
    },
    config::{Appender, Config as LogConfig, Logger, Root},
    encode::pattern::PatternEncoder,
};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

mod dispatch;
mod runner;
mod scoreboard;

mod config;
use config::Config;

const APP_NAME: &str = "scoreboard";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(long, short, action(clap::ArgAction::Count))]
    /// Increase the log verbosity
    verbose: u8,

    #[clap(long)]
    /// Length of a clock tick in milliseconds, overrides the config file
    tick_millis: Option<u32>,

    #[clap(long)]
    /// Don't write state changes to stdout
    no_push: bool,

    #[clap(long)]
    /// Restore values from a file of captured state pushes
    restore: Option<PathBuf>,

    #[clap(long)]
    /// Directory within which log files will be placed, default is platform dependent
    log_location: Option<PathBuf>,

    #[clap(long, default_value = "5000000")]
    /// Max size in bytes that a log file is allowed to reach before being rolled over
    log_max_file_size: u64,

    #[clap(long, default_value = "3")]
    /// Number of archived logs to keep
    num_old_logs: u32,
}

fn init_logging(args: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let log_base_path = match &args.log_location {
        Some(path) => path.clone(),
        None => {
            let mut path = directories::BaseDirs::new()
                .ok_or("Could not find a directory to store logs")?
                .data_local_dir()
                .to_path_buf();
            path.push("derby-scoreboard-logs");
            path
        }
    };
    let mut log_path = log_base_path.clone();
    let mut archived_log_path = log_base_path;
    log_path.push(format!("{APP_NAME}-log.txt"));
    archived_log_path.push(format!("{APP_NAME}-log-{{}}.txt.gz"));

    // stdout carries state pushes, so the console log always goes to stderr
    #[cfg(debug_assertions)]
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{d} {h({l:5})} {M}] {m}{n}")))
        .build();

    let roller = FixedWindowRoller::builder().build(
        archived_log_path
            .to_str()
            .ok_or("Log path is not valid unicode")?,
        args.num_old_logs,
    )?;
    let file_policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(args.log_max_file_size)),
        Box::new(roller),
    );
    let file_appender = RollingFileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new("[{d} {l:5} {M}] {m}{n}")))
        .build(&log_path, Box::new(file_policy))?;

    let root = Root::builder().appender("file_appender");
    #[cfg(debug_assertions)]
    let root = root.appender("console");
    let root = root.build(LevelFilter::Error);

    let log_config = LogConfig::builder()
        .appender(Appender::builder().build("file_appender", Box::new(file_appender)));

    #[cfg(debug_assertions)]
    let log_config = log_config.appender(Appender::builder().build("console", Box::new(console)));

    let log_config = log_config
        .logger(Logger::builder().build(APP_NAME, log_level))
        .build(root)?;

    log4rs::init_config(log_config)?;
    log_panics::init();

    info!("Logging to {}", log_path.display());
    Ok(())
}

fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    info!(
        "Reading config file from {:?}",
        confy::get_configuration_file_path(APP_NAME, None)?
    );

    let config = match confy::load(APP_NAME, None) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file, overwriting with default. Error: {e}");
            let config = Config::default();
            confy::store(APP_NAME, None, &config)?;
            config
        }
    };
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    init_logging(&args)?;

    let mut config = load_config()?;
    if let Some(tick_millis) = args.tick_millis {
        config.rules.tick_millis = tick_millis;
    }
    if args.no_push {
        config.output.push_changes = false;
    }

    let tick = config.rules.tick();
    let mut scoreboard = config.build_scoreboard(MemoryStore::new());
    let dispatcher = scoreboard::routes::dispatcher();
    if let Some(path) = &args.restore {
        info!("Restoring state from {}", path.display());
        let values = runner::saved_state(&std::fs::read_to_string(path)?)?;
        let errors = dispatcher.load_raw(&mut scoreboard, values);
        for e in &errors {
            debug!("Could not restore: {e}");
        }
        if !errors.is_empty() {
            warn!("{} saved values could not be restored", errors.len());
        }
    }
    info!("Starting scoreboard {}", scoreboard.status_string());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(runner::run(
        Arc::new(Mutex::new(scoreboard)),
        dispatcher,
        tick,
        config.output.push_changes,
        config.output.push_initial_state,
    ))?;

    info!("Scoreboard stopped");
    Ok(())
}
