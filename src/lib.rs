// chimewatch - listens for a recurring chime and raises alerts
// Library entry point: module tree, log re-exports and the CLI runner

// Enable coverage attribute on nightly for explicit exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod audio;
pub mod audio_constants;
mod cli;
pub mod config;
pub mod contacts;
pub mod events;
pub mod features;
pub mod library;
pub mod monitoring;
pub mod shutdown;

use clap::Parser;
use env_logger::Env;
use std::process::ExitCode;

// Re-export log macros for use throughout the crate
pub use log::{debug, error, info, trace, warn};

pub use audio::{AudioDecoder, CaptureBackend, CaptureSession, EncodedAudio, WavDecoder};
pub use config::DetectorConfig;
pub use events::{AlertDispatcher, DetectionEvent};
pub use features::{extract_features, similarity, FeatureVector};
pub use library::{ReferenceLibrary, ReferenceSound};
pub use monitoring::{DetectionController, MonitoringState, MonitoringStatus};

/// Command-line entry point.
/// Note: This function cannot be unit tested as it installs process-wide handlers.
#[cfg_attr(coverage_nightly, coverage(off))]
pub fn run() -> ExitCode {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let cli = cli::Cli::parse();
    let shutdown = shutdown::ShutdownSignal::install_ctrlc();

    match cli::execute(cli, &shutdown) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
