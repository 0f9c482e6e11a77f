// Command-line host: manage reference sounds and monitor recordings
// Wires the library, file capture backend and contact alerts into a DetectionController

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{EncodedAudio, WavDecoder, WavFileBackend};
use crate::config::{default_config_path, ConfigError, DetectorConfig};
use crate::contacts::{
    ContactAlertDispatcher, ContactError, ContactList, JsonContactStore, LogContactNotifier,
};
use crate::events::{AlertDispatcher, FanoutDispatcher, LogAlertDispatcher};
use crate::library::{JsonReferenceStore, LibraryError, ReferenceLibrary, ReferenceSound};
use crate::monitoring::{ControllerError, DetectionController, MonitoringStatus};
use crate::shutdown::ShutdownSignal;

/// How often `monitor` checks for Ctrl-C while the session runs
const SHUTDOWN_POLL_MS: u64 = 100;

/// Listen for a recurring chime and raise alerts
#[derive(Parser, Debug)]
#[command(name = "chimewatch", author, version, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a reference sound from a WAV recording
    Register(RegisterCommand),

    /// List registered reference sounds
    List,

    /// Remove a reference sound by id
    Remove(RemoveCommand),

    /// Monitor a WAV recording for registered sounds
    Monitor(MonitorCommand),

    /// Manage the addresses alerts are sent to
    Contacts {
        #[command(subcommand)]
        action: ContactsAction,
    },
}

/// Contact list actions
#[derive(Subcommand, Debug)]
pub enum ContactsAction {
    /// Add an alert contact
    Add {
        /// Email address
        address: String,
    },

    /// Remove an alert contact
    Remove {
        /// Email address
        address: String,
    },

    /// List alert contacts
    List,
}

#[derive(Parser, Debug)]
pub struct RegisterCommand {
    /// WAV recording of the sound
    pub file: PathBuf,

    /// Display name (defaults to "Reference N")
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RemoveCommand {
    /// Id shown by `list`
    pub id: u64,
}

#[derive(Parser, Debug)]
pub struct MonitorCommand {
    /// WAV recording to scan
    pub file: PathBuf,

    /// Detection threshold (0.0 to 1.0), overrides the config
    #[arg(short, long)]
    pub sensitivity: Option<f64>,

    /// Window length in milliseconds, overrides the config
    #[arg(short, long)]
    pub window_ms: Option<u64>,

    /// Pace windows in real time instead of as fast as possible
    #[arg(long)]
    pub realtime: bool,
}

/// Errors surfaced to the command line
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Contacts(#[from] ContactError),
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Run a parsed command
pub fn execute(cli: Cli, shutdown: &ShutdownSignal) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = DetectorConfig::load(&config_path)?;

    match cli.command {
        Commands::Contacts { action } => manage_contacts(&open_contacts(&config)?, &action),
        command => library_command(command, config, shutdown),
    }
}

/// Run a command that works on the reference library
fn library_command(
    command: Commands,
    config: DetectorConfig,
    shutdown: &ShutdownSignal,
) -> Result<(), CliError> {
    let library = open_library(&config)?;

    match command {
        Commands::Register(cmd) => {
            let reference = register(&library, &cmd)?;
            println!("Registered {}", describe(&reference));
        }
        Commands::List => {
            if library.is_empty() {
                println!("No reference sounds registered");
            }
            for reference in library.scan_ordered() {
                println!("{}", describe(&reference));
            }
        }
        Commands::Remove(cmd) => {
            if library.remove(cmd.id)? {
                println!("Removed reference {}", cmd.id);
            } else {
                println!("No reference with id {}", cmd.id);
            }
        }
        Commands::Monitor(cmd) => {
            let contacts = Arc::new(open_contacts(&config)?);
            let dispatcher: Arc<dyn AlertDispatcher> = Arc::new(
                FanoutDispatcher::new()
                    .with(Arc::new(LogAlertDispatcher))
                    .with(Arc::new(ContactAlertDispatcher::new(
                        contacts,
                        Arc::new(LogContactNotifier),
                    ))),
            );
            let status = monitor(Arc::new(library), config, &cmd, dispatcher, shutdown)?;
            println!(
                "Evaluated {} windows, {} detections",
                status.windows_evaluated, status.detections
            );
        }
        Commands::Contacts { action } => manage_contacts(&open_contacts(&config)?, &action)?,
    }

    Ok(())
}

/// Open the JSON-backed contact list named by `config`
pub fn open_contacts(config: &DetectorConfig) -> Result<ContactList, ContactError> {
    let path = config.contacts_path();
    crate::debug!("[cli] Using contact list at {:?}", path);
    ContactList::open(Box::new(JsonContactStore::new(path)))
}

/// Apply a `contacts` action and print the result
pub fn manage_contacts(contacts: &ContactList, action: &ContactsAction) -> Result<(), CliError> {
    match action {
        ContactsAction::Add { address } => {
            let added = contacts.add(address)?;
            println!("Added contact {}", added);
        }
        ContactsAction::Remove { address } => {
            if contacts.remove(address)? {
                println!("Removed contact {}", address.trim());
            } else {
                println!("No contact {}", address.trim());
            }
        }
        ContactsAction::List => {
            if contacts.is_empty() {
                println!("No contacts configured");
            }
            for address in contacts.list() {
                println!("{}", address);
            }
        }
    }
    Ok(())
}

/// Open the JSON-backed library named by `config`
pub fn open_library(config: &DetectorConfig) -> Result<ReferenceLibrary, LibraryError> {
    let path = config.library_path();
    crate::debug!("[cli] Using reference library at {:?}", path);
    ReferenceLibrary::open(Box::new(JsonReferenceStore::new(path)))
}

/// Register the recording named by `cmd`
pub fn register(
    library: &ReferenceLibrary,
    cmd: &RegisterCommand,
) -> Result<ReferenceSound, CliError> {
    let bytes = fs::read(&cmd.file).map_err(|source| CliError::Read {
        path: cmd.file.clone(),
        source,
    })?;
    let reference =
        library.register_capture(cmd.name.clone(), &EncodedAudio::new(bytes), &WavDecoder)?;
    Ok(reference)
}

/// Monitor a recording until it is exhausted or shutdown is requested
pub fn monitor(
    library: Arc<ReferenceLibrary>,
    mut config: DetectorConfig,
    cmd: &MonitorCommand,
    dispatcher: Arc<dyn AlertDispatcher>,
    shutdown: &ShutdownSignal,
) -> Result<MonitoringStatus, CliError> {
    if let Some(window_ms) = cmd.window_ms {
        config.window_duration_ms = window_ms;
    }
    config.validate()?;

    let backend = WavFileBackend::new(&cmd.file).realtime(cmd.realtime);
    let controller = DetectionController::new(
        library,
        Arc::new(backend),
        Arc::new(WavDecoder),
        dispatcher,
        config,
    );
    if let Some(sensitivity) = cmd.sensitivity {
        controller.set_sensitivity(sensitivity);
    }

    controller.start()?;

    while !controller.wait_until_idle(Duration::from_millis(SHUTDOWN_POLL_MS)) {
        if shutdown.is_requested() {
            controller.stop();
            break;
        }
    }

    let status = controller.status();
    if let Some(reason) = &status.last_interruption {
        crate::info!("[cli] Monitoring ended: {}", reason);
    }
    Ok(status)
}

fn describe(reference: &ReferenceSound) -> String {
    let features = reference.features();
    format!(
        "#{} '{}' (energy={:.3}, zcr={:.3}, peak={:.3}, {:.2}s) added {}",
        reference.id(),
        reference.name(),
        features.energy,
        features.zcr,
        features.peak,
        features.duration,
        reference.created_at().format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
