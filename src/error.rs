use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrackError>;

/// Errors surfaced by the record store and the attack controller.
///
/// Undecodable wordlist bytes are deliberately absent: they are replaced
/// during decoding and the line is still tested.
#[derive(Error, Debug)]
pub enum CrackError {
    /// The wordlist could not be opened; the job never left Idle.
    #[error("Unable to open wordlist '{}': {source}", .path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid attack configuration: {0}")]
    InvalidConfig(&'static str),

    /// A second job was requested while one is still running.
    #[error("An attack job is already running on this controller")]
    JobConflict,

    #[error("The hash record store is in use by a running attack job")]
    StoreBusy,

    /// Targets were taken before the store was last reloaded.
    #[error("Attack targets are stale: the hash record store was reloaded")]
    StaleTargets,

    #[error("Record for user '{0}' is already cracked")]
    AlreadyCracked(String),

    #[error("No record with id {0}")]
    UnknownRecord(usize),

    #[error("Invalid NTLM hash '{0}': expected 32 hexadecimal characters")]
    InvalidHash(String),

    #[error("Malformed hash row: '{0}'")]
    MalformedRow(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("The attack worker thread panicked")]
    WorkerPanicked,
}
