//! NTLM password hashing and a cancellable dictionary attack against
//! captured `user:rid:lm:ntlm` hash dumps.

pub mod attack;
pub mod config;
pub mod error;
pub mod md4;
pub mod ntlm_logic;
pub mod records;
pub mod wordlist;

pub use attack::{
    AttackController, AttackEvent, AttackSummary, CancelToken, JobHandle, TerminalState,
};
pub use config::AttackConfig;
pub use error::{CrackError, Result};
pub use ntlm_logic::ntlm;
pub use records::{HashRecord, HashRecordStore, HashRow, RecordId, SharedStore, Target};
pub use wordlist::Wordlist;
