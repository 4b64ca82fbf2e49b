//! Lazy, read-once wordlist of candidate passwords.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{CrackError, Result};

/// A single candidate pulled from the wordlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    /// Invalid UTF-8 in the source line was replaced with U+FFFD.
    pub lossy: bool,
}

/// Streams candidates one line at a time.
///
/// Lines are decoded as UTF-8 with invalid sequences replaced, trimmed of
/// surrounding whitespace, and skipped when nothing is left. A wordlist can
/// only be read once; reopen the source to start over.
pub struct Wordlist {
    reader: Box<dyn BufRead + Send>,
    buffer: Vec<u8>,
}

impl Wordlist {
    /// Opens a wordlist file.
    ///
    /// Fails with [`CrackError::Configuration`] if the path cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CrackError::Configuration {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            buffer: Vec::with_capacity(64),
        }
    }

    /// Reads the next non-blank candidate, `Ok(None)` once the source is
    /// exhausted.
    pub fn next_candidate(&mut self) -> io::Result<Option<Candidate>> {
        loop {
            self.buffer.clear();
            if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
                return Ok(None);
            }

            let decoded = String::from_utf8_lossy(&self.buffer);
            let text = decoded.trim();
            if text.is_empty() {
                continue;
            }

            let lossy = matches!(decoded, std::borrow::Cow::Owned(_));
            if lossy {
                debug!("replaced invalid UTF-8 in wordlist line");
            }
            return Ok(Some(Candidate {
                text: text.to_string(),
                lossy,
            }));
        }
    }
}

impl Iterator for Wordlist {
    type Item = io::Result<Candidate>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_candidate().transpose()
    }
}

/// Best-effort count of the non-blank lines in a wordlist file, with the same
/// blank rule as [`Wordlist::next_candidate`].
///
/// Used only to turn progress into a percentage, so any I/O failure yields
/// `None` instead of an error.
pub fn count_candidates(path: impl AsRef<Path>) -> Option<u64> {
    let file = File::open(path.as_ref()).ok()?;
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut count = 0u64;
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return Some(count),
            Ok(_) => {
                if !String::from_utf8_lossy(&line).trim().is_empty() {
                    count += 1;
                }
            }
            Err(e) => {
                debug!("wordlist pre-scan failed: {}", e);
                return None;
            }
        }
    }
}
