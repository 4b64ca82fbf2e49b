//! Captured credential records and the store the attack writes into.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{CrackError, Result};
use crate::ntlm_logic::{self, NtlmDigest};

/// Store handle shared between the collaborator and a running attack job.
pub type SharedStore = Arc<Mutex<HashRecordStore>>;

/// Index of a record inside its [`HashRecordStore`].
pub type RecordId = usize;

/// One row of a hash dump: `user:rid:lm:ntlm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRow {
    pub user: String,
    pub rid: String,
    pub lm_hash: String,
    pub ntlm_hash: String,
}

impl HashRow {
    pub fn new(
        user: impl Into<String>,
        rid: impl Into<String>,
        lm_hash: impl Into<String>,
        ntlm_hash: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            rid: rid.into(),
            lm_hash: lm_hash.into(),
            ntlm_hash: ntlm_hash.into(),
        }
    }

    /// Parses a `user:rid:lm:ntlm:::` dump line.
    ///
    /// Only the first four fields are read; anything after them is ignored.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut fields = line.trim_end_matches(&['\r', '\n'][..]).splitn(5, ':');
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(user), Some(rid), Some(lm), Some(ntlm)) => {
                Ok(Self::new(user, rid, lm, ntlm.trim()))
            }
            _ => Err(CrackError::MalformedRow(line.to_string())),
        }
    }

    /// Parses every line of a dump that has at least four fields and an NTLM
    /// hash in the fourth.
    ///
    /// Banner and status lines mixed into the dump are skipped.
    pub fn parse_dump(text: &str) -> Vec<Self> {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match Self::parse_line(line) {
                Ok(row) if ntlm_logic::is_ntlm_hex(&row.ntlm_hash) => Some(row),
                Ok(row) => {
                    debug!("skipping dump line for '{}': no NTLM hash", row.user);
                    None
                }
                Err(e) => {
                    debug!("skipping dump line: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub user: String,
    pub rid: String,
    /// Carried through untouched; LM hashes are never computed or attacked.
    pub lm_hash: String,
    /// Always 32 lowercase hex characters.
    pub ntlm_hash: String,
    pub cracked: Option<String>,
}

impl HashRecord {
    fn from_row(row: HashRow) -> Result<Self> {
        Ok(Self {
            ntlm_hash: ntlm_logic::normalize_hash(&row.ntlm_hash)?,
            user: row.user,
            rid: row.rid,
            lm_hash: row.lm_hash,
            cracked: None,
        })
    }

    pub fn is_cracked(&self) -> bool {
        self.cracked.is_some()
    }
}

/// An uncracked record handed to the attack controller.
///
/// Only valid for the load it was taken from; a later [`HashRecordStore::load`]
/// makes it stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: RecordId,
    pub user: String,
    pub digest: NtlmDigest,
    generation: u64,
}

impl Target {
    /// The store load this target was taken from.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct HashRecordStore {
    records: Vec<HashRecord>,
    generation: u64,
    busy: bool,
}

impl HashRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Replaces every record with freshly built ones, dropping all cracked
    /// state.
    ///
    /// Rejected with [`CrackError::StoreBusy`] while an attack job holds the
    /// store. The whole batch is validated before anything is replaced.
    pub fn load<I>(&mut self, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = HashRow>,
    {
        if self.busy {
            return Err(CrackError::StoreBusy);
        }
        let records = rows
            .into_iter()
            .map(HashRecord::from_row)
            .collect::<Result<Vec<_>>>()?;
        self.records = records;
        self.generation += 1;
        Ok(self.records.len())
    }

    /// Records without a plaintext yet, ready to be attacked.
    pub fn uncracked(&self) -> Vec<Target> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.is_cracked())
            .filter_map(|(id, record)| {
                let digest = ntlm_logic::decode_hash(&record.ntlm_hash).ok()?;
                Some(Target {
                    id,
                    user: record.user.clone(),
                    digest,
                    generation: self.generation,
                })
            })
            .collect()
    }

    /// Records the recovered plaintext for `id`. A record is cracked at most
    /// once.
    pub fn mark_cracked(&mut self, id: RecordId, plaintext: &str) -> Result<()> {
        let record = self
            .records
            .get_mut(id)
            .ok_or(CrackError::UnknownRecord(id))?;
        if record.cracked.is_some() {
            return Err(CrackError::AlreadyCracked(record.user.clone()));
        }
        record.cracked = Some(plaintext.to_string());
        Ok(())
    }

    /// Whether every target was taken from the current load.
    pub fn is_current(&self, targets: &[Target]) -> bool {
        targets.iter().all(|t| t.generation == self.generation)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: RecordId) -> Option<&HashRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> &[HashRecord] {
        &self.records
    }

    pub fn cracked_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_cracked()).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub(crate) fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntlm_logic::ntlm;

    fn rows() -> Vec<HashRow> {
        vec![
            HashRow::new(
                "Administrator",
                "500",
                "aad3b435b51404eeaad3b435b51404ee",
                "8846F7EAEE8FB117AD06BDD830B7586C",
            ),
            HashRow::new(
                "Guest",
                "501",
                "aad3b435b51404eeaad3b435b51404ee",
                ntlm(""),
            ),
        ]
    }

    #[test]
    fn parse_line_reads_first_four_fields() {
        let row = HashRow::parse_line(
            "alice:1001:aad3b435b51404eeaad3b435b51404ee:72f0eefcc213ea8f350773b831cf2c9c:::",
        )
        .unwrap();
        assert_eq!(row.user, "alice");
        assert_eq!(row.rid, "1001");
        assert_eq!(row.lm_hash, "aad3b435b51404eeaad3b435b51404ee");
        assert_eq!(row.ntlm_hash, "72f0eefcc213ea8f350773b831cf2c9c");

        assert!(matches!(
            HashRow::parse_line("Volatility Foundation Framework 2.6"),
            Err(CrackError::MalformedRow(_))
        ));
    }

    #[test]
    fn parse_dump_skips_non_hash_lines() {
        let dump = "Volatility Foundation Volatility Framework 2.6\n\
                    ERROR  : volatility.debug : a: b: c\n\
                    Administrator:500:aad3b435b51404eeaad3b435b51404ee:31d6cfe0d16ae931b73c59d7e0c089c0:::\n\
                    \n\
                    Guest:501:aad3b435b51404eeaad3b435b51404ee:31d6cfe0d16ae931b73c59d7e0c089c0:::\r\n";
        let rows = HashRow::parse_dump(dump);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].user, "Guest");
        assert_eq!(rows[1].ntlm_hash, "31d6cfe0d16ae931b73c59d7e0c089c0");
    }

    #[test]
    fn load_lowercases_and_validates() {
        let mut store = HashRecordStore::new();
        assert_eq!(store.load(rows()).unwrap(), 2);
        assert_eq!(store.records()[0].ntlm_hash, "8846f7eaee8fb117ad06bdd830b7586c");

        let bad = vec![HashRow::new("x", "1", "", "not-a-hash")];
        assert!(matches!(store.load(bad), Err(CrackError::InvalidHash(_))));
        // a failed load leaves the previous records in place
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_clears_cracked_state() {
        let mut store = HashRecordStore::new();
        store.load(rows()).unwrap();
        store.mark_cracked(0, "password").unwrap();
        assert_eq!(store.cracked_count(), 1);
        assert_eq!(store.uncracked().len(), 1);

        store.load(rows()).unwrap();
        assert_eq!(store.cracked_count(), 0);
        assert_eq!(store.uncracked().len(), 2);
    }

    #[test]
    fn mark_cracked_only_once() {
        let mut store = HashRecordStore::new();
        store.load(rows()).unwrap();
        store.mark_cracked(1, "").unwrap();
        assert!(matches!(
            store.mark_cracked(1, "other"),
            Err(CrackError::AlreadyCracked(user)) if user == "Guest"
        ));
        assert_eq!(store.get(1).unwrap().cracked.as_deref(), Some(""));
        assert!(matches!(
            store.mark_cracked(7, "x"),
            Err(CrackError::UnknownRecord(7))
        ));
    }

    #[test]
    fn load_rejected_while_busy() {
        let mut store = HashRecordStore::new();
        store.load(rows()).unwrap();
        store.set_busy(true);
        assert!(matches!(store.load(Vec::new()), Err(CrackError::StoreBusy)));
        store.set_busy(false);
        assert_eq!(store.load(Vec::new()).unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn uncracked_targets_carry_digest() {
        let mut store = HashRecordStore::new();
        store.load(rows()).unwrap();
        let targets = store.uncracked();
        assert_eq!(targets[0].id, 0);
        assert_eq!(targets[0].user, "Administrator");
        assert_eq!(targets[0].digest, crate::ntlm_logic::ntlm_bytes("password"));
    }

    #[test]
    fn reload_makes_targets_stale() {
        let mut store = HashRecordStore::new();
        store.load(rows()).unwrap();
        let before = store.uncracked();
        assert!(store.is_current(&before));

        store.load(rows()).unwrap();
        assert!(!store.is_current(&before));
        assert!(store.is_current(&store.uncracked()));
        assert!(store.is_current(&[]));

        // a rejected load keeps the current targets valid
        let current = store.uncracked();
        let bad = vec![HashRow::new("x", "1", "", "zz")];
        assert!(store.load(bad).is_err());
        assert!(store.is_current(&current));
    }
}
