//! Append-only journal backing the record engine
//!
//! Every upsert is appended to `prefs.journal` before the RAM table changes.
//! On open the journal is replayed in order (last write per key wins).
//!
//! Recovery rules:
//! - a bad checksum or missing magic skips to the next `PREF` marker
//! - an entry whose length runs past the end of the file is the crash point
//!   only if no intact entry follows it; replay then stops there and the
//!   writer truncates the tail before appending. Otherwise the length field
//!   itself is damaged and replay resyncs like any other corrupt entry

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::durability::{durable_sync, sync_dir};
use crate::error::{StoreError, StoreResult};
use crate::format::{deserialize_entry, serialize_entry, JournalEntry, MAGIC_ARRAY};

/// Journal file name inside the store directory
pub const JOURNAL_FILE: &str = "prefs.journal";

/// Scratch file used while compacting
const COMPACT_FILE: &str = "prefs.journal.compact";

/// Result of replaying a journal file
#[derive(Debug, Default)]
pub struct Replay {
    /// Entries in write order
    pub entries: Vec<JournalEntry>,
    /// Byte offset just past the last intact entry
    pub end: u64,
    /// Entries skipped because of corruption
    pub skipped: usize,
}

/// Replay the journal at `path`. A missing file is an empty journal.
pub fn replay(path: &Path) -> StoreResult<Replay> {
    let buffer = match fs::read(path) {
        Ok(buffer) => buffer,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Replay::default()),
        Err(e) => return Err(StoreError::io(path, e, "failed to read journal")),
    };

    let mut replay = Replay::default();
    let mut offset = 0usize;

    while offset < buffer.len() {
        match deserialize_entry(&buffer[offset..], path, offset as u64) {
            Ok(entry) => {
                offset += entry.encoded_len();
                replay.end = offset as u64;
                replay.entries.push(entry);
            }
            Err(StoreError::TornWrite { .. }) => match next_intact_entry(&buffer, path, offset + 1) {
                // A damaged length field, not a crash: later entries are intact
                Some(next) => {
                    replay.skipped += 1;
                    warn!(offset, next, "journal entry overruns later intact entries, resyncing");
                    offset = next;
                }
                None => {
                    warn!(offset, remaining = buffer.len() - offset, "torn journal tail, stopping replay");
                    break;
                }
            },
            Err(e) => {
                replay.skipped += 1;
                warn!(offset, error = %e, "corrupt journal entry, resyncing");
                match find_next_magic(&buffer, offset + 1) {
                    Some(next) => offset = next,
                    None => break,
                }
            }
        }
    }

    Ok(replay)
}

/// Offset of the first entry at or after `start` that decodes cleanly.
fn next_intact_entry(buffer: &[u8], path: &Path, start: usize) -> Option<usize> {
    let mut from = start;
    while let Some(candidate) = find_next_magic(buffer, from) {
        if deserialize_entry(&buffer[candidate..], path, candidate as u64).is_ok() {
            return Some(candidate);
        }
        from = candidate + 1;
    }
    None
}

/// Scan forward for the next entry marker.
fn find_next_magic(buffer: &[u8], start: usize) -> Option<usize> {
    buffer
        .get(start..)?
        .windows(MAGIC_ARRAY.len())
        .position(|window| window == MAGIC_ARRAY)
        .map(|pos| start + pos)
}

fn open_append(path: &Path) -> StoreResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e, "failed to open journal"))
}

/// Appends entries to the journal file.
///
/// Callers must finish `append` before publishing the write anywhere else.
pub struct JournalWriter {
    file: File,
    path: PathBuf,
    dir: PathBuf,
    /// Current file size in bytes (tracked to avoid stat calls)
    size: u64,
    /// Entries currently in the file
    entries: usize,
    durable: bool,
}

impl JournalWriter {
    /// Open the journal in `dir` for appending.
    ///
    /// `replay` is the result of replaying the same file; anything past its
    /// `end` is a torn tail and is cut off.
    pub fn open<P: AsRef<Path>>(dir: P, replay: &Replay, durable: bool) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e, "failed to create store directory"))?;
        let path = dir.join(JOURNAL_FILE);

        let file = open_append(&path)?;
        let size = file
            .metadata()
            .map_err(|e| StoreError::io(&path, e, "failed to stat journal"))?
            .len();

        if size > replay.end {
            warn!(path = %path.display(), from = size, to = replay.end, "truncating journal tail");
            file.set_len(replay.end)
                .map_err(|e| StoreError::io(&path, e, "failed to truncate journal"))?;
        }

        Ok(Self {
            file,
            path,
            dir,
            size: replay.end,
            entries: replay.entries.len(),
            durable,
        })
    }

    /// Append one entry. Syncs to persistent media when the writer is durable.
    ///
    /// If this returns an error the entry must be treated as not written.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let bytes = serialize_entry(key, value)?;

        self.file
            .write_all(&bytes)
            .map_err(|e| StoreError::io(&self.path, e, "journal write failed"))?;
        if self.durable {
            durable_sync(&self.file).map_err(|e| StoreError::io(&self.path, e, "journal sync failed"))?;
        }

        self.size += bytes.len() as u64;
        self.entries += 1;
        Ok(())
    }

    /// Replace the journal with exactly `live` entries.
    ///
    /// Written to a scratch file, synced, then renamed over the journal, so a
    /// crash at any point leaves either the old or the new journal intact.
    pub fn rewrite<'a, I>(&mut self, live: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let scratch = self.dir.join(COMPACT_FILE);
        let mut size = 0u64;
        let mut entries = 0usize;
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&scratch)
                .map_err(|e| StoreError::io(&scratch, e, "failed to create compaction file"))?;
            for (key, value) in live {
                let bytes = serialize_entry(key, value)?;
                file.write_all(&bytes)
                    .map_err(|e| StoreError::io(&scratch, e, "failed to write compacted entry"))?;
                size += bytes.len() as u64;
                entries += 1;
            }
            durable_sync(&file).map_err(|e| StoreError::io(&scratch, e, "failed to sync compaction file"))?;
        }

        fs::rename(&scratch, &self.path)
            .map_err(|e| StoreError::io(&self.path, e, "failed to replace journal"))?;
        sync_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e, "failed to sync store directory"))?;

        let before = self.entries;
        self.file = open_append(&self.path)?;
        self.size = size;
        self.entries = entries;
        debug!(before, after = entries, bytes = size, "journal compacted");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current journal size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Entries in the journal, live or superseded
    pub fn entries(&self) -> usize {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer(dir: &Path) -> JournalWriter {
        let replay = replay(&dir.join(JOURNAL_FILE)).unwrap();
        JournalWriter::open(dir, &replay, false).unwrap()
    }

    #[test]
    fn test_journal_write_replay() {
        let temp = TempDir::new().unwrap();

        let mut journal = writer(temp.path());
        journal.append(b"\x01jwt_secret", b"abc").unwrap();
        journal.append(b"\x01jwt_expires_in", b"7d").unwrap();
        journal.append(b"\x01jwt_expires_in", b"14d").unwrap();
        assert_eq!(journal.entries(), 3);
        drop(journal);

        let replayed = replay(&temp.path().join(JOURNAL_FILE)).unwrap();
        assert_eq!(replayed.entries.len(), 3);
        assert_eq!(replayed.skipped, 0);
        assert_eq!(replayed.entries[2].value, b"14d");
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let temp = TempDir::new().unwrap();
        let replayed = replay(&temp.path().join(JOURNAL_FILE)).unwrap();
        assert!(replayed.entries.is_empty());
        assert_eq!(replayed.end, 0);
    }

    #[test]
    fn test_corruption_recovery_skips_bad_entry() {
        let temp = TempDir::new().unwrap();
        let mut journal = writer(temp.path());
        journal.append(b"good1", b"val1").unwrap();
        let first_len = journal.size() as usize;
        journal.append(b"good2", b"val2").unwrap();
        journal.append(b"good3", b"val3").unwrap();
        let path = journal.path().to_path_buf();
        drop(journal);

        // Flip a payload byte of the second entry
        let mut data = fs::read(&path).unwrap();
        data[first_len + 20] ^= 0xFF;
        fs::write(&path, data).unwrap();

        let replayed = replay(&path).unwrap();
        assert_eq!(replayed.skipped, 1);
        let keys: Vec<&[u8]> = replayed.entries.iter().map(|e| e.key.as_slice()).collect();
        assert_eq!(keys, vec![&b"good1"[..], &b"good3"[..]]);
    }

    #[test]
    fn test_damaged_length_resyncs_instead_of_truncating() {
        let temp = TempDir::new().unwrap();
        let mut journal = writer(temp.path());
        journal.append(b"good1", b"val1").unwrap();
        let first_len = journal.size() as usize;
        journal.append(b"good2", b"val2").unwrap();
        journal.append(b"good3", b"val3").unwrap();
        let total = journal.size();
        let path = journal.path().to_path_buf();
        drop(journal);

        // High byte of the second entry's length: it now overruns the file
        let mut data = fs::read(&path).unwrap();
        data[first_len + 7] = 0x7F;
        fs::write(&path, data).unwrap();

        let replayed = replay(&path).unwrap();
        assert_eq!(replayed.skipped, 1);
        assert_eq!(replayed.end, total);
        let keys: Vec<&[u8]> = replayed.entries.iter().map(|e| e.key.as_slice()).collect();
        assert_eq!(keys, vec![&b"good1"[..], &b"good3"[..]]);

        let _journal = JournalWriter::open(temp.path(), &replayed, false).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), total);
    }

    #[test]
    fn test_torn_tail_truncated_on_open() {
        let temp = TempDir::new().unwrap();
        let mut journal = writer(temp.path());
        journal.append(b"complete", b"entry").unwrap();
        let intact = journal.size();
        let path = journal.path().to_path_buf();
        drop(journal);

        // Simulate a crash mid-append: header promising 255 payload bytes
        let mut data = fs::read(&path).unwrap();
        data.extend_from_slice(&MAGIC_ARRAY);
        data.extend_from_slice(&[0xFF, 0x00, 0x00, 0x00]);
        fs::write(&path, data).unwrap();

        let replayed = replay(&path).unwrap();
        assert_eq!(replayed.entries.len(), 1);
        assert_eq!(replayed.end, intact);

        let mut journal = JournalWriter::open(temp.path(), &replayed, false).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);

        journal.append(b"after", b"crash").unwrap();
        drop(journal);
        let replayed = replay(&path).unwrap();
        assert_eq!(replayed.entries.len(), 2);
        assert_eq!(replayed.entries[1].key, b"after");
    }

    #[test]
    fn test_rewrite_keeps_only_live_entries() {
        let temp = TempDir::new().unwrap();
        let mut journal = writer(temp.path());
        for i in 0..10 {
            journal.append(b"k", format!("v{i}").as_bytes()).unwrap();
        }
        assert_eq!(journal.entries(), 10);

        journal.rewrite([(&b"k"[..], &b"v9"[..])]).unwrap();
        assert_eq!(journal.entries(), 1);
        journal.append(b"k2", b"x").unwrap();
        let path = journal.path().to_path_buf();
        drop(journal);

        let replayed = replay(&path).unwrap();
        assert_eq!(replayed.entries.len(), 2);
        assert_eq!(replayed.entries[0].value, b"v9");
        assert!(!temp.path().join(COMPACT_FILE).exists());
    }

    #[test]
    fn test_find_next_magic() {
        let mut buf = vec![0u8; 10];
        buf.extend_from_slice(&MAGIC_ARRAY);
        assert_eq!(find_next_magic(&buf, 0), Some(10));
        assert_eq!(find_next_magic(&buf, 11), None);
        assert_eq!(find_next_magic(&buf, 100), None);
    }
}
