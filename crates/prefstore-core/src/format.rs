//! Binary format of journal entries
//!
//! Every entry is a 16-byte header followed by its payload:
//! EntryHeader (16 bytes) + key_len(u16) + value_len(u32) + key_bytes + value_bytes
//!
//! The stored key is the table-prefixed key (`[table_id][record key]`), see
//! [`table_key`].

use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Magic bytes identifying journal entries: "PREF" in ASCII
pub const MAGIC_ARRAY: [u8; 4] = *b"PREF";

/// Current entry layout version
pub const FORMAT_VERSION: u8 = 1;

/// Maximum stored key size in bytes (table id included)
pub const MAX_KEY_SIZE: usize = 128;

/// Maximum value size in bytes (64KB)
pub const MAX_VALUE_SIZE: usize = 64 * 1024;

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Payload bytes before the key: key_len(2) + value_len(4)
const PAYLOAD_PREFIX: usize = 6;

/// Fixed-size header for each journal entry
///
/// Layout:
///   [0..4]   magic:    [u8;4] - "PREF"
///   [4..8]   length:   u32    - payload length in bytes
///   [8..12]  checksum: u32    - CRC32C of payload bytes
///   [12]     version:  u8     - FORMAT_VERSION
///   [13..16] reserved: [u8;3]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub magic: [u8; 4],
    pub length: u32,
    pub checksum: u32,
    pub version: u8,
}

impl EntryHeader {
    fn new(length: u32, checksum: u32) -> Self {
        Self { magic: MAGIC_ARRAY, length, checksum, version: FORMAT_VERSION }
    }

    /// Serialize header to bytes for writing
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf[12] = self.version;
        buf
    }

    /// Parse header from bytes
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            version: bytes[12],
        }
    }
}

/// One decoded upsert from the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Table-prefixed key
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl JournalEntry {
    /// Bytes this entry occupies in the journal
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + PAYLOAD_PREFIX + self.key.len() + self.value.len()
    }
}

/// Build the stored key for a record: `[table_id][key bytes]`.
pub fn table_key(table: u8, key: &str) -> Vec<u8> {
    let mut prefixed = Vec::with_capacity(1 + key.len());
    prefixed.push(table);
    prefixed.extend_from_slice(key.as_bytes());
    prefixed
}

/// Reject keys and values the journal cannot hold.
pub fn check_limits(key: &[u8], value: &[u8]) -> StoreResult<()> {
    if key.len() > MAX_KEY_SIZE {
        return Err(StoreError::OversizedEntry {
            entry_size: key.len() as u64,
            max_size: MAX_KEY_SIZE as u64,
            component: "key",
        });
    }
    if value.len() > MAX_VALUE_SIZE {
        return Err(StoreError::OversizedEntry {
            entry_size: value.len() as u64,
            max_size: MAX_VALUE_SIZE as u64,
            component: "value",
        });
    }
    Ok(())
}

/// Serialize a table-prefixed key and value into a complete journal entry
pub fn serialize_entry(key: &[u8], value: &[u8]) -> StoreResult<Vec<u8>> {
    // Size limits are checked before anything is allocated
    check_limits(key, value)?;

    let payload_size = PAYLOAD_PREFIX + key.len() + value.len();
    let mut buffer = Vec::with_capacity(HEADER_SIZE + payload_size);
    buffer.extend_from_slice(&[0u8; HEADER_SIZE]);
    buffer.extend_from_slice(&(key.len() as u16).to_le_bytes());
    buffer.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buffer.extend_from_slice(key);
    buffer.extend_from_slice(value);

    let checksum = crc32c::crc32c(&buffer[HEADER_SIZE..]);
    let header = EntryHeader::new(payload_size as u32, checksum);
    buffer[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

    Ok(buffer)
}

/// Deserialize one journal entry from the start of `data`.
///
/// `path` and `base` only feed error context.
pub fn deserialize_entry(data: &[u8], path: &Path, base: u64) -> StoreResult<JournalEntry> {
    let Some(header_bytes) = data.get(..HEADER_SIZE) else {
        return Err(StoreError::TornWrite {
            path: path.to_path_buf(),
            expected_size: HEADER_SIZE as u32,
            available_bytes: data.len() as u64,
            offset: base,
        });
    };
    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(header_bytes);
    let header = EntryHeader::from_bytes(&raw);

    if header.magic != MAGIC_ARRAY {
        return Err(StoreError::NoMagicFound {
            path: path.to_path_buf(),
            offset: base,
            found_bytes: header.magic,
        });
    }

    let payload_end = HEADER_SIZE + header.length as usize;
    if data.len() < payload_end {
        return Err(StoreError::TornWrite {
            path: path.to_path_buf(),
            expected_size: header.length,
            available_bytes: (data.len() - HEADER_SIZE) as u64,
            offset: base + HEADER_SIZE as u64,
        });
    }
    let payload = &data[HEADER_SIZE..payload_end];

    let actual = crc32c::crc32c(payload);
    if actual != header.checksum {
        return Err(StoreError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: header.checksum,
            actual,
            offset: base + HEADER_SIZE as u64,
        });
    }

    if header.version != FORMAT_VERSION {
        return Err(StoreError::JournalCorrupted {
            path: path.to_path_buf(),
            offset: base + 12,
            reason: format!("unsupported entry version {}", header.version),
        });
    }

    if payload.len() < PAYLOAD_PREFIX {
        return Err(StoreError::JournalCorrupted {
            path: path.to_path_buf(),
            offset: base + HEADER_SIZE as u64,
            reason: "payload too short for length fields".to_string(),
        });
    }
    let key_len = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    let value_len = u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]) as usize;
    let key_end = PAYLOAD_PREFIX + key_len;
    let value_end = key_end + value_len;

    if payload.len() != value_end {
        return Err(StoreError::JournalCorrupted {
            path: path.to_path_buf(),
            offset: base + HEADER_SIZE as u64,
            reason: format!(
                "payload is {} bytes, key({key_len}) + value({value_len}) need {value_end}",
                payload.len()
            ),
        });
    }

    Ok(JournalEntry {
        key: payload[PAYLOAD_PREFIX..key_end].to_vec(),
        value: payload[key_end..value_end].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(data: &[u8]) -> StoreResult<JournalEntry> {
        deserialize_entry(data, Path::new("<buffer>"), 0)
    }

    #[test]
    fn test_serialize_deserialize() {
        let key = table_key(0x01, "jwt_expires_in");
        let serialized = serialize_entry(&key, b"7d").unwrap();
        assert_eq!(serialized.len(), HEADER_SIZE + 6 + key.len() + 2);

        let entry = decode(&serialized).unwrap();
        assert_eq!(entry.key, key);
        assert_eq!(entry.value, b"7d");
        assert_eq!(entry.encoded_len(), serialized.len());
    }

    #[test]
    fn test_table_key_prefix() {
        assert_eq!(table_key(0x02, "ab"), vec![0x02, b'a', b'b']);
    }

    #[test]
    fn test_oversized_key_rejected() {
        let key = vec![0u8; MAX_KEY_SIZE + 1];
        let result = serialize_entry(&key, b"val");
        assert!(matches!(result, Err(StoreError::OversizedEntry { component: "key", .. })));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let value = vec![0u8; MAX_VALUE_SIZE + 1];
        let result = serialize_entry(b"k", &value);
        assert!(matches!(result, Err(StoreError::OversizedEntry { component: "value", .. })));
    }

    #[test]
    fn test_corrupted_magic_detected() {
        let mut data = serialize_entry(b"key", b"value").unwrap();
        data[0] = 0xFF;
        assert!(matches!(decode(&data), Err(StoreError::NoMagicFound { .. })));
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut data = serialize_entry(b"key", b"value").unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(matches!(decode(&data), Err(StoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_truncated_entry_is_torn() {
        let data = serialize_entry(b"key", b"value").unwrap();
        let cut = &data[..data.len() - 2];
        assert!(matches!(decode(cut), Err(StoreError::TornWrite { .. })));
    }
}
