//! Deterministic id derivation (content hashing) so re-indexing is a graph merge,
//! not an append.

use sha2::{Digest, Sha256};

/// Stable file id: `file-<sha256(absolute_path)[..16]>`. Independent of any
/// counter/timestamp/random suffix, so it survives process restarts.
pub fn file_id(absolute_path: &str) -> String {
  let digest = Sha256::digest(absolute_path.as_bytes());
  format!("file-{}", hex_prefix(&digest, 16))
}

/// Stable chunk id, content-addressed over `(file_path, chunk_index, chunk_text)`
/// so re-indexing identical content under the same path never multiplies chunks.
pub fn chunk_id(file_path: &str, chunk_index: u32, chunk_text: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(file_path.as_bytes());
  hasher.update(b"\0");
  hasher.update(chunk_index.to_le_bytes());
  hasher.update(b"\0");
  hasher.update(chunk_text.as_bytes());
  let digest = hasher.finalize();
  format!("chunk-{}", hex_prefix(&digest, 24))
}

fn hex_prefix(digest: &[u8], hex_chars: usize) -> String {
  let bytes_needed = hex_chars.div_ceil(2);
  let mut s = hex::encode(&digest[..bytes_needed.min(digest.len())]);
  s.truncate(hex_chars);
  s
}

/// Current Unix time in milliseconds. The single clock access point so tests can
/// reason about "indexed_at"/"mtime" comparisons without reaching for `SystemTime`
/// all over the codebase.
pub fn now_millis() -> i64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .map(|d| d.as_millis() as i64)
    .unwrap_or(0)
}
