//! Validation for subscription requests and hybrid search requests. Centralizes
//! the range/shape checks `watch_manager`/`search` would otherwise duplicate,
//! with field-tagged errors instead of a panic deep in indexing or search.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub struct ValidationError {
  pub field: String,
  pub message: String,
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.field, self.message)
  }
}

impl ValidationError {
  pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      message: message.into(),
    }
  }

  fn out_of_range(field: impl Into<String>, min: impl fmt::Display, max: impl fmt::Display) -> Self {
    Self::new(field, format!("must be between {min} and {max}"))
  }

  fn too_long(field: impl Into<String>, max_len: usize) -> Self {
    Self::new(field, format!("must be at most {max_len} characters"))
  }

  fn invalid_enum(field: impl Into<String>, valid_values: &[&str]) -> Self {
    Self::new(field, format!("must be one of: {}", valid_values.join(", ")))
  }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MIN_DEBOUNCE_MS: u64 = 100;
pub const MAX_DEBOUNCE_MS: u64 = 60_000;
pub const MIN_SEARCH_LIMIT: usize = 1;
pub const MAX_SEARCH_LIMIT: usize = 100;
pub const MAX_QUERY_LEN: usize = 1_000;
pub const SEARCH_RESULT_TYPES: [&str; 2] = ["file", "file_chunk"];

/// A subscription root must be an absolute path to an existing directory —
/// relative paths would resolve differently depending on the daemon's cwd,
/// and a missing/non-directory root can never be scanned.
pub fn validate_root_path(root_path: &str) -> ValidationResult<PathBuf> {
  if root_path.trim().is_empty() {
    return Err(ValidationError::new("root_path", "is required"));
  }
  let path = Path::new(root_path);
  if !path.is_absolute() {
    return Err(ValidationError::new("root_path", "must be an absolute path"));
  }
  if !path.is_dir() {
    return Err(ValidationError::new("root_path", "must be an existing directory"));
  }
  Ok(path.to_path_buf())
}

/// Below `MIN_DEBOUNCE_MS` a watcher would re-trigger mid-write; above
/// `MAX_DEBOUNCE_MS` a subscriber would wait unreasonably long to see an edit.
pub fn validate_debounce_ms(debounce_ms: u64) -> ValidationResult<u64> {
  if !(MIN_DEBOUNCE_MS..=MAX_DEBOUNCE_MS).contains(&debounce_ms) {
    return Err(ValidationError::out_of_range("debounce_ms", MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS));
  }
  Ok(debounce_ms)
}

pub fn validate_ignore_patterns(patterns: &[String]) -> ValidationResult<()> {
  for (i, pattern) in patterns.iter().enumerate() {
    if pattern.trim().is_empty() {
      return Err(ValidationError::new(format!("ignore_patterns[{i}]"), "must not be empty"));
    }
  }
  Ok(())
}

/// A query longer than `MAX_QUERY_LEN` is almost certainly pasted-in content
/// rather than a search phrase and would dominate BM25/embedding cost for no
/// ranking benefit. An empty/whitespace-only query is not an error here — the
/// search pipeline treats it as a deliberate "no results" short-circuit.
pub fn validate_search_query(query: &str) -> ValidationResult<()> {
  if query.len() > MAX_QUERY_LEN {
    return Err(ValidationError::too_long("query", MAX_QUERY_LEN));
  }
  Ok(())
}

pub fn validate_search_limit(limit: usize) -> ValidationResult<usize> {
  if !(MIN_SEARCH_LIMIT..=MAX_SEARCH_LIMIT).contains(&limit) {
    return Err(ValidationError::out_of_range("limit", MIN_SEARCH_LIMIT, MAX_SEARCH_LIMIT));
  }
  Ok(limit)
}

pub fn validate_min_similarity(min_similarity: f32) -> ValidationResult<f32> {
  if !(0.0..=1.0).contains(&min_similarity) {
    return Err(ValidationError::out_of_range("min_similarity", 0.0, 1.0));
  }
  Ok(min_similarity)
}

pub fn validate_type_filter(types: &[String]) -> ValidationResult<()> {
  for (i, t) in types.iter().enumerate() {
    if !SEARCH_RESULT_TYPES.contains(&t.as_str()) {
      return Err(ValidationError::invalid_enum(format!("type_filter[{i}]"), &SEARCH_RESULT_TYPES));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn root_path_rejects_empty_and_relative() {
    assert!(validate_root_path("").is_err());
    assert!(validate_root_path("relative/path").is_err());
  }

  #[test]
  fn root_path_rejects_missing_directory() {
    let err = validate_root_path("/definitely/does/not/exist/anywhere").unwrap_err();
    assert_eq!(err.field, "root_path");
  }

  #[test]
  fn root_path_accepts_existing_directory() {
    let temp = TempDir::new().unwrap();
    let path = validate_root_path(&temp.path().to_string_lossy()).unwrap();
    assert_eq!(path, temp.path());
  }

  #[test]
  fn debounce_ms_enforces_range() {
    assert!(validate_debounce_ms(50).is_err());
    assert!(validate_debounce_ms(70_000).is_err());
    assert_eq!(validate_debounce_ms(2000).unwrap(), 2000);
  }

  #[test]
  fn ignore_patterns_reject_blank_entries() {
    assert!(validate_ignore_patterns(&["target/".to_string()]).is_ok());
    let err = validate_ignore_patterns(&["target/".to_string(), "  ".to_string()]).unwrap_err();
    assert!(err.field.contains("[1]"));
  }

  #[test]
  fn search_query_rejects_overlong_input() {
    assert!(validate_search_query("hybrid search").is_ok());
    let long = "a".repeat(MAX_QUERY_LEN + 1);
    let err = validate_search_query(&long).unwrap_err();
    assert!(err.message.contains("at most"));
  }

  #[test]
  fn search_limit_enforces_range() {
    assert!(validate_search_limit(0).is_err());
    assert!(validate_search_limit(101).is_err());
    assert_eq!(validate_search_limit(10).unwrap(), 10);
  }

  #[test]
  fn min_similarity_enforces_unit_range() {
    assert!(validate_min_similarity(-0.1).is_err());
    assert!(validate_min_similarity(1.1).is_err());
    assert_eq!(validate_min_similarity(0.75).unwrap(), 0.75);
  }

  #[test]
  fn type_filter_rejects_unknown_type() {
    assert!(validate_type_filter(&["file".to_string()]).is_ok());
    let err = validate_type_filter(&["memory".to_string()]).unwrap_err();
    assert!(err.message.contains("file, file_chunk"));
  }
}
