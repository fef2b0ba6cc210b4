//! Splits text at paragraph -> sentence -> word boundaries with overlap, emitting
//! ordered chunks with byte offsets.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkParams {
  pub chunk_size: usize,
  pub overlap: usize,
}

impl Default for ChunkParams {
  fn default() -> Self {
    Self {
      chunk_size: 768,
      overlap: 10,
    }
  }
}

/// One chunk of a chunked text, with its position in the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
  pub index: u32,
  pub text: String,
  pub start_offset: usize,
  pub end_offset: usize,
  pub has_prev: bool,
  pub has_next: bool,
}

/// Split `text` per spec: paragraph boundary preferred, then sentence, then a
/// plain space, falling back to the raw chunk-size cut if none qualifies.
///
/// Chunks are ordered, finite, and restartable given the same input.
pub fn chunk_text(text: &str, params: ChunkParams) -> Vec<Chunk> {
  let len = text.len();
  if len == 0 {
    return Vec::new();
  }
  if len <= params.chunk_size {
    return vec![Chunk {
      index: 0,
      text: text.trim().to_string(),
      start_offset: 0,
      end_offset: len,
      has_prev: false,
      has_next: false,
    }];
  }

  let mut raw: Vec<(usize, usize)> = Vec::new();
  let mut start = 0usize;
  while start < len {
    let mut end = (start + params.chunk_size).min(len);
    if end < len {
      end = snap_boundary(text, start, end, params.chunk_size);
    }
    raw.push((start, end));

    let next_start = end.saturating_sub(params.overlap);
    // guard against infinite loops when overlap >= chunk span
    start = if next_start <= start { end } else { next_start };
  }

  let last = raw.len() - 1;
  raw
    .into_iter()
    .enumerate()
    .map(|(i, (s, e))| Chunk {
      index: i as u32,
      text: text[s..e].trim().to_string(),
      start_offset: s,
      end_offset: e,
      has_prev: i > 0,
      has_next: i < last,
    })
    .collect()
}

/// Pull `end` back to the nearest preceding paragraph boundary (`\n\n`) that is at
/// least `start + chunk_size/2`; failing that, the nearest sentence boundary
/// (". "); failing that, the nearest space. If none qualifies, `end` is unchanged.
fn snap_boundary(text: &str, start: usize, end: usize, chunk_size: usize) -> usize {
  let floor = start + chunk_size / 2;
  let window = &text[start..end];

  if let Some(pos) = window.rfind("\n\n") {
    let candidate = start + pos + 2;
    if candidate >= floor && candidate > start {
      return candidate;
    }
  }
  if let Some(pos) = window.rfind(". ") {
    let candidate = start + pos + 2;
    if candidate >= floor && candidate > start {
      return candidate;
    }
  }
  if let Some(pos) = window.rfind(' ') {
    let candidate = start + pos + 1;
    if candidate >= floor && candidate > start {
      return candidate;
    }
  }
  end
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_text_is_a_single_chunk() {
    let chunks = chunk_text("hello world", ChunkParams::default());
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "hello world");
    assert!(!chunks[0].has_prev);
    assert!(!chunks[0].has_next);
  }

  #[test]
  fn empty_text_yields_no_chunks() {
    assert!(chunk_text("", ChunkParams::default()).is_empty());
  }

  #[test]
  fn large_text_is_split_with_contiguous_coverage() {
    let paragraph = "Lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod. ";
    let text = paragraph.repeat(60);
    let params = ChunkParams {
      chunk_size: 200,
      overlap: 20,
    };
    let chunks = chunk_text(&text, params);
    assert!(chunks.len() > 1);
    assert!(!chunks[0].has_prev);
    assert!(!chunks.last().unwrap().has_next);

    for (i, c) in chunks.iter().enumerate() {
      assert_eq!(c.index as usize, i);
      assert!(c.start_offset < c.end_offset);
    }
    // coverage: the union of offsets must reach the end of the text.
    assert_eq!(chunks.last().unwrap().end_offset, text.len());
  }

  #[test]
  fn chunking_is_deterministic() {
    let text = "word ".repeat(500);
    let params = ChunkParams {
      chunk_size: 100,
      overlap: 10,
    };
    let a = chunk_text(&text, params);
    let b = chunk_text(&text, params);
    assert_eq!(a, b);
  }

  #[test]
  fn overlap_larger_than_chunk_does_not_infinite_loop() {
    let text = "a".repeat(5000);
    let params = ChunkParams {
      chunk_size: 50,
      overlap: 49,
    };
    let chunks = chunk_text(&text, params);
    assert!(!chunks.is_empty());
    assert!(chunks.len() < 5000);
  }

  #[test]
  fn snaps_to_paragraph_boundary() {
    let text = format!("{}\n\n{}", "a".repeat(100), "b".repeat(100));
    let params = ChunkParams {
      chunk_size: 150,
      overlap: 0,
    };
    let chunks = chunk_text(&text, params);
    // first chunk should end right at the paragraph break, not mid-run of a's or b's
    assert!(chunks[0].text.chars().all(|c| c == 'a'));
  }
}
