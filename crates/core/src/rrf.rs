//! Reciprocal Rank Fusion: a pure function combining N ranked lists into one.
//!
//! `score(item) = sum_over_lists(weight_list / (k + rank_list(item)))`. Identity
//! for grouping is the item's id; adaptive tuning of `k`/weights based on query
//! shape is a policy layer above this pure function (see `daemon::search`).

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RrfConfig {
  pub k: f64,
  /// Per-list weights, matched positionally to the lists passed to `fuse`.
  pub weights: Vec<f64>,
  pub min_score: f64,
}

impl Default for RrfConfig {
  fn default() -> Self {
    Self {
      k: 60.0,
      weights: Vec::new(),
      min_score: 0.01,
    }
  }
}

impl RrfConfig {
  pub fn weight_for(&self, list_index: usize) -> f64 {
    self.weights.get(list_index).copied().unwrap_or(1.0)
  }
}

/// A single ranked item carrying an arbitrary payload plus an identity string used
/// to unify the same logical item across lists.
#[derive(Debug, Clone)]
pub struct RankedItem<T> {
  pub id: String,
  pub payload: T,
}

#[derive(Debug, Clone)]
pub struct FusedItem<T> {
  pub id: String,
  pub payload: T,
  pub score: f64,
  /// Rank (0-based) each source list contributed, for diagnostics.
  pub source_ranks: Vec<Option<usize>>,
}

/// Fuse `lists` (each already rank-ordered best-first) into one sorted, truncated
/// list. The payload kept for a given id is the payload from the first list in
/// which it appears.
pub fn fuse<T: Clone>(lists: &[Vec<RankedItem<T>>], config: &RrfConfig, limit: usize) -> Vec<FusedItem<T>> {
  let mut scores: HashMap<String, f64> = HashMap::new();
  let mut payloads: HashMap<String, T> = HashMap::new();
  let mut ranks: HashMap<String, Vec<Option<usize>>> = HashMap::new();

  for (list_idx, list) in lists.iter().enumerate() {
    let weight = config.weight_for(list_idx);
    for (rank, item) in list.iter().enumerate() {
      let contribution = weight / (config.k + rank as f64 + 1.0);
      *scores.entry(item.id.clone()).or_insert(0.0) += contribution;
      payloads.entry(item.id.clone()).or_insert_with(|| item.payload.clone());
      let entry = ranks.entry(item.id.clone()).or_insert_with(|| vec![None; lists.len()]);
      entry[list_idx] = Some(rank);
    }
  }

  let mut fused: Vec<FusedItem<T>> = scores
    .into_iter()
    .filter(|(_, score)| *score >= config.min_score)
    .map(|(id, score)| FusedItem {
      payload: payloads.remove(&id).expect("payload recorded alongside score"),
      source_ranks: ranks.remove(&id).unwrap_or_default(),
      id,
      score,
    })
    .collect();

  fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
  fused.truncate(limit);
  fused
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(id: &str) -> RankedItem<()> {
    RankedItem {
      id: id.to_string(),
      payload: (),
    }
  }

  #[test]
  fn item_in_both_lists_outranks_single_list_item() {
    let vector = vec![item("a"), item("b")];
    let bm25 = vec![item("a"), item("c")];
    let config = RrfConfig::default();
    let fused = fuse(&[vector, bm25], &config, 10);

    let a_score = fused.iter().find(|f| f.id == "a").unwrap().score;
    let b_score = fused.iter().find(|f| f.id == "b").unwrap().score;
    let c_score = fused.iter().find(|f| f.id == "c").unwrap().score;
    assert!(a_score > b_score);
    assert!(a_score > c_score);
    assert_eq!(b_score, c_score);
  }

  #[test]
  fn monotonicity_by_rank() {
    let list = vec![item("a"), item("b"), item("c")];
    let config = RrfConfig::default();
    let fused = fuse(&[list], &config, 10);
    let a = fused.iter().find(|f| f.id == "a").unwrap().score;
    let b = fused.iter().find(|f| f.id == "b").unwrap().score;
    let c = fused.iter().find(|f| f.id == "c").unwrap().score;
    assert!(a > b);
    assert!(b > c);
  }

  #[test]
  fn min_score_drops_low_scoring_items() {
    let list = vec![item("a")];
    let config = RrfConfig {
      min_score: 10.0,
      ..Default::default()
    };
    let fused = fuse(&[list], &config, 10);
    assert!(fused.is_empty());
  }

  #[test]
  fn truncates_to_limit() {
    let list: Vec<_> = (0..20).map(|i| item(&i.to_string())).collect();
    let config = RrfConfig::default();
    let fused = fuse(&[list], &config, 5);
    assert_eq!(fused.len(), 5);
  }
}
