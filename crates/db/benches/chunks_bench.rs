//! Benchmarks for FileChunk insert and vector KNN search.
//!
//! Run with: cargo bench -p db --bench chunks_bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use db::GraphStore;
use graphdex_core::FileChunkRecord;
use std::path::Path;
use tempfile::TempDir;

fn test_chunk(index: u32, dim: usize) -> FileChunkRecord {
  FileChunkRecord {
    id: graphdex_core::chunk_id("/bench/a.rs", index, "hello world"),
    file_id: "file-bench".to_string(),
    file_path: "/bench/a.rs".to_string(),
    chunk_index: index,
    total_chunks: 1,
    text: "hello world".repeat(20),
    start_offset: 0,
    end_offset: 220,
    embedding: vec![0.1; dim],
    embedding_dimensions: dim as u32,
    embedding_model: "bench-model".to_string(),
    has_prev: false,
    has_next: false,
  }
}

fn bench_add_chunk(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let mut group = c.benchmark_group("add_chunk");

  for count in [1, 10, 50] {
    group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
      b.iter_batched(
        || {
          let temp_dir = TempDir::new().unwrap();
          let store = rt.block_on(GraphStore::open_at_path(
            Path::new("/bench").to_path_buf(),
            temp_dir.path().join("bench.lancedb"),
            64,
          ));
          (temp_dir, store.unwrap())
        },
        |(_temp, store)| {
          rt.block_on(async {
            let chunks: Vec<_> = (0..count).map(|i| test_chunk(i, 64)).collect();
            store.add_chunks(&chunks).await.unwrap();
          });
        },
        criterion::BatchSize::SmallInput,
      );
    });
  }

  group.finish();
}

fn bench_vector_search(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let temp_dir = TempDir::new().unwrap();
  let store = rt
    .block_on(GraphStore::open_at_path(
      Path::new("/bench").to_path_buf(),
      temp_dir.path().join("bench.lancedb"),
      64,
    ))
    .unwrap();

  rt.block_on(async {
    let chunks: Vec<_> = (0..200).map(|i| test_chunk(i, 64)).collect();
    store.add_chunks(&chunks).await.unwrap();
  });

  c.bench_function("search_chunks_by_vector", |b| {
    b.iter(|| {
      rt.block_on(async {
        store.search_chunks_by_vector(&[0.1; 64], 10, None).await.unwrap();
      });
    });
  });
}

criterion_group!(benches, bench_add_chunk, bench_vector_search);
criterion_main!(benches);
