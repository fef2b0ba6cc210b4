//! Benchmarks for text chunking.
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use graphdex_core::chunker::{ChunkParams, chunk_text};

fn generate_prose(paragraphs: usize) -> String {
  let paragraph = "Lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod. \
    Tempor incididunt ut labore et dolore magna aliqua ut enim ad minim veniam. ";
  let mut text = String::new();
  for _ in 0..paragraphs {
    text.push_str(paragraph);
    text.push_str("\n\n");
  }
  text
}

fn bench_chunk_text(c: &mut Criterion) {
  let mut group = c.benchmark_group("chunk_text");
  let params = ChunkParams::default();

  for paragraphs in [10, 100, 500, 2000].iter() {
    let text = generate_prose(*paragraphs);
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &text, |b, text| {
      b.iter(|| chunk_text(black_box(text), params));
    });
  }

  group.finish();
}

criterion_group!(benches, bench_chunk_text);
criterion_main!(benches);
