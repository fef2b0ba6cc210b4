//! Benchmarks for retry and backoff calculation.
//!
//! Run with: cargo bench -p embedding --bench retry_bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use embedding::{EmbeddingError, RetryConfig, is_retryable_error};

fn bench_backoff_calculation(c: &mut Criterion) {
  let mut group = c.benchmark_group("backoff_calculation");
  let config = RetryConfig::default();

  for model_loading in [false, true] {
    group.bench_with_input(
      BenchmarkId::new("model_loading", model_loading),
      &model_loading,
      |b, &model_loading| {
        b.iter(|| {
          for attempt in 0..6 {
            black_box(config.backoff_for_attempt(attempt, model_loading));
          }
        });
      },
    );
  }

  group.finish();
}

fn bench_is_retryable_error(c: &mut Criterion) {
  let mut group = c.benchmark_group("is_retryable_error");

  let errors = [
    ("network", EmbeddingError::Network("connection reset".to_string())),
    ("timeout", EmbeddingError::Timeout),
    (
      "service_unavail",
      EmbeddingError::ProviderError("503 model is loading".to_string()),
    ),
    (
      "not_retryable",
      EmbeddingError::ProviderError("400 invalid input format".to_string()),
    ),
  ];

  for (name, error) in errors.iter() {
    group.bench_with_input(BenchmarkId::from_parameter(name), error, |b, error| {
      b.iter(|| is_retryable_error(black_box(error)));
    });
  }

  group.finish();
}

fn bench_retry_config_creation(c: &mut Criterion) {
  let mut group = c.benchmark_group("retry_config_creation");

  group.bench_function("default", |b| {
    b.iter(|| black_box(RetryConfig::default()));
  });

  group.finish();
}

criterion_group!(
  benches,
  bench_backoff_calculation,
  bench_is_retryable_error,
  bench_retry_config_creation
);
criterion_main!(benches);
