//! # VKV Benchmarks
//!
//! Benchmark bodies shared with `benches/store_benchmarks.rs`.

pub mod store;
