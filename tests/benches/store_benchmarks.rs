//! # VKV Store Benchmarks
//!
//! | Area | What it measures |
//! |------|------------------|
//! | Single ops | Registry hit + one transaction per call |
//! | Batches | One transaction for many requests |
//! | Open storm | Concurrent opens sharing one engine open |

use criterion::{criterion_group, criterion_main};
use vkv_tests::benchmarks::store::{bench_batches, bench_open_storm, bench_single_ops};

criterion_group!(benches, bench_single_ops, bench_batches, bench_open_storm);
criterion_main!(benches);
