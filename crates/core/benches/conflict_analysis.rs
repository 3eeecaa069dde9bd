use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use fabricsync_core::{analyze, apply_resolutions, Record, ResolutionMap, Side};
use serde_json::json;

/// Build an (original, local, server) triple with `fields` fields where every
/// third field is a true conflict and the rest are split between one-sided
/// changes and untouched values.
fn triple(fields: usize) -> (Record, Record, Record) {
    let mut original = Record::new();
    let mut local = Record::new();
    let mut server = Record::new();

    for i in 0..fields {
        let key = format!("field_{i:04}");
        original.insert(key.clone(), json!(i));
        match i % 3 {
            0 => {
                local.insert(key.clone(), json!(i + 1));
                server.insert(key, json!(i + 2));
            }
            1 => {
                local.insert(key.clone(), json!(i + 1));
                server.insert(key, json!(i));
            }
            _ => {
                local.insert(key.clone(), json!(i));
                server.insert(key, json!({"nested": [i, i]}));
            }
        }
    }

    (original, local, server)
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");

    for fields in [8usize, 64, 512] {
        let (original, local, server) = triple(fields);
        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            b.iter(|| analyze(black_box(&original), black_box(&local), black_box(&server)))
        });
    }

    group.finish();
}

fn bench_apply_resolutions(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_resolutions");

    for fields in [8usize, 64, 512] {
        let (original, local, server) = triple(fields);
        let resolutions: ResolutionMap = analyze(&original, &local, &server)
            .conflicts
            .into_iter()
            .map(|c| (c.field, Side::Local))
            .collect();

        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            b.iter(|| {
                apply_resolutions(
                    black_box(&original),
                    black_box(&local),
                    black_box(&server),
                    black_box(&resolutions),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_analyze, bench_apply_resolutions);
criterion_main!(benches);
