use criterion::{criterion_group, criterion_main, Criterion};
use netatmo_dashboard::models::SeriesKind;
use netatmo_dashboard::services::aggregator::{derive, reshape};
use netatmo_dashboard::services::dashboard::build_chart;
use netatmo_dashboard::services::ChartLayout;
use netatmo_dashboard::time_utils::label_offset;
use std::collections::HashMap;
use std::hint::black_box;

const DAY: i64 = 86_400;
// 2020-01-01T00:00:00Z
const START: i64 = 1_577_836_800;

/// Raw `getmeasure` body with `days` daily samples in reverse order.
fn raw_body(kind: SeriesKind, days: i64) -> HashMap<String, Vec<Option<f64>>> {
    (0..days)
        .rev()
        .map(|i| {
            let values = match kind {
                SeriesKind::Boiler => vec![Some((i % 12) as f64 * 3600.0), Some(7200.0)],
                SeriesKind::Outdoor => vec![Some(12.5), Some(80.0), Some(4.0), Some(18.0), None],
                SeriesKind::Indoor => vec![Some(20.5), Some(45.0), Some(19.0), Some(22.0)],
            };
            ((START + i * DAY).to_string(), values)
        })
        .collect()
}

fn benchmark_daily_dashboard(c: &mut Criterion) {
    // Roughly five years of daily samples
    let days = 5 * 365;
    let bodies: Vec<_> = SeriesKind::ALL
        .into_iter()
        .map(|kind| (kind, raw_body(kind, days)))
        .collect();

    let mut group = c.benchmark_group("daily_dashboard");

    group.bench_function("reshape_boiler", |b| {
        b.iter(|| reshape(SeriesKind::Boiler, black_box(&bodies[0].1)))
    });

    group.bench_function("reshape_and_build_chart", |b| {
        b.iter(|| {
            let records: HashMap<_, _> = bodies
                .iter()
                .map(|(kind, body)| (*kind, derive(&reshape(*kind, black_box(body)))))
                .collect();
            build_chart(&ChartLayout::DAILY, &records, label_offset(0))
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_daily_dashboard);
criterion_main!(benches);
