use cadence_core::materializer::materialize;
use cadence_core::models::{Frequency, MonthDaySet, RecurrenceRule, Task, WeekdaySet};
use cadence_core::recurrence::{next_candidate, skip_weekend, upcoming};
use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
}

fn rule(frequency: Frequency, interval: u32) -> RecurrenceRule {
    let mut rule = RecurrenceRule::new(frequency, interval, anchor());
    match frequency {
        Frequency::Weekly => rule.days_of_week = WeekdaySet::from_ordinals([1, 3, 5]).unwrap(),
        Frequency::Monthly => rule.days_of_month = MonthDaySet::from_days([1, 15, 31]).unwrap(),
        _ => {}
    }
    rule
}

fn bench_next_candidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_candidate");
    for frequency in Frequency::ALL {
        let rule = rule(frequency, 3);
        group.bench_with_input(BenchmarkId::from_parameter(frequency), &rule, |b, rule| {
            b.iter(|| next_candidate(black_box(rule), black_box(anchor())))
        });
    }
    group.finish();
}

fn bench_upcoming_year(c: &mut Criterion) {
    let mut group = c.benchmark_group("upcoming_365");
    for skip_weekends in [false, true] {
        let mut rule = rule(Frequency::Daily, 1);
        rule.skip_weekends = skip_weekends;
        group.bench_with_input(
            BenchmarkId::new("daily", if skip_weekends { "skip_weekends" } else { "plain" }),
            &rule,
            |b, rule| b.iter(|| upcoming(black_box(rule)).take(365).count()),
        );
    }
    group.finish();
}

fn bench_skip_weekend(c: &mut Criterion) {
    let saturday = NaiveDate::from_ymd_opt(2026, 2, 21).unwrap();
    c.bench_function("skip_weekend", |b| b.iter(|| skip_weekend(black_box(saturday))));
}

fn bench_materialize(c: &mut Criterion) {
    let rule = rule(Frequency::Weekly, 1);
    let template = Task {
        title: "Benchmark Task".to_string(),
        description: Some("Copied into every occurrence".to_string()),
        ..Default::default()
    };
    c.bench_function("materialize", |b| {
        b.iter(|| materialize(black_box(&rule), Some(black_box(&template)), anchor()).unwrap())
    });
}

criterion_group!(
    benches,
    bench_next_candidate,
    bench_upcoming_year,
    bench_skip_weekend,
    bench_materialize
);
criterion_main!(benches);
