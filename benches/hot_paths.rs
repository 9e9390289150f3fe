//! Benchmarks for the per-event hot paths.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use logfan::application::ports::{RateLimiterPort, ScrubberPort};
use logfan::domain::{ContextBinder, ContextFields, LogEvent, LogLevel, RingBuffer};
use logfan::infrastructure::format::{render_template, DEFAULT_TEMPLATE};
use logfan::infrastructure::rate_limiter::{RateLimit, SlidingWindowRateLimiter};
use logfan::infrastructure::scrubber::RegexScrubber;
use logfan::infrastructure::SystemClock;

fn sample_event() -> LogEvent {
    let binder = ContextBinder::new();
    let scope = binder
        .bind(
            ContextFields::new()
                .service("svc")
                .environment("bench")
                .job_id("job-1"),
        )
        .unwrap();
    LogEvent::new(
        "evt-00000001",
        chrono::Utc::now(),
        "svc.worker",
        LogLevel::Info,
        "user logged in",
        scope.context().clone(),
        BTreeMap::from([
            ("user".to_string(), serde_json::json!("alice")),
            ("password".to_string(), serde_json::json!("p@ss")),
        ]),
        None,
    )
    .unwrap()
}

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter");
    group.throughput(Throughput::Elements(1));

    let limiter = SlidingWindowRateLimiter::new(
        RateLimit {
            max_events: usize::MAX,
            window: Duration::from_secs(60),
        },
        Arc::new(SystemClock::new()),
    );
    let event = sample_event();

    group.bench_function("allow_hot_bucket", |b| {
        b.iter(|| limiter.allow(black_box(&event)))
    });
    group.finish();
}

fn bench_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Elements(1));

    let ring = RingBuffer::new(25_000);
    let event = sample_event();

    group.bench_function("append", |b| b.iter(|| ring.append(black_box(event.clone()))));
    group.finish();
}

fn bench_scrubber(c: &mut Criterion) {
    let mut group = c.benchmark_group("scrubber");
    group.throughput(Throughput::Elements(1));

    let scrubber = RegexScrubber::default();
    let event = sample_event();

    group.bench_function("scrub_two_fields", |b| {
        b.iter(|| scrubber.scrub(black_box(event.clone())))
    });
    group.finish();
}

fn bench_template(c: &mut Criterion) {
    let mut group = c.benchmark_group("template");
    group.throughput(Throughput::Elements(1));

    let event = sample_event();

    group.bench_function("default_template", |b| {
        b.iter(|| render_template(black_box(DEFAULT_TEMPLATE), black_box(&event)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_rate_limiter,
    bench_ring_buffer,
    bench_scrubber,
    bench_template
);
criterion_main!(benches);
