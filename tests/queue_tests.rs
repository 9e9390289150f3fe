//! Queued-mode delivery: ordering, drain, and failure isolation.

mod common;

use std::time::{Duration, Instant};

use common::{runtime_guard, DiagnosticRecorder, SharedBuf};
use logfan::domain::{ContextFields, LogLevel};
use logfan::runtime::{self, RuntimeSettings};
use logfan::ProcessOutcome;
use serde_json::json;

#[test]
fn test_queue_drains_all_events_in_order() {
    let _guard = runtime_guard();
    let console = SharedBuf::new();
    runtime::init(
        RuntimeSettings::builder("svc", "dev")
            .queue(true)
            .queue_maxsize(1024)
            .console_format_template("{message}")
            .console_writer(Box::new(console.clone()))
            .console_level(LogLevel::Debug)
            .build()
            .unwrap(),
    )
    .unwrap();

    let _scope = runtime::bind(ContextFields::new().job_id("j1")).unwrap();
    let log = runtime::get("svc.worker");
    for i in 0..1000 {
        let outcome = log.info(&format!("event-{i:04}"), None).unwrap();
        assert!(
            matches!(outcome, ProcessOutcome::Queued { .. }),
            "event {i} was not queued: {outcome:?}"
        );
    }

    let start = Instant::now();
    runtime::shutdown().unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "drain exceeded the stop deadline"
    );

    let lines = console.lines();
    assert_eq!(lines.len(), 1000, "every queued event must be delivered");
    let expected: Vec<String> = (0..1000).map(|i| format!("event-{i:04}")).collect();
    assert_eq!(lines, expected, "delivery must preserve enqueue order");
    assert!(!runtime::is_initialised());
}

#[test]
fn test_queued_diagnostics_and_emitted_on_worker() {
    let _guard = runtime_guard();
    let recorder = DiagnosticRecorder::new();
    let console = SharedBuf::new();
    runtime::init(
        RuntimeSettings::builder("svc", "dev")
            .queue(true)
            .console_format_template("{message}")
            .console_writer(Box::new(console.clone()))
            .diagnostic_hook(recorder.hook())
            .build()
            .unwrap(),
    )
    .unwrap();

    let _scope = runtime::bind(ContextFields::new().job_id("j1")).unwrap();
    runtime::get("svc.worker").info("tracked", None).unwrap();
    runtime::shutdown().unwrap();

    assert_eq!(recorder.count("queued"), 1);
    assert_eq!(recorder.count("emitted"), 1);
}

#[test]
fn test_queue_full_returns_dropped_status() {
    let _guard = runtime_guard();
    let recorder = DiagnosticRecorder::new();
    let gate = std::sync::Arc::new(std::sync::Mutex::new(()));
    let held = gate.lock().unwrap();
    runtime::init(
        RuntimeSettings::builder("svc", "dev")
            .queue(true)
            .queue_maxsize(2)
            .queue_put_timeout(Duration::from_millis(50))
            .queue_stop_timeout(Duration::from_secs(10))
            .console_format_template("{message}")
            .console_writer(Box::new(common::BlockingWriter::new(
                std::sync::Arc::clone(&gate),
            )))
            .diagnostic_hook(recorder.hook())
            .build()
            .unwrap(),
    )
    .unwrap();

    let _scope = runtime::bind(ContextFields::new().job_id("j1")).unwrap();
    let log = runtime::get("svc.worker");

    // First event parks the worker on the blocked writer; two more fill
    // the channel; the fourth exhausts the bounded wait.
    log.info("first", None).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    log.info("second", None).unwrap();
    log.info("third", None).unwrap();
    let outcome = log.info("fourth", None).unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::Dropped {
            reason: logfan::DropReason::QueueFull
        }
    );
    let drops = recorder.payloads("dropped");
    assert_eq!(drops.len(), 1);
    assert_eq!(drops[0]["reason"], json!("queue_full"));

    drop(held);
    runtime::shutdown().unwrap();
}

#[test]
fn test_sink_panic_is_isolated_in_queued_mode() {
    let _guard = runtime_guard();
    let recorder = DiagnosticRecorder::new();
    let console = SharedBuf::new();
    runtime::init(
        RuntimeSettings::builder("svc", "dev")
            .queue(true)
            .queue_cooldown(Duration::from_millis(5))
            .console_format_template("{message}")
            .console_writer(Box::new(console.clone()))
            .eventlog(true)
            .eventlog_sender(std::sync::Arc::new(
                |_fields: &[(String, String)]| -> Result<(), logfan::SinkError> {
                    panic!("event log wedged");
                },
            ))
            .backend_level(LogLevel::Debug)
            .diagnostic_hook(recorder.hook())
            .build()
            .unwrap(),
    )
    .unwrap();

    let _scope = runtime::bind(ContextFields::new().job_id("j1")).unwrap();
    let log = runtime::get("svc.worker");
    for i in 0..3 {
        log.info(&format!("event-{i}"), None).unwrap();
    }
    runtime::shutdown().unwrap();

    // Console still received every event despite the panicking sibling.
    assert_eq!(console.lines().len(), 3);
    // Panics inside a sink are caught by the fan-out, not the worker.
    assert_eq!(recorder.count("sink_failed"), 3);
}
