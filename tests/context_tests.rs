//! Context propagation across scopes and process boundaries.

mod common;

use common::runtime_guard;
use logfan::domain::{ContextBinder, ContextError, ContextFields, MAX_PID_CHAIN};
use logfan::runtime::{self, RuntimeSettings};

#[test]
fn test_stack_merge_law() {
    // current() inside scope i equals the merge of scopes 1..i, and
    // popping restores the previous merge.
    let binder = ContextBinder::new();
    let _one = binder
        .bind(
            ContextFields::new()
                .service("svc")
                .environment("dev")
                .job_id("one")
                .extra("a", 1),
        )
        .unwrap();
    {
        let _two = binder
            .bind(ContextFields::new().job_id("two").extra("b", 2))
            .unwrap();
        {
            let three = binder
                .bind(ContextFields::new().request_id("r-3").extra("a", 3))
                .unwrap();
            let ctx = three.context();
            assert_eq!(ctx.job_id, "two");
            assert_eq!(ctx.request_id.as_deref(), Some("r-3"));
            assert_eq!(ctx.extra.get("a"), Some(&serde_json::json!(3)));
            assert_eq!(ctx.extra.get("b"), Some(&serde_json::json!(2)));
        }
        let ctx = binder.current().unwrap();
        assert_eq!(ctx.job_id, "two");
        assert!(ctx.request_id.is_none());
        assert_eq!(ctx.extra.get("a"), Some(&serde_json::json!(1)));
    }
    assert_eq!(binder.current().unwrap().job_id, "one");
}

#[test]
fn test_subprocess_handoff_appends_child_pid() {
    // Parent binds, serializes, and ships the payload to a child
    // process; the worker thread stands in for the child here.
    let binder = ContextBinder::new();
    let scope = binder
        .bind(
            ContextFields::new()
                .service("svc")
                .environment("dev")
                .job_id("parent-job"),
        )
        .unwrap();
    let parent_pid = scope.context().process_id;
    let payload = binder.serialize();
    drop(scope);

    let handle = std::thread::spawn(move || {
        let binder = ContextBinder::new();
        binder.deserialize(&payload).unwrap();

        // Hydration alone must not touch the lineage.
        let restored = binder.current().unwrap();
        assert_eq!(restored.process_id, parent_pid);
        assert_eq!(restored.process_id_chain, vec![parent_pid]);

        // The next bind at the new root adopts the frame.
        let child = binder.bind(ContextFields::new().job_id("child-job")).unwrap();
        let ctx = child.context().clone();
        assert_eq!(ctx.service, "svc");
        assert_eq!(ctx.job_id, "child-job");
        assert_eq!(*ctx.process_id_chain.last().unwrap(), ctx.process_id);
        assert!(ctx.process_id_chain.len() <= MAX_PID_CHAIN);
        ctx
    });
    handle.join().unwrap();
}

#[test]
fn test_root_bind_validation_through_facade() {
    let _guard = runtime_guard();
    runtime::init(
        RuntimeSettings::builder("svc", "dev")
            .queue(false)
            .console(false)
            .build()
            .unwrap(),
    )
    .unwrap();

    // service/environment are seeded from the runtime; job_id is still
    // the caller's responsibility at the root.
    let err = runtime::bind(ContextFields::new()).unwrap_err();
    assert!(matches!(
        err,
        logfan::RuntimeError::Context(ContextError::MissingRequired(_))
    ));

    let scope = runtime::bind(ContextFields::new().job_id("j-9")).unwrap();
    assert_eq!(scope.context().service, "svc");
    assert_eq!(scope.context().environment, "dev");
    drop(scope);

    runtime::shutdown().unwrap();
}

#[test]
fn test_serialized_stack_is_versioned_json() {
    let binder = ContextBinder::new();
    let _scope = binder
        .bind(
            ContextFields::new()
                .service("svc")
                .environment("dev")
                .job_id("j1"),
        )
        .unwrap();
    let payload = binder.serialize();
    let decoded: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(decoded["version"], serde_json::json!(1));
    assert_eq!(decoded["stack"].as_array().unwrap().len(), 1);
    assert_eq!(decoded["stack"][0]["service"], "svc");
}
