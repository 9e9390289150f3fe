//! Context frames and the thread-local binder stack.
//!
//! Every log event carries a snapshot of the [`LogContext`] bound to the
//! emitting thread. Contexts form a stack: the first `bind` in a thread
//! must supply the mandatory identity fields, nested binds inherit their
//! parent and overlay overrides. The whole stack can be serialized and
//! rehydrated inside a subprocess, where the next root bind appends the
//! child PID to the process chain.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum retained process-id lineage. Oldest entries are discarded.
pub const MAX_PID_CHAIN: usize = 8;

const REQUIRED_FIELDS: [&str; 3] = ["service", "environment", "job_id"];

/// Error raised when binding or rehydrating context state fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A root bind is missing one or more mandatory fields.
    MissingRequired(Vec<&'static str>),
    /// A mandatory field was present but blank after trimming.
    Blank(&'static str),
    /// A serialized stack payload could not be decoded.
    Deserialize(String),
    /// The payload version is not understood by this build.
    UnsupportedVersion(u32),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::MissingRequired(fields) => write!(
                f,
                "missing required context fields at root bind: {}",
                fields.join(", ")
            ),
            ContextError::Blank(field) => write!(f, "context field {field} must not be blank"),
            ContextError::Deserialize(detail) => {
                write!(f, "invalid serialized context stack: {detail}")
            }
            ContextError::UnsupportedVersion(version) => {
                write!(f, "unsupported context stack version: {version}")
            }
        }
    }
}

impl std::error::Error for ContextError {}

/// Immutable context frame propagated alongside each log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    /// Logical service emitting the events
    pub service: String,
    /// Deployment environment (`dev`, `staging`, `prod`, ...)
    pub environment: String,
    /// Job or task identifier scoping this unit of work
    pub job_id: String,
    /// Correlation id of the inbound request, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Acting user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Resolved login name of the process owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Short hostname without domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Distributed tracing trace id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Distributed tracing span id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    /// PID of the process that bound this frame
    pub process_id: u32,
    /// Ancestor PID lineage ending with `process_id`, at most
    /// [`MAX_PID_CHAIN`] entries
    pub process_id_chain: Vec<u32>,
    /// Caller-supplied metadata merged into every event
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl LogContext {
    /// Render the PID lineage as `pid1>pid2>…` for templates and sinks.
    pub fn chain_display(&self) -> String {
        self.process_id_chain
            .iter()
            .map(|pid| pid.to_string())
            .collect::<Vec<_>>()
            .join(">")
    }

    /// Return a copy with missing identity fields filled in.
    ///
    /// Explicitly bound values win; only `None` fields are populated.
    pub fn filled_with(&self, user_name: Option<&str>, hostname: Option<&str>) -> LogContext {
        let mut ctx = self.clone();
        if ctx.user_name.is_none() {
            ctx.user_name = user_name.map(str::to_owned);
        }
        if ctx.hostname.is_none() {
            ctx.hostname = hostname.map(str::to_owned);
        }
        ctx
    }

    /// Deterministic `key=value` pairs of every populated field.
    ///
    /// Used by dump templates; map-valued fields are rendered as compact
    /// JSON so the output stays single-line.
    pub fn display_fields(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = vec![
            ("environment".into(), self.environment.clone()),
            ("job_id".into(), self.job_id.clone()),
            ("process_id".into(), self.process_id.to_string()),
            ("process_id_chain".into(), self.chain_display()),
            ("service".into(), self.service.clone()),
        ];
        let optional = [
            ("hostname", &self.hostname),
            ("request_id", &self.request_id),
            ("span_id", &self.span_id),
            ("trace_id", &self.trace_id),
            ("user_id", &self.user_id),
            ("user_name", &self.user_name),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                fields.push((name.to_string(), value.clone()));
            }
        }
        for (key, value) in &self.extra {
            fields.push((key.clone(), value_display(value)));
        }
        fields.sort();
        fields
    }

    fn merge(&self, fields: &ContextFields) -> LogContext {
        let mut ctx = self.clone();
        if let Some(service) = &fields.service {
            ctx.service = service.clone();
        }
        if let Some(environment) = &fields.environment {
            ctx.environment = environment.clone();
        }
        if let Some(job_id) = &fields.job_id {
            ctx.job_id = job_id.clone();
        }
        merge_option(&mut ctx.request_id, &fields.request_id);
        merge_option(&mut ctx.user_id, &fields.user_id);
        merge_option(&mut ctx.user_name, &fields.user_name);
        merge_option(&mut ctx.hostname, &fields.hostname);
        merge_option(&mut ctx.trace_id, &fields.trace_id);
        merge_option(&mut ctx.span_id, &fields.span_id);
        for (key, value) in &fields.extra {
            ctx.extra.insert(key.clone(), value.clone());
        }
        ctx
    }

    /// Record `pid` as the owning process, appending to the lineage when
    /// the frame crossed a process boundary.
    fn adopted_by(&self, pid: u32) -> LogContext {
        let mut ctx = self.clone();
        if ctx.process_id != pid || ctx.process_id_chain.last() != Some(&pid) {
            ctx.process_id = pid;
            if ctx.process_id_chain.last() != Some(&pid) {
                ctx.process_id_chain.push(pid);
                while ctx.process_id_chain.len() > MAX_PID_CHAIN {
                    ctx.process_id_chain.remove(0);
                }
            }
        }
        ctx
    }
}

fn merge_option(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *slot = Some(value.clone());
    }
}

fn value_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn validated(name: &'static str, value: String) -> Result<String, ContextError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ContextError::Blank(name));
    }
    Ok(trimmed.to_string())
}

/// Field overrides passed to [`ContextBinder::bind`].
///
/// The first bind on a thread must carry `service`, `environment`, and
/// `job_id`; nested binds can overlay any subset.
///
/// ```
/// use logfan::domain::ContextFields;
///
/// let fields = ContextFields::new()
///     .service("billing")
///     .environment("prod")
///     .job_id("nightly-42")
///     .request_id("req-1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextFields {
    service: Option<String>,
    environment: Option<String>,
    job_id: Option<String>,
    request_id: Option<String>,
    user_id: Option<String>,
    user_name: Option<String>,
    hostname: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    extra: BTreeMap<String, Value>,
}

impl ContextFields {
    /// Empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service identifier.
    pub fn service(mut self, value: impl Into<String>) -> Self {
        self.service = Some(value.into());
        self
    }

    /// Set the deployment environment.
    pub fn environment(mut self, value: impl Into<String>) -> Self {
        self.environment = Some(value.into());
        self
    }

    /// Set the job identifier.
    pub fn job_id(mut self, value: impl Into<String>) -> Self {
        self.job_id = Some(value.into());
        self
    }

    /// Set the request correlation id.
    pub fn request_id(mut self, value: impl Into<String>) -> Self {
        self.request_id = Some(value.into());
        self
    }

    /// Set the acting user id.
    pub fn user_id(mut self, value: impl Into<String>) -> Self {
        self.user_id = Some(value.into());
        self
    }

    /// Set the resolved user name.
    pub fn user_name(mut self, value: impl Into<String>) -> Self {
        self.user_name = Some(value.into());
        self
    }

    /// Set the short hostname.
    pub fn hostname(mut self, value: impl Into<String>) -> Self {
        self.hostname = Some(value.into());
        self
    }

    /// Set the distributed tracing trace id.
    pub fn trace_id(mut self, value: impl Into<String>) -> Self {
        self.trace_id = Some(value.into());
        self
    }

    /// Set the distributed tracing span id.
    pub fn span_id(mut self, value: impl Into<String>) -> Self {
        self.span_id = Some(value.into());
        self
    }

    /// Attach one metadata entry; later entries with the same key win.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Fill `service` only when the caller left it unset.
    ///
    /// The runtime façade seeds root binds with the configured identity
    /// so callers only need to supply `job_id`.
    pub(crate) fn default_service(mut self, service: &str) -> Self {
        if self.service.is_none() {
            self.service = Some(service.to_string());
        }
        self
    }

    /// Fill `environment` only when the caller left it unset.
    pub(crate) fn default_environment(mut self, environment: &str) -> Self {
        if self.environment.is_none() {
            self.environment = Some(environment.to_string());
        }
        self
    }

    fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let slots = [
            (&self.service, REQUIRED_FIELDS[0]),
            (&self.environment, REQUIRED_FIELDS[1]),
            (&self.job_id, REQUIRED_FIELDS[2]),
        ];
        for (slot, name) in slots {
            if slot.is_none() {
                missing.push(name);
            }
        }
        missing
    }
}

#[derive(Serialize, Deserialize)]
struct SerializedStack {
    version: u32,
    stack: Vec<LogContext>,
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<LogContext>> = const { RefCell::new(Vec::new()) };
}

/// Manages the per-thread stack of [`LogContext`] frames.
///
/// The binder itself carries no state; frames live in thread-local storage
/// so each thread (and each rehydrated subprocess) sees only its own stack.
#[derive(Debug, Default)]
pub struct ContextBinder {
    _private: (),
}

impl ContextBinder {
    /// Create a binder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame for the current scope.
    ///
    /// Returns a guard that pops the frame when dropped, on every exit
    /// path. The first bind on a thread must provide the mandatory
    /// identity fields; nested binds inherit the parent frame.
    pub fn bind(&self, fields: ContextFields) -> Result<ContextScope, ContextError> {
        let pid = std::process::id();
        let context = CONTEXT_STACK.with(|stack| {
            let parent = stack.borrow().last().cloned();
            let context = match parent {
                None => Self::root_context(&fields, pid)?,
                Some(parent) => parent.merge(&fields).adopted_by(pid),
            };
            stack.borrow_mut().push(context.clone());
            Ok(context)
        })?;
        Ok(ContextScope {
            context,
            _not_send: PhantomData,
        })
    }

    /// The frame bound to the current thread, if any.
    pub fn current(&self) -> Option<LogContext> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Number of frames bound to the current thread.
    pub fn depth(&self) -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Serialize the current thread's stack for subprocess hand-off.
    pub fn serialize(&self) -> String {
        let stack = CONTEXT_STACK.with(|stack| stack.borrow().clone());
        let payload = SerializedStack { version: 1, stack };
        serde_json::to_string(&payload).unwrap_or_else(|_| "{\"version\":1,\"stack\":[]}".into())
    }

    /// Replace the current thread's stack with a serialized payload.
    ///
    /// The child PID is appended by the next [`bind`](Self::bind), never
    /// here, so hydration alone leaves the lineage untouched.
    pub fn deserialize(&self, payload: &str) -> Result<(), ContextError> {
        let decoded: SerializedStack =
            serde_json::from_str(payload).map_err(|err| ContextError::Deserialize(err.to_string()))?;
        if decoded.version != 1 {
            return Err(ContextError::UnsupportedVersion(decoded.version));
        }
        CONTEXT_STACK.with(|stack| *stack.borrow_mut() = decoded.stack);
        Ok(())
    }

    /// Drop every frame bound to the current thread.
    pub fn clear(&self) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().clear());
    }

    fn root_context(fields: &ContextFields, pid: u32) -> Result<LogContext, ContextError> {
        let missing = fields.missing_required();
        if !missing.is_empty() {
            return Err(ContextError::MissingRequired(missing));
        }
        let service = validated("service", fields.service.clone().unwrap_or_default())?;
        let environment = validated("environment", fields.environment.clone().unwrap_or_default())?;
        let job_id = validated("job_id", fields.job_id.clone().unwrap_or_default())?;
        Ok(LogContext {
            service,
            environment,
            job_id,
            request_id: fields.request_id.clone(),
            user_id: fields.user_id.clone(),
            user_name: fields.user_name.clone(),
            hostname: fields.hostname.clone(),
            trace_id: fields.trace_id.clone(),
            span_id: fields.span_id.clone(),
            process_id: pid,
            process_id_chain: vec![pid],
            extra: fields.extra.clone(),
        })
    }
}

/// Guard returned by [`ContextBinder::bind`]; pops its frame on drop.
///
/// Not `Send`: frames belong to the thread that bound them.
pub struct ContextScope {
    context: LogContext,
    _not_send: PhantomData<*const ()>,
}

impl ContextScope {
    /// The frame this scope bound.
    pub fn context(&self) -> &LogContext {
        &self.context
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope")
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_fields() -> ContextFields {
        ContextFields::new()
            .service("svc")
            .environment("dev")
            .job_id("job-1")
    }

    #[test]
    fn test_root_bind_requires_identity_fields() {
        let binder = ContextBinder::new();
        let err = binder.bind(ContextFields::new().service("svc")).unwrap_err();
        assert_eq!(
            err,
            ContextError::MissingRequired(vec!["environment", "job_id"])
        );
        assert!(binder.current().is_none());
    }

    #[test]
    fn test_root_bind_rejects_blank_fields() {
        let binder = ContextBinder::new();
        let err = binder
            .bind(root_fields().service("   "))
            .unwrap_err();
        assert_eq!(err, ContextError::Blank("service"));
    }

    #[test]
    fn test_bind_seeds_pid_chain() {
        let binder = ContextBinder::new();
        let scope = binder.bind(root_fields()).unwrap();
        let pid = std::process::id();
        assert_eq!(scope.context().process_id, pid);
        assert_eq!(scope.context().process_id_chain, vec![pid]);
    }

    #[test]
    fn test_nested_bind_inherits_and_overlays() {
        let binder = ContextBinder::new();
        let _root = binder.bind(root_fields().request_id("req-1")).unwrap();
        {
            let nested = binder
                .bind(ContextFields::new().job_id("job-2").extra("k", 1))
                .unwrap();
            let ctx = nested.context();
            assert_eq!(ctx.service, "svc");
            assert_eq!(ctx.job_id, "job-2");
            assert_eq!(ctx.request_id.as_deref(), Some("req-1"));
            assert_eq!(ctx.extra.get("k"), Some(&serde_json::json!(1)));
            assert_eq!(binder.depth(), 2);
        }
        assert_eq!(binder.depth(), 1);
        assert_eq!(binder.current().unwrap().job_id, "job-1");
    }

    #[test]
    fn test_scope_pops_on_panic() {
        let binder = ContextBinder::new();
        let _root = binder.bind(root_fields()).unwrap();
        let result = std::panic::catch_unwind(|| {
            let _nested = ContextBinder::new()
                .bind(ContextFields::new().job_id("doomed"))
                .unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(binder.depth(), 1);
    }

    #[test]
    fn test_threads_see_independent_stacks() {
        let binder = ContextBinder::new();
        let _root = binder.bind(root_fields()).unwrap();
        let handle = std::thread::spawn(|| ContextBinder::new().current().is_none());
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let binder = ContextBinder::new();
        let _root = binder.bind(root_fields().user_id("u-1")).unwrap();
        let payload = binder.serialize();

        // Hydrate on a fresh thread to model a subprocess.
        let handle = std::thread::spawn(move || {
            let binder = ContextBinder::new();
            binder.deserialize(&payload).unwrap();
            let restored = binder.current().unwrap();
            assert_eq!(restored.service, "svc");
            assert_eq!(restored.user_id.as_deref(), Some("u-1"));
            binder.depth()
        });
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn test_bind_after_hydration_appends_pid_once() {
        let binder = ContextBinder::new();
        // Fabricate a stack that looks like it came from a parent process.
        let parent = LogContext {
            service: "svc".into(),
            environment: "dev".into(),
            job_id: "job-1".into(),
            request_id: None,
            user_id: None,
            user_name: None,
            hostname: None,
            trace_id: None,
            span_id: None,
            process_id: 4242,
            process_id_chain: vec![4242],
            extra: BTreeMap::new(),
        };
        let payload = serde_json::to_string(&SerializedStack {
            version: 1,
            stack: vec![parent],
        })
        .unwrap();
        binder.deserialize(&payload).unwrap();

        let pid = std::process::id();
        let first = binder.bind(ContextFields::new()).unwrap();
        assert_eq!(first.context().process_id, pid);
        assert_eq!(first.context().process_id_chain, vec![4242, pid]);

        // A second nested bind must not append the PID again.
        let second = binder.bind(ContextFields::new()).unwrap();
        assert_eq!(second.context().process_id_chain, vec![4242, pid]);
        drop(second);
        drop(first);
        binder.clear();
    }

    #[test]
    fn test_pid_chain_bounded() {
        let mut ctx = LogContext {
            service: "svc".into(),
            environment: "dev".into(),
            job_id: "job".into(),
            request_id: None,
            user_id: None,
            user_name: None,
            hostname: None,
            trace_id: None,
            span_id: None,
            process_id: 1,
            process_id_chain: (1..=MAX_PID_CHAIN as u32).collect(),
            extra: BTreeMap::new(),
        };
        ctx = ctx.adopted_by(99);
        assert_eq!(ctx.process_id_chain.len(), MAX_PID_CHAIN);
        assert_eq!(*ctx.process_id_chain.last().unwrap(), 99);
        assert_eq!(ctx.process_id_chain[0], 2);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let binder = ContextBinder::new();
        assert!(matches!(
            binder.deserialize("not json"),
            Err(ContextError::Deserialize(_))
        ));
        assert!(matches!(
            binder.deserialize("{\"version\":9,\"stack\":[]}"),
            Err(ContextError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_chain_display() {
        let ctx = LogContext {
            service: "svc".into(),
            environment: "dev".into(),
            job_id: "job".into(),
            request_id: None,
            user_id: None,
            user_name: None,
            hostname: None,
            trace_id: None,
            span_id: None,
            process_id: 3,
            process_id_chain: vec![1, 2, 3],
            extra: BTreeMap::new(),
        };
        assert_eq!(ctx.chain_display(), "1>2>3");
    }
}
