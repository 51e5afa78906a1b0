//! End-to-end dispatcher behavior against in-process backends.

use async_trait::async_trait;
use mcpweb_gateway::adapter::{BackendChannel, InlineAdapter};
use mcpweb_gateway::{
    AdapterSet, Connection, DetachedPrompts, Endpoint, Gateway, GatewayContext, GatewayError,
    InlineBackend, PromptAction, PromptHandle, PromptOutcome, PromptRequest, ProtocolAdapter,
    ProtocolKind, ServiceDescriptor,
};
use mcpweb_protocol::{Operation, ServiceView};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Result<T> = std::result::Result<T, GatewayError>;

/// Key-value backend with canned search hits.
struct KvService {
    name: String,
    instructions: String,
    resources: Vec<String>,
    data: HashMap<String, Value>,
    hits: HashMap<String, Vec<String>>,
    searchable: bool,
    reads: AtomicUsize,
}

impl KvService {
    fn email() -> Self {
        let mut data = HashMap::new();
        data.insert("/inbox".to_string(), json!({"total_threads": 2}));
        data.insert(
            "/thread/thread_002".to_string(),
            json!({"subject": "Budget Review Q1"}),
        );
        let mut hits = HashMap::new();
        hits.insert("budget".to_string(), vec!["/thread/thread_002".to_string()]);
        Self {
            name: "email".to_string(),
            instructions: "Email management service".to_string(),
            resources: vec!["/inbox".to_string(), "/thread/thread_002".to_string()],
            data,
            hits,
            searchable: true,
            reads: AtomicUsize::new(0),
        }
    }

    fn calendar() -> Self {
        let mut data = HashMap::new();
        data.insert("/today".to_string(), json!({"events": []}));
        Self {
            name: "calendar".to_string(),
            instructions: "Calendar service".to_string(),
            resources: vec!["/today".to_string()],
            data,
            hits: HashMap::new(),
            searchable: true,
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InlineBackend for KvService {
    fn instructions(&self) -> String {
        self.instructions.clone()
    }

    fn resources(&self) -> Vec<String> {
        self.resources.clone()
    }

    fn searchable(&self) -> bool {
        self.searchable
    }

    async fn read(&self, path: &str, _ctx: &GatewayContext) -> Result<Value> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.data.get(path).cloned().ok_or_else(|| GatewayError::Protocol {
            service: self.name.clone(),
            details: format!("no resource at {path}"),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.hits.get(query).cloned().unwrap_or_default())
    }

    async fn invoke(&self, action: &str, path: &str, _ctx: &GatewayContext) -> Result<Value> {
        Ok(json!({"status": "done", "action": action, "path": path}))
    }
}

/// Backend whose read re-enters the gateway for another service.
struct RelayService {
    target: String,
    invoked: AtomicUsize,
}

impl RelayService {
    fn to(target: &str) -> Self {
        Self {
            target: target.to_string(),
            invoked: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InlineBackend for RelayService {
    fn instructions(&self) -> String {
        format!("relays reads to {}", self.target)
    }

    fn resources(&self) -> Vec<String> {
        vec!["/relay".to_string()]
    }

    async fn read(&self, _path: &str, ctx: &GatewayContext) -> Result<Value> {
        self.invoked.fetch_add(1, Ordering::SeqCst);
        ctx.get(&self.target).await
    }

    async fn search(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn invoke(&self, _action: &str, _path: &str, _ctx: &GatewayContext) -> Result<Value> {
        Ok(Value::Null)
    }
}

/// Backend that fans out to several services from one handler.
struct FanService {
    targets: Vec<String>,
}

#[async_trait]
impl InlineBackend for FanService {
    fn instructions(&self) -> String {
        "fans out".to_string()
    }

    fn resources(&self) -> Vec<String> {
        vec!["/all".to_string()]
    }

    async fn read(&self, _path: &str, ctx: &GatewayContext) -> Result<Value> {
        let mut results = Vec::new();
        for target in &self.targets {
            results.push(ctx.get(target).await?);
        }
        Ok(Value::Array(results))
    }

    async fn search(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn invoke(&self, _action: &str, _path: &str, _ctx: &GatewayContext) -> Result<Value> {
        Ok(Value::Null)
    }
}

/// Backend whose action prompts the originating session.
struct ReplyService;

#[async_trait]
impl InlineBackend for ReplyService {
    fn instructions(&self) -> String {
        "replies with elicitation".to_string()
    }

    fn resources(&self) -> Vec<String> {
        vec!["/thread/42".to_string()]
    }

    async fn read(&self, _path: &str, _ctx: &GatewayContext) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn search(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn invoke(&self, action: &str, path: &str, ctx: &GatewayContext) -> Result<Value> {
        let outcome = ctx
            .prompt(PromptRequest {
                message: format!("Provide details for '{action}' on {path}"),
                schema: json!({"type": "object", "properties": {"content": {"type": "string"}}}),
            })
            .await?;
        match outcome.action {
            PromptAction::Accept => Ok(json!({"status": "sent", "reply": outcome.content})),
            _ => Ok(json!({"status": "cancelled"})),
        }
    }
}

struct CannedPrompts {
    last: Mutex<Option<PromptRequest>>,
}

impl CannedPrompts {
    fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PromptHandle for CannedPrompts {
    async fn elicit(&self, request: PromptRequest) -> Result<PromptOutcome> {
        *self.last.lock().unwrap() = Some(request);
        Ok(PromptOutcome {
            action: PromptAction::Accept,
            content: Some(json!({"content": "sounds good"})),
        })
    }
}

/// Adapter that can be told to refuse connects and drop requests; delegates
/// everything else to the inline behavior.
struct FlakyAdapter {
    backend: Arc<KvService>,
    fail_connects: AtomicUsize,
    fail_gets: AtomicUsize,
    inner: InlineAdapter,
}

impl FlakyAdapter {
    fn new(backend: Arc<KvService>, fail_connects: usize, fail_gets: usize) -> Self {
        Self {
            backend,
            fail_connects: AtomicUsize::new(fail_connects),
            fail_gets: AtomicUsize::new(fail_gets),
            inner: InlineAdapter::new(&[]),
        }
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ProtocolAdapter for FlakyAdapter {
    async fn connect(&self, descriptor: &ServiceDescriptor) -> Result<BackendChannel> {
        if Self::take(&self.fail_connects) {
            return Err(GatewayError::ServiceUnavailable {
                service: descriptor.name.clone(),
                reason: "dial refused".to_string(),
            });
        }
        Ok(BackendChannel::Inline(
            self.backend.clone() as Arc<dyn InlineBackend>
        ))
    }

    async fn list(&self, conn: &Connection) -> Result<Vec<String>> {
        self.inner.list(conn).await
    }

    async fn view(&self, conn: &Connection) -> Result<ServiceView> {
        self.inner.view(conn).await
    }

    async fn get(&self, conn: &Connection, path: &str, ctx: &GatewayContext) -> Result<Value> {
        if Self::take(&self.fail_gets) {
            return Err(GatewayError::ServiceUnavailable {
                service: conn.service.clone(),
                reason: "connection reset".to_string(),
            });
        }
        self.inner.get(conn, path, ctx).await
    }

    async fn find(&self, conn: &Connection, query: &str) -> Result<Vec<String>> {
        self.inner.find(conn, query).await
    }

    async fn post(&self, conn: &Connection, path: &str, ctx: &GatewayContext) -> Result<Value> {
        self.inner.post(conn, path, ctx).await
    }
}

fn stdio_descriptor(name: &str) -> ServiceDescriptor {
    ServiceDescriptor {
        name: name.to_string(),
        protocol: ProtocolKind::Mcp,
        endpoint: Endpoint::Stdio {
            command: "unused".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        },
    }
}

fn detached(gateway: &Arc<Gateway>) -> GatewayContext {
    gateway.context(Arc::new(DetachedPrompts))
}

#[tokio::test]
async fn list_returns_configured_names_in_order() {
    let gateway = Gateway::builder()
        .mount("email", Arc::new(KvService::email()))
        .mount("calendar", Arc::new(KvService::calendar()))
        .build()
        .unwrap();
    let ctx = detached(&gateway);
    assert_eq!(ctx.list(), vec!["email", "calendar"]);
    // Idempotent without reconfiguration.
    assert_eq!(ctx.list(), vec!["email", "calendar"]);
}

#[tokio::test]
async fn unknown_service_fails_uniformly() {
    let gateway = Gateway::builder()
        .mount("email", Arc::new(KvService::email()))
        .build()
        .unwrap();
    let ctx = detached(&gateway);

    let err = ctx.view("docs").await.unwrap_err();
    assert_eq!(err.kind(), "unknown_service");
    let err = ctx.get("mcpweb://docs/page/1").await.unwrap_err();
    assert_eq!(err.kind(), "unknown_service");
    let err = ctx.find("docs", "budget").await.unwrap_err();
    assert_eq!(err.kind(), "unknown_service");
    let err = ctx.post("mcpweb://docs/page/1/save").await.unwrap_err();
    assert_eq!(err.kind(), "unknown_service");
}

#[tokio::test]
async fn find_results_are_full_identifiers() {
    let gateway = Gateway::builder()
        .mount("email", Arc::new(KvService::email()))
        .build()
        .unwrap();
    let ctx = detached(&gateway);

    let results = ctx.find("email", "budget").await.unwrap();
    assert_eq!(results, vec!["mcpweb://email/thread/thread_002"]);
    assert!(results.iter().all(|uri| uri.starts_with("mcpweb://email/")));

    // No hits is an empty list, not an error.
    assert!(ctx.find("email", "nothing").await.unwrap().is_empty());
}

#[tokio::test]
async fn view_reports_instructions_and_full_resource_identifiers() {
    let gateway = Gateway::builder()
        .mount("email", Arc::new(KvService::email()))
        .build()
        .unwrap();
    let view = detached(&gateway).view("email").await.unwrap();
    assert_eq!(view.service, "email");
    assert_eq!(view.instructions, "Email management service");
    assert!(view
        .resources
        .contains(&"mcpweb://email/inbox".to_string()));
}

#[tokio::test]
async fn get_and_post_round_trip() {
    let gateway = Gateway::builder()
        .mount("email", Arc::new(KvService::email()))
        .build()
        .unwrap();
    let ctx = detached(&gateway);

    let inbox = ctx.get("mcpweb://email/inbox").await.unwrap();
    assert_eq!(inbox, json!({"total_threads": 2}));

    let result = ctx
        .post("mcpweb://email/thread/thread_002/reply")
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({"status": "done", "action": "reply", "path": "/thread/thread_002"})
    );

    let err = ctx.get("email/inbox").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_uri");
}

#[tokio::test]
async fn cross_service_cycle_fails_before_reentry() {
    let a = Arc::new(RelayService::to("mcpweb://b/relay"));
    let b = Arc::new(RelayService::to("mcpweb://a/relay"));
    let gateway = Gateway::builder()
        .mount("a", a.clone())
        .mount("b", b.clone())
        .build()
        .unwrap();

    let err = detached(&gateway)
        .get("mcpweb://a/relay")
        .await
        .unwrap_err();
    match &err {
        GatewayError::CrossServiceCycle { service, chain } => {
            assert_eq!(service, "a");
            assert_eq!(chain, &["a", "b"]);
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
    // The second call never reached service a's backend.
    assert_eq!(a.invoked.load(Ordering::SeqCst), 1);
    assert_eq!(b.invoked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sibling_sub_calls_do_not_interfere() {
    let gateway = Gateway::builder()
        .mount(
            "hub",
            Arc::new(FanService {
                targets: vec![
                    "mcpweb://email/inbox".to_string(),
                    "mcpweb://calendar/today".to_string(),
                ],
            }),
        )
        .mount("email", Arc::new(KvService::email()))
        .mount("calendar", Arc::new(KvService::calendar()))
        .build()
        .unwrap();

    let value = detached(&gateway).get("mcpweb://hub/all").await.unwrap();
    assert_eq!(
        value,
        json!([{"total_threads": 2}, {"events": []}])
    );
}

#[tokio::test]
async fn acyclic_depth_is_bounded() {
    let gateway = Gateway::builder()
        .mount("a", Arc::new(RelayService::to("mcpweb://b/relay")))
        .mount("b", Arc::new(RelayService::to("mcpweb://c/relay")))
        .mount("c", Arc::new(RelayService::to("mcpweb://d/relay")))
        .mount("d", Arc::new(KvService::calendar()))
        .max_call_depth(2)
        .build()
        .unwrap();

    let err = detached(&gateway)
        .get("mcpweb://a/relay")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "call_depth_exceeded");
}

#[tokio::test]
async fn search_not_supported_is_distinct_from_faults() {
    let mut service = KvService::email();
    service.name = "notes".to_string();
    service.searchable = false;
    let gateway = Gateway::builder()
        .mount("notes", Arc::new(service))
        .build()
        .unwrap();

    let err = detached(&gateway).find("notes", "anything").await.unwrap_err();
    assert_eq!(err.kind(), "search_not_supported");
}

#[tokio::test]
async fn failed_connection_is_never_reused() {
    let backend = Arc::new(KvService::email());
    let gateway = Gateway::builder()
        .descriptor(stdio_descriptor("email"))
        .adapters(AdapterSet::default().with(
            ProtocolKind::Mcp,
            Arc::new(FlakyAdapter::new(backend, 1, 0)),
        ))
        .build()
        .unwrap();
    let ctx = detached(&gateway);

    let err = ctx.get("mcpweb://email/inbox").await.unwrap_err();
    assert_eq!(err.kind(), "service_unavailable");
    assert_eq!(gateway.connections().status("email").as_str(), "failed");
    assert_eq!(gateway.connections().attempts("email"), 1);

    // The next acquire dials fresh instead of reusing the failed slot.
    let inbox = ctx.get("mcpweb://email/inbox").await.unwrap();
    assert_eq!(inbox, json!({"total_threads": 2}));
    assert_eq!(gateway.connections().status("email").as_str(), "ready");
    assert_eq!(gateway.connections().attempts("email"), 2);
}

#[tokio::test]
async fn transport_error_during_use_poisons_only_that_service() {
    let email = Arc::new(KvService::email());
    let calendar = Arc::new(KvService::calendar());
    let gateway = Gateway::builder()
        .descriptor(stdio_descriptor("email"))
        .adapters(AdapterSet::default().with(
            ProtocolKind::Mcp,
            Arc::new(FlakyAdapter::new(email, 0, 1)),
        ))
        .mount("calendar", calendar)
        .build()
        .unwrap();
    let ctx = detached(&gateway);

    let err = ctx.get("mcpweb://email/inbox").await.unwrap_err();
    assert_eq!(err.kind(), "service_unavailable");
    assert_eq!(gateway.connections().status("email").as_str(), "failed");

    // Isolation: the other service is untouched by the failure.
    let today = ctx.get("mcpweb://calendar/today").await.unwrap();
    assert_eq!(today, json!({"events": []}));
    assert_eq!(gateway.connections().status("calendar").as_str(), "ready");

    // And the poisoned service recovers on the next request.
    let inbox = ctx.get("mcpweb://email/inbox").await.unwrap();
    assert_eq!(inbox, json!({"total_threads": 2}));
    assert_eq!(gateway.connections().attempts("email"), 2);
}

#[tokio::test]
async fn actions_prompt_through_the_originating_session() {
    let gateway = Gateway::builder()
        .mount("email", Arc::new(ReplyService))
        .build()
        .unwrap();
    let prompts = Arc::new(CannedPrompts::new());
    let ctx = gateway.context(prompts.clone());

    let result = ctx.post("mcpweb://email/thread/42/reply").await.unwrap();
    assert_eq!(
        result,
        json!({"status": "sent", "reply": {"content": "sounds good"}})
    );

    let seen = prompts.last.lock().unwrap().clone().unwrap();
    assert!(seen.message.contains("/thread/42"));
}

#[tokio::test]
async fn adapter_list_reports_backend_introspection() {
    let backend: Arc<dyn InlineBackend> = Arc::new(KvService::email());
    let adapter = InlineAdapter::new(&[("email".to_string(), backend.clone())]);
    let descriptor = ServiceDescriptor {
        name: "email".to_string(),
        protocol: ProtocolKind::Inline,
        endpoint: Endpoint::Inline,
    };
    let channel = adapter.connect(&descriptor).await.unwrap();
    let conn = Connection {
        service: "email".to_string(),
        channel,
    };
    assert_eq!(adapter.list(&conn).await.unwrap(), backend.resources());
}

#[tokio::test]
async fn request_dispatches_all_operations() {
    let gateway = Gateway::builder()
        .mount("email", Arc::new(KvService::email()))
        .build()
        .unwrap();
    let ctx = detached(&gateway);

    let services = ctx
        .request(Operation::List, "mcpweb://", None)
        .await
        .unwrap();
    assert_eq!(services, json!(["email"]));

    let view = ctx
        .request(Operation::View, "mcpweb://email", None)
        .await
        .unwrap();
    assert_eq!(view["service"], "email");

    let found = ctx
        .request(Operation::Find, "email/", Some("budget"))
        .await
        .unwrap();
    assert_eq!(found, json!(["mcpweb://email/thread/thread_002"]));

    let err = ctx
        .request(Operation::Find, "email/", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");

    let inbox = ctx
        .request(Operation::Get, "mcpweb://email/inbox", None)
        .await
        .unwrap();
    assert_eq!(inbox, json!({"total_threads": 2}));
}
