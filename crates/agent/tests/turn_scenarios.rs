use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use concierge_agent::{
    AgentDefinition, AgentOrchestrator, AgentProfile, DiscoveryCoordinator, EventPart,
    EventStream, ExecutionRuntime, NoopExecutionRuntime, RunRequest, RuntimeError, RuntimeEvent,
    SessionStore, SourceRegistration, TurnOutcome,
};
use concierge_agent::availability::SourceProfile;
use concierge_core::{
    AppConfig, CapabilityDescriptor, MessageRole, SourceKey, SourceKind, TurnError,
};
use concierge_remote::{CapabilitySource, RemoteError, RemoteResult};
use concierge_ui::{StatusLevel, TextVariant, UiComponent, UiMessage};
use serde_json::{json, Value};
use tokio::sync::mpsc;

struct FakeSource {
    kind: SourceKind,
    address: String,
    descriptors: Option<Vec<CapabilityDescriptor>>,
}

#[async_trait]
impl CapabilitySource for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn discover(&self) -> RemoteResult<Vec<CapabilityDescriptor>> {
        self.descriptors.clone().ok_or_else(|| RemoteError::Transport {
            endpoint: self.address.clone(),
            message: "connection refused".to_string(),
        })
    }

    async fn invoke(&self, _capability_id: &str, args: Value) -> RemoteResult<Value> {
        Ok(args)
    }
}

fn search_source() -> SourceRegistration {
    let descriptor = CapabilityDescriptor::new("search-hotels", SourceKind::Primary)
        .with_description("Search hotels by destination")
        .with_input_schema(json!({
            "type": "object",
            "properties": {"destination": {"type": "string"}},
            "required": ["destination"]
        }));
    SourceRegistration {
        profile: SourceProfile::for_key(SourceKey::HotelTools),
        enabled: true,
        client: Arc::new(FakeSource {
            kind: SourceKind::Primary,
            address: "http://search.internal:8081".to_string(),
            descriptors: Some(vec![descriptor]),
        }),
    }
}

fn unreachable_booking_source() -> SourceRegistration {
    SourceRegistration {
        profile: SourceProfile::for_key(SourceKey::Booking),
        enabled: true,
        client: Arc::new(FakeSource {
            kind: SourceKind::Skill,
            address: "http://booking.internal:8082".to_string(),
            descriptors: None,
        }),
    }
}

#[derive(Default)]
struct ScriptedRuntime {
    script: Mutex<Vec<Result<RuntimeEvent, RuntimeError>>>,
    reject_prepare: AtomicBool,
    step_delay: Option<Duration>,
    starts: AtomicUsize,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    requests: Mutex<Vec<RunRequest>>,
}

impl ScriptedRuntime {
    fn with_script(script: Vec<Result<RuntimeEvent, RuntimeError>>) -> Self {
        Self { script: Mutex::new(script), ..Self::default() }
    }
}

#[async_trait]
impl ExecutionRuntime for ScriptedRuntime {
    async fn prepare_agent(&self, _definition: &AgentDefinition) -> Result<(), RuntimeError> {
        if self.reject_prepare.load(Ordering::SeqCst) {
            return Err(RuntimeError::Prepare("model rejected tool set".to_string()));
        }
        Ok(())
    }

    async fn start(
        &self,
        _definition: Arc<AgentDefinition>,
        request: RunRequest,
    ) -> Result<EventStream, RuntimeError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("requests lock").push(request);
        let script = self.script.lock().expect("script lock").clone();
        let (tx, rx) = mpsc::channel(16);

        let active = Arc::clone(&self.active);
        let max_active = Arc::clone(&self.max_active);
        let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
        max_active.fetch_max(now_active, Ordering::SeqCst);
        let delay = self.step_delay;
        tokio::spawn(async move {
            for event in script {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(rx)
    }
}

fn three_hotels() -> Value {
    json!({
        "destination": "paris",
        "hotels": [
            {"name": "Le Meurice", "rating": 4.8, "pricePerNight": 650, "description": "Palace hotel"},
            {"name": "Hotel Lutetia", "rating": 4.6, "pricePerNight": 480, "description": "Left bank"},
            {"name": "Generator Paris", "rating": 4.0, "pricePerNight": 90, "description": "Hostel"}
        ]
    })
}

fn tool_response(payload: Value) -> Result<RuntimeEvent, RuntimeError> {
    Ok(RuntimeEvent::from_parts(vec![
        EventPart::FunctionCall {
            name: "searchHotels".to_string(),
            args: json!({"destination": "paris"}),
        },
        EventPart::FunctionResponse { name: "searchHotels".to_string(), response: payload },
    ]))
}

async fn orchestrator_with(
    registrations: Vec<SourceRegistration>,
    runtime: Arc<dyn ExecutionRuntime>,
) -> Arc<AgentOrchestrator> {
    let coordinator = Arc::new(DiscoveryCoordinator::new(registrations));
    let orchestrator = AgentOrchestrator::new(
        Arc::clone(&coordinator),
        runtime,
        AgentProfile::from_config(&AppConfig::default().agent),
    );
    orchestrator.attach().await;
    coordinator.poll_all().await;
    orchestrator
}

fn drain(rx: &mut mpsc::Receiver<UiMessage>) -> Vec<UiMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

fn components(messages: &[UiMessage]) -> Vec<UiComponent> {
    messages
        .iter()
        .filter_map(UiMessage::document)
        .flat_map(|document| document.components().to_vec())
        .collect()
}

#[tokio::test]
async fn search_without_json_keyword_renders_cards() {
    let runtime = Arc::new(ScriptedRuntime::with_script(vec![tool_response(three_hotels())]));
    let orchestrator = orchestrator_with(vec![search_source()], runtime).await;
    let session = SessionStore::new().get_or_create("s-a", "hotel-concierge", "guest");
    let (tx, mut rx) = mpsc::channel(16);

    let outcome = orchestrator
        .process_turn(&session, "search hotels in Paris", &tx)
        .await
        .expect("turn succeeds");

    assert_eq!(outcome, TurnOutcome::FallbackRendered);
    let rendered = components(&drain(&mut rx));
    let cards = rendered.iter().filter(|c| matches!(c, UiComponent::Card { .. })).count();
    assert_eq!(cards, 3);
    assert!(!rendered.iter().any(UiComponent::is_json_tree));
}

#[tokio::test]
async fn search_with_json_keyword_renders_a_single_tree() {
    let runtime = Arc::new(ScriptedRuntime::with_script(vec![
        tool_response(three_hotels()),
        Ok(RuntimeEvent::text("I found three lovely hotels in Paris.")),
    ]));
    let orchestrator = orchestrator_with(vec![search_source()], runtime).await;
    let session = SessionStore::new().get_or_create("s-b", "hotel-concierge", "guest");
    let (tx, mut rx) = mpsc::channel(16);

    orchestrator
        .process_turn(&session, "show hotels in paris in json", &tx)
        .await
        .expect("turn succeeds");

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    let rendered = components(&messages);
    assert_eq!(rendered.iter().filter(|c| c.is_json_tree()).count(), 1);
    assert!(!rendered
        .iter()
        .any(|c| matches!(c, UiComponent::Text { variant: TextVariant::Body, .. })));
    assert!(messages[0].to_value()["__a2ui_direct__"].as_bool().unwrap_or(false));
}

#[tokio::test]
async fn unreachable_booking_source_is_explained_without_running_the_model() {
    let runtime = Arc::new(ScriptedRuntime::default());
    let orchestrator =
        orchestrator_with(vec![search_source(), unreachable_booking_source()], runtime.clone())
            .await;
    for _ in 0..2 {
        orchestrator.coordinator().poll_all().await;
    }
    let session = SessionStore::new().get_or_create("s-c", "hotel-concierge", "guest");
    let (tx, mut rx) = mpsc::channel(16);

    let outcome =
        orchestrator.process_turn(&session, "book a room", &tx).await.expect("turn succeeds");

    assert_eq!(outcome, TurnOutcome::SourcesUnavailable);
    assert_eq!(runtime.starts.load(Ordering::SeqCst), 0);
    let text = match drain(&mut rx).as_slice() {
        [message] => message.to_value().to_string(),
        other => panic!("expected one message, got {other:?}"),
    };
    assert!(text.contains("http://booking.internal:8082"));
    assert!(!text.contains("http://search.internal:8081"));
    assert!(session.lock().await.history.is_empty());
}

#[tokio::test]
async fn narrated_text_is_streamed_and_persisted() {
    let runtime = Arc::new(ScriptedRuntime::with_script(vec![
        tool_response(three_hotels()),
        Ok(RuntimeEvent::text("searchHotels(destination=\"paris\")")),
        Ok(RuntimeEvent::text("Le Meurice is the top pick.")),
    ]));
    let orchestrator = orchestrator_with(vec![search_source()], runtime.clone()).await;
    let session = SessionStore::new().get_or_create("s-n", "hotel-concierge", "guest");
    let (tx, mut rx) = mpsc::channel(16);

    let outcome = orchestrator
        .process_turn(&session, "which hotel is best?", &tx)
        .await
        .expect("turn succeeds");

    assert_eq!(outcome, TurnOutcome::Narrated);
    assert_eq!(drain(&mut rx), vec![UiMessage::text("Le Meurice is the top pick.")]);

    let session = session.lock().await;
    let roles: Vec<MessageRole> = session.history.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::User, MessageRole::Agent]);

    let requests = runtime.requests.lock().expect("requests lock");
    assert_eq!(requests[0].app_name, "hotel-concierge");
    assert_ne!(requests[0].session_id, "s-n");
}

#[tokio::test]
async fn discovery_rebuilds_the_definition_with_tools() {
    let runtime = Arc::new(ScriptedRuntime::default());
    let orchestrator = orchestrator_with(vec![search_source()], runtime).await;

    let definition = orchestrator.current_definition().expect("definition present");
    assert_eq!(definition.tool_names(), vec!["searchHotels"]);
    assert!(definition.version >= 2);
    assert!(definition.instructions.contains("Required: destination."));
}

#[tokio::test]
async fn rejected_rebuild_keeps_the_previous_definition() {
    let runtime = Arc::new(ScriptedRuntime::default());
    let orchestrator = orchestrator_with(vec![search_source()], runtime.clone()).await;
    let before = orchestrator.current_definition().expect("definition present");

    runtime.reject_prepare.store(true, Ordering::SeqCst);
    let result = orchestrator.rebuild().await;

    assert!(matches!(result, Err(RuntimeError::Prepare(_))));
    let after = orchestrator.current_definition().expect("still present");
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn no_definition_reports_initialization() {
    let runtime = Arc::new(ScriptedRuntime::default());
    runtime.reject_prepare.store(true, Ordering::SeqCst);
    let orchestrator = orchestrator_with(vec![search_source()], runtime.clone()).await;
    let session = SessionStore::new().get_or_create("s-i", "hotel-concierge", "guest");
    let (tx, mut rx) = mpsc::channel(16);

    let outcome = orchestrator.process_turn(&session, "hello", &tx).await.expect("turn succeeds");

    assert_eq!(outcome, TurnOutcome::Initializing);
    assert_eq!(runtime.starts.load(Ordering::SeqCst), 0);
    assert!(drain(&mut rx)[0].to_value().to_string().contains("Initialization In Progress"));
}

#[tokio::test]
async fn stream_failure_emits_one_safe_status() {
    let runtime = Arc::new(ScriptedRuntime::with_script(vec![Err(RuntimeError::Stream(
        "upstream reset with secret token abc".to_string(),
    ))]));
    let orchestrator = orchestrator_with(vec![search_source()], runtime).await;
    let session = SessionStore::new().get_or_create("s-e", "hotel-concierge", "guest");
    let (tx, mut rx) = mpsc::channel(16);

    let result = orchestrator.process_turn(&session, "search hotels", &tx).await;

    assert!(matches!(result, Err(TurnError::RuntimeStream(_))));
    let rendered = components(&drain(&mut rx));
    assert_eq!(rendered.len(), 1);
    let UiComponent::Status { message, level } = &rendered[0] else {
        panic!("expected status, got {rendered:?}");
    };
    assert_eq!(*level, StatusLevel::Error);
    assert!(!message.contains("secret"));
}

#[tokio::test]
async fn missing_runtime_fails_to_start() {
    let orchestrator =
        orchestrator_with(vec![search_source()], Arc::new(NoopExecutionRuntime)).await;
    let session = SessionStore::new().get_or_create("s-s", "hotel-concierge", "guest");
    let (tx, _rx) = mpsc::channel(16);

    let result = orchestrator.process_turn(&session, "search hotels", &tx).await;

    assert!(matches!(result, Err(TurnError::RuntimeStart(_))));
}

#[tokio::test]
async fn silent_run_reports_no_response() {
    let runtime = Arc::new(ScriptedRuntime::with_script(vec![Ok(RuntimeEvent::default())]));
    let orchestrator = orchestrator_with(vec![search_source()], runtime).await;
    let session = SessionStore::new().get_or_create("s-q", "hotel-concierge", "guest");
    let (tx, rx) = mpsc::channel(16);
    drop(rx);

    let outcome = orchestrator.process_turn(&session, "hello", &tx).await.expect("turn succeeds");

    assert_eq!(outcome, TurnOutcome::NoResponse);
}

#[tokio::test]
async fn turns_on_one_session_do_not_overlap() {
    let runtime = Arc::new(ScriptedRuntime {
        script: Mutex::new(vec![
            Ok(RuntimeEvent::text("first part")),
            Ok(RuntimeEvent::text("second part")),
        ]),
        step_delay: Some(Duration::from_millis(20)),
        ..ScriptedRuntime::default()
    });
    let orchestrator = orchestrator_with(vec![search_source()], runtime.clone()).await;
    let session = SessionStore::new().get_or_create("s-p", "hotel-concierge", "guest");
    let (tx, _rx) = mpsc::channel(64);

    let (first, second) = tokio::join!(
        orchestrator.process_turn(&session, "one", &tx),
        orchestrator.process_turn(&session, "two", &tx),
    );

    assert_eq!(first, Ok(TurnOutcome::Narrated));
    assert_eq!(second, Ok(TurnOutcome::Narrated));
    assert_eq!(runtime.starts.load(Ordering::SeqCst), 2);
    assert_eq!(runtime.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(session.lock().await.history.len(), 4);
}

/// Sends a final event, then keeps the stream open without sending anything else.
struct LingeringRuntime;

#[async_trait]
impl ExecutionRuntime for LingeringRuntime {
    async fn prepare_agent(&self, _definition: &AgentDefinition) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn start(
        &self,
        _definition: Arc<AgentDefinition>,
        _request: RunRequest,
    ) -> Result<EventStream, RuntimeError> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let done = RuntimeEvent::text("Le Meurice has rooms on those dates.").into_final();
            if tx.send(Ok(done)).await.is_ok() {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            drop(tx);
        });
        Ok(rx)
    }
}

#[tokio::test]
async fn final_event_ends_the_turn_while_the_stream_is_still_open() {
    let orchestrator = orchestrator_with(vec![search_source()], Arc::new(LingeringRuntime)).await;
    let session = SessionStore::new().get_or_create("s-final", "hotel-concierge", "guest");
    let (tx, mut rx) = mpsc::channel(16);

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.process_turn(&session, "any rooms at le meurice?", &tx),
    )
    .await
    .expect("turn should not wait for the stream to close")
    .expect("turn succeeds");

    assert_eq!(outcome, TurnOutcome::Narrated);
    assert_eq!(drain(&mut rx), vec![UiMessage::text("Le Meurice has rooms on those dates.")]);
}
