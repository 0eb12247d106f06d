use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use concierge_core::{SourceKind, Tool};
use concierge_remote::{
    CapabilitySource, RemoteError, RemoteTool, SkillProtocolClient, ToolProtocolClient,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct Recorder {
    requests: Arc<Mutex<Vec<Value>>>,
    card_hits: Arc<Mutex<u32>>,
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

fn rpc_result(request: &Value, result: Value) -> Json<Value> {
    Json(json!({"jsonrpc": "2.0", "id": request["id"].clone(), "result": result}))
}

fn rpc_error(request: &Value, code: i64, message: &str) -> Json<Value> {
    Json(json!({"jsonrpc": "2.0", "id": request["id"].clone(), "error": {"code": code, "message": message}}))
}

async fn tool_protocol_handler(State(recorder): State<Recorder>, Json(request): Json<Value>) -> Json<Value> {
    recorder.requests.lock().await.push(request.clone());
    match request["method"].as_str().unwrap_or_default() {
        "initialize" => rpc_result(&request, json!({"protocolVersion": "2024-11-05", "capabilities": {}})),
        "tools/list" => rpc_result(
            &request,
            json!({"tools": [
                {
                    "name": "searchHotels",
                    "description": "Search hotels by destination",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"destination": {"type": "string", "description": "City"}},
                        "required": ["destination"]
                    }
                },
                {"name": "getHotelPrice", "description": "Price a stay"}
            ]}),
        ),
        "tools/call" => match request["params"]["name"].as_str().unwrap_or_default() {
            "searchHotels" => rpc_result(
                &request,
                json!({"content": [{
                    "type": "text",
                    "text": "{\"success\":true,\"destination\":\"Paris\",\"hotels\":[{\"name\":\"Hotel Lumiere\"}]}"
                }]}),
            ),
            "echo" => rpc_result(&request, json!({"content": [{"type": "text", "text": "plain words"}]})),
            "broken" => rpc_result(
                &request,
                json!({"isError": true, "content": [{"type": "text", "text": "destination required"}]}),
            ),
            _ => rpc_error(&request, -32601, "unknown tool"),
        },
        _ => rpc_error(&request, -32601, "method not found"),
    }
}

async fn agent_card(State(recorder): State<Recorder>) -> Json<Value> {
    *recorder.card_hits.lock().await += 1;
    Json(json!({
        "name": "Booking Agent",
        "description": "Books hotel rooms",
        "url": "http://localhost/a2a",
        "version": "1.0.0",
        "skills": [
            {
                "id": "book-hotel",
                "name": "Book Hotel",
                "description": "Reserve a room",
                "inputSchema": {"type": "object", "properties": {"guestName": {"type": "string"}}}
            },
            {"id": "cancel_booking", "name": "Cancel Booking", "description": "Cancel a reservation"}
        ]
    }))
}

async fn skill_rpc(State(recorder): State<Recorder>, Json(request): Json<Value>) -> Json<Value> {
    recorder.requests.lock().await.push(request.clone());
    match request["method"].as_str().unwrap_or_default() {
        "tasks/send" if request["params"]["skillId"] == "book-hotel" => rpc_result(
            &request,
            json!({
                "id": "task-1",
                "status": {"state": "completed"},
                "artifacts": [{"parts": [{"type": "data", "data": {
                    "success": true,
                    "bookingId": "BK-1",
                    "guestName": request["params"]["message"]["parts"][0]["data"]["guestName"].clone()
                }}]}]
            }),
        ),
        "tasks/send" => rpc_error(&request, -32602, "unknown skill"),
        "tasks/get" => rpc_result(&request, json!({"id": request["params"]["id"].clone(), "status": {"state": "completed"}})),
        "tasks/cancel" => rpc_result(&request, json!({"id": request["params"]["id"].clone(), "status": {"state": "canceled"}})),
        _ => rpc_error(&request, -32601, "method not found"),
    }
}

async fn tool_server() -> (String, Recorder) {
    let recorder = Recorder::default();
    let router = Router::new()
        .route("/mcp/http", post(tool_protocol_handler))
        .with_state(recorder.clone());
    (serve(router).await, recorder)
}

async fn skill_server() -> (String, Recorder) {
    let recorder = Recorder::default();
    let router = Router::new()
        .route("/.well-known/agent.json", get(agent_card))
        .route("/a2a", post(skill_rpc))
        .with_state(recorder.clone());
    (serve(router).await, recorder)
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn tool_protocol_discovery_handshakes_then_lists() {
    let (base_url, recorder) = tool_server().await;
    let client = ToolProtocolClient::new(&base_url, "/mcp/http", TIMEOUT).expect("client");

    let descriptors = client.discover().await.expect("discovery succeeds");

    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].id, "searchHotels");
    assert_eq!(descriptors[0].source, SourceKind::Primary);
    assert!(descriptors[0].input_schema.is_some());
    assert!(descriptors[1].input_schema.is_none());

    let requests = recorder.requests.lock().await;
    let methods: Vec<&str> = requests.iter().filter_map(|r| r["method"].as_str()).collect();
    assert_eq!(methods, vec!["initialize", "tools/list"]);
    assert_eq!(requests[0]["params"]["protocolVersion"], "2024-11-05");
    let first_id = requests[0]["id"].as_u64().expect("numeric id");
    let second_id = requests[1]["id"].as_u64().expect("numeric id");
    assert!(second_id > first_id, "request ids increase");
}

#[tokio::test]
async fn tool_protocol_call_parses_json_text_and_wraps_plain_text() {
    let (base_url, recorder) = tool_server().await;
    let client = ToolProtocolClient::new(&base_url, "/mcp/http", TIMEOUT).expect("client");

    let parsed = client.call_tool("searchHotels", json!({"destination": "Paris"})).await.expect("call");
    assert_eq!(parsed["destination"], "Paris");
    assert_eq!(parsed["hotels"][0]["name"], "Hotel Lumiere");

    let wrapped = client.call_tool("echo", json!({})).await.expect("call");
    assert_eq!(wrapped, json!({"text": "plain words"}));

    let requests = recorder.requests.lock().await;
    assert_eq!(requests[0]["params"]["arguments"]["destination"], "Paris");
}

#[tokio::test]
async fn tool_protocol_reported_and_rpc_errors_are_values() {
    let (base_url, _recorder) = tool_server().await;
    let client = ToolProtocolClient::new(&base_url, "/mcp/http", TIMEOUT).expect("client");

    let reported = client.call_tool("broken", json!({})).await.expect_err("isError result");
    assert_eq!(reported, RemoteError::ToolReported("destination required".to_string()));

    let rpc = client.call_tool("missing", json!({})).await.expect_err("rpc error");
    assert!(matches!(rpc, RemoteError::Rpc { code: -32601, .. }));
}

#[tokio::test]
async fn skill_protocol_card_is_cached_until_reset() {
    let (base_url, recorder) = skill_server().await;
    let client = SkillProtocolClient::new(&base_url, "/a2a", TIMEOUT).expect("client");

    let first = client.discover().await.expect("first discovery");
    let second = client.discover().await.expect("second discovery");
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].id, "book-hotel");
    assert_eq!(first[0].name, "Book Hotel");
    assert_eq!(*recorder.card_hits.lock().await, 1);
    assert_eq!(client.cached_card().map(|card| card.name), Some("Booking Agent".to_string()));

    client.reset();
    client.discover().await.expect("discovery after reset");
    assert_eq!(*recorder.card_hits.lock().await, 2);
}

#[tokio::test]
async fn skill_protocol_send_task_unwraps_data_artifact() {
    let (base_url, recorder) = skill_server().await;
    let client = SkillProtocolClient::new(&base_url, "/a2a", TIMEOUT).expect("client");

    let payload = client.send_task("book-hotel", json!({"guestName": "Ada"})).await.expect("task");
    assert_eq!(payload, json!({"success": true, "bookingId": "BK-1", "guestName": "Ada"}));

    let requests = recorder.requests.lock().await;
    let part = &requests[0]["params"]["message"]["parts"][0];
    assert_eq!(requests[0]["params"]["message"]["role"], "user");
    assert_eq!(part["type"], "data");
    assert_eq!(part["mimeType"], "application/json");
}

#[tokio::test]
async fn skill_protocol_task_status_and_cancel() {
    let (base_url, _recorder) = skill_server().await;
    let client = SkillProtocolClient::new(&base_url, "/a2a", TIMEOUT).expect("client");

    let status = client.get_task("task-9").await.expect("tasks/get");
    assert_eq!(status["status"]["state"], "completed");

    let cancelled = client.cancel_task("task-9").await.expect("tasks/cancel");
    assert_eq!(cancelled["status"]["state"], "canceled");
}

#[tokio::test]
async fn adapted_skill_tool_round_trips_through_the_wire() {
    let (base_url, _recorder) = skill_server().await;
    let client = Arc::new(SkillProtocolClient::new(&base_url, "/a2a", TIMEOUT).expect("client"));
    let descriptors = client.discover().await.expect("discovery");

    let tools: Vec<RemoteTool> = descriptors
        .into_iter()
        .map(|descriptor| RemoteTool::adapt(descriptor, client.clone()))
        .collect();
    let names: Vec<&str> = tools.iter().map(|tool| tool.name()).collect();
    assert_eq!(names, vec!["bookHotel", "cancelBooking"]);

    let payload = tools[0].invoke(json!({"guestName": "Grace"})).await.expect("booking");
    assert_eq!(payload["guestName"], "Grace");

    let error = tools[1].invoke(json!({})).await.expect_err("unknown skill");
    assert_eq!(error.capability, "cancelBooking");
}

#[tokio::test]
async fn unreachable_source_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = SkillProtocolClient::new(format!("http://{addr}"), "/a2a", TIMEOUT).expect("client");
    let error = client.discover().await.expect_err("nothing is listening");
    assert!(matches!(error, RemoteError::Transport { .. }));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let router = Router::new().route(
        "/mcp/http",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down") }),
    );
    let base_url = serve(router).await;
    let client = ToolProtocolClient::new(&base_url, "/mcp/http", TIMEOUT).expect("client");

    let error = client.list_tools().await.expect_err("500 response");
    assert!(matches!(error, RemoteError::HttpStatus { status: 500, .. }));
}
