//! Integration tests for commonsense-client
//!
//! These tests run an in-process fake of the CommonSense API and drive it
//! through the client, so request shapes and response decoding are checked
//! end to end.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use commonsense_client::testing::TestServer;
use commonsense_client::{
    DataPoint, DataQuery, DatePrecision, SenseClient, SenseClientError, Sensor, SensorData,
};

// =============================================================================
// Mock Service
// =============================================================================

const SESSION: &str = "session-1";
const ERROR_PAGE: &str = "<html><body>Internal Server Error: recess</body></html>";

#[derive(Default)]
struct MockService {
    sensors: Vec<Value>,
    next_id: u64,
    data: HashMap<String, Vec<Value>>,
    /// `METHOD path?query` of every request that reached the service
    requests: Vec<String>,
    /// Serve these page sizes instead of slicing `sensors`
    page_sizes: Vec<usize>,
    /// Page of `/sensors.json` that answers 500
    failing_page: Option<u32>,
    logout_status: Option<StatusCode>,
}

type Shared = Arc<Mutex<MockService>>;

impl MockService {
    fn with_sensors(count: usize) -> Self {
        let sensors = (0..count)
            .map(|i| sensor_json(&(i + 1).to_string(), &format!("sensor_{}", i)))
            .collect();
        Self {
            sensors,
            next_id: count as u64 + 1,
            ..Default::default()
        }
    }

    fn record(&mut self, method: &str, path: &str, query: &[(String, String)]) {
        let query = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        self.requests.push(format!("{} {}?{}", method, path, query));
    }
}

fn sensor_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "1",
        "device_type": "phone",
        "display_name": name,
        "use_data_storage": true,
        "data_type": "float",
        "data_structure": ""
    })
}

fn param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-session_id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == SESSION)
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "not logged in"}))).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    match (body["username"].as_str(), body["password"].as_str()) {
        (Some("alice"), Some("secret")) => (
            StatusCode::OK,
            [("X-SESSION_ID", SESSION)],
            Json(json!({"session_id": SESSION})),
        )
            .into_response(),
        (Some("headless"), _) => (StatusCode::OK, Json(json!({}))).into_response(),
        _ => (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "invalid credentials"})),
        )
            .into_response(),
    }
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let status = state.lock().logout_status.unwrap_or(StatusCode::OK);
    (status, "").into_response()
}

async fn list_sensors(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let mut state = state.lock();
    state.record("GET", "/sensors.json", &query);
    if !authorized(&headers) {
        return unauthorized();
    }

    let page: u32 = param(&query, "page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let per_page: usize = param(&query, "per_page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(100);

    if state.failing_page == Some(page) {
        return (StatusCode::INTERNAL_SERVER_ERROR, ERROR_PAGE).into_response();
    }

    let sensors: Vec<Value> = if state.page_sizes.is_empty() {
        state
            .sensors
            .iter()
            .skip(page as usize * per_page)
            .take(per_page)
            .cloned()
            .collect()
    } else {
        let size = state.page_sizes.get(page as usize).copied().unwrap_or(0);
        (0..size)
            .map(|i| sensor_json(&format!("{}{}", page, i), "synthetic"))
            .collect()
    };

    let total = state.sensors.len();
    Json(json!({"sensors": sensors, "total": total})).into_response()
}

async fn create_sensor(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut state = state.lock();
    let id = state.next_id.to_string();
    state.next_id += 1;

    let mut sensor = body["sensor"].clone();
    sensor["id"] = json!(id);
    state.sensors.push(sensor);

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string();
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("http://{}/sensors/{}", host, id))],
        "",
    )
        .into_response()
}

async fn update_sensor(
    State(state): State<Shared>,
    Path(file): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let id = file.trim_end_matches(".json");
    let mut state = state.lock();
    match state.sensors.iter_mut().find(|s| s["id"] == id) {
        Some(sensor) => {
            *sensor = body["sensor"].clone();
            sensor["id"] = json!(id);
            (StatusCode::OK, "").into_response()
        }
        None => (StatusCode::NOT_FOUND, "no such sensor").into_response(),
    }
}

async fn delete_sensor(
    State(state): State<Shared>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let id = file.trim_end_matches(".json");
    let mut state = state.lock();
    let before = state.sensors.len();
    state.sensors.retain(|s| s["id"] != id);
    if state.sensors.len() == before {
        (StatusCode::NOT_FOUND, "no such sensor").into_response()
    } else {
        (StatusCode::OK, "").into_response()
    }
}

async fn metatags(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let mut state = state.lock();
    state.record("GET", "/sensors/metatags.json", &query);
    if !authorized(&headers) {
        return unauthorized();
    }
    let namespace = param(&query, "namespace").unwrap_or_default().to_string();

    let sensors: Vec<Value> = state
        .sensors
        .iter()
        .map(|s| {
            let mut tagged = s.clone();
            tagged["use_data_storage"] = json!("true");
            tagged["metatags"] = json!({ "namespace": namespace, "room": ["kitchen"] });
            tagged
        })
        .collect();
    Json(json!({"sensors": sensors, "total": sensors.len()})).into_response()
}

async fn upload_data(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut state = state.lock();
    for batch in body["sensors"].as_array().cloned().unwrap_or_default() {
        let id = batch["sensor_id"].as_str().unwrap_or_default().to_string();
        let points = batch["data"].as_array().cloned().unwrap_or_default();
        state.data.entry(id).or_default().extend(points);
    }
    (StatusCode::CREATED, "").into_response()
}

async fn upload_sensor_data(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let points = body["data"].as_array().cloned().unwrap_or_default();
    state.lock().data.entry(id).or_default().extend(points);
    (StatusCode::CREATED, "").into_response()
}

async fn read_sensor_data(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let mut state = state.lock();
    state.record("GET", &format!("/sensors/{}/data.json", id), &query);
    if !authorized(&headers) {
        return unauthorized();
    }
    let per_page: usize = param(&query, "per_page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(usize::MAX);
    let data: Vec<Value> = state
        .data
        .get(&id)
        .map(|points| points.iter().take(per_page).cloned().collect())
        .unwrap_or_default();
    Json(json!({"data": data, "total": data.len()})).into_response()
}

async fn read_sensors_data(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let mut state = state.lock();
    state.record("GET", "/sensors/data.json", &query);
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut data = Vec::new();
    for (_, id) in query.iter().filter(|(k, _)| k == "sensor_id[]") {
        for point in state.data.get(id).cloned().unwrap_or_default() {
            let mut point = point;
            // the service reports numeric ids here
            point["sensor_id"] = json!(id.parse::<u64>().unwrap_or_default());
            data.push(point);
        }
    }
    Json(json!({"data": data, "total": data.len()})).into_response()
}

fn mock_router(state: Shared) -> Router {
    Router::new()
        .route("/login.json", post(login))
        .route("/logout.json", post(logout))
        .route("/sensors.json", get(list_sensors).post(create_sensor))
        .route("/sensors/metatags.json", get(metatags))
        .route("/sensors/data.json", get(read_sensors_data).post(upload_data))
        .route("/sensors/{id}", put(update_sensor).delete(delete_sensor))
        .route("/sensors/{id}/data.json", get(read_sensor_data))
        .route("/sensors/{id}/data", post(upload_sensor_data))
        .with_state(state)
}

async fn start(service: MockService) -> (TestServer, Shared) {
    let state = Arc::new(Mutex::new(service));
    let server = TestServer::start(mock_router(state.clone()))
        .await
        .expect("Failed to start test server");
    (server, state)
}

async fn logged_in(server: &TestServer) -> SenseClient {
    let mut client = server.client().unwrap();
    client.login("alice", "secret").await.unwrap();
    client
}

// =============================================================================
// Session
// =============================================================================

#[tokio::test]
async fn test_login_stores_session() {
    let (server, _) = start(MockService::default()).await;
    let mut client = server.client().unwrap();

    client.login("alice", "secret").await.unwrap();

    assert!(client.is_logged_in());
    assert_eq!(client.session_id(), Some(SESSION));
}

#[tokio::test]
async fn test_rejected_login_keeps_previous_session() {
    let (server, _) = start(MockService::default()).await;
    let mut client = server.client().unwrap().with_session("earlier-session");

    let err = client.login("alice", "wrong").await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert!(err.to_string().contains("invalid credentials"));
    assert_eq!(client.session_id(), Some("earlier-session"));
}

#[tokio::test]
async fn test_rejected_login_does_not_claim_session() {
    let (server, _) = start(MockService::default()).await;
    let mut client = server.client().unwrap();

    assert!(client.login("bob", "secret").await.is_err());
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_login_without_session_header() {
    let (server, _) = start(MockService::default()).await;
    let mut client = server.client().unwrap();

    let err = client.login("headless", "secret").await.unwrap_err();

    assert!(matches!(err, SenseClientError::MissingSessionHeader(_)));
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_logout_clears_session() {
    let (server, _) = start(MockService::default()).await;
    let mut client = logged_in(&server).await;

    client.logout().await.unwrap();

    assert!(!client.is_logged_in());
    let err = client.get_sensors().await.unwrap_err();
    assert!(matches!(err, SenseClientError::NotAuthenticated));
}

#[tokio::test]
async fn test_failed_logout_keeps_session_for_retry() {
    let (server, state) = start(MockService::default()).await;
    let mut client = logged_in(&server).await;
    state.lock().logout_status = Some(StatusCode::SERVICE_UNAVAILABLE);

    let err = client.logout().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(client.session_id(), Some(SESSION));

    state.lock().logout_status = None;
    client.logout().await.unwrap();
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_calls_without_session_never_reach_server() {
    let (server, state) = start(MockService::with_sensors(3)).await;
    let client = server.client().unwrap();

    assert!(matches!(
        client.get_sensors().await.unwrap_err(),
        SenseClientError::NotAuthenticated
    ));
    assert!(state.lock().requests.is_empty());
}

#[tokio::test]
async fn test_get_all_sensors_without_session_is_an_error() {
    let (server, state) = start(MockService::with_sensors(3)).await;
    let client = server.client().unwrap();

    assert!(matches!(
        client.get_all_sensors().await,
        Err(SenseClientError::NotAuthenticated)
    ));
    assert!(state.lock().requests.is_empty());
}

// =============================================================================
// Sensors
// =============================================================================

#[tokio::test]
async fn test_get_sensors_single_page() {
    let (server, state) = start(MockService::with_sensors(3)).await;
    let client = logged_in(&server).await;

    let sensors = client.get_sensors().await.unwrap();

    assert_eq!(sensors.len(), 3);
    assert_eq!(sensors[0].id, "1");
    assert_eq!(sensors[0].name, "sensor_0");
    assert_eq!(
        state.lock().requests,
        vec!["GET /sensors.json?page=0&per_page=1000&shared=0&owned=1&physical=1&details=full"]
    );
}

#[tokio::test]
async fn test_get_all_sensors_concatenates_pages() {
    let (server, state) = start(MockService::with_sensors(250)).await;
    let client = logged_in(&server).await;

    let sensors = client.get_all_sensors().await.unwrap();

    assert_eq!(sensors.len(), 250);
    assert_eq!(sensors[249].name, "sensor_249");
    let requests = state.lock().requests.clone();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[2],
        "GET /sensors.json?page=2&per_page=100&shared=0&owned=1&physical=0&details=full"
    );
}

#[tokio::test]
async fn test_get_all_sensors_stops_at_first_short_page() {
    let service = MockService {
        page_sizes: vec![100, 40, 100, 100],
        ..Default::default()
    };
    let (server, state) = start(service).await;
    let client = logged_in(&server).await;

    let sensors = client.get_all_sensors().await.unwrap();

    assert_eq!(sensors.len(), 140);
    assert_eq!(state.lock().requests.len(), 2);
}

#[tokio::test]
async fn test_get_all_sensors_exact_multiple_needs_empty_page() {
    let (server, state) = start(MockService::with_sensors(200)).await;
    let client = logged_in(&server).await;

    let sensors = client.get_all_sensors().await.unwrap();

    assert_eq!(sensors.len(), 200);
    assert_eq!(state.lock().requests.len(), 3);
}

#[tokio::test]
async fn test_get_all_sensors_returns_partial_results_on_error() {
    let mut service = MockService::with_sensors(250);
    service.failing_page = Some(1);
    let (server, _) = start(service).await;
    let client = logged_in(&server).await;

    let sensors = client.get_all_sensors().await.unwrap();
    assert_eq!(sensors.len(), 100);

    let err = client.try_get_all_sensors().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_sensor_metatags() {
    let (server, state) = start(MockService::with_sensors(2)).await;
    let client = logged_in(&server).await;

    let tagged = client.get_sensors_metatags("my app").await.unwrap();

    assert_eq!(tagged.len(), 2);
    assert!(tagged[0].sensor.use_data_storage);
    assert_eq!(tagged[0].metatags["namespace"], json!("my app"));
    assert_eq!(tagged[1].metatags["room"], json!(["kitchen"]));
    assert_eq!(
        state.lock().requests,
        vec!["GET /sensors/metatags.json?namespace=my app&details=full"]
    );
}

#[tokio::test]
async fn test_sensor_lifecycle() {
    let (server, _) = start(MockService::with_sensors(1)).await;
    let client = logged_in(&server).await;

    let sensor = Sensor::new("herp", "derp", "herpaderp", "float");
    let id = client.post_sensor(&sensor).await.unwrap();
    assert_eq!(id, "2");

    let renamed = sensor.clone().with_data_storage(false);
    let renamed = Sensor {
        display_name: "renamed".to_string(),
        ..renamed
    };
    client.put_sensor(&id, &renamed).await.unwrap();

    let sensors = client.get_sensors().await.unwrap();
    let stored = sensors.iter().find(|s| s.id == id).unwrap();
    assert_eq!(stored.display_name, "renamed");
    assert!(!stored.use_data_storage);

    client.delete_sensor(&id).await.unwrap();
    let sensors = client.get_sensors().await.unwrap();
    assert!(sensors.iter().all(|s| s.id != id));

    let err = client.delete_sensor(&id).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_post_sensor_with_unexpected_location() {
    let (server, state) = start(MockService::default()).await;
    let config = server
        .config_builder()
        .location_prefix("http://api.sense-os.nl/sensors/")
        .build();
    let mut client = SenseClient::with_config(config).unwrap();
    client.login("alice", "secret").await.unwrap();

    let err = client
        .post_sensor(&Sensor::new("a", "b", "c", "float"))
        .await
        .unwrap_err();

    assert!(matches!(err, SenseClientError::InvalidLocation(_)));
    // the sensor was still created server-side
    assert_eq!(state.lock().sensors.len(), 1);
}

// =============================================================================
// Diagnostics
// =============================================================================

#[tokio::test]
async fn test_server_error_body_is_dumped() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("recess_diagnostics.html");
    std::fs::write(&dump, "a much longer body left over from an earlier failure").unwrap();

    let mut service = MockService::with_sensors(1);
    service.failing_page = Some(0);
    let (server, _) = start(service).await;
    let config = server.config_builder().diagnostics_file(&dump).build();
    let mut client = SenseClient::with_config(config).unwrap();
    client.login("alice", "secret").await.unwrap();

    let err = client.get_sensors().await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("500 Internal Server Error"));
    assert_eq!(std::fs::read_to_string(&dump).unwrap(), ERROR_PAGE);
}

#[tokio::test]
async fn test_client_errors_are_not_dumped() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("recess_diagnostics.html");

    let (server, _) = start(MockService::default()).await;
    let config = server.config_builder().diagnostics_file(&dump).build();
    let mut client = SenseClient::with_config(config).unwrap();

    assert!(client.login("alice", "wrong").await.is_err());
    assert!(!dump.exists());
}

// =============================================================================
// Data
// =============================================================================

#[tokio::test]
async fn test_bulk_upload_round_trip() {
    let (server, _) = start(MockService::with_sensors(2)).await;
    let client = logged_in(&server).await;

    let first = SensorData::new("1")
        .with_point(DataPoint::new("100", 1355321600.0))
        .with_point(DataPoint::new("101", 1355321600.5))
        .with_point(DataPoint::new("99", 1355321700.0));
    let second = SensorData::new("2").with_point(DataPoint::new("{\"x\":1}", 1355321601.0));

    client
        .post_sensors_data(&[first.clone(), second.clone()])
        .await
        .unwrap();

    let points = client.get_sensor_data("1", &DataQuery::new()).await.unwrap();
    assert_eq!(points, first.data);

    let points = client.get_sensor_data("2", &DataQuery::new()).await.unwrap();
    assert_eq!(points, second.data);
}

#[tokio::test]
async fn test_get_sensor_data_sends_query() {
    let (server, state) = start(MockService::with_sensors(1)).await;
    let client = logged_in(&server).await;
    let batch = SensorData::new("1")
        .with_point(DataPoint::new("1", 10.0))
        .with_point(DataPoint::new("2", 20.0));
    client.post_sensors_data(&[batch]).await.unwrap();

    let query = DataQuery::new().page(0, 1).between(5.0, 30.0);
    let points = client.get_sensor_data("1", &query).await.unwrap();

    assert_eq!(points, vec![DataPoint::new("1", 10.0)]);
    assert_eq!(
        state.lock().requests,
        vec!["GET /sensors/1/data.json?page=0&per_page=1&start_date=5&end_date=30"]
    );
}

#[tokio::test]
async fn test_get_sensors_data_across_sensors() {
    let (server, state) = start(MockService::with_sensors(3)).await;
    let client = logged_in(&server).await;
    client
        .post_sensors_data(&[
            SensorData::new("1").with_point(DataPoint::new("a", 1.0)),
            SensorData::new("3").with_point(DataPoint::new("c", 3.0)),
        ])
        .await
        .unwrap();

    let points = client
        .get_sensors_data(&["3", "1"], &DataQuery::new())
        .await
        .unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].sensor_id.as_deref(), Some("3"));
    assert_eq!(points[0].value, "c");
    assert_eq!(points[1].sensor_id.as_deref(), Some("1"));
    assert_eq!(
        state.lock().requests,
        vec!["GET /sensors/data.json?sensor_id[]=3&sensor_id[]=1"]
    );
}

#[tokio::test]
async fn test_single_sensor_upload() {
    let (server, _) = start(MockService::with_sensors(1)).await;
    let client = logged_in(&server).await;
    let batch = SensorData::new("1").with_point(DataPoint::new("on", 42.0));

    client.post_sensor_data("1", &batch).await.unwrap();

    let points = client.get_sensor_data("1", &DataQuery::new()).await.unwrap();
    assert_eq!(points, batch.data);
}

#[tokio::test]
async fn test_integer_precision_truncates_uploaded_dates() {
    let (server, state) = start(MockService::with_sensors(1)).await;
    let config = server
        .config_builder()
        .date_precision(DatePrecision::Integer)
        .build();
    let mut client = SenseClient::with_config(config).unwrap();
    client.login("alice", "secret").await.unwrap();

    let batch = SensorData::new("1").with_point(DataPoint::new("7", 1355321600.75));
    client.post_sensors_data(&[batch]).await.unwrap();

    assert_eq!(
        state.lock().data["1"],
        vec![json!({"value": "7", "date": 1355321600})]
    );
}
