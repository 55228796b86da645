//! In-process mock of the fixeau.com API for integration tests.
#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Form, Multipart, Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDateTime;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fixeau_export::config::Config;
use fixeau_export::export::resolve::USERNAME_EXISTS;
use fixeau_export::local::{MeasuringPoint, Observation, Observer};

pub const USERNAME: &str = "exporter";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub base_url: String,
    pub page_size: usize,
    pub next_id: i64,
    pub groups: Vec<Value>,
    pub users: Vec<Value>,
    pub sources: Vec<Value>,
    pub series: Vec<Value>,
    pub photos: Vec<Value>,
    pub measurement_batches: Vec<Vec<Value>>,
    pub requests: Vec<RecordedRequest>,
    /// Usernames taken by accounts the exporter cannot see
    pub reserved_usernames: Vec<String>,
    /// Reject every new user with an e-mail validation error
    pub reject_users: bool,
    pub fail_series_creation: bool,
    pub fail_source_updates: bool,
    /// List every photo regardless of the `name` filter
    pub ignore_photo_filter: bool,
}

impl MockState {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Requests with the given method whose URI contains `path`
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .iter()
            .filter(|r| r.method == method && r.uri.contains(path))
            .cloned()
            .collect()
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockFixeau {
    pub base_url: String,
    state: Shared,
}

impl MockFixeau {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let base_url = format!("http://{addr}/api/v1");

        let state: Shared = Arc::new(Mutex::new(MockState {
            base_url: base_url.clone(),
            page_size: 2,
            next_id: 1,
            ..MockState::default()
        }));

        let api = Router::new()
            .route("/token/", post(token))
            .route("/item/", get(list_items))
            .route("/group/", get(list_groups).post(create_group))
            .route("/user/", get(list_users).post(create_user))
            .route("/source/", get(list_sources).post(create_source))
            .route("/source/{id}/", get(get_source).patch(patch_source))
            .route("/series/", get(list_series).post(create_series))
            .route("/series/{id}/", get(get_series).put(put_series).patch(patch_series))
            .route("/measurement/", post(create_measurements))
            .route("/photo/", get(list_photos).post(upload_photo))
            .layer(middleware::from_fn_with_state(state.clone(), record_and_authorize))
            .with_state(state.clone());

        let app = Router::new().nest("/api/v1", api);

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self { base_url, state }
    }

    pub fn config(&self) -> Config {
        Config {
            database_url: String::new(),
            api_url: self.base_url.clone(),
            username: USERNAME.to_string(),
            password: PASSWORD.to_string(),
            skip_tls_verify: false,
            folder: 6,
            media_root: PathBuf::from("."),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().expect("mock state"))
    }
}

async fn record_and_authorize(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("JWT {TOKEN}").as_str());
    let is_login = request.uri().path().ends_with("/token/");

    state.lock().expect("mock state").requests.push(RecordedRequest {
        method: request.method().to_string(),
        uri: request.uri().to_string(),
        content_type: request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if !is_login && !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Authentication credentials were not provided."})),
        )
            .into_response();
    }

    next.run(request).await
}

async fn token(Form(form): Form<HashMap<String, String>>) -> Response {
    let valid = form.get("username").map(String::as_str) == Some(USERNAME)
        && form.get("password").map(String::as_str) == Some(PASSWORD);

    if valid {
        Json(json!({"token": TOKEN})).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"non_field_errors": ["Unable to log in with provided credentials."]})),
        )
            .into_response()
    }
}

fn matches(item: &Value, params: &HashMap<String, String>) -> bool {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != "page")
        .all(|(key, expected)| match item.get(key) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Number(n)) => n.to_string() == *expected,
            _ => false,
        })
}

/// One page of the filtered `items`, with a `next` URL carrying the same filter
fn paginate(
    base_url: &str,
    path: &str,
    items: &[Value],
    params: &HashMap<String, String>,
    page_size: usize,
) -> Json<Value> {
    let filtered: Vec<&Value> = items.iter().filter(|item| matches(item, params)).collect();
    let page: usize = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let start = (page - 1) * page_size;
    let results: Vec<Value> = filtered
        .iter()
        .skip(start)
        .take(page_size)
        .map(|v| (*v).clone())
        .collect();

    let next = if start + page_size < filtered.len() {
        let mut url = reqwest::Url::parse(&format!("{base_url}{path}")).expect("next url");
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params.iter().filter(|(key, _)| key.as_str() != "page") {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("page", &(page + 1).to_string());
        }
        Value::String(url.to_string())
    } else {
        Value::Null
    };

    Json(json!({"count": filtered.len(), "next": next, "results": results}))
}

/// 30 numbered items in pages of 10; `next` links drop the query
async fn list_items(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let base_url = state.lock().expect("mock state").base_url.clone();
    let page: usize = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let results: Vec<Value> = ((page - 1) * 10..page * 10)
        .map(|i| json!({"id": i, "name": format!("item {i}")}))
        .collect();
    let next = if page < 3 {
        Value::String(format!("{base_url}/item/?page={}", page + 1))
    } else {
        Value::Null
    };

    Json(json!({"count": 30, "next": next, "results": results}))
}

async fn list_groups(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let s = state.lock().expect("mock state");
    paginate(&s.base_url, "/group/", &s.groups, &params, s.page_size)
}

async fn create_group(State(state): State<Shared>, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().expect("mock state");
    body["id"] = json!(s.allocate_id());
    s.groups.push(body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn list_users(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let s = state.lock().expect("mock state");
    paginate(&s.base_url, "/user/", &s.users, &params, s.page_size)
}

async fn create_user(State(state): State<Shared>, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().expect("mock state");
    if s.reject_users {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"email": ["Enter a valid email address."]})),
        );
    }
    let taken = s.users.iter().any(|u| u["username"] == body["username"])
        || s
            .reserved_usernames
            .iter()
            .any(|name| body["username"] == json!(name));
    if taken {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"username": [USERNAME_EXISTS]})),
        );
    }
    body["id"] = json!(s.allocate_id());
    s.users.push(body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn list_sources(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let s = state.lock().expect("mock state");
    paginate(&s.base_url, "/source/", &s.sources, &params, s.page_size)
}

async fn get_source(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let s = state.lock().expect("mock state");
    match s.sources.iter().find(|src| src["id"] == json!(id)) {
        Some(source) => Json(source.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn create_source(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().expect("mock state");
    s.sources.push(body.clone());
    (StatusCode::CREATED, Json(body))
}

fn patch_in(items: &mut [Value], id: &Value, body: &Value) -> Response {
    let Some(item) = items.iter_mut().find(|item| item["id"] == *id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    if let (Some(target), Some(changes)) = (item.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
    Json(item.clone()).into_response()
}

async fn patch_source(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().expect("mock state");
    if s.fail_source_updates {
        return (StatusCode::INTERNAL_SERVER_ERROR, "source backend down").into_response();
    }
    patch_in(&mut s.sources, &json!(id), &body)
}

async fn list_series(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let s = state.lock().expect("mock state");
    paginate(&s.base_url, "/series/", &s.series, &params, s.page_size)
}

async fn get_series(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let s = state.lock().expect("mock state");
    match s.series.iter().find(|item| item["id"] == json!(id)) {
        Some(series) => Json(series.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn create_series(State(state): State<Shared>, Json(mut body): Json<Value>) -> Response {
    let mut s = state.lock().expect("mock state");
    if s.fail_series_creation {
        return (StatusCode::INTERNAL_SERVER_ERROR, "series backend down").into_response();
    }
    body["id"] = json!(s.allocate_id());
    s.series.push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn put_series(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(mut body): Json<Value>,
) -> Response {
    let mut s = state.lock().expect("mock state");
    body["id"] = json!(id);
    match s.series.iter_mut().find(|item| item["id"] == json!(id)) {
        Some(item) => {
            *item = body.clone();
            Json(body).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn patch_series(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().expect("mock state");
    patch_in(&mut s.series, &json!(id), &body)
}

async fn create_measurements(
    State(state): State<Shared>,
    Json(batch): Json<Vec<Value>>,
) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().expect("mock state");
    let count = batch.len();
    s.measurement_batches.push(batch);
    (StatusCode::CREATED, Json(json!({"count": count})))
}

async fn list_photos(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let s = state.lock().expect("mock state");
    let mut params = params;
    if s.ignore_photo_filter {
        params.remove("name");
    }
    paginate(&s.base_url, "/photo/", &s.photos, &params, s.page_size)
}

async fn upload_photo(State(state): State<Shared>, mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let mut name = String::new();
    let mut size = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = field.text().await.unwrap_or_default(),
            "image" => size = field.bytes().await.map(|b| b.len()).unwrap_or_default(),
            _ => {}
        }
    }

    let mut s = state.lock().expect("mock state");
    let id = s.allocate_id();
    let photo = json!({
        "id": id,
        "name": name,
        "size": size,
        "url": format!("{}/media/photos/{name}", s.base_url),
    });
    s.photos.push(photo.clone());
    (StatusCode::CREATED, Json(photo))
}

pub fn time(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").expect("valid timestamp")
}

pub fn observation(id: i32, category: &str, value: f64, at: &str) -> Observation {
    Observation {
        id,
        category: category.to_string(),
        observer_id: Some(1),
        device: "phone-1".to_string(),
        time: time(at),
        value,
        photo: None,
    }
}

pub fn point(id: i32, name: &str, observations: Vec<Observation>) -> MeasuringPoint {
    MeasuringPoint {
        id,
        name: name.to_string(),
        display_name: format!("Meetpunt {name}"),
        identifier: format!("ID-{id}"),
        latitude: 52.1,
        longitude: 4.3,
        device: "phone-1".to_string(),
        photo: None,
        observations,
    }
}

pub fn observer(id: i32, first: &str, middle: Option<&str>, last: &str) -> Observer {
    Observer {
        id,
        initials: Some(first.chars().take(1).collect()),
        first_name: Some(first.to_string()),
        middle_name: middle.map(str::to_string),
        last_name: last.to_string(),
        email: Some(format!("{}@example.org", first.to_lowercase())),
        phone: Some("0612345678".to_string()),
    }
}
