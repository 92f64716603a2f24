use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const DEFAULT_API_KEY: &str = "test-key";

const DISPOSABLE_DOMAINS: &[&str] = &["mailinator.com", "tempmail.com"];

pub struct MockState {
    api_key: String,
    calls: AtomicU64,
}

pub type SharedState = Arc<MockState>;

type Params = Query<HashMap<String, String>>;

pub fn app() -> Router {
    app_with_key(DEFAULT_API_KEY)
}

pub fn app_with_key(api_key: &str) -> Router {
    let state: SharedState = Arc::new(MockState {
        api_key: api_key.to_string(),
        calls: AtomicU64::new(0),
    });
    Router::new()
        .route("/email-verifier", get(verify_email))
        .route("/email-count", get(count_domain_emails))
        .route("/domain-search", get(domain_search))
        .route("/email-finder", get(find_email))
        .route("/account", get(account))
        .route("/echo", get(echo).post(echo).put(echo).delete(echo))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// A Hunter-style error body with its status.
pub struct ApiError {
    status: StatusCode,
    id: &'static str,
    details: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "errors": [{"id": self.id, "code": self.status.as_u16(), "details": self.details}]
        });
        (self.status, Json(body)).into_response()
    }
}

fn envelope(data: Value) -> Json<Value> {
    Json(json!({
        "data": data,
        "meta": {"request_id": Uuid::new_v4()}
    }))
}

fn authorize(state: &MockState, params: &HashMap<String, String>) -> Result<(), ApiError> {
    match params.get("api_key") {
        Some(key) if *key == state.api_key => {
            state.calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        Some(_) => Err(ApiError {
            status: StatusCode::UNAUTHORIZED,
            id: "authentication_failed",
            details: "No user found for the API key supplied".to_string(),
        }),
        None => Err(ApiError {
            status: StatusCode::UNAUTHORIZED,
            id: "authentication_failed",
            details: "You are missing an API key".to_string(),
        }),
    }
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ApiError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError {
            status: StatusCode::BAD_REQUEST,
            id: "wrong_params",
            details: format!("You are missing the {name} parameter"),
        })
}

fn split_email(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || domain.contains('@') {
        return None;
    }
    Some((local, domain))
}

async fn verify_email(State(state): State<SharedState>, Query(params): Params) -> Result<Json<Value>, ApiError> {
    authorize(&state, &params)?;
    let email = required(&params, "email")?;

    let (status, score, disposable) = match split_email(email) {
        None => ("invalid", 0.1, false),
        Some((_, domain)) if DISPOSABLE_DOMAINS.contains(&domain) => ("disposable", 0.3, true),
        Some(_) => ("valid", 0.9, false),
    };

    Ok(envelope(json!({
        "email": email,
        "status": status,
        "score": score,
        "disposable": disposable,
    })))
}

async fn count_domain_emails(State(state): State<SharedState>, Query(params): Params) -> Result<Json<Value>, ApiError> {
    authorize(&state, &params)?;
    let domain = required(&params, "domain")?;
    let total = domain.len() as u64 * 3;
    Ok(envelope(json!({
        "domain": domain,
        "total": total,
        "personal_emails": total - 1,
        "generic_emails": 1,
    })))
}

async fn domain_search(State(state): State<SharedState>, Query(params): Params) -> Result<Json<Value>, ApiError> {
    authorize(&state, &params)?;
    let domain = required(&params, "domain")?;
    Ok(envelope(json!({
        "domain": domain,
        "disposable": DISPOSABLE_DOMAINS.contains(&domain),
        "emails": [
            {"value": format!("contact@{domain}"), "type": "generic"},
        ],
    })))
}

async fn find_email(State(state): State<SharedState>, Query(params): Params) -> Result<Json<Value>, ApiError> {
    authorize(&state, &params)?;
    let first_name = required(&params, "first_name")?;
    let last_name = required(&params, "last_name")?;
    let domain = required(&params, "domain")?;
    Ok(envelope(json!({
        "first_name": first_name,
        "last_name": last_name,
        "email": format!("{}.{}@{domain}", first_name.to_lowercase(), last_name.to_lowercase()),
        "score": 0.87,
    })))
}

async fn account(State(state): State<SharedState>, Query(params): Params) -> Result<Json<Value>, ApiError> {
    authorize(&state, &params)?;
    Ok(envelope(json!({
        "email": "owner@hunter.test",
        "plan_name": "Free",
        "requests": {"used": state.calls.load(Ordering::Relaxed)},
    })))
}

/// Reflect the verb, query params (minus the key) and request headers back.
async fn echo(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    Query(mut params): Params,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &params)?;
    params.remove("api_key");
    let params: BTreeMap<String, String> = params.into_iter().collect();
    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    Ok(envelope(json!({"method": method.as_str(), "params": params, "headers": headers})))
}
