use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub mod state;

pub use state::{code, Params, ServerState, API_LEVEL, VERSION};

pub type Db = Arc<RwLock<ServerState>>;

/// Router over a freshly seeded fixture.
pub fn app() -> Router {
    app_with_state(ServerState::fixture())
}

pub fn app_with_state(state: ServerState) -> Router {
    let db: Db = Arc::new(RwLock::new(state));
    Router::new()
        .route("/api/", post(api))
        .route("/api", post(api))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Wrap an operation outcome in the API envelope. Application errors still
/// travel with HTTP 200.
pub fn envelope(seq: i64, result: Result<Value, &str>) -> Value {
    match result {
        Ok(content) => json!({ "seq": seq, "status": 0, "content": content }),
        Err(code) => json!({ "seq": seq, "status": 1, "content": { "error": code } }),
    }
}

/// The body is read as text rather than through `Json` so that requests
/// without a JSON content type are still accepted, as the real server does.
async fn api(State(db): State<Db>, body: String) -> Json<Value> {
    let request: Map<String, Value> = match serde_json::from_str(&body) {
        Ok(Value::Object(map)) => map,
        _ => return Json(envelope(0, Err(code::INCORRECT_USAGE))),
    };
    let params = Params(&request);
    let seq = params.int("seq").unwrap_or(0);
    let op = params.str("op").unwrap_or_default();
    let sid = params.str("sid").unwrap_or_default();

    let result = db.write().await.dispatch(op, sid, &params);
    Json(envelope(seq, result))
}
