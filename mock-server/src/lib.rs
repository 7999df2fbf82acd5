use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

/// Header stamped on every fixture response.
pub const FIXTURE_HEADER: &str = "x-fixture";

/// Longest delay `/delay/{ms}` will honour.
pub const MAX_DELAY_MS: u64 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type Db = Arc<RwLock<BTreeMap<u32, Item>>>;

/// Items present when the server starts.
pub fn seed() -> BTreeMap<u32, Item> {
    [(1, "anvil"), (2, "bellows"), (3, "chisel")]
        .into_iter()
        .map(|(id, name)| {
            (
                id,
                Item {
                    id,
                    name: name.to_string(),
                },
            )
        })
        .collect()
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(seed()));
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item))
        .route("/status/{code}", get(status))
        .route("/delay/{ms}", get(delay))
        .route("/empty", get(empty))
        .layer(middleware::map_response(stamp))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "fixture server listening");
    }
    axum::serve(listener, app()).await
}

async fn stamp(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(FIXTURE_HEADER, HeaderValue::from_static("mock-server"));
    response
}

fn not_found(id: u32) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("item {id} not found"),
        }),
    )
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(State(db): State<Db>, Json(input): Json<CreateItem>) -> (StatusCode, Json<Item>) {
    let mut items = db.write().await;
    let id = items.keys().next_back().map_or(1, |last| last + 1);
    let item = Item { id, name: input.name };
    items.insert(id, item.clone());
    tracing::debug!(id, "item created");
    (StatusCode::CREATED, Json(item))
}

async fn get_item(
    State(db): State<Db>,
    Path(id): Path<u32>,
) -> Result<Json<Item>, (StatusCode, Json<ErrorBody>)> {
    let items = db.read().await;
    items.get(&id).cloned().map(Json).ok_or_else(|| not_found(id))
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, format!("invalid status {code}")).into_response(),
    }
}

async fn delay(State(db): State<Db>, Path(ms): Path<u64>) -> Result<Json<Item>, (StatusCode, Json<ErrorBody>)> {
    tokio::time::sleep(Duration::from_millis(ms.min(MAX_DELAY_MS))).await;
    let items = db.read().await;
    items.get(&1).cloned().map(Json).ok_or_else(|| not_found(1))
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}
