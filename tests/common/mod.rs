#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use model_forge::{app, AppState, Claims, MemoryTableStore, ModelRegistry, SchemaStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub store: Arc<SchemaStore>,
    pub tables: Arc<MemoryTableStore>,
    pub state: AppState,
    pub router: Router,
}

pub fn token(role: Option<&str>) -> String {
    let claims = Claims {
        id: json!(1),
        username: "tester".into(),
        role: role.map(String::from),
        exp: 4_102_444_800,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

pub async fn spawn() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SchemaStore::open(dir.path()).await.unwrap());
    let tables = Arc::new(MemoryTableStore::new());
    let state = AppState::new(store.clone(), tables.clone(), ModelRegistry::new(), SECRET, 5);
    let router = app(state.clone());
    TestApp {
        dir,
        store,
        tables,
        state,
        router,
    }
}

pub fn book() -> Value {
    json!({
        "name": "Book",
        "fields": [
            { "name": "title", "type": "string", "required": true },
            { "name": "price", "type": "float" }
        ],
        "rbac": { "admin": ["all"], "manager": ["read"] }
    })
}

impl TestApp {
    /// Send a request; `bearer` is a full token, or None for no Authorization header.
    pub async fn send(&self, method: Method, uri: &str, bearer: Option<String>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn as_role(&self, role: &str, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(token(Some(role))), body).await
    }

    /// Create a model as admin and wait for the background reload to bind it.
    pub async fn create_model(&self, def: Value) -> (StatusCode, Value) {
        let name = def["name"].as_str().unwrap_or_default().trim().to_string();
        let res = self.as_role("admin", Method::POST, "/api/models/create-model", Some(def)).await;
        if res.0 == StatusCode::OK {
            self.wait_for_model(&name).await;
        }
        res
    }

    pub async fn wait_for_model(&self, name: &str) {
        for _ in 0..200 {
            if self.state.registry.get(name).is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("model {name} was never bound");
    }
}
