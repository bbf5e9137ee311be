mod common;

use axum::http::{Method, StatusCode};
use common::{book, spawn};
use model_forge::TableStore;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn create_then_fetch_round_trips_fields() {
    let app = spawn().await;
    let (status, body) = app.create_model(book()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Book");
    assert!(body["data"]["message"].is_string());

    let (status, body) = app.as_role("viewer", Method::GET, "/api/models/get-model/Book", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["existsInDatabase"], true);
    assert_eq!(
        data["definition"]["fields"],
        json!([
            { "name": "title", "type": "string", "required": true },
            { "name": "price", "type": "float", "required": false }
        ])
    );
    assert_eq!(data["definition"]["rbac"], json!({ "admin": ["all"], "manager": ["read"] }));
    assert_eq!(data["sample"], json!([]));
}

#[tokio::test]
async fn get_model_samples_are_capped() {
    let app = spawn().await;
    app.create_model(book()).await;
    for i in 0..7 {
        let (status, _) = app
            .as_role("admin", Method::POST, "/api/books", Some(json!({ "title": format!("t{i}") })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, body) = app.as_role("manager", Method::GET, "/api/models/get-model/book", None).await;
    assert_eq!(body["data"]["sample"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn get_models_reports_table_presence() {
    let app = spawn().await;
    app.create_model(book()).await;
    // A definition on disk whose table was never created.
    app.store
        .write(&serde_json::from_value(json!({ "name": "Orphan", "fields": [] })).unwrap())
        .await
        .unwrap();

    let (status, body) = app.as_role("guest", Method::GET, "/api/models/get-models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 2);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows[0]["name"], "Book");
    assert_eq!(rows[0]["existsInDatabase"], true);
    assert_eq!(rows[0]["tableName"], "books");
    assert_eq!(rows[1]["name"], "Orphan");
    assert_eq!(rows[1]["existsInDatabase"], false);
}

#[tokio::test]
async fn admin_routes_check_role() {
    let app = spawn().await;
    let (status, _) = app.send(Method::POST, "/api/models/create-model", None, Some(book())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send(Method::POST, "/api/models/create-model", Some("garbage".into()), Some(book()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.as_role("manager", Method::POST, "/api/models/create-model", Some(book())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!app.store.exists("Book").await.unwrap());

    let (status, _) = app.as_role("ADMIN", Method::POST, "/api/models/create-model", Some(book())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.as_role("guest", Method::GET, "/api/models/models", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.as_role("viewer", Method::GET, "/api/models/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "Book");
}

#[tokio::test]
async fn invalid_definitions_are_rejected_without_persisting() {
    let app = spawn().await;
    for def in [
        json!({ "fields": [] }),
        json!({ "name": "Book" }),
        json!({ "name": "bad name", "fields": [] }),
        json!({ "name": "Model", "fields": [] }),
        json!({ "name": "Book", "fields": [{ "name": "id", "type": "integer" }] }),
        json!({ "name": "Book", "fields": [{ "name": "n", "type": "number", "default": "many" }] }),
        json!({ "name": "Book", "fields": [], "rbac": { "admin": ["fly"] } }),
    ] {
        let (status, body) = app.as_role("admin", Method::POST, "/api/models/create-model", Some(def)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    }
    assert!(app.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let app = spawn().await;
    app.create_model(book()).await;
    let mut again = book();
    again["name"] = json!("book");
    let (status, body) = app.as_role("admin", Method::POST, "/api/models/create-model", Some(again)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_yield_one_success() {
    let app = Arc::new(spawn().await);
    let n = 10;
    let mut handles = Vec::new();
    for _ in 0..n {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.as_role("admin", Method::POST, "/api/models/create-model", Some(book())).await.0
        }));
    }
    let mut statuses = Vec::new();
    for h in handles {
        statuses.push(h.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), n - 1);
}

#[tokio::test]
async fn delete_model_drops_everything() {
    let app = spawn().await;
    app.create_model(book()).await;
    let (status, body) = app.as_role("admin", Method::DELETE, "/api/models/delete-model/Book", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Book");
    assert!(!app.tables.table_exists("books").await.unwrap());
    assert!(app.state.registry.is_empty());
    assert!(!app.store.exists("Book").await.unwrap());

    let (status, _) = app.as_role("admin", Method::GET, "/api/books", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_unknown_model_changes_nothing() {
    let app = spawn().await;
    app.create_model(book()).await;
    let (status, _) = app.as_role("admin", Method::DELETE, "/api/models/delete-model/Ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.state.registry.names(), vec!["Book".to_string()]);
    assert_eq!(app.store.list().await.unwrap().len(), 1);
    assert!(app.tables.table_exists("books").await.unwrap());
}

#[tokio::test]
async fn update_model_reconciles_table() {
    let app = spawn().await;
    app.create_model(book()).await;
    let (status, body) = app
        .as_role(
            "admin",
            Method::PUT,
            "/api/models/update-model/book",
            Some(json!({
                "fields": [
                    { "name": "title", "type": "string", "required": true },
                    { "name": "pages", "type": "integer", "default": "100" }
                ],
                "rbac": { "admin": ["all"], "manager": ["read", "create"] }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["name"], "Book");
    assert_eq!(body["data"]["fields"][1]["default"], 100);

    let cols = app.tables.describe_table("books").await.unwrap().unwrap();
    let names: Vec<_> = cols.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"pages"));
    assert!(!names.contains(&"price"));

    // The new policy applies at once.
    let (status, body) = app
        .as_role("manager", Method::POST, "/api/books/", Some(json!({ "title": "Dune" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["pages"], 100);
}

#[tokio::test]
async fn failed_update_keeps_serving_old_layout() {
    let app = spawn().await;
    app.create_model(book()).await;
    app.as_role("admin", Method::POST, "/api/books", Some(json!({ "title": "Dune" }))).await;
    let before = app.state.registry.get("Book").unwrap();

    let (status, _) = app
        .as_role(
            "admin",
            Method::PUT,
            "/api/models/update-model/Book",
            Some(json!({
                "fields": [
                    { "name": "title", "type": "string", "required": true },
                    { "name": "isbn", "type": "string", "required": true }
                ],
                "rbac": { "admin": ["all"] }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(Arc::ptr_eq(&before, &app.state.registry.get("Book").unwrap()));

    let (status, body) = app.as_role("admin", Method::GET, "/api/books/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Dune");
}

#[tokio::test]
async fn update_cannot_rename_or_target_unknown_models() {
    let app = spawn().await;
    app.create_model(book()).await;
    let (status, _) = app
        .as_role("admin", Method::PUT, "/api/models/update-model/Book", Some(json!({ "name": "Novel", "fields": [] })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = app
        .as_role("admin", Method::PUT, "/api/models/update-model/Ghost", Some(json!({ "fields": [] })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_is_idempotent() {
    let app = spawn().await;
    app.create_model(book()).await;
    let before = app.tables.describe_table("books").await.unwrap();
    assert_eq!(app.state.mutator.reload().await.unwrap(), 1);
    assert_eq!(app.state.mutator.reload().await.unwrap(), 1);
    assert_eq!(app.tables.describe_table("books").await.unwrap(), before);
}

#[tokio::test]
async fn health_and_ready_need_no_token() {
    let app = spawn().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, body) = app.send(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn defaults_must_match_their_field_type() {
    let app = spawn().await;
    for (tag, default) in [
        ("boolean", json!("abc")),
        ("integer", json!(1.5)),
        ("number", json!("ten")),
        ("float", json!(true)),
        ("date", json!("someday")),
        ("string", json!(12)),
        ("text", json!(["a"])),
    ] {
        let def = json!({ "name": "Typed", "fields": [{ "name": "f", "type": tag, "default": default }] });
        let (status, body) = app.as_role("admin", Method::POST, "/api/models/create-model", Some(def)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{tag}: {body}");
        assert_eq!(body["error"]["code"], "validation_error", "{body}");
    }
    assert!(app.store.list().await.unwrap().is_empty());

    let (status, body) = app
        .create_model(json!({
            "name": "Typed",
            "fields": [
                { "name": "active", "type": "boolean", "default": "true" },
                { "name": "count", "type": "integer", "default": 3 },
                { "name": "ratio", "type": "float", "default": "0.5" },
                { "name": "since", "type": "date", "default": "2024-05-01" },
                { "name": "label", "type": "string", "default": "new" }
            ],
            "rbac": { "admin": ["all"] }
        }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = app.as_role("admin", Method::POST, "/api/typeds", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["active"], true);
    assert_eq!(body["data"]["count"], 3);
    assert_eq!(body["data"]["ratio"], 0.5);
    assert_eq!(body["data"]["since"], "2024-05-01T00:00:00+00:00");
    assert_eq!(body["data"]["label"], "new");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_update_and_delete_stay_consistent() {
    let app = Arc::new(spawn().await);
    for _ in 0..10 {
        app.create_model(book()).await;
        let a = app.clone();
        let update = tokio::spawn(async move {
            a.as_role(
                "admin",
                Method::PUT,
                "/api/models/update-model/Book",
                Some(json!({ "fields": [{ "name": "title", "type": "text" }], "rbac": { "admin": ["all"] } })),
            )
            .await
            .0
        });
        let a = app.clone();
        let delete = tokio::spawn(async move {
            a.as_role("admin", Method::DELETE, "/api/models/delete-model/Book", None).await.0
        });
        let updated = update.await.unwrap();
        assert!(updated == StatusCode::OK || updated == StatusCode::NOT_FOUND, "{updated}");
        assert_eq!(delete.await.unwrap(), StatusCode::OK);

        assert!(!app.store.exists("Book").await.unwrap());
        assert!(!app.tables.table_exists("books").await.unwrap());
        assert!(app.state.registry.get("Book").is_none());
        let (status, _) = app.as_role("admin", Method::GET, "/api/books", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mutations_on_two_models_both_complete() {
    let app = Arc::new(spawn().await);
    app.create_model(book()).await;
    let mut author = book();
    author["name"] = json!("Author");
    app.create_model(author).await;

    let a = app.clone();
    let update = tokio::spawn(async move {
        a.as_role(
            "admin",
            Method::PUT,
            "/api/models/update-model/Book",
            Some(json!({ "fields": [{ "name": "title", "type": "text" }], "rbac": { "admin": ["all"] } })),
        )
        .await
        .0
    });
    let a = app.clone();
    let delete = tokio::spawn(async move {
        a.as_role("admin", Method::DELETE, "/api/models/delete-model/Author", None).await.0
    });
    assert_eq!(update.await.unwrap(), StatusCode::OK);
    assert_eq!(delete.await.unwrap(), StatusCode::OK);

    assert_eq!(app.state.registry.names(), vec!["Book".to_string()]);
    assert!(!app.tables.table_exists("authors").await.unwrap());
    let cols = app.tables.describe_table("books").await.unwrap().unwrap();
    assert!(!cols.iter().any(|c| c.name == "price"));
}
