//! ERP handler groups through the full router, without a socket.

use std::sync::Arc;

use async_trait::async_trait;
use direkt_core::{App, RequestContext};
use direkt_rs::erp::{Filter, Record, StoreError, Table};
use direkt_rs::{Application, ErpModule, ErpStore, MemoryStore, Operation, Rights, StaticUsers};
use serde_json::{json, Value};

fn users() -> StaticUsers {
    StaticUsers::new()
        .user("admin", Rights::new().grant_all("order").grant_all("category"))
        .user(
            "viewer",
            Rights::new()
                .grant("order", Operation::Read)
                .grant("category", Operation::Read),
        )
}

fn app_with(mut module: ErpModule) -> App {
    let mut app = Application::new();
    app.register(&mut module).unwrap();
    app.set_authenticator(users());
    app.build()
}

fn app() -> App {
    app_with(ErpModule::new().store(MemoryStore::new()))
}

async fn call(app: &App, login: &str, body: Value) -> Value {
    let mut req = RequestContext::post("router", "application/json", serde_json::to_vec(&body).unwrap());
    if !login.is_empty() {
        req.headers.push(("X-Login".into(), login.into()));
    }
    let resp = app.handle_request(&req).await;
    assert_eq!(resp.status_code, 200);
    serde_json::from_slice(&resp.body).unwrap()
}

fn rpc(action: &str, method: &str, data: Value, tid: u32) -> Value {
    json!({"type": "rpc", "action": action, "method": method, "data": data, "tid": tid})
}

#[tokio::test]
async fn unauthenticated_read_is_connect_error() {
    let app = app();
    let reply = call(
        &app,
        "",
        rpc("Order", "readOrder", json!({"filter": [{"property": "id", "value": 42}]}), 1),
    )
    .await;
    assert_eq!(reply["type"], "exception");
    assert_eq!(reply["tid"], 1);
    assert_eq!(reply["message"], "Connect Error: readOrder on action Order");
    assert_eq!(reply["result"], -100);
}

#[tokio::test]
async fn missing_store_is_connect_error() {
    let app = app_with(ErpModule::new());
    let reply = call(&app, "admin", rpc("Category", "readCategorieList", json!({}), 1)).await;
    assert_eq!(reply["message"], "Connect Error: readCategorieList on action Category");
}

#[tokio::test]
async fn missing_order_reads_as_empty_list() {
    let app = app();
    let reply = call(
        &app,
        "admin",
        rpc("Order", "readOrder", json!({"filter": [{"property": "id", "value": 42}]}), 7),
    )
    .await;
    assert_eq!(
        reply,
        json!({"type": "rpc", "tid": 7, "action": "Order", "method": "readOrder", "result": []})
    );
}

#[tokio::test]
async fn order_lifecycle() {
    let app = app();
    let created = call(
        &app,
        "admin",
        rpc(
            "Order",
            "createOrder",
            json!({"ref": "CO-0001", "customer_id": 5, "order_date": "2026-01-10"}),
            1,
        ),
    )
    .await;
    assert_eq!(created["result"]["id"], 1);
    assert_eq!(created["result"]["ref"], "CO-0001");

    let read = call(
        &app,
        "viewer",
        rpc("Order", "readOrder", json!({"filter": [{"property": "ref", "value": "CO-0001"}]}), 2),
    )
    .await;
    let row = &read["result"][0];
    assert_eq!(row["id"], 1);
    assert_eq!(row["customer_id"], 5);
    assert_eq!(row["orderstatus_id"], 0);
    assert_eq!(row["orderstatus"], "Draft");

    let updated = call(
        &app,
        "admin",
        rpc("Order", "updateOrder", json!([{"id": 1, "orderstatus_id": 1}]), 3),
    )
    .await;
    assert!(updated["result"].is_array());

    let list = call(
        &app,
        "viewer",
        rpc(
            "Order",
            "readOrderList",
            json!({"filter": [{"property": "orderstatus_id", "value": 1}]}),
            4,
        ),
    )
    .await;
    assert_eq!(list["result"].as_array().map(Vec::len), Some(1));
    assert_eq!(list["result"][0]["orderstatus"], "Validated");

    let destroyed = call(&app, "admin", rpc("Order", "destroyOrder", json!({"id": 1}), 5)).await;
    assert_eq!(destroyed["type"], "rpc");
    let again = call(&app, "admin", rpc("Order", "destroyOrder", json!({"id": 1}), 6)).await;
    assert_eq!(again["message"], "Update Error: destroyOrder on action Order");
}

#[tokio::test]
async fn write_errors_map_to_canonical_codes() {
    let app = app();
    let denied = call(&app, "viewer", rpc("Order", "createOrder", json!({"ref": "X"}), 1)).await;
    assert_eq!(denied["message"], "Permission Error: createOrder on action Order");

    let no_id = call(&app, "admin", rpc("Category", "updateCategorie", json!({"label": "x"}), 2)).await;
    assert_eq!(no_id["message"], "Parameter Error: updateCategorie on action Category");

    let absent = call(
        &app,
        "admin",
        rpc("Category", "updateCategorie", json!({"id": 99, "label": "x"}), 3),
    )
    .await;
    assert_eq!(absent["message"], "Update Error: updateCategorie on action Category");
    assert_eq!(absent["result"], -103);
}

#[tokio::test]
async fn order_lines_follow_their_order() {
    let app = app();
    call(&app, "admin", rpc("Order", "createOrder", json!({"ref": "CO-1"}), 1)).await;
    let lines = call(
        &app,
        "admin",
        rpc(
            "Order",
            "createOrderLine",
            json!([
                {"origin_id": 1, "product_id": 10, "qty_asked": 2},
                {"origin_id": 1, "product_id": 11, "qty_asked": 1}
            ]),
            2,
        ),
    )
    .await;
    assert_eq!(lines["result"][0]["origin_line_id"], 1);
    assert_eq!(lines["result"][1]["origin_line_id"], 2);

    let orphan = call(
        &app,
        "admin",
        rpc("Order", "createOrderLine", json!({"origin_id": 9, "product_id": 1}), 3),
    )
    .await;
    assert_eq!(orphan["message"], "Update Error: createOrderLine on action Order");

    let moved = call(
        &app,
        "admin",
        rpc(
            "Order",
            "updateOrderLine",
            json!({"origin_id": 1, "origin_line_id": 2, "qty_asked": 5}),
            4,
        ),
    )
    .await;
    assert_eq!(moved["type"], "rpc");

    let read = call(
        &app,
        "viewer",
        rpc("Order", "readOrderLine", json!({"filter": [{"property": "order_id", "value": 1}]}), 5),
    )
    .await;
    let rows = read["result"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["qty_asked"], 5);
    assert_eq!(rows[1]["origin_id"], 1);

    call(&app, "admin", rpc("Order", "destroyOrder", json!({"id": 1}), 6)).await;
    let read = call(
        &app,
        "viewer",
        rpc("Order", "readOrderLine", json!({"filter": [{"property": "order_id", "value": 1}]}), 7),
    )
    .await;
    assert_eq!(read["result"], json!([]));
}

#[tokio::test]
async fn order_status_takes_no_arguments() {
    let app = app();
    let reply = call(&app, "viewer", rpc("Order", "readOrderStatus", Value::Null, 1)).await;
    assert_eq!(reply["result"][0], json!({"id": -1, "status": "Canceled"}));
    assert_eq!(reply["result"].as_array().map(Vec::len), Some(5));

    let reply = call(&app, "viewer", rpc("Order", "readOrderStatus", json!([1]), 2)).await;
    assert_eq!(reply["message"], "Parameter Error: readOrderStatus on action Order");
}

#[tokio::test]
async fn availability_codes_need_only_a_login() {
    let app = app();
    let reply = call(&app, "viewer", rpc("Order", "readAvailabilityCodes", Value::Null, 1)).await;
    assert_eq!(reply["type"], "rpc");
    let codes = reply["result"].as_array().unwrap();
    assert_eq!(codes.len(), 4);
    assert_eq!(codes[0], json!({"id": 1, "code": "AV_NOW", "label": "Immediate"}));
    let ids: Vec<_> = codes.iter().map(|c| c["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let anonymous = call(&app, "", rpc("Order", "readAvailabilityCodes", Value::Null, 2)).await;
    assert_eq!(anonymous["message"], "Connect Error: readAvailabilityCodes on action Order");

    let extra = call(&app, "viewer", rpc("Order", "readAvailabilityCodes", json!([1]), 3)).await;
    assert_eq!(extra["message"], "Parameter Error: readAvailabilityCodes on action Order");
}

#[tokio::test]
async fn categories_by_type() {
    let app = app();
    call(
        &app,
        "admin",
        rpc(
            "Category",
            "createCategorie",
            json!([{"label": "Tools"}, {"label": "Resellers", "type": 2}]),
            1,
        ),
    )
    .await;
    let products = call(&app, "viewer", rpc("Category", "readCategorieList", json!({}), 2)).await;
    assert_eq!(products["result"], json!([{"id": 1, "categorie": "Tools"}]));
    let customers = call(
        &app,
        "viewer",
        rpc("Category", "readCategorieList", json!({"filter": [{"property": "type", "value": "2"}]}), 3),
    )
    .await;
    assert_eq!(customers["result"], json!([{"id": 2, "categorie": "Resellers"}]));

    let one = call(
        &app,
        "viewer",
        rpc("Category", "readCategorie", json!({"filter": [{"property": "label", "value": "Tools"}]}), 4),
    )
    .await;
    assert_eq!(one["result"][0]["description"], "");
}

#[tokio::test]
async fn batch_mixes_groups_and_keeps_order() {
    let app = app();
    let reply = call(
        &app,
        "viewer",
        json!([
            rpc("Order", "readOrderStatus", Value::Null, 1),
            rpc("Order", "createOrder", json!({"ref": "X"}), 2),
            rpc("Category", "readCategorieList", json!({}), 3),
            rpc("Invoice", "readInvoice", json!({}), 4),
        ]),
    )
    .await;
    let envs = reply.as_array().unwrap();
    let kinds: Vec<_> = envs.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["rpc", "exception", "rpc", "exception"]);
    let tids: Vec<_> = envs.iter().map(|e| e["tid"].as_u64().unwrap()).collect();
    assert_eq!(tids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn injected_filter_never_reaches_the_store() {
    let app = app();
    let reply = call(
        &app,
        "admin",
        rpc(
            "Order",
            "readOrder",
            json!({"filter": [{"property": "ref", "value": "x' OR '1'='1"}]}),
            1,
        ),
    )
    .await;
    assert_eq!(reply["message"], "Vulnerability Error: readOrder on action Order");
}

struct BrokenStore;

#[async_trait]
impl ErpStore for BrokenStore {
    async fn fetch(&self, _: Table, _: i64) -> Result<Option<Record>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn list(&self, table: Table, _: &Filter) -> Result<Vec<Record>, StoreError> {
        Err(StoreError::Query {
            table: table.as_str(),
            message: "syntax error".into(),
        })
    }
    async fn insert(&self, _: Table, _: Record) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn update(&self, _: Table, _: i64, _: Record) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn delete(&self, _: Table, _: i64) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn store_failures_are_sql_errors() {
    let app = app_with(ErpModule::new().shared(Arc::new(BrokenStore)));
    let reply = call(&app, "admin", rpc("Category", "readCategorieList", json!({}), 1)).await;
    assert_eq!(reply["message"], "SQL Error: readCategorieList on action Category");
    assert_eq!(reply["result"], -102);
}

#[tokio::test]
async fn api_lists_both_groups() {
    let app = app();
    let resp = app
        .handle_request(&RequestContext {
            method: "GET".into(),
            path: "/api".into(),
            ..RequestContext::default()
        })
        .await;
    let api: Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(api["actions"]["Category"].as_array().map(Vec::len), Some(5));
    assert_eq!(api["actions"]["Order"].as_array().map(Vec::len), Some(11));
    assert_eq!(api["actions"]["Order"][2], json!({"name": "readOrderStatus", "len": 0}));
}
