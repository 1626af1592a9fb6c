use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use rmaledger_api::app::{router_with, AppServices};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory back-ends, bound to an ephemeral port.
        let app = router_with(Arc::new(AppServices::in_memory("/files")));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

const ACTOR: &str = "operador-1";

struct Location {
    product_id: String,
    location_id: String,
}

impl Location {
    fn new() -> Self {
        Self {
            product_id: Uuid::now_v7().to_string(),
            location_id: Uuid::now_v7().to_string(),
        }
    }

    fn stock_path(&self) -> String {
        format!("/inventory/{}/{}", self.product_id, self.location_id)
    }
}

async fn seed_stock(client: &reqwest::Client, srv: &TestServer, loc: &Location, quantity: i64) {
    let res = client
        .post(srv.url("/inventory/movements"))
        .header("X-Actor-Id", ACTOR)
        .json(&json!({
            "product_id": loc.product_id,
            "location_id": loc.location_id,
            "quantity": quantity,
            "direction": "entrada",
            "reason": "estoque inicial",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

async fn stock(client: &reqwest::Client, srv: &TestServer, loc: &Location) -> i64 {
    let res = client.get(srv.url(&loc.stock_path())).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["quantity"].as_i64().unwrap()
}

async fn create_customer_rma(
    client: &reqwest::Client,
    srv: &TestServer,
    loc: &Location,
    quantity: i64,
) -> reqwest::Response {
    client
        .post(srv.url("/rmas"))
        .header("X-Actor-Id", ACTOR)
        .json(&json!({
            "origin": "cliente",
            "category": "defeito",
            "product_id": loc.product_id,
            "location_id": loc.location_id,
            "customer_id": Uuid::now_v7().to_string(),
            "quantity": quantity,
            "reason": "Não liga",
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn mutations_require_an_actor() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let loc = Location::new();

    let res = client
        .post(srv.url("/rmas"))
        .json(&json!({ "origin": "cliente" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/inventory/movements"))
        .header("X-Actor-Id", "   ")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // reads do not need one
    let res = client.get(srv.url(&loc.stock_path())).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn customer_rma_lifecycle_create_cancel_delete() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let loc = Location::new();
    seed_stock(&client, &srv, &loc, 10).await;

    let res = create_customer_rma(&client, &srv, &loc, 3).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let rma: Value = res.json().await.unwrap();
    let id = rma["id"].as_str().unwrap().to_string();
    assert_eq!(rma["status"], "pendente");
    assert!(rma["number"].as_str().unwrap().starts_with("RMA"));
    assert_eq!(stock(&client, &srv, &loc).await, 7);

    // not deletable before cancellation
    let res = client
        .delete(srv.url(&format!("/rmas/{id}")))
        .header("X-Actor-Id", ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_delete_state");

    let res = client
        .post(srv.url(&format!("/rmas/{id}/cancel")))
        .header("X-Actor-Id", ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(stock(&client, &srv, &loc).await, 10);

    let history: Value = client
        .get(srv.url(&format!("/rmas/{id}/history")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let actions: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        vec!["mudanca_status", "movimentacao_estoque", "movimentacao_estoque", "criacao"]
    );

    let res = client
        .post(srv.url(&format!("/rmas/{id}/cancel")))
        .header("X-Actor-Id", ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .delete(srv.url(&format!("/rmas/{id}")))
        .header("X-Actor-Id", ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(srv.url(&format!("/rmas/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url(&format!("{}/movements", loc.stock_path())))
        .send()
        .await
        .unwrap();
    let movements: Value = res.json().await.unwrap();
    assert_eq!(movements.as_array().unwrap().len(), 3);
    assert_eq!(movements[1]["quantity_before"], 10);
    assert_eq!(movements[1]["quantity_after"], 7);
}

#[tokio::test]
async fn insufficient_stock_is_unprocessable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let loc = Location::new();
    seed_stock(&client, &srv, &loc, 4).await;

    let res = create_customer_rma(&client, &srv, &loc, 10).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["available"], 4);
    assert_eq!(body["requested"], 10);
    assert_eq!(stock(&client, &srv, &loc).await, 4);
}

#[tokio::test]
async fn supplier_rma_enters_stock_on_receipt() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let loc = Location::new();

    let res = client
        .post(srv.url("/rmas"))
        .header("X-Actor-Id", ACTOR)
        .json(&json!({
            "origin": "interno_fornecedor",
            "category": "garantia",
            "product_id": loc.product_id,
            "location_id": loc.location_id,
            "supplier_id": Uuid::now_v7().to_string(),
            "quantity": 5,
            "reason": "Lote com defeito",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let rma: Value = res.json().await.unwrap();
    let id = rma["id"].as_str().unwrap().to_string();
    assert_eq!(stock(&client, &srv, &loc).await, 0);

    let res = client
        .post(srv.url(&format!("/rmas/{id}/status")))
        .header("X-Actor-Id", ACTOR)
        .json(&json!({ "status": "recebido" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(stock(&client, &srv, &loc).await, 5);

    let res = client
        .get(srv.url(&format!("/rmas/{id}/history")))
        .send()
        .await
        .unwrap();
    let history: Value = res.json().await.unwrap();
    let actions: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["mudanca_status", "movimentacao_estoque", "criacao"]);

    let res = client
        .get(srv.url(&format!("{}/reconcile", loc.stock_path())))
        .send()
        .await
        .unwrap();
    let check: Value = res.json().await.unwrap();
    assert_eq!(check["consistent"], true);
}

#[tokio::test]
async fn list_filters_by_origin() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let loc = Location::new();
    seed_stock(&client, &srv, &loc, 10).await;
    assert_eq!(create_customer_rma(&client, &srv, &loc, 1).await.status(), StatusCode::CREATED);

    let res = client
        .get(srv.url("/rmas?origin=cliente&status=pendente"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 1);

    let res = client
        .get(srv.url("/rmas?origin=interno_fornecedor"))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn photos_upload_list_and_remove() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let loc = Location::new();
    seed_stock(&client, &srv, &loc, 10).await;
    let rma: Value = create_customer_rma(&client, &srv, &loc, 1).await.json().await.unwrap();
    let id = rma["id"].as_str().unwrap().to_string();

    let form = reqwest::multipart::Form::new().part(
        "files",
        reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G', 0, 1])
            .file_name("frente.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let res = client
        .post(srv.url(&format!("/rmas/{id}/photos")))
        .header("X-Actor-Id", ACTOR)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let photos: Value = res.json().await.unwrap();
    let photo_id = photos[0]["id"].as_str().unwrap().to_string();
    assert_eq!(photos[0]["file_name"], "frente.png");

    let bad = reqwest::multipart::Form::new().part(
        "files",
        reqwest::multipart::Part::bytes(b"%PDF".to_vec())
            .file_name("nota.pdf")
            .mime_str("application/pdf")
            .unwrap(),
    );
    let res = client
        .post(srv.url(&format!("/rmas/{id}/photos")))
        .header("X-Actor-Id", ACTOR)
        .multipart(bad)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let listed: Value = client
        .get(srv.url(&format!("/rmas/{id}/photos")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let res = client
        .delete(srv.url(&format!("/photos/{photo_id}")))
        .header("X-Actor-Id", ACTOR)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let listed: Value = client
        .get(srv.url(&format!("/rmas/{id}/photos")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_accepts_photos_in_a_multipart_form() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let loc = Location::new();
    seed_stock(&client, &srv, &loc, 5).await;

    let body = json!({
        "origin": "cliente",
        "category": "defeito",
        "product_id": loc.product_id,
        "location_id": loc.location_id,
        "customer_id": Uuid::now_v7().to_string(),
        "quantity": 2,
        "reason": "Carcaça quebrada",
    });
    let form = reqwest::multipart::Form::new()
        .text("rma", body.to_string())
        .part(
            "files",
            reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G', 0, 1])
                .file_name("caixa.png")
                .mime_str("image/png")
                .unwrap(),
        );
    let res = client
        .post(srv.url("/rmas"))
        .header("X-Actor-Id", ACTOR)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let rma: Value = res.json().await.unwrap();
    let id = rma["id"].as_str().unwrap().to_string();
    assert_eq!(stock(&client, &srv, &loc).await, 3);

    let photos: Value = client
        .get(srv.url(&format!("/rmas/{id}/photos")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(photos.as_array().unwrap().len(), 1);
    assert_eq!(photos[0]["file_name"], "caixa.png");

    // a form without the case fields is rejected before anything is stored
    let form = reqwest::multipart::Form::new().part(
        "files",
        reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G'])
            .file_name("so_foto.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let res = client
        .post(srv.url("/rmas"))
        .header("X-Actor-Id", ACTOR)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stock(&client, &srv, &loc).await, 3);
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/rmas/not-a-uuid")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}
