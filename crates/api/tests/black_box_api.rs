//! End-to-end tests over a real listening server: JWT auth, the catalog and
//! supplier surfaces, the full restocking workflow, and e-book uploads.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use libram_api::app::covers::{CoverLookupError, CoverSource};
use libram_api::app::{build_router, services};
use libram_auth::{JwtClaims, PrincipalId, Role};

const SECRET: &str = "black-box-secret";

struct StubCovers(Option<String>);

impl CoverSource for StubCovers {
    fn lookup(&self, _title: &str, _author: &str) -> Result<Option<String>, CoverLookupError> {
        Ok(self.0.clone())
    }
}

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    _asset_dir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with_covers(Arc::new(StubCovers(None))).await
    }

    async fn spawn_with_covers(covers: Arc<dyn CoverSource>) -> Self {
        let asset_dir = tempfile::tempdir().unwrap();
        let services = Arc::new(services::build_services(
            asset_dir.path().to_path_buf(),
            covers,
        ));
        let app = build_router(SECRET.to_string(), services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _asset_dir: asset_dir,
        }
    }

    fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(token)
    }

    fn post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(token)
    }

    async fn post_json(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.post(path, token).json(&body).send().await.unwrap()
    }

    async fn add_book(&self, token: &str, title: &str, stock: i64) -> String {
        let resp = self
            .post_json(
                "/catalog/books",
                token,
                json!({
                    "title": title,
                    "author": "N. Okorafor",
                    "price_cents": 1899,
                    "category": "fiction",
                    "item_type": "hybrid",
                    "location": "A-12",
                    "image_url": null,
                    "initial_stock": stock,
                }),
            )
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }
}

fn mint_token(roles: &[&'static str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        roles: roles.iter().map(|r| Role::new(*r)).collect(),
        issued_at: now - Duration::minutes(1),
        expires_at: now + Duration::minutes(30),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn health_is_open_but_everything_else_needs_a_token() {
    let server = TestServer::spawn().await;

    let resp = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = reqwest::get(format!("{}/whoami", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server.get("/whoami", "not-a-jwt").send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn whoami_reflects_token_roles() {
    let server = TestServer::spawn().await;
    let token = mint_token(&["staff"]);

    let resp = server.get("/whoami", &token).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["roles"], json!(["staff"]));
}

#[tokio::test]
async fn member_is_forbidden_from_the_supply_workflow() {
    let server = TestServer::spawn().await;
    let member = mint_token(&["member"]);

    let resp = server
        .post("/supplier/shortlist", &member)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = server.get("/supplier/shortlist", &member).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    // Reads of the catalog stay open to any authenticated principal.
    let resp = server.get("/catalog/books", &member).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn staff_cannot_authorize_orders() {
    let server = TestServer::spawn().await;
    let staff = mint_token(&["staff"]);

    let resp = server.get("/supplier/review", &staff).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    let resp = server
        .post_json("/suppliers", &staff, json!({ "name": "Inkwell" }))
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn full_restocking_workflow() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    let low_id = server.add_book(&admin, "Salt Roads", 2).await;
    let healthy_id = server.add_book(&admin, "The Long Autumn", 12).await;

    // Scan picks up only the low-stock title, at the default requested
    // quantity.
    let resp = server.post("/supplier/shortlist", &admin).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], "shortlist");
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["book_id"], json!(low_id));
    assert_eq!(items[0]["mass"], 5);
    assert_eq!(items[0]["payload"], Value::Null);
    let order_id = order["id"].as_str().unwrap().to_string();

    // A healthy book can still be lifted on manually.
    let resp = server
        .post(&format!("/supplier/lift/{healthy_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let order: Value = resp.json().await.unwrap();
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let low_item = items
        .iter()
        .find(|i| i["book_id"] == json!(low_id))
        .unwrap()["item_id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .post_json(
            &format!("/supplier/adjust_mass/{low_item}"),
            &admin,
            json!({ "action": "increase" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["mass"], 6);
    assert_eq!(body["redirect"], "/supplier/shortlist");

    let resp = server.post("/supplier/submit_review", &admin).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "pending_review");

    let resp = server.get("/supplier/review", &admin).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let resp = server
        .post_json(
            "/suppliers",
            &admin,
            json!({ "name": "Inkwell Distribution", "contact": { "email": "orders@inkwell.test" } }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let supplier_id = resp.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .post_json(
            &format!("/supplier/launch/{order_id}"),
            &admin,
            json!({ "supplier_id": supplier_id }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "placed");

    let resp = server
        .get(&format!("/supplier/confirmation/{order_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Inkwell Distribution"));
    assert!(message.contains("Salt Roads (Qty: 6)"));
    assert!(message.contains("The Long Autumn (Qty: 5)"));

    let resp = server.get("/supplier/receive_list", &admin).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    // First received-quantity adjustment starts from the requested quantity.
    let resp = server
        .post_json(
            &format!("/supplier/update_payload/{low_item}"),
            &admin,
            json!({ "action": "increase" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["payload"], 7);

    let resp = server
        .post(&format!("/supplier/fusion/{order_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "completed");
    let receipts = body["receipts"].as_array().unwrap();
    assert_eq!(receipts.len(), 2);
    let low_receipt = receipts
        .iter()
        .find(|r| r["book_id"] == json!(low_id))
        .unwrap();
    assert_eq!(low_receipt["quantity"], 7);
    let healthy_receipt = receipts
        .iter()
        .find(|r| r["book_id"] == json!(healthy_id))
        .unwrap();
    assert_eq!(healthy_receipt["quantity"], 5);

    // Stock was credited synchronously.
    let resp = server
        .get(&format!("/catalog/books/{low_id}"), &admin)
        .send()
        .await
        .unwrap();
    let book: Value = resp.json().await.unwrap();
    assert_eq!(book["stock_total"], 9);
    assert_eq!(book["stock_available"], 9);
    assert_eq!(book["low_stock"], false);

    let resp = server.get("/supplier/receive_list", &admin).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());

    // The completed order no longer serves as the shortlist; a fresh scan
    // opens a new one and finds nothing low.
    let resp = server.post("/supplier/shortlist", &admin).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let order: Value = resp.json().await.unwrap();
    assert_ne!(order["id"], json!(order_id));
    assert!(order["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn viewing_the_shortlist_also_scans() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);
    let staff = mint_token(&["staff"]);

    let low_id = server.add_book(&admin, "Midnight Robber", 2).await;

    // The shortlist is assembled on access: a plain GET picks up the
    // low-stock book without a prior POST.
    let resp = server.get("/supplier/shortlist", &staff).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let order: Value = resp.json().await.unwrap();
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["book_id"], json!(low_id));
    assert_eq!(items[0]["mass"], 5);
}

#[tokio::test]
async fn scanning_twice_does_not_duplicate_items() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    server.add_book(&admin, "Kindred", 1).await;

    let resp = server.post("/supplier/shortlist", &admin).send().await.unwrap();
    let first: Value = resp.json().await.unwrap();
    assert_eq!(first["items"].as_array().unwrap().len(), 1);

    let resp = server.post("/supplier/shortlist", &admin).send().await.unwrap();
    let second: Value = resp.json().await.unwrap();
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert_eq!(second["items"][0]["item_id"], first["items"][0]["item_id"]);
}

#[tokio::test]
async fn dropping_an_item_removes_it_from_the_shortlist() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    // Healthy stock, so the scan that runs on every shortlist access cannot
    // put the book back after the drop.
    let book_id = server.add_book(&admin, "Parable", 9).await;
    let resp = server
        .post(&format!("/supplier/lift/{book_id}"), &admin)
        .send()
        .await
        .unwrap();
    let order: Value = resp.json().await.unwrap();
    let item_id = order["items"][0]["item_id"].as_str().unwrap().to_string();

    let resp = server
        .post(&format!("/supplier/drop/{item_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server.get("/supplier/shortlist", &admin).send().await.unwrap();
    let order: Value = resp.json().await.unwrap();
    assert!(order["items"].as_array().unwrap().is_empty());

    // The item is gone; addressing it again is a 404.
    let resp = server
        .post(&format!("/supplier/drop/{item_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn invoice_endpoints_require_a_placed_order() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    server.add_book(&admin, "Binti", 3).await;
    let resp = server.post("/supplier/shortlist", &admin).send().await.unwrap();
    let order: Value = resp.json().await.unwrap();
    let order_id = order["id"].as_str().unwrap().to_string();

    // Not placed with a supplier yet.
    let resp = server
        .get(&format!("/supplier/confirmation/{order_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let resp = server
        .get(&format!("/supplier/receive/{order_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn download_invoice_returns_a_pdf_attachment() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    server.add_book(&admin, "Lagoon", 2).await;
    let resp = server.post("/supplier/shortlist", &admin).send().await.unwrap();
    let order: Value = resp.json().await.unwrap();
    let order_id = order["id"].as_str().unwrap().to_string();

    server.post("/supplier/submit_review", &admin).send().await.unwrap();
    let resp = server
        .post_json("/suppliers", &admin, json!({ "name": "Inkwell" }))
        .await;
    let supplier_id = resp.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    server
        .post_json(
            &format!("/supplier/launch/{order_id}"),
            &admin,
            json!({ "supplier_id": supplier_id }),
        )
        .await;

    let resp = server
        .get(&format!("/supplier/download_invoice/{order_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
    let disposition = resp.headers()["content-disposition"].to_str().unwrap();
    assert!(disposition.contains(&format!("Invoice_{order_id}.pdf")));
    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn launching_with_an_unknown_supplier_is_a_404() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    server.add_book(&admin, "Wild Seed", 1).await;
    let resp = server.post("/supplier/shortlist", &admin).send().await.unwrap();
    let order: Value = resp.json().await.unwrap();
    let order_id = order["id"].as_str().unwrap().to_string();
    server.post("/supplier/submit_review", &admin).send().await.unwrap();

    let resp = server
        .post_json(
            &format!("/supplier/launch/{order_id}"),
            &admin,
            json!({ "supplier_id": uuid::Uuid::now_v7().to_string() }),
        )
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn ebook_upload_read_listen_and_delete() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    let pdf_bytes = b"%PDF-1.4 fake body".to_vec();
    let form = reqwest::multipart::Form::new()
        .text("title", "The Long Autumn")
        .text("author", "R. Castellan")
        .text("description", "A novel.")
        .part(
            "file",
            reqwest::multipart::Part::bytes(pdf_bytes.clone()).file_name("the long autumn.pdf"),
        );
    let resp = server
        .post("/ebooks/upload", &admin)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let ebook_id = resp.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server.get("/ebooks", &admin).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "The Long Autumn");
    // No cover was uploaded; the placeholder stands in.
    assert!(items[0]["cover_url"].as_str().unwrap().contains("placeholder"));

    let resp = server
        .get(&format!("/ebooks/read/{ebook_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
    assert_eq!(resp.bytes().await.unwrap().to_vec(), pdf_bytes);

    let resp = server
        .get(&format!("/ebooks/listen/{ebook_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = server
        .post(&format!("/ebooks/delete/{ebook_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server
        .get(&format!("/ebooks/read/{ebook_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn ebook_upload_rejects_wrong_file_types() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    let form = reqwest::multipart::Form::new()
        .text("title", "Notes")
        .text("author", "Anon")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"plain".to_vec()).file_name("notes.txt"),
        );
    let resp = server
        .post("/ebooks/upload", &admin)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let form = reqwest::multipart::Form::new()
        .text("title", "Notes")
        .text("author", "Anon")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"%PDF-1.4".to_vec()).file_name("notes.pdf"),
        )
        .part(
            "audio",
            reqwest::multipart::Part::bytes(b"%PDF-1.4".to_vec()).file_name("narration.pdf"),
        );
    let resp = server
        .post("/ebooks/upload", &admin)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Members cannot upload at all.
    let member = mint_token(&["member"]);
    let form = reqwest::multipart::Form::new().text("title", "x");
    let resp = server
        .post("/ebooks/upload", &member)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn ebook_with_audio_companion_streams_it() {
    let server = TestServer::spawn().await;
    let admin = mint_token(&["admin"]);

    let audio_bytes = b"ID3 fake mp3".to_vec();
    let form = reqwest::multipart::Form::new()
        .text("title", "Salt Roads")
        .text("author", "N. Hopkinson")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"%PDF-1.4".to_vec()).file_name("salt_roads.pdf"),
        )
        .part(
            "audio",
            reqwest::multipart::Part::bytes(audio_bytes.clone()).file_name("salt_roads.mp3"),
        );
    let resp = server
        .post("/ebooks/upload", &admin)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let ebook_id = resp.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .get(&format!("/ebooks/listen/{ebook_id}"), &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "audio/mpeg"
    );
    assert_eq!(resp.bytes().await.unwrap().to_vec(), audio_bytes);
}

#[tokio::test]
async fn cover_backfill_fills_books_without_images() {
    let server = TestServer::spawn_with_covers(Arc::new(StubCovers(Some(
        "https://covers.test/found.jpg".to_string(),
    ))))
    .await;
    let admin = mint_token(&["admin"]);

    let bare_id = server.add_book(&admin, "Uncovered", 8).await;
    let resp = server
        .post_json(
            "/catalog/books",
            &admin,
            json!({
                "title": "Covered",
                "author": "A. Author",
                "price_cents": 999,
                "category": "fiction",
                "item_type": "sale",
                "location": "B-1",
                "image_url": "https://covers.test/existing.jpg",
                "initial_stock": 8,
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let resp = server
        .post("/catalog/covers/backfill", &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["updated"], 1);
    assert_eq!(body["skipped"], 1);

    let resp = server
        .get(&format!("/catalog/books/{bare_id}"), &admin)
        .send()
        .await
        .unwrap();
    let book: Value = resp.json().await.unwrap();
    assert_eq!(book["image_url"], "https://covers.test/found.jpg");
}
