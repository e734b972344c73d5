// tests/api_tests.rs
//
// End-to-end tests against a real Postgres. They are skipped when
// DATABASE_URL is not set.

use std::io::Cursor;

use reqwest::multipart::{Form, Part};
use sqlx::{PgPool, postgres::PgPoolOptions};
use survey_backend::{
    config::Config, routes, state::AppState, utils::storage::CertificateStorage,
};
use tempfile::TempDir;

struct TestApp {
    address: String,
    pool: PgPool,
    media: TempDir,
}

/// Spawns the app on a random port with its own media directory.
/// Returns `None` when no database is configured.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let media = TempDir::new().expect("Failed to create media dir");
    let config = Config {
        database_url,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        media_root: media.path().to_path_buf(),
        page_size: 10,
        max_upload_bytes: 5 * 1024 * 1024,
        questions_seed_path: None,
        cors_origins: vec!["http://localhost:3000".to_string()],
    };

    let state = AppState {
        pool: pool.clone(),
        storage: CertificateStorage::new(media.path()),
        config,
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp { address, pool, media })
}

fn unique_email() -> String {
    format!("t{}@survey.test", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

fn pdf(name: &str) -> Part {
    Part::bytes(format!("%PDF-1.4 {}", name).into_bytes())
        .file_name(name.to_string())
        .mime_str("application/pdf")
        .unwrap()
}

fn response_form(email: &str) -> Form {
    Form::new()
        .text("full_name", "Ada Lovelace")
        .text("email_address", email.to_string())
        .text("description", "Writes programs for engines")
        .text("gender", "FEMALE")
        .text("programming_stack", "RUST,SQL")
}

async fn create_response(app: &TestApp, form: Form) -> serde_json::Value {
    let response = reqwest::Client::new()
        .post(format!("{}/responses/", app.address))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

async fn count_certificates(pool: &PgPool, response_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM certificates WHERE response_id = $1")
        .bind(response_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn submit_with_pdf_certificate() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let email = unique_email();

    // Act
    let body = create_response(&app, response_form(&email).part("certificates", pdf("cert.pdf"))).await;

    // Assert
    assert_eq!(body["email_address"], email.as_str());
    let certificates = body["certificates"].as_array().unwrap();
    assert_eq!(certificates.len(), 1);

    let file = certificates[0]["file"].as_str().unwrap();
    assert!(file.starts_with("certificates/cert"));
    assert!(app.media.path().join(file).exists());
}

#[tokio::test]
async fn submit_with_non_pdf_creates_nothing() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let email = unique_email();
    let exe = Part::bytes(b"MZ".to_vec()).file_name("cert.exe");

    // Act
    let response = reqwest::Client::new()
        .post(format!("{}/responses/", app.address))
        .multipart(response_form(&email).part("certificates", exe))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE email_address = $1")
        .bind(&email)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn list_filters_by_email_substring() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let email = unique_email();
    create_response(&app, response_form(&email)).await;
    create_response(&app, response_form(&unique_email())).await;

    let token = email.split('@').next().unwrap().to_uppercase();

    // Act
    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/responses/", app.address))
        .query(&[("email_address", token.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(body["count"], 1);
    assert!(body["next"].is_null());
    assert!(body["previous"].is_null());
    assert_eq!(body["question_responses"][0]["email_address"], email.as_str());
}

#[tokio::test]
async fn page_past_the_end_is_404() {
    let Some(app) = spawn_app().await else { return };

    let response = reqwest::Client::new()
        .get(format!("{}/responses/", app.address))
        .query(&[("email_address", "no-such-respondent"), ("page", "2")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn update_replaces_certificates() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let created = create_response(&app, response_form(&unique_email()).part("certificates", pdf("old.pdf"))).await;
    let id = created["id"].as_i64().unwrap();
    let old_file = created["certificates"][0]["file"].as_str().unwrap().to_string();

    // Act
    let response = reqwest::Client::new()
        .patch(format!("{}/responses/{}/", app.address, id))
        .multipart(
            Form::new()
                .text("full_name", "Ada King")
                .part("certificates", pdf("new.pdf")),
        )
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["full_name"], "Ada King");
    assert_eq!(body["gender"], "FEMALE");

    let certificates = body["certificates"].as_array().unwrap();
    assert_eq!(certificates.len(), 1);
    assert!(certificates[0]["file"].as_str().unwrap().starts_with("certificates/new"));
    assert!(!app.media.path().join(old_file).exists());
}

#[tokio::test]
async fn put_requires_every_field() {
    let Some(app) = spawn_app().await else { return };
    let created = create_response(&app, response_form(&unique_email())).await;
    let id = created["id"].as_i64().unwrap();

    let response = reqwest::Client::new()
        .put(format!("{}/responses/{}/", app.address, id))
        .multipart(Form::new().text("full_name", "Ada King"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["fields"]["email_address"][0]["code"], "required");
}

#[tokio::test]
async fn upload_attaches_to_existing_response() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let created = create_response(&app, response_form(&unique_email())).await;
    let id = created["id"].as_i64().unwrap();
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(format!("{}/upload-certificate/", app.address))
        .multipart(
            Form::new()
                .text("response", id.to_string())
                .part("certificates", pdf("a.pdf"))
                .part("certificates", pdf("b.pdf")),
        )
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["certificates_uploaded"].as_array().unwrap().len(), 2);
    assert_eq!(count_certificates(&app.pool, id).await, 2);

    // Unknown response ids are a field error
    let response = client
        .post(format!("{}/upload-certificate/", app.address))
        .multipart(
            Form::new()
                .text("response", "999999999")
                .part("certificates", pdf("c.pdf")),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["fields"]["response"][0]["code"], "does_not_exist");
}

#[tokio::test]
async fn batch_download_by_certificate_count() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let url = format!("{}/certificates/download/", app.address);

    let none = create_response(&app, response_form(&unique_email())).await;
    let one = create_response(&app, response_form(&unique_email()).part("certificates", pdf("only.pdf"))).await;
    let email = unique_email();
    let many = create_response(
        &app,
        response_form(&email)
            .part("certificates", pdf("first.pdf"))
            .part("certificates", pdf("second.pdf")),
    )
    .await;

    // Act + Assert: no certificates
    let response = client
        .get(&url)
        .query(&[("response_id", none["id"].as_i64().unwrap())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Unknown response
    let response = client
        .get(&url)
        .query(&[("response_id", 999_999_999_i64)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // One certificate is sent as the PDF itself
    let response = client
        .get(&url)
        .query(&[("response_id", one["id"].as_i64().unwrap())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"only.pdf\""
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"%PDF-1.4 only.pdf");

    // Several are bundled into a zip named after the email
    let response = client
        .get(&url)
        .query(&[("response_id", many["id"].as_i64().unwrap())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/zip");

    let slug: String = email.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    assert_eq!(
        response.headers()["content-disposition"].to_str().unwrap(),
        format!("attachment; filename=\"certificates_{}.zip\"", slug)
    );

    let bytes = response.bytes().await.unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.by_index(0).unwrap().name(), "first.pdf");
}

#[tokio::test]
async fn single_download_and_delete() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let created = create_response(&app, response_form(&unique_email()).part("certificates", pdf("cert.pdf"))).await;
    let id = created["id"].as_i64().unwrap();
    let certificate_id = created["certificates"][0]["id"].as_i64().unwrap();
    let file = created["certificates"][0]["file"].as_str().unwrap().to_string();

    // Act + Assert: download
    let response = client
        .get(format!("{}/download-certificate/{}/", app.address, certificate_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/pdf");

    // Delete removes rows and files
    let response = client
        .delete(format!("{}/responses/{}/", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);
    assert_eq!(count_certificates(&app.pool, id).await, 0);
    assert!(!app.media.path().join(file).exists());

    let response = client
        .get(format!("{}/download-certificate/{}/", app.address, certificate_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn questions_are_wrapped_in_an_object() {
    let Some(app) = spawn_app().await else { return };

    let response = reqwest::Client::new()
        .get(format!("{}/questions/", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["questions"].is_array());
}

#[tokio::test]
async fn long_certificate_name_is_stored_truncated() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let long_name = format!("{}.pdf", "a".repeat(250));

    // Act
    let body = create_response(&app, response_form(&unique_email()).part("certificates", pdf(&long_name))).await;

    // Assert
    let file = body["certificates"][0]["file"].as_str().unwrap();
    assert!(file.len() <= 255);
    assert!(file.starts_with("certificates/aaaa"));
    assert!(file.ends_with(".pdf"));
    assert!(app.media.path().join(file).exists());
}

#[tokio::test]
async fn non_pdf_rows_are_refused_and_skipped_on_download() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let created = create_response(&app, response_form(&unique_email()).part("certificates", pdf("kept.pdf"))).await;
    let id = created["id"].as_i64().unwrap();

    let docx_id: i64 = sqlx::query_scalar(
        "INSERT INTO certificates (response_id, file) VALUES ($1, $2) RETURNING id",
    )
    .bind(id)
    .bind("certificates/notes.docx")
    .fetch_one(&app.pool)
    .await
    .unwrap();

    // Act + Assert: the non-PDF row cannot be downloaded on its own
    let response = client
        .get(format!("{}/download-certificate/{}/", app.address, docx_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Only PDF files are supported for download.");

    // The batch path ignores it, leaving a single raw PDF
    let response = client
        .get(format!("{}/certificates/download/", app.address))
        .query(&[("response_id", id)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"%PDF-1.4 kept.pdf");
}

#[tokio::test]
async fn text_certificates_part_keeps_existing_certificates() {
    // Arrange
    let Some(app) = spawn_app().await else { return };
    let created = create_response(&app, response_form(&unique_email()).part("certificates", pdf("stay.pdf"))).await;
    let id = created["id"].as_i64().unwrap();

    // Act
    let response = reqwest::Client::new()
        .patch(format!("{}/responses/{}/", app.address, id))
        .multipart(
            Form::new()
                .text("full_name", "Ada King")
                .text("certificates", "foo"),
        )
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["full_name"], "Ada King");
    assert_eq!(body["certificates"].as_array().unwrap().len(), 1);
    assert_eq!(count_certificates(&app.pool, id).await, 1);
}
