mod common;

use axum_test::multipart::{MultipartForm, Part};
use common::{bearer, register, spawn_app};
use serde_json::Value;

fn text_part(name: &str, body: &str) -> Part {
    Part::bytes(body.as_bytes().to_vec())
        .file_name(name)
        .mime_type("text/plain")
}

#[tokio::test]
async fn text_documents_are_stored_and_analyzed() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;
    app.llm.set_reply("You spend a lot on coffee.");

    let form = MultipartForm::new()
        .add_part("files", text_part("May statement.txt", "Coffee 4.50\nRent 900"))
        .add_part("files", text_part("notes.txt", "Save for a trip"));
    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/api/chat/upload")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["analysis"], "You spend a lot on coffee.");
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
    assert_eq!(body["files"][0]["name"], "May statement.txt");
    assert_eq!(body["files"][0]["type"], "document");
    assert_eq!(body["files"][0]["mimetype"], "text/plain");
    assert!(body["files"][0]["url"].as_str().unwrap().starts_with("/uploads/May-statement-"));
    assert_eq!(app.uploaded_files(), 2);

    let prompt = &app.llm.calls()[0][1].content;
    assert!(prompt.contains("Rent 900"));
    assert!(prompt.contains("Save for a trip"));
}

#[tokio::test]
async fn disallowed_types_are_rejected_without_leftovers() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    let form = MultipartForm::new()
        .add_part("files", text_part("ok.txt", "fine"))
        .add_part(
            "files",
            Part::bytes(b"MZ\x90\x00".to_vec())
                .file_name("setup.exe")
                .mime_type("application/octet-stream"),
        );
    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/api/chat/upload")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("setup.exe"));
    assert_eq!(app.uploaded_files(), 0);
    assert!(app.llm.calls().is_empty());
}

#[tokio::test]
async fn extension_must_match_the_declared_type() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    let form = MultipartForm::new().add_part(
        "files",
        Part::bytes(b"%PDF-1.4".to_vec())
            .file_name("invoice.pdf")
            .mime_type("image/png"),
    );
    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/api/chat/upload")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.uploaded_files(), 0);
}

#[tokio::test]
async fn empty_and_missing_files_are_rejected() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    let (name, value) = bearer(&token);
    let empty = app
        .server
        .post("/api/chat/upload")
        .add_header(name, value)
        .multipart(MultipartForm::new().add_part("files", text_part("empty.txt", "")))
        .await;
    assert_eq!(empty.status_code(), 400);

    let (name, value) = bearer(&token);
    let none = app
        .server
        .post("/api/chat/upload")
        .add_header(name, value)
        .multipart(MultipartForm::new().add_text("note", "no files here"))
        .await;
    assert_eq!(none.status_code(), 400);
    assert_eq!(none.json::<Value>()["error"], "No files uploaded");
    assert_eq!(app.uploaded_files(), 0);
}

#[tokio::test]
async fn too_many_files_are_rejected() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    let form = (0..6).fold(MultipartForm::new(), |form, i| {
        form.add_part("files", text_part(&format!("f{}.txt", i), "x"))
    });
    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/api/chat/upload")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.uploaded_files(), 0);
}

#[tokio::test]
async fn model_failure_removes_stored_files() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;
    app.llm.fail_next_calls();

    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/api/chat/upload")
        .add_header(name, value)
        .multipart(MultipartForm::new().add_part("files", text_part("a.txt", "rent 900")))
        .await;

    assert_eq!(response.status_code(), 502);
    assert_eq!(response.json::<Value>()["success"], false);
    assert_eq!(app.uploaded_files(), 0);
}

#[tokio::test]
async fn uploads_require_a_session() {
    let app = spawn_app().await;
    let response = app
        .server
        .post("/api/chat/upload")
        .multipart(MultipartForm::new().add_part("files", text_part("a.txt", "x")))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn credit_report_upload_detects_score_and_bureau() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;
    app.llm.set_reply("1. Late payments\n2. High utilization");

    let form = MultipartForm::new().add_part(
        "file",
        text_part("report.txt", "Experian credit report\nFICO Score 8: 688\nAccounts: 4"),
    );
    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/api/credit/upload-report")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["report"]["score"], 688);
    assert_eq!(body["report"]["bureau"], "Experian");
    assert_eq!(body["report"]["rating"], "good");
    assert_eq!(body["factors"][1], "High utilization");

    let (name, value) = bearer(&token);
    let score = app.server.get("/api/credit/score").add_header(name, value).await;
    assert_eq!(score.json::<Value>()["score"], 688);
}

#[tokio::test]
async fn credit_report_without_score_is_rejected_and_removed() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/api/credit/upload-report")
        .add_header(name, value)
        .multipart(MultipartForm::new().add_part("file", text_part("report.txt", "nothing useful")))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.uploaded_files(), 0);
}
