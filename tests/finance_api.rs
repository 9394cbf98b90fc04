mod common;

use common::{bearer, register, spawn_app, TestApp};
use serde_json::{json, Value};

async fn post_json(app: &TestApp, token: &str, path: &str, body: Value) -> axum_test::TestResponse {
    let (name, value) = bearer(token);
    app.server.post(path).add_header(name, value).json(&body).await
}

async fn get(app: &TestApp, token: &str, path: &str) -> axum_test::TestResponse {
    let (name, value) = bearer(token);
    app.server.get(path).add_header(name, value).await
}

/// Amounts travel as JSON numbers; compare them to the cent.
fn assert_money(value: &Value, expected: f64) {
    let actual = value.as_f64().unwrap_or_else(|| panic!("not a number: {}", value));
    assert!((actual - expected).abs() < 0.001, "expected {}, got {}", expected, actual);
}

#[tokio::test]
async fn credit_score_requires_authentication() {
    let app = spawn_app().await;
    let response = app.server.get("/api/credit/score").await;
    assert_eq!(response.status_code(), 401);
    assert_eq!(response.json::<Value>()["error"], "Not authenticated");
}

#[tokio::test]
async fn credit_score_returns_latest_report_with_rating() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    assert_eq!(get(&app, &token, "/api/credit/score").await.status_code(), 404);

    let out_of_range = post_json(&app, &token, "/api/credit/reports", json!({ "score": 900, "bureau": "Equifax" })).await;
    assert_eq!(out_of_range.status_code(), 400);

    let created = post_json(&app, &token, "/api/credit/reports", json!({ "score": 720, "bureau": "Equifax" })).await;
    assert_eq!(created.status_code(), 201);

    let score: Value = get(&app, &token, "/api/credit/score").await.json();
    assert_eq!(score["score"], 720);
    assert_eq!(score["bureau"], "Equifax");
    assert_eq!(score["rating"], "excellent");
}

#[tokio::test]
async fn reports_are_private_to_their_owner() {
    let app = spawn_app().await;
    let ana = register(&app, "ana").await;
    let ben = register(&app, "ben").await;

    post_json(&app, &ana, "/api/credit/reports", json!({ "score": 650, "bureau": "Experian" })).await;
    assert_eq!(get(&app, &ben, "/api/credit/score").await.status_code(), 404);
}

#[tokio::test]
async fn summary_balance_is_income_minus_expenses() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    for (kind, amount, date) in [
        ("income", 2500.10, "2024-03-01T09:00:00Z"),
        ("expense", 900.05, "2024-03-02T09:00:00Z"),
        ("expense", 49.99, "2024-03-02T18:00:00Z"),
        ("income", 100.0, "2024-03-05T09:00:00Z"),
    ] {
        let response = post_json(
            &app,
            &token,
            "/api/transactions",
            json!({ "type": kind, "amount": amount, "category": "General", "date": date }),
        )
        .await;
        assert_eq!(response.status_code(), 201, "{}", response.text());
    }

    let summary: Value = get(&app, &token, "/api/transactions/summary").await.json();
    assert_money(&summary["income"], 2600.10);
    assert_money(&summary["expenses"], 950.04);
    assert_money(&summary["balance"], 1650.06);

    let transactions = summary["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 4);
    assert_eq!(transactions[0]["date"], "2024-03-05T09:00:00Z");

    let trends = summary["trends"].as_array().unwrap();
    assert_eq!(trends.len(), 3);
    assert_eq!(trends[0]["date"], "2024-03-01");
    assert_money(&trends[0]["balance"], 2500.10);
    assert_money(&trends[2]["balance"], 1650.06);
}

#[tokio::test]
async fn manual_transactions_are_validated() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    let zero = post_json(&app, &token, "/api/transactions", json!({ "type": "income", "amount": 0 })).await;
    assert_eq!(zero.status_code(), 400);

    let bad_type = post_json(&app, &token, "/api/transactions", json!({ "type": "transfer", "amount": 5 })).await;
    assert_eq!(bad_type.status_code(), 400);
}

#[tokio::test]
async fn oversized_amounts_are_rejected_and_summaries_keep_working() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    for _ in 0..2 {
        let response = post_json(&app, &token, "/api/transactions", json!({ "type": "income", "amount": 7.0e28 })).await;
        assert_eq!(response.status_code(), 400);
        let response = post_json(
            &app,
            &token,
            "/api/subscriptions",
            json!({ "name": "Yacht", "amount": 7.0e28, "frequency": "monthly" }),
        )
        .await;
        assert_eq!(response.status_code(), 400);
    }

    let largest = post_json(&app, &token, "/api/transactions", json!({ "type": "income", "amount": 1.0e15 })).await;
    assert_eq!(largest.status_code(), 201);

    let summary = get(&app, &token, "/api/transactions/summary").await;
    assert_eq!(summary.status_code(), 200);
    assert_money(&summary.json::<Value>()["income"], 1.0e15);
    assert_eq!(get(&app, &token, "/api/subscriptions").await.status_code(), 200);
}

#[tokio::test]
async fn dates_that_cannot_be_stored_are_rejected() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    for date in ["9999-12-31T23:59:59-05:00", "+10000-01-01T00:00:00Z", "-0001-01-01T00:00:00Z"] {
        let response = post_json(
            &app,
            &token,
            "/api/transactions",
            json!({ "type": "expense", "amount": 10, "date": date }),
        )
        .await;
        assert_eq!(response.status_code(), 400, "{}", date);

        let response = post_json(
            &app,
            &token,
            "/api/subscriptions",
            json!({ "name": "Music", "amount": 9.99, "frequency": "monthly", "nextBilling": date }),
        )
        .await;
        assert_eq!(response.status_code(), 400, "{}", date);
    }

    let summary = get(&app, &token, "/api/transactions/summary").await;
    assert_eq!(summary.status_code(), 200);
    assert!(summary.json::<Value>()["transactions"].as_array().unwrap().is_empty());
    let subscriptions: Value = get(&app, &token, "/api/subscriptions").await.json();
    assert!(subscriptions["subscriptions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn disputes_only_move_forward() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;
    app.llm.set_reply("Dear Experian, ...");

    let created = post_json(
        &app,
        &token,
        "/api/disputes",
        json!({ "creditor": "Acme Bank", "accountNumber": "****1234", "reason": "Not my account" }),
    )
    .await;
    assert_eq!(created.status_code(), 201);
    let dispute: Value = created.json();
    assert_eq!(dispute["status"], "pending");
    assert_eq!(dispute["letterContent"], "Dear Experian, ...");
    let id = dispute["id"].as_i64().unwrap();

    let letter_prompt = &app.llm.calls()[0][1].content;
    assert!(letter_prompt.contains("Acme Bank"));
    assert!(letter_prompt.contains("Ana Lopez"));

    let patch = |status: &'static str| {
        let (name, value) = bearer(&token);
        app.server
            .patch(&format!("/api/disputes/{}", id))
            .add_header(name, value)
            .json(&json!({ "status": status }))
    };

    let sent = patch("sent").await;
    assert_eq!(sent.status_code(), 200);
    assert_eq!(sent.json::<Value>()["status"], "sent");

    assert_eq!(patch("pending").await.status_code(), 400);
    assert_eq!(patch("sent").await.status_code(), 400);
    assert_eq!(patch("archived").await.status_code(), 400);
    assert_eq!(patch("resolved").await.json::<Value>()["status"], "resolved");

    let listed: Value = get(&app, &token, "/api/disputes").await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn foreign_disputes_are_not_found() {
    let app = spawn_app().await;
    let ana = register(&app, "ana").await;
    let ben = register(&app, "ben").await;

    let dispute: Value = post_json(&app, &ana, "/api/disputes", json!({ "creditor": "Acme", "reason": "Paid off" }))
        .await
        .json();
    let (name, value) = bearer(&ben);
    let response = app
        .server
        .patch(&format!("/api/disputes/{}", dispute["id"]))
        .add_header(name, value)
        .json(&json!({ "status": "sent" }))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn subscription_total_spreads_yearly_plans() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;

    for body in [
        json!({ "name": "Music", "amount": 9.99, "frequency": "monthly" }),
        json!({ "name": "Cloud storage", "amount": 120, "frequency": "yearly" }),
        json!({ "name": "Gym", "amount": 30, "frequency": "monthly" }),
    ] {
        assert_eq!(post_json(&app, &token, "/api/subscriptions", body).await.status_code(), 201);
    }

    let listed: Value = get(&app, &token, "/api/subscriptions").await.json();
    assert_money(&listed["monthlyTotal"], 49.99);

    let gym_id = listed["subscriptions"][2]["id"].as_i64().unwrap();
    let (name, value) = bearer(&token);
    let cancelled = app
        .server
        .delete(&format!("/api/subscriptions/{}", gym_id))
        .add_header(name, value)
        .await;
    assert_eq!(cancelled.status_code(), 200);

    let listed: Value = get(&app, &token, "/api/subscriptions").await.json();
    assert_money(&listed["monthlyTotal"], 19.99);
    assert_eq!(listed["subscriptions"][2]["active"], false);

    let (name, value) = bearer(&token);
    let missing = app.server.delete("/api/subscriptions/999").add_header(name, value).await;
    assert_eq!(missing.status_code(), 404);

    let bad = post_json(&app, &token, "/api/subscriptions", json!({ "name": "X", "amount": 5, "frequency": "weekly" })).await;
    assert_eq!(bad.status_code(), 400);
}

#[tokio::test]
async fn chat_relays_the_model_reply() {
    let app = spawn_app().await;
    let token = register(&app, "ana").await;
    app.llm.set_reply("Hola Ana!");

    let response = post_json(&app, &token, "/api/chat", json!({ "message": "How do I save more?" })).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["response"], "Hola Ana!");

    let calls = app.llm.calls();
    assert!(calls[0][0].content.contains("Ana"));
    assert_eq!(calls[0][1].content, "How do I save more?");

    let empty = post_json(&app, &token, "/api/chat", json!({ "message": "   " })).await;
    assert_eq!(empty.status_code(), 400);

    app.llm.fail_next_calls();
    let failed = post_json(&app, &token, "/api/chat", json!({ "message": "hi" })).await;
    assert_eq!(failed.status_code(), 502);
    assert!(failed.json::<Value>()["error"].is_string());
}
