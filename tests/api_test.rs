mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestEnv, book, card, setup};
use rusty_library_borrowing::api::{handlers::AppState, router::create_router};
use rusty_library_borrowing::ports::BorrowCountBucket;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn app(env: &TestEnv) -> Router {
    create_router(Arc::new(AppState {
        service_deps: env.deps.clone(),
    }))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let env = setup();
    let response = app(&env)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_full_borrowing_flow() {
    let env = setup();
    env.cards.add_card(card("LC-100", 3));
    let x = book("Norwegian Wood", 4);
    let y = book("Kafka on the Shore", 1);
    env.books.add_book(x.clone());
    env.books.add_book(y.clone());
    let app = app(&env);

    // Step 1: 貸出作成（POST /borrowings）
    let (status, body) = send(
        &app,
        "POST",
        "/borrowings",
        Some(json!({
            "card_number": "LC-100",
            "employee_id": Uuid::new_v4(),
            "borrow_date": "2025-03-01T09:00:00Z",
            "books": [
                { "book_id": x.book_id.value(), "quantity": 2 },
                { "book_id": y.book_id.value(), "quantity": 1 }
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &body["data"];
    assert_eq!(data["status"], "open");
    assert_eq!(data["is_returned"], false);
    assert_eq!(data["total_quantity"], 3);
    assert_eq!(data["line_items"].as_array().unwrap().len(), 2);
    assert_eq!(data["line_items"][0]["book_title"], "Norwegian Wood");
    let borrowing_id = data["borrowing_id"].as_str().unwrap().to_string();
    let first_item = data["line_items"][0]["line_item_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Step 2: 詳細取得（GET /borrowings/:id）
    let (status, body) = send(&app, "GET", &format!("/borrowings/{}", borrowing_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["borrowing_id"], borrowing_id.as_str());

    // Step 3: 未返却数（GET /borrowings/unreturned-count）
    let (status, body) = send(&app, "GET", "/borrowings/unreturned-count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unreturned_books"], 3);

    // Step 4: 明細を1件返却（本文なし）
    let (status, body) = send(
        &app,
        "POST",
        &format!("/borrowings/{}/items/{}/return", borrowing_id, first_item),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "open");
    assert_eq!(body["data"]["line_items"][0]["is_returned"], true);

    // Step 5: 同じ明細を再度返却 → 409
    let (status, body) = send(
        &app,
        "POST",
        &format!("/borrowings/{}/items/{}/return", borrowing_id, first_item),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ALREADY_RETURNED");

    // Step 6: 残りをすべて返却（返却日を指定）
    let (status, body) = send(
        &app,
        "POST",
        &format!("/borrowings/{}/return", borrowing_id),
        Some(json!({ "returned_at": "2025-03-10T09:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "closed");
    assert_eq!(body["data"]["is_returned"], true);
    assert_eq!(body["data"]["closed_at"], "2025-03-10T09:00:00Z");

    // Step 7: 完了済みの貸出記録に全返却 → 409
    let (status, body) = send(
        &app,
        "POST",
        &format!("/borrowings/{}/return", borrowing_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BORROWING_CLOSED");

    let (_, body) = send(&app, "GET", "/borrowings/unreturned-count", None).await;
    assert_eq!(body["data"]["unreturned_books"], 0);
}

#[tokio::test]
async fn test_rejected_selection_lists_every_violation() {
    let env = setup();
    env.cards.add_card(card("LC-101", 2));
    let x = book("Hamlet", 1);
    env.books.add_book(x.clone());
    let app = app(&env);

    let (status, body) = send(
        &app,
        "POST",
        "/borrowings",
        Some(json!({
            "card_number": "LC-101",
            "employee_id": Uuid::new_v4(),
            "books": [{ "book_id": x.book_id.value(), "quantity": 3 }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "SELECTION_REJECTED");
    let details = body["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(details[1]["code"], "QUOTA_EXCEEDED");
}

#[tokio::test]
async fn test_zero_quantity_is_bad_request() {
    let env = setup();
    env.cards.add_card(card("LC-102", 2));
    let x = book("Macbeth", 5);
    env.books.add_book(x.clone());

    let (status, body) = send(
        &app(&env),
        "POST",
        "/borrowings",
        Some(json!({
            "card_number": "LC-102",
            "employee_id": Uuid::new_v4(),
            "books": [{ "book_id": x.book_id.value(), "quantity": 0 }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_malformed_return_body_is_bad_request_and_changes_nothing() {
    let env = setup();
    env.cards.add_card(card("LC-103", 2));
    let x = book("Hamlet", 5);
    env.books.add_book(x.clone());
    let app = app(&env);

    let (status, body) = send(
        &app,
        "POST",
        "/borrowings",
        Some(json!({
            "card_number": "LC-103",
            "employee_id": Uuid::new_v4(),
            "books": [{ "book_id": x.book_id.value(), "quantity": 1 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let borrowing_id = body["data"]["borrowing_id"].as_str().unwrap().to_string();
    let item_id = body["data"]["line_items"][0]["line_item_id"]
        .as_str()
        .unwrap()
        .to_string();

    let bad_date = json!({ "returned_at": "not-a-date" });

    let (status, body) = send(
        &app,
        "POST",
        &format!("/borrowings/{}/return", borrowing_id),
        Some(bad_date.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/borrowings/{}/items/{}/return", borrowing_id, item_id),
        Some(bad_date),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 記録は未返却のまま
    let (status, body) = send(&app, "GET", &format!("/borrowings/{}", borrowing_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "open");
    assert_eq!(body["data"]["line_items"][0]["return_date"], Value::Null);
}

#[tokio::test]
async fn test_unknown_card_is_unprocessable() {
    let env = setup();

    let (status, body) = send(
        &app(&env),
        "POST",
        "/borrowings",
        Some(json!({
            "card_number": "LC-404",
            "employee_id": Uuid::new_v4(),
            "books": []
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "CARD_NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_borrowing_is_not_found() {
    let env = setup();
    let app = app(&env);
    let id = Uuid::new_v4();

    let (status, body) = send(&app, "GET", &format!("/borrowings/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "BORROWING_NOT_FOUND");

    let (status, _) = send(&app, "POST", &format!("/borrowings/{}/return", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_borrowings_filters_and_pages() {
    let env = setup();
    env.cards.add_card(card("LC-200", 5));
    env.cards.add_card(card("XY-300", 5));
    let x = book("Dune", 50);
    env.books.add_book(x.clone());
    let app = app(&env);

    for (number, day) in [("LC-200", 1), ("LC-200", 2), ("XY-300", 3)] {
        let (status, _) = send(
            &app,
            "POST",
            "/borrowings",
            Some(json!({
                "card_number": number,
                "employee_id": Uuid::new_v4(),
                "borrow_date": format!("2025-04-0{}T08:00:00Z", day),
                "books": [{ "book_id": x.book_id.value(), "quantity": 1 }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // 新しい順
    let (status, body) = send(&app, "GET", "/borrowings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 3);
    assert_eq!(body["data"]["rows"][0]["card_number"], "XY-300");

    // カード番号の部分一致（大文字小文字を区別しない）
    let (_, body) = send(&app, "GET", "/borrowings?card_number=lc-2", None).await;
    assert_eq!(body["data"]["count"], 2);

    // ページング
    let (_, body) = send(&app, "GET", "/borrowings?page=2&page_size=2", None).await;
    assert_eq!(body["data"]["count"], 3);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["rows"].as_array().unwrap().len(), 1);

    // 返却状況
    let (_, body) = send(&app, "GET", "/borrowings?is_returned=true", None).await;
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn test_statistics_endpoints() {
    let env = setup();
    *env.statistics.buckets.lock().unwrap() = vec![
        BorrowCountBucket {
            label: "2025-01".to_string(),
            borrow_count: 4,
        },
        BorrowCountBucket {
            label: "2025-03".to_string(),
            borrow_count: 1,
        },
    ];
    let app = app(&env);

    let (status, body) = send(&app, "GET", "/borrowings/statistics?interval=month", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["time"], "2025-01");
    assert_eq!(body["data"][1]["borrow_count"], 1);

    let (status, _) = send(&app, "GET", "/borrowings/statistics?interval=decade", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/borrowings/top-books?limit=0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (_, _) = send(&app, "GET", "/borrowings/top-books", None).await;
    assert_eq!(*env.statistics.requested_limits.lock().unwrap(), vec![10]);
}
