//! Product catalog and account endpoints used by the admin and customer screens.

mod common;

use axum::http::StatusCode;
use common::{response_json, TestApp};
use serde_json::json;

fn saree() -> serde_json::Value {
    json!({
        "productName": "Banarasi Saree",
        "productPrice": 500,
        "productCategory": "Sarees",
        "productDesc": "Silk, hand woven",
        "productImage": "saree.jpg"
    })
}

fn signup_body(email: &str) -> serde_json::Value {
    json!({
        "firstName": "Asha",
        "lastName": "Rao",
        "email": email,
        "password": "secret123",
        "contactNumber": "9876543210"
    })
}

// ==================== Products ====================

#[tokio::test]
async fn product_crud_round_trip() {
    let app = TestApp::new().await;

    let response = app.post("/products", saree()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await;
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["productName"], "Banarasi Saree");
    assert_eq!(created["data"]["available"], true);
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .put(&format!("/products/{}", id), json!({ "available": false }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = response_json(response).await;
    assert_eq!(updated["data"]["available"], false);
    assert_eq!(updated["data"]["productCategory"], "Sarees");

    let listed = response_json(app.get("/products").await).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let response = app.delete(&format!("/products/{}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get(&format!("/products/{}", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_validation() {
    let app = TestApp::new().await;

    let mut body = saree();
    body["productPrice"] = json!(0);
    let response = app.post("/products", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = saree();
    body["productCategory"] = json!("");
    let response = app.post("/products", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn category_listing_ignores_case() {
    let app = TestApp::new().await;
    app.post("/products", saree()).await;
    let mut kurta = saree();
    kurta["productName"] = json!("Cotton Kurta");
    kurta["productCategory"] = json!("Kurtas");
    app.post("/products", kurta).await;

    let body = response_json(app.get("/products/category/SAREES").await).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["productName"], "Banarasi Saree");
}

// ==================== Users ====================

#[tokio::test]
async fn signup_and_login() {
    let app = TestApp::new().await;

    let response = app.post("/users/signup", signup_body("asha@example.com")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["role"], "customer");
    assert!(body["data"].get("passwordHash").is_none());

    let response = app
        .post(
            "/users/login",
            json!({ "email": "ASHA@example.com", "password": "secret123" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post(
            "/users/login",
            json!({ "email": "asha@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = TestApp::new().await;
    app.post("/users/signup", signup_body("asha@example.com")).await;
    let response = app.post("/users/signup", signup_body("asha@example.com")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn admin_disables_account() {
    let app = TestApp::new().await;
    let body = response_json(app.post("/users/signup", signup_body("asha@example.com")).await).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .put(&format!("/users/{}", id), json!({ "active": false }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post(
            "/users/login",
            json!({ "email": "asha@example.com", "password": "secret123" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("Account is disabled"));
}

#[tokio::test]
async fn profile_update_ignores_role() {
    let app = TestApp::new().await;
    let body = response_json(app.post("/users/signup", signup_body("asha@example.com")).await).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .put(
            &format!("/users/{}/profile", id),
            json!({ "firstName": "Ashwini", "role": "admin" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["firstName"], "Ashwini");
    assert_eq!(body["data"]["role"], "customer");

    let users = response_json(app.get("/users").await).await;
    assert_eq!(users["data"].as_array().unwrap().len(), 1);

    let response = app.delete(&format!("/users/{}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get(&format!("/users/{}", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"]["status"], "up");
}
