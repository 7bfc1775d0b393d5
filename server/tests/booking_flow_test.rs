// server/tests/booking_flow_test.rs
//
// End-to-end flow over the public router: the bootstrap admin approves a doctor,
// a patient books, the doctor sees the visit through, and the patient reviews it.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use medibook_server::api::create_router;
use medibook_server::bootstrap::build_state;
use medibook_server::config::{BootstrapAdminConfig, Config};

async fn create_test_router() -> Router {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.auth.bcrypt_cost = 4;
    config.logging.enabled = false;
    config.bootstrap_admin = Some(BootstrapAdminConfig {
        email: "root@clinic.example".to_string(),
        password: "root-password".to_string(),
        name: "Root".to_string(),
    });

    let state = build_state(config).await.unwrap();
    create_router(state)
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn login(router: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn register(router: &Router, email: &str, role: &str) -> (String, String) {
    let (status, body) = send(
        router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": "password123",
            "name": email,
            "role": role,
            "specialization": "Dermatology",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    (
        body["user"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_full_booking_flow() {
    let router = create_test_router().await;
    let admin = login(&router, "root@clinic.example", "root-password").await;

    let (doctor_id, doctor) = register(&router, "grey@clinic.example", "doctor").await;
    let (_, patient) = register(&router, "pat@example.com", "patient").await;

    // A pending doctor can already fill in their profile
    let days = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
    let availability: Vec<Value> = days
        .iter()
        .map(|day| json!({ "day": day, "start": "13:00", "end": "15:00" }))
        .collect();
    let (status, profile) = send(
        &router,
        Method::PUT,
        "/api/doctors/me/profile",
        Some(&doctor),
        Some(json!({ "availability": availability, "consultation_fee": 120.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", profile);

    let (status, _) = send(
        &router,
        Method::PUT,
        &format!("/api/admin/doctors/{}/approve", doctor_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let date = (Utc::now().date_naive() + Duration::days(2))
        .format("%Y-%m-%d")
        .to_string();
    let (status, slots) = send(
        &router,
        Method::GET,
        &format!("/api/doctors/{}/slots?date={}", doctor_id, date),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Two hours in default 30 minute slots
    assert_eq!(slots["slots"].as_array().unwrap().len(), 4);

    let (status, appointment) = send(
        &router,
        Method::POST,
        "/api/appointments",
        Some(&patient),
        Some(json!({
            "doctor_id": doctor_id,
            "date": date,
            "start_time": "13:30",
            "appointment_type": "consultation",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", appointment);
    let appointment_id = appointment["id"].as_str().unwrap().to_string();

    for next in ["confirmed", "completed"] {
        let (status, body) = send(
            &router,
            Method::PUT,
            &format!("/api/appointments/{}/status", appointment_id),
            Some(&doctor),
            Some(json!({ "status": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["status"], next);
    }

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/reviews",
        Some(&patient),
        Some(json!({ "appointment_id": appointment_id, "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, dashboard) = send(
        &router,
        Method::GET,
        "/api/doctors/me/dashboard",
        Some(&doctor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", dashboard);

    let (_, logs) = send(&router, Method::GET, "/api/admin/logs", Some(&admin), None).await;
    assert_eq!(logs["items"][0]["action"], "approve");
}
