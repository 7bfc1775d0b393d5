//! Router-level tests
//!
//! Requests go through the full router (extractors, middleware, handlers) against an
//! in-memory database via `tower::ServiceExt::oneshot`.

mod admin_tests;
mod auth_tests;
mod chat_tests;
mod settings_tests;
mod websocket_tests;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::helpers::today;
use super::{create_router, AppState};
use crate::auth::issue_token;
use crate::bootstrap::build_state;
use crate::config::Config;
use crate::models::{
    new_id, now_rfc3339, ApprovalStatus, Role, UpdateDoctorProfileRequest, User, UserStatus,
    Weekday, WeeklySlot, DATE_FORMAT,
};

pub(crate) struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// A signed-in account
pub(crate) struct TestUser {
    pub id: String,
    pub token: String,
}

pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.auth.bcrypt_cost = 4;
    config.logging.enabled = false;
    config.uploads.max_file_bytes = 1024;
    config
}

pub(crate) async fn create_test_app() -> TestApp {
    let state = build_state(test_config()).await.unwrap();
    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

/// Tomorrow, which every test doctor is available on
pub(crate) fn tomorrow() -> String {
    (today() + Duration::days(1)).format(DATE_FORMAT).to_string()
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
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

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Register through the API; doctors come back pending
    pub async fn register(&self, role: Role, email: &str) -> TestUser {
        let response = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "password123",
                    "name": email.split('@').next().unwrap(),
                    "role": role,
                    "specialization": "Cardiology",
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        TestUser {
            id: response.body["user"]["id"].as_str().unwrap().to_string(),
            token: response.body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Admins cannot self-register, so they are inserted directly
    pub async fn admin(&self, email: &str) -> TestUser {
        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            email: email.to_string(),
            password_hash: String::new(),
            name: "Admin".to_string(),
            phone: None,
            role: Role::Admin,
            status: UserStatus::Active,
            created_at: now.clone(),
            updated_at: now,
            last_login_at: None,
        };
        self.state.db.create_user(&user, None).await.unwrap();
        self.token_for(&user)
    }

    pub fn token_for(&self, user: &User) -> TestUser {
        let (token, _) = issue_token(user, &self.state.config.auth.jwt_secret, 1).unwrap();
        TestUser {
            id: user.id.clone(),
            token,
        }
    }

    /// Approved doctor available every day 09:00-17:00 in 30 minute slots
    pub async fn approved_doctor(&self, email: &str) -> TestUser {
        let doctor = self.register(Role::Doctor, email).await;
        let availability = Weekday::ALL
            .iter()
            .map(|day| WeeklySlot {
                day: *day,
                start: "09:00".to_string(),
                end: "17:00".to_string(),
                slot_minutes: Some(30),
            })
            .collect();
        self.state
            .db
            .update_doctor_profile(
                &doctor.id,
                &UpdateDoctorProfileRequest {
                    availability: Some(availability),
                    consultation_fee: Some(80.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        self.state
            .db
            .set_doctor_approval(&doctor.id, ApprovalStatus::Approved)
            .await
            .unwrap();
        doctor
    }

    /// Book tomorrow at `start` and return the appointment id
    pub async fn book(&self, patient: &TestUser, doctor: &TestUser, start: &str) -> String {
        let response = self
            .post(
                "/api/appointments",
                &patient.token,
                json!({
                    "doctor_id": doctor.id,
                    "date": tomorrow(),
                    "start_time": start,
                    "reason": "Chest pain",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    pub async fn set_status(
        &self,
        user: &TestUser,
        appointment_id: &str,
        status: &str,
        reason: Option<&str>,
    ) -> TestResponse {
        self.put(
            &format!("/api/appointments/{}/status", appointment_id),
            &user.token,
            json!({ "status": status, "reason": reason }),
        )
        .await
    }
}
