//! MediBook REST API
//!
//! Route table, shared state and the layers every response passes through:
//! CORS, request tracing, the body size limit, `no-store` caching headers and
//! problem-document enrichment.

mod admin;
mod appointments;
mod auth;
mod chat;
mod dashboard;
mod doctors;
mod extract;
mod helpers;
mod middleware;
mod notifications;
mod patients;
mod prescriptions;
mod reports;
mod reviews;
mod settings;
mod websocket;

pub use extract::{authenticate, parse_id, ApiJson, ApiQuery, AuthUser};
pub use helpers::RealtimeEvent;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

use crate::{config::Config, db::Database, error::AppError};

/// Realtime events buffered per subscriber before a slow socket starts lagging
const REALTIME_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tx: broadcast::Sender<RealtimeEvent>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: Arc<Config>) -> Self {
        let (tx, _) = broadcast::channel(REALTIME_CHANNEL_CAPACITY);
        Self { db, tx, config }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.cors.disable {
        tracing::warn!(
            "CORS is DISABLED - allowing all origins. This should only be used in development!"
        );
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(
                state
                    .config
                    .cors
                    .allowed_origins
                    .iter()
                    .filter_map(|origin| origin.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
            ])
            .allow_credentials(true)
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri().path(),
                "HTTP request started"
            );
        })
        .on_response(
            DefaultOnResponse::new()
                .level(tracing::Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let body_limit = state.config.uploads.body_limit();

    Router::new()
        .route("/api/health", get(health))
        // Authentication
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/password", put(auth::change_password))
        // Administration
        .route("/api/admin/dashboard", get(dashboard::admin_dashboard))
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/users/:id",
            get(admin::get_user).delete(admin::delete_user),
        )
        .route("/api/admin/users/:id/status", put(admin::update_user_status))
        .route("/api/admin/doctors/:id/approve", put(admin::approve_doctor))
        .route("/api/admin/doctors/:id/reject", put(admin::reject_doctor))
        .route("/api/admin/appointments", get(admin::list_appointments))
        .route("/api/admin/reviews", get(admin::list_reviews))
        .route("/api/admin/reviews/:id/status", put(admin::update_review_status))
        .route("/api/admin/logs", get(admin::list_admin_logs))
        // Settings
        .route(
            "/api/admin/settings",
            get(settings::list_settings).post(settings::create_setting),
        )
        .route(
            "/api/admin/settings/category/:category",
            get(settings::get_settings_by_category),
        )
        .route("/api/admin/settings/name/:name", get(settings::get_setting_by_name))
        .route(
            "/api/admin/settings/name/:name/value",
            put(settings::set_setting_value),
        )
        .route(
            "/api/admin/settings/name/:name/reset",
            post(settings::reset_setting),
        )
        .route(
            "/api/admin/settings/:id",
            get(settings::get_setting)
                .put(settings::update_setting)
                .delete(settings::delete_setting),
        )
        .route("/api/settings/public", get(settings::public_settings))
        // Doctors
        .route("/api/doctors", get(doctors::list_doctors))
        .route(
            "/api/doctors/me/profile",
            get(doctors::my_profile).put(doctors::update_my_profile),
        )
        .route("/api/doctors/me/dashboard", get(dashboard::doctor_dashboard))
        .route("/api/doctors/me/patients", get(doctors::my_patients))
        .route("/api/doctors/:id", get(doctors::get_doctor))
        .route("/api/doctors/:id/slots", get(doctors::get_slots))
        .route("/api/doctors/:id/reviews", get(reviews::doctor_reviews))
        // Patients
        .route(
            "/api/patients/me/profile",
            get(patients::my_profile).put(patients::update_my_profile),
        )
        .route("/api/patients/me/dashboard", get(dashboard::patient_dashboard))
        .route("/api/patients/:id", get(patients::get_patient))
        // Appointments
        .route(
            "/api/appointments",
            get(appointments::list_appointments).post(appointments::book_appointment),
        )
        .route("/api/appointments/:id", get(appointments::get_appointment))
        .route(
            "/api/appointments/:id/status",
            put(appointments::update_appointment_status),
        )
        .route(
            "/api/appointments/:id/reschedule",
            put(appointments::reschedule_appointment),
        )
        // Prescriptions
        .route(
            "/api/prescriptions",
            get(prescriptions::list_prescriptions).post(prescriptions::create_prescription),
        )
        .route(
            "/api/prescriptions/:id",
            get(prescriptions::get_prescription).put(prescriptions::update_prescription),
        )
        // Medical reports
        .route(
            "/api/reports",
            get(reports::list_reports).post(reports::upload_report),
        )
        .route(
            "/api/reports/:id",
            get(reports::get_report).delete(reports::delete_report),
        )
        .route("/api/reports/:id/file", get(reports::download_report_file))
        // Reviews
        .route("/api/reviews", post(reviews::create_review))
        .route("/api/reviews/me", get(reviews::my_reviews))
        // Notifications
        .route("/api/notifications", get(notifications::list_notifications))
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/api/notifications/read-all", put(notifications::mark_all_read))
        .route("/api/notifications/:id/read", put(notifications::mark_read))
        .route(
            "/api/notifications/:id",
            delete(notifications::delete_notification),
        )
        // Chat
        .route("/api/chat/messages", post(chat::send_message))
        .route("/api/chat/messages/:partner_id", get(chat::get_thread))
        .route("/api/chat/conversations", get(chat::list_conversations))
        // Realtime
        .route("/ws", get(websocket::websocket_handler))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::enrich_problem_details,
        ))
        .layer(axum_middleware::from_fn(middleware::add_no_store_headers))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("BUILD_INFO"),
    }))
}

async fn fallback() -> AppError {
    AppError::not_found("Route")
}

#[cfg(test)]
mod tests;
