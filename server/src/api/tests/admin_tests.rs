use axum::http::{Method, StatusCode};
use serde_json::json;

use super::*;

#[tokio::test]
async fn test_doctor_registration_notifies_admins() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;

    app.register(Role::Doctor, "house@example.com").await;

    let notifications = app.get("/api/notifications", &admin.token).await;
    assert_eq!(notifications.status, StatusCode::OK);
    assert_eq!(notifications.body["total"], 1);
    assert_eq!(notifications.body["items"][0]["kind"], "system");
}

#[tokio::test]
async fn test_approve_doctor_lists_them_publicly() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let doctor = app.register(Role::Doctor, "house@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    let hidden = app.get(&format!("/api/doctors/{}", doctor.id), &patient.token).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);
    let directory = app.request(Method::GET, "/api/doctors", None, None).await;
    assert_eq!(directory.body["total"], 0);

    let approved = app
        .request(
            Method::PUT,
            &format!("/api/admin/doctors/{}/approve", doctor.id),
            Some(&admin.token),
            None,
        )
        .await;
    assert_eq!(approved.status, StatusCode::OK, "{}", approved.body);
    assert_eq!(approved.body["approval_status"], "approved");
    assert_eq!(approved.body["status"], "active");

    let again = app
        .request(
            Method::PUT,
            &format!("/api/admin/doctors/{}/approve", doctor.id),
            Some(&admin.token),
            None,
        )
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    let directory = app.request(Method::GET, "/api/doctors", None, None).await;
    assert_eq!(directory.body["total"], 1);
    assert_eq!(directory.body["items"][0]["id"], doctor.id.as_str());

    let logs = app.get("/api/admin/logs?action=approve", &admin.token).await;
    assert_eq!(logs.body["total"], 1);
    assert_eq!(logs.body["items"][0]["target_table"], "doctor_profiles");
    assert_eq!(logs.body["items"][0]["target_id"], doctor.id.as_str());
    assert_eq!(logs.body["items"][0]["details"]["from"], "pending");

    let doctor_unread = app.get("/api/notifications/unread-count", &doctor.token).await;
    assert_eq!(doctor_unread.body["unread"], 1);
}

#[tokio::test]
async fn test_reject_doctor_locks_account() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let doctor = app.register(Role::Doctor, "house@example.com").await;

    let rejected = app
        .request(
            Method::PUT,
            &format!("/api/admin/doctors/{}/reject", doctor.id),
            Some(&admin.token),
            None,
        )
        .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(rejected.body["approval_status"], "rejected");

    let me = app.get("/api/auth/me", &doctor.token).await;
    assert_eq!(me.status, StatusCode::FORBIDDEN);
    assert_eq!(me.body["detail"], "Account is rejected");
}

#[tokio::test]
async fn test_admin_cannot_change_or_delete_self() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;

    let suspend = app
        .put(
            &format!("/api/admin/users/{}/status", admin.id),
            &admin.token,
            json!({ "status": "suspended" }),
        )
        .await;
    assert_eq!(suspend.status, StatusCode::BAD_REQUEST);

    let delete = app.delete(&format!("/api/admin/users/{}", admin.id), &admin.token).await;
    assert_eq!(delete.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_status_limited_to_active_and_suspended() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    let pending = app
        .put(
            &format!("/api/admin/users/{}/status", patient.id),
            &admin.token,
            json!({ "status": "pending" }),
        )
        .await;
    assert_eq!(pending.status, StatusCode::BAD_REQUEST);

    let suspended = app
        .put(
            &format!("/api/admin/users/{}/status", patient.id),
            &admin.token,
            json!({ "status": "suspended" }),
        )
        .await;
    assert_eq!(suspended.body["status"], "suspended");

    let logs = app.get("/api/admin/logs?action=suspend", &admin.token).await;
    assert_eq!(logs.body["total"], 1);
    assert_eq!(logs.body["items"][0]["admin_name"], "Admin");
}

#[tokio::test]
async fn test_list_and_delete_users() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;
    app.register(Role::Patient, "john@example.com").await;
    app.register(Role::Doctor, "house@example.com").await;

    let patients = app.get("/api/admin/users?role=patient", &admin.token).await;
    assert_eq!(patients.status, StatusCode::OK);
    assert_eq!(patients.body["total"], 2);

    let search = app.get("/api/admin/users?search=jane", &admin.token).await;
    assert_eq!(search.body["total"], 1);

    let deleted = app
        .delete(&format!("/api/admin/users/{}", patient.id), &admin.token)
        .await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.body);

    let gone = app.get(&format!("/api/admin/users/{}", patient.id), &admin.token).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let by_patient = app.get("/api/admin/users", &patient.token).await;
    assert_eq!(by_patient.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_dashboard_counts() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    app.register(Role::Doctor, "house@example.com").await;
    app.register(Role::Patient, "jane@example.com").await;

    let dashboard = app.get("/api/admin/dashboard", &admin.token).await;
    assert_eq!(dashboard.status, StatusCode::OK, "{}", dashboard.body);
    assert_eq!(dashboard.body["pending_doctor_approvals"], 1);
    assert_eq!(dashboard.body["users_by_role"]["patient"], 1);
}
