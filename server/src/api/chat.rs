//! Direct messages between patients, their doctors and administrators

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use super::helpers::{notify, push_event, EVENT_CHAT_MESSAGE};
use super::{parse_id, ApiJson, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{ChatMessage, Conversation, NotificationKind, Role, SendMessageRequest, User};

/// Preview length of a message inside its notification
const PREVIEW_CHARS: usize = 80;

/// Admins may talk to anyone; otherwise only a doctor and a patient who share an appointment
async fn check_can_chat(state: &AppState, auth: &AuthUser, partner: &User) -> AppResult<()> {
    if partner.id == auth.id {
        return Err(AppError::validation("You cannot message yourself"));
    }
    if auth.is_admin() || partner.role == Role::Admin {
        return Ok(());
    }

    let shared = match (auth.role, partner.role) {
        (Role::Doctor, Role::Patient) => {
            state.db.has_shared_appointment(&auth.id, &partner.id).await?
        }
        (Role::Patient, Role::Doctor) => {
            state.db.has_shared_appointment(&partner.id, &auth.id).await?
        }
        _ => false,
    };
    if shared {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "Messaging is only available between a patient and a doctor who share an appointment",
        ))
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

#[instrument(skip_all, fields(sender_id = %auth.id, recipient_id = %req.recipient_id))]
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    req.validate()?;

    let recipient_id = parse_id(&req.recipient_id)?;
    let recipient = state
        .db
        .get_user(&recipient_id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipient"))?;
    check_can_chat(&state, &auth, &recipient).await?;

    let message = state
        .db
        .create_message(&auth.id, &recipient.id, &req.body)
        .await?;
    tracing::info!(message_id = %message.id, "Message sent");

    push_event(&state, &recipient.id, EVENT_CHAT_MESSAGE, &message);
    notify(
        &state,
        &recipient.id,
        NotificationKind::Chat,
        format!("New message from {}", auth.name),
        preview(&message.body),
        Some(format!("/chat/{}", auth.id)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(message)))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Conversation>>> {
    Ok(Json(state.db.list_conversations(&auth.id).await?))
}

/// Full thread with one partner, oldest first; received messages are marked read
#[instrument(skip_all, fields(user_id = %auth.id, partner_id = %partner_id))]
pub async fn get_thread(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(partner_id): Path<String>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let partner_id = parse_id(&partner_id)?;
    let partner = state
        .db
        .get_user(&partner_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    check_can_chat(&state, &auth, &partner).await?;

    Ok(Json(state.db.get_thread(&auth.id, &partner.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_messages() {
        assert_eq!(preview("short"), "short");

        let long = "é".repeat(PREVIEW_CHARS + 10);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
    }
}
