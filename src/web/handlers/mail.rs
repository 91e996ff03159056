//! Mail handlers.
//!
//! Every endpoint is a POST whose body names the player; the name must match
//! the authenticated principal.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use utoipa;

use crate::web::dto::{
    ApiResponse, ClaimResponse, InboxMailResponse, MailUserRequest, MarkResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::{AuthUser, JwtClaims};

fn require_principal(claims: &JwtClaims, req: &MailUserRequest) -> Result<i64, ApiError> {
    if claims.userid != req.userid {
        tracing::warn!(
            principal = claims.userid,
            requested = req.userid,
            "Mail request for another player"
        );
        return Err(ApiError::forbidden("userid does not match the authenticated player"));
    }
    Ok(req.userid)
}

/// POST /api/mail/list - List the player's visible mails.
#[utoipa::path(
    post,
    path = "/mail/list",
    tag = "mail",
    request_body = MailUserRequest,
    responses(
        (status = 200, description = "Visible mails, newest first", body = Vec<InboxMailResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "userid does not match the token")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_mails(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<MailUserRequest>,
) -> Result<Json<ApiResponse<Vec<InboxMailResponse>>>, ApiError> {
    let user_id = require_principal(&claims, &req)?;

    let mails = state.inbox.list(user_id).await?;
    let responses = mails.into_iter().map(InboxMailResponse::from).collect();

    Ok(Json(ApiResponse::new(responses)))
}

/// POST /api/mail/detail/:id - Get one visible mail.
#[utoipa::path(
    post,
    path = "/mail/detail/{id}",
    tag = "mail",
    params(
        ("id" = i64, Path, description = "Mail ID")
    ),
    request_body = MailUserRequest,
    responses(
        (status = 200, description = "Mail details", body = InboxMailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "userid does not match the token"),
        (status = 404, description = "Mail not found or outside its window")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_mail(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(mail_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<MailUserRequest>,
) -> Result<Json<ApiResponse<InboxMailResponse>>, ApiError> {
    let user_id = require_principal(&claims, &req)?;

    let mail = state.inbox.detail(user_id, mail_id).await?;

    Ok(Json(ApiResponse::new(mail.into())))
}

/// POST /api/mail/read/:id - Mark a mail as read.
///
/// Succeeds without change when the mail is already read, claimed or not
/// yet in the player's inbox.
#[utoipa::path(
    post,
    path = "/mail/read/{id}",
    tag = "mail",
    params(
        ("id" = i64, Path, description = "Mail ID")
    ),
    request_body = MailUserRequest,
    responses(
        (status = 200, description = "Marked as read", body = MarkResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "userid does not match the token")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(mail_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<MailUserRequest>,
) -> Result<Json<ApiResponse<MarkResponse>>, ApiError> {
    let user_id = require_principal(&claims, &req)?;

    let updated = state.inbox.mark_read(user_id, mail_id).await?;

    Ok(Json(ApiResponse::new(MarkResponse { updated })))
}

/// POST /api/mail/getaward/:id - Claim a mail's reward.
#[utoipa::path(
    post,
    path = "/mail/getaward/{id}",
    tag = "mail",
    params(
        ("id" = i64, Path, description = "Mail ID")
    ),
    request_body = MailUserRequest,
    responses(
        (status = 200, description = "Reward credited, or already received", body = ClaimResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "userid does not match the token"),
        (status = 404, description = "Mail not found or outside its window"),
        (status = 429, description = "A claim for this mail is in progress"),
        (status = 500, description = "Malformed reward or ledger failure")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn claim_award(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(mail_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<MailUserRequest>,
) -> Result<Json<ApiResponse<ClaimResponse>>, ApiError> {
    let user_id = require_principal(&claims, &req)?;

    let outcome = state.claims.claim(user_id, mail_id).await?;

    Ok(Json(ApiResponse::new(outcome.into())))
}

/// POST /api/mail/delete/:id - Soft-delete a mail.
#[utoipa::path(
    post,
    path = "/mail/delete/{id}",
    tag = "mail",
    params(
        ("id" = i64, Path, description = "Mail ID")
    ),
    request_body = MailUserRequest,
    responses(
        (status = 200, description = "Mail deleted", body = MarkResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "userid does not match the token"),
        (status = 404, description = "Mail not found or outside its window")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_mail(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(mail_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<MailUserRequest>,
) -> Result<Json<ApiResponse<MarkResponse>>, ApiError> {
    let user_id = require_principal(&claims, &req)?;

    state.inbox.delete(user_id, mail_id).await?;

    Ok(Json(ApiResponse::new(MarkResponse { updated: true })))
}
