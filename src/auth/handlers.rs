use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ConfirmResponse, MessageResponse, PublicUser,
            ResetPasswordConfirmRequest, ResetPasswordRequest, SigninRequest, SigninResponse,
            SignupRequest, SignupResponse,
        },
        session::Session,
    },
    error::AccountError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/confirm/:token", get(confirm_email))
        .route("/auth/signin", post(signin))
        .route("/auth/logout", post(logout))
        .route("/auth/reset-password", post(request_password_reset))
        .route("/auth/reset-password/:token", post(confirm_password_reset))
        .route("/auth/change-password", post(change_password))
        .route("/auth/account", delete(delete_account))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AccountError> {
    payload.validate()?;
    let out = state
        .accounts
        .signup(&payload.username, &payload.email, &payload.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Account created! Please check your email to confirm.",
            user: out.user.into(),
            mail: out.mail.into(),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ConfirmResponse>, AccountError> {
    let outcome = state.accounts.confirm_email(&token).await?;
    Ok(Json(outcome.into()))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<SigninResponse>, AccountError> {
    payload.validate()?;
    let signed_in = state
        .accounts
        .signin(&payload.username, &payload.password)
        .await?;
    let access_token = state.sessions.sign(&signed_in.session)?;
    Ok(Json(SigninResponse {
        access_token,
        user: signed_in.user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>, session: Session) -> StatusCode {
    state.accounts.logout(session).await;
    StatusCode::NO_CONTENT
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AccountError> {
    payload.validate()?;
    let mail = state.accounts.request_password_reset(&payload.email).await?;
    Ok(Json(MessageResponse {
        message: "Reset link sent to your email.",
        mail: Some(mail.into()),
    }))
}

#[instrument(skip_all)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordConfirmRequest>,
) -> Result<Json<MessageResponse>, AccountError> {
    payload.validate()?;
    state
        .accounts
        .confirm_password_reset(&token, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successful!")))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AccountError> {
    payload.validate()?;
    state
        .accounts
        .change_password(&session, &payload.old_password, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully!")))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<MessageResponse>, AccountError> {
    state.accounts.delete_account(session).await?;
    Ok(Json(MessageResponse::new("Account deleted successfully.")))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<PublicUser>, AccountError> {
    let user = state.accounts.profile(&session).await?;
    Ok(Json(user.into()))
}
