use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::auth::services::{is_valid_email, Confirmation, MailDelivery};
use crate::error::AccountError;

fn required(value: &str, field: &str) -> Result<(), AccountError> {
    if value.trim().is_empty() {
        return Err(AccountError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn matching(new_password: &str, confirm_password: &str) -> Result<(), AccountError> {
    if new_password != confirm_password {
        return Err(AccountError::Validation("Passwords must match".into()));
    }
    Ok(())
}

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), AccountError> {
        required(&self.username, "username")?;
        required(&self.email, "email")?;
        required(&self.password, "password")?;
        if !is_valid_email(self.email.trim()) {
            return Err(AccountError::Validation("Invalid email".into()));
        }
        Ok(())
    }
}

/// Request body for signin.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

impl SigninRequest {
    pub fn validate(&self) -> Result<(), AccountError> {
        required(&self.username, "username")?;
        required(&self.password, "password")
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), AccountError> {
        required(&self.email, "email")?;
        if !is_valid_email(self.email.trim()) {
            return Err(AccountError::Validation("Invalid email".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordConfirmRequest {
    pub new_password: String,
    pub confirm_password: String,
}

impl ResetPasswordConfirmRequest {
    pub fn validate(&self) -> Result<(), AccountError> {
        required(&self.new_password, "new_password")?;
        matching(&self.new_password, &self.confirm_password)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), AccountError> {
        required(&self.old_password, "old_password")?;
        required(&self.new_password, "new_password")?;
        matching(&self.new_password, &self.confirm_password)
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_confirmed: bool,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            created_at: u.created_at,
            is_confirmed: u.is_confirmed,
        }
    }
}

/// Delivery status attached to responses that send mail.
#[derive(Debug, Serialize)]
pub struct MailStatus {
    pub mail: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<MailDelivery> for MailStatus {
    fn from(d: MailDelivery) -> Self {
        match d {
            MailDelivery::Sent => Self {
                mail: "sent",
                warning: None,
            },
            MailDelivery::Failed(reason) => Self {
                mail: "failed",
                warning: Some(format!("Email could not be delivered: {reason}")),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub user: PublicUser,
    #[serde(flatten)]
    pub mail: MailStatus,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub access_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub status: &'static str,
    pub message: &'static str,
}

impl From<Confirmation> for ConfirmResponse {
    fn from(c: Confirmation) -> Self {
        match c {
            Confirmation::Confirmed => Self {
                status: "confirmed",
                message: "Email confirmed!",
            },
            Confirmation::AlreadyConfirmed => Self {
                status: "already_confirmed",
                message: "Email already confirmed.",
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub mail: Option<MailStatus>,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self {
            message,
            mail: None,
        }
    }
}
