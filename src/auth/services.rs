use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        repo::{InsertError, UserStore},
        repo_types::{NewUser, User},
        session::Session,
        tokens::{LinkTokens, Purpose, TokenError},
    },
    error::AccountError,
    mail::{confirmation_email, reset_email, Mailer},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

lazy_static! {
    /// Stand-in hash verified when the username is unknown, so both signin
    /// failures pay for one Argon2 run.
    static ref DUMMY_HASH: String = hash_password("no-such-user").unwrap_or_default();
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Outcome of a mail send. A failure never undoes what was already persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailDelivery {
    Sent,
    Failed(String),
}

#[derive(Debug)]
pub struct SignedUp {
    pub user: User,
    pub mail: MailDelivery,
}

#[derive(Debug)]
pub struct SignedIn {
    pub session: Session,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    /// Nothing was written.
    AlreadyConfirmed,
}

/// Drives signup, confirmation, signin and credential changes.
pub struct Accounts {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    tokens: LinkTokens,
    base_url: String,
}

impl Accounts {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        tokens: LinkTokens,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mailer,
            tokens,
            base_url: base_url.into(),
        }
    }

    pub fn tokens(&self) -> &LinkTokens {
        &self.tokens
    }

    pub fn confirm_link(&self, token: &str) -> String {
        format!("{}/api/v1/auth/confirm/{}", self.base_url, token)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/api/v1/auth/reset-password/{}", self.base_url, token)
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> MailDelivery {
        match self.mailer.send(to, subject, body).await {
            Ok(()) => MailDelivery::Sent,
            Err(e) => {
                warn!(error = %e, to, subject, "mail delivery failed");
                MailDelivery::Failed(e.to_string())
            }
        }
    }

    fn check_link(&self, token: &str, purpose: Purpose) -> Result<String, AccountError> {
        self.tokens.verify(token, purpose).map_err(|e| {
            match e {
                TokenError::Expired => warn!(purpose = purpose.salt(), "expired link"),
                TokenError::Invalid => warn!(purpose = purpose.salt(), "invalid link"),
            }
            AccountError::ExpiredOrInvalidLink
        })
    }

    /// Resolves a session to its user; a session whose user is gone is unauthorized.
    async fn session_user(&self, session: &Session) -> Result<User, AccountError> {
        self.store
            .find_by_id(session.user_id)
            .await?
            .ok_or(AccountError::Unauthorized)
    }

    #[instrument(skip(self, password))]
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SignedUp, AccountError> {
        let username = username.trim();
        let email = normalize_email(email);

        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AccountError::DuplicateEmail);
        }

        let password_hash = hash_password(password)?;
        let user = self
            .store
            .insert(NewUser {
                username: username.to_string(),
                email: email.clone(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                InsertError::EmailTaken => AccountError::DuplicateEmail,
                InsertError::UsernameTaken => AccountError::UsernameTaken,
                InsertError::Other(e) => AccountError::Internal(e),
            })?;
        info!(user_id = %user.id, email = %user.email, "user registered");

        let token = self.tokens.issue(&user.email, Purpose::EmailConfirmation)?;
        let (subject, body) = confirmation_email(&self.confirm_link(&token));
        let mail = self.deliver(&user.email, subject, &body).await;

        Ok(SignedUp { user, mail })
    }

    #[instrument(skip_all)]
    pub async fn confirm_email(&self, token: &str) -> Result<Confirmation, AccountError> {
        let email = self.check_link(token, Purpose::EmailConfirmation)?;
        let mut user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::NotFound)?;

        if user.is_confirmed {
            info!(user_id = %user.id, "email already confirmed");
            return Ok(Confirmation::AlreadyConfirmed);
        }

        user.is_confirmed = true;
        self.store.update(&user).await?;
        info!(user_id = %user.id, "email confirmed");
        Ok(Confirmation::Confirmed)
    }

    #[instrument(skip(self, password))]
    pub async fn signin(&self, username: &str, password: &str) -> Result<SignedIn, AccountError> {
        let Some(user) = self.store.find_by_username(username.trim()).await? else {
            let _ = verify_password(password, &DUMMY_HASH);
            warn!("signin unknown username");
            return Err(AccountError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "signin invalid password");
            return Err(AccountError::InvalidCredentials);
        }

        if !user.is_confirmed {
            warn!(user_id = %user.id, "signin before email confirmation");
            return Err(AccountError::NotConfirmed);
        }

        info!(user_id = %user.id, "user signed in");
        Ok(SignedIn {
            session: Session { user_id: user.id },
            user,
        })
    }

    #[instrument(skip(self))]
    pub async fn logout(&self, session: Session) {
        info!(user_id = %session.user_id, "user logged out");
    }

    pub async fn profile(&self, session: &Session) -> Result<User, AccountError> {
        self.session_user(session).await
    }

    /// Unknown addresses are reported as `NotFound`.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<MailDelivery, AccountError> {
        let email = normalize_email(email);
        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::NotFound)?;

        let token = self.tokens.issue(&user.email, Purpose::PasswordReset)?;
        let (subject, body) = reset_email(&self.reset_link(&token));
        info!(user_id = %user.id, "password reset requested");
        Ok(self.deliver(&user.email, subject, &body).await)
    }

    #[instrument(skip_all)]
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let email = self.check_link(token, Purpose::PasswordReset)?;
        let mut user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::NotFound)?;

        user.password_hash = hash_password(new_password)?;
        self.store.update(&user).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        session: &Session,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let mut user = self.session_user(session).await?;
        if !verify_password(old_password, &user.password_hash)? {
            warn!(user_id = %user.id, "change password with incorrect old password");
            return Err(AccountError::IncorrectPassword);
        }

        user.password_hash = hash_password(new_password)?;
        self.store.update(&user).await?;
        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Deletes the session's user; the session is consumed either way.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, session: Session) -> Result<(), AccountError> {
        let user = self.session_user(&session).await?;
        self.store.delete(user.id).await?;
        info!(user_id = %user.id, "account deleted");
        Ok(())
    }
}
