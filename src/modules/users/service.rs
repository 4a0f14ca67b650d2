use std::sync::Arc;

use anyhow::Context;
use covers_authz::{hash_password, verify_password, Identity, TokenIssuer};
use covers_db::{Collection, StoreError};
use covers_http::error::FieldError;
use once_cell::sync::Lazy;
use time::OffsetDateTime;
use uuid::Uuid;

use super::models::{AuthResponse, LoginRequest, PublicUser, RegisterUser, User};
use crate::error::{LendingError, LendingResult};
use crate::utils;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;
const PASSWORD_MIN: usize = 8;
const BAD_CREDENTIALS: &str = "invalid email or password";

/// Hash checked when the email is unknown so both failure paths cost the same.
static TIMING_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("covers-timing-equalizer").ok());

/// Account registration, login and lookup.
pub struct UserService {
    users: Collection<User>,
    tokens: Arc<TokenIssuer>,
}

impl UserService {
    pub fn new(users: Collection<User>, tokens: Arc<TokenIssuer>) -> Self {
        Self { users, tokens }
    }

    pub fn collection(&self) -> &Collection<User> {
        &self.users
    }

    /// Creates an account and signs the new user in.
    pub async fn register(&self, input: RegisterUser) -> LendingResult<AuthResponse> {
        let mut errors = Vec::new();
        let username = utils::required_text(
            "username",
            &input.username,
            USERNAME_MIN,
            USERNAME_MAX,
            "Please choose a username",
            &mut errors,
        );
        if !username.is_empty()
            && !username
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            errors.push(FieldError::new(
                "username",
                "may only contain letters, digits, '.', '-' and '_'",
            ));
        }

        let email = input.email.trim().to_lowercase();
        if email.is_empty() {
            errors.push(FieldError::new("email", "We need your email address"));
        } else if !looks_like_email(&email) {
            errors.push(FieldError::new(
                "email",
                "Something is strange about that email address",
            ));
        }

        if input.password.chars().count() < PASSWORD_MIN {
            errors.push(FieldError::new(
                "password",
                format!("must be at least {PASSWORD_MIN} characters"),
            ));
        }

        if !errors.is_empty() {
            return Err(LendingError::Validation(errors));
        }

        let password = input.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")??;

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::now_v7(),
            username,
            email,
            password_hash,
            street1: utils::trimmed(input.street1),
            street2: utils::trimmed(input.street2),
            zip_code: utils::trimmed(input.zip_code),
            created_at: now,
            updated_at: now,
        };

        let user = self
            .users
            .insert_unique(user, |existing, new| {
                existing.email == new.email
                    || existing.username.to_lowercase() == new.username.to_lowercase()
            })
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists { .. } => {
                    LendingError::conflict("username or email is already registered")
                }
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        self.respond(&user)
    }

    /// Checks credentials and issues a token.
    pub async fn login(&self, request: LoginRequest) -> LendingResult<AuthResponse> {
        let email = request.email.trim().to_lowercase();
        let user = self.users.find_one(|u| u.email == email).await;

        let stored_hash = match &user {
            Some(user) => Some(user.password_hash.clone()),
            None => TIMING_HASH.clone(),
        };
        let password = request.password;
        let verified = tokio::task::spawn_blocking(move || {
            stored_hash
                .map(|hash| verify_password(&password, &hash))
                .unwrap_or(false)
        })
        .await
        .context("password verification task failed")?;

        match user {
            Some(user) if verified => {
                tracing::info!(user_id = %user.id, "user logged in");
                self.respond(&user)
            }
            _ => {
                tracing::info!("rejected login attempt");
                Err(LendingError::Unauthorized(BAD_CREDENTIALS.to_string()))
            }
        }
    }

    /// The signed-in user's own record.
    pub async fn me(&self, identity: &Identity) -> LendingResult<PublicUser> {
        self.users
            .get(identity.user_id)
            .await
            .map(|user| PublicUser::from(&user))
            .ok_or_else(|| LendingError::not_found("user", identity.user_id))
    }

    fn respond(&self, user: &User) -> LendingResult<AuthResponse> {
        let token = self.tokens.issue(user.id, &user.username, &user.email)?;
        Ok(AuthResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.expires_in_seconds(),
            user: PublicUser::from(user),
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}
