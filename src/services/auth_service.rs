use bcrypt::{BcryptError, DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::enums::Role;
use crate::db::models::{NewUserAccount, UserIdentity};
use crate::db::store::{StoreError, UserStore};
use crate::services::access_policy::require_admin;
use crate::services::timestamp_now;
use crate::web::error::AppError;

const MIN_PASSWORD_LEN: usize = 8;

/// Session token payload. `role` holds the stored user type string and
/// `jti` identifies the session so it can be revoked before `exp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub org: String,
    pub jti: String,
    pub exp: usize,
}

/// A live, verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: UserIdentity,
    pub token_id: String,
    pub expires_at: usize,
}

/// Token ids ended by logout, kept until their own expiry.
type RevokedSessions = Arc<Mutex<HashMap<String, usize>>>;

fn unix_now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: UserIdentity,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: String,
    pub password: String,
    pub role: Role,
    pub organization: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_secret: String,
    session_ttl: Duration,
    hash_cost: u32,
    revoked: RevokedSessions,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt_secret: impl Into<String>, session_ttl_hours: i64) -> Self {
        Self {
            users,
            jwt_secret: jwt_secret.into(),
            session_ttl: Duration::hours(session_ttl_hours),
            hash_cost: DEFAULT_COST,
            revoked: RevokedSessions::default(),
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn login(&self, user_id: &str, password: &str) -> Result<LoginOutcome, AppError> {
        if user_id.is_empty() || password.is_empty() {
            return Err(AppError::ValidationFailed(
                "User ID and password must not be empty.".to_string(),
            ));
        }

        let Some(account) = self.users.find_by_user_id(user_id).await? else {
            warn!(user_id, "Login attempt for unknown user.");
            return Err(AppError::InvalidCredentials);
        };

        let valid_password = match verify(password, &account.password_hash) {
            Ok(valid) => valid,
            // Accounts carried over from before hashing hold no bcrypt hash
            Err(BcryptError::InvalidHash(_) | BcryptError::InvalidPrefix(_)) => {
                warn!(user_id, "Stored password is not a bcrypt hash, rejecting login.");
                false
            }
            Err(e) => {
                error!(user_id, error = %e, "Password verification failed.");
                return Err(AppError::InternalServerError(
                    "Password verification failed".to_string(),
                ));
            }
        };
        if !valid_password {
            warn!(user_id, "Login attempt with a wrong password.");
            return Err(AppError::InvalidCredentials);
        }

        let identity = account.identity();
        let token = self.issue_token(&identity)?;
        info!(user_id, role = %identity.role, "User logged in.");
        Ok(LoginOutcome { identity, token })
    }

    pub fn issue_token(&self, identity: &UserIdentity) -> Result<String, AppError> {
        let expiration = (Utc::now() + self.session_ttl).timestamp().max(0) as usize;
        let claims = Claims {
            sub: identity.user_id.clone(),
            role: identity.role.as_user_type().to_string(),
            org: identity.organization.clone(),
            jti: Uuid::new_v4().to_string(),
            exp: expiration,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::TokenCreationError(format!("Failed to sign session token: {e}")))
    }

    fn decode_token(&self, token: &str) -> Result<Session, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            warn!(error = ?e, "Rejected session token.");
            AppError::NotAuthenticated
        })?;

        let claims = token_data.claims;
        Ok(Session {
            identity: UserIdentity {
                user_id: claims.sub,
                role: Role::from_user_type(&claims.role),
                organization: claims.org,
            },
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Resolves a session token into the session it was issued for, unless
    /// that session has been logged out.
    pub async fn authenticate(&self, token: &str) -> Result<Session, AppError> {
        let session = self.decode_token(token)?;
        if self.revoked.lock().await.contains_key(&session.token_id) {
            warn!(user_id = %session.identity.user_id, "Rejected token of a logged out session.");
            return Err(AppError::NotAuthenticated);
        }
        Ok(session)
    }

    /// Ends `session`. Its token is refused from now on.
    pub async fn logout(&self, session: &Session) {
        let now = unix_now();
        let mut revoked = self.revoked.lock().await;
        revoked.retain(|_, expires_at| *expires_at > now);
        revoked.insert(session.token_id.clone(), session.expires_at);
        info!(user_id = %session.identity.user_id, "User logged out.");
    }

    pub async fn create_user(
        &self,
        identity: &UserIdentity,
        new_user: NewUser,
    ) -> Result<UserIdentity, AppError> {
        require_admin(identity, "create users")?;

        let user_id = new_user.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(AppError::ValidationFailed("User ID must not be empty.".to_string()));
        }
        if new_user.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::ValidationFailed(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }

        let created = self
            .insert_account(user_id, &new_user.password, new_user.role, new_user.organization.trim())
            .await?;
        info!(created_by = %identity.user_id, user_id = %created.user_id, role = %created.role, "User created.");
        Ok(created)
    }

    /// Creates an admin account under `user_id` unless one with that id
    /// already exists. Returns whether an account was created.
    pub async fn ensure_bootstrap_admin(&self, user_id: &str, password: &str) -> Result<bool, AppError> {
        if self.users.find_by_user_id(user_id).await?.is_some() {
            return Ok(false);
        }
        self.insert_account(user_id.to_string(), password, Role::Admin, "").await?;
        info!(user_id, "Bootstrap admin account created.");
        Ok(true)
    }

    async fn insert_account(
        &self,
        user_id: String,
        password: &str,
        role: Role,
        organization: &str,
    ) -> Result<UserIdentity, AppError> {
        let password_hash = hash(password, self.hash_cost)
            .map_err(|e| AppError::PasswordHashingError(format!("Failed to hash password: {e}")))?;

        let account = self
            .users
            .insert(NewUserAccount {
                user_id,
                password_hash,
                role,
                organization: organization.to_string(),
                created_at: timestamp_now(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(user_id) => AppError::UserAlreadyExists(user_id),
                other => other.into(),
            })?;
        Ok(account.identity())
    }
}
