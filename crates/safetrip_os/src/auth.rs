#![forbid(unsafe_code)]

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use safetrip_kernel_contracts::user::{
    LoginRequest, PublicUser, SignupRequest, UserId, UserRecord,
};
use safetrip_storage::repo::CredentialRepo;
use safetrip_storage::StorageError;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, ServiceError};

pub const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Caller identity recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
}

/// HS256 token issuance and verification.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::days(TOKEN_TTL_DAYS),
        }
    }

    pub fn issue(
        &self,
        user_id: &UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let claims = TokenClaims {
            user_id: user_id.as_str().to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::warn!(error = %e, "token verification failed");
                AuthError::InvalidToken
            })?;
        let user_id = UserId::new(data.claims.user_id).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthenticatedUser {
            user_id,
            email: data.claims.email,
        })
    }
}

/// Pulls the token out of an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(_scheme), Some(token)) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MissingToken),
    }
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
}

pub struct AuthRuntime {
    credentials: Arc<dyn CredentialRepo>,
    tokens: Arc<TokenService>,
}

impl AuthRuntime {
    pub fn new(credentials: Arc<dyn CredentialRepo>, tokens: Arc<TokenService>) -> Self {
        Self {
            credentials,
            tokens,
        }
    }

    pub fn signup(
        &self,
        req: SignupRequest,
        now: DateTime<Utc>,
    ) -> Result<AuthSession, ServiceError> {
        let v = req.into_validated()?;
        if self.credentials.user_row_by_email(&v.email)?.is_some() {
            return Err(ServiceError::Conflict("User with this email already exists"));
        }
        let record = UserRecord::v1(
            UserId::generate(),
            v.name,
            v.email,
            v.phone,
            hash_password(&v.password)?,
            now,
        )?;
        match self.credentials.insert_user_row(record.clone()) {
            Ok(()) => {}
            Err(StorageError::DuplicateKey { .. }) => {
                return Err(ServiceError::Conflict("User with this email already exists"));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(user_id = %record.id, "user signed up");
        self.session_for(&record, now)
    }

    pub fn login(&self, req: LoginRequest, now: DateTime<Utc>) -> Result<AuthSession, ServiceError> {
        let (email, password) = req.into_validated()?;
        let record = self
            .credentials
            .user_row_by_email(&email)?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&password, &record.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }
        self.session_for(&record, now)
    }

    pub fn authenticate(&self, authorization: Option<&str>) -> Result<AuthenticatedUser, AuthError> {
        self.tokens.verify(bearer_token(authorization)?)
    }

    fn session_for(
        &self,
        record: &UserRecord,
        now: DateTime<Utc>,
    ) -> Result<AuthSession, ServiceError> {
        let token = self.tokens.issue(&record.id, record.email.as_str(), now)?;
        Ok(AuthSession {
            user: record.public(),
            token,
        })
    }
}
