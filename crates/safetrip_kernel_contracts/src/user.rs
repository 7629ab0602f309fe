#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{is_well_formed_email, is_well_formed_phone, validate_trimmed_len};
use crate::lenient;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const USER_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const SIGNUP_NAME_REASON: &str = "Name must be between 2 and 100 characters";
pub const SIGNUP_EMAIL_REASON: &str = "Must be a valid email address";
pub const SIGNUP_PHONE_REASON: &str = "Must be a valid phone number";
pub const SIGNUP_PASSWORD_REASON: &str = "Password must be at least 6 characters long";
pub const LOGIN_PASSWORD_REASON: &str = "Password is required";

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for UserId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.is_empty() || self.0.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "user id must be 1..=64 bytes",
            });
        }
        if !self.0.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "user id must be printable ascii",
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-cased, trimmed email. Equality is case-insensitive by construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        if !is_well_formed_email(raw) {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: SIGNUP_EMAIL_REASON,
            });
        }
        Ok(Self(raw.trim().to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: EmailAddress,
    pub phone: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn v1(
        id: UserId,
        name: String,
        email: EmailAddress,
        phone: String,
        password_hash: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            name,
            email,
            phone,
            password_hash,
            created_at,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            created_at: self.created_at,
        }
    }
}

impl Validate for UserRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        validate_trimmed_len("user_record.name", &self.name, 2, 100, SIGNUP_NAME_REASON)?;
        if !is_well_formed_phone(&self.phone) {
            return Err(ContractViolation::InvalidValue {
                field: "user_record.phone",
                reason: SIGNUP_PHONE_REASON,
            });
        }
        if self.password_hash.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "user_record.password_hash",
                reason: "password hash must not be empty",
            });
        }
        Ok(())
    }
}

/// User projection returned to clients; carries no password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub email: EmailAddress,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub email: String,
    #[serde(deserialize_with = "lenient::text")]
    pub phone: String,
    #[serde(deserialize_with = "lenient::text")]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSignup {
    pub name: String,
    pub email: EmailAddress,
    pub phone: String,
    pub password: String,
}

impl SignupRequest {
    pub fn into_validated(self) -> Result<ValidatedSignup, ContractViolation> {
        validate_trimmed_len("signup.name", &self.name, 2, 100, SIGNUP_NAME_REASON)?;
        let email = EmailAddress::parse(&self.email)?;
        if !is_well_formed_phone(&self.phone) {
            return Err(ContractViolation::InvalidValue {
                field: "signup.phone",
                reason: SIGNUP_PHONE_REASON,
            });
        }
        if self.password.encode_utf16().count() < MIN_PASSWORD_LEN {
            return Err(ContractViolation::InvalidValue {
                field: "signup.password",
                reason: SIGNUP_PASSWORD_REASON,
            });
        }
        Ok(ValidatedSignup {
            name: self.name.trim().to_string(),
            email,
            phone: self.phone.trim().to_string(),
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    #[serde(deserialize_with = "lenient::text")]
    pub email: String,
    #[serde(deserialize_with = "lenient::text")]
    pub password: String,
}

impl LoginRequest {
    pub fn into_validated(self) -> Result<(EmailAddress, String), ContractViolation> {
        let email = EmailAddress::parse(&self.email)?;
        if self.password.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "login.password",
                reason: LOGIN_PASSWORD_REASON,
            });
        }
        Ok((email, self.password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignupRequest {
        SignupRequest {
            name: "  Asha Rao ".to_string(),
            email: "Asha.Rao@Example.COM".to_string(),
            phone: "+919876543210".to_string(),
            password: "secret1".to_string(),
        }
    }

    #[test]
    fn at_user_01_signup_normalizes_email_and_name() {
        let v = signup().into_validated().unwrap();
        assert_eq!(v.email.as_str(), "asha.rao@example.com");
        assert_eq!(v.name, "Asha Rao");
    }

    #[test]
    fn at_user_02_signup_surfaces_first_violation() {
        let mut req = signup();
        req.name = "A".to_string();
        req.email = "broken".to_string();
        let err = req.into_validated().unwrap_err();
        assert_eq!(err.reason(), SIGNUP_NAME_REASON);

        let mut req = signup();
        req.password = "12345".to_string();
        assert_eq!(
            req.into_validated().unwrap_err().reason(),
            SIGNUP_PASSWORD_REASON
        );
    }

    #[test]
    fn at_user_03_public_projection_has_no_hash() {
        let rec = UserRecord::v1(
            UserId::new("user_1").unwrap(),
            "Asha".to_string(),
            EmailAddress::parse("asha@example.com").unwrap(),
            "+1234567890".to_string(),
            "$argon2id$hash".to_string(),
            Utc::now(),
        )
        .unwrap();
        let json = serde_json::to_value(rec.public()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "asha@example.com");
    }

    #[test]
    fn at_user_04_login_requires_password() {
        let err = LoginRequest {
            email: "asha@example.com".to_string(),
            password: String::new(),
        }
        .into_validated()
        .unwrap_err();
        assert_eq!(err.reason(), LOGIN_PASSWORD_REASON);
    }
}
