#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::common::{is_well_formed_email, is_well_formed_phone, validate_trimmed_len};
use crate::lenient;
use crate::user::UserId;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const ISSUANCE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const ISSUANCE_KEY_REASON: &str = "Invalid blockchain ID";
pub const SUBJECT_NAME_REASON: &str = "Invalid user name";
pub const SUBJECT_EMAIL_REASON: &str = "Invalid email address";
pub const SUBJECT_PHONE_REASON: &str = "Invalid phone number";

pub const EXPLORER_TX_URL_PREFIX: &str = "https://polygonscan.com/tx/";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuanceId(String);

impl IssuanceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Externally chosen identity key; unique across all issuances.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuanceKey(String);

impl IssuanceKey {
    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let v = Self(raw.trim().to_string());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for IssuanceKey {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_trimmed_len("issuance.blockchain_id", &self.0, 10, 100, ISSUANCE_KEY_REASON)
    }
}

impl std::fmt::Display for IssuanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuanceStatus {
    Confirmed,
    Pending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectInfo {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub email: String,
    #[serde(deserialize_with = "lenient::text")]
    pub phone: String,
}

impl Validate for SubjectInfo {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_trimmed_len("user_info.name", &self.name, 2, 100, SUBJECT_NAME_REASON)?;
        if !is_well_formed_email(&self.email) {
            return Err(ContractViolation::InvalidValue {
                field: "user_info.email",
                reason: SUBJECT_EMAIL_REASON,
            });
        }
        if !is_well_formed_phone(&self.phone) {
            return Err(ContractViolation::InvalidValue {
                field: "user_info.phone",
                reason: SUBJECT_PHONE_REASON,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IssueRequest {
    #[serde(deserialize_with = "lenient::text")]
    pub blockchain_id: String,
    #[serde(deserialize_with = "lenient::nested")]
    pub user_info: SubjectInfo,
    #[serde(deserialize_with = "lenient::opt_object")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuanceDraft {
    pub key: IssuanceKey,
    pub subject: SubjectInfo,
    pub metadata: Map<String, Value>,
}

impl IssueRequest {
    pub fn into_draft(self) -> Result<IssuanceDraft, ContractViolation> {
        let key = IssuanceKey::new(&self.blockchain_id)?;
        self.user_info.validate()?;
        let subject = SubjectInfo {
            name: self.user_info.name.trim().to_string(),
            email: self.user_info.email.trim().to_string(),
            phone: self.user_info.phone.trim().to_string(),
        };
        Ok(IssuanceDraft {
            key,
            subject,
            metadata: self.metadata.unwrap_or_default(),
        })
    }
}

/// Mock ledger coordinates of one issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainAttributes {
    pub transaction_hash: String,
    pub block_number: u64,
    pub network_id: u64,
    pub contract_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIssuance {
    pub user_id: UserId,
    pub draft: IssuanceDraft,
    pub chain: ChainAttributes,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceRecord {
    pub id: IssuanceId,
    pub user_id: UserId,
    #[serde(rename = "blockchainId")]
    pub key: IssuanceKey,
    #[serde(rename = "userInfo")]
    pub subject: SubjectInfo,
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub chain: ChainAttributes,
    #[serde(rename = "tokenId")]
    pub token_sequence: u64,
    pub status: IssuanceStatus,
    pub created_at: DateTime<Utc>,
}

impl IssuanceRecord {
    /// Stamps `issuedAt` into the metadata the way clients read it back.
    pub fn from_new(
        id: IssuanceId,
        token_sequence: u64,
        new: NewIssuance,
    ) -> Result<Self, ContractViolation> {
        let mut metadata = new.draft.metadata;
        metadata.insert(
            "issuedAt".to_string(),
            Value::String(new.created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        );
        let r = Self {
            id,
            user_id: new.user_id,
            key: new.draft.key,
            subject: new.draft.subject,
            metadata,
            chain: new.chain,
            token_sequence,
            status: IssuanceStatus::Confirmed,
            created_at: new.created_at,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn receipt(&self) -> IssueReceipt {
        IssueReceipt {
            chain: self.chain.clone(),
            token_id: self.token_sequence,
            explorer_url: format!("{EXPLORER_TX_URL_PREFIX}{}", self.chain.transaction_hash),
            message: "Identity successfully issued to blockchain".to_string(),
        }
    }

    pub fn verification(&self) -> IssuanceVerification {
        IssuanceVerification {
            blockchain_id: self.key.clone(),
            transaction_hash: self.chain.transaction_hash.clone(),
            block_number: self.chain.block_number,
            network_id: self.chain.network_id,
            issued_at: self
                .metadata
                .get("issuedAt")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: self.status,
            verified: true,
        }
    }
}

impl Validate for IssuanceRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.user_id.validate()?;
        self.key.validate()?;
        self.subject.validate()?;
        if self.token_sequence == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "issuance.token_id",
                reason: "token sequence starts at 1",
            });
        }
        if !self.chain.transaction_hash.starts_with("0x") {
            return Err(ContractViolation::InvalidValue {
                field: "issuance.transaction_hash",
                reason: "transaction hash must be 0x-prefixed",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReceipt {
    #[serde(flatten)]
    pub chain: ChainAttributes,
    pub token_id: u64,
    pub explorer_url: String,
    pub message: String,
}

/// Public view of an issuance; subject PII is left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceVerification {
    pub blockchain_id: IssuanceKey,
    pub transaction_hash: String,
    pub block_number: u64,
    pub network_id: u64,
    pub issued_at: Option<String>,
    pub status: IssuanceStatus,
    pub verified: bool,
}
