#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use safetrip_kernel_contracts::issuance::{
    ChainAttributes, IssuanceKey, IssuanceRecord, IssuanceVerification, IssueRequest, NewIssuance,
};
use safetrip_kernel_contracts::user::UserId;
use safetrip_storage::repo::IssuanceRepo;
use safetrip_storage::StorageError;

use crate::error::ServiceError;

pub const POLYGON_NETWORK_ID: u64 = 137;
pub const MOCK_CONTRACT_ADDRESS: &str = "0x1234567890123456789012345678901234567890";
pub const MOCK_BLOCK_FLOOR: u64 = 18_500_000;
pub const MOCK_BLOCK_SPAN: u64 = 1_000_000;

const ISSUANCE_CONFLICT: &str = "This blockchain ID has already been issued";
const ISSUANCE_NOT_FOUND: &str = "Blockchain identity not found";

/// Source of ledger coordinates for a new issuance.
pub trait ChainProvider: Send + Sync {
    fn next_attributes(&self) -> ChainAttributes;
}

/// Stand-in for the Polygon network: random hash and block, fixed contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockPolygonChain;

impl ChainProvider for MockPolygonChain {
    fn next_attributes(&self) -> ChainAttributes {
        let mut rng = rand::thread_rng();
        let mut hash = [0u8; 32];
        rng.fill_bytes(&mut hash);
        ChainAttributes {
            transaction_hash: format!("0x{}", hex::encode(hash)),
            block_number: MOCK_BLOCK_FLOOR + rng.gen_range(0..MOCK_BLOCK_SPAN),
            network_id: POLYGON_NETWORK_ID,
            contract_address: MOCK_CONTRACT_ADDRESS.to_string(),
        }
    }
}

pub struct IssuanceRuntime {
    issuances: Arc<dyn IssuanceRepo>,
    chain: Arc<dyn ChainProvider>,
}

impl IssuanceRuntime {
    pub fn new(issuances: Arc<dyn IssuanceRepo>, chain: Arc<dyn ChainProvider>) -> Self {
        Self { issuances, chain }
    }

    pub fn issue(
        &self,
        user_id: &UserId,
        req: IssueRequest,
        now: DateTime<Utc>,
    ) -> Result<IssuanceRecord, ServiceError> {
        let draft = req.into_draft()?;
        if self.issuances.issuance_row_by_key(&draft.key)?.is_some() {
            return Err(ServiceError::Conflict(ISSUANCE_CONFLICT));
        }
        let new = NewIssuance {
            user_id: user_id.clone(),
            draft,
            chain: self.chain.next_attributes(),
            created_at: now,
        };
        let record = match self.issuances.insert_issuance_row(new) {
            Ok(record) => record,
            Err(StorageError::DuplicateKey { .. }) => {
                return Err(ServiceError::Conflict(ISSUANCE_CONFLICT))
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            user_id = %record.user_id,
            blockchain_id = %record.key,
            token_id = record.token_sequence,
            block_number = record.chain.block_number,
            "identity issued"
        );
        Ok(record)
    }

    pub fn verify(&self, key: &str) -> Result<IssuanceVerification, ServiceError> {
        let key = IssuanceKey::new(key).map_err(|_| ServiceError::NotFound(ISSUANCE_NOT_FOUND))?;
        self.issuances
            .issuance_row_by_key(&key)?
            .map(|r| r.verification())
            .ok_or(ServiceError::NotFound(ISSUANCE_NOT_FOUND))
    }

    pub fn list_for_user(&self, user_id: &UserId) -> Result<Vec<IssuanceRecord>, ServiceError> {
        Ok(self.issuances.issuance_rows_for_user(user_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use safetrip_kernel_contracts::issuance::{
        IssuanceStatus, SubjectInfo, ISSUANCE_KEY_REASON, SUBJECT_PHONE_REASON,
    };
    use safetrip_storage::MemoryStore;

    /// Deterministic chain: block numbers count up from the floor.
    #[derive(Default)]
    struct SequentialChain {
        next: AtomicU64,
    }

    impl ChainProvider for SequentialChain {
        fn next_attributes(&self) -> ChainAttributes {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            ChainAttributes {
                transaction_hash: format!("0x{n:064x}"),
                block_number: MOCK_BLOCK_FLOOR + n,
                network_id: POLYGON_NETWORK_ID,
                contract_address: MOCK_CONTRACT_ADDRESS.to_string(),
            }
        }
    }

    fn runtime() -> IssuanceRuntime {
        IssuanceRuntime::new(
            Arc::new(MemoryStore::new_in_memory()),
            Arc::new(SequentialChain::default()),
        )
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn req(key: &str) -> IssueRequest {
        IssueRequest {
            blockchain_id: key.to_string(),
            user_info: SubjectInfo {
                name: "Demo User".to_string(),
                email: "demo@example.com".to_string(),
                phone: "+1234567890".to_string(),
            },
            metadata: None,
        }
    }

    #[test]
    fn at_issuance_rt_01_example_scenario() {
        let rt = runtime();
        let issued = rt.issue(&user("u1"), req("ABCDEFGHIJ"), Utc::now()).unwrap();
        let receipt = issued.receipt();
        assert_eq!(receipt.token_id, 1);
        assert_eq!(receipt.chain.network_id, 137);

        assert_eq!(
            rt.issue(&user("u2"), req("ABCDEFGHIJ"), Utc::now()),
            Err(ServiceError::Conflict(ISSUANCE_CONFLICT))
        );

        let v = rt.verify("ABCDEFGHIJ").unwrap();
        assert_eq!(v.status, IssuanceStatus::Confirmed);
        assert_eq!(v.transaction_hash, receipt.chain.transaction_hash);
        assert!(v.verified);
        assert_eq!(rt.list_for_user(&user("u2")).unwrap().len(), 0);
    }

    #[test]
    fn at_issuance_rt_02_token_sequence_strictly_increases() {
        let rt = runtime();
        let tokens: Vec<u64> = (0..5)
            .map(|i| {
                rt.issue(&user("u1"), req(&format!("KEY-{i:08}")), Utc::now())
                    .unwrap()
                    .token_sequence
            })
            .collect();
        assert!(tokens.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(tokens, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn at_issuance_rt_03_validation_and_missing_keys() {
        let rt = runtime();
        match rt.issue(&user("u1"), req("short"), Utc::now()) {
            Err(ServiceError::Validation(v)) => assert_eq!(v.reason(), ISSUANCE_KEY_REASON),
            other => panic!("unexpected: {other:?}"),
        }
        let mut bad_phone = req("ABCDEFGHIJ");
        bad_phone.user_info.phone = "phone".to_string();
        match rt.issue(&user("u1"), bad_phone, Utc::now()) {
            Err(ServiceError::Validation(v)) => assert_eq!(v.reason(), SUBJECT_PHONE_REASON),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            rt.verify("NEVER-ISSUED-KEY"),
            Err(ServiceError::NotFound(ISSUANCE_NOT_FOUND))
        );
        assert_eq!(
            rt.verify("x"),
            Err(ServiceError::NotFound(ISSUANCE_NOT_FOUND))
        );
    }

    #[test]
    fn at_issuance_rt_04_mock_chain_shape() {
        let attrs = MockPolygonChain.next_attributes();
        assert_eq!(attrs.transaction_hash.len(), 66);
        assert!(attrs.transaction_hash.starts_with("0x"));
        assert!(attrs.block_number >= MOCK_BLOCK_FLOOR);
        assert!(attrs.block_number < MOCK_BLOCK_FLOOR + MOCK_BLOCK_SPAN);
        assert_eq!(attrs.contract_address, MOCK_CONTRACT_ADDRESS);
    }

    #[test]
    fn at_issuance_rt_05_metadata_carries_issued_at() {
        let rt = runtime();
        let mut r = req("ABCDEFGHIJ");
        let mut meta = serde_json::Map::new();
        meta.insert("version".to_string(), serde_json::json!("1.0"));
        r.metadata = Some(meta);
        let rec = rt.issue(&user("u1"), r, Utc::now()).unwrap();
        assert_eq!(rec.metadata["version"], "1.0");
        assert!(rec.metadata["issuedAt"].is_string());
    }
}
