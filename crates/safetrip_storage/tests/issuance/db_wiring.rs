#![forbid(unsafe_code)]

use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use safetrip_kernel_contracts::issuance::{
    ChainAttributes, IssuanceKey, IssuanceStatus, IssueRequest, NewIssuance, SubjectInfo,
};
use safetrip_kernel_contracts::user::UserId;
use safetrip_storage::repo::IssuanceRepo;
use safetrip_storage::{DocumentStore, MemoryStore, StorageError};

fn stores() -> Vec<(&'static str, Arc<dyn IssuanceRepo>)> {
    vec![
        ("memory", Arc::new(MemoryStore::new_in_memory())),
        ("document", Arc::new(DocumentStore::open_in_memory().unwrap())),
    ]
}

fn new_issuance(owner: &str, key: &str, offset_secs: i64) -> NewIssuance {
    NewIssuance {
        user_id: UserId::new(owner).unwrap(),
        draft: IssueRequest {
            blockchain_id: key.to_string(),
            user_info: SubjectInfo {
                name: "Demo User".to_string(),
                email: "demo@example.com".to_string(),
                phone: "+1234567890".to_string(),
            },
            metadata: None,
        }
        .into_draft()
        .unwrap(),
        chain: ChainAttributes {
            transaction_hash: format!("0x{}", "cd".repeat(32)),
            block_number: 18_567_890,
            network_id: 137,
            contract_address: "0x1234567890123456789012345678901234567890".to_string(),
        },
        created_at: Utc::now() + Duration::seconds(offset_secs),
    }
}

#[test]
fn at_issuance_db_01_key_is_unique_and_tokens_increase() {
    for (name, s) in stores() {
        let a = s.insert_issuance_row(new_issuance("user_a", "ABCDEFGHIJ", 0)).unwrap();
        assert_eq!(a.token_sequence, 1, "{name}");
        assert_eq!(a.status, IssuanceStatus::Confirmed, "{name}");

        let dup = s.insert_issuance_row(new_issuance("user_b", "ABCDEFGHIJ", 1));
        assert!(
            matches!(dup, Err(StorageError::DuplicateKey { .. })),
            "{name}"
        );

        let b = s.insert_issuance_row(new_issuance("user_b", "KLMNOPQRST", 2)).unwrap();
        assert_eq!(b.token_sequence, 2, "{name}");
        let owned_by_b = s
            .issuance_rows_for_user(&UserId::new("user_b").unwrap())
            .unwrap();
        assert_eq!(owned_by_b, vec![b], "{name}");

        let found = s
            .issuance_row_by_key(&IssuanceKey::new("ABCDEFGHIJ").unwrap())
            .unwrap();
        assert_eq!(found, Some(a), "{name}");
    }
}

#[test]
fn at_issuance_db_02_rows_for_user_newest_first() {
    for (name, s) in stores() {
        s.insert_issuance_row(new_issuance("user_a", "KEY-000000001", 0)).unwrap();
        s.insert_issuance_row(new_issuance("user_b", "KEY-000000002", 5)).unwrap();
        s.insert_issuance_row(new_issuance("user_a", "KEY-000000003", 10)).unwrap();

        let rows = s
            .issuance_rows_for_user(&UserId::new("user_a").unwrap())
            .unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["KEY-000000003", "KEY-000000001"], "{name}");
    }
}

#[test]
fn at_issuance_db_03_concurrent_writers_cannot_share_a_key() {
    for (name, s) in stores() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let s = Arc::clone(&s);
                thread::spawn(move || {
                    let same = s.insert_issuance_row(new_issuance("user_a", "RACE-KEY-0001", i));
                    let own = s.insert_issuance_row(new_issuance(
                        "user_a",
                        &format!("OWN-KEY-{i:05}"),
                        i,
                    ));
                    (same.is_ok(), own.map(|r| r.token_sequence))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|(ok, _)| *ok).count(), 1, "{name}");
        let mut tokens: Vec<u64> = results
            .iter()
            .map(|(_, own)| own.clone().unwrap())
            .collect();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), 8, "{name}");
        let stored = s
            .issuance_rows_for_user(&UserId::new("user_a").unwrap())
            .unwrap();
        assert_eq!(stored.len(), 9, "{name}");
    }
}
