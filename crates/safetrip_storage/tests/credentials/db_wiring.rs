#![forbid(unsafe_code)]

use chrono::Utc;
use safetrip_kernel_contracts::user::{EmailAddress, UserId, UserRecord};
use safetrip_storage::repo::CredentialRepo;
use safetrip_storage::{DocumentStore, MemoryStore, StorageError};

fn stores() -> Vec<(&'static str, Box<dyn CredentialRepo>)> {
    vec![
        ("memory", Box::new(MemoryStore::new_in_memory())),
        ("document", Box::new(DocumentStore::open_in_memory().unwrap())),
    ]
}

fn user_row(id: &str, email: &str) -> UserRecord {
    UserRecord::v1(
        UserId::new(id).unwrap(),
        "Demo User".to_string(),
        EmailAddress::parse(email).unwrap(),
        "+1234567890".to_string(),
        "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        Utc::now(),
    )
    .unwrap()
}

#[test]
fn at_credentials_db_01_insert_and_lookup() {
    for (name, s) in stores() {
        let rec = user_row("user_1", "demo@example.com");
        s.insert_user_row(rec.clone()).unwrap();

        let by_email = s
            .user_row_by_email(&EmailAddress::parse("DEMO@example.com").unwrap())
            .unwrap();
        assert_eq!(by_email, Some(rec), "{name}");
        assert_eq!(
            s.user_row_by_email(&EmailAddress::parse("other@example.com").unwrap())
                .unwrap(),
            None,
            "{name}"
        );
    }
}

#[test]
fn at_credentials_db_02_email_is_unique_case_insensitively() {
    for (name, s) in stores() {
        s.insert_user_row(user_row("user_1", "demo@example.com"))
            .unwrap();
        let dup = s.insert_user_row(user_row("user_2", "Demo@Example.com"));
        assert!(
            matches!(dup, Err(StorageError::DuplicateKey { .. })),
            "{name}"
        );
        let kept = s
            .user_row_by_email(&EmailAddress::parse("demo@example.com").unwrap())
            .unwrap()
            .map(|r| r.id);
        assert_eq!(kept, Some(UserId::new("user_1").unwrap()), "{name}");
    }
}
