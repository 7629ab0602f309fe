#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use safetrip_kernel_contracts::alert::{
    AlertCreateRequest, AlertId, AlertQuery, AlertSeverity, AlertStatus, NewAlert,
};
use safetrip_kernel_contracts::user::UserId;
use safetrip_storage::repo::AlertRepo;
use safetrip_storage::{DocumentStore, MemoryStore, StorageError};

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

fn new_alert(owner: &UserId, severity: &str, message: &str, at: DateTime<Utc>) -> NewAlert {
    NewAlert {
        user_id: owner.clone(),
        draft: AlertCreateRequest {
            alert_type: "AI_MONITORING".to_string(),
            severity: severity.to_string(),
            message: message.to_string(),
            location: None,
            metadata: None,
        }
        .into_draft()
        .unwrap(),
        created_at: at,
    }
}

fn stores() -> Vec<(&'static str, Box<dyn AlertRepo>)> {
    vec![
        ("memory", Box::new(MemoryStore::new_in_memory())),
        ("document", Box::new(DocumentStore::open_in_memory().unwrap())),
    ]
}

#[test]
fn at_alerts_db_01_insert_assigns_id_and_active_status() {
    for (name, s) in stores() {
        let owner = user("user_a");
        let rec = s.insert_alert_row(new_alert(&owner, "HIGH", "help", t(0))).unwrap();
        assert_eq!(rec.status, AlertStatus::Active, "{name}");
        assert!(rec.acknowledged_at.is_none(), "{name}");
        assert_eq!(s.alert_row(&rec.id).unwrap(), Some(rec.clone()), "{name}");

        let other = s.insert_alert_row(new_alert(&owner, "HIGH", "help", t(0))).unwrap();
        assert_ne!(other.id, rec.id, "{name}");
    }
}

#[test]
fn at_alerts_db_02_missing_id_reads_none() {
    for (name, s) in stores() {
        let missing = AlertId::new("no-such-alert").unwrap();
        assert_eq!(s.alert_row(&missing).unwrap(), None, "{name}");
    }
}

#[test]
fn at_alerts_db_03_query_is_newest_first_with_stable_ties() {
    for (name, s) in stores() {
        let owner = user("user_a");
        let first = s.insert_alert_row(new_alert(&owner, "LOW", "one", t(10))).unwrap();
        let second = s.insert_alert_row(new_alert(&owner, "LOW", "two", t(30))).unwrap();
        let third = s.insert_alert_row(new_alert(&owner, "LOW", "three", t(20))).unwrap();
        let tie = s.insert_alert_row(new_alert(&owner, "LOW", "tie", t(30))).unwrap();
        s.insert_alert_row(new_alert(&user("user_b"), "LOW", "foreign", t(40)))
            .unwrap();

        let (rows, total) = s
            .query_alert_rows_by_user(&owner, &AlertQuery::default())
            .unwrap();
        assert_eq!(total, 4, "{name}");
        let ids: Vec<_> = rows.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![tie.id, second.id, third.id, first.id], "{name}");
    }
}

#[test]
fn at_alerts_db_04_pagination_and_severity_filter() {
    for (name, s) in stores() {
        let owner = user("user_a");
        for i in 0..7 {
            let sev = if i % 2 == 0 { "HIGH" } else { "MEDIUM" };
            s.insert_alert_row(new_alert(&owner, sev, &format!("m{i}"), t(i)))
                .unwrap();
        }

        let q = AlertQuery::v1(None, 2, 3).unwrap();
        let (rows, total) = s.query_alert_rows_by_user(&owner, &q).unwrap();
        assert_eq!(total, 7, "{name}");
        let msgs: Vec<_> = rows.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(msgs, vec!["m3", "m2", "m1"], "{name}");

        let q = AlertQuery::v1(None, 4, 3).unwrap();
        let (rows, total) = s.query_alert_rows_by_user(&owner, &q).unwrap();
        assert!(rows.is_empty(), "{name}");
        assert_eq!(total, 7, "{name}");

        let q = AlertQuery::v1(Some(AlertSeverity::High), 1, 20).unwrap();
        let (rows, total) = s.query_alert_rows_by_user(&owner, &q).unwrap();
        assert_eq!(total, 4, "{name}");
        assert!(rows.iter().all(|r| r.severity == AlertSeverity::High), "{name}");
    }
}

#[test]
fn at_alerts_db_05_acknowledge_checks_owner_and_is_idempotent() {
    for (name, s) in stores() {
        let owner = user("user_a");
        let rec = s.insert_alert_row(new_alert(&owner, "HIGH", "help", t(0))).unwrap();

        let foreign = s.acknowledge_alert_row(&rec.id, &user("user_b"), t(5));
        assert!(
            matches!(foreign, Err(StorageError::NotFound { .. })),
            "{name}"
        );
        assert_eq!(
            s.alert_row(&rec.id).unwrap().unwrap().status,
            AlertStatus::Active,
            "{name}"
        );

        let a1 = s.acknowledge_alert_row(&rec.id, &owner, t(5)).unwrap();
        assert_eq!(a1.status, AlertStatus::Acknowledged, "{name}");
        assert_eq!(a1.acknowledged_at, Some(t(5)), "{name}");

        let a2 = s.acknowledge_alert_row(&rec.id, &owner, t(9)).unwrap();
        assert_eq!(a2.acknowledged_at, Some(t(9)), "{name}");
        assert_eq!(s.alert_row(&rec.id).unwrap(), Some(a2), "{name}");

        let missing = AlertId::new("missing").unwrap();
        assert!(
            matches!(
                s.acknowledge_alert_row(&missing, &owner, t(9)),
                Err(StorageError::NotFound { .. })
            ),
            "{name}"
        );
    }
}

#[test]
fn at_alerts_db_06_rows_since_cutoff() {
    for (name, s) in stores() {
        let owner = user("user_a");
        s.insert_alert_row(new_alert(&owner, "LOW", "old", t(-3600)))
            .unwrap();
        s.insert_alert_row(new_alert(&owner, "HIGH", "edge", t(0)))
            .unwrap();
        s.insert_alert_row(new_alert(&owner, "MEDIUM", "new", t(60)))
            .unwrap();

        let today = s.alert_rows_for_user_since(&owner, Some(t(0))).unwrap();
        let msgs: Vec<_> = today.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(msgs, vec!["new", "edge"], "{name}");

        let all = s.alert_rows_for_user_since(&owner, None).unwrap();
        assert_eq!(all.len(), 3, "{name}");
    }
}

#[test]
fn at_alerts_db_07_document_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("safetrip.db");
    let owner = user("user_a");
    let rec = {
        let s = DocumentStore::open(&path).unwrap();
        s.insert_alert_row(new_alert(&owner, "HIGH", "persist me", t(0)))
            .unwrap()
    };
    let s = DocumentStore::open(&path).unwrap();
    assert_eq!(s.alert_row(&rec.id).unwrap(), Some(rec));
}
