#![forbid(unsafe_code)]

use chrono::Utc;
use safetrip_kernel_contracts::location::{GpsPingInput, GpsTag};
use safetrip_storage::repo::LocationLogRepo;
use safetrip_storage::{DocumentStore, MemoryStore};

fn stores() -> Vec<(&'static str, Box<dyn LocationLogRepo>)> {
    vec![
        ("memory", Box::new(MemoryStore::new_in_memory())),
        ("document", Box::new(DocumentStore::open_in_memory().unwrap())),
    ]
}

#[test]
fn at_location_db_01_pings_read_back_in_arrival_order() {
    for (name, s) in stores() {
        assert!(s.gps_ping_rows().unwrap().is_empty(), "{name}");
        for (lat, tag) in [(29.75281, "normal"), (26.75281, "sos"), (28.7041, "normal")] {
            let ping = GpsPingInput {
                lat: Some(lat),
                lon: Some(77.1025),
                tag: Some(tag.to_string()),
                timestamp: Some("2025-09-08 21:00".to_string()),
            }
            .into_ping(Utc::now())
            .unwrap();
            s.append_gps_ping_row(ping).unwrap();
        }
        let rows = s.gps_ping_rows().unwrap();
        let lats: Vec<f64> = rows.iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![29.75281, 26.75281, 28.7041], "{name}");
        assert_eq!(rows[1].tag, GpsTag::Sos, "{name}");
    }
}
