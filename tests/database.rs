//! Metadata database output tests.

use gpsframes::{FrameRecord, GpsFix, SessionDatabase, SessionHeader, database};
use serde_json::Value;

fn sample_database() -> SessionDatabase {
    let mut records = vec![
        FrameRecord::new("000000.jpg".to_string(), 0.0),
        FrameRecord::new("000001.jpg".to_string(), 0.5),
        FrameRecord::new("000002.jpg".to_string(), 0.0),
    ];
    records[0].gps = [46.0, 7.0, 1500.0, 2.5, 2.6];
    records[1].gps = [46.5, 7.5, 1510.0, 3.5, 3.6];
    records[2].gps = [47.0, 8.0, 1520.0, 4.5, 4.6];

    let mut database = SessionDatabase::new();
    database.extend(records);
    database
}

fn header() -> SessionHeader {
    SessionHeader {
        source: "recordings".to_string(),
        frame_rate: 2.0,
    }
}

#[test]
fn document_has_header_and_named_components() {
    let json = database::to_json_string(&sample_database(), &header()).expect("serializes");
    let document: Value = serde_json::from_str(&json).expect("valid JSON");

    assert_eq!(document["source"], "recordings");
    assert_eq!(document["frame_rate"], 2.0);

    let frame = &document["frames"]["000001.jpg"];
    assert_eq!(frame["ts"], 0.5);
    assert_eq!(frame["gps"]["lat"], 46.5);
    assert_eq!(frame["gps"]["long"], 7.5);
    assert_eq!(frame["gps"]["alt"], 1510.0);
    assert_eq!(frame["gps"]["2dv"], 3.5);
    assert_eq!(frame["gps"]["3dv"], 3.6);
}

#[test]
fn frames_keep_capture_order() {
    let json = database::to_json_string(&sample_database(), &header()).expect("serializes");
    let positions: Vec<usize> = ["000000.jpg", "000001.jpg", "000002.jpg"]
        .iter()
        .map(|name| json.find(name).expect("frame present"))
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn gps_fix_reads_back() {
    let json = database::to_json_string(&sample_database(), &header()).expect("serializes");
    let document: Value = serde_json::from_str(&json).expect("valid JSON");
    let fix: GpsFix =
        serde_json::from_value(document["frames"]["000002.jpg"]["gps"].clone()).expect("GpsFix");
    assert_eq!(fix, GpsFix::from([47.0, 8.0, 1520.0, 4.5, 4.6]));
}

#[test]
fn write_creates_metadata_file() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = database::write(&sample_database(), &header(), directory.path())
        .expect("database is written");

    assert_eq!(path, directory.path().join(database::DATABASE_FILE_NAME));
    let contents = std::fs::read_to_string(&path).expect("readable");
    let document: Value = serde_json::from_str(&contents).expect("valid JSON");
    assert_eq!(document["frames"].as_object().map(|frames| frames.len()), Some(3));
}

#[test]
fn write_into_missing_directory_fails() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let missing = directory.path().join("not").join("here");
    let result = database::write(&sample_database(), &header(), &missing);
    assert!(matches!(
        result,
        Err(gpsframes::ExtractorError::CannotCreateOutput { .. })
    ));
}

#[test]
fn lookup_by_name() {
    let database = sample_database();
    assert_eq!(database.len(), 3);
    assert_eq!(database.get("000001.jpg").map(|record| record.timestamp), Some(0.5));
    assert!(database.get("000003.jpg").is_none());
}
