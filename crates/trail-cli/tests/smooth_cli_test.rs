//! Library-level checks for the smooth_track tool.

use trail_cli::{parse_document, smooth_tracks};

#[test]
fn bulk_document_smooths_each_track_independently() {
    let text = r#"{
        "time_range": {"start": "2024-06-01T11:00:00+00:00", "end": "2024-06-01T12:00:00+00:00", "resolution": "full"},
        "tracks": [
            {"icao": "AE0001", "is_military": true, "positions": [
                {"time": "2024-06-01T11:00:00+00:00", "lat": 39.0, "lon": -104.0, "alt": 30000},
                {"time": "2024-06-01T11:00:10+00:00", "lat": 39.01, "lon": -104.0, "alt": 30100},
                {"time": "2024-06-01T11:00:20+00:00", "lat": 39.02, "lon": -104.0, "alt": 1500},
                {"time": "2024-06-01T11:00:30+00:00", "lat": 39.03, "lon": -104.0, "alt": 30300},
                {"time": "2024-06-01T11:00:40+00:00", "lat": 39.04, "lon": -104.0, "alt": 30400}
            ]},
            {"icao": "a00002", "positions": [
                {"time": "2024-06-01T11:00:00+00:00", "lat": 39.5, "lon": -104.5, "alt": 0},
                {"time": "2024-06-01T11:00:10+00:00", "lat": 39.51, "lon": -104.5, "alt": 0}
            ]}
        ]
    }"#;

    let outputs = smooth_tracks(parse_document(text).unwrap());
    assert_eq!(outputs.len(), 2);

    let high = &outputs[0];
    assert_eq!(high.hex.as_deref(), Some("ae0001"));
    assert!(high.report.high_altitude);
    assert!((high.positions[2].altitude_ft - 30200.0).abs() < 1e-6);

    let ground = &outputs[1];
    assert!(ground.report.degenerate);
    assert_eq!(ground.positions[0].altitude_ft, 0.0);
}
