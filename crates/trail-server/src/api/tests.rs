use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use trail_core::{ColorMode, FadeSettings, PositionSample};

use crate::feed::LiveAircraft;
use crate::{api, config::Config, state::AppState};

fn setup_app() -> (axum::Router, Arc<AppState>) {
    let mut config = Config::from_env();
    config.home_lat = 40.0;
    config.home_lon = -105.0;
    config.track_service_url = "http://127.0.0.1:9".to_string();
    config.request_timeout_secs = 2;
    config.color_mode = ColorMode::Altitude;
    config.fade = FadeSettings::default();
    let state = Arc::new(AppState::new(&config));
    let app = api::routes().with_state(state.clone());
    (app, state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn seed_live(state: &AppState, hex: &str, points: usize) {
    let t0 = Utc::now() - Duration::seconds(points as i64);
    for i in 0..points {
        state.apply_live_snapshot(vec![LiveAircraft {
            hex: hex.to_string(),
            flight: Some("TEST1".to_string()),
            track_deg: Some(0.0),
            sample: PositionSample::new(
                40.0 + i as f64 * 0.001,
                -105.0,
                8000.0,
                t0 + Duration::seconds(i as i64),
            )
            .with_speed(250.0),
        }]);
    }
}

#[tokio::test]
async fn list_and_fetch_trails() {
    let (app, state) = setup_app();
    seed_live(&state, "a1b2c3", 3);

    let res = app.clone().oneshot(get("/v1/trails")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["hex"], "a1b2c3");
    assert_eq!(body[0]["state"], "active");
    assert_eq!(body[0]["points"], 3);
    assert_eq!(body[0]["capacity"], 1000);

    let res = app.clone().oneshot(get("/v1/trails/A1B2C3")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["positions"].as_array().unwrap().len(), 3);
    assert_eq!(body["colors"].as_array().unwrap().len(), 3);
    assert_eq!(body["segments"], json!([[0, 3]]));

    let res = app.clone().oneshot(get("/v1/trails?state=stale")).await.unwrap();
    assert_eq!(read_json(res).await, json!([]));
}

#[tokio::test]
async fn unknown_trail_is_not_found() {
    let (app, _state) = setup_app();
    let res = app.oneshot(get("/v1/trails/ffffff")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reappearance_exposes_gap_connector() {
    let (app, state) = setup_app();
    seed_live(&state, "abc", 2);
    state.apply_live_snapshot(Vec::new());

    let res = app.clone().oneshot(get("/v1/trails?state=stale")).await.unwrap();
    assert_eq!(read_json(res).await.as_array().unwrap().len(), 1);

    state.apply_live_snapshot(vec![LiveAircraft {
        hex: "abc".to_string(),
        flight: None,
        track_deg: None,
        sample: PositionSample::new(40.2, -105.0, 9000.0, Utc::now() + Duration::seconds(60)),
    }]);

    let res = app.clone().oneshot(get("/v1/gaps?drain=true")).await.unwrap();
    let body = read_json(res).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["hex"], "abc");
    assert_eq!(body[0]["dashed"], true);

    let res = app.clone().oneshot(get("/v1/gaps")).await.unwrap();
    assert_eq!(read_json(res).await, json!([]));
}

#[tokio::test]
async fn settings_round_trip() {
    let (app, _state) = setup_app();

    let res = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/settings",
            json!({"color_mode": "speed", "auto_fade": true, "fade_duration": {"minutes": 15}}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.clone().oneshot(get("/v1/settings")).await.unwrap();
    let body = read_json(res).await;
    assert_eq!(body["color_mode"], "speed");
    assert_eq!(body["fade"]["auto_fade"], true);
    assert_eq!(body["fade"]["duration"], json!({"minutes": 15}));

    let res = app
        .clone()
        .oneshot(json_request("PUT", "/v1/settings", json!({"fade_duration": "never"})))
        .await
        .unwrap();
    let body = read_json(res).await;
    assert_eq!(body["fade"]["duration"], "never");
}

#[tokio::test]
async fn zero_minute_fade_is_rejected() {
    let (app, state) = setup_app();
    let body = json!({"auto_fade": true, "fade_duration": {"minutes": 0}});
    let res = app
        .oneshot(json_request("PUT", "/v1/settings", body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let view = state.settings_view();
    assert!(!view.fade.auto_fade);
    assert_eq!(view.fade, FadeSettings::default());
}

#[tokio::test]
async fn live_aircraft_are_listed() {
    let (app, state) = setup_app();
    seed_live(&state, "C0FFEE", 1);
    seed_live(&state, "abc", 1);

    let res = app.oneshot(get("/v1/aircraft")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    let aircraft = body.as_array().unwrap();
    // Each snapshot replaces the previous one.
    assert_eq!(aircraft.len(), 1);
    assert_eq!(aircraft[0]["hex"], "abc");
    assert_eq!(aircraft[0]["flight"], "TEST1");
}

#[tokio::test]
async fn smooth_endpoint_rejects_malformed_body() {
    let (app, _state) = setup_app();
    let body = json!({"positions": [{"lat": "north", "lon": -105.0, "alt": 5000}]});
    let res = app
        .oneshot(json_request("POST", "/v1/smooth", body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn smooth_endpoint_reports_repairs() {
    let (app, _state) = setup_app();
    let t0 = Utc::now();
    let positions: Vec<Value> = [5000, 0, 5400, 5600, 0]
        .iter()
        .enumerate()
        .map(|(i, alt)| {
            json!({
                "lat": 40.0 + i as f64 * 0.01,
                "lon": -105.0,
                "alt_baro": alt,
                "time": (t0 + Duration::seconds(i as i64 * 10)).to_rfc3339(),
            })
        })
        .chain(std::iter::once(json!({"lat": null, "lon": -105.0, "alt": 5000})))
        .collect();

    let res = app
        .oneshot(json_request("POST", "/v1/smooth", json!({ "positions": positions })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["dropped"], 1);
    let altitudes: Vec<f64> = body["positions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["altitude_ft"].as_f64().unwrap())
        .collect();
    assert_eq!(altitudes, vec![5000.0, 5200.0, 5400.0, 5600.0, 5600.0]);
    assert_eq!(body["report"]["trailing_repaired"], 1);
    assert_eq!(body["report"]["interpolated"], 1);
}

#[tokio::test]
async fn recent_load_reports_upstream_failure() {
    let (app, state) = setup_app();
    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/trails/recent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(!state.recent_loads().in_flight());
}

#[tokio::test]
async fn history_load_rejects_inverted_window() {
    let (app, _state) = setup_app();
    let end = Utc::now();
    let start = end + Duration::hours(1);
    let res = app
        .oneshot(json_request(
            "POST",
            "/v1/trails/abc123/history",
            json!({"start": start.to_rfc3339(), "end": end.to_rfc3339()}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_reports_counts() {
    let (app, state) = setup_app();
    seed_live(&state, "abc", 2);
    state.mark_loop_heartbeat("live-update");

    let res = app.oneshot(get("/v1/status")).await.unwrap();
    let body = read_json(res).await;
    assert_eq!(body["active_trails"], 1);
    assert_eq!(body["stale_trails"], 0);
    assert_eq!(body["live_aircraft"], 1);
    assert_eq!(body["color_mode"], "altitude");
    assert!(body["loop_heartbeats"]["live-update"].is_string());
}
