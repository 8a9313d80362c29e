mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use common::app::{spawn_test_app, spawn_test_app_with_token};
use common::fixtures::{mod_action_on_comment, mod_action_on_post, report_on_post};
use common::http::{
    assert_json_error, assert_status_ok_json, bearer, post_raw, request, response_json,
};
use modqueue_monitor::monitor::types::Series;

const MOD_ACTIONS: &str = "/api/events/mod-actions";
const REPORTS: &str = "/api/events/reports";

#[tokio::test]
async fn it_reported_post_approved_later_records_its_dwell_time() {
    let app = spawn_test_app().await;
    let reported_at = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

    let resp = request(
        &app.app,
        Method::POST,
        REPORTS,
        Some(report_on_post("t3_abc", reported_at)),
        &[],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["outcome"], "tracked");
    assert_eq!(body["data"]["itemId"], "t3_abc");

    let approved_at = reported_at + Duration::seconds(600);
    let resp = request(
        &app.app,
        Method::POST,
        MOD_ACTIONS,
        Some(mod_action_on_post("approvelink", "alice", "t3_abc", approved_at)),
        &[],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["outcome"], "resolved");
    assert_eq!(body["data"]["delaySeconds"], 600);

    let store = app.state.store();
    assert!(store.get_pending_item("t3_abc").unwrap().is_none());
    let delays = store.read_raw_all(Series::ActionDelay).unwrap();
    assert_eq!(delays.len(), 1);
    assert_eq!(delays[0].value, 600.0);
    assert_eq!(delays[0].timestamp, approved_at);
}

#[tokio::test]
async fn it_filter_removal_tracks_once_and_keeps_the_earliest_time() {
    let app = spawn_test_app().await;
    let first = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

    for (at, expected) in [
        (first, "tracked"),
        (first + Duration::minutes(3), "already_tracked"),
    ] {
        let resp = request(
            &app.app,
            Method::POST,
            MOD_ACTIONS,
            Some(mod_action_on_comment("removecomment", "AutoModerator", "t1_c", "t3_p", at)),
            &[],
        )
        .await;
        let (status, _, body) = response_json(resp).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], expected);
    }

    let pending = app.state.store().get_pending_item("t1_c").unwrap().unwrap();
    assert_eq!(pending.queue_entered_at, first);
    assert_eq!(pending.parent_id, "t3_p");
}

#[tokio::test]
async fn it_human_removal_of_untracked_item_is_not_tracked() {
    let app = spawn_test_app().await;

    let resp = request(
        &app.app,
        Method::POST,
        MOD_ACTIONS,
        Some(mod_action_on_post("remove", "bob", "t3_zzz", Utc::now())),
        &[],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "not_tracked");
    assert!(app
        .state
        .store()
        .read_raw_all(Series::ActionDelay)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn it_events_without_target_or_with_unknown_action_are_ignored() {
    let app = spawn_test_app().await;

    let no_target = json!({
        "action": "approve",
        "moderator": "alice",
        "actionedAt": Utc::now().to_rfc3339(),
    });
    let unknown_action = mod_action_on_post("lock", "alice", "t3_abc", Utc::now());
    let wrong_types = json!({ "action": 7, "moderator": ["alice"] });
    let empty_report = json!({});

    for (path, payload) in [
        (MOD_ACTIONS, no_target),
        (MOD_ACTIONS, unknown_action),
        (MOD_ACTIONS, wrong_types),
        (REPORTS, empty_report),
    ] {
        let resp = request(&app.app, Method::POST, path, Some(payload), &[]).await;
        let (status, _, body) = response_json(resp).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(body["data"]["outcome"], "ignored", "{path}");
        assert!(body["data"]["reason"].is_string());
    }
    assert_eq!(app.state.store().count_pending_items(), 0);
}

#[tokio::test]
async fn it_invalid_json_is_a_bad_request() {
    let app = spawn_test_app().await;

    let resp = post_raw(&app.app, REPORTS, "{not json").await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_EVENT_BODY");
    assert!(body["traceId"].is_string());
}

#[tokio::test]
async fn it_ingest_token_guards_event_routes_only() {
    let app = spawn_test_app_with_token("hunter2").await;
    let payload = report_on_post("t3_abc", Utc::now());

    let resp = request(&app.app, Method::POST, REPORTS, Some(payload.clone()), &[]).await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_json_error(&body, "AUTH_UNAUTHORIZED");

    let resp = request(
        &app.app,
        Method::POST,
        REPORTS,
        Some(payload.clone()),
        &[bearer("wrong")],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = request(&app.app, Method::POST, REPORTS, Some(payload), &[bearer("hunter2")]).await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["outcome"], "tracked");

    let resp = request(&app.app, Method::GET, "/api/queue/status", None, &[]).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
