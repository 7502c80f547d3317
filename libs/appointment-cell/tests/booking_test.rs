use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{
    BookingError, BookingFlow, BookingSession, BookingState, ConflictCategory, RemoteBookingBackend, SubmitOutcome,
};
use doctor_cell::models::Slot;
use shared_utils::test_utils::{MockApiResponses, TestConfig};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

fn remote_flow(server: &MockServer) -> BookingFlow<RemoteBookingBackend> {
    let config = TestConfig::with_base_url(&server.uri()).to_portal_config();
    BookingFlow::new(
        RemoteBookingBackend::new(&config, "patient-token"),
        Arc::new(Mutex::new(BookingSession::new(config.slot_staleness()))),
    )
}

async fn mount_doctor(server: &MockServer, start: &str, end: &str, days: &[u8]) {
    Mock::given(method("GET"))
        .and(path("/doctors/d1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockApiResponses::envelope(MockApiResponses::doctor_with_hours("d1", start, end, days))),
        )
        .mount(server)
        .await;
}

fn booked(time: &str) -> serde_json::Value {
    MockApiResponses::envelope(MockApiResponses::appointment_response(
        "a1",
        "d1",
        "p1",
        "2024-06-03",
        time,
        "pending",
    ))
}

#[tokio::test]
async fn booked_slot_disappears_from_next_derivation() {
    let server = MockServer::start().await;
    mount_doctor(&server, "09:00", "09:30", &[1]).await;

    Mock::given(method("GET"))
        .and(path("/appointments/available-slots/d1"))
        .and(query_param("date", "2024-06-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!({
            "slots": [{"time": "09:00", "available": true}, {"time": "09:15", "available": true}]
        }))))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!({
            "slots": [{"time": "09:00", "available": false}, {"time": "09:15", "available": true}]
        }))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .and(header("authorization", "Bearer patient-token"))
        .and(body_json(json!({"doctorId": "d1", "date": "2024-06-03", "time": "09:00"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(booked("09:00")))
        .expect(1)
        .mount(&server)
        .await;

    let flow = remote_flow(&server);

    flow.choose_doctor("d1").await.unwrap();
    let before = flow.choose_date(monday()).await.unwrap();
    assert_eq!(before.slots(), &[Slot::new(t(9, 0), true), Slot::new(t(9, 15), true)]);

    flow.choose_time(t(9, 0)).unwrap();
    assert_matches!(flow.submit().await, Ok(SubmitOutcome::Confirmed(a)) if a.id == "a1");

    flow.choose_doctor("d1").await.unwrap();
    let after = flow.choose_date(monday()).await.unwrap();
    assert_eq!(after.slots(), &[Slot::new(t(9, 0), false), Slot::new(t(9, 15), true)]);
}

#[tokio::test]
async fn duplicate_submit_sends_one_request() {
    let server = MockServer::start().await;
    mount_doctor(&server, "09:00", "10:00", &[1]).await;
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!({"slots": []}))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(booked("09:45"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let flow = remote_flow(&server);
    flow.choose_doctor("d1").await.unwrap();
    flow.choose_date(monday()).await.unwrap();
    flow.choose_time(t(9, 45)).unwrap();

    let (first, second) = tokio::join!(flow.submit(), flow.submit());

    assert_matches!(first, Ok(SubmitOutcome::Confirmed(_)));
    assert_matches!(second, Err(BookingError::SubmissionInFlight));
}

#[tokio::test]
async fn taken_slot_is_rejected_before_any_submission() {
    let server = MockServer::start().await;
    mount_doctor(&server, "09:00", "10:00", &[1]).await;
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!({
            "slots": [{"time": "09:00", "available": false}]
        }))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(booked("09:00")))
        .expect(0)
        .mount(&server)
        .await;

    let flow = remote_flow(&server);
    let result = flow.book("d1", monday(), t(9, 0)).await;

    assert_matches!(result, Err(BookingError::SlotUnavailable(time)) if time == t(9, 0));
    assert_eq!(flow.session().lock().unwrap().state(), BookingState::DateChosen);
}

#[tokio::test]
async fn server_conflict_re_derives_with_fresh_slots() {
    let server = MockServer::start().await;
    mount_doctor(&server, "09:00", "09:30", &[1]).await;
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!({
            "slots": [{"time": "09:00", "available": true}, {"time": "09:15", "available": true}]
        }))))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!({
            "slots": [{"time": "09:00", "available": false}, {"time": "09:15", "available": true}]
        }))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"success": false, "message": "Slot already booked"})))
        .expect(1)
        .mount(&server)
        .await;

    let flow = remote_flow(&server);
    let outcome = flow.book("d1", monday(), t(9, 0)).await.unwrap();

    assert_matches!(outcome, SubmitOutcome::Rejected(f) if f.category == ConflictCategory::SlotTaken);
    let session = flow.session().lock().unwrap();
    assert_eq!(session.selection().time, None);
    assert_eq!(
        session.derivation().unwrap().slots(),
        &[Slot::new(t(9, 0), false), Slot::new(t(9, 15), true)]
    );
}

#[tokio::test]
async fn html_error_page_is_a_server_error() {
    let server = MockServer::start().await;
    mount_doctor(&server, "09:00", "10:00", &[1]).await;
    Mock::given(method("GET"))
        .and(path("/appointments/available-slots/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockApiResponses::envelope(json!({"slots": []}))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Cannot POST</body></html>"))
        .mount(&server)
        .await;

    let flow = remote_flow(&server);
    let outcome = flow.book("d1", monday(), t(9, 0)).await.unwrap();

    assert_matches!(outcome, SubmitOutcome::Rejected(f) if f.category == ConflictCategory::ServerError);
    // Selection is kept so the same booking can be retried.
    assert_eq!(flow.session().lock().unwrap().selection().time, Some(t(9, 0)));
}
