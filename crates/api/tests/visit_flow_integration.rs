//! End-to-end visit lifecycle over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use common::{empty_request, json_request, visit_body, visitor_phone, TestGate};
use serde_json::json;

fn encoded(phone: &str) -> String {
    phone.replace(' ', "").replace('+', "%2B")
}

#[tokio::test]
async fn test_pre_register_approve_verify_and_visit() {
    let gate = TestGate::new().await;
    let phone = visitor_phone();

    let (status, created) = gate.pre_register(&phone, &gate.resident).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["entry_type"], "pre_registered");
    assert_eq!(created["vehicle_registration"], "KDB 123A");
    assert_eq!(created["number_of_guests"], 1);
    assert!(created.get("credential").is_none());
    assert!(created.get("credential_hash").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    // Resident sees it waiting and was told about it
    let resident_token = gate.token(&gate.resident);
    let (status, pending) = gate
        .send(empty_request(
            Method::GET,
            "/api/v1/resident/requests/pending",
            Some(&resident_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["count"], 1);
    assert_eq!(pending["items"][0]["id"], id.as_str());
    assert_eq!(pending["items"][0]["visitor"]["phone_number"], phone.replace(' ', ""));

    let inbox = gate.store.notifications_for(gate.resident.id).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].data.category(), "visit_request");

    // Approve
    let (status, approved) = gate
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/requests/{}/approve", id),
            Some(&resident_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    let credential = approved["credential"].as_str().unwrap().to_string();
    assert_eq!(credential.len(), 43);

    let officer_inbox = gate.store.notifications_for(gate.officer.id).await;
    assert_eq!(officer_inbox.len(), 1);
    assert_eq!(officer_inbox[0].data.category(), "visit_approved");
    assert!(!gate.mailer.sent_to("visitor@example.com").is_empty());

    // Verify at the gate
    let officer_token = gate.token(&gate.officer);
    let (status, verified) = gate
        .send(json_request(
            Method::POST,
            "/api/v1/security/verify",
            json!({ "credential": credential }),
            Some(&officer_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["request"]["id"], id.as_str());
    assert_eq!(verified["resident"]["unit_number"], "A-12");

    // Arrival, departure, completion
    let (status, arrived) = gate
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/security/requests/{}/arrival", id),
            Some(&officer_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(arrived["actual_arrival"].is_string());

    gate.clock.advance(Duration::hours(1));
    let (status, departed) = gate
        .send(json_request(
            Method::POST,
            &format!("/api/v1/security/requests/{}/departure", id),
            json!({}),
            Some(&officer_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(departed["actual_departure"].is_string());

    let (status, completed) = gate
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/security/requests/{}/complete", id),
            Some(&officer_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");

    // The credential no longer opens the gate
    let (status, body) = gate
        .send(json_request(
            Method::POST,
            "/api/v1/security/verify",
            json!({ "credential": credential }),
            Some(&officer_token),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "credential_not_approved");
}

#[tokio::test]
async fn test_deny_blacklists_visitor_until_removed() {
    let gate = TestGate::new().await;
    let phone = visitor_phone();
    let resident_token = gate.token(&gate.resident);

    let (_, created) = gate.pre_register(&phone, &gate.resident).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = gate
        .send(json_request(
            Method::POST,
            &format!("/api/v1/requests/{}/deny", id),
            json!({ "reason": "" }),
            Some(&resident_token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "reason");

    let (status, denied) = gate
        .send(json_request(
            Method::POST,
            &format!("/api/v1/requests/{}/deny", id),
            json!({ "reason": "Not expecting anyone" }),
            Some(&resident_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(denied["status"], "denied");
    assert_eq!(denied["denial_reason"], "Not expecting anyone");

    let check_uri = format!(
        "/api/v1/visitor/blacklist-check?phone={}&resident_id={}",
        encoded(&phone),
        gate.resident.id
    );
    let (_, check) = gate.send(empty_request(Method::GET, &check_uri, None)).await;
    assert_eq!(check["blacklisted"], true);

    let (status, body) = gate.pre_register(&phone, &gate.resident).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // The bar is per resident
    let (status, _) = gate.pre_register(&phone, &gate.other_resident).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, entries) = gate
        .send(empty_request(Method::GET, "/api/v1/blacklist", Some(&resident_token)))
        .await;
    assert_eq!(entries["count"], 1);
    let entry_id = entries["items"][0]["id"].as_str().unwrap().to_string();

    let (status, removed) = gate
        .send(json_request(
            Method::POST,
            &format!("/api/v1/blacklist/{}/remove", entry_id),
            json!({ "reason": "Spoke to them" }),
            Some(&resident_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["is_active"], false);

    let (_, check) = gate.send(empty_request(Method::GET, &check_uri, None)).await;
    assert_eq!(check["blacklisted"], false);
    let (status, _) = gate.pre_register(&phone, &gate.resident).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_resident_invite_self_approves() {
    let gate = TestGate::new().await;
    let token = gate.token(&gate.resident);

    let (status, body) = gate
        .send(json_request(
            Method::POST,
            "/api/v1/resident/visitors",
            visit_body(&visitor_phone(), gate.resident.id, Some(gate.tomorrow())),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "approved");
    assert_eq!(body["entry_type"], "resident_invited");
    assert_eq!(body["approved_by"], gate.resident.id.to_string());
    assert_eq!(body["credential"].as_str().unwrap().len(), 43);

    // Inviting on another resident's behalf is refused
    let (status, _) = gate
        .send(json_request(
            Method::POST,
            "/api/v1/resident/visitors",
            visit_body(&visitor_phone(), gate.other_resident.id, Some(gate.tomorrow())),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_live_request_conflicts() {
    let gate = TestGate::new().await;
    let phone = visitor_phone();

    let (status, _) = gate.pre_register(&phone, &gate.resident).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = gate.pre_register(&phone, &gate.resident).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_visitor_cancel_requires_matching_phone() {
    let gate = TestGate::new().await;
    let phone = visitor_phone();
    let (_, created) = gate.pre_register(&phone, &gate.resident).await;
    let uri = format!(
        "/api/v1/visitor/requests/{}/cancel",
        created["id"].as_str().unwrap()
    );

    let (status, _) = gate
        .send(json_request(
            Method::POST,
            &uri,
            json!({ "phone_number": "+254 700 000 001" }),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cancelled) = gate
        .send(json_request(Method::POST, &uri, json!({ "phone_number": phone }), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, body) = gate
        .send(json_request(Method::POST, &uri, json!({ "phone_number": phone }), None))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");
}

#[tokio::test]
async fn test_approval_rules() {
    let gate = TestGate::new().await;
    let (_, created) = gate.pre_register(&visitor_phone(), &gate.resident).await;
    let uri = format!("/api/v1/requests/{}/approve", created["id"].as_str().unwrap());

    let (status, _) = gate.send(empty_request(Method::POST, &uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let officer = gate.token(&gate.officer);
    let (status, _) = gate
        .send(empty_request(Method::POST, &uri, Some(&officer)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let other = gate.token(&gate.other_resident);
    let (status, _) = gate.send(empty_request(Method::POST, &uri, Some(&other))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let owner = gate.token(&gate.resident);
    let (status, _) = gate.send(empty_request(Method::POST, &uri, Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = gate.send(empty_request(Method::POST, &uri, Some(&owner))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");
    assert_eq!(body["message"], "Cannot approve: record is approved");
}

#[tokio::test]
async fn test_credential_only_valid_on_visit_day() {
    let gate = TestGate::new().await;
    let resident = gate.token(&gate.resident);
    let officer = gate.token(&gate.officer);

    let (_, created) = gate.pre_register(&visitor_phone(), &gate.resident).await;
    let (_, approved) = gate
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/requests/{}/approve", created["id"].as_str().unwrap()),
            Some(&resident),
        ))
        .await;
    let credential = approved["credential"].as_str().unwrap().to_string();

    gate.clock.advance(Duration::days(1));
    let (status, body) = gate
        .send(json_request(
            Method::POST,
            "/api/v1/security/verify",
            json!({ "credential": credential }),
            Some(&officer),
        ))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "credential_expired");

    let (status, _) = gate
        .send(json_request(
            Method::POST,
            "/api/v1/security/verify",
            json!({ "credential": "not-a-real-credential" }),
            Some(&officer),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_visitor_status_lookup() {
    let gate = TestGate::new().await;
    let phone = visitor_phone();
    gate.pre_register(&phone, &gate.resident).await;

    let (status, body) = gate
        .send(empty_request(
            Method::GET,
            &format!("/api/v1/visitor/status/{}", encoded(&phone)),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"].as_array().unwrap().len(), 1);
    assert_eq!(body["recent"].as_array().unwrap().len(), 1);
    assert!(body["upcoming"].as_array().unwrap().is_empty());

    let (status, _) = gate
        .send(empty_request(
            Method::GET,
            "/api/v1/visitor/status/%2B254799999999",
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_submission_rejected() {
    let gate = TestGate::new().await;

    let (status, body) = gate.pre_register("not a phone", &gate.resident).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let past = gate.this_afternoon() - Duration::days(2);
    let (status, _) = gate
        .send(json_request(
            Method::POST,
            "/api/v1/visitor/requests",
            visit_body(&visitor_phone(), gate.resident.id, Some(past)),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unapproved residents cannot receive visitors
    let (status, _) = gate
        .pre_register(&visitor_phone(), &gate.pending_resident)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
