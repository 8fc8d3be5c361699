//! Gateway integration tests
//!
//! Each test runs its own gateway on an ephemeral port with in-memory
//! storage, so no external services are required.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use huddle_core::Permissions;
use integration_tests::{default_channel, own_id, TestServer};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::json;

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (_alice, _) = server.register("alice").await.unwrap();

    let response = server
        .http
        .get(format!("{}/health", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["connections"].as_u64().unwrap() >= 1);
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_anonymous_introduction() {
    let server = TestServer::start().await.unwrap();
    let mut client = server.connect(None).await.unwrap();

    let settings = client.expect(1).await.unwrap();
    assert_eq!(settings["data"]["siteName"], "Integration");
    assert_eq!(settings["data"]["authenticated"], false);

    client.send(5, json!({"users": []})).await.unwrap();
    let error = client.expect(0).await.unwrap();
    assert_eq!(error["data"]["code"], 1);
    assert_eq!(error["data"]["request"], 5);
}

#[tokio::test]
async fn test_bad_token_stays_unauthenticated() {
    let server = TestServer::start().await.unwrap();
    let mut client = server.connect(Some("deadbeef")).await.unwrap();

    let error = client.next_frame().await.unwrap();
    assert_eq!(error["type"], 0);
    assert_eq!(error["data"]["code"], 2);
    let settings = client.expect(1).await.unwrap();
    assert_eq!(settings["data"]["authenticated"], false);
}

#[tokio::test]
async fn test_login_then_list() {
    let server = TestServer::start().await.unwrap();
    let (mut admin, _) = server.login_admin().await.unwrap();
    let (mut alice, overview) = server.register("alice").await.unwrap();
    let alice_id = own_id(&overview).unwrap();

    admin
        .send(43, json!({"name": "Member", "position": 1, "hoisted": true}))
        .await
        .unwrap();
    let role = admin.expect(23).await.unwrap()["data"]["role"]["id"].clone();
    admin
        .send(46, json!({"user": alice_id, "role": role}))
        .await
        .unwrap();
    let updated = alice.expect(28).await.unwrap();
    assert_eq!(updated["data"]["user"]["roles"][0], role);

    let seq = alice.send(7, json!({"start": 0, "end": 20})).await.unwrap();
    let list = loop {
        let frame = alice.expect(8).await.unwrap();
        if frame["seq"] == seq.as_str() {
            break frame;
        }
    };

    let groups: Vec<_> = list["data"]["groups"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["id"].clone())
        .collect();
    assert!(groups.contains(&role));
    assert!(groups.contains(&json!("1")));

    let users = list["data"]["users"].as_array().unwrap();
    assert_eq!(users.iter().filter(|u| **u == json!(alice_id)).count(), 1);
    let member_group = users.iter().position(|u| *u == role).unwrap();
    let alice_at = users.iter().position(|u| *u == json!(alice_id)).unwrap();
    assert_eq!(alice_at, member_group + 1);
}

#[tokio::test]
async fn test_logout_closes_connection() {
    let server = TestServer::start().await.unwrap();
    let (mut bob, _) = server.register("bob").await.unwrap();

    bob.send(33, json!({})).await.unwrap();
    let closed = tokio::time::timeout(Duration::from_secs(3), async {
        while bob.next_frame().await.is_ok() {}
    })
    .await;
    assert!(closed.is_ok());
}

// ============================================================================
// Messages and uploads
// ============================================================================

#[tokio::test]
async fn test_attachment_without_upload_permission() {
    let server = TestServer::start().await.unwrap();
    let index = server.state.service_context().index();
    let mut settings = index.settings();
    settings.default_permissions = Permissions::DEFAULT - Permissions::UPLOAD_FILES;
    index.set_settings(settings);

    let (mut carol, overview) = server.register("carol").await.unwrap();
    let channel = default_channel(&overview).unwrap();
    let seq = carol
        .send(
            9,
            json!({"channel": channel, "content": "pic", "attachmentCount": 1}),
        )
        .await
        .unwrap();

    let error = carol.expect(0).await.unwrap();
    assert_eq!(error["seq"], seq.as_str());
    assert_eq!(error["data"]["code"], 8);
    assert!(server.state.registry().pending().is_empty());
}

#[tokio::test]
async fn test_upload_slot_single_use() {
    let server = TestServer::start().await.unwrap();
    let (mut dave, overview) = server.register("dave").await.unwrap();
    let channel = default_channel(&overview).unwrap();

    let seq = dave
        .send(
            9,
            json!({"channel": channel, "content": "report", "attachmentCount": 1}),
        )
        .await
        .unwrap();
    let slot = dave.expect(35).await.unwrap();
    assert_eq!(slot["seq"], seq.as_str());
    let slot = slot["data"]["slot"].as_str().unwrap().to_string();

    let form = || {
        Form::new()
            .text(
                "metadata_0",
                r#"{"filename":"report.txt","size":6,"spoilered":false}"#,
            )
            .part("file_0", Part::bytes(b"report".to_vec()).file_name("report.txt"))
    };
    let response = server.upload(&slot, form()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let ack = dave.expect(10).await.unwrap();
    assert_eq!(ack["seq"], seq.as_str());
    let added = dave.expect(11).await.unwrap();
    assert_eq!(
        added["data"]["message"]["attachments"][0]["filename"],
        "report.txt"
    );

    let attachment = &added["data"]["message"]["attachments"][0];
    let download = server
        .http
        .get(format!(
            "{}/attachments/{}/report.txt",
            server.base_url(),
            attachment["id"].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.bytes().await.unwrap().as_ref(), b"report");

    let again = server.upload(&slot, form()).await.unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
    assert!(!dave.receives(11).await);
}

// ============================================================================
// Permissions and relay scoping
// ============================================================================

#[tokio::test]
async fn test_permission_escalation_via_overwrite() {
    let server = TestServer::start().await.unwrap();
    let index = server.state.service_context().index();
    let mut settings = index.settings();
    settings.default_permissions = Permissions::DEFAULT - Permissions::SEND_MESSAGES;
    index.set_settings(settings);

    let (mut admin, _) = server.login_admin().await.unwrap();
    let (mut erin, overview) = server.register("erin").await.unwrap();
    let erin_id = own_id(&overview).unwrap();
    let general = default_channel(&overview).unwrap();

    admin
        .send(43, json!({"name": "Speakers", "position": 1}))
        .await
        .unwrap();
    let role = admin.expect(23).await.unwrap()["data"]["role"]["id"].clone();
    admin
        .send(46, json!({"user": erin_id, "role": role}))
        .await
        .unwrap();
    admin.expect(28).await.unwrap();

    let overwrites = json!([{
        "id": role,
        "type": 0,
        "allow": Permissions::SEND_MESSAGES.bits(),
        "deny": 0
    }]);
    admin
        .send(48, json!({"name": "stage", "overwrites": overwrites}))
        .await
        .unwrap();
    let stage = erin.expect(19).await.unwrap()["data"]["channel"]["id"].clone();

    erin.send(9, json!({"channel": general, "content": "hi"}))
        .await
        .unwrap();
    let error = erin.expect(0).await.unwrap();
    assert_eq!(error["data"]["code"], 8);

    erin.send(9, json!({"channel": stage, "content": "hi"}))
        .await
        .unwrap();
    erin.expect(10).await.unwrap();
}

#[tokio::test]
async fn test_broadcast_scoping() {
    let server = TestServer::start().await.unwrap();
    let (mut admin, _) = server.login_admin().await.unwrap();
    let (mut member, _) = server.register("member").await.unwrap();
    let (mut outsider, overview) = server.register("outsider").await.unwrap();
    let outsider_id = own_id(&overview).unwrap();

    let overwrites = json!([{
        "id": outsider_id,
        "type": 1,
        "allow": 0,
        "deny": Permissions::VIEW_CHANNEL.bits()
    }]);
    admin
        .send(48, json!({"name": "private", "overwrites": overwrites}))
        .await
        .unwrap();
    let channel = member.expect(19).await.unwrap()["data"]["channel"]["id"].clone();
    assert!(!outsider.receives(19).await);

    admin
        .send(9, json!({"channel": channel, "content": "members only"}))
        .await
        .unwrap();
    admin.expect(10).await.unwrap();

    let added = member.expect(11).await.unwrap();
    assert_eq!(added["data"]["message"]["content"], "members only");
    assert!(!outsider.receives(11).await);
}
