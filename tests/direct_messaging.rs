//! Direct routing: receiver delivery, sender echo, ordering and sessions.

mod common;

use chathub::db::MessageStatus;
use chathub::proto::{ServerPush, message_type};
use chathub::routing::{Envelope, RouteKind, route};
use common::TestHub;
use serde_json::json;
use std::time::Duration;

fn chat(push: ServerPush) -> chathub::proto::OutgoingMessage {
    match push {
        ServerPush::Chat(msg) => msg,
        other => panic!("expected chat push, got {other:?}"),
    }
}

#[tokio::test]
async fn direct_message_is_delivered_and_echoed() {
    let server = TestHub::start().await;
    let mut a = server.connect("A").await;
    let mut b = server.connect("B").await;

    a.say("B", "hello B").await.unwrap();

    let to_b = chat(b.recv().await.unwrap());
    let echo = chat(a.recv().await.unwrap());
    assert_eq!(to_b, echo);
    assert_eq!(to_b.send_id, "A");
    assert_eq!(to_b.receive_id, "B");
    assert_eq!(to_b.content, "hello B");

    assert!(server.wait_status(&to_b.uuid, MessageStatus::Sent).await);
    server.shutdown().await;
}

#[tokio::test]
async fn message_to_offline_user_is_still_stored() {
    let server = TestHub::start().await;
    let mut a = server.connect("A").await;

    a.say("B", "are you there").await.unwrap();
    let echo = chat(a.recv().await.unwrap());

    let stored = server.db.messages().find(&echo.uuid).await.unwrap().unwrap();
    assert_eq!(stored.receive_id, "B");
    assert!(server.wait_status(&echo.uuid, MessageStatus::Sent).await);
    server.shutdown().await;
}

#[tokio::test]
async fn messages_from_one_sender_keep_their_order() {
    let server = TestHub::start().await;
    let mut a = server.connect("A").await;
    let mut b = server.connect("B").await;

    for i in 0..20 {
        a.say("B", &format!("m{i}")).await.unwrap();
    }
    for i in 0..20 {
        assert_eq!(chat(b.recv().await.unwrap()).content, format!("m{i}"));
    }
    server.shutdown().await;
}

#[tokio::test]
async fn both_directions_share_one_session() {
    let server = TestHub::start().await;
    let mut a = server.connect("A").await;
    let mut b = server.connect("B").await;

    let (ra, rb) = tokio::join!(a.say("B", "from A"), b.say("A", "from B"));
    ra.unwrap();
    rb.unwrap();

    // Each side sees its own echo and the peer's message.
    let mut ids = Vec::new();
    for client in [&mut a, &mut b] {
        for _ in 0..2 {
            ids.push(chat(client.recv().await.unwrap()).uuid);
        }
    }

    let mut sessions = Vec::new();
    for id in &ids {
        sessions.push(server.db.messages().find(id).await.unwrap().unwrap().session_id);
    }
    sessions.dedup();
    assert_eq!(sessions.len(), 1);
    assert_eq!(server.db.sessions().count_for_pair("A", "B").await.unwrap(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn file_message_keeps_metadata() {
    let server = TestHub::start().await;
    let mut a = server.connect("A").await;
    let mut b = server.connect("B").await;

    a.send_json(json!({
        "type": 1,
        "url": "https://files.example/report.pdf",
        "fileName": "report.pdf",
        "fileType": "application/pdf",
        "fileSize": 2048,
        "sendId": "A",
        "receiveId": "B",
    }))
    .await
    .unwrap();

    let msg = chat(b.recv().await.unwrap());
    assert_eq!(msg.kind, message_type::FILE);
    assert_eq!(msg.url, "https://files.example/report.pdf");

    let stored = server.db.messages().find(&msg.uuid).await.unwrap().unwrap();
    assert_eq!(stored.file_name, "report.pdf");
    assert_eq!(stored.file_type, "application/pdf");
    assert_eq!(stored.file_size, "2048");

    server.shutdown().await;
}

#[tokio::test]
async fn empty_receiver_is_dropped() {
    let server = TestHub::start().await;
    let mut a = server.connect("A").await;

    a.send_json(json!({ "type": 0, "content": "nowhere", "sendId": "A" }))
        .await
        .unwrap();
    a.expect_silence(Duration::from_millis(200)).await;

    server.shutdown().await;
}

#[tokio::test]
async fn message_to_self_is_delivered_once() {
    let server = TestHub::start().await;
    let mut a = server.connect("A").await;

    a.say("A", "note to self").await.unwrap();
    assert_eq!(chat(a.recv().await.unwrap()).content, "note to self");
    a.expect_silence(Duration::from_millis(200)).await;

    server.shutdown().await;
}

#[tokio::test]
async fn route_reports_outcome() {
    let server = TestHub::start().await;
    let envelope = Envelope {
        kind: message_type::TEXT,
        content: "direct call".into(),
        sender_id: "A".into(),
        receiver_id: "B".into(),
        ..Envelope::default()
    };

    let routed = route(&server.hub, envelope).await.unwrap();
    assert_eq!(routed.kind, RouteKind::Direct);
    assert_eq!(routed.queued, 0);
    assert!(routed.message_id.starts_with("M"));

    let session = server
        .db
        .sessions()
        .find_by_pair_key(&chathub::db::direct_pair_key("A", "B"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.uuid, routed.session_id);

    server.shutdown().await;
}
