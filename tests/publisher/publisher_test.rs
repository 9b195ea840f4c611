//! End-to-end orchestration coverage with mock delivery backends.
//!
//! The hard contract under test: nothing the notifier does may fail the
//! triggering build, so `build_completed` must return normally whatever the
//! backend does.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use embercast::build::{BuildRecord, ChangeEntry, Outcome};
use embercast::config::{GlobalConfig, NotifierConfig, NotifierSettings};
use embercast::delivery::{DeliveryBackend, DeliveryError, NotificationPayload};
use embercast::mentions::{HandleDirectory, StaticDirectory};
use embercast::publisher::Publisher;

/// Backend that records every payload it is handed.
#[derive(Default)]
struct RecordingBackend {
    payloads: Mutex<Vec<NotificationPayload>>,
}

#[async_trait]
impl DeliveryBackend for RecordingBackend {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        self.payloads.lock().await.push(payload.clone());
        Ok(())
    }
}

/// Backend that fails every delivery.
struct FailingBackend;

#[async_trait]
impl DeliveryBackend for FailingBackend {
    async fn deliver(&self, _payload: &NotificationPayload) -> Result<(), DeliveryError> {
        Err(DeliveryError::RuntimeGone("interpreter crashed".to_owned()))
    }
}

fn settings() -> NotifierSettings {
    NotifierSettings {
        global: GlobalConfig {
            account_id: Some("builds@example.com".to_owned()),
            password: Some("s3cret".to_owned()),
            domain: Some("example".to_owned()),
            room: Some("Build Status".to_owned()),
            base_url: "http://ci.example.com/".to_owned(),
            ..GlobalConfig::default()
        },
        ..NotifierSettings::default()
    }
}

fn directory() -> Arc<dyn HandleDirectory> {
    let mut directory = StaticDirectory::new();
    directory.insert("alice", "a");
    directory.insert("xavier", "x");
    directory.insert("yvonne", "y");
    Arc::new(directory)
}

#[tokio::test]
async fn delivered_payload_carries_all_five_keys_unchanged() {
    let backend = Arc::new(RecordingBackend::default());
    let publisher = Publisher::new(settings(), backend.clone(), directory());

    let build = BuildRecord::new("foo", 12, Outcome::Failure)
        .with_url_suffix("job/foo/12/")
        .with_log("tests failed")
        .with_culprits(["alice"]);
    publisher.build_completed(&build).await;

    let payloads = backend.payloads.lock().await;
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload.email, "builds@example.com");
    assert_eq!(payload.password, "s3cret");
    assert_eq!(payload.domain, "example");
    assert_eq!(payload.room_name, "Build Status");
    assert_eq!(
        payload.message,
        "@a \nBUILD FAILURE \nfoo #12  \n\ntests failed"
    );
}

#[tokio::test]
async fn failing_backend_never_escapes_build_completed() {
    let publisher = Publisher::new(settings(), Arc::new(FailingBackend), directory());

    let build = BuildRecord::new("foo", 12, Outcome::Failure);
    // Must return normally; a panic or error here would fail the build.
    publisher.build_completed(&build).await;
}

#[tokio::test]
async fn policy_suppression_means_no_delivery_at_all() {
    let backend = Arc::new(RecordingBackend::default());
    let mut settings = settings();
    settings.global.only_on_failure_or_recovery = true;
    let publisher = Publisher::new(settings, backend.clone(), directory());

    publisher
        .build_completed(&BuildRecord::new("foo", 12, Outcome::Success))
        .await;
    publisher
        .build_completed(&BuildRecord::new("foo", 13, Outcome::Aborted))
        .await;

    assert!(backend.payloads.lock().await.is_empty());
}

#[tokio::test]
async fn per_project_settings_override_global() {
    let backend = Arc::new(RecordingBackend::default());
    let mut settings = settings();
    settings.global.only_on_failure_or_recovery = true;
    settings.projects.insert(
        "chatty".to_owned(),
        NotifierConfig {
            only_on_failure_or_recovery: Some(false),
            room: Some("Chatty Builds".to_owned()),
            include_url: Some(true),
            ..NotifierConfig::default()
        },
    );
    let publisher = Publisher::new(settings, backend.clone(), directory());

    // A plain success is suppressed globally but announced for `chatty`.
    publisher
        .build_completed(&BuildRecord::new("quiet", 1, Outcome::Success))
        .await;
    publisher
        .build_completed(
            &BuildRecord::new("chatty", 2, Outcome::Success).with_url_suffix("job/chatty/2/"),
        )
        .await;

    let payloads = backend.payloads.lock().await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].room_name, "Chatty Builds");
    assert!(payloads[0]
        .message
        .contains("http://ci.example.com/job/chatty/2/"));
}

#[tokio::test]
async fn unresolved_credentials_are_logged_not_raised() {
    let backend = Arc::new(RecordingBackend::default());
    let publisher = Publisher::new(
        NotifierSettings::default(),
        backend.clone(),
        directory(),
    );

    publisher
        .build_completed(&BuildRecord::new("foo", 12, Outcome::Failure))
        .await;

    assert!(backend.payloads.lock().await.is_empty());
}

#[tokio::test]
async fn change_authors_are_mentioned_in_order_when_no_culprits() {
    let backend = Arc::new(RecordingBackend::default());
    let publisher = Publisher::new(settings(), backend.clone(), directory());

    let build = BuildRecord::new("foo", 12, Outcome::Failure).with_changes(vec![
        ChangeEntry::new("xavier", "first"),
        ChangeEntry::new("yvonne", "second"),
    ]);
    publisher.build_completed(&build).await;

    let payloads = backend.payloads.lock().await;
    assert!(payloads[0].message.starts_with("@x @y \n"));
}

#[tokio::test]
async fn explicit_project_config_bypasses_the_settings_table() {
    let backend = Arc::new(RecordingBackend::default());
    let publisher = Publisher::new(settings(), backend.clone(), directory());

    let project = NotifierConfig {
        room: Some("Handed In".to_owned()),
        ..NotifierConfig::default()
    };
    publisher
        .build_completed_with(&BuildRecord::new("foo", 12, Outcome::Failure), &project)
        .await;

    let payloads = backend.payloads.lock().await;
    assert_eq!(payloads[0].room_name, "Handed In");
}

#[tokio::test]
async fn concurrent_completions_each_deliver_once() {
    let backend = Arc::new(RecordingBackend::default());
    let publisher = Arc::new(Publisher::new(settings(), backend.clone(), directory()));

    let mut handles = Vec::new();
    for number in 1..=8u32 {
        let publisher = Arc::clone(&publisher);
        handles.push(tokio::spawn(async move {
            let build = BuildRecord::new("foo", number, Outcome::Failure);
            publisher.build_completed(&build).await;
        }));
    }
    for handle in handles {
        handle.await.expect("task should not panic");
    }

    assert_eq!(backend.payloads.lock().await.len(), 8);
}
