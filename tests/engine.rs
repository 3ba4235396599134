//! End-to-end scenario: a restored engine drives a full turn and the
//! resulting state survives a reload.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kalchat::store::SNAPSHOT_KEY;
use kalchat::{
    AppConfig, Attachment, ChatMessage, ContentPart, EngineError, MemoryStorage, ModelCapability,
    Orchestrator, Role, SendOutcome, SessionStore, SnapshotStorage,
};

struct CannedModel {
    reply: &'static str,
}

#[async_trait]
impl ModelCapability for CannedModel {
    async fn generate(&self, _model: &str, parts: &[ContentPart]) -> Result<String, EngineError> {
        assert!(matches!(parts[0], ContentPart::Text(_)));
        Ok(self.reply.to_string())
    }
}

#[derive(Clone)]
struct SharedStorage(Arc<MemoryStorage>);

impl SnapshotStorage for SharedStorage {
    fn load(&self, key: &str) -> Option<String> {
        self.0.load(key)
    }
    fn save(&self, key: &str, payload: &str) {
        self.0.save(key, payload)
    }
}

#[tokio::test]
async fn a_full_turn_persists_across_reload() {
    let storage = SharedStorage(Arc::new(MemoryStorage::new()));

    let store = Arc::new(Mutex::new(SessionStore::new(Box::new(storage.clone()))));
    let config = AppConfig {
        api_key: "test-key".to_string(),
        ..AppConfig::default()
    };
    let orchestrator = Orchestrator::new(store.clone(), Arc::new(CannedModel { reply: "4" }), config);

    let session_id = store.lock().unwrap().active_id().to_string();
    assert_eq!(store.lock().unwrap().sessions()[0].messages.len(), 1);

    let outcome = orchestrator
        .send(&session_id, "What is 2+2?", Vec::new())
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Replied("4".to_string()));
    assert!(!orchestrator.is_awaiting(&session_id));

    // Reload from the same storage, as a browser refresh would.
    let reloaded = SessionStore::new(Box::new(storage.clone()));
    assert_eq!(reloaded.active_id(), session_id);
    let session = reloaded.active_session().unwrap();
    assert_eq!(session.title, "What is 2+2?");
    assert_eq!(session.messages.len(), 3);
    assert_eq!(session.messages[0].role, Role::Assistant);
    assert_eq!(session.messages[1].role, Role::User);
    assert_eq!(session.messages[2].content, "4");
}

#[tokio::test]
async fn attachment_summaries_persist_without_payloads() {
    let storage = SharedStorage(Arc::new(MemoryStorage::new()));
    let store = Arc::new(Mutex::new(SessionStore::new(Box::new(storage.clone()))));
    let config = AppConfig {
        api_key: "test-key".to_string(),
        ..AppConfig::default()
    };
    let orchestrator =
        Orchestrator::new(store.clone(), Arc::new(CannedModel { reply: "noted" }), config);

    let session_id = store.lock().unwrap().active_id().to_string();
    let image = Attachment::from_bytes("chart.png", "image/png", vec![1, 2, 3]);
    let report = Attachment::from_bytes("report.pdf", "application/pdf", vec![4, 5]);

    orchestrator
        .send(&session_id, "", vec![image, report])
        .await
        .unwrap();

    let payload = storage.load(SNAPSHOT_KEY).unwrap();
    let reloaded = SessionStore::new(Box::new(storage));
    let user_turn = &reloaded.active_session().unwrap().messages[1];
    assert_eq!(user_turn.attachments.len(), 2);
    assert!(user_turn.attachments[0].preview.is_some());
    assert!(user_turn.attachments[1].preview.is_none());

    // Only the image preview is persisted; the PDF payload never is.
    assert!(payload.contains("data:image/png;base64,"));
    assert!(!payload.contains(r#""data":"BAU"#));
}

#[test]
fn mutations_write_through_on_every_step() {
    let storage = SharedStorage(Arc::new(MemoryStorage::new()));
    let mut store = SessionStore::new(Box::new(storage.clone()));

    let count_in = |s: &SharedStorage| {
        let payload = s.load(SNAPSHOT_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        value["sessions"].as_array().unwrap().len()
    };

    let id = store.create_session();
    assert_eq!(count_in(&storage), 2);

    store
        .append_message(&id, ChatMessage::user("persisted?", Vec::new()))
        .unwrap();
    let payload = storage.load(SNAPSHOT_KEY).unwrap();
    assert!(payload.contains("persisted?"));

    store.delete_session(&id);
    assert_eq!(count_in(&storage), 1);
}
