use std::sync::Arc;

use action_log::{
    ActionLog, JsonFileStore, KeyValueStore, OverwritePolicy, PersistHandle, RecordBook,
    ACTIONS_KEY,
};
use recorder_core_types::{Action, ActionKind};
use serde_json::json;

#[tokio::test]
async fn log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(dir.path()));
    let (persist, _task) = PersistHandle::spawn(Arc::clone(&store));

    let mut log = ActionLog::new();
    log.append(Action::click("//*[@id=\"go\"]", "Click on \"Go\""))
        .unwrap();
    log.insert_comment(None, "after go").unwrap();
    persist.write_log(&log);
    persist.flush().await.unwrap();

    let reloaded = ActionLog::load(store.as_ref()).await.unwrap();
    assert_eq!(reloaded.actions(), log.actions());
    assert!(reloaded.is_dirty());
}

#[tokio::test]
async fn legacy_extension_log_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    store
        .set(
            ACTIONS_KEY,
            json!([
                { "type": "click", "selector": "//a", "description": "Click on \"a\"" },
                { "type": "color-assertion", "selector": "//p", "expectedColor": "rgb(0, 0, 0)",
                  "description": "Assert color is \"rgb(0, 0, 0)\"" },
                { "type": "wait", "duration": 3, "description": "3 seconds" }
            ]),
        )
        .await
        .unwrap();

    let log = ActionLog::load(&store).await.unwrap();
    let kinds: Vec<_> = log.actions().iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![ActionKind::Click, ActionKind::AssertColor, ActionKind::Wait]
    );
    assert_eq!(log.get(2).unwrap().wait_millis(), 3000);
}

#[tokio::test]
async fn records_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());

    let mut book = RecordBook::load(&store).await.unwrap();
    assert!(book.is_empty());
    book.upsert("login", &[Action::wait(1)], OverwritePolicy::Ask)
        .unwrap();
    book.persist(&store).await.unwrap();

    let reloaded = RecordBook::load(&store).await.unwrap();
    assert_eq!(reloaded.names(), vec!["login"]);
    assert!(reloaded.find("login").unwrap().updated_at.is_some());

    let mut log = ActionLog::new();
    let record = reloaded.find("login").unwrap().clone();
    log.load_record(&record.name, record.actions);
    assert_eq!(log.origin(), Some("login"));
    assert!(!log.is_dirty());
}
