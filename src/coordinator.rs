//! Studio coordinator: owns the recorder state, the action log and the saved records.
//!
//! Control messages from the panel and recorded actions from the capture agent are
//! dispatched here by pattern match. Every log mutation is mirrored to the store through
//! the background [`PersistHandle`]; named-record saves are written directly so their
//! failures reach the caller. Observers follow along through [`StudioNotice`]s on an
//! in-process bus.

use std::sync::Arc;

use action_codegen::{validate_page_variable, Dialect};
use action_locator::PageDom;
use action_log::{
    ActionLog, KeyValueStore, NamedRecord, OverwritePolicy, PersistHandle, RecordBook,
    RecordError, SaveOutcome,
};
use action_recorder::{CaptureAgent, CaptureOutcome, Highlight, PageEvent, RecorderState, Transition};
use action_replay::{CancellationToken, ReplayEngine, ReplayReport};
use recorder_core_types::{Action, ControlMessage};
use recorder_event_bus::{EventBus, InMemoryBus};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::StudioFailure;

const NOTICE_CAPACITY: usize = 64;

/// What observers (panel, CLI) are told about.
#[derive(Debug, Clone, PartialEq)]
pub enum StudioNotice {
    StateChanged(RecorderState),
    LogChanged { len: usize, dirty: bool },
    Alert(String),
    Highlight(Highlight),
    RecordsChanged { names: Vec<String> },
    ReplayStarted { steps: usize },
}

pub struct StudioCoordinator {
    agent: CaptureAgent,
    log: ActionLog,
    records: RecordBook,
    store: Arc<dyn KeyValueStore>,
    persist: PersistHandle,
    writer: JoinHandle<()>,
    notices: Arc<InMemoryBus<StudioNotice>>,
}

impl StudioCoordinator {
    /// Restore the persisted log and records and start the background writer.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, StudioFailure> {
        let log = ActionLog::load(store.as_ref()).await?;
        let records = RecordBook::load(store.as_ref()).await?;
        let (persist, writer) = PersistHandle::spawn(store.clone());
        info!(
            target: "recorder-studio",
            actions = log.len(),
            records = records.len(),
            origin = log.origin().unwrap_or("-"),
            "studio opened"
        );
        Ok(Self {
            agent: CaptureAgent::new(),
            log,
            records,
            store,
            persist,
            writer,
            notices: InMemoryBus::new(NOTICE_CAPACITY),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioNotice> {
        self.notices.subscribe()
    }

    pub fn notices(&self) -> Arc<InMemoryBus<StudioNotice>> {
        self.notices.clone()
    }

    pub fn state(&self) -> RecorderState {
        self.agent.state()
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    pub fn records(&self) -> &RecordBook {
        &self.records
    }

    pub fn dispatch(&mut self, message: ControlMessage) -> Result<(), StudioFailure> {
        debug!(target: "recorder-studio", message = message.name(), "dispatch");
        match message {
            ControlMessage::SetRecording { .. } | ControlMessage::ArmAssertion { .. } => {
                let before = self.agent.state();
                self.agent.handle_control(&message);
                self.state_changed(before);
                Ok(())
            }
            ControlMessage::ActionRecorded { action } => {
                let index = self.log.append(action)?;
                debug!(target: "recorder-studio", index, "action appended");
                self.log_changed();
                Ok(())
            }
        }
    }

    /// Feed one page event through the capture agent.
    pub fn observe(
        &mut self,
        dom: &PageDom,
        event: &PageEvent,
    ) -> Result<CaptureOutcome, StudioFailure> {
        let before = self.agent.state();
        let outcome = self.agent.handle_event(dom, event)?;
        match &outcome {
            CaptureOutcome::Recorded(_) => {
                if let Some(message) = outcome.clone().into_message() {
                    self.dispatch(message)?;
                }
            }
            CaptureOutcome::Blocked { alert } => {
                warn!(target: "recorder-studio", %alert, "click blocked");
                self.notices.emit(StudioNotice::Alert(alert.clone()));
            }
            CaptureOutcome::Highlight(highlight) => {
                self.notices.emit(StudioNotice::Highlight(highlight.clone()));
            }
            CaptureOutcome::Ignored => {}
        }
        self.state_changed(before);
        Ok(outcome)
    }

    pub fn delete_action(&mut self, index: usize) -> Result<Action, StudioFailure> {
        let removed = self.log.delete(index)?;
        self.log_changed();
        Ok(removed)
    }

    pub fn move_action(&mut self, from: usize, to: usize) -> Result<(), StudioFailure> {
        self.log.move_action(from, to)?;
        self.log_changed();
        Ok(())
    }

    pub fn insert_comment(&mut self, at: Option<usize>, text: &str) -> Result<usize, StudioFailure> {
        let index = self.log.insert_comment(at, text)?;
        self.log_changed();
        Ok(index)
    }

    pub fn insert_wait(&mut self, at: Option<usize>, seconds: i64) -> Result<usize, StudioFailure> {
        let index = self.log.insert_wait(at, seconds)?;
        self.log_changed();
        Ok(index)
    }

    /// Empty the log and stop recording.
    pub fn clear(&mut self) {
        let before = self.agent.state();
        self.log.clear();
        self.agent.apply(Transition::Reset);
        self.state_changed(before);
        self.log_changed();
    }

    /// Save the log under `name`. Re-saving the record the log was loaded from needs no
    /// confirmation.
    pub async fn save_record(
        &mut self,
        name: &str,
        confirmed: bool,
    ) -> Result<SaveOutcome, StudioFailure> {
        let name = name.trim();
        let policy = if confirmed || self.log.origin() == Some(name) {
            OverwritePolicy::Confirmed
        } else {
            OverwritePolicy::Ask
        };
        let outcome = self.records.upsert(name, self.log.actions(), policy)?;
        self.records.persist(self.store.as_ref()).await?;
        self.log.mark_saved(name);
        info!(target: "recorder-studio", name, ?outcome, actions = self.log.len(), "record saved");
        self.records_changed();
        self.log_changed();
        Ok(outcome)
    }

    /// Replace the log with a saved record; returns the number of actions loaded.
    pub fn load_record(&mut self, name: &str) -> Result<usize, StudioFailure> {
        let record = self
            .records
            .find(name)
            .ok_or_else(|| RecordError::NotFound {
                name: name.trim().to_string(),
            })?;
        let (name, actions) = (record.name.clone(), record.actions.clone());
        let len = actions.len();
        self.log.load_record(&name, actions);
        info!(target: "recorder-studio", name = %name, actions = len, "record loaded");
        self.log_changed();
        Ok(len)
    }

    pub async fn delete_record(&mut self, name: &str) -> Result<NamedRecord, StudioFailure> {
        let removed = self.records.remove(name)?;
        self.records.persist(self.store.as_ref()).await?;
        info!(target: "recorder-studio", name = %removed.name, "record deleted");
        self.records_changed();
        Ok(removed)
    }

    pub fn generate(&self, dialect: Dialect, page_variable: &str) -> Result<String, StudioFailure> {
        validate_page_variable(page_variable)?;
        Ok(action_codegen::generate(
            self.log.actions(),
            dialect,
            page_variable,
        ))
    }

    /// Stop recording and hand out the log to replay.
    pub fn begin_replay(&mut self) -> Vec<Action> {
        let before = self.agent.state();
        if before.is_active() {
            self.agent.apply(Transition::SetRecording(false));
            info!(target: "recorder-studio", "recording paused for replay");
        }
        self.state_changed(before);
        self.notices.emit(StudioNotice::ReplayStarted {
            steps: self.log.len(),
        });
        self.log.actions().to_vec()
    }

    pub async fn replay(
        &mut self,
        engine: &ReplayEngine,
        cancel: &CancellationToken,
    ) -> Result<ReplayReport, StudioFailure> {
        let actions = self.begin_replay();
        match engine.run(&actions, cancel).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let failure = StudioFailure::from(err);
                self.notices.emit(StudioNotice::Alert(failure.user_message()));
                Err(failure)
            }
        }
    }

    /// Wait for queued log writes to reach the store.
    pub async fn flush(&self) -> Result<(), StudioFailure> {
        self.persist.flush().await?;
        Ok(())
    }

    /// Flush and stop the background writer.
    pub async fn close(self) -> Result<(), StudioFailure> {
        self.persist.flush().await?;
        drop(self.persist);
        if let Err(err) = self.writer.await {
            warn!(target: "recorder-studio", %err, "persistence writer ended abnormally");
        }
        Ok(())
    }

    fn state_changed(&self, before: RecorderState) {
        let now = self.agent.state();
        if now != before {
            self.notices.emit(StudioNotice::StateChanged(now));
        }
    }

    fn log_changed(&self) {
        self.persist.write_log(&self.log);
        self.notices.emit(StudioNotice::LogChanged {
            len: self.log.len(),
            dirty: self.log.is_dirty(),
        });
    }

    fn records_changed(&self) {
        let names = self.records.names().into_iter().map(str::to_string).collect();
        self.notices.emit(StudioNotice::RecordsChanged { names });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::xpath;
    use action_log::{MemoryStore, ACTIONS_KEY, RECORDS_KEY};
    use recorder_core_types::{ActionKind, AssertionKind};
    use serde_json::json;

    async fn studio(store: &MemoryStore) -> StudioCoordinator {
        StudioCoordinator::open(Arc::new(store.clone())).await.unwrap()
    }

    fn click_on(dom: &PageDom, locator: &str) -> PageEvent {
        PageEvent::Click {
            target: xpath::select(dom, locator).unwrap()[0],
        }
    }

    #[tokio::test]
    async fn recorded_clicks_land_in_the_persisted_log() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        let dom = PageDom::parse(r#"<body><button id="save-btn">Save</button></body>"#).unwrap();

        let idle = studio.observe(&dom, &click_on(&dom, "//button")).unwrap();
        assert_eq!(idle, CaptureOutcome::Ignored);
        assert!(studio.log().is_empty());

        studio
            .dispatch(ControlMessage::SetRecording { is_recording: true })
            .unwrap();
        studio.observe(&dom, &click_on(&dom, "//button")).unwrap();
        studio.flush().await.unwrap();

        let action = &studio.log().actions()[0];
        assert_eq!(action.kind, ActionKind::Click);
        assert_eq!(action.locator(), Some(r#"//*[@id="save-btn"]"#));
        assert_eq!(action.description, r#"Click on "Save""#);
        let stored = store.snapshot();
        assert_eq!(stored[ACTIONS_KEY].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn armed_assertion_returns_to_recording() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        let mut notices = studio.subscribe();
        let dom = PageDom::parse(r#"<body><h1 id="title">Welcome</h1></body>"#).unwrap();

        studio
            .dispatch(ControlMessage::SetRecording { is_recording: true })
            .unwrap();
        studio
            .dispatch(ControlMessage::ArmAssertion {
                kind: AssertionKind::Text,
            })
            .unwrap();
        assert_eq!(studio.state(), RecorderState::Armed(AssertionKind::Text));

        studio.observe(&dom, &click_on(&dom, "//h1")).unwrap();
        assert_eq!(studio.state(), RecorderState::Recording);
        assert_eq!(studio.log().actions()[0].kind, ActionKind::AssertText);

        let mut seen = Vec::new();
        while let Ok(notice) = notices.try_recv() {
            seen.push(notice);
        }
        assert!(seen.contains(&StudioNotice::StateChanged(RecorderState::Recording)));
        assert!(seen.contains(&StudioNotice::StateChanged(RecorderState::Armed(
            AssertionKind::Text
        ))));
    }

    #[tokio::test]
    async fn clear_resets_recording() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        studio
            .dispatch(ControlMessage::SetRecording { is_recording: true })
            .unwrap();
        studio.insert_comment(None, "login").unwrap();
        studio.clear();
        assert!(studio.log().is_empty());
        assert_eq!(studio.state(), RecorderState::Idle);
    }

    #[tokio::test]
    async fn edits_keep_order() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        studio.insert_comment(None, "first").unwrap();
        studio.insert_wait(None, 2).unwrap();
        studio.insert_comment(None, "third").unwrap();

        studio.move_action(2, 0).unwrap();
        let order: Vec<_> = studio
            .log()
            .actions()
            .iter()
            .map(|a| a.description.clone())
            .collect();
        assert_eq!(order, vec!["third", "first", "2 seconds"]);

        let removed = studio.delete_action(1).unwrap();
        assert_eq!(removed.description, "first");
        assert_eq!(studio.log().len(), 2);
        assert!(studio.delete_action(5).is_err());
    }

    #[tokio::test]
    async fn saving_over_another_record_needs_confirmation() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        studio.insert_comment(None, "a").unwrap();
        assert_eq!(
            studio.save_record("login", false).await.unwrap(),
            SaveOutcome::Created
        );

        studio.clear();
        studio.insert_comment(None, "b").unwrap();
        let err = studio.save_record("login", false).await.unwrap_err();
        assert!(err.needs_confirmation());
        assert_eq!(
            studio.save_record("login", true).await.unwrap(),
            SaveOutcome::Overwritten
        );
        assert_eq!(store.snapshot()[RECORDS_KEY][0]["name"], json!("login"));
    }

    #[tokio::test]
    async fn resaving_the_loaded_record_is_implicitly_confirmed() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        studio.insert_comment(None, "a").unwrap();
        studio.save_record("checkout", false).await.unwrap();
        studio.clear();

        assert_eq!(studio.load_record("checkout").unwrap(), 1);
        assert!(!studio.log().is_dirty());
        studio.insert_wait(None, 1).unwrap();
        assert!(studio.log().is_dirty());
        assert_eq!(
            studio.save_record("checkout", false).await.unwrap(),
            SaveOutcome::Overwritten
        );
        assert_eq!(studio.records().find("checkout").unwrap().actions.len(), 2);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        studio.insert_comment(None, "kept").unwrap();
        studio.save_record("smoke", false).await.unwrap();
        studio.close().await.unwrap();

        let reopened = StudioCoordinator::open(Arc::new(store.clone())).await.unwrap();
        assert_eq!(reopened.log().len(), 1);
        assert_eq!(reopened.log().origin(), Some("smoke"));
        assert_eq!(reopened.records().names(), vec!["smoke"]);
    }

    #[tokio::test]
    async fn delete_missing_record_fails() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        assert!(matches!(
            studio.delete_record("nope").await,
            Err(StudioFailure::Record(RecordError::NotFound { .. }))
        ));
        assert!(studio.load_record("nope").is_err());
    }

    #[tokio::test]
    async fn generate_rejects_bad_page_variable() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        studio.insert_wait(None, 1).unwrap();
        let code = studio.generate(Dialect::Fluent, "page").unwrap();
        assert!(code.starts_with("// 1 second\n"));
        assert!(matches!(
            studio.generate(Dialect::Fluent, "page; alert(1)"),
            Err(StudioFailure::Codegen(_))
        ));
    }

    #[tokio::test]
    async fn begin_replay_pauses_recording() {
        let store = MemoryStore::new();
        let mut studio = studio(&store).await;
        studio
            .dispatch(ControlMessage::SetRecording { is_recording: true })
            .unwrap();
        studio.insert_comment(None, "step").unwrap();
        let actions = studio.begin_replay();
        assert_eq!(actions.len(), 1);
        assert_eq!(studio.state(), RecorderState::Idle);
    }
}
