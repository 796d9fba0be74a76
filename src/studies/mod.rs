//! Reading, editing and completing studies.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{CompletionReport, Study};
use crate::store::StudyStore;

/// Key the demo study is seeded under.
pub const DEMO_STUDY_ID: &str = "demo";

const MAX_ID_LEN: usize = 256;

/// Called whenever a participant reports a finished study.
///
/// This is where result recording plugs in. The core keeps no state about
/// completions itself.
pub trait CompletionHook: Send + Sync {
    fn on_complete(&self, report: &CompletionReport);
}

/// Default hook: logs the completion and nothing else.
pub struct LogCompletions;

impl CompletionHook for LogCompletions {
    fn on_complete(&self, report: &CompletionReport) {
        tracing::info!(
            study = %report.study_id,
            has_payload = report.payload.is_some(),
            "study completed"
        );
    }
}

#[derive(Clone)]
pub struct StudyService {
    store: StudyStore,
    hook: Arc<dyn CompletionHook>,
}

impl StudyService {
    pub fn new(store: StudyStore) -> Self {
        Self::with_hook(store, Arc::new(LogCompletions))
    }

    pub fn with_hook(store: StudyStore, hook: Arc<dyn CompletionHook>) -> Self {
        Self { store, hook }
    }

    pub fn store(&self) -> &StudyStore {
        &self.store
    }

    pub fn get_study(&self, id: &str) -> Result<Study> {
        // Keys that could never have been stored are simply not found.
        if check_id(id).is_err() {
            return Err(Error::study_not_found(id));
        }
        self.store.get(id)
    }

    /// Replace the study under `id`. The study's content is taken as-is.
    pub fn put_study(&self, id: &str, study: Study) -> Result<()> {
        check_id(id)?;
        tracing::debug!(id, name = %study.name, tasks = study.tasks.len(), "storing study");
        self.store.put(id, study);
        Ok(())
    }

    /// Acknowledge a completed run. Hands the report to the hook; the study
    /// itself is not touched and need not exist.
    pub fn complete_study(&self, id: &str, payload: Option<serde_json::Value>) {
        let report = CompletionReport {
            study_id: id.to_string(),
            payload,
            completed_at: Utc::now(),
        };
        self.hook.on_complete(&report);
    }

    /// Seed the demo study under `id` unless the key is already taken, returning
    /// whatever is stored there afterwards. Startup use only.
    pub fn get_or_create_default_study(&self, id: &str) -> Study {
        self.store.get_or_insert(id, Study::example())
    }
}

fn check_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::BadRequest("study id must not be empty".to_string()));
    }
    if id.len() > MAX_ID_LEN {
        return Err(Error::BadRequest(format!(
            "study id is longer than {MAX_ID_LEN} bytes"
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(Error::BadRequest(
            "study id must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Node, Task};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        reports: Mutex<Vec<CompletionReport>>,
    }

    impl CompletionHook for Recorder {
        fn on_complete(&self, report: &CompletionReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
    }

    fn small_study(name: &str) -> Study {
        Study {
            name: name.to_string(),
            tasks: vec![Task::new("Find it.", "leaf")],
            tree: Node::new("root", "Root").with_children(vec![Node::new("leaf", "Leaf")]),
        }
    }

    #[test]
    fn demo_seed_is_served_verbatim() {
        let service = StudyService::new(StudyStore::new());
        service.get_or_create_default_study(DEMO_STUDY_ID);

        assert_eq!(service.get_study(DEMO_STUDY_ID).unwrap(), Study::example());
        assert!(matches!(service.get_study("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn seeding_does_not_clobber_an_existing_study() {
        let service = StudyService::new(StudyStore::new());
        service.put_study(DEMO_STUDY_ID, small_study("Mine")).unwrap();

        let seeded = service.get_or_create_default_study(DEMO_STUDY_ID);
        assert_eq!(seeded.name, "Mine");
    }

    #[test]
    fn put_rejects_unusable_ids() {
        let service = StudyService::new(StudyStore::new());

        assert!(matches!(
            service.put_study("", small_study("x")),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            service.put_study("bad\nid", small_study("x")),
            Err(Error::BadRequest(_))
        ));
        assert!(service.store().is_empty());
        assert!(matches!(service.get_study(""), Err(Error::NotFound(_))));
    }

    #[test]
    fn complete_hands_report_to_hook_without_touching_store() {
        let recorder = Arc::new(Recorder::default());
        let service = StudyService::with_hook(StudyStore::new(), recorder.clone());

        service.complete_study("demo", Some(serde_json::json!({ "answers": ["shop"] })));
        service.complete_study("unknown", None);

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].study_id, "demo");
        assert!(reports[0].payload.is_some());
        assert!(reports[1].payload.is_none());
        assert!(service.store().is_empty());
    }
}
