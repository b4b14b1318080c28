use std::sync::Arc;

use crate::api::StudyBackend;
use crate::state::{Effect, Event};

/// Performs the network call behind `effect` and reports its outcome as the
/// matching completion event. Errors are flattened to strings so events stay
/// cloneable.
pub async fn run(backend: Arc<dyn StudyBackend>, effect: Effect) -> Event {
    match effect {
        Effect::CreateSession { generation } => Event::SessionCreated {
            generation,
            result: backend.new_chat().await.map_err(|e| e.to_string()),
        },
        Effect::SendQuery { session, query } => {
            let result = backend.query(&session, &query).await.map_err(|e| e.to_string());
            Event::QueryCompleted { query, result }
        }
        Effect::UploadPdf { session, upload } => {
            let result = backend
                .upload_pdf(&session, &upload)
                .await
                .map_err(|e| e.to_string());
            Event::UploadCompleted {
                filename: upload.filename,
                result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiResult, PdfUpload, SessionId, UploadReceipt};
    use crate::envelope::Envelope;
    use crate::state::{reduce, AppState, Busy, QUERY_FAILED_WARNING};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        sessions: AtomicUsize,
        queries: AtomicUsize,
        uploads: AtomicUsize,
        fail_queries: bool,
    }

    #[async_trait]
    impl StudyBackend for FakeBackend {
        async fn new_chat(&self) -> ApiResult<SessionId> {
            let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SessionId::new(format!("session-{}", n)))
        }

        async fn query(&self, _session: &SessionId, query: &str) -> ApiResult<Envelope> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_queries {
                return Err(ApiError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "backend offline",
                )));
            }
            Ok(Envelope::from_value(json!({
                "type": "concept_search",
                "expert_summary": format!("About {}", query),
                "core_keyword": "K",
                "results": [{"file": "a.pdf", "page": 3, "relevance_score": 0.9, "preview_summary": "p"}]
            })))
        }

        async fn upload_pdf(&self, _session: &SessionId, upload: &PdfUpload) -> ApiResult<UploadReceipt> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(UploadReceipt {
                message: format!("{} processed", upload.filename),
                pages_extracted: 4,
                chunks_created: 10,
            })
        }
    }

    /// Runs every effect to completion, feeding the results back in.
    async fn drive(backend: &Arc<FakeBackend>, state: &mut AppState, effects: Vec<Effect>) {
        let mut pending = effects;
        while let Some(effect) = pending.pop() {
            let dyn_backend: Arc<dyn StudyBackend> = backend.clone();
            let event = run(dyn_backend, effect).await;
            pending.extend(reduce(state, event));
        }
    }

    async fn booted(backend: &Arc<FakeBackend>) -> AppState {
        let (mut state, effects) = AppState::new();
        drive(backend, &mut state, effects).await;
        state
    }

    #[tokio::test]
    async fn test_startup_obtains_session() {
        let backend = Arc::new(FakeBackend::default());
        let state = booted(&backend).await;
        assert_eq!(state.session(), Some(&SessionId::new("session-1")));
    }

    #[tokio::test]
    async fn test_one_submission_one_message() {
        let backend = Arc::new(FakeBackend::default());
        let mut state = booted(&backend).await;

        let effects = reduce(&mut state, Event::Submit("photosynthesis".to_string()));
        drive(&backend, &mut state, effects).await;

        assert_eq!(backend.queries.load(Ordering::SeqCst), 1);
        assert_eq!(state.conversation().len(), 1);
        let message = &state.conversation().messages()[0];
        assert_eq!(message.query, "photosynthesis");
        assert!(message.response.contains("a.pdf (page 3)"));
        assert!(state.busy().is_idle());
    }

    #[tokio::test]
    async fn test_double_submit_issues_one_call() {
        let backend = Arc::new(FakeBackend::default());
        let mut state = booted(&backend).await;

        let mut effects = reduce(&mut state, Event::Submit("first".to_string()));
        effects.extend(reduce(&mut state, Event::Submit("second".to_string())));
        effects.extend(reduce(&mut state, Event::SelectFile(PathBuf::from("x.pdf"))));
        assert_eq!(effects.len(), 1);

        drive(&backend, &mut state, effects).await;
        assert_eq!(backend.queries.load(Ordering::SeqCst), 1);
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(state.conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_warning() {
        let backend = Arc::new(FakeBackend {
            fail_queries: true,
            ..Default::default()
        });
        let mut state = booted(&backend).await;

        let effects = reduce(&mut state, Event::Submit("anything".to_string()));
        drive(&backend, &mut state, effects).await;

        assert_eq!(state.conversation().len(), 1);
        assert_eq!(state.conversation().messages()[0].response, QUERY_FAILED_WARNING);
        assert_eq!(*state.busy(), Busy::Idle);
    }

    #[tokio::test]
    async fn test_new_chat_gets_different_session() {
        let backend = Arc::new(FakeBackend::default());
        let mut state = booted(&backend).await;
        let before = state.session().cloned();

        let effects = reduce(&mut state, Event::SelectFile(PathBuf::from("bio.pdf")));
        drive(&backend, &mut state, effects).await;
        let effects = reduce(&mut state, Event::Submit("q".to_string()));
        drive(&backend, &mut state, effects).await;

        let effects = reduce(&mut state, Event::NewChat);
        drive(&backend, &mut state, effects).await;

        assert!(state.session().is_some());
        assert_ne!(state.session().cloned(), before);
        assert!(state.conversation().is_empty());
        assert_eq!(state.uploads().len(), 1);
        assert_eq!(state.uploads()[0].message, "bio.pdf processed");
    }
}
