//! Application state and its transitions.
//!
//! All mutation goes through [`reduce`], which applies one [`Event`] and
//! returns the network [`Effect`]s the shell has to run. Each effect later
//! comes back as exactly one completion event.
//!
//! Queries and uploads share a single [`Busy`] state, so at most one network
//! operation of either kind is outstanding at any time.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Local};

use crate::api::{declared_type, PdfUpload, SessionId, UploadReceipt, PDF_MIME};
use crate::conversation::{ChatMessage, Conversation, EntryId, IdGenerator};
use crate::envelope::Envelope;
use crate::status;

pub const QUERY_FAILED_WARNING: &str =
    "Warning: something went wrong while reaching your study buddy. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("query is empty")]
    EmptyQuery,
    #[error("no active session, start a new chat and try again")]
    NoSession,
    #[error("another request is still in progress")]
    Busy,
    #[error("{0} is not a PDF file. Please select a PDF.")]
    NotPdf(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Busy {
    Idle,
    Submitting { started: Instant },
    Uploading { filename: String },
}

impl Busy {
    pub fn is_idle(&self) -> bool {
        matches!(self, Busy::Idle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadStatus {
    pub id: EntryId,
    pub filename: String,
    pub message: String,
    pub pages_extracted: u64,
    pub chunks_created: u64,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// Answer to `Effect::CreateSession`.
    SessionCreated {
        generation: u64,
        result: Result<SessionId, String>,
    },
    NewChat,
    Submit(String),
    QueryCompleted {
        query: String,
        result: Result<Envelope, String>,
    },
    SelectFile(PathBuf),
    UploadCompleted {
        filename: String,
        result: Result<UploadReceipt, String>,
    },
    DismissUpload(EntryId),
    DismissAlert,
    Tick(Instant),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreateSession { generation: u64 },
    SendQuery { session: SessionId, query: String },
    UploadPdf { session: SessionId, upload: PdfUpload },
}

#[derive(Debug)]
pub struct AppState {
    session: Option<SessionId>,
    session_generation: u64,
    busy: Busy,
    conversation: Conversation,
    uploads: Vec<UploadStatus>,
    alert: Option<String>,
    status_line: Option<&'static str>,
    spinner_frame: usize,
    ids: IdGenerator,
}

impl AppState {
    /// Fresh state plus the session request that bootstraps it.
    pub fn new() -> (Self, Vec<Effect>) {
        let state = AppState {
            session: None,
            session_generation: 1,
            busy: Busy::Idle,
            conversation: Conversation::new(),
            uploads: Vec::new(),
            alert: None,
            status_line: None,
            spinner_frame: 0,
            ids: IdGenerator::default(),
        };
        let effects = vec![Effect::CreateSession {
            generation: state.session_generation,
        }];
        (state, effects)
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn busy(&self) -> &Busy {
        &self.busy
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn uploads(&self) -> &[UploadStatus] {
        &self.uploads
    }

    /// Blocking message the user has to dismiss.
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn status_line(&self) -> Option<&'static str> {
        self.status_line
    }

    pub fn spinner_frame(&self) -> usize {
        self.spinner_frame
    }

    fn check_query(&self, query: &str) -> Result<SessionId, Rejection> {
        if query.trim().is_empty() {
            return Err(Rejection::EmptyQuery);
        }
        if !self.busy.is_idle() {
            return Err(Rejection::Busy);
        }
        self.session.clone().ok_or(Rejection::NoSession)
    }

    fn check_upload(&self, path: PathBuf) -> Result<(SessionId, PdfUpload), Rejection> {
        if !self.busy.is_idle() {
            return Err(Rejection::Busy);
        }
        let upload = PdfUpload::new(path);
        if declared_type(&upload.path) != Some(PDF_MIME) {
            return Err(Rejection::NotPdf(upload.filename));
        }
        let session = self.session.clone().ok_or(Rejection::NoSession)?;
        Ok((session, upload))
    }

    fn finish_busy(&mut self) {
        self.busy = Busy::Idle;
        self.status_line = None;
        self.spinner_frame = 0;
    }
}

pub fn reduce(state: &mut AppState, event: Event) -> Vec<Effect> {
    match event {
        Event::SessionCreated { generation, result } => {
            if generation != state.session_generation {
                tracing::debug!(generation, "ignoring superseded session response");
                return Vec::new();
            }
            match result {
                Ok(session) => {
                    tracing::info!(%session, "session ready");
                    state.session = Some(session);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not create a session");
                    state.session = None;
                }
            }
            Vec::new()
        }
        Event::NewChat => {
            state.conversation.clear();
            state.session = None;
            state.session_generation += 1;
            tracing::info!(generation = state.session_generation, "starting new chat");
            vec![Effect::CreateSession {
                generation: state.session_generation,
            }]
        }
        Event::Submit(query) => match state.check_query(&query) {
            Ok(session) => {
                state.busy = Busy::Submitting {
                    started: Instant::now(),
                };
                state.status_line = Some(status::message_for(std::time::Duration::ZERO));
                state.spinner_frame = 0;
                tracing::debug!(len = query.len(), "submitting query");
                vec![Effect::SendQuery { session, query }]
            }
            Err(Rejection::NoSession) => {
                tracing::warn!("query dropped: no active session");
                Vec::new()
            }
            Err(rejection) => {
                tracing::debug!(%rejection, "query rejected");
                Vec::new()
            }
        },
        Event::QueryCompleted { query, result } => {
            let (response, links) = match result {
                Ok(envelope) => {
                    let rendered = envelope.render();
                    (rendered.text, rendered.links)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "query failed");
                    (QUERY_FAILED_WARNING.to_string(), Vec::new())
                }
            };
            let id = state.ids.next_id();
            state.conversation.push(ChatMessage {
                id,
                query,
                response,
                links,
                created_at: Local::now(),
            });
            if let Busy::Submitting { started } = &state.busy {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(elapsed_ms, "query resolved");
                state.finish_busy();
            }
            Vec::new()
        }
        Event::SelectFile(path) => match state.check_upload(path) {
            Ok((session, upload)) => {
                tracing::info!(file = %upload.filename, "upload started");
                state.busy = Busy::Uploading {
                    filename: upload.filename.clone(),
                };
                state.spinner_frame = 0;
                vec![Effect::UploadPdf { session, upload }]
            }
            Err(Rejection::Busy) => {
                tracing::debug!("file selection ignored while busy");
                Vec::new()
            }
            Err(rejection) => {
                tracing::warn!(%rejection, "upload refused");
                state.alert = Some(rejection.to_string());
                Vec::new()
            }
        },
        Event::UploadCompleted { filename, result } => {
            match result {
                Ok(receipt) => {
                    tracing::info!(
                        file = %filename,
                        pages = receipt.pages_extracted,
                        chunks = receipt.chunks_created,
                        "upload finished"
                    );
                    let id = state.ids.next_id();
                    state.uploads.push(UploadStatus {
                        id,
                        filename,
                        message: receipt.message,
                        pages_extracted: receipt.pages_extracted,
                        chunks_created: receipt.chunks_created,
                        created_at: Local::now(),
                    });
                }
                Err(e) => {
                    tracing::warn!(file = %filename, error = %e, "upload failed");
                    state.alert = Some(format!("Upload of {} failed: {}", filename, e));
                }
            }
            if matches!(state.busy, Busy::Uploading { .. }) {
                state.finish_busy();
            }
            Vec::new()
        }
        Event::DismissUpload(id) => {
            state.uploads.retain(|u| u.id != id);
            Vec::new()
        }
        Event::DismissAlert => {
            state.alert = None;
            Vec::new()
        }
        Event::Tick(now) => {
            match &state.busy {
                Busy::Idle => {}
                Busy::Submitting { started, .. } => {
                    state.spinner_frame = state.spinner_frame.wrapping_add(1);
                    state.status_line =
                        Some(status::message_for(now.saturating_duration_since(*started)));
                }
                Busy::Uploading { .. } => {
                    state.spinner_frame = state.spinner_frame.wrapping_add(1);
                }
            }
            Vec::new()
        }
    }
}
