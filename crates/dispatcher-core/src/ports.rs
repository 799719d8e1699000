//! Effect ports — traits abstracting the external systems built-in
//! workflows talk to. Production wiring plugs in real clients (an IMAP/SMTP
//! mail client, a calendar API, a search API); tests and the default
//! binary use the in-memory stub implementations here.
//!
//! Mail, calendar, document conversion and web search are the four
//! third-party integrations the request-level spec treats as opaque ports:
//! the dispatcher only needs to know their shape, not their wire protocol.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AgentError, AgentResult};

#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

pub trait MailPort: Send + Sync {
    fn list(&self, count: usize, sender: Option<&str>, query: Option<&str>) -> AgentResult<Vec<Message>>;
    fn reply(&self, message_id: &str, body: &str) -> AgentResult<()>;
    fn send(&self, to: &str, subject: &str, body: &str) -> AgentResult<String>;
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub start: String,
    pub attendees: Vec<String>,
}

pub trait CalendarPort: Send + Sync {
    fn list(&self, from: &str, to: &str) -> AgentResult<Vec<Event>>;
    fn create(&self, title: &str, start: &str, attendees: Vec<String>) -> AgentResult<String>;
}

pub trait DocumentPort: Send + Sync {
    fn convert(&self, path: &str, to_format: &str) -> AgentResult<String>;
    fn merge(&self, paths: &[String]) -> AgentResult<String>;
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub trait WebSearchPort: Send + Sync {
    fn search(&self, query: &str, count: usize) -> AgentResult<Vec<SearchResult>>;
}

/// The append-only artifacts directory tree (`images`, `documents`, `audio`,
/// `temp`, `exports`) workflow handlers write generated files into and
/// resolve bare filenames against.
pub trait ArtifactsPort: Send + Sync {
    /// Resolves a bare filename to a full path by searching each
    /// subdirectory in a fixed order, returning the first match.
    fn resolve(&self, filename: &str) -> AgentResult<PathBuf>;
    /// Returns the directory a new artifact of `kind` should be written to,
    /// creating it if necessary.
    fn directory_for(&self, kind: &str) -> AgentResult<PathBuf>;
}

const ARTIFACT_KINDS: &[&str] = &["images", "documents", "audio", "temp", "exports"];

/// Filesystem-backed artifacts store rooted at a configured directory.
pub struct FsArtifactsPort {
    root: PathBuf,
}

impl FsArtifactsPort {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ArtifactsPort for FsArtifactsPort {
    fn resolve(&self, filename: &str) -> AgentResult<PathBuf> {
        for kind in ARTIFACT_KINDS {
            let candidate = self.root.join(kind).join(filename);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(AgentError::NotFound(format!(
            "artifact '{filename}' not found under {}",
            self.root.display()
        )))
    }

    fn directory_for(&self, kind: &str) -> AgentResult<PathBuf> {
        if !ARTIFACT_KINDS.contains(&kind) {
            return Err(AgentError::Validation(format!(
                "unknown artifact kind '{kind}', expected one of {ARTIFACT_KINDS:?}"
            )));
        }
        let dir = self.root.join(kind);
        std::fs::create_dir_all(&dir)
            .map_err(|e| AgentError::Execution(format!("could not create artifact dir: {e}")))?;
        Ok(dir)
    }
}

/// In-memory stub: resolves only filenames staged in its seed set, used so
/// tests don't touch the real filesystem.
#[derive(Default)]
pub struct StubArtifactsPort {
    root: PathBuf,
}

impl StubArtifactsPort {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
}

impl ArtifactsPort for StubArtifactsPort {
    fn resolve(&self, filename: &str) -> AgentResult<PathBuf> {
        for kind in ARTIFACT_KINDS {
            let candidate = self.root.join(kind).join(filename);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(AgentError::NotFound(format!("artifact '{filename}' not found")))
    }

    fn directory_for(&self, kind: &str) -> AgentResult<PathBuf> {
        Ok(self.root.join(kind))
    }
}

/// In-memory mail stub: seeded with a handful of messages, replies recorded
/// rather than sent. Good enough to exercise the dispatch path end to end
/// in tests without a real mail transport.
pub struct StubMailPort {
    messages: Mutex<Vec<Message>>,
    sent: Mutex<Vec<(String, String, String)>>,
}

impl Default for StubMailPort {
    fn default() -> Self {
        Self {
            messages: Mutex::new(vec![
                Message {
                    id: "m1".to_string(),
                    sender: "alice@example.com".to_string(),
                    subject: "Project update".to_string(),
                    body: "Here's the latest status.".to_string(),
                },
                Message {
                    id: "m2".to_string(),
                    sender: "bob@example.com".to_string(),
                    subject: "Lunch?".to_string(),
                    body: "Want to grab lunch tomorrow?".to_string(),
                },
            ]),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MailPort for StubMailPort {
    fn list(&self, count: usize, sender: Option<&str>, query: Option<&str>) -> AgentResult<Vec<Message>> {
        let messages = self.messages.lock().expect("mail stub poisoned");
        Ok(messages
            .iter()
            .rev()
            .filter(|m| match sender {
                Some(s) => m.sender.contains(s),
                None => true,
            })
            .filter(|m| match query {
                Some(q) => m.subject.contains(q) || m.body.contains(q),
                None => true,
            })
            .take(count)
            .cloned()
            .collect())
    }

    fn reply(&self, message_id: &str, body: &str) -> AgentResult<()> {
        self.sent
            .lock()
            .expect("mail stub poisoned")
            .push((message_id.to_string(), "reply".to_string(), body.to_string()));
        Ok(())
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> AgentResult<String> {
        let id = format!("sent-{}", uuid::Uuid::new_v4());
        self.sent
            .lock()
            .expect("mail stub poisoned")
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(id)
    }
}

#[derive(Default)]
pub struct StubCalendarPort {
    events: Mutex<Vec<Event>>,
}

impl CalendarPort for StubCalendarPort {
    fn list(&self, _from: &str, _to: &str) -> AgentResult<Vec<Event>> {
        Ok(self.events.lock().expect("calendar stub poisoned").clone())
    }

    fn create(&self, title: &str, start: &str, attendees: Vec<String>) -> AgentResult<String> {
        let id = format!("evt-{}", uuid::Uuid::new_v4());
        self.events.lock().expect("calendar stub poisoned").push(Event {
            id: id.clone(),
            title: title.to_string(),
            start: start.to_string(),
            attendees,
        });
        Ok(id)
    }
}

#[derive(Default)]
pub struct StubDocumentPort;

impl DocumentPort for StubDocumentPort {
    fn convert(&self, path: &str, to_format: &str) -> AgentResult<String> {
        let stem = path.rsplit('.').nth(1).unwrap_or(path);
        Ok(format!("{stem}.{to_format}"))
    }

    fn merge(&self, paths: &[String]) -> AgentResult<String> {
        Ok(format!("merged-{}.pdf", paths.len()))
    }
}

#[derive(Default)]
pub struct StubWebSearchPort;

impl WebSearchPort for StubWebSearchPort {
    fn search(&self, query: &str, count: usize) -> AgentResult<Vec<SearchResult>> {
        Ok((0..count)
            .map(|i| SearchResult {
                title: format!("Result {} for {query}", i + 1),
                url: format!("https://example.com/{query}/{i}"),
                snippet: format!("A stub search result about {query}."),
            })
            .collect())
    }
}

/// Bundles the ports a request's built-in workflows draw on. Held by the
/// execution loop and handed to workflow registration so handlers can
/// close over the shared instances.
pub struct Ports {
    pub mail: Box<dyn MailPort>,
    pub calendar: Box<dyn CalendarPort>,
    pub documents: Box<dyn DocumentPort>,
    pub search: Box<dyn WebSearchPort>,
    pub artifacts: Box<dyn ArtifactsPort>,
}

impl Default for Ports {
    fn default() -> Self {
        let artifacts_root = std::env::temp_dir().join("dispatcher-artifacts");
        Self {
            mail: Box::new(StubMailPort::default()),
            calendar: Box::new(StubCalendarPort::default()),
            documents: Box::new(StubDocumentPort),
            search: Box::new(StubWebSearchPort),
            artifacts: Box::new(FsArtifactsPort::new(artifacts_root)),
        }
    }
}

