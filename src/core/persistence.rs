//! Local persistence of the settings and session documents.
//!
//! Two JSON files live side by side in the data directory and are written
//! independently. Reads never fail: a missing, unreadable or malformed
//! document degrades to its default and the problem is logged.

use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::core::config::data::path_display;
use crate::core::session::ChatSession;
use crate::core::settings::AppSettings;

pub const SETTINGS_FILE: &str = "settings.json";
pub const SESSIONS_FILE: &str = "sessions.json";
pub const INTERRUPTED_REPLY: &str = "This response was interrupted.";

#[derive(Debug)]
pub enum PersistenceError {
    /// The document exists but could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not valid JSON of the expected shape.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Writing the document failed.
    Write {
        path: PathBuf,
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path_display(path), source)
            }
            PersistenceError::Parse { path, source } => {
                write!(f, "Failed to parse {}: {}", path_display(path), source)
            }
            PersistenceError::Write { path, source } => {
                write!(f, "Failed to write {}: {}", path_display(path), source)
            }
        }
    }
}

impl StdError for PersistenceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PersistenceError::Read { source, .. } => Some(source),
            PersistenceError::Parse { source, .. } => Some(source),
            PersistenceError::Write { source, .. } => Some(source.as_ref()),
        }
    }
}

/// What startup works from after reading both documents.
#[derive(Debug, Default)]
pub struct LoadedState {
    pub settings: AppSettings,
    pub sessions: Vec<ChatSession>,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "parley", "parley").map(|dirs| dirs.data_dir().to_path_buf())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.dir.join(SESSIONS_FILE)
    }

    pub fn load(&self) -> LoadedState {
        let settings = match self.load_settings() {
            Ok(settings) => settings.unwrap_or_default(),
            Err(err) => {
                tracing::warn!("{err}; using default settings");
                AppSettings::default()
            }
        };

        let sessions = match self.load_sessions() {
            Ok(sessions) => sessions,
            Err(err) => {
                tracing::warn!("{err}; starting with an empty chat history");
                Vec::new()
            }
        };

        LoadedState { settings, sessions }
    }

    fn load_settings(&self) -> Result<Option<AppSettings>, PersistenceError> {
        let path = self.settings_path();
        let Some(contents) = read_document(&path)? else {
            return Ok(None);
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| PersistenceError::Parse { path, source })
    }

    fn load_sessions(&self) -> Result<Vec<ChatSession>, PersistenceError> {
        let path = self.sessions_path();
        let Some(contents) = read_document(&path)? else {
            return Ok(Vec::new());
        };
        let entries: Vec<Value> = serde_json::from_str(&contents).map_err(|source| {
            PersistenceError::Parse {
                path: path.clone(),
                source,
            }
        })?;

        let mut seen = HashSet::new();
        let mut sessions = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let mut session: ChatSession = match serde_json::from_value(entry) {
                Ok(session) => session,
                Err(err) => {
                    tracing::warn!(
                        "skipping malformed session #{index} in {}: {err}",
                        path_display(&path)
                    );
                    continue;
                }
            };
            if !seen.insert(session.id.clone()) {
                tracing::warn!("skipping duplicate session id {}", session.id);
                continue;
            }
            if session.messages.is_empty() {
                continue;
            }
            finish_interrupted_replies(&mut session);
            sessions.push(session);
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<(), PersistenceError> {
        write_document(&self.settings_path(), settings)
    }

    /// Writes the session list. Sessions without messages are never stored.
    pub fn save_sessions<'a, I>(&self, sessions: I) -> Result<(), PersistenceError>
    where
        I: IntoIterator<Item = &'a ChatSession>,
    {
        let stored: Vec<&ChatSession> = sessions
            .into_iter()
            .filter(|session| !session.messages.is_empty())
            .collect();
        write_document(&self.sessions_path(), &stored)
    }
}

/// No stream survives a restart, so anything still flagged as streaming is
/// frozen as it stands.
fn finish_interrupted_replies(session: &mut ChatSession) {
    for message in session.messages.iter_mut().filter(|m| m.is_streaming()) {
        tracing::debug!("finishing stale reply {} in {}", message.id, session.id);
        if message.content.is_empty() {
            message.content = INTERRUPTED_REPLY.to_string();
        }
        message.finish();
    }
}

fn read_document(path: &Path) -> Result<Option<String>, PersistenceError> {
    if !path.exists() {
        tracing::debug!("{} not found, using defaults", path_display(path));
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|source| PersistenceError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let wrap = |source: Box<dyn StdError + Send + Sync>| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(|err| wrap(Box::new(err)))?;
    }

    let contents = serde_json::to_string(value).map_err(|err| wrap(Box::new(err)))?;
    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(|err| wrap(Box::new(err)))?;

    temp_file
        .write_all(contents.as_bytes())
        .map_err(|err| wrap(Box::new(err)))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|err| wrap(Box::new(err)))?;
    temp_file
        .persist(path)
        .map_err(|err| wrap(Box::new(err.error)))?;
    Ok(())
}
