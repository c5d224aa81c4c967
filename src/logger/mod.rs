//! Conversation log: one JSON Lines file per session.
//!
//! The first line is a [`SessionHeader`]; every following line is a
//! [`ConversationMessage`].

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::Result;
use crate::types::ConversationMessage;

/// Subdirectory of the output path holding session logs.
pub const CONVERSATIONS_DIR: &str = "conversations";

/// First record of every session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub version: String,
    /// Loggable snapshot of the model the session runs against.
    pub model: BTreeMap<String, Value>,
}

/// Append-only writer for one conversation session.
#[derive(Debug)]
pub struct ConversationLogger {
    session_id: Uuid,
    path: PathBuf,
    file: Mutex<File>,
}

impl ConversationLogger {
    /// Start a new session under `<output_path>/conversations/`.
    pub fn new(output_path: impl AsRef<Path>, model: BTreeMap<String, Value>) -> Result<Self> {
        let dir = output_path.as_ref().join(CONVERSATIONS_DIR);
        fs::create_dir_all(&dir)?;

        let session_id = Uuid::new_v4();
        let path = dir.join(format!("{session_id}.jsonl"));
        let mut file = OpenOptions::new().create_new(true).append(true).open(&path)?;

        let header = SessionHeader {
            session_id,
            started_at: Utc::now(),
            version: crate::version_string(),
            model,
        };
        write_line(&mut file, &header)?;
        debug!(session = %session_id, path = %path.display(), "conversation log opened");

        Ok(Self {
            session_id,
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one message.
    pub fn add_message(&self, message: &ConversationMessage) -> Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        write_line(&mut *file, message)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_line<W: Write, T: Serialize>(out: &mut W, record: &T) -> Result<()> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    out.write_all(&line)?;
    out.flush()?;
    Ok(())
}
