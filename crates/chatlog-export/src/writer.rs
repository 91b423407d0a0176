use std::path::{Path, PathBuf};
use std::str::FromStr;

use chatlog_capture::Transcript;
use chatlog_store::KvStore;
use chrono::NaiveDate;
use tracing::info;

use crate::markdown::{render_full_conversation, render_questions};
use crate::{ExportError, Result};

/// Which log an export renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Questions,
    FullConversation,
}

impl ExportKind {
    fn suffix(self) -> &'static str {
        match self {
            ExportKind::Questions => "chatgpt-questions",
            ExportKind::FullConversation => "chatgpt-full-conversation",
        }
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "questions" => Ok(ExportKind::Questions),
            "full" | "full-conversation" => Ok(ExportKind::FullConversation),
            other => Err(format!("unknown export kind: {}", other)),
        }
    }
}

/// `{date}-chatgpt-questions.md` or `{date}-chatgpt-full-conversation.md`.
pub fn export_filename(kind: ExportKind, date: NaiveDate) -> String {
    format!("{}-{}.md", date.format("%Y-%m-%d"), kind.suffix())
}

pub fn render(kind: ExportKind, transcript: &Transcript) -> Result<String> {
    match kind {
        ExportKind::Questions => render_questions(&transcript.user_log),
        ExportKind::FullConversation => render_full_conversation(&transcript.full_log),
    }
}

/// Render the transcript persisted in `store` and write it into `out_dir`,
/// named for `date`. Nothing is written when the log is empty.
pub fn write_export(
    store: &dyn KvStore,
    kind: ExportKind,
    out_dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf> {
    let transcript = Transcript::load(store)?;
    let markdown = render(kind, &transcript)?;

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(export_filename(kind, date));
    std::fs::write(&path, markdown)?;
    info!("Exported {:?} to {}", kind, path.display());
    Ok(path)
}

impl ExportError {
    /// Whether the export failed only because nothing was captured.
    pub fn is_no_data(&self) -> bool {
        matches!(self, ExportError::NoData)
    }
}
