//! Transcript export: Markdown rendering of the question log and the full
//! conversation, plus the file naming the popup download uses.

pub mod markdown;
pub mod writer;

pub use markdown::{format_for_markdown, render_full_conversation, render_questions};
pub use writer::{export_filename, render, write_export, ExportKind};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no data")]
    NoData,

    #[error("Store error: {0}")]
    Store(#[from] chatlog_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
