//! Markdown rendering of transcripts.

use chatlog_capture::{Message, MessageType};

use crate::{ExportError, Result};

const OPERATOR_CHARS: [char; 4] = ['=', '!', '<', '>'];

/// Break after sentence-ending punctuation followed by whitespace.
///
/// Punctuation that is part of an operator (`!=`, `<=`, `?>` and the like)
/// is left alone: a break needs a non-operator char before the mark and
/// a non-operator char after the whitespace.
pub fn format_for_markdown(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let ends_sentence = matches!(c, '.' | '!' | '?')
            && (i == 0 || !OPERATOR_CHARS.contains(&chars[i - 1]));
        if ends_sentence {
            let mut end = i + 1;
            while end < chars.len() && chars[end].is_whitespace() {
                end += 1;
            }
            let mut run = end - (i + 1);
            // Leave one space in front of an operator.
            if run > 0 && end < chars.len() && OPERATOR_CHARS.contains(&chars[end]) {
                run -= 1;
            }
            if run > 0 {
                out.push(c);
                out.push_str("\n\n");
                i += 1 + run;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// The user-only log, one section per question.
pub fn render_questions(user_log: &[Message]) -> Result<String> {
    if user_log.is_empty() {
        return Err(ExportError::NoData);
    }
    let mut md = String::from("# Today's Questions\n\n");
    for message in user_log {
        md.push_str(&format!("## {}\n\n", message.time));
        md.push_str(&format_for_markdown(&message.text));
        md.push_str("\n\n");
    }
    Ok(md)
}

/// The interleaved log. A heading is written only when the speaker changes.
pub fn render_full_conversation(full_log: &[Message]) -> Result<String> {
    if full_log.is_empty() {
        return Err(ExportError::NoData);
    }
    let mut md = String::from("# Full Conversation\n\n");
    let mut previous: Option<MessageType> = None;
    for message in full_log {
        if previous != Some(message.kind) {
            previous = Some(message.kind);
            let heading = match message.kind {
                MessageType::User => "My Question",
                MessageType::Assistant => "Assistant Answer",
            };
            md.push_str(&format!("## {} ({})\n\n", heading, message.time));
        }
        md.push_str(&format_for_markdown(&message.text));
        md.push_str(match message.kind {
            MessageType::User => "\n\n",
            MessageType::Assistant => "\n\n\n",
        });
    }
    Ok(md)
}
