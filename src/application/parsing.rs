//! # Response Interpreter
//!
//! Turns the growing text of a streamed model response into a `StructuredResult`.
//!
//! The buffer is always treated as the complete prefix of the eventual output:
//! every chunk triggers a full re-scan instead of incremental state, because
//! tags straddle chunk boundaries and bodies grow across many chunks. Each
//! section prefers its closed form and falls back to an end-of-buffer closer
//! while it is still streaming, so nothing already shown can disappear.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::domain::types::{Action, ActionKind, ActionStatus, ReasoningStep, StructuredResult};

pub const DEFAULT_ENVELOPE: &str = "response";

const REASONING_TAG: &str = "thinking";
const ACTIONS_TAG: &str = "actions";
const MESSAGE_TAG: &str = "message";

// <step title="...">body</step>, or body running to the end of the buffer
static STEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<step\s+title="([^"]*)"\s*>(.*?)(</step>|$)"#).unwrap()
});

// <action type="..." attrs/> or <action type="..." attrs>body</action>, same fallback
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<action\s+type="([^"]*)"([^>]*?)(?:\s*/>|>(.*?)(</action>|$))"#).unwrap()
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).unwrap());

// Start of a tag that has not finished arriving, e.g. `</act` at the end of the buffer
static DANGLING_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[A-Za-z_]*$").unwrap());

/// Incremental interpreter for one streamed response.
///
/// Call `reset` before reusing it for another response.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    buffer: String,
    state: StructuredResult,
    closing_marker: String,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::with_envelope(DEFAULT_ENVELOPE)
    }

    /// Parser for responses wrapped in `<{envelope}>...</{envelope}>`.
    pub fn with_envelope(envelope: &str) -> Self {
        Self {
            buffer: String::new(),
            state: StructuredResult::default(),
            closing_marker: format!("</{}>", envelope.trim()),
        }
    }

    /// Clears the buffer and the last computed result.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = StructuredResult::default();
    }

    /// Appends `chunk` and returns the freshly recomputed result.
    pub fn add_chunk(&mut self, chunk: &str) -> StructuredResult {
        self.buffer.push_str(chunk);
        self.state = interpret_buffer(&self.buffer, &self.closing_marker);
        self.state.clone()
    }

    /// The last computed result.
    pub fn state(&self) -> &StructuredResult {
        &self.state
    }

    pub fn raw_buffer(&self) -> &str {
        &self.buffer
    }
}

/// Interprets a complete (or partial) response in one go.
pub fn interpret(text: &str) -> StructuredResult {
    interpret_buffer(text, &format!("</{}>", DEFAULT_ENVELOPE))
}

fn interpret_buffer(buffer: &str, closing_marker: &str) -> StructuredResult {
    StructuredResult {
        reasoning: parse_reasoning(buffer),
        actions: parse_actions(buffer),
        message: parse_message(buffer),
        is_complete: buffer.contains(closing_marker),
    }
}

/// A tagged section of the buffer.
enum Section<'a> {
    Absent,
    /// Opened but not yet closed: everything after the opening tag.
    Open(&'a str),
    Closed(&'a str),
}

fn section<'a>(buffer: &'a str, tag: &str) -> Section<'a> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let Some(start) = buffer.find(&open) else {
        return Section::Absent;
    };
    let inner = &buffer[start + open.len()..];
    match inner.find(&close) {
        Some(end) => Section::Closed(&inner[..end]),
        None => Section::Open(inner),
    }
}

fn hold_back_dangling_tag(text: &str) -> &str {
    match DANGLING_TAG_RE.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

fn parse_reasoning(buffer: &str) -> Vec<ReasoningStep> {
    let (body, section_closed) = match section(buffer, REASONING_TAG) {
        Section::Absent => return Vec::new(),
        Section::Open(body) => (body, false),
        Section::Closed(body) => (body, true),
    };

    STEP_RE
        .captures_iter(body)
        .map(|caps| {
            let step_closed = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
            let raw = caps.get(2).map_or("", |m| m.as_str());
            let content = if step_closed || section_closed {
                raw
            } else {
                hold_back_dangling_tag(raw)
            };
            ReasoningStep {
                title: decode_entities(caps[1].trim()),
                content: content.trim().to_string(),
            }
        })
        .collect()
}

fn parse_actions(buffer: &str) -> Vec<Action> {
    let (body, section_closed) = match section(buffer, ACTIONS_TAG) {
        Section::Absent => return Vec::new(),
        Section::Open(body) => (body, false),
        Section::Closed(body) => (body, true),
    };

    ACTION_RE
        .captures_iter(body)
        .map(|caps| build_action(&caps, section_closed))
        .collect()
}

fn build_action(caps: &Captures<'_>, section_closed: bool) -> Action {
    let self_closing = caps.get(3).is_none();
    let action_closed = self_closing || caps.get(4).is_some_and(|m| !m.as_str().is_empty());
    let complete = action_closed || section_closed;

    let raw_body = caps.get(3).map_or("", |m| m.as_str());
    let body = if complete {
        raw_body
    } else {
        hold_back_dangling_tag(raw_body)
    }
    .trim();

    let mut action = Action::new(ActionKind::parse(&caps[1]));
    action.status = if complete {
        ActionStatus::Completed
    } else {
        ActionStatus::InProgress
    };
    if !body.is_empty() {
        action.content = Some(body.to_string());
    }

    let attrs = caps.get(2).map_or("", |m| m.as_str());
    for attr in ATTR_RE.captures_iter(attrs) {
        let value = decode_entities(&attr[2]);
        match &attr[1] {
            "path" => action.path = Some(value),
            "lines" => action.lines = Some(value),
            "command" => action.command = Some(value),
            "query" => action.query = Some(value),
            "url" => action.url = Some(value),
            "timeout" => action.timeout = value.trim().parse().ok(),
            "recursive" => action.recursive = value.trim() == "true",
            "target" => action.target = Some(value),
            "source" => action.source = Some(value),
            "message" => action.message = Some(value),
            "steps" => action.steps = value.trim().parse().ok(),
            other => tracing::debug!("Ignoring unknown action attribute `{}`", other),
        }
    }

    action
}

fn parse_message(buffer: &str) -> String {
    match section(buffer, MESSAGE_TAG) {
        Section::Absent => String::new(),
        Section::Open(rest) => dedent(hold_back_dangling_tag(rest)),
        Section::Closed(inner) => dedent(inner),
    }
}

/// Strips the indentation shared by all non-blank lines, then trims.
///
/// Keeps markdown renderers from reading markup indentation as a code block.
pub fn dedent(text: &str) -> String {
    let min_indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min();

    let min_indent = match min_indent {
        Some(0) | None => return text.trim().to_string(),
        Some(n) => n,
    };

    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                let offset = line
                    .char_indices()
                    .nth(min_indent)
                    .map_or(line.len(), |(i, _)| i);
                &line[offset..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
