//! Sandboxed Execution Host
//!
//! The pipeline never runs project code itself. It hands a [`SandboxFrame`] to
//! the embedding surface, which loads it into an isolated browsing context, and
//! hears back only through [`SandboxEvent`] messages posted by the injected
//! error-capture script.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::{escape_html, EVENT_SOURCE};
use crate::project::ProjectSnapshot;

// ═══════════════════════════════════════════════════════════════════════════════
// POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Capabilities granted to the preview context. Anything not listed, including
/// top-level navigation and access to the embedding page, stays denied.
pub const SANDBOX_ALLOW: &[&str] = &["allow-scripts", "allow-modals", "allow-same-origin"];

/// Tokens that must never be granted to a preview.
pub const SANDBOX_DENY: &[&str] = &[
    "allow-top-navigation",
    "allow-top-navigation-by-user-activation",
    "allow-top-navigation-to-custom-protocols",
    "allow-popups-to-escape-sandbox",
];

pub fn sandbox_attribute() -> String {
    SANDBOX_ALLOW.join(" ")
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAME
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the embedding surface needs to (re)build the preview context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxFrame {
    /// Changes whenever any input changes. A new key means the old context is
    /// discarded and a fresh one is created; documents are never patched in.
    pub key: String,
    pub pass: u64,
    pub sandbox: String,
    pub title: String,
    pub srcdoc: String,
}

impl SandboxFrame {
    pub fn new(pass: u64, key: String, document: String) -> Self {
        Self {
            key,
            pass,
            sandbox: sandbox_attribute(),
            title: "Preview".to_string(),
            srcdoc: document,
        }
    }

    /// `<iframe>` markup for hosts that embed the preview as HTML.
    pub fn to_iframe_html(&self) -> String {
        format!(
            "<iframe data-preview-key=\"{}\" title=\"{}\" sandbox=\"{}\" srcdoc=\"{}\"></iframe>",
            escape_html(&self.key),
            escape_html(&self.title),
            escape_html(&self.sandbox),
            escape_html(&self.srcdoc)
        )
    }
}

pub fn frame_key(snapshot: &ProjectSnapshot, selected: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot.content_hash().as_bytes());
    hasher.update([0u8]);
    hasher.update(selected.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CHANNEL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxEventKind {
    RuntimeError,
    UnhandledRejection,
    ImportError,
}

/// Message posted by the capture script when project code fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxEvent {
    pub source: String,
    /// Token of the pass whose document raised the event.
    pub pass: String,
    pub kind: SandboxEventKind,
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

impl SandboxEvent {
    pub fn new(pass: &str, kind: SandboxEventKind, title: &str, detail: &str) -> Self {
        Self {
            source: EVENT_SOURCE.to_string(),
            pass: pass.to_string(),
            kind,
            title: title.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Decode a posted message. Messages from anything other than the capture
    /// script are ignored.
    pub fn from_message(message: &serde_json::Value) -> Option<Self> {
        let event: Self = serde_json::from_value(message.clone()).ok()?;
        (event.source == EVENT_SOURCE).then_some(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// First error of the current pass; the overlay shows it.
    Shown,
    /// The current pass already reported an error.
    Suppressed,
    /// Sent by a context that has since been replaced.
    Stale,
}

/// Host-side view of sandbox errors, one pass at a time. A pass is known by
/// its token: the first handle it issued, or the frame key when it issued
/// none.
#[derive(Debug, Default)]
pub struct ErrorChannel {
    pass: String,
    shown: Option<SandboxEvent>,
    suppressed: usize,
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_pass(&mut self, pass: impl Into<String>) {
        if self.suppressed > 0 {
            tracing::debug!(pass = %self.pass, suppressed = self.suppressed, "previous pass hid further errors");
        }
        self.pass = pass.into();
        self.shown = None;
        self.suppressed = 0;
    }

    /// Token of the pass events are currently accepted from.
    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn receive(&mut self, event: SandboxEvent) -> Delivery {
        if event.pass != self.pass {
            tracing::debug!(event_pass = %event.pass, pass = %self.pass, "dropping stale sandbox event");
            return Delivery::Stale;
        }
        if self.shown.is_some() {
            self.suppressed += 1;
            return Delivery::Suppressed;
        }
        tracing::info!(pass = %self.pass, kind = ?event.kind, title = %event.title, "sandbox reported an error");
        self.shown = Some(event);
        Delivery::Shown
    }

    pub fn current(&self) -> Option<&SandboxEvent> {
        self.shown.as_ref()
    }
}
