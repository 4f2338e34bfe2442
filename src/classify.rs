//! Source Classifier
//!
//! Picks the render mode for the current selection. Application mode always
//! renders the entry document, whatever file is selected, so the running app
//! stays on screen while any of its sources is edited.

use serde::{Deserialize, Serialize};

use crate::config::PreviewConfig;
use crate::project::{FileKind, ProjectSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    /// Selection is not a file of the project.
    Placeholder,
    Markdown,
    /// A markup file other than the entry document, shown verbatim.
    StandaloneMarkup,
    Application,
}

pub fn classify(selected: &str, snapshot: &ProjectSnapshot, config: &PreviewConfig) -> RenderMode {
    if !snapshot.contains(selected) {
        return RenderMode::Placeholder;
    }

    match FileKind::of(selected, config) {
        FileKind::Documentation => RenderMode::Markdown,
        FileKind::Markup if !is_entry_markup(selected, config) => RenderMode::StandaloneMarkup,
        _ => RenderMode::Application,
    }
}

fn is_entry_markup(path: &str, config: &PreviewConfig) -> bool {
    path.trim_start_matches('/') == config.entry_markup_path()
}
