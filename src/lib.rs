//! # Live Preview Pipeline
//!
//! Turns an in-memory project (path → text) plus a selected path into a
//! self-contained HTML document that runs inside a sandboxed browsing context.
//!
//! ## Render Pass
//!
//! 1. **Revoke**: every handle issued by the previous pass is revoked first.
//! 2. **Classify**: the selected path picks one of four modes
//!    (placeholder, markdown, standalone markup, application).
//! 3. **Transpile**: in application mode every script is lowered to plain ESM
//!    and every stylesheet is wrapped in a style-injecting module.
//! 4. **Resolve**: each compiled module gets a transient handle; the import
//!    map pins externals and maps every project path to its handle.
//! 5. **Synthesize**: the entry document gets the import map, an error-capture
//!    script and a loader module in place of its entry script tag.
//!
//! ## Invariants
//!
//! - A pass always yields a document. Failures become diagnostic documents.
//! - After a pass, the live handles are exactly the ones that pass issued.
//!   A failed pass leaves none.
//! - Errors raised inside the sandbox reach the host as messages; only the
//!   first one per pass is shown.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod classify;
mod config;
mod document;
mod error;
mod markdown;
mod pipeline;
mod project;
mod resolve;
mod resources;
mod sandbox;
mod starter;
mod transpile;

#[cfg(feature = "napi")]
mod native;


pub use classify::{classify, RenderMode};
pub use config::PreviewConfig;
pub use document::{diagnostic_document, placeholder_document, synthesize_document};
pub use error::{PreviewError, Result};
pub use markdown::{markdown_to_html, render_markdown_document};
pub use pipeline::{compile_project, PreviewSession, RenderOutput};
pub use project::{FileChange, FileKind, FileSystemNode, ProjectFile, ProjectSnapshot};
pub use resolve::{resolve_modules, CompiledModule, ImportMap, EXTERNAL_IMPORTS};
pub use resources::{HandleRegistry, MemoryResourceHost, ResourceHandle, ResourceHost};
pub use sandbox::{
    sandbox_attribute, Delivery, ErrorChannel, SandboxEvent, SandboxEventKind, SandboxFrame,
    SANDBOX_ALLOW, SANDBOX_DENY,
};
pub use starter::{default_project, STARTER_SELECTION};
pub use transpile::{transpile_script, wrap_stylesheet, TranspiledModule};

#[cfg(feature = "napi")]
pub use native::NativePreview;

#[cfg(feature = "napi")]
#[napi]
pub fn compile_bridge() -> String {
    "Live Preview Native Bridge Connected".to_string()
}
