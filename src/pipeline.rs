//! Render pipeline
//!
//! One [`PreviewSession`] backs one preview surface. Each call to
//! [`PreviewSession::render`] is a complete pass: revoke the previous pass's
//! handles, classify, transpile, resolve, synthesize. Passes run synchronously
//! on the caller's thread and `render` takes `&mut self`, so two passes can
//! never overlap.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{classify, RenderMode};
use crate::config::PreviewConfig;
use crate::document::{diagnostic_document, placeholder_document, synthesize_document};
use crate::error::{PreviewError, Result};
use crate::markdown::render_markdown_document;
use crate::project::{FileKind, ProjectSnapshot};
use crate::resolve::resolve_modules;
use crate::resources::{HandleRegistry, MemoryResourceHost, ResourceHost};
use crate::sandbox::{frame_key, Delivery, ErrorChannel, SandboxEvent, SandboxFrame};
use crate::transpile::{transpile_script, wrap_stylesheet, TranspiledModule};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    pub pass: u64,
    pub mode: RenderMode,
    pub document: String,
    pub frame: SandboxFrame,
    /// Why the intended document was replaced by a diagnostic, if it was.
    #[serde(skip)]
    pub diagnostic: Option<PreviewError>,
    /// Project imports that will fail to load inside the sandbox.
    pub unresolved_imports: Vec<String>,
}

/// Transpile every script and wrap every stylesheet, in path order. The first
/// failure aborts the whole project.
pub fn compile_project(
    snapshot: &ProjectSnapshot,
    config: &PreviewConfig,
) -> Result<Vec<TranspiledModule>> {
    let mut modules = Vec::new();
    for file in snapshot.files(config).filter(|f| f.kind.is_loadable()) {
        let module = match file.kind {
            FileKind::Stylesheet => wrap_stylesheet(file.path, file.content)?,
            _ => transpile_script(file.path, file.content, snapshot, config)?,
        };
        modules.push(module);
    }
    Ok(modules)
}

pub struct PreviewSession<H: ResourceHost = MemoryResourceHost> {
    config: PreviewConfig,
    host: H,
    registry: HandleRegistry,
    errors: ErrorChannel,
    pass: u64,
}

impl PreviewSession<MemoryResourceHost> {
    pub fn new(config: PreviewConfig) -> Self {
        Self::with_host(config, MemoryResourceHost::new())
    }
}

impl<H: ResourceHost> PreviewSession<H> {
    pub fn with_host(config: PreviewConfig, host: H) -> Self {
        Self {
            config,
            host,
            registry: HandleRegistry::new(),
            errors: ErrorChannel::new(),
            pass: 0,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Handles held for the most recent pass.
    pub fn live_handles(&self) -> usize {
        self.registry.len()
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Run one render pass. Always yields a document: failures produce a
    /// diagnostic document and leave no handles behind.
    pub fn render(&mut self, snapshot: &ProjectSnapshot, selected: &str) -> RenderOutput {
        self.pass += 1;
        let revoked = self.registry.revoke_all(&mut self.host);
        let key = frame_key(snapshot, selected);

        let mode = classify(selected, snapshot, &self.config);
        debug!(pass = self.pass, revoked, ?mode, selected, "starting render pass");

        let mut diagnostic = None;
        let mut unresolved_imports = Vec::new();

        let document = match mode {
            RenderMode::Placeholder => placeholder_document(),
            RenderMode::Markdown => {
                render_markdown_document(snapshot.get(selected).unwrap_or_default())
            }
            RenderMode::StandaloneMarkup => snapshot.get(selected).unwrap_or_default().to_string(),
            RenderMode::Application => match self.render_application(snapshot, &key) {
                Ok((document, unresolved)) => {
                    unresolved_imports = unresolved;
                    document
                }
                Err(err) => {
                    let dropped = self.registry.revoke_all(&mut self.host);
                    warn!(pass = self.pass, code = err.code(), dropped, "render pass failed: {}", err);
                    let document = diagnostic_document(&err);
                    diagnostic = Some(err);
                    document
                }
            },
        };

        self.errors.begin_pass(self.pass_token(&key));

        info!(
            pass = self.pass,
            ?mode,
            handles = self.registry.len(),
            "render pass complete"
        );

        RenderOutput {
            pass: self.pass,
            mode,
            frame: SandboxFrame::new(self.pass, key, document.clone()),
            document,
            diagnostic,
            unresolved_imports,
        }
    }

    /// Identifies the current pass to the capture script: its first handle,
    /// or the frame key when it holds none.
    fn pass_token(&self, key: &str) -> String {
        self.registry
            .iter()
            .next()
            .map(ToString::to_string)
            .unwrap_or_else(|| key.to_string())
    }

    fn render_application(
        &mut self,
        snapshot: &ProjectSnapshot,
        key: &str,
    ) -> Result<(String, Vec<String>)> {
        let entry_path = self.config.entry_markup_path().to_string();
        let markup = snapshot
            .get(&entry_path)
            .ok_or_else(|| PreviewError::MissingEntryDocument {
                path: entry_path.clone(),
            })?;

        let modules = compile_project(snapshot, &self.config)?;

        let mut unresolved: Vec<String> = Vec::new();
        for module in &modules {
            for specifier in &module.unresolved {
                warn!(importer = %module.path, specifier = %specifier, "import will not resolve in the sandbox");
                if !unresolved.contains(specifier) {
                    unresolved.push(specifier.clone());
                }
            }
        }

        let (import_map, compiled) = resolve_modules(modules, &mut self.registry, &mut self.host);
        debug!(modules = compiled.len(), entries = import_map.len(), "import map built");

        let token = self.pass_token(key);
        let document = synthesize_document(markup, &import_map, &self.config, &token)?;
        Ok((document, unresolved))
    }

    /// Feed a message posted by the sandbox into the error channel.
    pub fn receive_event(&mut self, message: &serde_json::Value) -> Option<Delivery> {
        let event = SandboxEvent::from_message(message)?;
        Some(self.errors.receive(event))
    }

    /// Revoke everything this session still holds.
    pub fn close(&mut self) {
        let revoked = self.registry.revoke_all(&mut self.host);
        if revoked > 0 {
            debug!(revoked, "preview session closed");
        }
    }
}

impl<H: ResourceHost> Drop for PreviewSession<H> {
    fn drop(&mut self) {
        self.close();
    }
}
