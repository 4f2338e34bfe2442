//! # Document Synthesizer
//!
//! Produces the single self-contained document the sandbox loads in
//! application mode, plus the diagnostic documents that replace it when a pass
//! cannot complete.
//!
//! ## Key Invariants
//!
//! 1. **One Injection Point**: the entry document is parsed into a DOM and the
//!    first `<script type="module" src="<entry script>">` element with no inline
//!    content is the injection point. Marker text inside comments, text or other
//!    scripts never matches. No injection point means no document.
//! 2. **Ordered Injection**: the injection point is replaced by the import map
//!    followed by the guarded loader, so the map is in place before the first
//!    module import is resolved.
//! 3. **Capture First**: the error-capture script is the last child of `<head>`,
//!    ahead of every module script, and installs exactly two global listeners.
//! 4. **Single Serialization**: the DOM is serialized once, after all edits.
//! 5. **No Partial Output**: diagnostics are complete documents of their own and
//!    never carry an import map.

use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::Rc;
use tendril::StrTendril;

use crate::config::PreviewConfig;
use crate::error::{PreviewError, Result};
use crate::resolve::ImportMap;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// `source` field of every event the capture script posts to the parent.
pub const EVENT_SOURCE: &str = "live-preview";

/// Global the capture script exposes for the loader.
const REPORT_GLOBAL: &str = "__livePreviewReport";

pub const ERROR_OVERLAY_STYLE: &str = "#error-overlay{position:fixed;top:0;left:0;right:0;bottom:0;background-color:rgba(10,0,0,0.9);color:white;font-family:'Consolas','Menlo',monospace;padding:2rem;z-index:999999;overflow-y:auto;border:4px solid #ff5555;}\
#error-overlay h1{color:#ff5555;font-size:1.5rem;margin-top:0;border-bottom:1px solid #ff5555;padding-bottom:0.5rem;}\
#error-overlay pre{background-color:#1e1e1e;padding:1rem;border-radius:8px;white-space:pre-wrap;word-wrap:break-word;font-size:0.9rem;line-height:1.5;}";

// Tokens: __PASS__, __SOURCE__, __STYLE__, __REPORT__
const ERROR_CAPTURE_TEMPLATE: &str = r#"(() => {
  const pass = __PASS__;
  const overlayStyle = __STYLE__;
  const escapeHtml = (value) => String(value ?? '')
    .replace(/&/g, '&amp;')
    .replace(/</g, '&lt;')
    .replace(/>/g, '&gt;')
    .replace(/"/g, '&quot;')
    .replace(/'/g, '&#039;');
  let reported = false;
  const report = (kind, title, detail) => {
    if (reported || document.getElementById('error-overlay')) return;
    reported = true;
    const text = String(detail ?? '');
    try {
      window.parent.postMessage({ source: __SOURCE__, pass, kind, title, detail: text }, '*');
    } catch (_) {}
    const overlay = document.createElement('div');
    overlay.id = 'error-overlay';
    overlay.innerHTML = '<style>' + overlayStyle + '</style><h1>' + escapeHtml(title) + '</h1><pre>' + escapeHtml(text) + '</pre>';
    (document.body || document.documentElement).appendChild(overlay);
  };
  window.__REPORT__ = report;
  window.addEventListener('error', (event) => {
    report('runtime-error', 'Runtime Error',
      `Message: ${event.message}\nFile: ${event.filename}\nLine: ${event.lineno}, Col: ${event.colno}`);
  });
  window.addEventListener('unhandledrejection', (event) => {
    const reason = event.reason instanceof Error ? (event.reason.stack || event.reason.message) : event.reason;
    report('unhandled-rejection', 'Unhandled Promise Rejection', reason);
  });
})();"#;

// Tokens: __ENTRY__, __REPORT__
const LOADER_TEMPLATE: &str = r#"
try {
  await import(__ENTRY__);
} catch (e) {
  const error = e instanceof Error ? e : new Error(String(e));
  const report = window.__REPORT__;
  if (report) {
    report('import-error', 'Import Error', error.stack || error.message);
  } else {
    console.error(error);
  }
}
"#;

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPT BODIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Escape text for HTML content and attribute values.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// JSON literal that is also safe inside a raw `<script>` element.
fn script_safe_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// `pass_token` identifies the pass in every event the script posts.
pub fn error_capture_script(pass_token: &str) -> Result<String> {
    Ok(ERROR_CAPTURE_TEMPLATE
        .replace("__PASS__", &script_safe_json(pass_token)?)
        .replace("__STYLE__", &script_safe_json(ERROR_OVERLAY_STYLE)?)
        .replace("__SOURCE__", &script_safe_json(EVENT_SOURCE)?)
        .replace("__REPORT__", REPORT_GLOBAL))
}

pub fn loader_script(entry_script: &str) -> Result<String> {
    Ok(LOADER_TEMPLATE
        .replace("__ENTRY__", &script_safe_json(entry_script)?)
        .replace("__REPORT__", REPORT_GLOBAL))
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOM HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn html_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

fn attr_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(local))
}

fn is_element(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, NodeData::Element { name, .. } if (&*name.local).eq_ignore_ascii_case(tag))
}

fn attribute(handle: &Handle, attr: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| (&*a.name.local).eq_ignore_ascii_case(attr))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn has_inline_content(handle: &Handle) -> bool {
    handle.children.borrow().iter().any(|child| match &child.data {
        NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
        _ => true,
    })
}

fn create_script(attrs: &[(&str, &str)], body: &str) -> Handle {
    let script = Node::new(NodeData::Element {
        name: html_name("script"),
        attrs: RefCell::new(
            attrs
                .iter()
                .map(|(name, value)| Attribute {
                    name: attr_name(name),
                    value: StrTendril::from_slice(value),
                })
                .collect(),
        ),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    });
    let text = Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(body)),
    });
    append_child(&script, text);
    script
}

fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Depth-first, document order.
fn find_first(handle: &Handle, pred: &dyn Fn(&Handle) -> bool) -> Option<Handle> {
    if pred(handle) {
        return Some(handle.clone());
    }
    for child in handle.children.borrow().iter() {
        if let Some(found) = find_first(child, pred) {
            return Some(found);
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Parsed entry document with its injection point located.
pub struct DocumentBuilder {
    dom: RcDom,
    injection_point: Handle,
    head: Option<Handle>,
}

impl DocumentBuilder {
    /// Parse `markup` and locate the bootstrap tag for `entry_script`.
    pub fn parse(markup: &str, entry_path: &str, entry_script: &str) -> Result<Self> {
        let dom = parse_document(RcDom::default(), Default::default()).one(markup);

        let is_injection_point = |handle: &Handle| {
            is_element(handle, "script")
                && attribute(handle, "type").is_some_and(|t| t.trim().eq_ignore_ascii_case("module"))
                && attribute(handle, "src").is_some_and(|s| s.trim() == entry_script)
                && !has_inline_content(handle)
        };

        let injection_point = find_first(&dom.document, &is_injection_point).ok_or_else(|| {
            PreviewError::MissingInjectionPoint {
                entry: entry_path.to_string(),
                script: entry_script.to_string(),
            }
        })?;
        let head = find_first(&dom.document, &|h: &Handle| is_element(h, "head"));

        Ok(Self {
            dom,
            injection_point,
            head,
        })
    }

    /// Replace the injection point with `nodes`, in order.
    fn replace_injection_point(&mut self, nodes: Vec<Handle>) -> Result<()> {
        let parent = self
            .injection_point
            .parent
            .take()
            .and_then(|weak| weak.upgrade())
            .ok_or_else(|| PreviewError::Serialize("injection point is detached".to_string()))?;

        let mut children = parent.children.borrow_mut();
        let idx = children
            .iter()
            .position(|c| Rc::ptr_eq(c, &self.injection_point))
            .ok_or_else(|| PreviewError::Serialize("injection point is detached".to_string()))?;

        for node in &nodes {
            node.parent.set(Some(Rc::downgrade(&parent)));
        }
        let _replaced: Vec<Handle> = children.splice(idx..=idx, nodes).collect();
        Ok(())
    }

    /// Append as the last child of `<head>`.
    fn append_to_head(&mut self, node: Handle) {
        match &self.head {
            Some(head) => append_child(head, node),
            // html5ever synthesizes <head> for every document
            None => tracing::warn!("entry document has no <head>, error capture skipped"),
        }
    }

    pub fn serialize(self) -> Result<String> {
        let mut bytes = Vec::new();
        let document: SerializableHandle = self.dom.document.clone().into();
        serialize(&mut bytes, &document, SerializeOpts::default())?;
        String::from_utf8(bytes).map_err(|e| PreviewError::Serialize(e.to_string()))
    }
}

/// Assemble the application document for one pass. The document depends on
/// the pass only through `pass_token` and the handles in `import_map`.
pub fn synthesize_document(
    markup: &str,
    import_map: &ImportMap,
    config: &PreviewConfig,
    pass_token: &str,
) -> Result<String> {
    let mut builder = DocumentBuilder::parse(markup, config.entry_markup_path(), &config.entry_script)?;

    let map_json = import_map.to_json()?.replace("</", "<\\/");
    builder.replace_injection_point(vec![
        create_script(&[("type", "importmap")], &map_json),
        create_script(&[("type", "module")], &loader_script(&config.entry_script)?),
    ])?;

    if config.instrument {
        builder.append_to_head(create_script(&[], &error_capture_script(pass_token)?));
    }

    builder.serialize()
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC DOCUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn placeholder_document() -> String {
    "<html><body>Select a file to preview.</body></html>".to_string()
}

/// Complete document standing in for a pass that failed.
pub fn diagnostic_document(error: &PreviewError) -> String {
    match error {
        PreviewError::MissingEntryDocument { path } => format!(
            "<html><body>Cannot generate preview: <strong>{}</strong> not found.</body></html>",
            escape_html(path)
        ),
        PreviewError::MissingInjectionPoint { entry, script } => format!(
            "<html><body>Cannot inject preview script: <strong>{}</strong> not found in {}.</body></html>",
            escape_html(&format!("<script type=\"module\" src=\"{}\"></script>", script)),
            escape_html(entry)
        ),
        PreviewError::TranspileFailure { .. } => overlay_document("Transform Error", &error.to_string()),
        other => overlay_document("Preview Error", &other.to_string()),
    }
}

fn overlay_document(title: &str, message: &str) -> String {
    format!(
        "<html><head><style>{}</style></head><body><div id=\"error-overlay\"><h1>{}</h1><pre>{}</pre></div></body></html>",
        ERROR_OVERLAY_STYLE,
        escape_html(title),
        escape_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <title>My App</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/index.tsx"></script>
  </body>
</html>"#;

    fn synthesize(markup: &str, config: &PreviewConfig) -> Result<String> {
        synthesize_document(markup, &ImportMap::with_externals(), config, "blob:preview/9/0")
    }

    #[test]
    fn test_injection_replaces_bootstrap_tag() {
        let doc = synthesize(ENTRY, &PreviewConfig::default()).unwrap();
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(!doc.contains(r#"src="/index.tsx""#));
        assert!(doc.contains(r#"<script type="importmap">{"imports":{"react":"#));
        assert!(doc.contains("await import(\"/index.tsx\");"));
        assert!(doc.contains("<div id=\"root\"></div>"));

        let map_at = doc.find("importmap").unwrap();
        let loader_at = doc.find("await import(").unwrap();
        assert!(map_at < loader_at);
    }

    #[test]
    fn test_capture_script_closes_head() {
        let doc = synthesize(ENTRY, &PreviewConfig::default()).unwrap();
        let capture_at = doc.find(r#"const pass = "blob:preview/9/0";"#).unwrap();
        let head_close = doc.find("</head>").unwrap();
        let title_at = doc.find("<title>").unwrap();
        assert!(title_at < capture_at && capture_at < head_close);
        assert_eq!(doc.matches("window.addEventListener(").count(), 2);
        assert!(doc.contains("'unhandledrejection'"));
        assert!(doc.contains("'error'"));
    }

    #[test]
    fn test_instrumentation_can_be_disabled() {
        let config = PreviewConfig {
            instrument: false,
            ..PreviewConfig::default()
        };
        let doc = synthesize(ENTRY, &config).unwrap();
        assert!(!doc.contains("addEventListener"));
        assert!(doc.contains("importmap"));
    }

    #[test]
    fn test_missing_tag_is_fatal() {
        let markup = "<html><head></head><body><script src=\"/index.tsx\"></script></body></html>";
        let err = synthesize(markup, &PreviewConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PreviewError::MissingInjectionPoint {
                entry: "index.html".to_string(),
                script: "/index.tsx".to_string()
            }
        );
    }

    #[test]
    fn test_marker_text_outside_a_tag_is_ignored() {
        let markup = r#"<html><head></head><body>
            <!-- <script type="module" src="/index.tsx"></script> -->
            <pre>&lt;script type="module" src="/index.tsx"&gt;&lt;/script&gt;</pre>
            <script type="module" src="/index.tsx">console.log('inline');</script>
        </body></html>"#;
        assert!(matches!(
            synthesize(markup, &PreviewConfig::default()),
            Err(PreviewError::MissingInjectionPoint { .. })
        ));
    }

    #[test]
    fn test_attribute_order_does_not_matter() {
        let markup = r#"<html><head><script src="/main.view" type="module"></script></head><body></body></html>"#;
        let config = PreviewConfig::default().with_entry("index.html", "/main.view");
        let doc = synthesize(markup, &config).unwrap();
        assert!(doc.contains("await import(\"/main.view\");"));
    }

    #[test]
    fn test_only_first_tag_is_replaced() {
        let markup = r#"<html><head></head><body>
            <script type="module" src="/index.tsx"></script>
            <script type="module" src="/index.tsx"></script>
        </body></html>"#;
        let doc = synthesize(markup, &PreviewConfig::default()).unwrap();
        assert_eq!(doc.matches("importmap").count(), 1);
        assert_eq!(doc.matches(r#"src="/index.tsx""#).count(), 1);
    }

    #[test]
    fn test_closing_tags_in_scripts_are_escaped() {
        let script = loader_script("/a</script>.tsx").unwrap();
        assert!(!script.contains("</script>"));
        assert!(script.contains("<\\/script>"));
    }

    #[test]
    fn test_diagnostic_documents() {
        let doc = diagnostic_document(&PreviewError::MissingEntryDocument {
            path: "index.html".to_string(),
        });
        assert!(doc.contains("<strong>index.html</strong> not found"));
        assert!(!doc.contains("importmap"));

        let doc = diagnostic_document(&PreviewError::MissingInjectionPoint {
            entry: "index.html".to_string(),
            script: "/index.tsx".to_string(),
        });
        assert!(doc.contains("&lt;script type=&quot;module&quot; src=&quot;/index.tsx&quot;&gt;"));

        let doc = diagnostic_document(&PreviewError::TranspileFailure {
            path: "App.tsx".to_string(),
            message: "Unexpected token <div>".to_string(),
        });
        assert!(doc.contains("<h1>Transform Error</h1>"));
        assert!(doc.contains("App.tsx: Unexpected token &lt;div&gt;"));
        assert!(!doc.contains("<script"));
    }
}
