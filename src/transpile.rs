//! Transpiler Adapter
//!
//! Turns project scripts into ES modules the sandbox can load directly, with
//! one fixed preset: TypeScript erasure plus the automatic JSX runtime.
//! Stylesheets become small modules that install themselves into `<head>`.
//!
//! Project specifiers are normalized before transformation. A relative import
//! only works from a real URL, and the sandbox loads modules from opaque
//! handles, so `./Button` inside `components/App.tsx` is rewritten to
//! `/components/Button.tsx`, the key the import map registers.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ExportAllDeclaration, ExportNamedDeclaration, Expression, ImportDeclaration,
    ImportExpression, StringLiteral,
};
use oxc_ast_visit::{walk, Visit};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{JsxRuntime, TransformOptions, Transformer};
use std::path::Path;

use crate::config::PreviewConfig;
use crate::error::{PreviewError, Result};
use crate::project::{extension, FileKind, ProjectSnapshot};
use crate::resolve::is_external_specifier;

/// Extensions tried, in order, for a project specifier written without one.
pub const RESOLVE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mjs", "css"];

/// Output of the adapter for one file, before it gets a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspiledModule {
    pub path: String,
    pub kind: FileKind,
    pub code: String,
    /// Specifiers that will not resolve inside the sandbox.
    pub unresolved: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPTS
// ═══════════════════════════════════════════════════════════════════════════════

fn source_type_for(path: &str) -> SourceType {
    let base = SourceType::default().with_module(true);
    match extension(path).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("ts") => base.with_typescript(true),
        Some("js") | Some("jsx") | Some("mjs") => base.with_jsx(true),
        // tsx and configured component extensions
        _ => base.with_typescript(true).with_jsx(true),
    }
}

fn transpile_failure(path: &str, messages: Vec<String>) -> PreviewError {
    PreviewError::TranspileFailure {
        path: path.to_string(),
        message: messages.join("\n"),
    }
}

/// Transpile one script or component file.
pub fn transpile_script(
    path: &str,
    source: &str,
    snapshot: &ProjectSnapshot,
    config: &PreviewConfig,
) -> Result<TranspiledModule> {
    let source_type = source_type_for(path);
    let (normalized, unresolved) =
        normalize_specifiers(path, source, source_type, snapshot, config)?;

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &normalized, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(transpile_failure(
            path,
            ret.errors.iter().map(|e| e.to_string()).collect(),
        ));
    }
    let mut program = ret.program;

    // Early errors (redeclarations, misplaced `await`, ...) fail the file just
    // like parse errors.
    let ret = SemanticBuilder::new()
        .with_check_syntax_error(true)
        .build(&program);
    if !ret.errors.is_empty() {
        return Err(transpile_failure(
            path,
            ret.errors.iter().map(|e| e.to_string()).collect(),
        ));
    }
    let scoping = ret.semantic.into_scoping();

    let mut options = TransformOptions::default();
    options.jsx.runtime = JsxRuntime::Automatic;

    let ret = Transformer::new(&allocator, Path::new(path), &options)
        .build_with_scoping(scoping, &mut program);
    if !ret.errors.is_empty() {
        return Err(transpile_failure(
            path,
            ret.errors.iter().map(|e| e.to_string()).collect(),
        ));
    }

    let code = Codegen::new().build(&program).code;

    Ok(TranspiledModule {
        path: path.to_string(),
        kind: FileKind::Script,
        code,
        unresolved,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPECIFIER NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Collects every statically known module specifier with its span
/// (quotes included).
#[derive(Default)]
struct SpecifierCollector {
    found: Vec<(u32, u32, String)>,
}

impl SpecifierCollector {
    fn push(&mut self, lit: &StringLiteral) {
        self.found
            .push((lit.span.start, lit.span.end, lit.value.to_string()));
    }
}

impl<'a> Visit<'a> for SpecifierCollector {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        self.push(&it.source);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        self.push(&it.source);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &it.source {
            self.push(source);
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &it.source {
            self.push(lit);
        }
        walk::walk_import_expression(self, it);
    }
}

/// Rewrite project specifiers in `source` to their import map keys.
/// Returns the rewritten text and the specifiers that will not resolve.
fn normalize_specifiers(
    path: &str,
    source: &str,
    source_type: SourceType,
    snapshot: &ProjectSnapshot,
    config: &PreviewConfig,
) -> Result<(String, Vec<String>)> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(transpile_failure(
            path,
            ret.errors.iter().map(|e| e.to_string()).collect(),
        ));
    }

    let mut collector = SpecifierCollector::default();
    collector.visit_program(&ret.program);

    let mut replacements: Vec<(u32, u32, String)> = Vec::new();
    let mut unresolved = Vec::new();

    for (start, end, specifier) in collector.found {
        match resolve_project_specifier(path, &specifier, snapshot) {
            Some(resolved) => {
                let loadable = snapshot.contains(&resolved)
                    && FileKind::of(&resolved, config).is_loadable();
                if !loadable && !unresolved.contains(&resolved) {
                    unresolved.push(resolved.clone());
                }
                if resolved != specifier {
                    replacements.push((start, end, serde_json::to_string(&resolved)?));
                }
            }
            None => {
                if !is_external_specifier(&specifier) && !unresolved.contains(&specifier) {
                    unresolved.push(specifier);
                }
            }
        }
    }

    // Sort reverse to apply safely
    replacements.sort_by(|a, b| b.0.cmp(&a.0));

    let mut result = source.to_string();
    for (start, end, replacement) in replacements {
        result.replace_range((start as usize)..(end as usize), &replacement);
    }

    Ok((result, unresolved))
}

/// Map a project specifier (relative or root-relative) to its root-relative
/// import map key. Bare package specifiers return `None`.
pub fn resolve_project_specifier(
    importer: &str,
    specifier: &str,
    snapshot: &ProjectSnapshot,
) -> Option<String> {
    let candidate = if specifier.starts_with("./") || specifier.starts_with("../") {
        let dir = match importer.trim_start_matches('/').rfind('/') {
            Some(idx) => &importer.trim_start_matches('/')[..idx],
            None => "",
        };
        join_path(dir, specifier)
    } else if specifier.starts_with('/') {
        join_path("", specifier)
    } else {
        return None;
    };

    if snapshot.contains(&candidate) {
        return Some(candidate);
    }
    for ext in RESOLVE_EXTENSIONS {
        let with_ext = format!("{}.{}", candidate, ext);
        if snapshot.contains(&with_ext) {
            return Some(with_ext);
        }
    }
    for ext in RESOLVE_EXTENSIONS {
        let index = format!("{}/index.{}", candidate.trim_end_matches('/'), ext);
        if snapshot.contains(&index) {
            return Some(index);
        }
    }
    Some(candidate)
}

/// Join `specifier` onto `dir` and collapse `.` and `..` segments. The result
/// always starts with `/`; `..` never climbs above the project root.
fn join_path(dir: &str, specifier: &str) -> String {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLESHEETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Id of the `<style>` element a stylesheet module owns.
pub fn style_element_id(path: &str) -> String {
    let sanitized: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("style-{}", sanitized)
}

/// Wrap raw CSS in a module that creates or replaces its style element.
pub fn wrap_stylesheet(path: &str, css: &str) -> Result<TranspiledModule> {
    let code = format!(
        "const css = {css};\n\
         const styleTagId = {id};\n\
         let style = document.getElementById(styleTagId);\n\
         if (!style) {{\n\
         \x20 style = document.createElement('style');\n\
         \x20 style.id = styleTagId;\n\
         \x20 document.head.appendChild(style);\n\
         }}\n\
         style.textContent = css;\n",
        css = serde_json::to_string(css)?,
        id = serde_json::to_string(&style_element_id(path))?,
    );

    Ok(TranspiledModule {
        path: path.to_string(),
        kind: FileKind::Stylesheet,
        code,
        unresolved: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ProjectSnapshot {
        ProjectSnapshot::new()
            .with_file("index.tsx", "")
            .with_file("components/App.tsx", "")
            .with_file("components/Button.tsx", "")
            .with_file("lib/index.ts", "")
            .with_file("styles.css", "")
            .with_file("metadata.json", "{}")
    }

    #[test]
    fn test_erases_types_and_lowers_jsx() {
        let source = r#"
            type Props = { name: string };
            const Greeting = ({ name }: Props) => <h1>Hello, {name}</h1>;
            export default Greeting;
        "#;
        let module =
            transpile_script("App.tsx", source, &snapshot(), &PreviewConfig::default()).unwrap();
        assert!(module.code.contains("react/jsx-runtime"));
        assert!(!module.code.contains("type Props"));
        assert!(!module.code.contains(": Props"));
        assert!(!module.code.contains("<h1>"));
    }

    #[test]
    fn test_plain_typescript() {
        let source = "export function add(a: number, b: number): number { return a + b; }";
        let module =
            transpile_script("math.ts", source, &snapshot(), &PreviewConfig::default()).unwrap();
        assert!(module.code.contains("export function add(a, b)"));
    }

    #[test]
    fn test_syntax_error_fails() {
        let err = transpile_script(
            "index.tsx",
            "const App = () => { return <div>;",
            &snapshot(),
            &PreviewConfig::default(),
        )
        .unwrap_err();
        match err {
            PreviewError::TranspileFailure { path, message } => {
                assert_eq!(path, "index.tsx");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_early_errors_fail() {
        for source in [
            "let a = 1;\nlet a = 2;\nconsole.log(a);",
            "const b = 1;\nfunction b() {}",
        ] {
            let err = transpile_script("index.tsx", source, &snapshot(), &PreviewConfig::default())
                .unwrap_err();
            assert!(
                matches!(err, PreviewError::TranspileFailure { ref path, .. } if path == "index.tsx"),
                "{} was accepted",
                source
            );
        }
    }

    #[test]
    fn test_resolve_project_specifier() {
        let s = snapshot();
        assert_eq!(
            resolve_project_specifier("components/App.tsx", "./Button", &s).as_deref(),
            Some("/components/Button.tsx")
        );
        assert_eq!(
            resolve_project_specifier("components/App.tsx", "../styles.css", &s).as_deref(),
            Some("/styles.css")
        );
        assert_eq!(
            resolve_project_specifier("index.tsx", "./lib", &s).as_deref(),
            Some("/lib/index.ts")
        );
        assert_eq!(
            resolve_project_specifier("index.tsx", "/components/App.tsx", &s).as_deref(),
            Some("/components/App.tsx")
        );
        assert_eq!(
            resolve_project_specifier("index.tsx", "./missing", &s).as_deref(),
            Some("/missing")
        );
        assert_eq!(
            resolve_project_specifier("index.tsx", "../../../index.tsx", &s).as_deref(),
            Some("/index.tsx")
        );
        assert_eq!(resolve_project_specifier("index.tsx", "react", &s), None);
    }

    #[test]
    fn test_specifiers_are_rewritten() {
        let source = r#"
            import App from './components/App';
            import './styles.css';
            export { Button } from './components/Button';
            const lazy = () => import('./lib');
            console.log(App, lazy);
        "#;
        let module =
            transpile_script("index.tsx", source, &snapshot(), &PreviewConfig::default()).unwrap();
        assert!(module.code.contains("\"/components/App.tsx\""));
        assert!(module.code.contains("\"/styles.css\""));
        assert!(module.code.contains("\"/components/Button.tsx\""));
        assert!(module.code.contains("\"/lib/index.ts\""));
        assert!(module.unresolved.is_empty());
    }

    #[test]
    fn test_unresolved_specifiers_are_reported() {
        let source = r#"
            import React from 'react';
            import _ from 'lodash';
            import Missing from './Missing';
            import data from './metadata.json';
            console.log(React, _, Missing, data);
        "#;
        let module =
            transpile_script("index.tsx", source, &snapshot(), &PreviewConfig::default()).unwrap();
        assert_eq!(
            module.unresolved,
            vec![
                "lodash".to_string(),
                "/Missing".to_string(),
                "/metadata.json".to_string()
            ]
        );
    }

    #[test]
    fn test_wrap_stylesheet() {
        let module = wrap_stylesheet("styles/app.css", "body { content: \"`${x}`\"; }").unwrap();
        assert_eq!(module.kind, FileKind::Stylesheet);
        assert!(module.code.contains("\"style-styles-app-css\""));
        assert!(module.code.contains(r#"const css = "body { content: \"`${x}`\"; }";"#));
        assert!(module.code.contains("style.textContent = css;"));
    }
}
