//! Markdown Rendering mode
//!
//! Documentation files are shown as a plain styled page: no scripts, no import
//! table, no instrumentation.

use lazy_static::lazy_static;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;

/// Fixed stylesheet for rendered documentation.
pub const MARKDOWN_STYLE: &str = "body{font-family:-apple-system,BlinkMacSystemFont,\"Segoe UI\",\"Noto Sans\",Helvetica,Arial,sans-serif;line-height:1.6;padding:2em 4em;background-color:#fff;color:#24292e;margin:0;}\
h1,h2,h3,h4,h5,h6{margin-top:24px;margin-bottom:16px;font-weight:600;line-height:1.25;border-bottom:1px solid #eaecef;padding-bottom:.3em;}\
code{font-family:\"SFMono-Regular\",Consolas,\"Liberation Mono\",Menlo,Courier,monospace;background-color:rgba(27,31,35,.05);border-radius:6px;padding:.2em .4em;font-size:85%;}\
pre{padding:16px;overflow:auto;font-size:85%;line-height:1.45;background-color:#f6f8fa;border-radius:6px;word-wrap:normal;}\
pre code{padding:0;margin:0;background-color:transparent;border:0;display:inline;overflow:visible;line-height:inherit;word-wrap:normal;}\
blockquote{padding:0 1em;color:#6a737d;border-left:.25em solid #dfe2e5;margin-left:0;}\
table{border-collapse:collapse;display:block;width:100%;overflow:auto;}\
tr{background-color:#fff;border-top:1px solid #c6cbd1;}\
tr:nth-child(2n){background-color:#f6f8fa;}\
th,td{border:1px solid #dfe2e5;padding:6px 13px;}\
img{max-width:100%;}";

lazy_static! {
    static ref SCRIPT_TAG_RE: Regex = Regex::new(r"(?i)<\s*/?\s*script\b").unwrap();
}

/// Convert markdown to an HTML fragment. Raw HTML containing script tags is
/// emitted as escaped text.
pub fn markdown_to_html(source: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(source, opts).map(|event| match event {
        Event::Html(raw) if SCRIPT_TAG_RE.is_match(&raw) => Event::Text(raw),
        Event::InlineHtml(raw) if SCRIPT_TAG_RE.is_match(&raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Full document for a documentation file.
pub fn render_markdown_document(source: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\"><style>{}</style></head><body>{}</body></html>",
        MARKDOWN_STYLE,
        markdown_to_html(source)
    )
}
