//! Starter project
//!
//! The snapshot a fresh editor opens with: an entry document, a React entry
//! script, project metadata and a few notes to exercise markdown mode.

use crate::project::ProjectSnapshot;

pub const STARTER_SELECTION: &str = "index.tsx";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>My App</title>
    <style>
      body {
        font-family: sans-serif;
        background-color: #222;
        color: white;
        display: flex;
        justify-content: center;
        align-items: center;
        height: 100vh;
        margin: 0;
      }
    </style>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/index.tsx"></script>
  </body>
</html>"#;

const INDEX_TSX: &str = r#"import React from 'react';
import ReactDOM from 'react-dom/client';

const App = () => {
  return <h1>Hello, AI Builder!</h1>;
};

const root = document.getElementById('root');
if (root) {
  ReactDOM.createRoot(root).render(<App />);
}
"#;

const METADATA_JSON: &str = r#"{
  "name": "My New App",
  "description": "A web app created with the AI Web App Builder."
}"#;

const AJAX_NOTES: &str = r#"# AJAX (Asynchronous JavaScript and XML)

AJAX combines the browser's `XMLHttpRequest` object with the DOM to update a
page without reloading it.

## Key Concepts
- **Asynchronous:** the page keeps working while the request is in flight.
- **Event-based:** a callback runs when the request changes state.
"#;

const XHR_NOTES: &str = r#"# XMLHttpRequest (XHR)

`XMLHttpRequest` is the browser API underneath AJAX. It offers progress events
and request timeouts that `fetch()` does not expose directly.

```javascript
const xhr = new XMLHttpRequest();
xhr.open('GET', 'https://api.github.com/users/google', true);
xhr.onload = () => console.log(JSON.parse(xhr.response));
xhr.send();
```
"#;

const FETCH_NOTES: &str = r#"# Fetch API

`fetch()` returns a Promise that resolves to a `Response`. It only rejects on
network failure, so check `response.ok` for HTTP errors.

```javascript
const response = await fetch('https://api.github.com/users/google');
if (!response.ok) throw new Error(`HTTP error! status: ${response.status}`);
console.log(await response.json());
```
"#;

pub fn default_project() -> ProjectSnapshot {
    ProjectSnapshot::new()
        .with_file("index.html", INDEX_HTML)
        .with_file("index.tsx", INDEX_TSX)
        .with_file("metadata.json", METADATA_JSON)
        .with_file("ASYNC/ajax-notes.md", AJAX_NOTES)
        .with_file("ASYNC/xhr-notes.md", XHR_NOTES)
        .with_file("ASYNC/fetch-notes.md", FETCH_NOTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_contents() {
        let project = default_project();
        assert_eq!(project.len(), 6);
        assert!(project.contains(STARTER_SELECTION));
        assert!(project
            .get("index.html")
            .unwrap()
            .contains(r#"<script type="module" src="/index.tsx"></script>"#));
        let metadata: serde_json::Value =
            serde_json::from_str(project.get("metadata.json").unwrap()).unwrap();
        assert_eq!(metadata["name"], "My New App");
    }
}
