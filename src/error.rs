//! Preview pipeline errors
//!
//! Only the first three variants can end a render pass early. Everything that
//! goes wrong after the document is handed to the sandbox is reported from
//! inside the sandbox through [`crate::sandbox::SandboxEvent`].

use thiserror::Error;

/// Pipeline result type
pub type Result<T> = std::result::Result<T, PreviewError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error("entry document '{path}' not found")]
    MissingEntryDocument { path: String },

    #[error("entry document '{entry}' has no <script type=\"module\" src=\"{script}\"> tag")]
    MissingInjectionPoint { entry: String, script: String },

    #[error("{path}: {message}")]
    TranspileFailure { path: String, message: String },

    #[error("invalid preview config: {0}")]
    InvalidConfig(String),

    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl PreviewError {
    /// Stable code used in logs and by the native bindings.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingEntryDocument { .. } => "MISSING_ENTRY_DOCUMENT",
            Self::MissingInjectionPoint { .. } => "MISSING_INJECTION_POINT",
            Self::TranspileFailure { .. } => "TRANSPILE_FAILURE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Serialize(_) => "SERIALIZE",
        }
    }
}

impl From<serde_json::Error> for PreviewError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

impl From<std::io::Error> for PreviewError {
    fn from(err: std::io::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = PreviewError::MissingInjectionPoint {
            entry: "index.html".to_string(),
            script: "/index.tsx".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "entry document 'index.html' has no <script type=\"module\" src=\"/index.tsx\"> tag"
        );
        assert_eq!(err.code(), "MISSING_INJECTION_POINT");

        let err = PreviewError::TranspileFailure {
            path: "App.tsx".to_string(),
            message: "Unexpected token".to_string(),
        };
        assert_eq!(err.to_string(), "App.tsx: Unexpected token");
    }
}
