use miette::Diagnostic;
use thiserror::Error;

/// Failures while loading configuration, the question graph or the string catalogs.
///
/// All of these happen at startup. Routing operations never return a `CoreError`;
/// they use the small typed errors next to the component that raises them.
#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Configuration error")]
    #[diagnostic(
        code(carebridge_core::configuration_error),
        help("Check configuration file at {config_path}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },

    #[error("Failed to load question graph")]
    #[diagnostic(
        code(carebridge_core::graph_load_failed),
        help("Ensure {path} exists and contains a JSON graph definition")
    )]
    GraphLoadFailed {
        path: String,
        #[source]
        cause: LoadError,
    },

    #[error("Invalid question graph: {reason}")]
    #[diagnostic(
        code(carebridge_core::invalid_graph),
        help("Fix node '{node}' in the graph definition")
    )]
    InvalidGraph { node: String, reason: String },

    #[error("Failed to load string catalog")]
    #[diagnostic(
        code(carebridge_core::catalog_load_failed),
        help("Ensure {path} is readable and holds a flat JSON object of strings")
    )]
    CatalogLoadFailed {
        path: String,
        #[source]
        cause: LoadError,
    },

    #[error("Language '{language}' not available")]
    #[diagnostic(
        code(carebridge_core::missing_language),
        help("Available languages: {}", available.join(", "))
    )]
    MissingLanguage {
        language: String,
        available: Vec<String>,
    },

    #[error("String '{id}' missing for language '{language}'")]
    #[diagnostic(
        code(carebridge_core::missing_string),
        help("Add '{id}' to the {language} string catalog")
    )]
    MissingString { language: String, id: String },

    #[error("Finish token collides with a choice")]
    #[diagnostic(
        code(carebridge_core::finish_token_collision),
        help("Rename choice '{label}' of node '{node}' in '{language}' or the finish token")
    )]
    FinishTokenCollision {
        language: String,
        node: String,
        label: String,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Underlying cause of a configuration failure
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(String),
}

/// Underlying cause of a graph or catalog load failure
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_graph(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGraph {
            node: node.into(),
            reason: reason.into(),
        }
    }

    pub fn graph_load_failed(path: &std::path::Path, cause: impl Into<LoadError>) -> Self {
        Self::GraphLoadFailed {
            path: path.display().to_string(),
            cause: cause.into(),
        }
    }

    pub fn catalog_load_failed(path: &std::path::Path, cause: impl Into<LoadError>) -> Self {
        Self::CatalogLoadFailed {
            path: path.display().to_string(),
            cause: cause.into(),
        }
    }

    pub fn missing_language(language: impl Into<String>, available: Vec<String>) -> Self {
        Self::MissingLanguage {
            language: language.into(),
            available,
        }
    }
}
