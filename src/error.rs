use thiserror::Error;

/// All errors that can escape the scrobble-sync library.
///
/// Collaborator failures (search, popularity, submission, history fetch)
/// never show up here; they are logged and counted by the engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Refusing to write {0}")]
    UnsafePath(String),

    #[error("No search provider available, but the configuration requires canonical matching")]
    NoSearchProvider,
}

pub type Result<T> = std::result::Result<T, Error>;
