use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot decode {file}: {source}")]
    ImageDecode {
        file: String,
        #[source]
        source: image::ImageError,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service error: {0}")]
    Service(String),

    /// An action was requested before the state it depends on exists.
    #[error("{0}")]
    InvalidSequence(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
