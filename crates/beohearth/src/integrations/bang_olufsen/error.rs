use crate::engine::CommandError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("device returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("value {value} is outside [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("entity {0} does not accept values")]
    NotWritable(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to decode notification: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<Error> for CommandError {
    fn from(e: Error) -> Self {
        match e {
            Error::OutOfRange { .. } | Error::NotWritable(_) => CommandError::Rejected(e.to_string()),
            Error::UnknownEntity(id) => CommandError::UnknownEntity(id),
            Error::Http(_) | Error::Api { .. } | Error::WebSocket(_) | Error::Decode(_) => {
                CommandError::Device(e.to_string())
            }
        }
    }
}
