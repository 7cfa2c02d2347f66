/// Core error type shared by the relay crates.
///
/// Adapter crates map their transport-specific failures into this type so the
/// dispatcher can log and render them to the user consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status code {status} from url \"{url}\"")]
    Status { status: u16, url: String },

    #[error("body of url \"{0}\" is not JSON")]
    Format(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("telegram API returned !ok: {0}")]
    Telegram(String),

    #[error("unsupported value type {kind} for form field {key}")]
    UnsupportedFieldType { key: String, kind: &'static str },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
