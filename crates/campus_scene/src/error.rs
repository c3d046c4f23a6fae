#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata root is not a JSON object")]
    NotAnObject,
    #[error("asset load failed: {0}")]
    Asset(String),
}
