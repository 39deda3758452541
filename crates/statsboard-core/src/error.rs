use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown filter operation: {0}")]
    UnknownOperation(String),

    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("filter on {0} binds no values")]
    EmptyFilter(String),
}
