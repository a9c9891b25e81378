use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} name must start with '$': {name}")]
    InvalidOperatorName { kind: &'static str, name: String },

    #[error("Invalid sort criterion: {0}")]
    InvalidSortCriterion(String),

    #[error("Invalid sort direction: {0}. Must be 'asc' or 'desc'")]
    InvalidSortDirection(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
