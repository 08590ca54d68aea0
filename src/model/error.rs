use crate::store::StoreError;
use crate::transpile::ParseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Invalid model configuration: {0}")]
    Config(String),
}
