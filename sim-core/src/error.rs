use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GrowthError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GrowthError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("invalid config: {field} = {value}")]
    InvalidConfig { field: &'static str, value: f32 },
    #[error("unknown branch {0}")]
    UnknownBranch(NodeId),
}

pub(crate) fn geometry(msg: impl Into<String>) -> GrowthError {
    GrowthError::InvalidGeometry(msg.into())
}
