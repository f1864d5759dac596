use crate::markup::StrokeId;
use crate::render::RenderError;
use crate::session::OperationId;
use crate::store::{StoreError, StoreOperation};
use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("{operation} failed for {target}")]
    Persistence {
        operation: StoreOperation,
        target: String,
        #[source]
        source: StoreError,
    },
    #[error("deleting markup {stroke_id} failed at {} step(s)", .failures.len())]
    CascadeDelete {
        stroke_id: StrokeId,
        failures: Vec<StoreError>,
    },
    #[error("select or draw a markup first")]
    NoStrokeSelected,
    #[error("no tracked operation {0}")]
    UnknownOperation(OperationId),
    #[error(transparent)]
    Render(#[from] RenderError),
}
