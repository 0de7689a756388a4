use inkbleed_core::{brush::BrushError, field::FieldError, mask::MaskError};

use crate::studio::CanvasId;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// A canvas was used before [`crate::studio::Studio::load`].
    #[error("canvas {0} has not been loaded")]
    NotReady(CanvasId),
    #[error(transparent)]
    Brush(#[from] BrushError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Mask(#[from] MaskError),
    /// The render stage stopped accepting work or dropped a reply.
    #[error("render stage has shut down")]
    StageClosed,
    #[error("failed to start render stage")]
    Spawn(#[source] std::io::Error),
}
