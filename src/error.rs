// error.rs - Failure taxonomy
//
// Initialization failures disable the effect for the session. Tick
// failures forfeit a single frame. Out-of-range numbers are never errors;
// the channel codec saturates them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FluidError {
    #[error("no rendering context available for the canvas")]
    ContextUnavailable,
    #[error("canvas element `{0}` not found")]
    CanvasNotFound(String),
    #[error("simulation grids have not been allocated")]
    NotAllocated,
    #[error("invalid simulation size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

pub type Result<T, E = FluidError> = std::result::Result<T, E>;
