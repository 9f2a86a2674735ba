//! Engine-level semantic errors.

use thiserror::Error;

use crate::diag::SourcePos;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("an alphabet of non-regular kind cannot be assigned")]
    NonRegularAlphabet,

    #[error("an explicit alphabet must not be empty")]
    EmptyAlphabet,

    #[error("{name} is already defined")]
    Duplicate { name: String },

    #[error("unable to resolve {name}")]
    Unresolved { name: String, pos: SourcePos },

    #[error("{name} expects {expected} argument(s), {got} given")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        pos: SourcePos,
    },
}
