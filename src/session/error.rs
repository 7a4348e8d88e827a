use thiserror::Error;

use crate::segment::SegmentError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Segment declares {total} parts, relay accepts at most {max}")]
    TooManySegments { total: u32, max: u32 },

    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),
}

pub type SessionResult<T> = Result<T, SessionError>;
