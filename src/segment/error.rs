use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("Malformed segment tag: {0}")]
    MalformedSegmentTag(String),

    #[error("Incomplete segment set: missing {missing:?} of {total}")]
    IncompleteSet { missing: Vec<u32>, total: u32 },

    #[error("Invalid segment size: {0}")]
    InvalidSegmentSize(usize),
}

pub type Result<T> = std::result::Result<T, SegmentError>;
