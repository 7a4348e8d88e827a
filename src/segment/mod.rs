//! SMS segmentation for encoded payloads
//!
//! Payloads longer than one SMS are cut into `ELPART:<index>/<total>:` tagged
//! segments. The `ELINK::` header travels inside the first segment's content.

pub mod error;
pub mod splitter;
pub mod types;

pub use error::{Result, SegmentError};
pub use splitter::{is_multipart, join, split, DEFAULT_MAX_SEGMENT_SIZE};
pub use types::{Segment, SEGMENT_TAG};
