use crate::codec::EncodedPayload;

use super::error::{Result, SegmentError};
use super::types::{Segment, SEGMENT_TAG};

/// Characters of payload carried per SMS (safe margin under the 160 limit)
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = 140;

/// Whether an SMS body uses the multipart tag format
pub fn is_multipart(body: &str) -> bool {
    body.starts_with(SEGMENT_TAG)
}

/// Split a payload into ordered segments of at most `max_segment_size` chars
pub fn split(payload: &str, max_segment_size: usize) -> Result<Vec<Segment>> {
    if max_segment_size == 0 {
        return Err(SegmentError::InvalidSegmentSize(max_segment_size));
    }

    let char_len = payload.chars().count();
    if char_len <= max_segment_size {
        return Ok(vec![Segment::single(payload)]);
    }

    let total = char_len.div_ceil(max_segment_size);
    let total = u32::try_from(total).map_err(|_| SegmentError::InvalidSegmentSize(max_segment_size))?;

    // Byte offsets of every char boundary so slices never cut a code point
    let boundaries: Vec<usize> = payload
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(payload.len()))
        .collect();

    let segments = (0..total)
        .map(|i| {
            let start = boundaries[i as usize * max_segment_size];
            let end = boundaries[((i as usize + 1) * max_segment_size).min(char_len)];
            Segment {
                index: i + 1,
                total,
                content: payload[start..end].to_string(),
            }
        })
        .collect();

    Ok(segments)
}

/// Reassemble segments (in any order) into the original payload
///
/// Every index in `1..=expected_total` must be present. A repeated index
/// keeps the last copy seen.
pub fn join<'a, I>(segments: I, expected_total: u32) -> Result<EncodedPayload>
where
    I: IntoIterator<Item = &'a Segment>,
{
    if expected_total == 0 {
        return Err(SegmentError::MalformedSegmentTag(
            "total must be at least 1".into(),
        ));
    }

    let mut slots: Vec<Option<&str>> = vec![None; expected_total as usize];

    for segment in segments {
        if segment.total != expected_total {
            return Err(SegmentError::MalformedSegmentTag(format!(
                "segment declares total {} but {} expected",
                segment.total, expected_total
            )));
        }
        if segment.index == 0 || segment.index > expected_total {
            return Err(SegmentError::MalformedSegmentTag(format!(
                "index {} outside 1..={}",
                segment.index, expected_total
            )));
        }
        slots[segment.index as usize - 1] = Some(&segment.content);
    }

    let missing: Vec<u32> = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(i, _)| i as u32 + 1)
        .collect();

    if !missing.is_empty() {
        return Err(SegmentError::IncompleteSet {
            missing,
            total: expected_total,
        });
    }

    Ok(EncodedPayload::new(slots.into_iter().flatten().collect::<String>()))
}
