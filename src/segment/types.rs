use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SegmentError;

/// Prefix marking a multipart SMS body
pub const SEGMENT_TAG: &str = "ELPART:";

/// One SMS-sized slice of an encoded payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based position
    pub index: u32,
    pub total: u32,
    pub content: String,
}

impl Segment {
    pub fn new(index: u32, total: u32, content: impl Into<String>) -> Result<Self, SegmentError> {
        let segment = Self {
            index,
            total,
            content: content.into(),
        };
        segment.validate()?;
        Ok(segment)
    }

    /// Check `1 <= index <= total`; fields are public, so a segment built
    /// by hand may not hold it
    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.total == 0 {
            return Err(SegmentError::MalformedSegmentTag(
                "total must be at least 1".into(),
            ));
        }
        if self.index == 0 || self.index > self.total {
            return Err(SegmentError::MalformedSegmentTag(format!(
                "index {} outside 1..={}",
                self.index, self.total
            )));
        }
        Ok(())
    }

    /// A payload that fit in one message
    pub fn single(content: impl Into<String>) -> Self {
        Self {
            index: 1,
            total: 1,
            content: content.into(),
        }
    }

    pub fn is_single(&self) -> bool {
        self.total == 1
    }

    /// Render as an SMS body. Single segments go out untagged.
    pub fn to_wire(&self) -> String {
        if self.is_single() {
            self.content.clone()
        } else {
            format!("{SEGMENT_TAG}{}/{}:{}", self.index, self.total, self.content)
        }
    }

    /// Parse an `ELPART:<index>/<total>:<content>` body
    pub fn parse(body: &str) -> Result<Self, SegmentError> {
        let rest = body
            .strip_prefix(SEGMENT_TAG)
            .ok_or_else(|| SegmentError::MalformedSegmentTag("missing ELPART: tag".into()))?;

        // Content is a raw slice of the payload and may contain ':' itself
        let (position, content) = rest
            .split_once(':')
            .ok_or_else(|| SegmentError::MalformedSegmentTag("missing content delimiter".into()))?;

        let (index, total) = position.split_once('/').ok_or_else(|| {
            SegmentError::MalformedSegmentTag(format!("expected <index>/<total>, got {position:?}"))
        })?;

        Self::new(parse_number(index)?, parse_number(total)?, content)
    }
}

impl FromStr for Segment {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

fn parse_number(field: &str) -> Result<u32, SegmentError> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SegmentError::MalformedSegmentTag(format!(
            "non-numeric field {field:?}"
        )));
    }
    field
        .parse()
        .map_err(|_| SegmentError::MalformedSegmentTag(format!("field {field:?} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segment() {
        let segment = Segment::parse("ELPART:2/3:ELINK::AbCd").unwrap();
        assert_eq!(segment.index, 2);
        assert_eq!(segment.total, 3);
        assert_eq!(segment.content, "ELINK::AbCd");
    }

    #[test]
    fn test_parse_keeps_colons_in_content() {
        let segment: Segment = "ELPART:1/2:a:b::c".parse().unwrap();
        assert_eq!(segment.content, "a:b::c");
    }

    #[test]
    fn test_parse_empty_content() {
        let segment = Segment::parse("ELPART:3/3:").unwrap();
        assert_eq!(segment.content, "");
    }

    #[test]
    fn test_parse_rejects_malformed_tags() {
        for body in [
            "ELPART:a/3:xyz",
            "ELPART:1/b:xyz",
            "ELPART:+1/3:xyz",
            "ELPART:0/3:xyz",
            "ELPART:4/3:xyz",
            "ELPART:1/0:xyz",
            "ELPART:13:xyz",
            "ELPART:1/3",
            "ELPART:/:xyz",
            "ELPART:99999999999/99999999999:xyz",
            "ELINK::abc",
        ] {
            assert!(
                matches!(Segment::parse(body), Err(SegmentError::MalformedSegmentTag(_))),
                "{body} should be rejected"
            );
        }
    }

    #[test]
    fn test_wire_format() {
        let segment = Segment::new(1, 2, "ELINK::Ab").unwrap();
        assert_eq!(segment.to_wire(), "ELPART:1/2:ELINK::Ab");
        assert_eq!(Segment::single("ELINK::Ab").to_wire(), "ELINK::Ab");
    }
}
