use crate::model::Range;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Two operations of one batch cover overlapping ranges. Ranges that only
    /// touch at a boundary point are allowed.
    #[error("Overlapping ranges are not allowed: {first} and {second}")]
    OverlappingRanges { first: Range, second: Range },
}
