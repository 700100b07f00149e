use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A 1-based (line, column) location in the model.
///
/// Columns count UTF-16 code units, so the valid columns of a line are
/// `1..=len + 1` where `len` is the line's UTF-16 length. Ordering is
/// lexicographic: line first, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line_number: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line_number: usize, column: usize) -> Self {
        Self {
            line_number,
            column,
        }
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self < other
    }

    pub fn is_before_or_equal(&self, other: &Position) -> bool {
        self <= other
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line_number, self.column)
    }
}

/// An ordered pair of positions, `start <= end`.
///
/// Constructors normalise reversed input, so a `Range` never has its end
/// before its start. Empty ranges (`start == end`) are valid and are how
/// insertion points are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(
        start_line_number: usize,
        start_column: usize,
        end_line_number: usize,
        end_column: usize,
    ) -> Self {
        Self::from_positions(
            Position::new(start_line_number, start_column),
            Position::new(end_line_number, end_column),
        )
    }

    pub fn from_positions(a: Position, b: Position) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    /// Empty range at `position`
    pub fn empty_at(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn is_single_line(&self) -> bool {
        self.start.line_number == self.end.line_number
    }

    pub fn contains_position(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    /// True if the two ranges share at least one position (touching counts).
    pub fn intersects(&self, other: &Range) -> bool {
        !(self.end < other.start || other.end < self.start)
    }

    /// Order by start position, then by end position.
    pub fn compare_using_starts(&self, other: &Range) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.end.cmp(&other.end))
    }

    /// Order by end position, then by start position.
    pub fn compare_using_ends(&self, other: &Range) -> Ordering {
        self.end
            .cmp(&other.end)
            .then_with(|| self.start.cmp(&other.start))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} -> {},{}]",
            self.start.line_number, self.start.column, self.end.line_number, self.end.column
        )
    }
}

/// A cursor selection: the `anchor` is where the selection started and
/// `active` is where the caret currently is. Collapsed when both are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub fn new(anchor: Position, active: Position) -> Self {
        Self { anchor, active }
    }

    pub fn collapsed(position: Position) -> Self {
        Self::new(position, position)
    }

    pub fn range(&self) -> Range {
        Range::from_positions(self.anchor, self.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_normalises_reversed_positions() {
        let range = Range::new(3, 4, 1, 2);
        assert_eq!(range.start, Position::new(1, 2));
        assert_eq!(range.end, Position::new(3, 4));
    }

    #[test]
    fn test_position_ordering_is_lexicographic() {
        assert!(Position::new(1, 10).is_before(&Position::new(2, 1)));
        assert!(Position::new(2, 1).is_before(&Position::new(2, 2)));
        assert!(Position::new(2, 2).is_before_or_equal(&Position::new(2, 2)));
    }

    #[test]
    fn test_intersects_counts_touching_ranges() {
        let a = Range::new(1, 1, 1, 5);
        let b = Range::new(1, 5, 2, 1);
        let c = Range::new(1, 6, 2, 1);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_compare_using_starts_then_ends() {
        let short = Range::new(1, 1, 1, 2);
        let long = Range::new(1, 1, 3, 1);
        assert_eq!(short.compare_using_starts(&long), Ordering::Less);
        assert_eq!(long.compare_using_starts(&short), Ordering::Greater);
        assert_eq!(short.compare_using_starts(&short), Ordering::Equal);
    }

    #[test]
    fn test_compare_using_ends_puts_empty_before_range_ending_later() {
        let insert = Range::new(1, 3, 1, 3);
        let replace = Range::new(1, 3, 1, 6);
        assert_eq!(insert.compare_using_ends(&replace), Ordering::Less);
    }

    #[test]
    fn test_selection_range_is_ordered() {
        let selection = Selection::new(Position::new(2, 5), Position::new(1, 1));
        assert_eq!(selection.range(), Range::new(1, 1, 2, 5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Range::new(1, 2, 3, 4).to_string(), "[1,2 -> 3,4]");
        assert_eq!(Position::new(7, 1).to_string(), "(7,1)");
    }
}
