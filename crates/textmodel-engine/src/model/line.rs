use crate::model::Position;
use crate::model::markers::{MarkerArena, MarkerId, MarkersTracker};
use crate::model::text::{utf16_len, utf16_to_byte};

/// How markers sitting exactly on an edit boundary react to the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerMoveSemantics {
    /// The marker's own stickiness flag decides
    MarkerDefined,
    ForceMove,
    ForceStay,
}

/// A single-line replacement, columns relative to the line before any
/// edit of the same batch is applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LineEdit {
    pub(crate) start_column: usize,
    pub(crate) end_column: usize,
    pub(crate) text: String,
    pub(crate) force_move_markers: bool,
}

/// One line of the model: its text and the markers anchored on it.
#[derive(Debug)]
pub(crate) struct ModelLine {
    line_number: usize,
    text: String,
    len16: usize,
    markers: Vec<MarkerId>,
}

impl ModelLine {
    pub(crate) fn new(line_number: usize, text: String) -> Self {
        let len16 = utf16_len(&text);
        Self {
            line_number,
            text,
            len16,
            markers: Vec::new(),
        }
    }

    pub(crate) fn line_number(&self) -> usize {
        self.line_number
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    /// Length in UTF-16 code units
    pub(crate) fn len16(&self) -> usize {
        self.len16
    }

    pub(crate) fn max_column(&self) -> usize {
        self.len16 + 1
    }

    pub(crate) fn markers(&self) -> &[MarkerId] {
        &self.markers
    }

    fn set_text(&mut self, text: String) {
        self.len16 = utf16_len(&text);
        self.text = text;
    }

    pub(crate) fn add_marker(&mut self, id: MarkerId) {
        self.markers.push(id);
    }

    pub(crate) fn add_markers(&mut self, ids: Vec<MarkerId>) {
        if self.markers.is_empty() {
            self.markers = ids;
        } else {
            self.markers.extend(ids);
        }
    }

    pub(crate) fn remove_marker(&mut self, id: MarkerId) -> bool {
        match self.markers.iter().position(|m| *m == id) {
            Some(index) => {
                self.markers.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Hand over every marker of this line; used when the line is deleted.
    pub(crate) fn take_markers(&mut self) -> Vec<MarkerId> {
        std::mem::take(&mut self.markers)
    }

    /// Drop handles whose marker no longer exists in the arena.
    pub(crate) fn retain_live_markers(&mut self, arena: &MarkerArena) -> usize {
        let before = self.markers.len();
        self.markers.retain(|id| arena.contains(*id));
        before - self.markers.len()
    }

    fn sort_markers(&mut self, arena: &MarkerArena) {
        self.markers.sort_by_key(|id| arena.sort_key(*id));
    }

    /// Apply ascending, non-overlapping edits to this line, moving markers.
    ///
    /// Returns the change in line length (UTF-16 units).
    pub(crate) fn apply_edits(
        &mut self,
        arena: &mut MarkerArena,
        tracker: &mut MarkersTracker,
        edits: &[LineEdit],
    ) -> isize {
        self.sort_markers(arena);
        let markers = std::mem::take(&mut self.markers);
        let mut adjuster = MarkersAdjuster {
            markers: &markers,
            index: 0,
            arena,
            tracker,
        };

        let mut delta_column: isize = 0;
        let mut result = std::mem::take(&mut self.text);

        for edit in edits {
            let start_column = (delta_column + edit.start_column as isize) as usize;
            let end_column = (delta_column + edit.end_column as isize) as usize;
            let deleting = end_column - start_column;
            let inserting = utf16_len(&edit.text);

            // markers before this edit
            adjuster.adjust(
                edit.start_column,
                delta_column,
                1,
                if edit.force_move_markers {
                    MarkerMoveSemantics::ForceMove
                } else if deleting > 0 {
                    MarkerMoveSemantics::ForceStay
                } else {
                    MarkerMoveSemantics::MarkerDefined
                },
            );

            // markers in the part that is replaced character for character
            let common = deleting.min(inserting);
            if common > 0 && !edit.force_move_markers {
                adjuster.adjust(
                    edit.start_column + common,
                    delta_column,
                    1,
                    if deleting > inserting {
                        MarkerMoveSemantics::ForceStay
                    } else {
                        MarkerMoveSemantics::MarkerDefined
                    },
                );
            }

            let start_byte = utf16_to_byte(&result, start_column - 1);
            let end_byte = utf16_to_byte(&result, end_column - 1);
            result.replace_range(start_byte..end_byte, &edit.text);
            delta_column += inserting as isize - deleting as isize;

            // markers inside the replaced span
            adjuster.adjust(
                edit.end_column,
                delta_column,
                start_column,
                if edit.force_move_markers {
                    MarkerMoveSemantics::ForceMove
                } else {
                    MarkerMoveSemantics::MarkerDefined
                },
            );
        }

        // everything after the last edit shifts by the accumulated delta
        adjuster.adjust(usize::MAX, delta_column, 1, MarkerMoveSemantics::MarkerDefined);

        self.markers = markers;
        self.set_text(result);
        delta_column
    }

    /// Split this line at `split_column`, returning the trailing part.
    ///
    /// Markers after the split column go to the new line. A marker exactly at
    /// the split column goes too unless it sticks to the previous character
    /// (and the split is not force-moving markers).
    pub(crate) fn split(
        &mut self,
        arena: &mut MarkerArena,
        tracker: &mut MarkersTracker,
        split_column: usize,
        force_move_markers: bool,
    ) -> ModelLine {
        let split_byte = utf16_to_byte(&self.text, split_column - 1);
        let other_text = self.text.split_off(split_byte);
        self.len16 = utf16_len(&self.text);

        self.sort_markers(arena);
        let split_at = self.markers.iter().position(|id| {
            arena.get(*id).is_some_and(|marker| {
                marker.position.column > split_column
                    || (marker.position.column == split_column
                        && (force_move_markers || !marker.stick_to_previous_character))
            })
        });

        let mut other = ModelLine::new(self.line_number + 1, other_text);
        if let Some(split_at) = split_at {
            let moved = self.markers.split_off(split_at);
            for id in &moved {
                if let Some(column) = arena.get(*id).map(|m| m.position.column) {
                    arena.update_position(
                        *id,
                        Position::new(other.line_number, column - (split_column - 1)),
                        tracker,
                    );
                }
            }
            other.markers = moved;
        }
        other
    }

    /// Append `other` to this line, re-homing its markers.
    pub(crate) fn append(
        &mut self,
        arena: &mut MarkerArena,
        tracker: &mut MarkersTracker,
        mut other: ModelLine,
    ) {
        let this_len16 = self.len16;
        let mut text = std::mem::take(&mut self.text);
        text.push_str(&other.text);
        self.set_text(text);

        let other_markers = other.take_markers();
        for id in &other_markers {
            if let Some(column) = arena.get(*id).map(|m| m.position.column) {
                arena.update_position(
                    *id,
                    Position::new(self.line_number, column + this_len16),
                    tracker,
                );
            }
        }
        self.add_markers(other_markers);
    }

    pub(crate) fn update_line_number(
        &mut self,
        arena: &mut MarkerArena,
        tracker: &mut MarkersTracker,
        line_number: usize,
    ) {
        if self.line_number == line_number {
            return;
        }
        self.line_number = line_number;
        for id in &self.markers {
            arena.update_line_number(*id, line_number, tracker);
        }
    }
}

/// Walks a line's sorted markers once while edits are applied left to right.
struct MarkersAdjuster<'a> {
    markers: &'a [MarkerId],
    index: usize,
    arena: &'a mut MarkerArena,
    tracker: &'a mut MarkersTracker,
}

impl MarkersAdjuster<'_> {
    /// Shift every not-yet-visited marker that lies before `to_column` by
    /// `delta`, never below `minimum_allowed_column`.
    fn adjust(
        &mut self,
        to_column: usize,
        delta: isize,
        minimum_allowed_column: usize,
        semantics: MarkerMoveSemantics,
    ) {
        while let Some(id) = self.markers.get(self.index).copied() {
            let Some(marker) = self.arena.get(id) else {
                // dead handle, dropped by the invariant pass
                self.index += 1;
                continue;
            };
            let column = marker.position.column;
            let before = if column != to_column {
                column < to_column
            } else {
                match semantics {
                    MarkerMoveSemantics::ForceMove => false,
                    MarkerMoveSemantics::ForceStay => true,
                    MarkerMoveSemantics::MarkerDefined => marker.stick_to_previous_character,
                }
            };
            if !before {
                break;
            }
            if delta != 0 {
                let moved = (column as isize + delta).max(minimum_allowed_column as isize);
                self.arena.update_column(id, moved as usize, self.tracker);
            }
            self.index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::markers::LineMarker;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn line_with_marker(
        text: &str,
        column: usize,
        stick: bool,
    ) -> (ModelLine, MarkerArena, MarkerId) {
        let mut arena = MarkerArena::default();
        let mut line = ModelLine::new(1, text.to_string());
        let id = arena.insert(LineMarker {
            position: Position::new(1, column),
            stick_to_previous_character: stick,
            owner: None,
        });
        line.add_marker(id);
        (line, arena, id)
    }

    fn edit(start_column: usize, end_column: usize, text: &str) -> LineEdit {
        LineEdit {
            start_column,
            end_column,
            text: text.to_string(),
            force_move_markers: false,
        }
    }

    fn column(arena: &MarkerArena, id: MarkerId) -> usize {
        arena.get(id).unwrap().position.column
    }

    #[rstest]
    #[case::sticky_stays(true, 3)]
    #[case::loose_moves(false, 4)]
    fn test_insert_at_marker_respects_stickiness(#[case] stick: bool, #[case] expected: usize) {
        let (mut line, mut arena, id) = line_with_marker("abcd", 3, stick);
        let mut tracker = MarkersTracker::default();

        line.apply_edits(&mut arena, &mut tracker, &[edit(3, 3, "X")]);

        assert_eq!(line.text(), "abXcd");
        assert_eq!(column(&arena, id), expected);
    }

    #[test]
    fn test_force_move_overrides_stickiness() {
        let (mut line, mut arena, id) = line_with_marker("abcd", 3, true);
        let mut tracker = MarkersTracker::default();
        let forced = LineEdit {
            force_move_markers: true,
            ..edit(3, 3, "XY")
        };

        line.apply_edits(&mut arena, &mut tracker, &[forced]);

        assert_eq!(column(&arena, id), 5);
    }

    #[test]
    fn test_marker_inside_deleted_span_clamps_to_start() {
        let (mut line, mut arena, id) = line_with_marker("abcdef", 4, false);
        let mut tracker = MarkersTracker::default();

        line.apply_edits(&mut arena, &mut tracker, &[edit(2, 6, "")]);

        assert_eq!(line.text(), "af");
        assert_eq!(column(&arena, id), 2);
    }

    #[test]
    fn test_marker_at_start_of_deletion_stays() {
        let (mut line, mut arena, id) = line_with_marker("abcdef", 2, false);
        let mut tracker = MarkersTracker::default();

        line.apply_edits(&mut arena, &mut tracker, &[edit(2, 4, "")]);

        assert_eq!(column(&arena, id), 2);
    }

    #[test]
    fn test_multiple_edits_on_one_line_use_original_columns() {
        let (mut line, mut arena, id) = line_with_marker("0123456789", 9, false);
        let mut tracker = MarkersTracker::default();

        let delta = line.apply_edits(
            &mut arena,
            &mut tracker,
            &[edit(1, 1, "<<"), edit(4, 6, ""), edit(11, 11, ">")],
        );

        assert_eq!(line.text(), "<<01256789>");
        assert_eq!(delta, 1);
        // '8' gained two columns and lost two
        assert_eq!(column(&arena, id), 9);
    }

    #[test]
    fn test_edits_with_surrogate_pairs() {
        let (mut line, mut arena, id) = line_with_marker("a🦀b", 4, false);
        let mut tracker = MarkersTracker::default();

        line.apply_edits(&mut arena, &mut tracker, &[edit(2, 4, "c")]);

        assert_eq!(line.text(), "acb");
        assert_eq!(line.len16(), 3);
        assert_eq!(column(&arena, id), 3);
    }

    #[rstest]
    #[case::sticky_stays_on_original(true, 1, 3)]
    #[case::loose_moves_to_new_line(false, 2, 1)]
    fn test_split_at_marker_column(
        #[case] stick: bool,
        #[case] expected_line: usize,
        #[case] expected_column: usize,
    ) {
        let (mut line, mut arena, id) = line_with_marker("abcd", 3, stick);
        let mut tracker = MarkersTracker::default();

        let other = line.split(&mut arena, &mut tracker, 3, false);

        assert_eq!(line.text(), "ab");
        assert_eq!(other.text(), "cd");
        let position = arena.get(id).unwrap().position;
        assert_eq!(position, Position::new(expected_line, expected_column));
        assert_eq!(other.markers().contains(&id), expected_line == 2);
    }

    #[test]
    fn test_append_rehomes_markers_with_offset() {
        let (mut second, mut arena, id) = line_with_marker("def", 2, false);
        second.line_number = 2;
        let mut tracker = MarkersTracker::default();
        let mut first = ModelLine::new(1, "abc".to_string());

        first.append(&mut arena, &mut tracker, second);

        assert_eq!(first.text(), "abcdef");
        assert_eq!(arena.get(id).unwrap().position, Position::new(1, 5));
        assert_eq!(first.markers(), &[id]);
    }

    #[test]
    fn test_update_line_number_moves_markers() {
        let (mut line, mut arena, id) = line_with_marker("abc", 2, false);
        let mut tracker = MarkersTracker::default();

        line.update_line_number(&mut arena, &mut tracker, 5);

        assert_eq!(line.line_number(), 5);
        assert_eq!(arena.get(id).unwrap().position, Position::new(5, 2));
    }

    #[test]
    fn test_retain_live_markers_drops_dead_handles() {
        let (mut line, mut arena, id) = line_with_marker("abc", 2, false);
        arena.remove(id);

        assert_eq!(line.retain_live_markers(&arena), 1);
        assert!(line.markers().is_empty());
    }
}
