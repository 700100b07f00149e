use crate::error::ModelError;
use crate::model::{EditOperation, Range, Selection, TextModel};

/// One undoable unit: possibly several batches pushed without a
/// `push_stack_element` in between.
#[derive(Debug)]
struct EditStackElement {
    before_version_id: u64,
    before_cursor_state: Vec<Selection>,
    /// Batches that take the model to the other side of this element:
    /// inverses while on the undo stack, re-do batches on the redo stack.
    edit_operations: Vec<Vec<EditOperation>>,
    after_cursor_state: Option<Vec<Selection>>,
    after_version_id: u64,
}

#[derive(Debug, Default)]
pub(crate) struct EditStack {
    past: Vec<EditStackElement>,
    future: Vec<EditStackElement>,
    current: Option<EditStackElement>,
}

impl EditStack {
    fn push_stack_element(&mut self) {
        if let Some(element) = self.current.take() {
            self.past.push(element);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.current = None;
    }
}

impl TextModel {
    /// Apply `operations` and record their inverse for undo.
    ///
    /// Batches pushed without a `push_stack_element` in between are undone
    /// together. `cursor_state_computer` receives the inverse operations and
    /// returns the selections after the edit.
    pub fn push_edit_operations(
        &mut self,
        before_selections: &[Selection],
        operations: Vec<EditOperation>,
        cursor_state_computer: impl FnOnce(&[EditOperation]) -> Option<Vec<Selection>>,
    ) -> Result<Option<Vec<Selection>>, ModelError> {
        self.with_deferred_events(|model| {
            model.push_edit_operations_impl(before_selections, operations, cursor_state_computer)
        })
    }

    fn push_edit_operations_impl(
        &mut self,
        before_selections: &[Selection],
        mut operations: Vec<EditOperation>,
        cursor_state_computer: impl FnOnce(&[EditOperation]) -> Option<Vec<Selection>>,
    ) -> Result<Option<Vec<Selection>>, ModelError> {
        let trim_lines = self.trim_auto_whitespace_lines.take();
        if let Some(trim_lines) = &trim_lines {
            self.append_trim_operations(trim_lines, before_selections, &mut operations);
        }

        let before_version_id = self.alternative_version_id;
        let inverse = match self.apply_edits_impl(operations) {
            Ok(inverse) => inverse,
            Err(error) => {
                // a rejected batch leaves the pending trims for the next one
                self.trim_auto_whitespace_lines = trim_lines;
                return Err(error);
            }
        };
        let after_cursor_state = cursor_state_computer(&inverse);
        if inverse.is_empty() {
            return Ok(after_cursor_state);
        }

        let after_version_id = self.version_id;
        let element = self
            .edit_stack
            .current
            .get_or_insert_with(|| EditStackElement {
                before_version_id,
                before_cursor_state: before_selections.to_vec(),
                edit_operations: Vec::new(),
                after_cursor_state: None,
                after_version_id,
            });
        element.edit_operations.push(inverse);
        element.after_cursor_state = after_cursor_state.clone();
        element.after_version_id = after_version_id;
        self.edit_stack.future.clear();

        Ok(after_cursor_state)
    }

    /// Add a delete operation for each pending whitespace-only line, unless
    /// the edits are away from the cursors or touch the line themselves.
    fn append_trim_operations(
        &self,
        trim_lines: &[usize],
        before_selections: &[Selection],
        operations: &mut Vec<EditOperation>,
    ) {
        let incoming: Vec<(Range, Option<&str>)> = operations
            .iter()
            .map(|op| (self.validate_range(op.range), op.text.as_deref()))
            .collect();

        let edits_are_near_cursors = before_selections.iter().all(|selection| {
            let selection = selection.range();
            incoming.iter().any(|(range, _)| {
                range.start.line_number <= selection.end.line_number
                    && selection.start.line_number <= range.end.line_number
            })
        });
        if !edits_are_near_cursors {
            return;
        }

        let mut trims = Vec::new();
        for &line_number in trim_lines {
            let Some(max_column) = self.line_max_column(line_number) else {
                continue;
            };
            let allow_trim = incoming.iter().all(|(range, text)| {
                if line_number < range.start.line_number || line_number > range.end.line_number {
                    return true;
                }
                // an insertion that starts a new line after the trimmed one
                line_number == range.start.line_number
                    && range.start.column == max_column
                    && range.is_empty()
                    && text.is_some_and(|text| text.starts_with('\n') || text.starts_with("\r\n"))
            });
            if allow_trim {
                trims.push(EditOperation::delete(Range::new(
                    line_number,
                    1,
                    line_number,
                    max_column,
                )));
            }
        }
        if !trims.is_empty() {
            log::debug!("trimming auto whitespace on {} lines", trims.len());
        }
        operations.extend(trims);
    }

    /// Close the open undo element; the next push starts a new one.
    pub fn push_stack_element(&mut self) {
        self.edit_stack.push_stack_element();
    }

    pub fn can_undo(&self) -> bool {
        self.edit_stack.current.is_some() || !self.edit_stack.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.edit_stack.future.is_empty()
    }

    pub fn clear_undo_stack(&mut self) {
        self.edit_stack.clear();
    }

    /// Undo the last element; returns the selections from before it.
    pub fn undo(&mut self) -> Option<Vec<Selection>> {
        self.with_deferred_events(|model| model.undo_impl())
    }

    /// Redo the last undone element; returns the selections after it.
    pub fn redo(&mut self) -> Option<Vec<Selection>> {
        self.with_deferred_events(|model| model.redo_impl())
    }

    fn undo_impl(&mut self) -> Option<Vec<Selection>> {
        self.edit_stack.push_stack_element();
        let mut element = self.edit_stack.past.pop()?;

        self.is_undoing = true;
        let replayed = self.replay(element.edit_operations.drain(..).rev().collect());
        self.is_undoing = false;

        let mut redo_batches = replayed?;
        redo_batches.reverse();
        element.edit_operations = redo_batches;
        self.alternative_version_id = element.before_version_id;
        let selections = element.before_cursor_state.clone();
        self.edit_stack.future.push(element);
        Some(selections)
    }

    fn redo_impl(&mut self) -> Option<Vec<Selection>> {
        let mut element = self.edit_stack.future.pop()?;

        self.is_redoing = true;
        let replayed = self.replay(std::mem::take(&mut element.edit_operations));
        self.is_redoing = false;

        element.edit_operations = replayed?;
        self.alternative_version_id = element.after_version_id;
        let selections = element.after_cursor_state.clone().unwrap_or_default();
        self.edit_stack.past.push(element);
        Some(selections)
    }

    /// Apply batches in order, collecting their inverses. On failure the
    /// undo history no longer matches the text and is dropped.
    fn replay(&mut self, batches: Vec<Vec<EditOperation>>) -> Option<Vec<Vec<EditOperation>>> {
        let mut inverses = Vec::with_capacity(batches.len());
        for batch in batches {
            match self.apply_edits_impl(batch) {
                Ok(inverse) => inverses.push(inverse),
                Err(error) => {
                    log::error!("undo/redo replay failed, clearing history: {error}");
                    self.edit_stack.clear();
                    return None;
                }
            }
        }
        Some(inverses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EndOfLinePreference, ModelEvent, Position};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn text(model: &TextModel) -> String {
        model.value(EndOfLinePreference::Lf)
    }

    fn cursor(line_number: usize, column: usize) -> Vec<Selection> {
        vec![Selection::collapsed(Position::new(line_number, column))]
    }

    fn type_text(model: &mut TextModel, position: Position, text: &str) {
        model
            .push_edit_operations(
                &cursor(position.line_number, position.column),
                vec![EditOperation::insert(position, text)],
                |_| None,
            )
            .unwrap();
    }

    #[test]
    fn test_undo_then_redo() {
        let mut model = TextModel::new("abc");
        type_text(&mut model, Position::new(1, 4), "d");
        assert_eq!(text(&model), "abcd");

        assert_eq!(model.undo(), Some(cursor(1, 4)));
        assert_eq!(text(&model), "abc");
        assert!(model.can_redo());

        model.redo();
        assert_eq!(text(&model), "abcd");
        assert!(!model.can_redo());
    }

    #[test]
    fn test_redo_marks_content_events_as_redoing() {
        let mut model = TextModel::new("abc");
        type_text(&mut model, Position::new(1, 4), "d");
        model.undo();

        let flags = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&flags);
        model.on_did_change(move |_, event| {
            if let ModelEvent::ContentChanged(change) = event {
                sink.borrow_mut().push((change.is_undoing, change.is_redoing));
            }
        });
        model.redo();
        model.undo();

        assert_eq!(*flags.borrow(), vec![(false, true), (true, false)]);
    }

    #[test]
    fn test_batches_without_stack_element_undo_together() {
        let mut model = TextModel::new("");
        type_text(&mut model, Position::new(1, 1), "a");
        type_text(&mut model, Position::new(1, 2), "b");
        model.push_stack_element();
        type_text(&mut model, Position::new(1, 3), "c");

        model.undo();
        assert_eq!(text(&model), "ab");
        model.undo();
        assert_eq!(text(&model), "");
        assert_eq!(model.undo(), None);

        model.redo();
        assert_eq!(text(&model), "ab");
        model.redo();
        assert_eq!(text(&model), "abc");
    }

    #[test]
    fn test_alternative_version_returns_to_saved_state() {
        let mut model = TextModel::new("abc");
        let saved = model.alternative_version_id();
        type_text(&mut model, Position::new(1, 1), "x");
        let edited = model.alternative_version_id();
        assert_ne!(edited, saved);

        model.undo();
        assert_eq!(model.alternative_version_id(), saved);
        assert!(model.version_id() > edited);

        model.redo();
        assert_eq!(model.alternative_version_id(), edited);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut model = TextModel::new("abc");
        type_text(&mut model, Position::new(1, 1), "x");
        model.undo();
        assert!(model.can_redo());

        type_text(&mut model, Position::new(1, 1), "y");
        assert!(!model.can_redo());
        assert_eq!(model.redo(), None);
    }

    #[test]
    fn test_cursor_state_computer_sees_inverse() {
        let mut model = TextModel::new("abc");
        let after = model
            .push_edit_operations(
                &cursor(1, 1),
                vec![EditOperation::insert(Position::new(1, 1), "xy")],
                |inverse| Some(vec![Selection::collapsed(inverse[0].range.end)]),
            )
            .unwrap();
        assert_eq!(after, Some(cursor(1, 3)));

        model.undo();
        assert_eq!(model.redo(), Some(cursor(1, 3)));
    }

    #[test]
    fn test_rejected_batch_is_not_recorded() {
        let mut model = TextModel::new("abcdef");
        let result = model.push_edit_operations(
            &cursor(1, 1),
            vec![
                EditOperation::delete(Range::new(1, 1, 1, 4)),
                EditOperation::delete(Range::new(1, 2, 1, 5)),
            ],
            |_| None,
        );
        assert!(result.is_err());
        assert!(!model.can_undo());
    }

    // ============ Auto whitespace ============

    #[test]
    fn test_auto_whitespace_is_trimmed_by_next_edit_near_cursor() {
        let mut model = TextModel::new("foo\nbar");
        model
            .push_edit_operations(
                &cursor(1, 4),
                vec![EditOperation::insert(Position::new(1, 4), "\n    ").auto_whitespace()],
                |_| None,
            )
            .unwrap();
        assert_eq!(text(&model), "foo\n    \nbar");

        // typing on the line below, cursor there
        type_text(&mut model, Position::new(3, 4), "!");

        assert_eq!(text(&model), "foo\n\nbar!");
    }

    #[test]
    fn test_auto_whitespace_survives_rejected_batch() {
        let mut model = TextModel::new("foo\nbar");
        model
            .push_edit_operations(
                &cursor(1, 4),
                vec![EditOperation::insert(Position::new(1, 4), "\n    ").auto_whitespace()],
                |_| None,
            )
            .unwrap();

        let rejected = model.push_edit_operations(
            &cursor(3, 1),
            vec![
                EditOperation::delete(Range::new(3, 1, 3, 3)),
                EditOperation::delete(Range::new(3, 2, 3, 4)),
            ],
            |_| None,
        );
        assert!(rejected.is_err());
        assert_eq!(text(&model), "foo\n    \nbar");

        type_text(&mut model, Position::new(3, 4), "!");

        assert_eq!(text(&model), "foo\n\nbar!");
    }

    #[test]
    fn test_auto_whitespace_kept_when_edit_touches_line() {
        let mut model = TextModel::new("foo");
        model
            .push_edit_operations(
                &cursor(1, 4),
                vec![EditOperation::insert(Position::new(1, 4), "\n    ").auto_whitespace()],
                |_| None,
            )
            .unwrap();

        type_text(&mut model, Position::new(2, 5), "x");

        assert_eq!(text(&model), "foo\n    x");
    }

    #[test]
    fn test_auto_whitespace_trimmed_before_new_line() {
        let mut model = TextModel::new("foo");
        model
            .push_edit_operations(
                &cursor(1, 4),
                vec![EditOperation::insert(Position::new(1, 4), "\n    ").auto_whitespace()],
                |_| None,
            )
            .unwrap();

        type_text(&mut model, Position::new(2, 5), "\n    ");

        assert_eq!(text(&model), "foo\n\n    ");
    }

    #[test]
    fn test_auto_whitespace_kept_when_edit_far_from_cursor() {
        let mut model = TextModel::new("foo\na\nb\nc");
        model
            .push_edit_operations(
                &cursor(1, 4),
                vec![EditOperation::insert(Position::new(1, 4), "\n    ").auto_whitespace()],
                |_| None,
            )
            .unwrap();

        model
            .push_edit_operations(
                &cursor(2, 5),
                vec![EditOperation::insert(Position::new(5, 2), "!")],
                |_| None,
            )
            .unwrap();

        assert_eq!(text(&model), "foo\n    \na\nb\nc!");
    }
}
