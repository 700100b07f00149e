use serde::Serialize;

use crate::error::ModelError;
use crate::model::events::{ContentChangedEvent, ModelEvent};
use crate::model::line::{LineEdit, ModelLine};
use crate::model::markers::MarkersTracker;
use crate::model::text::{first_non_whitespace_index, split_lines, utf16_len, utf16_slice};
use crate::model::{EndOfLinePreference, Position, Range, TextModel};

/// Opaque tag carried from an operation to its inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EditIdentifier(pub u64);

/// Replace `range` with `text`.
///
/// An empty range inserts, a missing text deletes. Line breaks in `text`
/// may be `\n`, `\r\n` or `\r`; they are stored with the model EOL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOperation {
    pub identifier: Option<EditIdentifier>,
    pub range: Range,
    pub text: Option<String>,
    /// Markers exactly at the edit boundaries always end up after the
    /// inserted text, whatever their stickiness.
    pub force_move_markers: bool,
    /// The edit inserted indentation that may be trimmed by the next edit.
    pub is_auto_whitespace_edit: bool,
}

/// Inverse operations are plain operations, ready to be applied again.
pub type InverseEditOperation = EditOperation;

impl EditOperation {
    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            identifier: None,
            range,
            text: (!text.is_empty()).then_some(text),
            force_move_markers: false,
            is_auto_whitespace_edit: false,
        }
    }

    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self::replace(Range::empty_at(position), text)
    }

    pub fn delete(range: Range) -> Self {
        Self {
            identifier: None,
            range,
            text: None,
            force_move_markers: false,
            is_auto_whitespace_edit: false,
        }
    }

    pub fn with_identifier(mut self, identifier: EditIdentifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_force_move_markers(mut self) -> Self {
        self.force_move_markers = true;
        self
    }

    pub fn auto_whitespace(mut self) -> Self {
        self.is_auto_whitespace_edit = true;
        self
    }
}

/// Counters describing the last committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitStats {
    /// Non no-op operations in the batch, before any reduction
    pub operations: usize,
    /// The batch was reduced to a single operation
    pub reduced: bool,
    /// Calls to per-line edit, split and append primitives
    pub line_edit_calls: usize,
    pub lines_inserted: usize,
    pub lines_deleted: usize,
    pub version_bumps: u64,
}

#[derive(Debug, Clone)]
struct ValidatedEditOperation {
    sort_index: usize,
    identifier: Option<EditIdentifier>,
    range: Range,
    range_length: usize,
    /// `None` when nothing is inserted
    lines: Option<Vec<String>>,
    force_move_markers: bool,
    is_auto_whitespace_edit: bool,
}

impl ValidatedEditOperation {
    fn is_no_op(&self) -> bool {
        self.range.is_empty() && self.lines.is_none()
    }

    fn inserted_line_count(&self) -> usize {
        self.lines.as_ref().map_or(0, |lines| lines.len() - 1)
    }
}

#[derive(Debug)]
struct TrimCandidate {
    line_number: usize,
    old_content: String,
}

/// Line-level change recorded while applying, versioned once the batch is done.
#[derive(Debug)]
enum RawChange {
    LineChanged {
        line_number: usize,
        text: String,
    },
    LinesInserted {
        from_line: usize,
        to_line: usize,
        text: String,
    },
    LinesDeleted {
        from_line: usize,
        to_line: usize,
    },
}

impl RawChange {
    fn into_event(self, version_id: u64) -> ModelEvent {
        match self {
            RawChange::LineChanged { line_number, text } => ModelEvent::LineChanged {
                line_number,
                text,
                version_id,
            },
            RawChange::LinesInserted {
                from_line,
                to_line,
                text,
            } => ModelEvent::LinesInserted {
                from_line,
                to_line,
                text,
                version_id,
            },
            RawChange::LinesDeleted { from_line, to_line } => ModelEvent::LinesDeleted {
                from_line,
                to_line,
                version_id,
            },
        }
    }
}

#[derive(Debug)]
struct ContentChange {
    range: Range,
    range_length: usize,
    text: String,
}

impl TextModel {
    /// Apply a batch of operations atomically.
    ///
    /// Returns the inverse operations in submission order; applying them
    /// restores the previous text. Overlapping operations reject the whole
    /// batch before anything is modified.
    pub fn apply_edits(
        &mut self,
        operations: Vec<EditOperation>,
    ) -> Result<Vec<InverseEditOperation>, ModelError> {
        self.with_deferred_events(|model| model.apply_edits_impl(operations))
    }

    /// Counters of the last committed batch, if any.
    pub fn last_commit_stats(&self) -> Option<&CommitStats> {
        self.last_commit.as_ref()
    }

    pub(crate) fn apply_edits_impl(
        &mut self,
        operations: Vec<EditOperation>,
    ) -> Result<Vec<InverseEditOperation>, ModelError> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let mut ops: Vec<ValidatedEditOperation> = operations
            .into_iter()
            .enumerate()
            .map(|(sort_index, op)| self.validate_operation(sort_index, op))
            .collect();
        ops.sort_by(|a, b| {
            a.range
                .compare_using_ends(&b.range)
                .then(a.sort_index.cmp(&b.sort_index))
        });
        for pair in ops.windows(2) {
            if pair[1].range.start < pair[0].range.end {
                log::debug!(
                    "rejecting batch: {} overlaps {}",
                    pair[0].range,
                    pair[1].range
                );
                return Err(ModelError::OverlappingRanges {
                    first: pair[0].range,
                    second: pair[1].range,
                });
            }
        }

        ops.retain(|op| !op.is_no_op());
        self.trim_auto_whitespace_lines = None;
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let mut stats = CommitStats {
            operations: ops.len(),
            ..CommitStats::default()
        };
        if ops.len() > 1 && ops.len() >= self.options.large_batch_threshold {
            log::debug!("reducing a batch of {} operations to one", ops.len());
            ops = vec![self.to_single_edit_operation(&ops)];
            stats.reduced = true;
        }

        let inverse_ranges = inverse_edit_ranges(&ops);
        let trim_candidates = self.collect_trim_candidates(&ops, &inverse_ranges);

        let mut inverse: Vec<(usize, InverseEditOperation)> = ops
            .iter()
            .zip(&inverse_ranges)
            .map(|(op, range)| {
                let old_text = self.value_in_range(op.range, EndOfLinePreference::TextDefined);
                let inverse_op = InverseEditOperation {
                    identifier: op.identifier,
                    range: *range,
                    text: (!old_text.is_empty()).then_some(old_text),
                    force_move_markers: op.force_move_markers,
                    is_auto_whitespace_edit: false,
                };
                (op.sort_index, inverse_op)
            })
            .collect();
        inverse.sort_by_key(|(sort_index, _)| *sort_index);

        self.do_apply_edits(&ops, &inverse_ranges, &mut stats);
        self.settle_trim_candidates(trim_candidates);

        log::debug!(
            "committed {} operations at version {}: {:?}",
            stats.operations,
            self.version_id,
            stats
        );
        self.last_commit = Some(stats);

        Ok(inverse.into_iter().map(|(_, op)| op).collect())
    }

    fn validate_operation(&self, sort_index: usize, op: EditOperation) -> ValidatedEditOperation {
        let range = self.validate_range(op.range);
        ValidatedEditOperation {
            sort_index,
            identifier: op.identifier,
            range,
            range_length: self.value_length_in_range(range),
            lines: op
                .text
                .filter(|text| !text.is_empty())
                .map(|text| split_lines(&text)),
            force_move_markers: op.force_move_markers,
            is_auto_whitespace_edit: op.is_auto_whitespace_edit,
        }
    }

    /// Merge ascending, non-overlapping operations into one spanning from the
    /// first start to the last end, keeping the text between them.
    fn to_single_edit_operation(&self, ops: &[ValidatedEditOperation]) -> ValidatedEditOperation {
        let first = &ops[0];
        let start = first.range.start;
        let end = ops[ops.len() - 1].range.end;

        let mut text = String::new();
        let mut previous_end = start;
        let mut force_move_markers = false;
        for op in ops {
            self.push_text_between(&mut text, previous_end, op.range.start);
            if let Some(lines) = &op.lines {
                text.push_str(&lines.join("\n"));
            }
            force_move_markers |= op.force_move_markers;
            previous_end = op.range.end;
        }

        let range = Range { start, end };
        ValidatedEditOperation {
            sort_index: 0,
            identifier: first.identifier,
            range,
            range_length: self.value_length_in_range(range),
            lines: (!text.is_empty()).then(|| split_lines(&text)),
            force_move_markers,
            is_auto_whitespace_edit: false,
        }
    }

    fn push_text_between(&self, text: &mut String, from: Position, to: Position) {
        let from_line = &self.lines[from.line_number - 1];
        if from.line_number == to.line_number {
            text.push_str(utf16_slice(from_line.text(), from.column - 1, to.column - 1));
            return;
        }
        text.push_str(utf16_slice(
            from_line.text(),
            from.column - 1,
            from_line.len16(),
        ));
        for line in &self.lines[from.line_number..to.line_number - 1] {
            text.push('\n');
            text.push_str(line.text());
        }
        text.push('\n');
        text.push_str(utf16_slice(
            self.lines[to.line_number - 1].text(),
            0,
            to.column - 1,
        ));
    }

    fn collect_trim_candidates(
        &self,
        ops: &[ValidatedEditOperation],
        inverse_ranges: &[Range],
    ) -> Vec<TrimCandidate> {
        if !self.options.trim_auto_whitespace {
            return Vec::new();
        }
        let mut candidates = Vec::new();
        for (op, inverse_range) in ops.iter().zip(inverse_ranges) {
            if !op.is_auto_whitespace_edit || !op.range.is_empty() {
                continue;
            }
            for line_number in inverse_range.start.line_number..=inverse_range.end.line_number {
                let mut old_content = String::new();
                if line_number == op.range.start.line_number {
                    let content = self.lines[line_number - 1].text();
                    if first_non_whitespace_index(content).is_some() {
                        continue;
                    }
                    old_content = content.to_string();
                }
                candidates.push(TrimCandidate {
                    line_number,
                    old_content,
                });
            }
        }
        candidates
    }

    /// Keep the candidate lines that ended up whitespace-only and changed.
    fn settle_trim_candidates(&mut self, mut candidates: Vec<TrimCandidate>) {
        if candidates.is_empty() {
            return;
        }
        candidates.sort_by(|a, b| b.line_number.cmp(&a.line_number));

        let mut lines = Vec::new();
        let mut previous = None;
        for candidate in candidates {
            if previous == Some(candidate.line_number) {
                continue;
            }
            previous = Some(candidate.line_number);
            let Some(content) = self.line_content(candidate.line_number) else {
                continue;
            };
            if content.is_empty()
                || content == candidate.old_content
                || first_non_whitespace_index(content).is_some()
            {
                continue;
            }
            lines.push(candidate.line_number);
        }
        if !lines.is_empty() {
            self.trim_auto_whitespace_lines = Some(lines);
        }
    }

    /// Mutate the line store for sorted, validated operations.
    ///
    /// Operations are applied from the last to the first so earlier ranges
    /// keep their coordinates. Edits that stay within single lines are queued
    /// and applied per line in one pass.
    fn do_apply_edits(
        &mut self,
        ops: &[ValidatedEditOperation],
        inverse_ranges: &[Range],
        stats: &mut CommitStats,
    ) {
        let mut tracker = MarkersTracker::default();
        let mut raw_changes = Vec::new();
        let mut content_changes = Vec::with_capacity(ops.len());
        let mut queue: Vec<(usize, LineEdit)> = Vec::new();
        let line_count_before = self.lines.len();
        let eol = self.eol;

        for op in ops.iter().rev() {
            let start = op.range.start;
            let end = op.range.end;
            let deleting = end.line_number - start.line_number;
            let inserting = op.inserted_line_count();
            let editing = deleting.min(inserting);

            for j in (0..=editing).rev() {
                let line_number = start.line_number + j;
                let edit = LineEdit {
                    start_column: if line_number == start.line_number {
                        start.column
                    } else {
                        1
                    },
                    end_column: if line_number == end.line_number {
                        end.column
                    } else {
                        self.lines[line_number - 1].max_column()
                    },
                    text: op
                        .lines
                        .as_ref()
                        .map_or_else(String::new, |lines| lines[j].clone()),
                    force_move_markers: op.force_move_markers,
                };
                if edit.start_column != edit.end_column || !edit.text.is_empty() {
                    queue.push((line_number, edit));
                }
            }

            if editing < deleting {
                self.flush_line_edits(&mut queue, &mut tracker, &mut raw_changes, stats);

                let splice_start = start.line_number + editing;
                let splice_column = self.lines[splice_start - 1].max_column();
                let end_line_remains = self.lines[end.line_number - 1].split(
                    &mut self.markers,
                    &mut tracker,
                    end.column,
                    false,
                );
                let splice_count = end.line_number - splice_start;

                let mut orphans = Vec::new();
                for mut line in self.lines.drain(splice_start..splice_start + splice_count) {
                    orphans.extend(line.take_markers());
                }

                let target = &mut self.lines[splice_start - 1];
                target.append(&mut self.markers, &mut tracker, end_line_remains);
                for id in &orphans {
                    self.markers.update_position(
                        *id,
                        Position::new(splice_start, splice_column),
                        &mut tracker,
                    );
                }
                target.add_markers(orphans);

                stats.line_edit_calls += 2;
                stats.lines_deleted += splice_count;
                raw_changes.push(RawChange::LineChanged {
                    line_number: splice_start,
                    text: target.text().to_string(),
                });
                raw_changes.push(RawChange::LinesDeleted {
                    from_line: splice_start + 1,
                    to_line: splice_start + splice_count,
                });
            } else if let Some(lines) = op.lines.as_ref().filter(|_| editing < inserting) {
                self.flush_line_edits(&mut queue, &mut tracker, &mut raw_changes, stats);

                let splice_line = start.line_number + editing;
                let splice_column = if splice_line == start.line_number {
                    start.column
                } else {
                    1
                } + utf16_len(&lines[editing]);
                let leftover = self.lines[splice_line - 1].split(
                    &mut self.markers,
                    &mut tracker,
                    splice_column,
                    op.force_move_markers,
                );
                raw_changes.push(RawChange::LineChanged {
                    line_number: splice_line,
                    text: self.lines[splice_line - 1].text().to_string(),
                });

                let new_lines: Vec<ModelLine> = (editing + 1..=inserting)
                    .map(|j| ModelLine::new(splice_line + (j - editing), lines[j].clone()))
                    .collect();
                let mut inserted_text = lines[editing + 1..=inserting].join("\n");
                inserted_text.push_str(leftover.text());
                self.lines.splice(splice_line..splice_line, new_lines);

                let last_line = start.line_number + inserting;
                self.lines[last_line - 1].append(&mut self.markers, &mut tracker, leftover);

                stats.line_edit_calls += 2;
                stats.lines_inserted += inserting - editing;
                raw_changes.push(RawChange::LinesInserted {
                    from_line: splice_line + 1,
                    to_line: last_line,
                    text: inserted_text,
                });
            }

            content_changes.push(ContentChange {
                range: op.range,
                range_length: op.range_length,
                text: op
                    .lines
                    .as_ref()
                    .map(|lines| lines.join(eol.as_str()))
                    .unwrap_or_default(),
            });
        }
        self.flush_line_edits(&mut queue, &mut tracker, &mut raw_changes, stats);

        // renumber: to the end of the document when the line count changed
        let min_touched = ops[0].range.start.line_number;
        let max_touched = if self.lines.len() != line_count_before {
            self.lines.len()
        } else {
            inverse_ranges
                .last()
                .map_or(min_touched, |range| range.end.line_number)
                .min(self.lines.len())
        };
        for index in min_touched - 1..max_touched {
            self.lines[index].update_line_number(&mut self.markers, &mut tracker, index + 1);
        }

        if raw_changes.is_empty() {
            raw_changes.push(RawChange::LineChanged {
                line_number: min_touched,
                text: self.lines[min_touched - 1].text().to_string(),
            });
        }
        let version_bumps = raw_changes.len().max(content_changes.len()) as u64;
        self.increase_version_id(version_bumps);
        stats.version_bumps = version_bumps;

        let final_version = self.version_id;
        let raw_base = final_version - raw_changes.len() as u64;
        for (offset, change) in raw_changes.into_iter().enumerate() {
            self.emit(change.into_event(raw_base + offset as u64 + 1));
        }
        let content_base = final_version - content_changes.len() as u64;
        for (offset, change) in content_changes.into_iter().enumerate() {
            self.emit(ModelEvent::ContentChanged(ContentChangedEvent {
                range: change.range,
                range_length: change.range_length,
                text: change.text,
                eol,
                version_id: content_base + offset as u64 + 1,
                is_undoing: self.is_undoing,
                is_redoing: self.is_redoing,
            }));
        }

        self.refresh_decorations(&tracker);

        #[cfg(debug_assertions)]
        self.assert_invariants();
        #[cfg(not(debug_assertions))]
        self.heal_lines(min_touched, max_touched);
    }

    /// Apply queued single-line edits, grouped per line in ascending order.
    fn flush_line_edits(
        &mut self,
        queue: &mut Vec<(usize, LineEdit)>,
        tracker: &mut MarkersTracker,
        raw_changes: &mut Vec<RawChange>,
        stats: &mut CommitStats,
    ) {
        if queue.is_empty() {
            return;
        }
        queue.reverse();

        let mut group_start = 0;
        while group_start < queue.len() {
            let line_number = queue[group_start].0;
            let group_end = queue[group_start..]
                .iter()
                .position(|(other, _)| *other != line_number)
                .map_or(queue.len(), |offset| group_start + offset);
            let edits: Vec<LineEdit> = queue[group_start..group_end]
                .iter()
                .map(|(_, edit)| edit.clone())
                .collect();

            let line = &mut self.lines[line_number - 1];
            line.apply_edits(&mut self.markers, tracker, &edits);
            stats.line_edit_calls += 1;
            raw_changes.push(RawChange::LineChanged {
                line_number,
                text: line.text().to_string(),
            });
            group_start = group_end;
        }
        queue.clear();
    }
}

/// Ranges the operations' new text occupies once the batch is applied.
///
/// Walks the ascending operations keeping track of where the previous one
/// ended in the new coordinates.
fn inverse_edit_ranges(ops: &[ValidatedEditOperation]) -> Vec<Range> {
    let mut result = Vec::with_capacity(ops.len());
    let mut previous: Option<(&ValidatedEditOperation, Position)> = None;

    for op in ops {
        let start = match previous {
            Some((prev, prev_new_end))
                if prev.range.end.line_number == op.range.start.line_number =>
            {
                Position::new(
                    prev_new_end.line_number,
                    prev_new_end.column + (op.range.start.column - prev.range.end.column),
                )
            }
            Some((prev, prev_new_end)) => {
                let skipped_lines = op.range.start.line_number - prev.range.end.line_number;
                Position::new(prev_new_end.line_number + skipped_lines, op.range.start.column)
            }
            None => op.range.start,
        };

        let range = match &op.lines {
            Some(lines) if lines.len() == 1 => Range {
                start,
                end: Position::new(start.line_number, start.column + utf16_len(&lines[0])),
            },
            Some(lines) => Range {
                start,
                end: Position::new(
                    start.line_number + lines.len() - 1,
                    utf16_len(&lines[lines.len() - 1]) + 1,
                ),
            },
            None => Range::empty_at(start),
        };
        previous = Some((op, range.end));
        result.push(range);
    }
    result
}
