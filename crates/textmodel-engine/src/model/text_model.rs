use std::fmt;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::decorations::DecorationsTracker;
use crate::model::edits::CommitStats;
use crate::model::events::{EventQueue, Listeners, ModelEvent};
use crate::model::line::ModelLine;
use crate::model::markers::MarkerArena;
use crate::model::text::{
    first_non_whitespace_index, last_non_whitespace_index, snap_to_char_boundary, split_lines,
    utf16_len, utf16_slice, utf16_to_byte,
};
use crate::model::undo::EditStack;
use crate::model::{Position, Range};

/// Line terminator of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndOfLine {
    #[default]
    Lf,
    CrLf,
}

impl EndOfLine {
    pub fn as_str(self) -> &'static str {
        match self {
            EndOfLine::Lf => "\n",
            EndOfLine::CrLf => "\r\n",
        }
    }

    /// Length in UTF-16 code units
    pub fn width(self) -> usize {
        self.as_str().len()
    }
}

/// Which line terminator to use when reading text out of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndOfLinePreference {
    /// The model's own EOL
    #[default]
    TextDefined,
    Lf,
    CrLf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextModelOptions {
    /// EOL used when the initial text has no line breaks
    pub default_eol: EndOfLine,
    /// Remove whitespace-only lines left behind by auto-indentation
    pub trim_auto_whitespace: bool,
    /// Batches with at least this many operations are reduced to one
    pub large_batch_threshold: usize,
}

impl Default for TextModelOptions {
    fn default() -> Self {
        Self {
            default_eol: EndOfLine::Lf,
            trim_auto_whitespace: true,
            large_batch_threshold: 1000,
        }
    }
}

/// Identity of a model; namespaces its decoration ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(Uuid);

impl ModelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub(crate) fn decoration_prefix(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A line-oriented text document with markers, decorations and undo.
///
/// Every mutation takes `&mut self` and runs to completion before any
/// listener observes the model.
#[derive(Debug)]
pub struct TextModel {
    id: ModelId,
    pub(crate) options: TextModelOptions,
    pub(crate) lines: Vec<ModelLine>,
    pub(crate) eol: EndOfLine,
    pub(crate) markers: MarkerArena,
    pub(crate) decorations: DecorationsTracker,
    pub(crate) version_id: u64,
    pub(crate) alternative_version_id: u64,
    pub(crate) edit_stack: EditStack,
    pub(crate) is_undoing: bool,
    pub(crate) is_redoing: bool,
    pub(crate) trim_auto_whitespace_lines: Option<Vec<usize>>,
    pub(crate) events: EventQueue,
    pub(crate) listeners: Listeners,
    pub(crate) last_commit: Option<CommitStats>,
}

impl TextModel {
    pub fn new(text: &str) -> Self {
        Self::with_options(text, TextModelOptions::default())
    }

    pub fn with_options(text: &str, options: TextModelOptions) -> Self {
        Self::with_id(ModelId::new(), text, options)
    }

    pub fn with_id(id: ModelId, text: &str, options: TextModelOptions) -> Self {
        let eol = detect_eol(text, options.default_eol);
        Self {
            decorations: DecorationsTracker::new(id.decoration_prefix()),
            id,
            options,
            lines: build_lines(text),
            eol,
            markers: MarkerArena::default(),
            version_id: 1,
            alternative_version_id: 1,
            edit_stack: EditStack::default(),
            is_undoing: false,
            is_redoing: false,
            trim_auto_whitespace_lines: None,
            events: EventQueue::default(),
            listeners: Listeners::default(),
            last_commit: None,
        }
    }

    /// Build a model from raw bytes, dropping a leading UTF-8 BOM.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let text = std::str::from_utf8(bytes).context("text model content is not valid UTF-8")?;
        Ok(Self::new(text.strip_prefix('\u{feff}').unwrap_or(text)))
    }

    // ============ Identity & versions ============

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn options(&self) -> &TextModelOptions {
        &self.options
    }

    pub fn eol(&self) -> EndOfLine {
        self.eol
    }

    /// Increases on every change to the content.
    pub fn version_id(&self) -> u64 {
        self.version_id
    }

    /// Equal to `version_id` after a normal edit; after undo/redo it is the
    /// version recorded for the state the model returned to.
    pub fn alternative_version_id(&self) -> u64 {
        self.alternative_version_id
    }

    pub(crate) fn increase_version_id(&mut self, by: u64) {
        self.version_id += by;
        self.alternative_version_id = self.version_id;
    }

    // ============ Reading ============

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_content(&self, line_number: usize) -> Option<&str> {
        self.line(line_number).map(ModelLine::text)
    }

    pub fn lines_content(&self) -> Vec<&str> {
        self.lines.iter().map(ModelLine::text).collect()
    }

    pub fn line_max_column(&self, line_number: usize) -> Option<usize> {
        self.line(line_number).map(ModelLine::max_column)
    }

    pub fn line_length(&self, line_number: usize) -> Option<usize> {
        self.line(line_number).map(ModelLine::len16)
    }

    /// Column of the first non-whitespace character, `None` for blank lines.
    pub fn line_first_non_whitespace_column(&self, line_number: usize) -> Option<usize> {
        first_non_whitespace_index(self.line_content(line_number)?).map(|index| index + 1)
    }

    /// Column just after the last non-whitespace character.
    pub fn line_last_non_whitespace_column(&self, line_number: usize) -> Option<usize> {
        last_non_whitespace_index(self.line_content(line_number)?).map(|index| index + 2)
    }

    pub(crate) fn line(&self, line_number: usize) -> Option<&ModelLine> {
        line_number
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
    }

    pub fn full_model_range(&self) -> Range {
        let line_count = self.line_count();
        Range::new(1, 1, line_count, self.lines[line_count - 1].max_column())
    }

    pub fn value(&self, eol: EndOfLinePreference) -> String {
        self.value_in_range(self.full_model_range(), eol)
    }

    pub fn value_in_range(&self, range: Range, eol: EndOfLinePreference) -> String {
        let range = self.validate_range(range);
        if range.is_empty() {
            return String::new();
        }
        let separator = self.eol_for(eol);
        let start = &self.lines[range.start.line_number - 1];
        if range.is_single_line() {
            return utf16_slice(start.text(), range.start.column - 1, range.end.column - 1)
                .to_string();
        }

        let mut value = String::new();
        value.push_str(utf16_slice(
            start.text(),
            range.start.column - 1,
            start.len16(),
        ));
        for line in &self.lines[range.start.line_number..range.end.line_number - 1] {
            value.push_str(separator);
            value.push_str(line.text());
        }
        value.push_str(separator);
        let end = &self.lines[range.end.line_number - 1];
        value.push_str(utf16_slice(end.text(), 0, range.end.column - 1));
        value
    }

    /// UTF-16 length of the text in `range`, line breaks counted with the
    /// model EOL.
    pub fn value_length_in_range(&self, range: Range) -> usize {
        let range = self.validate_range(range);
        if range.is_single_line() {
            return range.end.column - range.start.column;
        }
        let eol_len = self.eol.width();
        let start = &self.lines[range.start.line_number - 1];
        let middle: usize = self.lines[range.start.line_number..range.end.line_number - 1]
            .iter()
            .map(|line| line.len16() + eol_len)
            .sum();
        (start.max_column() - range.start.column) + eol_len + middle + range.end.column - 1
    }

    fn eol_for(&self, preference: EndOfLinePreference) -> &'static str {
        match preference {
            EndOfLinePreference::TextDefined => self.eol.as_str(),
            EndOfLinePreference::Lf => "\n",
            EndOfLinePreference::CrLf => "\r\n",
        }
    }

    /// UTF-16 offset of `position` from the start of the document.
    pub fn offset_at(&self, position: Position) -> usize {
        let position = self.validate_position(position);
        let eol_len = self.eol.width();
        let preceding: usize = self.lines[..position.line_number - 1]
            .iter()
            .map(|line| line.len16() + eol_len)
            .sum();
        preceding + position.column - 1
    }

    /// Inverse of `offset_at`; offsets past the end clamp to the last position.
    pub fn position_at(&self, offset: usize) -> Position {
        let eol_len = self.eol.width();
        let mut remaining = offset;
        for line in &self.lines {
            if remaining <= line.len16() {
                let column = snap_to_char_boundary(line.text(), remaining) + 1;
                return Position::new(line.line_number(), column);
            }
            remaining -= line.len16();
            if remaining < eol_len {
                // inside a CRLF: the position before the line break
                return Position::new(line.line_number(), line.max_column());
            }
            remaining -= eol_len;
        }
        self.full_model_range().end
    }

    // ============ Validation ============

    /// Clamp `position` into the document.
    ///
    /// Line numbers clamp to `1..=line_count`, columns to `1..=max_column`; a
    /// column inside a surrogate pair moves to the start of the character.
    pub fn validate_position(&self, position: Position) -> Position {
        let line_count = self.line_count();
        if position.line_number < 1 {
            return Position::new(1, 1);
        }
        if position.line_number > line_count {
            return Position::new(line_count, self.lines[line_count - 1].max_column());
        }
        let line = &self.lines[position.line_number - 1];
        let column = position.column.clamp(1, line.max_column());
        if column > 1 && column <= line.len16() && !line.text().is_ascii() {
            let units = column - 1;
            let byte = utf16_to_byte(line.text(), units);
            if utf16_len(&line.text()[..byte]) != units {
                return Position::new(
                    position.line_number,
                    snap_to_char_boundary(line.text(), units) + 1,
                );
            }
        }
        Position::new(position.line_number, column)
    }

    pub fn validate_range(&self, range: Range) -> Range {
        Range::from_positions(
            self.validate_position(range.start),
            self.validate_position(range.end),
        )
    }

    // ============ Whole-content mutations ============

    /// Replace the whole content.
    ///
    /// Markers, decorations and undo history are dropped.
    pub fn set_value(&mut self, text: &str) {
        self.with_deferred_events(|model| {
            for id in model.decorations.clear() {
                model.events.decorations.removed(&id);
            }
            model.markers.clear();
            model.lines = build_lines(text);
            model.eol = detect_eol(text, model.options.default_eol);
            model.edit_stack.clear();
            model.trim_auto_whitespace_lines = None;
            model.last_commit = None;
            model.increase_version_id(1);
            let version_id = model.version_id;
            model.emit(ModelEvent::Flushed { version_id });
        });
    }

    pub fn set_eol(&mut self, eol: EndOfLine) {
        if self.eol == eol {
            return;
        }
        self.with_deferred_events(|model| {
            model.eol = eol;
            model.increase_version_id(1);
            let version_id = model.version_id;
            model.emit(ModelEvent::Flushed { version_id });
        });
    }

    // ============ Invariants ============

    /// Panic if the line store, marker arena and decoration index disagree.
    pub fn assert_invariants(&self) {
        assert!(!self.lines.is_empty(), "a model always has one line");
        let mut handles = 0;
        for (index, line) in self.lines.iter().enumerate() {
            assert_eq!(line.line_number(), index + 1, "line number of line {index}");
            for id in line.markers() {
                let marker = self
                    .markers
                    .get(*id)
                    .unwrap_or_else(|| panic!("dead marker {id:?} on line {}", index + 1));
                assert_eq!(
                    marker.position.line_number,
                    index + 1,
                    "marker {id:?} on the wrong line"
                );
                assert!(
                    (1..=line.max_column()).contains(&marker.position.column),
                    "marker {id:?} at column {} outside line {}",
                    marker.position.column,
                    index + 1
                );
                handles += 1;
            }
        }
        assert_eq!(handles, self.markers.len(), "markers missing from lines");

        for decoration in self.decorations.decorations.values() {
            assert!(self.markers.contains(decoration.start_marker));
            assert!(self.markers.contains(decoration.end_marker));
            assert_eq!(
                decoration.is_multi_line,
                self.decorations.multi_line.contains(&decoration.key),
                "multi-line index out of date for {}",
                decoration.id
            );
            assert_eq!(decoration.is_multi_line, !decoration.range.is_single_line());
        }
        assert_eq!(self.markers.len(), self.unowned_marker_count() + 2 * self.decorations.len());
    }

    fn unowned_marker_count(&self) -> usize {
        self.lines
            .iter()
            .flat_map(|line| line.markers())
            .filter(|id| self.markers.get(**id).is_some_and(|m| m.owner.is_none()))
            .count()
    }

    /// Drop dead marker handles from lines in `first..=last`.
    #[cfg_attr(debug_assertions, allow(dead_code))]
    pub(crate) fn heal_lines(&mut self, first: usize, last: usize) {
        let last = last.min(self.lines.len());
        for index in first.saturating_sub(1)..last {
            let dropped = self.lines[index].retain_live_markers(&self.markers);
            if dropped > 0 {
                log::warn!("dropped {dropped} stale marker handles on line {}", index + 1);
            }
        }
    }
}

fn build_lines(text: &str) -> Vec<ModelLine> {
    split_lines(text)
        .into_iter()
        .enumerate()
        .map(|(index, line)| ModelLine::new(index + 1, line))
        .collect()
}

/// CRLF when `\r\n` outnumbers lone `\n`, LF when any other break exists.
fn detect_eol(text: &str, default_eol: EndOfLine) -> EndOfLine {
    let crlf = text.matches("\r\n").count();
    let breaks = text.matches(['\n', '\r']).count();
    if breaks == 0 {
        return default_eol;
    }
    let lf = text.matches('\n').count() - crlf;
    if crlf > lf {
        EndOfLine::CrLf
    } else {
        EndOfLine::Lf
    }
}
