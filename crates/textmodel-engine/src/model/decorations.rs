use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::model::markers::{DecorationKey, MarkerId, MarkersTracker};
use crate::model::{DecorationOptions, ModelDecorationOptions, Position, Range, TextModel};

/// Identifier of a decoration, unique across models: `"<model-prefix>;<n>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DecorationId(String);

impl DecorationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DecorationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DecorationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DecorationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A decoration as returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDecoration {
    pub id: DecorationId,
    pub owner_id: u32,
    pub range: Range,
    pub options: ModelDecorationOptions,
}

/// Input of `delta_decorations`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDeltaDecoration {
    pub range: Range,
    pub options: DecorationOptions,
}

impl ModelDeltaDecoration {
    pub fn new(range: Range, options: DecorationOptions) -> Self {
        Self { range, options }
    }
}

#[derive(Debug)]
pub(crate) struct InternalDecoration {
    pub(crate) id: DecorationId,
    pub(crate) key: DecorationKey,
    pub(crate) owner_id: u32,
    pub(crate) start_marker: MarkerId,
    pub(crate) end_marker: MarkerId,
    pub(crate) options: ModelDecorationOptions,
    pub(crate) range: Range,
    pub(crate) is_multi_line: bool,
}

impl InternalDecoration {
    fn to_model_decoration(&self) -> ModelDecoration {
        ModelDecoration {
            id: self.id.clone(),
            owner_id: self.owner_id,
            range: self.range,
            options: self.options.clone(),
        }
    }

    fn matches(&self, owner_filter: u32, exclude_validation: bool) -> bool {
        if owner_filter != 0 && self.owner_id != 0 && self.owner_id != owner_filter {
            return false;
        }
        !(exclude_validation && self.options.is_for_validation)
    }
}

/// All decorations of a model, indexed by id and by internal key.
#[derive(Debug)]
pub(crate) struct DecorationsTracker {
    id_prefix: String,
    next_id: u64,
    next_key: u32,
    by_id: HashMap<DecorationId, DecorationKey>,
    pub(crate) decorations: BTreeMap<DecorationKey, InternalDecoration>,
    pub(crate) multi_line: BTreeSet<DecorationKey>,
}

impl DecorationsTracker {
    pub(crate) fn new(id_prefix: String) -> Self {
        Self {
            id_prefix,
            next_id: 0,
            next_key: 0,
            by_id: HashMap::new(),
            decorations: BTreeMap::new(),
            multi_line: BTreeSet::new(),
        }
    }

    fn allocate(&mut self) -> (DecorationId, DecorationKey) {
        self.next_id += 1;
        let key = DecorationKey(self.next_key);
        self.next_key += 1;
        (
            DecorationId(format!("{};{}", self.id_prefix, self.next_id)),
            key,
        )
    }

    pub(crate) fn key_of(&self, id: &DecorationId) -> Option<DecorationKey> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn get(&self, key: DecorationKey) -> Option<&InternalDecoration> {
        self.decorations.get(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.decorations.len()
    }

    fn insert(&mut self, decoration: InternalDecoration) {
        if decoration.is_multi_line {
            self.multi_line.insert(decoration.key);
        }
        self.by_id.insert(decoration.id.clone(), decoration.key);
        self.decorations.insert(decoration.key, decoration);
    }

    fn remove(&mut self, key: DecorationKey) -> Option<InternalDecoration> {
        let decoration = self.decorations.remove(&key)?;
        self.by_id.remove(&decoration.id);
        self.multi_line.remove(&key);
        Some(decoration)
    }

    pub(crate) fn clear(&mut self) -> Vec<DecorationId> {
        self.by_id.clear();
        self.multi_line.clear();
        std::mem::take(&mut self.decorations)
            .into_values()
            .map(|decoration| decoration.id)
            .collect()
    }
}

/// Resolve a decoration's range from its two markers.
///
/// If an edit left the end marker before the start marker the range
/// collapses to the end position.
fn resolve_range(start: Position, end: Position) -> Range {
    if end < start {
        Range::empty_at(end)
    } else {
        Range { start, end }
    }
}

/// Scoped access to decoration mutations for one owner.
///
/// Obtained through [`TextModel::change_decorations`]; every change made
/// through it is reported in one `DecorationsChanged` event.
pub struct DecorationsAccessor<'a> {
    model: &'a mut TextModel,
    owner_id: u32,
}

impl DecorationsAccessor<'_> {
    pub fn add_decoration(&mut self, range: Range, options: DecorationOptions) -> DecorationId {
        self.model
            .add_decoration_impl(self.owner_id, range, options.into())
    }

    pub fn change_decoration(&mut self, id: &DecorationId, range: Range) {
        self.model.change_decoration_impl(id, range);
    }

    pub fn change_decoration_options(&mut self, id: &DecorationId, options: DecorationOptions) {
        self.model.change_decoration_options_impl(id, options.into());
    }

    pub fn remove_decoration(&mut self, id: &DecorationId) {
        self.model.remove_decoration_impl(id);
    }

    pub fn delta_decorations(
        &mut self,
        old_ids: &[DecorationId],
        new_decorations: Vec<ModelDeltaDecoration>,
    ) -> Vec<DecorationId> {
        self.model
            .delta_decorations_impl(self.owner_id, old_ids, new_decorations)
    }
}

impl TextModel {
    // ============ Mutations ============

    pub fn add_decoration(&mut self, range: Range, options: DecorationOptions) -> DecorationId {
        self.with_deferred_events(|model| model.add_decoration_impl(0, range, options.into()))
    }

    pub fn change_decoration(&mut self, id: &DecorationId, range: Range) {
        self.with_deferred_events(|model| model.change_decoration_impl(id, range));
    }

    pub fn change_decoration_options(&mut self, id: &DecorationId, options: DecorationOptions) {
        self.with_deferred_events(|model| {
            model.change_decoration_options_impl(id, options.into())
        });
    }

    pub fn remove_decoration(&mut self, id: &DecorationId) {
        self.with_deferred_events(|model| model.remove_decoration_impl(id));
    }

    /// Replace `old_ids` with `new_decorations`, reusing the id of every old
    /// decoration whose range and options match a new one exactly.
    ///
    /// Returns the ids of the new decorations in submission order.
    pub fn delta_decorations(
        &mut self,
        old_ids: &[DecorationId],
        new_decorations: Vec<ModelDeltaDecoration>,
    ) -> Vec<DecorationId> {
        self.with_deferred_events(|model| model.delta_decorations_impl(0, old_ids, new_decorations))
    }

    /// Perform several decoration changes for `owner_id` as one batch.
    pub fn change_decorations<R>(
        &mut self,
        owner_id: u32,
        f: impl FnOnce(&mut DecorationsAccessor<'_>) -> R,
    ) -> R {
        self.with_deferred_events(|model| {
            let mut accessor = DecorationsAccessor { model, owner_id };
            f(&mut accessor)
        })
    }

    pub fn remove_all_decorations_with_owner_id(&mut self, owner_id: u32) {
        let ids: Vec<DecorationId> = self
            .decorations
            .decorations
            .values()
            .filter(|decoration| decoration.owner_id == owner_id)
            .map(|decoration| decoration.id.clone())
            .collect();
        self.with_deferred_events(|model| {
            for id in &ids {
                model.remove_decoration_impl(id);
            }
        });
    }

    pub(crate) fn add_decoration_impl(
        &mut self,
        owner_id: u32,
        range: Range,
        options: ModelDecorationOptions,
    ) -> DecorationId {
        let range = self.validate_range(range);
        let (id, key) = self.decorations.allocate();
        let stickiness = options.stickiness;
        let start_marker = self.add_marker_impl(
            Some(key),
            range.start,
            stickiness.start_sticks_to_previous_character(),
        );
        let end_marker = self.add_marker_impl(
            Some(key),
            range.end,
            stickiness.end_sticks_to_previous_character(),
        );
        self.decorations.insert(InternalDecoration {
            id: id.clone(),
            key,
            owner_id,
            start_marker,
            end_marker,
            options,
            range,
            is_multi_line: !range.is_single_line(),
        });
        self.events.decorations.added(&id);
        id
    }

    pub(crate) fn change_decoration_impl(&mut self, id: &DecorationId, range: Range) {
        let Some(key) = self.decorations.key_of(id) else {
            log::debug!("ignoring change of unknown decoration {id}");
            return;
        };
        let Some((start_marker, end_marker)) = self
            .decorations
            .get(key)
            .map(|decoration| (decoration.start_marker, decoration.end_marker))
        else {
            return;
        };
        let range = self.validate_range(range);
        let mut tracker = MarkersTracker::default();
        self.change_marker_impl(start_marker, range.start, &mut tracker);
        self.change_marker_impl(end_marker, range.end, &mut tracker);
        self.refresh_decoration(key);
        self.events.decorations.changed(id);
    }

    pub(crate) fn change_decoration_options_impl(
        &mut self,
        id: &DecorationId,
        options: ModelDecorationOptions,
    ) {
        let Some(key) = self.decorations.key_of(id) else {
            log::debug!("ignoring options change of unknown decoration {id}");
            return;
        };
        let Some(decoration) = self.decorations.decorations.get_mut(&key) else {
            return;
        };
        let stickiness = options.stickiness;
        decoration.options = options;
        let (start_marker, end_marker) = (decoration.start_marker, decoration.end_marker);
        self.markers
            .set_stickiness(start_marker, stickiness.start_sticks_to_previous_character());
        self.markers
            .set_stickiness(end_marker, stickiness.end_sticks_to_previous_character());
        self.events.decorations.changed(id);
    }

    pub(crate) fn remove_decoration_impl(&mut self, id: &DecorationId) {
        let Some(key) = self.decorations.key_of(id) else {
            log::debug!("ignoring removal of unknown decoration {id}");
            return;
        };
        if let Some(decoration) = self.decorations.remove(key) {
            self.remove_marker_impl(decoration.start_marker);
            self.remove_marker_impl(decoration.end_marker);
            self.events.decorations.removed(id);
        }
    }

    pub(crate) fn delta_decorations_impl(
        &mut self,
        owner_id: u32,
        old_ids: &[DecorationId],
        new_decorations: Vec<ModelDeltaDecoration>,
    ) -> Vec<DecorationId> {
        let mut seen = HashSet::new();
        let mut old: Vec<(DecorationKey, Range)> = old_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .filter_map(|id| {
                let key = self.decorations.key_of(id)?;
                let decoration = self.decorations.get(key)?;
                Some((key, decoration.range))
            })
            .collect();
        old.sort_by(|a, b| a.1.compare_using_starts(&b.1).then(a.0.cmp(&b.0)));

        let mut new: Vec<(usize, Range, ModelDecorationOptions)> = new_decorations
            .into_iter()
            .enumerate()
            .map(|(index, delta)| (index, self.validate_range(delta.range), delta.options.into()))
            .collect();
        new.sort_by(|a, b| a.1.compare_using_starts(&b.1).then(a.0.cmp(&b.0)));

        let mut result: Vec<Option<DecorationId>> = vec![None; new.len()];
        let (mut i, mut j) = (0, 0);
        while i < old.len() && j < new.len() {
            let (old_key, old_range) = old[i];
            let (index, new_range, ref new_options) = new[j];
            match old_range.compare_using_starts(&new_range) {
                Ordering::Less => {
                    self.remove_decoration_by_key(old_key);
                    i += 1;
                }
                Ordering::Greater => {
                    result[index] =
                        Some(self.add_decoration_impl(owner_id, new_range, new_options.clone()));
                    j += 1;
                }
                Ordering::Equal => {
                    let reused = self
                        .decorations
                        .get(old_key)
                        .filter(|decoration| {
                            decoration.owner_id == owner_id && decoration.options == *new_options
                        })
                        .map(|decoration| decoration.id.clone());
                    i += 1;
                    match reused {
                        Some(id) => {
                            result[index] = Some(id);
                            j += 1;
                        }
                        None => self.remove_decoration_by_key(old_key),
                    }
                }
            }
        }
        for (old_key, _) in &old[i..] {
            self.remove_decoration_by_key(*old_key);
        }
        for (index, range, options) in new.drain(j..) {
            result[index] = Some(self.add_decoration_impl(owner_id, range, options));
        }

        result.into_iter().flatten().collect()
    }

    fn remove_decoration_by_key(&mut self, key: DecorationKey) {
        if let Some(id) = self.decorations.get(key).map(|d| d.id.clone()) {
            self.remove_decoration_impl(&id);
        }
    }

    /// Recompute cached ranges of decorations whose markers moved.
    pub(crate) fn refresh_decorations(&mut self, tracker: &MarkersTracker) {
        for key in tracker.changed_owners() {
            if self.refresh_decoration(key)
                && let Some(id) = self.decorations.get(key).map(|d| d.id.clone())
            {
                self.events.decorations.changed(&id);
            }
        }
    }

    /// Returns true when the cached range changed.
    fn refresh_decoration(&mut self, key: DecorationKey) -> bool {
        let Some(decoration) = self.decorations.decorations.get(&key) else {
            return false;
        };
        let (Some(start), Some(end)) = (
            self.markers.get(decoration.start_marker),
            self.markers.get(decoration.end_marker),
        ) else {
            log::warn!("decoration {} lost one of its markers", decoration.id);
            return false;
        };
        let range = resolve_range(start.position, end.position);
        if range == decoration.range {
            return false;
        }

        let is_multi_line = !range.is_single_line();
        if let Some(decoration) = self.decorations.decorations.get_mut(&key) {
            decoration.range = range;
            decoration.is_multi_line = is_multi_line;
        }
        if is_multi_line {
            self.decorations.multi_line.insert(key);
        } else {
            self.decorations.multi_line.remove(&key);
        }
        true
    }

    // ============ Queries ============

    pub fn decoration_range(&self, id: &DecorationId) -> Option<Range> {
        let key = self.decorations.key_of(id)?;
        self.decorations.get(key).map(|decoration| decoration.range)
    }

    pub fn decoration_options(&self, id: &DecorationId) -> Option<&ModelDecorationOptions> {
        let key = self.decorations.key_of(id)?;
        self.decorations.get(key).map(|decoration| &decoration.options)
    }

    pub fn decoration_owner_id(&self, id: &DecorationId) -> Option<u32> {
        let key = self.decorations.key_of(id)?;
        self.decorations.get(key).map(|decoration| decoration.owner_id)
    }

    /// Decorations intersecting `range` (touching counts).
    ///
    /// `owner_filter == 0` returns every owner; otherwise only decorations
    /// of that owner and those without an owner.
    pub fn decorations_in_range(
        &self,
        range: Range,
        owner_filter: u32,
        exclude_validation: bool,
    ) -> Vec<ModelDecoration> {
        let range = self.validate_range(range);
        self.collect_decorations(range, owner_filter, exclude_validation)
    }

    pub fn line_decorations(
        &self,
        line_number: usize,
        owner_filter: u32,
        exclude_validation: bool,
    ) -> Vec<ModelDecoration> {
        self.lines_decorations(line_number, line_number, owner_filter, exclude_validation)
    }

    pub fn lines_decorations(
        &self,
        start_line_number: usize,
        end_line_number: usize,
        owner_filter: u32,
        exclude_validation: bool,
    ) -> Vec<ModelDecoration> {
        let line_count = self.line_count();
        if start_line_number < 1 || start_line_number > line_count {
            return Vec::new();
        }
        let end_line_number = end_line_number.clamp(start_line_number, line_count);
        let range = Range::new(
            start_line_number,
            1,
            end_line_number,
            self.lines[end_line_number - 1].max_column(),
        );
        self.collect_decorations(range, owner_filter, exclude_validation)
    }

    pub fn all_decorations(
        &self,
        owner_filter: u32,
        exclude_validation: bool,
    ) -> Vec<ModelDecoration> {
        self.decorations
            .decorations
            .values()
            .filter(|decoration| decoration.matches(owner_filter, exclude_validation))
            .collect::<Vec<_>>()
            .into_sorted_decorations()
    }

    /// Multi-line decorations come from the side index; single-line ones are
    /// found through the markers of the lines inside `range`.
    fn collect_decorations(
        &self,
        range: Range,
        owner_filter: u32,
        exclude_validation: bool,
    ) -> Vec<ModelDecoration> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for key in &self.decorations.multi_line {
            if let Some(decoration) = self.decorations.get(*key)
                && decoration.range.intersects(&range)
                && seen.insert(*key)
            {
                found.push(decoration);
            }
        }

        for line in &self.lines[range.start.line_number - 1..range.end.line_number] {
            for marker_id in line.markers() {
                let Some(key) = self.markers.get(*marker_id).and_then(|marker| marker.owner) else {
                    continue;
                };
                if self.decorations.multi_line.contains(&key) || seen.contains(&key) {
                    continue;
                }
                if let Some(decoration) = self.decorations.get(key)
                    && decoration.range.intersects(&range)
                {
                    seen.insert(key);
                    found.push(decoration);
                }
            }
        }

        found.retain(|decoration| decoration.matches(owner_filter, exclude_validation));
        found.into_sorted_decorations()
    }
}

trait IntoSortedDecorations {
    fn into_sorted_decorations(self) -> Vec<ModelDecoration>;
}

impl IntoSortedDecorations for Vec<&InternalDecoration> {
    /// Range start, then range end, then creation order.
    fn into_sorted_decorations(mut self) -> Vec<ModelDecoration> {
        self.sort_by(|a, b| a.range.compare_using_starts(&b.range).then(a.key.cmp(&b.key)));
        self.into_iter()
            .map(InternalDecoration::to_model_decoration)
            .collect()
    }
}
