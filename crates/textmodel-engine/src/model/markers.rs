use std::collections::BTreeSet;

use crate::model::{Position, TextModel};

/// Handle to a marker in the model's marker arena.
///
/// The generation changes every time a slot is reused, so a handle kept
/// after its marker was removed resolves to nothing instead of silently
/// pointing at an unrelated marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId {
    index: u32,
    generation: u32,
}

/// Internal key of a decoration, used as the owner tag of its markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct DecorationKey(pub(crate) u32);

/// A position anchor living on exactly one line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LineMarker {
    pub(crate) position: Position,
    /// When text is inserted exactly at the marker: `true` keeps the marker
    /// before the new text, `false` moves it after.
    pub(crate) stick_to_previous_character: bool,
    pub(crate) owner: Option<DecorationKey>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    marker: Option<LineMarker>,
}

/// Generational storage for every marker of a model.
///
/// Lines and decorations store `MarkerId`s; only the arena owns marker data.
#[derive(Debug, Default)]
pub(crate) struct MarkerArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl MarkerArena {
    pub(crate) fn insert(&mut self, marker: LineMarker) -> MarkerId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.marker = Some(marker);
            return MarkerId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            marker: Some(marker),
        });
        MarkerId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn remove(&mut self, id: MarkerId) -> Option<LineMarker> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let marker = slot.marker.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(marker)
    }

    pub(crate) fn get(&self, id: MarkerId) -> Option<&LineMarker> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.marker.as_ref())
    }

    fn get_mut(&mut self, id: MarkerId) -> Option<&mut LineMarker> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.marker.as_mut())
    }

    pub(crate) fn contains(&self, id: MarkerId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn clear(&mut self) {
        // Bump generations so ids handed out before the clear stay dead.
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.marker.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.live = 0;
    }

    /// Sort key used by lines: column, then sticky markers first.
    pub(crate) fn sort_key(&self, id: MarkerId) -> (usize, u8) {
        match self.get(id) {
            Some(marker) => (
                marker.position.column,
                if marker.stick_to_previous_character { 0 } else { 1 },
            ),
            None => (usize::MAX, 2),
        }
    }

    pub(crate) fn set_stickiness(&mut self, id: MarkerId, stick_to_previous_character: bool) {
        if let Some(marker) = self.get_mut(id) {
            marker.stick_to_previous_character = stick_to_previous_character;
        }
    }

    pub(crate) fn update_column(
        &mut self,
        id: MarkerId,
        column: usize,
        tracker: &mut MarkersTracker,
    ) {
        if let Some(marker) = self.get_mut(id)
            && marker.position.column != column
        {
            marker.position.column = column;
            tracker.record(marker.owner);
        }
    }

    pub(crate) fn update_line_number(
        &mut self,
        id: MarkerId,
        line_number: usize,
        tracker: &mut MarkersTracker,
    ) {
        if let Some(marker) = self.get_mut(id)
            && marker.position.line_number != line_number
        {
            marker.position.line_number = line_number;
            tracker.record(marker.owner);
        }
    }

    pub(crate) fn update_position(
        &mut self,
        id: MarkerId,
        position: Position,
        tracker: &mut MarkersTracker,
    ) {
        if let Some(marker) = self.get_mut(id)
            && marker.position != position
        {
            marker.position = position;
            tracker.record(marker.owner);
        }
    }
}

/// Collects the owners of markers that moved during one mutation.
#[derive(Debug, Default)]
pub(crate) struct MarkersTracker {
    changed_owners: BTreeSet<DecorationKey>,
}

impl MarkersTracker {
    fn record(&mut self, owner: Option<DecorationKey>) {
        if let Some(owner) = owner {
            self.changed_owners.insert(owner);
        }
    }

    pub(crate) fn changed_owners(&self) -> impl Iterator<Item = DecorationKey> + '_ {
        self.changed_owners.iter().copied()
    }
}

// Public stable-position API. Markers created here have no owner; markers
// owned by a decoration are only moved through the decoration API.
impl TextModel {
    /// Anchor a new marker at `position` (validated against the model).
    pub fn add_marker(
        &mut self,
        position: Position,
        stick_to_previous_character: bool,
    ) -> MarkerId {
        self.add_marker_impl(None, position, stick_to_previous_character)
    }

    /// Current position of a marker, `None` once it has been removed.
    pub fn marker_position(&self, id: MarkerId) -> Option<Position> {
        self.markers.get(id).map(|marker| marker.position)
    }

    pub fn change_marker(&mut self, id: MarkerId, position: Position) {
        if !self.is_unowned_marker(id) {
            return;
        }
        let mut tracker = MarkersTracker::default();
        self.change_marker_impl(id, position, &mut tracker);
    }

    pub fn change_marker_stickiness(&mut self, id: MarkerId, stick_to_previous_character: bool) {
        if self.is_unowned_marker(id) {
            self.markers.set_stickiness(id, stick_to_previous_character);
        }
    }

    pub fn remove_marker(&mut self, id: MarkerId) {
        if self.is_unowned_marker(id) {
            self.remove_marker_impl(id);
        }
    }

    fn is_unowned_marker(&self, id: MarkerId) -> bool {
        match self.markers.get(id) {
            None => {
                log::debug!("ignoring unknown marker {id:?}");
                false
            }
            Some(marker) if marker.owner.is_some() => {
                log::warn!("marker {id:?} belongs to a decoration; use the decoration API");
                false
            }
            Some(_) => true,
        }
    }

    pub(crate) fn add_marker_impl(
        &mut self,
        owner: Option<DecorationKey>,
        position: Position,
        stick_to_previous_character: bool,
    ) -> MarkerId {
        let position = self.validate_position(position);
        let id = self.markers.insert(LineMarker {
            position,
            stick_to_previous_character,
            owner,
        });
        self.lines[position.line_number - 1].add_marker(id);
        id
    }

    pub(crate) fn change_marker_impl(
        &mut self,
        id: MarkerId,
        position: Position,
        tracker: &mut MarkersTracker,
    ) {
        let Some(old_line_number) = self.markers.get(id).map(|m| m.position.line_number) else {
            return;
        };
        let position = self.validate_position(position);
        if old_line_number != position.line_number {
            self.lines[old_line_number - 1].remove_marker(id);
            self.lines[position.line_number - 1].add_marker(id);
        }
        self.markers.update_position(id, position, tracker);
    }

    pub(crate) fn remove_marker_impl(&mut self, id: MarkerId) {
        if let Some(marker) = self.markers.remove(id)
            && let Some(line) = self.lines.get_mut(marker.position.line_number - 1)
        {
            line.remove_marker(id);
        }
    }
}
