/*!
 * # Text Model
 *
 * A mutable, line-oriented document that keeps positions stable through
 * edits.
 *
 * ## Architecture Overview
 *
 * ### 1. Line Store
 * - The document is a `Vec<ModelLine>`; each line owns its text and the
 *   handles of the markers anchored on it
 * - Columns are 1-based and count UTF-16 code units
 *
 * ### 2. Markers in an Arena
 * - Marker data lives in a generational arena; lines and decorations only
 *   hold `MarkerId`s, so a stale handle resolves to nothing
 * - Each marker carries a stickiness flag deciding which side of an
 *   insertion at its exact position it ends up on
 *
 * ### 3. Decorations
 * - A decoration is a pair of markers plus normalized options
 * - Multi-line decorations are indexed separately; single-line ones are
 *   found through the markers of the lines being queried
 *
 * ### 4. Atomic Edit Batches
 * - `apply_edits` validates, sorts and overlap-checks a batch before
 *   touching anything, reduces huge batches to one operation, then applies
 *   from the end of the document backwards
 * - The inverse of every batch is returned so it can be undone
 *
 * ### 5. Undo/Redo and Events
 * - `push_edit_operations` records inverses on an edit stack
 * - Change events are queued while a mutation runs and delivered once at
 *   the end of the outermost scope
 *
 * ## Module Structure
 *
 * - [`position`] - `Position`, `Range` and `Selection`
 * - [`markers`] - marker arena and the public marker API
 * - [`options`] - decoration options and stickiness
 * - [`decorations`] - decoration tracking and queries
 * - [`edits`] - the edit applier
 * - [`undo`] - the undo/redo stack
 * - [`events`] - change events and listeners
 * - [`text_model`] - the `TextModel` itself
 */

pub mod decorations;
pub mod edits;
pub mod events;
mod line;
pub mod markers;
pub mod options;
pub mod position;
mod text;
pub mod text_model;
pub mod undo;

pub use decorations::{DecorationId, DecorationsAccessor, ModelDecoration, ModelDeltaDecoration};
pub use edits::{CommitStats, EditIdentifier, EditOperation, InverseEditOperation};
pub use events::{ContentChangedEvent, DecorationsChangedEvent, Listener, ListenerId, ModelEvent};
pub use markers::MarkerId;
pub use options::{
    DecorationOptions, ModelDecorationOptions, OverviewRulerLane, OverviewRulerOptions,
    TrackedRangeStickiness,
};
pub use position::{Position, Range, Selection};
pub use text_model::{EndOfLine, EndOfLinePreference, ModelId, TextModel, TextModelOptions};
