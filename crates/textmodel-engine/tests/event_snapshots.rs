use std::cell::RefCell;
use std::rc::Rc;

use textmodel_engine::{
    DecorationOptions, EditOperation, ModelEvent, Position, Range, Selection, TextModel,
};

/// Render events one per line; decoration ids are random so only counts show.
fn format_events(events: &[ModelEvent]) -> String {
    let mut output = String::new();
    for event in events {
        let line = match event {
            ModelEvent::LineChanged {
                line_number,
                text,
                version_id,
            } => format!("line-changed {line_number} {text:?} v{version_id}"),
            ModelEvent::LinesInserted {
                from_line,
                to_line,
                text,
                version_id,
            } => format!("lines-inserted {from_line}..={to_line} {text:?} v{version_id}"),
            ModelEvent::LinesDeleted {
                from_line,
                to_line,
                version_id,
            } => format!("lines-deleted {from_line}..={to_line} v{version_id}"),
            ModelEvent::ContentChanged(change) => format!(
                "content-changed {} len={} {:?} v{}{}{}",
                change.range,
                change.range_length,
                change.text,
                change.version_id,
                if change.is_undoing { " undoing" } else { "" },
                if change.is_redoing { " redoing" } else { "" },
            ),
            ModelEvent::DecorationsChanged(change) => format!(
                "decorations-changed added={} changed={} removed={}",
                change.added.len(),
                change.changed.len(),
                change.removed.len()
            ),
            ModelEvent::Flushed { version_id } => format!("flushed v{version_id}"),
        };
        output.push_str(&line);
        output.push('\n');
    }
    output
}

fn record_events(model: &mut TextModel) -> Rc<RefCell<Vec<ModelEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    model.on_did_change(move |_, event| sink.borrow_mut().push(event.clone()));
    log
}

#[test]
fn test_join_undo_redo_event_log() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut model = TextModel::new("abc\ndef");
    let events = record_events(&mut model);

    model.add_decoration(Range::new(2, 1, 2, 3), DecorationOptions::with_class_name("x"));
    model
        .push_edit_operations(
            &[Selection::collapsed(Position::new(1, 3))],
            vec![EditOperation::delete(Range::new(1, 3, 2, 2))],
            |_| None,
        )
        .unwrap();
    model.undo();
    model.redo();

    insta::assert_snapshot!(format_events(&events.borrow()), @r#"
    decorations-changed added=1 changed=0 removed=0
    line-changed 1 "ab" v2
    line-changed 1 "abef" v3
    lines-deleted 2..=2 v4
    content-changed [1,3 -> 2,2] len=3 "" v4
    decorations-changed added=0 changed=1 removed=0
    line-changed 1 "abcef" v5
    line-changed 1 "abc" v6
    lines-inserted 2..=2 "def" v7
    content-changed [1,3 -> 1,3] len=0 "c\nd" v7 undoing
    decorations-changed added=0 changed=1 removed=0
    line-changed 1 "ab" v8
    line-changed 1 "abef" v9
    lines-deleted 2..=2 v10
    content-changed [1,3 -> 2,2] len=3 "" v10 redoing
    decorations-changed added=0 changed=1 removed=0
    "#);
}

#[test]
fn test_set_value_event_log() {
    let mut model = TextModel::new("one\ntwo");
    model.add_decoration(Range::new(1, 1, 1, 2), DecorationOptions::default());
    let events = record_events(&mut model);

    model.set_value("three");

    insta::assert_snapshot!(format_events(&events.borrow()), @r#"
    flushed v2
    decorations-changed added=0 changed=0 removed=1
    "#);
}
