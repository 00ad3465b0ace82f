use anyhow::Context as _;
use manos_content_model::{
    toggle_bold, Block, DomPoint, DomRange, DomSelection, Editor, EditorConfig,
    FormatContentModelOptions, NodeId, Paragraph, Text,
};

fn find_text(editor: &Editor, text: &str) -> NodeId {
    editor
        .dom()
        .descendants(editor.root())
        .into_iter()
        .find(|node| editor.dom().text(*node) == Some(text))
        .unwrap()
}

fn append_paragraph(editor: &mut Editor, text: &str) {
    let text = text.to_string();
    editor
        .format_content_model(
            move |model, _| {
                model.blocks.push(Paragraph::new().with_segment(Text::new(text)).into());
                true
            },
            FormatContentModelOptions::default(),
        )
        .unwrap();
}

#[test]
fn undo_and_redo_walk_the_history() -> anyhow::Result<()> {
    let mut editor = Editor::with_content("<div>hello world</div>", EditorConfig::default())?;
    assert!(!editor.can_undo());

    let text = editor
        .dom()
        .descendants(editor.root())
        .into_iter()
        .find(|node| editor.dom().is_text(*node))
        .context("editor has no text node")?;
    editor.set_dom_selection(Some(DomSelection::range(DomRange::new(
        DomPoint::new(text, 0),
        DomPoint::new(text, 5),
    ))));
    assert!(toggle_bold(&mut editor)?);
    assert_eq!(editor.get_content(), "<div><b>hello</b> world</div>");
    assert!(editor.can_undo());

    assert!(editor.undo()?);
    assert_eq!(editor.get_content(), "<div>hello world</div>");
    assert!(editor.can_redo());
    assert!(!editor.undo()?);

    assert!(editor.redo()?);
    assert_eq!(editor.get_content(), "<div><b>hello</b> world</div>");
    assert!(!editor.can_redo());
    Ok(())
}

#[test]
fn undo_restores_the_recorded_selection() {
    let mut editor = Editor::with_content("<div>abc</div>", EditorConfig::default()).unwrap();
    let text = find_text(&editor, "abc");
    editor.set_dom_selection(Some(DomSelection::caret(DomPoint::new(text, 2))));
    append_paragraph(&mut editor, "d");

    assert!(editor.undo().unwrap());
    let restored = find_text(&editor, "abc");
    assert_eq!(
        editor.get_dom_selection(),
        Some(&DomSelection::caret(DomPoint::new(restored, 2)))
    );
}

#[test]
fn a_new_change_drops_the_redo_branch() {
    let mut editor = Editor::with_content("<div>a</div>", EditorConfig::default()).unwrap();
    append_paragraph(&mut editor, "b");
    assert!(editor.undo().unwrap());
    append_paragraph(&mut editor, "c");

    assert!(!editor.can_redo());
    assert_eq!(editor.get_content(), "<div>a</div><div>c</div>");
    assert!(editor.undo().unwrap());
    assert_eq!(editor.get_content(), "<div>a</div>");
}

#[test]
fn skipped_snapshot_is_not_undoable_on_its_own() {
    let mut editor = Editor::with_content("<div>a</div>", EditorConfig::default()).unwrap();
    editor
        .format_content_model(
            |model, context| {
                context.skip_undo_snapshot = true;
                model.blocks.push(Paragraph::new().with_segment(Text::new("b")).into());
                true
            },
            FormatContentModelOptions::default(),
        )
        .unwrap();
    append_paragraph(&mut editor, "c");

    // The skipped change is folded into the snapshot taken before the next one.
    assert!(editor.undo().unwrap());
    assert_eq!(editor.get_content(), "<div>a</div><div>b</div>");
    assert!(editor.undo().unwrap());
    assert_eq!(editor.get_content(), "<div>a</div>");
}

#[test]
fn history_is_bounded_by_config() {
    let config = EditorConfig::from_json(r#"{"maxUndoSnapshots": 2}"#).unwrap();
    let mut editor = Editor::with_content("<div>a</div>", config).unwrap();
    for text in ["b", "c", "d"] {
        append_paragraph(&mut editor, text);
    }
    assert!(editor.undo().unwrap());
    assert!(!editor.undo().unwrap());
    let model = editor.create_content_model(None);
    assert_eq!(model.blocks.len(), 3);
    assert!(matches!(model.blocks[0], Block::Paragraph(_)));
}

#[test]
fn replaced_content_does_not_grow_the_arena() {
    let mut editor = Editor::with_content("<div>a</div><div>c</div>", EditorConfig::default()).unwrap();
    let live = editor.dom().live_count();

    editor.set_content("<div>a</div><div>b</div>").unwrap();
    assert!(editor.undo().unwrap());
    let capacity = editor.dom().capacity();

    for _ in 0..10 {
        editor.set_content("<div>a</div><div>b</div>").unwrap();
        assert!(editor.undo().unwrap());
        assert_eq!(editor.get_content(), "<div>a</div><div>c</div>");
        assert_eq!(editor.dom().capacity(), capacity);
        assert_eq!(editor.dom().live_count(), live);
    }
}

#[test]
fn nodes_dropped_by_a_transaction_are_freed() {
    let mut editor = Editor::with_content("<div>a</div><div>b</div>", EditorConfig::default()).unwrap();
    let dropped = find_text(&editor, "b");
    editor
        .format_content_model(
            |model, _| {
                model.blocks.pop();
                true
            },
            FormatContentModelOptions::default(),
        )
        .unwrap();
    assert_eq!(editor.get_content(), "<div>a</div>");
    assert!(!editor.dom().contains_node(dropped));

    assert!(editor.undo().unwrap());
    assert_eq!(editor.get_content(), "<div>a</div><div>b</div>");
}
