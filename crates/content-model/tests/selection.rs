use manos_content_model::selection::{get_selected_segments, has_selection};
use manos_content_model::{
    toggle_bold, DomPoint, DomRange, DomSelection, Editor, EditorConfig,
    FormatContentModelOptions, NodeId, Segment,
};

fn find_text(editor: &Editor, text: &str) -> NodeId {
    editor
        .dom()
        .descendants(editor.root())
        .into_iter()
        .find(|node| editor.dom().text(*node) == Some(text))
        .unwrap()
}

fn rewrite(editor: &mut Editor) {
    let changed = editor
        .format_content_model(|_, _| true, FormatContentModelOptions::default())
        .unwrap();
    assert!(changed);
}

#[test]
fn range_selection_is_stable_across_a_write() {
    let mut editor = Editor::with_content("<div>hello world</div><div>next</div>", EditorConfig::default()).unwrap();
    let hello = find_text(&editor, "hello world");
    let next = find_text(&editor, "next");
    let selection = DomSelection::range(DomRange::new(DomPoint::new(hello, 2), DomPoint::new(next, 3)));
    editor.set_dom_selection(Some(selection.clone()));

    rewrite(&mut editor);
    assert_eq!(editor.get_dom_selection(), Some(&selection));
    assert_eq!(editor.get_content(), "<div>hello world</div><div>next</div>");
}

#[test]
fn caret_is_stable_across_a_write() {
    let mut editor = Editor::with_content("<div>a<b>bc</b></div>", EditorConfig::default()).unwrap();
    let bc = find_text(&editor, "bc");
    let caret = DomSelection::caret(DomPoint::new(bc, 1));
    editor.set_dom_selection(Some(caret.clone()));

    rewrite(&mut editor);
    assert_eq!(editor.get_dom_selection(), Some(&caret));
}

#[test]
fn selected_text_maps_to_selected_segments() {
    let mut editor = Editor::with_content("<div>abcdef</div>", EditorConfig::default()).unwrap();
    let text = find_text(&editor, "abcdef");
    editor.set_dom_selection(Some(DomSelection::range(DomRange::new(
        DomPoint::new(text, 1),
        DomPoint::new(text, 4),
    ))));

    let model = editor.create_content_model(None);
    let selected: Vec<&str> = get_selected_segments(&model)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(selected, vec!["bcd"]);
}

#[test]
fn selection_outside_the_editor_is_ignored() {
    let mut editor = Editor::with_content("<div>abc</div>", EditorConfig::default()).unwrap();
    let stray = editor.dom_mut().create_text("elsewhere");
    editor.set_dom_selection(Some(DomSelection::caret(DomPoint::new(stray, 0))));
    assert!(editor.get_dom_selection().is_none());

    let model = editor.create_content_model(None);
    assert!(!has_selection(&model));
}

#[test]
fn selection_override_does_not_replace_the_editor_selection() {
    let mut editor = Editor::with_content("<div>abc</div>", EditorConfig::default()).unwrap();
    let text = find_text(&editor, "abc");
    let override_selection = DomSelection::caret(DomPoint::new(text, 1));

    let mut saw_marker = false;
    editor
        .format_content_model(
            |model, _| {
                saw_marker = get_selected_segments(model).iter().any(|s| s.is_marker());
                false
            },
            FormatContentModelOptions {
                selection_override: Some(override_selection),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(saw_marker);
    assert!(editor.get_dom_selection().is_none());
}

#[test]
fn image_selection_round_trips() {
    let mut editor = Editor::with_content("<div>a<img src=\"x.png\">b</div>", EditorConfig::default()).unwrap();
    let image = editor
        .dom()
        .descendants(editor.root())
        .into_iter()
        .find(|node| editor.dom().tag(*node) == Some("img"))
        .unwrap();
    let selection = DomSelection::Image { image };
    editor.set_dom_selection(Some(selection.clone()));

    rewrite(&mut editor);
    assert_eq!(editor.get_dom_selection(), Some(&selection));
}

#[test]
fn caret_on_either_side_of_a_text_seam_is_kept() {
    let mut editor = Editor::with_content("<div>a<b>bc</b>d</div>", EditorConfig::default()).unwrap();
    for text in ["a", "bc", "d"] {
        for offset in 0..=text.chars().count() {
            let node = find_text(&editor, text);
            let caret = DomSelection::caret(DomPoint::new(node, offset));
            editor.set_dom_selection(Some(caret.clone()));

            rewrite(&mut editor);
            assert_eq!(editor.get_dom_selection(), Some(&caret), "caret in {text:?} at {offset}");
        }
    }
    assert_eq!(editor.get_content(), "<div>a<b>bc</b>d</div>");
}

#[test]
fn caret_between_children_of_the_paragraph_is_kept() {
    let mut editor = Editor::with_content("<div>a<b>b</b></div>", EditorConfig::default()).unwrap();
    let paragraph = editor.dom().first_child(editor.root()).unwrap();
    let caret = DomSelection::caret(DomPoint::new(paragraph, 1));
    editor.set_dom_selection(Some(caret.clone()));

    rewrite(&mut editor);
    assert_eq!(editor.get_dom_selection(), Some(&caret));
}

#[test]
fn backward_selection_keeps_its_direction() {
    let mut editor = Editor::with_content("<div>hello world</div>", EditorConfig::default()).unwrap();
    let text = find_text(&editor, "hello world");
    editor.set_dom_selection(Some(DomSelection::range(DomRange::new(
        DomPoint::new(text, 11),
        DomPoint::new(text, 6),
    ))));
    assert!(matches!(
        editor.get_dom_selection(),
        Some(DomSelection::Range { is_reverted: true, .. })
    ));

    assert!(toggle_bold(&mut editor).unwrap());
    assert_eq!(editor.get_content(), "<div>hello <b>world</b></div>");
    let Some(DomSelection::Range { range, is_reverted }) = editor.get_dom_selection().cloned() else {
        panic!("expected a range selection");
    };
    assert!(is_reverted);
    assert_eq!(range.start, DomPoint::new(find_text(&editor, "hello "), 6));
    assert_eq!(range.end, DomPoint::new(find_text(&editor, "world"), 5));
}

#[test]
fn collapsing_a_backward_selection_drops_the_direction() {
    let mut editor = Editor::with_content("<div>abc</div>", EditorConfig::default()).unwrap();
    let text = find_text(&editor, "abc");
    editor.set_dom_selection(Some(DomSelection::range(DomRange::new(
        DomPoint::new(text, 3),
        DomPoint::new(text, 1),
    ))));

    let changed = editor
        .format_content_model(
            |model, _| {
                let Some(manos_content_model::Block::Paragraph(paragraph)) = model.blocks.first_mut() else {
                    return false;
                };
                paragraph.segments.retain(|segment| !segment.is_selected());
                paragraph.segments.insert(1, manos_content_model::SelectionMarker::new().into());
                true
            },
            FormatContentModelOptions::default(),
        )
        .unwrap();
    assert!(changed);
    assert_eq!(editor.get_content(), "<div>a</div>");
    assert!(matches!(
        editor.get_dom_selection(),
        Some(DomSelection::Range { is_reverted: false, range }) if range.is_collapsed()
    ));
}
