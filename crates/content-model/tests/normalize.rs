use manos_content_model::{
    Block, Editor, EditorConfig, FormatContentModelOptions, Paragraph, Segment, SelectionMarker,
    Text,
};

fn commit(editor: &mut Editor, edit: impl FnOnce(&mut manos_content_model::ContentModelDocument)) {
    let changed = editor
        .format_content_model(
            |model, _| {
                edit(model);
                true
            },
            FormatContentModelOptions::default(),
        )
        .unwrap();
    assert!(changed);
}

#[test]
fn emptied_paragraph_keeps_a_line_break() {
    let mut editor = Editor::with_content("<div>ab</div>", EditorConfig::default()).unwrap();
    commit(&mut editor, |model| {
        let Block::Paragraph(paragraph) = &mut model.blocks[0] else {
            panic!("expected paragraph");
        };
        paragraph.segments = vec![Segment::SelectionMarker(SelectionMarker::new())];
    });
    assert_eq!(editor.get_content(), "<div><br></div>");
    assert!(editor.get_dom_selection().is_some());
}

#[test]
fn trailing_line_break_after_text_is_dropped() {
    let mut editor = Editor::with_content("<div>a<br></div>", EditorConfig::default()).unwrap();
    commit(&mut editor, |_| {});
    assert_eq!(editor.get_content(), "<div>a</div>");
}

#[test]
fn adjacent_runs_are_merged_before_writing() {
    let mut editor = Editor::with_content("<div>x</div>", EditorConfig::default()).unwrap();
    commit(&mut editor, |model| {
        model.blocks.push(
            Paragraph::new()
                .with_segment(Text::new("a"))
                .with_segment(Text::new(""))
                .with_segment(Text::new("b"))
                .into(),
        );
        model.blocks.push(Paragraph::implicit().into());
    });
    assert_eq!(editor.get_content(), "<div>x</div><div>ab</div>");

    let model = editor.create_content_model(None);
    assert_eq!(model.blocks.len(), 2);
    let Block::Paragraph(paragraph) = &model.blocks[1] else {
        panic!("expected paragraph");
    };
    assert_eq!(paragraph.segments.len(), 1);
}
