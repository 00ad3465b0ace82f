use std::cell::RefCell;
use std::rc::Rc;

use manos_content_model::{
    insert_entity, insert_image, remove_entity, Block, DomPoint, DomSelection, Editor,
    EditorConfig, EditorError, EditorEvent, EntityOperation, FormatContentModelOptions, NodeId,
};

const CONTENT: &str = "<div>a</div><div class=\"_Entity _EType_chart _EId_c1\" contenteditable=\"false\"><canvas></canvas></div><div>b</div>";

fn record_events(editor: &mut Editor) -> Rc<RefCell<Vec<EditorEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    editor.add_observer(move |event| sink.borrow_mut().push(event.clone()));
    events
}

fn find_text(editor: &Editor, text: &str) -> NodeId {
    editor
        .dom()
        .descendants(editor.root())
        .into_iter()
        .find(|node| editor.dom().text(*node) == Some(text))
        .unwrap()
}

#[test]
fn moving_an_entity_keeps_its_wrapper() {
    let mut editor = Editor::with_content(CONTENT, EditorConfig::default()).unwrap();
    let wrapper = editor.entity("c1").unwrap().wrapper;
    let canvas = editor.dom().first_child(wrapper).unwrap();

    let changed = editor
        .format_content_model(
            |model, _| {
                let entity = model.blocks.remove(1);
                model.blocks.insert(0, entity);
                true
            },
            FormatContentModelOptions::default(),
        )
        .unwrap();
    assert!(changed);

    let root = editor.root();
    assert_eq!(editor.dom().first_child(root), Some(wrapper));
    assert_eq!(editor.dom().first_child(wrapper), Some(canvas));
    assert_eq!(editor.dom().text_content(root), "ab");
}

#[test]
fn removed_entity_comes_back_as_the_same_node_on_undo() {
    let mut editor = Editor::with_content(CONTENT, EditorConfig::default()).unwrap();
    let events = record_events(&mut editor);
    let wrapper = editor.entity("c1").unwrap().wrapper;
    let root = editor.root();

    assert!(remove_entity(&mut editor, "c1", EntityOperation::Overwrite).unwrap());
    assert!(!editor.dom().contains(root, wrapper));
    assert!(editor.entity("c1").is_none());
    assert_eq!(editor.get_content(), "<div>a</div><div>b</div>");
    assert!(events.borrow().iter().any(|event| matches!(
        event,
        EditorEvent::EntityOperation {
            operation: EntityOperation::Overwrite,
            entity_id,
            ..
        } if entity_id == "c1"
    )));

    assert!(editor.undo().unwrap());
    assert_eq!(editor.dom().children(root).get(1), Some(&wrapper));
    assert_eq!(editor.entity("c1").map(|record| record.wrapper), Some(wrapper));

    assert!(editor.redo().unwrap());
    assert!(!editor.dom().contains(root, wrapper));
}

#[test]
fn removing_an_unknown_entity_is_an_error() {
    let mut editor = Editor::with_content("<div>a</div>", EditorConfig::default()).unwrap();
    let err = remove_entity(&mut editor, "nope", EntityOperation::Overwrite).unwrap_err();
    assert!(matches!(err, EditorError::UnknownEntity(id) if id == "nope"));
}

#[test]
fn inline_entity_is_inserted_at_the_caret() {
    let mut editor = Editor::with_content("<div>ab</div>", EditorConfig::default()).unwrap();
    let events = record_events(&mut editor);
    let text = find_text(&editor, "ab");
    editor.set_dom_selection(Some(DomSelection::caret(DomPoint::new(text, 1))));

    let id = insert_entity(&mut editor, "mention", false, "@bob").unwrap().unwrap();
    assert_eq!(id, "mention_1");

    let record = editor.entity(&id).unwrap();
    let root = editor.root();
    assert!(editor.dom().contains(root, record.wrapper));
    assert_eq!(editor.dom().tag(record.wrapper), Some("span"));
    assert_eq!(editor.dom().attribute(record.wrapper, "contenteditable"), Some("false"));
    assert_eq!(editor.dom().text_content(root), "a@bobb");
    assert!(events.borrow().iter().any(|event| matches!(
        event,
        EditorEvent::EntityOperation {
            operation: EntityOperation::NewEntity,
            ..
        }
    )));

    // The entity shows up as an opaque segment on the next build.
    let model = editor.create_content_model(None);
    let Block::Paragraph(paragraph) = &model.blocks[0] else {
        panic!("expected paragraph");
    };
    assert!(paragraph.segments.iter().any(|segment| matches!(
        segment,
        manos_content_model::Segment::Entity(entity) if entity.entity_id == "mention_1"
    )));
}

#[test]
fn block_entity_goes_after_the_caret_paragraph() {
    let mut editor = Editor::with_content("<div>a</div><div>b</div>", EditorConfig::default()).unwrap();
    let text = find_text(&editor, "a");
    editor.set_dom_selection(Some(DomSelection::caret(DomPoint::new(text, 1))));

    let id = insert_entity(&mut editor, "divider", true, "<hr>").unwrap().unwrap();
    let wrapper = editor.entity(&id).unwrap().wrapper;
    let root = editor.root();
    assert_eq!(editor.dom().children(root).get(1), Some(&wrapper));
    assert_eq!(editor.dom().tag(wrapper), Some("div"));
}

#[test]
fn insert_without_selection_does_nothing() {
    let mut editor = Editor::with_content("<div>a</div>", EditorConfig::default()).unwrap();
    assert_eq!(insert_entity(&mut editor, "mention", false, "@x").unwrap(), None);
    assert_eq!(editor.get_content(), "<div>a</div>");
}

#[test]
fn inserted_image_is_reported() {
    let mut editor = Editor::with_content("<div>ab</div>", EditorConfig::default()).unwrap();
    let events = record_events(&mut editor);
    let text = find_text(&editor, "ab");
    editor.set_dom_selection(Some(DomSelection::caret(DomPoint::new(text, 2))));

    assert!(insert_image(&mut editor, "cat.png", Some("cat")).unwrap());
    assert_eq!(editor.get_content(), "<div>ab<img src=\"cat.png\" alt=\"cat\"></div>");
    assert!(events
        .borrow()
        .iter()
        .any(|event| matches!(event, EditorEvent::NewImage { src } if src == "cat.png")));
}

#[test]
fn removed_entity_is_freed_once_history_forgets_it() {
    let config = EditorConfig::from_json(r#"{"maxUndoSnapshots": 2}"#).unwrap();
    let mut editor = Editor::with_content(CONTENT, config).unwrap();
    let wrapper = editor.entity("c1").unwrap().wrapper;
    let canvas = editor.dom().first_child(wrapper).unwrap();

    assert!(remove_entity(&mut editor, "c1", EntityOperation::Overwrite).unwrap());
    // Still restorable by undo.
    assert!(editor.dom().contains_node(wrapper));

    let changed = editor
        .format_content_model(
            |model, _| {
                model.blocks.push(manos_content_model::Paragraph::new().into());
                true
            },
            FormatContentModelOptions::default(),
        )
        .unwrap();
    assert!(changed);
    assert!(!editor.dom().contains_node(wrapper));
    assert!(!editor.dom().contains_node(canvas));

    assert!(editor.undo().unwrap());
    assert_eq!(editor.get_content(), "<div>a</div><div>b</div>");
}
