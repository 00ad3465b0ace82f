use manos_content_model::html::{inner_html, set_inner_html};
use manos_content_model::{
    create_model, normalize_content_model, write_model, Block, BuildOptions, Capabilities, Dom,
    DomSelection, Editor, EditorConfig, NodeAssociations, NodeId, Table,
};

fn build_table(html: &str) -> Table {
    let mut dom = Dom::new();
    let root = dom.create_element("div");
    set_inner_html(&mut dom, root, html).unwrap();
    let built = create_model(&dom, root, None, &BuildOptions::default());
    let Some(Block::Table(table)) = built.model.blocks.into_iter().next() else {
        panic!("expected a table");
    };
    table
}

fn assert_grid_is_sound(table: &Table) {
    let columns = table.column_count();
    for (r, row) in table.rows.iter().enumerate() {
        assert_eq!(row.cells.len(), columns, "row {r} is ragged");
        for (c, cell) in row.cells.iter().enumerate() {
            if r == 0 {
                assert!(!cell.span_above, "top row cell {c} spans above");
            }
            if c == 0 {
                assert!(!cell.span_left, "row {r} first cell spans left");
            }
            let owner = table.owner_of(r, c).unwrap();
            let (owner_row, owner_col) = owner;
            assert!(!table.rows[owner_row].cells[owner_col].is_placeholder());
        }
    }
}

fn write(table: Table) -> String {
    let mut dom = Dom::new();
    let root = dom.create_element("div");
    let mut model = manos_content_model::ContentModelDocument::new();
    model.blocks.push(table.into());
    let mut associations = NodeAssociations::new();
    write_model(&mut dom, root, &model, &mut associations, Capabilities::default()).unwrap();
    inner_html(&dom, root)
}

#[test]
fn merged_cells_become_placeholders() {
    let table = build_table(
        "<table><tr><td rowspan=\"2\" colspan=\"2\">a</td><td>b</td></tr><tr><td>c</td></tr></table>",
    );
    assert_grid_is_sound(&table);
    assert_eq!(table.column_count(), 3);
    assert!(table.rows[0].cells[1].span_left);
    assert!(table.rows[1].cells[0].span_above);
    assert!(table.rows[1].cells[1].span_left && table.rows[1].cells[1].span_above);
    assert_eq!(table.spans_of(0, 0), Some((2, 2)));
}

#[test]
fn overrunning_rowspan_is_clamped() {
    let table = build_table("<table><tr><td rowspan=\"5\">a</td><td>b</td></tr><tr><td>c</td></tr></table>");
    assert_grid_is_sound(&table);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(
        write(table),
        "<table><tbody><tr><td rowspan=\"2\">a</td><td>b</td></tr><tr><td>c</td></tr></tbody></table>"
    );
}

#[test]
fn short_rows_are_padded() {
    let table = build_table("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>");
    assert_grid_is_sound(&table);
    assert_eq!(table.rows[1].cells.len(), 2);
    assert!(!table.rows[1].cells[1].is_placeholder());
}

#[test]
fn column_widths_are_written_as_a_colgroup() {
    let mut table = build_table("<table><tr><td>a</td><td>b</td></tr></table>");
    table.widths = vec![120.0, 80.0];
    assert_eq!(
        write(table),
        "<table><colgroup><col style=\"width: 120px\"><col style=\"width: 80px\"></colgroup><tbody><tr><td>a</td><td>b</td></tr></tbody></table>"
    );
}

#[test]
fn normalization_repairs_edge_spans() {
    let mut model = manos_content_model::ContentModelDocument::new();
    let mut table = build_table("<table><tr><td>a</td><td>b</td></tr></table>");
    table.rows[0].cells[0].span_left = true;
    table.rows[0].cells[1].span_above = true;
    model.blocks.push(table.into());

    normalize_content_model(&mut model);
    let Block::Table(table) = &model.blocks[0] else {
        panic!("expected a table");
    };
    assert!(!table.rows[0].cells[0].is_placeholder());
    assert!(!table.rows[0].cells[1].is_placeholder());
}

#[test]
fn table_selection_survives_a_transaction() {
    let mut editor = Editor::with_content(
        "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>",
        EditorConfig::default(),
    )
    .unwrap();
    let table: NodeId = editor.dom().first_child(editor.root()).unwrap();
    let selection = DomSelection::Table {
        table,
        first_row: 0,
        first_column: 1,
        last_row: 1,
        last_column: 1,
    };
    editor.set_dom_selection(Some(selection.clone()));

    let changed = editor
        .format_content_model(
            |model, _| {
                let Block::Table(table) = &model.blocks[0] else {
                    return false;
                };
                let selected: Vec<bool> = table
                    .rows
                    .iter()
                    .flat_map(|row| row.cells.iter().map(|cell| cell.is_selected))
                    .collect();
                selected == [false, true, false, true]
            },
            Default::default(),
        )
        .unwrap();
    assert!(changed);
    assert_eq!(editor.get_dom_selection(), Some(&selection));
}

fn cell_holding(editor: &Editor, text: &str) -> NodeId {
    let node = editor
        .dom()
        .descendants(editor.root())
        .into_iter()
        .find(|node| editor.dom().text(*node) == Some(text))
        .unwrap();
    editor.dom().parent(node).unwrap()
}

fn selected_cells(table: &Table) -> Vec<Vec<bool>> {
    table
        .rows
        .iter()
        .map(|row| row.cells.iter().map(|cell| cell.is_selected).collect())
        .collect()
}

#[test]
fn merged_cell_is_selected_through_a_spanned_position() {
    let mut editor = Editor::with_content(
        "<table><tr><td colspan=\"2\">a</td></tr><tr><td>b</td><td>c</td></tr></table>",
        EditorConfig::default(),
    )
    .unwrap();
    let table: NodeId = editor.dom().first_child(editor.root()).unwrap();
    let selection = DomSelection::Table {
        table,
        first_row: 0,
        first_column: 1,
        last_row: 1,
        last_column: 1,
    };
    editor.set_dom_selection(Some(selection.clone()));

    let model = editor.create_content_model(None);
    let Block::Table(table_model) = &model.blocks[0] else {
        panic!("expected a table");
    };
    assert!(table_model.rows[0].cells[1].is_placeholder());
    let selected = selected_cells(table_model);
    assert!(selected[0][0], "owner of the spanned position is selected");
    assert_eq!(selected[1], vec![false, true]);

    let ranges = selection.to_ranges(editor.dom());
    let a = cell_holding(&editor, "a");
    let c = cell_holding(&editor, "c");
    let cells: Vec<NodeId> = ranges.iter().map(|range| range.start.node).collect();
    assert_eq!(cells, vec![a, c]);
    assert!(ranges.iter().all(|range| range.start.offset == 0 && range.end.node == range.start.node));
    assert_eq!(ranges[0].end.offset, editor.dom().child_count(a));
}

#[test]
fn rowspan_cell_yields_one_range_however_many_rows_it_covers() {
    let mut editor = Editor::with_content(
        "<table><tr><td rowspan=\"2\">a</td><td>b</td></tr><tr><td>c</td></tr></table>",
        EditorConfig::default(),
    )
    .unwrap();
    let table: NodeId = editor.dom().first_child(editor.root()).unwrap();
    let a = cell_holding(&editor, "a");
    let c = cell_holding(&editor, "c");

    let whole_column = DomSelection::Table {
        table,
        first_row: 0,
        first_column: 0,
        last_row: 1,
        last_column: 0,
    };
    let cells: Vec<NodeId> = whole_column
        .to_ranges(editor.dom())
        .iter()
        .map(|range| range.start.node)
        .collect();
    assert_eq!(cells, vec![a]);

    let lower_row = DomSelection::Table {
        table,
        first_row: 1,
        first_column: 0,
        last_row: 1,
        last_column: 1,
    };
    let cells: Vec<NodeId> = lower_row
        .to_ranges(editor.dom())
        .iter()
        .map(|range| range.start.node)
        .collect();
    assert_eq!(cells, vec![a, c]);

    editor.set_dom_selection(Some(lower_row));
    let model = editor.create_content_model(None);
    let Block::Table(table_model) = &model.blocks[0] else {
        panic!("expected a table");
    };
    assert!(table_model.rows[1].cells[0].is_placeholder());
    let selected = selected_cells(table_model);
    assert_eq!(selected[0], vec![true, false]);
    assert!(selected[1][1]);
}
