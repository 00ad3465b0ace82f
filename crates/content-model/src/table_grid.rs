//! Resolves the logical cell grid of a DOM `<table>` from `rowspan`/`colspan`.
//!
//! Author HTML routinely claims spans that overrun the table or leaves rows short; the grid is
//! repaired instead of rejected, so every position has exactly one owner.

use crate::dom::{Dom, NodeId};

const MAX_SPAN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSlot {
    /// The `<td>`/`<th>` covering this position; `None` for cells synthesized to pad a short row.
    pub cell: Option<NodeId>,
    pub span_left: bool,
    pub span_above: bool,
}

impl GridSlot {
    pub fn is_owner(&self) -> bool {
        !self.span_left && !self.span_above
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableGrid {
    pub rows: Vec<NodeId>,
    pub slots: Vec<Vec<GridSlot>>,
}

impl TableGrid {
    pub fn column_count(&self) -> usize {
        self.slots.first().map_or(0, Vec::len)
    }

    /// Distinct physical cells covering any position in the rectangle, in row-major order.
    pub fn cells_in(&self, first_row: usize, first_col: usize, last_row: usize, last_col: usize) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for row in self.slots.iter().take(last_row + 1).skip(first_row) {
            for slot in row.iter().take(last_col + 1).skip(first_col) {
                match slot.cell {
                    Some(cell) if !out.contains(&cell) => out.push(cell),
                    _ => {}
                }
            }
        }
        out
    }
}

pub fn is_cell_tag(tag: &str) -> bool {
    matches!(tag, "td" | "th")
}

/// `<tr>` elements of a table in document order, looking through `thead`/`tbody`/`tfoot`.
pub fn table_rows(dom: &Dom, table: NodeId) -> Vec<NodeId> {
    let mut rows = Vec::new();
    for child in dom.children(table) {
        match dom.tag(*child) {
            Some("tr") => rows.push(*child),
            Some("thead" | "tbody" | "tfoot") => rows.extend(
                dom.children(*child)
                    .iter()
                    .copied()
                    .filter(|row| dom.tag(*row) == Some("tr")),
            ),
            _ => {}
        }
    }
    rows
}

fn span_attribute(dom: &Dom, cell: NodeId, name: &str) -> usize {
    dom.attribute(cell, name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

pub fn read_table_grid(dom: &Dom, table: NodeId) -> TableGrid {
    let rows = table_rows(dom, table);
    let row_count = rows.len();
    let mut slots: Vec<Vec<Option<GridSlot>>> = vec![Vec::new(); row_count];

    for (r, row) in rows.iter().enumerate() {
        let mut c = 0usize;
        for cell in dom.children(*row) {
            if !dom.tag(*cell).is_some_and(is_cell_tag) {
                continue;
            }
            while slots[r].get(c).is_some_and(Option::is_some) {
                c += 1;
            }
            let colspan = span_attribute(dom, *cell, "colspan");
            let mut rowspan = span_attribute(dom, *cell, "rowspan");
            if r + rowspan > row_count {
                tracing::warn!(
                    row = r,
                    rowspan,
                    rows = row_count,
                    "rowspan runs past the last row; clamping"
                );
                rowspan = row_count - r;
            }
            for dr in 0..rowspan {
                for dc in 0..colspan {
                    let line = &mut slots[r + dr];
                    if line.len() <= c + dc {
                        line.resize(c + dc + 1, None);
                    }
                    if line[c + dc].is_some() {
                        // Overlapping spans: the earlier claim keeps the position.
                        continue;
                    }
                    line[c + dc] = Some(GridSlot {
                        cell: Some(*cell),
                        span_left: dc > 0,
                        span_above: dr > 0,
                    });
                }
            }
            c += colspan;
        }
    }

    let columns = slots.iter().map(Vec::len).max().unwrap_or(0);
    let mut padded = 0usize;
    let slots = slots
        .into_iter()
        .map(|line| {
            let mut line: Vec<GridSlot> = line
                .into_iter()
                .map(|slot| {
                    slot.unwrap_or_else(|| {
                        padded += 1;
                        GridSlot {
                            cell: None,
                            span_left: false,
                            span_above: false,
                        }
                    })
                })
                .collect();
            while line.len() < columns {
                padded += 1;
                line.push(GridSlot {
                    cell: None,
                    span_left: false,
                    span_above: false,
                });
            }
            line
        })
        .collect();
    if padded > 0 {
        tracing::warn!(padded, "synthesized empty cells for ragged table rows");
    }

    TableGrid { rows, slots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::set_inner_html;

    fn grid(html: &str) -> (Dom, TableGrid) {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        set_inner_html(&mut dom, root, html).unwrap();
        let table = dom.first_child(root).unwrap();
        let grid = read_table_grid(&dom, table);
        (dom, grid)
    }

    fn owners(grid: &TableGrid) -> Vec<Vec<bool>> {
        grid.slots
            .iter()
            .map(|row| row.iter().map(GridSlot::is_owner).collect())
            .collect()
    }

    #[test]
    fn resolves_row_and_column_spans() {
        let (_, grid) = grid(
            "<table><tr><td rowspan=\"2\">a</td><td colspan=\"2\">b</td></tr><tr><td>c</td><td>d</td></tr></table>",
        );
        assert_eq!(grid.column_count(), 3);
        assert_eq!(
            owners(&grid),
            vec![vec![true, true, false], vec![false, true, true]]
        );
        assert!(grid.slots[1][0].span_above);
        assert!(grid.slots[0][2].span_left);
    }

    #[test]
    fn clamps_rowspan_and_pads_short_rows() {
        let (_, grid) = grid(
            "<table><tbody><tr><td rowspan=\"5\">a</td><td>b</td><td>c</td></tr><tr><td>d</td></tr></tbody></table>",
        );
        assert_eq!(grid.slots.len(), 2);
        assert_eq!(grid.column_count(), 3);
        assert!(grid.slots[1][0].span_above);
        assert_eq!(grid.slots[1][2].cell, None);
        assert!(grid.slots[1][2].is_owner());
    }

    #[test]
    fn cells_in_rectangle_are_distinct() {
        let (dom, grid) = grid("<table><tr><td colspan=\"2\">a</td></tr><tr><td>b</td><td>c</td></tr></table>");
        let cells = grid.cells_in(0, 0, 1, 1);
        assert_eq!(cells.len(), 3);
        assert_eq!(dom.text_content(cells[0]), "a");
    }
}
