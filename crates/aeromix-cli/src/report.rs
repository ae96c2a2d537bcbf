use aeromix_core::GridStats;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};
use std::time::Duration;

pub fn print_summary(stats: &GridStats, elapsed: Duration) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Cells").add_attribute(Attribute::Bold),
        Cell::new("Dispatched"),
        Cell::new("Valid"),
        Cell::new("Empty"),
        Cell::new("Skipped"),
        Cell::new("Elapsed"),
    ]);
    table.add_row(vec![
        Cell::new(stats.cells),
        Cell::new(stats.dispatched),
        Cell::new(stats.valid),
        Cell::new(stats.empty),
        Cell::new(stats.skipped),
        Cell::new(format!("{:.1}s", elapsed.as_secs_f64())),
    ]);

    for i in 0..6 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    println!("\n{}", table);
}
