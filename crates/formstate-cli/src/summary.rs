use anyhow::Result;
use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use crate::cli::ReportFormatArg;
use crate::types::{FieldRow, ReplayReport};

pub fn print_report(report: &ReplayReport, format: ReportFormatArg) -> Result<()> {
    match format {
        ReportFormatArg::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        ReportFormatArg::Table => print_summary(report)?,
    }
    Ok(())
}

fn print_summary(report: &ReplayReport) -> Result<()> {
    println!(
        "Form: {} (version {}, {} field(s), {} error(s))",
        if report.valid { "valid" } else { "invalid" },
        report.form.version,
        report.fields.len(),
        report.error_count(),
    );
    println!("{}", field_table(&report.fields));

    if !report.events.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![header_cell("Event"), header_cell("Count")]);
        apply_table_style(&mut table);
        align_column(&mut table, 1, CellAlignment::Right);
        for (kind, count) in &report.events {
            table.add_row(vec![Cell::new(kind), Cell::new(count)]);
        }
        println!("{table}");
    }

    println!("Document:");
    println!("{}", serde_json::to_string_pretty(&report.document)?);
    Ok(())
}

/// One row per registered field.
pub fn field_table(fields: &[FieldRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Field"),
        header_cell("Dirty"),
        header_cell("Touched"),
        header_cell("Validating"),
        header_cell("Errors"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    align_column(&mut table, 2, CellAlignment::Center);
    align_column(&mut table, 3, CellAlignment::Center);
    for field in fields {
        table.add_row(vec![
            path_cell(field),
            flag_cell(field.dirty),
            flag_cell(field.touched),
            flag_cell(field.validating),
            errors_cell(&field.errors),
        ]);
    }
    table
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn path_cell(field: &FieldRow) -> Cell {
    let cell = Cell::new(&field.path);
    if field.errors.is_empty() {
        cell
    } else {
        cell.fg(Color::Red).add_attribute(Attribute::Bold)
    }
}

fn flag_cell(flag: bool) -> Cell {
    if flag {
        Cell::new("✓")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    } else {
        Cell::new("-").add_attribute(Attribute::Dim)
    }
}

fn errors_cell(errors: &[String]) -> Cell {
    if errors.is_empty() {
        Cell::new("-").add_attribute(Attribute::Dim)
    } else {
        Cell::new(errors.join("\n")).fg(Color::Red)
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
    if table.column_count() >= 5 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Percentage(35)),
            ColumnConstraint::LowerBoundary(Width::Fixed(7)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::LowerBoundary(Width::Fixed(12)),
            ColumnConstraint::UpperBoundary(Width::Percentage(50)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}
