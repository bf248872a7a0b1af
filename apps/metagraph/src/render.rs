//! # Result Rendering
//!
//! Binding tables as aligned text or JSON. References print as the document
//! key of the element when one is known, otherwise as `#<uuid>`.

use crate::workspace::Workspace;
use metagraph_core::{BindingTable, MetagraphError, Value};

/// Render a value for a text cell.
#[must_use]
pub fn format_value(value: &Value, workspace: &Workspace) -> String {
    match value {
        Value::Ref(id) => workspace
            .key_of(*id)
            .map_or_else(|| format!("#{}", id), |key| format!("#{}", key)),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(|v| format_value(v, workspace)).collect();
            format!("[{}]", parts.join(", "))
        }
        other => other.to_string(),
    }
}

/// Render a table as aligned text followed by a row count.
#[must_use]
pub fn render_text(table: &BindingTable, workspace: &Workspace) -> String {
    let cells: Vec<Vec<String>> = table
        .tuples()
        .map(|tuple| tuple.iter().map(|v| format_value(v, workspace)).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns().iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    if !widths.is_empty() {
        out.push_str(&line(table.columns(), &widths));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&line(&rule, &widths));
        for row in &cells {
            out.push_str(&line(row, &widths));
        }
    }
    let count = table.len();
    out.push_str(&format!(
        "({} row{})\n",
        count,
        if count == 1 { "" } else { "s" }
    ));
    out
}

fn line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    let mut text = padded.join(" | ");
    text.truncate(text.trim_end().len());
    text.push('\n');
    text
}

/// Render a table as pretty-printed JSON.
pub fn render_json(table: &BindingTable) -> Result<String, MetagraphError> {
    serde_json::to_string_pretty(table)
        .map_err(|e| MetagraphError::Document(format!("cannot serialize result: {}", e)))
}
