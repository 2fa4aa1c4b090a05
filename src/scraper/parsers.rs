use crate::error::{ExtractError, TableError};
use crate::models::{unique_headers, Table};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

fn selector(s: &str) -> Result<Selector, ExtractError> {
    Selector::parse(s).map_err(|e| ExtractError::Selector(format!("{}: {:?}", s, e)))
}

// ── Holder-distribution table ─────────────────────────────────────────────────

/// Parse the table with the given `id` out of a full page.
///
/// Only rows carrying at least `min_cells` `<td>` cells are kept; the first
/// such row supplies the column names. Columns with a blank name are dropped.
pub fn parse_details_table(
    html: &str,
    table_id: &str,
    min_cells: usize,
) -> Result<Table, ExtractError> {
    let doc = Html::parse_document(html);

    let table_sel = selector(&format!("table[id=\"{}\"]", table_id))?;
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;

    let Some(table) = doc.select(&table_sel).next() else {
        warn!("Table #{} not found on page", table_id);
        return Err(ExtractError::TableNotFound(table_id.to_string()));
    };

    let mut rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|tr| cell_texts(tr, &td_sel))
        .filter(|cells| cells.len() >= min_cells)
        .collect();

    if rows.is_empty() {
        return Err(ExtractError::NoHeaderRow(table_id.to_string()));
    }
    let headers = rows.remove(0);
    debug!("#{}: {} columns, {} data rows", table_id, headers.len(), rows.len());

    let table = Table::new(headers, rows)?;
    Ok(drop_blank_columns(table)?)
}

fn cell_texts(tr: ElementRef<'_>, td_sel: &Selector) -> Vec<String> {
    tr.select(td_sel)
        .map(|td| td.text().collect::<String>().trim().to_string())
        .collect()
}

fn drop_blank_columns(table: Table) -> Result<Table, TableError> {
    let (headers, rows) = table.into_parts();
    let keep: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.trim().is_empty())
        .map(|(i, _)| i)
        .collect();

    let headers = unique_headers(keep.iter().map(|&i| headers[i].clone()).collect());
    let rows = rows
        .into_iter()
        .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
        .collect();

    Table::new(headers, rows)
}
