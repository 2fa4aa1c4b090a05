//! Plotly figure construction for the dual-axis charts.

use crate::config::DashboardConfig;
use crate::error::ChartError;
use crate::models::Table;
use crate::scraper::cleaner::{parse_date, parse_number};
use serde::Serialize;
use serde_json::{json, Value};

/// Selectable columns for one stock, plus the per-chart defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartColumns {
    pub date_column: String,
    pub columns: Vec<String>,
    pub left: Option<String>,
    pub right: Option<String>,
}

/// The configured date column if present, else the table's key column.
pub fn date_column(table: &Table, preferred: &str) -> Option<String> {
    if table.column_index(preferred).is_some() {
        Some(preferred.to_string())
    } else {
        table.key_column().map(str::to_string)
    }
}

pub fn chart_columns(table: &Table, config: &DashboardConfig) -> ChartColumns {
    let date = date_column(table, &config.date_column).unwrap_or_default();
    let columns: Vec<String> = table
        .headers()
        .iter()
        .filter(|h| **h != date)
        .cloned()
        .collect();

    let pick = |idx: usize, fallback: usize| {
        table
            .headers()
            .get(idx)
            .filter(|h| **h != date)
            .or_else(|| columns.get(fallback))
            .or_else(|| columns.first())
            .cloned()
    };

    ChartColumns {
        left: pick(config.default_left_column, 0),
        right: pick(config.default_right_column, 1),
        date_column: date,
        columns,
    }
}

/// Left column as a filled area on y1, right column as lines+markers on y2,
/// both against the date column.
pub fn build_figure(
    table: &Table,
    date_column: &str,
    left: &str,
    right: &str,
) -> Result<Value, ChartError> {
    let column = |name: &str| {
        table
            .column(name)
            .ok_or_else(|| ChartError::UnknownColumn(name.to_string()))
    };

    let x: Vec<String> = column(date_column)?
        .into_iter()
        .map(|d| {
            parse_date(d)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| d.to_string())
        })
        .collect();
    let y1: Vec<Option<f64>> = column(left)?.into_iter().map(parse_number).collect();
    let y2: Vec<Option<f64>> = column(right)?.into_iter().map(parse_number).collect();

    Ok(json!({
        "data": [
            {
                "x": x,
                "y": y1,
                "type": "scatter",
                "mode": "lines",
                "name": left,
                "yaxis": "y1",
                "fill": "tozeroy",
                "fillcolor": "rgba(0,0,255,0.1)",
                "line": { "color": "blue" }
            },
            {
                "x": x,
                "y": y2,
                "type": "scatter",
                "mode": "lines+markers",
                "name": right,
                "yaxis": "y2"
            }
        ],
        "layout": {
            "title": format!("{} 與 {} 的趨勢圖", left, right),
            "xaxis": { "title": date_column, "tickformat": "%Y/%m", "type": "date" },
            "yaxis": { "title": left },
            "yaxis2": { "title": right, "overlaying": "y", "side": "right" },
            "hovermode": "x",
            "legend": { "x": 0, "y": 1 },
            "plot_bgcolor": "#f9f9f9",
            "paper_bgcolor": "#ffffff",
            "font": { "family": "Arial", "size": 12, "color": "#333" }
        }
    }))
}
