//! Eligible-row selection.

use thiserror::Error;

use super::{SourceRow, SourceTable};
use crate::config::SourceSettings;

/// Errors raised by row selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    /// Offsets are outside the eligible subsequence.
    #[error("invalid row selection: {0}")]
    Configuration(String),
}

/// A row selected for collection in this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Source data-row index; stable across invocations.
    pub index: usize,
    pub source_url: String,
    pub title: String,
    pub office: String,
    pub agency: String,
    pub row: SourceRow,
}

/// Applies the eligibility rule and the start/count window.
#[derive(Debug, Clone)]
pub struct RowSelector<'a> {
    layout: &'a SourceSettings,
}

impl<'a> RowSelector<'a> {
    #[must_use]
    pub fn new(layout: &'a SourceSettings) -> Self {
        Self { layout }
    }

    /// Eligible rows of `table`, in source order.
    #[must_use]
    pub fn eligible<'t>(&self, table: &'t SourceTable) -> Vec<&'t SourceRow> {
        table
            .rows
            .iter()
            .filter(|row| row.is_eligible(self.layout))
            .collect()
    }

    /// Selects `num_rows` eligible rows starting at eligible position `start_row`.
    ///
    /// `start_row` equal to the eligible count yields an empty selection;
    /// `num_rows` of `None` takes every remaining row.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Configuration`] when `start_row` is negative or
    /// beyond the eligible count.
    pub fn select(
        &self,
        table: &SourceTable,
        start_row: i64,
        num_rows: Option<usize>,
    ) -> Result<Vec<WorkItem>, SelectError> {
        let eligible = self.eligible(table);
        let start = usize::try_from(start_row).map_err(|_| {
            SelectError::Configuration(format!("start row must not be negative (got {start_row})"))
        })?;
        if start > eligible.len() {
            return Err(SelectError::Configuration(format!(
                "start row {start} is beyond the {} eligible rows",
                eligible.len()
            )));
        }

        let end = num_rows.map_or(eligible.len(), |count| {
            start.saturating_add(count).min(eligible.len())
        });

        let title_column = table.find_column(&self.layout.title_headers);
        let office_column = table.find_column(&self.layout.office_headers);
        let agency_column = table.find_column(&self.layout.agency_headers);
        let lookup = |row: &SourceRow, column: Option<usize>| {
            column.map_or_else(String::new, |position| row.cell(position).trim().to_string())
        };

        Ok(eligible[start..end]
            .iter()
            .map(|row| WorkItem {
                index: row.index,
                source_url: row.source_url(self.layout).to_string(),
                title: lookup(row, title_column),
                office: lookup(row, office_column),
                agency: lookup(row, agency_column),
                row: (*row).clone(),
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HEADER: &str =
        "Row,Claimed,Office,Agency,Title of Site,Notes,URL,H,I,J,K,Download Location";

    fn row(claimed: &str, url: &str, location: &str, title: &str) -> String {
        format!("x,{claimed},Office of Data,CDC,{title},,{url},,,,,{location}")
    }

    /// Twelve rows; eligible ones are 2, 6 and 9.
    fn scenario_table() -> SourceTable {
        let mut lines = vec![HEADER.to_string()];
        for index in 0..12 {
            let line = match index {
                2 | 6 | 9 => row("", "https://data.cdc.gov/d/x", "", &format!("Dataset {index}")),
                3 => row("alice", "https://data.cdc.gov/d/x", "", "Claimed"),
                4 => row("", "https://data.cdc.gov/d/x", "https://archive/1", "Located"),
                _ => row("", "https://www.cdc.gov/other", "", "Other host"),
            };
            lines.push(line);
        }
        SourceTable::from_reader(lines.join("\n").as_bytes()).unwrap()
    }

    #[test]
    fn test_second_eligible_row_only() {
        let layout = SourceSettings::default();
        let selected = RowSelector::new(&layout)
            .select(&scenario_table(), 1, Some(1))
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].index, 6);
        assert_eq!(selected[0].title, "Dataset 6");
        assert_eq!(selected[0].office, "Office of Data");
        assert_eq!(selected[0].agency, "CDC");
        assert_eq!(selected[0].source_url, "https://data.cdc.gov/d/x");
    }

    #[test]
    fn test_selects_only_eligible_rows_in_order() {
        let layout = SourceSettings::default();
        let table = scenario_table();
        let selected = RowSelector::new(&layout).select(&table, 0, None).unwrap();
        let indices: Vec<usize> = selected.iter().map(|item| item.index).collect();
        assert_eq!(indices, vec![2, 6, 9]);
        assert!(selected.iter().all(|item| item.row.is_eligible(&layout)));
    }

    #[test]
    fn test_prefix_consistency() {
        let layout = SourceSettings::default();
        let table = scenario_table();
        let selector = RowSelector::new(&layout);
        let all = selector.select(&table, 0, None).unwrap();
        for start in 0..=all.len() {
            let tail = selector.select(&table, i64::try_from(start).unwrap(), None).unwrap();
            assert_eq!(tail, all[start..].to_vec(), "start {start}");
        }
    }

    #[test]
    fn test_start_equal_to_eligible_count_is_empty() {
        let layout = SourceSettings::default();
        let selected = RowSelector::new(&layout)
            .select(&scenario_table(), 3, None)
            .unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_zero_rows_requested_is_empty() {
        let layout = SourceSettings::default();
        let selected = RowSelector::new(&layout)
            .select(&scenario_table(), 0, Some(0))
            .unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_count_is_capped_at_remaining_rows() {
        let layout = SourceSettings::default();
        let selected = RowSelector::new(&layout)
            .select(&scenario_table(), 2, Some(10))
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].index, 9);
    }

    #[test]
    fn test_negative_start_is_configuration_error() {
        let layout = SourceSettings::default();
        let error = RowSelector::new(&layout)
            .select(&scenario_table(), -1, None)
            .unwrap_err();
        assert!(matches!(error, SelectError::Configuration(_)));
    }

    #[test]
    fn test_start_beyond_eligible_count_is_configuration_error() {
        let layout = SourceSettings::default();
        let error = RowSelector::new(&layout)
            .select(&scenario_table(), 4, Some(1))
            .unwrap_err();
        assert!(error.to_string().contains("3 eligible rows"));
    }

    #[test]
    fn test_missing_title_header_yields_empty_title() {
        let layout = SourceSettings::default();
        let data = "A,B,C,D,E,F,URL,H,I,J,K,L\n,,,,,,https://data.cdc.gov/y,,,,,\n";
        let table = SourceTable::from_reader(data.as_bytes()).unwrap();
        let selected = RowSelector::new(&layout).select(&table, 0, None).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].title, "");
    }
}
