//! Summary table over evaluated sequences.

use std::fmt;

use crate::internal::motmetrics::MOTMetrics;

/// Name of the aggregate row.
pub const OVERALL: &str = "OVERALL";

/// Column headers, in MOTChallenge order.
pub const COLUMNS: [&str; 18] = [
    "IDF1", "IDP", "IDR", "Rcll", "Prcn", "GT", "MT", "PT", "ML", "FP", "FN", "IDs", "FM", "MOTA",
    "MOTP", "IDt", "IDa", "IDm",
];

/// Metrics of one sequence (or of the OVERALL aggregate).
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub name: String,
    pub metrics: MOTMetrics,
}

impl SummaryRow {
    /// Formatted cells, one per entry of [`COLUMNS`].
    pub fn cells(&self) -> Vec<String> {
        let m = &self.metrics;
        let pct = |v: f64| format!("{:.1}%", v * 100.0);
        vec![
            pct(m.idf1()),
            pct(m.idp()),
            pct(m.idr()),
            pct(m.recall()),
            pct(m.precision()),
            m.num_unique_objects.to_string(),
            m.mostly_tracked.to_string(),
            m.partially_tracked.to_string(),
            m.mostly_lost.to_string(),
            m.num_false_positives.to_string(),
            m.num_misses.to_string(),
            m.num_switches.to_string(),
            m.num_fragmentations.to_string(),
            pct(m.mota()),
            format!("{:.3}", m.motp()),
            m.num_transfer.to_string(),
            m.num_ascend.to_string(),
            m.num_migrate.to_string(),
        ]
    }
}

/// Per-sequence rows followed by an OVERALL row.
///
/// The OVERALL counts are sums of the sequence counts and its ratios are
/// recomputed from those sums, so larger sequences weigh more.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    rows: Vec<SummaryRow>,
    overall: Option<SummaryRow>,
}

impl Summary {
    /// Build a summary from `(sequence name, metrics)` pairs, keeping their order.
    pub fn from_sequences<I>(sequences: I) -> Self
    where
        I: IntoIterator<Item = (String, MOTMetrics)>,
    {
        let rows: Vec<SummaryRow> = sequences
            .into_iter()
            .map(|(name, metrics)| SummaryRow { name, metrics })
            .collect();

        let overall = (!rows.is_empty()).then(|| {
            let mut total = MOTMetrics::default();
            for row in &rows {
                total.merge(&row.metrics);
            }
            SummaryRow {
                name: OVERALL.to_string(),
                metrics: total,
            }
        });

        Self { rows, overall }
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn overall(&self) -> Option<&SummaryRow> {
        self.overall.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the fixed-width table. An empty summary renders the header only.
    pub fn render(&self) -> String {
        let all_rows: Vec<&SummaryRow> = self.rows.iter().chain(self.overall.as_ref()).collect();
        let cells: Vec<Vec<String>> = all_rows.iter().map(|r| r.cells()).collect();

        let name_width = all_rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
        let widths: Vec<usize> = COLUMNS
            .iter()
            .enumerate()
            .map(|(c, header)| {
                cells
                    .iter()
                    .map(|row| row[c].len())
                    .chain(std::iter::once(header.len()))
                    .max()
                    .unwrap_or(header.len())
            })
            .collect();

        let mut out = String::new();
        let mut line = " ".repeat(name_width);
        for (header, width) in COLUMNS.iter().zip(&widths) {
            line.push_str(&format!(" {:>width$}", header, width = width));
        }
        out.push_str(&line);
        out.push('\n');

        for (row, row_cells) in all_rows.iter().zip(&cells) {
            let mut line = format!("{:<width$}", row.name, width = name_width);
            for (cell, width) in row_cells.iter().zip(&widths) {
                line.push_str(&format!(" {:>width$}", cell, width = width));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
