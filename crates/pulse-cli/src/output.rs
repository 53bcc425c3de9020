use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pulse_core::models::{AggregatedReport, DateRange, Metric};

/// Default output file for a run: `forum_report_<start>_to_<end>.csv`.
pub fn default_output_path(range: &DateRange) -> PathBuf {
    PathBuf::from(format!(
        "forum_report_{}_to_{}.csv",
        range.start().format("%Y-%m-%d"),
        range.end().format("%Y-%m-%d")
    ))
}

/// Write the report as CSV: the fixed header, then one record per date in
/// report order.
pub fn write_report<W: Write>(report: &AggregatedReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(Metric::header())?;

    for row in report.rows() {
        let mut record = Vec::with_capacity(Metric::COUNT + 1);
        record.push(row.date.format("%Y-%m-%d").to_string());
        record.extend(row.counts().iter().map(|count| count.to_string()));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_report_file(report: &AggregatedReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    write_report(report, file)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = report.len(), "Report written");
    Ok(())
}
