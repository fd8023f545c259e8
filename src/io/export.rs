//! CSV export for co-simulation output rows.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::CosimResult;
use crate::sim::types::OutputRecord;

/// Column header of the per-second output file.
const HEADER: [&str; 5] = ["time", "freq", "load_factor", "ace", "agc"];

/// Exports output rows to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_csv(records: &[OutputRecord], path: &Path) -> CosimResult<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, buf)
}

/// Writes output rows as CSV to any writer.
///
/// Units: `time` in seconds, `freq` in Hz, `ace` and `agc` in MW.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_csv(records: &[OutputRecord], writer: impl Write) -> CosimResult<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER)?;
    for r in records {
        wtr.write_record(&[
            format!("{:.1}", r.time),
            format!("{:.6}", r.frequency_hz),
            format!("{:.6}", r.load_factor),
            format!("{:.6}", r.ace_mw),
            format!("{:.6}", r.agc_mw),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
