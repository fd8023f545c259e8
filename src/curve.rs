//! Exogenous load, solar, and wind curves.
//!
//! Curves are sampled once per minute and expressed as multipliers on the
//! network's base load and renewable outputs. Lookups past the end of the
//! curve wrap around, so a one-day curve can drive a multi-day run.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{CosimError, CosimResult};

/// Seconds covered by one curve row.
pub const SECONDS_PER_ROW: usize = 60;

/// One per-minute sample of the exogenous curves.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CurveRow {
    #[serde(rename = "Load")]
    pub load: f64,
    #[serde(rename = "PV")]
    pub pv: f64,
    #[serde(rename = "Wind")]
    pub wind: f64,
}

impl CurveRow {
    pub const UNITY: CurveRow = CurveRow {
        load: 1.0,
        pv: 1.0,
        wind: 1.0,
    };
}

/// Per-minute multiplier curves for load, solar, and wind.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    rows: Vec<CurveRow>,
}

impl Curve {
    pub fn new(rows: Vec<CurveRow>) -> Self {
        Self { rows }
    }

    /// A flat curve with the same multipliers everywhere.
    pub fn constant(load: f64, pv: f64, wind: f64) -> Self {
        Self {
            rows: vec![CurveRow { load, pv, wind }],
        }
    }

    /// Reads a curve from CSV with `Load`, `PV`, and `Wind` columns.
    ///
    /// Extra columns (such as a time stamp) are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CosimError::Csv` on malformed rows and `CosimError::Curve` if
    /// the file has no data rows or contains non-finite values.
    pub fn from_reader(reader: impl Read) -> CosimResult<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = Vec::new();
        for (i, record) in rdr.deserialize::<CurveRow>().enumerate() {
            let row = record?;
            if !(row.load.is_finite() && row.pv.is_finite() && row.wind.is_finite()) {
                return Err(CosimError::Curve(format!("row {i} has a non-finite value")));
            }
            rows.push(row);
        }
        if rows.is_empty() {
            return Err(CosimError::Curve("no data rows".to_string()));
        }
        Ok(Self { rows })
    }

    /// Reads a curve from a CSV file.
    ///
    /// # Errors
    ///
    /// See [`Curve::from_reader`]; also fails if the file cannot be opened.
    pub fn from_csv_path(path: &Path) -> CosimResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn row(&self, index: usize) -> CurveRow {
        if self.rows.is_empty() {
            return CurveRow::UNITY;
        }
        self.rows[index % self.rows.len()]
    }

    /// Sample in effect at `second` of `hour`.
    pub fn at_second(&self, hour: usize, second: usize) -> CurveRow {
        self.row(hour * 60 + second / SECONDS_PER_ROW)
    }

    /// Mean multipliers over dispatch interval `interval_id` of `hour`.
    ///
    /// The interval spans `interval_s` seconds starting at
    /// `interval_id * interval_s`. Intervals shorter than one curve row use
    /// the row they fall in.
    pub fn interval_mean(&self, hour: usize, interval_id: usize, interval_s: usize) -> CurveRow {
        let rows_per_interval = (interval_s / SECONDS_PER_ROW).max(1);
        let start = hour * 60 + (interval_id * interval_s) / SECONDS_PER_ROW;

        let mut sum = CurveRow {
            load: 0.0,
            pv: 0.0,
            wind: 0.0,
        };
        for i in start..start + rows_per_interval {
            let r = self.row(i);
            sum.load += r.load;
            sum.pv += r.pv;
            sum.wind += r.wind;
        }
        let n = rows_per_interval as f64;
        CurveRow {
            load: sum.load / n,
            pv: sum.pv / n,
            wind: sum.wind / n,
        }
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::constant(1.0, 1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Curve {
        Curve::new(
            (0..n)
                .map(|i| CurveRow {
                    load: i as f64,
                    pv: 0.5,
                    wind: 2.0 * i as f64,
                })
                .collect(),
        )
    }

    #[test]
    fn interval_mean_averages_rows() {
        let curve = ramp(120);
        // rows 5..10 of hour 0 -> loads 5,6,7,8,9
        let m = curve.interval_mean(0, 1, 300);
        assert!((m.load - 7.0).abs() < 1e-12);
        assert!((m.wind - 14.0).abs() < 1e-12);
        assert!((m.pv - 0.5).abs() < 1e-12);
    }

    #[test]
    fn interval_mean_offsets_by_hour() {
        let curve = ramp(120);
        let m = curve.interval_mean(1, 0, 300);
        // rows 60..65
        assert!((m.load - 62.0).abs() < 1e-12);
    }

    #[test]
    fn lookups_wrap_past_end() {
        let curve = ramp(60);
        assert_eq!(curve.at_second(1, 0), curve.at_second(0, 0));
        assert_eq!(curve.at_second(0, 61).load, 1.0);
    }

    #[test]
    fn short_interval_uses_containing_row() {
        let curve = ramp(60);
        let m = curve.interval_mean(0, 20, 4);
        // second 80 -> row 1
        assert_eq!(m.load, 1.0);
    }

    #[test]
    fn empty_curve_is_unity() {
        let curve = Curve::new(Vec::new());
        assert_eq!(curve.at_second(3, 17), CurveRow::UNITY);
    }

    #[test]
    fn parses_csv_with_extra_columns() {
        let data = "Time,Load,PV,Wind\n0,0.9,0.1,0.4\n1,1.0,0.2,0.5\n";
        let curve = Curve::from_reader(data.as_bytes());
        assert!(curve.is_ok(), "{:?}", curve.err());
        let curve = curve.ok();
        assert_eq!(curve.as_ref().map(Curve::len), Some(2));
        assert_eq!(curve.map(|c| c.at_second(0, 65).wind), Some(0.5));
    }

    #[test]
    fn rejects_empty_csv() {
        let data = "Load,PV,Wind\n";
        assert!(matches!(
            Curve::from_reader(data.as_bytes()),
            Err(CosimError::Curve(_))
        ));
    }
}
