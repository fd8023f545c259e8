//! Post-hoc KPI computation from co-simulation output.

use std::fmt;

use super::types::OutputRecord;

/// Frequency and AGC performance indicators for a complete run.
///
/// Computed from the output rows so the report always agrees with the
/// exported CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    /// Number of simulated seconds.
    pub seconds: usize,
    /// Lowest recorded frequency (Hz).
    pub nadir_hz: f64,
    /// Highest recorded frequency (Hz).
    pub zenith_hz: f64,
    /// Largest absolute deviation from nominal (Hz).
    pub max_abs_deviation_hz: f64,
    /// Root-mean-square deviation from nominal (Hz).
    pub rms_deviation_hz: f64,
    /// Mean absolute AGC signal (MW).
    pub mean_abs_ace_mw: f64,
    /// AGC signal in the last row (MW).
    pub final_ace_mw: f64,
    /// Integral of the absolute AGC correction (MWh).
    pub agc_energy_mwh: f64,
}

impl KpiReport {
    /// Computes all KPIs from the record vector.
    ///
    /// # Arguments
    ///
    /// * `records` - One row per simulated second
    /// * `nominal_hz` - Nominal system frequency
    pub fn from_records(records: &[OutputRecord], nominal_hz: f64) -> Self {
        if records.is_empty() {
            return Self {
                seconds: 0,
                nadir_hz: nominal_hz,
                zenith_hz: nominal_hz,
                max_abs_deviation_hz: 0.0,
                rms_deviation_hz: 0.0,
                mean_abs_ace_mw: 0.0,
                final_ace_mw: 0.0,
                agc_energy_mwh: 0.0,
            };
        }

        let n = records.len() as f64;
        let mut nadir = f64::INFINITY;
        let mut zenith = f64::NEG_INFINITY;
        let mut max_dev = 0.0_f64;
        let mut sq_sum = 0.0_f64;
        let mut ace_abs_sum = 0.0_f64;
        let mut agc_mws = 0.0_f64;

        for r in records {
            let dev = r.frequency_hz - nominal_hz;
            nadir = nadir.min(r.frequency_hz);
            zenith = zenith.max(r.frequency_hz);
            max_dev = max_dev.max(dev.abs());
            sq_sum += dev * dev;
            ace_abs_sum += r.ace_mw.abs();
            // one row per second
            agc_mws += r.agc_mw.abs();
        }

        Self {
            seconds: records.len(),
            nadir_hz: nadir,
            zenith_hz: zenith,
            max_abs_deviation_hz: max_dev,
            rms_deviation_hz: (sq_sum / n).sqrt(),
            mean_abs_ace_mw: ace_abs_sum / n,
            final_ace_mw: records.last().map_or(0.0, |r| r.ace_mw),
            agc_energy_mwh: agc_mws / 3600.0,
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Simulated seconds:     {}", self.seconds)?;
        writeln!(f, "Frequency nadir:       {:.4} Hz", self.nadir_hz)?;
        writeln!(f, "Frequency zenith:      {:.4} Hz", self.zenith_hz)?;
        writeln!(f, "Max |deviation|:       {:.4} Hz", self.max_abs_deviation_hz)?;
        writeln!(f, "RMS deviation:         {:.4} Hz", self.rms_deviation_hz)?;
        writeln!(f, "Mean |ACE|:            {:.3} MW", self.mean_abs_ace_mw)?;
        writeln!(f, "Final ACE:             {:.3} MW", self.final_ace_mw)?;
        write!(f, "AGC energy:            {:.4} MWh", self.agc_energy_mwh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(frequency_hz: f64, ace_mw: f64, agc_mw: f64) -> OutputRecord {
        OutputRecord {
            time: 0.0,
            frequency_hz,
            load_factor: 1.0,
            ace_mw,
            agc_mw,
            hour: 0,
            second: 0,
        }
    }

    #[test]
    fn rms_deviation() {
        // deviations: [0.1, -0.1, 0.2, -0.2] -> mean square 0.025
        let records: Vec<OutputRecord> = [60.1, 59.9, 60.2, 59.8]
            .iter()
            .map(|&f| make_record(f, 0.0, 0.0))
            .collect();
        let kpi = KpiReport::from_records(&records, 60.0);
        assert!((kpi.rms_deviation_hz - 0.025_f64.sqrt()).abs() < 1e-9);
        assert!((kpi.max_abs_deviation_hz - 0.2).abs() < 1e-9);
        assert_eq!(kpi.nadir_hz, 59.8);
        assert_eq!(kpi.zenith_hz, 60.2);
    }

    #[test]
    fn ace_and_agc_energy() {
        let records: Vec<OutputRecord> = [(2.0, 3600.0), (-4.0, -3600.0)]
            .iter()
            .map(|&(ace, agc)| make_record(60.0, ace, agc))
            .collect();
        let kpi = KpiReport::from_records(&records, 60.0);
        assert_eq!(kpi.mean_abs_ace_mw, 3.0);
        assert_eq!(kpi.final_ace_mw, -4.0);
        assert!((kpi.agc_energy_mwh - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_records() {
        let kpi = KpiReport::from_records(&[], 60.0);
        assert_eq!(kpi.seconds, 0);
        assert_eq!(kpi.nadir_hz, 60.0);
        assert!(!format!("{kpi}").is_empty());
    }
}
