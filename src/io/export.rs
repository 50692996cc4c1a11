//! CSV and JSON exports: light curves, corrected flux, segment tables.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::app::pipeline::{RunOutput, SegmentOutcome};
use crate::domain::LightCurve;
use crate::error::DecorError;
use crate::segment::Segmentation;

/// Write a light curve in the column layout `ingest` reads back by default.
pub fn write_light_curve_csv(path: &Path, curve: &LightCurve) -> Result<(), DecorError> {
    let file = File::create(path)
        .map_err(|e| DecorError::io(format!("Failed to create light curve CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_light_curve_rows(&mut out, curve)?;
    out.flush()
        .map_err(|e| DecorError::io(format!("Failed to flush light curve CSV: {e}")))
}

pub fn write_light_curve_rows<W: Write>(out: &mut W, curve: &LightCurve) -> Result<(), DecorError> {
    let has_covariates = !curve.covariate_a.is_empty() && !curve.covariate_b.is_empty();
    // Column names are user-chosen; the csv writer quotes them when needed.
    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec!["time", "flux", curve.names.drift.as_str()];
    if has_covariates {
        header.extend([curve.names.a.as_str(), curve.names.b.as_str()]);
    }
    writer
        .write_record(&header)
        .map_err(|e| DecorError::io(format!("Failed to write light curve CSV header: {e}")))?;

    for i in 0..curve.len() {
        // Display of f64 is the shortest exact representation.
        let mut row = vec![curve.time[i].to_string(), curve.flux[i].to_string(), curve.drift[i].to_string()];
        if has_covariates {
            row.extend([curve.covariate_a[i].to_string(), curve.covariate_b[i].to_string()]);
        }
        writer
            .write_record(&row)
            .map_err(|e| DecorError::io(format!("Failed to write light curve CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| DecorError::io(format!("Failed to flush light curve CSV: {e}")))
}

/// Write a segmentation (segments, smoothed drift, warnings) as pretty JSON.
pub fn write_segmentation_json(path: &Path, segmentation: &Segmentation) -> Result<(), DecorError> {
    let file = File::create(path)
        .map_err(|e| DecorError::io(format!("Failed to create segmentation JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, segmentation)
        .map_err(|e| DecorError::io(format!("Failed to write segmentation JSON: {e}")))
}

/// Write per-sample results (`time,flux,correction,corrected_flux,segment`).
pub fn write_corrected_csv(path: &Path, curve: &LightCurve, output: &RunOutput) -> Result<(), DecorError> {
    let file = File::create(path)
        .map_err(|e| DecorError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_corrected_rows(&mut out, curve, output)?;
    out.flush()
        .map_err(|e| DecorError::io(format!("Failed to flush export CSV: {e}")))
}

pub fn write_corrected_rows<W: Write>(out: &mut W, curve: &LightCurve, output: &RunOutput) -> Result<(), DecorError> {
    writeln!(out, "time,flux,correction,corrected_flux,segment")
        .map_err(|e| DecorError::io(format!("Failed to write export CSV header: {e}")))?;

    for (index, seg) in output.segmentation.segments.iter().enumerate() {
        for i in seg.range() {
            writeln!(
                out,
                "{:.8},{:.6},{:.6},{:.6},{index}",
                curve.time[i], curve.flux[i], output.correction[i], output.corrected_flux[i],
            )
            .map_err(|e| DecorError::io(format!("Failed to write export CSV row: {e}")))?;
        }
    }
    Ok(())
}

/// Write one row per segment with its boundary reason and chosen models.
pub fn write_segments_csv(path: &Path, output: &RunOutput) -> Result<(), DecorError> {
    let file = File::create(path)
        .map_err(|e| DecorError::io(format!("Failed to create segment CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_segment_rows(&mut out, output)?;
    out.flush()
        .map_err(|e| DecorError::io(format!("Failed to flush segment CSV: {e}")))
}

pub fn write_segment_rows<W: Write>(out: &mut W, output: &RunOutput) -> Result<(), DecorError> {
    writeln!(
        out,
        "segment,start,end,t_start,t_end,reason,code,first_covariate,first_spacing,first_shift,second_covariate,second_spacing,second_shift,error"
    )
    .map_err(|e| DecorError::io(format!("Failed to write segment CSV header: {e}")))?;

    for outcome in &output.outcomes {
        let row = match outcome {
            SegmentOutcome::Corrected(c) => {
                let first = &c.correction.first.selected;
                let (second_name, second_spacing, second_shift) = match &c.correction.second {
                    Some(s) => (
                        s.selected.covariate.clone(),
                        format!("{}", s.selected.knot_spacing),
                        format!("{}", s.selected.phase_shift),
                    ),
                    None => (String::new(), String::new(), String::new()),
                };
                format!(
                    "{},{},{},{:.8},{:.8},{},{},{},{},{},{},{},{},",
                    c.index,
                    c.segment.start,
                    c.segment.end,
                    c.t_start,
                    c.t_end,
                    c.segment.reason.label(),
                    c.correction.diagnostic_code,
                    first.covariate,
                    first.knot_spacing,
                    first.phase_shift,
                    second_name,
                    second_spacing,
                    second_shift,
                )
            }
            SegmentOutcome::Failed(f) => format!(
                "{},{},{},{:.8},{:.8},{},,,,,,,,\"{}\"",
                f.index,
                f.segment.start,
                f.segment.end,
                f.t_start,
                f.t_end,
                f.segment.reason.label(),
                f.error.to_string().replace('"', "'"),
            ),
        };
        writeln!(out, "{row}").map_err(|e| DecorError::io(format!("Failed to write segment CSV row: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::run_correction;
    use crate::data::{SyntheticSpec, generate_light_curve};
    use crate::domain::{DecorConfig, SearchConfig};
    use crate::fit::CancelToken;

    fn run() -> (LightCurve, RunOutput) {
        let curve = generate_light_curve(&SyntheticSpec::default()).unwrap();
        let config = DecorConfig {
            search: SearchConfig {
                spacings: vec![0.5],
                phase_step: 0.25,
                ..SearchConfig::default()
            },
            ..DecorConfig::default()
        };
        let output = run_correction(&curve, &config, &CancelToken::new()).unwrap();
        (curve, output)
    }

    #[test]
    fn light_curve_csv_reads_back_exactly() {
        let curve = generate_light_curve(&SyntheticSpec::default()).unwrap();
        let mut buf = Vec::new();
        write_light_curve_rows(&mut buf, &curve).unwrap();
        let back = crate::io::read_light_curve(buf.as_slice(), &crate::io::ColumnSpec::default()).unwrap();
        assert!(back.row_errors.is_empty());
        assert_eq!(back.curve, curve);
    }

    #[test]
    fn column_names_with_commas_are_quoted() {
        let mut curve = generate_light_curve(&SyntheticSpec::default()).unwrap();
        curve.names.drift = "temp, C".to_string();
        curve.names.a = "x \"px\"".to_string();
        let mut buf = Vec::new();
        write_light_curve_rows(&mut buf, &curve).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("time,flux,\"temp, C\",\"x \"\"px\"\"\","));

        let columns = crate::io::ColumnSpec {
            drift: curve.names.drift.clone(),
            a: Some(curve.names.a.clone()),
            b: Some(curve.names.b.clone()),
            ..crate::io::ColumnSpec::default()
        };
        let back = crate::io::read_light_curve(buf.as_slice(), &columns).unwrap();
        assert!(back.row_errors.is_empty());
        assert_eq!(back.curve, curve);
    }

    #[test]
    fn corrected_csv_has_one_row_per_sample() {
        let (curve, output) = run();
        let mut buf = Vec::new();
        write_corrected_rows(&mut buf, &curve, &output).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), curve.len() + 1);
        assert!(text.starts_with("time,flux,correction,corrected_flux,segment\n"));
    }

    #[test]
    fn segment_csv_parses_back() {
        let (_, output) = run();
        let mut buf = Vec::new();
        write_segment_rows(&mut buf, &output).unwrap();
        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), output.outcomes.len());
        assert_eq!(&rows.last().unwrap()[5], "end");
    }
}
