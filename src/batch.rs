use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{BatchError, ValidationError};
use crate::models::{Outcome, PredictionResult};
use crate::predictor::TreePredictor;
use crate::validate::{to_vector, validate_encoded};

/// Label column of the heart failure clinical records dataset.
pub const LABEL_COLUMN: &str = "DEATH_EVENT";

#[derive(Debug, Clone)]
pub struct ScoredRow {
    /// 1-based data row, header excluded.
    pub row: usize,
    pub result: PredictionResult,
    pub actual: Option<Outcome>,
}

#[derive(Debug, Clone)]
pub struct RejectedRow {
    pub row: usize,
    pub error: ValidationError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub true_death: usize,
    pub true_alive: usize,
    pub false_death: usize,
    pub false_alive: usize,
}

impl Confusion {
    pub fn total(&self) -> usize {
        self.true_death + self.true_alive + self.false_death + self.false_alive
    }

    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => (self.true_death + self.true_alive) as f64 / total as f64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub scored: Vec<ScoredRow>,
    pub rejected: Vec<RejectedRow>,
}

impl BatchSummary {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.scored
            .iter()
            .filter(|row| row.result.outcome == outcome)
            .count()
    }

    /// Confusion counts over rows that carried a label, `None` when no row did.
    pub fn confusion(&self) -> Option<Confusion> {
        let mut confusion = Confusion::default();

        for row in &self.scored {
            let Some(actual) = row.actual else {
                continue;
            };
            match (row.result.outcome, actual) {
                (Outcome::Death, Outcome::Death) => confusion.true_death += 1,
                (Outcome::Alive, Outcome::Alive) => confusion.true_alive += 1,
                (Outcome::Death, Outcome::Alive) => confusion.false_death += 1,
                (Outcome::Alive, Outcome::Death) => confusion.false_alive += 1,
            }
        }

        (confusion.total() > 0).then_some(confusion)
    }
}

pub fn score_csv(predictor: &TreePredictor, csv_path: &Path) -> Result<BatchSummary, BatchError> {
    let file = File::open(csv_path).map_err(|source| BatchError::Io {
        path: csv_path.to_path_buf(),
        source,
    })?;
    let reader = csv::Reader::from_reader(file);
    log::info!("Scoring records from {}", csv_path.display());
    score_records(predictor, reader)
}

/// Scores CSV rows whose headers are the clinical field keys. Invalid rows are
/// collected and skipped; only I/O or CSV syntax errors stop the batch.
pub fn score_reader<R: io::Read>(
    predictor: &TreePredictor,
    input: R,
) -> Result<BatchSummary, BatchError> {
    score_records(predictor, csv::Reader::from_reader(input))
}

fn score_records<R: io::Read>(
    predictor: &TreePredictor,
    mut reader: csv::Reader<R>,
) -> Result<BatchSummary, BatchError> {
    // Fail before reading any rows if no model is available.
    predictor.model()?;
    let mut summary = BatchSummary::default();

    for (idx, result) in reader.deserialize::<HashMap<String, String>>().enumerate() {
        let raw = result?;
        let row = idx + 1;

        let record = match validate_encoded(&raw) {
            Ok(record) => record,
            Err(error) => {
                log::warn!("Skipping row {row}: {error}");
                summary.rejected.push(RejectedRow { row, error });
                continue;
            }
        };

        let result = predictor.predict(to_vector(&record).as_slice())?;
        summary.scored.push(ScoredRow {
            row,
            result,
            actual: label(&raw, row),
        });
    }

    log::info!(
        "Scored {} rows, rejected {}",
        summary.scored.len(),
        summary.rejected.len()
    );
    Ok(summary)
}

fn label(raw: &HashMap<String, String>, row: usize) -> Option<Outcome> {
    let value = raw.get(LABEL_COLUMN)?.trim();
    if value.is_empty() {
        return None;
    }
    let outcome = value
        .parse::<usize>()
        .ok()
        .and_then(Outcome::from_class);
    if outcome.is_none() {
        log::warn!("Ignoring {LABEL_COLUMN} value '{value}' on row {row}");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictError;
    use crate::models::Field;
    use crate::test_support::sample_model;

    const HEADER: &str = "age,anaemia,creatinine_phosphokinase,diabetes,ejection_fraction,high_blood_pressure,platelets,serum_creatinine,serum_sodium,sex,smoking,time,DEATH_EVENT";

    fn loaded() -> TreePredictor {
        let predictor = TreePredictor::new();
        predictor.install(sample_model()).expect("install");
        predictor
    }

    #[test]
    fn scores_rows_and_keeps_going_past_bad_ones() {
        let csv = format!(
            "{HEADER}\n\
             75,0,582,0,20,1,265000,1.9,130,1,0,4,1\n\
             55,0,7861,0,38,0,263358.03,1.1,136,1,0,6,1\n\
             65,0,146,0,20,0,162000,1.3,129,1,1,7,1\n\
             50,1,111,0,20,0,210000,1.9,137,1,0,7,1\n\
             65,1,160,1,20,0,327000,2.7,116,0,0,8,1\n\
             42,1,250,1,15,0,213000,1.3,136,0,0,65,1\n\
             45,0,582,0,80,0,263358.03,1.18,137,0,0,250,0\n\
             200,0,582,0,80,0,263358.03,1.18,137,0,0,250,0\n\
             60,0,582,0,80,0,263358.03,3.5,137,2,0,250,0\n\
             70,0,582,0,80,0,263358.03,1.0,137,1,1,210,\n"
        );

        let summary = score_reader(&loaded(), csv.as_bytes()).expect("batch");
        assert_eq!(summary.scored.len(), 8);
        assert_eq!(summary.rejected.len(), 2);
        assert_eq!(summary.rejected[0].row, 8);
        assert_eq!(summary.rejected[0].error.field, Field::Age);
        assert_eq!(summary.rejected[1].row, 9);
        assert_eq!(summary.rejected[1].error.field, Field::Sex);

        // Early follow-up rows land in the death-heavy subtree.
        assert_eq!(summary.count(Outcome::Death), 6);
        assert_eq!(summary.count(Outcome::Alive), 2);
        assert_eq!(summary.scored.last().and_then(|row| row.actual), None);

        let confusion = summary.confusion().expect("labelled rows");
        assert_eq!(confusion.total(), 7);
        assert_eq!(confusion.true_death, 6);
        assert_eq!(confusion.true_alive, 1);
        assert!((confusion.accuracy() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unlabelled_batches_have_no_confusion_matrix() {
        let csv = "time,age,anaemia,creatinine_phosphokinase,diabetes,ejection_fraction,high_blood_pressure,platelets,serum_creatinine,serum_sodium,sex,smoking\n\
                   30,50,0,100,0,50,0,200000,1.0,140,1,0\n";
        let summary = score_reader(&loaded(), csv.as_bytes()).expect("batch");
        assert_eq!(summary.scored.len(), 1);
        assert!(summary.confusion().is_none());
    }

    #[test]
    fn missing_columns_reject_every_row() {
        let csv = "age,time\n50,30\n60,40\n";
        let summary = score_reader(&loaded(), csv.as_bytes()).expect("batch");
        assert!(summary.scored.is_empty());
        assert_eq!(summary.rejected.len(), 2);
        assert_eq!(summary.rejected[0].error, ValidationError::missing(Field::Anaemia));
    }

    #[test]
    fn unloaded_predictor_fails_the_batch() {
        let csv = format!("{HEADER}\n75,0,582,0,20,1,265000,1.9,130,1,0,4,1\n");
        let err = score_reader(&TreePredictor::new(), csv.as_bytes()).unwrap_err();
        assert!(matches!(err, BatchError::Predict(PredictError::NotLoaded)));
    }

    #[test]
    fn missing_csv_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("records.csv");

        let err = score_csv(&loaded(), &path).unwrap_err();
        assert!(matches!(err, BatchError::Io { .. }));
        assert!(err.to_string().contains("records.csv"));
    }

    #[test]
    fn scores_csv_file_from_disk() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("records.csv");
        std::fs::write(&path, format!("{HEADER}\n75,0,582,0,20,1,265000,1.9,130,1,0,4,1\n"))
            .expect("write");

        let summary = score_csv(&loaded(), &path).expect("batch");
        assert_eq!(summary.count(Outcome::Death), 1);
    }

    #[test]
    fn ragged_csv_aborts() {
        let csv = format!("{HEADER}\n75,0,582\n");
        let err = score_reader(&loaded(), csv.as_bytes()).unwrap_err();
        assert!(matches!(err, BatchError::Csv(_)));
    }
}
