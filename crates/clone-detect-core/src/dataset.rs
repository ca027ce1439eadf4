//! Dataset files: JSONL/CSV record I/O, fold layout and submissions.
//!
//! ```text
//! {data_dir}/all/train.jsonl      full-data training
//! {data_dir}/all/val.jsonl
//! {data_dir}/fold_1/train.csv     k-fold training, k = 1..=num_folds
//! {data_dir}/fold_1/val.csv
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DataError, DataResult};
use crate::record::{CodePairRecord, Prediction};
use crate::rng::RandomContext;

/// Record file extensions probed, in order.
const EXTENSIONS: &[&str] = &["jsonl", "csv"];

/// Which data split directory to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldSelection {
    /// `all/`
    All,
    /// `fold_{k}/`, 1-based.
    Fold(usize),
}

impl FoldSelection {
    pub fn dir_name(&self) -> String {
        match self {
            FoldSelection::All => "all".to_string(),
            FoldSelection::Fold(k) => format!("fold_{}", k),
        }
    }
}

/// Train or validation file within a fold directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Validation,
}

impl Split {
    pub fn file_stem(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "val",
        }
    }
}

/// Root of a fold-structured dataset.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    root: PathBuf,
}

impl DatasetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the record file for a split.
    ///
    /// # Errors
    /// - `DataError::DatasetNotFound` when neither `.jsonl` nor `.csv` exists
    pub fn split_path(&self, selection: FoldSelection, split: Split) -> DataResult<PathBuf> {
        let dir = self.root.join(selection.dir_name());
        EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", split.file_stem(), ext)))
            .find(|p| p.is_file())
            .ok_or_else(|| DataError::DatasetNotFound {
                path: dir.join(split.file_stem()),
            })
    }

    /// Load one split.
    pub fn load(&self, selection: FoldSelection, split: Split) -> DataResult<Vec<CodePairRecord>> {
        let path = self.split_path(selection, split)?;
        let records = load_records(&path)?;
        info!(
            fold = %selection.dir_name(),
            split = split.file_stem(),
            records = records.len(),
            path = %path.display(),
            "Loaded dataset split"
        );
        Ok(records)
    }
}

/// Load records from a `.jsonl` or `.csv` file, chosen by extension
/// (anything but `.csv` is read as JSONL).
pub fn load_records(path: impl AsRef<Path>) -> DataResult<Vec<CodePairRecord>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(DataError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        load_csv(path)
    } else {
        load_jsonl(path)
    }
}

/// Load records from JSONL, one object per line; blank lines are skipped.
pub fn load_jsonl(path: impl AsRef<Path>) -> DataResult<Vec<CodePairRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: CodePairRecord =
            serde_json::from_str(trimmed).map_err(|e| DataError::RecordParseError {
                path: path.to_path_buf(),
                line: line_num + 1,
                message: e.to_string(),
            })?;
        check_record(&record, path, line_num + 1)?;
        records.push(record);
    }

    Ok(records)
}

/// Load records from CSV with a header row. Unknown columns are ignored.
pub fn load_csv(path: impl AsRef<Path>) -> DataResult<Vec<CodePairRecord>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();

    for (row, result) in reader.deserialize::<CodePairRecord>().enumerate() {
        // Row numbers count the header as row 1.
        let record = result.map_err(|e| DataError::RecordParseError {
            path: path.to_path_buf(),
            line: row + 2,
            message: e.to_string(),
        })?;
        check_record(&record, path, row + 2)?;
        records.push(record);
    }

    Ok(records)
}

fn check_record(record: &CodePairRecord, path: &Path, line: usize) -> DataResult<()> {
    record.validate().map_err(|e| DataError::RecordParseError {
        path: path.to_path_buf(),
        line,
        message: e.to_string(),
    })
}

/// Write records as JSONL.
pub fn write_jsonl(path: impl AsRef<Path>, records: &[CodePairRecord]) -> DataResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(std::io::Error::from)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Give every record without an identifier its row index.
pub fn assign_row_ids(records: &mut [CodePairRecord]) {
    for (i, record) in records.iter_mut().enumerate() {
        if record.id.is_none() {
            record.id = Some(i.to_string());
        }
    }
}

/// Draw `count` records uniformly with replacement.
///
/// `None` returns the records unchanged.
pub fn subsample(
    records: &[CodePairRecord],
    count: Option<usize>,
    rng: &mut RandomContext,
) -> Vec<CodePairRecord> {
    match count {
        Some(count) => rng
            .sample_indices(records.len(), count)
            .into_iter()
            .map(|i| records[i].clone())
            .collect(),
        None => records.to_vec(),
    }
}

/// Write predictions as a `pair_id,similar` CSV in the given order.
pub fn write_submission(path: impl AsRef<Path>, predictions: &[Prediction]) -> DataResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for prediction in predictions {
        writer.serialize(prediction)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = predictions.len(), "Wrote submission");
    Ok(())
}
