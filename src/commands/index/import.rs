use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::StringRecord;
use flate2::read::MultiGzDecoder;
use tracing::{debug, info};

use crate::error::InputError;
use crate::model::{Item, ItemCondition, ItemNoDesc, Status};
use crate::util::parse_export_timestamp;

pub trait BatchSink<T = Item> {
    // `Break` stops the import before the next record is read.
    fn accept(&mut self, batch: Vec<T>) -> Result<ControlFlow<()>>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// One row shape of the item CSV exports.
pub trait ItemRecord: Sized {
    const COLUMNS: usize;
    const THIRD_HEADER: &'static str;

    fn from_record(record: &StringRecord) -> Result<Self, String>;
}

impl ItemRecord for Item {
    const COLUMNS: usize = 6;
    const THIRD_HEADER: &'static str = "description";

    fn from_record(record: &StringRecord) -> Result<Self, String> {
        Ok(Self {
            id: record[0].to_string(),
            name: record[1].to_string(),
            desc: record[2].to_string(),
            status: Status::from_record(&record[3]),
            created: parse_export_timestamp(&record[4]).map_err(|err| err.to_string())?,
            category_id: parse_integer("category_id", &record[5])?,
        })
    }
}

impl ItemRecord for ItemNoDesc {
    const COLUMNS: usize = 8;
    const THIRD_HEADER: &'static str = "status";

    fn from_record(record: &StringRecord) -> Result<Self, String> {
        Ok(Self {
            id: record[0].to_string(),
            name: record[1].to_string(),
            status: Status::from_record(&record[2]),
            created: parse_integer("created", &record[3])?,
            updated: parse_integer("updated", &record[4])?,
            category_id: parse_integer("category_id", &record[5])?,
            price: parse_integer("price", &record[6])?,
            item_condition: ItemCondition::from_record(&record[7]),
        })
    }
}

fn parse_integer(column: &str, value: &str) -> Result<i64, String> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid {column} '{value}'"))
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions<'a> {
    pub data_dir: &'a Path,
    pub filename_filter: &'a str,
    pub batch_size: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files: usize,
    pub items: usize,
    pub halted: bool,
}

pub fn import_items<T: ItemRecord>(
    options: &ImportOptions<'_>,
    sink: &mut dyn BatchSink<T>,
) -> Result<ImportSummary> {
    let files = list_input_files(options.data_dir, options.filename_filter)?;
    info!(
        data_dir = %options.data_dir.display(),
        filter = options.filename_filter,
        files = files.len(),
        "importing items"
    );

    let mut summary = ImportSummary::default();
    for path in &files {
        let flow = import_file(path, options, sink, &mut summary)?;
        summary.files += 1;
        if flow.is_break() {
            summary.halted = true;
            break;
        }
    }

    sink.flush()?;
    info!(
        files = summary.files,
        items = summary.items,
        halted = summary.halted,
        "import finished"
    );
    Ok(summary)
}

fn list_input_files(data_dir: &Path, filename_filter: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(data_dir).map_err(|source| InputError::Unreadable {
        path: data_dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to list directory {}", data_dir.display()))?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains(filename_filter));
        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn open_input(path: &Path) -> Result<Box<dyn Read>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let is_gzip = path.extension().is_some_and(|extension| extension == "gz");
    if is_gzip {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn import_file<T: ItemRecord>(
    path: &Path,
    options: &ImportOptions<'_>,
    sink: &mut dyn BatchSink<T>,
    summary: &mut ImportSummary,
) -> Result<ControlFlow<()>> {
    let name = path.display().to_string();
    debug!(file = %name, "reading item export");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(open_input(path)?);

    let headers = reader
        .headers()
        .map_err(|err| InputError::InvalidItemRecord {
            file: name.clone(),
            record: 0,
            reason: err.to_string(),
        })?
        .clone();
    check_headers::<T>(&name, &headers)?;

    let batch_size = options.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);

    for (index, record) in reader.records().enumerate() {
        let record_number = index as u64 + 1;
        let record = record.map_err(|err| InputError::InvalidItemRecord {
            file: name.clone(),
            record: record_number,
            reason: err.to_string(),
        })?;
        batch.push(parse_record::<T>(&name, record_number, &record)?);
        summary.items += 1;

        let limit_reached = options.max > 0 && summary.items >= options.max;
        if batch.len() >= batch_size || limit_reached {
            let flow = sink.accept(std::mem::take(&mut batch))?;
            if flow.is_break() || limit_reached {
                return Ok(ControlFlow::Break(()));
            }
        }
    }

    if batch.is_empty() {
        return Ok(ControlFlow::Continue(()));
    }
    sink.accept(batch)
}

fn check_headers<T: ItemRecord>(file: &str, headers: &StringRecord) -> Result<(), InputError> {
    let reason = if headers.len() != T::COLUMNS {
        format!("expected {} columns, found {}", T::COLUMNS, headers.len())
    } else if headers.get(2) != Some(T::THIRD_HEADER) {
        format!(
            "third column must be '{}', found '{}'",
            T::THIRD_HEADER,
            headers.get(2).unwrap_or_default()
        )
    } else {
        return Ok(());
    };

    Err(InputError::InvalidItemRecord {
        file: file.to_string(),
        record: 0,
        reason,
    })
}

fn parse_record<T: ItemRecord>(
    file: &str,
    record_number: u64,
    record: &StringRecord,
) -> Result<T, InputError> {
    let invalid = |reason: String| InputError::InvalidItemRecord {
        file: file.to_string(),
        record: record_number,
        reason,
    };

    if record.len() != T::COLUMNS {
        return Err(invalid(format!(
            "expected {} columns, found {}",
            T::COLUMNS,
            record.len()
        )));
    }
    T::from_record(record).map_err(invalid)
}
