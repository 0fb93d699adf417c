use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Result, WorkHistError};
use crate::files::ALL_PREFIX;

/// Collect the per-repository CSV files for one label, sorted by name.
///
/// Previously combined `All-*.csv` files are skipped so repeated runs do not
/// fold the combined data back into itself.
fn table_files(csv_dir: &Path, label: &str) -> Result<Vec<PathBuf>> {
    let suffix = format!("-{label}.csv");
    let mut files: Vec<PathBuf> = fs::read_dir(csv_dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.ends_with(&suffix) && !name.starts_with(&format!("{ALL_PREFIX}-"))
                })
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Split a CSV body into logical records.
///
/// Quoted fields may span several lines (commit messages with blank
/// separator lines do), so records cannot be split on newlines alone. A line
/// with an odd number of `"` characters opens or closes a quoted field;
/// doubled quotes inside a field contribute an even count and do not flip
/// the state. Blank lines between records are skipped, blank lines inside a
/// quoted field belong to the record.
fn split_records(body: &str) -> Vec<String> {
    let mut records = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for line in body.lines() {
        if in_quotes {
            current.push('\n');
            current.push_str(line);
        } else {
            if line.is_empty() {
                continue;
            }
            current.push_str(line);
        }
        if line.matches('"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
        if !in_quotes {
            records.push(std::mem::take(&mut current));
        }
    }
    // an unterminated quote means a truncated file; keep what is there
    if !current.is_empty() {
        records.push(current);
    }
    records
}

/// Concatenate every `*-{label}.csv` in `csv_dir` into one header plus the
/// combined body rows.
///
/// All files must share the same header; mismatched headers mean the
/// directory mixes data saved by different versions and combining them would
/// silently misalign columns.
pub fn combine_tables(csv_dir: &Path, label: &str) -> Result<(String, Vec<String>)> {
    let mut combined_header: Option<String> = None;
    let mut rows = Vec::new();

    for path in table_files(csv_dir, label)? {
        let contents = fs::read_to_string(&path)?;
        let mut records = split_records(&contents).into_iter();
        let Some(header) = records.next() else { continue };
        match &combined_header {
            None => combined_header = Some(header),
            Some(expected) if *expected != header => {
                return Err(WorkHistError::Config(format!(
                    "CSV header of {} does not match the other {label} files",
                    path.display()
                )));
            }
            Some(_) => {}
        }
        let before = rows.len();
        rows.extend(records);
        debug!("combined {} rows from {}", rows.len() - before, path.display());
    }

    let header = combined_header.ok_or_else(|| {
        WorkHistError::Config(format!(
            "no {label} CSV files found in {}",
            csv_dir.display()
        ))
    })?;
    Ok((header, rows))
}

/// Write the combined table for one label as `All-{label}.csv`.
pub fn write_combined_table(csv_dir: &Path, results_dir: &Path, label: &str) -> Result<PathBuf> {
    let (header, rows) = combine_tables(csv_dir, label)?;
    crate::files::create_directory(results_dir)?;
    let path = results_dir.join(format!("{ALL_PREFIX}-{label}.csv"));
    let mut contents = String::with_capacity(header.len() + rows.len() * 64);
    contents.push_str(&header);
    contents.push('\n');
    for row in rows {
        contents.push_str(&row);
        contents.push('\n');
    }
    fs::write(&path, contents)?;
    Ok(path)
}
