use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{Result, WorkHistError};
use crate::produce::{CommitRecord, WorkflowRecord};

/// Column headers for the flattened workflow table.
pub const WORKFLOWS_HEADER: &[&str] = &[
    "organization",
    "repo",
    "repo_url",
    "id",
    "name",
    "head_sha",
    "created_at",
    "updated_at",
    "event",
    "status",
    "conclusion",
    "jobs_url",
];

/// Column headers for the flattened head-commit table.
pub const COMMITS_HEADER: &[&str] = &[
    "organization",
    "repo",
    "repo_url",
    "head_sha",
    "message",
    "timestamp",
    "author_name",
    "author_email",
];

/// Label used in workflow CSV file names.
pub const WORKFLOWS_LABEL: &str = "Workflows";

/// Label used in commit CSV file names.
pub const COMMITS_LABEL: &str = "Commits";

/// Prefix for the combined, all-repositories CSV files.
pub const ALL_PREFIX: &str = "All";

/// Quote a CSV field when it contains a comma, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn csv_timestamp(value: &Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}

/// Render a workflow record as one CSV row.
pub fn workflow_row(record: &WorkflowRecord) -> Vec<String> {
    vec![
        record.organization.clone(),
        record.repo.clone(),
        record.repo_url.clone(),
        record.id.to_string(),
        record.name.clone(),
        record.head_sha.clone(),
        csv_timestamp(&record.created_at),
        csv_timestamp(&record.updated_at),
        record.event.clone(),
        record.status.clone(),
        record.conclusion.clone(),
        record.jobs_url.clone(),
    ]
}

/// Render a commit record as one CSV row.
pub fn commit_row(record: &CommitRecord) -> Vec<String> {
    vec![
        record.organization.clone(),
        record.repo.clone(),
        record.repo_url.clone(),
        record.head_sha.clone(),
        record.message.clone(),
        csv_timestamp(&record.timestamp),
        record.author_name.clone(),
        record.author_email.clone(),
    ]
}

/// Create a directory if it does not exist, without failing when it does.
pub fn create_directory(directory: &Path) -> Result<()> {
    fs::create_dir_all(directory)?;
    Ok(())
}

/// Whether the provided directory exists (creating it when possible).
pub fn confirm_valid_directory(directory: Option<&Path>) -> bool {
    match directory {
        Some(directory) => create_directory(directory).is_ok() && directory.is_dir(),
        None => false,
    }
}

/// Write a CSV file with the given header and rows.
pub fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "{}", header.join(","))?;
    for row in rows {
        let line: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        writeln!(file, "{}", line.join(","))?;
    }
    debug!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Save a per-repository table as `{Org}-{Repo}-{Label}.csv` in `results_dir`.
pub fn save_table(
    results_dir: &Path,
    organization: &str,
    repo: &str,
    label: &str,
    header: &[&str],
    rows: &[Vec<String>],
) -> Result<PathBuf> {
    create_directory(results_dir)?;
    let file_name = format!("{organization}-{repo}-{label}.csv");
    let path = results_dir.join(file_name);
    write_csv(&path, header, rows)?;
    Ok(path)
}

/// Save a combined table as `All-{Label}.csv` in `results_dir`.
pub fn save_table_all(
    results_dir: &Path,
    label: &str,
    header: &[&str],
    rows: &[Vec<String>],
) -> Result<PathBuf> {
    create_directory(results_dir)?;
    let path = results_dir.join(format!("{ALL_PREFIX}-{label}.csv"));
    write_csv(&path, header, rows)?;
    Ok(path)
}

/// Read repository URLs from the `url` column of a CSV file.
///
/// Repository URLs never contain commas, so a naive split is enough.
pub fn read_repo_urls_csv(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    let mut lines = contents.lines();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let column = header
        .split(',')
        .position(|name| name.trim().eq_ignore_ascii_case("url"))
        .ok_or_else(|| {
            WorkHistError::Config(format!(
                "repos CSV file {} has no 'url' column",
                path.display()
            ))
        })?;
    Ok(lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| line.split(',').nth(column))
        .map(|value| value.trim().to_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quotes_only_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_save_table_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![vec!["octo-org".to_owned(), "fix, then ship".to_owned()]];

        let path = save_table(
            dir.path(),
            "octo-org",
            "octo-repo",
            WORKFLOWS_LABEL,
            &["organization", "message"],
            &rows,
        )
        .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "octo-org-octo-repo-Workflows.csv"
        );
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "organization,message\nocto-org,\"fix, then ship\"\n"
        );
    }

    #[test]
    fn test_read_repo_urls_csv_uses_url_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.csv");
        fs::write(
            &path,
            "name,url\ncore,https://github.com/home-assistant/core\n\n",
        )
        .unwrap();

        let urls = read_repo_urls_csv(&path).unwrap();
        assert_eq!(urls, vec!["https://github.com/home-assistant/core"]);
    }

    #[test]
    fn test_read_repo_urls_csv_rejects_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.csv");
        fs::write(&path, "name,link\ncore,x\n").unwrap();

        assert!(read_repo_urls_csv(&path).is_err());
    }

    #[test]
    fn test_confirm_valid_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("results");
        assert!(confirm_valid_directory(Some(&nested)));
        assert!(nested.is_dir());
        assert!(!confirm_valid_directory(None));
    }
}
