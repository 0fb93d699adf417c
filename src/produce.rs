use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use crate::github::PageBatch;

/// One flattened workflow-run row, built once per raw JSON record.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRecord {
    pub organization: String,
    pub repo: String,
    pub repo_url: String,
    pub id: u64,
    pub name: String,
    pub head_sha: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub event: String,
    pub status: String,
    pub conclusion: String,
    pub jobs_url: String,
}

/// One flattened head-commit row for a workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub organization: String,
    pub repo: String,
    pub repo_url: String,
    pub head_sha: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub author_name: String,
    pub author_email: String,
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn timestamp(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Build the GitHub API URL for a repository's workflow-run collection.
pub fn create_github_api_url(base_url: &str, organization: &str, repo: &str) -> String {
    format!(
        "{}/repos/{organization}/{repo}/actions/runs",
        base_url.trim_end_matches('/')
    )
}

/// Extract `(organization, repo)` from a repository URL such as
/// `https://github.com/octo-org/octo-repo`, or a bare `org/repo` pair.
pub fn parse_github_url(repo_url: &str) -> Option<(String, String)> {
    let trimmed = repo_url
        .trim()
        .trim_end_matches('/')
        .trim_end_matches(".git");
    let path = match url::Url::parse(trimmed) {
        Ok(parsed) => parsed.path().trim_matches('/').to_owned(),
        Err(_) => trimmed.to_owned(),
    };
    let mut segments = path.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(org), Some(repo), None) if !org.is_empty() && !repo.is_empty() => {
            Some((org.to_owned(), repo.to_owned()))
        }
        _ => None,
    }
}

/// Count the individual workflow-run records across all fetched pages.
pub fn count_individual_builds(pages: &[PageBatch]) -> usize {
    pages.iter().map(Vec::len).sum()
}

/// Flatten every page of raw workflow-run JSON into typed rows.
pub fn create_workflow_records(
    organization: &str,
    repo: &str,
    repo_url: &str,
    pages: &[PageBatch],
) -> Vec<WorkflowRecord> {
    let mut records = Vec::with_capacity(count_individual_builds(pages));
    for page in pages {
        for run in page {
            records.push(WorkflowRecord {
                organization: organization.to_owned(),
                repo: repo.to_owned(),
                repo_url: repo_url.to_owned(),
                id: run.get("id").and_then(Value::as_u64).unwrap_or_default(),
                name: text(run, "name"),
                head_sha: text(run, "head_sha"),
                created_at: timestamp(run, "created_at"),
                updated_at: timestamp(run, "updated_at"),
                event: text(run, "event"),
                status: text(run, "status"),
                conclusion: text(run, "conclusion"),
                jobs_url: text(run, "jobs_url"),
            });
        }
    }
    debug!("flattened {} workflow records", records.len());
    records
}

/// Flatten the nested `head_commit` of every workflow run into typed rows.
pub fn create_commit_records(
    organization: &str,
    repo: &str,
    repo_url: &str,
    pages: &[PageBatch],
) -> Vec<CommitRecord> {
    let mut records = Vec::with_capacity(count_individual_builds(pages));
    for page in pages {
        for run in page {
            let Some(commit) = run.get("head_commit").filter(|c| c.is_object()) else {
                continue;
            };
            let author = commit.get("author").cloned().unwrap_or(Value::Null);
            records.push(CommitRecord {
                organization: organization.to_owned(),
                repo: repo.to_owned(),
                repo_url: repo_url.to_owned(),
                head_sha: text(run, "head_sha"),
                message: text(commit, "message"),
                timestamp: timestamp(commit, "timestamp"),
                author_name: text(&author, "name"),
                author_email: text(&author, "email"),
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_run() -> Value {
        json!({
            "id": 161802486,
            "name": "build",
            "node_id": "MDExOldvcmtmbG93UnVuMTYxODAyNDg2",
            "head_branch": "main",
            "head_sha": "abc123",
            "created_at": "2021-07-01T12:00:00Z",
            "updated_at": "2021-07-01T12:05:00Z",
            "event": "push",
            "status": "completed",
            "conclusion": "success",
            "jobs_url": "https://api.github.com/repos/o/r/actions/runs/161802486/jobs",
            "head_commit": {
                "message": "Fix the build",
                "timestamp": "2021-07-01T11:59:00Z",
                "author": {"name": "Ada", "email": "ada@example.com"}
            }
        })
    }

    #[test]
    fn test_create_workflow_records_selects_expected_fields() {
        let pages = vec![vec![sample_run()]];
        let records = create_workflow_records("octo-org", "octo-repo", "https://github.com/octo-org/octo-repo", &pages);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, 161802486);
        assert_eq!(record.name, "build");
        assert_eq!(record.head_sha, "abc123");
        assert_eq!(record.event, "push");
        assert_eq!(record.conclusion, "success");
        assert!(record.created_at.is_some());
        assert_eq!(record.organization, "octo-org");
    }

    #[test]
    fn test_create_commit_records_reads_nested_head_commit() {
        let pages = vec![vec![sample_run()]];
        let records = create_commit_records("octo-org", "octo-repo", "url", &pages);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "Fix the build");
        assert_eq!(records[0].author_name, "Ada");
        assert_eq!(records[0].author_email, "ada@example.com");
    }

    #[test]
    fn test_count_individual_builds_spans_pages() {
        let pages = vec![vec![sample_run(), sample_run()], vec![], vec![sample_run()]];
        assert_eq!(count_individual_builds(&pages), 3);
    }

    #[test]
    fn test_parse_github_url_variants() {
        assert_eq!(
            parse_github_url("https://github.com/octo-org/octo-repo"),
            Some(("octo-org".to_owned(), "octo-repo".to_owned()))
        );
        assert_eq!(
            parse_github_url("https://github.com/octo-org/octo-repo.git/"),
            Some(("octo-org".to_owned(), "octo-repo".to_owned()))
        );
        assert_eq!(
            parse_github_url("octo-org/octo-repo"),
            Some(("octo-org".to_owned(), "octo-repo".to_owned()))
        );
        assert_eq!(parse_github_url("not-a-repo"), None);
    }

    #[test]
    fn test_create_github_api_url() {
        assert_eq!(
            create_github_api_url("https://api.github.com/", "octo-org", "octo-repo"),
            "https://api.github.com/repos/octo-org/octo-repo/actions/runs"
        );
    }
}
