use indexmap::IndexMap;

use crate::error::{Result, WorkHistError};
use crate::produce::{CommitRecord, WorkflowRecord};

/// Number of downloaded builds for one repository, input to analyzers.
#[derive(Debug, Clone)]
pub struct RepoBuildCount {
    pub organization: String,
    pub repo: String,
    pub builds: usize,
}

/// Output of one analyzer: a small table plus free-form diagnostics and a
/// flag saying whether the finding deserves attention.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub header: Vec<String>,
    pub table: Vec<Vec<String>>,
    pub diagnostics: Vec<String>,
    pub significant: bool,
}

/// Contract every analyzer must satisfy.
///
/// Implementing this trait is the capability check: there is no duck-typed
/// module probing, an analyzer that does not provide `analyze` simply does
/// not compile. Registration still validates the name so lookup failures
/// stay descriptive.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(
        &self,
        counts: &[RepoBuildCount],
        commits: &[CommitRecord],
        workflows: &[WorkflowRecord],
    ) -> Result<Analysis>;
}

/// Explicitly constructed analyzer registry.
///
/// Owned by the top-level process and passed by reference to whatever needs
/// analyzer lookup; there is no hidden global. Iteration order is the
/// registration order.
#[derive(Default)]
pub struct AnalyzerRegistry {
    analyzers: IndexMap<String, Box<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the analyzers that ship with the tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // registering a builtin cannot collide with itself
        let _ = registry.register(Box::new(ConclusionBreakdown));
        registry
    }

    pub fn register(&mut self, analyzer: Box<dyn Analyzer>) -> Result<()> {
        let name = analyzer.name().to_owned();
        if name.is_empty() {
            return Err(WorkHistError::Analyzer(
                "analyzer must have a non-empty name".to_owned(),
            ));
        }
        if self.analyzers.contains_key(&name) {
            return Err(WorkHistError::Analyzer(format!(
                "analyzer '{name}' is already registered"
            )));
        }
        self.analyzers.insert(name, analyzer);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&dyn Analyzer> {
        self.analyzers.get(name).map(Box::as_ref).ok_or_else(|| {
            WorkHistError::Analyzer(format!(
                "no analyzer named '{name}'; available: {}",
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.analyzers.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Analyzer> {
        self.analyzers.values().map(Box::as_ref)
    }
}

/// Built-in analyzer: how often each workflow conclusion occurs.
pub struct ConclusionBreakdown;

impl Analyzer for ConclusionBreakdown {
    fn name(&self) -> &str {
        "conclusion-breakdown"
    }

    fn analyze(
        &self,
        _counts: &[RepoBuildCount],
        _commits: &[CommitRecord],
        workflows: &[WorkflowRecord],
    ) -> Result<Analysis> {
        let mut tally: IndexMap<String, usize> = IndexMap::new();
        for record in workflows {
            let conclusion = if record.conclusion.is_empty() {
                "(none)".to_owned()
            } else {
                record.conclusion.clone()
            };
            *tally.entry(conclusion).or_insert(0) += 1;
        }

        let total = workflows.len();
        let table = tally
            .iter()
            .map(|(conclusion, count)| {
                let share = if total > 0 {
                    100.0 * *count as f64 / total as f64
                } else {
                    0.0
                };
                vec![
                    conclusion.clone(),
                    count.to_string(),
                    format!("{share:.1}"),
                ]
            })
            .collect();

        let failures = tally.get("failure").copied().unwrap_or(0);
        let significant = total > 0 && failures * 2 > total;
        let diagnostics = vec![format!(
            "{failures} of {total} workflow runs concluded in failure"
        )];

        Ok(Analysis {
            header: vec![
                "conclusion".to_owned(),
                "count".to_owned(),
                "percent".to_owned(),
            ],
            table,
            diagnostics,
            significant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(conclusion: &str) -> WorkflowRecord {
        WorkflowRecord {
            organization: "o".to_owned(),
            repo: "r".to_owned(),
            repo_url: "u".to_owned(),
            id: 1,
            name: "build".to_owned(),
            head_sha: "sha".to_owned(),
            created_at: None,
            updated_at: None,
            event: "push".to_owned(),
            status: "completed".to_owned(),
            conclusion: conclusion.to_owned(),
            jobs_url: String::new(),
        }
    }

    #[test]
    fn test_registry_lookup_by_name() {
        let registry = AnalyzerRegistry::with_builtins();
        assert!(registry.get("conclusion-breakdown").is_ok());
    }

    #[test]
    fn test_registry_unknown_name_lists_available() {
        let registry = AnalyzerRegistry::with_builtins();
        let error = registry.get("nope").err().unwrap().to_string();
        assert!(error.contains("nope"));
        assert!(error.contains("conclusion-breakdown"));
    }

    #[test]
    fn test_registry_rejects_duplicate_registration() {
        let mut registry = AnalyzerRegistry::with_builtins();
        assert!(registry.register(Box::new(ConclusionBreakdown)).is_err());
    }

    #[test]
    fn test_conclusion_breakdown_counts_and_flags() {
        let workflows = vec![
            workflow("failure"),
            workflow("failure"),
            workflow("success"),
        ];
        let analysis = ConclusionBreakdown.analyze(&[], &[], &workflows).unwrap();

        assert_eq!(analysis.table.len(), 2);
        assert_eq!(analysis.table[0], vec!["failure", "2", "66.7"]);
        assert!(analysis.significant);
    }

    #[test]
    fn test_conclusion_breakdown_handles_no_data() {
        let analysis = ConclusionBreakdown.analyze(&[], &[], &[]).unwrap();
        assert!(analysis.table.is_empty());
        assert!(!analysis.significant);
    }
}
