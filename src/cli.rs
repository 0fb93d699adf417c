use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::analyze::{AnalyzerRegistry, RepoBuildCount};
use crate::auth::{CredentialSource, EnvCredentials, StaticCredentials, Token, TOKEN_ENV_VAR};
use crate::config::Config;
use crate::files;
use crate::github::{cancel_pair, GitHubFetcher};
use crate::output::{
    bright_red, print_analysis, print_summary, FetchProgress, RepoFetchSummary,
};
use crate::produce;
use crate::release::ReleaseUploader;

#[derive(Parser)]
#[command(name = "workhist")]
#[command(author, version, about = "GitHub Actions workflow history archiver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (workhist.toml/json/yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, flatten, and save workflow-run history for repositories
    Analyze {
        /// Repository URLs or owner/repo pairs
        repo_urls: Vec<String>,

        /// CSV file with a 'url' column of additional repositories
        #[arg(long)]
        repos_csv: Option<PathBuf>,

        #[arg(short, long, env = TOKEN_ENV_VAR, hide_env_values = true)]
        token: Option<String>,

        /// GitHub API base URL
        #[arg(short, long)]
        url: Option<String>,

        /// Directory where CSV results are written
        #[arg(short, long)]
        results_dir: Option<PathBuf>,

        /// Save per-repository and combined CSV files
        #[arg(short, long, default_value_t = false)]
        save: bool,

        /// Retry budget for each page request
        #[arg(short, long)]
        max_retries: Option<u32>,

        /// Run every registered analyzer on the downloaded data
        #[arg(long, default_value_t = false)]
        report: bool,

        /// Run only the named analyzer
        #[arg(long)]
        analyzer: Option<String>,
    },

    /// Concatenate previously saved per-repository CSV files
    Combine {
        /// Directory containing the per-repository CSV files
        csv_dir: PathBuf,

        /// Directory where the combined files are written (defaults to csv-dir)
        #[arg(short, long)]
        results_dir: Option<PathBuf>,
    },

    /// Upload a results directory as assets of a new GitHub release
    Upload {
        /// Repository receiving the release, in owner/repo format
        #[arg(short = 'P', long)]
        project: String,

        /// Release tag, e.g. v1.2.3
        #[arg(long)]
        tag: String,

        /// Directory whose files become release assets
        results_dir: PathBuf,

        #[arg(short, long, env = TOKEN_ENV_VAR, hide_env_values = true)]
        token: Option<String>,

        /// GitHub API base URL
        #[arg(short, long)]
        url: Option<String>,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Analyze {
                repo_urls,
                repos_csv,
                token,
                url,
                results_dir,
                save,
                max_retries,
                report,
                analyzer,
            } => {
                self.execute_analyze(
                    &config,
                    repo_urls,
                    repos_csv.as_deref(),
                    token.as_deref(),
                    url.as_deref(),
                    results_dir.clone(),
                    *save,
                    *max_retries,
                    *report,
                    analyzer.as_deref(),
                )
                .await
            }
            Commands::Combine {
                csv_dir,
                results_dir,
            } => {
                let results_dir = results_dir.as_deref().unwrap_or(csv_dir.as_path());
                for label in [files::WORKFLOWS_LABEL, files::COMMITS_LABEL] {
                    let path = crate::combine::write_combined_table(csv_dir, results_dir, label)?;
                    println!("Wrote {}", path.display());
                }
                Ok(())
            }
            Commands::Upload {
                project,
                tag,
                results_dir,
                token,
                url,
            } => {
                let Some(token) = token.clone().or_else(|| config.github.token.clone()) else {
                    bail!("uploading a release requires a GitHub access token");
                };
                let base_url = url.clone().unwrap_or_else(|| config.github.base_url.clone());
                let uploader = ReleaseUploader::new(&base_url, Token::from(token.as_str()))?;
                let uploaded = uploader
                    .upload_results(project, tag, results_dir)
                    .await
                    .with_context(|| format!("failed to upload results to {project}"))?;
                println!("Uploaded {uploaded} files to release {tag} of {project}");
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_analyze(
        &self,
        config: &Config,
        repo_urls: &[String],
        repos_csv: Option<&std::path::Path>,
        token: Option<&str>,
        url: Option<&str>,
        results_dir: Option<PathBuf>,
        save: bool,
        max_retries: Option<u32>,
        report: bool,
        analyzer: Option<&str>,
    ) -> Result<()> {
        let base_url = url
            .map(str::to_owned)
            .unwrap_or_else(|| config.github.base_url.clone());
        let token = token
            .map(str::to_owned)
            .or_else(|| config.github.token.clone());
        let credentials: Box<dyn CredentialSource> = match token {
            Some(token) => Box::new(StaticCredentials(Some(Token::from(token.as_str())))),
            None => Box::new(EnvCredentials),
        };
        let options = config.github.fetch_options(max_retries);
        let results_dir = results_dir.or_else(|| config.output.results_dir.clone());
        let save = save || config.output.save;

        let mut targets: Vec<String> = repo_urls.to_vec();
        if let Some(path) = repos_csv {
            targets.extend(files::read_repo_urls_csv(path)?);
        }
        if targets.is_empty() {
            bail!("no repositories given; pass URLs or --repos-csv");
        }

        // Ctrl-C aborts the current fetch instead of killing the process,
        // so the summary for already-fetched repositories still prints.
        let (cancel_handle, cancel) = cancel_pair();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel_handle.cancel();
            }
        });

        let mut summaries: Vec<RepoFetchSummary> = Vec::new();
        let mut counts: Vec<RepoBuildCount> = Vec::new();
        let mut all_workflows = Vec::new();
        let mut all_commits = Vec::new();

        for target in &targets {
            let Some((organization, repo)) = produce::parse_github_url(target) else {
                warn!("'{target}' is not a recognizable repository URL, skipping");
                continue;
            };
            let repository = format!("{organization}/{repo}");
            info!("analyzing the workflow history of {repository}");

            let progress = Arc::new(FetchProgress::new(&repository));
            let fetcher = GitHubFetcher::new(
                base_url.clone(),
                &repository,
                credentials.as_ref(),
                options.clone(),
            )?
            .with_observer(Arc::clone(&progress) as Arc<dyn crate::github::FetchObserver>)
            .with_cancel(cancel.clone());

            let result = fetcher.fetch_all().await;

            if !result.valid {
                // no partial output: the repository is reported and skipped
                eprintln!(
                    "{}",
                    bright_red(format!(
                        "Could not retrieve workflow data for {repository}"
                    ))
                );
                summaries.push(RepoFetchSummary {
                    repository,
                    valid: false,
                    pages: 0,
                    records: 0,
                    retries: result.total_retry_count,
                    slept_seconds: result.total_retry_time,
                });
                if cancel.is_cancelled() {
                    warn!("fetch cancelled, skipping the remaining repositories");
                    break;
                }
                continue;
            }

            let records = result.record_count();
            progress.finish(&repository, result.pages.len(), records);

            let workflows =
                produce::create_workflow_records(&organization, &repo, target, &result.pages);
            let commits =
                produce::create_commit_records(&organization, &repo, target, &result.pages);

            if save {
                if let Some(dir) = usable_directory(results_dir.as_deref()) {
                    let workflow_rows: Vec<_> =
                        workflows.iter().map(files::workflow_row).collect();
                    let commit_rows: Vec<_> = commits.iter().map(files::commit_row).collect();
                    files::save_table(
                        dir,
                        &organization,
                        &repo,
                        files::WORKFLOWS_LABEL,
                        files::WORKFLOWS_HEADER,
                        &workflow_rows,
                    )?;
                    files::save_table(
                        dir,
                        &organization,
                        &repo,
                        files::COMMITS_LABEL,
                        files::COMMITS_HEADER,
                        &commit_rows,
                    )?;
                } else {
                    warn!("results directory is not usable, skipping save for {repository}");
                }
            }

            summaries.push(RepoFetchSummary {
                repository,
                valid: true,
                pages: result.pages.len(),
                records,
                retries: result.total_retry_count,
                slept_seconds: result.total_retry_time,
            });
            counts.push(RepoBuildCount {
                organization,
                repo,
                builds: records,
            });
            all_workflows.extend(workflows);
            all_commits.extend(commits);
        }

        if save {
            if let Some(dir) = usable_directory(results_dir.as_deref()) {
                let workflow_rows: Vec<_> =
                    all_workflows.iter().map(files::workflow_row).collect();
                let commit_rows: Vec<_> = all_commits.iter().map(files::commit_row).collect();
                files::save_table_all(
                    dir,
                    files::WORKFLOWS_LABEL,
                    files::WORKFLOWS_HEADER,
                    &workflow_rows,
                )?;
                files::save_table_all(
                    dir,
                    files::COMMITS_LABEL,
                    files::COMMITS_HEADER,
                    &commit_rows,
                )?;
            }
        }

        print_summary(&summaries);

        if report || analyzer.is_some() {
            let registry = AnalyzerRegistry::with_builtins();
            match analyzer {
                Some(name) => {
                    let analyzer = registry.get(name)?;
                    let analysis = analyzer.analyze(&counts, &all_commits, &all_workflows)?;
                    print_analysis(analyzer.name(), &analysis);
                }
                None => {
                    for analyzer in registry.iter() {
                        let analysis = analyzer.analyze(&counts, &all_commits, &all_workflows)?;
                        print_analysis(analyzer.name(), &analysis);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Returns the results directory only when it exists or could be created.
fn usable_directory(dir: Option<&std::path::Path>) -> Option<&std::path::Path> {
    if files::confirm_valid_directory(dir) {
        dir
    } else {
        None
    }
}
