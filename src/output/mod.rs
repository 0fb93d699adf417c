mod progress;
mod styling;
mod summary;

pub use progress::FetchProgress;
pub use styling::{bright_red, dim, magenta_bold};
pub use summary::{print_analysis, print_summary, RepoFetchSummary};

/// Prints the `workhist` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📜 workhist"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Know your GitHub Actions workflow history")
    );
}
