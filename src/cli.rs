use anyhow::Result;
use clap::Parser;

use crate::types::{
    DEFAULT_MAX_CONCURRENT, DEFAULT_PAGE_SIZE, DisplayMode, DisplayOptions, MAX_PAGE_SIZE,
    QuerySpec, Repo,
};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "List your open GitHub pull requests and what is blocking each one"
)]
struct CliArgs {
    /// Only include pull requests from these organisations or users (can specify multiple or comma-separated)
    #[arg(short = 'o', long = "org", value_name = "ORG", value_delimiter = ',')]
    pub orgs: Vec<String>,

    /// Only include pull requests from these repositories (can specify multiple or comma-separated)
    #[arg(
        short = 'r',
        long = "repo",
        value_name = "OWNER/REPO|URL",
        value_delimiter = ','
    )]
    pub repos: Vec<String>,

    /// Pull requests requested per page
    #[arg(long = "page-size", default_value_t = DEFAULT_PAGE_SIZE, value_name = "NUM")]
    pub page_size: u32,

    /// Maximum concurrent merge-state lookups
    #[arg(short = 'j', long, default_value_t = DEFAULT_MAX_CONCURRENT, value_name = "NUM")]
    pub concurrency: usize,

    /// Print pull request URLs only
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Do not truncate titles to the terminal width
    #[arg(long = "no-truncate")]
    pub no_truncate: bool,
}

impl CliArgs {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            anyhow::bail!(
                "--page-size must be between 1 and {}, got: {}",
                MAX_PAGE_SIZE,
                self.page_size
            );
        }

        if self.concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }

        for org in &self.orgs {
            let org = org.trim();
            if org.is_empty() || org.contains('/') {
                anyhow::bail!("Invalid organisation '{}': expected a bare login", org);
            }
        }

        Ok(())
    }
}

fn parse_repo_arg(repo: &str) -> Result<Repo> {
    let repo = repo.trim();
    let parsed = if repo.starts_with("https://") {
        Repo::parse_url(repo)
    } else {
        Repo::parse(repo)
    };
    parsed.map_err(|e| anyhow::anyhow!("Invalid repository '{}': {}", repo, e))
}

fn determine_display_options(cli: &CliArgs) -> DisplayOptions {
    DisplayOptions {
        mode: if cli.quiet {
            DisplayMode::Quiet
        } else {
            DisplayMode::Normal
        },
        truncate_titles: !cli.no_truncate,
    }
}

fn create_query_spec(cli: CliArgs) -> Result<QuerySpec> {
    cli.validate()?;

    let repos = cli
        .repos
        .iter()
        .filter(|r| !r.trim().is_empty())
        .map(|r| parse_repo_arg(r))
        .collect::<Result<Vec<_>>>()?;

    let orgs = cli
        .orgs
        .into_iter()
        .map(|org| org.trim().to_string())
        .collect();

    Ok(QuerySpec {
        orgs,
        repos,
        page_size: cli.page_size,
        max_concurrent: cli.concurrency,
    })
}

/// Parses command-line arguments into a query specification and display
/// options.
pub fn parse_args<I, T>(args: I) -> Result<(QuerySpec, DisplayOptions)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    let display = determine_display_options(&cli);
    let spec = create_query_spec(cli)?;
    Ok((spec, display))
}
