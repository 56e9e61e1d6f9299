//! ruleci - change-aware rule engine front end
//!
//! The `ruleci` command turns CI job metadata into a rule-engine [`Context`]
//! and runs the matching catalog rules.
//!
//! ## Commands
//!
//! - `run`: run one category against a catalog
//! - `ci test-e2e`: CI entry point driven by `JOB_SPEC`
//! - `local ...`: dry-run previews against the local checkout
//! - `catalogs`: list every declared catalog and its rules

mod diff;
mod github;
mod job_spec;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use ruleci_catalogs::catalogs::{e2e_tests, infra_deployments, release_service_catalog};
use ruleci_catalogs::{load_registry, CI, DEMO, TESTS};
use ruleci_core::{
    Context, EngineConfig, Outcome, Registry, RuleEngine, RunReport, DEFAULT_MAX_PARALLEL,
};

use crate::github::GithubClient;

/// Repository whose PRs are paired with `release-service-catalog` PRs.
const RELEASE_SERVICE: &str = "release-service";

/// Push events on the release catalog test its staging branch.
const STAGING_OWNER: &str = "konflux-ci";
const STAGING_BRANCH: &str = "staging";

#[derive(Parser)]
#[command(name = "ruleci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Select and run the CI rules that apply to a change", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Size of the worker pool used for parallel runs
    #[arg(long, global = true, env = "RULECI_MAX_PARALLEL", default_value_t = DEFAULT_MAX_PARALLEL)]
    max_parallel: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rules of one category
    Run(RunArgs),

    /// CI job entry points
    Ci {
        #[command(subcommand)]
        action: CiAction,
    },

    /// Dry-run previews against the local checkout
    Local {
        #[command(subcommand)]
        action: LocalAction,
    },

    /// List declared catalogs and their rules
    Catalogs,
}

#[derive(Args)]
struct RunArgs {
    /// Category to run (e.g. tests, ci, demo)
    #[arg(short, long)]
    category: String,

    /// Catalog to run; defaults to the catalog named after --repo
    #[arg(long)]
    catalog: Option<String>,

    /// Repository under test
    #[arg(long, default_value = e2e_tests::NAME)]
    repo: String,

    /// Preview matches without running actions
    #[arg(long)]
    dry_run: bool,

    /// Run independent actions concurrently
    #[arg(long)]
    parallel: bool,

    /// Directory for the JUnit and JSON reports
    #[arg(long, env = "ARTIFACT_DIR")]
    output_dir: Option<PathBuf>,

    /// Changed file (repeatable); overrides the git diff
    #[arg(long = "changed-file")]
    changed_files: Vec<String>,

    #[command(flatten)]
    checkout: CheckoutArgs,
}

#[derive(Args, Clone)]
struct CheckoutArgs {
    /// Checkout the changed files are computed in
    #[arg(long, default_value = ".")]
    repo_dir: PathBuf,

    /// Ref the checkout is compared against
    #[arg(long, env = "RULECI_BASE_REF", default_value = diff::DEFAULT_BASE_REF)]
    base_ref: String,
}

#[derive(Subcommand)]
enum CiAction {
    /// Run the end-to-end rules for the job described by JOB_SPEC
    TestE2e(TestE2eArgs),
}

#[derive(Args)]
struct TestE2eArgs {
    #[arg(long, env = "JOB_NAME", default_value = "")]
    job_name: String,

    /// periodic, presubmit or postsubmit
    #[arg(long, env = "JOB_TYPE", default_value = "")]
    job_type: String,

    /// CI job metadata (JSON)
    #[arg(long, env = "JOB_SPEC")]
    job_spec: Option<String>,

    /// JOB_SPEC is in Konflux CI format
    #[arg(long, env = "KONFLUX_CI")]
    konflux_ci: bool,

    #[arg(long, env = "ARTIFACT_DIR", default_value = ".")]
    artifact_dir: PathBuf,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = github::DEFAULT_API_URL)]
    github_api_url: String,

    #[command(flatten)]
    checkout: CheckoutArgs,
}

#[derive(Subcommand)]
enum LocalAction {
    /// Show which e2e-tests rules the local changes select
    PreviewTestSelection(CheckoutArgs),

    /// Walk through the demo rules for the local changes
    RuleDemo(CheckoutArgs),

    /// Preview infra-deployments test selection in parallel mode
    InfraDeploymentsDemo {
        #[arg(long, env = "ARTIFACT_DIR")]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        checkout: CheckoutArgs,
    },
}

/// Which catalog a run resolves.
enum Target<'a> {
    Catalog(&'a str),
    Repository,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    ruleci_core::init_tracing(cli.json, level);

    let registry = load_registry().context("Failed to load rule catalogs")?;
    let engine = RuleEngine::with_config(
        Arc::new(registry),
        EngineConfig::default().with_max_parallel(cli.max_parallel),
    );

    match cli.command {
        Commands::Run(args) => cmd_run(&engine, args).await,
        Commands::Ci { action } => match action {
            CiAction::TestE2e(args) => cmd_ci_test_e2e(&engine, args).await,
        },
        Commands::Local { action } => match action {
            LocalAction::PreviewTestSelection(checkout) => {
                cmd_preview_test_selection(&engine, &checkout).await
            }
            LocalAction::RuleDemo(checkout) => cmd_rule_demo(&engine, &checkout).await,
            LocalAction::InfraDeploymentsDemo {
                output_dir,
                checkout,
            } => cmd_infra_deployments_demo(&engine, output_dir, &checkout).await,
        },
        Commands::Catalogs => {
            print_catalogs(engine.registry());
            Ok(())
        }
    }
}

async fn cmd_run(engine: &RuleEngine, args: RunArgs) -> Result<()> {
    let mut ctx = Context::new(&args.repo);
    ctx.dry_run = args.dry_run;
    ctx.parallel = args.parallel;
    ctx.output_directory = args.output_dir;

    if args.changed_files.is_empty() {
        ctx.set_changed_files(local_changes(&args.checkout).await?);
    } else {
        ctx.set_changed_files(&args.changed_files);
    }

    let target = match &args.catalog {
        Some(name) => Target::Catalog(name),
        None => Target::Repository,
    };
    run_and_report(engine, &ctx, &args.category, target).await
}

async fn cmd_ci_test_e2e(engine: &RuleEngine, args: TestE2eArgs) -> Result<()> {
    let github = GithubClient::new(&args.github_api_url, args.github_token.clone())?;

    let mut ctx = Context::new(e2e_tests::NAME);
    ctx.job_name = args.job_name.clone();
    ctx.job_type = args.job_type.clone();

    if ctx.is_periodic_or_rehearsal() {
        info!(job = %ctx.job_name, job_type = %ctx.job_type, "periodic or rehearsal job, skipping PR resolution");
    } else {
        let raw = args
            .job_spec
            .as_deref()
            .context("JOB_SPEC is not set")?;
        let pr = job_spec::parse(raw, args.konflux_ci)?;

        ctx.repository_name = pr.repository.clone();
        ctx.pr_commit_sha = pr.commit_sha.clone();
        ctx.pr_number = pr.number;
        ctx.event_type = pr.event_type.clone();

        if !pr.is_push() {
            let pull = github
                .pull_request(&pr.organization, &pr.repository, pr.number)
                .await
                .context("failed to resolve the PR head")?;
            ctx.pr_owner = pull.user.login;
            ctx.pr_branch = pull.head.branch;
        } else if pr.repository == release_service_catalog::NAME {
            ctx.pr_owner = STAGING_OWNER.to_string();
            ctx.pr_branch = STAGING_BRANCH.to_string();
        }
    }

    ctx.parallel = true;
    ctx.output_directory = Some(args.artifact_dir.clone());
    ctx.set_changed_files(local_changes(&args.checkout).await?);

    if ctx.repository_name == release_service_catalog::NAME {
        ctx.is_paired = github
            .is_paired(RELEASE_SERVICE, &ctx.pr_owner, &ctx.pr_branch)
            .await;
    }

    info!(
        repository = %ctx.repository_name,
        pr = ctx.pr_number,
        author = %ctx.pr_owner,
        branch = %ctx.pr_branch,
        paired = ctx.is_paired,
        changed_files = ctx.changed_files().len(),
        "CI context ready"
    );

    run_ci(engine, &ctx).await
}

/// Dispatch a prepared CI context to the rules that cover its repository.
async fn run_ci(engine: &RuleEngine, ctx: &Context) -> Result<()> {
    if ctx.repository_name == infra_deployments::NAME {
        return run_and_report(engine, ctx, TESTS, Target::Catalog(infra_deployments::NAME)).await;
    }
    let target = ci_target(engine.registry(), &ctx.repository_name);
    run_and_report(engine, ctx, CI, target).await
}

/// Repositories without a catalog of their own run the full e2e suite.
fn ci_target(registry: &Registry, repository: &str) -> Target<'static> {
    if registry.catalog(repository).is_some() {
        Target::Repository
    } else {
        info!(
            repository,
            fallback = e2e_tests::NAME,
            "no catalog for repository, running the full suite"
        );
        Target::Catalog(e2e_tests::NAME)
    }
}

async fn cmd_preview_test_selection(engine: &RuleEngine, checkout: &CheckoutArgs) -> Result<()> {
    let mut ctx = Context::new(e2e_tests::NAME).with_changed_files(local_changes(checkout).await?);
    ctx.dry_run = true;
    run_and_report(engine, &ctx, TESTS, Target::Catalog(e2e_tests::NAME)).await
}

async fn cmd_rule_demo(engine: &RuleEngine, checkout: &CheckoutArgs) -> Result<()> {
    let mut ctx = Context::new(e2e_tests::NAME).with_changed_files(local_changes(checkout).await?);
    ctx.dry_run = true;
    run_and_report(engine, &ctx, DEMO, Target::Repository).await
}

async fn cmd_infra_deployments_demo(
    engine: &RuleEngine,
    output_dir: Option<PathBuf>,
    checkout: &CheckoutArgs,
) -> Result<()> {
    let mut ctx =
        Context::new(infra_deployments::NAME).with_changed_files(local_changes(checkout).await?);
    ctx.dry_run = true;
    ctx.parallel = true;
    ctx.output_directory = output_dir;
    run_and_report(engine, &ctx, TESTS, Target::Catalog(infra_deployments::NAME)).await
}

async fn local_changes(checkout: &CheckoutArgs) -> Result<Vec<String>> {
    diff::changed_files(&checkout.repo_dir, &checkout.base_ref)
        .await
        .with_context(|| {
            format!(
                "failed to list changed files in {}",
                display_dir(&checkout.repo_dir)
            )
        })
}

fn display_dir(dir: &Path) -> String {
    dir.canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}

/// Run, print the report, and turn a failed aggregate into an error exit.
async fn run_and_report(
    engine: &RuleEngine,
    ctx: &Context,
    category: &str,
    target: Target<'_>,
) -> Result<()> {
    let outcome = match target {
        Target::Catalog(name) => engine.run_rules(ctx, category, name).await,
        Target::Repository => engine.run_rules_of_category(category, ctx).await,
    };

    match outcome {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err.report() {
                print_report(report);
            }
            Err(anyhow::Error::new(err).context(run_label(ctx, category)))
        }
    }
}

fn run_label(ctx: &Context, category: &str) -> String {
    format!(
        "{} rules for {} did not all pass",
        category, ctx.repository_name
    )
}

fn print_report(report: &RunReport) {
    println!(
        "{} / {}{}  ({} rule(s), {} ms)",
        report.catalog,
        report.category,
        if report.dry_run { "  [dry-run]" } else { "" },
        report.results.len(),
        report.duration_ms
    );
    if report.results.is_empty() {
        println!("  no rules matched");
    }
    for result in &report.results {
        let marker = match result.outcome {
            Outcome::Success => "PASS",
            Outcome::Failure => "FAIL",
            Outcome::Skipped => "SKIP",
        };
        println!("  [{marker}] {} ({} ms)", result.rule_name, result.duration_ms);
        if let Some(error) = &result.error {
            println!("         {error}");
        }
    }
}

fn print_catalogs(registry: &Registry) {
    for catalog in registry.iter() {
        println!("{}", catalog.name());
        for rule in catalog.rules() {
            println!("  {:<6} {}", rule.category, rule.name);
            println!("         when   {}", rule.condition);
            println!("         action {}", rule.action.describe());
            if !rule.labels.is_empty() {
                println!("         labels {}", rule.labels.join(", "));
            }
            if !rule.depends_on.is_empty() {
                println!("         after  {}", rule.depends_on.join(", "));
            }
        }
    }
}
