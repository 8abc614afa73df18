use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use branchdrift_core::{CommitRef, DriftConfig, HistoryPoint, OutputFormat, SamplingOptions};
use branchdrift_gitstat::runner::{CommandRunner, GitCli};
use branchdrift_history::{AggregateOutcome, Tracker};

const CONFIG_FILE: &str = ".branchdrift.toml";

#[derive(Parser)]
#[command(
    name = "branchdrift",
    version,
    about = "Track how far long-lived branches drift from their base",
    long_about = "branchdrift measures how many lines each tracked branch differs from a base\n\
                   branch, per directory, and samples that divergence back through history.\n\
                   Results are cached on disk, so repeated queries do not rerun git.\n\n\
                   Examples:\n  \
                     branchdrift init                       Create a .branchdrift.toml config file\n  \
                     branchdrift matrix                     Current divergence of every branch\n  \
                     branchdrift diff --base-commit A --compare-commit B --dir engine\n  \
                     branchdrift timeline --base main       Divergence over time per branch\n  \
                     branchdrift doctor                     Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .branchdrift.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository to inspect (overrides repository.path)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(
        long,
        short,
        global = true,
        long_help = "Enable verbose output.\n\n\
                       Logs every git invocation and cache lookup to stderr. The\n\
                       BRANCHDRIFT_LOG environment variable takes precedence, e.g.\n\
                       BRANCHDRIFT_LOG=branchdrift_cache=debug."
    )]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current divergence of every tracked branch, per directory
    #[command(long_about = "Show the current divergence of every tracked branch, per directory.\n\n\
        Each cell is the number of inserted plus deleted lines between the base\n\
        branch and the tracked branch, restricted to one tracked directory.\n\n\
        Examples:\n  branchdrift matrix\n  branchdrift matrix --base release/2.0 --format markdown")]
    Matrix {
        /// Base branch (default: tracking.base_branch)
        #[arg(long)]
        base: Option<String>,
    },
    /// Drill into one commit pair: file stats, commit info, and history
    #[command(long_about = "Drill into one commit pair: file stats, commit info, and history.\n\n\
        Per-file statistics are always recomputed. The history series is sampled\n\
        backwards from the newer commit and cached.\n\n\
        Examples:\n  branchdrift diff --base-commit 1a2b3c --compare-commit 4d5e6f --dir engine/dev")]
    Diff {
        #[command(flatten)]
        pair: CommitPair,
    },
    /// Print the sampled divergence history of one commit pair
    #[command(long_about = "Print the sampled divergence history of one commit pair.\n\n\
        Samples stop once the base commit has no ancestor at the sampled date.\n\
        Points where the compare commit has no ancestor are reported with a zero total.\n\n\
        Examples:\n  branchdrift history --base-commit 1a2b3c --compare-commit 4d5e6f --dir engine\n  \
        branchdrift history --base-commit 1a2b3c --compare-commit 4d5e6f --dir engine --samples 10 --interval 7")]
    History {
        #[command(flatten)]
        pair: CommitPair,
    },
    /// Show summed divergence over time for every tracked branch
    #[command(long_about = "Show summed divergence over time for every tracked branch.\n\n\
        Each branch is sampled in parallel over all tracked directories. If the\n\
        work does not finish within history.aggregate_timeout_secs the command\n\
        reports the timeline as unavailable and exits with a non-zero status.\n\
        Cached results make later runs fast.\n\n\
        Examples:\n  branchdrift timeline\n  branchdrift timeline --base main --format json")]
    Timeline {
        /// Base branch (default: tracking.base_branch)
        #[arg(long)]
        base: Option<String>,
    },
    /// Create a default .branchdrift.toml configuration file
    #[command(long_about = "Create a default .branchdrift.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .branchdrift.toml already exists.")]
    Init,
    /// Check your branchdrift setup and environment
    #[command(long_about = "Check your branchdrift setup and environment.\n\n\
        Runs diagnostics for the git repository, git executable, config file,\n\
        tracked branches, and cache directory. Use --format json for\n\
        machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args)]
struct CommitPair {
    /// Revision the diff is taken from (hash, tag or branch)
    #[arg(long)]
    base_commit: String,

    /// Revision the diff is taken to (hash, tag or branch)
    #[arg(long)]
    compare_commit: String,

    /// Directory the diff is restricted to
    #[arg(long)]
    dir: String,

    /// Number of history samples (default: history.sample_count)
    #[arg(long)]
    samples: Option<u32>,

    /// Days between history samples (default: history.sample_interval_days)
    #[arg(long)]
    interval: Option<u32>,
}

impl CommitPair {
    fn commits(&self, tracker: &Tracker) -> Result<(CommitRef, CommitRef)> {
        Ok((
            tracker.resolve_commit(&self.base_commit)?,
            tracker.resolve_commit(&self.compare_commit)?,
        ))
    }

    fn sampling(&self, config: &DriftConfig) -> Result<SamplingOptions> {
        let defaults = config.history.sampling();
        let options = SamplingOptions {
            count: self.samples.unwrap_or(defaults.count),
            interval_days: self.interval.unwrap_or(defaults.interval_days),
        };
        if options.count == 0 || options.interval_days == 0 {
            miette::bail!("--samples and --interval must be at least 1");
        }
        Ok(options)
    }
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mbranchdrift\x1b[0m v{version}: how far have your branches drifted?\n");

        println!("Quick start:");
        println!("  \x1b[36mbranchdrift init\x1b[0m      Create a .branchdrift.toml config file");
        println!("  \x1b[36mbranchdrift matrix\x1b[0m    Current divergence per branch and directory\n");

        println!("All commands:");
        println!("  \x1b[32mmatrix\x1b[0m    Divergence of every tracked branch, per directory");
        println!("  \x1b[32mdiff\x1b[0m      File stats, commit info, and history for one commit pair");
        println!("  \x1b[32mhistory\x1b[0m   Sampled divergence history of one commit pair");
        println!("  \x1b[32mtimeline\x1b[0m  Summed divergence over time per branch");
        println!("  \x1b[32mdoctor\x1b[0m    Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m      Create a default config file\n");
    } else {
        println!("branchdrift v{version}: how far have your branches drifted?\n");

        println!("Quick start:");
        println!("  branchdrift init      Create a .branchdrift.toml config file");
        println!("  branchdrift matrix    Current divergence per branch and directory\n");

        println!("All commands:");
        println!("  matrix    Divergence of every tracked branch, per directory");
        println!("  diff      File stats, commit info, and history for one commit pair");
        println!("  history   Sampled divergence history of one commit pair");
        println!("  timeline  Summed divergence over time per branch");
        println!("  doctor    Check your setup and environment");
        println!("  init      Create a default config file\n");
    }

    println!("Run 'branchdrift <command> --help' for details.");
}

fn init_logging(verbose: bool, use_color: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("BRANCHDRIFT_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(use_color)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<DriftConfig> {
    let mut config = match &cli.config {
        Some(path) => DriftConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                DriftConfig::from_file(default_path)?
            } else {
                DriftConfig::default()
            }
        }
    };
    if let Some(repo) = &cli.repo {
        config.repository.path = repo.clone();
    }
    config.validate()?;
    Ok(config)
}

fn spinner(message: &'static str) -> Result<Option<indicatif::ProgressBar>> {
    if !std::io::stderr().is_terminal() {
        return Ok(None);
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .into_diagnostic()?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(Some(pb))
}

fn print_history(points: &[HistoryPoint], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(points).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("| Date | Total | Base | Compare |");
            println!("|------|------:|------|---------|");
            for p in points {
                println!(
                    "| {} | {} | `{}` | `{}` |",
                    p.date,
                    p.total,
                    p.base_commit.short(),
                    p.compare_commit.short()
                );
            }
        }
        OutputFormat::Text => {
            println!("{:<12} {:>10}  {:<8}  {:<8}", "Date", "Total", "Base", "Compare");
            println!("{}", "-".repeat(44));
            for p in points {
                println!(
                    "{:<12} {:>10}  {:<8}  {:<8}",
                    p.date.to_string(),
                    p.total,
                    p.base_commit.short(),
                    p.compare_commit.short()
                );
            }
        }
    }
    Ok(())
}

fn print_timeline(outcome: &AggregateOutcome, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(outcome).into_diagnostic()?);
        return Ok(());
    }

    let Some(series) = outcome.ready() else {
        eprintln!("Timeline unavailable: branch sampling did not finish in time.");
        eprintln!("Diffs finished so far were cached; a rerun skips them.");
        return Ok(());
    };

    for (branch, points) in series {
        if format == OutputFormat::Markdown {
            println!("## {branch}\n");
            println!("| Date | Total |");
            println!("|------|------:|");
            for p in points {
                println!("| {} | {} |", p.date, p.total);
            }
            println!();
        } else {
            println!("{branch}");
            for p in points {
                println!("  {}  {:>10}", p.date, p.total);
            }
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn run_doctor(config: &DriftConfig, config_path: &Path, format: OutputFormat, use_color: bool) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();
    let repo_path = &config.repository.path;

    // 1. Git repository
    let repo = git2::Repository::discover(repo_path).ok();
    match &repo {
        Some(repo) => {
            let root = repo.workdir().unwrap_or_else(|| repo.path());
            checks.push(CheckResult::pass(
                "git_repository",
                format!("detected at {}", root.display()),
            ));
        }
        None => checks.push(CheckResult::fail(
            "git_repository",
            format!("{} is not a git repository", repo_path.display()),
            "run from inside a repository or pass --repo",
        )),
    }

    // 2. Git executable
    match GitCli::new(repo_path).run(&["--version".to_string()]) {
        Ok(version) => checks.push(CheckResult::pass("git_executable", version.trim())),
        Err(e) => checks.push(CheckResult::fail(
            "git_executable",
            e.to_string(),
            "install git and make sure it is on PATH",
        )),
    }

    // 3. Config file
    if config_path.exists() {
        checks.push(CheckResult::pass(
            "config_file",
            format!("{} found", config_path.display()),
        ));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            format!("{} not found", config_path.display()),
            "run 'branchdrift init' to create a default config",
        ));
    }

    // 4. Tracking
    let tracking = &config.tracking;
    if tracking.branches.is_empty() || tracking.directories.is_empty() {
        checks.push(CheckResult::fail(
            "tracking",
            format!(
                "{} branches, {} directories",
                tracking.branches.len(),
                tracking.directories.len()
            ),
            "list branches and directories under [tracking]",
        ));
    } else {
        checks.push(CheckResult::pass(
            "tracking",
            format!(
                "{} branches, {} directories",
                tracking.branches.len(),
                tracking.directories.len()
            ),
        ));
    }

    // 5. Branches resolvable
    if let Some(repo) = &repo {
        let prefix = if config.repository.use_remote_branches {
            format!("{}/", config.repository.remote)
        } else {
            String::new()
        };
        let names = std::iter::once(&tracking.base_branch).chain(&tracking.branches);
        let missing: Vec<String> = names
            .map(|b| format!("{prefix}{b}"))
            .filter(|name| repo.revparse_single(name).is_err())
            .collect();
        if missing.is_empty() {
            checks.push(CheckResult::pass(
                "branches",
                format!("{} branches resolve", tracking.branches.len() + 1),
            ));
        } else {
            checks.push(CheckResult::fail(
                "branches",
                format!("cannot resolve {}", missing.join(", ")),
                "fetch the remote or fix the names under [tracking]",
            ));
        }
    }

    // 6. Cache directory
    let cache_root = config.cache_root();
    let check_file = cache_root.join(".doctor-write-check");
    let writable = std::fs::create_dir_all(&cache_root)
        .and_then(|()| std::fs::write(&check_file, b"ok"))
        .and_then(|()| std::fs::remove_file(&check_file));
    match writable {
        Ok(()) => {
            let shards = std::fs::read_dir(&cache_root)
                .map(|entries| entries.filter_map(|e| e.ok()).count())
                .unwrap_or(0);
            checks.push(CheckResult::pass(
                "cache_dir",
                format!("{} writable", cache_root.display()),
            ));
            checks.push(CheckResult::info(
                "cache_shards",
                format!("{shards} shard directories"),
            ));
        }
        Err(e) => checks.push(CheckResult::fail(
            "cache_dir",
            format!("{}: {e}", cache_root.display()),
            "set [cache] dir to a writable location",
        )),
    }

    // Output
    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("branchdrift v{version} environment check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

fn run_init() -> Result<()> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        miette::bail!("{CONFIG_FILE} already exists");
    }
    std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
    println!("Created {CONFIG_FILE} with default configuration");
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# branchdrift configuration

[repository]
# Working copy git runs in
# path = "."
# Resolve tracked branches as <remote>/<branch>
# use_remote_branches = true
# remote = "origin"
# Flags passed to every git diff
# diff_options = ["-M", "-C", "--ignore-space-at-eol"]

[tracking]
# Branch every tracked branch is compared against
base_branch = "main"
# Long-lived branches to track
branches = []
# Top-level directories measured separately
directories = []
# Appended as "<dir>/<suffix>" when measuring, e.g. "dev"
# path_suffix = ""

[cache]
# Relative paths resolve against repository.path
# dir = ".branchdrift/cache"

[history]
# sample_count = 30
# sample_interval_days = 3
# Seconds the timeline may take before it is reported unavailable
# aggregate_timeout_secs = 5
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };
    init_logging(cli.verbose, use_color);

    // init must work even when an existing config is invalid.
    if matches!(cli.command, Some(Command::Init)) {
        return run_init();
    }

    let config = load_config(&cli)?;
    tracing::debug!(
        repo = %config.repository.path.display(),
        cache = %config.cache_root().display(),
        format = %cli.format,
        "configuration loaded"
    );

    let runner: Arc<dyn CommandRunner> = Arc::new(GitCli::new(&config.repository.path));
    let tracker = Tracker::from_config(&config, runner);

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Matrix { base }) => {
            let spinner = spinner("Computing divergence matrix...")?;
            let matrix = tracker.matrix(base.as_deref()).inspect_err(|_e| {
                if let Some(pb) = &spinner {
                    pb.finish_with_message("Failed");
                }
            })?;
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&matrix).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", matrix.to_markdown()),
                OutputFormat::Text => print!("{matrix}"),
            }
        }
        Some(Command::Diff { pair }) => {
            let (base, compare) = pair.commits(&tracker)?;
            let sampling = pair.sampling(&config)?;
            let detail = tracker.detail(&base, &compare, &pair.dir, Some(sampling))?;
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&detail).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", detail.to_markdown()),
                OutputFormat::Text => print!("{detail}"),
            }
        }
        Some(Command::History { pair }) => {
            let (base, compare) = pair.commits(&tracker)?;
            let sampling = pair.sampling(&config)?;
            let points = tracker.history(&base, &compare, &pair.dir, Some(sampling))?;
            if cli.verbose {
                eprintln!("{} samples", points.len());
            }
            print_history(&points, cli.format)?;
        }
        Some(Command::Timeline { base }) => {
            let spinner = spinner("Sampling branch history...")?;
            let outcome = tracker.timeline(base.as_deref()).await.inspect_err(|_e| {
                if let Some(pb) = &spinner {
                    pb.finish_with_message("Failed");
                }
            })?;
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            print_timeline(&outcome, cli.format)?;
            if outcome.ready().is_none() {
                std::process::exit(1);
            }
        }
        Some(Command::Init) => run_init()?,
        Some(Command::Doctor) => {
            let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
            run_doctor(&config, &config_path, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "branchdrift", &mut std::io::stdout());
        }
    }

    Ok(())
}
