use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rg_replace::config::{self, Config};
use rg_replace::replace::{plan_replacements, FileCheckpoints, Substitution};
use rg_replace::{
    logging, FileStatus, ReplaceRequest, SearchOptions, SearchReplace, SearchResponse,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Environment variable naming the search root.
const ROOT_ENV: &str = "RG_REPLACE_ROOT";

#[derive(Parser)]
#[command(name = "rg-replace")]
#[command(about = "Search with ripgrep and replace matches byte-accurately", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory searches and replacements are confined to
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (defaults to $RG_REPLACE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the root and print matches as JSON
    Search {
        query: String,

        /// Folder to search in, relative to the root
        #[arg(short, long, default_value = "")]
        path: String,

        /// Match case exactly
        #[arg(short = 's', long)]
        case_sensitive: bool,

        /// Only match whole words
        #[arg(short, long)]
        whole_word: bool,

        /// Treat the query as a regular expression
        #[arg(short, long)]
        regex: bool,

        /// Only search files matching this glob
        #[arg(short = 'g', long = "include", value_name = "GLOB")]
        include: Vec<String>,

        /// Skip files matching this glob
        #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
        exclude: Vec<String>,

        /// Maximum matching lines per file
        #[arg(short, long)]
        max_count: Option<i64>,
    },

    /// Apply replacements from a JSON match list
    Replace {
        /// JSON input ({"matches": [...]}); `-` or omitted reads stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Folder the match paths are relative to
        #[arg(short, long)]
        path: Option<String>,

        /// Replacement for every match that has none
        #[arg(long, value_name = "TEXT")]
        with: Option<String>,

        /// Apply PATTERN to each matched text and substitute TEXT ($1, ${name} expand)
        #[arg(long, value_name = "PATTERN", requires = "with")]
        regex: Option<String>,

        /// Match PATTERN case-insensitively
        #[arg(long, requires = "regex")]
        ignore_case: bool,

        /// Do not take checkpoints before writing
        #[arg(long)]
        no_checkpoint: bool,

        /// Show what would change without writing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Restore a file from its checkpoint
    Restore {
        /// File to restore, relative to the root
        file: PathBuf,
    },

    /// List checkpoint files under the root
    Checkpoints,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = config::load(cli.config.as_deref())?;
    let root = resolve_root(cli.root, &config);

    match cli.command {
        Commands::Search {
            query,
            path,
            case_sensitive,
            whole_word,
            regex,
            include,
            exclude,
            max_count,
        } => {
            let options = SearchOptions {
                query,
                path,
                case_sensitive,
                whole_word,
                include,
                exclude,
                use_regex: regex,
                max_count: max_count.unwrap_or(config.search.max_count),
            };
            cmd_search(&config, root.as_deref(), &options).await
        }

        Commands::Replace {
            input,
            path,
            with,
            regex,
            ignore_case,
            no_checkpoint,
            dry_run,
            diff,
        } => {
            let fill = match (with, regex) {
                (Some(text), Some(pattern)) => Some(Fill::Pattern(
                    Substitution::new(&pattern, text, !ignore_case)
                        .with_context(|| format!("Invalid --regex pattern: {pattern}"))?,
                )),
                (Some(text), None) => Some(Fill::Text(text)),
                (None, _) => None,
            };
            cmd_replace(
                &config,
                root.as_deref(),
                input,
                path,
                fill,
                no_checkpoint,
                dry_run,
                diff,
            )
            .await
        }

        Commands::Restore { file } => cmd_restore(&config, root.as_deref(), &file),

        Commands::Checkpoints => cmd_checkpoints(&config, root.as_deref()),
    }
}

/// Root from `--root`, then `$RG_REPLACE_ROOT`; `None` leaves it to the config
/// or the current directory.
fn resolve_root(cli_root: Option<PathBuf>, config: &Config) -> Option<PathBuf> {
    if cli_root.is_some() {
        return cli_root;
    }

    if let Ok(env_path) = env::var(ROOT_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Some(path);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: {} is set but path doesn't exist: {}",
                ROOT_ENV, env_path
            )
            .yellow()
        );
    }

    config.root.as_ref().map(|root| rg_replace::safety::expand_home(root))
}

fn open_service(config: &Config, root: Option<&Path>) -> Result<SearchReplace> {
    SearchReplace::from_config(config, root).context("Failed to open search root")
}

async fn cmd_search(config: &Config, root: Option<&Path>, options: &SearchOptions) -> Result<()> {
    let service = open_service(config, root)?;
    let response = service.search(options).await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if let SearchResponse::Failure(failure) = &response {
        eprintln!("{} {}", "✗".red(), failure.message.trim_end());
        std::process::exit(1);
    }

    Ok(())
}

/// How matches without a replacement get one.
enum Fill {
    Text(String),
    Pattern(Substitution),
}

#[allow(clippy::too_many_arguments)]
async fn cmd_replace(
    config: &Config,
    root: Option<&Path>,
    input: Option<PathBuf>,
    path: Option<String>,
    fill: Option<Fill>,
    no_checkpoint: bool,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let mut service = open_service(config, root)?;
    if no_checkpoint {
        service = service.with_checkpoints(None);
    }

    let mut request = read_request(input.as_deref())?;
    if let Some(path) = path {
        request.path = path;
    }
    match fill {
        Some(Fill::Text(text)) => {
            for m in request.matches.iter_mut().flat_map(|f| f.matches.iter_mut()) {
                if m.replacement.is_none() {
                    m.replacement = Some(text.clone());
                }
            }
        }
        Some(Fill::Pattern(substitution)) => {
            substitution.fill(&mut request.matches);
        }
        None => {}
    }

    println!("Root: {}", service.root().display());
    println!();

    if dry_run || show_diff {
        if dry_run {
            println!("{}", "  [DRY RUN - showing what would be replaced]".cyan());
        }
        let plans = plan_replacements(&request.matches, &request.path, service.guard());
        let mut plan_failed = 0;
        for (file, plan) in &plans {
            match plan {
                Ok(plan) if plan.after.replacements > 0 => {
                    if dry_run {
                        println!(
                            "{} {}: Would replace {} match(es) on {} line(s)",
                            "✓".green(),
                            file,
                            plan.after.replacements,
                            plan.after.lines_changed
                        );
                    }
                    if show_diff {
                        display_diff(
                            &plan.file,
                            &String::from_utf8_lossy(&plan.before),
                            &String::from_utf8_lossy(&plan.after.content),
                        );
                    }
                }
                Ok(_) => {
                    if dry_run {
                        println!("{} {}: Nothing to replace", "⊙".yellow(), file);
                    }
                }
                Err(e) => {
                    eprintln!("{} {}: Error - {}", "✗".red(), file, e);
                    plan_failed += 1;
                }
            }
        }
        if dry_run {
            if plan_failed > 0 {
                std::process::exit(1);
            }
            return Ok(());
        }
        println!();
    }

    let report = service.replace(request).await?;

    let mut total_replaced = 0;
    let mut total_unchanged = 0;
    let mut total_failed = 0;

    for file in &report.files {
        match &file.status {
            FileStatus::Replaced {
                lines_changed,
                replacements,
            } => {
                println!(
                    "{} {}: Replaced {} match(es) on {} line(s)",
                    "✓".green(),
                    file.path,
                    replacements,
                    lines_changed
                );
                total_replaced += 1;
            }
            FileStatus::Unchanged => {
                println!("{} {}: Nothing to replace", "⊙".yellow(), file.path);
                total_unchanged += 1;
            }
            FileStatus::Failed { message } => {
                eprintln!("{} {}: Error - {}", "✗".red(), file.path, message);
                total_failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} replaced", format!("{}", total_replaced).green());
    println!("  {} unchanged", format!("{}", total_unchanged).yellow());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn read_request(input: Option<&Path>) -> Result<ReplaceRequest> {
    let raw = match input {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    if raw.trim().is_empty() {
        bail!("No replace input given");
    }
    serde_json::from_str(&raw).context("Replace input must be {\"matches\": [...]} JSON")
}

fn checkpoint_store(config: &Config) -> FileCheckpoints {
    FileCheckpoints::new(config.replace.checkpoint_dir.clone())
}

fn cmd_restore(config: &Config, root: Option<&Path>, file: &Path) -> Result<()> {
    let service = open_service(config, root)?;
    let target = service
        .guard()
        .validate_path(file)
        .with_context(|| format!("Cannot restore {}", file.display()))?;

    checkpoint_store(config).restore_checkpoint(&target)?;
    println!("{} Restored {}", "✓".green(), target.display());
    Ok(())
}

fn cmd_checkpoints(config: &Config, root: Option<&Path>) -> Result<()> {
    let service = open_service(config, root)?;
    let store = checkpoint_store(config);
    let found = store.list_checkpoints(service.root());

    if found.is_empty() {
        println!("{}", "No checkpoints found".yellow());
        return Ok(());
    }

    println!("{}", "Checkpoints:".bold());
    for checkpoint in &found {
        let shown = checkpoint.strip_prefix(service.root()).unwrap_or(checkpoint);
        match store.original_path(checkpoint) {
            Some(original) => {
                let original = original.strip_prefix(service.root()).unwrap_or(&original);
                println!(
                    "  {} {}",
                    shown.display(),
                    format!("({})", original.display()).dimmed()
                );
            }
            None => println!("  {}", shown.display()),
        }
    }
    println!();
    println!("  {} checkpoint(s)", found.len());

    Ok(())
}

fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (replaced)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    let mut unified = diff.unified_diff();
    unified.context_radius(3);

    for hunk in unified.iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{}", change).red(),
                ChangeTag::Insert => format!("+{}", change).green(),
                ChangeTag::Equal => format!(" {}", change).normal(),
            };
            print!("{}", line);
            if change.missing_newline() {
                println!("\n\\ No newline at end of file");
            }
        }
    }
}
