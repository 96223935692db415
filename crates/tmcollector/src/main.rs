use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tmcollector_core::config::{ScrapingConfig, load_config};
use tmcollector_core::confluence::ConfluenceClient;
use tmcollector_core::emit::{EmitAction, EmitReport};
use tmcollector_core::pipeline::{collect_labeled_pages, emit_collection, exit_code};
use tmcollector_core::publish::{GitPublisher, PublishReport, PublishStatus, Publisher};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "tmcollector",
    version,
    about = "Collect threat-modeling activities from labeled Confluence pages into per-application YAML"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", default_value = "collector.toml")]
    config: PathBuf,
    #[arg(long, global = true, value_name = "DIR", default_value = "out")]
    output: PathBuf,
    #[arg(short, long, global = true, help = "Log every page and file")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: PathBuf,
    output: PathBuf,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            output: cli.output.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Scrape labeled pages and write per-application YAML files")]
    Collect(CollectArgs),
    #[command(about = "Publish an existing output directory to the target git repository")]
    Publish,
    #[command(name = "check-config", about = "Validate the configuration file and print it")]
    CheckConfig,
}

#[derive(Debug, Args)]
struct CollectArgs {
    #[arg(long, help = "Push the written files to GIT_REPO_URL after collection")]
    publish: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Collect(args)) => run_collect(&runtime, args),
        Some(Commands::Publish) => {
            run_publish(&runtime)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::CheckConfig) => {
            run_check_config(&runtime)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,tmcollector=debug,tmcollector_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_collect(runtime: &RuntimeOptions, args: CollectArgs) -> Result<ExitCode> {
    let config = load_runtime_config(runtime)?;
    let mut client = ConfluenceClient::from_env()?;

    let run = collect_labeled_pages(&mut client, &config)?;
    println!("collect");
    println!("search_label: {}", config.search_label);
    println!("pages_found: {}", run.pages_found);
    println!("collected: {}", run.collection.threat_modelings.len());
    println!("errors: {}", run.collection.errors.len());
    for error in &run.collection.errors {
        println!("  * {error}");
    }
    println!("request_count: {}", run.request_count);

    let report = emit_collection(&runtime.output, &run.collection, &config)?;
    print_emit_report(&runtime.output, &report);
    if run.pages_found == 0 {
        println!(
            "warning: no pages carry label `{}`; nothing was written",
            config.search_label
        );
    }

    if args.publish {
        let publisher = GitPublisher::from_env()?;
        let published = publisher.publish(&runtime.output)?;
        print_publish_report(&published);
    }

    Ok(ExitCode::from(exit_code(&run.collection)))
}

fn run_publish(runtime: &RuntimeOptions) -> Result<()> {
    if !runtime.output.is_dir() {
        bail!(
            "output directory {} does not exist; run `tmcollector collect` first",
            normalize_path(&runtime.output)
        );
    }
    dotenvy::dotenv().ok();
    let publisher = GitPublisher::from_env()?;
    let published = publisher.publish(&runtime.output)?;
    print_publish_report(&published);
    Ok(())
}

fn run_check_config(runtime: &RuntimeOptions) -> Result<()> {
    let config = load_runtime_config(runtime)?;
    println!("config: {}", normalize_path(&runtime.config));
    println!("search_label: {}", config.search_label);
    println!("activity_name: {}", config.activity_name);
    println!("output_subfolder: {}", config.output_subfolder);
    println!("page_limit: {}", config.page_limit);
    println!("header: {}", config.header_line());
    println!("space_mapping.count: {}", config.space_mapping.len());
    for (space, subject) in &config.space_mapping {
        println!("space_mapping.{space}: {subject}");
    }
    Ok(())
}

fn load_runtime_config(runtime: &RuntimeOptions) -> Result<ScrapingConfig> {
    dotenvy::dotenv().ok();
    let config = load_config(&runtime.config)?;
    debug!(
        path = %normalize_path(&runtime.config),
        spaces = config.space_mapping.len(),
        "configuration loaded"
    );
    Ok(config)
}

fn print_emit_report(output: &Path, report: &EmitReport) {
    println!("output: {}", normalize_path(output));
    for file in &report.files {
        println!(
            "file.{}: {} ({} component(s), sha256 {})",
            file.action.as_str(),
            normalize_path(&file.path),
            file.components,
            &file.content_hash[..12.min(file.content_hash.len())]
        );
    }
    println!("files_written: {}", report.written());
    println!("files_created: {}", report.count(EmitAction::Created));
    println!("files_updated: {}", report.count(EmitAction::Updated));
    println!("files_unchanged: {}", report.count(EmitAction::Unchanged));
}

fn print_publish_report(report: &PublishReport) {
    println!(
        "publish: {}",
        match report.status {
            PublishStatus::Pushed => "pushed",
            PublishStatus::NoChanges => "no changes",
        }
    );
    println!("publish.copied_files: {}", report.copied_files);
    println!("publish.checkout: {}", normalize_path(&report.checkout_dir));
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
