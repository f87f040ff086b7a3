// ABOUTME: Main entry point for the mdslides program.
// ABOUTME: Provides the build and serve commands on top of the library.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use mdslides::config::{find_config_file, find_input_path, ASSETS_DIR_ENV, DEFAULT_OUTPUT_DIR};
use mdslides::watch::DEFAULT_DEV_ADDRESS;
use mdslides::{build_site, serve, ServeConfig, SiteConfig};

#[derive(Parser)]
#[command(author, version, about = "Build reveal.js slideshows from Markdown files", long_about = None)]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the slideshows and the index into a directory
    Build(BuildArgs),

    /// Build into a temporary directory, serve it and rebuild on changes
    Serve(ServeArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Markdown file or directory [default: slides/, then docs/]
    path: Option<PathBuf>,

    /// Config file [default: mdslides.yml if it exists]
    #[arg(short = 'f', long)]
    config_file: Option<PathBuf>,

    /// Directory with the bundled reveal.js and highlight.js assets
    #[arg(long, env = ASSETS_DIR_ENV)]
    assets_dir: Option<PathBuf>,

    /// Fail on broken links and on nav entries without a slideshow
    #[arg(short, long)]
    strict: bool,
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output directory, deleted and recreated on every build
    #[arg(short = 'd', long, default_value = DEFAULT_OUTPUT_DIR)]
    site_dir: PathBuf,
}

#[derive(Args)]
struct ServeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// IP address and port to serve on
    #[arg(short = 'a', long, default_value = DEFAULT_DEV_ADDRESS)]
    dev_addr: String,

    /// Do not rebuild when themes, favicons or templates from the config file change
    #[arg(long)]
    no_watch_config_assets: bool,

    /// Open the slides in the default browser after the first build
    #[arg(short = 'o', long)]
    open: bool,
}

impl InputArgs {
    fn site_config(&self, output_path: PathBuf) -> anyhow::Result<SiteConfig> {
        let input_path = find_input_path(self.path.as_deref())?;
        let mut site = SiteConfig::new(input_path, output_path);
        site.config_path = find_config_file(self.config_file.as_deref());
        site.strict = self.strict;
        if let Some(assets_dir) = &self.assets_dir {
            site.assets_dir = assets_dir.clone();
        }
        Ok(site)
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let result = match &cli.command {
        Some(Commands::Build(args)) => run_build(args),
        Some(Commands::Serve(args)) => run_serve(args),
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_build(args: &BuildArgs) -> anyhow::Result<()> {
    let site = args.input.site_config(args.site_dir.clone())?;
    let report = build_site(&site)
        .with_context(|| format!("Failed to build {:?}", site.input_path))?;

    println!(
        "Built {} slideshows in {:?}",
        report.pages.len(),
        site.output_path
    );
    if !report.broken_links.is_empty() {
        let count: usize = report.broken_links.values().map(Vec::len).sum();
        println!("{} broken links, run with --strict to fail the build", count);
    }
    Ok(())
}

fn run_serve(args: &ServeArgs) -> anyhow::Result<()> {
    let output = tempfile::Builder::new()
        .prefix("mdslides-")
        .tempdir()
        .context("Failed to create a temporary output directory")?;

    let site = args.input.site_config(output.path().to_path_buf())?;
    let mut config = ServeConfig::new(site);
    config.address = args.dev_addr.clone();
    config.watch_config_assets = !args.no_watch_config_assets;
    config.open_browser = args.open;

    serve(config)?;

    let output_path = output.path().to_path_buf();
    output
        .close()
        .with_context(|| format!("Failed to remove {:?}", output_path))?;
    info!("Removed {:?}", output_path);
    Ok(())
}
