use anyhow::Context as _;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use catalog_sync::cli::args::{CacheArgs, Cli, Commands, ImageArgs, QueueArgs};
use catalog_sync::cli::commands::{self, Context};
use catalog_sync::config::ColorSetting;
use catalog_sync::error::CatalogError;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        let code = e
            .downcast_ref::<CatalogError>()
            .map_or(1, CatalogError::exit_code);
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = cli.command {
        print!("{}", commands::completions(shell));
        return Ok(());
    }

    let connectivity = cli.connectivity_override();
    let ctx = Context::load(cli.home, cli.output, connectivity)
        .context("failed to load configuration")?;

    match ctx.config.general.color {
        ColorSetting::Always => colored::control::set_override(true),
        ColorSetting::Never => colored::control::set_override(false),
        ColorSetting::Auto => {}
    }

    tracing::debug!(root = %ctx.paths.root.display(), format = ?ctx.format, "context loaded");

    let output = match cli.command {
        Commands::Create(args) => commands::create(&ctx, &args)?,
        Commands::Update(args) => commands::update(&ctx, &args)?,
        Commands::Delete { kind, id } => commands::delete(&ctx, kind, &id)?,
        Commands::List { kind, refresh } => commands::list(&ctx, kind, refresh)?,
        Commands::Show { kind, id, refresh } => commands::show(&ctx, kind, &id, refresh)?,
        Commands::Queue(QueueArgs { command }) => commands::queue(&ctx, command)?,
        Commands::Cache(CacheArgs { command }) => commands::cache(&ctx, command)?,
        Commands::Image(ImageArgs { command }) => commands::image(&ctx, command)?,
        Commands::Completions { .. } => String::new(),
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
