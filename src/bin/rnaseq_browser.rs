use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use rnaseq_browser::app::{App, Preview};
use rnaseq_browser::config::BrowserConfig;
use rnaseq_browser::domain::Subfolder;
use rnaseq_browser::error::BrowserError;
use rnaseq_browser::output::JsonOutput;
use rnaseq_browser::render::{HtmlTable, TableView, TextGrid};
use rnaseq_browser::s3::S3Client;

#[derive(Parser)]
#[command(name = "rnaseq-browser")]
#[command(about = "Browse RNA-Seq pipeline outputs in S3")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List projects under the base prefix")]
    Projects,
    #[command(about = "List objects for one project subfolder")]
    List(ListArgs),
    #[command(about = "Aggregate per-sample completeness for one project")]
    Samples(SamplesArgs),
    #[command(about = "Extract a FastQC zip archive into the web root")]
    Extract(KeyArgs),
    #[command(about = "Preview an object; HTML reports are rewritten and served from the web root")]
    Preview(KeyArgs),
    #[command(about = "Generate a presigned URL for one object")]
    Sign(SignArgs),
    #[command(about = "Download one object into the flat downloads directory")]
    Download(KeyArgs),
    #[command(about = "Poll one project subfolder and report catalog changes")]
    Watch(WatchArgs),
}

#[derive(Args)]
struct ListArgs {
    project: String,

    #[arg(long, value_enum, default_value = "root")]
    subfolder: Subfolder,

    #[arg(long, value_enum, default_value = "json")]
    render: RenderMode,
}

#[derive(Args)]
struct SamplesArgs {
    project: String,

    #[arg(long, value_enum, default_value = "json")]
    render: RenderMode,
}

#[derive(Args)]
struct KeyArgs {
    key: String,
}

#[derive(Args)]
struct SignArgs {
    key: String,

    #[arg(long)]
    ttl_secs: Option<u64>,
}

#[derive(Args)]
struct WatchArgs {
    project: String,

    #[arg(long, value_enum, default_value = "root")]
    subfolder: Subfolder,

    #[arg(long, default_value_t = 30)]
    interval_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum RenderMode {
    #[default]
    Json,
    Html,
    Grid,
}

impl RenderMode {
    fn view(self) -> Option<Box<dyn TableView>> {
        match self {
            RenderMode::Json => None,
            RenderMode::Html => Some(Box::new(HtmlTable)),
            RenderMode::Grid => Some(Box::new(TextGrid)),
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<BrowserError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BrowserError) -> u8 {
    match error {
        BrowserError::Store { .. } => 3,
        BrowserError::ArchiveTooLarge { .. }
        | BrowserError::ReportNotFound { .. }
        | BrowserError::MalformedArchive { .. }
        | BrowserError::InvalidConfig(_)
        | BrowserError::InvalidSubfolder(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = BrowserConfig::from_env()?;
    if let Commands::Sign(args) = &cli.command {
        if let Some(ttl_secs) = args.ttl_secs {
            config.presign_ttl = Duration::from_secs(ttl_secs);
        }
    }

    let client = S3Client::new(&config.region)?;
    let mut app = App::new(client, config);

    match cli.command {
        Commands::Projects => {
            let projects = app.refresh_projects()?;
            JsonOutput::print_projects(&projects).into_diagnostic()?;
        }
        Commands::List(args) => {
            let catalog = app.list_objects(&args.project, args.subfolder)?;
            match args.render.view() {
                Some(view) => println!("{}", view.render_objects(catalog.records())),
                None => JsonOutput::print_catalog(&catalog).into_diagnostic()?,
            }
        }
        Commands::Samples(args) => {
            let catalog = app.list_objects(&args.project, Subfolder::SalmonQuant)?;
            let samples = app.aggregate_samples(&catalog);
            match args.render.view() {
                Some(view) => println!("{}", view.render_samples(&samples)),
                None => JsonOutput::print_samples(&samples).into_diagnostic()?,
            }
        }
        Commands::Extract(args) => {
            app.store().ensure_layout()?;
            let result = app.extract_report(&args.key)?;
            JsonOutput::print_extraction(&result).into_diagnostic()?;
        }
        Commands::Preview(args) => {
            app.store().ensure_layout()?;
            match app.preview(&args.key)? {
                Preview::Html { url, path } => {
                    tracing::info!(%path, "preview written");
                    println!("{url}");
                }
                Preview::Text(text) => println!("{text}"),
            }
        }
        Commands::Sign(args) => {
            let url = app.sign(&args.key)?;
            println!("{url}");
        }
        Commands::Download(args) => {
            app.store().ensure_layout()?;
            let path = app.download(&args.key)?;
            println!("{path}");
        }
        Commands::Watch(args) => {
            watch(&mut app, args);
        }
    }

    Ok(())
}

fn watch(app: &mut App<S3Client>, args: WatchArgs) -> ! {
    let coordinator = app.coordinator_mut();
    coordinator.select_project(&args.project);
    coordinator.set_subfolder(args.subfolder);
    coordinator.enable_polling(Duration::from_secs(args.interval_secs));

    let mut last_status = String::new();
    loop {
        let coordinator = app.coordinator_mut();
        coordinator.maybe_poll(Instant::now());
        coordinator.pump();
        if coordinator.status() != last_status {
            last_status = coordinator.status().to_string();
            let objects = coordinator.catalog().len();
            let samples = coordinator.samples().len();
            println!("{last_status} ({objects} objects, {samples} samples)");
        }
        thread::sleep(Duration::from_millis(200));
    }
}
