//! riskos-export CLI - export Risk OS dashboards to PDF or Word

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::debug;
use tokio::sync::mpsc;
use url::Url;

use riskos_export::document::{ExportFormat, ReportMeta, ReportType};
use riskos_export::export::{ExportOutcome, ExportRequest, ReportPagesRequest, DEFAULT_PREVIEW_CONTAINER};
use riskos_export::session::{MemoryTokenStore, TokenStore};
use riskos_export::{Browser, EngineConfig, ExportConfig, Result, Viewport};

#[derive(Parser)]
#[command(name = "riskos-export")]
#[command(version)]
#[command(about = "Export Risk OS dashboards to paginated PDF or Word documents", long_about = None)]
struct Cli {
    /// Browser binary (autodetected when omitted)
    #[arg(long, value_name = "PATH", global = true)]
    chrome: Option<PathBuf>,

    /// Browser window size
    #[arg(long, value_name = "WxH", default_value = "1280x720", global = true)]
    window: Viewport,

    /// Navigation and protocol timeout
    #[arg(long, value_name = "MS", default_value_t = 30000, global = true)]
    timeout_ms: u64,

    /// JSON file overriding page, packing and capture settings
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a role dashboard with a cover page
    Dashboard {
        /// Dashboard URL
        #[arg(long)]
        url: Url,

        /// Report audience: cro, ciso or board
        #[arg(long)]
        report: ReportType,

        /// Organization name shown on the cover and in the filename
        #[arg(long)]
        org: String,

        /// Generation date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output format: pdf or docx
        #[arg(long, default_value = "pdf")]
        format: ExportFormat,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        out: PathBuf,

        /// Element holding the dashboard
        #[arg(long, default_value = "main")]
        root: String,

        /// Section container inside the root
        #[arg(long)]
        container: Option<String>,

        /// Session access token written to localStorage before export
        #[arg(long, requires = "refresh_token")]
        access_token: Option<String>,

        /// Session refresh token
        #[arg(long, requires = "access_token")]
        refresh_token: Option<String>,
    },

    /// Export a report preview, one page per child element
    Pages {
        /// Report preview URL
        #[arg(long)]
        url: Url,

        /// Output format: pdf or docx
        #[arg(long, default_value = "docx")]
        format: ExportFormat,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        out: PathBuf,

        /// Output filename
        #[arg(long)]
        filename: Option<String>,

        /// Container whose children are the pages
        #[arg(long, default_value = DEFAULT_PREVIEW_CONTAINER)]
        container: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(outcome) => println!("saved {}", outcome.path.display()),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<ExportOutcome> {
    let export_config = match &cli.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };
    let engine_config = EngineConfig {
        viewport: cli.window,
        timeout_ms: cli.timeout_ms,
        chrome_path: cli.chrome.clone(),
        ..EngineConfig::default()
    };

    let browser = Browser::new(Some(engine_config), export_config).await?;
    let result = export(&browser, cli.command).await;
    if let Err(e) = browser.close().await {
        debug!("browser did not shut down cleanly: {}", e);
    }
    result
}

async fn export(browser: &Browser, command: Commands) -> Result<ExportOutcome> {
    let page = browser.new_page().await?;
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{}", line);
        }
    });

    let outcome = match command {
        Commands::Dashboard {
            url,
            report,
            org,
            date,
            format,
            out,
            root,
            container,
            access_token,
            refresh_token,
        } => {
            page.goto(url.as_str()).await?;
            if let Some(access) = access_token {
                let mut store = MemoryTokenStore::new();
                store.set_tokens(access, refresh_token);
                page.seed_session(store).await?;
                // reload so the app starts with the seeded session
                page.goto(url.as_str()).await?;
            }

            let mut meta = ReportMeta::new(report, org);
            if let Some(date) = date {
                meta = meta.with_date(date);
            }
            let mut request = ExportRequest::new(meta, format, out).with_root(root);
            if let Some(container) = container {
                request = request.with_container(container);
            }
            page.export_dashboard(request, Some(tx)).await
        }
        Commands::Pages {
            url,
            format,
            out,
            filename,
            container,
        } => {
            page.goto(url.as_str()).await?;
            let mut request = ReportPagesRequest::new(format, out).with_container(container);
            if let Some(filename) = filename {
                request = request.with_filename(filename);
            }
            page.export_report_pages(request, Some(tx)).await
        }
    };

    // The sender is dropped with the exporter, which ends the printer
    let _ = printer.await;
    outcome
}
