use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use angie_console::data::duration::format_duration;
use angie_console::logging::init_logging;
use angie_console::{App, DataSource, FileSource, Latest, Namespace, Settings, StreamSource};

#[derive(Parser, Debug)]
#[command(name = "angie-console")]
#[command(about = "Live rates and history from an Angie/nginx status API document")]
struct Args {
    /// Path to a status document rewritten by an external fetcher
    #[arg(short, long, default_value = "status.json", conflicts_with_all = ["connect"])]
    file: PathBuf,

    /// Connect to a TCP endpoint streaming newline-delimited status documents (host:port)
    #[arg(short, long, conflicts_with_all = ["file"])]
    connect: Option<String>,

    /// Settings file (TOML, JSON or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Poll interval (e.g., "1s", "500ms"); overrides the settings file
    #[arg(short, long)]
    refresh: Option<String>,

    /// Compute one cycle, export the views to a JSON file and exit
    #[arg(short, long, conflicts_with_all = ["connect"])]
    export: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(refresh) = args.refresh {
        settings.refresh = refresh;
    }
    let refresh = settings
        .refresh_interval()
        .with_context(|| format!("invalid refresh interval {:?}", settings.refresh))?;

    // Handle export mode (non-interactive)
    if let Some(export_path) = args.export {
        return export_to_file(&args.file, &export_path, &settings);
    }

    // Build a tokio runtime for the poll loop and any TCP reader task
    let rt = tokio::runtime::Runtime::new()?;
    let (file, addr) = (args.file, args.connect);
    rt.block_on(async move {
        let source: Box<dyn DataSource> = match addr {
            Some(addr) => connect(&addr).await?,
            None => Box::new(FileSource::new(&file)),
        };
        run(source, &settings, refresh).await
    })
}

/// Open a TCP stream data source
async fn connect(addr: &str) -> Result<Box<dyn DataSource>> {
    use tokio::net::TcpStream;

    info!(addr, "connecting");
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    info!(addr, "connected");
    Ok(Box::new(StreamSource::spawn(stream, addr)))
}

/// Poll until Ctrl-C, printing a one-line summary per published cycle
async fn run(source: Box<dyn DataSource>, settings: &Settings, refresh: Duration) -> Result<()> {
    let mut app = App::new(source, settings);
    info!(
        source = %app.source_description(),
        refresh = %format_duration(refresh),
        "starting"
    );

    app.subscribe([], Box::new(|latest: &Latest| println!("{}", summarize(latest))));

    app.run_until(refresh, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    info!("shutting down");
    Ok(())
}

/// One line per cycle: family names with entity counts and flashing entities.
fn summarize(latest: &Latest) -> String {
    let parts: Vec<String> = latest
        .views()
        .iter()
        .map(|(path, view)| {
            let flashing = view.flashing().count();
            if flashing > 0 {
                format!("{}={} ({} changed)", path, view.len(), flashing)
            } else {
                format!("{}={}", path, view.len())
            }
        })
        .collect();
    format!("#{} {}", latest.cycle(), parts.join(" "))
}

/// Export the views computed from the current status file to a JSON file
fn export_to_file(status_path: &Path, export_path: &Path, settings: &Settings) -> Result<()> {
    use std::io::Write;

    let mut app = App::new(Box::new(FileSource::new(status_path)), settings);
    if !app.reload_data()? {
        let reason = app
            .load_error
            .clone()
            .unwrap_or_else(|| format!("no data in {}", status_path.display()));
        anyhow::bail!(reason);
    }

    let export = serde_json::json!({
        "source": status_path.display().to_string(),
        "available": {
            "first_level": app.registry().first_level(),
            "http": app.registry().third_level(Namespace::Http),
            "stream": app.registry().third_level(Namespace::Stream),
        },
        "views": app.latest().views(),
    });

    let json = serde_json::to_string_pretty(&export)?;
    let mut file = std::fs::File::create(export_path)?;
    file.write_all(json.as_bytes())?;

    println!("Exported to {}", export_path.display());
    Ok(())
}
