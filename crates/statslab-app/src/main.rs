// statslab entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr)
// 2. Load config
// 3. Build the FBref source
// 4. Wire Ctrl+C to build cancellation
// 5. Run the build pipeline and print the operator report

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info, warn};

use statslab_app::config;
use statslab_app::pipeline::{self, PipelineError, PipelineSettings};
use statslab_core::assemble::{BuildError, CancelToken};
use statslab_fbref::FbrefSource;

/// Exit status for a build stopped by Ctrl+C.
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("statslab starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {} leagues, {} seasons, {} data types, output {}",
        config.build.leagues.len(),
        config.build.seasons.len(),
        config.build.data_types.len(),
        config.output.catalog_path.display()
    );

    // 3. Build the source
    let source =
        FbrefSource::new(config.fbref_options()).context("failed to create FBref client")?;

    // 4. Ctrl+C cancels between tuples
    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling build");
            signal_cancel.cancel();
        }
    });

    // 5. Run the pipeline
    let request = config.build_request();
    let settings = PipelineSettings {
        request: &request,
        assembler: config.assembler_options(),
        catalog_path: &config.output.catalog_path,
        merge_existing: config.output.merge_existing,
        replace_on_total_failure: config.output.replace_on_total_failure,
    };

    match pipeline::run_build(source, settings, &cancel).await {
        Ok(report) => {
            print!("{}", pipeline::render_report(&report));
            info!("statslab finished");
            Ok(ExitCode::SUCCESS)
        }
        Err(PipelineError::Build(BuildError::Cancelled { completed, total })) => {
            eprintln!(
                "Build cancelled after {completed} of {total} tuples; the previous catalog was left unchanged."
            );
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(PipelineError::NothingFetched { path, outcome }) => {
            eprint!("{}", pipeline::render_failures(&outcome));
            error!(
                "Every tuple failed; {} was left unchanged (set output.replace_on_total_failure to overwrite it)",
                path.display()
            );
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("Build failed: {}", e);
            Err(e).context("catalog build failed")
        }
    }
}

/// Initialize tracing to stderr so stdout carries only the report.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("statslab=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
