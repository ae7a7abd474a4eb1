use anyhow::{Context, Result};
use mdd_ingest::Settings;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mdd_ingest=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("loading configuration")?;

    // ─── 3) ingest once ──────────────────────────────────────────────
    let report = mdd_ingest::run(&settings)?;
    if report.invalid + report.failed > 0 {
        info!(
            invalid = report.invalid,
            failed = report.failed,
            "some rows were not ingested, see errors above"
        );
    }

    info!("all done");
    Ok(())
}
