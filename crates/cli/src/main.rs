//! `sitevisit` -- submit a field technician's site-visit report.
//!
//! Reads a visit manifest, validates and normalizes it against the
//! catalog, drives the three-phase submission protocol, and downloads
//! the generated PDF and Excel documents.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                           |
//! |------------------------|----------|-----------------------------------|
//! | `SERVER_BASE_URL`      | no       | `http://127.0.0.1:5002`           |
//! | `UPLOAD_BASE_URL`      | no       | `https://api.cloudinary.com/v1_1` |
//! | `POLL_INTERVAL_SECS`   | no       | `3`                               |
//! | `POLL_TIMEOUT_SECS`    | no       | `300`                             |
//! | `UPLOAD_MAX_ATTEMPTS`  | no       | `3`                               |

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitevisit_cli::config::ClientConfig;
use sitevisit_cli::{download, manifest};
use sitevisit_client::api::ReportApi;
use sitevisit_client::controller::SubmissionController;
use sitevisit_client::events::TracingNotifier;
use sitevisit_core::catalog::Catalog;
use sitevisit_core::normalize::NormalizeBounds;
use sitevisit_core::report::ReportItem;

#[derive(Parser, Debug)]
#[command(name = "sitevisit")]
struct Args {
    /// Path to the visit manifest JSON
    manifest: PathBuf,

    /// Path to the catalog JSON (asset -> system -> description)
    #[arg(long)]
    catalog: PathBuf,

    /// Directory the generated documents are written to
    #[arg(long, default_value = "reports")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitevisit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = ClientConfig::from_env();

    let catalog_raw = std::fs::read_to_string(&args.catalog)
        .with_context(|| format!("Reading catalog {}", args.catalog.display()))?;
    let catalog = Catalog::from_json_str(&catalog_raw)?;

    let base_dir = args
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let visit = manifest::load_manifest(&args.manifest)?;

    let api = ReportApi::new(config.server_base_url.clone())
        .with_upload_base_url(config.upload_base_url.clone());
    let mut controller = SubmissionController::with_configs(
        api,
        Box::new(TracingNotifier),
        config.retry.clone(),
        config.poll.clone(),
    );

    for (name, value) in visit.visit_info {
        controller.set_field(name, value);
    }
    if controller.field("visit_date").is_none() {
        controller.set_field("visit_date", chrono::Utc::now().format("%Y-%m-%d").to_string());
    }
    controller.set_signatures(manifest::resolve_signatures(&visit.signatures, &base_dir)?);

    let bounds = NormalizeBounds::default();
    for entry in visit.items {
        let draft = entry.into_draft(&base_dir)?;
        let item = ReportItem::from_draft(draft, &catalog, &bounds)?;
        controller.add_item(item);
    }

    tracing::info!(
        server = %config.server_base_url,
        items = controller.store().len(),
        photos = controller.store().total_photo_count(),
        "Pending report assembled",
    );

    // Ctrl-C cancels the status poll; requests already in flight run
    // to completion.
    let cancel = CancellationToken::new();
    let poll_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            poll_cancel.cancel();
        }
    });

    let links = controller.submit(&cancel).await?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Creating {}", args.output_dir.display()))?;
    let client = reqwest::Client::new();
    let pdf = download::download_to(&client, &links.pdf_url, &args.output_dir).await?;
    let excel = download::download_to(&client, &links.excel_url, &args.output_dir).await?;

    tracing::info!(pdf = %pdf.display(), excel = %excel.display(), "Report documents downloaded");
    Ok(())
}
