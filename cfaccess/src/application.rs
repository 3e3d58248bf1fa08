use std::{io::IsTerminal as _, process::exit, sync::Arc};

use anyhow::{Context, Result};
use cfaccess_api::{cloudflare, AccessApi};
use cfaccess_core::model::OwnerId;
use clap::ColorChoice;
use tracing::info;

use crate::{
    extract::Extractor,
    logging,
    options::Options,
    reconcile::{Reconciler, TracingRecorder},
    zones::resolve_zones,
};

/// Create the single-threaded tokio runtime used by the CLI.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("initializing tokio runtime")
}

/// Handle a Result, printing the error and exiting with code 1 on failure.
pub fn handle_result(r: Result<()>) {
    match r {
        Ok(()) => {}
        Err(e) => {
            eprintln!("cfaccess error: {:?}", e);
            exit(1);
        }
    }
}

pub fn set_up_logging(options: &Options) -> Result<()> {
    let color = match options.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stderr().is_terminal(),
    };
    logging::set_up(logging::Options {
        verbose: options.verbose,
        color,
        format: options.log_format,
    })
}

/// Connect to the remote service, resolve the configured zones and set up a
/// [`Reconciler`] that logs its events.
pub async fn reconciler(options: &Options) -> Result<Reconciler> {
    let token = options
        .api_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .context("an API token is required; pass --api-token or set CF_API_TOKEN")?;
    let owner = OwnerId::from_cluster_name(options.cluster_name.as_deref().unwrap_or_default())?;

    let client = cloudflare::Client::new(token.to_string()).with_base_url(&options.api_url);
    let api: Arc<dyn AccessApi> = Arc::new(client);
    let zones = resolve_zones(&*api, &options.zone_names)
        .await
        .context("resolving zones")?;

    info!(
        owner = %owner,
        zones = ?zones.iter().map(|z| z.name.as_str()).collect::<Vec<_>>(),
        "managing access applications"
    );
    let extractor = Extractor::new(&options.annotation_prefix, owner, zones);
    Ok(Reconciler::new(api, Arc::new(TracingRecorder), extractor))
}
