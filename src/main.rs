//! edu_crm server
//!
//! Opens the collection store and serves the REST API.
//!
//! Usage:
//!   cargo run --bin load_data    # reset collections to the sample data
//!   cargo run --bin edu_crm      # start the server (0.0.0.0:11111)
//!   cargo run --bin crm-cli -- contacts list

use tokio::net::TcpListener;
use tracing::{debug, info};

use edu_crm::config::CrmConfig;
use edu_crm::crm::{Crm, COLLECTIONS};
use edu_crm::logging::init_logging;
use edu_crm::rest::create_router;
use edu_crm::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = CrmConfig::from_env()?;
    let _log_guard = init_logging(&config);

    let storage = Storage::open_or_memory(&config.data_dir);
    for key in COLLECTIONS {
        storage.subscribe(key, move |value| {
            let records = value.as_array().map_or(1, Vec::len);
            debug!(collection = key, records, "collection changed");
        });
    }
    let crm = Crm::new(storage, config.seed_fixtures);

    let app = create_router(crm.clone(), config.report_dir.clone());
    let listener = TcpListener::bind(config.rest_addr).await?;
    info!(
        addr = %config.rest_addr,
        data_dir = %config.data_dir.display(),
        durable = crm.storage().is_durable(),
        "edu_crm REST API listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    crm.storage().flush()?;
    info!("shut down");
    Ok(())
}
