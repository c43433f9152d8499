//! Reset the collection store to the bundled sample data.
//!
//! Overwrites contacts, subscriptions, products, purchases, campaigns and
//! settings in the configured data directory.
//! Run: cargo run --bin load_data [-- --clear]

use clap::Parser;
use tracing::info;

use edu_crm::config::CrmConfig;
use edu_crm::crm::Crm;
use edu_crm::logging::init_logging;
use edu_crm::storage::Storage;

#[derive(Parser)]
#[command(name = "load_data", about = "Reset edu_crm collections to the sample data")]
struct Args {
    /// Data directory; defaults to CRM_DATA_DIR.
    #[arg(short, long)]
    data_dir: Option<std::path::PathBuf>,

    /// Remove every collection instead of loading the fixtures.
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let mut config = CrmConfig::from_env()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    let _log_guard = init_logging(&config);

    // Needs a durable store; no memory fallback here.
    let storage = Storage::open(&config.data_dir)?;
    let crm = Crm::new(storage, false);

    if args.clear {
        let removed = crm.clear()?;
        info!(removed, "collections cleared");
        return Ok(());
    }

    crm.reset_to_fixtures()?;
    let dashboard = crm.dashboard()?;
    info!(
        data_dir = %config.data_dir.display(),
        contacts = dashboard.total_contacts,
        active_subscriptions = dashboard.active_subscriptions,
        open_rate = dashboard.email_open_rate,
        "sample data loaded"
    );
    Ok(())
}
