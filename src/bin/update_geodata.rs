use std::{error::Error, path::Path, process};

use clap::Parser;
use glad::{
    api::open_data_portal::OpenDataPortal,
    config::Settings,
    db::{geodata_archive::GeodataArchive, reference_table::get_records},
};
use jiff::Zoned;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Reload the datasets even if they were updated recently
    #[arg(long)]
    force: bool,

    /// Only update the dataset loaded into this table
    #[arg(long)]
    dataset: Option<String>,
}

/// Run this job every day.  Refresh all the active datasets of the
/// reference table that are due for an update.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let settings = match Settings::load(Path::new(format!(".env/{}.env", args.env).as_str())) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let archive = GeodataArchive::new(settings.download_folder.clone(), &settings.duckdb_path);
    let conn = match archive.open() {
        Ok(conn) => conn,
        Err(e) => {
            error!("Failed to connect to {}: {}", archive.duckdb_path, e);
            process::exit(1);
        }
    };

    let client = settings.http_client()?;
    let portal = OpenDataPortal::new(&settings.portal_url, client.clone());
    let links = portal.download_links()?;
    info!("found {} download links", links.len());

    let now = Zoned::now().datetime();
    for record in get_records(&conn)? {
        if !record.is_eligible(now, args.force, args.dataset.as_deref()) {
            continue;
        }
        match archive.update_dataset(&conn, &client, &links, &record, now) {
            Ok(n) => info!("loaded {} rows into {}", n, record.internal_name),
            Err(e) => {
                error!("Failed to update {}: {}", record.internal_name, e);
                return Err(e);
            }
        }
    }

    info!("done");
    Ok(())
}
