use std::{error::Error, path::Path};

use clap::{Parser, Subcommand};
use glad::{
    config::Settings,
    db::{
        geodata_archive::GeodataArchive,
        reference_table::{
            add_record, create_table, get_records, set_active, DataFormat, MetadataRecord,
        },
    },
};
use log::info;
use tabled::{builder::Builder, settings::Style};

#[derive(Parser, Debug)]
#[command(version, about = "Maintain the geodata reference table", long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the reference table if it doesn't exist
    Init,
    /// Register a dataset
    Add {
        #[arg(long)]
        source_url: String,
        /// Matches the download link and the file or layer name, e.g. nybb
        #[arg(long)]
        prefix: String,
        /// Table to load the data into
        #[arg(long)]
        table: String,
        /// Either .shp or .gdb
        #[arg(long, default_value = ".shp")]
        format: String,
        /// Refresh interval in days
        #[arg(long, default_value_t = 30)]
        frequency: i32,
    },
    /// Turn a dataset on or off
    Activate {
        id: i32,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Print the reference table
    Show {
        /// Print as json instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Make an ASCII table from the records
fn ascii_table(records: &[MetadataRecord]) -> tabled::Table {
    let mut builder = Builder::new();
    builder.push_record(vec![
        "Id",
        "Active",
        "Prefix",
        "Table",
        "Format",
        "Frequency",
        "Last Update",
    ]);
    for record in records {
        builder.push_record(vec![
            record.id.to_string(),
            record.active.to_string(),
            record.external_name_prefix.clone(),
            record.internal_name.clone(),
            record.data_format.to_string(),
            record.update_frequency.to_string(),
            record
                .update_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::sharp());
    table
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let settings = Settings::load(Path::new(format!(".env/{}.env", args.env).as_str()))?;
    let archive = GeodataArchive::new(settings.download_folder, &settings.duckdb_path);
    let conn = archive.open()?;

    match args.command {
        Command::Init => {
            create_table(&conn)?;
            info!("reference table is ready");
        }
        Command::Add {
            source_url,
            prefix,
            table,
            format,
            frequency,
        } => {
            let data_format: DataFormat = format.parse()?;
            let id = add_record(&conn, &source_url, &prefix, &table, data_format, frequency)?;
            info!("added {} with id {}", table, id);
        }
        Command::Activate { id, active } => {
            let n = set_active(&conn, id, active)?;
            info!("{} record(s) updated", n);
        }
        Command::Show { json } => {
            let records = get_records(&conn)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!("{}", ascii_table(&records));
            }
        }
    }
    Ok(())
}
