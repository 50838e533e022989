use std::{error::Error, path::Path};

use clap::Parser;
use glad::{
    api::open_data_portal::{find_download_link, OpenDataPortal},
    config::Settings,
};

#[derive(Parser, Debug)]
#[command(version, about = "Print the zip links found on the open data portal", long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Only show the link that gets picked for this name prefix
    #[arg(long)]
    prefix: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let settings = Settings::load(Path::new(format!(".env/{}.env", args.env).as_str()))?;
    let portal = OpenDataPortal::new(&settings.portal_url, settings.http_client()?);
    let links = portal.download_links()?;

    match args.prefix {
        Some(prefix) => match find_download_link(&links, &prefix) {
            Some(link) => println!("{}", link),
            None => println!("No link matching {}", prefix),
        },
        None => {
            for link in links {
                println!("{}", link);
            }
        }
    }
    Ok(())
}
