use std::{error::Error, fs, path::Path, path::PathBuf};

use duckdb::Connection;
use jiff::civil::DateTime;
use log::info;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::{
    api::open_data_portal::find_download_link,
    db::{
        geodata_table::{insert_rows, recreate_table},
        reference_table::{mark_updated, read_metadata_xml, set_meta, DataFormat, MetadataRecord},
        vector_source::{locate_feature_class, locate_shapefile, VectorSource},
    },
    utils::{lib_download::download_zip, lib_duckdb::open_geodata_db},
};

#[derive(Error, Debug, PartialEq)]
pub enum ArchiveError {
    #[error("no download link matching {0}")]
    NoDownloadLink(String),
}

pub struct GeodataArchive {
    /// The zip files get extracted here, one folder for each archive
    pub base_dir: PathBuf,
    pub duckdb_path: String,
}

impl GeodataArchive {
    pub fn new(base_dir: PathBuf, duckdb_path: &str) -> GeodataArchive {
        GeodataArchive {
            base_dir,
            duckdb_path: duckdb_path.to_string(),
        }
    }

    /// Connection to the database with the reference table and the geodata
    /// tables.
    pub fn open(&self) -> Result<Connection, duckdb::Error> {
        open_geodata_db(&self.duckdb_path)
    }

    /// Find the vector data for this record among the extracted files.
    pub fn locate_source(
        &self,
        conn: &Connection,
        dir: &Path,
        record: &MetadataRecord,
    ) -> Result<VectorSource, Box<dyn Error>> {
        let source = match record.data_format {
            DataFormat::Shapefile => {
                VectorSource::shapefile(locate_shapefile(dir, &record.external_name_prefix)?)
            }
            DataFormat::Geodatabase => locate_feature_class(conn, dir, &record.external_name_prefix)?,
        };
        Ok(source)
    }

    /// Load the vector data into the `internal_name` table, dropping the
    /// table first.  Return the number of rows inserted.
    pub fn load_source(
        &self,
        conn: &Connection,
        source: &VectorSource,
        table: &str,
    ) -> Result<usize, Box<dyn Error>> {
        let fields = source.read_fields(conn)?;
        recreate_table(conn, table, &fields)?;
        let rows = source.read_rows(conn, &fields)?;
        insert_rows(conn, table, &fields, &rows)
    }

    /// Refresh one dataset: download and extract the archive, load the data,
    /// update the reference table and remove the extracted files.
    pub fn update_dataset(
        &self,
        conn: &Connection,
        client: &Client,
        links: &[String],
        record: &MetadataRecord,
        now: DateTime,
    ) -> Result<usize, Box<dyn Error>> {
        info!("updating {} ...", record.internal_name);
        let link = find_download_link(links, &record.external_name_prefix)
            .ok_or_else(|| ArchiveError::NoDownloadLink(record.external_name_prefix.clone()))?;

        let dir = download_zip(client, link, &self.base_dir)?;
        self.update_from_dir(conn, &dir, record, now)
    }

    /// Load the data extracted in `dir` for this record, then stamp the
    /// reference table and remove `dir`.
    pub fn update_from_dir(
        &self,
        conn: &Connection,
        dir: &Path,
        record: &MetadataRecord,
        now: DateTime,
    ) -> Result<usize, Box<dyn Error>> {
        let source = self.locate_source(conn, dir, record)?;
        let n = self.load_source(conn, &source, &record.internal_name)?;
        self.finish_update(conn, dir, &source, record, now)?;
        Ok(n)
    }

    /// Set the update date and, for shapefiles with a `.shp.xml` file, the
    /// metadata of the record.  Remove the extracted folder.
    pub fn finish_update(
        &self,
        conn: &Connection,
        dir: &Path,
        source: &VectorSource,
        record: &MetadataRecord,
        now: DateTime,
    ) -> Result<(), Box<dyn Error>> {
        mark_updated(conn, record.id, now)?;
        if let Some(path) = source.metadata_xml_path() {
            if let Some(xml) = read_metadata_xml(&path)? {
                set_meta(conn, record.id, &xml)?;
            }
        }
        fs::remove_dir_all(dir)?;
        info!("removed {:?}", dir);
        Ok(())
    }
}
