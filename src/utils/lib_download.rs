use std::{
    error::Error,
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use log::info;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::{blocking::Client, StatusCode};
use thiserror::Error;
use url::Url;

static ZIP_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.zip$").unwrap());

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("download of {url} failed with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("can't derive a folder name from url {0}")]
    FolderName(String),
}

/// Name of the folder the archive at this url gets extracted to.  It's the
/// last path segment, without the query string and the `.zip` extension, e.g.
/// `https://host/download/zip/nybb_25a.zip?r=1` gives `nybb_25a`.  The
/// segment is percent-decoded, `my%20data.zip` gives `my data`.
pub fn folder_name(url: &str) -> Result<String, DownloadError> {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(|s| s.to_string())),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|s| s.rsplit('/').next())
            .map(|s| s.to_string()),
    };
    let name = segment
        .map(|s| percent_decode_str(&s).decode_utf8_lossy().to_string())
        .map(|s| ZIP_SUFFIX.replace(&s, "").to_string())
        .filter(|s| !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\']));
    name.ok_or_else(|| DownloadError::FolderName(url.to_string()))
}

/// Download the zip file at `url` into memory and extract it under
/// `download_folder`.  Return the folder with the extracted files.
pub fn download_zip(
    client: &Client,
    url: &str,
    download_folder: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    info!("downloading {}", url);
    let response = client.get(url).send()?;
    if response.status() != StatusCode::OK {
        return Err(Box::new(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        }));
    }
    let bytes = response.bytes()?;
    info!("downloaded {} bytes", bytes.len());

    let dir = download_folder.join(folder_name(url)?);
    extract_zip(&bytes, &dir)?;
    info!("unzipped at {:?}", dir);
    Ok(dir)
}

/// Extract all the entries of an in-memory zip archive into `dir`.  The
/// directory is created if it doesn't exist.
pub fn extract_zip(bytes: &[u8], dir: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(dir)?;
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;
    zip.extract(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{error::Error, io::Write};

    use zip::write::SimpleFileOptions;

    use super::*;

    #[test]
    fn folder_names() -> Result<(), Box<dyn Error>> {
        assert_eq!(
            folder_name("https://www.nyc.gov/assets/planning/download/zip/data-maps/open-data/nybb_25a.zip?r=1")?,
            "nybb_25a"
        );
        assert_eq!(
            folder_name("https://www.nyc.gov/assets/planning/download/zip/data-maps/open-data/nyad_25a.ZIP")?,
            "nyad_25a"
        );
        // only the suffix goes, a `zip` inside the name stays
        assert_eq!(folder_name("http://host/download/zip/zipcodes.zip")?, "zipcodes");
        assert_eq!(folder_name("download/zip/nycd_25a.zip?r=1")?, "nycd_25a");
        assert!(folder_name("http://host/").is_err());
        Ok(())
    }

    #[test]
    fn folder_names_are_decoded() -> Result<(), Box<dyn Error>> {
        assert_eq!(folder_name("http://host/download/zip/my%20data.zip")?, "my data");
        assert_eq!(folder_name("download/zip/my%20data.zip?r=2")?, "my data");
        // a decoded separator can't escape the download folder
        assert!(folder_name("http://host/download/zip/..%2Fetc.zip").is_err());
        assert!(folder_name("http://host/download/zip/%2E%2E").is_err());
        // repeated calls share the compiled suffix pattern
        for _ in 0..3 {
            assert_eq!(folder_name("http://host/a/nybb_25a.Zip")?, "nybb_25a");
        }
        Ok(())
    }

    fn make_zip() -> Result<Vec<u8>, Box<dyn Error>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.add_directory("nybb_25a/", options)?;
        zip.start_file("nybb_25a/nybb.shp", options)?;
        zip.write_all(b"not really a shapefile")?;
        zip.start_file("nybb_25a/nybb.shp.xml", options)?;
        zip.write_all(b"<metadata/>")?;
        Ok(zip.finish()?.into_inner())
    }

    #[test]
    fn extract_archive() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("downloads").join("nybb_25a");
        extract_zip(&make_zip()?, &dir)?;
        assert!(dir.join("nybb_25a/nybb.shp").is_file());
        assert_eq!(
            fs::read_to_string(dir.join("nybb_25a/nybb.shp.xml"))?,
            "<metadata/>"
        );
        Ok(())
    }

    #[test]
    fn extract_garbage_fails() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        assert!(extract_zip(b"<html>login required</html>", tmp.path()).is_err());
        Ok(())
    }

    #[ignore]
    #[test]
    fn download_boroughs() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let client = Client::new();
        let dir = download_zip(
            &client,
            "https://s-media.nyc.gov/agencies/dcp/assets/files/zip/data-tools/bytes/nybb_25a.zip",
            tmp.path(),
        )?;
        assert!(dir.ends_with("nybb_25a"));
        Ok(())
    }
}
