use std::error::Error;

use log::info;
use reqwest::{blocking::Client, StatusCode};
use scraper::{Html, Selector};
use url::Url;

/// Pages that are always scraped for download links, on top of the
/// `open-data/dwn` pages linked from the landing page.  The PLUTO page is
/// listed directly to avoid the authentication redirect, the districts page
/// because it doesn't follow the `dwn` naming convention.
pub const REFER_PAGES: [&str; 2] = [
    "/site/planning/data-maps/open-data/dwn-pluto-mappluto.page",
    "/site/planning/data-maps/open-data/districts-download-metadata.page",
];

/// The open data page of the department of city planning, with links to
/// the zip files of all the datasets.
pub struct OpenDataPortal {
    pub url: String,
    pub client: Client,
}

impl OpenDataPortal {
    pub fn new(url: &str, client: Client) -> OpenDataPortal {
        OpenDataPortal {
            url: url.to_string(),
            client,
        }
    }

    fn get_html(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let response = self.client.get(url).send()?;
        if response.status() != StatusCode::OK {
            return Err(format!("Download of {} failed with status {}", url, response.status()).into());
        }
        Ok(response.text()?)
    }

    /// Get all the zip file urls from the landing page and the refer pages.
    /// Urls are not deduplicated.
    pub fn download_links(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let base = Url::parse(&self.url)?;
        let html = self.get_html(&self.url)?;
        let mut links = zip_links(&html, &base);
        let pages = refer_pages(&html);
        info!(
            "found {} zip links on the landing page, {} refer pages",
            links.len(),
            pages.len()
        );

        for page in pages {
            let url = base.join(&page)?;
            let html = self.get_html(url.as_str())?;
            let page_links = zip_links(&html, &base);
            info!("found {} zip links on {}", page_links.len(), url);
            links.extend(page_links);
        }
        Ok(links)
    }
}

fn hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").unwrap();
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

/// Absolute urls of the `/download/zip` links in the page.
pub fn zip_links(html: &str, base: &Url) -> Vec<String> {
    hrefs(html)
        .into_iter()
        .filter(|href| href.contains("/download/zip"))
        .filter_map(|href| base.join(&href).ok())
        .map(|url| url.to_string())
        .collect()
}

/// The refer pages to scrape: the fixed ones, followed by the
/// `open-data/dwn` pages linked from the landing page.
pub fn refer_pages(html: &str) -> Vec<String> {
    let mut pages: Vec<String> = REFER_PAGES.iter().map(|p| p.to_string()).collect();
    for href in hrefs(html) {
        if href.contains("open-data/dwn") && !href.contains('#') && !pages.contains(&href) {
            pages.push(href);
        }
    }
    pages
}

/// Find the link for a dataset.  If several links contain the prefix, the
/// last one wins.
pub fn find_download_link<'a>(links: &'a [String], prefix: &str) -> Option<&'a str> {
    links
        .iter()
        .rfind(|link| link.contains(prefix))
        .map(|link| link.as_str())
}
