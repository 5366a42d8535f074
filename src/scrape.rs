use chrono::Utc;
use reqwest::{redirect::Policy, Client};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{ConfigError, FetchError};
use crate::types::{Document, Record};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Clone)]
pub struct ScrapeClient {
    pub(crate) http: Client,
}

impl ScrapeClient {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(Policy::limited(8))
            .build()?;

        Ok(Self { http })
    }

    /// Single GET, no retries. Anything but a 2xx is an error.
    pub async fn fetch(&self, url_raw: &str) -> Result<Document, FetchError> {
        let url = Url::parse(url_raw).map_err(|source| FetchError::BadUrl {
            url: url_raw.to_string(),
            source,
        })?;
        if !(url.scheme() == "https" || url.scheme() == "http") {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let res = self.http.get(url.clone()).send().await.map_err(request_err)?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = res.text().await.map_err(request_err)?;

        Ok(Document {
            url: url.to_string(),
            fetched_at: Utc::now(),
            http_status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Site-specific selectors locating items, their title and their link.
#[derive(Debug, Clone)]
pub struct Selectors {
    item: Selector,
    title: Selector,
    link: Selector,
}

impl Selectors {
    pub fn new(item: &str, title: &str, link: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            item: compile("SCRAPE_ITEM_SELECTOR", item)?,
            title: compile("SCRAPE_TITLE_SELECTOR", title)?,
            link: compile("SCRAPE_LINK_SELECTOR", link)?,
        })
    }
}

fn compile(name: &'static str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|_| ConfigError::BadSelector {
        name,
        value: css.to_string(),
    })
}

/// A parsed page. Not `Send`, so keep it out of `.await` points.
pub struct ParsedPage {
    html: Html,
    source: String,
    base: Option<Url>,
    selectors: Selectors,
}

impl ParsedPage {
    pub fn parse(doc: &Document, selectors: &Selectors) -> Self {
        Self {
            html: Html::parse_document(&doc.body),
            source: doc.url.clone(),
            base: Url::parse(&doc.url).ok(),
            selectors: selectors.clone(),
        }
    }

    /// Walks the items in document order. Call again to start over.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.html
            .select(&self.selectors.item)
            .filter_map(move |item| self.record(item))
    }

    fn record(&self, item: ElementRef<'_>) -> Option<Record> {
        let title = item
            .select(&self.selectors.title)
            .next()
            .map(|n| n.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())?;

        let url = item
            .select(&self.selectors.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| match &self.base {
                Some(base) => base
                    .join(href)
                    .map(String::from)
                    .unwrap_or_else(|_| href.to_string()),
                None => href.to_string(),
            });

        Some(Record {
            title,
            url,
            source: self.source.clone(),
            scraped_at: Utc::now(),
        })
    }
}
