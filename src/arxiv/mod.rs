//! arXiv paper search and download
//!
//! Thin client over the arXiv Atom API: keyword search returns ranked paper
//! metadata, and a selected paper's PDF can be downloaded for ingestion
//! through the same path as a user upload.

use crate::config::ArxivConfig;
use crate::error::DocqaError;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArxivError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("paper not found: {0}")]
    NotFound(String),
}

impl From<ArxivError> for DocqaError {
    fn from(err: ArxivError) -> Self {
        match err {
            ArxivError::Http(e) => DocqaError::Http(e),
            other => DocqaError::Arxiv(other.to_string()),
        }
    }
}

/// Metadata of one paper in a search result, in feed (relevance) order
#[derive(Debug, Clone, Serialize)]
pub struct PaperMeta {
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: String,
    pub pdf_url: Option<String>,
    pub categories: Vec<String>,
}

/// Client for the arXiv export API
pub struct ArxivClient {
    client: reqwest::Client,
    config: ArxivConfig,
}

impl ArxivClient {
    pub fn new(config: ArxivConfig) -> Result<Self, ArxivError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Search for papers by keyword, returning ranked metadata.
    /// Zero hits is an empty list, not an error.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<PaperMeta>, ArxivError> {
        tracing::debug!(query, max_results, "searching arXiv");

        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("search_query", query),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        parse_feed(&body)
    }

    /// Download a paper's PDF by arXiv id (e.g. "1706.03762")
    pub async fn download(&self, arxiv_id: &str) -> Result<Vec<u8>, ArxivError> {
        let url = format!(
            "{}/{}.pdf",
            self.config.pdf_url.trim_end_matches('/'),
            arxiv_id
        );
        tracing::info!(arxiv_id, url, "downloading paper");

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ArxivError::NotFound(arxiv_id.to_string()));
        }
        let response = response.error_for_status()?;

        let bytes = response.bytes().await?.to_vec();
        // arXiv serves an HTML notice page for withdrawn or unknown ids
        if !bytes.starts_with(b"%PDF") {
            return Err(ArxivError::NotFound(arxiv_id.to_string()));
        }

        Ok(bytes)
    }
}

/// Parse an arXiv Atom feed into paper metadata, preserving feed order
pub fn parse_feed(xml: &str) -> Result<Vec<PaperMeta>, ArxivError> {
    #[derive(Default)]
    struct Draft {
        arxiv_id: String,
        title: String,
        authors: Vec<String>,
        summary: String,
        published: String,
        pdf_url: Option<String>,
        categories: Vec<String>,
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        Id,
        Title,
        Summary,
        Published,
        AuthorName,
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut current: Option<Draft> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"entry" => {
                        current = Some(Draft::default());
                    }
                    b"id" if current.is_some() => field = Some(Field::Id),
                    b"title" if current.is_some() => field = Some(Field::Title),
                    b"summary" if current.is_some() => field = Some(Field::Summary),
                    b"published" if current.is_some() => field = Some(Field::Published),
                    b"author" if current.is_some() => in_author = true,
                    b"name" if in_author => field = Some(Field::AuthorName),
                    b"link" => {
                        if let Some(draft) = current.as_mut() {
                            let mut href = None;
                            let mut is_pdf = false;
                            for attr in e.attributes().flatten() {
                                let value = attr
                                    .unescape_value()
                                    .map_err(|err| ArxivError::Parse(err.to_string()))?
                                    .into_owned();
                                match attr.key.as_ref() {
                                    b"href" => href = Some(value),
                                    b"title" if value == "pdf" => is_pdf = true,
                                    _ => {}
                                }
                            }
                            if is_pdf {
                                draft.pdf_url = href;
                            }
                        }
                    }
                    b"category" => {
                        if let Some(draft) = current.as_mut() {
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() == b"term" {
                                    let value = attr
                                        .unescape_value()
                                        .map_err(|err| ArxivError::Parse(err.to_string()))?
                                        .into_owned();
                                    draft.categories.push(value);
                                }
                            }
                        }
                    }
                    _ => field = None,
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(draft), Some(field)) = (current.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|err| ArxivError::Parse(err.to_string()))?;
                    // Feed text wraps across lines; collapse runs of
                    // whitespace to single spaces
                    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    if normalized.is_empty() {
                        continue;
                    }
                    let target = match field {
                        Field::Id => &mut draft.arxiv_id,
                        Field::Title => &mut draft.title,
                        Field::Summary => &mut draft.summary,
                        Field::Published => &mut draft.published,
                        Field::AuthorName => {
                            draft.authors.push(normalized);
                            continue;
                        }
                    };
                    if !target.is_empty() {
                        target.push(' ');
                    }
                    target.push_str(&normalized);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"entry" => {
                    if let Some(draft) = current.take() {
                        // Entry ids look like http://arxiv.org/abs/1706.03762v5
                        let arxiv_id = draft
                            .arxiv_id
                            .rsplit('/')
                            .next()
                            .unwrap_or(&draft.arxiv_id)
                            .to_string();
                        papers.push(PaperMeta {
                            arxiv_id,
                            title: draft.title,
                            authors: draft.authors,
                            summary: draft.summary,
                            published: draft.published,
                            pdf_url: draft.pdf_url,
                            categories: draft.categories,
                        });
                    }
                    field = None;
                }
                b"author" => {
                    in_author = false;
                    field = None;
                }
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ArxivError::Parse(e.to_string())),
        }
    }

    Ok(papers)
}
