//! NITF-style XML article parsing.
//!
//! Walks the event stream of one article file and extracts the fields the
//! index needs: doc-id, headline, publication url/date, print page, and the
//! `full_text` body paragraphs. Recoverable defects (missing title, missing
//! body) degrade the article and log to the diagnostic stream; a file without
//! a doc-id or with broken XML is an error the caller logs and skips.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::warn;
use thiserror::Error;
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

use crate::models::{Article, NO_TITLE};

/// Date recorded for articles whose pubdata carries no publication stamp.
const DEFAULT_DATE: i64 = 20000101;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] xml::reader::Error),
    #[error("no doc-id element in {0}")]
    MissingDocId(String),
    #[error("doc-id {0:?} is not an integer")]
    BadDocId(String),
}

pub type ParserResult<T> = Result<T, ParserError>;

/// Parse one article file.
pub fn parse_article(path: &Path) -> ParserResult<Article> {
    let file = File::open(path)?;
    parse_reader(BufReader::new(file), &path.display().to_string())
}

/// Parse an article from any reader. `origin` labels diagnostics.
pub fn parse_reader<R: Read>(reader: R, origin: &str) -> ParserResult<Article> {
    let mut doc_id: Option<i64> = None;
    let mut title: Option<String> = None;
    let mut url: Option<String> = None;
    let mut date: Option<i64> = None;
    let mut page: Option<i64> = None;
    let mut paragraphs: Vec<String> = Vec::new();

    let mut in_title = false;
    let mut in_full_text = false;
    let mut paragraph: Option<String> = None;

    for event in EventReader::new(reader) {
        match event? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => match name.local_name.as_str() {
                "doc-id" => {
                    if let Some(raw) = attr(&attributes, "id-string") {
                        doc_id = Some(
                            raw.parse()
                                .map_err(|_| ParserError::BadDocId(raw.to_string()))?,
                        );
                    }
                }
                "pubdata" => {
                    if let Some(ex_ref) = attr(&attributes, "ex-ref") {
                        url = Some(ex_ref.to_string());
                    }
                    if let Some(stamp) = attr(&attributes, "date.publication") {
                        date = parse_date_stamp(stamp);
                    }
                }
                "meta" => {
                    if attr(&attributes, "name") == Some("print_page_number") {
                        page = attr(&attributes, "content").and_then(|v| v.parse().ok());
                    }
                }
                "title" => in_title = true,
                "block" => {
                    if attr(&attributes, "class") == Some("full_text") {
                        in_full_text = true;
                    }
                }
                "p" if in_full_text => paragraph = Some(String::new()),
                _ => {}
            },
            XmlEvent::Characters(text) | XmlEvent::CData(text) => {
                if in_title {
                    title.get_or_insert_with(String::new).push_str(&text);
                } else if let Some(p) = paragraph.as_mut() {
                    p.push_str(&text);
                }
            }
            XmlEvent::EndElement { name } => match name.local_name.as_str() {
                "title" => in_title = false,
                "block" => in_full_text = false,
                "p" => {
                    if let Some(p) = paragraph.take() {
                        paragraphs.push(p);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    let did = doc_id.ok_or_else(|| ParserError::MissingDocId(origin.to_string()))?;

    let title = match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            warn!("article {did} ({origin}) has no title");
            NO_TITLE.to_string()
        }
    };
    if url.is_none() {
        warn!("article {did} ({origin}) has no ex-ref url");
    }
    if paragraphs.is_empty() {
        warn!("article {did} ({origin}) has no full_text body, recording empty content");
    }

    Ok(Article::new(
        did,
        title,
        url.unwrap_or_default(),
        paragraphs,
        date.unwrap_or(DEFAULT_DATE),
        page.unwrap_or(1).max(1),
    ))
}

fn attr<'a>(attributes: &'a [OwnedAttribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name.local_name == name)
        .map(|a| a.value.as_str())
}

/// `date.publication` stamps look like `20000702T000000`; the leading eight
/// digits are the YYYYMMDD date.
fn parse_date_stamp(stamp: &str) -> Option<i64> {
    let digits: String = stamp
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(8)
        .collect();
    if digits.len() == 8 {
        digits.parse().ok()
    } else {
        None
    }
}
