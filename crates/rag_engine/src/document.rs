//! Turns fetched bytes into a markdown [`Document`].
//!
//! Decoding picks the charset from the BOM, then the Content-Type header, then
//! chardetng. HTML pages are narrowed to their main content before markdown
//! conversion; plain-text and markdown bodies pass through untouched.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use scraper::{Html, Selector};

use crate::{Document, FetchOutput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes with {encoding}")]
    Malformed { encoding: String },
}

pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedText, DecodeError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(enc) = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return decode_with(bytes, enc);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedText, DecodeError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(DecodeError::Malformed {
            encoding: enc.name().to_string(),
        });
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding_label: enc.name().to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub content_html: String,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> ExtractedContent;
}

/// Picks the `<title>` and the first of `<article>`, `<main>`, `<body>`;
/// falls back to the whole document.
#[derive(Debug, Default)]
pub struct MainContentExtractor;

impl Extractor for MainContentExtractor {
    fn extract(&self, html: &str) -> ExtractedContent {
        let doc = Html::parse_document(html);

        let title = first_match(&doc, "title")
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let content_html = ["article", "main", "body"]
            .iter()
            .find_map(|sel| first_match(&doc, sel))
            .map(|node| node.inner_html())
            .unwrap_or_else(|| doc.root_element().html());

        ExtractedContent {
            title,
            content_html,
        }
    }
}

fn first_match<'a>(doc: &'a Html, selector: &str) -> Option<scraper::ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next()
}

pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> String {
        html2md::parse_html(html)
    }
}

/// Decode, extract and convert in one step.
pub struct DocumentBuilder {
    extractor: Box<dyn Extractor>,
    converter: Box<dyn Converter>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new(Box::new(MainContentExtractor), Box::new(Html2MdConverter))
    }
}

impl DocumentBuilder {
    pub fn new(extractor: Box<dyn Extractor>, converter: Box<dyn Converter>) -> Self {
        Self {
            extractor,
            converter,
        }
    }

    pub fn build(&self, fetched: &FetchOutput) -> Result<Document, DecodeError> {
        let content_type = fetched.metadata.content_type.as_deref();
        let decoded = decode_body(&fetched.bytes, content_type)?;
        let url = fetched.metadata.final_url.clone();

        if is_plain_text(content_type) {
            return Ok(Document {
                url,
                title: None,
                markdown: decoded.text.trim().to_string(),
            });
        }

        let extracted = self.extractor.extract(&decoded.text);
        let markdown = self.converter.to_markdown(&extracted.content_html);
        Ok(Document {
            url,
            title: extracted.title,
            markdown: markdown.trim().to_string(),
        })
    }
}

fn is_plain_text(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .is_some_and(|ct| {
            ct.eq_ignore_ascii_case("text/plain") || ct.eq_ignore_ascii_case("text/markdown")
        })
}
