//! Raw PubMed article shapes and their normalization into [`Record`]s.
//!
//! The raw types mirror the nested structure E-utilities returns for a
//! `PubmedArticle`. Every field is optional and deserialization is lenient:
//! a value of an unexpected type is treated as absent instead of failing the
//! whole record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::record::{Record, UNKNOWN_YEAR};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArticle {
    #[serde(rename = "MedlineCitation", default, deserialize_with = "lenient")]
    pub medline_citation: Option<MedlineCitation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedlineCitation {
    #[serde(rename = "PMID", default, deserialize_with = "lenient_text")]
    pub pmid: Option<String>,
    #[serde(rename = "Article", default, deserialize_with = "lenient")]
    pub article: Option<Article>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Article {
    #[serde(rename = "ArticleTitle", default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(rename = "AuthorList", default, deserialize_with = "lenient")]
    pub authors: Option<Vec<Author>>,
    #[serde(rename = "Journal", default, deserialize_with = "lenient")]
    pub journal: Option<Journal>,
    #[serde(rename = "Abstract", default, deserialize_with = "lenient")]
    pub abstract_section: Option<Abstract>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(rename = "LastName", default, deserialize_with = "lenient_text")]
    pub last_name: Option<String>,
    #[serde(rename = "ForeName", default, deserialize_with = "lenient_text")]
    pub fore_name: Option<String>,
    #[serde(rename = "CollectiveName", default, deserialize_with = "lenient_text")]
    pub collective_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Journal {
    #[serde(rename = "Title", default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(rename = "JournalIssue", default, deserialize_with = "lenient")]
    pub issue: Option<JournalIssue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalIssue {
    #[serde(rename = "PubDate", default, deserialize_with = "lenient")]
    pub pub_date: Option<PubDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PubDate {
    #[serde(rename = "Year", default, deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(rename = "MedlineDate", default, deserialize_with = "lenient_text")]
    pub medline_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Abstract {
    #[serde(rename = "AbstractText", default)]
    pub text: Option<AbstractText>,
}

/// Every shape `AbstractText` is known to take, plus a catch-all.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AbstractText {
    Text(String),
    Segments(Vec<AbstractSegment>),
    Labeled(LabeledText),
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AbstractSegment {
    Text(String),
    Labeled(LabeledText),
    Other(Value),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabeledText {
    #[serde(rename = "#text")]
    pub text: Option<String>,
    #[serde(rename = "_")]
    pub alt_text: Option<String>,
    #[serde(rename = "Label")]
    pub label: Option<String>,
}

impl LabeledText {
    fn body(&self) -> &str {
        non_empty(self.text.as_deref())
            .or(non_empty(self.alt_text.as_deref()))
            .unwrap_or("")
    }

    fn label(&self) -> Option<&str> {
        non_empty(self.label.as_deref())
    }
}

pub fn normalize(raw: &RawArticle) -> Record {
    let citation = raw.medline_citation.as_ref();
    let article = citation.and_then(|c| c.article.as_ref());
    let journal = article.and_then(|a| a.journal.as_ref());
    let pub_date = journal
        .and_then(|j| j.issue.as_ref())
        .and_then(|issue| issue.pub_date.as_ref());

    Record {
        id: trimmed(citation.and_then(|c| c.pmid.as_deref())),
        title: trimmed(article.and_then(|a| a.title.as_deref())),
        authors: article
            .and_then(|a| a.authors.as_deref())
            .map(join_authors)
            .unwrap_or_default(),
        year: derive_year(pub_date),
        venue: trimmed(journal.and_then(|j| j.title.as_deref())),
        abstract_text: article
            .and_then(|a| a.abstract_section.as_ref())
            .and_then(|section| section.text.as_ref())
            .map(flatten_abstract)
            .unwrap_or_default(),
    }
}

pub fn flatten_abstract(text: &AbstractText) -> String {
    match text {
        AbstractText::Text(value) => value.trim().to_string(),
        AbstractText::Segments(segments) => segments
            .iter()
            .map(render_segment)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        AbstractText::Labeled(labeled) => labeled.body().trim().to_string(),
        AbstractText::Other(_) => String::new(),
    }
}

fn render_segment(segment: &AbstractSegment) -> String {
    match segment {
        AbstractSegment::Text(value) => value.trim().to_string(),
        AbstractSegment::Labeled(labeled) => match labeled.label() {
            Some(label) => format!("{label}: {}", labeled.body()).trim().to_string(),
            None => labeled.body().trim().to_string(),
        },
        AbstractSegment::Other(_) => String::new(),
    }
}

pub fn join_authors(authors: &[Author]) -> String {
    authors
        .iter()
        .filter_map(|author| {
            let fore = author.fore_name.as_deref().unwrap_or("");
            let mut last = author.last_name.as_deref().unwrap_or("");
            if fore.is_empty() && last.is_empty() {
                last = author.collective_name.as_deref().unwrap_or("");
            }
            let name = [fore, last]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn derive_year(pub_date: Option<&PubDate>) -> String {
    let explicit = pub_date.and_then(|date| non_empty(date.year.as_deref()));
    let from_medline = || {
        pub_date
            .and_then(|date| date.medline_date.as_deref())
            .and_then(|date| date.split(' ').next())
            .filter(|token| !token.is_empty())
    };
    explicit
        .or_else(from_medline)
        .unwrap_or(UNKNOWN_YEAR)
        .to_string()
}

fn trimmed(value: Option<&str>) -> String {
    value.unwrap_or("").trim().to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}
