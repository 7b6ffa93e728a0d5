//! Streaming parser for efetch `PubmedArticleSet` XML.
//!
//! Only the elements the normalizer reads are captured:
//! ```xml
//! <PubmedArticle>
//!   <MedlineCitation>
//!     <PMID Version="1">31452104</PMID>
//!     <Article>
//!       <Journal><Title>Circulation</Title>
//!         <JournalIssue><PubDate><Year>2019</Year></PubDate></JournalIssue>
//!       </Journal>
//!       <ArticleTitle>Heart <i>failure</i> outcomes.</ArticleTitle>
//!       <Abstract><AbstractText Label="BACKGROUND">...</AbstractText></Abstract>
//!       <AuthorList><Author><LastName>Lee</LastName><ForeName>B</ForeName></Author></AuthorList>
//!     </Article>
//!   </MedlineCitation>
//! </PubmedArticle>
//! ```
//! Book records (`PubmedBookArticle`) are skipped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::SyncError;
use crate::normalize::{
    Abstract, AbstractSegment, AbstractText, Article, Author, Journal, JournalIssue, LabeledText,
    MedlineCitation, PubDate, RawArticle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pmid,
    Title,
    JournalTitle,
    Year,
    MedlineDate,
    LastName,
    ForeName,
    CollectiveName,
    AbstractText,
}

#[derive(Debug, Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    title: Option<String>,
    journal_title: Option<String>,
    year: Option<String>,
    medline_date: Option<String>,
    authors: Option<Vec<Author>>,
    abstract_segments: Option<Vec<(Option<String>, String)>>,
}

impl ArticleBuilder {
    fn slot<'a>(
        &'a mut self,
        field: Field,
        author: &'a mut Option<Author>,
    ) -> Option<&'a mut String> {
        let slot = match field {
            Field::Pmid => &mut self.pmid,
            Field::Title => &mut self.title,
            Field::JournalTitle => &mut self.journal_title,
            Field::Year => &mut self.year,
            Field::MedlineDate => &mut self.medline_date,
            Field::LastName => &mut author.as_mut()?.last_name,
            Field::ForeName => &mut author.as_mut()?.fore_name,
            Field::CollectiveName => &mut author.as_mut()?.collective_name,
            Field::AbstractText => {
                let (_, text) = self.abstract_segments.as_mut()?.last_mut()?;
                return Some(text);
            }
        };
        Some(slot.get_or_insert_with(String::new))
    }

    fn build(self) -> RawArticle {
        let abstract_section = self.abstract_segments.map(|segments| Abstract {
            text: abstract_text(segments),
        });
        RawArticle {
            medline_citation: Some(MedlineCitation {
                pmid: self.pmid,
                article: Some(Article {
                    title: self.title,
                    authors: self.authors,
                    journal: Some(Journal {
                        title: self.journal_title,
                        issue: Some(JournalIssue {
                            pub_date: Some(PubDate {
                                year: self.year,
                                medline_date: self.medline_date,
                            }),
                        }),
                    }),
                    abstract_section,
                }),
            }),
        }
    }
}

/// A lone unlabeled `AbstractText` is plain text; anything else is a sequence.
fn abstract_text(mut segments: Vec<(Option<String>, String)>) -> Option<AbstractText> {
    if segments.is_empty() {
        return None;
    }
    if segments.len() == 1 && segments[0].0.is_none() {
        let (_, text) = segments.remove(0);
        return Some(AbstractText::Text(text));
    }
    let segments = segments
        .into_iter()
        .map(|(label, text)| match label {
            Some(label) => AbstractSegment::Labeled(LabeledText {
                text: Some(text),
                alt_text: None,
                label: Some(label),
            }),
            None => AbstractSegment::Text(text),
        })
        .collect();
    Some(AbstractText::Segments(segments))
}

pub fn parse_pubmed_articles(xml: &str) -> Result<Vec<RawArticle>, SyncError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut articles = Vec::new();
    let mut current: Option<ArticleBuilder> = None;
    let mut author: Option<Author> = None;
    let mut capture: Option<(Field, usize)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| SyncError::EutilsParse(format!("efetch XML: {err}")))?;
        match event {
            Event::Start(start) => {
                let name = element_name(&start);
                let parent = stack.last().map(String::as_str).unwrap_or("");
                if name == "PubmedArticle" {
                    current = Some(ArticleBuilder::default());
                } else if let Some(builder) = current.as_mut() {
                    if capture.is_none() {
                        if let Some(field) = open_element(builder, &name, parent, &start, &mut author)
                        {
                            capture = Some((field, stack.len() + 1));
                        }
                    }
                }
                stack.push(name);
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                let parent = stack.last().map(String::as_str).unwrap_or("");
                if let Some(builder) = current.as_mut() {
                    if capture.is_none() {
                        let _ = open_element(builder, &name, parent, &start, &mut author);
                        if name == "Author" && parent == "AuthorList" {
                            close_author(builder, &mut author);
                        }
                    }
                }
            }
            Event::Text(text) => {
                if let (Some((field, _)), Some(builder)) = (capture, current.as_mut()) {
                    let text = text
                        .unescape()
                        .map_err(|err| SyncError::EutilsParse(format!("efetch XML: {err}")))?;
                    if let Some(slot) = builder.slot(field, &mut author) {
                        slot.push_str(&text);
                    }
                }
            }
            Event::CData(data) => {
                if let (Some((field, _)), Some(builder)) = (capture, current.as_mut()) {
                    if let Some(slot) = builder.slot(field, &mut author) {
                        slot.push_str(&String::from_utf8_lossy(&data));
                    }
                }
            }
            Event::End(_) => {
                if capture.is_some_and(|(_, depth)| depth == stack.len()) {
                    capture = None;
                }
                let name = stack.pop().unwrap_or_default();
                let parent = stack.last().map(String::as_str).unwrap_or("");
                match name.as_str() {
                    "PubmedArticle" => {
                        if let Some(builder) = current.take() {
                            articles.push(builder.build());
                        }
                        author = None;
                    }
                    "Author" if parent == "AuthorList" => {
                        if let Some(builder) = current.as_mut() {
                            close_author(builder, &mut author);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(articles)
}

/// Prepares state for an element and reports whether its text should be captured.
fn open_element(
    builder: &mut ArticleBuilder,
    name: &str,
    parent: &str,
    start: &BytesStart<'_>,
    author: &mut Option<Author>,
) -> Option<Field> {
    match (name, parent) {
        ("PMID", "MedlineCitation") => Some(Field::Pmid),
        ("ArticleTitle", "Article") => Some(Field::Title),
        ("Title", "Journal") => Some(Field::JournalTitle),
        ("Year", "PubDate") => Some(Field::Year),
        ("MedlineDate", "PubDate") => Some(Field::MedlineDate),
        ("AuthorList", "Article") => {
            builder.authors.get_or_insert_with(Vec::new);
            None
        }
        ("Author", "AuthorList") => {
            *author = Some(Author::default());
            None
        }
        ("LastName", "Author") => Some(Field::LastName),
        ("ForeName", "Author") => Some(Field::ForeName),
        ("CollectiveName", "Author") => Some(Field::CollectiveName),
        ("Abstract", "Article") => {
            builder.abstract_segments.get_or_insert_with(Vec::new);
            None
        }
        ("AbstractText", "Abstract") => {
            let segments = builder.abstract_segments.as_mut()?;
            segments.push((label_attribute(start), String::new()));
            Some(Field::AbstractText)
        }
        _ => None,
    }
}

fn close_author(builder: &mut ArticleBuilder, author: &mut Option<Author>) {
    if let Some(done) = author.take() {
        builder.authors.get_or_insert_with(Vec::new).push(done);
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).to_string()
}

fn label_attribute(start: &BytesStart<'_>) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"Label")
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.to_string())
        .filter(|value| !value.is_empty())
}
