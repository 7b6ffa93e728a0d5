use pubmed_sync::normalize::{RawArticle, normalize};
use pubmed_sync::record::UNKNOWN_YEAR;
use serde_json::{Value, json};

fn article(value: Value) -> RawArticle {
    serde_json::from_value(value).unwrap()
}

fn with_article(body: Value) -> RawArticle {
    article(json!({ "MedlineCitation": { "PMID": "100", "Article": body } }))
}

#[test]
fn complete_article_normalizes_every_field() {
    let raw = article(json!({
        "MedlineCitation": {
            "PMID": "31452104",
            "Article": {
                "ArticleTitle": "  Heart failure outcomes.  ",
                "AuthorList": [
                    { "LastName": "Smith", "ForeName": "Anna" },
                    { "LastName": "Lee", "ForeName": "B" }
                ],
                "Journal": {
                    "Title": "Circulation",
                    "JournalIssue": { "PubDate": { "Year": "2019" } }
                },
                "Abstract": { "AbstractText": "Plain abstract." }
            }
        }
    }));

    let record = normalize(&raw);
    assert_eq!(record.id, "31452104");
    assert_eq!(record.title, "Heart failure outcomes.");
    assert_eq!(record.authors, "Anna Smith, B Lee");
    assert_eq!(record.year, "2019");
    assert_eq!(record.venue, "Circulation");
    assert_eq!(record.abstract_text, "Plain abstract.");
}

#[test]
fn missing_abstract_is_empty() {
    let record = normalize(&with_article(json!({ "ArticleTitle": "T" })));
    assert_eq!(record.abstract_text, "");
}

#[test]
fn mixed_abstract_segments_join_with_labels() {
    let record = normalize(&with_article(json!({
        "Abstract": {
            "AbstractText": [
                { "#text": "We studied X.", "Label": "BACKGROUND" },
                "Unlabeled part.",
                { "_": "Y improved.", "Label": "RESULTS" },
                42
            ]
        }
    })));
    assert_eq!(
        record.abstract_text,
        "BACKGROUND: We studied X. Unlabeled part. RESULTS: Y improved."
    );
}

#[test]
fn single_labeled_abstract_drops_the_label() {
    let record = normalize(&with_article(json!({
        "Abstract": { "AbstractText": { "#text": "Only text.", "Label": "SUMMARY" } }
    })));
    assert_eq!(record.abstract_text, "Only text.");
}

#[test]
fn unrecognized_abstract_shape_is_empty() {
    let record = normalize(&with_article(json!({
        "Abstract": { "AbstractText": true }
    })));
    assert_eq!(record.abstract_text, "");
}

#[test]
fn authors_skip_blank_names_and_fall_back_to_collective_name() {
    let record = normalize(&with_article(json!({
        "AuthorList": [
            { "LastName": "Ng" },
            { "ForeName": "Solo" },
            {},
            { "CollectiveName": "Heart Study Group" }
        ]
    })));
    assert_eq!(record.authors, "Ng, Solo, Heart Study Group");
}

#[test]
fn year_falls_back_to_medline_date_then_unknown() {
    let from_medline = normalize(&with_article(json!({
        "Journal": { "JournalIssue": { "PubDate": { "MedlineDate": "2019 Jan-Feb" } } }
    })));
    assert_eq!(from_medline.year, "2019");

    let unknown = normalize(&with_article(json!({ "Journal": { "Title": "Lancet" } })));
    assert_eq!(unknown.year, UNKNOWN_YEAR);
    assert_eq!(unknown.venue, "Lancet");
}

#[test]
fn empty_article_yields_empty_record() {
    let record = normalize(&article(json!({})));
    assert_eq!(record.id, "");
    assert_eq!(record.title, "");
    assert_eq!(record.authors, "");
    assert_eq!(record.year, UNKNOWN_YEAR);
    assert_eq!(record.venue, "");
    assert_eq!(record.abstract_text, "");
}
