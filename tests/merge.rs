use std::fs;

use pubmed_sync::dataset::{read_dataset, write_dataset};
use pubmed_sync::merge::{merge, merge_records, merge_with_summary};
use pubmed_sync::record::Record;

fn row(id: &str, title: &str, year: &str) -> Record {
    Record {
        id: id.to_string(),
        title: title.to_string(),
        year: year.to_string(),
        ..Record::default()
    }
}

fn titles(rows: &[Record]) -> Vec<&str> {
    rows.iter().map(|row| row.title.as_str()).collect()
}

#[test]
fn fresh_rows_supersede_previous_rows_with_the_same_id() {
    let temp = tempfile::tempdir().unwrap();
    let previous = write_dataset(
        &temp.path().join("previous.csv"),
        &[row("1", "one", "2020"), row("2", "two", "2020")],
    )
    .unwrap();
    let fresh = write_dataset(
        &temp.path().join("fresh.csv"),
        &[row("2", "two updated", "2021"), row("3", "three", "2021")],
    )
    .unwrap();

    let summary =
        merge_with_summary(Some(&previous), &fresh, &temp.path().join("merged.csv")).unwrap();

    assert_eq!(summary.previous_rows, 2);
    assert_eq!(summary.fresh_rows, 2);
    assert_eq!(summary.merged_rows, 3);
    let merged = read_dataset(&summary.path).unwrap();
    assert_eq!(titles(&merged), vec!["one", "two updated", "three"]);
}

#[test]
fn merging_a_dataset_with_itself_changes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let rows = vec![
        row("1", "one", "2020"),
        row("", "untitled", "2019"),
        row("2", "two", "2020"),
    ];
    let dataset = write_dataset(&temp.path().join("data.csv"), &rows).unwrap();

    let once = merge(Some(&dataset), &dataset, &temp.path().join("once.csv")).unwrap();
    let twice = merge(Some(&once), &dataset, &temp.path().join("twice.csv")).unwrap();

    let once_rows = read_dataset(&once).unwrap();
    assert_eq!(titles(&once_rows), vec!["one", "two", "untitled"]);
    assert_eq!(once_rows, read_dataset(&twice).unwrap());
}

#[test]
fn rows_without_id_dedup_on_title_and_year() {
    let previous = vec![row("", "Same", "2019"), row("", "Same", "2020")];
    let mut updated = row("", "Same", "2019");
    updated.venue = "Lancet".to_string();
    let fresh = vec![updated, row("9", "Same", "2019")];

    let merged = merge_records(previous, fresh);

    assert_eq!(merged.len(), 3);
    assert_eq!(merged[0].id, "9");
    assert_eq!(merged[1].year, "2020");
    assert_eq!(merged[2].year, "2019");
    assert_eq!(merged[2].venue, "Lancet");
}

#[test]
fn absent_previous_dataset_counts_as_empty() {
    let temp = tempfile::tempdir().unwrap();
    let fresh = write_dataset(&temp.path().join("fresh.csv"), &[row("4", "four", "2022")]).unwrap();

    let without = merge_with_summary(None, &fresh, &temp.path().join("a.csv")).unwrap();
    let missing = temp.path().join("does-not-exist.csv");
    let with_missing =
        merge_with_summary(Some(&missing), &fresh, &temp.path().join("b.csv")).unwrap();

    assert_eq!(without.previous_rows, 0);
    assert_eq!(without.merged_rows, 1);
    assert_eq!(with_missing.merged_rows, 1);
}

#[test]
fn previous_file_with_legacy_columns_is_read_by_name() {
    let temp = tempfile::tempdir().unwrap();
    let previous = temp.path().join("previous.csv");
    fs::write(
        &previous,
        "PMID,Title,Journal,Year,Extra\n1,Old title,Circulation,2018,x\n5,Kept,Lancet,2017,y\n",
    )
    .unwrap();
    let fresh = write_dataset(
        &temp.path().join("fresh.csv"),
        &[row("1", "New title", "2018")],
    )
    .unwrap();

    let path = merge(Some(&previous), &fresh, &temp.path().join("merged.csv")).unwrap();

    let merged = read_dataset(&path).unwrap();
    assert_eq!(titles(&merged), vec!["Kept", "New title"]);
    assert_eq!(merged[0].venue, "Lancet");
    assert_eq!(merged[0].authors, "");
    assert_eq!(merged[1].venue, "");
    let header = fs::read_to_string(&path).unwrap();
    assert!(header.starts_with("id,title,authors,year,venue,abstract\n"));
}

#[test]
fn fields_with_commas_quotes_and_newlines_survive() {
    let temp = tempfile::tempdir().unwrap();
    let mut tricky = row("8", "A \"quoted\", title", "2023");
    tricky.abstract_text = "Line one.\nLine two, with comma.".to_string();
    let fresh = write_dataset(&temp.path().join("fresh.csv"), &[tricky.clone()]).unwrap();

    let path = merge(None, &fresh, &temp.path().join("merged.csv")).unwrap();

    assert_eq!(read_dataset(&path).unwrap(), vec![tricky]);
}
