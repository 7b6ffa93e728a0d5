use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use pubmed_sync::config::{
    Config, ConfigLoader, Credentials, DEFAULT_EMAIL, StorageBackend, StorageEntry,
};
use pubmed_sync::error::SyncError;

#[test]
fn parse_config_file_with_filesystem_backend() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pubmed-sync.json");
    std::fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "query": "asthma[MeSH]",
            "max_results": 50,
            "work_dir": "/var/tmp/pubmed",
            "storage": { "backend": "filesystem", "root": "/srv/blobs" },
            "retry": { "max_attempts": 3, "delay_secs": 10 }
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.query, "asthma[MeSH]");
    assert_eq!(resolved.max_results, 50);
    assert_eq!(resolved.container, "pubmed-data");
    assert_eq!(resolved.work_dir, Utf8PathBuf::from("/var/tmp/pubmed"));
    assert_eq!(
        resolved.storage,
        StorageBackend::Filesystem(Utf8PathBuf::from("/srv/blobs"))
    );
    assert_eq!(resolved.retry.max_attempts, 3);
    assert_eq!(resolved.retry.delay, Duration::from_secs(10));
}

#[test]
fn explicit_missing_config_is_an_error() {
    let err = ConfigLoader::resolve(Some("/definitely/not/here.json")).unwrap_err();
    assert_matches!(err, SyncError::ConfigRead(_));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("bad.json");
    std::fs::write(&path, r#"{ "max_results": "many" }"#).unwrap();

    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, SyncError::ConfigParse(_));
}

#[test]
fn zero_max_results_is_rejected() {
    let config = Config {
        max_results: Some(0),
        work_dir: Some("/tmp/pubmed-sync".to_string()),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, SyncError::ConfigParse(message) if message.contains("max_results"));
}

#[test]
fn azure_backend_is_the_default() {
    let config = Config {
        storage: Some(StorageEntry::Azure),
        blob_name: Some("custom.csv".to_string()),
        work_dir: Some("/tmp/pubmed-sync".to_string()),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.storage, StorageBackend::Azure);
    assert_eq!(resolved.blob_name, "custom.csv");
}

#[test]
fn credentials_treat_blank_values_as_absent() {
    let credentials = Credentials::from_lookup(|key| match key {
        "NCBI_EMAIL" => Some("  ".to_string()),
        "NCBI_API_KEY" => Some("abc123".to_string()),
        _ => None,
    });

    assert_eq!(credentials.ncbi_email, DEFAULT_EMAIL);
    assert_eq!(credentials.ncbi_api_key.as_deref(), Some("abc123"));
    assert_matches!(
        credentials.connection_string(),
        Err(SyncError::MissingCredential(name)) if name == "AZURE_STORAGE_CONNECTION_STRING"
    );

    let identity = credentials.entrez_identity();
    assert_eq!(identity.api_key.as_deref(), Some("abc123"));
}

#[test]
fn connection_string_is_passed_through() {
    let credentials = Credentials::from_lookup(|key| {
        (key == "AZURE_STORAGE_CONNECTION_STRING")
            .then(|| "BlobEndpoint=https://acct.blob.core.windows.net;SharedAccessSignature=sv=1".to_string())
    });
    assert_eq!(
        credentials.connection_string().unwrap(),
        "BlobEndpoint=https://acct.blob.core.windows.net;SharedAccessSignature=sv=1"
    );
}
