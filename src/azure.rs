//! Azure Blob Storage backend over the Blob REST API.
//!
//! Requests are authorized either with a shared access signature appended to
//! the URL or with SharedKey signing from the account key, whichever the
//! connection string carries. A SAS token wins when both are present.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use sha2::Sha256;

use crate::error::SyncError;
use crate::http::{build_client, error_message, send_with_retries};
use crate::storage::BlobStore;

const API_VERSION: &str = "2021-08-06";

#[derive(Clone, PartialEq, Eq)]
pub enum AzureCredential {
    Sas(String),
    SharedKey { account: String, key: Vec<u8> },
}

impl fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AzureCredential::Sas(_) => f.write_str("Sas(..)"),
            AzureCredential::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConnection {
    pub blob_endpoint: String,
    pub credential: AzureCredential,
}

impl AzureConnection {
    pub fn parse(connection_string: &str) -> Result<Self, SyncError> {
        let mut parts = HashMap::new();
        for segment in connection_string.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                SyncError::InvalidConnectionString(format!("malformed segment `{segment}`"))
            })?;
            parts.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let blob_endpoint = match parts.get("blobendpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let account = parts.get("accountname").ok_or_else(|| {
                    SyncError::InvalidConnectionString(
                        "neither BlobEndpoint nor AccountName is set".to_string(),
                    )
                })?;
                let protocol = parts
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = parts
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{protocol}://{account}.blob.{suffix}")
            }
        };

        let sas_token = parts
            .get("sharedaccesssignature")
            .map(|token| token.trim_start_matches('?').to_string())
            .filter(|token| !token.is_empty());
        let credential = match (sas_token, parts.get("accountkey")) {
            (Some(token), _) => AzureCredential::Sas(token),
            (None, Some(key)) => {
                let account = parts.get("accountname").ok_or_else(|| {
                    SyncError::InvalidConnectionString(
                        "AccountKey requires AccountName".to_string(),
                    )
                })?;
                let key = STANDARD.decode(key).map_err(|err| {
                    SyncError::InvalidConnectionString(format!(
                        "AccountKey is not valid base64: {err}"
                    ))
                })?;
                AzureCredential::SharedKey {
                    account: account.clone(),
                    key,
                }
            }
            (None, None) => {
                return Err(SyncError::InvalidConnectionString(
                    "SharedAccessSignature or AccountKey is required".to_string(),
                ));
            }
        };

        Ok(Self {
            blob_endpoint,
            credential,
        })
    }

    pub fn container_url(&self, container: &str) -> String {
        format!("{}/{}", self.blob_endpoint, encode_path(container))
    }

    pub fn blob_url(&self, container: &str, name: &str) -> String {
        format!("{}/{}", self.container_url(container), encode_path(name))
    }
}

/// Account-key signer; the keyed MAC is prepared once and cloned per request.
#[derive(Clone)]
struct SharedKeySigner {
    account: String,
    mac: Hmac<Sha256>,
}

impl SharedKeySigner {
    fn new(account: &str, key: &[u8]) -> Result<Self, SyncError> {
        let mac = Hmac::<Sha256>::new_from_slice(key)
            .map_err(|err| SyncError::InvalidConnectionString(format!("AccountKey: {err}")))?;
        Ok(Self {
            account: account.to_string(),
            mac,
        })
    }

    fn sign(&self, string_to_sign: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    fn authorization(&self, string_to_sign: &str) -> String {
        format!("SharedKey {}:{}", self.account, self.sign(string_to_sign))
    }
}

#[derive(Clone)]
enum Auth {
    Sas(String),
    SharedKey(SharedKeySigner),
}

struct Operation<'a> {
    method: Method,
    url: String,
    query: &'a [(&'a str, &'a str)],
    blob_type: Option<&'a str>,
    content_type: Option<&'a str>,
    body: Option<&'a [u8]>,
}

#[derive(Clone)]
pub struct AzureBlobClient {
    client: Client,
    connection: AzureConnection,
    auth: Auth,
}

impl AzureBlobClient {
    pub fn from_connection_string(connection_string: &str) -> Result<Self, SyncError> {
        Self::new(AzureConnection::parse(connection_string)?)
    }

    pub fn new(connection: AzureConnection) -> Result<Self, SyncError> {
        let auth = match &connection.credential {
            AzureCredential::Sas(token) => Auth::Sas(token.clone()),
            AzureCredential::SharedKey { account, key } => {
                Auth::SharedKey(SharedKeySigner::new(account, key)?)
            }
        };
        let client = build_client(Duration::from_secs(60), HeaderMap::new())
            .map_err(|err| SyncError::StorageHttp(err.to_string()))?;
        Ok(Self {
            client,
            connection,
            auth,
        })
    }

    fn prepare(&self, op: &Operation<'_>) -> RequestBuilder {
        let mut ms_headers = vec![("x-ms-version", API_VERSION.to_string())];
        if let Some(blob_type) = op.blob_type {
            ms_headers.push(("x-ms-blob-type", blob_type.to_string()));
        }
        if matches!(self.auth, Auth::SharedKey(_)) {
            ms_headers.push(("x-ms-date", http_date(Utc::now())));
        }

        let mut query = op
            .query
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>();
        if let Auth::Sas(token) = &self.auth {
            query.push(token.clone());
        }
        let url = if query.is_empty() {
            op.url.clone()
        } else {
            format!("{}?{}", op.url, query.join("&"))
        };

        let body_len = op.body.map_or(0, <[u8]>::len);
        let mut request = self.client.request(op.method.clone(), &url);
        if let Auth::SharedKey(signer) = &self.auth {
            let payload = string_to_sign(
                &op.method,
                body_len,
                op.content_type.unwrap_or(""),
                &ms_headers,
                &signer.account,
                &op.url,
                op.query,
            );
            request = request.header(AUTHORIZATION, signer.authorization(&payload));
        }
        for (name, value) in &ms_headers {
            request = request.header(*name, value.as_str());
        }
        if let Some(content_type) = op.content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        match op.body {
            Some(body) => request.body(body.to_vec()),
            None if op.method == Method::PUT => request.header(CONTENT_LENGTH, "0"),
            None => request,
        }
    }

    fn send(&self, op: &Operation<'_>) -> Result<Response, SyncError> {
        send_with_retries(|| self.prepare(op))
            .map_err(|err| SyncError::StorageHttp(err.to_string()))
    }
}

impl BlobStore for AzureBlobClient {
    fn ensure_container(&self, container: &str) -> Result<(), SyncError> {
        tracing::debug!(container, "ensure container");
        let response = self.send(&Operation {
            method: Method::PUT,
            url: self.connection.container_url(container),
            query: &[("restype", "container")],
            blob_type: None,
            content_type: None,
            body: None,
        })?;
        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            return Ok(());
        }
        if status == StatusCode::FORBIDDEN {
            // Container-scoped tokens cannot create containers; the blob write decides.
            tracing::warn!(container, "not allowed to create container, assuming it exists");
            return Ok(());
        }
        Err(SyncError::StorageStatus {
            status: status.as_u16(),
            message: error_message(response, "create container failed"),
        })
    }

    fn get_blob(&self, container: &str, name: &str) -> Result<Vec<u8>, SyncError> {
        tracing::debug!(container, blob = name, "get blob");
        let response = self.send(&Operation {
            method: Method::GET,
            url: self.connection.blob_url(container, name),
            query: &[],
            blob_type: None,
            content_type: None,
            body: None,
        })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::BlobNotFound {
                container: container.to_string(),
                blob: name.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SyncError::StorageStatus {
                status: status.as_u16(),
                message: error_message(response, "get blob failed"),
            });
        }
        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| SyncError::StorageHttp(err.to_string()))
    }

    fn put_blob(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), SyncError> {
        tracing::debug!(container, blob = name, bytes = content.len(), "put blob");
        let response = self.send(&Operation {
            method: Method::PUT,
            url: self.connection.blob_url(container, name),
            query: &[],
            blob_type: Some("BlockBlob"),
            content_type: Some(content_type),
            body: Some(content),
        })?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(SyncError::StorageStatus {
                status,
                message: error_message(response, "put blob failed"),
            });
        }
        Ok(())
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        self.connection.blob_url(container, name)
    }
}

/// SharedKey string-to-sign for the Blob service. The `Date` line stays empty
/// because `x-ms-date` is always sent.
fn string_to_sign(
    method: &Method,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, String)],
    account: &str,
    url: &str,
    query: &[(&str, &str)],
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };
    let mut out = format!("{method}\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\n");

    let mut headers = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect::<Vec<_>>();
    headers.sort();
    for (name, value) in headers {
        out.push_str(&format!("{name}:{value}\n"));
    }

    out.push_str(&format!("/{account}{}", url_path(url)));
    let mut params = query
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), *value))
        .collect::<Vec<_>>();
    params.sort();
    for (name, value) in params {
        out.push_str(&format!("\n{name}:{value}"));
    }
    out
}

fn url_path(url: &str) -> &str {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme
        .find('/')
        .map_or("/", |index| &after_scheme[index..]);
    path.split('?').next().unwrap_or(path)
}

fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Percent-encodes everything outside the unreserved set, keeping `/` so
/// virtual directories in blob names survive.
fn encode_path(value: &str) -> String {
    let mut out = String::new();
    for byte in value.as_bytes() {
        let ch = *byte as char;
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~' | '/') {
            out.push(ch);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
