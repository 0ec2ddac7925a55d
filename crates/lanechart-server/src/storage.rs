//! Azure File Share upload over the REST API, authorised with the account's
//! shared key.

use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use log::{debug, info};
use reqwest::{Method, StatusCode};
use sha2::Sha256;

use lanechart_core::package::Package;

use crate::config::ConfigError;
use crate::error::UpstreamError;
use crate::pipeline::FileStore;

const STORAGE_VERSION: &str = "2021-08-06";
const PACKAGE_CONTENT_TYPE: &str = "application/zip";

/// Account credentials and file endpoint taken from a storage connection string.
#[derive(Clone)]
pub struct StorageAccount {
    pub name: String,
    mac: Hmac<Sha256>,
    pub file_endpoint: String,
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("file_endpoint", &self.file_endpoint)
            .finish_non_exhaustive()
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name: "AZURE_STORAGE_CONNECTION_STRING",
        reason: reason.into(),
    }
}

impl StorageAccount {
    pub fn parse(connection_string: &str) -> Result<Self, ConfigError> {
        let mut name = None;
        let mut key = None;
        let mut protocol = "https";
        let mut suffix = "core.windows.net";
        let mut file_endpoint = None;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((k, v)) = part.split_once('=') else {
                return Err(invalid(format!("segment without '=': {part}")));
            };
            match k {
                "AccountName" => name = Some(v.to_string()),
                "AccountKey" => key = Some(v),
                "DefaultEndpointsProtocol" => protocol = v,
                "EndpointSuffix" => suffix = v,
                "FileEndpoint" => file_endpoint = Some(v.trim_end_matches('/').to_string()),
                _ => {}
            }
        }

        let name = name.ok_or_else(|| invalid("AccountName is missing"))?;
        let key = key.ok_or_else(|| invalid("AccountKey is missing"))?;
        let key = STANDARD
            .decode(key)
            .map_err(|e| invalid(format!("AccountKey is not base64: {e}")))?;
        let mac = Hmac::<Sha256>::new_from_slice(&key)
            .map_err(|e| invalid(format!("AccountKey is unusable: {e}")))?;
        let file_endpoint =
            file_endpoint.unwrap_or_else(|| format!("{protocol}://{name}.file.{suffix}"));

        Ok(Self {
            name,
            mac,
            file_endpoint,
        })
    }

    fn sign(&self, string_to_sign: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

// --- Signing ---

/// The parts of a request that go into its shared-key signature.
struct Canonical<'a> {
    method: &'a Method,
    /// Path below the endpoint, starting with `/`.
    path: &'a str,
    query: &'a [(&'a str, &'a str)],
    /// `x-ms-*` headers, lower-case names.
    ms_headers: &'a [(&'a str, String)],
    content_length: usize,
    content_type: &'a str,
}

fn string_to_sign(account: &str, request: &Canonical<'_>) -> String {
    let length = if request.content_length == 0 {
        String::new()
    } else {
        request.content_length.to_string()
    };

    let mut out = String::with_capacity(256);
    out.push_str(request.method.as_str());
    out.push('\n');
    // Content-Encoding, Content-Language
    out.push_str("\n\n");
    out.push_str(&length);
    out.push('\n');
    // Content-MD5
    out.push('\n');
    out.push_str(request.content_type);
    out.push('\n');
    // Date, If-Modified-Since, If-Match, If-None-Match, If-Unmodified-Since, Range
    out.push_str("\n\n\n\n\n\n");

    let mut headers: Vec<_> = request.ms_headers.iter().collect();
    headers.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in headers {
        out.push_str(name);
        out.push(':');
        out.push_str(value.trim());
        out.push('\n');
    }

    out.push('/');
    out.push_str(account);
    out.push_str(request.path);
    let mut query: Vec<_> = request.query.iter().collect();
    query.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in query {
        out.push('\n');
        out.push_str(&name.to_lowercase());
        out.push(':');
        out.push_str(value);
    }
    out
}

// --- Client ---

pub struct FileShareClient {
    http: reqwest::Client,
    account: StorageAccount,
    share: String,
}

impl FileShareClient {
    pub fn new(http: reqwest::Client, account: StorageAccount, share: impl Into<String>) -> Self {
        Self {
            http,
            account,
            share: share.into(),
        }
    }

    pub fn file_url(&self, file_name: &str) -> String {
        format!("{}/{}/{}", self.account.file_endpoint, self.share, file_name)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        mut ms_headers: Vec<(&str, String)>,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        ms_headers.push(("x-ms-date", httpdate::fmt_http_date(SystemTime::now())));
        ms_headers.push(("x-ms-version", STORAGE_VERSION.to_string()));

        let signature = self.account.sign(&string_to_sign(
            &self.account.name,
            &Canonical {
                method: &method,
                path,
                query,
                ms_headers: &ms_headers,
                content_length: body.len(),
                content_type,
            },
        ));

        let mut request = self
            .http
            .request(method, format!("{}{path}", self.account.file_endpoint))
            .query(query)
            .header(
                "Authorization",
                format!("SharedKey {}:{signature}", self.account.name),
            )
            .header("Content-Length", body.len());
        if !content_type.is_empty() {
            request = request.header("Content-Type", content_type);
        }
        for (name, value) in ms_headers {
            request = request.header(name, value);
        }
        Ok(request.body(body).send().await?)
    }

    async fn ensure_share(&self) -> Result<(), UpstreamError> {
        let path = format!("/{}", self.share);
        let response = self
            .send(Method::PUT, &path, &[("restype", "share")], Vec::new(), Vec::new(), "")
            .await?;
        if response.status() == StatusCode::CONFLICT {
            debug!(share = self.share.as_str(); "file share already exists");
            return Ok(());
        }
        UpstreamError::check(response).await?;
        info!(share = self.share.as_str(); "created file share");
        Ok(())
    }

    async fn create_file(&self, path: &str, size: usize) -> Result<(), UpstreamError> {
        let headers = vec![
            ("x-ms-type", "file".to_string()),
            ("x-ms-content-length", size.to_string()),
            ("x-ms-content-type", PACKAGE_CONTENT_TYPE.to_string()),
            ("x-ms-file-permission", "inherit".to_string()),
            ("x-ms-file-attributes", "None".to_string()),
            ("x-ms-file-creation-time", "now".to_string()),
            ("x-ms-file-last-write-time", "now".to_string()),
        ];
        let response = self
            .send(Method::PUT, path, &[], headers, Vec::new(), "")
            .await?;
        UpstreamError::check(response).await?;
        Ok(())
    }

    async fn write_range(&self, path: &str, bytes: &[u8]) -> Result<(), UpstreamError> {
        let headers = vec![
            ("x-ms-range", format!("bytes=0-{}", bytes.len() - 1)),
            ("x-ms-write", "update".to_string()),
        ];
        let response = self
            .send(Method::PUT, path, &[("comp", "range")], headers, bytes.to_vec(), "")
            .await?;
        UpstreamError::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl FileStore for FileShareClient {
    async fn upload(&self, package: &Package) -> Result<String, UpstreamError> {
        let started = Instant::now();
        self.ensure_share().await?;

        let path = format!("/{}/{}", self.share, package.file_name);
        self.create_file(&path, package.bytes.len()).await?;
        if !package.bytes.is_empty() {
            self.write_range(&path, &package.bytes).await?;
        }

        let url = self.file_url(&package.file_name);
        info!(
            url = url.as_str(),
            bytes = package.bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64;
            "uploaded chart package"
        );
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64 of "secret-key"
    const CONNECTION: &str = "DefaultEndpointsProtocol=https;AccountName=lanecharts;\
AccountKey=c2VjcmV0LWtleQ==;EndpointSuffix=core.windows.net";

    #[test]
    fn connection_string_yields_file_endpoint() {
        let account = StorageAccount::parse(CONNECTION).unwrap();
        assert_eq!(account.name, "lanecharts");
        assert_eq!(account.file_endpoint, "https://lanecharts.file.core.windows.net");
    }

    #[test]
    fn explicit_file_endpoint_wins() {
        let account = StorageAccount::parse(
            "AccountName=dev;AccountKey=c2VjcmV0LWtleQ==;FileEndpoint=http://127.0.0.1:10000/dev/",
        )
        .unwrap();
        assert_eq!(account.file_endpoint, "http://127.0.0.1:10000/dev");
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = StorageAccount::parse("AccountName=x;EndpointSuffix=core.windows.net").unwrap_err();
        assert!(err.to_string().contains("AccountKey is missing"));
    }

    #[test]
    fn undecodable_key_is_rejected() {
        let err = StorageAccount::parse("AccountName=x;AccountKey=%%%").unwrap_err();
        assert!(err.to_string().contains("not base64"));
    }

    #[test]
    fn debug_hides_the_key() {
        let account = StorageAccount::parse(CONNECTION).unwrap();
        assert!(!format!("{account:?}").contains("secret"));
    }

    #[test]
    fn string_to_sign_orders_headers_and_query() {
        let headers = [
            ("x-ms-version", STORAGE_VERSION.to_string()),
            ("x-ms-date", "Sat, 17 Oct 2026 10:00:00 GMT".to_string()),
            ("x-ms-write", "update".to_string()),
        ];
        let canonical = Canonical {
            method: &Method::PUT,
            path: "/lucid-files/form.lucid",
            query: &[("comp", "range")],
            ms_headers: &headers,
            content_length: 12,
            content_type: "",
        };
        let expected = "PUT\n\n\n12\n\n\n\n\n\n\n\n\n\
x-ms-date:Sat, 17 Oct 2026 10:00:00 GMT\n\
x-ms-version:2021-08-06\n\
x-ms-write:update\n\
/lanecharts/lucid-files/form.lucid\n\
comp:range";
        assert_eq!(string_to_sign("lanecharts", &canonical), expected);
    }

    #[test]
    fn zero_length_is_signed_as_empty() {
        let canonical = Canonical {
            method: &Method::PUT,
            path: "/lucid-files",
            query: &[("restype", "share")],
            ms_headers: &[],
            content_length: 0,
            content_type: "",
        };
        assert!(string_to_sign("a", &canonical).starts_with("PUT\n\n\n\n"));
    }

    #[test]
    fn signature_is_hmac_sha256_of_string_to_sign() {
        let account = StorageAccount::parse(CONNECTION).unwrap();
        assert_eq!(
            account.sign("PUT\n/lanecharts/lucid-files"),
            "5c6SZiGTxn+NX4UgKcYYgX1bZG2eoUjQUWgd2PeIgtI="
        );
    }

    #[test]
    fn file_url_joins_share_and_name() {
        let account = StorageAccount::parse(CONNECTION).unwrap();
        let client = FileShareClient::new(reqwest::Client::new(), account, "lucid-files");
        assert_eq!(
            client.file_url("form.lucid"),
            "https://lanecharts.file.core.windows.net/lucid-files/form.lucid"
        );
    }
}
