//! S3-compatible bucket storage
//!
//! Requests are path-style (`{endpoint}/{bucket}/{key}`) and signed with
//! AWS Signature Version 4, which works for AWS S3, MinIO and R2.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode, Url};
use sha2::{Digest, Sha256};

use super::{validate_key, ObjectStorage};
use crate::config::S3Config;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

pub struct S3Storage {
    config: S3Config,
    endpoint: Url,
    client: reqwest::Client,
}

impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.config.bucket)
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl S3Storage {
    pub fn new(config: S3Config) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            bail!("S3 bucket name is empty");
        }
        let endpoint = match &config.endpoint {
            Some(e) => e.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", config.region),
        };
        let endpoint = Url::parse(&endpoint)
            .with_context(|| format!("Invalid S3 endpoint: {}", endpoint))?;
        if endpoint.host_str().is_none() {
            bail!("S3 endpoint has no host: {}", endpoint);
        }
        Ok(Self {
            config,
            endpoint,
            client: reqwest::Client::new(),
        })
    }

    /// URI-encoded absolute path of an object
    fn object_path(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect();
        format!("/{}/{}", self.config.bucket, encoded.join("/"))
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Compute the `Authorization` header for a request
    fn authorization(
        &self,
        method: &Method,
        path: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.config.region, SERVICE);

        let canonical_request = format!(
            "{}\n{}\n\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
            method.as_str(),
            path,
            self.host_header(),
            payload_hash,
            amz_date,
            SIGNED_HEADERS,
            payload_hash,
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            sha256_hex(canonical_request.as_bytes())
        );

        let k_signing = signing_key(&self.config.secret_key, &date, &self.config.region, SERVICE)?;
        let signature = HEXLOWER.encode(&hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.config.access_key, scope, SIGNED_HEADERS, signature
        ))
    }

    async fn send(&self, method: Method, key: &str, body: Option<&[u8]>) -> Result<reqwest::Response> {
        validate_key(key)?;
        let path = self.object_path(key);
        let payload_hash = sha256_hex(body.unwrap_or_default());
        let now = Utc::now();
        let authorization = self.authorization(&method, &path, &payload_hash, now)?;

        let mut url = self.endpoint.clone();
        url.set_path(&path);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header("x-amz-date", now.format("%Y%m%dT%H%M%SZ").to_string())
            .header("x-amz-content-sha256", payload_hash)
            .header("authorization", authorization);
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        request
            .send()
            .await
            .with_context(|| format!("S3 {} {} failed", method, key))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let response = self.send(Method::PUT, key, Some(data)).await?;
        if !response.status().is_success() {
            bail!("S3 PUT {} returned {}", key, response.status());
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let response = self.send(Method::HEAD, key, None).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => bail!("S3 HEAD {} returned {}", key, s),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self.send(Method::DELETE, key, None).await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            bail!("S3 DELETE {} returned {}", key, status);
        }
        Ok(())
    }

    fn driver_name(&self) -> &'static str {
        "s3"
    }
}

/// SigV4 key for one day, region and service
fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(e) => bail!("Invalid HMAC key: {}", e),
    };
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(endpoint: Option<&str>) -> S3Config {
        S3Config {
            bucket: "materials".to_string(),
            region: "eu-west-1".to_string(),
            endpoint: endpoint.map(str::to_string),
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
        }
    }

    #[test]
    fn test_default_endpoint() {
        let storage = S3Storage::new(config(None)).unwrap();
        assert_eq!(storage.host_header(), "s3.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_custom_endpoint_keeps_port() {
        let storage = S3Storage::new(config(Some("http://localhost:9000/"))).unwrap();
        assert_eq!(storage.host_header(), "localhost:9000");
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let mut cfg = config(None);
        cfg.bucket = " ".to_string();
        assert!(S3Storage::new(cfg).is_err());
    }

    #[test]
    fn test_object_path_encodes_segments() {
        let storage = S3Storage::new(config(None)).unwrap();
        assert_eq!(
            storage.object_path("course_files/week 1.pdf"),
            "/materials/course_files/week%201.pdf"
        );
    }

    #[test]
    fn test_sha256_of_empty_payload() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_authorization_shape() {
        let storage = S3Storage::new(config(None)).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
        let auth = storage.authorization(&Method::PUT, "/materials/a.pdf", &sha256_hex(b"x"), now).unwrap();

        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20250901/eu-west-1/s3/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signing_key_matches_aws_example() {
        // Published example from the AWS SigV4 documentation
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            HEXLOWER.encode(&key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_authorization_known_answer() {
        let storage = S3Storage::new(config(None)).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
        let payload_hash = sha256_hex(b"hello");
        assert_eq!(
            payload_hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        let path = storage.object_path("course_files/week 1.pdf");
        let auth = storage.authorization(&Method::PUT, &path, &payload_hash, now).unwrap();
        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 \
             Credential=AKIDEXAMPLE/20250901/eu-west-1/s3/aws4_request, \
             SignedHeaders=host;x-amz-content-sha256;x-amz-date, \
             Signature=dfc8423af7fad7a639e602cbdc8d74e82506d6054f2b8e5901a50da9f856d520"
        );
    }

    #[test]
    fn test_signature_depends_on_request() {
        let storage = S3Storage::new(config(None)).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
        let hash = sha256_hex(b"");
        let a = storage.authorization(&Method::HEAD, "/materials/a.pdf", &hash, now).unwrap();
        let b = storage.authorization(&Method::DELETE, "/materials/a.pdf", &hash, now).unwrap();
        let c = storage.authorization(&Method::HEAD, "/materials/a.pdf", &hash, now).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
