use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::error::ApiError;

/// Logical buckets: one for series covers, one for chapter pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Covers,
    Pages,
}

impl Bucket {
    fn env_var(&self) -> &'static str {
        match self {
            Bucket::Covers => "COVERS_BUCKET",
            Bucket::Pages => "PAGES_BUCKET",
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            Bucket::Covers => "manhwa-covers",
            Bucket::Pages => "manhwa-chapters",
        }
    }

    pub fn name(&self) -> String {
        std::env::var(self.env_var()).unwrap_or_else(|_| self.default_name().to_string())
    }
}

/// Object storage seam: put returns a stable public URL, deletes are used by
/// the cascading cleanup paths.
pub trait ObjectStore: Send + Sync {
    fn put(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<String, ApiError>> + Send;

    fn delete(
        &self,
        bucket: Bucket,
        keys: &[String],
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    /// Delete every object under `prefix`.
    fn delete_prefix(
        &self,
        bucket: Bucket,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}

/// Parse bucket and key out of a stored public URL, handling both
/// `https://bucket.s3.amazonaws.com/key` and
/// `https://s3.<region>.amazonaws.com/bucket/key`.
pub fn parse_bucket_and_key(url: &str) -> Option<(String, String)> {
    let no_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let (host, path) = no_scheme.split_once('/')?;

    if host.starts_with("s3.") {
        let (bucket, key) = path.split_once('/')?;
        Some((bucket.to_string(), key.to_string()))
    } else {
        let bucket = host.split(".s3").next()?;
        if bucket == host {
            return None;
        }
        Some((bucket.to_string(), path.to_string()))
    }
}

/// S3-backed object store.
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ApiError> {
        let bucket_name = bucket.name();
        self.client
            .put_object()
            .bucket(&bucket_name)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("failed to upload to S3: {}", e)))?;

        Ok(format!("https://{}.s3.amazonaws.com/{}", bucket_name, key))
    }

    async fn delete(&self, bucket: Bucket, keys: &[String]) -> Result<(), ApiError> {
        if keys.is_empty() {
            return Ok(());
        }
        let bucket_name = bucket.name();

        let objects: Vec<_> = keys
            .iter()
            .filter_map(|k| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .ok()
            })
            .collect();

        let delete_payload = aws_sdk_s3::types::Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| ApiError::Storage(format!("failed to build delete payload: {:?}", e)))?;

        self.client
            .delete_objects()
            .bucket(&bucket_name)
            .delete(delete_payload)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("S3 delete failed: {}", e)))?;
        Ok(())
    }

    async fn delete_prefix(&self, bucket: Bucket, prefix: &str) -> Result<(), ApiError> {
        let bucket_name = bucket.name();

        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&bucket_name)
                .prefix(prefix);
            if let Some(token) = continuation.as_ref() {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(|e| {
                tracing::error!("S3 list_objects_v2 failed for prefix {}: {}", prefix, e);
                ApiError::Storage(format!("S3 list failed: {}", e))
            })?;

            let keys: Vec<String> = resp
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .map(|k| k.to_string())
                .collect();
            if !keys.is_empty() {
                self.delete(bucket, &keys).await?;
            }

            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_virtual_hosted_urls() {
        let (bucket, key) = parse_bucket_and_key(
            "https://manhwa-chapters.s3.amazonaws.com/series/s1/chapter-1/page.png",
        )
        .unwrap();
        assert_eq!(bucket, "manhwa-chapters");
        assert_eq!(key, "series/s1/chapter-1/page.png");
    }

    #[test]
    fn parses_path_style_urls() {
        let (bucket, key) =
            parse_bucket_and_key("https://s3.us-east-1.amazonaws.com/manhwa-covers/covers/x.jpg")
                .unwrap();
        assert_eq!(bucket, "manhwa-covers");
        assert_eq!(key, "covers/x.jpg");
    }

    #[test]
    fn rejects_non_s3_urls() {
        assert!(parse_bucket_and_key("not a url").is_none());
        assert!(parse_bucket_and_key("https://example.com/file.png").is_none());
    }
}
