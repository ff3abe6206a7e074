use base64::{engine::general_purpose, Engine as _};

use crate::chapters::reorder;
use crate::error::ApiError;
use crate::objects::{Bucket, ObjectStore};
use crate::types::PageUpload;

const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024; // 5MB per page

/// One staged page: validated bytes waiting for commit.
#[derive(Debug, Clone)]
pub struct PendingPage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PendingPage {
    fn extension(&self) -> &str {
        self.file_name.split('.').last().unwrap_or("jpg")
    }
}

/// A chapter being composed: pages accumulate and stay reorderable until
/// commit uploads them and hands the URL list to the chapter list manager.
#[derive(Debug, Default)]
pub struct PendingChapter {
    pages: Vec<PendingPage>,
}

impl PendingChapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Validate and stage one file. Every rejection names its reason — a bad
    /// file fails the request loudly instead of being dropped from the batch.
    pub fn stage(&mut self, file: &PageUpload) -> Result<(), ApiError> {
        if !file.content_type.starts_with("image/") {
            return Err(ApiError::Rejected {
                reason: format!(
                    "{}: content type {} is not an image",
                    file.file_name, file.content_type
                ),
            });
        }

        let bytes = general_purpose::STANDARD
            .decode(&file.file_data)
            .map_err(|e| ApiError::Rejected {
                reason: format!("{}: invalid base64 payload: {}", file.file_name, e),
            })?;

        if bytes.len() > MAX_PAGE_BYTES {
            return Err(ApiError::Rejected {
                reason: format!(
                    "{}: {} bytes exceeds the 5MB page limit",
                    file.file_name,
                    bytes.len()
                ),
            });
        }

        if image::guess_format(&bytes).is_err() {
            return Err(ApiError::Rejected {
                reason: format!("{}: payload is not a recognizable image", file.file_name),
            });
        }

        self.pages.push(PendingPage {
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            bytes,
        });
        Ok(())
    }

    /// Reorder staged pages, exactly the drag-and-drop move the admin UI
    /// records.
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), ApiError> {
        self.pages = reorder(&self.pages, from, to)?;
        Ok(())
    }

    /// Upload every staged page and return the public URLs in staged order.
    ///
    /// Keys follow `series/{id}/chapter-{number}/{timestamp}_{index}_{random}.{ext}`;
    /// the index component ties the URL order to staging order no matter how
    /// the store sequences the writes. All-or-nothing: a failed upload rolls
    /// back whatever this batch already stored and reports the failing index,
    /// so the chapter list is only ever appended after a complete batch.
    pub async fn commit(
        self,
        objects: &impl ObjectStore,
        series_id: &str,
        chapter_number: u32,
    ) -> Result<Vec<String>, ApiError> {
        if self.pages.is_empty() {
            return Err(ApiError::EmptyChapter);
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut urls = Vec::with_capacity(self.pages.len());
        let mut uploaded_keys: Vec<String> = Vec::with_capacity(self.pages.len());

        for (index, page) in self.pages.iter().enumerate() {
            let random = uuid::Uuid::new_v4().simple().to_string();
            let key = format!(
                "series/{}/chapter-{}/{}_{}_{}.{}",
                series_id,
                chapter_number,
                timestamp,
                index,
                &random[..8],
                page.extension()
            );

            match objects
                .put(Bucket::Pages, &key, page.bytes.clone(), &page.content_type)
                .await
            {
                Ok(url) => {
                    urls.push(url);
                    uploaded_keys.push(key);
                }
                Err(e) => {
                    tracing::error!(
                        "page upload {} of {} failed for series {}: {}",
                        index + 1,
                        self.pages.len(),
                        series_id,
                        e
                    );
                    if !uploaded_keys.is_empty() {
                        if let Err(cleanup) = objects.delete(Bucket::Pages, &uploaded_keys).await {
                            tracing::warn!(
                                "rollback of {} uploaded pages failed: {}",
                                uploaded_keys.len(),
                                cleanup
                            );
                        }
                    }
                    return Err(ApiError::UploadFailed {
                        index,
                        cause: e.to_string(),
                    });
                }
            }
        }

        Ok(urls)
    }
}

/// Upload a cover image and return its public URL. Same staging rules as
/// chapter pages, covers bucket, per-series prefix.
pub async fn upload_cover(
    objects: &impl ObjectStore,
    series_id: &str,
    file_name: &str,
    content_type: &str,
    file_data: &str,
) -> Result<String, ApiError> {
    let mut staging = PendingChapter::new();
    staging.stage(&PageUpload {
        file_name: file_name.to_string(),
        content_type: content_type.to_string(),
        file_data: file_data.to_string(),
    })?;
    let page = staging.pages.remove(0);

    let random = uuid::Uuid::new_v4().simple().to_string();
    let key = format!(
        "covers/{}/{}_{}.{}",
        series_id,
        chrono::Utc::now().timestamp_millis(),
        &random[..8],
        page.extension()
    );
    objects
        .put(Bucket::Covers, &key, page.bytes, content_type)
        .await
}
