use crate::error::ApiError;
use crate::types::{Profile, Series};

/// Sort order for the public catalog listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOrder {
    CreatedAt,
    UpdatedAt,
    Title,
}

impl SeriesOrder {
    /// Parse the `order_by` query parameter; unknown values fall back to
    /// creation order.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("updated_at") => SeriesOrder::UpdatedAt,
            Some("title") => SeriesOrder::Title,
            _ => SeriesOrder::CreatedAt,
        }
    }

    /// Sort in place: newest-first for timestamps, alphabetical for titles.
    pub fn sort(&self, series: &mut [Series]) {
        match self {
            SeriesOrder::CreatedAt => {
                series.sort_by(|a, b| b.created_at.cmp(&a.created_at))
            }
            SeriesOrder::UpdatedAt => {
                series.sort_by(|a, b| b.updated_at.cmp(&a.updated_at))
            }
            SeriesOrder::Title => series.sort_by(|a, b| a.title.cmp(&b.title)),
        }
    }
}

/// Series persistence seam. The external store is the sole arbiter of
/// consistency; `put` is a compare-and-swap on the row's version counter so
/// two sessions editing the same series cannot silently clobber each other.
pub trait SeriesStore: Send + Sync {
    /// Insert a new row. Fails `Storage` if the id already exists.
    fn insert(
        &self,
        series: &Series,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    fn get(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Series>, ApiError>> + Send;

    /// All rows, sorted by the caller's choice.
    fn list(
        &self,
        order: SeriesOrder,
    ) -> impl std::future::Future<Output = Result<Vec<Series>, ApiError>> + Send;

    /// Full-row replacement guarded by the version the caller read:
    /// `Conflict` if the stored version no longer equals `expected_version`,
    /// `NotFound` if the row vanished.
    fn put(
        &self,
        series: &Series,
        expected_version: u64,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    fn delete(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}

/// Profile persistence seam, read on every admin authorization check.
pub trait ProfileStore: Send + Sync {
    fn insert(
        &self,
        profile: &Profile,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    fn get(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Profile>, ApiError>> + Send;

    /// Username is the only self-serviceable field; role changes are
    /// out-of-band by design.
    fn set_username(
        &self,
        user_id: &str,
        username: &str,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}
