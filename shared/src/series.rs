use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::authz::{authorize, RequiredRole, Session};
use crate::error::ApiError;
use crate::objects::{parse_bucket_and_key, Bucket, ObjectStore};
use crate::store::{ProfileStore, SeriesOrder, SeriesStore};
use crate::types::{CreateSeriesRequest, Series, UpdateSeriesRequest, UploadCoverRequest};
use crate::uploads;

fn json_response(status: StatusCode, body: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(body.into())
        .map_err(Box::new)?)
}

/// POST /series — create a series with an empty chapter list.
pub async fn create_series(
    series_store: &impl SeriesStore,
    profiles: &impl ProfileStore,
    session: Option<&Session>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    if let Err(e) = authorize(profiles, session, RequiredRole::Admin).await {
        return e.into_response();
    }

    let req: CreateSeriesRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return ApiError::Validation(format!("invalid request body: {}", e)).into_response()
        }
    };

    if req.title.trim().is_empty() {
        return ApiError::Validation("title must not be empty".to_string()).into_response();
    }

    let now = chrono::Utc::now().to_rfc3339();
    let series = Series {
        id: uuid::Uuid::new_v4().to_string(),
        title: req.title,
        description: req.description,
        status: req.status.unwrap_or_default(),
        cover_url: req.cover_url.unwrap_or_default(),
        chapters: Vec::new(),
        version: 1,
        created_at: now.clone(),
        updated_at: now,
    };

    if let Err(e) = series_store.insert(&series).await {
        return e.into_response();
    }

    tracing::info!("created series {} ({})", series.id, series.title);
    json_response(StatusCode::CREATED, serde_json::to_string(&series)?)
}

/// GET /series — the public catalog, caller-specified sort.
pub async fn list_series(
    series_store: &impl SeriesStore,
    order_by: Option<&str>,
) -> Result<Response<Body>, Error> {
    let order = SeriesOrder::parse(order_by);
    match series_store.list(order).await {
        Ok(all) => json_response(StatusCode::OK, serde_json::to_string(&all)?),
        Err(e) => e.into_response(),
    }
}

/// GET /series/{id} — public series detail.
pub async fn get_series(
    series_store: &impl SeriesStore,
    series_id: &str,
) -> Result<Response<Body>, Error> {
    match series_store.get(series_id).await {
        Ok(Some(series)) => json_response(StatusCode::OK, serde_json::to_string(&series)?),
        Ok(None) => ApiError::NotFound("series").into_response(),
        Err(e) => e.into_response(),
    }
}

/// PATCH /series/{id} — partial update of title/description/status.
pub async fn update_series(
    series_store: &impl SeriesStore,
    profiles: &impl ProfileStore,
    session: Option<&Session>,
    series_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    if let Err(e) = authorize(profiles, session, RequiredRole::Admin).await {
        return e.into_response();
    }

    let req: UpdateSeriesRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return ApiError::Validation(format!("invalid request body: {}", e)).into_response()
        }
    };

    let series = match series_store.get(series_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return ApiError::NotFound("series").into_response(),
        Err(e) => return e.into_response(),
    };

    let mut updated = series.clone();
    if let Some(title) = req.title {
        if title.trim().is_empty() {
            return ApiError::Validation("title must not be empty".to_string()).into_response();
        }
        updated.title = title;
    }
    if let Some(description) = req.description {
        updated.description = description;
    }
    if let Some(status) = req.status {
        updated.status = status;
    }
    updated.updated_at = chrono::Utc::now().to_rfc3339();
    updated.version = series.version + 1;

    if let Err(e) = series_store.put(&updated, series.version).await {
        return e.into_response();
    }

    json_response(StatusCode::OK, serde_json::to_string(&updated)?)
}

/// DELETE /series/{id} — drop the row, then sweep its stored objects.
pub async fn delete_series(
    series_store: &impl SeriesStore,
    profiles: &impl ProfileStore,
    objects: &impl ObjectStore,
    session: Option<&Session>,
    series_id: &str,
) -> Result<Response<Body>, Error> {
    if let Err(e) = authorize(profiles, session, RequiredRole::Admin).await {
        return e.into_response();
    }

    let series = match series_store.get(series_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return ApiError::NotFound("series").into_response(),
        Err(e) => return e.into_response(),
    };

    if let Err(e) = series_store.delete(series_id).await {
        return e.into_response();
    }

    // Row is gone; asset cleanup is best effort and never fails the action.
    let prefix = format!("series/{}/", series_id);
    if let Err(e) = objects.delete_prefix(Bucket::Pages, &prefix).await {
        tracing::warn!("failed to sweep pages of deleted series {}: {}", series_id, e);
    }
    if let Some((_, cover_key)) = parse_bucket_and_key(&series.cover_url) {
        if let Err(e) = objects.delete(Bucket::Covers, &[cover_key]).await {
            tracing::warn!("failed to delete cover of series {}: {}", series_id, e);
        }
    }

    tracing::info!(
        "deleted series {} with {} chapters",
        series_id,
        series.chapters.len()
    );
    json_response(
        StatusCode::OK,
        serde_json::json!({"message": "series deleted"}).to_string(),
    )
}

/// POST /series/{id}/cover — upload a cover image and stamp `cover_url`.
pub async fn upload_cover(
    series_store: &impl SeriesStore,
    profiles: &impl ProfileStore,
    objects: &impl ObjectStore,
    session: Option<&Session>,
    series_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    if let Err(e) = authorize(profiles, session, RequiredRole::Admin).await {
        return e.into_response();
    }

    let req: UploadCoverRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return ApiError::Validation(format!("invalid request body: {}", e)).into_response()
        }
    };

    let series = match series_store.get(series_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return ApiError::NotFound("series").into_response(),
        Err(e) => return e.into_response(),
    };

    let old_cover = series.cover_url.clone();
    let url = match uploads::upload_cover(
        objects,
        series_id,
        &req.file_name,
        &req.content_type,
        &req.file_data,
    )
    .await
    {
        Ok(url) => url,
        Err(e) => return e.into_response(),
    };

    let mut updated = series.clone();
    updated.cover_url = url;
    updated.updated_at = chrono::Utc::now().to_rfc3339();
    updated.version = series.version + 1;

    if let Err(e) = series_store.put(&updated, series.version).await {
        return e.into_response();
    }

    // Replaced covers would otherwise accumulate forever.
    if let Some((_, old_key)) = parse_bucket_and_key(&old_cover) {
        if let Err(e) = objects.delete(Bucket::Covers, &[old_key]).await {
            tracing::warn!("failed to delete replaced cover of {}: {}", series_id, e);
        }
    }

    json_response(StatusCode::OK, serde_json::to_string(&updated)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryObjectStore, MemoryStore};
    use crate::types::{Profile, Role, SeriesStatus};
    use base64::{engine::general_purpose, Engine as _};

    fn admin_store() -> MemoryStore {
        MemoryStore::new().with_profile(Profile {
            id: "admin1".into(),
            username: "admin1".into(),
            email: "admin@test.dev".into(),
            role: Role::Admin,
            created_at: "2026-01-01T00:00:00Z".into(),
        })
    }

    fn admin_session() -> Session {
        Session {
            user_id: "admin1".into(),
        }
    }

    fn body(v: serde_json::Value) -> Vec<u8> {
        v.to_string().into_bytes()
    }

    async fn create(store: &MemoryStore, title: &str) -> Series {
        let resp = create_series(
            store,
            store,
            Some(&admin_session()),
            &body(serde_json::json!({"title": title})),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        serde_json::from_slice(&resp.body().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn create_defaults_status_and_empty_chapters() {
        let store = admin_store();
        let series = create(&store, "Solo Leveling").await;
        assert_eq!(series.status, SeriesStatus::Ongoing);
        assert!(series.chapters.is_empty());
        assert_eq!(series.version, 1);
    }

    #[tokio::test]
    async fn create_rejects_empty_title() {
        let store = admin_store();
        let resp = create_series(
            &store,
            &store,
            Some(&admin_session()),
            &body(serde_json::json!({"title": "   "})),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_requires_admin() {
        let store = MemoryStore::new().with_profile(Profile {
            id: "reader".into(),
            username: "reader".into(),
            email: "reader@test.dev".into(),
            role: Role::Lector,
            created_at: "2026-01-01T00:00:00Z".into(),
        });
        let resp = create_series(
            &store,
            &store,
            Some(&Session {
                user_id: "reader".into(),
            }),
            &body(serde_json::json!({"title": "A"})),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = create_series(&store, &store, None, &body(serde_json::json!({"title": "A"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_is_partial_and_bumps_version() {
        let store = admin_store();
        let series = create(&store, "Tower of God").await;

        let resp = update_series(
            &store,
            &store,
            Some(&admin_session()),
            &series.id,
            &body(serde_json::json!({"status": "completed"})),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: Series = serde_json::from_slice(&resp.body().to_vec()).unwrap();
        assert_eq!(updated.title, "Tower of God");
        assert_eq!(updated.status, SeriesStatus::Completed);
        assert_eq!(updated.version, 2);
        assert!(updated.updated_at >= series.updated_at);
    }

    #[tokio::test]
    async fn update_missing_series_is_not_found() {
        let store = admin_store();
        let resp = update_series(
            &store,
            &store,
            Some(&admin_session()),
            "nope",
            &body(serde_json::json!({"title": "X"})),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_sorts_by_title_on_request() {
        let store = admin_store();
        create(&store, "Beta").await;
        create(&store, "Alpha").await;

        let resp = list_series(&store, Some("title")).await.unwrap();
        let all: Vec<Series> = serde_json::from_slice(&resp.body().to_vec()).unwrap();
        let titles: Vec<&str> = all.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn delete_sweeps_series_assets() {
        let store = admin_store();
        let objects = MemoryObjectStore::new();
        let series = create(&store, "Gone").await;

        objects
            .put(
                Bucket::Pages,
                &format!("series/{}/chapter-1/p.png", series.id),
                vec![1],
                "image/png",
            )
            .await
            .unwrap();

        let resp = delete_series(&store, &store, &objects, Some(&admin_session()), &series.id)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(store.series_snapshot(&series.id).is_none());
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn cover_upload_stamps_url() {
        let store = admin_store();
        let objects = MemoryObjectStore::new();
        let series = create(&store, "Covered").await;

        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.resize(64, 0);
        let resp = upload_cover(
            &store,
            &store,
            &objects,
            Some(&admin_session()),
            &series.id,
            &body(serde_json::json!({
                "file_name": "cover.png",
                "content_type": "image/png",
                "file_data": general_purpose::STANDARD.encode(&png),
            })),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: Series = serde_json::from_slice(&resp.body().to_vec()).unwrap();
        assert!(updated.cover_url.contains(&format!("covers/{}/", series.id)));
        assert_eq!(objects.len(), 1);
    }
}
