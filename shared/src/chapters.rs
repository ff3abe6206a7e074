use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::authz::{authorize, RequiredRole, Session};
use crate::error::ApiError;
use crate::objects::{parse_bucket_and_key, Bucket, ObjectStore};
use crate::store::{ProfileStore, SeriesStore};
use crate::types::{Chapter, ChapterView, CreateChapterRequest};
use crate::uploads::PendingChapter;

/// Default title for chapter `number`. A chapter whose title still matches
/// this exact form is treated as untitled and follows its number across
/// renumbering; anything else is an explicit admin title and survives
/// verbatim.
fn default_title(number: u32) -> String {
    format!("Chapter {}", number)
}

/// Append a new chapter at the end of the list.
///
/// The new chapter takes `number = len + 1`; `pages` is trusted to already be
/// in reading order (the upload sequencer owns that ordering).
pub fn append(
    chapters: &[Chapter],
    title: Option<String>,
    pages: Vec<String>,
    uploaded_at: String,
) -> Result<Vec<Chapter>, ApiError> {
    if pages.is_empty() {
        return Err(ApiError::EmptyChapter);
    }

    let number = chapters.len() as u32 + 1;
    let title = match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => default_title(number),
    };

    let mut next = chapters.to_vec();
    next.push(Chapter {
        number,
        title,
        uploaded_at,
        page_count: pages.len(),
        pages,
    });
    Ok(next)
}

/// Remove the chapter at `index` and renumber every survivor so `number`
/// again equals its 1-based position.
///
/// Chapter numbers are not stable identifiers: the reader addresses chapters
/// by position, so the list must stay contiguous and gapless after every
/// deletion. Titles equal to the old default are regenerated for the new
/// number; explicit titles are preserved.
pub fn delete_at(chapters: &[Chapter], index: usize) -> Result<Vec<Chapter>, ApiError> {
    if index >= chapters.len() {
        return Err(ApiError::OutOfRange {
            index,
            len: chapters.len(),
        });
    }

    let mut next = chapters.to_vec();
    next.remove(index);

    for (idx, chapter) in next.iter_mut().enumerate() {
        let position = idx as u32 + 1;
        if chapter.title == default_title(chapter.number) {
            chapter.title = default_title(position);
        }
        chapter.number = position;
    }
    Ok(next)
}

/// Move the element at `from` to position `to`. No-op when `from == to`.
/// Used on page lists while a chapter is being composed, never after publish.
pub fn reorder<T: Clone>(items: &[T], from: usize, to: usize) -> Result<Vec<T>, ApiError> {
    let len = items.len();
    if from >= len {
        return Err(ApiError::OutOfRange { index: from, len });
    }
    if to >= len {
        return Err(ApiError::OutOfRange { index: to, len });
    }

    let mut next = items.to_vec();
    if from != to {
        let moved = next.remove(from);
        next.insert(to, moved);
    }
    Ok(next)
}

/// POST /series/{id}/chapters — stage, upload and append a chapter.
///
/// Every page upload must succeed before the chapter list is touched; a
/// partial failure rolls the batch back and leaves the series unmodified.
pub async fn create_chapter(
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

    let req: CreateChapterRequest = match serde_json::from_slice(body) {
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

    // Stage every file up front so a bad one is rejected before any bytes
    // reach the bucket.
    let mut pending = PendingChapter::new();
    for (idx, file) in req.pages.iter().enumerate() {
        if let Err(e) = pending.stage(file) {
            tracing::info!("rejected page {} of chapter upload: {}", idx, e);
            return e.into_response();
        }
    }
    for mv in &req.moves {
        if let Err(e) = pending.move_page(mv.from, mv.to) {
            return e.into_response();
        }
    }

    let number = series.chapters.len() as u32 + 1;
    let page_urls = match pending.commit(objects, series_id, number).await {
        Ok(urls) => urls,
        Err(e) => return e.into_response(),
    };

    let now = chrono::Utc::now().to_rfc3339();
    let chapters = match append(&series.chapters, req.title, page_urls, now.clone()) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    let mut updated = series.clone();
    updated.chapters = chapters;
    updated.updated_at = now;
    updated.version = series.version + 1;

    if let Err(e) = series_store.put(&updated, series.version).await {
        return e.into_response();
    }

    let chapter = updated
        .chapters
        .last()
        .expect("append always leaves at least one chapter");
    tracing::info!(
        "appended chapter {} ({} pages) to series {}",
        chapter.number,
        chapter.page_count,
        series_id
    );

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(chapter)?.into())
        .map_err(Box::new)?)
}

/// DELETE /series/{id}/chapters/{index} — remove one chapter and renumber.
pub async fn delete_chapter(
    series_store: &impl SeriesStore,
    profiles: &impl ProfileStore,
    objects: &impl ObjectStore,
    session: Option<&Session>,
    series_id: &str,
    index: usize,
) -> Result<Response<Body>, Error> {
    if let Err(e) = authorize(profiles, session, RequiredRole::Admin).await {
        return e.into_response();
    }

    let series = match series_store.get(series_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return ApiError::NotFound("series").into_response(),
        Err(e) => return e.into_response(),
    };

    let chapters = match delete_at(&series.chapters, index) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };
    let removed = &series.chapters[index];

    let mut updated = series.clone();
    updated.chapters = chapters;
    updated.updated_at = chrono::Utc::now().to_rfc3339();
    updated.version = series.version + 1;

    if let Err(e) = series_store.put(&updated, series.version).await {
        return e.into_response();
    }

    // Row committed; sweep the removed chapter's page objects. Keys come from
    // the stored URLs because renumbering never moves objects. Best effort:
    // a failed sweep leaves orphans, never a failed deletion.
    let keys: Vec<String> = removed
        .pages
        .iter()
        .filter_map(|url| parse_bucket_and_key(url))
        .map(|(_, key)| key)
        .collect();
    if !keys.is_empty() {
        if let Err(e) = objects.delete(Bucket::Pages, &keys).await {
            tracing::warn!(
                "failed to delete {} page objects of removed chapter {} in series {}: {}",
                keys.len(),
                removed.number,
                series_id,
                e
            );
        }
    }

    tracing::info!(
        "deleted chapter at index {} from series {}, {} chapters remain",
        index,
        series_id,
        updated.chapters.len()
    );

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&updated)?.into())
        .map_err(Box::new)?)
}

/// GET /series/{id}/chapters/{number} — public reader fetch, 1-based.
pub async fn get_chapter(
    series_store: &impl SeriesStore,
    series_id: &str,
    number: u32,
) -> Result<Response<Body>, Error> {
    let series = match series_store.get(series_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return ApiError::NotFound("series").into_response(),
        Err(e) => return e.into_response(),
    };

    if number == 0 || number as usize > series.chapters.len() {
        return ApiError::NotFound("chapter").into_response();
    }
    let chapter = series.chapters[number as usize - 1].clone();

    let view = ChapterView {
        series_id: series.id,
        series_title: series.title,
        total_chapters: series.chapters.len(),
        chapter,
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&view)?.into())
        .map_err(Box::new)?)
}
