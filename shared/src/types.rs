use serde::{Deserialize, Serialize};

// ========== SERIES ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Ongoing,
    Completed,
    Hiatus,
}

impl Default for SeriesStatus {
    fn default() -> Self {
        SeriesStatus::Ongoing
    }
}

impl SeriesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesStatus::Ongoing => "ongoing",
            SeriesStatus::Completed => "completed",
            SeriesStatus::Hiatus => "hiatus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(SeriesStatus::Ongoing),
            "completed" => Some(SeriesStatus::Completed),
            "hiatus" => Some(SeriesStatus::Hiatus),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Series {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: SeriesStatus,
    pub cover_url: String,
    /// Embedded ordered chapter list. Deliberately denormalized: there is no
    /// chapter table, every mutation replaces this whole list.
    pub chapters: Vec<Chapter>,
    /// Optimistic-concurrency counter. Every write presents the version it
    /// read; a mismatch at the store means a concurrent writer won.
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSeriesRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<SeriesStatus>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSeriesRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<SeriesStatus>,
}

// ========== CHAPTER ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Chapter {
    /// Always the 1-based position within the series at the time of last
    /// write. Not a stable identifier: deletion renumbers the survivors.
    pub number: u32,
    pub title: String,
    pub uploaded_at: String,
    /// Page URLs in reading order, preserved exactly as submitted.
    pub pages: Vec<String>,
    pub page_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateChapterRequest {
    pub title: Option<String>,
    pub pages: Vec<PageUpload>,
    /// Drag-and-drop move log recorded while composing the chapter,
    /// applied to the staged list in order before commit.
    #[serde(default)]
    pub moves: Vec<PageMove>,
}

#[derive(Debug, Deserialize)]
pub struct PageUpload {
    pub file_name: String,
    pub content_type: String,
    pub file_data: String, // base64 encoded
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PageMove {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Deserialize)]
pub struct UploadCoverRequest {
    pub file_name: String,
    pub content_type: String,
    pub file_data: String, // base64 encoded
}

/// Reader view of one chapter, addressed by 1-based position.
#[derive(Debug, Serialize)]
pub struct ChapterView {
    pub series_id: String,
    pub series_title: String,
    pub chapter: Chapter,
    pub total_chapters: usize,
}

// ========== PROFILE ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Lector,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Lector => "lector",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "lector" => Some(Role::Lector),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Never self-assignable: no exposed operation accepts a role. Changing
    /// it is an out-of-band operation against the table.
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
}
