//! Course materials: document uploads and videos

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document attached to a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Upload {
    pub id: i64,
    pub title: String,
    pub course_id: i64,
    pub module_number: i32,
    /// Storage key, e.g. `course_files/<uuid>.pdf`
    pub file_path: String,
    pub is_available: bool,
    pub upload_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Upload {
    /// Lowercased extension of the stored file
    pub fn extension(&self) -> String {
        extension_of(&self.file_path)
    }

    /// Coarse file classification used for icons
    pub fn kind(&self) -> FileKind {
        FileKind::from_extension(&self.extension())
    }
}

/// Video attached to a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadVideo {
    pub id: i64,
    pub title: String,
    /// Unique slug
    pub slug: String,
    pub course_id: i64,
    pub module_number: i32,
    pub video_path: String,
    pub is_available: bool,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Row to insert for a new upload
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub title: String,
    pub course_id: i64,
    pub module_number: i32,
    pub file_path: String,
    pub is_available: bool,
}

/// Row to insert for a new video
#[derive(Debug, Clone)]
pub struct NewUploadVideo {
    pub title: String,
    pub slug: String,
    pub course_id: i64,
    pub module_number: i32,
    pub video_path: String,
    pub is_available: bool,
    pub summary: String,
}

/// Editable material metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialUpdate {
    pub title: Option<String>,
    pub module_number: Option<i32>,
    pub is_available: Option<bool>,
    pub summary: Option<String>,
}

/// Material type discriminator stored on progress rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    File,
    Video,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::File => "file",
            MaterialKind::Video => "video",
        }
    }

    /// Storage directory for this kind
    pub fn directory(&self) -> &'static str {
        match self {
            MaterialKind::File => "course_files",
            MaterialKind::Video => "course_videos",
        }
    }

    /// Accepted upload extensions
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MaterialKind::File => &[
                "pdf", "docx", "doc", "xls", "xlsx", "ppt", "pptx", "zip", "rar", "7zip",
            ],
            MaterialKind::Video => &["mp4", "mkv", "wmv", "3gp", "f4v", "avi", "mp3"],
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(MaterialKind::File),
            "video" => Ok(MaterialKind::Video),
            _ => Err(anyhow::anyhow!("Invalid material type: {}", s)),
        }
    }
}

/// File classification by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Word,
    Pdf,
    Excel,
    Powerpoint,
    Archive,
    File,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "doc" | "docx" => FileKind::Word,
            "pdf" => FileKind::Pdf,
            "xls" | "xlsx" => FileKind::Excel,
            "ppt" | "pptx" => FileKind::Powerpoint,
            "zip" | "rar" | "7zip" => FileKind::Archive,
            _ => FileKind::File,
        }
    }
}

/// Lowercased extension of a path or filename, empty if none
pub fn extension_of(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}
