use std::path::Path;

use rtutor_core::Lesson;

#[derive(Debug, thiserror::Error)]
pub enum LessonLoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_lesson(path: &Path) -> Result<Lesson, LessonLoaderError> {
    let content = std::fs::read_to_string(path)?;
    let lesson: Lesson = serde_json::from_str(&content)?;
    Ok(lesson)
}

/// Every `*.json` lesson in `dir`, sorted by page. Unreadable files are skipped.
pub fn load_all_lessons(dir: &Path) -> Result<Vec<Lesson>, LessonLoaderError> {
    let mut lessons = Vec::new();
    let entries = std::fs::read_dir(dir)?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            match load_lesson(&path) {
                Ok(lesson) => lessons.push(lesson),
                Err(e) => tracing::warn!("Skipping lesson {}: {}", path.display(), e),
            }
        }
    }

    lessons.sort_by(|a, b| a.page.cmp(&b.page));
    Ok(lessons)
}
