use crate::error::ApiError;
use crate::models::{NewPresentation, Presentation};
use chrono::Local;
use std::sync::Mutex;
use tracing::info;

pub const NAME_REQUIRED: &str = "Presentation name is required";

#[derive(Debug, Default)]
struct Inner {
    presentations: Vec<Presentation>,
    last_id: u64,
}

/// Process-lifetime list of presentations. Ids come from a counter that only
/// grows, so an id is never handed out twice even after deletes.
#[derive(Debug, Default)]
pub struct PresentationStore {
    inner: Mutex<Inner>,
}

impl PresentationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<Presentation> {
        self.lock().presentations.clone()
    }

    pub fn create(&self, request: NewPresentation) -> Result<Presentation, ApiError> {
        let name = request
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ApiError::BadRequest(NAME_REQUIRED))?;

        let now = timestamp();
        let mut inner = self.lock();
        inner.last_id += 1;

        let presentation = Presentation {
            id: inner.last_id,
            name,
            date: request.date.unwrap_or_else(|| now.clone()),
            slides: request.slides.unwrap_or_default(),
            created_at: now,
        };
        inner.presentations.push(presentation.clone());

        info!("Created presentation {} ({})", presentation.id, presentation.name);
        Ok(presentation)
    }

    /// Removes the presentation if present. Deleting an unknown id is a no-op.
    pub fn delete(&self, id: u64) {
        let mut inner = self.lock();
        let before = inner.presentations.len();
        inner.presentations.retain(|p| p.id != id);
        if inner.presentations.len() < before {
            info!("Deleted presentation {}", id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn timestamp() -> String {
    Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
