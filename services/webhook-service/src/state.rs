use std::sync::Arc;

use crate::storage::BlobStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub bucket: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn BlobStore>, bucket: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}
