use crate::http::HttpHandle;
use crate::options::UpdaterOptions;
use emote_animation::Catalog;
use emote_storage::AssetStore;
use std::sync::Arc;

/// Everything an update attempt touches, built once at the process root.
#[derive(Clone)]
pub struct Context {
    pub store: AssetStore,
    pub catalog: Arc<Catalog>,
    pub http: HttpHandle,
    pub options: Arc<UpdaterOptions>,
}

impl Context {
    pub fn new(store: AssetStore, catalog: Arc<Catalog>, http: HttpHandle, options: UpdaterOptions) -> Self {
        Self { store, catalog, http, options: Arc::new(options) }
    }
}
