use std::{path::PathBuf, sync::Arc};

use generator::{GeneratorClient, Orchestrator};
use services::services::{chat::ChatService, image::ImageService, site::SiteService};
use store::DocumentStore;

pub mod error;
pub mod http;
pub mod routes;

/// Everything a request handler needs: the controllers, sharing one
/// document store and one generator client. Injected as axum state —
/// no ambient globals.
#[derive(Clone)]
pub struct AppState {
    chat: ChatService,
    site: SiteService,
    image: ImageService,
    site_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(
        store: DocumentStore,
        client: Arc<dyn GeneratorClient>,
        site_dir: PathBuf,
        uploads_dir: PathBuf,
    ) -> Self {
        let orchestrator = Orchestrator::new(client);
        Self {
            chat: ChatService::new(store.clone(), orchestrator.clone()),
            site: SiteService::new(store.clone(), orchestrator.clone(), site_dir.clone()),
            image: ImageService::new(store, orchestrator, uploads_dir.clone()),
            site_dir,
            uploads_dir,
        }
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    pub fn site(&self) -> &SiteService {
        &self.site
    }

    pub fn image(&self) -> &ImageService {
        &self.image
    }

    pub fn site_dir(&self) -> &PathBuf {
        &self.site_dir
    }

    pub fn uploads_dir(&self) -> &PathBuf {
        &self.uploads_dir
    }
}
