//! Full-site regeneration. The three generated files always belong to
//! the same generation: they are committed through one atomic batch
//! and a reader never observes an old script next to a new markup.

use std::path::PathBuf;

use generator::{Orchestrator, SiteCode};
use serde_json::Value;
use store::DocumentStore;

use super::{
    ServiceError,
    domain::{
        PROFILE_KEY, SITE_KEY, default_site_code, load_history, load_profile,
        warn_on_dropped_images,
    },
};

pub const MARKUP_FILENAME: &str = "index.html";
pub const STYLE_FILENAME: &str = "style.css";
pub const SCRIPT_FILENAME: &str = "script.js";

#[derive(Clone)]
pub struct SiteService {
    store: DocumentStore,
    orchestrator: Orchestrator,
    /// Directory the three files are materialized into for the live
    /// preview iframe.
    site_dir: PathBuf,
}

impl SiteService {
    pub fn new(store: DocumentStore, orchestrator: Orchestrator, site_dir: PathBuf) -> Self {
        Self {
            store,
            orchestrator,
            site_dir,
        }
    }

    /// Bootstrap placeholder site files if none are stored. Idempotent
    /// and side-effect-free when an artifact already exists.
    pub async fn ensure_defaults(&self) -> Result<(), ServiceError> {
        let _guards = self.store.lock_keys(&[SITE_KEY]).await;
        self.ensure_defaults_locked()
    }

    fn ensure_defaults_locked(&self) -> Result<(), ServiceError> {
        if self.store.get(SITE_KEY)?.is_none() {
            let code = default_site_code();
            self.store.put(SITE_KEY, &serde_json::to_value(&code)?)?;
            self.materialize(&code)?;
        }
        Ok(())
    }

    /// Read profile + history + current code, ask the generator for a
    /// fresh triple, and commit profile and all three files as one
    /// batch. On any failure the prior artifact remains servable.
    pub async fn regenerate(&self) -> Result<(), ServiceError> {
        let _guards = self.store.lock_keys(&[PROFILE_KEY, SITE_KEY]).await;
        self.ensure_defaults_locked()?;

        let profile = load_profile(&self.store)?;
        let history = load_history(&self.store)?;
        let current = self.stored_code()?;

        let envelope = self
            .orchestrator
            .request_regeneration(&profile, &history, &current)
            .await?;

        warn_on_dropped_images(&profile, &envelope.updated_user_profile);
        self.store.put_many(&[
            (PROFILE_KEY, Value::Object(envelope.updated_user_profile)),
            (SITE_KEY, serde_json::to_value(&envelope.updated_code)?),
        ])?;
        self.materialize(&envelope.updated_code)?;
        Ok(())
    }

    /// The current artifact as a filename → content map.
    pub fn site_code(&self) -> Result<Vec<(String, String)>, ServiceError> {
        let code = self.stored_code()?;
        Ok(vec![
            (MARKUP_FILENAME.to_string(), code.markup),
            (STYLE_FILENAME.to_string(), code.style),
            (SCRIPT_FILENAME.to_string(), code.script),
        ])
    }

    fn stored_code(&self) -> Result<SiteCode, ServiceError> {
        match self.store.get(SITE_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(default_site_code()),
        }
    }

    /// Copy the committed triple into the preview directory. The store
    /// document is the source of truth; these files are a derived view
    /// for static serving.
    fn materialize(&self, code: &SiteCode) -> Result<(), ServiceError> {
        std::fs::create_dir_all(&self.site_dir).map_err(store::StoreError::Io)?;
        for (filename, content) in [
            (MARKUP_FILENAME, &code.markup),
            (STYLE_FILENAME, &code.style),
            (SCRIPT_FILENAME, &code.script),
        ] {
            std::fs::write(self.site_dir.join(filename), content)
                .map_err(store::StoreError::Io)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use generator::{GeneratorError, fake::ScriptedGenerator};

    use super::*;

    fn service(fake: ScriptedGenerator) -> SiteService {
        let root = std::env::temp_dir().join(format!("site-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        let site_dir = root.join("portfolio");
        SiteService::new(
            DocumentStore::new(root),
            Orchestrator::new(Arc::new(fake)),
            site_dir,
        )
    }

    fn regeneration_reply() -> String {
        r#"{
            "updatedUserProfile": {"name": "Ada"},
            "updatedCode": {
                "markup": "<html>new</html>",
                "style": "body { color: red; }",
                "script": "console.log('new');"
            }
        }"#
        .to_string()
    }

    #[tokio::test]
    async fn ensure_defaults_is_idempotent() {
        let site = service(ScriptedGenerator::new());
        site.ensure_defaults().await.unwrap();
        let first = site.site_code().unwrap();
        site.ensure_defaults().await.unwrap();
        assert_eq!(site.site_code().unwrap(), first);
        assert!(first[0].1.contains("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn regeneration_commits_all_three_files() {
        let site = service(ScriptedGenerator::new().push_completion(Ok(regeneration_reply())));
        site.regenerate().await.unwrap();

        let files = site.site_code().unwrap();
        assert_eq!(files[0], ("index.html".to_string(), "<html>new</html>".to_string()));
        assert_eq!(files[1].1, "body { color: red; }");
        assert_eq!(files[2].1, "console.log('new');");

        // Preview copies match the committed artifact.
        let preview = std::fs::read_to_string(site.site_dir.join("index.html")).unwrap();
        assert_eq!(preview, "<html>new</html>");
    }

    #[tokio::test]
    async fn failed_regeneration_keeps_prior_artifact_servable() {
        let site = service(
            ScriptedGenerator::new()
                .push_completion(Ok(r#"{"updatedUserProfile": {}}"#.to_string())),
        );
        site.ensure_defaults().await.unwrap();
        let before = site.site_code().unwrap();

        let err = site.regenerate().await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Generator(GeneratorError::Envelope { .. })
        ));
        assert_eq!(site.site_code().unwrap(), before);
    }

    #[tokio::test]
    async fn provider_failure_keeps_prior_artifact() {
        let site = service(
            ScriptedGenerator::new()
                .push_completion(Err(GeneratorError::Provider("down".to_string()))),
        );
        site.ensure_defaults().await.unwrap();
        let before = site.site_code().unwrap();

        assert!(site.regenerate().await.is_err());
        assert_eq!(site.site_code().unwrap(), before);
    }
}
