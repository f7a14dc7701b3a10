//! Assembles admission-core components from [`AppConfig`] and live clients.

use std::sync::Arc;

use admission_core::admission::{
    ContentRewriter, OracleContentRewriter, OracleSourceFinder, RepairDispatcher, SourceFinder,
};
use admission_core::{
    AdmissionEngine, ConsensusScorer, InMemoryNoteStore, LanguageOracle, MisleadingTag,
    NotePipeline, NoteStore, Panel, PipelineReport, PlatformEvaluator, PlatformSubmitter, Post,
    Refiner, SubmissionGateway, TagSelector,
};
use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::clients::{GrokOracle, XPlatformClient};
use crate::config::AppConfig;
use crate::telemetry::{append_run, RunRecord};
use crate::url_probe::HttpUrlProbe;

/// Live collaborators. The oracle is optional: without it practice has
/// no fallback and tagging uses the configured fallback tag.
pub struct Runtime {
    pub config: AppConfig,
    pub oracle: Option<Arc<dyn LanguageOracle>>,
    pub platform: Arc<XPlatformClient>,
}

impl Runtime {
    /// Connect to the configured endpoints. Platform credentials are required.
    pub fn connect(config: AppConfig) -> Result<Self> {
        let timeouts = &config.engine.timeouts;
        let platform = XPlatformClient::new(&config.x, timeouts.platform())
            .context("Failed to create X platform client")?;
        let oracle = match GrokOracle::new(&config.grok, timeouts.oracle()) {
            Ok(oracle) => {
                info!(model = %config.grok.model, "language oracle configured");
                Some(Arc::new(oracle) as Arc<dyn LanguageOracle>)
            }
            Err(e) => {
                warn!("language oracle disabled: {e}");
                None
            }
        };
        Ok(Self {
            config,
            oracle,
            platform: Arc::new(platform),
        })
    }

    pub fn engine(&self) -> Result<AdmissionEngine> {
        let submitter: Arc<dyn PlatformSubmitter> = self.platform.clone();
        let evaluator: Arc<dyn PlatformEvaluator> = self.platform.clone();
        build_engine(&self.config, self.oracle.clone(), evaluator, submitter)
    }

    pub fn tag_selector(&self) -> TagSelector {
        let engine = &self.config.engine;
        TagSelector::new(
            self.oracle.clone(),
            engine.tags.fallback,
            engine.timeouts.oracle(),
        )
    }

    /// The full pipeline. Consensus and refinement need the oracle.
    pub fn pipeline(&self, store: Arc<dyn NoteStore>) -> Result<NotePipeline> {
        let oracle = self
            .oracle
            .clone()
            .context("Pipeline runs need GROK_API_KEY or XAI_API_KEY")?;
        let engine = &self.config.engine;
        let scorer = ConsensusScorer::new(
            &Panel::default(),
            oracle.clone(),
            engine.consensus.clone(),
            &engine.timeouts,
        );
        let refiner = Refiner::new(oracle, engine.timeouts.oracle());
        Ok(NotePipeline::new(
            scorer,
            refiner,
            self.engine()?,
            self.tag_selector(),
            store,
            engine.refine.clone(),
            engine.pipeline.clone(),
        ))
    }
}

/// Engine wiring shared by the CLI and tests.
pub fn build_engine(
    config: &AppConfig,
    oracle: Option<Arc<dyn LanguageOracle>>,
    evaluator: Arc<dyn PlatformEvaluator>,
    submitter: Arc<dyn PlatformSubmitter>,
) -> Result<AdmissionEngine> {
    let engine = &config.engine;
    let timeouts = &engine.timeouts;
    let gateway = SubmissionGateway::new(
        submitter,
        engine.submission.clone(),
        engine
            .tags
            .fallback
            .unwrap_or(MisleadingTag::MissingImportantContext),
        timeouts.platform(),
    );

    let probe = HttpUrlProbe::new(timeouts.url_probe()).context("Failed to create URL probe")?;
    let (finder, rewriter) = match &oracle {
        Some(oracle) => (
            Some(Arc::new(
                OracleSourceFinder::new(oracle.clone(), timeouts.oracle())
                    .with_probe(Arc::new(probe), timeouts.url_probe()),
            ) as Arc<dyn SourceFinder>),
            Some(Arc::new(OracleContentRewriter::new(oracle.clone(), timeouts.oracle()))
                as Arc<dyn ContentRewriter>),
        ),
        None => (None, None),
    };

    let mut admission = AdmissionEngine::new(gateway, engine.admission.clone(), timeouts.clone())
        .with_evaluator(evaluator)
        .with_repair(RepairDispatcher::new(finder, rewriter, timeouts.oracle()))
        .with_test_mode(engine.pipeline.test_mode);
    if let Some(oracle) = oracle {
        admission = admission.with_oracle(oracle);
    }
    Ok(admission)
}

/// Load the snapshot store at `path`, or start empty when it does not exist yet.
pub fn open_store(config: &AppConfig) -> Result<Arc<InMemoryNoteStore>> {
    match &config.store_path {
        Some(path) if path.exists() => {
            let store = InMemoryNoteStore::load_from(path)
                .with_context(|| format!("Failed to load note store {}", path.display()))?;
            info!(path = %path.display(), drafts = store.draft_count(), "loaded note store");
            Ok(Arc::new(store))
        }
        _ => Ok(Arc::new(InMemoryNoteStore::new())),
    }
}

/// Write the store back to its snapshot path, if one is configured.
pub fn save_store(config: &AppConfig, store: &InMemoryNoteStore) -> Result<()> {
    if let Some(path) = &config.store_path {
        store
            .save_to(path)
            .with_context(|| format!("Failed to save note store {}", path.display()))?;
        info!(path = %path.display(), drafts = store.draft_count(), "saved note store");
    }
    Ok(())
}

/// Run the pipeline and save the store whether or not the run succeeds.
/// Stages completed before a failure stay in the snapshot. Only finished
/// runs are appended to the run log.
pub async fn run_and_persist(
    pipeline: &NotePipeline,
    store: &InMemoryNoteStore,
    config: &AppConfig,
    post: &Post,
    writer: &str,
    note: &str,
) -> Result<PipelineReport> {
    match pipeline.run(post, writer, note).await {
        Ok(report) => {
            append_run(&RunRecord::from_report(&report), &config.telemetry_path);
            save_store(config, store)?;
            Ok(report)
        }
        Err(e) => {
            error!(post_id = %post.id, drafts = store.draft_count(), "pipeline failed: {e}");
            if let Err(save_err) = save_store(config, store) {
                warn!("{save_err:#}");
            }
            Err(e).context("Pipeline run failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admission_core::Draft;

    fn config_with_store(path: Option<std::path::PathBuf>) -> AppConfig {
        let mut config = AppConfig::from_lookup(|_| None);
        config.store_path = path;
        config
    }

    #[test]
    fn test_store_starts_empty_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_store(Some(dir.path().join("store.json")));

        let store = open_store(&config).unwrap();
        assert_eq!(store.draft_count(), 0);
        store.create_draft(&Draft::new("w", "42", "A note")).unwrap();
        save_store(&config, &store).unwrap();

        assert_eq!(open_store(&config).unwrap().draft_count(), 1);
    }

    #[test]
    fn test_save_without_path_is_noop() {
        let config = config_with_store(None);
        let store = open_store(&config).unwrap();
        save_store(&config, &store).unwrap();
    }

    #[test]
    fn test_connect_requires_platform_credentials() {
        assert!(Runtime::connect(AppConfig::from_lookup(|_| None)).is_err());
    }

    #[test]
    fn test_pipeline_requires_oracle() {
        let config = AppConfig::from_lookup(|name| {
            (name == "X_BEARER_TOKEN").then(|| "bearer".to_string())
        });
        let runtime = Runtime::connect(config).unwrap();
        assert!(runtime.oracle.is_none());
        assert!(runtime.pipeline(Arc::new(InMemoryNoteStore::new())).is_err());
    }
}
