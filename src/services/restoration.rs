//! Photo restoration orchestration
//!
//! Drives one uploaded photo from `processing` to a terminal state:
//!
//! 1. Prepare a bounded working copy both strategies start from
//! 2. Classify locally (grayscale heuristic), analyze remotely when possible
//! 3. Primary strategy: hosted transformation, or the advanced local chain
//!    when no transformation service is configured
//! 4. On primary failure, fall back to the basic local chain
//! 5. Write the output, record it together with `completed` in one update
//!
//! The background task never propagates errors to the upload handler; any
//! failure past the fallback marks the record `failed`. Source and output
//! files are scheduled for removal after the retention window either way.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use image::DynamicImage;
use tracing::{debug, error, info, warn};

use crate::models::PhotoUpdate;
use crate::store::Storage;

use super::cleanup;
use super::enhancement;
use super::imaging::{self, ImagingError};
use super::openai_client::{DamageLevel, OpenAiClient, RestorationAnalysis};
use super::replicate_client::ReplicateClient;

/// Longest edge of the working copy both strategies start from
const WORKING_EDGE: u32 = 1920;

/// JPEG quality of the working copy
const WORKING_QUALITY: u8 = 90;

/// Longest edge of the proxy submitted for analysis
const ANALYSIS_EDGE: u32 = 512;

/// JPEG quality of the analysis proxy
const ANALYSIS_QUALITY: u8 = 85;

/// JPEG quality when re-encoding a hosted model's output
const REMOTE_OUTPUT_QUALITY: u8 = 95;

/// Strategy selector for hosted transformations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorationMode {
    /// Heavy face reconstruction
    FaceRestore,
    /// Maximum upscale pass for badly damaged sources
    Upscale,
    /// Colorize a monochrome source
    Colorize,
    /// Default enhancement and upscaling
    General,
}

/// Hosted-model seam: condition analysis plus image-to-image
/// transformation.
///
/// Failures here are routine operational events, not bugs; the
/// orchestrator answers every error with a local strategy instead.
#[async_trait]
pub trait RemoteEnhancer: Send + Sync {
    /// Structured condition verdict for a small JPEG proxy.
    async fn analyze(&self, jpeg: &[u8]) -> anyhow::Result<RestorationAnalysis>;

    /// Transform the image with the hosted model behind `mode`, returning
    /// the result image bytes in whatever format the model produces.
    async fn transform(&self, jpeg: &[u8], mode: RestorationMode) -> anyhow::Result<Vec<u8>>;

    /// Whether `transform` can possibly succeed. A partially configured
    /// adapter may be able to analyze but not transform.
    fn can_transform(&self) -> bool {
        true
    }
}

/// Production adapter over the OpenAI and Replicate clients.
///
/// Either half may be absent; the missing half reports itself
/// unconfigured instead of failing at startup.
pub struct HostedEnhancer {
    openai: Option<OpenAiClient>,
    replicate: Option<ReplicateClient>,
}

impl HostedEnhancer {
    /// Build from whichever API keys are present. Returns `None` when
    /// neither hosted service is usable, which puts the pipeline in
    /// local-only mode.
    pub fn from_keys(
        openai_key: Option<String>,
        replicate_token: Option<String>,
    ) -> anyhow::Result<Option<Self>> {
        let openai = openai_key.map(OpenAiClient::new).transpose()?;
        let replicate = replicate_token.map(ReplicateClient::new).transpose()?;

        if openai.is_none() && replicate.is_none() {
            return Ok(None);
        }
        Ok(Some(Self { openai, replicate }))
    }
}

#[async_trait]
impl RemoteEnhancer for HostedEnhancer {
    async fn analyze(&self, jpeg: &[u8]) -> anyhow::Result<RestorationAnalysis> {
        match &self.openai {
            Some(client) => Ok(client.analyze_restoration(jpeg).await?),
            None => anyhow::bail!("analysis service not configured"),
        }
    }

    async fn transform(&self, jpeg: &[u8], mode: RestorationMode) -> anyhow::Result<Vec<u8>> {
        match &self.replicate {
            Some(client) => Ok(client.transform(jpeg, mode).await?),
            None => anyhow::bail!("transformation service not configured"),
        }
    }

    fn can_transform(&self) -> bool {
        self.replicate.is_some()
    }
}

/// Everything derived from the upload before a strategy runs
struct Prepared {
    working: DynamicImage,
    working_jpeg: Vec<u8>,
    analysis_jpeg: Vec<u8>,
    grayscale: bool,
}

/// Background enhancement workflow shared by all photo jobs
pub struct RestorationPipeline {
    store: Arc<dyn Storage>,
    remote: Option<Arc<dyn RemoteEnhancer>>,
    uploads_dir: PathBuf,
    retention: Duration,
}

impl RestorationPipeline {
    pub fn new(
        store: Arc<dyn Storage>,
        remote: Option<Arc<dyn RemoteEnhancer>>,
        uploads_dir: PathBuf,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            remote,
            uploads_dir,
            retention,
        }
    }

    /// Run the full workflow for one photo job. This is the entry point the
    /// upload handler spawns; it owns the terminal store update and never
    /// returns an error.
    pub async fn process(&self, photo_id: i64, source_path: PathBuf) {
        info!(photo_id, source = %source_path.display(), "photo enhancement started");

        let enhanced_path = match self.enhance(photo_id, &source_path).await {
            Ok(path) => {
                info!(photo_id, enhanced = %path.display(), "photo enhancement completed");
                Some(path)
            }
            Err(e) => {
                error!(photo_id, error = %e, "photo enhancement failed");
                if self.store.update_photo(photo_id, PhotoUpdate::failed()).is_none() {
                    error!(photo_id, "photo record missing, cannot mark failed");
                }
                None
            }
        };

        let mut doomed = vec![source_path];
        doomed.extend(enhanced_path);
        cleanup::schedule_removal(doomed, self.retention);
    }

    async fn enhance(&self, photo_id: i64, source: &Path) -> anyhow::Result<PathBuf> {
        let source_bytes = tokio::fs::read(source)
            .await
            .context("read uploaded image")?;

        let prepared = tokio::task::spawn_blocking(move || -> anyhow::Result<Prepared> {
            let decoded = imaging::decode(&source_bytes)?;
            let working = imaging::bounded(&decoded, WORKING_EDGE);
            let working_jpeg = imaging::encode_jpeg(&working, WORKING_QUALITY)?;
            let analysis_jpeg =
                imaging::encode_jpeg(&imaging::bounded(&working, ANALYSIS_EDGE), ANALYSIS_QUALITY)?;
            let grayscale = imaging::is_grayscale(&working);
            Ok(Prepared {
                working,
                working_jpeg,
                analysis_jpeg,
                grayscale,
            })
        })
        .await
        .context("prepare task halted")??;

        debug!(photo_id, grayscale = prepared.grayscale, "working copy prepared");

        let analysis = self.analyze(&prepared.analysis_jpeg, prepared.grayscale).await;
        let grayscale = prepared.grayscale || analysis.is_black_and_white;

        let enhanced_jpeg = match self.primary(&prepared, &analysis, grayscale).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(photo_id, error = %e, "primary enhancement failed, using basic fallback");
                let img = prepared.working.clone();
                tokio::task::spawn_blocking(move || enhancement::basic_enhance(&img))
                    .await
                    .context("fallback task halted")??
            }
        };

        let enhanced_path = self
            .uploads_dir
            .join(format!("enhanced_{}_{}.jpg", Utc::now().timestamp_millis(), photo_id));
        tokio::fs::write(&enhanced_path, &enhanced_jpeg)
            .await
            .context("write enhanced image")?;

        let enhanced_url = enhanced_path.to_string_lossy().into_owned();
        if self
            .store
            .update_photo(photo_id, PhotoUpdate::completed(enhanced_url))
            .is_none()
        {
            anyhow::bail!("photo record {photo_id} missing at completion");
        }

        Ok(enhanced_path)
    }

    /// Condition verdict: the hosted analyzer when available, the local
    /// heuristic otherwise. Never fails.
    async fn analyze(&self, analysis_jpeg: &[u8], grayscale: bool) -> RestorationAnalysis {
        let remote = match &self.remote {
            Some(remote) => remote,
            None => return local_verdict(grayscale),
        };

        match remote.analyze(analysis_jpeg).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "remote analysis unavailable, using local heuristic");
                local_verdict(grayscale)
            }
        }
    }

    /// Primary strategy: hosted transformation when a transformer is
    /// configured, otherwise the advanced local chain.
    async fn primary(
        &self,
        prepared: &Prepared,
        analysis: &RestorationAnalysis,
        grayscale: bool,
    ) -> anyhow::Result<Vec<u8>> {
        match &self.remote {
            Some(remote) if remote.can_transform() => {
                let mode = select_mode(analysis, grayscale);
                info!(mode = ?mode, "running hosted transformation");
                let raw = remote.transform(&prepared.working_jpeg, mode).await?;

                // Models return PNG or WebP as they please; normalize to JPEG
                let jpeg =
                    tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ImagingError> {
                        let img = imaging::decode(&raw)?;
                        imaging::encode_jpeg(&img, REMOTE_OUTPUT_QUALITY)
                    })
                    .await
                    .context("re-encode task halted")??;
                Ok(jpeg)
            }
            _ => {
                let img = prepared.working.clone();
                Ok(
                    tokio::task::spawn_blocking(move || {
                        enhancement::advanced_enhance(&img, grayscale)
                    })
                    .await
                    .context("advanced enhancement task halted")??,
                )
            }
        }
    }
}

/// Pick the hosted model strategy from the condition verdict.
fn select_mode(analysis: &RestorationAnalysis, grayscale: bool) -> RestorationMode {
    if grayscale || analysis.is_black_and_white {
        RestorationMode::Colorize
    } else if analysis.has_faces {
        RestorationMode::FaceRestore
    } else if analysis.damage_level == DamageLevel::High {
        RestorationMode::Upscale
    } else {
        RestorationMode::General
    }
}

/// Verdict assembled from local classification alone
fn local_verdict(grayscale: bool) -> RestorationAnalysis {
    RestorationAnalysis {
        is_black_and_white: grayscale,
        ..Default::default()
    }
}
