//! Restoration Pipeline Integration Tests
//!
//! Drives `RestorationPipeline::process` directly against the in-memory
//! store with stubbed hosted enhancers, covering the local chains, the
//! hosted path, fallback on remote failure, and terminal state handling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tempfile::TempDir;

use photorestore::models::{NewPhoto, PhotoStatus};
use photorestore::services::{
    DamageLevel, RemoteEnhancer, RestorationAnalysis, RestorationMode, RestorationPipeline,
};
use photorestore::store::{MemStorage, Storage};

/// Encode a small gradient image as JPEG
fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 3).min(255) as u8,
            (y * 3).min(255) as u8,
            128,
        ])
    });
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, 90);
    img.write_with_encoder(encoder).unwrap();
    out
}

/// Write an upload fixture into the temp uploads directory
fn write_source(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn build_pipeline(
    store: Arc<dyn Storage>,
    remote: Option<Arc<dyn RemoteEnhancer>>,
    uploads: &TempDir,
    retention: Duration,
) -> RestorationPipeline {
    RestorationPipeline::new(store, remote, uploads.path().to_path_buf(), retention)
}

/// Hosted enhancer whose every call fails
struct UnreachableEnhancer;

#[async_trait::async_trait]
impl RemoteEnhancer for UnreachableEnhancer {
    async fn analyze(&self, _jpeg: &[u8]) -> anyhow::Result<RestorationAnalysis> {
        anyhow::bail!("analysis service unreachable")
    }

    async fn transform(&self, _jpeg: &[u8], _mode: RestorationMode) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("transform service unreachable")
    }
}

/// Hosted enhancer returning a fixed verdict and a canned output image
struct CannedEnhancer {
    verdict: RestorationAnalysis,
    output: Vec<u8>,
}

#[async_trait::async_trait]
impl RemoteEnhancer for CannedEnhancer {
    async fn analyze(&self, _jpeg: &[u8]) -> anyhow::Result<RestorationAnalysis> {
        Ok(self.verdict.clone())
    }

    async fn transform(&self, _jpeg: &[u8], _mode: RestorationMode) -> anyhow::Result<Vec<u8>> {
        Ok(self.output.clone())
    }
}

#[tokio::test]
async fn local_pipeline_completes_photo() {
    let uploads = TempDir::new().unwrap();
    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let source = write_source(&uploads, "source.jpg", &test_jpeg(64, 48));

    let photo = store.create_photo(NewPhoto {
        original_url: source.to_string_lossy().into_owned(),
        enhanced_url: None,
        status: None,
    });

    let pipeline = build_pipeline(store.clone(), None, &uploads, Duration::from_secs(3600));
    pipeline.process(photo.id, source.clone()).await;

    let photo = store.photo(photo.id).unwrap();
    assert_eq!(photo.status, PhotoStatus::Completed);

    let enhanced_url = photo.enhanced_url.expect("completed photo carries output path");
    let enhanced_path = PathBuf::from(&enhanced_url);
    assert!(
        enhanced_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("enhanced_"),
        "output file should be named enhanced_<ts>_<id>: {enhanced_url}"
    );
    assert!(enhanced_path.exists(), "enhanced file should be on disk");

    // Output must be a decodable JPEG with the source dimensions
    let bytes = std::fs::read(&enhanced_path).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (64, 48));
}

#[tokio::test]
async fn unreachable_remote_falls_back_and_completes() {
    let uploads = TempDir::new().unwrap();
    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let source = write_source(&uploads, "source.jpg", &test_jpeg(64, 48));

    let photo = store.create_photo(NewPhoto {
        original_url: source.to_string_lossy().into_owned(),
        enhanced_url: None,
        status: None,
    });

    let remote: Arc<dyn RemoteEnhancer> = Arc::new(UnreachableEnhancer);
    let pipeline = build_pipeline(
        store.clone(),
        Some(remote),
        &uploads,
        Duration::from_secs(3600),
    );
    pipeline.process(photo.id, source).await;

    // Remote analysis and transform both failed; the local fallback still
    // produces a completed photo
    let photo = store.photo(photo.id).unwrap();
    assert_eq!(photo.status, PhotoStatus::Completed);
    assert!(photo.enhanced_url.is_some());
}

#[tokio::test]
async fn remote_output_is_normalized_and_stored() {
    let uploads = TempDir::new().unwrap();
    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let source = write_source(&uploads, "source.jpg", &test_jpeg(64, 48));

    let photo = store.create_photo(NewPhoto {
        original_url: source.to_string_lossy().into_owned(),
        enhanced_url: None,
        status: None,
    });

    // The canned output has different dimensions than the source, so the
    // stored file proves the hosted result was used over the local chain
    let remote: Arc<dyn RemoteEnhancer> = Arc::new(CannedEnhancer {
        verdict: RestorationAnalysis {
            has_faces: true,
            damage_level: DamageLevel::Low,
            ..Default::default()
        },
        output: test_jpeg(32, 32),
    });
    let pipeline = build_pipeline(
        store.clone(),
        Some(remote),
        &uploads,
        Duration::from_secs(3600),
    );
    pipeline.process(photo.id, source).await;

    let photo = store.photo(photo.id).unwrap();
    assert_eq!(photo.status, PhotoStatus::Completed);

    let bytes = std::fs::read(photo.enhanced_url.unwrap()).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (32, 32));
}

#[tokio::test]
async fn garbage_remote_output_falls_back_to_basic_chain() {
    let uploads = TempDir::new().unwrap();
    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let source = write_source(&uploads, "source.jpg", &test_jpeg(64, 48));

    let photo = store.create_photo(NewPhoto {
        original_url: source.to_string_lossy().into_owned(),
        enhanced_url: None,
        status: None,
    });

    // The transform succeeds at the wire level but returns undecodable
    // bytes; normalization fails and the local fallback takes over
    let remote: Arc<dyn RemoteEnhancer> = Arc::new(CannedEnhancer {
        verdict: RestorationAnalysis::default(),
        output: b"model returned an error page".to_vec(),
    });
    let pipeline = build_pipeline(
        store.clone(),
        Some(remote),
        &uploads,
        Duration::from_secs(3600),
    );
    pipeline.process(photo.id, source).await;

    let photo = store.photo(photo.id).unwrap();
    assert_eq!(photo.status, PhotoStatus::Completed);

    let bytes = std::fs::read(photo.enhanced_url.unwrap()).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (64, 48));
}

#[tokio::test]
async fn undecodable_source_marks_photo_failed() {
    let uploads = TempDir::new().unwrap();
    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let source = write_source(&uploads, "broken.jpg", b"not an image at all");

    let photo = store.create_photo(NewPhoto {
        original_url: source.to_string_lossy().into_owned(),
        enhanced_url: None,
        status: None,
    });

    let pipeline = build_pipeline(store.clone(), None, &uploads, Duration::from_secs(3600));
    pipeline.process(photo.id, source).await;

    let photo = store.photo(photo.id).unwrap();
    assert_eq!(photo.status, PhotoStatus::Failed);
    assert!(
        photo.enhanced_url.is_none(),
        "failed photos must not carry an output path"
    );
}

#[tokio::test]
async fn missing_record_does_not_panic() {
    let uploads = TempDir::new().unwrap();
    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let source = write_source(&uploads, "orphan.jpg", &test_jpeg(64, 48));

    // No record with id 42 exists; the workflow logs and abandons the job
    let pipeline = build_pipeline(store.clone(), None, &uploads, Duration::from_secs(3600));
    pipeline.process(42, source).await;

    assert!(store.photo(42).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn retention_cleanup_removes_source_and_output() {
    let uploads = TempDir::new().unwrap();
    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let source = write_source(&uploads, "source.jpg", &test_jpeg(64, 48));

    let photo = store.create_photo(NewPhoto {
        original_url: source.to_string_lossy().into_owned(),
        enhanced_url: None,
        status: None,
    });

    let pipeline = build_pipeline(store.clone(), None, &uploads, Duration::from_millis(50));
    pipeline.process(photo.id, source.clone()).await;

    let photo = store.photo(photo.id).unwrap();
    let enhanced_path = PathBuf::from(photo.enhanced_url.unwrap());
    assert!(source.exists() && enhanced_path.exists());

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!source.exists(), "source should be removed after retention");
    assert!(
        !enhanced_path.exists(),
        "enhanced output should be removed after retention"
    );

    // The record itself survives cleanup; only disk artifacts go
    assert_eq!(
        store.photo(photo.id).unwrap().status,
        PhotoStatus::Completed
    );
}
