use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use brand_overlay::commands::{self, GenerateOptions};
use brand_overlay::compositor::{CompositorConfig, CompositorService, LogoCompositor};
use brand_overlay::provider::{GeneratedImage, ImageProvider, PromptRequest, ProviderError, ResilientProvider};
use brand_overlay::resilience::{BreakerConfig, BreakerState, RetryPolicy};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// 返回固定 PNG 的生成服务；前 `failures` 次返回 503。
struct FakeProvider {
    failures: u32,
    calls: AtomicU32,
    last_prompt: std::sync::Mutex<Option<PromptRequest>>,
}

impl FakeProvider {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            last_prompt: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, request: &PromptRequest) -> Result<GeneratedImage, ProviderError> {
        *self.last_prompt.lock().expect("lock failed") = Some(request.clone());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ProviderError::Http {
                status: 503,
                message: "overloaded".to_string(),
                retry_after_ms: None,
            });
        }

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 800, Rgb([250, 250, 250])))
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("encode failed");
        Ok(GeneratedImage {
            bytes: Bytes::from(cursor.into_inner()),
            mime_type: "image/png".to_string(),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

fn resilient(inner: FakeProvider, max_attempts: u32, threshold: u32) -> ResilientProvider<FakeProvider> {
    ResilientProvider::new(
        inner,
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
            max_total_ms: 1_000,
        },
        BreakerConfig {
            failure_threshold: threshold,
            cooldown_ms: 60_000,
        },
        Duration::from_secs(2),
    )
}

fn service() -> (tempfile::TempDir, CompositorService) {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let config = CompositorConfig {
        assets_dir: dir.path().to_path_buf(),
        ..CompositorConfig::default()
    };
    let service = CompositorService::new(LogoCompositor::new(config).expect("compositor init failed"));
    (dir, service)
}

fn options() -> GenerateOptions {
    GenerateOptions {
        message: "Our Q3 report is out".to_string(),
        headline: Some("Q3 in review".to_string()),
        style: "minimalist-linkedin".to_string(),
        aspect_ratio: "4:5".to_string(),
        position: "bottom-left".to_string(),
        logo_size_percent: None,
        logo_opacity_percent: None,
        logo_rotation_degrees: None,
    }
}

#[tokio::test]
async fn generate_retries_transient_failures_and_returns_image() {
    let (_dir, service) = service();
    let provider = resilient(FakeProvider::new(1), 3, 5);

    let output = commands::generate(&service, &provider, &options()).await;

    assert!(output.is_success(), "unexpected response: {:?}", output.response);
    assert!(
        output.response.body["imageUrl"]
            .as_str()
            .is_some_and(|url| url.starts_with("data:image/png;base64,"))
    );
    let png = output.png.expect("png bytes missing");
    let decoded = image::load_from_memory(&png).expect("decode failed");
    assert_eq!((decoded.width(), decoded.height()), (640, 800));
}

#[tokio::test]
async fn invalid_logo_options_fail_before_calling_provider() {
    let (_dir, service) = service();
    let inner = FakeProvider::new(0);
    let provider = resilient(inner, 3, 5);
    let mut opts = options();
    opts.logo_size_percent = Some(150.0);

    let output = commands::generate(&service, &provider, &opts).await;

    assert_eq!(output.response.status, 400);
    assert_eq!(output.response.body["code"], "VALIDATION_ERROR");
    assert_eq!(provider.breaker_state(), BreakerState::Closed);
}

#[tokio::test]
async fn open_circuit_maps_to_service_unavailable() {
    let (_dir, service) = service();
    let provider = resilient(FakeProvider::new(u32::MAX), 4, 2);

    let output = commands::generate(&service, &provider, &options()).await;

    assert_eq!(output.response.status, 503);
    assert_eq!(output.response.body["code"], "CIRCUIT_OPEN");
    assert_eq!(provider.breaker_state(), BreakerState::Open);

    let report = commands::health(&provider).await;
    assert!(report.reachable);
    assert_eq!(report.breaker_state, BreakerState::Open);
    assert_eq!(report.consecutive_failures, 2);
}

#[tokio::test]
async fn prompt_reflects_post_and_logo_corner() {
    let (_dir, service) = service();
    let fake = FakeProvider::new(0);

    let output = commands::generate(&service, &fake, &options()).await;

    assert!(output.is_success());
    let prompt = fake
        .last_prompt
        .lock()
        .expect("lock failed")
        .clone()
        .expect("provider was not called");
    assert!(prompt.prompt.contains("Our Q3 report is out"));
    assert!(prompt.prompt.contains("Q3 in review"));
    assert!(prompt.prompt.contains("bottom left corner"));
    assert_eq!(prompt.aspect_ratio.as_str(), "4:5");
}

#[tokio::test]
async fn unknown_aspect_ratio_is_rejected() {
    let (_dir, service) = service();
    let fake = FakeProvider::new(0);
    let mut opts = options();
    opts.aspect_ratio = "3:2".to_string();

    let output = commands::generate(&service, &fake, &opts).await;

    assert_eq!(output.response.status, 400);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}
