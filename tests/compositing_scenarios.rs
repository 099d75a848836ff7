use std::io::Cursor;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use brand_overlay::compositor::{
    CompositingRequestBody, CompositorConfig, CompositorService, LogoCompositor, LogoVariant, PNG_DATA_URL_PREFIX,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

fn encode(img: DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

/// 渐变底图，保证每个像素都有可比较的颜色。
fn base_image_data_url(width: u32, height: u32) -> String {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(100 + x % 100) as u8, (120 + y % 100) as u8, 180])
    });
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(encode(DynamicImage::ImageRgb8(img)))
    )
}

/// 600x200 的彩色 Logo（橙色块 + 透明边）。
fn write_logo(path: &Path) {
    let logo = RgbaImage::from_fn(600, 200, |x, _| {
        if x < 10 || x >= 590 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([255, 140, 0, 255])
        }
    });
    std::fs::write(path, encode(DynamicImage::ImageRgba8(logo))).expect("write logo failed");
}

fn service_with_assets(dir: &Path) -> CompositorService {
    let config = CompositorConfig {
        assets_dir: dir.to_path_buf(),
        ..CompositorConfig::default()
    };
    CompositorService::new(LogoCompositor::new(config).expect("compositor init failed"))
}

fn request(image_source: String, style: &str, position: &str, size: Option<f64>, opacity: Option<f64>) -> CompositingRequestBody {
    CompositingRequestBody {
        image_source,
        style: style.to_string(),
        position: position.to_string(),
        logo_size_percent: size,
        logo_opacity_percent: opacity,
        logo_rotation_degrees: None,
    }
}

fn decode_data_url(url: &str) -> DynamicImage {
    let payload = url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .expect("result should be a PNG data url");
    let bytes = general_purpose::STANDARD.decode(payload).expect("base64 decode failed");
    image::load_from_memory(&bytes).expect("png decode failed")
}

#[tokio::test]
async fn isometric_bottom_left_at_35_percent() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    write_logo(&dir.path().join("logo.png"));
    let service = service_with_assets(dir.path());

    let result = service
        .composite(&request(base_image_data_url(1080, 1080), "isometric", "bottom-left", Some(35.0), Some(85.0)))
        .await
        .expect("composite failed");

    let placement = result.placement.expect("logo should be placed");
    assert_eq!(placement.width, 378);
    assert_eq!(placement.height, 126);
    assert_eq!(placement.x, 20);
    assert_eq!(placement.y, 1080 - 126 - 20);
    assert!(result.logo_applied);
    assert_eq!(result.image.dimensions(), (1080, 1080));

    // 85% 不透明度：中心像素被 Logo 主导但不等于纯 Logo 色
    let out = decode_data_url(&result.data_url).to_rgba8();
    let center = out.get_pixel(placement.x + placement.width / 2, placement.y + placement.height / 2);
    assert!(center[0] > 200);
    assert_ne!(center.0, [255, 140, 0, 255]);
}

#[tokio::test]
async fn cartoon_multiply_never_lightens() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    write_logo(&dir.path().join("logo.png"));
    let service = service_with_assets(dir.path());
    let base_url = base_image_data_url(1080, 1080);
    let base = decode_data_url(&base_url).to_rgba8();

    let result = service
        .composite(&request(base_url, "newyork-cartoon", "bottom-right", None, None))
        .await
        .expect("composite failed");

    assert_eq!(result.logo_variant, Some(LogoVariant::FullColor));
    let out = result.image.to_rgba8();
    for (before, after) in base.pixels().zip(out.pixels()) {
        for c in 0..3 {
            assert!(after[c] <= before[c], "multiply lightened a pixel: {:?} -> {:?}", before, after);
        }
    }

    let placement = result.placement.expect("logo should be placed");
    let (cx, cy) = (placement.x + placement.width / 2, placement.y + placement.height / 2);
    // 橙色在单色化后是墨色，正片叠底后接近纯黑
    assert!(out.get_pixel(cx, cy)[0] < 10);
}

#[tokio::test]
async fn cartoon_prefers_monochrome_asset() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    write_logo(&dir.path().join("logo.png"));
    write_logo(&dir.path().join("logo-mono.png"));
    let service = service_with_assets(dir.path());

    let result = service
        .composite(&request(base_image_data_url(400, 400), "newyork-cartoon", "top-right", None, None))
        .await
        .expect("composite failed");

    assert_eq!(result.logo_variant, Some(LogoVariant::Monochrome));
}

#[tokio::test]
async fn ten_percent_clamps_to_minimum_width() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    write_logo(&dir.path().join("logo.png"));
    let service = service_with_assets(dir.path());

    let result = service
        .composite(&request(base_image_data_url(1080, 720), "minimalist-linkedin", "top-right", Some(10.0), None))
        .await
        .expect("composite failed");

    let placement = result.placement.expect("logo should be placed");
    assert_eq!(placement.width, 200);
    assert_eq!(placement.height, 67);
    assert_eq!(placement.x, 1080 - 200 - 20);
    assert_eq!(placement.y, 20);
}

#[tokio::test]
async fn missing_logo_returns_unmodified_base_image() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let service = service_with_assets(dir.path());
    let base_url = base_image_data_url(320, 240);
    let base = decode_data_url(&base_url);

    let response = service
        .handle(&request(base_url, "isometric", "bottom-left", None, None))
        .await;

    assert_eq!(response.status, 200);
    let image_url = response.body["imageUrl"].as_str().expect("imageUrl missing");
    assert_eq!(decode_data_url(image_url).to_rgb8(), base.to_rgb8());
}

#[tokio::test]
async fn file_source_and_output_layout_are_preserved() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    write_logo(&dir.path().join("logo.png"));
    let base_path = dir.path().join("base.png");
    std::fs::write(
        &base_path,
        encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(500, 500, Rgb([240, 240, 240])))),
    )
    .expect("write base failed");
    let service = service_with_assets(dir.path());

    let response = service
        .handle_json(&format!(
            r#"{{"imageSource":{},"style":"isometric","position":"bottom-right","logoRotationDegrees":-15}}"#,
            serde_json::to_string(&base_path.display().to_string()).expect("encode path failed")
        ))
        .await;

    assert_eq!(response.status, 200);
    let image_url = response.body["imageUrl"].as_str().expect("imageUrl missing");
    let out = decode_data_url(image_url);
    assert_eq!(out.color(), image::ColorType::Rgb8);
    assert_eq!((out.width(), out.height()), (500, 500));
}

#[tokio::test]
async fn unreadable_base_image_is_an_error_response() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let service = service_with_assets(dir.path());

    let response = service
        .handle(&request(
            dir.path().join("nope.png").display().to_string(),
            "isometric",
            "bottom-left",
            None,
            None,
        ))
        .await;

    assert_eq!(response.status, 400);
    assert_eq!(response.body["code"], "FILE_ERROR");
}
