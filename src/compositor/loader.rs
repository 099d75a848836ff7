//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（URL / 内联 Base64 / 本地文件）的原始字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - URL：协议 + 主机安全 + 重试 + 手动重定向 + 内容类型 + 体积校验，整包读取响应体。
//! - Base64：前缀剥离 + 解码前体积估算 + 解码。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 三种来源最终都要通过 magic bytes 签名校验。

use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use tokio::net::lookup_host;

use super::source::{ImageSource, RawImageData};
use super::{CompositeError, CompositorConfig, LogoCompositor};
use crate::resilience::{RetryPolicy, Retryable, retry_after_hint_ms};

const DATA_URL_BASE64_MARKER: &str = ";base64,";
/// 日志与错误消息中回显来源字符串的最大字符数。
const MAX_ECHOED_SOURCE_CHARS: usize = 96;

/// 单次下载尝试的失败，携带重试判定信息。
struct DownloadAttemptError {
    error: CompositeError,
    retryable: bool,
    retry_after_ms: Option<u64>,
}

impl fmt::Display for DownloadAttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl Retryable for DownloadAttemptError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn retry_after_hint_ms(&self) -> Option<u64> {
        self.retry_after_ms
    }
}

impl LogoCompositor {
    /// 按来源类型分派加载。
    pub(crate) async fn load_source(&self, source: &ImageSource) -> Result<RawImageData, CompositeError> {
        match source {
            ImageSource::Url(url) => self.load_from_url(url).await,
            ImageSource::Inline(data) => self.load_from_inline(data),
            ImageSource::FilePath(path) => self.load_from_file(path).await,
        }
    }

    /// 从 URL 加载图片原始字节。
    pub(super) async fn load_from_url(&self, url: &str) -> Result<RawImageData, CompositeError> {
        log::info!("🌐 开始下载图片 - URL: {}", redact_url_for_log(url));

        validate_url_safety(url, &self.config).await?;
        let bytes = self.download_with_validation(url).await?;
        validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "url",
        })
    }

    /// 从内联 Base64（Data URL 或纯 Base64）加载图片原始字节。
    pub(super) fn load_from_inline(&self, data: &str) -> Result<RawImageData, CompositeError> {
        log::info!("📝 开始处理内联图片");

        let bytes = parse_base64_with_limit(data, self.config.max_file_size)?;

        if bytes.len() as u64 > self.config.max_file_size {
            return Err(CompositeError::ResourceLimit(format!(
                "Base64 解码后体积过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                self.config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "inline",
        })
    }

    /// 从本地路径加载图片原始字节。
    pub(super) async fn load_from_file(&self, path: &str) -> Result<RawImageData, CompositeError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", redact_source_for_log(path));

        let bytes = read_file_with_limit(Path::new(path), self.config.max_file_size).await?;
        validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }

    /// 执行带校验的网络下载（手动跟随重定向，每一跳都重新做安全校验）。
    pub(super) async fn download_with_validation(&self, url: &str) -> Result<Vec<u8>, CompositeError> {
        let config = &self.config;
        let client = build_http_client(config)?;
        let http = &client;
        let policy = RetryPolicy {
            max_attempts: u32::from(config.download_attempts),
            base_delay_ms: config.download_retry_base_delay_ms,
            max_delay_ms: config.download_retry_base_delay_ms.saturating_mul(8),
            max_total_ms: config.download_timeout.saturating_mul(1000),
        };

        let mut current_url = reqwest::Url::parse(url)
            .map_err(|e| CompositeError::InvalidFormat(format!("URL 格式错误：{}", e)))?;

        for redirect_count in 0..=config.max_redirects {
            let response = policy
                .run("图片下载", |_| {
                    let target = current_url.clone();
                    async move { send_once(http, target, config).await }
                })
                .await
                .map_err(|failed| failed.error)?;

            if response.status().is_redirection() {
                if redirect_count >= config.max_redirects {
                    return Err(CompositeError::Network(format!(
                        "重定向次数超过限制（{}）",
                        config.max_redirects
                    )));
                }

                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .ok_or_else(|| CompositeError::Network("重定向响应缺少 Location 头".to_string()))?
                    .to_str()
                    .map_err(|e| CompositeError::InvalidFormat(format!("重定向地址无效：{}", e)))?;

                let next_url = current_url
                    .join(location)
                    .map_err(|e| CompositeError::InvalidFormat(format!("重定向 URL 解析失败：{}", e)))?;

                validate_url_safety(next_url.as_str(), config).await?;

                log::debug!("↪️ 跳转到: {}", redact_url_for_log(next_url.as_str()));
                current_url = next_url;
                continue;
            }

            if !response.status().is_success() {
                return Err(CompositeError::Network(format!(
                    "HTTP {}: {}",
                    response.status().as_u16(),
                    status_message(response.status().as_u16())
                )));
            }

            if let Some(ct) = response.headers().get(reqwest::header::CONTENT_TYPE) {
                if let Ok(ct_str) = ct.to_str() {
                    if !is_image_content_type(ct_str) {
                        return Err(CompositeError::InvalidFormat(format!("不是图片类型：{}", ct_str)));
                    }
                }
            }

            if let Some(size) = response.content_length() {
                if size > config.max_file_size {
                    return Err(CompositeError::ResourceLimit(format!(
                        "文件过大：{:.2} MB（限制：{:.2} MB）",
                        size as f64 / 1024.0 / 1024.0,
                        config.max_file_size as f64 / 1024.0 / 1024.0
                    )));
                }
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| map_reqwest_error(e, current_url.as_str(), config))?;

            if body.len() as u64 > config.max_file_size {
                return Err(CompositeError::ResourceLimit("下载后文件超过大小限制".to_string()));
            }

            log::debug!("✅ 下载完成 - {} bytes", body.len());
            return Ok(body.to_vec());
        }

        Err(CompositeError::Network("下载流程异常结束".to_string()))
    }
}

async fn send_once(
    client: &reqwest::Client,
    url: reqwest::Url,
    config: &CompositorConfig,
) -> Result<reqwest::Response, DownloadAttemptError> {
    let url_text = url.to_string();
    match client
        .get(url)
        .header(reqwest::header::ACCEPT, "image/avif,image/webp,image/png,image/*,*/*;q=0.8")
        .send()
        .await
    {
        Ok(resp) if is_retryable_http_status(resp.status()) => Err(DownloadAttemptError {
            error: CompositeError::Network(format!(
                "HTTP {}: {}",
                resp.status().as_u16(),
                status_message(resp.status().as_u16())
            )),
            retryable: true,
            retry_after_ms: retry_after_hint_ms(resp.headers()),
        }),
        Ok(resp) => Ok(resp),
        Err(err) => Err(DownloadAttemptError {
            retryable: is_retryable_network_error(&err),
            error: map_reqwest_error(err, &url_text, config),
            retry_after_ms: None,
        }),
    }
}

fn build_http_client(config: &CompositorConfig) -> Result<reqwest::Client, CompositeError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.download_timeout))
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| CompositeError::Network(format!("无法创建 HTTP 客户端：{}", e)))
}

/// 读取本地文件，先用 metadata 做体积校验。
pub(crate) async fn read_file_with_limit(path: &Path, max_file_size: u64) -> Result<Vec<u8>, CompositeError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CompositeError::FileSystem(format!("文件不存在：{}", redact_path_for_log(path)))
        } else {
            CompositeError::FileSystem(format!("无法读取文件信息：{}", e))
        }
    })?;

    if !metadata.is_file() {
        return Err(CompositeError::FileSystem(format!("不是普通文件：{}", redact_path_for_log(path))));
    }

    if metadata.len() > max_file_size {
        return Err(CompositeError::ResourceLimit(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            metadata.len() as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| CompositeError::FileSystem(format!("无法读取图片文件：{}", e)))
}

fn is_retryable_http_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn is_retryable_network_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }

    let msg = error.to_string().to_lowercase();
    msg.contains("connection reset")
        || msg.contains("connection closed before message completed")
        || msg.contains("unexpected eof during handshake")
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|base| {
            let base = base.trim().to_ascii_lowercase();
            base.starts_with("image/") || base == "application/octet-stream"
        })
        .unwrap_or(false)
}

/// 日志中隐藏 query / fragment（可能携带签名或 token）。
pub(crate) fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
}

/// 过长的来源字符串（路径、误传的内联数据）只保留开头一段。
pub(crate) fn redact_source_for_log(source: &str) -> String {
    let total = source.chars().count();
    if total <= MAX_ECHOED_SOURCE_CHARS {
        return source.to_string();
    }

    let head: String = source.chars().take(MAX_ECHOED_SOURCE_CHARS).collect();
    format!("{}…（共 {} 字符）", head, total)
}

fn redact_path_for_log(path: &Path) -> String {
    redact_source_for_log(&path.to_string_lossy())
}

fn map_reqwest_error(e: reqwest::Error, url: &str, config: &CompositorConfig) -> CompositeError {
    let err_msg = e.to_string().replace(url, &redact_url_for_log(url));

    if e.is_timeout() {
        CompositeError::Timeout(format!("下载超时（{}秒）", config.download_timeout))
    } else if e.is_connect() {
        CompositeError::Network(format!("无法连接：{}", err_msg))
    } else {
        CompositeError::Network(format!("请求失败：{}", err_msg))
    }
}

fn status_message(code: u16) -> &'static str {
    match code {
        404 => "未找到",
        403 => "访问被拒绝",
        429 => "请求过于频繁",
        500..=599 => "服务器错误",
        _ => "请求失败",
    }
}

/// 校验 URL 安全性。
///
/// 默认阻止本地/内网目标，防止 SSRF 风险。
async fn validate_url_safety(url: &str, config: &CompositorConfig) -> Result<(), CompositeError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| CompositeError::InvalidFormat(format!("URL 格式错误：{}", e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CompositeError::InvalidFormat("仅支持 HTTP/HTTPS".to_string()));
    }

    if config.allow_private_network {
        return Ok(());
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| CompositeError::InvalidFormat("URL 缺少主机地址".to_string()))?;

    if is_local_hostname(host) {
        return Err(CompositeError::InvalidFormat(format!("禁止访问本地网络地址：{}", host)));
    }

    let bare_host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare_host.parse::<IpAddr>() {
        if is_private_or_local_ip(ip) {
            return Err(CompositeError::InvalidFormat(format!("禁止访问内网 IP：{}", ip)));
        }
        return Ok(());
    }

    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| CompositeError::InvalidFormat("URL 缺少端口信息".to_string()))?;

    let addrs = lookup_host((host, port))
        .await
        .map_err(|e| CompositeError::Network(format!("URL 主机解析失败：{}", e)))?;

    let mut resolved_any = false;
    for addr in addrs {
        if is_private_or_local_ip(addr.ip()) {
            return Err(CompositeError::InvalidFormat(format!(
                "URL 解析结果命中内网地址：{}",
                addr.ip()
            )));
        }
        resolved_any = true;
    }

    if !resolved_any {
        return Err(CompositeError::Network("URL 未解析到有效地址".to_string()));
    }

    Ok(())
}

fn is_local_hostname(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host.eq_ignore_ascii_case("localhost.")
        || host.ends_with(".local")
}

/// 判断 IP 是否属于本地/内网/链路本地等受限范围。
fn is_private_or_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.is_multicast()
            {
                return true;
            }

            let octets = v4.octets();
            // 0.0.0.0/8 与运营商级 NAT 100.64.0.0/10
            octets[0] == 0 || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || v6.is_multicast()
        }
    }
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, CompositeError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| CompositeError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| CompositeError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

/// 解析内联 Base64（支持 Data URL / 纯 Base64），解码前按估算体积拒绝超限输入。
pub(crate) fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, CompositeError> {
    let normalized = data.trim();

    let payload = if normalized.len() >= 5 && normalized[..5].eq_ignore_ascii_case("data:") {
        let marker = normalized
            .find(DATA_URL_BASE64_MARKER)
            .ok_or_else(|| CompositeError::InvalidFormat("缺少 base64 标记".to_string()))?;
        let media_type = &normalized[5..marker];
        if !media_type.to_ascii_lowercase().starts_with("image/") {
            return Err(CompositeError::InvalidFormat(format!(
                "不是图片类型：{}",
                redact_source_for_log(media_type)
            )));
        }
        &normalized[marker + DATA_URL_BASE64_MARKER.len()..]
    } else {
        normalized
    };

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_file_size {
        return Err(CompositeError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CompositeError::Decode(format!("Base64 解码失败：{}", e)))
}

/// 通过文件签名（magic bytes）校验输入是否为图片。
pub(crate) fn validate_image_signature(bytes: &[u8]) -> Result<(), CompositeError> {
    if bytes.is_empty() {
        return Err(CompositeError::InvalidFormat("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| CompositeError::InvalidFormat("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(CompositeError::InvalidFormat(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(())
}
