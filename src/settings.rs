//! # 应用设置
//!
//! 加载顺序：默认值 → JSON 配置文件（可选，字段可缺省）→ 环境变量覆盖。
//!
//! | 环境变量 | 覆盖字段 |
//! |----------|----------|
//! | `GEMINI_API_KEY` | `provider.api_key` |
//! | `BRAND_OVERLAY_ASSETS_DIR` | `compositor.assets_dir` |
//!
//! 设置加载后显式传入各构造函数，不存在全局单例。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compositor::CompositorConfig;
use crate::error::AppError;
use crate::provider::ProviderConfig;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const ASSETS_DIR_ENV: &str = "BRAND_OVERLAY_ASSETS_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub compositor: CompositorConfig,
    pub provider: ProviderConfig,
}

impl AppSettings {
    /// 读取配置文件并应用进程环境变量。
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// 同 `load`，环境变量读取方式可注入（测试用）。
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(key) = env(API_KEY_ENV).filter(|value| !value.trim().is_empty()) {
            settings.provider.api_key = Some(key.trim().to_string());
        }
        if let Some(dir) = env(ASSETS_DIR_ENV).filter(|value| !value.trim().is_empty()) {
            settings.compositor.assets_dir = PathBuf::from(dir.trim());
        }

        settings.validate()?;
        log::info!(
            "⚙️ 设置已加载 - 配置文件: {} 资源目录: {} 模型: {} API Key: {}",
            path.map(|p| p.display().to_string()).unwrap_or_else(|| "<默认>".to_string()),
            settings.compositor.assets_dir.display(),
            settings.provider.model,
            if settings.provider.api_key.is_some() { "已配置" } else { "未配置" }
        );
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("读取配置文件失败 {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("解析配置文件失败 {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.compositor
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.provider
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_file_or_env() {
        let settings = AppSettings::load_with_env(None, no_env).expect("load failed");

        assert_eq!(settings.compositor.margin, 20);
        assert!(settings.provider.api_key.is_none());
    }

    #[test]
    fn file_values_then_env_overrides() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "compositor": { "margin": 32, "assets_dir": "from-file" }, "provider": { "api_key": "file-key" } }"#,
        )
        .expect("write settings failed");

        let settings = AppSettings::load_with_env(Some(&path), |name| match name {
            API_KEY_ENV => Some("env-key".to_string()),
            _ => None,
        })
        .expect("load failed");

        assert_eq!(settings.compositor.margin, 32);
        assert_eq!(settings.compositor.assets_dir, PathBuf::from("from-file"));
        assert_eq!(settings.provider.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "compositor": { "connect_timeout": 0 } }"#).expect("write settings failed");

        assert!(matches!(
            AppSettings::load_with_env(Some(&path), no_env),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            AppSettings::load_with_env(Some(&dir.path().join("missing.json")), no_env),
            Err(AppError::Config(_))
        ));
    }
}
