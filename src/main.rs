//! # 品牌配图工具 — 命令行入口
//!
//! 本文件仅负责日志初始化、参数解析与输出，业务逻辑见 `commands` 模块。

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;

use brand_overlay::commands::{self, CommandOutput, GenerateOptions};
use brand_overlay::compositor::{ApiResponse, CompositorService, LogoCompositor};
use brand_overlay::error::AppError;
use brand_overlay::provider::{GeminiProvider, ResilientProvider};
use brand_overlay::settings::AppSettings;

#[derive(Debug, Parser)]
#[command(name = "brand-overlay", version, about = "生成营销配图并叠加品牌 Logo")]
struct Cli {
    /// JSON 配置文件路径
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 对已有图片叠加 Logo
    Composite {
        /// 请求 JSON 文件路径，`-` 表示从标准输入读取
        #[arg(long)]
        request: String,
        /// 结果 PNG 输出路径
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 生成插画并叠加 Logo
    Generate {
        #[arg(long)]
        message: String,
        #[arg(long)]
        headline: Option<String>,
        #[arg(long)]
        style: String,
        #[arg(long, default_value = "1:1")]
        aspect_ratio: String,
        #[arg(long, default_value = "bottom-right")]
        position: String,
        #[arg(long)]
        size: Option<f64>,
        #[arg(long)]
        opacity: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<f64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 输出生成服务健康报告
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("❌ 启动失败：{}", e);
            print_json(&e.to_response());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let settings = AppSettings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Composite { request, output } => {
            let service = compositor_service(&settings)?;
            let raw_request = read_request(&request).await?;
            let result = commands::composite(&service, &raw_request).await;
            finish(result, output.as_deref()).await
        }
        Command::Generate {
            message,
            headline,
            style,
            aspect_ratio,
            position,
            size,
            opacity,
            rotation,
            output,
        } => {
            let service = compositor_service(&settings)?;
            let provider = resilient_provider(&settings)?;
            let options = GenerateOptions {
                message,
                headline,
                style,
                aspect_ratio,
                position,
                logo_size_percent: size,
                logo_opacity_percent: opacity,
                logo_rotation_degrees: rotation,
            };
            let result = commands::generate(&service, &provider, &options).await;
            finish(result, output.as_deref()).await
        }
        Command::Health => {
            let provider = resilient_provider(&settings)?;
            let report = commands::health(&provider).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.reachable {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn compositor_service(settings: &AppSettings) -> Result<CompositorService, AppError> {
    let compositor = LogoCompositor::new(settings.compositor.clone())?;
    Ok(CompositorService::new(compositor))
}

fn resilient_provider(settings: &AppSettings) -> Result<ResilientProvider<GeminiProvider>, AppError> {
    let gemini = GeminiProvider::new(settings.provider.clone())?;
    Ok(ResilientProvider::from_config(gemini, &settings.provider))
}

async fn read_request(source: &str) -> Result<String, AppError> {
    if source == "-" {
        let mut buffer = String::new();
        tokio::io::stdin().read_to_string(&mut buffer).await?;
        return Ok(buffer);
    }
    Ok(tokio::fs::read_to_string(source).await?)
}

async fn finish(result: CommandOutput, output: Option<&Path>) -> Result<ExitCode, AppError> {
    if let (Some(path), Some(png)) = (output, result.png.as_ref()) {
        tokio::fs::write(path, png).await?;
        log::info!("📁 已写入结果图片：{}", path.display());
    }

    print_json(&result.response);
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_json(response: &ApiResponse) {
    match serde_json::to_string_pretty(&response.body) {
        Ok(text) => println!("{}", text),
        Err(e) => log::error!("❌ 输出序列化失败：{}", e),
    }
}
