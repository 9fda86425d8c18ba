//! menu-recommender 命令行入口
//!
//! 进程可以作为 LLM 网关、上传中继或两者同时运行，也可以直接扫描一张图片。

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use menu_recommender::api::{create_gateway_routes, create_relay_routes};
use menu_recommender::capture::{CaptureSession, FileCamera};
use menu_recommender::client::UploadClient;
use menu_recommender::config::{
    env_lookup, upstream_timeout_from_lookup, AppConfig, GatewayConfig, RelayConfig,
};
use menu_recommender::llm::build_http_client;
use menu_recommender::state::{GatewayState, RelayState};

#[derive(Parser)]
#[command(name = "menu-recommender", version, about = "メニュー撮影・おすすめサービス")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 启动 LLM 网关（默认 3002 端口）
    Gateway,
    /// 启动上传中继与拍照页面（默认 5000 端口）
    Relay,
    /// 同进程启动网关与中继
    Serve,
    /// 把图片文件当作相机帧上传并打印推荐
    Scan {
        /// 菜单图片路径
        image: PathBuf,

        #[arg(long, env = "RELAY_URL", default_value = "http://localhost:5000/api/upload")]
        relay_url: String,

        #[arg(
            long,
            env = "LLM_OCR_AND_RECOMMEND_API_URL",
            default_value = "http://localhost:3002/api/llm/ocr-and-recommend"
        )]
        gateway_url: String,

        /// 中继失败时不直连网关
        #[arg(long)]
        no_fallback: bool,
    },
}

/// 在 Windows 上设置控制台代码页为 UTF-8
#[cfg(windows)]
fn setup_console_encoding() {
    unsafe {
        extern "system" {
            fn SetConsoleOutputCP(code_page: u32) -> i32;
            fn SetConsoleCP(code_page: u32) -> i32;
        }
        SetConsoleOutputCP(65001);
        SetConsoleCP(65001);
    }
}

#[cfg(not(windows))]
fn setup_console_encoding() {}

#[tokio::main]
async fn main() -> ExitCode {
    setup_console_encoding();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "menu_recommender=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Gateway => run_gateway().await,
        Command::Relay => run_relay().await,
        Command::Serve => run_both().await,
        Command::Scan {
            image,
            relay_url,
            gateway_url,
            no_fallback,
        } => run_scan(image, relay_url, (!no_fallback).then_some(gateway_url)).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_gateway() -> anyhow::Result<()> {
    let config = GatewayConfig::from_lookup(env_lookup)?;
    serve_gateway(config).await
}

async fn run_relay() -> anyhow::Result<()> {
    let config = RelayConfig::from_lookup(env_lookup)?;
    serve_relay(config).await
}

async fn run_both() -> anyhow::Result<()> {
    let AppConfig { gateway, relay } = AppConfig::from_lookup(env_lookup)?;
    tokio::try_join!(serve_gateway(gateway), serve_relay(relay))?;
    Ok(())
}

async fn serve_gateway(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        "Starting LLM gateway (vision: {}, chat: {})",
        config.gemini_model, config.deepseek_model
    );
    let state = GatewayState::from_config(&config).context("LLM クライアントの初期化に失敗しました")?;
    listen(config.port, create_gateway_routes(state)).await
}

async fn serve_relay(config: RelayConfig) -> anyhow::Result<()> {
    info!(
        "Starting upload relay (pipeline: {:?}, upload dir: {})",
        config.pipeline,
        config.upload_dir.display()
    );
    let port = config.port;
    let state = RelayState::from_config(config).context("上流クライアントの初期化に失敗しました")?;
    let store = state.relay.store();
    store
        .ensure_dir()
        .await
        .with_context(|| format!("アップロードディレクトリを作成できません: {}", store.dir().display()))?;
    listen(port, create_relay_routes(state)).await
}

async fn listen(port: u16, routes: Router) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes.layer(cors).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("ポート {} をバインドできません", port))?;
    info!("Server listening on: {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

async fn run_scan(
    image: PathBuf,
    relay_url: String,
    gateway_url: Option<String>,
) -> anyhow::Result<()> {
    let timeout = upstream_timeout_from_lookup(&env_lookup)?;
    let http = build_http_client(timeout)?;
    let uploader = UploadClient::with_fallback(http, &relay_url, gateway_url.as_deref());

    let mut session = CaptureSession::new(FileCamera::new(image), uploader, true);
    session.start();
    session.shutter().await;

    let state = session.state();
    if let Some(message) = &state.error {
        anyhow::bail!("{}", message);
    }
    let result = state
        .result
        .as_ref()
        .context("結果を取得できませんでした")?;
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
