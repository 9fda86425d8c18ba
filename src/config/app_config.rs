//! 应用配置管理
//!
//! 配置在进程入口处从环境变量构建一次，之后以 `Arc` 注入各路由状态，
//! 不再使用全局单例。

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// 配置错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// 必填环境变量缺失
    #[error("環境変数 {0} が設定されていません。.envファイルを確認してください。")]
    MissingVar(&'static str),

    /// 环境变量取值非法
    #[error("環境変数 {name} の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
}

/// 中继调用网关的流程
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayPipeline {
    /// 先 OCR，再用文本请求推荐
    #[default]
    TwoStep,
    /// 单次 OCR+推荐
    Combined,
}

impl FromStr for RelayPipeline {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-step" | "two_step" | "twostep" => Ok(Self::TwoStep),
            "combined" => Ok(Self::Combined),
            _ => Err(()),
        }
    }
}

/// LLM 网关配置
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub deepseek_api_key: String,
    pub deepseek_base_url: String,
    pub deepseek_model: String,
    pub port: u16,
    /// 上游调用超时
    pub upstream_timeout: Duration,
    /// JSONL 请求日志目录，未设置则不记录
    pub request_log_dir: Option<PathBuf>,
}

/// 上传中继配置
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub ocr_url: String,
    pub recommend_url: String,
    pub ocr_and_recommend_url: String,
    pub pipeline: RelayPipeline,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub upstream_timeout: Duration,
}

/// 同进程运行网关与中继时的完整配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub relay: RelayConfig,
}

impl AppConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            gateway: GatewayConfig::from_lookup(&lookup)?,
            relay: RelayConfig::from_lookup(&lookup)?,
        })
    }
}

const DEFAULT_GATEWAY_URL: &str = "http://localhost:3002";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup(name)).ok_or(ConfigError::MissingVar(name))
}

fn or_default<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup(name)).unwrap_or_else(|| default.to_string())
}

fn parsed<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup(name)) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

/// 与 `parsed` 相同，但拒绝 0
fn positive<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default + ToString,
{
    let value: T = parsed(lookup, name, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

impl GatewayConfig {
    /// 从任意键值来源构建（便于测试），缺少 API Key 时立即失败
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            gemini_api_key: required(&lookup, "GEMINI_API_KEY")?,
            gemini_base_url: or_default(
                &lookup,
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            gemini_model: or_default(&lookup, "GEMINI_MODEL", "gemini-2.0-flash"),
            deepseek_api_key: required(&lookup, "DEEPSEEK_API_KEY")?,
            deepseek_base_url: or_default(&lookup, "DEEPSEEK_BASE_URL", "https://api.deepseek.com"),
            deepseek_model: or_default(&lookup, "DEEPSEEK_MODEL", "deepseek-chat"),
            port: parsed(&lookup, "LLM_SERVICE_PORT", 3002)?,
            upstream_timeout: upstream_timeout_from_lookup(&lookup)?,
            request_log_dir: non_empty(lookup("LLM_REQUEST_LOG_DIR")).map(PathBuf::from),
        })
    }
}

impl RelayConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pipeline = match non_empty(lookup("RELAY_PIPELINE")) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "RELAY_PIPELINE",
                value,
            })?,
            None => RelayPipeline::default(),
        };

        Ok(Self {
            port: parsed(&lookup, "PORT", 5000)?,
            ocr_url: or_default(
                &lookup,
                "LLM_OCR_API_URL",
                &format!("{}/api/llm/ocr", DEFAULT_GATEWAY_URL),
            ),
            recommend_url: or_default(
                &lookup,
                "LLM_RECOMMEND_API_URL",
                &format!("{}/api/llm/recommend", DEFAULT_GATEWAY_URL),
            ),
            ocr_and_recommend_url: or_default(
                &lookup,
                "LLM_OCR_AND_RECOMMEND_API_URL",
                &format!("{}/api/llm/ocr-and-recommend", DEFAULT_GATEWAY_URL),
            ),
            pipeline,
            upload_dir: PathBuf::from(or_default(&lookup, "UPLOAD_DIR", "./uploads")),
            max_upload_bytes: positive(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            upstream_timeout: upstream_timeout_from_lookup(&lookup)?,
        })
    }
}

/// 读取上游超时
pub fn upstream_timeout_from_lookup<F>(lookup: &F) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = positive(lookup, "UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?;
    Ok(Duration::from_secs(secs))
}

/// 进程环境变量查找
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_gateway_requires_both_keys() {
        let err =
            GatewayConfig::from_lookup(lookup_from(&[("DEEPSEEK_API_KEY", "ds")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("GEMINI_API_KEY"));

        let err = GatewayConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "gm")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("DEEPSEEK_API_KEY"));

        let err = GatewayConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "  "),
            ("DEEPSEEK_API_KEY", "ds"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("GEMINI_API_KEY"));
    }

    #[test]
    fn test_gateway_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "gm"),
            ("DEEPSEEK_API_KEY", "ds"),
        ]))
        .unwrap();
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.deepseek_base_url, "https://api.deepseek.com");
        assert_eq!(config.deepseek_model, "deepseek-chat");
        assert_eq!(config.port, 3002);
        assert!(config.request_log_dir.is_none());
    }

    #[test]
    fn test_relay_defaults_and_overrides() {
        let config = RelayConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.ocr_url, "http://localhost:3002/api/llm/ocr");
        assert_eq!(config.pipeline, RelayPipeline::TwoStep);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);

        let config = RelayConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("RELAY_PIPELINE", "combined"),
            ("LLM_RECOMMEND_API_URL", "http://gw/api/llm/recommend"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.pipeline, RelayPipeline::Combined);
        assert_eq!(config.recommend_url, "http://gw/api/llm/recommend");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = RelayConfig::from_lookup(lookup_from(&[("PORT", "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err =
            RelayConfig::from_lookup(lookup_from(&[("RELAY_PIPELINE", "three")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RELAY_PIPELINE", .. }));

        let timeout =
            upstream_timeout_from_lookup(&lookup_from(&[("UPSTREAM_TIMEOUT_SECS", "5")])).unwrap();
        assert_eq!(timeout, Duration::from_secs(5));

        let zero = lookup_from(&[("UPSTREAM_TIMEOUT_SECS", "0")]);
        let err = upstream_timeout_from_lookup(&zero).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "UPSTREAM_TIMEOUT_SECS",
                value: "0".to_string()
            }
        );

        let err = GatewayConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "gm"),
            ("DEEPSEEK_API_KEY", "ds"),
            ("UPSTREAM_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "UPSTREAM_TIMEOUT_SECS", .. }));

        let err = RelayConfig::from_lookup(lookup_from(&[("MAX_UPLOAD_BYTES", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MAX_UPLOAD_BYTES", .. }));
    }
}
