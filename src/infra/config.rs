//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/kiosk.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Platform class, used to pick the feed refresh interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Resolve from the build target
    Auto,
    Android,
    Desktop,
}

impl Platform {
    /// Resolve `Auto` to a concrete platform
    pub fn resolve(self) -> Platform {
        match self {
            Platform::Auto if cfg!(target_os = "android") => Platform::Android,
            Platform::Auto => Platform::Desktop,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Auto => "auto",
            Platform::Android => "android",
            Platform::Desktop => "desktop",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    /// Unique kiosk identifier (e.g., "entrance-1")
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "kiosk".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_platform")]
    pub platform: Platform,
    /// Forced refresh interval on Android-class devices
    #[serde(default = "default_android_refresh_secs")]
    pub android_refresh_secs: u64,
    /// Forced refresh interval everywhere else
    #[serde(default = "default_desktop_refresh_secs")]
    pub desktop_refresh_secs: u64,
    /// Pause between feed teardown and rebind
    #[serde(default = "default_remount_delay_ms")]
    pub remount_delay_ms: u64,
    /// Serial scanner baud rate
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Only list USB serial ports as scanners
    #[serde(default = "default_usb_only")]
    pub usb_only: bool,
}

fn default_platform() -> Platform {
    Platform::Auto
}

fn default_android_refresh_secs() -> u64 {
    30
}

fn default_desktop_refresh_secs() -> u64 {
    120
}

fn default_remount_delay_ms() -> u64 {
    100
}

fn default_baud() -> u32 {
    9600
}

fn default_usb_only() -> bool {
    true
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            android_refresh_secs: default_android_refresh_secs(),
            desktop_refresh_secs: default_desktop_refresh_secs(),
            remount_delay_ms: default_remount_delay_ms(),
            baud: default_baud(),
            usb_only: default_usb_only(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the persisted kiosk state
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "kiosk_state.json".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Emit scan analytics at all
    #[serde(default = "default_analytics_enabled")]
    pub enabled: bool,
    /// JSONL file for analytics events (empty to disable)
    #[serde(default = "default_analytics_file")]
    pub file: String,
    /// Publish analytics events over MQTT
    #[serde(default)]
    pub mqtt_enabled: bool,
    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
    #[serde(default)]
    pub mqtt_username: Option<String>,
    #[serde(default)]
    pub mqtt_password: Option<String>,
    /// Topic for scan events (QoS 0)
    #[serde(default = "default_analytics_topic")]
    pub topic: String,
    /// Bounded channel capacity; events beyond it are dropped
    #[serde(default = "default_analytics_buffer")]
    pub buffer_size: usize,
}

fn default_analytics_enabled() -> bool {
    true
}

fn default_analytics_file() -> String {
    "analytics.jsonl".to_string()
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_analytics_topic() -> String {
    "kiosk/analytics".to_string()
}

fn default_analytics_buffer() -> usize {
    256
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: default_analytics_enabled(),
            file: default_analytics_file(),
            mqtt_enabled: false,
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            mqtt_username: None,
            mqtt_password: None,
            topic: default_analytics_topic(),
            buffer_size: default_analytics_buffer(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    platform: Platform,
    android_refresh_secs: u64,
    desktop_refresh_secs: u64,
    remount_delay_ms: u64,
    scanner_baud: u32,
    scanner_usb_only: bool,
    store_path: String,
    analytics_enabled: bool,
    analytics_file: String,
    analytics_mqtt_enabled: bool,
    analytics_mqtt_host: String,
    analytics_mqtt_port: u16,
    analytics_mqtt_username: Option<String>,
    analytics_mqtt_password: Option<String>,
    analytics_topic: String,
    analytics_buffer_size: usize,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            site_id: toml_config.site.id,
            platform: toml_config.scanner.platform,
            android_refresh_secs: toml_config.scanner.android_refresh_secs,
            desktop_refresh_secs: toml_config.scanner.desktop_refresh_secs,
            remount_delay_ms: toml_config.scanner.remount_delay_ms,
            scanner_baud: toml_config.scanner.baud,
            scanner_usb_only: toml_config.scanner.usb_only,
            store_path: toml_config.store.path,
            analytics_enabled: toml_config.analytics.enabled,
            analytics_file: toml_config.analytics.file,
            analytics_mqtt_enabled: toml_config.analytics.mqtt_enabled,
            analytics_mqtt_host: toml_config.analytics.mqtt_host,
            analytics_mqtt_port: toml_config.analytics.mqtt_port,
            analytics_mqtt_username: toml_config.analytics.mqtt_username,
            analytics_mqtt_password: toml_config.analytics.mqtt_password,
            analytics_topic: toml_config.analytics.topic,
            analytics_buffer_size: toml_config.analytics.buffer_size,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/kiosk.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(&Self::resolve_config_path(args))
    }

    /// Effective forced-refresh interval for the resolved platform
    pub fn refresh_interval(&self) -> Duration {
        let secs = match self.platform.resolve() {
            Platform::Android => self.android_refresh_secs,
            _ => self.desktop_refresh_secs,
        };
        // A zero interval would make tokio::time::interval panic
        Duration::from_secs(secs.max(1))
    }

    pub fn remount_delay(&self) -> Duration {
        Duration::from_millis(self.remount_delay_ms)
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn scanner_baud(&self) -> u32 {
        self.scanner_baud
    }

    pub fn scanner_usb_only(&self) -> bool {
        self.scanner_usb_only
    }

    pub fn store_path(&self) -> &str {
        &self.store_path
    }

    pub fn analytics_enabled(&self) -> bool {
        self.analytics_enabled
    }

    /// Analytics JSONL file, `None` when disabled with an empty path
    pub fn analytics_file(&self) -> Option<&str> {
        if self.analytics_file.is_empty() {
            None
        } else {
            Some(&self.analytics_file)
        }
    }

    pub fn analytics_mqtt_enabled(&self) -> bool {
        self.analytics_mqtt_enabled
    }

    pub fn analytics_mqtt_host(&self) -> &str {
        &self.analytics_mqtt_host
    }

    pub fn analytics_mqtt_port(&self) -> u16 {
        self.analytics_mqtt_port
    }

    pub fn analytics_mqtt_username(&self) -> Option<&str> {
        self.analytics_mqtt_username.as_deref()
    }

    pub fn analytics_mqtt_password(&self) -> Option<&str> {
        self.analytics_mqtt_password.as_deref()
    }

    pub fn analytics_topic(&self) -> &str {
        &self.analytics_topic
    }

    pub fn analytics_buffer_size(&self) -> usize {
        self.analytics_buffer_size.max(1)
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to force a platform
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site_id(), "kiosk");
        assert_eq!(config.platform(), Platform::Auto);
        assert_eq!(config.scanner_baud(), 9600);
        assert!(config.scanner_usb_only());
        assert_eq!(config.store_path(), "kiosk_state.json");
        assert_eq!(config.analytics_file(), Some("analytics.jsonl"));
        assert!(!config.analytics_mqtt_enabled());
        assert_eq!(config.analytics_topic(), "kiosk/analytics");
        assert_eq!(config.remount_delay(), Duration::from_millis(100));
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_refresh_interval_per_platform() {
        let android = Config::default().with_platform(Platform::Android);
        assert_eq!(android.refresh_interval(), Duration::from_secs(30));

        let desktop = Config::default().with_platform(Platform::Desktop);
        assert_eq!(desktop.refresh_interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_auto_platform_resolves() {
        let resolved = Platform::Auto.resolve();
        if cfg!(target_os = "android") {
            assert_eq!(resolved, Platform::Android);
        } else {
            assert_eq!(resolved, Platform::Desktop);
        }
        assert_eq!(Platform::Android.resolve(), Platform::Android);
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        let args: Vec<String> = vec![
            "checkin-kiosk".to_string(),
            "--config".to_string(),
            "config/entrance.toml".to_string(),
        ];
        assert_eq!(Config::resolve_config_path(&args), "config/entrance.toml");
    }

    #[test]
    fn test_resolve_config_path_from_arg_equals() {
        let args: Vec<String> =
            vec!["checkin-kiosk".to_string(), "--config=config/hall.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/hall.toml");
    }

    #[test]
    fn test_empty_analytics_file_disables_log() {
        let toml_config: TomlConfig = toml::from_str("[analytics]\nfile = \"\"\n").unwrap();
        let config = Config::from_toml(toml_config, "inline");
        assert_eq!(config.analytics_file(), None);
        assert!(config.analytics_enabled());
    }

    #[test]
    fn test_zero_refresh_interval_is_clamped() {
        let toml_config: TomlConfig =
            toml::from_str("[scanner]\nplatform = \"desktop\"\ndesktop_refresh_secs = 0\n")
                .unwrap();
        let config = Config::from_toml(toml_config, "inline");
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }
}
