use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::time::Duration;

pub const SKULL: &str = "💀";
pub const PHONE: &str = "📱";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub wheel: WheelConfig,
    #[serde(default)]
    pub spin: SpinConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub requests: RequestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub label: String,
    /// Amount credited when the wheel stops on this category; 0 = no cash win.
    #[serde(default)]
    pub payout: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightingConfig {
    /// Labels of the categories forming the favored group.
    pub favored: Vec<String>,
    /// Probability that a spin lands in the favored group.
    pub favored_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelConfig {
    pub categories: Vec<CategoryConfig>,
    /// One category label per sector, clockwise from 0°.
    pub sectors: Vec<String>,
    pub weighting: WeightingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinConfig {
    pub paid_cost: i64,
    pub bundle_cost: i64,
    pub bundle_size: u32,
    pub bundle_gap_ms: u64,
    pub min_turns: u32,
    pub max_turns: u32,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub frame_interval_ms: u64,
    /// Full jitter range as a fraction of the sector width.
    pub jitter_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub starting_grant: i64,
    pub bonus_per_referral: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub grace_window_ms: u64,
    pub write_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub min_deposit: i64,
    pub min_withdrawal: i64,
    pub payment_method: String,
}

impl Default for WheelConfig {
    fn default() -> Self {
        let sectors = (0..8)
            .map(|i| if i % 2 == 0 { PHONE } else { SKULL }.to_string())
            .collect();
        Self {
            categories: vec![
                CategoryConfig {
                    label: PHONE.to_string(),
                    payout: 0,
                },
                CategoryConfig {
                    label: SKULL.to_string(),
                    payout: 0,
                },
            ],
            sectors,
            weighting: WeightingConfig {
                favored: vec![SKULL.to_string()],
                favored_probability: 1.0,
            },
        }
    }
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            paid_cost: 100,
            bundle_cost: 1000,
            bundle_size: 1,
            bundle_gap_ms: 160,
            min_turns: 6,
            max_turns: 8,
            min_duration_ms: 3000,
            max_duration_ms: 3600,
            frame_interval_ms: 16,
            jitter_fraction: 0.3,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_grant: 1,
            bonus_per_referral: 1,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_window_ms: 1200,
            write_timeout_ms: 10_000,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            min_deposit: 10,
            min_withdrawal: 1000,
            payment_method: "Easypaisa".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::from_toml_str(&config_str)?,
            // 无配置文件：使用默认值，再由环境变量覆盖
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No config file at {config_path}, using defaults");
                Config::default()
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Unable to read config file {config_path}: {e}"
                )));
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> AppResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env_overrides(&mut self) {
        fn parse<T: std::str::FromStr>(name: &str) -> Option<T> {
            env::var(name).ok().and_then(|v| v.parse::<T>().ok())
        }

        if let Some(v) = parse("SPIN_PAID_COST") {
            self.spin.paid_cost = v;
        }
        if let Some(v) = parse("SPIN_BUNDLE_COST") {
            self.spin.bundle_cost = v;
        }
        if let Some(v) = parse("SPIN_BUNDLE_SIZE") {
            self.spin.bundle_size = v;
        }
        if let Some(v) = parse("SPIN_MIN_DURATION_MS") {
            self.spin.min_duration_ms = v;
        }
        if let Some(v) = parse("SPIN_MAX_DURATION_MS") {
            self.spin.max_duration_ms = v;
        }
        if let Some(v) = parse("WHEEL_FAVORED_PROBABILITY") {
            self.wheel.weighting.favored_probability = v;
        }
        if let Some(v) = parse("LEDGER_STARTING_GRANT") {
            self.ledger.starting_grant = v;
        }
        if let Some(v) = parse("LEDGER_BONUS_PER_REFERRAL") {
            self.ledger.bonus_per_referral = v;
        }
        if let Some(v) = parse("SESSION_GRACE_WINDOW_MS") {
            self.session.grace_window_ms = v;
        }
        if let Some(v) = parse("SESSION_WRITE_TIMEOUT_MS") {
            self.session.write_timeout_ms = v;
        }
        if let Some(v) = parse("REQUESTS_MIN_DEPOSIT") {
            self.requests.min_deposit = v;
        }
        if let Some(v) = parse("REQUESTS_MIN_WITHDRAWAL") {
            self.requests.min_withdrawal = v;
        }
        if let Ok(v) = env::var("REQUESTS_PAYMENT_METHOD") {
            self.requests.payment_method = v;
        }
    }

    /// Checks every invariant the engine relies on at runtime.
    pub fn validate(&self) -> AppResult<()> {
        let wheel = &self.wheel;
        if wheel.sectors.is_empty() {
            return Err(AppError::ConfigError("Wheel needs at least one sector".into()));
        }

        let mut labels = HashSet::new();
        for category in &wheel.categories {
            if category.payout < 0 {
                return Err(AppError::ConfigError(format!(
                    "Category {} has a negative payout",
                    category.label
                )));
            }
            if !labels.insert(category.label.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate category label {}",
                    category.label
                )));
            }
        }
        for label in &wheel.sectors {
            if !labels.contains(label.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Sector references unknown category {label}"
                )));
            }
        }
        for category in &wheel.categories {
            if !wheel.sectors.iter().any(|s| s == &category.label) {
                return Err(AppError::ConfigError(format!(
                    "Category {} has no sector on the wheel",
                    category.label
                )));
            }
        }

        let p = wheel.weighting.favored_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(AppError::ConfigError(format!(
                "favored_probability must be within [0, 1], got {p}"
            )));
        }
        for label in &wheel.weighting.favored {
            if !labels.contains(label.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Weighting references unknown category {label}"
                )));
            }
        }

        let spin = &self.spin;
        if spin.paid_cost < 0 || spin.bundle_cost < 0 {
            return Err(AppError::ConfigError("Spin costs must not be negative".into()));
        }
        if spin.min_turns > spin.max_turns {
            return Err(AppError::ConfigError("min_turns exceeds max_turns".into()));
        }
        if spin.min_duration_ms == 0 || spin.min_duration_ms > spin.max_duration_ms {
            return Err(AppError::ConfigError("Invalid spin duration window".into()));
        }
        if spin.frame_interval_ms == 0 {
            return Err(AppError::ConfigError("frame_interval_ms must be positive".into()));
        }
        // 抖动必须严格小于半个扇区
        if !(0.0..1.0).contains(&spin.jitter_fraction) {
            return Err(AppError::ConfigError(
                "jitter_fraction must be within [0, 1)".into(),
            ));
        }

        if self.ledger.starting_grant < 0 || self.ledger.bonus_per_referral < 0 {
            return Err(AppError::ConfigError("Ledger grants must not be negative".into()));
        }
        if self.requests.min_deposit <= 0 || self.requests.min_withdrawal <= 0 {
            return Err(AppError::ConfigError("Request minimums must be positive".into()));
        }

        Ok(())
    }
}
