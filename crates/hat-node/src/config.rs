//! # 节点配置
//!
//! 节点地址、时序参数和硬件映射（组件表），从 TOML 加载。
//!
//! ```toml
//! node_address = 16
//! heartbeat_period_ms = 100
//!
//! [[components]]
//! address = 0x20
//! kind = "sensor"
//! mandatory = true
//! name = "imu"
//! ```

use crate::registry::HAT_MAX_COMPONENTS;
use hat_protocol::{
    BROADCAST_ADDRESS, ComponentConfig, DEFAULT_NODE_ADDRESS, DEFAULT_SUPERVISOR_ADDRESS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// 配置加载 / 校验错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 组件类型，决定 CONFIG 指令的取值范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// 传感器：模式 0-3，参数为采样周期 1-60000 ms
    Sensor,
    /// 执行器：模式 0-2，参数为设定值 -10000..=10000
    Actuator,
    /// 指示器：模式 0-1，参数为亮度 0-255
    Indicator,
}

impl ComponentKind {
    pub fn max_mode(self) -> u8 {
        match self {
            ComponentKind::Sensor => 3,
            ComponentKind::Actuator => 2,
            ComponentKind::Indicator => 1,
        }
    }

    pub fn parameter_range(self) -> std::ops::RangeInclusive<i32> {
        match self {
            ComponentKind::Sensor => 1..=60_000,
            ComponentKind::Actuator => -10_000..=10_000,
            ComponentKind::Indicator => 0..=255,
        }
    }

    /// 校验配置载荷，返回失败原因
    pub fn validate(self, config: &ComponentConfig) -> Result<(), &'static str> {
        if config.mode > self.max_mode() {
            return Err("mode out of range");
        }
        match config.parameter {
            Some(p) if !self.parameter_range().contains(&p) => Err("parameter out of range"),
            _ => Ok(()),
        }
    }
}

/// 硬件映射中的一个组件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub address: u16,
    pub kind: ComponentKind,

    /// 进入 RUNNING 前必须在线且已使能
    #[serde(default)]
    pub mandatory: bool,

    /// 安全模式下保持使能状态
    #[serde(default)]
    pub safe_mode_exempt: bool,

    #[serde(default)]
    pub name: String,
}

impl ComponentSpec {
    pub fn new(address: u16, kind: ComponentKind) -> Self {
        Self {
            address,
            kind,
            mandatory: false,
            safe_mode_exempt: false,
            name: String::new(),
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn safe_mode_exempt(mut self) -> Self {
        self.safe_mode_exempt = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// 节点配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HatConfig {
    /// 本节点总线地址
    pub node_address: u8,
    /// 监控器总线地址
    pub supervisor_address: u8,
    /// 心跳周期（ms）
    pub heartbeat_period_ms: u64,
    /// 组件在线判定窗口（ms）
    pub liveness_timeout_ms: u64,
    /// 监控器心跳丢失判定（ms），0 表示不监控
    pub supervisor_timeout_ms: u64,
    /// 每个周期最多处理的接收帧数
    pub rx_queue_depth: usize,
    /// 调度周期（ms），仅供外部循环参考
    pub tick_period_ms: u64,
    /// 急停复位令牌
    pub reset_token: u16,
    /// 硬件映射
    pub components: Vec<ComponentSpec>,
}

impl Default for HatConfig {
    fn default() -> Self {
        Self {
            node_address: DEFAULT_NODE_ADDRESS,
            supervisor_address: DEFAULT_SUPERVISOR_ADDRESS,
            heartbeat_period_ms: 100,
            liveness_timeout_ms: 500,
            supervisor_timeout_ms: 1000,
            rx_queue_depth: 32,
            tick_period_ms: 10,
            reset_token: 0xA5C3,
            components: Vec::new(),
        }
    }
}

impl HatConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: HatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn with_components(mut self, components: Vec<ComponentSpec>) -> Self {
        self.components = components;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_address == BROADCAST_ADDRESS {
            return Err(ConfigError::Invalid(
                "node_address must not be the broadcast address".into(),
            ));
        }
        if self.node_address == self.supervisor_address {
            return Err(ConfigError::Invalid(format!(
                "node_address 0x{:02X} collides with supervisor_address",
                self.node_address
            )));
        }
        if self.heartbeat_period_ms == 0
            || self.liveness_timeout_ms == 0
            || self.tick_period_ms == 0
        {
            return Err(ConfigError::Invalid("periods must be non-zero".into()));
        }
        if self.rx_queue_depth == 0 {
            return Err(ConfigError::Invalid("rx_queue_depth must be non-zero".into()));
        }
        if self.components.len() > HAT_MAX_COMPONENTS {
            return Err(ConfigError::Invalid(format!(
                "{} components declared, at most {} supported",
                self.components.len(),
                HAT_MAX_COMPONENTS
            )));
        }

        let mut seen = HashSet::new();
        for spec in &self.components {
            if !seen.insert(spec.address) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate component address 0x{:04X}",
                    spec.address
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HatConfig::default();
        assert_eq!(config.node_address, 0x10);
        assert_eq!(config.supervisor_address, 0x00);
        assert_eq!(config.liveness_timeout_ms, 500);
        assert_eq!(config.reset_token, 0xA5C3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = HatConfig::from_toml_str(
            r#"
            node_address = 0x12
            supervisor_timeout_ms = 0

            [[components]]
            address = 0x20
            kind = "sensor"
            mandatory = true
            name = "imu"

            [[components]]
            address = 0x21
            kind = "indicator"
            safe_mode_exempt = true
            "#,
        )
        .unwrap();

        assert_eq!(config.node_address, 0x12);
        assert_eq!(config.supervisor_timeout_ms, 0);
        assert_eq!(config.heartbeat_period_ms, 100);
        assert_eq!(config.components.len(), 2);
        assert!(config.components[0].mandatory);
        assert_eq!(config.components[0].name, "imu");
        assert_eq!(config.components[1].kind, ComponentKind::Indicator);
        assert!(config.components[1].safe_mode_exempt);
        assert!(!config.components[1].mandatory);
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let err = HatConfig::from_toml_str(
            r#"
            [[components]]
            address = 1
            kind = "teleporter"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_addresses() {
        let config = HatConfig {
            node_address: BROADCAST_ADDRESS,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HatConfig {
            node_address: 0x00,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_overflow() {
        let config = HatConfig::default().with_components(vec![
            ComponentSpec::new(0x20, ComponentKind::Sensor),
            ComponentSpec::new(0x20, ComponentKind::Actuator),
        ]);
        assert!(config.validate().is_err());

        let too_many = (0..=HAT_MAX_COMPONENTS as u16)
            .map(|a| ComponentSpec::new(a, ComponentKind::Sensor))
            .collect();
        assert!(HatConfig::default().with_components(too_many).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = HatConfig {
            rx_queue_depth: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hat.toml");
        std::fs::write(&path, "node_address = 0x11\n").unwrap();
        let config = HatConfig::load(&path).unwrap();
        assert_eq!(config.node_address, 0x11);

        assert!(matches!(
            HatConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_component_kind_ranges() {
        let sensor = ComponentKind::Sensor;
        assert!(sensor.validate(&ComponentConfig::new(3).with_parameter(100)).is_ok());
        assert!(sensor.validate(&ComponentConfig::new(4)).is_err());
        assert!(sensor.validate(&ComponentConfig::new(0).with_parameter(0)).is_err());

        let actuator = ComponentKind::Actuator;
        assert!(actuator.validate(&ComponentConfig::new(2).with_parameter(-10_000)).is_ok());
        assert!(actuator.validate(&ComponentConfig::new(1).with_parameter(10_001)).is_err());

        let indicator = ComponentKind::Indicator;
        assert!(indicator.validate(&ComponentConfig::new(1).with_parameter(255)).is_ok());
        assert!(indicator.validate(&ComponentConfig::new(1).with_parameter(256)).is_err());
        assert!(indicator.validate(&ComponentConfig::new(0)).is_ok());
    }
}
