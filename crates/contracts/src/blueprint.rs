//! SyncBlueprint - Config Loader 输出
//!
//! 描述一次完整的同步实验：运行参数、调制解调器参数、测距参数、会话列表、记录输出、可选的模拟介质。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::{ModemConfig, UsblConfig};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的实验配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 轮次与输出设置
    pub run: RunConfig,

    /// 所有会话共用的调制解调器参数
    #[serde(default)]
    pub modem: ModemSettings,

    /// 测距参数
    #[serde(default)]
    pub ranging: RangingConfig,

    /// 会话列表 (恰好一个 active)
    pub sessions: Vec<SessionConfig>,

    /// 遥测记录输出
    #[serde(default)]
    pub records: Vec<RecordSinkConfig>,

    /// 模拟介质 (可选，无硬件时使用)
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

/// 运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// 同步轮数
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// 输出根目录，每轮在其下建立时间戳目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 执行模式
    #[serde(default)]
    pub mode: ExecutionMode,

    /// active 会话发送的信号文件
    pub signal_file: String,

    /// 参考 (前导) 信号文件，发送时拼接在信号之前
    #[serde(default)]
    pub reference_file: Option<String>,

    /// 首轮之前是否执行接收器预热
    #[serde(default = "default_true")]
    pub prime_receivers: bool,

    /// 预热时长 (毫秒)
    #[serde(default = "default_prime_duration_ms")]
    pub prime_duration_ms: u64,
}

fn default_rounds() -> u32 {
    5
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("signals")
}

fn default_true() -> bool {
    true
}

fn default_prime_duration_ms() -> u64 {
    2000
}

/// 执行模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// 每个 passive 会话一个任务
    #[default]
    Parallel,
    /// 所有会话在同一任务中逐阶段推进
    Lockstep,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Parallel => f.write_str("parallel"),
            ExecutionMode::Lockstep => f.write_str("lockstep"),
        }
    }
}

/// 调制解调器设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemSettings {
    /// 默认端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 每次 expect 的超时 (毫秒)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// 每轮接收样本数
    #[serde(default = "default_rx_samples")]
    pub samples: u32,

    /// USBL 接收头数量
    #[serde(default = "default_usbl_heads")]
    pub usbl_heads: u8,

    /// CONFIG 参数
    #[serde(default)]
    pub config: ModemConfig,

    /// USBL_CONFIG 参数
    #[serde(default)]
    pub usbl: UsblConfig,
}

impl Default for ModemSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            samples: default_rx_samples(),
            usbl_heads: default_usbl_heads(),
            config: ModemConfig::default(),
            usbl: UsblConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    4200
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_rx_samples() -> u32 {
    25_600
}

fn default_usbl_heads() -> u8 {
    4
}

/// 测距参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RangingConfig {
    /// 声速 (米/秒)，水中约 1450，空气中约 340
    #[serde(default = "default_sound_speed")]
    pub sound_speed_mps: f64,

    /// 参考信号样本数，rx 时间戳需要减去
    #[serde(default = "default_reference_samples")]
    pub reference_samples: u32,
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            sound_speed_mps: default_sound_speed(),
            reference_samples: default_reference_samples(),
        }
    }
}

fn default_sound_speed() -> f64 {
    1450.0
}

fn default_reference_samples() -> u32 {
    16_384
}

/// 会话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Active,
    Passive,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Active => f.write_str("active"),
            Role::Passive => f.write_str("passive"),
        }
    }
}

/// 单个会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 唯一名称，用于文件名
    pub name: String,

    /// 设备地址
    pub host: String,

    /// 端口，缺省使用 modem.port
    #[serde(default)]
    pub port: Option<u16>,

    pub role: Role,
}

/// 遥测记录输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSinkConfig {
    /// 名称
    pub name: String,

    /// 类型
    pub sink_type: RecordSinkType,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// 记录输出类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSinkType {
    /// 每轮目录下写 systime-<name>.txt
    File,
    /// 写入日志
    Log,
}

/// 模拟介质配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 模拟声速 (米/秒)
    #[serde(default = "default_sound_speed")]
    pub sound_speed_mps: f64,

    /// 外部同步脉冲周期 (毫秒)
    #[serde(default = "default_sync_period_ms")]
    pub sync_period_ms: u64,

    /// 每次接收结束后额外发送的 STOP 个数
    #[serde(default = "default_extra_stops")]
    pub extra_stops: u8,

    /// 设备列表，按 host 与会话匹配
    #[serde(default)]
    pub devices: Vec<SimulatedDevice>,
}

fn default_sync_period_ms() -> u64 {
    1000
}

fn default_extra_stops() -> u8 {
    1
}

/// 模拟设备
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedDevice {
    pub host: String,

    /// 一维位置 (米)
    #[serde(default)]
    pub position_m: f64,

    /// 设备时钟相对全局时钟的偏移 (微秒，回绕)
    #[serde(default)]
    pub clock_offset: u32,
}

impl SyncBlueprint {
    /// active 会话
    pub fn active(&self) -> Option<&SessionConfig> {
        self.sessions.iter().find(|s| s.role == Role::Active)
    }

    /// 所有 passive 会话，保持配置顺序
    pub fn passives(&self) -> impl Iterator<Item = &SessionConfig> {
        self.sessions.iter().filter(|s| s.role == Role::Passive)
    }

    /// 会话的实际端口
    pub fn port_of(&self, session: &SessionConfig) -> u16 {
        session.port.unwrap_or(self.modem.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> SyncBlueprint {
        SyncBlueprint {
            version: ConfigVersion::V1,
            run: RunConfig {
                rounds: 1,
                output_dir: PathBuf::from("out"),
                mode: ExecutionMode::Parallel,
                signal_file: "signal.dat".into(),
                reference_file: None,
                prime_receivers: false,
                prime_duration_ms: 0,
            },
            modem: ModemSettings::default(),
            ranging: RangingConfig::default(),
            sessions: vec![
                SessionConfig {
                    name: "a".into(),
                    host: "10.0.0.1".into(),
                    port: None,
                    role: Role::Active,
                },
                SessionConfig {
                    name: "p1".into(),
                    host: "10.0.0.2".into(),
                    port: Some(4201),
                    role: Role::Passive,
                },
            ],
            records: vec![],
            simulation: None,
        }
    }

    #[test]
    fn roles_and_ports() {
        let blueprint = sample_blueprint();
        assert_eq!(blueprint.active().map(|s| s.name.as_str()), Some("a"));
        assert_eq!(blueprint.passives().count(), 1);
        assert_eq!(blueprint.port_of(&blueprint.sessions[0]), 4200);
        assert_eq!(blueprint.port_of(&blueprint.sessions[1]), 4201);
    }

    #[test]
    fn toml_defaults() {
        let text = r#"
[run]
signal_file = "sig.dat"

[[sessions]]
name = "a"
host = "127.0.0.1"
role = "active"
"#;
        let blueprint: SyncBlueprint = toml::from_str(text).unwrap();
        assert_eq!(blueprint.run.rounds, 5);
        assert_eq!(blueprint.run.mode, ExecutionMode::Parallel);
        assert_eq!(blueprint.modem.usbl_heads, 4);
        assert_eq!(blueprint.modem.config.threshold, 350);
        assert_eq!(blueprint.modem.usbl.samples, 25_600);
        assert_eq!(blueprint.ranging.reference_samples, 16_384);
        assert!(blueprint.simulation.is_none());
    }
}
