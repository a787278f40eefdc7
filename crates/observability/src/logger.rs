//! 场景日志：按显式掩码过滤的分类日志
//!
//! 掩码值在启动时构造一次，以引用方式传递；启用的消息转发到 tracing。

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// 日志类别位掩码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogMask(u16);

impl LogMask {
    pub const FATAL: LogMask = LogMask(0x0001);
    pub const ERR: LogMask = LogMask(0x0002);
    pub const WARN: LogMask = LogMask(0x0004);
    pub const INFO: LogMask = LogMask(0x0008);
    pub const NOTE: LogMask = LogMask(0x0010);
    pub const DEBUG: LogMask = LogMask(0x0020);
    pub const TRACE: LogMask = LogMask(0x0040);
    pub const DATA: LogMask = LogMask(0x0080);
    pub const LOCATION: LogMask = LogMask(0x0100);
    pub const ASYNC: LogMask = LogMask(0x0200);

    pub const NONE: LogMask = LogMask(0);
    pub const ALL: LogMask = LogMask(0x03ff);

    const NAMES: [(&'static str, LogMask); 10] = [
        ("fatal", Self::FATAL),
        ("err", Self::ERR),
        ("warn", Self::WARN),
        ("info", Self::INFO),
        ("note", Self::NOTE),
        ("debug", Self::DEBUG),
        ("trace", Self::TRACE),
        ("data", Self::DATA),
        ("location", Self::LOCATION),
        ("async", Self::ASYNC),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn from_bits(bits: u16) -> Self {
        LogMask(bits & Self::ALL.0)
    }

    pub const fn contains(self, other: LogMask) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl Default for LogMask {
    fn default() -> Self {
        Self::FATAL | Self::ERR | Self::WARN
    }
}

impl BitOr for LogMask {
    type Output = LogMask;

    fn bitor(self, rhs: LogMask) -> LogMask {
        LogMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for LogMask {
    fn bitor_assign(&mut self, rhs: LogMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for LogMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(_, bit)| self.contains(*bit))
            .map(|(name, _)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

impl FromStr for LogMask {
    type Err = String;

    /// `"fatal|err|warn"`, `"all"`, `"none"` 或数值 (`0x1f`, `31`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x") {
            return u16::from_str_radix(hex, 16)
                .map(LogMask::from_bits)
                .map_err(|e| format!("bad log mask '{}': {}", s, e));
        }
        if let Ok(bits) = s.parse::<u16>() {
            return Ok(LogMask::from_bits(bits));
        }
        let mut mask = LogMask::NONE;
        for part in s.split(['|', ',']).map(str::trim).filter(|p| !p.is_empty()) {
            mask |= match part.to_ascii_lowercase().as_str() {
                "all" => LogMask::ALL,
                "none" => LogMask::NONE,
                name => Self::NAMES
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, bit)| *bit)
                    .ok_or_else(|| format!("unknown log category '{}'", part))?,
            };
        }
        Ok(mask)
    }
}

/// 按掩码过滤的场景日志
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioLogger {
    mask: LogMask,
}

impl ScenarioLogger {
    pub fn new(mask: LogMask) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> LogMask {
        self.mask
    }

    pub fn enabled(&self, category: LogMask) -> bool {
        self.mask.contains(category)
    }

    /// 记录一条消息；返回是否被输出
    pub fn log(&self, category: LogMask, message: impl fmt::Display) -> bool {
        if !self.enabled(category) {
            return false;
        }
        let category_name = category.to_string();
        match category {
            LogMask::FATAL | LogMask::ERR => {
                tracing::error!(category = %category_name, "{}", message)
            }
            LogMask::WARN => tracing::warn!(category = %category_name, "{}", message),
            LogMask::INFO | LogMask::NOTE => {
                tracing::info!(category = %category_name, "{}", message)
            }
            LogMask::DEBUG => tracing::debug!(category = %category_name, "{}", message),
            _ => tracing::trace!(category = %category_name, "{}", message),
        }
        true
    }

    pub fn note(&self, message: impl fmt::Display) -> bool {
        self.log(LogMask::NOTE, message)
    }

    pub fn info(&self, message: impl fmt::Display) -> bool {
        self.log(LogMask::INFO, message)
    }

    pub fn warn(&self, message: impl fmt::Display) -> bool {
        self.log(LogMask::WARN, message)
    }

    pub fn error(&self, message: impl fmt::Display) -> bool {
        self.log(LogMask::ERR, message)
    }
}
