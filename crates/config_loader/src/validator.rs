//! 配置校验模块
//!
//! 校验规则：
//! - 会话名称唯一且非空 (名称会出现在文件名中)
//! - 恰好一个 active 会话
//! - CONFIG / USBL_CONFIG 参数在设备允许范围内
//! - USBL 接收头数量 1..=5
//! - 每轮接收样本数 > 0 且不超过 24 位字段
//! - 超时、轮数、声速 > 0
//! - 模拟介质覆盖所有会话地址

use std::collections::HashSet;

use contracts::{
    ContractError, Role, SyncBlueprint, MAX_STREAM_SAMPLES, MAX_USBL_HEADS,
};

/// 校验 SyncBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    validate_run(blueprint)?;
    validate_sessions(blueprint)?;
    validate_modem(blueprint)?;
    validate_ranging(blueprint)?;
    validate_records(blueprint)?;
    validate_simulation(blueprint)?;
    Ok(())
}

fn validate_run(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let run = &blueprint.run;
    if run.rounds == 0 {
        return Err(ContractError::config_validation(
            "run.rounds",
            "rounds must be > 0",
        ));
    }
    if run.signal_file.trim().is_empty() {
        return Err(ContractError::config_validation(
            "run.signal_file",
            "signal_file cannot be empty",
        ));
    }
    if run.prime_receivers && run.prime_duration_ms == 0 {
        return Err(ContractError::config_validation(
            "run.prime_duration_ms",
            "prime_duration_ms must be > 0 when prime_receivers is set",
        ));
    }
    Ok(())
}

/// 校验会话名称唯一性与角色
fn validate_sessions(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, session) in blueprint.sessions.iter().enumerate() {
        if session.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sessions[{}].name", idx),
                "session name cannot be empty",
            ));
        }
        if session.name.contains(['/', '\\']) {
            return Err(ContractError::config_validation(
                format!("sessions[{}].name", idx),
                format!("session name '{}' cannot contain path separators", session.name),
            ));
        }
        if !seen.insert(session.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sessions[name={}]", session.name),
                "duplicate session name",
            ));
        }
        if session.host.is_empty() {
            return Err(ContractError::config_validation(
                format!("sessions[{}].host", session.name),
                "host cannot be empty",
            ));
        }
    }

    let actives = blueprint
        .sessions
        .iter()
        .filter(|s| s.role == Role::Active)
        .count();
    if actives != 1 {
        return Err(ContractError::config_validation(
            "sessions",
            format!("exactly one active session required, found {}", actives),
        ));
    }
    Ok(())
}

/// 校验调制解调器参数
fn validate_modem(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let modem = &blueprint.modem;
    modem.config.validate().map_err(in_modem)?;
    modem.usbl.validate().map_err(in_modem)?;

    if modem.usbl_heads == 0 || modem.usbl_heads > MAX_USBL_HEADS {
        return Err(ContractError::config_validation(
            "modem.usbl_heads",
            format!(
                "usbl_heads must be within 1..={}, got {}",
                MAX_USBL_HEADS, modem.usbl_heads
            ),
        ));
    }
    if modem.samples == 0 || modem.samples > MAX_STREAM_SAMPLES {
        return Err(ContractError::config_validation(
            "modem.samples",
            format!(
                "samples must be within 1..={}, got {}",
                MAX_STREAM_SAMPLES, modem.samples
            ),
        ));
    }
    if modem.timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "modem.timeout_ms",
            "timeout_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_ranging(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let speed = blueprint.ranging.sound_speed_mps;
    if !speed.is_finite() || speed <= 0.0 {
        return Err(ContractError::config_validation(
            "ranging.sound_speed_mps",
            format!("sound_speed_mps must be > 0, got {}", speed),
        ));
    }
    Ok(())
}

/// 校验记录输出配置
fn validate_records(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    for (idx, sink) in blueprint.records.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("records[{}].name", idx),
                "record sink name cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 校验模拟介质
fn validate_simulation(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let Some(simulation) = &blueprint.simulation else {
        return Ok(());
    };

    if !simulation.sound_speed_mps.is_finite() || simulation.sound_speed_mps <= 0.0 {
        return Err(ContractError::config_validation(
            "simulation.sound_speed_mps",
            format!(
                "sound_speed_mps must be > 0, got {}",
                simulation.sound_speed_mps
            ),
        ));
    }

    let hosts: HashSet<_> = simulation.devices.iter().map(|d| d.host.as_str()).collect();
    for session in &blueprint.sessions {
        if !hosts.contains(session.host.as_str()) {
            return Err(ContractError::config_validation(
                "simulation.devices",
                format!(
                    "no simulated device for session '{}' at host '{}'",
                    session.name, session.host
                ),
            ));
        }
    }
    Ok(())
}

fn in_modem(err: ContractError) -> ContractError {
    match err {
        ContractError::InvalidParameter { field, message } => {
            ContractError::config_validation(format!("modem.{}", field), message)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_toml;

    const BASE: &str = r#"
[run]
signal_file = "raw:signal.raw"
prime_receivers = false

[modem]
samples = 4096
usbl_heads = 3

[[sessions]]
name = "buoy"
host = "10.0.0.1"
role = "active"

[[sessions]]
name = "rov"
host = "10.0.0.2"
role = "passive"
"#;

    fn base() -> SyncBlueprint {
        parse_toml(BASE).unwrap()
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_blueprint() {
        assert!(validate(&base()).is_ok());
    }

    #[test]
    fn test_duplicate_session_name() {
        let mut bp = base();
        bp.sessions[1].name = "buoy".into();
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_requires_exactly_one_active() {
        let mut bp = base();
        bp.sessions[1].role = Role::Active;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "sessions");

        let mut bp = base();
        bp.sessions[0].role = Role::Passive;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "sessions");
    }

    #[test]
    fn test_modem_ranges() {
        let mut bp = base();
        bp.modem.config.threshold = 4096;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "modem.config.threshold"
        );

        let mut bp = base();
        bp.modem.config.preamp_gain = 14;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "modem.config.preamp_gain"
        );

        let mut bp = base();
        bp.modem.usbl.samples = 1000;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "modem.usbl.samples");
    }

    #[test]
    fn test_head_count_and_samples() {
        let mut bp = base();
        bp.modem.usbl_heads = 6;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "modem.usbl_heads");

        let mut bp = base();
        bp.modem.samples = MAX_STREAM_SAMPLES + 1;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "modem.samples");

        let mut bp = base();
        bp.modem.timeout_ms = 0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "modem.timeout_ms");
    }

    #[test]
    fn test_run_and_ranging() {
        let mut bp = base();
        bp.run.rounds = 0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "run.rounds");

        let mut bp = base();
        bp.ranging.sound_speed_mps = 0.0;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "ranging.sound_speed_mps"
        );
    }

    #[test]
    fn test_simulation_must_cover_sessions() {
        let content = format!(
            "{}\n{}",
            BASE,
            r#"
[simulation]
sync_period_ms = 500

[[simulation.devices]]
host = "10.0.0.1"
"#
        );
        let bp = parse_toml(&content).unwrap();
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("rov"));
    }
}
