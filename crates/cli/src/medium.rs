//! Simulated medium selection for commands without device transports.

use contracts::{SimulatedDevice, SimulationConfig, SyncBlueprint};

use crate::error::CliError;

/// Spacing between derived simulated devices, in metres.
const DERIVED_SPACING_M: f64 = 100.0;

/// The simulation to run `blueprint` against.
///
/// A configured `[simulation]` section wins. With `force` and no section,
/// one device per session host is placed on a line, `DERIVED_SPACING_M` apart.
pub fn simulation_for(
    blueprint: &SyncBlueprint,
    force: bool,
) -> Result<SimulationConfig, CliError> {
    if let Some(simulation) = &blueprint.simulation {
        return Ok(simulation.clone());
    }
    if !force {
        let session = blueprint
            .sessions
            .first()
            .map(|s| (s.name.clone(), s.host.clone()))
            .unwrap_or_default();
        return Err(CliError::no_transport(session.0, session.1));
    }

    let mut devices: Vec<SimulatedDevice> = Vec::new();
    for session in &blueprint.sessions {
        if devices.iter().any(|d| d.host == session.host) {
            continue;
        }
        devices.push(SimulatedDevice {
            host: session.host.clone(),
            position_m: devices.len() as f64 * DERIVED_SPACING_M,
            clock_offset: (devices.len() as u32).wrapping_mul(1_000_003),
        });
    }

    Ok(SimulationConfig {
        sound_speed_mps: blueprint.ranging.sound_speed_mps,
        sync_period_ms: 1000,
        extra_stops: 1,
        devices,
    })
}
