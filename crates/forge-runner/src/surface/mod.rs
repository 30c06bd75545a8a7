pub mod external;

use forge_bot::ChatSurface;
use forge_core::model::table::ProbabilityTable;
use forge_core::sim::{SimConfig, SimulatedGame};
use rand::Rng;
use tracing::{Level, event};

use crate::config::{CommandsConfig, SurfaceConfig, SurfaceKind, ValidationError};

pub use external::{ExternalOptions, ExternalSurface};

/// Validated recipe for the surface a session will drive.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceBlueprint {
    External(ExternalOptions),
    Simulated(SimConfig),
}

impl SurfaceBlueprint {
    pub fn from_config(
        surface: &SurfaceConfig,
        commands: &CommandsConfig,
    ) -> Result<Self, ValidationError> {
        match surface.kind {
            SurfaceKind::External => Ok(SurfaceBlueprint::External(
                ExternalOptions::from_params(&surface.params)?,
            )),
            SurfaceKind::Simulated => {
                let params = if surface.params.is_null() {
                    serde_yaml::Value::Mapping(Default::default())
                } else {
                    surface.params.clone()
                };
                let mut sim: SimConfig = serde_yaml::from_value(params).map_err(|err| {
                    ValidationError::InvalidField {
                        field: "surface.params".to_string(),
                        message: err.to_string(),
                    }
                })?;
                sim.seed = surface.seed.unwrap_or_else(|| rand::thread_rng().r#gen());
                sim.enhance_command = commands.enhance.clone();
                sim.sell_command = commands.sell.clone();
                Ok(SurfaceBlueprint::Simulated(sim))
            }
        }
    }

    pub fn kind(&self) -> SurfaceKind {
        match self {
            SurfaceBlueprint::External(_) => SurfaceKind::External,
            SurfaceBlueprint::Simulated(_) => SurfaceKind::Simulated,
        }
    }

    pub fn build(&self, table: &ProbabilityTable) -> Box<dyn ChatSurface> {
        match self {
            SurfaceBlueprint::External(options) => {
                event!(
                    target: "forge_runner::surface",
                    Level::INFO,
                    command = %options.command,
                    "driving external chat bridge"
                );
                Box::new(ExternalSurface::new(options.clone()))
            }
            SurfaceBlueprint::Simulated(config) => {
                event!(
                    target: "forge_runner::surface",
                    Level::INFO,
                    seed = config.seed,
                    starting_gold = config.starting_gold,
                    "driving simulated game"
                );
                Box::new(SimulatedGame::new(table.clone(), config.clone()))
            }
        }
    }
}
