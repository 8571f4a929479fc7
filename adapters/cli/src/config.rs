//! TOML session description and its conversion into validated core types.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use beatshot_core::{
    AgentConfig, Extrema, GameModeIdentity, GridConfig, LearningMode, RecentMemoryPolicy, Vertex,
};
use serde::Deserialize;

/// Everything a headless session needs, as written in the config file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionFile {
    pub(crate) session: SessionSection,
    pub(crate) grid: GridSection,
    pub(crate) agent: AgentSection,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionSection {
    pub(crate) game_mode: String,
    pub(crate) custom_game_mode: String,
    pub(crate) beat_interval_ms: u64,
    pub(crate) target_scale: f32,
    /// Beats a target stays alive before the player outcome is decided.
    pub(crate) target_lifetime_beats: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            game_mode: "MultiBeat".to_owned(),
            custom_game_mode: String::new(),
            beat_interval_ms: 500,
            target_scale: 1.0,
            target_lifetime_beats: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GridSection {
    pub(crate) origin: [i32; 3],
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) cell_width: u32,
    pub(crate) cell_height: u32,
    pub(crate) min_distance_between_targets: f32,
    pub(crate) allow_activation_while_activated: bool,
    pub(crate) recent: RecentSection,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            origin: [3700, -1000, 160],
            width: 2000,
            height: 1000,
            cell_width: 40,
            cell_height: 40,
            min_distance_between_targets: 10.0,
            allow_activation_while_activated: false,
            recent: RecentSection::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub(crate) enum RecentSection {
    None,
    TimeBased { duration_ms: u64 },
    CountBased { max_recent: usize },
}

impl Default for RecentSection {
    fn default() -> Self {
        Self::CountBased { max_recent: 10 }
    }
}

impl From<RecentSection> for RecentMemoryPolicy {
    fn from(section: RecentSection) -> Self {
        match section {
            RecentSection::None => Self::None,
            RecentSection::TimeBased { duration_ms } => Self::TimeBased {
                duration: Duration::from_millis(duration_ms),
            },
            RecentSection::CountBased { max_recent } => Self::CountBased { max_recent },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ModeSection {
    Disabled,
    Training,
    Exploration,
    ActiveAgent,
}

impl From<ModeSection> for LearningMode {
    fn from(section: ModeSection) -> Self {
        match section {
            ModeSection::Disabled => Self::Disabled,
            ModeSection::Training => Self::Training,
            ModeSection::Exploration => Self::Exploration,
            ModeSection::ActiveAgent => Self::ActiveAgent,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AgentSection {
    pub(crate) mode: ModeSection,
    pub(crate) alpha: f32,
    pub(crate) gamma: f32,
    pub(crate) epsilon: f32,
    pub(crate) coarse_columns: usize,
    pub(crate) coarse_rows: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            mode: ModeSection::ActiveAgent,
            alpha: AgentConfig::DEFAULT_ALPHA,
            gamma: AgentConfig::DEFAULT_GAMMA,
            epsilon: AgentConfig::DEFAULT_EPSILON,
            coarse_columns: AgentConfig::DEFAULT_COARSE_DIMENSION,
            coarse_rows: AgentConfig::DEFAULT_COARSE_DIMENSION,
        }
    }
}

impl SessionFile {
    /// Reads and parses a session file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub(crate) fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub(crate) fn identity(&self) -> GameModeIdentity {
        GameModeIdentity::new(
            self.session.game_mode.as_str(),
            self.session.custom_game_mode.as_str(),
        )
    }

    pub(crate) fn beat_interval(&self) -> Duration {
        Duration::from_millis(self.session.beat_interval_ms)
    }

    pub(crate) fn grid_config(&self) -> Result<GridConfig> {
        let grid = &self.grid;
        let [x, y, z] = grid.origin;
        let min = Vertex::new(x, y, z);
        let bounds = Extrema::new(min, min.offset(grid.width, grid.height));
        let config = GridConfig::new(
            bounds,
            grid.cell_width,
            grid.cell_height,
            grid.min_distance_between_targets,
        )
        .context("grid section does not describe a valid spawn area")?;
        Ok(config
            .with_recent_memory_policy(grid.recent.into())
            .with_activation_while_activated(grid.allow_activation_while_activated))
    }

    pub(crate) fn agent_config(&self) -> Result<AgentConfig> {
        let agent = &self.agent;
        let config = AgentConfig::new(agent.alpha, agent.gamma, agent.epsilon)
            .and_then(|config| config.with_coarse_grid(agent.coarse_columns, agent.coarse_rows))
            .context("agent section holds invalid hyperparameters")?;
        Ok(config.with_mode(agent.mode.into()))
    }
}
