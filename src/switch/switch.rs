use super::SwitchError;
use crate::domain::Level;
use serde::{Deserialize, Deserializer, Serialize};

/// Packed ARGB for light gray, the color of the built-in default switch.
pub const DEFAULT_COLOR: u32 = 0xFFD3_D3D3;

/// Immutable filtering policy bound to a category prefix.
///
/// Instances are only built by the switch registry from a [`SwitchDef`]; there
/// are no setters, so a published switch never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pattern: String,
    tag: String,
    level: Level,
    is_quiet: bool,
    color: u32,
}

impl Switch {
    pub(crate) fn from_def(def: &SwitchDef) -> Result<Self, SwitchError> {
        if def.pattern.trim().is_empty() {
            return Err(SwitchError::BlankPattern);
        }

        let level = Level::from_i32(def.level).ok_or_else(|| SwitchError::InvalidLevel {
            pattern: def.pattern.clone(),
            level: def.level,
        })?;

        Ok(Self {
            pattern: def.pattern.clone(),
            tag: def.tag.clone(),
            level,
            is_quiet: def.is_quiet || level == Level::Quiet,
            color: def.color,
        })
    }

    /// The catch-all switch returned when no pattern matches.
    pub(crate) fn fallback(level: Level, color: u32) -> Self {
        Self {
            pattern: String::new(),
            tag: String::new(),
            level,
            is_quiet: level == Level::Quiet,
            color,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn is_quiet(&self) -> bool {
        self.is_quiet
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        !self.is_quiet && level >= self.level
    }
}

/// Mutable transport form of a switch, as exchanged with the switch authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwitchDef {
    pub pattern: String,
    pub tag: String,
    #[serde(deserialize_with = "deserialize_level")]
    pub level: i32,
    #[serde(deserialize_with = "deserialize_argb")]
    pub color: u32,
    pub is_quiet: bool,
}

impl Default for SwitchDef {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            tag: String::new(),
            level: Level::default().as_i32(),
            color: DEFAULT_COLOR,
            is_quiet: false,
        }
    }
}

impl SwitchDef {
    pub fn new(pattern: impl Into<String>, level: Level) -> Self {
        Self {
            pattern: pattern.into(),
            level: level.as_i32(),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.is_quiet = true;
        self
    }

    /// Forces `level` into the defined range.
    pub fn clamp_level(&mut self) {
        self.level = Level::clamped(self.level).as_i32();
    }
}

// Authorities that pack ARGB into a signed 32-bit int send opaque colors as negatives.
fn deserialize_argb<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let packed = i64::deserialize(deserializer)?;
    Ok(packed as u32)
}

// Saturates into i32 so out-of-range remote levels reach `clamp_level` instead of failing the refresh.
fn deserialize_level<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let level = i64::deserialize(deserializer)?;
    Ok(level.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
}
