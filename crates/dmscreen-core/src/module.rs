//! Module catalog: the kinds of widgets a scene can hold and their typed configuration.

use crate::content::Unit;
use kurbo::Size;
use peniko::Color;
use serde::{Deserialize, Serialize};

/// The closed set of module types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    Note,
    Statblock,
    AudioChannel,
    AudioScene,
    Initiative,
    Calculator,
}

impl ModuleKind {
    /// Every kind, in toolbar order.
    pub const ALL: [ModuleKind; 6] = [
        ModuleKind::Note,
        ModuleKind::Statblock,
        ModuleKind::AudioChannel,
        ModuleKind::AudioScene,
        ModuleKind::Initiative,
        ModuleKind::Calculator,
    ];

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Note => "note",
            ModuleKind::Statblock => "statblock",
            ModuleKind::AudioChannel => "audio-channel",
            ModuleKind::AudioScene => "audio-scene",
            ModuleKind::Initiative => "initiative",
            ModuleKind::Calculator => "calculator",
        }
    }

    /// Parse a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Size given to a freshly created module of this kind.
    pub fn default_size(&self) -> Size {
        match self {
            ModuleKind::Note => Size::new(280.0, 200.0),
            ModuleKind::Statblock => Size::new(320.0, 400.0),
            ModuleKind::AudioChannel => Size::new(200.0, 120.0),
            ModuleKind::AudioScene => Size::new(300.0, 200.0),
            ModuleKind::Initiative => Size::new(320.0, 400.0),
            ModuleKind::Calculator => Size::new(240.0, 180.0),
        }
    }

    /// Accent colour as a hex string.
    pub fn color_hex(&self) -> &'static str {
        match self {
            ModuleKind::Note => "#fbbf24",
            ModuleKind::Statblock => "#f87171",
            ModuleKind::AudioChannel | ModuleKind::AudioScene => "#34d399",
            ModuleKind::Initiative => "#60a5fa",
            ModuleKind::Calculator => "#a78bfa",
        }
    }

    /// Accent colour used for the module header and minimap.
    pub fn color(&self) -> Color {
        match self {
            ModuleKind::Note => Color::from_rgba8(0xfb, 0xbf, 0x24, 0xff),
            ModuleKind::Statblock => Color::from_rgba8(0xf8, 0x71, 0x71, 0xff),
            ModuleKind::AudioChannel | ModuleKind::AudioScene => {
                Color::from_rgba8(0x34, 0xd3, 0x99, 0xff)
            }
            ModuleKind::Initiative => Color::from_rgba8(0x60, 0xa5, 0xfa, 0xff),
            ModuleKind::Calculator => Color::from_rgba8(0xa7, 0x8b, 0xfa, 0xff),
        }
    }

    /// Display label: the wire name with its first letter capitalised.
    pub fn label(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_volume() -> f64 {
    0.5
}

fn default_looping() -> bool {
    true
}

/// Per-kind module configuration, tagged by module kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ModuleConfig {
    Note,
    Statblock,
    AudioChannel {
        /// Playback volume in `[0, 1]`.
        #[serde(default = "default_volume")]
        volume: f64,
        #[serde(default = "default_looping", rename = "loop")]
        looping: bool,
    },
    AudioScene,
    Initiative,
    Calculator {
        #[serde(default = "Unit::default_from")]
        from: Unit,
        #[serde(default = "Unit::default_to")]
        to: Unit,
    },
}

impl ModuleConfig {
    /// Configuration a new module of `kind` starts with.
    pub fn default_for(kind: ModuleKind) -> Self {
        match kind {
            ModuleKind::Note => ModuleConfig::Note,
            ModuleKind::Statblock => ModuleConfig::Statblock,
            ModuleKind::AudioChannel => ModuleConfig::AudioChannel {
                volume: default_volume(),
                looping: default_looping(),
            },
            ModuleKind::AudioScene => ModuleConfig::AudioScene,
            ModuleKind::Initiative => ModuleConfig::Initiative,
            ModuleKind::Calculator => ModuleConfig::Calculator {
                from: Unit::default_from(),
                to: Unit::default_to(),
            },
        }
    }

    /// The module kind this configuration belongs to.
    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleConfig::Note => ModuleKind::Note,
            ModuleConfig::Statblock => ModuleKind::Statblock,
            ModuleConfig::AudioChannel { .. } => ModuleKind::AudioChannel,
            ModuleConfig::AudioScene => ModuleKind::AudioScene,
            ModuleConfig::Initiative => ModuleKind::Initiative,
            ModuleConfig::Calculator { .. } => ModuleKind::Calculator,
        }
    }

    /// Volume of an audio channel, if this is one.
    pub fn volume(&self) -> Option<f64> {
        match self {
            ModuleConfig::AudioChannel { volume, .. } => Some(*volume),
            _ => None,
        }
    }
}
