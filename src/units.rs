use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Units accepted for page dimensions on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum UnitSystem {
    Inch,
    Cm,
    Pt,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Inch => "in",
            UnitSystem::Cm => "cm",
            UnitSystem::Pt => "pt",
        }
    }

    pub fn to_points(&self, v: f64) -> f64 {
        match self {
            UnitSystem::Inch => v * 72.0,
            UnitSystem::Cm => v / 2.54 * 72.0,
            UnitSystem::Pt => v,
        }
    }
}
