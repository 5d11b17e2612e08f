//! Raw configuration schema as it appears on disk
//!
//! These types mirror the YAML document exactly. Normalization and symbolic
//! name resolution happen in the parser; the daemon only ever sees the
//! resolved types from [`crate::table`].

use std::path::PathBuf;

use serde::Deserialize;

/// Root of the YAML document.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub devices: Vec<RawDevice>,
}

/// One device block. At least one of the three input identifiers must be
/// present; all that are present must match for a device to be selected.
#[derive(Debug, Deserialize)]
pub struct RawDevice {
    pub input_name: Option<String>,
    pub input_phys: Option<String>,
    #[serde(rename = "input_fn")]
    pub input_path: Option<PathBuf>,
    pub output_name: String,
    /// Kept as a YAML mapping so declaration order survives; ties between
    /// equally long combos are broken by declaration order.
    pub remappings: serde_yaml::Mapping,
}

/// One entry in a combo's mapping list: either a bare key name
/// (pass-through remap) or a full mapping object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMapping {
    Name(String),
    Spec(RawMappingSpec),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMappingSpec {
    pub code: String,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub value: Option<OneOrMany>,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub delay: bool,
    pub rate: Option<f64>,
    pub count: Option<u32>,
}

/// A scalar or a list of values; normalized to a list by the parser.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(i32),
    Many(Vec<i32>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<i32> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(vs) => vs,
        }
    }
}
