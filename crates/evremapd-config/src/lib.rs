//! Configuration parsing for evremapd
//!
//! This crate turns the declarative YAML remapping config into the resolved
//! [`RemapTable`] the daemon consumes: symbolic key names become numeric
//! codes, bare-string entries become full action mappings, and combos are
//! pre-sorted for longest-match-first lookup.

mod error;
mod keys;
mod model;
mod parser;
mod table;

pub use error::ConfigError;
pub use keys::{resolve_event_type, resolve_key};
pub use parser::{default_config_path, load_config, parse_config_str};
pub use table::{ActionMapping, ActionMode, ComboRule, Config, RemapTable, ResolvedDevice};
