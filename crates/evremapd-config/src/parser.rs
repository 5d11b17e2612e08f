//! YAML configuration parser
//!
//! Loads the on-disk schema, normalizes the duck-typed pieces (bare names vs.
//! mapping objects, scalar vs. list values, parenthesized combo tuples) and
//! resolves every symbolic name, producing the immutable [`Config`] the
//! daemon consumes. Every failure here is fatal at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::keys::{looks_like_code, resolve_event_type, resolve_key};
use crate::model::{RawConfig, RawDevice, RawMapping, RawMappingSpec};
use crate::table::{ActionMapping, ActionMode, ComboRule, Config, RemapTable, ResolvedDevice};

/// Default repeat rate in seconds when a repeat mapping omits `rate`.
const DEFAULT_RATE: f64 = 0.1;

/// Default config location: `$XDG_CONFIG_HOME/evremapd/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("evremapd").join("config.yaml"))
}

/// Parse a configuration file from the given path.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content)
}

/// Parse configuration from a string.
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(content)?;

    let mut devices = Vec::with_capacity(raw.devices.len());
    for device in raw.devices {
        devices.push(resolve_device(device)?);
    }

    Ok(Config { devices })
}

fn resolve_device(raw: RawDevice) -> Result<ResolvedDevice, ConfigError> {
    if raw.input_name.is_none() && raw.input_phys.is_none() && raw.input_path.is_none() {
        return Err(ConfigError::Invalid(format!(
            "device '{}' must be identified by at least one of input_name, input_phys, input_fn",
            raw.output_name
        )));
    }

    let mut rules = Vec::new();
    for (combo_key, mappings) in &raw.remappings {
        let combo_str = combo_key.as_str().ok_or_else(|| {
            ConfigError::Invalid("remapping keys must be strings".to_string())
        })?;

        let (codes, window_class) = parse_combo(combo_str)?;

        let raw_mappings: Vec<RawMapping> = serde_yaml::from_value(mappings.clone())?;
        if raw_mappings.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "combo '{combo_str}' has an empty mapping list"
            )));
        }

        let mut actions = Vec::with_capacity(raw_mappings.len());
        for mapping in raw_mappings {
            actions.push(resolve_mapping(combo_str, mapping)?);
        }

        rules.push(ComboRule {
            codes,
            window_class,
            actions,
        });
    }

    tracing::debug!(
        device = %raw.output_name,
        rules = rules.len(),
        "resolved remap table"
    );

    Ok(ResolvedDevice {
        input_name: raw.input_name,
        input_phys: raw.input_phys,
        input_path: raw.input_path,
        output_name: raw.output_name,
        table: RemapTable::new(rules),
    })
}

/// Parse a combo key: either a single symbolic name or a parenthesized
/// tuple `(KEY_A, KEY_B, label)`. A trailing member that is not a code name
/// is the combo's window-class label.
fn parse_combo(combo: &str) -> Result<(Vec<u16>, Option<String>), ConfigError> {
    let members: Vec<&str> = if combo.starts_with('(') && combo.ends_with(')') {
        combo
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .map(str::trim)
            .collect()
    } else {
        vec![combo.trim()]
    };

    let mut codes = Vec::new();
    let mut window_class = None;
    let last = members.len() - 1;

    for (i, member) in members.iter().enumerate() {
        if member.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "combo '{combo}' has an empty member"
            )));
        }
        if let Some(code) = resolve_key(member) {
            if window_class.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "combo '{combo}': window class must be the last member"
                )));
            }
            if codes.contains(&code) {
                return Err(ConfigError::Invalid(format!(
                    "combo '{combo}': duplicate key {member}"
                )));
            }
            codes.push(code);
        } else if looks_like_code(member) {
            return Err(ConfigError::UnknownKey((*member).to_string()));
        } else if i == last {
            window_class = Some((*member).to_string());
        } else {
            return Err(ConfigError::Invalid(format!(
                "combo '{combo}': window class '{member}' must be the last member"
            )));
        }
    }

    if codes.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "combo '{combo}' contains no key codes"
        )));
    }

    Ok((codes, window_class))
}

fn resolve_mapping(combo: &str, mapping: RawMapping) -> Result<ActionMapping, ConfigError> {
    let spec = match mapping {
        // Bare name: plain pass-through remap of the source event
        RawMapping::Name(name) => RawMappingSpec {
            code: name,
            event_type: None,
            value: None,
            repeat: false,
            delay: false,
            rate: None,
            count: None,
        },
        RawMapping::Spec(spec) => spec,
    };

    let code = resolve_key(&spec.code).ok_or_else(|| ConfigError::UnknownKey(spec.code.clone()))?;

    let event_type = spec
        .event_type
        .as_deref()
        .map(|name| resolve_event_type(name).ok_or_else(|| ConfigError::UnknownEventType(name.to_string())))
        .transpose()?;

    let values = spec.value.map(crate::model::OneOrMany::into_vec);
    if values.as_ref().is_some_and(|v| v.is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "combo '{combo}', mapping '{}': value list is empty",
            spec.code
        )));
    }

    if spec.repeat && spec.delay {
        return Err(ConfigError::Invalid(format!(
            "combo '{combo}', mapping '{}': repeat and delay are mutually exclusive",
            spec.code
        )));
    }

    let count = spec.count.unwrap_or(0);
    let mode = if spec.repeat {
        let rate = spec.rate.unwrap_or(DEFAULT_RATE);
        if rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "combo '{combo}', mapping '{}': repeat rate must be positive",
                spec.code
            )));
        }
        ActionMode::Repeat {
            rate: Duration::from_secs_f64(rate),
            count,
        }
    } else if spec.delay {
        ActionMode::Delay { count }
    } else {
        ActionMode::Immediate
    };

    Ok(ActionMapping {
        code,
        event_type,
        values,
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::{EventType, Key};

    #[test]
    fn parses_bare_name_and_object_entries() {
        let config = r#"
devices:
  - input_name: "Test Mouse"
    output_name: remap-mouse
    remappings:
      BTN_EXTRA:
        - KEY_Z
        - {code: KEY_X, value: 1}
        - {code: KEY_Y, value: [1, 0]}
"#;
        let config = parse_config_str(config).unwrap();
        assert_eq!(config.devices.len(), 1);

        let table = &config.devices[0].table;
        assert_eq!(table.rules().len(), 1);
        let rule = &table.rules()[0];
        assert_eq!(rule.codes, vec![Key::BTN_EXTRA.code()]);
        assert_eq!(rule.window_class, None);

        // Bare name: full pass-through of type and value
        assert_eq!(rule.actions[0].code, Key::KEY_Z.code());
        assert_eq!(rule.actions[0].values, None);
        assert_eq!(rule.actions[0].mode, ActionMode::Immediate);

        // Scalar value normalized to a one-element list
        assert_eq!(rule.actions[1].values, Some(vec![1]));
        assert_eq!(rule.actions[2].values, Some(vec![1, 0]));
    }

    #[test]
    fn parses_combo_tuples() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings:
      (KEY_LEFTMETA, BTN_EXTRA): [KEY_A]
"#;
        let config = parse_config_str(config).unwrap();
        let rule = &config.devices[0].table.rules()[0];
        assert_eq!(
            rule.codes,
            vec![Key::KEY_LEFTMETA.code(), Key::BTN_EXTRA.code()]
        );
    }

    #[test]
    fn trailing_non_key_member_is_window_class() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings:
      (KEY_LEFTCTRL, KEY_T, firefox): [KEY_F5]
"#;
        let config = parse_config_str(config).unwrap();
        let rule = &config.devices[0].table.rules()[0];
        assert_eq!(rule.codes, vec![Key::KEY_LEFTCTRL.code(), Key::KEY_T.code()]);
        assert_eq!(rule.window_class.as_deref(), Some("firefox"));
    }

    #[test]
    fn misspelled_key_name_is_fatal() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings:
      (KEY_BOGUS, KEY_T): [KEY_F5]
"#;
        let err = parse_config_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(name) if name == "KEY_BOGUS"));
    }

    #[test]
    fn unknown_output_code_is_fatal() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings:
      KEY_A: [{code: KEY_NOPE}]
"#;
        assert!(matches!(
            parse_config_str(config).unwrap_err(),
            ConfigError::UnknownKey(_)
        ));
    }

    #[test]
    fn repeat_and_delay_are_mutually_exclusive() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings:
      KEY_A: [{code: KEY_B, repeat: true, delay: true}]
"#;
        assert!(matches!(
            parse_config_str(config).unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn repeat_mapping_resolves_rate_and_count() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings:
      KEY_A: [{code: REL_WHEEL, type: EV_REL, value: [1], repeat: true, rate: 0.2, count: 3}]
"#;
        let config = parse_config_str(config).unwrap();
        let action = &config.devices[0].table.rules()[0].actions[0];
        assert_eq!(action.event_type, Some(EventType::RELATIVE));
        assert_eq!(
            action.mode,
            ActionMode::Repeat {
                rate: Duration::from_millis(200),
                count: 3
            }
        );
    }

    #[test]
    fn delay_mapping_resolves_count() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings:
      KEY_A: [{code: KEY_B, delay: true, count: 2}]
"#;
        let config = parse_config_str(config).unwrap();
        let action = &config.devices[0].table.rules()[0].actions[0];
        assert_eq!(action.mode, ActionMode::Delay { count: 2 });
    }

    #[test]
    fn device_without_remappings_resolves_to_empty_table() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings: {}
"#;
        let config = parse_config_str(config).unwrap();
        assert!(config.devices[0].table.is_empty());
    }

    #[test]
    fn device_without_identifiers_is_fatal() {
        let config = r#"
devices:
  - output_name: remap-kb
    remappings:
      KEY_A: [KEY_B]
"#;
        assert!(matches!(
            parse_config_str(config).unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn declaration_order_survives_for_equal_length_combos() {
        let config = r#"
devices:
  - input_name: kb
    output_name: remap-kb
    remappings:
      KEY_A: [KEY_X]
      (KEY_B, KEY_C): [KEY_Y]
      (KEY_D, KEY_E): [KEY_Z]
"#;
        let config = parse_config_str(config).unwrap();
        let rules = config.devices[0].table.rules();
        // Sorted longest-first; the two 2-key combos keep declaration order.
        assert_eq!(rules[0].codes, vec![Key::KEY_B.code(), Key::KEY_C.code()]);
        assert_eq!(rules[1].codes, vec![Key::KEY_D.code(), Key::KEY_E.code()]);
        assert_eq!(rules[2].codes, vec![Key::KEY_A.code()]);
    }
}
