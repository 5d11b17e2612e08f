//! Symbolic name resolution
//!
//! Key and button names resolve through evdev's own name table, so anything
//! the kernel knows (`KEY_*`, `BTN_*`) is accepted. Relative-axis names are
//! matched by hand since evdev does not parse them from strings.

use std::str::FromStr;

use evdev::{EventType, Key};

/// Resolve a symbolic code name (`KEY_A`, `BTN_EXTRA`, `REL_WHEEL`) to its
/// numeric event code.
pub fn resolve_key(name: &str) -> Option<u16> {
    if let Ok(key) = Key::from_str(name) {
        return Some(key.code());
    }

    // Relative axes, for mappings that override the event type to EV_REL
    let rel = match name {
        "REL_X" => evdev::RelativeAxisType::REL_X,
        "REL_Y" => evdev::RelativeAxisType::REL_Y,
        "REL_Z" => evdev::RelativeAxisType::REL_Z,
        "REL_RX" => evdev::RelativeAxisType::REL_RX,
        "REL_RY" => evdev::RelativeAxisType::REL_RY,
        "REL_RZ" => evdev::RelativeAxisType::REL_RZ,
        "REL_HWHEEL" => evdev::RelativeAxisType::REL_HWHEEL,
        "REL_DIAL" => evdev::RelativeAxisType::REL_DIAL,
        "REL_WHEEL" => evdev::RelativeAxisType::REL_WHEEL,
        "REL_MISC" => evdev::RelativeAxisType::REL_MISC,
        "REL_WHEEL_HI_RES" => evdev::RelativeAxisType::REL_WHEEL_HI_RES,
        "REL_HWHEEL_HI_RES" => evdev::RelativeAxisType::REL_HWHEEL_HI_RES,
        _ => return None,
    };
    Some(rel.0)
}

/// Resolve an event type name (`EV_KEY`, `EV_REL`, ...) to an [`EventType`].
pub fn resolve_event_type(name: &str) -> Option<EventType> {
    match name {
        "EV_KEY" => Some(EventType::KEY),
        "EV_REL" => Some(EventType::RELATIVE),
        "EV_ABS" => Some(EventType::ABSOLUTE),
        "EV_MSC" => Some(EventType::MISC),
        "EV_SW" => Some(EventType::SWITCH),
        "EV_LED" => Some(EventType::LED),
        "EV_SND" => Some(EventType::SOUND),
        _ => None,
    }
}

/// True if a combo member is written as a code name rather than a window
/// class label. Used to reject typos instead of silently treating
/// `KEY_BOGUS` as a window class.
pub fn looks_like_code(name: &str) -> bool {
    name.starts_with("KEY_") || name.starts_with("BTN_") || name.starts_with("REL_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_keys_and_buttons() {
        assert_eq!(resolve_key("KEY_A"), Some(Key::KEY_A.code()));
        assert_eq!(resolve_key("BTN_EXTRA"), Some(Key::BTN_EXTRA.code()));
        assert_eq!(resolve_key("KEY_BOGUS"), None);
    }

    #[test]
    fn resolves_relative_axes() {
        assert_eq!(
            resolve_key("REL_WHEEL"),
            Some(evdev::RelativeAxisType::REL_WHEEL.0)
        );
    }

    #[test]
    fn resolves_event_types() {
        assert_eq!(resolve_event_type("EV_KEY"), Some(EventType::KEY));
        assert_eq!(resolve_event_type("EV_REL"), Some(EventType::RELATIVE));
        assert_eq!(resolve_event_type("EV_NOPE"), None);
    }

    #[test]
    fn code_names_are_distinguished_from_labels() {
        assert!(looks_like_code("KEY_A"));
        assert!(looks_like_code("BTN_SIDE"));
        assert!(!looks_like_code("firefox"));
    }
}
