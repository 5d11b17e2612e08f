//! Input device discovery
//!
//! A configured device may be identified by any combination of name,
//! physical topology path, and device node path; every identifier that is
//! given must match. Devices are grabbed exclusively so nothing downstream
//! sees the raw events.

use std::path::Path;

use evdev::Device;
use evremapd_config::ResolvedDevice;
use tracing::debug;

use crate::error::RemapError;

fn matches_spec(device: &Device, path: &Path, spec: &ResolvedDevice) -> bool {
    if let Some(name) = &spec.input_name {
        if device.name() != Some(name.as_str()) {
            return false;
        }
    }
    if let Some(phys) = &spec.input_phys {
        if device.physical_path() != Some(phys.as_str()) {
            return false;
        }
    }
    if let Some(wanted) = &spec.input_path {
        if wanted != path {
            return false;
        }
    }
    true
}

fn unavailable(spec: &ResolvedDevice, reason: String) -> RemapError {
    RemapError::DeviceUnavailable {
        device: spec.describe(),
        reason,
    }
}

/// Locate the configured input device and grab it.
pub fn find_and_grab(spec: &ResolvedDevice) -> Result<Device, RemapError> {
    let mut device = match &spec.input_path {
        Some(path) => {
            let device = Device::open(path)
                .map_err(|e| unavailable(spec, format!("open {}: {e}", path.display())))?;
            if !matches_spec(&device, path, spec) {
                return Err(unavailable(
                    spec,
                    format!("{} does not match the configured identity", path.display()),
                ));
            }
            device
        }
        None => scan_for(spec)?,
    };
    device
        .grab()
        .map_err(|e| unavailable(spec, format!("grab: {e}")))?;
    Ok(device)
}

fn scan_for(spec: &ResolvedDevice) -> Result<Device, RemapError> {
    let entries = std::fs::read_dir("/dev/input")
        .map_err(|e| unavailable(spec, format!("read /dev/input: {e}")))?;

    for entry in entries.flatten() {
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);
        if !is_event_node {
            continue;
        }
        match Device::open(&path) {
            Ok(device) => {
                if matches_spec(&device, &path, spec) {
                    return Ok(device);
                }
            }
            Err(e) => debug!("could not open {}: {e}", path.display()),
        }
    }
    Err(unavailable(spec, "no matching device found".to_string()))
}
