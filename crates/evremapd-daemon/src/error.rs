use thiserror::Error;

/// Failure taxonomy for a device session.
///
/// Every variant is scoped to a single session: reporting one never affects
/// other sessions' remapping.
#[derive(Error, Debug)]
pub enum RemapError {
    /// The configured input device could not be found, opened, or grabbed
    /// at startup. The device is reported and skipped.
    #[error("input device '{device}' unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// The input event stream failed mid-run. The session terminates.
    #[error("input device lost")]
    DeviceLost(#[source] std::io::Error),

    /// A write to the output sink failed, whether on the dispatch path or
    /// from a scheduled repeat task.
    #[error("write to output device failed")]
    SinkWrite(#[source] std::io::Error),
}
