//! Output sinks
//!
//! A sink is the synthetic device that downstream consumers observe instead
//! of the grabbed hardware. The trait keeps the remapping engine testable
//! without uinput access; [`UinputSink`] is the real implementation.

use std::io;

use anyhow::{Context, Result};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key, RelativeAxisType};
use evremapd_config::RemapTable;

/// Where remapped events are written: single events plus an explicit
/// batch-flush marker (SYN_REPORT on the real device).
pub trait EventSink: Send {
    fn write(&mut self, event_type: EventType, code: u16, value: i32) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// A uinput virtual device created per session.
pub struct UinputSink {
    device: VirtualDevice,
}

impl UinputSink {
    /// Build the sink for one session.
    ///
    /// The key capability set is the input device's native keys union every
    /// EV_KEY output code in the remap table, so a mapping may emit codes
    /// the physical device does not have. Relative axes are carried over
    /// from the input plus any EV_REL output codes.
    pub fn build(name: &str, input: &Device, table: &RemapTable) -> Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        if let Some(native) = input.supported_keys() {
            for key in native.iter() {
                keys.insert(key);
            }
        }
        for code in table.output_key_codes() {
            keys.insert(Key::new(code));
        }

        let mut rel_axes = AttributeSet::<RelativeAxisType>::new();
        let mut has_rel = false;
        if let Some(native) = input.supported_relative_axes() {
            for axis in native.iter() {
                rel_axes.insert(axis);
                has_rel = true;
            }
        }
        for code in table.output_rel_codes() {
            rel_axes.insert(RelativeAxisType(code));
            has_rel = true;
        }

        let mut builder = VirtualDeviceBuilder::new()
            .context("failed to open /dev/uinput")?
            .name(name)
            .with_keys(&keys)
            .context("failed to declare key capabilities")?;
        if has_rel {
            builder = builder
                .with_relative_axes(&rel_axes)
                .context("failed to declare relative axes")?;
        }

        let device = builder
            .build()
            .with_context(|| format!("failed to create virtual device '{name}'"))?;

        Ok(Self { device })
    }
}

impl EventSink for UinputSink {
    fn write(&mut self, event_type: EventType, code: u16, value: i32) -> io::Result<()> {
        self.device
            .emit(&[InputEvent::new(event_type, code, value)])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.device
            .emit(&[InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)])
    }
}
