//! Device collaborators for label storage
//!
//! The label store never touches hardware directly. It drives two seams:
//!
//! - [`ConfigTransport`]: the three config-area commands ("get config
//!   size", "get config data", "set config data"), each one blocking
//!   request/response round trip
//! - [`DimmControl`]: the activity oracle and the enable/disable switch
//!   used to make the kernel drop its cached view of the label area
//!
//! Two implementations ship with the crate: [`MemoryDimm`] for tests and
//! simulation, and [`FileDimm`] for label area image files.

mod errors;
mod file;
mod memory;

pub use errors::{Command, DeviceError, DeviceResult};
pub use file::FileDimm;
pub use memory::{CommandRecord, Fault, FaultKind, MemoryDimm};

/// Reply to "get config size".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSizeReply {
    /// Firmware status, 0 on success
    pub status: u32,
    /// Total bytes of the label storage area
    pub config_size: u32,
    /// Largest payload a single data command may move
    pub max_xfer: u32,
}

/// Completion of one config data round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    /// Firmware status, 0 on success
    pub status: u32,
    /// Bytes of the request that were not transferred
    pub residual: u32,
}

impl Completion {
    /// A fully successful round trip.
    pub fn ok() -> Self {
        Self::default()
    }

    /// True when firmware reported success and every byte moved.
    pub fn is_clean(&self) -> bool {
        self.status == 0 && self.residual == 0
    }
}

/// Executes config-area commands against one DIMM.
///
/// Every call blocks until the device answers. Implementations must not
/// split or reorder a request; chunking is the caller's job.
pub trait ConfigTransport {
    /// Issues "get config size".
    fn get_config_size(&mut self) -> DeviceResult<ConfigSizeReply>;

    /// Issues "get config data" for `buf.len()` bytes at `offset`.
    ///
    /// On a completion with nonzero residual only the leading
    /// `buf.len() - residual` bytes are meaningful.
    fn get_config_data(&mut self, offset: u32, buf: &mut [u8]) -> DeviceResult<Completion>;

    /// Issues "set config data" for `data` at `offset`.
    fn set_config_data(&mut self, offset: u32, data: &[u8]) -> DeviceResult<Completion>;
}

/// DIMM state outside the label area.
pub trait DimmControl {
    /// Device name used in logs and errors.
    fn devname(&self) -> &str;

    /// Whether any live region references this DIMM.
    fn is_active(&self) -> bool;

    /// Whether the kernel driver is bound and may hold cached labels.
    fn is_enabled(&self) -> bool;

    fn disable(&mut self) -> DeviceResult<()>;

    fn enable(&mut self) -> DeviceResult<()>;
}

/// A DIMM the label store can operate on.
pub trait Dimm: ConfigTransport + DimmControl {}

impl<T: ConfigTransport + DimmControl> Dimm for T {}

impl<T: ConfigTransport + ?Sized> ConfigTransport for &mut T {
    fn get_config_size(&mut self) -> DeviceResult<ConfigSizeReply> {
        (**self).get_config_size()
    }

    fn get_config_data(&mut self, offset: u32, buf: &mut [u8]) -> DeviceResult<Completion> {
        (**self).get_config_data(offset, buf)
    }

    fn set_config_data(&mut self, offset: u32, data: &[u8]) -> DeviceResult<Completion> {
        (**self).set_config_data(offset, data)
    }
}

impl<T: DimmControl + ?Sized> DimmControl for &mut T {
    fn devname(&self) -> &str {
        (**self).devname()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn disable(&mut self) -> DeviceResult<()> {
        (**self).disable()
    }

    fn enable(&mut self) -> DeviceResult<()> {
        (**self).enable()
    }
}
