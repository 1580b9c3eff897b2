//! Read and write sessions over the label area

use crate::device::{Completion, ConfigTransport, DeviceResult};
use crate::observability::{log_event_with_fields, Event};

use super::errors::{XferError, XferResult};

/// Size and transfer limit of one DIMM's label area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigArea {
    config_size: u32,
    max_xfer: u32,
}

impl ConfigArea {
    /// Issues "get config size" and validates the reply.
    pub fn query<T: ConfigTransport + ?Sized>(transport: &mut T) -> XferResult<Self> {
        let reply = transport
            .get_config_size()
            .map_err(|e| XferError::area_query("get config size failed", Some(e)))?;

        if reply.status != 0 {
            return Err(XferError::area_query(
                format!("get config size returned firmware status {:#x}", reply.status),
                None,
            ));
        }
        Self::new(reply.config_size, reply.max_xfer)
    }

    pub fn new(config_size: u32, max_xfer: u32) -> XferResult<Self> {
        if config_size == 0 {
            return Err(XferError::area_query("device reports an empty label area", None));
        }
        if max_xfer == 0 {
            return Err(XferError::area_query("device reports zero max transfer", None));
        }
        Ok(Self {
            config_size,
            max_xfer,
        })
    }

    pub fn config_size(&self) -> u32 {
        self.config_size
    }

    pub fn max_xfer(&self) -> u32 {
        self.max_xfer
    }

    /// Resolves and bounds-checks an extent. `offset == 0, len == 0`
    /// selects the whole area; a zero length at any other offset is
    /// rejected.
    pub fn extent(&self, offset: u32, len: u32) -> XferResult<Extent> {
        if len == 0 {
            if offset != 0 {
                return Err(XferError::bad_extent(offset as u64, 0, self.config_size as u64));
            }
            return Ok(Extent {
                offset: 0,
                len: self.config_size,
            });
        }
        let end = offset as u64 + len as u64;
        if end > self.config_size as u64 {
            return Err(XferError::bad_extent(offset as u64, len as u64, self.config_size as u64));
        }
        Ok(Extent { offset, len })
    }

    /// Number of round trips needed to move `len` bytes.
    pub fn round_trips(&self, len: u32) -> u32 {
        len.div_ceil(self.max_xfer)
    }
}

/// A byte range within the label area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub offset: u32,
    pub len: u32,
}

impl Extent {
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.len as u64
    }

    pub fn contains(&self, other: &Extent) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }
}

/// Issues one round trip per chunk, in increasing offset order, stopping
/// at the first chunk that does not complete cleanly.
///
/// `round_trip` receives the absolute device offset and the chunk's range
/// within the session buffer.
fn run_chunks<F>(extent: Extent, max_xfer: u32, mut round_trip: F) -> XferResult<()>
where
    F: FnMut(u32, std::ops::Range<usize>) -> DeviceResult<Completion>,
{
    let mut done: u32 = 0;
    while done < extent.len {
        let chunk = max_xfer.min(extent.len - done);
        let offset = extent.offset + done;
        let range = done as usize..(done + chunk) as usize;

        let completion = round_trip(offset, range).map_err(|e| {
            XferError::transport_failed(offset as u64, chunk as u64, done as u64, e)
        })?;

        // the device's own count: the chunk less its residual
        let moved = done as u64 + chunk.saturating_sub(completion.residual) as u64;
        if completion.status != 0 {
            return Err(XferError::firmware_status(
                offset as u64,
                chunk as u64,
                completion.status,
                moved,
            ));
        }
        if completion.residual != 0 {
            return Err(XferError::short_transfer(
                offset as u64,
                chunk as u64,
                completion.residual,
                moved,
            ));
        }

        done += chunk;
    }
    Ok(())
}

fn log_abort(direction: &str, extent: Extent, err: &XferError) {
    log_event_with_fields(
        Event::TransferAborted,
        &[
            ("bytes_moved", &err.bytes_moved().to_string()),
            ("code", err.code().code()),
            ("direction", direction),
            ("len", &extent.len.to_string()),
            ("offset", &extent.offset.to_string()),
        ],
    );
}

/// A pending read of one extent.
#[derive(Debug, Clone)]
pub struct ReadSession {
    area: ConfigArea,
    extent: Extent,
}

impl ReadSession {
    /// Prepares a read of `len` bytes at `offset` (`0, 0`: whole area).
    pub fn new(area: &ConfigArea, offset: u32, len: u32) -> XferResult<Self> {
        Ok(Self {
            area: *area,
            extent: area.extent(offset, len)?,
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Moves the extent from the device.
    pub fn submit<T: ConfigTransport + ?Sized>(self, transport: &mut T) -> XferResult<CompletedRead> {
        let mut data = vec![0u8; self.extent.len as usize];

        run_chunks(self.extent, self.area.max_xfer, |offset, range| {
            transport.get_config_data(offset, &mut data[range])
        })
        .inspect_err(|e| log_abort("read", self.extent, e))?;

        Ok(CompletedRead {
            area: self.area,
            extent: self.extent,
            data,
        })
    }
}

/// Data observed by a successful read.
///
/// The only way to obtain a [`WriteSession`].
#[derive(Debug, Clone)]
pub struct CompletedRead {
    area: ConfigArea,
    extent: Extent,
    data: Vec<u8>,
}

impl CompletedRead {
    pub fn area(&self) -> &ConfigArea {
        &self.area
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Bytes read, starting at `extent().offset`.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes at an absolute area offset, if the read covered them.
    pub fn get_data(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let start = offset.checked_sub(self.extent.offset as u64)? as usize;
        let end = start.checked_add(len)?;
        self.data.get(start..end)
    }
}

/// A pending write, seeded with the bytes its chained read observed.
#[derive(Debug, Clone)]
pub struct WriteSession {
    area: ConfigArea,
    extent: Extent,
    data: Vec<u8>,
}

impl WriteSession {
    /// Prepares a write of `len` bytes at `offset` (`len == 0`: whole
    /// area) from a completed read.
    ///
    /// # Errors
    ///
    /// `NvlXferUnchainedWrite` when `read` does not cover the extent, and
    /// `NvlXferBadExtent` when the extent lies outside the area. Neither
    /// issues a device command.
    pub fn chain(read: &CompletedRead, offset: u32, len: u32) -> XferResult<Self> {
        let extent = read.area.extent(offset, len)?;
        if !read.extent.contains(&extent) {
            return Err(XferError::unchained(
                extent.offset as u64,
                extent.len as u64,
                read.extent.offset as u64,
                read.extent.len as u64,
            ));
        }

        let start = (extent.offset - read.extent.offset) as usize;
        let data = read.data[start..start + extent.len as usize].to_vec();

        Ok(Self {
            area: read.area,
            extent,
            data,
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn local_range(&self, offset: u64, len: usize) -> XferResult<std::ops::Range<usize>> {
        let sub = Extent {
            offset: offset.min(u32::MAX as u64) as u32,
            len: len.min(u32::MAX as usize) as u32,
        };
        if offset > u32::MAX as u64 || !self.extent.contains(&sub) {
            return Err(XferError::bad_extent(offset, len as u64, self.area.config_size as u64));
        }
        let start = (sub.offset - self.extent.offset) as usize;
        Ok(start..start + len)
    }

    /// Overwrites buffered bytes at an absolute area offset.
    pub fn set_data(&mut self, offset: u64, bytes: &[u8]) -> XferResult<()> {
        let range = self.local_range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Zeroes buffered bytes at an absolute area offset.
    pub fn zero_data(&mut self, offset: u64, len: usize) -> XferResult<()> {
        let range = self.local_range(offset, len)?;
        self.data[range].fill(0);
        Ok(())
    }

    /// Moves the buffer to the device. Returns bytes written.
    pub fn submit<T: ConfigTransport + ?Sized>(self, transport: &mut T) -> XferResult<u64> {
        let data = &self.data;
        run_chunks(self.extent, self.area.max_xfer, |offset, range| {
            transport.set_config_data(offset, &data[range])
        })
        .inspect_err(|e| log_abort("write", self.extent, e))?;

        Ok(self.extent.len as u64)
    }
}
