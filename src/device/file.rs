//! Label area image file
//!
//! Treats a regular file as the label storage area of a DIMM. The whole
//! file is the area. An image is never active and has no kernel driver,
//! so enable/disable are no-ops.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::errors::{Command, DeviceError, DeviceResult};
use super::{Completion, ConfigSizeReply, ConfigTransport, DimmControl};

/// A DIMM backed by an image file.
#[derive(Debug)]
pub struct FileDimm {
    name: String,
    path: PathBuf,
    file: File,
    config_size: u32,
    max_xfer: u32,
}

impl FileDimm {
    /// Opens an existing image for reading and writing.
    pub fn open(path: impl AsRef<Path>, max_xfer: u32) -> DeviceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| DeviceError::Io {
                device: name.clone(),
                command: Command::GetConfigSize,
                source,
            })?;

        let len = file
            .metadata()
            .map_err(|source| DeviceError::Io {
                device: name.clone(),
                command: Command::GetConfigSize,
                source,
            })?
            .len();

        let config_size = u32::try_from(len).map_err(|_| DeviceError::CommandFailed {
            device: name.clone(),
            command: Command::GetConfigSize,
            reason: format!("image of {} bytes exceeds 32-bit label area", len),
        })?;

        Ok(Self {
            name,
            path,
            file,
            config_size,
            max_xfer,
        })
    }

    /// Creates a zero-filled image of `config_size` bytes and opens it.
    ///
    /// Fails if `path` already exists.
    pub fn create(path: impl AsRef<Path>, config_size: u32, max_xfer: u32) -> DeviceResult<Self> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| DeviceError::Io {
            device: path.display().to_string(),
            command: Command::SetConfigData,
            source,
        };

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(io_err)?;
        file.set_len(config_size as u64).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        Self::open(path, max_xfer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_range(&self, command: Command, offset: u32, len: usize) -> DeviceResult<()> {
        let end = offset as u64 + len as u64;
        if end > self.config_size as u64 {
            return Err(DeviceError::OutOfRange {
                device: self.name.clone(),
                command,
                offset: offset as u64,
                len: len as u64,
                config_size: self.config_size as u64,
            });
        }
        Ok(())
    }

    fn io_error(&self, command: Command, source: std::io::Error) -> DeviceError {
        DeviceError::Io {
            device: self.name.clone(),
            command,
            source,
        }
    }
}

impl ConfigTransport for FileDimm {
    fn get_config_size(&mut self) -> DeviceResult<ConfigSizeReply> {
        Ok(ConfigSizeReply {
            status: 0,
            config_size: self.config_size,
            max_xfer: self.max_xfer,
        })
    }

    fn get_config_data(&mut self, offset: u32, buf: &mut [u8]) -> DeviceResult<Completion> {
        let command = Command::GetConfigData;
        self.check_range(command, offset, buf.len())?;

        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|e| self.io_error(command, e))?;
        self.file
            .read_exact(buf)
            .map_err(|e| self.io_error(command, e))?;

        Ok(Completion::ok())
    }

    fn set_config_data(&mut self, offset: u32, data: &[u8]) -> DeviceResult<Completion> {
        let command = Command::SetConfigData;
        self.check_range(command, offset, data.len())?;

        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|e| self.io_error(command, e))?;
        self.file
            .write_all(data)
            .map_err(|e| self.io_error(command, e))?;
        // Each round trip is durable before it completes
        self.file
            .sync_all()
            .map_err(|e| self.io_error(command, e))?;

        Ok(Completion::ok())
    }
}

impl DimmControl for FileDimm {
    fn devname(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        false
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn disable(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    fn enable(&mut self) -> DeviceResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_is_zero_filled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lsa.img");

        let mut dimm = FileDimm::create(&path, 4096, 256).unwrap();
        let reply = dimm.get_config_size().unwrap();
        assert_eq!(reply.config_size, 4096);
        assert_eq!(reply.max_xfer, 256);

        let mut buf = vec![0xAAu8; 4096];
        dimm.get_config_data(0, &mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_create_refuses_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lsa.img");
        std::fs::write(&path, [0u8; 16]).unwrap();

        assert!(FileDimm::create(&path, 4096, 256).is_err());
    }

    #[test]
    fn test_write_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lsa.img");

        {
            let mut dimm = FileDimm::create(&path, 1024, 128).unwrap();
            dimm.set_config_data(512, b"label").unwrap();
        }

        let mut dimm = FileDimm::open(&path, 128).unwrap();
        let mut buf = [0u8; 5];
        dimm.get_config_data(512, &mut buf).unwrap();
        assert_eq!(&buf, b"label");
    }

    #[test]
    fn test_never_active_or_enabled() {
        let dir = TempDir::new().unwrap();
        let mut dimm = FileDimm::create(dir.path().join("a.img"), 256, 64).unwrap();
        assert!(!dimm.is_active());
        assert!(!dimm.is_enabled());
        dimm.enable().unwrap();
        assert!(!dimm.is_enabled());
    }

    #[test]
    fn test_range_checked() {
        let dir = TempDir::new().unwrap();
        let mut dimm = FileDimm::create(dir.path().join("a.img"), 256, 64).unwrap();
        let err = dimm.set_config_data(250, &[0u8; 8]).unwrap_err();
        assert_eq!(err.code(), "NVL_DEVICE_OUT_OF_RANGE");
    }
}
