//! Linux `/dev/i2c-N` backend.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::bus::{BusHandle, RawBus};
use crate::error::BusError;

/// `I2C_SLAVE` from `linux/i2c-dev.h`.
const I2C_SLAVE: u32 = 0x0703;

/// Character-device I2C adapter.
///
/// Each `read`/`write` on the device file is one bus transaction, and the
/// kernel reports how many bytes it moved. Those counts are passed through
/// untouched so [`BusHandle`] can detect short transfers.
pub struct LinuxI2c {
    path: PathBuf,
    file: File,
    address: Option<u16>,
}

impl LinuxI2c {
    /// Opens `path` for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self {
            path,
            file,
            address: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_bound(&self) -> io::Result<()> {
        match self.address {
            Some(_) => Ok(()),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no target address set")),
        }
    }
}

impl RawBus for LinuxI2c {
    fn set_address(&mut self, address: u16) -> io::Result<()> {
        self.address = None;
        // SAFETY: the descriptor is owned by `self.file` and stays open for the
        // call; I2C_SLAVE takes the address by value.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        self.address = Some(address);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.ensure_bound()?;
        self.file.write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_bound()?;
        self.file.read(buf)
    }
}

impl BusHandle<LinuxI2c> {
    /// Opens the bus endpoint at `path` (e.g. `/dev/i2c-1`).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let path = path.as_ref();
        let bus = LinuxI2c::open(path).map_err(|source| BusError::DeviceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("opened {}", path.display());
        Ok(BusHandle::new(bus))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("envrig-{}-{}", name, std::process::id()));
        fs::write(&path, [0u8; 4]).unwrap();
        path
    }

    #[test]
    fn missing_device_is_unavailable() {
        let path = Path::new("/dev/i2c-does-not-exist");
        match BusHandle::open(path) {
            Err(BusError::DeviceUnavailable { path: reported, source }) => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("opened a missing device"),
        }
    }

    #[test]
    fn transfers_need_a_bound_address() {
        let path = scratch_file("unbound");
        let mut bus = LinuxI2c::open(&path).unwrap();

        let err = bus.write(&[0x74, 0x01]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        let err = bus.read(&mut [0u8; 2]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn non_adapter_rejects_the_address() {
        let path = scratch_file("not-an-adapter");
        let mut handle = BusHandle::new(LinuxI2c::open(&path).unwrap());

        // A regular file has no I2C_SLAVE ioctl.
        assert!(matches!(
            handle.bind_address(0x76),
            Err(BusError::AddressBindFailed { address: 0x76, .. })
        ));
        assert_eq!(handle.address(), None);

        drop(handle);
        fs::remove_file(path).unwrap();
    }
}
