//! Physically mapped block engine.
//!
//! The accelerator exposes two regions of physical memory: a data region of
//! `(m + 1) * v` f32 scalars holding the vector and matrix slots, and a
//! single 32-bit status word. A block call writes [`TRIGGER`] to the status
//! word and spins until the device changes it to anything else, after which
//! the low `m` scalars of the data region hold the results.

use std::fs::OpenOptions;
use std::mem::{align_of, size_of};
use std::path::Path;
use std::ptr;
use std::sync::atomic::{fence, Ordering};
use std::time::{Duration, Instant};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, trace, warn};

use crate::config::MappedConfig;
use crate::dims::BlockDims;
use crate::engine::BlockEngine;
use crate::error::{EngineError, Result};

/// Value written to the status word to start a block computation.
pub const TRIGGER: u32 = 0x5555;

/// Spin iterations between deadline checks.
const SPINS_PER_DEADLINE_CHECK: u32 = 1024;

/// Block engine backed by memory-mapped accelerator registers.
///
/// Both mappings are released when the engine is dropped.
#[derive(Debug)]
pub struct MappedEngine {
    dims: BlockDims,
    data: MmapMut,
    status: MmapMut,
    timeout: Duration,
    calls: usize,
    // Set when a handshake timed out and the device may still be busy.
    in_flight: bool,
}

impl MappedEngine {
    /// Map the data region and status word described by `config`.
    ///
    /// # Errors
    /// Returns `EngineError::Resource` if the device cannot be opened or
    /// either region cannot be mapped with the required alignment.
    pub fn open(config: &MappedConfig) -> Result<MappedEngine> {
        let dims = config.dims;
        let device = &config.device;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|e| resource(device, format!("open: {e}")))?;

        let data_len = dims.buffer_len() * size_of::<f32>();
        let data = map_region(&file, device, config.data_addr, data_len, "data")?;
        if data.as_ptr() as usize % align_of::<f32>() != 0 {
            return Err(resource(device, "data region is not f32-aligned".to_string()));
        }

        let status = map_region(
            &file,
            device,
            config.status_addr,
            size_of::<u32>(),
            "status",
        )?;
        if status.as_ptr() as usize % align_of::<u32>() != 0 {
            return Err(resource(device, "status word is not u32-aligned".to_string()));
        }

        debug!(
            device = %device.display(),
            data_addr = config.data_addr,
            status_addr = config.status_addr,
            rows = dims.rows(),
            cols = dims.cols(),
            timeout = ?config.handshake_timeout,
            "mapped block engine opened"
        );

        Ok(MappedEngine {
            dims,
            data,
            status,
            timeout: config.handshake_timeout,
            calls: 0,
            in_flight: false,
        })
    }

    /// Bound on a single status-word handshake.
    pub fn handshake_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_handshake_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// True while a timed-out block call is still holding the status word.
    pub fn is_busy(&self) -> bool {
        self.in_flight && self.read_status() == TRIGGER
    }

    fn read_status(&self) -> u32 {
        // SAFETY: the status mapping is at least 4 bytes and u32-aligned
        // (checked in `open`), and lives as long as `self`.
        unsafe { ptr::read_volatile(self.status.as_ptr() as *const u32) }
    }

    fn write_status(&mut self, value: u32) {
        // SAFETY: as in `read_status`.
        unsafe { ptr::write_volatile(self.status.as_mut_ptr() as *mut u32, value) }
    }

    fn data(&self) -> &[f32] {
        // SAFETY: the mapping holds exactly `buffer_len` f32-aligned scalars.
        unsafe {
            std::slice::from_raw_parts(self.data.as_ptr() as *const f32, self.dims.buffer_len())
        }
    }

    fn wait_for_completion(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let mut spins: u32 = 0;
        while self.read_status() == TRIGGER {
            std::hint::spin_loop();
            spins = spins.wrapping_add(1);
            if spins % SPINS_PER_DEADLINE_CHECK == 0 && Instant::now() >= deadline {
                // One last look so a completion racing the deadline is not lost.
                if self.read_status() != TRIGGER {
                    break;
                }
                self.in_flight = true;
                warn!(
                    timeout = ?self.timeout,
                    call = self.calls,
                    "accelerator handshake timed out"
                );
                return Err(EngineError::HandshakeTimeout {
                    timeout: self.timeout,
                    calls: self.calls,
                });
            }
        }
        fence(Ordering::Acquire);
        Ok(())
    }
}

impl BlockEngine for MappedEngine {
    fn name(&self) -> &str {
        "mmio"
    }

    fn dims(&self) -> BlockDims {
        self.dims
    }

    fn buffer_mut(&mut self) -> &mut [f32] {
        let len = self.dims.buffer_len();
        // SAFETY: the mapping holds exactly `len` f32-aligned scalars and is
        // exclusively borrowed through `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut f32, len) }
    }

    fn compute(&mut self) -> Result<&[f32]> {
        if self.in_flight {
            if self.read_status() == TRIGGER {
                return Err(EngineError::ConcurrentAccess(
                    "previous block call has not completed".to_string(),
                ));
            }
            self.in_flight = false;
        }

        self.calls += 1;

        // Operands must be visible to the device before the trigger lands.
        fence(Ordering::SeqCst);
        self.write_status(TRIGGER);
        self.wait_for_completion()?;

        trace!(call = self.calls, "mapped block computed");
        Ok(&self.data()[..self.dims.rows()])
    }

    fn reset(&mut self) {
        self.calls = 0;
    }

    fn call_count(&self) -> usize {
        self.calls
    }
}

fn map_region(
    file: &std::fs::File,
    device: &Path,
    addr: u64,
    len: usize,
    what: &str,
) -> Result<MmapMut> {
    // SAFETY: the region is physical memory (or a backing file) shared with
    // the accelerator; all access goes through this engine.
    unsafe { MmapOptions::new().offset(addr).len(len).map_mut(file) }
        .map_err(|e| resource(device, format!("mmap {what} region at {addr:#x}: {e}")))
}

fn resource(path: &Path, reason: String) -> EngineError {
    EngineError::Resource {
        path: path.to_path_buf(),
        reason,
    }
}
