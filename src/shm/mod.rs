//! Shared pixel buffers
//!
//! [`ShmRegion`] is an anonymous, memory-mapped file that can be handed to
//! the compositor through `wl_shm`. Dropping it unmaps the memory and closes
//! the descriptor, whichever path the caller leaves by.
//!
//! [`BufferLedger`] tracks buffers the compositor still holds. Every frame
//! gets a fresh id and a fresh region, so a buffer is never painted again
//! while the server may be reading it.

use std::collections::BTreeMap;
use std::ffi::CStr;
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, FromRawFd};

use log::{debug, warn};
use memmap2::MmapMut;

/// Bytes per ARGB8888 pixel
pub const BYTES_PER_PIXEL: u32 = 4;

/// An anonymous shared memory file mapped read/write
#[derive(Debug)]
pub struct ShmRegion {
    // Field order matters: the mapping is released before the file closes.
    map: MmapMut,
    file: File,
}

impl ShmRegion {
    /// Allocate a zero-filled region of `len` bytes
    pub fn allocate(len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "shared buffer must not be empty",
            ));
        }

        let file = anonymous_file()?;
        file.set_len(len as u64)?;
        let map = unsafe { MmapMut::map_mut(&file)? };

        debug!("🧱 Allocated {} byte shared region", len);
        Ok(Self { map, file })
    }

    /// Allocate a region for a `width` x `height` ARGB8888 frame.
    /// Returns the region and its stride in bytes.
    pub fn for_frame(width: u32, height: u32) -> io::Result<(Self, u32)> {
        let too_large = || io::Error::new(io::ErrorKind::InvalidInput, "frame size overflows");
        let stride = width.checked_mul(BYTES_PER_PIXEL).ok_or_else(too_large)?;
        let len = (stride as usize)
            .checked_mul(height as usize)
            .filter(|len| *len <= i32::MAX as usize)
            .ok_or_else(too_large)?;
        Ok((Self::allocate(len)?, stride))
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.map
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

impl AsFd for ShmRegion {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

fn anonymous_file() -> io::Result<File> {
    const NAME: &CStr = c"ring-shm";
    let fd = unsafe { libc::memfd_create(NAME.as_ptr(), libc::MFD_CLOEXEC) };
    if fd >= 0 {
        return Ok(unsafe { File::from_raw_fd(fd) });
    }

    warn!(
        "memfd_create failed ({}), falling back to a temporary file",
        io::Error::last_os_error()
    );
    tempfile::tempfile()
}

/// Identifies one committed buffer for the lifetime of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(u64);

/// Where a buffer handed to the server currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// The most recent buffer attached to the surface
    Attached,
    /// Replaced by a newer attach, still waiting for the release event
    PendingRelease,
}

/// Buffers the compositor may still be reading from
#[derive(Debug)]
pub struct BufferLedger<B> {
    next_id: u64,
    outstanding: BTreeMap<BufferId, (B, BufferState)>,
}

impl<B> Default for BufferLedger<B> {
    fn default() -> Self {
        Self {
            next_id: 1,
            outstanding: BTreeMap::new(),
        }
    }
}

impl<B> BufferLedger<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out an id that has never been used in this session
    pub fn reserve(&mut self) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Record that `buffer` was attached; earlier buffers become pending
    pub fn attach(&mut self, id: BufferId, buffer: B) {
        for (_, state) in self.outstanding.values_mut() {
            *state = BufferState::PendingRelease;
        }
        self.outstanding.insert(id, (buffer, BufferState::Attached));
    }

    /// The server released `id`; returns the buffer so it can be destroyed
    pub fn release(&mut self, id: BufferId) -> Option<B> {
        self.outstanding.remove(&id).map(|(buffer, _)| buffer)
    }

    pub fn state(&self, id: BufferId) -> Option<BufferState> {
        self.outstanding.get(&id).map(|(_, state)| *state)
    }

    pub fn is_outstanding(&self, id: BufferId) -> bool {
        self.outstanding.contains_key(&id)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Buffers replaced by a newer attach that the server still holds
    pub fn pending_release(&self) -> usize {
        self.outstanding
            .values()
            .filter(|(_, state)| *state == BufferState::PendingRelease)
            .count()
    }

    /// Remove every buffer, e.g. when the surface goes away
    pub fn drain(&mut self) -> impl Iterator<Item = B> + '_ {
        std::mem::take(&mut self.outstanding)
            .into_values()
            .map(|(buffer, _)| buffer)
    }
}
