// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Image-file loading.
//!
//! A Spur image is a fixed 80-byte little-endian header followed by the
//! serialised object space. Addresses inside objects are absolute against
//! the *old base address* recorded in the header; the object memory
//! re-bases the space so those addresses stay valid (see
//! [`crate::memory`]).


use std::io;
use std::path::Path;

use thiserror::Error;

/// Image versions this VM consumes (64-bit Spur).
pub const SUPPORTED_VERSIONS: [u32; 2] = [68021, 68019];

/// Byte length of the image header.
pub const HEADER_LEN: usize = 80;

/// Error loading an image file.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The file could not be read.
    #[error("cannot read image file: {0}")]
    Io(#[from] io::Error),
    /// The file is shorter than its header claims.
    #[error("truncated image: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes required by the header.
        needed: u64,
        /// Bytes actually present.
        have: u64,
    },
    /// The image version is not a 64-bit Spur version.
    #[error("unsupported image version {0} (expected one of {SUPPORTED_VERSIONS:?})")]
    UnsupportedVersion(u32),
    /// A header field is inconsistent.
    #[error("malformed image header: {0}")]
    Malformed(&'static str),
}

/// The decoded 80-byte image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Image format version; must be one of [`SUPPORTED_VERSIONS`].
    pub version: u32,
    /// Offset of the object space in the file.
    pub header_size: u32,
    /// Byte length of the object space.
    pub data_size: u64,
    /// Address the object space was saved at; pointers are absolute
    /// against this base.
    pub old_base_address: u64,
    /// Oop of the special objects array.
    pub special_objects_oop: u64,
    /// Identity-hash seed at save time.
    pub last_hash: u64,
    /// Saved window extent (display integration is out of scope).
    pub saved_window_size: u64,
    /// Header flag bits.
    pub header_flags: u64,
    /// Extra VM memory requested by the image.
    pub extra_vm_memory: u32,
    /// Stack pages hint.
    pub stack_pages: u16,
    /// Eden size hint in bytes.
    pub eden_bytes: u32,
    /// Maximum external semaphore table size.
    pub max_ext_semaphore_table_size: u16,
    /// Size of the first (and for this VM, only) segment.
    pub first_segment_size: u64,
}

/// Little-endian field reader over the header bytes.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u16(&mut self) -> u16 {
        let v = u16::from_le_bytes(self.bytes[self.pos..self.pos + 2].try_into().unwrap_or([0; 2]));
        self.pos += 2;
        v
    }

    fn u32(&mut self) -> u32 {
        let v = u32::from_le_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap_or([0; 4]));
        self.pos += 4;
        v
    }

    fn u64(&mut self) -> u64 {
        let v = u64::from_le_bytes(self.bytes[self.pos..self.pos + 8].try_into().unwrap_or([0; 8]));
        self.pos += 8;
        v
    }

    fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

impl ImageHeader {
    /// Parse and validate the header from the start of an image file.
    ///
    /// # Errors
    ///
    /// Returns an error when the buffer is too short, the version is not
    /// 64-bit Spur, or a field is inconsistent.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() < HEADER_LEN {
            return Err(ImageError::Truncated {
                needed: HEADER_LEN as u64,
                have: bytes.len() as u64,
            });
        }
        let mut r = Reader::new(bytes);
        let version = r.u32();
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ImageError::UnsupportedVersion(version));
        }
        let header_size = r.u32();
        let data_size = r.u64();
        let old_base_address = r.u64();
        let special_objects_oop = r.u64();
        let last_hash = r.u64();
        let saved_window_size = r.u64();
        let header_flags = r.u64();
        let extra_vm_memory = r.u32();
        let stack_pages = r.u16();
        let eden_bytes = r.u32();
        let max_ext_semaphore_table_size = r.u16();
        r.skip(4); // reserved
        let first_segment_size = r.u64();

        if (header_size as usize) < HEADER_LEN {
            return Err(ImageError::Malformed("header size below fixed header length"));
        }
        if old_base_address % 8 != 0 {
            return Err(ImageError::Malformed("old base address not 8-byte aligned"));
        }
        if special_objects_oop < old_base_address
            || special_objects_oop >= old_base_address + data_size
        {
            return Err(ImageError::Malformed("special objects oop outside object space"));
        }

        Ok(Self {
            version,
            header_size,
            data_size,
            old_base_address,
            special_objects_oop,
            last_hash,
            saved_window_size,
            header_flags,
            extra_vm_memory,
            stack_pages,
            eden_bytes,
            max_ext_semaphore_table_size,
            first_segment_size,
        })
    }
}

/// A loaded image: header plus the raw object space.
#[derive(Debug, Clone)]
pub struct Image {
    /// The decoded header.
    pub header: ImageHeader,
    /// The serialised object space (`data_size` bytes).
    pub object_space: Vec<u8>,
}

impl Image {
    /// Load an image from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// 64-bit Spur image.
    pub fn load(path: &Path) -> Result<Self, ImageError> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Build an image from an in-memory file.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid 64-bit Spur image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        let header = ImageHeader::parse(&bytes)?;
        let start = header.header_size as u64;
        let needed = start + header.data_size;
        if (bytes.len() as u64) < needed {
            return Err(ImageError::Truncated { needed, have: bytes.len() as u64 });
        }
        let object_space =
            bytes[start as usize..(start + header.data_size) as usize].to_vec();
        Ok(Self { header, object_space })
    }
}
