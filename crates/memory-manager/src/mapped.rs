// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! File-backed memory that can be imported into a tensor.
//!
//! Mappings are page aligned, so they satisfy any element or cache-line
//! alignment a tensor asks for.

use crate::MemoryError;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// A writable memory map of a file.
///
/// Keep the `MappedFile` alive for as long as a tensor is bound to
/// [`as_mut_ptr`](Self::as_mut_ptr).
pub struct MappedFile {
    path: PathBuf,
    mmap: memmap2::MmapMut,
}

impl MappedFile {
    /// Creates (or truncates) `path`, sizes it to `len` bytes and maps it.
    pub fn create(path: impl AsRef<Path>, len: usize) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        if len == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        let map_err = |source| MemoryError::Map {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(map_err)?;
        file.set_len(len as u64).map_err(map_err)?;
        Self::map(path, &file)
    }

    /// Maps an existing file read-write at its current length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| MemoryError::Map {
                path: path.clone(),
                source,
            })?;
        Self::map(path, &file)
    }

    fn map(path: PathBuf, file: &std::fs::File) -> Result<Self, MemoryError> {
        // SAFETY: the file is opened read-write by us; concurrent external
        // modification is outside this crate's contract.
        let mmap = unsafe { memmap2::MmapMut::map_mut(file) }.map_err(|source| {
            MemoryError::Map {
                path: path.clone(),
                source,
            }
        })?;
        tracing::info!(
            "mapped {} ({:.2} MB)",
            path.display(),
            mmap.len() as f64 / (1024.0 * 1024.0),
        );
        Ok(Self { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Base address of the mapping, suitable for `TensorBuffer::import_memory`.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    /// Writes dirty pages back to the file.
    pub fn flush(&self) -> Result<(), MemoryError> {
        self.mmap.flush().map_err(|source| MemoryError::Map {
            path: self.path.clone(),
            source,
        })
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .finish()
    }
}
