// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Host Data
//!
//! Uniform contents and scheduled push constants live on the host and change between dispatches.
//! `HostData` is a fixed-length byte cell shared between the caller and the shader.  The caller
//! writes into its clone whenever it likes.  The shader only reads when copying to the GPU, which
//! for uniforms is at initialization and after `ComputeShader::update`.

use std::sync::{Arc, Mutex};

use bytemuck::Pod;

use crate::prelude::*;

#[derive(Clone, Debug)]
pub struct HostData {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl HostData {
    /// `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::from_bytes(&vec![0; len])
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(bytes.to_vec())),
        }
    }

    pub fn from_pod<T: Pod>(value: &T) -> Self {
        Self::from_bytes(bytemuck::bytes_of(value))
    }

    pub fn len(&self) -> usize {
        // Length never changes after construction, so a poisoned lock still holds the answer.
        self.bytes.lock().map(|b| b.len()).unwrap_or_else(|e| e.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the contents.  `bytes` must be exactly `len()` long.
    pub fn write(&self, bytes: &[u8]) -> Result<(), ComputeError> {
        let mut current = self.bytes.lock()?;
        if current.len() != bytes.len() {
            return Err(ComputeError::HostDataSize {
                expected: current.len(),
                actual: bytes.len(),
            });
        }
        current.copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_pod<T: Pod>(&self, value: &T) -> Result<(), ComputeError> {
        self.write(bytemuck::bytes_of(value))
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> Result<Vec<u8>, ComputeError> {
        Ok(self.bytes.lock()?.clone())
    }

    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, ComputeError> {
        Ok(f(&self.bytes.lock()?))
    }
}

/// Push constant bytes for a single dispatch, written at `offset` into the declared range.
#[derive(Clone, Copy, Debug)]
pub struct PushConstants<'a> {
    pub bytes: &'a [u8],
    pub offset: u32,
}

impl<'a> PushConstants<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn at(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Push constants for scheduled dispatches.  Read each time the hook runs, so repeating dispatches
/// push whatever the caller last wrote.
#[derive(Clone, Debug)]
pub struct PushSource {
    pub data: HostData,
    pub offset: u32,
}

impl PushSource {
    pub fn new(data: HostData) -> Self {
        Self { data, offset: 0 }
    }

    pub fn at(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}
