// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Assets
//!
//! Compute shaders arrive as precompiled SPIR-V files.  This crate finds them and turns them into
//! words a shader module can be created from.  Nothing here compiles GLSL; bring `.spv` files.

pub mod shaders;

pub use shaders::*;

mod prelude {
    pub use super::AssetError;
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("read failed: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("shader not found: {0}")]
    NotFound(String),
    #[error("invalid SPIR-V: {0}")]
    InvalidShader(String),
}
