// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Shaders
//!
//! `ShaderDirs` is a set of realized directories where shader lookups may search.  Hold onto it
//! for many lookups but re-initialize it when the environment may have changed.
//!
//! ## Precedence Rules
//!
//! 1. A path that exists as given, absolute or relative to the working directory.
//! 2. `DISPATCH_SHADER_DIR`, for overrides of any kind.
//! 3. The working directory's `shaders/` folder.
//! 4. `<data_local_dir>/dispatch/shaders`, where packaged shaders are installed.
//!
//! Names without an extension are also tried with `.spv` appended.

use std::path::{Path, PathBuf};

use crate::prelude::*;

pub const SHADER_DIR_ENV: &str = "DISPATCH_SHADER_DIR";

/// The first word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

pub struct ShaderDirs {
    search_paths: Vec<PathBuf>,
}

impl ShaderDirs {
    /// Checks shader search directories once on construction.
    pub fn new() -> Self {
        let mut search_paths = Vec::with_capacity(3);

        let as_dir = |p: PathBuf| -> Option<PathBuf> {
            p.canonicalize().ok().filter(|p| p.is_dir())
        };

        if let Ok(raw) = std::env::var(SHADER_DIR_ENV) {
            match as_dir(PathBuf::from(&raw)) {
                Some(path) => search_paths.push(path),
                None => log::warn!("invalid {SHADER_DIR_ENV} (path not found): {raw}"),
            }
        }

        std::env::current_dir()
            .ok()
            .map(|p| p.join("shaders"))
            .and_then(as_dir)
            .into_iter()
            .for_each(|p| search_paths.push(p));

        dirs::data_local_dir()
            .map(|p| p.join("dispatch").join("shaders"))
            .and_then(as_dir)
            .into_iter()
            .for_each(|p| search_paths.push(p));

        ShaderDirs { search_paths }
    }

    /// Search exactly `search_paths`, in order.  No environment lookups.
    pub fn with_paths(search_paths: Vec<PathBuf>) -> Self {
        ShaderDirs { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let given = Path::new(name);
        let mut names = vec![given.to_path_buf()];
        if given.extension().is_none() {
            names.push(given.with_extension("spv"));
        }

        let direct = names.iter().filter(|n| n.is_file()).cloned();
        let searched = self
            .search_paths
            .iter()
            .flat_map(|root| names.iter().map(move |n| root.join(n)));

        let found = direct.chain(searched).find(|candidate| candidate.is_file());
        if found.is_none() {
            log::warn!("shader {name} not found");
            self.search_paths.iter().for_each(|p| {
                log::debug!("  checked: {p:?}");
            });
        }
        found
    }

    /// Find `name` and read it as SPIR-V words.
    pub fn load_spirv(&self, name: &str) -> Result<Vec<u32>, AssetError> {
        let path = self
            .find(name)
            .ok_or_else(|| AssetError::NotFound(name.to_owned()))?;
        let bytes = std::fs::read(&path)?;
        log::debug!("loaded shader {path:?}, {} bytes", bytes.len());
        spirv_words(&bytes)
    }
}

impl Default for ShaderDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// Reinterpret `bytes` as SPIR-V words, validating length and magic number.  Modules written in
/// the opposite byte order are swapped to native order.
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, AssetError> {
    if bytes.len() % size_of::<u32>() != 0 {
        return Err(AssetError::InvalidShader(format!(
            "SPIR-V length not multiple of 4: {} bytes",
            bytes.len()
        )));
    }

    let mut words: Vec<u32> = bytes
        .chunks_exact(size_of::<u32>())
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&m) if m.swap_bytes() == SPIRV_MAGIC => {
            words.iter_mut().for_each(|w| *w = w.swap_bytes());
            Ok(words)
        }
        Some(m) => Err(AssetError::InvalidShader(format!("bad magic number {m:#010x}"))),
        None => Err(AssetError::InvalidShader("empty module".to_owned())),
    }
}
