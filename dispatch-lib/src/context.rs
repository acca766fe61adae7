// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Context
//!
//! `ComputeContext` is what every compute shader is handed instead of reaching for globals: the
//! device, configuration, and the shared descriptor pool manager.  The manager is created on first
//! demand and torn down with the context.
//!
//! ## Environment
//!
//! `ComputeConfig::from_env` reads:
//!
//! - `DISPATCH_MAX_SETS`: sets per descriptor pool, a positive integer.
//! - `DISPATCH_TIMESTAMPS`: write GPU timestamps around dispatches, `1`/`0`, `true`/`false`, `on`/`off`.
//! - `DISPATCH_RELEASE_BARRIERS`: barrier storage images after each dispatch, same values.
//!
//! Unparseable values are logged and ignored.

use std::ffi::{CStr, CString};
use std::sync::{Arc, OnceLock};

use dispatch_vulkan::descriptors::{DEFAULT_MAX_SETS, DescriptorPoolManager};

use crate::prelude::*;

pub const MAX_SETS_ENV: &str = "DISPATCH_MAX_SETS";
pub const TIMESTAMPS_ENV: &str = "DISPATCH_TIMESTAMPS";
pub const RELEASE_BARRIERS_ENV: &str = "DISPATCH_RELEASE_BARRIERS";

#[derive(Clone, Debug, PartialEq)]
pub struct ComputeConfig {
    /// Sets each descriptor pool may hold.  Pools are sized per pipeline, so this is slack.
    pub max_sets_per_pool: u32,
    /// Shader entry point name.
    pub entry_point: CString,
    pub timestamps: bool,
    /// Make storage image writes visible to later stages after every dispatch.
    pub release_barriers: bool,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            max_sets_per_pool: DEFAULT_MAX_SETS,
            entry_point: c"main".to_owned(),
            timestamps: true,
            release_barriers: true,
        }
    }
}

impl ComputeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(MAX_SETS_ENV) {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.max_sets_per_pool = n,
                _ => log::warn!("ignoring {MAX_SETS_ENV}={raw:?}, expected a positive integer"),
            }
        }
        if let Some(raw) = lookup(TIMESTAMPS_ENV) {
            match parse_switch(&raw) {
                Some(on) => config.timestamps = on,
                None => log::warn!("ignoring {TIMESTAMPS_ENV}={raw:?}"),
            }
        }
        if let Some(raw) = lookup(RELEASE_BARRIERS_ENV) {
            match parse_switch(&raw) {
                Some(on) => config.release_barriers = on,
                None => log::warn!("ignoring {RELEASE_BARRIERS_ENV}={raw:?}"),
            }
        }
        config
    }

    pub fn entry_point(&self) -> &CStr {
        &self.entry_point
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

pub struct ComputeContext {
    device: Arc<dyn ComputeDevice>,
    config: ComputeConfig,
    pools: OnceLock<DescriptorPoolManager>,
}

impl ComputeContext {
    pub fn new(device: Arc<dyn ComputeDevice>, config: ComputeConfig) -> Self {
        Self {
            device,
            config,
            pools: OnceLock::new(),
        }
    }

    pub fn device(&self) -> &dyn ComputeDevice {
        self.device.as_ref()
    }

    pub fn config(&self) -> &ComputeConfig {
        &self.config
    }

    /// The shared pool manager, created and initialized on first call.
    pub fn pools(&self) -> &DescriptorPoolManager {
        let pools = self
            .pools
            .get_or_init(|| DescriptorPoolManager::new(self.config.max_sets_per_pool));
        pools.init(self.device());
        pools
    }

    /// Whether anything has asked for the pool manager yet.
    pub fn has_pools(&self) -> bool {
        self.pools.get().is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use dispatch_vulkan::recording::RecordingDevice;

    #[test]
    fn test_config_lookup() {
        let config = ComputeConfig::from_lookup(|key| match key {
            MAX_SETS_ENV => Some("8".to_owned()),
            TIMESTAMPS_ENV => Some("off".to_owned()),
            RELEASE_BARRIERS_ENV => Some("maybe".to_owned()),
            _ => None,
        });
        assert_eq!(config.max_sets_per_pool, 8);
        assert!(!config.timestamps);
        // unparseable, default kept
        assert!(config.release_barriers);
        assert_eq!(config.entry_point(), c"main");

        let config = ComputeConfig::from_lookup(|key| (key == MAX_SETS_ENV).then(|| "0".to_owned()));
        assert_eq!(config.max_sets_per_pool, DEFAULT_MAX_SETS);
    }

    #[test]
    fn test_pools_created_once() {
        let context = ComputeContext::new(Arc::new(RecordingDevice::new()), ComputeConfig::default());
        assert!(!context.has_pools());
        let first = context.pools() as *const DescriptorPoolManager;
        let second = context.pools() as *const DescriptorPoolManager;
        assert!(context.has_pools());
        assert!(context.pools().is_initialized());
        assert_eq!(first, second);
        assert_eq!(context.pools().max_sets(), DEFAULT_MAX_SETS);
    }
}
