// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Descriptors
//!
//! (◕‿◕)︵‿︵‿︵‿︵┻━┻
//!
//! Compute shaders here declare a handful of bindings each, in order, and never change them after
//! their first dispatch.  That makes descriptor management boring in a good way: every pipeline
//! gets one set, from a pool sized exactly to the set's bindings, with a little slack in the
//! number of sets so one pool can serve a few pipelines.
//!
//! `DescriptorPoolManager` is the one piece of shared state.  It is created lazily by whoever owns
//! the device, initialized once, and hands out `DescriptorAllocation`s.  Exhausting a pool is fatal
//! for the pipeline asking; there are no retries and no growth.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ash::vk;

use crate::prelude::*;
use crate::util;

/// The number of sets a pool may hold when nothing else is configured.
pub const DEFAULT_MAX_SETS: u32 = 3;

/// One descriptor write, owned so that it can be recorded, compared, and replayed.  Converted into
/// a `vk::WriteDescriptorSet` only at the device boundary.
#[derive(Clone, Copy, Debug)]
pub struct DescriptorWrite {
    pub set: vk::DescriptorSet,
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub resource: WriteResource,
}

#[derive(Clone, Copy, Debug)]
pub enum WriteResource {
    Image(vk::DescriptorImageInfo),
    Buffer(vk::DescriptorBufferInfo),
}

/// A pool and the single set allocated from it.
#[derive(Clone, Copy, Debug)]
pub struct DescriptorAllocation {
    pub pool: vk::DescriptorPool,
    pub set: vk::DescriptorSet,
}

pub struct DescriptorPoolManager {
    max_sets: u32,
    initialized: AtomicBool,
    live_pools: AtomicUsize,
}

impl DescriptorPoolManager {
    pub fn new(max_sets: u32) -> Self {
        Self {
            max_sets: max_sets.max(1),
            initialized: AtomicBool::new(false),
            live_pools: AtomicUsize::new(0),
        }
    }

    /// Idempotent.  Only the first caller does anything.
    pub fn init(&self, device: &dyn ComputeDevice) {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            log::debug!(
                "descriptor pools initialized: {} sets per pool, {:.1}ns timestamp period",
                self.max_sets,
                device.timestamp_period()
            );
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    pub fn live_pools(&self) -> usize {
        self.live_pools.load(Ordering::Acquire)
    }

    /// Create a pool sized to `pool_sizes` and allocate one set of `layout` from it.
    pub fn allocate(
        &self,
        device: &dyn ComputeDevice,
        layout: vk::DescriptorSetLayout,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<DescriptorAllocation, VulkanError> {
        self.init(device);

        let pool = device
            .create_descriptor_pool(self.max_sets, pool_sizes)
            .map_err(exhaustion)?;

        let set = match device.allocate_descriptor_set(pool, layout) {
            Ok(set) => set,
            Err(e) => {
                device.destroy_descriptor_pool(pool);
                return Err(exhaustion(e));
            }
        };

        let live = self.live_pools.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("descriptor pool {pool:?} allocated set {set:?}, {live} live pools");
        Ok(DescriptorAllocation { pool, set })
    }

    /// Destroys the pool, which frees its set.
    pub fn release(&self, device: &dyn ComputeDevice, allocation: DescriptorAllocation) {
        device.destroy_descriptor_pool(allocation.pool);
        // Saturate so that a double release cannot wrap the counter.
        let _ = self
            .live_pools
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

impl Default for DescriptorPoolManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SETS)
    }
}

fn exhaustion(e: VulkanError) -> VulkanError {
    match e {
        VulkanError::Ash(result) if util::is_pool_exhaustion(result) => {
            VulkanError::PoolExhausted(result)
        }
        e => e,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::recording::{Call, RecordingDevice};

    fn sizes() -> [vk::DescriptorPoolSize; 2] {
        [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: 1,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
            },
        ]
    }

    #[test]
    fn test_init_is_idempotent() {
        let device = RecordingDevice::new();
        let pools = DescriptorPoolManager::default();
        assert!(!pools.is_initialized());
        pools.init(&device);
        pools.init(&device);
        assert!(pools.is_initialized());
        // init does not touch the device
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_allocate_and_release() {
        let device = RecordingDevice::new();
        let pools = DescriptorPoolManager::new(3);
        let layout = device.create_descriptor_set_layout(&[]).unwrap();

        let allocation = pools.allocate(&device, layout, &sizes()).unwrap();
        assert!(pools.is_initialized());
        assert_eq!(pools.live_pools(), 1);

        let created = device
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::CreateDescriptorPool {
                    pool,
                    max_sets,
                    pool_sizes,
                } => Some((pool, max_sets, pool_sizes)),
                _ => None,
            })
            .unwrap();
        assert_eq!(created.0, allocation.pool);
        assert_eq!(created.1, 3);
        assert_eq!(created.2.len(), 2);

        pools.release(&device, allocation);
        assert_eq!(pools.live_pools(), 0);
        pools.release(&device, allocation);
        assert_eq!(pools.live_pools(), 0);
    }

    #[test]
    fn test_exhaustion_is_fatal() {
        let device = RecordingDevice::new();
        let pools = DescriptorPoolManager::default();
        let layout = device
            .create_descriptor_set_layout(&[vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE)])
            .unwrap();

        // a pool with no room for the layout's storage image
        let too_small = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
        }];
        match pools.allocate(&device, layout, &too_small) {
            Err(VulkanError::PoolExhausted(vk::Result::ERROR_OUT_OF_POOL_MEMORY)) => {}
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(pools.live_pools(), 0);
        // the pool created for the failed allocation was destroyed
        assert!(
            device
                .calls()
                .iter()
                .any(|c| matches!(c, Call::DestroyDescriptorPool(_)))
        );
    }
}
