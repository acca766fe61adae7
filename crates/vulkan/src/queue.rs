// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Queue
//!
//! Vulkan device queues and command buffer pools are tightly coupled.  Compute dispatch needs one
//! compute capable queue.  Families that can write timestamps win over those that cannot.

use ash::vk;

use crate::prelude::*;

/// Queues
pub struct Queues {
    compute: Queue,

    pub compute_family_index: u32,
}

impl Queues {
    pub fn compute_queue(&self) -> vk::Queue {
        self.compute.queue
    }

    pub fn compute_pool(&self) -> vk::CommandPool {
        self.compute.command_pool
    }

    pub fn new(device: &ash::Device, queue_families: &QueueFamilies) -> Result<Self, VulkanError> {
        let compute = Queue::new(device, queue_families.compute)?;
        Ok(Queues {
            compute_family_index: queue_families.compute,
            compute,
        })
    }

    pub fn destroy(&self, device: &ash::Device) {
        self.compute.destroy(device);
    }
}

struct Queue {
    pub queue: vk::Queue,
    pub command_pool: vk::CommandPool,
}

impl Queue {
    fn new(device: &ash::Device, queue_family_index: u32) -> Result<Self, VulkanError> {
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let command_pool_ci = vk::CommandPoolCreateInfo {
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index,
            ..Default::default()
        };

        let command_pool = unsafe { device.create_command_pool(&command_pool_ci, None)? };
        Ok(Self {
            queue,
            command_pool,
        })
    }

    fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_command_pool(self.command_pool, None);
        }
        // NOTE device owns queues.  Just drop handles.
    }
}

/// The chosen compute family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub compute: u32,
    /// Zero when the family cannot write timestamps.
    pub timestamp_valid_bits: u32,
}

impl QueueFamilies {
    pub fn new(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Option<Self> {
        let qfps =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        Self::from_properties(&qfps)
    }

    /// Prefer timestamp capable families, then the ones with the fewest capabilities beyond
    /// compute, which tends to select dedicated hardware queues.
    pub fn from_properties(qfps: &[vk::QueueFamilyProperties]) -> Option<Self> {
        let compute = min_caps_family(qfps, vk::QueueFlags::COMPUTE)?;
        Some(QueueFamilies {
            compute,
            timestamp_valid_bits: qfps[compute as usize].timestamp_valid_bits,
        })
    }

    pub fn supports_timestamps(&self) -> bool {
        self.timestamp_valid_bits > 0
    }

    pub fn queue_cis<'a>(&self, priorities: &'a [f32]) -> Vec<vk::DeviceQueueCreateInfo<'a>> {
        vec![
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(self.compute)
                .queue_priorities(priorities),
        ]
    }
}

/// Return the queue index of the family with the minimum support for the requested `flags`.
fn min_caps_family(qfps: &[vk::QueueFamilyProperties], flags: vk::QueueFlags) -> Option<u32> {
    qfps.iter()
        .enumerate()
        .filter(|(_, qf)| qf.queue_count > 0 && qf.queue_flags.contains(flags))
        .min_by_key(|(_, qf)| {
            (
                qf.timestamp_valid_bits == 0,
                qf.queue_flags.as_raw().count_ones(),
            )
        })
        .map(|(i, _)| i as u32)
}
