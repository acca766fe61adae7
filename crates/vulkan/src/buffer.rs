// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Buffer
//!
//! `BufferAllocation` is a uniform buffer in host visible, host coherent memory.  Writes map,
//! copy, and unmap every time.  Uniforms here are small and rarely updated, so a persistent
//! mapping buys nothing.
//!
//! This treatment does not use any kind of RAII.  The owner hands the allocation back to the device
//! that created it.

use ash::vk;

use crate::prelude::*;
use crate::util;

#[derive(Clone, Copy, Debug)]
pub struct BufferAllocation {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    /// Requested size, not the allocation size the driver rounded up to.
    pub size: vk::DeviceSize,
}

impl BufferAllocation {
    /// Descriptor info covering the whole buffer.
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: self.size,
        }
    }

    pub(crate) fn new_uniform(
        context: &VkContext,
        size: vk::DeviceSize,
    ) -> Result<Self, VulkanError> {
        let device = context.device();
        let buffer_ci = vk::BufferCreateInfo {
            size,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer = unsafe { device.create_buffer(&buffer_ci, None)? };
        let mem_req = unsafe { device.get_buffer_memory_requirements(buffer) };
        let mem_props = unsafe {
            context
                .instance
                .get_physical_device_memory_properties(context.physical_device)
        };

        let required = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let Some(memory_type_index) = util::find_memory_type_index(&mem_req, &mem_props, required)
        else {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(VulkanError::NoMemoryType(required));
        };

        let alloc_info = vk::MemoryAllocateInfo {
            allocation_size: mem_req.size,
            memory_type_index,
            ..Default::default()
        };
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };
        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        Ok(Self {
            buffer,
            memory,
            size,
        })
    }

    pub(crate) fn write(&self, context: &VkContext, bytes: &[u8]) -> Result<(), VulkanError> {
        let device = context.device();
        let len = bytes.len().min(self.size as usize);
        unsafe {
            let ptr = device.map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, len);
            device.unmap_memory(self.memory);
        }
        Ok(())
    }

    pub(crate) fn destroy(&self, context: &VkContext) {
        let device = context.device();
        unsafe {
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}
