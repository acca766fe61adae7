// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Frame
//!
//! One command buffer and one fence on the compute queue.  Each frame records, submits, and waits
//! before the next one begins, so timestamp results of frame N are ready when frame N + 1 starts.

use ash::vk;

use dispatch_lib::prelude::*;

pub struct Frame {
    pub command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
}

impl Frame {
    pub fn new(context: &VkContext) -> Result<Self, VulkanError> {
        let device = context.device();
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(context.queues.compute_pool())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { device.allocate_command_buffers(&alloc_info)? }[0];

        let fence_info = vk::FenceCreateInfo::default();
        let fence = match unsafe { device.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe {
                    device.free_command_buffers(context.queues.compute_pool(), &[command_buffer])
                };
                return Err(e.into());
            }
        };

        Ok(Self {
            command_buffer,
            fence,
        })
    }

    pub fn begin(&self, context: &VkContext) -> Result<vk::CommandBuffer, VulkanError> {
        let device = context.device();
        let begin = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device.reset_command_buffer(
                self.command_buffer,
                vk::CommandBufferResetFlags::empty(),
            )?;
            device.begin_command_buffer(self.command_buffer, &begin)?;
        }
        Ok(self.command_buffer)
    }

    /// End, submit, and block until the queue has finished the work.
    pub fn submit_and_wait(&self, context: &VkContext) -> Result<(), VulkanError> {
        let device = context.device();
        let command_buffers = [self.command_buffer];
        let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            device.end_command_buffer(self.command_buffer)?;
            device.queue_submit(context.queues.compute_queue(), &[submit], self.fence)?;
            device.wait_for_fences(&[self.fence], true, u64::MAX)?;
            device.reset_fences(&[self.fence])?;
        }
        Ok(())
    }

    pub fn destroy(&self, context: &VkContext) {
        let device = context.device();
        unsafe {
            device.destroy_fence(self.fence, None);
            device.free_command_buffers(context.queues.compute_pool(), &[self.command_buffer]);
        }
    }
}
