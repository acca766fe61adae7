// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Device
//!
//! `ComputeDevice` is the one seam between compute dispatch and Vulkan.  It covers exactly the
//! primitives a compute pipeline needs: layouts, pipelines, descriptor pools and sets, image views,
//! uniform buffers, timestamp queries, and the handful of commands recorded around a dispatch.
//!
//! Handles are plain `vk` handles.  Implementations are not expected to track ownership; callers
//! destroy what they create.  All methods take `&self` because Vulkan devices are externally
//! synchronized per object, not per device.

use std::ffi::CStr;

use ash::vk;

use crate::buffer::BufferAllocation;
use crate::descriptors::DescriptorWrite;
use crate::prelude::*;

pub trait ComputeDevice: Send + Sync {
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout, VulkanError>;

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> Result<vk::PipelineLayout, VulkanError>;

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    fn create_compute_pipeline(
        &self,
        module: vk::ShaderModule,
        entry_point: &CStr,
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline, VulkanError>;

    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, VulkanError>;

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, VulkanError>;

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]);

    fn create_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> Result<vk::ImageView, VulkanError>;

    fn destroy_image_view(&self, view: vk::ImageView);

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule, VulkanError>;

    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Host visible and coherent, usable as a uniform buffer.
    fn create_uniform_buffer(&self, size: vk::DeviceSize)
        -> Result<BufferAllocation, VulkanError>;

    /// Map, copy `bytes` to the start of the allocation, unmap.
    fn write_buffer(&self, allocation: &BufferAllocation, bytes: &[u8]) -> Result<(), VulkanError>;

    fn destroy_buffer(&self, allocation: &BufferAllocation);

    fn create_timestamp_pool(&self, count: u32) -> Result<vk::QueryPool, VulkanError>;

    fn destroy_query_pool(&self, pool: vk::QueryPool);

    /// Raw 64-bit timestamp ticks for queries `0..count`.  `Ok(None)` while any result is still
    /// pending on the GPU.  Never waits.
    fn timestamp_results(
        &self,
        pool: vk::QueryPool,
        count: u32,
    ) -> Result<Option<Vec<u64>>, VulkanError>;

    /// Nanoseconds per timestamp tick.
    fn timestamp_period(&self) -> f32;

    /// Whether the queue dispatches are recorded for can write timestamps.
    fn supports_timestamps(&self) -> bool;

    fn cmd_pipeline_barrier(
        &self,
        cb: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    );

    fn cmd_bind_compute_pipeline(&self, cb: vk::CommandBuffer, pipeline: vk::Pipeline);

    fn cmd_bind_descriptor_set(
        &self,
        cb: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
        dynamic_offsets: &[u32],
    );

    fn cmd_push_constants(
        &self,
        cb: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        offset: u32,
        bytes: &[u8],
    );

    fn cmd_dispatch(&self, cb: vk::CommandBuffer, x: u32, y: u32, z: u32);

    fn cmd_reset_query_pool(&self, cb: vk::CommandBuffer, pool: vk::QueryPool, first: u32, count: u32);

    fn cmd_write_timestamp(
        &self,
        cb: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    );
}
