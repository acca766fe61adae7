// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Recording Device
//!
//! A `ComputeDevice` with no GPU behind it.  Every call is appended to a log as an owned `Call` and
//! every create hands out a fresh fake handle.  Descriptor pools enforce their set and descriptor
//! capacities the way a driver would, returning `ERROR_OUT_OF_POOL_MEMORY` when a set does not fit.
//!
//! Failures can be injected per object kind, and timestamp results are whatever the test says they
//! are.  This is what the compute crate is tested against on machines without Vulkan.

use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use ash::vk::{self, Handle};

use crate::buffer::BufferAllocation;
use crate::descriptors::DescriptorWrite;
use crate::prelude::*;

/// Owned copy of one `vk::DescriptorSetLayoutBinding`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutBinding {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub count: u32,
}

/// Owned copy of one `vk::ImageMemoryBarrier`.
#[derive(Clone, Copy, Debug)]
pub struct ImageBarrier {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub range: vk::ImageSubresourceRange,
}

#[derive(Clone, Debug)]
pub enum Call {
    CreateDescriptorSetLayout {
        layout: vk::DescriptorSetLayout,
        bindings: Vec<LayoutBinding>,
    },
    DestroyDescriptorSetLayout(vk::DescriptorSetLayout),
    CreatePipelineLayout {
        layout: vk::PipelineLayout,
        set_layouts: Vec<vk::DescriptorSetLayout>,
        push_constant_ranges: Vec<vk::PushConstantRange>,
    },
    DestroyPipelineLayout(vk::PipelineLayout),
    CreateComputePipeline {
        pipeline: vk::Pipeline,
        module: vk::ShaderModule,
        entry_point: String,
        layout: vk::PipelineLayout,
    },
    DestroyPipeline(vk::Pipeline),
    CreateDescriptorPool {
        pool: vk::DescriptorPool,
        max_sets: u32,
        pool_sizes: Vec<vk::DescriptorPoolSize>,
    },
    DestroyDescriptorPool(vk::DescriptorPool),
    AllocateDescriptorSet {
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        set: vk::DescriptorSet,
    },
    UpdateDescriptorSets(Vec<DescriptorWrite>),
    CreateImageView {
        view: vk::ImageView,
        image: vk::Image,
        view_type: vk::ImageViewType,
        format: vk::Format,
        range: vk::ImageSubresourceRange,
    },
    DestroyImageView(vk::ImageView),
    CreateShaderModule {
        module: vk::ShaderModule,
        words: usize,
    },
    DestroyShaderModule(vk::ShaderModule),
    CreateUniformBuffer {
        buffer: vk::Buffer,
        size: vk::DeviceSize,
    },
    WriteBuffer {
        buffer: vk::Buffer,
        bytes: Vec<u8>,
    },
    DestroyBuffer(vk::Buffer),
    CreateTimestampPool {
        pool: vk::QueryPool,
        count: u32,
    },
    DestroyQueryPool(vk::QueryPool),
    PipelineBarrier {
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barriers: Vec<ImageBarrier>,
    },
    BindPipeline(vk::Pipeline),
    BindDescriptorSet {
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
        dynamic_offsets: Vec<u32>,
    },
    PushConstants {
        layout: vk::PipelineLayout,
        offset: u32,
        bytes: Vec<u8>,
    },
    Dispatch([u32; 3]),
    ResetQueryPool {
        pool: vk::QueryPool,
        first: u32,
        count: u32,
    },
    WriteTimestamp {
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    },
}

impl Call {
    /// Recorded into a command buffer rather than executed on the device.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Call::PipelineBarrier { .. }
                | Call::BindPipeline(_)
                | Call::BindDescriptorSet { .. }
                | Call::PushConstants { .. }
                | Call::Dispatch(_)
                | Call::ResetQueryPool { .. }
                | Call::WriteTimestamp { .. }
        )
    }
}

/// Object kinds whose creation can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Failure {
    DescriptorSetLayout,
    PipelineLayout,
    Pipeline,
    DescriptorPool,
    ImageView,
    ShaderModule,
    UniformBuffer,
    TimestampPool,
}

struct PoolState {
    sets_left: u32,
    descriptors_left: HashMap<vk::DescriptorType, u32>,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    failures: HashSet<Failure>,
    live: HashSet<u64>,
    layouts: HashMap<u64, Vec<LayoutBinding>>,
    pools: HashMap<u64, PoolState>,
    buffers: HashMap<u64, Vec<u8>>,
    timestamps: Option<Vec<u64>>,
}

pub struct RecordingDevice {
    state: Mutex<State>,
    next_handle: AtomicU64,
    timestamp_period: f32,
    timestamps_supported: bool,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_handle: AtomicU64::new(1),
            timestamp_period: 1.0,
            timestamps_supported: true,
        }
    }

    pub fn with_timestamp_period(mut self, period: f32) -> Self {
        self.timestamp_period = period;
        self
    }

    /// Act like a queue family with no timestamp bits.
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps_supported = false;
        self
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Only the calls that would have been recorded into command buffers.
    pub fn commands(&self) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.is_command())
            .cloned()
            .collect()
    }

    /// Forget recorded calls.  Objects and their state are kept.
    pub fn clear(&self) {
        self.state().calls.clear();
    }

    /// Created and not yet destroyed.
    pub fn live_handles(&self) -> usize {
        self.state().live.len()
    }

    /// All descriptor writes from every update, flattened.
    pub fn descriptor_writes(&self) -> Vec<DescriptorWrite> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::UpdateDescriptorSets(writes) => Some(writes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn dispatches(&self) -> Vec<[u32; 3]> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Dispatch(groups) => Some(*groups),
                _ => None,
            })
            .collect()
    }

    /// The last bytes written to `buffer`, zero filled before any write.
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Option<Vec<u8>> {
        self.state().buffers.get(&buffer.as_raw()).cloned()
    }

    /// Make every later creation of `kind` fail until `recover` is called.
    pub fn fail(&self, kind: Failure) {
        self.state().failures.insert(kind);
    }

    pub fn recover(&self, kind: Failure) {
        self.state().failures.remove(&kind);
    }

    /// Ticks returned by `timestamp_results`, cut to the requested count.  `None` reads as still
    /// pending.
    pub fn set_timestamps(&self, ticks: Option<Vec<u64>>) {
        self.state().timestamps = ticks;
    }

    // Poisoning is ignored.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle<H: Handle + Copy>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Check for an injected failure, then mint and track a handle.
    fn create<H: Handle + Copy>(
        &self,
        state: &mut State,
        kind: Failure,
    ) -> Result<H, VulkanError> {
        if state.failures.contains(&kind) {
            return Err(VulkanError::Ash(vk::Result::ERROR_INITIALIZATION_FAILED));
        }
        let handle: H = self.handle();
        state.live.insert(handle.as_raw());
        Ok(handle)
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeDevice for RecordingDevice {
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout, VulkanError> {
        let mut state = self.state();
        let layout: vk::DescriptorSetLayout =
            self.create(&mut state, Failure::DescriptorSetLayout)?;
        let bindings: Vec<LayoutBinding> = bindings
            .iter()
            .map(|b| LayoutBinding {
                binding: b.binding,
                ty: b.descriptor_type,
                count: b.descriptor_count,
            })
            .collect();
        state.layouts.insert(layout.as_raw(), bindings.clone());
        state
            .calls
            .push(Call::CreateDescriptorSetLayout { layout, bindings });
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        let mut state = self.state();
        state.live.remove(&layout.as_raw());
        state.calls.push(Call::DestroyDescriptorSetLayout(layout));
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> Result<vk::PipelineLayout, VulkanError> {
        let mut state = self.state();
        let layout = self.create(&mut state, Failure::PipelineLayout)?;
        state.calls.push(Call::CreatePipelineLayout {
            layout,
            set_layouts: set_layouts.to_vec(),
            push_constant_ranges: push_constant_ranges.to_vec(),
        });
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        let mut state = self.state();
        state.live.remove(&layout.as_raw());
        state.calls.push(Call::DestroyPipelineLayout(layout));
    }

    fn create_compute_pipeline(
        &self,
        module: vk::ShaderModule,
        entry_point: &CStr,
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline, VulkanError> {
        let mut state = self.state();
        let pipeline = self.create(&mut state, Failure::Pipeline)?;
        state.calls.push(Call::CreateComputePipeline {
            pipeline,
            module,
            entry_point: entry_point.to_string_lossy().into_owned(),
            layout,
        });
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        let mut state = self.state();
        state.live.remove(&pipeline.as_raw());
        state.calls.push(Call::DestroyPipeline(pipeline));
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, VulkanError> {
        let mut state = self.state();
        let pool: vk::DescriptorPool = self.create(&mut state, Failure::DescriptorPool)?;
        let mut descriptors_left = HashMap::new();
        for size in pool_sizes {
            *descriptors_left.entry(size.ty).or_insert(0) += size.descriptor_count;
        }
        state.pools.insert(
            pool.as_raw(),
            PoolState {
                sets_left: max_sets,
                descriptors_left,
            },
        );
        state.calls.push(Call::CreateDescriptorPool {
            pool,
            max_sets,
            pool_sizes: pool_sizes.to_vec(),
        });
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state();
        state.live.remove(&pool.as_raw());
        state.pools.remove(&pool.as_raw());
        state.calls.push(Call::DestroyDescriptorPool(pool));
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, VulkanError> {
        let mut state = self.state();
        let needed = state.layouts.get(&layout.as_raw()).cloned().unwrap_or_default();
        let Some(pool_state) = state.pools.get_mut(&pool.as_raw()) else {
            return Err(VulkanError::Ash(vk::Result::ERROR_UNKNOWN));
        };

        let fits = pool_state.sets_left > 0
            && needed.iter().all(|b| {
                let available = pool_state.descriptors_left.get(&b.ty).copied().unwrap_or(0);
                let wanted: u32 = needed
                    .iter()
                    .filter(|o| o.ty == b.ty)
                    .map(|o| o.count)
                    .sum();
                available >= wanted
            });
        if !fits {
            return Err(VulkanError::Ash(vk::Result::ERROR_OUT_OF_POOL_MEMORY));
        }

        pool_state.sets_left -= 1;
        for b in &needed {
            if let Some(left) = pool_state.descriptors_left.get_mut(&b.ty) {
                *left -= b.count;
            }
        }

        // Sets are freed with their pool, so they are not tracked as live.
        let set = self.handle();
        state
            .calls
            .push(Call::AllocateDescriptorSet { pool, layout, set });
        Ok(set)
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        self.state()
            .calls
            .push(Call::UpdateDescriptorSets(writes.to_vec()));
    }

    fn create_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> Result<vk::ImageView, VulkanError> {
        let mut state = self.state();
        let view = self.create(&mut state, Failure::ImageView)?;
        state.calls.push(Call::CreateImageView {
            view,
            image: info.image,
            view_type: info.view_type,
            format: info.format,
            range: info.subresource_range,
        });
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut state = self.state();
        state.live.remove(&view.as_raw());
        state.calls.push(Call::DestroyImageView(view));
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule, VulkanError> {
        let mut state = self.state();
        let module = self.create(&mut state, Failure::ShaderModule)?;
        state.calls.push(Call::CreateShaderModule {
            module,
            words: code.len(),
        });
        Ok(module)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        let mut state = self.state();
        state.live.remove(&module.as_raw());
        state.calls.push(Call::DestroyShaderModule(module));
    }

    fn create_uniform_buffer(
        &self,
        size: vk::DeviceSize,
    ) -> Result<BufferAllocation, VulkanError> {
        let mut state = self.state();
        let buffer: vk::Buffer = self.create(&mut state, Failure::UniformBuffer)?;
        let memory = self.handle();
        state.buffers.insert(buffer.as_raw(), vec![0; size as usize]);
        state.calls.push(Call::CreateUniformBuffer { buffer, size });
        Ok(BufferAllocation {
            buffer,
            memory,
            size,
        })
    }

    fn write_buffer(&self, allocation: &BufferAllocation, bytes: &[u8]) -> Result<(), VulkanError> {
        let mut state = self.state();
        let Some(contents) = state.buffers.get_mut(&allocation.buffer.as_raw()) else {
            return Err(VulkanError::Ash(vk::Result::ERROR_MEMORY_MAP_FAILED));
        };
        let len = bytes.len().min(contents.len());
        contents[..len].copy_from_slice(&bytes[..len]);
        state.calls.push(Call::WriteBuffer {
            buffer: allocation.buffer,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn destroy_buffer(&self, allocation: &BufferAllocation) {
        let mut state = self.state();
        let raw = allocation.buffer.as_raw();
        state.live.remove(&raw);
        state.buffers.remove(&raw);
        state.calls.push(Call::DestroyBuffer(allocation.buffer));
    }

    fn create_timestamp_pool(&self, count: u32) -> Result<vk::QueryPool, VulkanError> {
        let mut state = self.state();
        let pool = self.create(&mut state, Failure::TimestampPool)?;
        state.calls.push(Call::CreateTimestampPool { pool, count });
        Ok(pool)
    }

    fn destroy_query_pool(&self, pool: vk::QueryPool) {
        let mut state = self.state();
        state.live.remove(&pool.as_raw());
        state.calls.push(Call::DestroyQueryPool(pool));
    }

    fn timestamp_results(
        &self,
        _pool: vk::QueryPool,
        count: u32,
    ) -> Result<Option<Vec<u64>>, VulkanError> {
        let state = self.state();
        Ok(state
            .timestamps
            .as_ref()
            .map(|ticks| ticks.iter().take(count as usize).copied().collect()))
    }

    fn timestamp_period(&self) -> f32 {
        self.timestamp_period
    }

    fn supports_timestamps(&self) -> bool {
        self.timestamps_supported
    }

    fn cmd_pipeline_barrier(
        &self,
        _cb: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        let barriers = image_barriers
            .iter()
            .map(|b| ImageBarrier {
                image: b.image,
                old_layout: b.old_layout,
                new_layout: b.new_layout,
                src_access: b.src_access_mask,
                dst_access: b.dst_access_mask,
                range: b.subresource_range,
            })
            .collect();
        self.state().calls.push(Call::PipelineBarrier {
            src_stage,
            dst_stage,
            barriers,
        });
    }

    fn cmd_bind_compute_pipeline(&self, _cb: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.state().calls.push(Call::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_set(
        &self,
        _cb: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
        dynamic_offsets: &[u32],
    ) {
        self.state().calls.push(Call::BindDescriptorSet {
            layout,
            set,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn cmd_push_constants(
        &self,
        _cb: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        offset: u32,
        bytes: &[u8],
    ) {
        self.state().calls.push(Call::PushConstants {
            layout,
            offset,
            bytes: bytes.to_vec(),
        });
    }

    fn cmd_dispatch(&self, _cb: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        self.state().calls.push(Call::Dispatch([x, y, z]));
    }

    fn cmd_reset_query_pool(&self, _cb: vk::CommandBuffer, pool: vk::QueryPool, first: u32, count: u32) {
        self.state()
            .calls
            .push(Call::ResetQueryPool { pool, first, count });
    }

    fn cmd_write_timestamp(
        &self,
        _cb: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    ) {
        self.state()
            .calls
            .push(Call::WriteTimestamp { stage, pool, query });
    }
}
