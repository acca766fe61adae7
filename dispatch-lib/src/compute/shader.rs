// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Compute Shader
//!
//! A `ComputeShader` moves through three states:
//!
//! - `Uninitialized`: bindings, the binding offset, and the push constant size may change freely.
//! - `Initializing`: entered on the first dispatch or `initialize` call.  The binding list is
//!   frozen from here on.  A shader whose pipeline failed to build stays here and refuses to
//!   dispatch.
//! - `Ready`: dispatches copy dirty data, rewrite dirty descriptors, and record commands.
//!
//! Each dispatch records, in order: first-use layout transitions for storage images, the lazy
//! pipeline build, pending updates, the timestamp reset, pipeline and descriptor set binds, push
//! constants, the timestamped dispatch, and release barriers for storage images.
//!
//! Texture views replaced by `update_texture` may still be referenced by command buffers in
//! flight.  They are retired and destroyed only when the shader drops.

use std::sync::{Arc, Mutex};

use ash::vk;
use dispatch_assets::ShaderDirs;
use dispatch_vulkan::descriptors::DescriptorWrite;
use smallvec::SmallVec;

use crate::compute::binding::{Binding, BindingIndex, BindingKind};
use crate::compute::data::{HostData, PushConstants};
use crate::compute::layout::{ComputePipeline, LayoutPlan};
use crate::compute::timer::{DispatchTiming, TimestampQuery};
use crate::context::ComputeContext;
use crate::prelude::*;

/// How scheduled dispatches hold their shader.
pub type SharedComputeShader = Arc<Mutex<ComputeShader>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Compiled SPIR-V handed to the device.  Owned by the shader built from it.
pub struct ShaderModule {
    handle: vk::ShaderModule,
}

impl ShaderModule {
    pub fn from_spirv(device: &dyn ComputeDevice, words: &[u32]) -> Result<Self, ComputeError> {
        Ok(Self {
            handle: device.create_shader_module(words)?,
        })
    }

    pub fn load(
        device: &dyn ComputeDevice,
        dirs: &ShaderDirs,
        name: &str,
    ) -> Result<Self, ComputeError> {
        let words = dirs.load_spirv(name)?;
        Self::from_spirv(device, &words)
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    fn destroy(&self, device: &dyn ComputeDevice) {
        device.destroy_shader_module(self.handle);
    }
}

pub struct ComputeShader {
    context: Arc<ComputeContext>,
    module: ShaderModule,
    bindings: Vec<Binding>,
    binding_offset: u32,
    push_constant_size: Option<u32>,
    state: ShaderState,
    pipeline: Option<ComputePipeline>,
    timer: Option<TimestampQuery>,
    retired_views: Vec<vk::ImageView>,
}

impl ComputeShader {
    /// No GPU resources besides `module` exist until the first dispatch.
    pub fn new(context: Arc<ComputeContext>, module: ShaderModule) -> Self {
        Self {
            context,
            module,
            bindings: Vec::new(),
            binding_offset: 0,
            push_constant_size: None,
            state: ShaderState::Uninitialized,
            pipeline: None,
            timer: None,
            retired_views: Vec::new(),
        }
    }

    pub fn from_spirv(context: Arc<ComputeContext>, words: &[u32]) -> Result<Self, ComputeError> {
        let module = ShaderModule::from_spirv(context.device(), words)?;
        Ok(Self::new(context, module))
    }

    /// Look `path` up through the default shader directories and load it.
    pub fn create(context: Arc<ComputeContext>, path: &str) -> Result<Self, ComputeError> {
        let module = ShaderModule::load(context.device(), &ShaderDirs::new(), path)?;
        Ok(Self::new(context, module))
    }

    /// Share for use with `begin_dispatch`.
    pub fn into_shared(self) -> SharedComputeShader {
        Arc::new(Mutex::new(self))
    }

    pub fn context(&self) -> &Arc<ComputeContext> {
        &self.context
    }

    pub fn state(&self) -> ShaderState {
        self.state
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn binding(&self, index: BindingIndex) -> Result<&Binding, ComputeError> {
        let position = self.position(index)?;
        Ok(&self.bindings[position])
    }

    pub fn binding_offset(&self) -> u32 {
        self.binding_offset
    }

    pub fn push_constant_size(&self) -> Option<u32> {
        self.push_constant_size
    }

    pub fn pipeline(&self) -> Option<&ComputePipeline> {
        self.pipeline.as_ref()
    }

    /// Reserve leading binding numbers for resources bound by someone else.
    pub fn set_binding_offset(&mut self, offset: u32) -> Result<(), ComputeError> {
        self.ensure_uninitialized()?;
        if offset.checked_add(self.bindings.len() as u32).is_none() {
            return Err(ComputeError::InvalidResource(
                "binding offset leaves no room for the declared bindings",
            ));
        }
        self.binding_offset = offset;
        Ok(())
    }

    /// Storage image written by the shader at `mip_level` and below.
    pub fn add_target_image(
        &mut self,
        texture: Arc<dyn Texture>,
        mip_level: u32,
    ) -> Result<BindingIndex, ComputeError> {
        if mip_level >= texture.mip_levels() {
            return Err(ComputeError::InvalidResource(
                "mip level beyond the texture's mip chain",
            ));
        }
        self.push_binding(BindingKind::StorageImage { texture, mip_level })
    }

    /// Image read through its sampler.
    pub fn add_sampler(&mut self, texture: Arc<dyn Texture>) -> Result<BindingIndex, ComputeError> {
        self.push_binding(BindingKind::SampledImage { texture })
    }

    /// Uniform buffer filled from `data`.  Keep a clone of `data`, write to it, and call `update`
    /// to have the next dispatch copy it.
    pub fn add_uniform_buffer(
        &mut self,
        data: HostData,
        dynamic: bool,
    ) -> Result<BindingIndex, ComputeError> {
        if data.is_empty() {
            return Err(ComputeError::InvalidResource("uniform buffer data is empty"));
        }
        self.push_binding(BindingKind::Uniform { data, dynamic })
    }

    /// Declare the push constant range.  Replaces any earlier declaration.
    pub fn setup_push_constant(&mut self, size: u32) -> Result<(), ComputeError> {
        self.ensure_uninitialized()?;
        if size == 0 || size % 4 != 0 {
            return Err(ComputeError::InvalidResource(
                "push constant size must be a non-zero multiple of 4",
            ));
        }
        self.push_constant_size = Some(size);
        Ok(())
    }

    /// Copy the uniform's current data on the next dispatch.
    pub fn update(&mut self, index: BindingIndex) -> Result<(), ComputeError> {
        let position = self.position(index)?;
        let binding = &mut self.bindings[position];
        if !matches!(binding.kind(), BindingKind::Uniform { .. }) {
            return Err(ComputeError::BindingKindMismatch {
                index,
                expected: "uniform buffer",
                actual: binding.kind().name(),
            });
        }
        binding.mark_pending();
        Ok(())
    }

    /// Point an image binding at a different texture from the next dispatch on.
    pub fn update_texture(
        &mut self,
        index: BindingIndex,
        texture: Arc<dyn Texture>,
    ) -> Result<(), ComputeError> {
        let position = self.position(index)?;
        let binding = &mut self.bindings[position];
        if binding.kind().texture().is_none() {
            return Err(ComputeError::BindingKindMismatch {
                index,
                expected: "image",
                actual: binding.kind().name(),
            });
        }
        if let BindingKind::StorageImage { mip_level, .. } = binding.kind() {
            if *mip_level >= texture.mip_levels() {
                return Err(ComputeError::InvalidResource(
                    "mip level beyond the texture's mip chain",
                ));
            }
        }
        if let Some(retired) = binding.replace_texture(texture) {
            self.retired_views.push(retired);
        }
        Ok(())
    }

    /// Build the pipeline now rather than on the first dispatch.  Idempotent.
    pub fn initialize(&mut self) -> Result<(), ComputeError> {
        match self.state {
            ShaderState::Ready => return Ok(()),
            ShaderState::Initializing => return Err(ComputeError::InitializationFailed),
            ShaderState::Uninitialized => {}
        }
        self.state = ShaderState::Initializing;

        let context = self.context.clone();
        match self.build(&context) {
            Ok(()) => {
                self.state = ShaderState::Ready;
                Ok(())
            }
            Err(e) => {
                log::error!("compute pipeline initialization failed: {e}");
                self.release_resources(context.device());
                Err(e)
            }
        }
    }

    /// Record one dispatch of `groups` work groups into `cb`.
    pub fn dispatch(
        &mut self,
        cb: vk::CommandBuffer,
        groups: [u32; 3],
        push: Option<PushConstants<'_>>,
    ) -> Result<(), ComputeError> {
        if self.state == ShaderState::Initializing {
            return Err(ComputeError::InitializationFailed);
        }
        if let Some(push) = &push {
            self.check_push(push)?;
        }

        let context = self.context.clone();
        let device = context.device();

        self.record_transitions(device, cb)?;
        self.initialize()?;
        let Some(pipeline) = self.pipeline else {
            return Err(ComputeError::InitializationFailed);
        };
        self.apply_updates(device)?;

        if let Some(timer) = &self.timer {
            timer.reset(device, cb);
        }
        device.cmd_bind_compute_pipeline(cb, pipeline.pipeline);
        if let Some(set) = pipeline.descriptor_set() {
            let dynamic_offsets: SmallVec<u32, 4> = self
                .bindings
                .iter()
                .filter(|b| b.kind().is_dynamic())
                .map(|_| 0)
                .collect();
            device.cmd_bind_descriptor_set(cb, pipeline.pipeline_layout, set, &dynamic_offsets);
        }
        if let Some(push) = push {
            device.cmd_push_constants(cb, pipeline.pipeline_layout, push.offset, push.bytes);
        }

        if let Some(timer) = &self.timer {
            timer.write_start(device, cb);
        }
        let [x, y, z] = groups;
        device.cmd_dispatch(cb, x, y, z);
        if let Some(timer) = &mut self.timer {
            timer.write_end(device, cb);
        }

        if context.config().release_barriers {
            self.record_releases(device, cb)?;
        }
        log::trace!("dispatched {pipeline:?} with groups {groups:?}");
        Ok(())
    }

    pub fn query_timer(&self) -> Option<&TimestampQuery> {
        self.timer.as_ref()
    }

    /// Timing of the most recent dispatch, once the GPU has produced it.
    pub fn timings(&self) -> Result<Option<DispatchTiming>, ComputeError> {
        match &self.timer {
            Some(timer) => timer.results(self.context.device()),
            None => Ok(None),
        }
    }

    fn ensure_uninitialized(&self) -> Result<(), ComputeError> {
        match self.state {
            ShaderState::Uninitialized => Ok(()),
            _ => Err(ComputeError::InvalidResource(
                "bindings are frozen once the pipeline is built",
            )),
        }
    }

    fn push_binding(&mut self, kind: BindingKind) -> Result<BindingIndex, ComputeError> {
        self.ensure_uninitialized()?;
        let index = self
            .binding_offset
            .checked_add(self.bindings.len() as u32)
            .ok_or(ComputeError::InvalidResource("binding number out of range"))?;
        self.bindings.push(Binding::new(kind));
        Ok(index)
    }

    fn position(&self, index: BindingIndex) -> Result<usize, ComputeError> {
        index
            .checked_sub(self.binding_offset)
            .map(|p| p as usize)
            .filter(|p| *p < self.bindings.len())
            .ok_or(ComputeError::BindingOutOfRange {
                index,
                first: self.binding_offset,
                end: self.binding_offset.saturating_add(self.bindings.len() as u32),
            })
    }

    pub(crate) fn check_push(&self, push: &PushConstants<'_>) -> Result<(), ComputeError> {
        let declared = self
            .push_constant_size
            .ok_or(ComputeError::PushConstantsUndeclared)?;
        let len = push.bytes.len() as u32;
        let fits = push
            .offset
            .checked_add(len)
            .is_some_and(|end| end <= declared);
        if len == 0 || push.offset % 4 != 0 || len % 4 != 0 || !fits {
            return Err(ComputeError::PushConstantRange {
                offset: push.offset,
                len,
                declared,
            });
        }
        Ok(())
    }

    fn build(&mut self, context: &ComputeContext) -> Result<(), ComputeError> {
        let device = context.device();
        if context.config().timestamps {
            if device.supports_timestamps() {
                self.timer = Some(TimestampQuery::new(device)?);
            } else {
                log::warn!("timestamps requested but the device cannot write them");
            }
        }
        for binding in &mut self.bindings {
            binding.realize(device)?;
        }

        let plan = LayoutPlan::new(&self.bindings, self.binding_offset, self.push_constant_size);
        self.pipeline = Some(plan.build(context, self.module.handle())?);
        self.flush_descriptors(device, false);
        Ok(())
    }

    fn record_transitions(
        &mut self,
        device: &dyn ComputeDevice,
        cb: vk::CommandBuffer,
    ) -> Result<(), ComputeError> {
        let mut barriers: SmallVec<vk::ImageMemoryBarrier<'static>, 4> = SmallVec::new();
        for binding in &mut self.bindings {
            if let Some(barrier) = binding.take_transition()? {
                barriers.push(barrier);
            }
        }
        if !barriers.is_empty() {
            device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                &barriers,
            );
        }
        Ok(())
    }

    fn record_releases(
        &self,
        device: &dyn ComputeDevice,
        cb: vk::CommandBuffer,
    ) -> Result<(), ComputeError> {
        let mut barriers: SmallVec<vk::ImageMemoryBarrier<'static>, 4> = SmallVec::new();
        for binding in &self.bindings {
            if let Some(barrier) = binding.release_barrier()? {
                barriers.push(barrier);
            }
        }
        if !barriers.is_empty() {
            device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::ALL_COMMANDS,
                &barriers,
            );
        }
        Ok(())
    }

    fn apply_updates(&mut self, device: &dyn ComputeDevice) -> Result<(), ComputeError> {
        for binding in self.bindings.iter_mut().filter(|b| b.is_pending()) {
            // Swapped textures have no view until now.
            binding.realize(device)?;
            binding.upload(device)?;
        }
        self.flush_descriptors(device, true);
        Ok(())
    }

    /// One descriptor update covering every binding, or only the pending ones.  Nothing is
    /// recorded when there is nothing to write.
    fn flush_descriptors(&mut self, device: &dyn ComputeDevice, pending_only: bool) {
        let Some(set) = self.pipeline.and_then(|p| p.descriptor_set()) else {
            return;
        };
        let offset = self.binding_offset;
        let writes: Vec<DescriptorWrite> = self
            .bindings
            .iter_mut()
            .enumerate()
            .filter(|(_, b)| !pending_only || b.is_pending())
            .filter_map(|(i, b)| b.take_write(set, offset + i as u32))
            .collect();
        if !writes.is_empty() {
            log::trace!("writing {} descriptors to {set:?}", writes.len());
            device.update_descriptor_sets(&writes);
        }
    }

    /// Everything except the pipeline and module.
    fn release_resources(&mut self, device: &dyn ComputeDevice) {
        for binding in &mut self.bindings {
            binding.release(device);
        }
        if let Some(timer) = self.timer.take() {
            timer.destroy(device);
        }
        for view in self.retired_views.drain(..) {
            device.destroy_image_view(view);
        }
    }
}

impl Drop for ComputeShader {
    fn drop(&mut self) {
        let context = self.context.clone();
        let device = context.device();
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy(&context);
        }
        self.release_resources(device);
        self.module.destroy(device);
    }
}
