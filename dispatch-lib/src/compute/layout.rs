// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Layout
//!
//! `LayoutPlan` is the pure half: given the ordered bindings, the binding offset, and the declared
//! push constant size, it derives the descriptor set layout bindings, a pool size table with one
//! entry per distinct descriptor type, and the push constant range.  `LayoutPlan::build` is the
//! effectful half, creating every handle of a `ComputePipeline` and unwinding on failure.

use ash::vk;
use dispatch_vulkan::descriptors::DescriptorAllocation;

use crate::compute::binding::{Binding, BindingIndex};
use crate::context::ComputeContext;
use crate::prelude::*;

#[derive(Clone, Debug, Default)]
pub struct LayoutPlan {
    /// Binding number and type, in declaration order.
    pub bindings: Vec<(BindingIndex, vk::DescriptorType)>,
    /// Descriptor counts per type, in order of first appearance.
    pub pool_sizes: Vec<vk::DescriptorPoolSize>,
    pub push_constant: Option<vk::PushConstantRange>,
}

impl LayoutPlan {
    pub fn new(bindings: &[Binding], offset: u32, push_constant_size: Option<u32>) -> Self {
        let bindings: Vec<(BindingIndex, vk::DescriptorType)> = bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (offset + i as u32, b.descriptor_type()))
            .collect();

        let mut pool_sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for (_, ty) in &bindings {
            match pool_sizes.iter_mut().find(|s| s.ty == *ty) {
                Some(size) => size.descriptor_count += 1,
                None => pool_sizes.push(vk::DescriptorPoolSize {
                    ty: *ty,
                    descriptor_count: 1,
                }),
            }
        }

        let push_constant = push_constant_size.map(|size| vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::COMPUTE,
            offset: 0,
            size,
        });

        Self {
            bindings,
            pool_sizes,
            push_constant,
        }
    }

    pub fn layout_bindings(&self) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings
            .iter()
            .map(|(binding, ty)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(*binding)
                    .descriptor_type(*ty)
                    .descriptor_count(1)
                    .stage_flags(vk::ShaderStageFlags::COMPUTE)
            })
            .collect()
    }

    /// Create the set layout, pipeline layout, pipeline, and descriptor set.  Anything created
    /// before a failure is destroyed before returning the error.
    pub fn build(
        &self,
        context: &ComputeContext,
        module: vk::ShaderModule,
    ) -> Result<ComputePipeline, ComputeError> {
        let device = context.device();

        let set_layout = device.create_descriptor_set_layout(&self.layout_bindings())?;

        let push_ranges: Vec<vk::PushConstantRange> = self.push_constant.into_iter().collect();
        let pipeline_layout = match device.create_pipeline_layout(&[set_layout], &push_ranges) {
            Ok(layout) => layout,
            Err(e) => {
                device.destroy_descriptor_set_layout(set_layout);
                return Err(e.into());
            }
        };

        let pipeline = match device.create_compute_pipeline(
            module,
            context.config().entry_point(),
            pipeline_layout,
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                device.destroy_pipeline_layout(pipeline_layout);
                device.destroy_descriptor_set_layout(set_layout);
                return Err(e.into());
            }
        };

        // Shaders fed only by push constants get no pool and no set.
        let allocation = if self.pool_sizes.is_empty() {
            Ok(None)
        } else {
            context
                .pools()
                .allocate(device, set_layout, &self.pool_sizes)
                .map(Some)
        };
        let descriptors = match allocation {
            Ok(descriptors) => descriptors,
            Err(e) => {
                device.destroy_pipeline(pipeline);
                device.destroy_pipeline_layout(pipeline_layout);
                device.destroy_descriptor_set_layout(set_layout);
                return Err(e.into());
            }
        };

        log::debug!(
            "compute pipeline {pipeline:?}: {} bindings, push constants {:?}",
            self.bindings.len(),
            self.push_constant.map(|r| r.size)
        );

        Ok(ComputePipeline {
            pipeline,
            pipeline_layout,
            set_layout,
            descriptors,
        })
    }
}

/// Built once per shader and never modified.
#[derive(Clone, Copy, Debug)]
pub struct ComputePipeline {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub set_layout: vk::DescriptorSetLayout,
    pub descriptors: Option<DescriptorAllocation>,
}

impl ComputePipeline {
    pub fn descriptor_set(&self) -> Option<vk::DescriptorSet> {
        self.descriptors.map(|d| d.set)
    }

    pub fn destroy(&self, context: &ComputeContext) {
        let device = context.device();
        if let Some(descriptors) = self.descriptors {
            context.pools().release(device, descriptors);
        }
        device.destroy_pipeline(self.pipeline);
        device.destroy_pipeline_layout(self.pipeline_layout);
        device.destroy_descriptor_set_layout(self.set_layout);
    }
}
