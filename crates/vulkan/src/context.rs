// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Context
//!
//! Fundamentally required resources, including the entry, instance, and hardware devices are
//! encapsulated by `VkContext`.  It is headless.  Hosts that present to a window bring their own
//! surface and swapchain and only borrow the device and queues from here.
//!
//! `VkContext` is also the ash-backed `ComputeDevice`.

use std::ffi::CStr;

use ash::vk;

use crate::buffer::BufferAllocation;
use crate::descriptors::{DescriptorWrite, WriteResource};
use crate::prelude::*;
use crate::queue;

pub struct VkContext {
    pub entry: ash::Entry,
    pub instance: ash::Instance,

    pub physical_device: vk::PhysicalDevice,
    /// Vulkan logical device
    pub device: ash::Device,
    /// Queues and command pools for the device in use.
    pub queues: queue::Queues,

    timestamp_period: f32,
    timestamps_supported: bool,
}

static VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Any non-empty value enables validation layers when they are installed.
pub const VALIDATION_ENV: &str = "DISPATCH_VALIDATION";

impl VkContext {
    /// Obtain an entry, instance, and initialized device with a compute queue.
    pub fn new() -> Result<Self, VulkanError> {
        let entry = unsafe { ash::Entry::load()? };

        let wants_validation = std::env::var(VALIDATION_ENV)
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        let validation_layers = if wants_validation && has_validation_layer(&entry)? {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            if wants_validation {
                log::warn!("{VALIDATION_ENV} set but {VALIDATION_LAYER:?} is not installed");
            }
            Vec::new()
        };

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"dispatch")
            .api_version(vk::make_api_version(0, 1, 2, 0));

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&validation_layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        match Self::with_instance(entry, instance) {
            Ok(context) => Ok(context),
            Err((instance, e)) => {
                unsafe { instance.destroy_instance(None) };
                Err(e)
            }
        }
    }

    fn with_instance(
        entry: ash::Entry,
        instance: ash::Instance,
    ) -> Result<Self, (ash::Instance, VulkanError)> {
        let physical_devices = match unsafe { instance.enumerate_physical_devices() } {
            Ok(devices) => devices,
            Err(e) => return Err((instance, e.into())),
        };

        // NEXT support choices via config and heuristics (discrete vs on-CPU)
        let Some((physical_device, queue_families)) = physical_devices
            .iter()
            .find_map(|pd| queue::QueueFamilies::new(&instance, *pd).map(|qf| (*pd, qf)))
        else {
            return Err((instance, VulkanError::NoComputeQueue));
        };

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("compute device: {name} ({:?})", properties.device_type);
        let timestamps_supported =
            queue_families.supports_timestamps() && properties.limits.timestamp_period > 0.0;
        if !timestamps_supported {
            log::warn!("compute queue family cannot write timestamps");
        }

        let queue_priorities = [1.0];
        let queue_infos = queue_families.queue_cis(&queue_priorities);
        let device_info = vk::DeviceCreateInfo::default().queue_create_infos(&queue_infos);

        let device = match unsafe { instance.create_device(physical_device, &device_info, None) } {
            Ok(device) => device,
            Err(e) => return Err((instance, e.into())),
        };

        let queues = match queue::Queues::new(&device, &queue_families) {
            Ok(queues) => queues,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err((instance, e));
            }
        };

        Ok(Self {
            entry,
            instance,
            physical_device,
            device,
            queues,
            timestamp_period: properties.limits.timestamp_period,
            timestamps_supported,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    // XXX in reality, this consumes the context, but everything created from it must be destroyed
    // first and shared ownership makes that hard to express.
    pub fn destroy(&self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.queues.destroy(&self.device);
            self.device.destroy_device(None);
            self.instance.destroy_instance(None)
        };
    }
}

fn has_validation_layer(entry: &ash::Entry) -> Result<bool, VulkanError> {
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(layers
        .iter()
        .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER)))
}

impl ComputeDevice for VkContext {
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout, VulkanError> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        Ok(unsafe { self.device.create_descriptor_set_layout(&layout_info, None)? })
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> Result<vk::PipelineLayout, VulkanError> {
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        Ok(unsafe { self.device.create_pipeline_layout(&layout_info, None)? })
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_compute_pipeline(
        &self,
        module: vk::ShaderModule,
        entry_point: &CStr,
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline, VulkanError> {
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(entry_point);
        let pipeline_ci = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(layout);

        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_ci], None)
                .map_err(|(_, e)| e)?
        };
        Ok(pipelines[0])
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, VulkanError> {
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        Ok(unsafe { self.device.create_descriptor_pool(&pool_info, None)? })
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, VulkanError> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        Ok(unsafe { self.device.allocate_descriptor_sets(&alloc_info)?[0] })
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        let writes: Vec<vk::WriteDescriptorSet<'_>> = writes
            .iter()
            .map(|w| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(w.set)
                    .dst_binding(w.binding)
                    .descriptor_type(w.ty);
                match &w.resource {
                    WriteResource::Image(info) => write.image_info(std::slice::from_ref(info)),
                    WriteResource::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                }
            })
            .collect();
        unsafe { self.device.update_descriptor_sets(&writes, &[]) }
    }

    fn create_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> Result<vk::ImageView, VulkanError> {
        Ok(unsafe { self.device.create_image_view(info, None)? })
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule, VulkanError> {
        let module_ci = vk::ShaderModuleCreateInfo::default().code(code);
        Ok(unsafe { self.device.create_shader_module(&module_ci, None)? })
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) }
    }

    fn create_uniform_buffer(
        &self,
        size: vk::DeviceSize,
    ) -> Result<BufferAllocation, VulkanError> {
        BufferAllocation::new_uniform(self, size)
    }

    fn write_buffer(&self, allocation: &BufferAllocation, bytes: &[u8]) -> Result<(), VulkanError> {
        allocation.write(self, bytes)
    }

    fn destroy_buffer(&self, allocation: &BufferAllocation) {
        allocation.destroy(self)
    }

    fn create_timestamp_pool(&self, count: u32) -> Result<vk::QueryPool, VulkanError> {
        let pool_info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(count);
        Ok(unsafe { self.device.create_query_pool(&pool_info, None)? })
    }

    fn destroy_query_pool(&self, pool: vk::QueryPool) {
        unsafe { self.device.destroy_query_pool(pool, None) }
    }

    fn timestamp_results(
        &self,
        pool: vk::QueryPool,
        count: u32,
    ) -> Result<Option<Vec<u64>>, VulkanError> {
        let mut ticks = vec![0u64; count as usize];
        let result = unsafe {
            self.device
                .get_query_pool_results(pool, 0, &mut ticks, vk::QueryResultFlags::TYPE_64)
        };
        match result {
            Ok(()) => Ok(Some(ticks)),
            Err(vk::Result::NOT_READY) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn timestamp_period(&self) -> f32 {
        self.timestamp_period
    }

    fn supports_timestamps(&self) -> bool {
        self.timestamps_supported
    }

    fn cmd_pipeline_barrier(
        &self,
        cb: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                cb,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                image_barriers,
            );
        }
    }

    fn cmd_bind_compute_pipeline(&self, cb: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cb, vk::PipelineBindPoint::COMPUTE, pipeline)
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cb: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cb,
                vk::PipelineBindPoint::COMPUTE,
                layout,
                0,
                &[set],
                dynamic_offsets,
            );
        }
    }

    fn cmd_push_constants(
        &self,
        cb: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        offset: u32,
        bytes: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(
                cb,
                layout,
                vk::ShaderStageFlags::COMPUTE,
                offset,
                bytes,
            );
        }
    }

    fn cmd_dispatch(&self, cb: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(cb, x, y, z) }
    }

    fn cmd_reset_query_pool(&self, cb: vk::CommandBuffer, pool: vk::QueryPool, first: u32, count: u32) {
        unsafe { self.device.cmd_reset_query_pool(cb, pool, first, count) }
    }

    fn cmd_write_timestamp(
        &self,
        cb: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    ) {
        unsafe { self.device.cmd_write_timestamp(cb, stage, pool, query) }
    }
}
