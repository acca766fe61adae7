// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Image
//!
//! Compute shaders bind images they do not own.  `Texture` is what a binding needs to know about
//! such an image: handle, format, sampler, mip and face counts, and its kind.  `ExternalTexture`
//! wraps an image owned by a host engine.  `Image` is an owned, device local image for hosts
//! without one.
//!
//! This treatment does not use any kind of RAII.  You have validation layers and other Vulkan
//! debugging tools to spot lifecycle issues.

use ash::vk;

use crate::prelude::*;
use crate::util;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureKind {
    #[default]
    Texture2D,
    Texture3D,
    Cube,
}

impl TextureKind {
    pub fn view_type(&self) -> vk::ImageViewType {
        match self {
            TextureKind::Texture2D => vk::ImageViewType::TYPE_2D,
            TextureKind::Texture3D => vk::ImageViewType::TYPE_3D,
            TextureKind::Cube => vk::ImageViewType::CUBE,
        }
    }
}

pub trait Texture: Send + Sync {
    fn image(&self) -> vk::Image;
    fn format(&self) -> vk::Format;
    /// Null for storage-only images.
    fn sampler(&self) -> vk::Sampler;
    fn mip_levels(&self) -> u32;
    /// Six for cube maps, one otherwise.
    fn faces(&self) -> u32;
    fn kind(&self) -> TextureKind;

    /// The layout the image is in when a shader samples it.
    fn sampled_layout(&self) -> vk::ImageLayout {
        vk::ImageLayout::GENERAL
    }
}

/// Plain description of an image owned by someone else.
#[derive(Clone, Copy, Debug)]
pub struct ExternalTexture {
    pub image: vk::Image,
    pub format: vk::Format,
    pub sampler: vk::Sampler,
    pub mip_levels: u32,
    pub kind: TextureKind,
    pub sampled_layout: vk::ImageLayout,
}

impl ExternalTexture {
    pub fn new(image: vk::Image, format: vk::Format, kind: TextureKind) -> Self {
        Self {
            image,
            format,
            sampler: vk::Sampler::null(),
            mip_levels: 1,
            kind,
            sampled_layout: vk::ImageLayout::GENERAL,
        }
    }

    pub fn with_sampler(mut self, sampler: vk::Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    pub fn with_sampled_layout(mut self, layout: vk::ImageLayout) -> Self {
        self.sampled_layout = layout;
        self
    }
}

impl Texture for ExternalTexture {
    fn image(&self) -> vk::Image {
        self.image
    }

    fn format(&self) -> vk::Format {
        self.format
    }

    fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    fn faces(&self) -> u32 {
        faces(self.kind)
    }

    fn kind(&self) -> TextureKind {
        self.kind
    }

    fn sampled_layout(&self) -> vk::ImageLayout {
        self.sampled_layout
    }
}

/// The memory and dimensions for an allocated Vulkan Image.
pub struct Image {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub kind: TextureKind,
    pub mip_levels: u32,
    pub sampler: vk::Sampler,
}

impl Image {
    pub fn new(
        context: &VkContext,
        kind: TextureKind,
        extent: vk::Extent3D,
        format: vk::Format,
        mip_levels: u32,
        usage: vk::ImageUsageFlags,
    ) -> Result<Self, VulkanError> {
        let device = context.device();

        let (image_type, flags) = match kind {
            TextureKind::Texture2D => (vk::ImageType::TYPE_2D, vk::ImageCreateFlags::empty()),
            TextureKind::Texture3D => (vk::ImageType::TYPE_3D, vk::ImageCreateFlags::empty()),
            TextureKind::Cube => (vk::ImageType::TYPE_2D, vk::ImageCreateFlags::CUBE_COMPATIBLE),
        };

        let image_ci = vk::ImageCreateInfo {
            flags,
            image_type,
            format,
            extent,
            mip_levels: mip_levels.max(1),
            array_layers: faces(kind),
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };

        let image = unsafe { device.create_image(&image_ci, None)? };
        let mem_req = unsafe { device.get_image_memory_requirements(image) };

        let mem_props = unsafe {
            context
                .instance
                .get_physical_device_memory_properties(context.physical_device)
        };

        let Some(memory_type_index) = util::find_memory_type_index(
            &mem_req,
            &mem_props,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) else {
            unsafe { device.destroy_image(image, None) };
            return Err(VulkanError::NoMemoryType(vk::MemoryPropertyFlags::DEVICE_LOCAL));
        };

        let alloc_info = vk::MemoryAllocateInfo {
            allocation_size: mem_req.size,
            memory_type_index,
            ..Default::default()
        };

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e.into());
            }
        };
        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        Ok(Self {
            image,
            memory,
            format,
            extent,
            kind,
            mip_levels: mip_levels.max(1),
            sampler: vk::Sampler::null(),
        })
    }

    pub fn destroy(self, context: &VkContext) {
        let device = context.device();
        unsafe {
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

impl Texture for Image {
    fn image(&self) -> vk::Image {
        self.image
    }

    fn format(&self) -> vk::Format {
        self.format
    }

    fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    fn faces(&self) -> u32 {
        faces(self.kind)
    }

    fn kind(&self) -> TextureKind {
        self.kind
    }
}

fn faces(kind: TextureKind) -> u32 {
    match kind {
        TextureKind::Cube => 6,
        _ => 1,
    }
}

pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// Depth formats are viewed through their depth aspect, everything else through color.
pub fn aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    if is_depth_format(format) {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// From `base_mip_level` through the remaining levels, across every face.
pub fn range_from_mip(texture: &dyn Texture, base_mip_level: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_mask(texture.format()),
        base_mip_level,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: texture.faces(),
    }
}

/// A view of `texture` starting at `base_mip_level`.
pub fn view_info(texture: &dyn Texture, base_mip_level: u32) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo::default()
        .image(texture.image())
        .view_type(texture.kind().view_type())
        .format(texture.format())
        .components(vk::ComponentMapping::default())
        .subresource_range(range_from_mip(texture, base_mip_level))
}

/// Infer barrier stages and access masks for the transitions compute dispatch performs.  Stages
/// are chosen to be valid on compute-only queues.
pub fn layout_barrier(
    image: vk::Image,
    subresource_range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Result<
    (
        vk::PipelineStageFlags,
        vk::PipelineStageFlags,
        vk::ImageMemoryBarrier<'static>,
    ),
    VulkanError,
> {
    let (src_stage, dst_stage, src_access, dst_access) = match (old_layout, new_layout) {
        // First use as a storage image.  Contents are discarded.
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL) => (
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::empty(),
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        ),
        // Compute writes made visible to whatever reads or writes next, including the next
        // dispatch of the same shader.
        (vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL) => (
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::SHADER_WRITE,
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
        ),
        // Handing compute output to samplers.
        (vk::ImageLayout::GENERAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::SHADER_WRITE,
            vk::AccessFlags::SHADER_READ,
        ),
        (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::GENERAL) => (
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        ),
        _ => return Err(VulkanError::Unsupported("image layout transition")),
    };

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(subresource_range)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    Ok((src_stage, dst_stage, barrier))
}
