// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Binding
//!
//! One entry of a compute shader's descriptor set.  The binding number is the entry's position in
//! the shader's list plus the shader's binding offset.
//!
//! Until the pipeline is built a binding is only a description.  Building realizes it: image
//! bindings get a view, uniform bindings get a host visible buffer filled with the current data.
//! Realized resources belong to the binding and are released with the shader.

use std::sync::Arc;

use ash::vk;
use dispatch_vulkan::buffer::BufferAllocation;
use dispatch_vulkan::descriptors::{DescriptorWrite, WriteResource};
use dispatch_vulkan::image;

use crate::prelude::*;

/// Binding number as seen by the shader, offset included.
pub type BindingIndex = u32;

#[derive(Clone)]
pub enum BindingKind {
    /// Written by the shader.  Kept in `GENERAL` layout.
    StorageImage {
        texture: Arc<dyn Texture>,
        mip_level: u32,
    },
    /// Read through the texture's sampler.
    SampledImage { texture: Arc<dyn Texture> },
    Uniform { data: HostData, dynamic: bool },
}

impl BindingKind {
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            BindingKind::StorageImage { .. } => vk::DescriptorType::STORAGE_IMAGE,
            BindingKind::SampledImage { .. } => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            BindingKind::Uniform { dynamic: false, .. } => vk::DescriptorType::UNIFORM_BUFFER,
            BindingKind::Uniform { dynamic: true, .. } => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        }
    }

    pub fn texture(&self) -> Option<&Arc<dyn Texture>> {
        match self {
            BindingKind::StorageImage { texture, .. } | BindingKind::SampledImage { texture } => {
                Some(texture)
            }
            BindingKind::Uniform { .. } => None,
        }
    }

    pub fn is_storage_image(&self) -> bool {
        matches!(self, BindingKind::StorageImage { .. })
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, BindingKind::Uniform { dynamic: true, .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            BindingKind::StorageImage { .. } => "storage image",
            BindingKind::SampledImage { .. } => "sampled image",
            BindingKind::Uniform { .. } => "uniform buffer",
        }
    }

    fn mip_level(&self) -> u32 {
        match self {
            BindingKind::StorageImage { mip_level, .. } => *mip_level,
            _ => 0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Realized {
    Nothing,
    View(vk::ImageView),
    Buffer(BufferAllocation),
}

pub struct Binding {
    kind: BindingKind,
    realized: Realized,
    /// Data or texture changed since the descriptor was last written.
    pending: bool,
    /// Storage image whose current texture has not been moved out of `UNDEFINED`.
    needs_transition: bool,
}

impl Binding {
    pub fn new(kind: BindingKind) -> Self {
        let needs_transition = kind.is_storage_image();
        Self {
            kind,
            realized: Realized::Nothing,
            pending: false,
            needs_transition,
        }
    }

    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }

    pub fn descriptor_type(&self) -> vk::DescriptorType {
        self.kind.descriptor_type()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn needs_transition(&self) -> bool {
        self.needs_transition
    }

    pub fn is_realized(&self) -> bool {
        !matches!(self.realized, Realized::Nothing)
    }

    pub fn image_view(&self) -> Option<vk::ImageView> {
        match self.realized {
            Realized::View(view) => Some(view),
            _ => None,
        }
    }

    pub fn buffer(&self) -> Option<&BufferAllocation> {
        match &self.realized {
            Realized::Buffer(allocation) => Some(allocation),
            _ => None,
        }
    }

    pub(crate) fn mark_pending(&mut self) {
        self.pending = true;
    }

    /// Swap the texture of an image binding.  Returns the view that was realized for the old
    /// texture, which the caller must keep alive until command buffers using it have completed.
    pub(crate) fn replace_texture(&mut self, new: Arc<dyn Texture>) -> Option<vk::ImageView> {
        match &mut self.kind {
            BindingKind::StorageImage { texture, .. } => {
                *texture = new;
                self.needs_transition = true;
            }
            BindingKind::SampledImage { texture } => *texture = new,
            BindingKind::Uniform { .. } => return None,
        }
        self.pending = true;
        let retired = self.image_view();
        if retired.is_some() {
            self.realized = Realized::Nothing;
        }
        retired
    }

    /// Barrier moving the current storage texture out of `UNDEFINED`, if it still needs one.
    pub(crate) fn take_transition(
        &mut self,
    ) -> Result<Option<vk::ImageMemoryBarrier<'static>>, ComputeError> {
        if !self.needs_transition {
            return Ok(None);
        }
        let BindingKind::StorageImage { texture, mip_level } = &self.kind else {
            self.needs_transition = false;
            return Ok(None);
        };
        let (_, _, barrier) = image::layout_barrier(
            texture.image(),
            image::range_from_mip(texture.as_ref(), *mip_level),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::GENERAL,
        )?;
        self.needs_transition = false;
        Ok(Some(barrier))
    }

    /// Barrier making this dispatch's writes visible to later reads.  Storage images only.
    pub(crate) fn release_barrier(
        &self,
    ) -> Result<Option<vk::ImageMemoryBarrier<'static>>, ComputeError> {
        let BindingKind::StorageImage { texture, mip_level } = &self.kind else {
            return Ok(None);
        };
        let (_, _, barrier) = image::layout_barrier(
            texture.image(),
            image::range_from_mip(texture.as_ref(), *mip_level),
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::GENERAL,
        )?;
        Ok(Some(barrier))
    }

    /// Create the view or buffer backing this binding, if it has none yet.
    pub(crate) fn realize(&mut self, device: &dyn ComputeDevice) -> Result<(), ComputeError> {
        if self.is_realized() {
            return Ok(());
        }
        self.realized = match &self.kind {
            BindingKind::StorageImage { .. } | BindingKind::SampledImage { .. } => {
                let Some(texture) = self.kind.texture() else {
                    return Ok(());
                };
                let info = image::view_info(texture.as_ref(), self.kind.mip_level());
                Realized::View(device.create_image_view(&info)?)
            }
            BindingKind::Uniform { data, .. } => {
                let bytes = data.snapshot()?;
                let allocation = device.create_uniform_buffer(bytes.len() as vk::DeviceSize)?;
                if let Err(e) = device.write_buffer(&allocation, &bytes) {
                    device.destroy_buffer(&allocation);
                    return Err(e.into());
                }
                Realized::Buffer(allocation)
            }
        };
        Ok(())
    }

    /// Copy the caller's current bytes into the uniform buffer.  No-op for images.
    pub(crate) fn upload(&self, device: &dyn ComputeDevice) -> Result<(), ComputeError> {
        if let (BindingKind::Uniform { data, .. }, Realized::Buffer(allocation)) =
            (&self.kind, &self.realized)
        {
            data.with_bytes(|bytes| device.write_buffer(allocation, bytes))??;
        }
        Ok(())
    }

    /// The write for this binding's realized resource.  Clears the pending flag.
    pub(crate) fn take_write(
        &mut self,
        set: vk::DescriptorSet,
        binding: BindingIndex,
    ) -> Option<DescriptorWrite> {
        let resource = match (&self.kind, &self.realized) {
            (BindingKind::StorageImage { .. }, Realized::View(view)) => {
                WriteResource::Image(vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: *view,
                    image_layout: vk::ImageLayout::GENERAL,
                })
            }
            (BindingKind::SampledImage { texture }, Realized::View(view)) => {
                WriteResource::Image(vk::DescriptorImageInfo {
                    sampler: texture.sampler(),
                    image_view: *view,
                    image_layout: texture.sampled_layout(),
                })
            }
            (BindingKind::Uniform { .. }, Realized::Buffer(allocation)) => {
                WriteResource::Buffer(allocation.descriptor_info())
            }
            _ => return None,
        };
        self.pending = false;
        Some(DescriptorWrite {
            set,
            binding,
            ty: self.descriptor_type(),
            resource,
        })
    }

    /// Destroy the realized resource, if any.
    pub(crate) fn release(&mut self, device: &dyn ComputeDevice) {
        match self.realized {
            Realized::Nothing => {}
            Realized::View(view) => device.destroy_image_view(view),
            Realized::Buffer(allocation) => device.destroy_buffer(&allocation),
        }
        self.realized = Realized::Nothing;
    }
}
