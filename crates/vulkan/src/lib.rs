// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Vulkan
//!
//! The device layer underneath compute dispatch.  Everything that touches `ash` directly lives
//! here so that the compute crate can be written against one narrow seam.
//!
//! Core types:
//!
//! - `ComputeDevice`, the seam.  Every create, destroy, and command recording call the compute
//!   crate makes goes through it.
//!   * `VkContext`, a headless ash-backed implementation.
//!   * `RecordingDevice`, a headless implementation that only records calls.
//! - `DescriptorPoolManager`, shared descriptor pool bookkeeping.
//! - **Resources**
//!   * `BufferAllocation`
//!   * `Texture` / `Image` / `ExternalTexture`

pub mod buffer;
pub mod context;
pub mod descriptors;
pub mod device;
pub mod image;
pub mod queue;
pub mod recording;
pub mod util;

use ash::vk;

pub mod prelude {
    pub use super::VulkanError;
    pub use crate::context::VkContext;
    pub use crate::device::ComputeDevice;
    pub use crate::image::{Texture, TextureKind};
}

#[derive(thiserror::Error, Debug)]
pub enum VulkanError {
    #[error("Ash: {0}")]
    Ash(#[from] vk::Result),

    #[error("loading Vulkan failed: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("no memory type satisfies {0:?}")]
    NoMemoryType(vk::MemoryPropertyFlags),

    #[error("no physical device exposes a compute queue")]
    NoComputeQueue,

    /// More sets or descriptors were requested than a pool was sized for.  There is no recovery;
    /// pipeline counts per pool are expected to be known in advance.
    #[error("descriptor pool exhausted: {0}")]
    PoolExhausted(vk::Result),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}
