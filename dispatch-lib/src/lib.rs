// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compute shader dispatch for hosts that already drive a Vulkan frame loop.
//!
//! A `ComputeShader` owns a shader module and an ordered list of bindings.  Storage images,
//! sampled images, and uniform buffers are declared up front.  The first dispatch freezes that list
//! and builds a pipeline, a layout, and a descriptor set sized exactly for it.  After that, each
//! dispatch only copies dirty data, rewrites dirty descriptors, and records commands.
//!
//! Dispatches are either recorded directly into a command buffer with `ComputeShader::dispatch`
//! or handed to `scheduler::begin_dispatch`, which registers them as one-shot or repeating
//! callbacks on the host's `FrameHooks`.
//!
//! Everything that touches Vulkan goes through `ComputeDevice`, so the whole crate can be driven
//! by `RecordingDevice` on machines without a GPU.

pub mod compute;
pub mod context;
pub mod hooks;
pub mod scheduler;

pub use dispatch_assets as assets;
pub use dispatch_vulkan as vulkan;

pub mod prelude {
    pub use super::ComputeError;
    pub use crate::compute::{
        BindingIndex, BindingKind, ComputeShader, DispatchTiming, HostData, PushConstants,
        PushSource, ShaderModule, ShaderState, SharedComputeShader,
    };
    pub use crate::context::{ComputeConfig, ComputeContext};
    pub use crate::hooks::{FrameHooks, HookHandle, HookPoint};
    pub use crate::scheduler::{DispatchInvocation, begin_dispatch};
    pub use dispatch_vulkan::prelude::*;
}

#[derive(thiserror::Error, Debug)]
pub enum ComputeError {
    #[error("Vulkan: {0}")]
    Vulkan(#[from] dispatch_vulkan::VulkanError),

    #[error("asset: {0}")]
    Asset(#[from] dispatch_assets::AssetError),

    /// Structural misuse, such as declaring bindings after the pipeline was built.
    #[error("invalid resource: {0}")]
    InvalidResource(&'static str),

    #[error("binding {index} out of range, bindings are {first}..{end}")]
    BindingOutOfRange { index: u32, first: u32, end: u32 },

    #[error("binding {index} is {actual}, not {expected}")]
    BindingKindMismatch {
        index: u32,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("push constant data supplied but no push constant range was declared")]
    PushConstantsUndeclared,

    #[error("push constant write {offset}+{len} does not fit declared range of {declared} bytes")]
    PushConstantRange { offset: u32, len: u32, declared: u32 },

    #[error("host data is {expected} bytes, got {actual}")]
    HostDataSize { expected: usize, actual: usize },

    /// Pipeline creation failed earlier.  The shader will not retry.
    #[error("compute pipeline initialization failed previously")]
    InitializationFailed,

    #[error("lock poisoned")]
    Poison,
}

impl<T> From<std::sync::PoisonError<T>> for ComputeError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        ComputeError::Poison
    }
}
