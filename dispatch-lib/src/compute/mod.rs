// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Compute
//!
//! The compute shader and the pieces it is built from.
//!
//! - `binding`: what a shader reads and writes, and the GPU resources realized for it.
//! - `layout`: turning the binding list into a descriptor set layout, pool sizes, and a pipeline.
//! - `data`: host bytes shared with the caller, for uniforms and push constants.
//! - `timer`: timestamps written around each dispatch.
//! - `shader`: `ComputeShader`, which ties these together.

pub mod binding;
pub mod data;
pub mod layout;
pub mod shader;
pub mod timer;

pub use binding::{Binding, BindingIndex, BindingKind};
pub use data::{HostData, PushConstants, PushSource};
pub use layout::{ComputePipeline, LayoutPlan};
pub use shader::{ComputeShader, ShaderModule, ShaderState, SharedComputeShader};
pub use timer::{DispatchTiming, TimestampQuery};
