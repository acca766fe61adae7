// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg(feature = "gpu-tests")]

use ash::vk;
use dispatch_vulkan::image::Image;
use dispatch_vulkan::prelude::*;

#[test]
fn context_creation_test() {
    let context = VkContext::new().unwrap();
    assert!(context.timestamp_period() > 0.0);
    context.destroy();
}

#[test]
fn uniform_buffer_test() {
    let context = VkContext::new().unwrap();
    let allocation = context.create_uniform_buffer(32).unwrap();
    assert_eq!(allocation.size, 32);
    context.write_buffer(&allocation, &[7u8; 32]).unwrap();
    context.destroy_buffer(&allocation);

    let pool = context.create_timestamp_pool(2).unwrap();
    assert_ne!(pool, vk::QueryPool::null());
    context.destroy_query_pool(pool);
    context.destroy();
}

#[test]
fn storage_image_test() {
    let context = VkContext::new().unwrap();
    let extent = vk::Extent3D {
        width: 64,
        height: 64,
        depth: 1,
    };
    let image = Image::new(
        &context,
        TextureKind::Texture2D,
        extent,
        vk::Format::R8G8B8A8_UNORM,
        1,
        vk::ImageUsageFlags::STORAGE,
    )
    .unwrap();
    assert_ne!(image.image, vk::Image::null());
    assert_ne!(image.memory, vk::DeviceMemory::null());
    image.destroy(&context);
    context.destroy();
}
