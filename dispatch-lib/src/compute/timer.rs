// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Timer
//!
//! Two timestamps per dispatch: one at the top of the pipe before the dispatch and one at the
//! bottom after it.  Results are read back on a later frame without waiting.  Until the GPU has
//! written both, there is no timing.

use std::time::Duration;

use ash::vk;

use crate::prelude::*;

const START: u32 = 0;
const END: u32 = 1;
const QUERY_COUNT: u32 = 2;

pub struct TimestampQuery {
    pool: vk::QueryPool,
    period_ns: f32,
    written: bool,
}

impl TimestampQuery {
    pub fn new(device: &dyn ComputeDevice) -> Result<Self, ComputeError> {
        Ok(Self {
            pool: device.create_timestamp_pool(QUERY_COUNT)?,
            period_ns: device.timestamp_period(),
            written: false,
        })
    }

    pub fn pool(&self) -> vk::QueryPool {
        self.pool
    }

    /// Must be recorded before `write_start` in the same command buffer.
    pub fn reset(&self, device: &dyn ComputeDevice, cb: vk::CommandBuffer) {
        device.cmd_reset_query_pool(cb, self.pool, 0, QUERY_COUNT);
    }

    pub fn write_start(&self, device: &dyn ComputeDevice, cb: vk::CommandBuffer) {
        device.cmd_write_timestamp(cb, vk::PipelineStageFlags::TOP_OF_PIPE, self.pool, START);
    }

    pub fn write_end(&mut self, device: &dyn ComputeDevice, cb: vk::CommandBuffer) {
        device.cmd_write_timestamp(cb, vk::PipelineStageFlags::BOTTOM_OF_PIPE, self.pool, END);
        self.written = true;
    }

    /// The most recent dispatch's timing, or `None` if nothing was recorded yet or the GPU has not
    /// finished.
    pub fn results(&self, device: &dyn ComputeDevice) -> Result<Option<DispatchTiming>, ComputeError> {
        if !self.written {
            return Ok(None);
        }
        let Some(ticks) = device.timestamp_results(self.pool, QUERY_COUNT)? else {
            return Ok(None);
        };
        let (Some(&start_ticks), Some(&end_ticks)) =
            (ticks.get(START as usize), ticks.get(END as usize))
        else {
            log::warn!("expected {QUERY_COUNT} timestamps, got {}", ticks.len());
            return Ok(None);
        };
        Ok(Some(DispatchTiming {
            start_ticks,
            end_ticks,
            period_ns: self.period_ns,
        }))
    }

    pub fn destroy(&self, device: &dyn ComputeDevice) {
        device.destroy_query_pool(self.pool);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DispatchTiming {
    pub start_ticks: u64,
    pub end_ticks: u64,
    /// Nanoseconds per tick.
    pub period_ns: f32,
}

impl DispatchTiming {
    pub fn elapsed_ns(&self) -> f64 {
        self.end_ticks.saturating_sub(self.start_ticks) as f64 * self.period_ns as f64
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ns() / 1_000_000.0
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns() as u64)
    }
}
