// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kernel-engine
//!
//! The blocked compute-kernel execution model: output grids are cut into
//! tiles, each tile's accumulators are seeded, reduced over a range of the
//! reduction axis, then either clamped and stored or spilled for a later
//! invocation to resume.
//!
//! # Key Components
//!
//! - [`TileScheduler`]: row-major, restartable tiles with ragged edges.
//! - [`AccumulatorPool`], [`Accumulator`], [`AccumulatorBuffer`]: the
//!   bounded register pool, the per-tile lifecycle, and caller-owned spill
//!   storage.
//! - [`ActivationBounds`]: the min/max clamp fused into stores.
//! - [`OutputWriter`]: strided stores masked to each tile's valid region.
//! - [`TileEngine`] and [`TileKernel`]: the generic driver and the
//!   pluggable reduction step it calls.
//! - [`kernels`]: a 3×3 depthwise NHWC convolution and a blocked GEMM.
//!
//! # Example
//! ```
//! use kernel_engine::kernels::gemm::Gemm;
//! use kernel_engine::{
//!     AccumulatorPool, ActivationBounds, EngineConfig, KernelArguments, OutputView, TileEngine,
//! };
//! use tensor_core::Shape;
//!
//! let a = vec![1.0; 6 * 4];
//! let b = vec![0.5; 4 * 3];
//! let gemm = Gemm::new(&a, &Shape::matrix(6, 4), &b, &Shape::matrix(4, 3)).unwrap();
//!
//! let engine = TileEngine::new(EngineConfig::derived(AccumulatorPool::new(4, 4), 1, 2).unwrap()).unwrap();
//! let mut c = vec![0.0; 6 * 3];
//! engine
//!     .invoke(&gemm, KernelArguments::full(OutputView::dense(&mut c, 3, 1), 4, ActivationBounds::identity()))
//!     .unwrap();
//! assert!(c.iter().all(|&v| v == 2.0));
//! ```

mod accumulator;
mod activation;
mod args;
mod engine;
mod error;
pub mod kernels;
pub mod prefetch;
mod scheduler;
mod writer;

pub use accumulator::{
    Accumulating, Accumulator, AccumulatorBuffer, AccumulatorPool, ChannelBlock, Finalized, Fresh,
    LaneLayout,
};
pub use activation::ActivationBounds;
pub use args::{KernelArguments, KernelFlags, TileRange};
pub use engine::{EngineConfig, InvocationStats, TileEngine, TileKernel};
pub use error::KernelError;
pub use prefetch::{CachePrefetch, NoPrefetch, PrefetchHint};
pub use scheduler::{InputGeometry, Tile, TileCursor, TileIter, TileScheduler, TileShape};
pub use writer::{OutputView, OutputWriter};
