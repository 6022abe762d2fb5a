// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The kernel executor with a type-state pipeline.
//!
//! ```text
//! Executor<Idle>
//!     │  .plan(workload)
//!     ▼
//! Executor<Planned>
//!     │  .prepare()
//!     ▼
//! Executor<Ready>
//!     │  .run() / .run_split(k) / .run_staged(cuts) / .run_partitioned(n)
//!     ▼
//!   RunOutput
//! ```
//!
//! Each state transition consumes the old value and returns a new one,
//! and each state carries only the data it has produced so far.

use crate::variant::{KernelCatalog, KernelVariant};
use crate::{KernelMetrics, RuntimeConfig, RuntimeError, Workload};
use kernel_engine::kernels::depthwise::DepthwiseConv3x3;
use kernel_engine::kernels::gemm::Gemm;
use kernel_engine::{
    ActivationBounds, EngineConfig, KernelArguments, OutputView, TileEngine, TileKernel,
    TileRange, TileScheduler,
};
use memory_manager::{AllocationStats, MemoryGroup, TensorBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::time::Instant;
use tensor_core::{depthwise_conv2d, matmul, DType, Shape, TensorInfo};

// ── Type-state markers ─────────────────────────────────────────

/// No workload planned yet.
#[derive(Debug)]
pub struct Idle;

/// A variant is selected and tile geometry derived.
#[derive(Debug)]
pub struct Planned {
    plan: ExecutionPlan,
    engine: TileEngine,
}

/// Operand tensors are allocated and filled.
pub struct Ready {
    plan: ExecutionPlan,
    engine: TileEngine,
    group: MemoryGroup,
    operands: Operands,
}

/// Sealed trait for executor states.
pub trait ExecutorState: fmt::Debug {}
impl ExecutorState for Idle {}
impl ExecutorState for Planned {}
impl ExecutorState for Ready {}

impl fmt::Debug for Ready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ready")
            .field("plan", &self.plan)
            .field("group", &self.group.name())
            .field("reserved_bytes", &self.group.reserved_bytes())
            .finish_non_exhaustive()
    }
}

// ── Plan ───────────────────────────────────────────────────────

/// What a planned workload will do, derived before any memory is touched.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionPlan {
    pub workload: Workload,
    pub variant: KernelVariant,
    pub engine: EngineConfig,
    pub output_shape: Shape,
    /// Tile grid extents.
    pub tile_rows: usize,
    pub tile_cols: usize,
    pub tile_count: usize,
    pub ragged_tiles: usize,
    pub channel_blocks: usize,
    /// Lanes per tile pass, also the spill slot size.
    pub lanes_per_pass: usize,
}

impl ExecutionPlan {
    /// Number of spill slots a split run needs.
    pub fn spill_slots(&self) -> usize {
        self.tile_count * self.channel_blocks
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} with {}: output {}, {} tiles of {} ({}x{} grid, {} ragged), \
             {} channel block(s) of {}, blocking factor {}, {} lanes per pass",
            self.workload,
            self.variant.name,
            self.output_shape,
            self.tile_count,
            self.engine.tile,
            self.tile_rows,
            self.tile_cols,
            self.ragged_tiles,
            self.channel_blocks,
            self.engine.channel_block,
            self.engine.blocking_factor,
            self.lanes_per_pass,
        )
    }
}

// ── Run output ─────────────────────────────────────────────────

/// The result of one run.
#[derive(Debug)]
pub struct RunOutput {
    /// Logical output elements, dense row-major.
    pub output: Vec<f32>,
    pub metrics: KernelMetrics,
}

/// Bitwise comparison of a run against a reference result.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Verification {
    pub matches: bool,
    pub mismatches: usize,
    pub max_abs_diff: f32,
}

impl RunOutput {
    pub fn verify(&self, reference: &[f32]) -> Verification {
        let mut mismatches = reference.len().abs_diff(self.output.len());
        let mut max_abs_diff = 0.0f32;
        for (x, y) in self.output.iter().zip(reference) {
            if x.to_bits() != y.to_bits() {
                mismatches += 1;
                max_abs_diff = max_abs_diff.max((x - y).abs());
            }
        }
        Verification {
            matches: mismatches == 0,
            mismatches,
            max_abs_diff,
        }
    }
}

// ── Operands ───────────────────────────────────────────────────

struct Operands {
    input: TensorBuffer,
    weights: TensorBuffer,
    bias: Option<TensorBuffer>,
    output: TensorBuffer,
}

// ── Executor ───────────────────────────────────────────────────

/// Plans, prepares and runs one workload.
///
/// # Example
/// ```
/// use kernel_runtime::{Executor, RuntimeConfig, Workload};
///
/// let ready = Executor::new(RuntimeConfig::default())
///     .plan(Workload::conv(5, 5, 3))?
///     .prepare()?;
/// let out = ready.run()?;
/// assert!(out.verify(&ready.reference()?).matches);
/// # Ok::<(), kernel_runtime::RuntimeError>(())
/// ```
pub struct Executor<S: ExecutorState = Idle> {
    config: RuntimeConfig,
    catalog: KernelCatalog,
    state: S,
}

impl<S: ExecutorState> Executor<S> {
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &KernelCatalog {
        &self.catalog
    }
}

impl<S: ExecutorState> fmt::Debug for Executor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("variant", &self.config.variant)
            .field("state", &self.state)
            .finish()
    }
}

// ── Idle → Planned ─────────────────────────────────────────────

impl Executor<Idle> {
    /// Creates an executor with the built-in variant catalog.
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_catalog(config, KernelCatalog::builtin())
    }

    pub fn with_catalog(config: RuntimeConfig, catalog: KernelCatalog) -> Self {
        tracing::info!("executor created with variant '{}'", config.variant);
        Self {
            config,
            catalog,
            state: Idle,
        }
    }

    /// Selects a variant and derives the tile geometry.
    /// Transitions to the `Planned` state.
    pub fn plan(self, workload: Workload) -> Result<Executor<Planned>, RuntimeError> {
        workload.validate()?;
        let variant = self.config.resolve_variant(&self.catalog)?;
        tracing::info!("using variant: {}", variant.name);

        let engine = TileEngine::new(variant.engine_config(workload.channels(), self.config.prefetch)?)?;
        let output_shape = workload.output_shape()?;
        let scheduler = TileScheduler::new(output_shape.dims()[0], output_shape.dims()[1], engine.config().tile)?;

        let plan = ExecutionPlan {
            tile_rows: scheduler.tile_rows(),
            tile_cols: scheduler.tile_cols(),
            tile_count: scheduler.tile_count(),
            ragged_tiles: scheduler.tiles().filter(|t| t.is_ragged()).count(),
            channel_blocks: workload.channels().div_ceil(engine.config().channel_block),
            lanes_per_pass: engine.lanes_per_pass(),
            engine: *engine.config(),
            output_shape,
            variant,
            workload,
        };
        tracing::info!("{}", plan.summary());

        Ok(Executor {
            config: self.config,
            catalog: self.catalog,
            state: Planned { plan, engine },
        })
    }
}

// ── Planned → Ready ────────────────────────────────────────────

impl Executor<Planned> {
    pub fn plan(&self) -> &ExecutionPlan {
        &self.state.plan
    }

    /// Allocates the operand tensors from a budgeted memory group and
    /// fills the inputs from the configured seed.
    /// Transitions to the `Ready` state.
    pub fn prepare(self) -> Result<Executor<Ready>, RuntimeError> {
        let budget = self.config.parse_budget()?;
        tracing::info!("memory budget: {budget}");
        let group = MemoryGroup::new("operands", budget);

        let specs = self.state.plan.workload.operands()?;
        let alignment = self.config.alignment;
        let bind = |spec: &crate::workload::OperandSpec| -> Result<TensorBuffer, RuntimeError> {
            let info = TensorInfo::with_padding(spec.shape.clone(), DType::F32, spec.padding.clone())?;
            let mut tensor = TensorBuffer::with_alignment(info, alignment);
            tensor.set_memory_group(&group)?;
            tensor.allocate()?;
            Ok(tensor)
        };

        let mut operands = Operands {
            input: bind(&specs.input)?,
            weights: bind(&specs.weights)?,
            bias: specs.bias.as_ref().map(&bind).transpose()?,
            output: bind(&specs.output)?,
        };

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let inputs = [Some(&mut operands.input), Some(&mut operands.weights), operands.bias.as_mut()];
        for tensor in inputs.into_iter().flatten() {
            tensor.for_each_element_mut(|_, v| *v = rng.gen_range(-1.0f32..1.0))?;
        }
        tracing::info!("operands ready: {}", group.stats().summary());

        Ok(Executor {
            config: self.config,
            catalog: self.catalog,
            state: Ready {
                plan: self.state.plan,
                engine: self.state.engine,
                group,
                operands,
            },
        })
    }
}

// ── Ready: run ─────────────────────────────────────────────────

impl Executor<Ready> {
    pub fn plan(&self) -> &ExecutionPlan {
        &self.state.plan
    }

    pub fn memory_stats(&self) -> AllocationStats {
        self.state.group.stats()
    }

    /// The input tensor (A for GEMM).
    pub fn input(&self) -> &TensorBuffer {
        &self.state.operands.input
    }

    pub fn output(&self) -> &TensorBuffer {
        &self.state.operands.output
    }

    /// One self-contained pass over the whole reduction axis.
    pub fn run(&self) -> Result<RunOutput, RuntimeError> {
        let len = self.state.plan.workload.reduction_len();
        let bounds = self.bounds();
        self.execute(|engine, kernel, out, metrics| {
            metrics.record(&engine.invoke(kernel, KernelArguments::full(out.view(), len, bounds))?);
            Ok(())
        })
    }

    /// Two invocations through a spill buffer: reduce `0..at` and suspend,
    /// then resume and reduce `at..len`.
    pub fn run_split(&self, at: usize) -> Result<RunOutput, RuntimeError> {
        self.run_staged(&[at])
    }

    /// One invocation per reduction segment between ascending `cuts`. The
    /// first suspends, middle ones resume and suspend again, the last
    /// resumes and stores. No cuts is a plain [`Self::run`].
    pub fn run_staged(&self, cuts: &[usize]) -> Result<RunOutput, RuntimeError> {
        let len = self.state.plan.workload.reduction_len();
        if let Some(&at) = cuts.iter().find(|&&at| at > len) {
            return Err(RuntimeError::InvalidWorkload(format!(
                "split point {at} is past the reduction length {len}"
            )));
        }
        if cuts.windows(2).any(|w| w[0] > w[1]) {
            return Err(RuntimeError::InvalidWorkload(format!(
                "split points {cuts:?} are not ascending"
            )));
        }
        let (Some(&first), Some(&last)) = (cuts.first(), cuts.last()) else {
            return self.run();
        };

        let bounds = self.bounds();
        self.execute(|engine, kernel, out, metrics| {
            let mut buffer = engine.accumulator_buffer(kernel);
            metrics.record(&engine.invoke(kernel, KernelArguments::suspend(0..first, &mut buffer))?);
            for w in cuts.windows(2) {
                metrics.record(&engine.invoke(kernel, KernelArguments::carry(w[0]..w[1], &mut buffer))?);
            }
            tracing::debug!(slots = buffer.slot_count(), ?cuts, "accumulators suspended at {last}");
            metrics.record(&engine.invoke(
                kernel,
                KernelArguments::resume(out.view(), last..len, bounds, &mut buffer),
            )?);
            Ok(())
        })
    }

    /// `parts` invocations over disjoint tile ranges, run in order.
    pub fn run_partitioned(&self, parts: usize) -> Result<RunOutput, RuntimeError> {
        let len = self.state.plan.workload.reduction_len();
        let bounds = self.bounds();
        self.execute(|engine, kernel, out, metrics| {
            let ranges: Vec<TileRange> = engine.scheduler(kernel).partition(parts);
            for range in ranges.into_iter().filter(|r| !r.is_empty()) {
                let args = KernelArguments::full(out.view(), len, bounds).with_tiles(range);
                metrics.record(&engine.invoke(kernel, args)?);
            }
            Ok(())
        })
    }

    /// The naive operator's result for the same operands.
    pub fn reference(&self) -> Result<Vec<f32>, RuntimeError> {
        let ops = &self.state.operands;
        let workload = &self.state.plan.workload;
        let input = ops.input.to_dense_f32()?;
        let weights = ops.weights.to_dense_f32()?;
        let bias = ops.bias.as_ref().map(|b| b.to_dense_f32()).transpose()?;

        let out = match workload {
            Workload::DepthwiseConv { .. } => {
                let geometry = workload
                    .conv_geometry()
                    .ok_or_else(|| RuntimeError::InvalidWorkload(format!("{workload} has no geometry")))?;
                let (out, _) = depthwise_conv2d(
                    &input,
                    &workload.input_shape(),
                    &weights,
                    bias.as_deref(),
                    geometry,
                    workload.activation(),
                )?;
                out
            }
            Workload::Gemm { m, n, k, .. } => matmul(
                &input,
                &Shape::matrix(*m, *k),
                &weights,
                &Shape::matrix(*k, *n),
                bias.as_deref(),
                workload.activation(),
            )?,
        };
        Ok(out)
    }

    fn bounds(&self) -> ActivationBounds {
        self.state.plan.workload.activation().into()
    }

    /// Builds the kernel over the operand tensors, hands it to `body` with
    /// a fresh output tensor and collects the result.
    fn execute<F>(&self, body: F) -> Result<RunOutput, RuntimeError>
    where
        F: FnOnce(&TileEngine, &dyn TileKernel, &mut OutputTarget<'_>, &mut KernelMetrics) -> Result<(), RuntimeError>,
    {
        let Ready {
            plan,
            engine,
            operands,
            ..
        } = &self.state;
        let mut metrics = KernelMetrics::new(plan.workload.name(), &plan.variant.name);

        // Each run writes a private copy of the output tensor's storage so
        // the prepared operands stay untouched between runs.
        let out_strides = operands.output.element_strides();
        let mut out_data = operands.output.element_view()?.to_vec();
        let mut target = OutputTarget {
            data: &mut out_data,
            row_stride: out_strides[0],
            col_stride: out_strides[1],
        };

        let input = operands.input.element_view()?;
        let weights = operands.weights.element_view()?;
        let bias = match &operands.bias {
            Some(b) => Some(b.element_view()?),
            None => None,
        };
        let in_strides = operands.input.element_strides();
        let w_strides = operands.weights.element_strides();

        let start = Instant::now();
        match &plan.workload {
            Workload::DepthwiseConv { stride, .. } => {
                let mut conv = DepthwiseConv3x3::new(input, &plan.workload.input_shape(), weights)?
                    .with_stride(*stride)?
                    .with_input_strides(in_strides[0], in_strides[1])?;
                if let Some(bias) = bias {
                    conv = conv.with_bias(bias)?;
                }
                body(engine, &conv, &mut target, &mut metrics)?;
            }
            Workload::Gemm { m, n, k, .. } => {
                let mut gemm = Gemm::new(input, &Shape::matrix(*m, *k), weights, &Shape::matrix(*k, *n))?
                    .with_leading_dims(in_strides[0], w_strides[0])?;
                if let Some(bias) = bias {
                    gemm = gemm.with_bias(bias)?;
                }
                body(engine, &gemm, &mut target, &mut metrics)?;
            }
        }
        metrics.finalise(start.elapsed());
        if self.config.enable_profiling {
            tracing::info!("{}", metrics.summary());
        }

        let output = gather(&out_data, plan.output_shape.dims(), &out_strides);
        Ok(RunOutput { output, metrics })
    }
}

/// Output storage plus strides; hands out one view per invocation.
struct OutputTarget<'a> {
    data: &'a mut [f32],
    row_stride: usize,
    col_stride: usize,
}

impl OutputTarget<'_> {
    fn view(&mut self) -> OutputView<'_> {
        OutputView::new(self.data, self.row_stride, self.col_stride)
    }
}

/// Copies the logical window of a strided buffer into a dense vector.
fn gather(data: &[f32], dims: &[usize], strides: &[usize]) -> Vec<f32> {
    let total: usize = dims.iter().product();
    let mut out = Vec::with_capacity(total);
    let mut coords = vec![0usize; dims.len()];
    for _ in 0..total {
        let offset: usize = coords.iter().zip(strides).map(|(c, s)| c * s).sum();
        out.push(data[offset]);
        for dim in (0..dims.len()).rev() {
            coords[dim] += 1;
            if coords[dim] < dims[dim] {
                break;
            }
            coords[dim] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::Activation;

    fn config(variant: &str) -> RuntimeConfig {
        RuntimeConfig {
            variant: variant.into(),
            memory_budget: "4M".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_derives_geometry() {
        let planned = Executor::new(config("vec128")).plan(Workload::conv(7, 7, 6)).unwrap();
        let plan = planned.plan();
        assert_eq!(plan.variant.name, "vec128");
        assert_eq!(plan.output_shape, Shape::hwc(5, 5, 6));
        assert_eq!(plan.engine.channel_block, 4);
        assert_eq!(plan.channel_blocks, 2);
        assert_eq!(plan.tile_count, plan.tile_rows * plan.tile_cols);
        assert_eq!(plan.lanes_per_pass, plan.engine.tile.positions() * 4);
        assert!(plan.summary().contains("vec128"));
    }

    #[test]
    fn test_plan_rejects_bad_workload() {
        let err = Executor::new(config("auto")).plan(Workload::conv(2, 2, 1)).unwrap_err();
        assert!(matches!(err, RuntimeError::TensorError(_)));
        let err = Executor::new(config("avx9")).plan(Workload::conv(5, 5, 1)).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownVariant { .. }));
    }

    #[test]
    fn test_prepare_charges_group() {
        let ready = Executor::new(config("scalar"))
            .plan(Workload::gemm(4, 3, 5).with_bias(true))
            .unwrap()
            .prepare()
            .unwrap();
        let stats = ready.memory_stats();
        assert_eq!(stats.reservations, 4);
        assert_eq!(stats.live_reservations(), 4);
        assert!(!ready.input().is_resizable());
        assert_eq!(ready.input().alignment(), Some(64));
    }

    #[test]
    fn test_run_gemm_matches_reference() {
        let ready = Executor::new(config("vec256"))
            .plan(
                Workload::gemm(9, 7, 11)
                    .with_bias(true)
                    .with_activation(Activation::LuBoundedRelu { lower: -0.5, upper: 0.5 }),
            )
            .unwrap()
            .prepare()
            .unwrap();
        let out = ready.run().unwrap();
        let check = out.verify(&ready.reference().unwrap());
        assert!(check.matches, "{check:?}");
        assert_eq!(out.metrics.invocations, 1);
        assert_eq!(out.metrics.macs, 9 * 7 * 11);
    }

    #[test]
    fn test_run_leaves_prepared_output_untouched() {
        let ready = Executor::new(config("scalar"))
            .plan(Workload::conv(5, 5, 2))
            .unwrap()
            .prepare()
            .unwrap();
        let out = ready.run().unwrap();
        assert!(out.output.iter().any(|&v| v != 0.0));
        assert!(ready.output().to_dense_f32().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_run_split_rejects_past_end() {
        let ready = Executor::new(config("scalar"))
            .plan(Workload::conv(5, 5, 1))
            .unwrap()
            .prepare()
            .unwrap();
        assert!(matches!(ready.run_split(10), Err(RuntimeError::InvalidWorkload(_))));
    }

    #[test]
    fn test_run_staged_rejects_bad_cuts() {
        let ready = Executor::new(config("scalar"))
            .plan(Workload::gemm(3, 3, 6))
            .unwrap()
            .prepare()
            .unwrap();
        assert!(matches!(ready.run_staged(&[2, 7]), Err(RuntimeError::InvalidWorkload(_))));
        assert!(matches!(ready.run_staged(&[4, 2]), Err(RuntimeError::InvalidWorkload(_))));
        assert_eq!(ready.run_staged(&[]).unwrap().metrics.invocations, 1);
    }

    #[test]
    fn test_verify_counts_mismatches() {
        let out = RunOutput {
            output: vec![1.0, 2.0, 3.0],
            metrics: KernelMetrics::new("gemm", "scalar"),
        };
        let check = out.verify(&[1.0, 2.5, 3.0]);
        assert!(!check.matches);
        assert_eq!(check.mismatches, 1);
        assert_eq!(check.max_abs_diff, 0.5);
        assert!(out.verify(&[1.0, 2.0]).mismatches == 1);
    }

    #[test]
    fn test_gather_skips_margins() {
        // 2x2 logical window inside a 4-wide row.
        let data = [1.0, 2.0, -1.0, -1.0, 3.0, 4.0, -1.0, -1.0];
        assert_eq!(gather(&data, &[2, 2], &[4, 1]), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
