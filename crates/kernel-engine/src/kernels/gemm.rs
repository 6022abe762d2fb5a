// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Blocked single-precision GEMM: `C[M×N] = A[M×K] · B[K×N] (+ bias[N])`.
//!
//! Output rows and columns are tiled; the reduction axis is `K` and there
//! is a single channel per output position.

use super::{check_operand, strided_extent};
use crate::{ChannelBlock, InputGeometry, KernelError, LaneLayout, PrefetchHint, Tile, TileKernel};
use std::ops::Range;
use tensor_core::{Shape, TensorError};

/// Row-major GEMM operands with optional leading dimensions.
#[derive(Debug, Clone)]
pub struct Gemm<'a> {
    a: &'a [f32],
    b: &'a [f32],
    bias: Option<&'a [f32]>,
    m: usize,
    n: usize,
    k: usize,
    lda: usize,
    ldb: usize,
}

impl<'a> Gemm<'a> {
    /// Dense operands, `a` is `[M, K]` and `b` is `[K, N]`.
    pub fn new(a: &'a [f32], a_shape: &Shape, b: &'a [f32], b_shape: &Shape) -> Result<Self, KernelError> {
        if !a_shape.is_matmul_compatible(b_shape) {
            return Err(TensorError::ShapeMismatch {
                op: "gemm",
                lhs: a_shape.clone(),
                rhs: b_shape.clone(),
            }
            .into());
        }
        let (m, k, n) = (a_shape.dims()[0], a_shape.dims()[1], b_shape.dims()[1]);
        let gemm = Self {
            a,
            b,
            bias: None,
            m,
            n,
            k,
            lda: k,
            ldb: n,
        };
        gemm.check_operands()?;
        Ok(gemm)
    }

    pub fn with_bias(mut self, bias: &'a [f32]) -> Result<Self, KernelError> {
        check_operand("bias", bias, self.n)?;
        self.bias = Some(bias);
        Ok(self)
    }

    /// Strided operands: row `i` of A starts at `i · lda`, row `p` of B at
    /// `p · ldb`.
    pub fn with_leading_dims(mut self, lda: usize, ldb: usize) -> Result<Self, KernelError> {
        if lda < self.k || ldb < self.n {
            return Err(KernelError::InvalidConfig {
                detail: format!(
                    "leading dimensions lda={lda}, ldb={ldb} are smaller than K={}, N={}",
                    self.k, self.n
                ),
            });
        }
        self.lda = lda;
        self.ldb = ldb;
        self.check_operands()?;
        Ok(self)
    }

    /// `(M, N, K)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.m, self.n, self.k)
    }

    pub fn output_shape(&self) -> Shape {
        Shape::matrix(self.m, self.n)
    }

    fn check_operands(&self) -> Result<(), KernelError> {
        check_operand("a", self.a, strided_extent(self.m, self.lda, self.k))?;
        check_operand("b", self.b, strided_extent(self.k, self.ldb, self.n))
    }
}

impl TileKernel for Gemm<'_> {
    fn name(&self) -> &str {
        "gemm"
    }

    fn output_rows(&self) -> usize {
        self.m
    }

    fn output_cols(&self) -> usize {
        self.n
    }

    fn channels(&self) -> usize {
        1
    }

    fn reduction_len(&self) -> usize {
        self.k
    }

    fn has_bias(&self) -> bool {
        self.bias.is_some()
    }

    fn bias_at(&self, _row: usize, col: usize, _channel: usize) -> f32 {
        self.bias.map_or(0.0, |b| b[col])
    }

    /// Rows of A: a tile's base is the first A row it reads.
    fn input_geometry(&self) -> Option<InputGeometry> {
        Some(InputGeometry {
            ld_row: self.lda,
            ld_col: 0,
            kernel_stride: 1,
        })
    }

    fn reduce_step(
        &self,
        tile: &Tile,
        input_base: usize,
        _block: ChannelBlock,
        layout: LaneLayout,
        k: Range<usize>,
        lanes: &mut [f32],
    ) {
        // p outermost: one B row segment is reused across the tile's rows.
        for p in k {
            let b_row = &self.b[p * self.ldb + tile.col_start..][..tile.valid_cols];
            for r in 0..tile.valid_rows {
                let a_ip = self.a[input_base + r * self.lda + p];
                for (c, &b_pj) in b_row.iter().enumerate() {
                    lanes[layout.index(r, c, 0)] += a_ip * b_pj;
                }
            }
        }
    }

    fn prefetch(&self, _tile: &Tile, input_base: usize, hint: &dyn PrefetchHint) {
        if let Some(data) = self.a.get(input_base..) {
            hint.prefetch(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AccumulatorPool, ActivationBounds, EngineConfig, KernelArguments, OutputView, TileEngine,
        TileShape,
    };
    use proptest::prelude::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tensor_core::{matmul, Activation};

    fn random(seed: u64, n: usize) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-2.0f32..2.0)).collect()
    }

    fn engine(tile: TileShape, blocking_factor: usize) -> TileEngine {
        TileEngine::new(EngineConfig {
            pool: AccumulatorPool::new(4, 16),
            tile,
            channel_block: 1,
            blocking_factor,
            prefetch: false,
        })
        .unwrap()
    }

    #[test]
    fn test_matches_reference_with_bias() {
        let (m, n, k) = (7, 5, 13);
        let a = random(1, m * k);
        let b = random(2, k * n);
        let bias = random(3, n);
        let gemm = Gemm::new(&a, &Shape::matrix(m, k), &b, &Shape::matrix(k, n))
            .unwrap()
            .with_bias(&bias)
            .unwrap();

        let act = Activation::BoundedRelu { max: 1.5 };
        let expected = matmul(&a, &Shape::matrix(m, k), &b, &Shape::matrix(k, n), Some(&bias), act).unwrap();

        let mut out = vec![0.0; m * n];
        engine(TileShape::new(3, 2), 4)
            .invoke(&gemm, KernelArguments::full(OutputView::dense(&mut out, n, 1), k, act.into()))
            .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_leading_dims_and_ldc() {
        let (m, n, k) = (3, 2, 4);
        let (lda, ldb, ldc) = (6, 3, 4);
        let a_dense = random(4, m * k);
        let b_dense = random(5, k * n);

        let mut a = vec![f32::NAN; m * lda];
        for i in 0..m {
            a[i * lda..i * lda + k].copy_from_slice(&a_dense[i * k..(i + 1) * k]);
        }
        let mut b = vec![f32::NAN; k * ldb];
        for p in 0..k {
            b[p * ldb..p * ldb + n].copy_from_slice(&b_dense[p * n..(p + 1) * n]);
        }

        let gemm = Gemm::new(&a, &Shape::matrix(m, k), &b, &Shape::matrix(k, n))
            .unwrap()
            .with_leading_dims(lda, ldb)
            .unwrap();
        let expected = matmul(
            &a_dense,
            &Shape::matrix(m, k),
            &b_dense,
            &Shape::matrix(k, n),
            None,
            Activation::Identity,
        )
        .unwrap();

        let mut c = vec![-7.0; m * ldc];
        engine(TileShape::new(2, 2), 3)
            .invoke(
                &gemm,
                KernelArguments::full(OutputView::new(&mut c, ldc, 1), k, ActivationBounds::identity()),
            )
            .unwrap();
        for i in 0..m {
            assert_eq!(&c[i * ldc..i * ldc + n], &expected[i * n..(i + 1) * n]);
            assert!(c[i * ldc + n..(i + 1) * ldc].iter().all(|&v| v == -7.0));
        }
    }

    #[test]
    fn test_rejects_bad_operands() {
        let a = vec![0.0; 6];
        let b = vec![0.0; 6];
        assert!(matches!(
            Gemm::new(&a, &Shape::matrix(2, 3), &b, &Shape::matrix(2, 3)),
            Err(KernelError::Tensor(TensorError::ShapeMismatch { .. }))
        ));
        let gemm = Gemm::new(&a, &Shape::matrix(2, 3), &b, &Shape::matrix(3, 2)).unwrap();
        assert!(gemm.clone().with_leading_dims(2, 2).is_err());
        assert!(matches!(
            gemm.with_leading_dims(4, 2),
            Err(KernelError::OperandTooShort { operand: "a", .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_tiling_and_blocking_never_change_bits(
            m in 1usize..12,
            n in 1usize..12,
            k in 1usize..20,
            tr in 1usize..5,
            tc in 1usize..5,
            bf in 1usize..8,
            seed in any::<u64>(),
        ) {
            let a = random(seed, m * k);
            let b = random(seed ^ 0x5eed, k * n);
            let gemm = Gemm::new(&a, &Shape::matrix(m, k), &b, &Shape::matrix(k, n)).unwrap();
            let expected = matmul(&a, &Shape::matrix(m, k), &b, &Shape::matrix(k, n), None, Activation::Identity).unwrap();

            let mut out = vec![0.0; m * n];
            engine(TileShape::new(tr, tc), bf)
                .invoke(&gemm, KernelArguments::full(OutputView::dense(&mut out, n, 1), k, ActivationBounds::identity()))
                .unwrap();
            let same = out.iter().zip(&expected).all(|(x, y)| x.to_bits() == y.to_bits());
            prop_assert!(same);
        }
    }
}
