// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference matrix multiplication.

use crate::{Activation, Shape, TensorError};

/// Computes `activation(lhs @ rhs + bias)` into a fresh row-major buffer.
///
/// `lhs` is `[M, K]`, `rhs` is `[K, N]`, both dense row-major. `bias`, when
/// present, holds one value per output column and seeds each accumulator.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if the inner dimensions differ and
/// [`TensorError::BufferSizeMismatch`] if a slice does not match its shape.
pub fn matmul(
    lhs: &[f32],
    lhs_shape: &Shape,
    rhs: &[f32],
    rhs_shape: &Shape,
    bias: Option<&[f32]>,
    activation: Activation,
) -> Result<Vec<f32>, TensorError> {
    if !lhs_shape.is_matmul_compatible(rhs_shape) {
        return Err(TensorError::ShapeMismatch {
            op: "matmul",
            lhs: lhs_shape.clone(),
            rhs: rhs_shape.clone(),
        });
    }
    check_len(lhs, lhs_shape.num_elements())?;
    check_len(rhs, rhs_shape.num_elements())?;

    let (m, k) = (lhs_shape.dims()[0], lhs_shape.dims()[1]);
    let n = rhs_shape.dims()[1];
    if let Some(bias) = bias {
        check_len(bias, n)?;
    }

    let mut out = vec![0.0f32; m * n];
    for row in out.chunks_exact_mut(n.max(1)).take(m) {
        if let Some(bias) = bias {
            row.copy_from_slice(bias);
        }
    }

    // ikj order: the inner loop is a saxpy on one row of the output, and
    // every output lane still sees its contributions in ascending `p`.
    for i in 0..m {
        let c_row = &mut out[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = lhs[i * k + p];
            let b_row = &rhs[p * n..(p + 1) * n];
            for j in 0..n {
                c_row[j] += a_ip * b_row[j];
            }
        }
    }

    out.iter_mut().for_each(|v| *v = activation.apply(*v));
    Ok(out)
}

pub(super) fn check_len(data: &[f32], expected: usize) -> Result<(), TensorError> {
    if data.len() != expected {
        return Err(TensorError::BufferSizeMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_2x3_times_3x2() {
        // A = [[1, 2, 3], [4, 5, 6]]
        // B = [[7, 8], [9, 10], [11, 12]]
        // C = [[58, 64], [139, 154]]
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let c = matmul(
            &a,
            &Shape::matrix(2, 3),
            &b,
            &Shape::matrix(3, 2),
            None,
            Activation::Identity,
        )
        .unwrap();
        assert_eq!(c, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_bias_and_relu() {
        let a = [1.0, -1.0];
        let eye = [1.0, 0.0, 0.0, 1.0];
        let c = matmul(
            &a,
            &Shape::matrix(1, 2),
            &eye,
            &Shape::matrix(2, 2),
            Some(&[0.5, 0.5]),
            Activation::Relu,
        )
        .unwrap();
        assert_eq!(c, vec![1.5, 0.0]);
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let result = matmul(
            &[0.0; 6],
            &Shape::matrix(2, 3),
            &[0.0; 8],
            &Shape::matrix(4, 2),
            None,
            Activation::Identity,
        );
        assert!(matches!(result, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_matmul_bias_len_mismatch() {
        let result = matmul(
            &[1.0],
            &Shape::matrix(1, 1),
            &[1.0, 2.0],
            &Shape::matrix(1, 2),
            Some(&[0.0]),
            Activation::Identity,
        );
        assert!(matches!(
            result,
            Err(TensorError::BufferSizeMismatch { expected: 2, actual: 1 })
        ));
    }
}
