// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stand-alone activation over a bound tensor.

use crate::RuntimeError;
use kernel_engine::ActivationBounds;
use memory_manager::TensorBuffer;
use tensor_core::Activation;

/// Clamps every logical element of `tensor` in place; padding margins are
/// left as they are.
///
/// Works on owned and imported memory alike. Returns the number of
/// elements visited.
pub fn activate_in_place(tensor: &mut TensorBuffer, activation: Activation) -> Result<usize, RuntimeError> {
    let bounds = ActivationBounds::from(activation);
    if bounds.is_identity() {
        // Nothing to write, but unbound or non-f32 tensors are still errors.
        tensor.element_view()?;
        return Ok(tensor.info().shape().num_elements());
    }
    let mut visited = 0usize;
    tensor.for_each_element_mut(|_, v| {
        *v = bounds.clamp(*v);
        visited += 1;
    })?;
    tracing::debug!(%activation, elements = visited, "activation applied");
    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_manager::MemoryError;
    use tensor_core::{DType, Padding, Shape, TensorInfo};

    #[test]
    fn test_relu_on_owned_tensor() {
        let mut t = TensorBuffer::new(TensorInfo::new(Shape::vector(6), DType::F32));
        t.allocate().unwrap();
        t.element_view_mut()
            .unwrap()
            .copy_from_slice(&[-2.0, -0.0, 0.5, 3.0, -1.0, 7.0]);
        assert_eq!(activate_in_place(&mut t, Activation::Relu).unwrap(), 6);
        assert_eq!(t.element_view().unwrap(), &[0.0, 0.0, 0.5, 3.0, 0.0, 7.0]);
    }

    #[test]
    fn test_bounded_relu_skips_padding() {
        let info = TensorInfo::with_padding(Shape::hwc(2, 2, 1), DType::F32, Padding::spatial(1, 1, 1, 1)).unwrap();
        let mut t = TensorBuffer::new(info);
        t.allocate().unwrap();
        t.as_bytes_mut()
            .unwrap()
            .chunks_exact_mut(4)
            .for_each(|c| c.copy_from_slice(&(-9.0f32).to_ne_bytes()));
        t.for_each_element_mut(|_, v| *v = 10.0).unwrap();

        activate_in_place(&mut t, Activation::BoundedRelu { max: 6.0 }).unwrap();

        let all: Vec<f32> = t
            .as_bytes()
            .unwrap()
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(all.iter().filter(|&&v| v == 6.0).count(), 4);
        assert_eq!(all.iter().filter(|&&v| v == -9.0).count(), all.len() - 4);
    }

    #[test]
    fn test_unbound_tensor_is_rejected() {
        let mut t = TensorBuffer::new(TensorInfo::new(Shape::vector(4), DType::F32));
        assert!(matches!(
            activate_in_place(&mut t, Activation::Relu),
            Err(RuntimeError::MemoryError(MemoryError::NotBound))
        ));
        assert!(activate_in_place(&mut t, Activation::Identity).is_err());
    }
}
