//! Interpolation kernels and the interpolator that applies them.
//!
//! Each method maps to a [`Kernel`] built through [`builtin_kernels`]; the
//! [`Interpolator`] adds Lsm restriction, missing-value handling and the
//! pole policy on top.

pub mod conservative;
pub mod cubic;
pub mod derivatives;
pub mod four_point;
pub mod interpolator;
pub mod kernel;
pub mod method;
pub mod nearest;
pub mod pole;

use std::collections::HashMap;

pub use conservative::Conservative;
pub use cubic::Cubic;
pub use derivatives::{partial_derivatives, DerivedParameter, Klm, PartialDerivatives};
pub use four_point::FourPoint;
pub use interpolator::{Interpolator, InterpolatorOptions};
pub use kernel::{Kernel, KernelContext, WeightedPoint};
pub use method::{InterpolationMethod, PolePolicy};
pub use nearest::{Average, NearestNeighbour};

/// Builds a kernel for a method and a requested number of points.
pub type KernelBuilder = fn(InterpolationMethod, usize) -> Box<dyn Kernel>;

fn four_point(method: InterpolationMethod, _points: usize) -> Box<dyn Kernel> {
    Box::new(FourPoint::new(method))
}

fn cubic(_method: InterpolationMethod, _points: usize) -> Box<dyn Kernel> {
    Box::new(Cubic)
}

fn nearest_neighbour(_method: InterpolationMethod, points: usize) -> Box<dyn Kernel> {
    Box::new(NearestNeighbour::new(points))
}

fn average(_method: InterpolationMethod, points: usize) -> Box<dyn Kernel> {
    Box::new(Average::new(points))
}

fn conservative(method: InterpolationMethod, _points: usize) -> Box<dyn Kernel> {
    Box::new(Conservative::new(method))
}

/// Every concrete method with its builder. `default` is absent: it is
/// resolved to one of these first.
pub fn builtin_kernels() -> HashMap<InterpolationMethod, KernelBuilder> {
    use InterpolationMethod as M;
    let table: [(InterpolationMethod, KernelBuilder); 12] = [
        (M::Bilinear, four_point),
        (M::BilinearInteger, four_point),
        (M::Linear, four_point),
        (M::LinearFit, four_point),
        (M::DoubleLinear, four_point),
        (M::DoubleLinearAdjusted, four_point),
        (M::Cubic, cubic),
        (M::NearestNeighbour, nearest_neighbour),
        (M::Average, average),
        (M::AverageWeighted, conservative),
        (M::FluxConserving, conservative),
        (M::Conserving, conservative),
    ];
    table.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kernels_cover_concrete_methods() {
        let kernels = builtin_kernels();
        for method in InterpolationMethod::ALL {
            assert_eq!(kernels.contains_key(&method), method != InterpolationMethod::Default);
        }
        let build = kernels[&InterpolationMethod::FluxConserving];
        assert_eq!(build(InterpolationMethod::FluxConserving, 4).method(), InterpolationMethod::FluxConserving);
    }
}
