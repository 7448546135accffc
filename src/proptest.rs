//! Strategies for property-based testing of the time integration schemes.
use crate::config::{SdcConfig, SdcVariant};
use crate::quadrature::QuadratureKind;
use ::proptest::prelude::*;

pub fn quadrature_kind() -> impl Strategy<Value = QuadratureKind> {
    prop_oneof![
        Just(QuadratureKind::GaussLegendre),
        Just(QuadratureKind::GaussRadau),
        Just(QuadratureKind::GaussRadauRight),
        Just(QuadratureKind::GaussLobatto),
    ]
}

pub fn sdc_variant() -> impl Strategy<Value = SdcVariant> {
    prop_oneof![
        Just(SdcVariant::ForwardEuler),
        Just(SdcVariant::BackwardEuler),
        Just(SdcVariant::Imex),
    ]
}

/// A quadrature kind together with a valid number of nodes in `[min_nodes, max_nodes]`.
pub fn quadrature_kind_and_nodes(max_nodes: usize) -> impl Strategy<Value = (QuadratureKind, usize)> {
    quadrature_kind().prop_flat_map(move |kind| {
        let min_nodes = kind.min_nodes();
        (Just(kind), min_nodes..=max_nodes.max(min_nodes))
    })
}

/// SDC configurations with few nodes and sweeps, so that tests stay fast.
pub fn sdc_config() -> impl Strategy<Value = SdcConfig> {
    (quadrature_kind_and_nodes(5), 0..4usize, sdc_variant(), any::<bool>()).prop_map(
        |((quadrature, num_nodes), max_sweeps, variant, final_update)| SdcConfig {
            quadrature,
            num_nodes,
            max_sweeps,
            final_update,
            variant,
            ..SdcConfig::default()
        },
    )
}
