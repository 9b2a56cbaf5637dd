use proptest::prelude::*;

use lib_seawatch::core::styles::{scale_styler, StyleParams, DEFAULT_MAX_RESOLUTION};

fn scaled(base: f64, zoom: f64) -> f64 {
    let mut params = StyleParams::icon("icons/ais/cargo.svg", None).with_base_scale(base);
    scale_styler(&mut params, DEFAULT_MAX_RESOLUTION / 2f64.powf(zoom), DEFAULT_MAX_RESOLUTION);
    params.scale
}

proptest! {
    #[test]
    fn icons_never_shrink_when_zooming_in(
        zoom in 3.0f64..24.0,
        step in 0.0f64..6.0,
        base in 0.1f64..3.0,
    ) {
        prop_assert!(scaled(base, zoom + step) >= scaled(base, zoom) - 1e-12);
    }

    #[test]
    fn invalid_resolution_keeps_the_previous_scale(
        bad in prop_oneof![Just(0.0), Just(-1.0), Just(f64::NAN), Just(f64::INFINITY)],
        scale in 0.1f64..3.0,
    ) {
        let mut params = StyleParams::icon("icons/ais/cargo.svg", None);
        params.scale = scale;
        scale_styler(&mut params, bad, DEFAULT_MAX_RESOLUTION);
        prop_assert_eq!(params.scale, scale);
    }
}

#[test]
fn zoom_twenty_yields_the_base_scale() {
    assert!((scaled(0.8, 20.0) - 0.8).abs() < 1e-9);
}
