//! Transition automation tests through the public API

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use test_case::test_case;

use deckflow::dsp::CurveType;
use deckflow::engine::{Lane, MemorySource, MixEngine};
use deckflow::transition::{
    EqSwapConfig, TransitionAutomation, TransitionEngine, TransitionRegion, TransitionType,
};

fn region(kind: TransitionType, curve: CurveType) -> TransitionRegion {
    TransitionRegion::new("out", "in", 441_000, 529_200, kind, curve).unwrap()
}

#[test]
fn test_eq_swap_halfway_for_outgoing_track() {
    let engine = TransitionEngine::new();
    engine
        .add_transition(
            region(TransitionType::EqSwap, CurveType::Linear).with_eq(EqSwapConfig {
                swap_low: true,
                swap_mid: false,
                swap_high: false,
                ..EqSwapConfig::default()
            }),
        )
        .unwrap();

    let auto = engine.get_automation_for_track("out", 485_100);
    assert_abs_diff_eq!(auto.outgoing_low_gain, 0.5, epsilon = 1e-6);
    assert_eq!(auto.outgoing_mid_gain, 1.0);
    assert_eq!(auto.outgoing_high_gain, 1.0);
}

#[test_case(CurveType::Linear)]
#[test_case(CurveType::EaseIn)]
#[test_case(CurveType::EaseOut)]
#[test_case(CurveType::EaseInOut)]
#[test_case(CurveType::SCurve)]
#[test_case(CurveType::ExponentialIn)]
#[test_case(CurveType::ExponentialOut)]
fn test_eq_swap_never_touches_main_gains(curve: CurveType) {
    let engine = TransitionEngine::new();
    let r = region(TransitionType::EqSwap, curve).with_eq(EqSwapConfig {
        swap_low: true,
        swap_mid: true,
        swap_high: true,
        ..EqSwapConfig::default()
    });

    for step in 0..=20_u64 {
        let position = r.start_sample() + r.duration_samples() * step / 20;
        let auto = engine.calculate_automation(&r, position);
        assert_eq!(auto.outgoing_gain, 1.0);
        assert_eq!(auto.incoming_gain, 1.0);
    }
}

#[test_case(TransitionType::Crossfade, CurveType::EaseInOut)]
#[test_case(TransitionType::Crossfade, CurveType::ExponentialOut)]
#[test_case(TransitionType::EchoOut, CurveType::SCurve)]
#[test_case(TransitionType::Backspin, CurveType::EaseIn)]
fn test_crossfade_endpoint_law(kind: TransitionType, curve: CurveType) {
    let engine = TransitionEngine::new();
    let r = region(kind, curve);

    let start = engine.calculate_automation(&r, r.start_sample());
    assert_abs_diff_eq!(start.outgoing_gain, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(start.incoming_gain, 0.0, epsilon = 1e-6);

    let end = engine.calculate_automation(&r, r.end_sample());
    assert_abs_diff_eq!(end.outgoing_gain, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(end.incoming_gain, 1.0, epsilon = 1e-6);
}

#[test]
fn test_neutral_outside_any_region() {
    let engine = TransitionEngine::new();
    engine
        .add_transition(region(TransitionType::Crossfade, CurveType::Linear))
        .unwrap();

    assert_eq!(
        engine.get_automation_for_track("out", 100),
        TransitionAutomation::neutral()
    );
    assert_eq!(
        engine.get_automation_for_track("in", 529_200),
        TransitionAutomation::neutral()
    );
    assert!(engine.get_active_transition(529_199).is_some());
}

#[test]
fn test_crossfade_applied_in_mix() {
    let sample_rate = 44100;
    let engine = MixEngine::new(sample_rate, 1);
    engine
        .add_lane(Lane::new(
            "out",
            "Outgoing",
            Box::new(MemorySource::constant(1.0, 2000, 1, sample_rate)),
            0,
        ))
        .unwrap();
    engine
        .add_lane(Lane::new(
            "in",
            "Incoming",
            Box::new(MemorySource::constant(1.0, 2000, 1, sample_rate)),
            0,
        ))
        .unwrap();

    let transitions = Arc::new(TransitionEngine::new());
    transitions
        .add_transition(
            TransitionRegion::new(
                "out",
                "in",
                0,
                1000,
                TransitionType::Crossfade,
                CurveType::Linear,
            )
            .unwrap(),
        )
        .unwrap();
    engine.attach_transitions(Some(transitions));

    // Linear crossfade sums to unity at every block start
    let mut buffer = vec![0.0_f32; 100];
    for _ in 0..10 {
        engine.read(&mut buffer);
        assert_abs_diff_eq!(buffer[0], 1.0, epsilon = 1e-6);
    }
}
