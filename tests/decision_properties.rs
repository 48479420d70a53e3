// Property-Based Testing for the decision layer
// Debounce and fail-closed invariants over arbitrary observation streams

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::time::{Duration, Instant};
use tutor_guard::config::SecurityConfig;
use tutor_guard::gestures::GestureEdgeDetector;
use tutor_guard::observation::{FrameObservation, GestureClass, IdentityMatch};
use tutor_guard::security::{MismatchPolicy, SecurityAutomaton, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
enum RawGesture {
    None,
    OpenPalm,
    Fist,
    Point,
    Pinch,
}

impl From<RawGesture> for GestureClass {
    fn from(raw: RawGesture) -> Self {
        match raw {
            RawGesture::None => GestureClass::None,
            RawGesture::OpenPalm => GestureClass::OpenPalm,
            RawGesture::Fist => GestureClass::Fist,
            RawGesture::Point => GestureClass::Point,
            RawGesture::Pinch => GestureClass::Pinch,
        }
    }
}

fn identity_strategy() -> impl Strategy<Value = IdentityMatch> {
    prop_oneof![
        Just(IdentityMatch::Match),
        Just(IdentityMatch::NoMatch),
        Just(IdentityMatch::UnknownNoFace),
    ]
}

#[derive(Debug, Clone, Arbitrary)]
enum Step {
    #[proptest(weight = 20)]
    Frame {
        face_present: bool,
        #[proptest(strategy = "identity_strategy()")]
        identity: IdentityMatch,
        #[proptest(strategy = "0u64..800")]
        dt_ms: u64,
    },
    #[proptest(weight = 1)]
    Unlock,
}

/// Expected trigger count for one class: split the stream wherever the class
/// is absent for at least `release` ticks, then count the pieces holding at
/// least `activation` active ticks.
fn expected_triggers(frames: &[RawGesture], class: RawGesture, activation: u32, release: u32) -> usize {
    let mut triggers = 0;
    let mut active = 0u32;
    let mut gap = 0u32;
    let mut fired = false;

    for frame in frames {
        if *frame == class {
            gap = 0;
            active += 1;
            if active >= activation && !fired {
                fired = true;
                triggers += 1;
            }
        } else {
            gap += 1;
            if gap >= release {
                active = 0;
                fired = false;
            }
        }
    }
    triggers
}

fn allowed_on_tick(from: Stage, to: Stage) -> bool {
    matches!(
        (from, to),
        (Stage::Monitoring, Stage::Monitoring)
            | (Stage::Monitoring, Stage::Warning)
            | (Stage::Monitoring, Stage::Locked)
            | (Stage::Warning, Stage::Warning)
            | (Stage::Warning, Stage::Locked)
            | (Stage::Warning, Stage::Monitoring)
            | (Stage::Locked, Stage::Locked)
    )
}

proptest! {
    #[test]
    fn prop_one_trigger_per_activation_span(
        frames in prop::collection::vec(any::<RawGesture>(), 0..300),
        activation in 1u32..10,
        release in 1u32..6,
    ) {
        let mut detector = GestureEdgeDetector::with_thresholds(activation, release);
        let start = Instant::now();
        let mut counts = [0usize; 5];

        for (i, frame) in frames.iter().enumerate() {
            let at = start + Duration::from_millis(100 * i as u64);
            if let Some(trigger) = detector.observe((*frame).into(), at) {
                prop_assert_eq!(trigger.class, GestureClass::from(*frame));
                prop_assert_eq!(trigger.timestamp, at);
                counts[*frame as usize] += 1;
            }
        }

        prop_assert_eq!(counts[RawGesture::None as usize], 0);
        for class in [RawGesture::OpenPalm, RawGesture::Fist, RawGesture::Point, RawGesture::Pinch] {
            prop_assert_eq!(
                counts[class as usize],
                expected_triggers(&frames, class, activation, release),
                "class {:?}", class
            );
        }
    }

    #[test]
    fn prop_held_gesture_fires_once(len in 1usize..500, activation in 1u32..20) {
        let mut detector = GestureEdgeDetector::with_thresholds(activation, 3);
        let start = Instant::now();
        let fired = (0..len)
            .filter_map(|i| detector.observe(GestureClass::Fist, start + Duration::from_millis(i as u64)))
            .count();
        prop_assert_eq!(fired, usize::from(len as u32 >= activation));
    }
}

#[test]
fn prop_stage_moves_fail_closed() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::vec(any::<Step>(), 0..200),
                any::<bool>(),
                any::<bool>(),
                2u32..12,
            ),
            |(steps, enrolled, lock_on_mismatch, absence_grace_ticks)| {
                let config = SecurityConfig {
                    absence_grace_ticks,
                    warning_grace_seconds: 1.0,
                    identity_enrolled: enrolled,
                    mismatch_policy: if lock_on_mismatch {
                        MismatchPolicy::Lock
                    } else {
                        MismatchPolicy::Warning
                    },
                    ..SecurityConfig::default()
                };
                let mut automaton = SecurityAutomaton::new(&config);
                let mut now = Instant::now();

                for step in steps {
                    let before = automaton.stage();
                    match step {
                        Step::Unlock => {
                            let previous = automaton.force_unlock();
                            prop_assert_eq!(previous, before);
                            prop_assert_eq!(automaton.stage(), Stage::Monitoring);
                        }
                        Step::Frame {
                            face_present,
                            identity,
                            dt_ms,
                        } => {
                            now += Duration::from_millis(dt_ms);
                            let frame =
                                FrameObservation::new(now, GestureClass::None, face_present, identity);
                            let command = automaton.observe(&frame);
                            let after = automaton.stage();

                            prop_assert!(
                                allowed_on_tick(before, after),
                                "illegal move {:?} -> {:?}",
                                before,
                                after
                            );
                            match command {
                                Some(command) => prop_assert_eq!(command.target_stage(), after),
                                None => prop_assert_eq!(before, after),
                            }
                            if before == Stage::Warning && after == Stage::Monitoring {
                                prop_assert!(face_present);
                                prop_assert!(!enrolled || identity == IdentityMatch::Match);
                            }
                        }
                    }
                }
                Ok(())
            },
        )
        .unwrap();
}
