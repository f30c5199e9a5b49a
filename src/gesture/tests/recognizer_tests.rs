use super::*;
use crate::protocol::FormFactor;

fn device(has_acceleration: bool, has_orientation: bool) -> DeviceInfo {
    DeviceInfo {
        form_factor: FormFactor::Phone,
        has_orientation,
        has_acceleration,
        has_vibration: true,
        screen_width: 390,
        screen_height: 844,
    }
}

#[test]
fn test_default_config_is_valid() {
    assert!(GestureConfig::default().validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_thresholds() {
    let config = GestureConfig {
        shake_threshold: 0.0,
        ..GestureConfig::default()
    };
    assert!(config.validate().is_err());

    let config = GestureConfig {
        shape_min_size: f64::NAN,
        ..GestureConfig::default()
    };
    assert!(config.validate().is_err());

    let config = GestureConfig {
        tap_max_duration_ms: 800,
        ..GestureConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("tap_max_duration_ms"));
}

#[test]
fn test_missing_sensors_disable_motion_gestures() {
    let mut recognizer = Recognizer::new(&GestureConfig::default(), &device(false, false));
    assert!(!recognizer.motion_enabled());
    assert!(!recognizer.tilt_enabled());

    let sample = |x, timestamp_ms| MotionSample {
        acceleration: Vec3::new(x, 0.0, 0.0),
        timestamp_ms,
    };
    assert_eq!(recognizer.on_motion(sample(0.0, 0)), None);
    assert_eq!(recognizer.on_motion(sample(50.0, 10)), None);
    assert_eq!(
        recognizer.on_orientation(OrientationSample {
            beta: 80.0,
            gamma: 80.0,
            timestamp_ms: 0
        }),
        None
    );

    // Touch still works
    recognizer.touch_start(TouchPoint::new(0.0, 0.0, 0));
    assert_eq!(
        recognizer.touch_end(TouchPoint::new(0.0, 0.0, 50)),
        Some(Gesture::Tap { count: 1 })
    );
}

#[test]
fn test_full_device_produces_all_streams() {
    let mut recognizer = Recognizer::new(&GestureConfig::default(), &device(true, true));
    assert!(recognizer.motion_enabled());
    assert!(recognizer.tilt_enabled());

    let still = MotionSample {
        acceleration: Vec3::new(0.0, 0.0, 9.8),
        timestamp_ms: 0,
    };
    let jolt = MotionSample {
        acceleration: Vec3::new(25.0, 0.0, 9.8),
        timestamp_ms: 20,
    };
    assert_eq!(recognizer.on_motion(still), None);
    assert!(matches!(recognizer.on_motion(jolt), Some(Gesture::Shake { .. })));

    let level = OrientationSample {
        beta: 0.0,
        gamma: 0.0,
        timestamp_ms: 0,
    };
    assert_eq!(recognizer.on_orientation(level), None);
    recognizer.calibrate_tilt();
    let tilted = OrientationSample {
        beta: 20.0,
        gamma: 0.0,
        timestamp_ms: 10,
    };
    // After calibration the tilted pose is the new centre
    assert_eq!(recognizer.on_orientation(tilted), None);
}

#[test]
fn test_drawing_mode_switches_touch_handling() {
    let mut recognizer = Recognizer::new(&GestureConfig::default(), &device(true, true));
    recognizer.set_drawing(true);
    recognizer.touch_start(TouchPoint::new(0.0, 0.0, 0));
    recognizer.touch_move(TouchPoint::new(1.0, 0.0, 10));
    assert_eq!(recognizer.touch_end(TouchPoint::new(1.0, 0.0, 20)), None);

    recognizer.set_drawing(false);
    recognizer.touch_start(TouchPoint::new(0.0, 0.0, 100));
    assert_eq!(
        recognizer.touch_end(TouchPoint::new(0.0, 0.0, 900)),
        Some(Gesture::Hold)
    );
}
