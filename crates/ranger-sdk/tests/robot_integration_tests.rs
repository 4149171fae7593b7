//! RangerRobot 端到端测试
//!
//! 使用 `MockCanAdapter` 内存总线代替真实 CAN 接口：测试线程扮演底盘，
//! 通过 handle 注入反馈帧并观察 SDK 发出的控制帧。

use ranger_can::{MockCanAdapter, MockCanHandle, RangerFrame};
use ranger_protocol::{
    ID_LIGHT_COMMAND, ID_MOTION_COMMAND, ID_MOTION_MODE_COMMAND, ID_VERSION_REQUEST,
    ID_VERSION_RESPONSE,
};
use ranger_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_millis(500);

fn connected(is_mini_v1: bool) -> (RangerRobot, MockCanHandle) {
    let (adapter, handle) = MockCanAdapter::new();
    let mut robot = RangerRobot::new(is_mini_v1);
    robot.connect_with("mock0", adapter).unwrap();
    (robot, handle)
}

fn frame(id: u32, data: &[u8]) -> RangerFrame {
    RangerFrame::new_standard(id as u16, data)
}

fn quad_i16(id: u32, values: [i16; 4]) -> RangerFrame {
    let mut data = [0u8; 8];
    for (i, v) in values.iter().enumerate() {
        data[i * 2..i * 2 + 2].copy_from_slice(&v.to_be_bytes());
    }
    frame(id, &data)
}

/// 轮询直到条件成立
fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn test_state_is_default_right_after_connect() {
    let (robot, _handle) = connected(false);

    assert_eq!(robot.get_robot_state(), CoreState::default());
    assert_eq!(robot.get_actuator_state(), ActuatorState::default());
    assert_eq!(robot.get_common_sensor_state(), CommonSensorState::default());
    assert_eq!(robot.get_parser_protocol_version(), ProtocolVersion::Unknown);
    assert!(!robot.get_robot_state().timestamp.is_set());
}

#[test]
fn test_connect_to_missing_interface_fails() {
    let mut robot = RangerRobot::default();
    match robot.connect("can999") {
        Err(RangerError::Connection { interface, .. }) => assert_eq!(interface, "can999"),
        other => panic!("expected Connection error, got {:?}", other),
    }
    assert!(!robot.has_channel());
}

#[test]
fn test_request_version_without_responder_times_out() {
    let (robot, _handle) = connected(false);

    let start = Instant::now();
    let received = robot.request_version(Duration::from_secs(1)).unwrap();
    let elapsed = start.elapsed();

    assert!(!received);
    assert!(elapsed >= Duration::from_secs(1), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1200), "returned late: {:?}", elapsed);
    assert_eq!(robot.version_phase(), ResolvePhase::TimedOut);
    assert_eq!(robot.get_parser_protocol_version(), ProtocolVersion::Unknown);

    // 超时后通道仍然可用
    robot.set_motion_command(0.1, 0.0, 0.0).unwrap();
}

#[test]
fn test_request_version_with_responder() {
    let (robot, handle) = connected(false);

    let responder = thread::spawn(move || {
        let request = handle.wait_for_sent(ID_VERSION_REQUEST, Duration::from_secs(2));
        assert!(request.is_some(), "version request was not sent");
        handle.inject(frame(
            ID_VERSION_RESPONSE,
            &[0x01, 0x02, 0x01, 0x00, 0x02, 0x0A, 0x03, 0x01],
        ));
        handle
    });

    assert!(robot.request_version(Duration::from_secs(2)).unwrap());
    assert_eq!(robot.get_parser_protocol_version(), ProtocolVersion::AgxV2);
    assert_eq!(
        robot.version_phase(),
        ResolvePhase::Resolved(ProtocolVersion::AgxV2)
    );

    let firmware = robot.get_firmware_versions().unwrap();
    assert_eq!(firmware.controller_hw.to_string(), "1.2.0");
    assert_eq!(firmware.controller_sw.to_string(), "2.10.0");

    let _handle = responder.join().unwrap();
}

#[test]
fn test_default_angular_velocity_encodes_identically() {
    let (robot, handle) = connected(false);

    robot.set_motion_command_default_angular(0.5, 0.1).unwrap();
    robot.set_motion_command(0.5, 0.1, 0.0).unwrap();

    let first = handle.wait_for_sent(ID_MOTION_COMMAND, WAIT).unwrap();
    let second = handle.wait_for_sent(ID_MOTION_COMMAND, WAIT).unwrap();
    assert_eq!(first.data, second.data);
    assert_eq!(first.len, second.len);
}

#[test]
fn test_light_frames_carry_rolling_counter() {
    let (robot, handle) = connected(false);

    robot
        .set_light_command(LightOperation::On, LightOperation::Custom { brightness: 40 })
        .unwrap();
    robot.set_light_command_raw(1, 0, 1, 0).unwrap();

    let first = handle.wait_for_sent(ID_LIGHT_COMMAND, WAIT).unwrap();
    let second = handle.wait_for_sent(ID_LIGHT_COMMAND, WAIT).unwrap();
    assert_eq!(second.data[7], first.data[7].wrapping_add(1));
}

#[test]
fn test_rejected_commands_are_not_sent() {
    let (robot, handle) = connected(true);

    assert!(matches!(
        robot.set_motion_mode(MotionMode::SideSlip),
        Err(RangerError::Validation(ValidationError::Unsupported(_)))
    ));
    assert!(matches!(
        robot.set_light_command_raw(3, 150, 0, 0),
        Err(RangerError::Validation(_))
    ));
    assert!(matches!(
        robot.set_motion_command(f64::INFINITY, 0.0, 0.0),
        Err(RangerError::Validation(ValidationError::NotFinite { .. }))
    ));

    robot.set_motion_mode(MotionMode::Spinning).unwrap();
    let sent = handle.wait_for_sent(ID_MOTION_MODE_COMMAND, WAIT).unwrap();
    assert_eq!(sent.data[0], MotionMode::Spinning as u8);
    assert!(handle.recv_sent(Duration::from_millis(50)).is_none());
}

#[test]
fn test_reject_policy_from_config() {
    let config = RangerConfig::from_toml_str(
        r#"
        [limits]
        max_linear_vel = 1.0
        policy = "reject"
        "#,
    )
    .unwrap();
    let (adapter, _handle) = MockCanAdapter::new();
    let mut robot = RangerRobot::with_config(false, config);
    robot.connect_with("mock0", adapter).unwrap();

    assert!(matches!(
        robot.set_motion_command(1.2, 0.0, 0.0),
        Err(RangerError::Validation(ValidationError::OutOfRange { field: "linear_vel", .. }))
    ));
    robot.set_motion_command(0.9, 0.0, 0.0).unwrap();
}

#[test]
fn test_feedback_updates_snapshots() {
    let (robot, handle) = connected(false);

    handle.inject(frame(0x211, &[0x00, 0x01, 0x01, 0x0E, 0x00, 0x00]));
    handle.inject(quad_i16(0x221, [500, -300, 0, 200]));
    handle.inject(frame(0x361, &[80, 95, 0x0A, 0x28, 0x00, 0x0F, 0x00, 0xFA]));

    assert!(wait_until(WAIT, || robot.get_common_sensor_state().timestamp.is_set()));
    assert!(wait_until(WAIT, || robot.get_robot_state().motion_state.linear_velocity != 0.0));

    let core = robot.get_robot_state();
    assert_eq!(core.system_state.control_mode, ControlMode::Can);
    assert!((core.system_state.battery_voltage - 27.0).abs() < 1e-9);
    assert!((core.motion_state.linear_velocity - 0.5).abs() < 1e-9);
    assert!((core.motion_state.angular_velocity + 0.3).abs() < 1e-9);
    assert!((core.motion_state.steering_angle - 0.2).abs() < 1e-9);

    let bms = robot.get_common_sensor_state().bms_basic_state;
    assert_eq!(bms.battery_soc, 80);

    assert_eq!(robot.get_parser_protocol_version(), ProtocolVersion::AgxV2);
    assert!(robot.is_connected());
    assert!(wait_until(WAIT, || robot.get_metrics().rx_frames_valid >= 3));
}

#[test]
fn test_passive_v1_detection() {
    let (robot, handle) = connected(false);

    handle.inject(frame(0x151, &[0x01, 0x00, 0x00, 0xF0, 0x00, 0x00]));
    handle.inject(frame(0x131, &[0x01, 0xF4, 0x00, 0x00, 0x03, 0xE8]));

    assert!(wait_until(WAIT, || {
        robot.get_robot_state().motion_state.linear_velocity != 0.0
    }));
    assert_eq!(robot.get_parser_protocol_version(), ProtocolVersion::AgxV1);

    let motion = robot.get_robot_state().motion_state;
    assert!((motion.linear_velocity - 0.5).abs() < 1e-9);
    // 10.00° -> rad
    assert!((motion.steering_angle - 10f64.to_radians()).abs() < 1e-6);
    assert_eq!(motion.lateral_velocity, 0.0);
}

#[test]
fn test_mini_v1_steering_sign() {
    let (robot, handle) = connected(true);

    robot.set_motion_command(0.0, 0.2, 0.0).unwrap();
    let sent = handle.wait_for_sent(ID_MOTION_COMMAND, WAIT).unwrap();
    assert_eq!(i16::from_be_bytes([sent.data[6], sent.data[7]]), -200);

    handle.inject(quad_i16(0x221, [0, 0, 0, 200]));
    assert!(wait_until(WAIT, || robot.get_robot_state().timestamp.is_set()));
    assert!((robot.get_robot_state().motion_state.steering_angle + 0.2).abs() < 1e-9);
}

#[test]
fn test_wrong_size_actuator_assignment_keeps_prior_state() {
    let (robot, handle) = connected(false);

    handle.inject(quad_i16(0x281, [100, 200, 300, 400]));
    assert!(wait_until(WAIT, || robot.get_actuator_state().timestamp.is_set()));

    let mut state = robot.get_actuator_state();
    let before = state.clone();

    let err = state.set_motor_speeds(vec![1.0, 2.0, 3.0]).unwrap_err();
    assert_eq!(err, ValidationError::SizeMismatch { expected: 4, actual: 3 });
    assert_eq!(state, before);

    let err = state.set_motor_angles(vec![0.0; 5]).unwrap_err();
    assert_eq!(err, ValidationError::SizeMismatch { expected: 4, actual: 5 });
    assert_eq!(state, before);

    assert_eq!(*state.motor_speeds, [0.1, 0.2, 0.3, 0.4]);
}

#[test]
fn test_concurrent_reader_never_sees_torn_actuator_state() {
    let (robot, handle) = connected(false);
    let robot = Arc::new(robot);

    let reader = {
        let robot = robot.clone();
        thread::spawn(move || {
            let mut observed = 0usize;
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                let speeds = robot.get_actuator_state().motor_speeds;
                assert!(
                    speeds.iter().all(|s| *s == speeds[0]),
                    "torn snapshot: {:?}",
                    *speeds
                );
                observed += 1;
                if speeds[0] >= 1.0 || Instant::now() > deadline {
                    break;
                }
            }
            observed
        })
    };

    for k in 1..=1000i16 {
        handle.inject(quad_i16(0x281, [k; 4]));
    }

    let observed = reader.join().unwrap();
    assert!(observed > 0);
    assert!(wait_until(Duration::from_secs(2), || {
        robot.get_actuator_state().motor_speeds[0] >= 1.0
    }));
}

#[test]
fn test_wait_for_feedback() {
    let (robot, handle) = connected(false);

    let timeout = Duration::from_millis(50);
    assert!(matches!(
        robot.wait_for_feedback(timeout),
        Err(RangerError::Timeout(t)) if t == timeout
    ));

    handle.inject(frame(0x211, &[0x00, 0x01, 0x00, 0xF0, 0x00, 0x00]));
    robot.wait_for_feedback(WAIT).unwrap();
    assert!(wait_until(WAIT, || robot.connection_age().is_some()));
}

struct CountingCallback {
    received: AtomicUsize,
    sent: AtomicUsize,
}

impl FrameCallback for CountingCallback {
    fn on_frame_received(&self, _frame: &RangerFrame) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn on_frame_sent(&self, _frame: &RangerFrame) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_frame_callbacks() {
    let (robot, handle) = connected(false);
    let callback = Arc::new(CountingCallback {
        received: AtomicUsize::new(0),
        sent: AtomicUsize::new(0),
    });
    robot.add_frame_callback(callback.clone()).unwrap();

    handle.inject(frame(0x999, &[0x00]));
    handle.inject(frame(0x291, &[0x02, 0x00]));
    robot.reset_robot_state().unwrap();

    assert!(wait_until(WAIT, || callback.received.load(Ordering::Relaxed) == 2));
    assert!(wait_until(WAIT, || callback.sent.load(Ordering::Relaxed) == 1));
    assert!(wait_until(WAIT, || {
        robot.get_robot_state().motion_mode_state.motion_mode == MotionMode::Spinning
    }));
}

#[test]
fn test_commanded_mode_and_light_release_are_idempotent() {
    let (robot, handle) = connected(false);

    for _ in 0..3 {
        robot.enable_commanded_mode().unwrap();
        robot.disable_light_control().unwrap();
    }

    let mut control = Vec::new();
    let deadline = Instant::now() + WAIT;
    while control.len() < 6 && Instant::now() < deadline {
        if let Some(f) = handle.recv_sent(Duration::from_millis(20)) {
            control.push(f);
        }
    }
    assert_eq!(control.len(), 6);
    let enables: Vec<_> = control.iter().filter(|f| f.id == 0x421).collect();
    assert_eq!(enables.len(), 3);
    assert!(enables.windows(2).all(|w| w[0].data == w[1].data));
    assert!(
        control
            .iter()
            .filter(|f| f.id == ID_LIGHT_COMMAND)
            .all(|f| f.data[0] == 0)
    );
}
