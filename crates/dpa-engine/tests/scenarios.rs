//! End-to-end exchanges between the request engine and a scripted device.
//!
//! The device side of an in-process channel runs on its own thread and plays
//! the coordinator and the nodes: it answers, confirms, delays or stays silent.
//!
//! ## Note on Serial Execution
//!
//! These tests measure wall-clock waits of up to a few seconds. They use
//! #[serial] so that concurrently running tests do not skew the timing.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dpa_engine::{
    channel_pair, DeviceEndpoint, EngineConfig, FailureKind, ProcessingOutcome, RequestEngine,
    TransportRegistry,
};
use dpa_protocol::*;
use dpa_timing::{HwRevision, RfMode, TimingModel};
use serial_test::serial;

// ============================================================================
// Helpers
// ============================================================================

fn engine_with_device(timing: TimingModel) -> (RequestEngine, DeviceEndpoint) {
    let (transport, device) = channel_pair();
    let mut engine = RequestEngine::new(Box::new(transport), timing);
    engine.start().expect("engine starts");
    (engine, device)
}

/// Run `script` on a device thread; it gets the endpoint back on join.
fn scripted<F>(device: DeviceEndpoint, script: F) -> JoinHandle<DeviceEndpoint>
where
    F: FnOnce(&DeviceEndpoint) + Send + 'static,
{
    thread::spawn(move || {
        script(&device);
        device
    })
}

fn next_request(device: &DeviceEndpoint) -> Request {
    let frame = device
        .recv_request_timeout(Duration::from_secs(5))
        .expect("request reaches the device");
    Request::decode(&frame).expect("request decodes")
}

fn confirm(device: &DeviceEndpoint, request: &Request, hops: u8, timeslot: u8, hops_response: u8) {
    let confirmation = Confirmation {
        address: request.address,
        peripheral: request.peripheral,
        command: request.command,
        hw_profile_id: request.hw_profile_id,
        dpa_value: 0x40,
        hops,
        timeslot_length: timeslot,
        hops_response,
    };
    assert!(device.send_frame(confirmation.encode()));
}

fn respond(device: &DeviceEndpoint, request: &Request, payload: Vec<u8>) {
    let response = Response::for_request(request, ResponseCode::NoError, 0x3A, payload);
    assert!(device.send_frame(response.encode()));
}

fn expect_failure(outcome: &ProcessingOutcome, kind: FailureKind) {
    match outcome {
        ProcessingOutcome::Failure(failure) => assert_eq!(failure.kind, kind, "{}", failure),
        ProcessingOutcome::Success(response) => panic!("unexpected success: {:?}", response),
    }
}

// ============================================================================
// Local Device
// ============================================================================

#[test]
#[serial]
fn test_local_request_needs_no_confirmation() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        let request = next_request(device);
        assert_eq!(request.address, COORDINATOR_ADDRESS);
        respond(device, &request, vec![]);
    });

    let started = Instant::now();
    let outcome = engine.send(&Request::new(COORDINATOR_ADDRESS, PNUM_LEDR, CMD_LED_PULSE));
    let response = outcome.response().expect("local request succeeds");

    assert_eq!(response.address, COORDINATOR_ADDRESS);
    assert_eq!(response.peripheral, PNUM_LEDR);
    assert_eq!(response.request_command(), CMD_LED_PULSE);
    assert_eq!(response.dpa_value, 0x3A);
    assert!(started.elapsed() < Duration::from_secs(1));
    device.join().unwrap();
}

#[test]
#[serial]
fn test_silent_local_device_times_out_after_library_delay() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        next_request(device);
    });

    let started = Instant::now();
    let outcome = engine.send(&Request::new(LOCAL_DEVICE_ADDRESS, PNUM_LEDR, CMD_LED_PULSE));

    expect_failure(&outcome, FailureKind::Receive);
    assert_eq!(outcome.failure().unwrap().description, "timed out");
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert!(started.elapsed() < Duration::from_millis(3000));
    device.join().unwrap();
}

#[test]
#[serial]
fn test_long_lasting_operation_waits_past_response_window() {
    let (mut engine, device) = engine_with_device(TimingModel::default());
    assert_eq!(engine.default_timeout(), None);

    let device = scripted(device, |device| {
        let request = next_request(device);
        assert!(request.is_long_lasting());
        thread::sleep(Duration::from_millis(2500));
        // Bonded address 0x05, three nodes bonded.
        respond(device, &request, vec![0x05, 0x03]);
    });

    let request = Request::new(COORDINATOR_ADDRESS, PNUM_COORDINATOR, CMD_COORDINATOR_BOND_NODE)
        .with_payload(vec![0x05, 0x00])
        .unwrap();
    let outcome = engine.send(&request);

    assert!(outcome.is_success());
    assert_eq!(engine.timing().bonded_nodes(), Some(3));
    device.join().unwrap();
}

#[test]
#[serial]
fn test_long_lasting_operation_honours_explicit_timeout() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        next_request(device);
    });

    let request = Request::new(COORDINATOR_ADDRESS, PNUM_COORDINATOR, CMD_COORDINATOR_DISCOVERY)
        .with_payload(vec![0x07, 0x00])
        .unwrap();

    let started = Instant::now();
    let outcome = engine.send_with_timeout(&request, Some(Duration::from_millis(300)));

    expect_failure(&outcome, FailureKind::Receive);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(started.elapsed() < Duration::from_millis(2000));
    device.join().unwrap();
}

#[test]
#[serial]
fn test_long_lasting_operation_with_unrepresentable_timeout_waits() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        let request = next_request(device);
        thread::sleep(Duration::from_millis(100));
        respond(device, &request, vec![0x02, 0x01]);
    });

    let request = Request::new(COORDINATOR_ADDRESS, PNUM_COORDINATOR, CMD_COORDINATOR_BOND_NODE)
        .with_payload(vec![0x02, 0x00])
        .unwrap();
    let outcome = engine.send_with_timeout(&request, Some(Duration::MAX));

    assert!(outcome.is_success());
    assert_eq!(engine.timing().bonded_nodes(), Some(1));
    device.join().unwrap();
}

// ============================================================================
// Remote Nodes
// ============================================================================

#[test]
#[serial]
fn test_remote_long_lasting_operation_waits_past_response_window() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        let request = next_request(device);
        assert!(request.is_long_lasting());
        confirm(device, &request, 1, 3, 1);
        // Well past 2000 + 2 * 30 + 2 * 50 + 40 ms.
        thread::sleep(Duration::from_millis(2600));
        respond(device, &request, vec![0x07, 0x04]);
    });

    let request = Request::new(0x01, PNUM_COORDINATOR, CMD_COORDINATOR_BOND_NODE)
        .with_payload(vec![0x07, 0x00])
        .unwrap();
    let started = Instant::now();
    let outcome = engine.send(&request);

    assert!(outcome.is_success(), "{:?}", outcome.failure());
    assert!(started.elapsed() >= Duration::from_millis(2600));
    assert_eq!(engine.timing().bonded_nodes(), Some(4));
    device.join().unwrap();
}

#[test]
#[serial]
fn test_missing_confirmation_times_out() {
    let timing = TimingModel::new(RfMode::Std, HwRevision::Dctr7xD, Duration::from_millis(200));
    let (mut engine, device) = engine_with_device(timing);

    let device = scripted(device, |device| {
        next_request(device);
    });

    let started = Instant::now();
    let outcome = engine.send(&Request::new(0x01, PNUM_LEDR, CMD_LED_PULSE));

    expect_failure(&outcome, FailureKind::Receive);
    assert_eq!(outcome.failure().unwrap().description, "timed out");
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_millis(1500));
    device.join().unwrap();
}

#[test]
#[serial]
fn test_routed_exchange_delays_next_request() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        let first = next_request(device);
        confirm(device, &first, 2, 6, 2);
        let confirmed_at = Instant::now();
        thread::sleep(Duration::from_millis(50));
        respond(device, &first, vec![0x01, 0x02, 0x03]);

        // Routing of the first response takes 3 * 60 + 3 * 30 * 10 ms.
        let second = next_request(device);
        assert!(confirmed_at.elapsed() >= Duration::from_millis(1050));
        respond(device, &second, vec![]);
    });

    let outcome = engine.send(&Request::new(0x02, PNUM_LEDR, CMD_LED_PULSE));
    let response = outcome.response().expect("routed request succeeds");
    assert_eq!(response.payload, vec![0x01, 0x02, 0x03]);

    let outcome = engine.send(&Request::new(COORDINATOR_ADDRESS, PNUM_LEDR, CMD_LED_PULSE));
    assert!(outcome.is_success());
    device.join().unwrap();
}

#[test]
#[serial]
fn test_error_response_is_delivered_as_success() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        let request = next_request(device);
        confirm(device, &request, 1, 3, 1);
        let response = Response::for_request(&request, ResponseCode::Pnum, 0, vec![0xAA]);
        device.send_frame(response.encode());
    });

    let outcome = engine.send(&Request::new(0x03, 0x2F, 0x00));
    let response = outcome.response().expect("error response still completes the exchange");
    assert_eq!(response.response_code, ResponseCode::Pnum);
    assert!(response.payload.is_empty());
    device.join().unwrap();
}

#[test]
#[serial]
fn test_second_confirmation_is_transport_failure() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        let request = next_request(device);
        confirm(device, &request, 1, 3, 1);
        confirm(device, &request, 1, 3, 1);
    });

    let outcome = engine.send(&Request::new(0x04, PNUM_LEDR, CMD_LED_PULSE));
    expect_failure(&outcome, FailureKind::TransportInternal);
    device.join().unwrap();
}

#[test]
#[serial]
fn test_truncated_confirmation_is_receive_failure() {
    let (mut engine, device) = engine_with_device(TimingModel::default());

    let device = scripted(device, |device| {
        let request = next_request(device);
        let mut frame = request.encode();
        frame.truncate(FOURSOME_LENGTH);
        frame.extend_from_slice(&[STATUS_CONFIRMATION, 0x00, 0x01]);
        device.send_frame(frame);
    });

    let outcome = engine.send(&Request::new(0x04, PNUM_LEDR, CMD_LED_PULSE));
    expect_failure(&outcome, FailureKind::Receive);
    device.join().unwrap();
}

// ============================================================================
// Configured Engine
// ============================================================================

#[test]
#[serial]
fn test_engine_from_config_talks_to_loopback_device() {
    let config = EngineConfig::from_yaml(
        r#"
rf_mode: STD
confirmation_wait_ms: 500
initial_bonded_nodes: 5
transport:
  type: channel
"#,
    )
    .unwrap();

    let mut engine = RequestEngine::from_config(&config, &TransportRegistry::with_defaults()).unwrap();
    engine.start().unwrap();
    assert_eq!(engine.timing().bonded_nodes(), Some(5));

    let outcome = engine.send(&Request::new(0x09, PNUM_LEDR, CMD_LED_PULSE));
    assert!(outcome.is_success());

    let outcome = engine.send(&Request::new(
        COORDINATOR_ADDRESS,
        PNUM_COORDINATOR,
        CMD_COORDINATOR_CLEAR_ALL_BONDS,
    ));
    assert!(outcome.is_success());
    assert_eq!(engine.timing().bonded_nodes(), Some(0));

    engine.shutdown();
    expect_failure(
        &engine.send(&Request::new(0x09, PNUM_LEDR, CMD_LED_PULSE)),
        FailureKind::EngineInternal,
    );
}
