use std::sync::{
    Arc,
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use log::Level;
use rstest::rstest;
use tickwire_testing::{LoggerHandle, logger};

use super::*;
use crate::messages::{LocationUpdate, LocationUpdatePayload, handler};

fn response_frame(handler_id: u32, code: u32, data: Vec<u8>) -> Frame {
    let payload = BincodeCodec
        .serialize(&Response::new(handler_id, code, 0, data))
        .expect("encode response");
    Frame::new(PacketType::Normal, payload)
}

fn counter() -> (Arc<AtomicUsize>, impl FnMut(&Frame) -> HandlerResult + Send + 'static) {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    (hits, move |_: &Frame| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn observers_run_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    for label in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        router.register_packet(PacketType::GameStart, move |_| {
            order.lock().expect("order lock").push(label);
            Ok(())
        });
    }

    let outcome = router.dispatch(&Frame::new(PacketType::GameStart, Vec::<u8>::new()));

    assert_eq!(outcome, DispatchOutcome::Delivered { invoked: 3, failed: 0 });
    assert_eq!(*order.lock().expect("order lock"), ["first", "second", "third"]);
}

#[rstest]
fn panicking_callback_does_not_stop_later_ones(mut logger: LoggerHandle) {
    logger.clear();
    let (hits, tail) = counter();
    let mut router = Router::new();
    router.register_packet(PacketType::Location, |_| panic!("render thread gone"));
    router.register_packet(PacketType::Location, tail);

    let outcome = router.dispatch(&Frame::new(PacketType::Location, Vec::<u8>::new()));

    assert_eq!(outcome, DispatchOutcome::Delivered { invoked: 2, failed: 1 });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(
        logger.contains(Level::Error, "render thread gone"),
        "panic was not logged"
    );
}

#[test]
fn failing_callback_is_isolated() {
    let (hits, tail) = counter();
    let mut router = Router::new();
    router.register_packet(PacketType::Other(42), |_| Err("nope".into()));
    router.register_packet(PacketType::Other(42), tail);

    let first = router.dispatch(&Frame::new(PacketType::Other(42), vec![1]));
    let second = router.dispatch(&Frame::new(PacketType::Other(42), vec![2]));

    assert_eq!(first, DispatchOutcome::Delivered { invoked: 2, failed: 1 });
    assert_eq!(second, first);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[rstest]
fn unknown_route_is_logged_and_ignored(mut logger: LoggerHandle) {
    logger.clear();
    let mut router = Router::new();

    let outcome = router.dispatch(&Frame::new(PacketType::Other(200), Vec::<u8>::new()));

    assert_eq!(outcome, DispatchOutcome::Unrouted);
    assert!(
        logger.contains(Level::Warn, "no handler registered"),
        "unrouted frame was not logged"
    );
}

#[test]
fn responses_route_by_handler_id() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    let sink = Arc::clone(&seen);
    router.register_handler(handler::LOCATION_UPDATE, move |response| {
        sink.lock().expect("sink lock").push(response.handler_id());
        Ok(())
    });

    let routed = router.dispatch(&response_frame(handler::LOCATION_UPDATE, 0, Vec::new()));
    let unrouted = router.dispatch(&response_frame(99, 0, Vec::new()));

    assert_eq!(routed, DispatchOutcome::Delivered { invoked: 1, failed: 0 });
    assert_eq!(unrouted, DispatchOutcome::Unrouted);
    assert_eq!(*seen.lock().expect("sink lock"), [handler::LOCATION_UPDATE]);
    assert_eq!(router.handler_count(handler::LOCATION_UPDATE), 1);
}

#[rstest]
fn undecodable_response_is_dropped(mut logger: LoggerHandle) {
    logger.clear();
    let hits = Arc::new(AtomicUsize::new(0));
    let mut router = Router::new();
    let seen = Arc::clone(&hits);
    router.register_handler(0, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let outcome = router.dispatch(&Frame::new(PacketType::Normal, vec![0xFF, 0x01]));

    assert_eq!(outcome, DispatchOutcome::Dropped);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(logger.contains(Level::Warn, "undecodable"));
}

#[test]
fn on_message_decodes_typed_payload() {
    let received = Arc::new(Mutex::new(None));
    let mut router = Router::new();
    let slot = Arc::clone(&received);
    router.on_message(PacketType::Location, move |update: LocationUpdate| {
        *slot.lock().expect("slot lock") = Some(update);
        Ok(())
    });
    let update = LocationUpdate::default();
    let payload = BincodeCodec.serialize(&update).expect("encode");

    router.dispatch(&Frame::new(PacketType::Location, payload));

    assert_eq!(*received.lock().expect("slot lock"), Some(update));
}

#[rstest]
fn on_message_decode_failure_drops_the_frame(mut logger: LoggerHandle) {
    logger.clear();
    let mut router = Router::new();
    router.on_message(PacketType::Location, |_: LocationUpdate| Ok(()));

    let outcome = router.dispatch(&Frame::new(PacketType::Location, vec![1, 2, 3]));

    assert_eq!(outcome, DispatchOutcome::Dropped);
    assert!(logger.contains(Level::Warn, "dropping undecodable Location frame"));
}

#[test]
fn undecodable_subscriber_does_not_hide_other_deliveries() {
    let (hits, raw) = counter();
    let mut router = Router::new();
    router.on_message(PacketType::GameStart, |_: LocationUpdatePayload| Ok(()));
    router.register_packet(PacketType::GameStart, raw);

    let outcome = router.dispatch(&Frame::new(PacketType::GameStart, vec![9]));

    assert_eq!(outcome, DispatchOutcome::Delivered { invoked: 1, failed: 0 });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn on_response_with_undecodable_data_is_dropped() {
    let mut router = Router::new();
    router.on_response(handler::INIT, |_: LocationUpdatePayload| Ok(()));

    let outcome = router.dispatch(&response_frame(handler::INIT, 0, vec![1]));

    assert_eq!(outcome, DispatchOutcome::Dropped);
}

#[rstest]
fn ping_observers_see_heartbeat_replies(mut logger: LoggerHandle) {
    logger.clear();
    let (hits, observer) = counter();
    let mut unobserved = Router::new();
    let mut observed = Router::new();
    observed.register_packet(PacketType::Ping, observer);
    let pong = Frame::new(PacketType::Ping, vec![0; 8]);

    assert_eq!(unobserved.dispatch(&pong), DispatchOutcome::Unrouted);
    assert!(!logger.contains(Level::Warn, "no handler registered"));
    assert_eq!(
        observed.dispatch(&pong),
        DispatchOutcome::Delivered { invoked: 1, failed: 0 }
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[rstest]
#[case::success(0, 1, 0)]
#[case::failure_code(7, 0, 1)]
fn on_response_only_delivers_successes(
    #[case] code: u32,
    #[case] expected_hits: usize,
    #[case] expected_failed: usize,
) {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut router = Router::new();
    let seen = Arc::clone(&hits);
    router.on_response(
        handler::LOCATION_UPDATE,
        move |payload: LocationUpdatePayload| {
            assert_eq!(payload, LocationUpdatePayload { x: 1.0, y: 2.0 });
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    );
    let data = BincodeCodec
        .serialize(&LocationUpdatePayload { x: 1.0, y: 2.0 })
        .expect("encode");

    let outcome = router.dispatch(&response_frame(handler::LOCATION_UPDATE, code, data));

    assert_eq!(
        outcome,
        DispatchOutcome::Delivered {
            invoked: 1,
            failed: expected_failed
        }
    );
    assert_eq!(hits.load(Ordering::SeqCst), expected_hits);
}

#[test]
fn raw_normal_observers_see_frames_without_response_handlers() {
    let (hits, raw) = counter();
    let mut router = Router::new();
    router.register_packet(PacketType::Normal, raw);

    let outcome = router.dispatch(&response_frame(5, 0, Vec::new()));

    assert_eq!(outcome, DispatchOutcome::Delivered { invoked: 1, failed: 0 });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
