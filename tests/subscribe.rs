use std::cell::RefCell;

use libetm::etm::{Error, SubscribeState};

mod mock;
use mock::*;

#[test]
fn test_subscribe_sends_command_and_settles() {
    let mut modem = modem();
    let index = modem.subscribe("sensors/temp", None).unwrap();
    assert_eq!(index, 0);
    assert_eq!(
        modem.transport_mut().take_written(),
        "AT+EMQSUBOPEN=0,\"sensors/temp\"\r\n"
    );
    assert_eq!(modem.subscribe_state(0), Some(SubscribeState::Subscribing));

    feed(&mut modem, b"OK\r\n+EMQSUBOPEN:0,0\r\n");
    assert_eq!(modem.subscribe_state(0), Some(SubscribeState::Subscribed));
    assert!(modem.in_sync());
}

#[test]
fn test_already_subscribed_is_success() {
    let mut modem = modem();
    modem.subscribe("sensors/temp", None).unwrap();
    feed(&mut modem, b"+EMQSUBOPEN:0,-2\r\n");
    assert_eq!(modem.subscribe_state(0), Some(SubscribeState::Subscribed));
}

#[test]
fn test_rejected_subscription_frees_the_slot_for_reuse() {
    let mut modem = modem();
    modem.subscribe("a", None).unwrap();
    modem.subscribe("b", None).unwrap();
    feed(&mut modem, b"+EMQSUBOPEN:0,-5\r\n");
    assert_eq!(modem.subscribe_state(0), Some(SubscribeState::Error));

    assert_eq!(modem.subscribe("c", None), Ok(0));
    assert_eq!(modem.subscribe_state(1), Some(SubscribeState::Subscribing));
}

#[test]
fn test_allocates_lowest_index_until_full() {
    let mut modem = modem();
    for expected in 0..8 {
        assert_eq!(modem.subscribe("topic", None), Ok(expected));
    }
    modem.transport_mut().take_written();

    assert_eq!(modem.subscribe("topic", None), Err(Error::NoFreeSlot));
    assert!(modem.transport().tx.is_empty());
    assert_eq!(modem.outstanding_acks(), 8);
}

#[test]
fn test_invalid_topic_writes_nothing() {
    let mut modem = modem();
    assert_eq!(modem.subscribe("bad\"topic", None), Err(Error::InvalidTopic));
    assert!(modem.transport().tx.is_empty());
    assert_eq!(modem.subscribe_state(0), Some(SubscribeState::NotInUse));
}

#[test]
fn test_message_is_delivered_only_when_complete() {
    let received = RefCell::new(Vec::new());
    let mut on_message = |payload: &[u8]| received.borrow_mut().push(payload.to_vec());

    let mut modem = modem();
    modem.subscribe("sensors/temp", Some(&mut on_message)).unwrap();
    feed(&mut modem, b"+EMQSUBOPEN:0,0\r\n+EMQ:0,5\r\nhel");
    assert!(received.borrow().is_empty());

    feed(&mut modem, b"lo");
    assert_eq!(*received.borrow(), vec![b"hello".to_vec()]);
}

#[test]
fn test_binary_body_may_contain_line_endings() {
    let received = RefCell::new(Vec::new());
    let mut on_message = |payload: &[u8]| received.borrow_mut().push(payload.to_vec());

    let mut modem = modem();
    modem.subscribe("raw", Some(&mut on_message)).unwrap();
    feed(&mut modem, b"+EMQSUBOPEN:0,0\r\n+EMQ:0,4\r\n\r\n\x00\xFF+ETM:IDLE\r\n");

    assert_eq!(*received.borrow(), vec![vec![b'\r', b'\n', 0x00, 0xFF]]);
    assert!(modem.readiness().contains(libetm::etm::Readiness::IDLE));
}

#[test]
fn test_zero_length_message_delivers_empty_payload() {
    let calls = RefCell::new(Vec::new());
    let mut on_message = |payload: &[u8]| calls.borrow_mut().push(payload.len());

    let mut modem = modem();
    modem.subscribe("empty", Some(&mut on_message)).unwrap();
    feed(&mut modem, b"+EMQSUBOPEN:0,0\r\n+EMQ:0,0\r\n+EMQ:0,1\r\nx");
    assert_eq!(*calls.borrow(), vec![0, 1]);
}

#[test]
fn test_message_for_unused_index_keeps_stream_in_sync() {
    let received = RefCell::new(0);
    let mut on_message = |_: &[u8]| *received.borrow_mut() += 1;

    let mut modem = modem();
    modem.subscribe("a", Some(&mut on_message)).unwrap();
    feed(&mut modem, b"+EMQ:3,2\r\nOK+EMQ:12,2\r\n\r\n+EMQSUBOPEN:0,0\r\n");

    assert_eq!(*received.borrow(), 0);
    assert_eq!(modem.subscribe_state(0), Some(SubscribeState::Subscribed));
    // The "OK" inside the first body is payload, not an acknowledgement.
    assert_eq!(modem.outstanding_acks(), 1);
}

#[test]
fn test_oversized_message_is_dropped_without_losing_sync() {
    let received = RefCell::new(0);
    let mut on_message = |_: &[u8]| *received.borrow_mut() += 1;

    let mut modem = modem();
    modem.subscribe("big", Some(&mut on_message)).unwrap();
    feed(&mut modem, b"+EMQSUBOPEN:0,0\r\n+EMQ:0,300\r\n");
    feed(&mut modem, &[b'\n'; 300]);
    feed(&mut modem, b"+ETM:EMQRDY\r\n");

    assert_eq!(*received.borrow(), 0);
    assert!(modem.readiness().contains(libetm::etm::Readiness::MQTT_READY));
}

#[test]
fn test_unsubscribe_lifecycle() {
    let received = RefCell::new(0);
    let mut on_message = |_: &[u8]| *received.borrow_mut() += 1;

    let mut modem = modem();
    assert_eq!(modem.unsubscribe(8), Err(Error::InvalidIndex));
    modem.subscribe("a", Some(&mut on_message)).unwrap();
    assert_eq!(modem.unsubscribe(0), Err(Error::InvalidState));

    feed(&mut modem, b"+EMQSUBOPEN:0,0\r\n");
    modem.transport_mut().take_written();
    modem.unsubscribe(0).unwrap();
    assert_eq!(modem.transport_mut().take_written(), "AT+EMQSUBCLOSE=0\r\n");
    assert_eq!(modem.subscribe_state(0), Some(SubscribeState::Unsubscribing));

    // Close errors are ignored.
    feed(&mut modem, b"+EMQSUBCLOSE:0,-1\r\n+EMQ:0,1\r\nz");
    assert_eq!(modem.subscribe_state(0), Some(SubscribeState::NotInUse));
    assert_eq!(*received.borrow(), 0);
}

#[test]
fn test_message_is_delivered_while_unsubscribing() {
    let received = RefCell::new(0);
    let mut on_message = |_: &[u8]| *received.borrow_mut() += 1;

    let mut modem = modem();
    modem.subscribe("a", Some(&mut on_message)).unwrap();
    feed(&mut modem, b"+EMQSUBOPEN:0,0\r\n");
    modem.unsubscribe(0).unwrap();
    feed(&mut modem, b"+EMQ:0,1\r\nz");
    assert_eq!(*received.borrow(), 1);
}

#[test]
fn test_state_queries_out_of_range() {
    let modem = modem();
    assert_eq!(modem.subscribe_state(8), None);
    assert_eq!(modem.publish_state(8), None);
}
