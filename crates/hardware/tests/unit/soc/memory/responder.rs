//! Memory Responder Tests.
//!
//! Verifies the request-to-response mapping, intervention write-back and
//! delivery ordering by ready tick.

use cohsim_core::common::AgentId;
use cohsim_core::config::MemoryConfig;
use cohsim_core::protocol::{BusMessage, MessageKind};
use cohsim_core::soc::memory::MemoryResponder;
use cohsim_core::soc::memory::store::{BackingStore, SparseMemory};
use rstest::rstest;

fn a(id: u16) -> AgentId {
    AgentId::new(id)
}

fn responder(latency: u64) -> MemoryResponder {
    MemoryResponder::new(&MemoryConfig {
        latency,
        ..MemoryConfig::default()
    })
}

#[test]
fn sparse_memory_reads_zero_until_written() {
    let mut mem = SparseMemory::new();
    assert_eq!(mem.get(0x40), 0);
    mem.put(0x40, 9);
    assert_eq!(mem.get(0x40), 9);
    assert_eq!(mem.get(0x80), 0);
}

#[rstest]
#[case(MessageKind::RReq, false, MessageKind::MemResp)]
#[case(MessageKind::RReq, true, MessageKind::MemRespS)]
#[case(MessageKind::RfoBcast, false, MessageKind::MemCResp)]
#[case(MessageKind::RfoBcast, true, MessageKind::MemCResp)]
#[case(MessageKind::WsBcast, false, MessageKind::EnAccess)]
#[case(MessageKind::FlushS, false, MessageKind::EnAccess)]
#[case(MessageKind::ReqFlush, false, MessageKind::EnAccess)]
fn response_kinds(#[case] request: MessageKind, #[case] shared: bool, #[case] reply: MessageKind) {
    let mut mem = responder(0);
    let scheduled = mem
        .respond(&BusMessage::new(request, a(1), 0x100), shared, 4)
        .unwrap();
    assert_eq!(scheduled.ready_at, 4);
    assert_eq!(scheduled.message.kind(), reply);
    assert_eq!(scheduled.message.source(), a(1));
    assert_eq!(scheduled.message.address(), 0x100);
    assert_eq!(scheduled.message.payload().is_some(), reply.carries_data());
}

#[rstest]
#[case(MessageKind::WbReq)]
#[case(MessageKind::Flush)]
fn writebacks_store_data_then_acknowledge(#[case] kind: MessageKind) {
    let mut mem = responder(0);
    let reply = mem
        .respond(&BusMessage::with_payload(kind, a(0), 0x80, 42), false, 0)
        .unwrap();
    assert_eq!(reply.message.kind(), MessageKind::EnAccess);
    assert_eq!(mem.peek(0x80), 42);
}

#[test]
fn fills_carry_current_memory_contents() {
    let mut mem = responder(0);
    let _ = mem.respond(
        &BusMessage::with_payload(MessageKind::WbReq, a(0), 0x40, 17),
        false,
        0,
    );
    let fill = mem
        .respond(&BusMessage::new(MessageKind::RReq, a(1), 0x40), false, 1)
        .unwrap();
    assert_eq!(fill.message.payload(), Some(17));
}

#[test]
fn interventions_write_back_immediately() {
    let mut mem = responder(5);
    let ack = mem
        .accept_intervention(&BusMessage::with_payload(MessageKind::CWb, a(2), 0x200, 99))
        .unwrap();
    assert_eq!(ack.kind(), MessageKind::EnAccess);
    assert_eq!(ack.source(), a(2));
    assert_eq!(mem.peek(0x200), 99);
    assert_eq!(mem.outstanding(), 0);

    let flush = BusMessage::with_payload(MessageKind::CFlush, a(2), 0x240, 1);
    assert!(mem.accept_intervention(&flush).is_some());
    assert_eq!(mem.peek(0x240), 1);

    let not_intervention = BusMessage::new(MessageKind::RReq, a(2), 0x200);
    assert_eq!(mem.accept_intervention(&not_intervention), None);
}

#[test]
fn control_kinds_get_no_response() {
    let mut mem = responder(0);
    for kind in [MessageKind::NoReq, MessageKind::HoldBus, MessageKind::MemResp] {
        assert_eq!(mem.respond(&BusMessage::new(kind, a(0), 0), false, 0), None);
    }
    assert_eq!(mem.outstanding(), 0);
}

#[test]
fn drain_respects_ready_tick() {
    let mut mem = responder(3);
    let _ = mem.respond(&BusMessage::new(MessageKind::RReq, a(0), 0x0), false, 10);
    let _ = mem.respond(&BusMessage::new(MessageKind::RReq, a(1), 0x40), false, 11);
    assert!(mem.drain_ready(12).is_empty());

    let due = mem.drain_ready(13);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].source(), a(0));
    assert_eq!(mem.outstanding(), 1);

    let rest = mem.drain_ready(20);
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].source(), a(1));
}

#[test]
fn ready_tick_saturates_on_huge_latency() {
    let mut mem = responder(u64::MAX);
    let scheduled = mem
        .respond(&BusMessage::new(MessageKind::RReq, a(0), 0x40), false, 7)
        .unwrap();
    assert_eq!(scheduled.ready_at, u64::MAX);
    assert!(mem.drain_ready(1_000).is_empty());
    assert_eq!(mem.outstanding(), 1);
}
