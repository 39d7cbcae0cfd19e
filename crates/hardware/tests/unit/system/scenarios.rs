//! Canonical Bus Scenarios.
//!
//! Read miss, write invalidating a sharer, dirty intervention ahead of a
//! peer's fill, and same-tick arbitration.

use cohsim_core::common::{Access, AgentId, RequestOutcome};
use cohsim_core::protocol::{CoherenceState, MessageKind};
use cohsim_core::trace::TraceEvent;
use mockall::Sequence;
use mockall::predicate::eq;
use pretty_assertions::assert_eq;

use crate::common::harness::{TestSystem, config};
use crate::common::mocks::store::MockStore;

use CoherenceState::{Invalid as I, Modified as M, Shared as S};

#[test]
fn read_miss_fills_shared() {
    let mut t = TestSystem::new(2);
    assert_eq!(t.issue(0, 0x100, Access::Read), RequestOutcome::Pending);

    let report = t.step();
    let granted = report.granted.unwrap();
    assert_eq!(granted.kind(), MessageKind::RReq);
    assert_eq!(granted.source(), AgentId::new(0));
    assert_eq!(report.responses.len(), 1);
    assert_eq!(report.responses[0].kind(), MessageKind::MemResp);
    assert_eq!(report.completions.len(), 1);

    assert_eq!(t.states(0x100), vec![S, I]);
}

#[test]
fn write_invalidates_sharer() {
    let mut t = TestSystem::new(2);
    let _ = t.read(0, 0x100);
    assert_eq!(t.issue(1, 0x100, Access::Write(5)), RequestOutcome::Pending);

    let report = t.step();
    assert_eq!(report.granted.unwrap().kind(), MessageKind::RfoBcast);
    assert_eq!(report.responses[0].kind(), MessageKind::MemCResp);
    assert_eq!(t.states(0x100), vec![I, M]);
    assert_eq!(t.sys.stats().invalidations, 1);
}

#[test]
fn second_reader_gets_shared_response() {
    let mut t = TestSystem::new(3);
    let _ = t.read(0, 0x40);
    let _ = t.issue(2, 0x40, Access::Read);
    let report = t.step();
    assert_eq!(report.responses[0].kind(), MessageKind::MemRespS);
    assert_eq!(t.states(0x40), vec![S, I, S]);
}

#[test]
fn modified_owner_writes_back_before_peer_fill() {
    let mut store = MockStore::new();
    let mut seq = Sequence::new();
    // The writer's RFO fill.
    store
        .expect_get()
        .with(eq(0x200))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(0u64);
    // The owner's intervention...
    store
        .expect_put()
        .with(eq(0x200), eq(0xbeef))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    // ...lands before the reader's fill is generated.
    store
        .expect_get()
        .with(eq(0x200))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(0xbeefu64);

    let mut t = TestSystem::with_store(&config(2), Box::new(store));
    t.write(0, 0x200, 0xbeef);
    assert_eq!(t.state(0, 0x200), M);

    assert_eq!(t.read(1, 0x200), 0xbeef);
    assert_eq!(t.states(0x200), vec![I, S]);

    let last = t.reports.last().unwrap();
    assert_eq!(last.interventions.len(), 1);
    assert_eq!(last.interventions[0].kind(), MessageKind::CWb);

    // In the trace, the intervention precedes the reader's fill response.
    let trace = t.sys.trace();
    let cwb = trace
        .iter()
        .position(|e| matches!(e, TraceEvent::Intervention { kind: MessageKind::CWb, .. }))
        .unwrap();
    let fill = trace
        .iter()
        .position(|e| matches!(e, TraceEvent::Response { kind: MessageKind::MemResp, .. }))
        .unwrap();
    assert!(cwb < fill);
}

#[test]
fn modified_owner_keeps_shared_copy_under_shared_policy() {
    let mut cfg = config(2);
    cfg.protocol.peer_read_downgrade = cohsim_core::config::PeerReadPolicy::Shared;
    let mut t = TestSystem::with_config(&cfg);
    t.write(0, 0x200, 3);
    assert_eq!(t.read(1, 0x200), 3);
    assert_eq!(t.states(0x200), vec![S, S]);
    assert_eq!(t.sys.peek(0x200), 3);
    assert_eq!(t.reports.last().unwrap().responses[0].kind(), MessageKind::MemRespS);
}

#[test]
fn same_tick_requests_grant_lowest_agent() {
    let mut t = TestSystem::new(2);
    let _ = t.issue(1, 0x200, Access::Read);
    let _ = t.issue(0, 0x100, Access::Read);

    let first = t.step();
    let granted = first.granted.unwrap();
    assert_eq!(granted.source(), AgentId::new(0));
    assert_eq!(first.held.len(), 1);
    assert_eq!(first.held[0].source(), AgentId::new(1));
    assert_eq!(t.state(1, 0x200), I);

    let second = t.step();
    assert_eq!(second.granted.unwrap().source(), AgentId::new(1));
    assert!(second.held.is_empty());
    assert_eq!(t.state(1, 0x200), S);
    assert_eq!(t.sys.stats().holds, 1);
    assert_eq!(t.sys.stats().messages(MessageKind::HoldBus), 1);
}

#[test]
fn write_then_read_stays_modified() {
    let mut t = TestSystem::new(2);
    t.write(0, 0x80, 9);
    assert_eq!(t.issue(0, 0x80, Access::Read), RequestOutcome::Hit(9));
    assert_eq!(t.state(0, 0x80), M);
}

#[test]
fn exclusive_fill_then_silent_upgrade() {
    let mut cfg = config(2);
    cfg.protocol.exclusive_fill = true;
    let mut t = TestSystem::with_config(&cfg);
    let _ = t.read(0, 0x0);
    assert_eq!(t.state(0, 0x0), CoherenceState::Exclusive);
    let grants = t.sys.stats().grants;
    assert_eq!(t.issue(0, 0x0, Access::Write(1)), RequestOutcome::Hit(1));
    assert_eq!(t.sys.stats().grants, grants);
    assert_eq!(t.state(0, 0x0), M);
}

#[test]
fn idle_ticks_are_no_req() {
    let mut t = TestSystem::new(2);
    let report = t.step();
    assert_eq!(report.granted, None);
    assert_eq!(t.sys.stats().idle_ticks, 1);
    assert_eq!(t.sys.stats().messages(MessageKind::NoReq), 1);
    assert_eq!(t.sys.trace(), &[TraceEvent::Idle { tick: 0 }]);
}
