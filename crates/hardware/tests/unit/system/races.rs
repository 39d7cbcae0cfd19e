//! Race Tests.
//!
//! Same-tick conflicts on one line: queued requests are rebuilt from the
//! current state each tick, and a locked line holds later requesters off
//! until its transaction has been answered.

use cohsim_core::common::{Access, AgentId, RequestOutcome};
use cohsim_core::protocol::{CoherenceState, MessageKind};
use pretty_assertions::assert_eq;

use crate::common::harness::{TestSystem, config};

use CoherenceState::{Invalid as I, Modified as M, Shared as S};

#[test]
fn losing_upgrade_is_reissued_as_rfo() {
    let mut cfg = config(2);
    cfg.protocol.shared_write_upgrade = true;
    let mut t = TestSystem::with_config(&cfg);
    let _ = t.read(0, 0x0);
    let _ = t.read(1, 0x0);
    assert_eq!(t.states(0x0), vec![S, S]);

    let _ = t.issue(0, 0x0, Access::Write(1));
    let _ = t.issue(1, 0x0, Access::Write(2));

    let first = t.step();
    assert_eq!(first.granted.unwrap().kind(), MessageKind::WsBcast);
    assert_eq!(first.held[0].kind(), MessageKind::WsBcast);
    assert_eq!(t.states(0x0), vec![M, I]);

    // Agent 1 lost its copy; its stale upgrade becomes a full RFO.
    let second = t.step();
    let granted = second.granted.unwrap();
    assert_eq!(granted.kind(), MessageKind::RfoBcast);
    assert_eq!(granted.source(), AgentId::new(1));
    assert_eq!(second.interventions[0].payload(), Some(1));
    assert_eq!(t.states(0x0), vec![I, M]);
    assert_eq!(t.sys.peek(0x0), 1);
}

#[test]
fn flush_of_invalidated_line_completes_without_bus() {
    let mut t = TestSystem::new(2);
    let _ = t.read(1, 0x40);
    assert_eq!(t.issue(1, 0x40, Access::Flush), RequestOutcome::Pending);
    assert_eq!(t.issue(0, 0x40, Access::Write(8)), RequestOutcome::Pending);

    let first = t.step();
    assert_eq!(first.granted.unwrap().source(), AgentId::new(0));
    assert_eq!(t.state(1, 0x40), I);

    let second = t.step();
    assert_eq!(second.granted, None);
    assert_eq!(second.completions.len(), 1);
    assert_eq!(second.completions[0].agent, AgentId::new(1));
    assert_eq!(second.completions[0].access, Access::Flush);
    assert!(t.sys.is_quiescent());
}

#[test]
fn locked_line_holds_peer_until_response() {
    let mut cfg = config(2);
    cfg.memory.latency = 3;
    let mut t = TestSystem::with_config(&cfg);
    let _ = t.issue(0, 0x80, Access::Write(4));
    let _ = t.issue(1, 0x80, Access::Read);

    // Tick 0: agent 0 wins and locks the line.
    let report = t.step();
    assert_eq!(report.granted.unwrap().source(), AgentId::new(0));
    assert!(report.responses.is_empty());

    // Ticks 1 and 2: agent 1 is held on the locked line.
    for _ in 0..2 {
        let report = t.step();
        assert_eq!(report.granted, None);
        assert_eq!(report.held.len(), 1);
        assert_eq!(report.held[0].source(), AgentId::new(1));
    }

    // Tick 3: the fill arrives and the line is released.
    let report = t.step();
    assert_eq!(report.responses[0].kind(), MessageKind::MemCResp);
    assert_eq!(t.state(0, 0x80), M);

    // Tick 4: agent 1 reads the written value through the owner's writeback.
    let done = t.settle();
    assert_eq!(done.last().unwrap().value, 4);
    assert_eq!(t.states(0x80), vec![I, S]);
}

#[test]
fn busy_agent_is_told_to_retry() {
    let mut t = TestSystem::new(2);
    let _ = t.issue(0, 0x0, Access::Read);
    let err = t
        .sys
        .request(AgentId::new(0), 0x40, Access::Read)
        .unwrap_err();
    assert!(!err.is_fatal());
    let _ = t.settle();
    assert_eq!(t.issue(0, 0x40, Access::Read), RequestOutcome::Pending);
}

#[test]
fn unknown_agent_is_rejected() {
    let mut t = TestSystem::new(2);
    let err = t
        .sys
        .request(AgentId::new(5), 0x0, Access::Read)
        .unwrap_err();
    assert_eq!(err, cohsim_core::CoherenceError::UnknownAgent(AgentId::new(5)));
    assert!(
        t.sys
            .request(AgentId::EXTERNAL, 0x0, Access::Read)
            .is_err()
    );
}

#[test]
fn peer_rfo_beats_victim_writeback_of_same_line() {
    let mut cfg = config(2);
    cfg.cache.size_bytes = 64;
    cfg.cache.ways = 1;
    let mut t = TestSystem::with_config(&cfg);
    t.write(1, 0x0, 7);
    assert_eq!(t.states(0x0), vec![I, M]);

    // Agent 1 must evict its dirty copy of 0x0 to fill 0x40 while agent 0
    // asks for ownership of 0x0 in the same tick.
    assert_eq!(t.issue(1, 0x40, Access::Read), RequestOutcome::Pending);
    assert_eq!(t.issue(0, 0x0, Access::Write(9)), RequestOutcome::Pending);

    let race = t.step();
    let granted = race.granted.unwrap();
    assert_eq!(granted.kind(), MessageKind::RfoBcast);
    assert_eq!(granted.source(), AgentId::new(0));
    assert_eq!(race.held.len(), 1);
    assert_eq!(race.held[0].kind(), MessageKind::WbReq);
    assert_eq!(race.held[0].address(), 0x0);
    assert_eq!(race.interventions.len(), 1);
    assert_eq!(race.interventions[0].kind(), MessageKind::CWb);
    assert_eq!(race.interventions[0].payload(), Some(7));
    assert_eq!(t.sys.peek(0x0), 7);
    assert_eq!(t.states(0x0), vec![M, I]);

    // The victim is gone, so the miss goes out without a writeback.
    let reissued = t.step();
    let granted = reissued.granted.unwrap();
    assert_eq!(granted.kind(), MessageKind::RReq);
    assert_eq!(granted.address(), 0x40);
    assert_eq!(reissued.completions.len(), 1);
    assert_eq!(t.sys.stats().messages(MessageKind::WbReq), 0);
    assert_eq!(t.sys.stats().writebacks, 1);

    assert_eq!(t.read(1, 0x0), 9);
}
