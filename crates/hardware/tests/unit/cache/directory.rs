//! Line Directory Tests.
//!
//! Exercises lookup, install into free ways, victim preview, idempotent
//! invalidation and dirty writeback message construction.

use cohsim_core::cache::LineDirectory;
use cohsim_core::common::AgentId;
use cohsim_core::config::{CacheConfig, ReplacementPolicy};
use cohsim_core::protocol::{CoherenceState, MessageKind};
use pretty_assertions::assert_eq;

/// One set of two 64-byte ways, LRU.
fn tiny() -> LineDirectory {
    LineDirectory::new(&CacheConfig {
        size_bytes: 128,
        line_bytes: 64,
        ways: 2,
        policy: ReplacementPolicy::Lru,
    })
}

#[test]
fn absent_lines_are_invalid() {
    let dir = tiny();
    assert!(dir.is_empty());
    assert_eq!(dir.lookup(0x1234), CoherenceState::Invalid);
    assert_eq!(dir.capacity(), 2);
}

#[test]
fn install_aligns_and_looks_up_by_any_byte() {
    let mut dir = tiny();
    assert_eq!(dir.install(0x47, CoherenceState::Shared, 5), None);
    assert_eq!(dir.lookup(0x40), CoherenceState::Shared);
    assert_eq!(dir.lookup(0x7f), CoherenceState::Shared);
    assert_eq!(dir.entry(0x40).unwrap().address, 0x40);
    assert_eq!(dir.entry(0x40).unwrap().data, 5);
    assert_eq!(dir.len(), 1);
}

#[test]
fn install_updates_resident_line_in_place() {
    let mut dir = tiny();
    let _ = dir.install(0x0, CoherenceState::Shared, 1);
    assert_eq!(dir.install(0x0, CoherenceState::Modified, 2), None);
    assert_eq!(dir.len(), 1);
    assert_eq!(dir.lookup(0x0), CoherenceState::Modified);
    assert_eq!(dir.entry(0x0).unwrap().data, 2);
}

#[test]
fn victim_preview_matches_displacement() {
    let mut dir = tiny();
    let _ = dir.install(0x00, CoherenceState::Modified, 10);
    let _ = dir.install(0x40, CoherenceState::Shared, 20);
    // Both ways full; 0x00 is least recently used.
    let victim = dir.victim_for(0x80).unwrap();
    assert_eq!(victim.address, 0x00);
    assert!(victim.dirty());

    // Touching 0x00 makes 0x40 the victim.
    let _ = dir.hit(0x00);
    assert_eq!(dir.victim_for(0x80).unwrap().address, 0x40);

    let displaced = dir.install(0x80, CoherenceState::Shared, 30).unwrap();
    assert_eq!(displaced.address, 0x40);
    assert_eq!(dir.lookup(0x40), CoherenceState::Invalid);
    assert_eq!(dir.lookup(0x80), CoherenceState::Shared);
}

#[test]
fn no_victim_when_resident_or_free() {
    let mut dir = tiny();
    let _ = dir.install(0x00, CoherenceState::Shared, 0);
    assert_eq!(dir.victim_for(0x40), None);
    let _ = dir.install(0x40, CoherenceState::Shared, 0);
    assert_eq!(dir.victim_for(0x00), None);
}

#[test]
fn fill_prefers_free_way_over_victim() {
    let mut dir = tiny();
    let _ = dir.install(0x00, CoherenceState::Shared, 0);
    let _ = dir.install(0x40, CoherenceState::Shared, 0);
    let _ = dir.invalidate(0x40);
    assert_eq!(dir.install(0x80, CoherenceState::Exclusive, 0), None);
    assert_eq!(dir.lookup(0x00), CoherenceState::Shared);
}

#[test]
fn invalidate_is_idempotent() {
    let mut dir = tiny();
    let _ = dir.install(0x40, CoherenceState::Exclusive, 3);
    let first = dir.invalidate(0x40);
    assert_eq!(first.map(|e| e.state), Some(CoherenceState::Exclusive));
    assert_eq!(dir.invalidate(0x40), None);
    assert_eq!(dir.invalidate(0x9000), None);
    assert_eq!(dir.lookup(0x40), CoherenceState::Invalid);
}

#[test]
fn set_state_and_invalid_install_remove_lines() {
    let mut dir = tiny();
    let _ = dir.install(0x40, CoherenceState::Modified, 3);
    assert!(dir.set_state(0x40, CoherenceState::Shared));
    assert_eq!(dir.lookup(0x40), CoherenceState::Shared);
    assert!(dir.set_state(0x40, CoherenceState::Invalid));
    assert!(!dir.set_state(0x40, CoherenceState::Shared));

    let _ = dir.install(0x00, CoherenceState::Shared, 1);
    assert_eq!(dir.install(0x00, CoherenceState::Invalid, 0), None);
    assert!(dir.is_empty());
}

#[test]
fn writeback_only_for_dirty_lines() {
    let mut dir = tiny();
    let _ = dir.install(0x00, CoherenceState::Modified, 0xab);
    let _ = dir.install(0x40, CoherenceState::Exclusive, 0xcd);

    let wb = dir.writeback_if_dirty(0x10, AgentId::new(3)).unwrap();
    assert_eq!(wb.kind(), MessageKind::CWb);
    assert_eq!(wb.source(), AgentId::new(3));
    assert_eq!(wb.address(), 0x00);
    assert_eq!(wb.payload(), Some(0xab));
    // The state is left to the caller.
    assert_eq!(dir.lookup(0x00), CoherenceState::Modified);

    assert_eq!(dir.writeback_if_dirty(0x40, AgentId::new(3)), None);
    assert_eq!(dir.writeback_if_dirty(0x80, AgentId::new(3)), None);
}

#[test]
fn multi_set_geometry() {
    // 4 sets x 2 ways of 64 bytes.
    let mut dir = LineDirectory::new(&CacheConfig {
        size_bytes: 512,
        line_bytes: 64,
        ways: 2,
        policy: ReplacementPolicy::Fifo,
    });
    assert_eq!(dir.capacity(), 8);
    // 0x000, 0x100 and 0x200 all map to set 0.
    let _ = dir.install(0x000, CoherenceState::Shared, 0);
    let _ = dir.install(0x100, CoherenceState::Shared, 0);
    assert_eq!(dir.victim_for(0x040), None);
    assert_eq!(dir.victim_for(0x200).unwrap().address, 0x000);

    let mut resident: Vec<u64> = dir.resident_lines().map(|e| e.address).collect();
    resident.sort_unstable();
    assert_eq!(resident, vec![0x000, 0x100]);
}

#[test]
fn zero_ways_fall_back_to_direct_mapped() {
    let dir = LineDirectory::new(&CacheConfig {
        size_bytes: 256,
        line_bytes: 64,
        ways: 0,
        policy: ReplacementPolicy::Lru,
    });
    assert_eq!(dir.capacity(), 4);
}

#[test]
fn undersized_capacity_falls_back_to_one_set() {
    let dir = LineDirectory::new(&CacheConfig {
        size_bytes: 64,
        line_bytes: 64,
        ways: 4,
        policy: ReplacementPolicy::Plru,
    });
    assert_eq!(dir.capacity(), 4);
}
