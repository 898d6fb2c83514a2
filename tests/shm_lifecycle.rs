// Shared buffer lifecycle integration tests
//
// Simulates the compositor holding on to buffers and checks that a redraw
// never lands in a region the server may still be reading.

use ring_menu::shm::{BufferState, ShmRegion};
use ring_menu::surface::{SurfaceLifecycle, SurfacePhase};

#[test]
fn test_redraw_during_delayed_release_uses_a_new_region() {
    let mut lifecycle: SurfaceLifecycle<ShmRegion> = SurfaceLifecycle::new((4, 2));
    lifecycle.mark_committed();
    lifecycle.configure(1, 0, 0);

    let (width, height) = lifecycle.size();
    let first_id = lifecycle.reserve_buffer().unwrap();
    let (mut first, _) = ShmRegion::for_frame(width, height).unwrap();
    first.pixels_mut().fill(0x11);
    lifecycle.attached(first_id, first);

    // The server has not released the first buffer yet
    let second_id = lifecycle.reserve_buffer().unwrap();
    let (mut second, _) = ShmRegion::for_frame(width, height).unwrap();
    second.pixels_mut().fill(0x22);
    lifecycle.attached(second_id, second);

    assert_ne!(first_id, second_id);
    assert_eq!(lifecycle.phase(), SurfacePhase::PendingRelease);

    let first = lifecycle.release(first_id).unwrap();
    assert!(first.pixels().iter().all(|b| *b == 0x11));
    assert_eq!(lifecycle.phase(), SurfacePhase::Attached);
}

#[test]
fn test_released_ids_are_not_handed_out_again() {
    let mut lifecycle: SurfaceLifecycle<()> = SurfaceLifecycle::new((8, 8));
    lifecycle.mark_committed();
    lifecycle.configure(1, 8, 8);

    let mut seen = Vec::new();
    for _ in 0..16 {
        let id = lifecycle.reserve_buffer().unwrap();
        assert!(!seen.contains(&id));
        lifecycle.attached(id, ());
        lifecycle.release(id);
        seen.push(id);
    }
    assert_eq!(lifecycle.outstanding(), 0);
}

#[test]
fn test_regions_are_independent_mappings() {
    let mut a = ShmRegion::allocate(4096).unwrap();
    let b = ShmRegion::allocate(4096).unwrap();
    a.pixels_mut().fill(0xff);
    assert!(b.pixels().iter().all(|byte| *byte == 0));
}

#[test]
fn test_ledger_states_follow_attach_order() {
    let mut ledger = ring_menu::shm::BufferLedger::new();
    let ids: Vec<_> = (0..3)
        .map(|n| {
            let id = ledger.reserve();
            ledger.attach(id, n);
            id
        })
        .collect();

    assert_eq!(ledger.state(ids[0]), Some(BufferState::PendingRelease));
    assert_eq!(ledger.state(ids[1]), Some(BufferState::PendingRelease));
    assert_eq!(ledger.state(ids[2]), Some(BufferState::Attached));
    assert_eq!(ledger.pending_release(), 2);
}
