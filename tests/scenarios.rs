//! End-to-end scenarios driving the allocator through its public surface
//! only: carve, slide-on-release, recycling, resizing and the monitor.

use defralloc::{AllocError, Defralloc, Handle};

/// Writes a recognizable pattern through a handle.
fn stamp(mem: &mut Defralloc, handle: Handle, byte: u8) {
    mem.get_mut(handle).unwrap().fill(byte);
}

/// Asserts the conservation law and the zero-fragmentation guarantee.
fn assert_healthy(mem: &Defralloc) {
    let stats = mem.stats();
    assert_eq!(
        stats.used_bytes + stats.free_bytes + stats.table_bytes,
        mem.capacity(),
        "capacity must be conserved"
    );
    assert_eq!(stats.largest_free, stats.free_bytes, "free memory must be one run");
    assert_eq!(stats.frag_pct, 0);
}

#[test]
fn releasing_the_middle_block_slides_the_last_one_back() {
    // The classic: 64-byte arena, 8-byte descriptors, 4-byte words.
    let mut mem = Defralloc::new(64);

    let a = mem.allocate(8).unwrap();
    let b = mem.allocate(8).unwrap();
    let c = mem.allocate(8).unwrap();

    stamp(&mut mem, a, 0xAA);
    stamp(&mut mem, b, 0xBB);
    stamp(&mut mem, c, 0xCC);

    mem.release(b).unwrap();

    // A untouched, C's content survived its slide into B's old offset.
    assert_eq!(mem.size_of(a), 8);
    assert_eq!(mem.get(a).unwrap(), &[0xAA; 8]);
    assert_eq!(mem.get(c).unwrap(), &[0xCC; 8]);

    // Exactly one free region: 64 minus 2 live spans minus 4 table slots.
    let stats = mem.stats();
    assert_eq!(stats.used_count, 2);
    assert_eq!(stats.free_count, 2); // anchor + b's vacant slot
    assert_eq!(stats.used_bytes, 16);
    assert_eq!(stats.table_bytes, 32);
    assert_eq!(stats.free_bytes, 64 - 16 - 32);
    assert_healthy(&mem);
}

#[test]
fn oversized_request_fails_without_poisoning_the_arena() {
    let mut mem = Defralloc::new(64);

    // The whole capacity can never be carved: the admission test holds
    // back two descriptors' worth of space.
    let denied = mem.allocate(64);
    assert!(matches!(denied, Err(AllocError::OutOfMemory { .. })));

    // A reasonable request right after still succeeds.
    let small = mem.allocate(8).unwrap();
    assert_eq!(mem.size_of(small), 8);
    assert_healthy(&mem);
}

#[test]
fn failed_reallocate_is_non_destructive() {
    let mut mem = Defralloc::new(64);

    let a = mem.allocate(8).unwrap();
    stamp(&mut mem, a, 0x5A);

    let denied = mem.reallocate(a, 1024);
    assert!(matches!(denied, Err(AllocError::OutOfMemory { .. })));

    assert_eq!(mem.size_of(a), 8);
    assert_eq!(mem.get(a).unwrap(), &[0x5A; 8]);
    assert_healthy(&mem);
}

#[test]
fn reallocate_carries_content_to_the_new_span() {
    let mut mem = Defralloc::new(256);

    let a = mem.allocate(12).unwrap();
    stamp(&mut mem, a, 0x42);

    let grown = mem.reallocate(a, 24).unwrap();
    assert_ne!(grown, a);
    assert_eq!(mem.size_of(grown), 24);
    assert_eq!(&mem.get(grown).unwrap()[..12], &[0x42; 12]);
    assert_eq!(mem.size_of(a), 0);

    let shrunk = mem.reallocate(grown, 4).unwrap();
    assert_eq!(mem.size_of(shrunk), 4);
    assert_eq!(mem.get(shrunk).unwrap(), &[0x42; 4]);
    assert_healthy(&mem);
}

#[test]
fn releases_are_idempotent() {
    let mut mem = Defralloc::new(128);

    // The sentinel can be released any number of times.
    mem.release(Handle::EMPTY).unwrap();
    mem.release(Handle::EMPTY).unwrap();

    let a = mem.allocate(8).unwrap();
    let b = mem.allocate(8).unwrap();
    stamp(&mut mem, b, 0x77);

    mem.release(a).unwrap();
    mem.release(a).unwrap(); // checked no-op

    assert_eq!(mem.get(b).unwrap(), &[0x77; 8]);
    assert_healthy(&mem);
}

#[test]
fn handles_survive_unrelated_traffic() {
    let mut mem = Defralloc::new(512);

    let keeper = mem.allocate(32).unwrap();
    {
        let span = mem.get_mut(keeper).unwrap();
        for (i, byte) in span.iter_mut().enumerate() {
            *byte = i as u8;
        }
    }

    // Churn: allocations and releases all around the keeper.
    let mut churn = Vec::new();
    for i in 1..8 {
        churn.push(mem.allocate(i * 4).unwrap());
    }
    for handle in churn.drain(..).step_by(2) {
        mem.release(handle).unwrap();
    }
    let resized = mem.allocate(64).unwrap();
    mem.release(resized).unwrap();

    let span = mem.get(keeper).unwrap();
    assert_eq!(span.len(), 32);
    for (i, byte) in span.iter().enumerate() {
        assert_eq!(*byte, i as u8);
    }
    assert_healthy(&mem);
}

#[test]
fn descriptor_table_shrinks_when_the_outermost_slot_frees() {
    let mut mem = Defralloc::new(128);

    let a = mem.allocate(8).unwrap();
    let b = mem.allocate(8).unwrap();
    let c = mem.allocate(8).unwrap();
    let table_full = mem.stats().table_bytes;

    // Inner release: table keeps the slot for reuse.
    mem.release(b).unwrap();
    assert_eq!(mem.stats().table_bytes, table_full);

    // Outermost release: c's slot and b's vacant slot are both reclaimed.
    mem.release(c).unwrap();
    assert_eq!(mem.stats().table_bytes, table_full - 16);

    mem.release(a).unwrap();
    // Only the anchor is left.
    assert_eq!(mem.stats().table_bytes, 8);
    assert_eq!(mem.stats().free_bytes, mem.capacity() - 8);
    assert_healthy(&mem);
}

/// The documented pathological pattern: many small live spans, always
/// freeing the lowest-addressed one, so every release slides everything
/// that remains and pays the full quadratic cost. Kept small enough to
/// stay fast while still proving the arena never fragments under it.
#[test]
fn lowest_first_release_storm_never_fragments() {
    let mut mem = Defralloc::new(4096);

    let mut handles = Vec::new();
    loop {
        match mem.allocate(8) {
            Ok(handle) => {
                let byte = (handles.len() % 251) as u8;
                stamp(&mut mem, handle, byte);
                handles.push(handle);
            }
            Err(AllocError::OutOfMemory { .. }) => break,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(handles.len() > 100, "arena should fit a real crowd");

    for (released, handle) in handles.iter().enumerate() {
        mem.release(*handle).unwrap();
        assert_healthy(&mem);

        // Spot-check a survivor round-trips through all that sliding.
        if let Some(last) = handles.last() {
            if released + 1 < handles.len() {
                let byte = ((handles.len() - 1) % 251) as u8;
                assert_eq!(mem.get(*last).unwrap(), &[byte; 8]);
            }
        }
    }

    assert_eq!(mem.stats().used_bytes, 0);
    assert_eq!(mem.stats().free_bytes, mem.capacity() - 8);
}
