//! Walk through the allocator's elevator pitch: carve a few spans, release
//! one in the middle, and watch the free space stay in one piece while the
//! surviving handles keep their content.
//!
//! ```sh
//! cargo run --example usage
//! ```

use defralloc::Defralloc;

fn main() {
    let mut mem = Defralloc::new(4096);

    let greeting = mem.allocate(16).unwrap();
    mem.get_mut(greeting).unwrap()[..5].copy_from_slice(b"hello");

    let middle = mem.allocate(512).unwrap();
    let tail = mem.allocate(64).unwrap();
    mem.get_mut(tail).unwrap().fill(0x2A);

    println!("before release: {:?}", mem.stats());

    // Releasing the middle span slides `tail` backward; both remaining
    // handles keep working and free memory stays a single run.
    mem.release(middle).unwrap();

    println!("after release:  {:?}", mem.stats());
    println!(
        "greeting still reads {:?}",
        std::str::from_utf8(&mem.get(greeting).unwrap()[..5]).unwrap()
    );
    assert!(mem.get(tail).unwrap().iter().all(|&b| b == 0x2A));
    assert_eq!(mem.stats().frag_pct, 0);

    // Shrink the tail; content up to the new size carries over.
    let tail = mem.reallocate(tail, 16).unwrap();
    assert_eq!(mem.size_of(tail), 16);

    println!("after realloc:  {:?}", mem.stats());
}
