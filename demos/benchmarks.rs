//
// Copyright (c) 2025 Nathan Fiedler
//
use hatarray::{GrowableSequence, HashedArrayTree, TarjanZwickArray};
use std::time::Instant;

fn benchmark<S: GrowableSequence<usize> + Default>(name: &str, size: usize) {
    let start = Instant::now();
    let mut coll = S::default();
    for value in 0..size {
        coll.push_back(value);
    }
    let duration = start.elapsed();
    println!("{name} create: {:?}", duration);

    // test sequenced access for entire collection
    let start = Instant::now();
    for index in 0..size {
        assert_eq!(coll.get(index), Some(&index));
    }
    let duration = start.elapsed();
    println!("{name} ordered: {:?}", duration);

    println!("{name} unused capacity: {}", coll.wasted());
    println!("{name} potential capacity: {}", coll.potential_capacity());

    // test popping all elements from the collection
    let start = Instant::now();
    while !coll.is_empty() {
        coll.pop_back();
    }
    let duration = start.elapsed();
    println!("{name} pop-all: {:?}", duration);
    println!("{name} capacity: {}", coll.capacity());
}

fn main() {
    let size = 100_000_000;
    println!("creating HashedArrayTree...");
    benchmark::<HashedArrayTree<usize>>("hat", size);
    println!("creating TarjanZwickArray...");
    benchmark::<TarjanZwickArray<usize>>("tarjan-zwick", size);
    println!("creating Vec...");
    benchmark::<Vec<usize>>("vector", size);
}
