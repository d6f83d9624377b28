use std::sync::Arc;
use std::thread;

use mert::Mert;

mod common;

/// Two inserts for the same key from different threads are
/// linearizable — one wins, both return successfully, and the final
/// value is one of the two written.
#[test]
fn concurrent_inserts_for_the_same_key_linearize() {
    common::init();
    let index = Arc::new(Mert::new_concurrent());
    let mut handles = Vec::new();
    for t in 0..8 {
        let index = Arc::clone(&index);
        handles.push(thread::spawn(move || {
            index.insert(b"shared", format!("writer-{t}").as_bytes()).unwrap();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    let result = index.search(b"shared").expect("a value must have been written");
    let result = String::from_utf8(result).unwrap();
    assert!(result.starts_with("writer-"));
}

/// A concurrent insert and search for the same key never observe a
/// torn leaf — the search must see either nothing, the old value, or the
/// new value, never an arbitrary other key's bytes.
#[test]
fn concurrent_insert_and_search_never_tears_a_leaf() {
    common::init();
    let index = Arc::new(Mert::new_concurrent());
    index.insert(b"racing", b"before").unwrap();

    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            index.insert(b"racing", b"after").unwrap();
        })
    };
    let reader = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for _ in 0..1000 {
                match index.search(b"racing") {
                    Some(v) => assert!(v == b"before" || v == b"after"),
                    None => panic!("racing key must never appear absent once inserted"),
                }
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();
}

/// Each thread writes its own disjoint key set concurrently; every key
/// from every thread must be retrievable once all writers finish.
#[test]
fn disjoint_concurrent_writers_all_land() {
    common::init();
    let index = Arc::new(Mert::new_concurrent());
    let mut handles = Vec::new();
    for t in 0..6u8 {
        let index = Arc::clone(&index);
        handles.push(thread::spawn(move || {
            for i in 0..200u32 {
                let key = format!("{t}-{i:05}");
                let value = format!("v{t}-{i}");
                index.insert(key.as_bytes(), value.as_bytes()).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    for t in 0..6u8 {
        for i in 0..200u32 {
            let key = format!("{t}-{i:05}");
            let expected = format!("v{t}-{i}").into_bytes();
            assert_eq!(index.search(key.as_bytes()), Some(expected));
        }
    }
}

/// Concurrent readers must never observe a panic or a corrupted result
/// while writers are actively splitting/promoting in the same subtree.
#[test]
fn readers_survive_concurrent_structural_mutation() {
    common::init();
    let index = Arc::new(Mert::new_concurrent());
    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for i in 0..300u32 {
                let mut key = b"aaaaaa".to_vec();
                key.push(b'Z');
                key.push((i % 256) as u8);
                key.push((i / 256) as u8);
                index.insert(&key, format!("v{i}").as_bytes()).unwrap();
            }
        })
    };
    let reader = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for _ in 0..2000 {
                // Reading keys that may or may not exist yet must never
                // panic and must never return another key's value.
                let probe = index.search(b"aaaaaaZ\0\0");
                if let Some(v) = probe {
                    assert_eq!(v, b"v0".to_vec());
                }
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();
}
