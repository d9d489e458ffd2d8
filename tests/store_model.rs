// Model-based test: the store must agree with a plain map under any
// sequence of writes and deletes that fits the pool

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use vnvram::error::Error;
use vnvram::transport::{Notification, RecordingTransport};
use vnvram::{PoolAllocator, PoolClass, VirtualNvram};

#[derive(Debug, Clone)]
enum Op {
    Write(u16, Vec<u8>),
    Delete(u16),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u16..6, proptest::collection::vec(any::<u8>(), 1..48))
            .prop_map(|(key, data)| Op::Write(key, data)),
        1 => (0u16..6).prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn store_agrees_with_map(ops in proptest::collection::vec(op(), 1..60)) {
        // Six keys, each always fits: every key can hold one 48-byte block
        let pool = Arc::new(
            PoolAllocator::with_heap(&[PoolClass::new(16, 6), PoolClass::new(48, 6)], 1024).unwrap(),
        );
        let recorder = RecordingTransport::new();
        let mut store = VirtualNvram::new(pool, Box::new(recorder.clone()));
        let mut model: HashMap<u16, Vec<u8>> = HashMap::new();

        for op in ops {
            match op {
                Op::Write(key, data) => {
                    let unchanged = model.get(&key) == Some(&data);
                    prop_assert_eq!(store.write(key, &data).unwrap(), data.len());

                    let sent = recorder.take();
                    if unchanged {
                        prop_assert!(sent.is_empty());
                    } else {
                        prop_assert_eq!(
                            sent.last(),
                            Some(&Notification::Write { key, payload: data.clone() })
                        );
                    }
                    model.insert(key, data);
                }
                Op::Delete(key) => {
                    store.delete(key).unwrap();
                    let sent = recorder.take();
                    if model.remove(&key).is_some() {
                        prop_assert_eq!(sent, vec![Notification::Delete { key }]);
                    } else {
                        prop_assert!(sent.is_empty());
                    }
                }
            }
        }

        prop_assert_eq!(store.len(), model.len());
        prop_assert_eq!(store.pool().stats().allocated_blocks(), model.len());

        for key in 0u16..6 {
            let mut buf = [0u8; 64];
            match model.get(&key) {
                Some(data) => {
                    prop_assert_eq!(store.read(key, &mut buf).unwrap(), data.len());
                    prop_assert_eq!(&buf[..data.len()], &data[..]);
                }
                None => {
                    prop_assert_eq!(store.read(key, &mut buf), Err(Error::NotFound(key)));
                }
            }
        }
    }
}
