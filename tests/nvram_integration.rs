// Integration tests for the virtual NVRAM over the default board layout

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use vnvram::error::{Error, Result};
use vnvram::nvram::MAX_RECORD_LEN;
use vnvram::transport::codec::{decode_nvram_content, encode_nvram_content};
use vnvram::transport::{Dispatch, Frame, Notification, RecordingTransport, WriterTransport};
use vnvram::{bring_up, PlatformConfig, PoolAllocator, PoolClass, VirtualNvram};

fn board_store() -> Result<(VirtualNvram, RecordingTransport)> {
    let config = PlatformConfig::default();
    let pool = Arc::new(PoolAllocator::with_heap(
        &config.pool.classes,
        config.heap.size,
    )?);
    let recorder = RecordingTransport::new();
    Ok((VirtualNvram::new(pool, Box::new(recorder.clone())), recorder))
}

/// Writer shared between the transport and the test
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_write_then_read() -> Result<()> {
    let (mut store, recorder) = board_store()?;

    store.write(0x10, b"link-key-0123456")?;

    let mut buf = [0u8; 32];
    assert_eq!(store.read(0x10, &mut buf)?, 16);
    assert_eq!(&buf[..16], b"link-key-0123456");
    assert_eq!(
        recorder.take(),
        vec![Notification::Write {
            key: 0x10,
            payload: b"link-key-0123456".to_vec()
        }]
    );

    Ok(())
}

#[test]
fn test_resize_mirrors_delete_then_write() -> Result<()> {
    let (mut store, recorder) = board_store()?;

    store.write(0x20, &[1u8; 10])?;
    store.write(0x20, &[2u8; 100])?;

    let mut buf = [0u8; 100];
    assert_eq!(store.read(0x20, &mut buf)?, 100);
    assert_eq!(buf, [2u8; 100]);
    assert_eq!(
        recorder.take(),
        vec![
            Notification::Write {
                key: 0x20,
                payload: vec![1u8; 10]
            },
            Notification::Delete { key: 0x20 },
            Notification::Write {
                key: 0x20,
                payload: vec![2u8; 100]
            },
        ]
    );

    // Only the larger block is still held
    assert_eq!(store.pool().stats().allocated_blocks(), 1);

    Ok(())
}

#[test]
fn test_identical_rewrite_is_silent() -> Result<()> {
    let (mut store, recorder) = board_store()?;

    store.write(0x30, b"same")?;
    recorder.take();
    store.write(0x30, b"same")?;

    assert!(recorder.is_empty());
    assert_eq!(store.len(), 1);

    Ok(())
}

#[test]
fn test_short_destination_untouched() -> Result<()> {
    let (mut store, _recorder) = board_store()?;
    store.write(0x40, b"twelve bytes")?;

    let mut buf = [0xEEu8; 4];
    assert_eq!(
        store.read(0x40, &mut buf),
        Err(Error::TooSmall {
            required: 12,
            capacity: 4
        })
    );
    assert_eq!(buf, [0xEE; 4]);

    Ok(())
}

#[test]
fn test_store_fills_board_pool() -> Result<()> {
    let (mut store, recorder) = board_store()?;

    // Seven blocks on the board: 32x2, 80x2, 284x2, 572x1
    for key in 0..7u16 {
        store.write(key, &[key as u8; 20])?;
    }
    assert_eq!(store.pool().stats().free_blocks(), 0);

    recorder.take();
    assert_eq!(store.write(7, &[7u8; 20]), Err(Error::NoMemory(20)));
    assert!(!store.contains_key(7));
    assert!(recorder.is_empty());

    // Releasing any record makes room again
    store.delete(3)?;
    store.write(7, &[7u8; 20])?;
    assert_eq!(store.len(), 7);

    Ok(())
}

#[test]
fn test_record_larger_than_biggest_class() -> Result<()> {
    let (mut store, _recorder) = board_store()?;
    assert_eq!(store.write(1, &[0u8; 573]), Err(Error::NoMemory(573)));
    assert!(store.write(1, &[0u8; 572]).is_ok());
    Ok(())
}

#[test]
fn test_delete_missing_key_is_ok() -> Result<()> {
    let (mut store, recorder) = board_store()?;
    store.delete(0x99)?;
    assert!(recorder.is_empty());
    Ok(())
}

#[test]
fn test_host_link_mirrors_to_writer() -> Result<()> {
    let config = PlatformConfig::default();
    let sink = SharedSink::default();
    let transport = WriterTransport::new(sink.clone(), config.transport);
    let mut link = bring_up(&config, Box::new(transport))?;

    let push = Frame::new(
        config.transport.push_nvram_command,
        encode_nvram_content(0x0102, b"bond"),
    );
    assert_eq!(
        link.handle_bytes(&push.encode()?)?,
        Dispatch::Stored {
            key: 0x0102,
            len: 4
        }
    );
    link.store_mut().delete(0x0102)?;

    let wire = sink.0.lock().clone();
    let write = Frame::decode(&wire)?;
    assert_eq!(write.opcode, config.transport.write_nvram_event);
    assert_eq!(decode_nvram_content(&write.payload)?, (0x0102, &b"bond"[..]));

    let rest = &wire[write.encode()?.len()..];
    let delete = Frame::decode(rest)?;
    assert_eq!(delete.opcode, config.transport.delete_nvram_event);
    assert_eq!(&delete.payload[..], &[0x02, 0x01]);

    Ok(())
}

#[test]
fn test_custom_layout_through_bring_up() -> Result<()> {
    let mut config = PlatformConfig::default();
    config.heap.size = 512;
    config.pool.classes = vec![PoolClass::new(8, 4), PoolClass::new(64, 2)];

    let mut link = bring_up(&config, Box::new(RecordingTransport::new()))?;
    let store = link.store_mut();

    store.write(1, b"tiny")?;
    store.write(2, b"a value longer than eight")?;

    let stats = store.pool().stats();
    assert_eq!(stats.size_classes[0].allocated_blocks, 1);
    assert_eq!(stats.size_classes[1].allocated_blocks, 1);

    Ok(())
}

#[test]
fn test_largest_record_is_mirrored() -> Result<()> {
    let config = PlatformConfig::default();
    let pool = Arc::new(PoolAllocator::with_heap(
        &[PoolClass::new(u16::MAX as usize, 1)],
        u16::MAX as usize + 8,
    )?);
    let sink = SharedSink::default();
    let mut store = VirtualNvram::new(
        pool,
        Box::new(WriterTransport::new(sink.clone(), config.transport)),
    );

    // One byte more would not fit a write event frame
    assert!(matches!(
        store.write(1, &vec![7u8; MAX_RECORD_LEN + 1]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(store.is_empty());
    assert!(sink.0.lock().is_empty());

    assert_eq!(store.write(1, &vec![7u8; MAX_RECORD_LEN])?, MAX_RECORD_LEN);

    let wire = sink.0.lock().clone();
    let frame = Frame::decode(&wire)?;
    assert_eq!(frame.opcode, config.transport.write_nvram_event);
    assert_eq!(frame.payload.len(), u16::MAX as usize);
    let (key, data) = decode_nvram_content(&frame.payload)?;
    assert_eq!(key, 1);
    assert_eq!(data.len(), MAX_RECORD_LEN);

    Ok(())
}
