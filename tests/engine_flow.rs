use std::sync::Arc;
use std::thread;

use channelfe::io::{DEFAULT_QUALITY, DecodeLimits, SaveFormat, decode_image, encode_image};
use channelfe::{
    AdjustRequest, DirStore, Engine, EngineConfig, EngineError, PixelBuffer, RawRect, SessionState,
};

fn png(buf: &PixelBuffer) -> Vec<u8> {
    encode_image(buf, SaveFormat::Png, DEFAULT_QUALITY).unwrap()
}

fn decode(bytes: &[u8]) -> PixelBuffer {
    decode_image(bytes, DecodeLimits::default()).unwrap()
}

fn blue(offset: i32) -> AdjustRequest {
    AdjustRequest {
        blue: offset,
        ..Default::default()
    }
}

#[test]
fn load_adjust_save_fetch_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        store_dir: dir.path().join("uploads"),
        ..Default::default()
    };
    let engine = Engine::with_dir_store(config).unwrap();

    let source = PixelBuffer::from_fn(6, 4, |x, y| [(x * 40) as u8, (y * 60) as u8, 90]).unwrap();
    let handle = engine.load_image(&png(&source), "photo.png").unwrap();
    assert_eq!(engine.session_state(handle), SessionState::Loaded);

    let preview = engine
        .adjust(
            handle,
            &AdjustRequest {
                green: 20,
                red: -100,
                region: Some(RawRect::new(1, 1, 3, 2)),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(dir.path().join("uploads").join(preview.key()).is_file());

    let saved = engine.save(&preview).unwrap();
    assert_eq!(saved.key(), "saved_image.png");

    let preview_bytes = engine.fetch_bytes(preview.key()).unwrap();
    let saved_bytes = engine.fetch_bytes(saved.key()).unwrap();
    assert_eq!(preview_bytes, saved_bytes);

    let restored = decode(&saved_bytes);
    assert_eq!(&restored, engine.preview(handle).unwrap().as_ref());
    assert_eq!(restored.pixel(1, 1), Some([40, 80, 0]));
    assert_eq!(restored.pixel(0, 0), source.pixel(0, 0));
}

#[test]
fn adjustments_are_relative_to_the_original() {
    let engine = Engine::in_memory(EngineConfig::default());
    let gray = PixelBuffer::filled(2, 2, [100, 100, 100]).unwrap();
    let handle = engine.load_image(&png(&gray), "gray.png").unwrap();

    engine.adjust(handle, &blue(50)).unwrap();
    for _ in 0..2 {
        let preview = engine.adjust(handle, &blue(-50)).unwrap();
        let view = decode(&engine.fetch_bytes(preview.key()).unwrap());
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(view.pixel(x, y), Some([50, 100, 100]));
            }
        }
    }
}

#[test]
fn interior_roi_scenario() {
    let engine = Engine::in_memory(EngineConfig::default());
    let handle = engine.load_buffer(PixelBuffer::filled(4, 4, [0, 0, 0]).unwrap(), "zeros.png");
    let request = AdjustRequest {
        blue: 10,
        region: Some(RawRect::new(1, 1, 2, 2)),
        ..Default::default()
    };
    engine.adjust(handle, &request).unwrap();
    let view = engine.preview(handle).unwrap();

    for y in 0..4 {
        for x in 0..4 {
            let inside = matches!((x, y), (1, 1) | (1, 2) | (2, 1) | (2, 2));
            assert_eq!(view.pixel(x, y), Some([if inside { 10 } else { 0 }, 0, 0]));
        }
    }
}

#[test]
fn out_of_bounds_region_produces_nothing() {
    let engine = Engine::in_memory(EngineConfig::default());
    let handle = engine.load_buffer(PixelBuffer::filled(10, 4, [5, 5, 5]).unwrap(), "wide.png");
    let request = AdjustRequest {
        red: 30,
        region: Some(RawRect::new(8, 0, 5, 2)),
        ..Default::default()
    };

    let err = engine.adjust(handle, &request).unwrap_err();
    assert!(matches!(err, EngineError::OutOfBounds { width: 10, height: 4, .. }));
    assert_eq!(engine.session_state(handle), SessionState::Loaded);
    assert!(engine.store().get(&format!("{}/adjusted_wide.png", handle)).is_err());
}

#[test]
fn sessions_do_not_share_state() {
    let engine = Arc::new(Engine::in_memory(EngineConfig::default()));
    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let buf = PixelBuffer::filled(16, 16, [i * 10, 0, 0]).unwrap();
            engine.load_buffer(buf, "same_name.png")
        })
        .collect();

    thread::scope(|scope| {
        for (i, &handle) in handles.iter().enumerate() {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                for step in 0..10 {
                    engine.adjust(handle, &blue(step)).unwrap();
                }
                let view = engine.preview(handle).unwrap();
                assert_eq!(view.pixel(0, 0), Some([i as u8 * 10 + 9, 0, 0]));
            });
        }
    });

    for (i, &handle) in handles.iter().enumerate() {
        let preview = engine.adjust(handle, &blue(1)).unwrap();
        let view = decode(&engine.fetch_bytes(preview.key()).unwrap());
        assert_eq!(view.pixel(15, 15), Some([i as u8 * 10 + 1, 0, 0]));
    }
}

#[test]
fn concurrent_adjusts_on_one_session_each_see_the_original() {
    let engine = Engine::in_memory(EngineConfig::default());
    let handle = engine.load_buffer(PixelBuffer::filled(32, 32, [128, 128, 128]).unwrap(), "mid.png");

    thread::scope(|scope| {
        for offset in [-100, -50, 0, 50, 100] {
            let engine = &engine;
            scope.spawn(move || {
                let preview = engine.adjust(handle, &blue(offset)).unwrap();
                assert_eq!(preview.session(), handle);
            });
        }
    });

    let last = engine.preview(handle).unwrap();
    let b = last.pixel(0, 0).unwrap()[0] as i32;
    assert!([28, 78, 128, 178, 228].contains(&b), "unexpected blue {b}");
}

#[test]
fn undecodable_upload_is_rejected() {
    let engine = Engine::in_memory(EngineConfig::default());
    let err = engine.load_image(b"GIF? no, just text", "notes.txt").unwrap_err();
    assert!(matches!(err, EngineError::Decode(_)));
    assert_eq!(engine.session_count(), 0);
}

#[test]
fn oversized_upload_is_rejected() {
    let config = EngineConfig {
        max_upload_bytes: 16,
        ..Default::default()
    };
    let engine = Engine::in_memory(config);
    let bytes = png(&PixelBuffer::filled(8, 8, [1, 1, 1]).unwrap());
    let err = engine.load_image(&bytes, "big.png").unwrap_err();
    assert!(matches!(
        err,
        EngineError::Decode(channelfe::DecodeError::TooLarge { limit: 16, .. })
    ));
}

#[test]
fn jpeg_uploads_round_trip_exactly_through_save() {
    let engine = Engine::in_memory(EngineConfig::default());
    let src = PixelBuffer::from_fn(16, 16, |x, y| [(x * 16) as u8, (y * 16) as u8, 128]).unwrap();
    let jpeg = encode_image(&src, SaveFormat::Jpeg, 95).unwrap();
    let handle = engine.load_image(&jpeg, "photo.jpg").unwrap();
    let preview = engine.adjust(handle, &blue(10)).unwrap();
    assert!(preview.key().ends_with("/adjusted_photo.png"));

    let saved = engine.save(&preview).unwrap();
    let restored = decode(&engine.fetch_bytes(saved.key()).unwrap());
    assert_eq!(&restored, engine.preview(handle).unwrap().as_ref());
}

#[test]
fn failed_preview_write_leaves_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DirStore::open(dir.path()).unwrap());
    let engine = Engine::new(EngineConfig::default(), store);
    let handle = engine.load_buffer(PixelBuffer::filled(2, 2, [0, 0, 0]).unwrap(), "blocked.png");

    // A plain file where the session's namespace directory should go.
    let namespace = dir.path().join(handle.to_string());
    std::fs::write(&namespace, b"not a directory").unwrap();
    assert!(matches!(engine.adjust(handle, &blue(50)).unwrap_err(), EngineError::Io(_)));
    assert!(matches!(engine.reset(handle).unwrap_err(), EngineError::Io(_)));
    assert_eq!(engine.session_state(handle), SessionState::Loaded);
    assert!(engine.preview(handle).is_err());

    std::fs::remove_file(&namespace).unwrap();
    let first = engine.adjust(handle, &blue(10)).unwrap();
    let before = engine.fetch_bytes(first.key()).unwrap();

    // A directory in place of the preview file makes the final rename fail.
    let target = dir.path().join(first.key());
    std::fs::remove_file(&target).unwrap();
    std::fs::create_dir(&target).unwrap();
    assert!(engine.adjust(handle, &blue(50)).is_err());
    assert_eq!(engine.preview(handle).unwrap().pixel(0, 0), Some([10, 0, 0]));

    std::fs::remove_dir(&target).unwrap();
    std::fs::write(&target, &before).unwrap();
    assert_eq!(engine.save_latest(handle, "kept.png").unwrap().key(), "kept.png");
    assert_eq!(engine.fetch_bytes("kept.png").unwrap(), before);
}

#[test]
fn save_copies_bytes_in_a_dir_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DirStore::open(dir.path()).unwrap());
    let engine = Engine::new(EngineConfig::default(), store.clone());
    let handle = engine.load_buffer(PixelBuffer::filled(3, 2, [9, 8, 7]).unwrap(), "x.png");
    let preview = engine.adjust(handle, &blue(-9)).unwrap();
    engine.save_result(&preview, "exports/final.bmp").unwrap();

    let on_disk = std::fs::read(dir.path().join("exports").join("final.bmp")).unwrap();
    assert_eq!(on_disk, engine.fetch_bytes(preview.key()).unwrap());
    assert_eq!(decode(&on_disk).pixel(0, 0), Some([0, 8, 7]));
}
