//! Integration tests for file-backed mappings

mod test_helpers;

use std::io::{Seek, SeekFrom, Write};

use kmman::{KErrorKind, MapOptions, MappedFile, ProtFlags, SyncFlags};
use test_helpers::*;

#[test]
fn test_create_write_reopen() {
    let scratch = ScratchFile(scratch_path("reopen"));
    {
        let mut file = MappedFile::create(&scratch.0, 64).unwrap();
        assert_eq!(file.len(), 64);
        assert!(file.is_shared() && file.is_file_backed());
        file.write_at(0, b"persisted").unwrap();
        file.sync(SyncFlags::SYNC).unwrap();
        file.close().unwrap();
    }

    assert_eq!(std::fs::metadata(&scratch.0).unwrap().len(), 64);
    let file = MappedFile::open(&scratch.0, ProtFlags::READ).unwrap();
    let mut buf = [0u8; 9];
    file.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"persisted");
    assert_eq!(
        std::fs::read(&scratch.0).unwrap()[..9],
        *b"persisted"
    );
}

#[test]
fn test_resize_moves_file_and_view_together() {
    let scratch = ScratchFile(scratch_path("resize"));
    let mut file = MappedFile::create(&scratch.0, 10).unwrap();
    file.write_at(0, b"0123456789").unwrap();

    assert!(file.resize(pages(3)).unwrap());
    assert!(!file.resize(pages(3)).unwrap());
    assert_eq!(std::fs::metadata(&scratch.0).unwrap().len(), pages(3) as u64);
    file.write_at(pages(3) - 4, b"tail").unwrap();

    let mut buf = [0u8; 10];
    file.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"0123456789");

    assert!(file.shrink_if_needed(5).unwrap());
    assert!(!file.shrink_if_needed(5).unwrap());
    assert_eq!(file.len(), 5);
    assert_eq!(std::fs::metadata(&scratch.0).unwrap().len(), 5);

    assert!(file.grow_if_needed(100).unwrap());
    assert!(!file.grow_if_needed(50).unwrap());
    assert_eq!(file.len(), 100);

    assert_eq!(
        file.resize(0).unwrap_err().kind(),
        KErrorKind::InvalidArgument
    );
}

#[test]
fn test_open_rejects_empty_and_missing() {
    let scratch = ScratchFile(scratch_path("empty"));
    std::fs::write(&scratch.0, b"").unwrap();
    assert_eq!(
        MappedFile::open(&scratch.0, ProtFlags::READ)
            .unwrap_err()
            .kind(),
        KErrorKind::InvalidArgument
    );

    let missing = scratch_path("missing");
    assert_eq!(
        MappedFile::open(&missing, ProtFlags::READ)
            .unwrap_err()
            .kind(),
        KErrorKind::NotFound
    );
}

#[test]
fn test_cursor_flush_reaches_file() {
    let scratch = ScratchFile(scratch_path("cursor"));
    let mut file = MappedFile::create(&scratch.0, 32).unwrap();
    {
        let mut cur = file.cursor();
        cur.seek(SeekFrom::Start(4)).unwrap();
        cur.write_all(b"through the cursor").unwrap();
        cur.flush().unwrap();
    }
    let on_disk = std::fs::read(&scratch.0).unwrap();
    assert_eq!(&on_disk[4..22], b"through the cursor");
}

#[test]
fn test_unaligned_file_offset_is_rejected() {
    let scratch = ScratchFile(scratch_path("offset"));
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&scratch.0)
        .unwrap();
    file.set_len(pages(2) as u64).unwrap();

    use std::os::fd::AsFd;
    let err = MapOptions::new(pages(1))
        .shared()
        .file(file.as_fd(), 1)
        .map()
        .unwrap_err();
    assert_eq!(err.kind(), KErrorKind::InvalidArgument);

    let err = MapOptions::new(pages(1))
        .shared()
        .file(file.as_fd(), u64::MAX - (u64::MAX % pages(1) as u64))
        .map()
        .unwrap_err();
    assert_eq!(err.kind(), KErrorKind::InvalidArgument);

    let map = MapOptions::new(pages(1))
        .shared()
        .file(file.as_fd(), pages(1) as u64)
        .map()
        .unwrap();
    drop(file);
    assert!(map.is_file_backed());
}

#[test]
fn test_remap_file_pages() {
    let scratch = ScratchFile(scratch_path("rfp"));
    let mut file = MappedFile::create(&scratch.0, pages(2)).unwrap();
    file.write_at(0, b"page zero").unwrap();
    file.write_at(pages(1), b"page one").unwrap();

    match file.remap_file_pages(0, pages(1), 1) {
        Ok(()) => {
            let mut buf = [0u8; 8];
            file.read_at(0, &mut buf).unwrap();
            assert_eq!(&buf, b"page one");
        }
        Err(e) => assert!(
            matches!(
                e.kind(),
                KErrorKind::Unsupported | KErrorKind::InvalidArgument
            ),
            "{e}"
        ),
    }

    let mut private = MapOptions::new(pages(1)).map().unwrap();
    assert_eq!(
        private.remap_file_pages(0, pages(1), 0).unwrap_err().kind(),
        KErrorKind::InvalidArgument
    );
}

#[test]
fn test_failed_resize_leaves_view_unchanged() {
    let scratch = ScratchFile(scratch_path("ro-resize"));
    std::fs::write(&scratch.0, vec![7u8; pages(2)]).unwrap();
    let mut file = MappedFile::open(&scratch.0, ProtFlags::READ).unwrap();

    // The descriptor is read-only, so the file cannot be truncated.
    assert!(file.resize(pages(1)).is_err());
    assert_eq!(file.len(), pages(2));
    let mut buf = [0u8; 4];
    file.read_at(pages(2) - 4, &mut buf).unwrap();
    assert_eq!(buf, [7u8; 4]);

    assert!(file.grow_if_needed(pages(3)).is_err());
    assert_eq!(file.len(), pages(2));
    assert_eq!(std::fs::metadata(&scratch.0).unwrap().len(), pages(2) as u64);

    assert!(file.shrink_if_needed(10).is_err());
    assert_eq!(file.len(), pages(2));
}
