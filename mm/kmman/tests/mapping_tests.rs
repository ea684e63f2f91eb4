//! Integration tests for mapping lifecycle, placement and protection

mod test_helpers;

use kmman::{
    KErrorKind, MapOptions, MlockAllFlags, ProtFlags, RemapFlags, SyncFlags, lock_all, unlock_all,
};
use memaddr::MemoryAddr;
use test_helpers::*;

// ========== Basic lifecycle ==========

#[test]
fn test_map_private_anonymous() {
    let mut map = MapOptions::new(100).map().unwrap();
    assert_eq!(map.len(), 100);
    assert_eq!(map.aligned_len(), pages(1));
    assert!(map.addr().is_aligned(kmman::page_size()));
    assert!(!map.is_shared());
    assert!(!map.is_file_backed());

    // Fresh anonymous memory reads as zero.
    let mut buf = [0xaau8; 100];
    map.read_at(0, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));

    map.write_at(0, b"kmman").unwrap();
    assert_eq!(unsafe { &map.as_slice()[..5] }, b"kmman");
    map.unmap().unwrap();
}

#[test]
fn test_hint_is_advisory() {
    let probe = MapOptions::new(pages(1)).map().unwrap();
    let taken = probe.addr();
    // The hint points at a live mapping, so the kernel must pick elsewhere.
    let other = MapOptions::new(pages(1)).hint(taken).map().unwrap();
    assert_ne!(other.addr(), taken);
}

// ========== Fixed placement ==========

#[test]
fn test_fixed_replaces_existing() {
    let mut first = MapOptions::new(pages(2)).map().unwrap();
    first.write_at(0, b"first").unwrap();
    let range = first.into_raw();

    let second = unsafe { MapOptions::new(pages(2)).map_exact_replacing(range.start) }.unwrap();
    assert_eq!(second.addr(), range.start);

    let mut buf = [0u8; 5];
    second.read_at(0, &mut buf).unwrap();
    assert_eq!(buf, [0u8; 5], "old contents survived a fixed replace");
}

#[test]
fn test_fixed_noreplace_refuses() {
    let mut existing = MapOptions::new(pages(1)).map().unwrap();
    existing.write_at(0, b"keep").unwrap();

    let err = MapOptions::new(pages(1))
        .map_exact(existing.addr())
        .unwrap_err();
    assert!(
        matches!(
            err.kind(),
            KErrorKind::InvalidArgument | KErrorKind::Unsupported
        ),
        "{err}"
    );

    let mut buf = [0u8; 4];
    existing.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"keep");
}

#[test]
fn test_fixed_requires_alignment() {
    let map = MapOptions::new(pages(1)).map().unwrap();
    let err = MapOptions::new(pages(1))
        .map_exact(map.addr().add(1))
        .unwrap_err();
    assert_eq!(err.kind(), KErrorKind::InvalidArgument);
    assert_eq!(err.errno(), None);
}

// ========== Remap ==========

#[test]
fn test_remap_in_place_blocked() {
    let mut head = MapOptions::new(pages(3)).map().unwrap();
    head.write_at(0, b"stay").unwrap();
    // The tail stays mapped right behind the head, so growth must move.
    let _tail = head.split_off(pages(2)).unwrap();
    let before = head.range();

    let err = head.remap(pages(4), RemapFlags::empty()).unwrap_err();
    assert_eq!(err.kind(), KErrorKind::OutOfAddressSpace);
    assert_eq!(head.range(), before);

    let mut buf = [0u8; 4];
    head.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"stay");
}

#[test]
fn test_remap_maymove_keeps_contents() {
    let mut head = MapOptions::new(pages(2)).map().unwrap();
    let _tail = head.split_off(pages(1)).unwrap();
    head.write_at(0, b"moving").unwrap();

    head.remap(pages(8), RemapFlags::MAYMOVE).unwrap();
    assert_eq!(head.len(), pages(8));

    let mut buf = [0u8; 6];
    head.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"moving");
    head.write_at(pages(8) - 1, b"!").unwrap();

    head.remap(pages(1), RemapFlags::empty()).unwrap();
    assert_eq!(head.aligned_len(), pages(1));
}

#[test]
fn test_remap_to_fixed_destination() {
    let mut src = MapOptions::new(pages(1)).map().unwrap();
    src.write_at(0, b"dest").unwrap();
    let dest = MapOptions::new(pages(2)).map().unwrap().into_raw();

    unsafe { src.remap_to(dest.start, pages(2)) }.unwrap();
    assert_eq!(src.addr(), dest.start);
    let mut buf = [0u8; 4];
    src.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf, b"dest");

    assert_eq!(
        src.remap(pages(1), RemapFlags::MAYMOVE | RemapFlags::FIXED)
            .unwrap_err()
            .kind(),
        KErrorKind::InvalidArgument
    );
}

// ========== Protection, sync, locking ==========

#[test]
fn test_protect_replaces_not_adds() {
    let mut map = MapOptions::new(pages(2)).map().unwrap();
    map.protect(ProtFlags::READ).unwrap();
    assert_eq!(map.prot(), ProtFlags::READ);
    map.protect(ProtFlags::READ_WRITE).unwrap();
    map.write_at(0, b"ok").unwrap();

    map.protect_range(pages(1), pages(1), ProtFlags::READ).unwrap();
    assert_eq!(map.prot(), ProtFlags::READ);
    assert_eq!(
        map.write_at(0, b"no").unwrap_err().kind(),
        KErrorKind::PermissionDenied
    );

    let err = map.protect_range(1, pages(1), ProtFlags::READ).unwrap_err();
    assert_eq!(err.kind(), KErrorKind::InvalidArgument);
    let err = map.protect_range(0, pages(3), ProtFlags::READ).unwrap_err();
    assert_eq!(err.kind(), KErrorKind::InvalidArgument);
}

#[test]
fn test_exec_without_read_is_accepted() {
    let mut map = MapOptions::new(pages(1)).map().unwrap();
    match map.protect(ProtFlags::EXEC) {
        Ok(()) => assert_eq!(map.prot(), ProtFlags::EXEC),
        // Some security modules refuse executable anonymous memory.
        Err(e) => assert_eq!(e.kind(), KErrorKind::PermissionDenied),
    }
}

#[test]
fn test_sync_flag_combinations() {
    let map = MapOptions::new(pages(1)).shared().map().unwrap();
    map.sync(SyncFlags::SYNC).unwrap();
    map.sync(SyncFlags::ASYNC | SyncFlags::INVALIDATE).unwrap();
    map.sync_range(10, 20, SyncFlags::ASYNC).unwrap();
    map.sync_range(pages(1) - 1, 1, SyncFlags::SYNC).unwrap();

    for (offset, len) in [(0, pages(1) + 1), (pages(1), 1), (usize::MAX, 2), (0, 0)] {
        let err = map.sync_range(offset, len, SyncFlags::SYNC).unwrap_err();
        assert_eq!(err.kind(), KErrorKind::InvalidArgument, "{offset:#x}+{len:#x}");
        assert_eq!(err.errno(), None);
    }

    let err = map.sync(SyncFlags::SYNC | SyncFlags::ASYNC).unwrap_err();
    assert_eq!(err.kind(), KErrorKind::InvalidArgument);
    assert_eq!(err.errno(), None);
}

#[test]
fn test_lock_unlock() {
    let map = MapOptions::new(pages(1)).map().unwrap();
    match map.lock() {
        Ok(()) => {
            assert!(map.residency().unwrap().all_resident());
            map.unlock().unwrap();
        }
        // RLIMIT_MEMLOCK may be zero in containers; mlock reports an
        // exceeded limit as ENOMEM, which reads as NotMapped.
        Err(e) => assert!(
            matches!(
                e.kind(),
                KErrorKind::ResourceExhausted
                    | KErrorKind::PermissionDenied
                    | KErrorKind::NotMapped
            ),
            "{e}"
        ),
    }
}

#[test]
fn test_lock_all() {
    assert_eq!(
        lock_all(MlockAllFlags::ONFAULT).unwrap_err().kind(),
        KErrorKind::InvalidArgument
    );
    match lock_all(MlockAllFlags::CURRENT | MlockAllFlags::ONFAULT) {
        Ok(()) => {}
        Err(e) => assert!(
            matches!(
                e.kind(),
                KErrorKind::ResourceExhausted | KErrorKind::PermissionDenied
            ),
            "{e}"
        ),
    }
    unlock_all().unwrap();
}

// ========== Huge pages ==========

#[test]
fn test_huge_tlb_mapping_unmaps_whole_huge_pages() {
    let Some(huge) = kmman::huge_page_size() else {
        return;
    };
    let map = match MapOptions::new(pages(1)).huge_tlb(true).map() {
        Ok(map) => map,
        // No huge pages reserved on this host.
        Err(e) if e.kind() == KErrorKind::OutOfAddressSpace => return,
        Err(e) => panic!("{e}"),
    };
    assert_eq!(map.granule(), huge);
    assert_eq!(map.aligned_len(), huge);
    assert!(map.addr().is_aligned(huge));
    map.unmap().unwrap();

    let mut map = MapOptions::new(2 * huge).huge_tlb(true).map().unwrap_or_else(|e| {
        assert_eq!(e.kind(), KErrorKind::OutOfAddressSpace);
        MapOptions::new(huge).huge_tlb(true).map().unwrap()
    });
    if map.len() == 2 * huge {
        assert_eq!(
            map.split_off(pages(1)).unwrap_err().kind(),
            KErrorKind::InvalidArgument
        );
        let tail = map.split_off(huge).unwrap();
        tail.unmap().unwrap();
    }
    map.unmap().unwrap();
}
