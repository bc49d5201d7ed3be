use super::*;
use backdex_protocol::BackupState;
use chrono::{TimeZone, Utc};

fn record(path: &str) -> FileRecord {
    FileRecord {
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        parent_path: "/data".to_string(),
        size: 42,
        is_dir: false,
        mod_time: Utc.timestamp_opt(1_650_000_000, 0).unwrap(),
        mode: 0o100600,
        mode_string: "-rw-------".to_string(),
        backup_state: BackupState::NoBackup,
        revision: 1,
    }
}

#[test]
fn missing_snapshot_is_an_empty_index() {
    let tmp = tempfile::tempdir().unwrap();
    let records = read_snapshot(&tmp.path().join("snapshot.bin")).expect("read");
    assert!(records.is_empty());
}

#[test]
fn atomic_snapshot_is_readable_and_leaves_no_temp_files() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("idx").join("snapshot.bin");
    let records = vec![record("/data/a"), record("/data/b")];

    write_snapshot_atomic(&path, &records).expect("write");

    assert_eq!(read_snapshot(&path).expect("read"), records);
    let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
    assert_eq!(entries.len(), 1, "only snapshot.bin should remain");
}

#[test]
fn damaged_snapshots_are_reported_corrupt() {
    let mut good = Vec::new();
    write_snapshot_to(&mut good, &[record("/data/a")]).unwrap();
    let path = Path::new("snapshot.bin");

    let mut bad_magic = good.clone();
    bad_magic[0] = b'X';

    let mut bad_version = good.clone();
    bad_version[4] = 99;

    let mut flipped_payload = good.clone();
    let last = flipped_payload.len() - 1;
    flipped_payload[last] ^= 0xFF;

    let cases: &[(&str, &[u8])] = &[
        ("bad magic", &bad_magic),
        ("format version", &bad_version),
        ("checksum", &flipped_payload),
        ("truncated", &good[..10]),
    ];

    for (expected, bytes) in cases {
        let err = decode_snapshot(path, bytes).unwrap_err();
        assert!(
            matches!(&err, StoreError::Corrupt { reason, .. } if reason.contains(expected)),
            "{expected}: got {err}"
        );
    }
}

#[test]
fn frames_decode_in_order() {
    let mut bytes = encode_frame(&JournalEntry::Put(record("/data/a"))).unwrap();
    bytes.extend(encode_frame(&JournalEntry::Delete("/data/a".into())).unwrap());

    let replay = decode_frames(&bytes);

    assert_eq!(
        replay.entries,
        vec![
            JournalEntry::Put(record("/data/a")),
            JournalEntry::Delete("/data/a".into())
        ]
    );
    assert_eq!(replay.valid_len, bytes.len());
    assert!(replay.torn.is_none());
}

#[test]
fn torn_tail_stops_at_last_intact_frame() {
    let first = encode_frame(&JournalEntry::Put(record("/data/a"))).unwrap();
    let second = encode_frame(&JournalEntry::Put(record("/data/b"))).unwrap();

    let mut bytes = first.clone();
    bytes.extend_from_slice(&second[..second.len() - 3]);

    let replay = decode_frames(&bytes);
    assert_eq!(replay.entries.len(), 1);
    assert_eq!(replay.valid_len, first.len());
    assert!(replay.torn.is_some());
}

#[test]
fn checksum_mismatch_stops_replay() {
    let mut bytes = encode_frame(&JournalEntry::Delete("/data/a".into())).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    let replay = decode_frames(&bytes);
    assert!(replay.entries.is_empty());
    assert_eq!(replay.valid_len, 0);
    assert!(replay.torn.unwrap().contains("checksum"));
}
