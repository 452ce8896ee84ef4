use std::{format, string::ToString, vec, vec::Vec};

use super::{
    le_u32, DirEntry, EntryKind, FsError, MountOptions, MutationPolicy, ShortName, Volume,
    FAT32_EOC, FAT_ENTRY_MASK,
};
use crate::block::{BlockError, BLOCK_SIZE};
use crate::host::{format_volume, RamDisk};

fn disk(total_blocks: u32, blocks_per_cluster: u8) -> RamDisk {
    let mut disk = RamDisk::new(total_blocks);
    format_volume(&mut disk, total_blocks, blocks_per_cluster).unwrap();
    disk
}

fn mount(disk: RamDisk) -> Volume<RamDisk> {
    Volume::mount(disk, MountOptions::default()).unwrap()
}

fn raw_fat_entry(volume: &Volume<RamDisk>, copy: u32, cluster: u32) -> u32 {
    let geometry = volume.geometry();
    let index = geometry.fat_begin + copy * geometry.blocks_per_fat + cluster / 128;
    le_u32(volume.device().block(index), (cluster % 128) as usize * 4)
}

fn fat_entry(volume: &Volume<RamDisk>, cluster: u32) -> u32 {
    raw_fat_entry(volume, 0, cluster) & FAT_ENTRY_MASK
}

fn chain(volume: &Volume<RamDisk>, first: u32) -> Vec<u32> {
    let mut clusters = vec![first];
    loop {
        let next = fat_entry(volume, clusters[clusters.len() - 1]);
        if next >= FAT32_EOC {
            return clusters;
        }
        assert!(next >= 2, "chain of {} hits free entry", first);
        clusters.push(next);
    }
}

/// Decoded slots of a directory chain, in order, up to and including the
/// first end-of-directory slot.
fn directory_slots(volume: &Volume<RamDisk>, first: u32) -> Vec<DirEntry> {
    let geometry = *volume.geometry();
    let mut slots = Vec::new();
    for cluster in chain(volume, first) {
        for block in 0..geometry.blocks_per_cluster {
            let raw = volume.device().block(geometry.cluster_block(cluster) + block);
            for slot in raw.chunks(32) {
                let entry = DirEntry::decode(slot);
                slots.push(entry);
                if entry.kind == EntryKind::EndOfDirectory {
                    return slots;
                }
            }
        }
    }
    slots
}

fn pattern(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|idx| ((idx * 31 + seed) % 251) as u8).collect()
}

fn write_file(volume: &mut Volume<RamDisk>, name: &str, data: &[u8], chunk: usize) {
    let mut writer = volume.start_new(name).unwrap();
    for part in data.chunks(chunk) {
        writer.append(part).unwrap();
    }
    assert_eq!(writer.finish().unwrap(), data.len() as u32);
}

fn read_all(volume: &mut Volume<RamDisk>, name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    volume
        .read_file(name, |chunk| out.extend_from_slice(chunk))
        .unwrap();
    out
}

fn names(volume: &mut Volume<RamDisk>) -> Vec<std::string::String> {
    let mut out = Vec::new();
    volume.list(|entry| out.push(entry.name.to_string())).unwrap();
    out
}

#[test]
fn mount_reads_partition_geometry() {
    let volume = mount(disk(1032, 1));
    let geometry = volume.geometry();
    assert_eq!(geometry.partition_begin, 8);
    assert_eq!(geometry.fat_begin, 40);
    assert_eq!(geometry.blocks_per_fat, 8);
    assert_eq!(geometry.fat_count, 2);
    assert_eq!(geometry.cluster_begin, 56);
    assert_eq!(geometry.root_cluster, 2);
    assert_eq!(geometry.blocks_per_cluster, 1);
    assert_eq!(geometry.cluster_count, 976);
    assert_eq!(volume.current_directory(), 2);
    assert_eq!(geometry.resolve(0), 2);
    assert_eq!(geometry.cluster_block(0), 56);
}

#[test]
fn mount_rejects_bad_layouts() {
    let mut no_mbr = disk(1032, 1);
    no_mbr.block_mut(0)[510] = 0;
    assert_eq!(
        Volume::mount(no_mbr, MountOptions::default()).err(),
        Some(FsError::BadSignature)
    );

    let mut ntfs = disk(1032, 1);
    ntfs.block_mut(0)[446 + 4] = 0x07;
    assert_eq!(
        Volume::mount(ntfs, MountOptions::default()).err(),
        Some(FsError::UnsupportedPartitionType(0x07))
    );

    let second = MountOptions {
        partition: 1,
        ..MountOptions::default()
    };
    assert_eq!(
        Volume::mount(disk(1032, 1), second).err(),
        Some(FsError::UnsupportedPartitionType(0))
    );

    let mut big_sectors = disk(1032, 1);
    big_sectors.block_mut(8)[0x0B..0x0D].copy_from_slice(&1024u16.to_le_bytes());
    assert_eq!(
        Volume::mount(big_sectors, MountOptions::default()).err(),
        Some(FsError::UnsupportedSectorSize(1024))
    );

    let mut no_boot_signature = disk(1032, 1);
    no_boot_signature.block_mut(8)[511] = 0;
    assert_eq!(
        Volume::mount(no_boot_signature, MountOptions::default()).err(),
        Some(FsError::BadSignature)
    );
}

#[test]
fn mount_tolerates_single_table() {
    let mut single = disk(1032, 1);
    single.block_mut(8)[0x10] = 1;
    let volume = mount(single);
    assert_eq!(volume.geometry().fat_count, 1);
    assert_eq!(volume.geometry().cluster_begin, 48);
}

#[test]
fn short_names_normalize() {
    let cases: [(&str, &[u8; 11]); 10] = [
        ("hello.txt", b"HELLO   TXT"),
        ("log", b"LOG        "),
        ("toolongname.jpeg", b"TOOLONGNJPE"),
        ("a b+c.t!t", b"A_B_C   T_T"),
        ("x~1.k%", b"X~1     K_ "),
        (".hidden", b".HIDDEN    "),
        ("v1.2.3", b"V1      2_3"),
        ("\u{e9}.txt", b"_       TXT"),
        (".", b".          "),
        ("..", b"..         "),
    ];
    for (input, expected) in cases {
        let name = ShortName::new(input);
        assert_eq!(name.as_bytes(), expected, "input {:?}", input);
        assert!(name
            .as_bytes()
            .iter()
            .all(|&byte| byte.is_ascii_uppercase()
                || byte.is_ascii_digit()
                || b"._~ ".contains(&byte)));
    }
    assert!(ShortName::new("").is_blank());
    assert_eq!(ShortName::new("hello.txt").to_string(), "HELLO.TXT");
    assert_eq!(ShortName::new("log").to_string(), "LOG");
}

#[test]
fn short_name_leading_numbers() {
    assert_eq!(ShortName::new("12").leading_number(), Some(12));
    assert_eq!(ShortName::new("7.txt").leading_number(), Some(7));
    assert_eq!(ShortName::new("123abc").leading_number(), Some(123));
    assert_eq!(ShortName::new("123456789").leading_number(), Some(12_345_678));
    assert_eq!(ShortName::new("ABCDEFGH").leading_number(), None);
}

#[test]
fn directory_slots_decode() {
    let mut raw = [0u8; 32];
    raw[..11].copy_from_slice(b"DATA    BIN");
    raw[11] = 0x20;
    raw[0x14..0x16].copy_from_slice(&1u16.to_le_bytes());
    raw[0x1A..0x1C].copy_from_slice(&2u16.to_le_bytes());
    raw[0x1C..0x20].copy_from_slice(&0x1234u32.to_le_bytes());
    let entry = DirEntry::decode(&raw);
    assert_eq!(entry.kind, EntryKind::Regular);
    assert_eq!(entry.cluster, 0x0001_0002);
    assert_eq!(entry.size, 0x1234);
    assert!(entry.is_file());

    raw[11] = 0x0F;
    assert_eq!(DirEntry::decode(&raw).kind, EntryKind::LongNameFragment);
    raw[11] = 0x08;
    assert_eq!(DirEntry::decode(&raw).kind, EntryKind::VolumeLabel);
    raw[0] = 0xE5;
    assert_eq!(DirEntry::decode(&raw).kind, EntryKind::Deleted);
    raw[0] = 0x00;
    assert_eq!(DirEntry::decode(&raw).kind, EntryKind::EndOfDirectory);
}

#[test]
fn create_adds_placeholder_entry() {
    let mut volume = mount(disk(1032, 1));
    volume.create("data.bin").unwrap();
    let entry = volume.lookup("DATA.BIN").unwrap().unwrap();
    assert_eq!(entry.kind, EntryKind::Regular);
    assert_eq!(entry.attr, 0);
    assert_eq!(entry.size, 0);
    assert_eq!(entry.cluster, 0x0FFF_FFFF);
    assert!(volume.exists("data.bin").unwrap());
    assert!(!volume.exists("nope").unwrap());

    // No duplicate check.
    volume.create("data.bin").unwrap();
    assert_eq!(names(&mut volume), vec!["DATA.BIN", "DATA.BIN"]);
}

#[test]
fn highest_numeric_name_takes_the_maximum() {
    let mut volume = mount(disk(1032, 1));
    assert_eq!(volume.highest_numeric_name().unwrap(), 0);
    for name in ["7", "12", "ABCDEFGH"] {
        volume.create(name).unwrap();
    }
    assert_eq!(volume.highest_numeric_name().unwrap(), 12);
}

#[test]
fn delete_frees_every_cluster_and_marks_one_slot() {
    let mut volume = mount(disk(1032, 1));
    volume.create("keep.txt").unwrap();
    write_file(&mut volume, "big.dat", &pattern(3 * 512 + 10, 1), 100);

    let first = volume.lookup("big.dat").unwrap().unwrap().cluster;
    let clusters = chain(&volume, first);
    assert_eq!(clusters.len(), 4);

    volume.delete("big.dat").unwrap();
    for &cluster in &clusters {
        assert_eq!(raw_fat_entry(&volume, 0, cluster), 0);
        assert_eq!(raw_fat_entry(&volume, 1, cluster), 0);
    }
    assert!(!volume.exists("big.dat").unwrap());
    assert!(volume.exists("keep.txt").unwrap());

    let root = directory_slots(&volume, 2);
    let deleted = root
        .iter()
        .filter(|entry| entry.kind == EntryKind::Deleted)
        .count();
    assert_eq!(deleted, 1);
    assert_eq!(root[1].kind, EntryKind::Deleted);

    // The freed slot is the first one reused.
    volume.create("new").unwrap();
    assert_eq!(directory_slots(&volume, 2)[1].name, ShortName::new("new"));
}

#[test]
fn delete_ignores_directories_and_missing_names() {
    let mut volume = mount(disk(1032, 1));
    volume.make_directory("d").unwrap();
    volume.delete("d").unwrap();
    assert!(volume.exists("d").unwrap());
    volume.delete("missing").unwrap();
}

#[test]
fn rename_rewrites_the_name_in_place() {
    let mut volume = mount(disk(1032, 1));
    volume.create("old.txt").unwrap();
    volume.rename("old.txt", "new.txt").unwrap();
    assert!(volume.exists("NEW.TXT").unwrap());
    assert!(!volume.exists("old.txt").unwrap());

    volume.rename("new.txt", "").unwrap();
    assert!(volume.exists("new.txt").unwrap());
    volume.rename("absent", "other").unwrap();
    assert!(!volume.exists("other").unwrap());
}

#[test]
fn files_round_trip_across_block_and_cluster_edges() {
    let mut volume = mount(disk(2056, 4));
    assert_eq!(volume.geometry().cluster_bytes(), 2048);

    for (idx, (size, clusters)) in [(512usize, 1usize), (2048, 1), (2049, 2)]
        .into_iter()
        .enumerate()
    {
        let name = format!("f{}.bin", idx);
        let data = pattern(size, idx);
        write_file(&mut volume, &name, &data, 37);
        assert_eq!(read_all(&mut volume, &name), data);

        let entry = volume.lookup(&name).unwrap().unwrap();
        assert_eq!(entry.size as usize, size);
        assert_eq!(chain(&volume, entry.cluster).len(), clusters);
    }
}

#[test]
fn append_after_exact_block_starts_fresh_block() {
    let mut volume = mount(disk(1032, 1));
    write_file(&mut volume, "log.txt", &[b'a'; 512], 512);

    let mut writer = volume.start_append("log.txt").unwrap();
    assert_eq!(writer.len(), 512);
    writer.append(b"bc").unwrap();
    assert_eq!(writer.finish().unwrap(), 514);

    let mut expected = vec![b'a'; 512];
    expected.extend_from_slice(b"bc");
    assert_eq!(read_all(&mut volume, "log.txt"), expected);

    let first = volume.lookup("log.txt").unwrap().unwrap().cluster;
    let clusters = chain(&volume, first);
    assert_eq!(clusters.len(), 2);
    let data_block = volume.geometry().cluster_block(clusters[0]);
    assert_eq!(volume.device().block(data_block), &[b'a'; BLOCK_SIZE]);
}

#[test]
fn append_mid_block_grows_the_chain() {
    let mut volume = mount(disk(1032, 2));
    let head = pattern(700, 3);
    let tail = pattern(3000, 9);
    write_file(&mut volume, "track.csv", &head, 64);

    let mut writer = volume.start_append("track.csv").unwrap();
    for part in tail.chunks(100) {
        writer.append(part).unwrap();
    }
    assert_eq!(writer.finish().unwrap(), 3700);

    let mut expected = head.clone();
    expected.extend_from_slice(&tail);
    assert_eq!(read_all(&mut volume, "track.csv"), expected);
    let first = volume.lookup("track.csv").unwrap().unwrap().cluster;
    assert_eq!(chain(&volume, first).len(), 4);
}

#[test]
fn writer_start_errors() {
    let mut volume = mount(disk(1032, 1));
    assert_eq!(volume.start_append("missing").err(), Some(FsError::NotFound));

    volume.create("empty").unwrap();
    assert_eq!(volume.start_append("empty").err(), Some(FsError::Empty));
    assert_eq!(volume.start_new("empty").err(), Some(FsError::AlreadyExists));

    volume.make_directory("dir").unwrap();
    assert_eq!(volume.start_append("dir").err(), Some(FsError::NotFound));
}

#[test]
fn read_file_handles_missing_and_empty() {
    let mut volume = mount(disk(1032, 1));
    assert_eq!(
        volume.read_file("missing", |_| {}),
        Err(FsError::NotFound)
    );
    volume.create("empty").unwrap();
    let mut calls = 0;
    assert_eq!(volume.read_file("empty", |_| calls += 1), Ok(0));
    assert_eq!(calls, 0);
}

#[test]
fn list_skips_deleted_entries() {
    let mut volume = mount(disk(1032, 1));
    for name in ["a", "b", "c"] {
        volume.create(name).unwrap();
    }
    volume.delete("b").unwrap();
    assert_eq!(names(&mut volume), vec!["A", "C"]);
}

#[test]
fn make_directory_lays_out_dot_entries() {
    let mut volume = mount(disk(1032, 1));
    volume.make_directory("logs").unwrap();
    assert_eq!(volume.current_directory(), 2);
    assert_eq!(
        volume.make_directory("LOGS").err(),
        Some(FsError::AlreadyExists)
    );

    let entry = volume.lookup("logs").unwrap().unwrap();
    assert!(entry.is_dir());
    let logs = entry.cluster;

    let slots = directory_slots(&volume, logs);
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0].name, ShortName::DOT);
    assert_eq!(slots[0].cluster, logs);
    assert!(slots[0].is_dir());
    assert_eq!(slots[1].name, ShortName::DOTDOT);
    assert_eq!(slots[1].cluster, 0);
    assert_eq!(slots[2].kind, EntryKind::EndOfDirectory);

    volume.change_directory("logs").unwrap();
    assert_eq!(volume.current_directory(), logs);
    volume.make_directory("inner").unwrap();
    let inner = volume.lookup("inner").unwrap().unwrap().cluster;
    assert_eq!(directory_slots(&volume, inner)[1].cluster, logs);

    volume.change_directory("inner").unwrap();
    volume.change_directory("..").unwrap();
    assert_eq!(volume.current_directory(), logs);
    volume.change_directory("..").unwrap();
    assert_eq!(volume.current_directory(), 2);

    assert_eq!(volume.change_directory("nope"), Err(FsError::NotFound));
    volume.create("plain").unwrap();
    assert_eq!(volume.change_directory("plain"), Err(FsError::NotFound));
}

#[test]
fn make_directory_clears_a_reused_cluster() {
    let mut volume = mount(disk(2056, 4));
    write_file(&mut volume, "junk", &[0xAA; 4 * 512], 512);
    let junk = volume.lookup("junk").unwrap().unwrap().cluster;
    volume.delete("junk").unwrap();

    volume.make_directory("d").unwrap();
    let dir = volume.lookup("d").unwrap().unwrap().cluster;
    assert_eq!(dir, junk);
    let first = volume.geometry().cluster_block(dir);
    for block in 1..4 {
        assert_eq!(volume.device().block(first + block), &[0u8; BLOCK_SIZE]);
    }
    assert!(volume.device().block(first)[64..]
        .iter()
        .all(|&byte| byte == 0));
}

#[test]
fn directory_grows_past_its_first_cluster() {
    let mut volume = mount(disk(1032, 1));
    for idx in 0..20 {
        volume.create(&format!("f{}", idx)).unwrap();
    }
    assert_eq!(chain(&volume, 2).len(), 2);
    for idx in 0..20 {
        assert!(volume.exists(&format!("f{}", idx)).unwrap());
    }

    let slots = directory_slots(&volume, 2);
    assert_eq!(slots.len(), 21);
    assert!(slots[..20]
        .iter()
        .all(|entry| entry.kind == EntryKind::Regular));
    assert_eq!(slots[20].kind, EntryKind::EndOfDirectory);
}

#[test]
fn terminator_moves_to_next_block_within_cluster() {
    let mut volume = mount(disk(1032, 2));
    for idx in 0..17 {
        volume.create(&format!("f{}", idx)).unwrap();
    }
    assert_eq!(chain(&volume, 2).len(), 1);
    let slots = directory_slots(&volume, 2);
    assert_eq!(slots.len(), 18);
    assert_eq!(slots[17].kind, EntryKind::EndOfDirectory);
}

#[test]
fn full_directory_without_terminator_is_extended() {
    let mut raw = disk(1032, 1);
    for (slot, chunk) in raw.block_mut(56).chunks_mut(32).enumerate() {
        let name = ShortName::new(&format!("a{}", slot));
        chunk[..11].copy_from_slice(name.as_bytes());
        chunk[11] = 0x20;
    }
    let mut volume = mount(raw);
    volume.create("x").unwrap();

    let root = chain(&volume, 2);
    assert_eq!(root.len(), 2);
    let slots = directory_slots(&volume, 2);
    assert_eq!(slots[16].name, ShortName::new("x"));
    assert_eq!(slots[17].kind, EntryKind::EndOfDirectory);
}

#[test]
fn table_copies_stay_identical() {
    let mut volume = mount(disk(1032, 1));
    write_file(&mut volume, "a.bin", &pattern(5000, 2), 300);
    volume.make_directory("d").unwrap();
    write_file(&mut volume, "b.bin", &pattern(1500, 4), 512);
    volume.delete("a.bin").unwrap();

    let geometry = *volume.geometry();
    for offset in 0..geometry.blocks_per_fat {
        let first = volume.device().block(geometry.fat_begin + offset);
        let second = volume
            .device()
            .block(geometry.fat_begin + geometry.blocks_per_fat + offset);
        assert_eq!(first, second, "table block {}", offset);
    }
}

#[test]
fn chain_release_spanning_two_table_blocks() {
    let mut volume = mount(disk(1032, 1));
    write_file(&mut volume, "long.bin", &pattern(200 * 512, 5), 4096);
    let first = volume.lookup("long.bin").unwrap().unwrap().cluster;
    let clusters = chain(&volume, first);
    assert_eq!(clusters.len(), 200);
    assert_eq!((first, clusters[199]), (3, 202));

    let before = volume.device().write_count();
    volume.delete("long.bin").unwrap();
    // Two table blocks to both copies, then the directory block.
    assert_eq!(volume.device().write_count() - before, 2 * 2 + 1);

    for cluster in clusters {
        assert_eq!(raw_fat_entry(&volume, 0, cluster), 0, "cluster {}", cluster);
        assert_eq!(raw_fat_entry(&volume, 1, cluster), 0, "cluster {}", cluster);
    }
    assert!(!volume.exists("long.bin").unwrap());
}

#[test]
fn failed_table_write_leaves_no_stale_cache() {
    for options in [MountOptions::default(), MountOptions::default().strict()] {
        let mut volume = Volume::mount(disk(1032, 1), options).unwrap();
        let a = pattern(3 * 512, 7);
        write_file(&mut volume, "a.bin", &a, 512);
        assert_eq!(chain(&volume, 3), vec![3, 4, 5]);

        volume.dev.set_fail_writes(true);
        let deleted = volume.delete("a.bin");
        volume.dev.set_fail_writes(false);
        if options.policy == MutationPolicy::Strict {
            assert_eq!(
                deleted,
                Err(FsError::Block(BlockError::WriteRejected(0x0D)))
            );
        } else {
            assert_eq!(deleted, Ok(()));
        }
        assert!(volume.exists("a.bin").unwrap());

        let b = pattern(2 * 512, 9);
        write_file(&mut volume, "b.bin", &b, 512);
        assert_eq!(volume.lookup("b.bin").unwrap().unwrap().cluster, 6);
        assert_eq!(chain(&volume, 3), vec![3, 4, 5]);

        let mut volume = Volume::mount(volume.into_device(), options).unwrap();
        assert_eq!(read_all(&mut volume, "a.bin"), a);
        assert_eq!(read_all(&mut volume, "b.bin"), b);
    }
}

#[test]
fn table_writes_keep_reserved_top_bits() {
    let mut raw = disk(1032, 1);
    for copy in 0..2 {
        raw.block_mut(40 + copy * 8)[12..16].copy_from_slice(&0xA000_0000u32.to_le_bytes());
    }
    let mut volume = mount(raw);
    volume.start_new("t").unwrap().finish().unwrap();
    assert_eq!(volume.lookup("t").unwrap().unwrap().cluster, 3);
    assert_eq!(raw_fat_entry(&volume, 0, 3), 0xAFFF_FFFF);
    assert_eq!(raw_fat_entry(&volume, 1, 3), 0xAFFF_FFFF);
}

#[test]
fn exhausted_table_reports_filesystem_full() {
    let mut volume = mount(disk(102, 1));
    assert_eq!(volume.geometry().cluster_count, 60);

    let mut writer = volume.start_new("full").unwrap();
    writer.append(&[0x55; 59 * 512]).unwrap();
    assert_eq!(writer.append(&[1]), Err(FsError::FilesystemFull));
    assert_eq!(writer.finish().unwrap(), 59 * 512);

    assert_eq!(volume.start_new("more").err(), Some(FsError::FilesystemFull));
    assert_eq!(
        volume.make_directory("dir").err(),
        Some(FsError::FilesystemFull)
    );
    assert_eq!(names(&mut volume), vec!["FULL"]);
}

#[test]
fn failed_entry_write_hands_the_cluster_back() {
    let mut volume = mount(disk(102, 1));
    assert_eq!(volume.geometry().cluster_begin, 42);
    write_file(&mut volume, "big", &pattern(58 * 512, 3), 512);
    assert_eq!(chain(&volume, 3).len(), 58);
    assert_eq!(fat_entry(&volume, 61), 0);

    // Fill the rest of the one-block root so a new entry needs a new cluster.
    for (slot, chunk) in volume.dev.block_mut(42).chunks_mut(32).enumerate().skip(1) {
        chunk.fill(0);
        chunk[..11].copy_from_slice(ShortName::new(&format!("a{}", slot)).as_bytes());
        chunk[11] = 0x20;
    }

    assert_eq!(volume.start_new("x").err(), Some(FsError::FilesystemFull));
    assert_eq!(fat_entry(&volume, 61), 0);
    assert_eq!(raw_fat_entry(&volume, 1, 61), 0);
    assert!(!volume.exists("x").unwrap());
    assert_eq!(chain(&volume, 2), vec![2]);
}

#[test]
fn default_policy_swallows_block_errors() {
    let mut volume = mount(disk(1032, 1));
    volume.create("a.txt").unwrap();
    volume.dev.set_fail_writes(true);

    assert_eq!(volume.delete("a.txt"), Ok(()));
    assert_eq!(volume.create("b.txt"), Ok(()));
    assert_eq!(volume.rename("a.txt", "c.txt"), Ok(()));
    assert_eq!(
        volume.make_directory("d").err(),
        Some(FsError::Block(BlockError::WriteRejected(0x0D)))
    );

    volume.dev.set_fail_writes(false);
    assert!(volume.exists("a.txt").unwrap());
    assert!(!volume.exists("b.txt").unwrap());
    assert!(!volume.exists("c.txt").unwrap());
}

#[test]
fn strict_policy_surfaces_block_errors() {
    let mut volume = Volume::mount(disk(1032, 1), MountOptions::default().strict()).unwrap();
    volume.create("a.txt").unwrap();
    volume.dev.set_fail_writes(true);

    let rejected = Err(FsError::Block(BlockError::WriteRejected(0x0D)));
    assert_eq!(volume.delete("a.txt"), rejected);
    assert_eq!(volume.create("b.txt"), rejected);
    assert_eq!(volume.rename("a.txt", "c.txt"), rejected);
}
