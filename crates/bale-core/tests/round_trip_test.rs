use bale_core::{Archiver, EntryKind, Tar, TarGz, TarOptions};
use bale_testing::assertions::assert_dirs_equal;
use bale_testing::fixtures::{create_large_file, create_source_tree};
use bale_testing::{RawArchive, TestDir};
use std::fs;

fn round_trip(archiver: &dyn Archiver, archive_name: &str) {
    let test_dir = TestDir::new().unwrap();
    create_source_tree(&test_dir, "project").unwrap();
    create_large_file(&test_dir, "project", 300_000).unwrap();

    let archive = test_dir.join(archive_name);
    archiver
        .archive(&[test_dir.join("project")], &archive)
        .unwrap();

    let out = test_dir.join("out");
    archiver.unarchive(&archive, &out).unwrap();

    assert_dirs_equal(&test_dir.join("project"), &out.join("project")).unwrap();
}

#[test]
fn test_tar_round_trip() {
    round_trip(&Tar::default(), "project.tar");
}

#[test]
fn test_tar_gz_round_trip() {
    round_trip(&TarGz::default(), "project.tar.gz");
}

#[test]
fn test_tgz_round_trip_at_best_compression() {
    round_trip(
        &TarGz::new(TarOptions::default(), 9).unwrap(),
        "project.tgz",
    );
}

#[test]
fn test_several_sources_in_one_archive() {
    let test_dir = TestDir::new().unwrap();
    create_source_tree(&test_dir, "one").unwrap();
    let single = test_dir.create_file("notes.txt", b"loose file").unwrap();

    let archive = test_dir.join("bundle.tar");
    let tar = Tar::default();
    tar.archive(&[test_dir.join("one"), single], &archive).unwrap();

    let out = test_dir.join("out");
    tar.unarchive(&archive, &out).unwrap();

    assert_dirs_equal(&test_dir.join("one"), &out.join("one")).unwrap();
    assert_eq!(fs::read(out.join("notes.txt")).unwrap(), b"loose file");
}

#[test]
fn test_inspect_reports_kinds_and_sizes() {
    let test_dir = TestDir::new().unwrap();
    create_source_tree(&test_dir, "project").unwrap();
    let archive = test_dir.join("project.tar.gz");
    let tar_gz = TarGz::default();
    tar_gz.archive(&[test_dir.join("project")], &archive).unwrap();

    let infos = tar_gz.inspect(&archive).unwrap();
    let readme = infos
        .iter()
        .find(|info| info.name == "project/README.md")
        .unwrap();
    assert_eq!(readme.kind, EntryKind::RegularFile);
    assert_eq!(readme.size, 39);

    let empty = infos
        .iter()
        .find(|info| info.name.trim_end_matches('/') == "project/empty")
        .unwrap();
    assert_eq!(empty.kind, EntryKind::Directory);
    assert_eq!(empty.size, 0);
    assert!(infos.iter().all(|info| info.name.starts_with("project")));
}

#[test]
fn test_modification_time_is_restored() {
    let test_dir = TestDir::new().unwrap();
    let file = test_dir.create_file("dated/old.txt", b"old").unwrap();
    let mtime = filetime::FileTime::from_unix_time(1_000_000_000, 0);
    filetime::set_file_mtime(&file, mtime).unwrap();

    let archive = test_dir.join("dated.tar");
    let tar = Tar::default();
    tar.archive(&[test_dir.join("dated")], &archive).unwrap();
    tar.unarchive(&archive, &test_dir.join("out")).unwrap();

    let restored = fs::metadata(test_dir.join("out/dated/old.txt")).unwrap();
    assert_eq!(
        filetime::FileTime::from_last_modification_time(&restored).unix_seconds(),
        1_000_000_000
    );
}

#[cfg(unix)]
#[test]
fn test_permissions_round_trip() {
    use bale_testing::assertions::assert_file_permissions;
    use std::os::unix::fs::PermissionsExt;

    let test_dir = TestDir::new().unwrap();
    let script = test_dir.create_file("perm/run.sh", b"#!/bin/sh\n").unwrap();
    let secret = test_dir.create_file("perm/secret", b"k").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o600)).unwrap();

    let archive = test_dir.join("perm.tar");
    let tar = Tar::default();
    tar.archive(&[test_dir.join("perm")], &archive).unwrap();
    tar.unarchive(&archive, &test_dir.join("out")).unwrap();

    assert_file_permissions(&test_dir.join("out/perm/run.sh"), 0o755).unwrap();
    assert_file_permissions(&test_dir.join("out/perm/secret"), 0o600).unwrap();
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_stored_not_followed() {
    use bale_testing::fixtures::create_symlink_structure;

    let test_dir = TestDir::new().unwrap();
    create_symlink_structure(&test_dir, "links").unwrap();

    let archive = test_dir.join("links.tar");
    let tar = Tar::default();
    tar.archive(&[test_dir.join("links")], &archive).unwrap();

    let infos = tar.inspect(&archive).unwrap();
    let link = infos
        .iter()
        .find(|info| info.name == "links/subdir/link_to_parent_file.txt")
        .unwrap();
    assert_eq!(link.kind, EntryKind::Symlink);
    assert_eq!(link.link_target.as_deref(), Some("../file1.txt"));

    tar.unarchive(&archive, &test_dir.join("out")).unwrap();
    assert_dirs_equal(&test_dir.join("links"), &test_dir.join("out/links")).unwrap();
    assert_eq!(
        fs::read(test_dir.join("out/links/subdir/link_to_parent_file.txt")).unwrap(),
        b"Original file"
    );
}

#[cfg(unix)]
#[test]
fn test_hard_links_share_an_inode() {
    use std::os::unix::fs::MetadataExt;

    let test_dir = TestDir::new().unwrap();
    let bytes = RawArchive::new()
        .dir("data/")
        .unwrap()
        .file("data/original.txt", b"shared")
        .unwrap()
        .hard_link("data/alias.txt", "data/original.txt")
        .unwrap()
        .into_bytes()
        .unwrap();
    let archive = test_dir.write_archive("links.tar", &bytes).unwrap();

    let out = test_dir.join("out");
    Tar::default().unarchive(&archive, &out).unwrap();

    let original = fs::metadata(out.join("data/original.txt")).unwrap();
    let alias = fs::metadata(out.join("data/alias.txt")).unwrap();
    assert_eq!(original.ino(), alias.ino());
    assert_eq!(fs::read(out.join("data/alias.txt")).unwrap(), b"shared");
}

#[cfg(unix)]
#[test]
fn test_packed_hard_links_round_trip() {
    use std::os::unix::fs::MetadataExt;

    let test_dir = TestDir::new().unwrap();
    let original = test_dir.create_file("data/original.txt", b"shared").unwrap();
    fs::hard_link(&original, test_dir.join("data/alias.txt")).unwrap();

    let archive = test_dir.join("links.tar.gz");
    let tar_gz = TarGz::default();
    tar_gz.archive(&[test_dir.join("data")], &archive).unwrap();

    let kinds: Vec<(String, EntryKind, Option<String>)> = tar_gz
        .inspect(&archive)
        .unwrap()
        .into_iter()
        .filter(|info| !info.kind.is_dir())
        .map(|info| (info.name, info.kind, info.link_target))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("data/alias.txt".to_string(), EntryKind::RegularFile, None),
            (
                "data/original.txt".to_string(),
                EntryKind::HardLink,
                Some("data/alias.txt".to_string())
            ),
        ]
    );

    let out = test_dir.join("out");
    tar_gz.unarchive(&archive, &out).unwrap();
    let first = fs::metadata(out.join("data/alias.txt")).unwrap();
    let second = fs::metadata(out.join("data/original.txt")).unwrap();
    assert_eq!(first.ino(), second.ino());
    assert_eq!(fs::read(out.join("data/original.txt")).unwrap(), b"shared");
}

#[test]
fn test_archive_inside_source_is_skipped() {
    let test_dir = TestDir::new().unwrap();
    create_source_tree(&test_dir, "project").unwrap();

    let archive = test_dir.join("project/self.tar");
    let tar = Tar::default();
    tar.archive(&[test_dir.join("project")], &archive).unwrap();

    let infos = tar.inspect(&archive).unwrap();
    assert!(infos.iter().all(|info| info.name != "project/self.tar"));
}
