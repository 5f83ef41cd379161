use bale_core::{archiver_for_path, Archiver, Config, EntryKind, Error, Tar, TarGz, TarOptions};
use bale_testing::{RawArchive, TestDir};
use std::fs;
use std::io::Read;
use std::ops::ControlFlow;

fn lenient() -> TarOptions {
    TarOptions {
        continue_on_error: true,
        ..TarOptions::default()
    }
}

#[test]
fn test_existing_destination_is_left_untouched() {
    let test_dir = TestDir::new().unwrap();
    test_dir.create_file("src/a.txt", b"a").unwrap();
    let destination = test_dir.create_file("out.tar", b"precious").unwrap();

    let err = Tar::default()
        .archive(&[test_dir.join("src")], &destination)
        .unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));
    assert_eq!(fs::read(&destination).unwrap(), b"precious");
}

#[test]
fn test_overwrite_replaces_destination_and_files() {
    let test_dir = TestDir::new().unwrap();
    test_dir.create_file("src/a.txt", b"new").unwrap();
    let destination = test_dir.create_file("out.tar", b"stale").unwrap();
    let options = TarOptions {
        overwrite_existing: true,
        ..TarOptions::default()
    };
    let tar = Tar::new(options);

    tar.archive(&[test_dir.join("src")], &destination).unwrap();
    test_dir.create_file("out/src/a.txt", b"old").unwrap();
    tar.unarchive(&destination, &test_dir.join("out")).unwrap();

    assert_eq!(fs::read(test_dir.join("out/src/a.txt")).unwrap(), b"new");
}

#[test]
fn test_unpack_refuses_to_overwrite_by_default() {
    let test_dir = TestDir::new().unwrap();
    test_dir.create_file("src/a.txt", b"new").unwrap();
    let archive = test_dir.join("out.tar");
    let tar = Tar::default();
    tar.archive(&[test_dir.join("src")], &archive).unwrap();
    test_dir.create_file("out/src/a.txt", b"old").unwrap();

    let err = tar.unarchive(&archive, &test_dir.join("out")).unwrap_err();
    assert!(matches!(err, Error::FileExists(_)));
    assert_eq!(fs::read(test_dir.join("out/src/a.txt")).unwrap(), b"old");

    Tar::new(lenient())
        .unarchive(&archive, &test_dir.join("out"))
        .unwrap();
    assert_eq!(fs::read(test_dir.join("out/src/a.txt")).unwrap(), b"old");
}

#[test]
fn test_unknown_type_flag_is_fatal_even_when_lenient() {
    let test_dir = TestDir::new().unwrap();
    let bytes = RawArchive::new()
        .file("a.txt", b"a")
        .unwrap()
        .typed("weird", b'Z', b"payload")
        .unwrap()
        .file("b.txt", b"b")
        .unwrap()
        .into_bytes()
        .unwrap();
    let archive = test_dir.write_archive("weird.tar", &bytes).unwrap();

    let err = Tar::new(lenient())
        .unarchive(&archive, &test_dir.join("out"))
        .unwrap_err();
    match err {
        Error::UnknownTypeFlag { name, flag } => {
            assert_eq!(name, "weird");
            assert_eq!(flag, 'Z');
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(test_dir.join("out/a.txt").exists());
    assert!(!test_dir.join("out/b.txt").exists());
}

#[test]
fn test_walk_skips_global_header_and_reads_content() {
    let test_dir = TestDir::new().unwrap();
    let bytes = RawArchive::new()
        .global_header(&[("comment", "deadbeef")])
        .unwrap()
        .file("hello.txt", b"hello")
        .unwrap()
        .into_gzip_bytes()
        .unwrap();
    let archive = test_dir.write_archive("hello.tar.gz", &bytes).unwrap();

    let mut seen = Vec::new();
    TarGz::default()
        .walk(&archive, &mut |entry| {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            seen.push((entry.name().to_string(), entry.kind(), content));
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();

    assert_eq!(
        seen,
        vec![(
            "hello.txt".to_string(),
            EntryKind::RegularFile,
            "hello".to_string()
        )]
    );
}

#[test]
fn test_walk_visitor_errors_follow_policy() {
    let test_dir = TestDir::new().unwrap();
    let bytes = RawArchive::new()
        .file("a.txt", b"a")
        .unwrap()
        .file("b.txt", b"b")
        .unwrap()
        .into_bytes()
        .unwrap();
    let archive = test_dir.write_archive("two.tar", &bytes).unwrap();

    let mut visits = 0;
    let result = Tar::default().walk(&archive, &mut |_| {
        visits += 1;
        Err(Error::NotFound("visitor gave up".to_string()))
    });
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(visits, 1);

    Tar::new(lenient())
        .walk(&archive, &mut |_| {
            visits += 1;
            Err(Error::NotFound("visitor gave up".to_string()))
        })
        .unwrap();
    assert_eq!(visits, 3);

    let err = Tar::new(lenient())
        .walk(&archive, &mut |_| Err(Error::Format("broken".to_string())))
        .unwrap_err();
    assert!(matches!(err, Error::Format(_)));
}

#[test]
fn test_plain_bytes_are_not_gzip() {
    let test_dir = TestDir::new().unwrap();
    let bytes = RawArchive::new()
        .file("a.txt", b"a")
        .unwrap()
        .into_bytes()
        .unwrap();
    let archive = test_dir.write_archive("fake.tar.gz", &bytes).unwrap();

    let err = TarGz::default()
        .unarchive(&archive, &test_dir.join("out"))
        .unwrap_err();
    assert!(matches!(err, Error::Format(_)));
}

#[test]
fn test_truncated_archive_is_a_format_error() {
    let test_dir = TestDir::new().unwrap();
    let mut bytes = RawArchive::new()
        .file("big.bin", &[7u8; 4096])
        .unwrap()
        .into_bytes()
        .unwrap();
    bytes.truncate(1024);
    let archive = test_dir.write_archive("cut.tar", &bytes).unwrap();

    let err = Tar::default()
        .unarchive(&archive, &test_dir.join("out"))
        .unwrap_err();
    assert!(
        matches!(err, Error::Format(_) | Error::Io(_) | Error::PathIo { .. }),
        "{}",
        err
    );
}

#[test]
fn test_missing_source_follows_policy() {
    let test_dir = TestDir::new().unwrap();
    test_dir.create_file("real/a.txt", b"a").unwrap();
    let sources = [test_dir.join("missing"), test_dir.join("real")];

    let err = Tar::default()
        .archive(&sources, &test_dir.join("strict.tar"))
        .unwrap_err();
    assert!(matches!(err, Error::PathIo { .. }));

    let archive = test_dir.join("lenient.tar");
    let tar = Tar::new(lenient());
    tar.archive(&sources, &archive).unwrap();
    let infos = tar.inspect(&archive).unwrap();
    assert!(infos.iter().any(|info| info.name == "real/a.txt"));
}

#[test]
fn test_archiver_for_path_uses_config() {
    let test_dir = TestDir::new().unwrap();
    let config_path = test_dir
        .create_file(
            "config.toml",
            b"[tar]\nimplicit_top_level_folder = true\n[gzip]\nlevel = 1\n",
        )
        .unwrap();
    let config = Config::load_from(&config_path).unwrap();

    let first = test_dir.create_file("in/first.txt", b"1").unwrap();
    let second = test_dir.create_file("in/second.txt", b"2").unwrap();
    let archive = test_dir.join("pair.tgz");

    let archiver = archiver_for_path(&archive, &config).unwrap();
    assert_eq!(archiver.format_name(), "tar.gz");
    archiver.archive(&[first, second], &archive).unwrap();

    let names: Vec<String> = archiver
        .inspect(&archive)
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(names, ["pair/first.txt", "pair/second.txt"]);
}
