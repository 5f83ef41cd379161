//! Common test fixtures for bale testing

use crate::TestDir;
use anyhow::Result;

/// Creates a small project tree under `root/`
///
/// ```text
/// root/README.md
/// root/src/main.rs
/// root/src/modules/mod.rs
/// root/assets/logo.bin
/// root/empty/
/// ```
pub fn create_source_tree(test_dir: &TestDir, root: &str) -> Result<()> {
    test_dir.create_file(
        &format!("{}/README.md", root),
        b"# Test Archive\n\nThis is a test archive.",
    )?;
    test_dir.create_file(&format!("{}/src/main.rs", root), b"fn main() {}")?;
    test_dir.create_file(&format!("{}/src/modules/mod.rs", root), b"pub mod utils;")?;
    test_dir.create_file(
        &format!("{}/assets/logo.bin", root),
        &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
    )?;
    test_dir.create_dir(&format!("{}/empty", root))?;
    Ok(())
}

/// Creates `root/` holding one file large enough to span many tar blocks
pub fn create_large_file(test_dir: &TestDir, root: &str, size: usize) -> Result<()> {
    let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    test_dir.create_file(&format!("{}/large.bin", root), &content)?;
    Ok(())
}

/// Creates `root/` with relative symlinks that stay inside it (Unix only)
#[cfg(unix)]
pub fn create_symlink_structure(test_dir: &TestDir, root: &str) -> Result<()> {
    test_dir.create_file(&format!("{}/file1.txt", root), b"Original file")?;
    test_dir.create_dir(&format!("{}/subdir", root))?;

    test_dir.create_symlink(&format!("{}/link_to_file1.txt", root), "file1.txt")?;
    test_dir.create_symlink(
        &format!("{}/subdir/link_to_parent_file.txt", root),
        "../file1.txt",
    )?;
    Ok(())
}
