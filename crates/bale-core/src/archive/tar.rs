//! Plain tar archives

use super::handle::ArchiveHandle;
use super::{pack, tolerate, unpack, Archiver, Visitor};
use crate::config::TarOptions;
use crate::entry::Entry;
use crate::stream::{Identity, StreamWrapper};
use crate::{fsutil, paths, Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Tar archiver
///
/// All traversal logic lives here; [`super::tar_gz::TarGz`] reuses it with a
/// gzip [`StreamWrapper`].
#[derive(Debug, Clone, Default)]
pub struct Tar {
    options: TarOptions,
}

impl Tar {
    /// Create a tar archiver with the given behavior
    pub fn new(options: TarOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TarOptions {
        &self.options
    }

    /// Start writing a tar stream to `out`
    pub fn create<'a>(&self, out: impl Write + Send + 'a) -> Result<ArchiveHandle<'a>> {
        create_handle(&Identity, Box::new(out))
    }

    /// Start reading a tar stream from `input`
    pub fn open<'a>(&self, input: impl Read + Send + 'a) -> Result<ArchiveHandle<'a>> {
        open_handle(&Identity, Box::new(input))
    }

    pub(crate) fn archive_with(
        &self,
        wrapper: &dyn StreamWrapper,
        sources: &[PathBuf],
        destination: &Path,
    ) -> Result<()> {
        info!(
            "Creating {} archive {:?} from {} source(s)",
            wrapper.name(),
            destination,
            sources.len()
        );

        if !self.options.overwrite_existing && fsutil::file_exists(destination) {
            return Err(Error::Precondition(format!(
                "file already exists: {}",
                destination.display()
            )));
        }
        if self.options.mkdir_all {
            if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
                fsutil::mkdir_all(parent)?;
            }
        }

        let wrapping = if self.options.implicit_top_level_folder {
            let tops: Vec<String> = sources.iter().map(|s| pack::top_level_name(s)).collect();
            paths::multiple_top_levels(&tops)
                .then(|| paths::folder_name_from_file_name(destination))
        } else {
            None
        };
        if let Some(folder) = &wrapping {
            debug!("Sources have no common root, nesting under {:?}", folder);
        }

        let skip = std::path::absolute(destination).ok();
        let file = File::create(destination).map_err(|e| Error::at(destination, e))?;
        let mut handle = create_handle(wrapper, Box::new(BufWriter::new(file)))?;

        let mut links = pack::HardLinks::default();
        for source in sources {
            debug!("Packing source: {:?}", source);
            if let Err(e) = pack::write_source(
                &mut handle,
                source,
                wrapping.as_deref(),
                skip.as_deref(),
                &mut links,
                &self.options,
            ) {
                tolerate(&self.options, e, &source.display().to_string())?;
            }
        }

        handle.close()?;
        info!("Archive created: {:?}", destination);
        Ok(())
    }

    pub(crate) fn unarchive_with(
        &self,
        wrapper: &dyn StreamWrapper,
        source: &Path,
        destination: &Path,
    ) -> Result<()> {
        info!(
            "Extracting {} archive {:?} to {:?}",
            wrapper.name(),
            source,
            destination
        );
        self.ensure_destination(destination)?;

        let mut root = destination.to_path_buf();
        if self.options.implicit_top_level_folder && self.needs_top_level_folder(wrapper, source)? {
            root.push(paths::folder_name_from_file_name(source));
            debug!("Archive has no common root, extracting into {:?}", root);
            fsutil::mkdir_all(&root)?;
        }

        read_entries(wrapper, source, |entry| {
            if let Err(e) = unpack::materialize(entry, &root, "", &self.options) {
                tolerate(&self.options, e, entry.name())?;
            }
            Ok(ControlFlow::Continue(()))
        })?;

        info!("Extraction completed: {:?}", root);
        Ok(())
    }

    pub(crate) fn walk_with(
        &self,
        wrapper: &dyn StreamWrapper,
        source: &Path,
        visitor: Visitor<'_>,
    ) -> Result<()> {
        debug!("Walking {} archive {:?}", wrapper.name(), source);
        read_entries(wrapper, source, |entry| match visitor(entry) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                tolerate(&self.options, e, entry.name())?;
                Ok(ControlFlow::Continue(()))
            }
        })
    }

    pub(crate) fn extract_with(
        &self,
        wrapper: &dyn StreamWrapper,
        source: &Path,
        target: &str,
        destination: &Path,
    ) -> Result<()> {
        let target = paths::clean(target.trim_start_matches('/'));
        if target == "." || target == ".." || target.starts_with("../") {
            return Err(Error::Precondition(format!(
                "invalid extraction target: {:?}",
                target
            )));
        }
        info!(
            "Extracting {:?} from {} archive {:?} to {:?}",
            target,
            wrapper.name(),
            source,
            destination
        );
        self.ensure_destination(destination)?;

        let base = paths::parent(&target);
        let mut found = false;
        let mut target_is_dir = false;

        read_entries(wrapper, source, |entry| {
            let name = paths::clean(entry.name());
            if !paths::within(&target, &name) {
                // Members of one subtree are stored together; past it there
                // is nothing left to find.
                return Ok(if found {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                });
            }

            found = true;
            let is_target = name == target;
            if !is_target || entry.kind().is_dir() {
                target_is_dir = true;
            }

            if let Err(e) = unpack::materialize(entry, destination, base, &self.options) {
                tolerate(&self.options, e, &name)?;
            }

            Ok(if is_target && !target_is_dir {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })?;

        if !found {
            return Err(Error::NotFound(format!(
                "{} not found in {}",
                target,
                source.display()
            )));
        }
        info!("Extracted {:?} to {:?}", target, destination);
        Ok(())
    }

    fn ensure_destination(&self, destination: &Path) -> Result<()> {
        if fsutil::file_exists(destination) {
            return Ok(());
        }
        if !self.options.mkdir_all {
            return Err(Error::Precondition(format!(
                "destination does not exist: {}",
                destination.display()
            )));
        }
        fsutil::mkdir_all(destination)
    }

    /// Pre-scan `source` to see whether its members share one root
    fn needs_top_level_folder(&self, wrapper: &dyn StreamWrapper, source: &Path) -> Result<bool> {
        let mut names = Vec::new();
        read_entries(wrapper, source, |entry| {
            names.push(entry.name().to_string());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(paths::multiple_top_levels(&names))
    }
}

impl Archiver for Tar {
    fn archive(&self, sources: &[PathBuf], destination: &Path) -> Result<()> {
        if !has_extension(destination, &[".tar"]) {
            return Err(Error::Precondition(format!(
                "{} must have a .tar extension",
                destination.display()
            )));
        }
        self.archive_with(&Identity, sources, destination)
    }

    fn unarchive(&self, source: &Path, destination: &Path) -> Result<()> {
        self.unarchive_with(&Identity, source, destination)
    }

    fn walk(&self, source: &Path, visitor: Visitor<'_>) -> Result<()> {
        self.walk_with(&Identity, source, visitor)
    }

    fn extract(&self, source: &Path, target: &str, destination: &Path) -> Result<()> {
        self.extract_with(&Identity, source, target, destination)
    }

    fn format_name(&self) -> &'static str {
        Identity.name()
    }
}

/// Whether the file name of `path` ends with one of `suffixes`
pub(crate) fn has_extension(path: &Path, suffixes: &[&str]) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    suffixes
        .iter()
        .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
}

pub(crate) fn create_handle<'a>(
    wrapper: &dyn StreamWrapper,
    raw: Box<dyn Write + Send + 'a>,
) -> Result<ArchiveHandle<'a>> {
    let mut handle = ArchiveHandle::new();
    handle.create(wrapper.wrap_writer(raw)?)?;
    Ok(handle)
}

pub(crate) fn open_handle<'a>(
    wrapper: &dyn StreamWrapper,
    raw: Box<dyn Read + Send + 'a>,
) -> Result<ArchiveHandle<'a>> {
    let mut handle = ArchiveHandle::new();
    handle.open(wrapper.wrap_reader(raw)?)?;
    Ok(handle)
}

/// Open `source`, feed each entry to `f` until it breaks or the archive
/// ends, then close.
fn read_entries<F>(wrapper: &dyn StreamWrapper, source: &Path, mut f: F) -> Result<()>
where
    F: FnMut(&mut Entry<'_>) -> Result<ControlFlow<()>>,
{
    let file = fsutil::open_for_read(source)?;
    let mut handle = open_handle(wrapper, Box::new(BufReader::new(file)))?;
    {
        let mut entries = handle.entries()?;
        while let Some(mut entry) = entries.read_next()? {
            if f(&mut entry)?.is_break() {
                debug!("Stopped reading {:?} early", source);
                break;
            }
        }
    }
    handle.close()
}
