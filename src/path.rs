use heapless::Vec;
use sdvolume::BlockDevice;

use crate::config::MAX_PATH_DEPTH;
use crate::error::FsError;
use crate::flags::OpenFlags;
use crate::fs::FatFs;
use crate::handle::FileHandle;
use crate::name::ShortName;

/// Directories opened on the way down a path, innermost last.
pub(crate) type DirStack = Vec<FileHandle, MAX_PATH_DEPTH>;

pub(crate) struct Resolved {
    stack: DirStack,
    pub(crate) leaf: ShortName,
}

impl Resolved {
    /// The directory holding the leaf: the innermost opened directory, or
    /// `start` when the path had no directory components.
    pub(crate) fn parent<'a>(&'a mut self, start: &'a mut FileHandle) -> &'a mut FileHandle {
        match self.stack.last_mut() {
            Some(top) => top,
            None => start,
        }
    }
}

/// Splits `path` into its non-empty segments. Runs of `/` count as one
/// separator; leading and trailing separators are ignored.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &[u8]> {
    path.as_bytes()
        .split(|&byte| byte == b'/')
        .filter(|segment| !segment.is_empty())
}

/// Walks every component of `path` except the last, opening each as a
/// directory. A leading `/` starts the walk at the root.
pub(crate) fn resolve<D: BlockDevice>(
    fs: &mut FatFs<D>,
    start: &mut FileHandle,
    path: &str,
    create_missing: bool,
) -> Result<Resolved, FsError> {
    let mut stack = DirStack::new();
    if path.starts_with('/') && !start.is_root() {
        let mut root = FileHandle::new();
        root.open_root(fs)?;
        stack.push(root).map_err(|_| FsError::PathTooDeep)?;
    }

    let mut parts = segments(path).peekable();
    loop {
        let segment = parts.next().ok_or(FsError::NameInvalid)?;
        let name = ShortName::encode(segment)?;
        if parts.peek().is_none() {
            return Ok(Resolved { stack, leaf: name });
        }

        let mut sub = FileHandle::new();
        {
            let parent = match stack.last_mut() {
                Some(top) => top,
                None => &mut *start,
            };
            match sub.open_name(fs, parent, &name, OpenFlags::READ) {
                Ok(()) => {}
                Err(FsError::NotFound) if create_missing => sub.mkdir_name(fs, parent, &name)?,
                Err(err) => return Err(err),
            }
        }
        if !sub.is_dir() {
            return Err(FsError::NotADirectory);
        }
        stack.push(sub).map_err(|_| FsError::PathTooDeep)?;
    }
}
