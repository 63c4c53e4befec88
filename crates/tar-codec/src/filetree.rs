//! An editable tree of text files backed by an archive.
//!
//! A template archive holds some files a user may edit (matched by
//! [`AllowList`]) and others that must travel through untouched.
//! [`FileTree::from_archive`] lifts the editable files into a nested tree;
//! [`build_archive`] puts an edited tree back together with every entry that
//! was left out.

use std::collections::{BTreeMap, HashSet};

use log::{debug, warn};
use thiserror::Error;

use crate::{
    metadata::EntryMetadata,
    reader::{EntryDescriptor, TarReader},
    writer::TarWriter,
};

/// Filename suffixes that are surfaced for editing by default.
pub const DEFAULT_ALLOWED_SUFFIXES: &[&str] =
    &["tf", "md", "mkd", "Dockerfile", "protobuf", "sh", "tpl"];

/// Which archive entries are editable, by filename suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    /// A name is editable if it ends with any of these.
    pub suffixes: Vec<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_SUFFIXES.iter().copied())
    }
}

impl AllowList {
    /// Build an allow list from filename suffixes such as `"tf"` or
    /// `"Dockerfile"`.
    pub fn new<S: Into<String>>(suffixes: impl IntoIterator<Item = S>) -> Self {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_allowed(&self, name: &str) -> bool {
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

/// Errors from editing a [`FileTree`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// The path is empty, contains `..` components, or is a move into
    /// itself.
    #[error("invalid path {0:?}")]
    InvalidPath(String),
    /// Nothing exists at the path.
    #[error("{0:?} does not exist")]
    NotFound(String),
    /// A path component names a file where a folder was expected.
    #[error("{0:?} is not a folder")]
    NotADirectory(String),
    /// The path names a folder where a file was expected.
    #[error("{0:?} is a folder")]
    IsADirectory(String),
    /// Something already exists at the destination.
    #[error("{0:?} already exists")]
    AlreadyExists(String),
}

/// A node in a [`FileTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A text file.
    File(String),
    /// A nested folder.
    Folder(FileTree),
}

impl Node {
    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }
}

/// Nested map of names to files and folders, kept in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    entries: BTreeMap<String, Node>,
}

/// Split `path` into its components; empty and `.` components are dropped.
fn split_path(path: &str) -> Result<Vec<&str>, TreeError> {
    let components: Vec<&str> = path
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    if components.is_empty() || components.contains(&"..") {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(components)
}

impl FileTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from the allow-listed entries of an archive.
    ///
    /// Directories become folders and regular files become text files;
    /// parents are created as needed and a leading `./` is ignored. Entries
    /// that cannot be placed in the tree are skipped; [`build_archive`]
    /// carries them over unchanged.
    #[must_use]
    pub fn from_archive(reader: &TarReader, allow: &AllowList) -> Self {
        Self::from_archive_with_skipped(reader, allow).0
    }

    /// Like [`from_archive`](Self::from_archive), also returning the
    /// allow-listed entries that were left out of the tree, in archive order.
    #[must_use]
    pub fn from_archive_with_skipped<'r>(
        reader: &'r TarReader,
        allow: &AllowList,
    ) -> (Self, Vec<&'r EntryDescriptor>) {
        let mut tree = Self::new();
        let mut skipped = Vec::new();
        for entry in reader.entries().iter().filter(|e| allow.is_allowed(&e.name)) {
            let result = if entry.is_dir() {
                tree.create_folder(&entry.name)
            } else {
                let content = String::from_utf8_lossy(reader.payload(entry)).into_owned();
                tree.set_file(&entry.name, content)
            };
            if let Err(err) = result {
                warn!("leaving {:?} out of the tree: {err}", entry.name);
                skipped.push(entry);
            }
        }
        debug!(
            "built file tree with {} top-level entries, {} skipped",
            tree.entries.len(),
            skipped.len()
        );
        (tree, skipped)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct children of the root, in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Look up the node at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Node> {
        let components = split_path(path).ok()?;
        let (last, parents) = components.split_last()?;
        let mut dir = self;
        for component in parents {
            match dir.entries.get(*component)? {
                Node::Folder(sub) => dir = sub,
                Node::File(_) => return None,
            }
        }
        dir.entries.get(*last)
    }

    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    #[must_use]
    pub fn is_folder(&self, path: &str) -> bool {
        self.get(path).is_some_and(Node::is_folder)
    }

    /// The content of the file at `path`, or `None` if there is no file there.
    #[must_use]
    pub fn get_file_content(&self, path: &str) -> Option<&str> {
        match self.get(path)? {
            Node::File(content) => Some(content),
            Node::Folder(_) => None,
        }
    }

    /// Walk to the folder that holds the last component of `path`, creating
    /// missing parents when `create` is set.
    fn parent_mut<'a, 'p>(
        &'a mut self,
        path: &'p str,
        create: bool,
    ) -> Result<(&'a mut FileTree, &'p str), TreeError> {
        let components = split_path(path)?;
        let Some((last, parents)) = components.split_last() else {
            return Err(TreeError::InvalidPath(path.to_string()));
        };
        let mut dir = self;
        for component in parents {
            if create && !dir.entries.contains_key(*component) {
                dir.entries
                    .insert(component.to_string(), Node::Folder(FileTree::new()));
            }
            dir = match dir.entries.get_mut(*component) {
                Some(Node::Folder(sub)) => sub,
                Some(Node::File(_)) => return Err(TreeError::NotADirectory(component.to_string())),
                None => return Err(TreeError::NotFound(component.to_string())),
            };
        }
        Ok((dir, *last))
    }

    /// Insert or replace a file, creating parent folders as needed.
    fn set_file(&mut self, path: &str, content: String) -> Result<(), TreeError> {
        let (dir, name) = self.parent_mut(path, true)?;
        if dir.entries.get(name).is_some_and(Node::is_folder) {
            return Err(TreeError::IsADirectory(path.to_string()));
        }
        dir.entries.insert(name.to_string(), Node::File(content));
        Ok(())
    }

    /// Create a new file, creating parent folders as needed.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::AlreadyExists`] if anything is already at
    /// `path`, or [`TreeError::NotADirectory`] if a parent is a file.
    pub fn create_file(&mut self, path: &str, content: impl Into<String>) -> Result<(), TreeError> {
        let (dir, name) = self.parent_mut(path, true)?;
        if dir.entries.contains_key(name) {
            return Err(TreeError::AlreadyExists(path.to_string()));
        }
        dir.entries.insert(name.to_string(), Node::File(content.into()));
        Ok(())
    }

    /// Create a folder and any missing parents. An existing folder is left
    /// alone.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::NotADirectory`] if a file is in the way.
    pub fn create_folder(&mut self, path: &str) -> Result<(), TreeError> {
        let (dir, name) = self.parent_mut(path, true)?;
        match dir.entries.get(name) {
            Some(Node::Folder(_)) => Ok(()),
            Some(Node::File(_)) => Err(TreeError::NotADirectory(path.to_string())),
            None => {
                dir.entries.insert(name.to_string(), Node::Folder(FileTree::new()));
                Ok(())
            }
        }
    }

    /// Replace the content of an existing file.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::NotFound`] if there is no file at `path`, or
    /// [`TreeError::IsADirectory`] if `path` is a folder.
    pub fn update_file(&mut self, path: &str, content: impl Into<String>) -> Result<(), TreeError> {
        let (dir, name) = self.parent_mut(path, false)?;
        match dir.entries.get_mut(name) {
            Some(Node::File(existing)) => {
                *existing = content.into();
                Ok(())
            }
            Some(Node::Folder(_)) => Err(TreeError::IsADirectory(path.to_string())),
            None => Err(TreeError::NotFound(path.to_string())),
        }
    }

    /// Remove the file or folder at `path`, returning it.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::NotFound`] if nothing is at `path`.
    pub fn remove(&mut self, path: &str) -> Result<Node, TreeError> {
        let (dir, name) = self.parent_mut(path, false)?;
        dir.entries
            .remove(name)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))
    }

    /// Move the file or folder at `from` to `to`, creating parents of `to`
    /// as needed.
    ///
    /// # Errors
    ///
    /// Fails with [`TreeError::NotFound`] if `from` does not exist,
    /// [`TreeError::AlreadyExists`] if `to` does, or
    /// [`TreeError::InvalidPath`] if `to` lies inside `from`.
    pub fn move_file(&mut self, from: &str, to: &str) -> Result<(), TreeError> {
        let source = split_path(from)?;
        let dest = split_path(to)?;
        if !self.exists(from) {
            return Err(TreeError::NotFound(from.to_string()));
        }
        if dest.starts_with(&source) {
            return Err(TreeError::InvalidPath(to.to_string()));
        }
        if self.exists(to) {
            return Err(TreeError::AlreadyExists(to.to_string()));
        }
        // Create the destination parents first so a failure leaves the
        // source in place.
        self.parent_mut(to, true)?;
        let node = self.remove(from)?;
        let (dir, name) = self.parent_mut(to, false)?;
        dir.entries.insert(name.to_string(), node);
        Ok(())
    }

    /// Visit every node depth-first in name order, parents before children.
    ///
    /// The callback receives the node, its own name, and its full
    /// `/`-separated path.
    pub fn traverse<F>(&self, mut f: F)
    where
        F: FnMut(&Node, &str, &str),
    {
        self.traverse_inner(&mut f, "");
    }

    fn traverse_inner<F>(&self, f: &mut F, parent: &str)
    where
        F: FnMut(&Node, &str, &str),
    {
        for (name, node) in &self.entries {
            let full_path = if parent.is_empty() {
                name.clone()
            } else {
                format!("{parent}/{name}")
            };
            f(node, name, &full_path);
            if let Node::Folder(sub) = node {
                sub.traverse_inner(f, &full_path);
            }
        }
    }
}

fn carried_metadata(entry: &EntryDescriptor) -> EntryMetadata {
    EntryMetadata {
        uid: Some(entry.uid),
        gid: Some(entry.gid),
        mode: Some(entry.mode),
        mtime: Some(entry.mtime),
        user: Some(entry.user.clone()),
        group: Some(entry.group.clone()),
    }
}

/// Rebuild an archive from an edited tree.
///
/// Every entry of `original` that is not allow-listed, or that
/// [`FileTree::from_archive`] could not place in a tree, is copied over
/// first, keeping its name, payload and metadata. The tree's folders and
/// files follow in traversal order with default metadata; tree folders that
/// were already copied over are not repeated.
#[must_use]
pub fn build_archive(original: &TarReader, tree: &FileTree, allow: &AllowList) -> TarWriter {
    build_archive_into(TarWriter::new(), original, tree, allow)
}

/// Like [`build_archive`], appending to a writer with custom defaults.
#[must_use]
pub fn build_archive_into(
    mut writer: TarWriter,
    original: &TarReader,
    tree: &FileTree,
    allow: &AllowList,
) -> TarWriter {
    let (_, skipped) = FileTree::from_archive_with_skipped(original, allow);
    let skipped: HashSet<usize> = skipped.iter().map(|e| e.header_offset).collect();

    let mut carried = HashSet::new();
    for entry in original
        .entries()
        .iter()
        .filter(|e| !allow.is_allowed(&e.name) || skipped.contains(&e.header_offset))
    {
        let meta = carried_metadata(entry);
        if entry.is_dir() {
            writer.add_folder_with(entry.name.clone(), meta);
        } else {
            writer.add_file_with(entry.name.clone(), original.payload(entry), meta);
        }
        if let Ok(components) = split_path(&entry.name) {
            carried.insert(components.join("/"));
        }
    }

    tree.traverse(|node, _, full_path| match node {
        Node::File(content) => {
            writer.add_file(full_path, content.as_str());
        }
        Node::Folder(_) => {
            if !carried.contains(full_path) {
                writer.add_folder(full_path);
            }
        }
    });

    debug!(
        "rebuilt archive: {} carried ({} skipped by the tree), {} total",
        carried.len(),
        skipped.len(),
        writer.len()
    );
    writer
}
