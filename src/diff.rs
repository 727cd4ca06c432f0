//! Path sets and the origin-minus-destination difference

use std::collections::HashSet;

use crate::remote::RemotePath;

/// Paths from one enumeration pass, in the order they were found.
#[derive(Debug, Default, Clone)]
pub struct FileSet {
    order: Vec<RemotePath>,
    members: HashSet<RemotePath>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the path was already present.
    pub fn insert(&mut self, path: RemotePath) -> bool {
        if self.members.insert(path.clone()) {
            self.order.push(path);
            true
        } else {
            false
        }
    }

    pub fn extend<I: IntoIterator<Item = RemotePath>>(&mut self, paths: I) {
        for p in paths {
            self.insert(p);
        }
    }

    pub fn contains(&self, path: &RemotePath) -> bool {
        self.members.contains(path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemotePath> {
        self.order.iter()
    }
}

impl FromIterator<RemotePath> for FileSet {
    fn from_iter<I: IntoIterator<Item = RemotePath>>(iter: I) -> Self {
        let mut set = FileSet::new();
        set.extend(iter);
        set
    }
}

/// Paths in `origin` that `destination` lacks, in `origin` order.
pub fn diff(origin: &FileSet, destination: &FileSet) -> Vec<RemotePath> {
    origin
        .iter()
        .filter(|p| !destination.contains(p))
        .cloned()
        .collect()
}
