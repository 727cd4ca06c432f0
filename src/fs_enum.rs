use anyhow::{Context, Result};
use std::fmt;

use crate::remote::{RemoteFs, RemotePath};
// Remote tree enumeration with archive-directory pruning

/// Pruning markers and the recursion ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationRules {
    pub prune_markers: Vec<String>,
    pub max_depth: usize,
}

impl Default for EnumerationRules {
    fn default() -> Self {
        Self {
            prune_markers: [".zip", ".rar", ".gz", ".csv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_depth: 64,
        }
    }
}

impl EnumerationRules {
    /// Directories whose name contains a marker are synced as a single entry.
    fn is_pruned(&self, dir_name: &str) -> bool {
        self.prune_markers.iter().any(|m| dir_name.contains(m.as_str()))
    }
}

/// Recursion went deeper than `EnumerationRules::max_depth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthExceeded {
    pub path: RemotePath,
    pub limit: usize,
}

impl fmt::Display for DepthExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "directory nesting deeper than {} levels at {}",
            self.limit, self.path
        )
    }
}

impl std::error::Error for DepthExceeded {}

/// Every file path under `start`, in listing order.
///
/// A `start` containing `.` is returned as-is without listing it.
pub fn enumerate<S: RemoteFs + ?Sized>(
    session: &S,
    start: &RemotePath,
    rules: &EnumerationRules,
) -> Result<Vec<RemotePath>> {
    let mut out = Vec::new();
    walk(session, start, rules, 0, &mut out)?;
    Ok(out)
}

fn walk<S: RemoteFs + ?Sized>(
    session: &S,
    path: &RemotePath,
    rules: &EnumerationRules,
    depth: usize,
    out: &mut Vec<RemotePath>,
) -> Result<()> {
    if path.is_file_reference() {
        out.push(path.clone());
        return Ok(());
    }
    if depth >= rules.max_depth {
        return Err(DepthExceeded {
            path: path.clone(),
            limit: rules.max_depth,
        }
        .into());
    }

    let entries = session
        .list_dir(path)
        .with_context(|| format!("Failed to enumerate {}", path))?;

    for entry in entries {
        let full = path.join(&entry.name);
        if entry.is_dir && !rules.is_pruned(&entry.name) {
            walk(session, &full, rules, depth + 1, out)?;
        } else {
            out.push(full);
        }
    }
    Ok(())
}
