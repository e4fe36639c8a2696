//! Label Space
//!
//! The ordered list of class names. Index `i` of a [`LabelSpace`] names
//! output index `i` of the classifier's final layer, so the ordering must be
//! identical at training and inference time. Names are sorted by byte order
//! (Rust `String` ordering), which is locale-independent.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::error::{PlantDocError, Result};

/// Ordered, index-addressable list of class names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSpace {
    classes: Vec<String>,
}

impl LabelSpace {
    /// Resolve the label space from the immediate subdirectories of `root`
    ///
    /// Every subdirectory is a class. Fails with `MissingDataset` when `root`
    /// does not exist or has no subdirectories.
    pub fn from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PlantDocError::MissingDataset(format!(
                "directory does not exist: {}",
                root.display()
            )));
        }

        let mut classes = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    PlantDocError::Dataset(format!(
                        "class directory name is not valid UTF-8: {}",
                        path.display()
                    ))
                })?;
            classes.push(name.to_string());
        }

        if classes.is_empty() {
            return Err(PlantDocError::MissingDataset(format!(
                "no class directories in {}",
                root.display()
            )));
        }

        classes.sort();
        debug!("Resolved {} classes from {:?}", classes.len(), root);

        Ok(Self { classes })
    }

    /// Build a label space from class names in any order
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = names.into_iter().map(Into::into).collect();
        classes.sort();
        Self::try_from(classes)
    }

    /// Number of classes (the classifier's output width)
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Always false for a constructed label space
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class name at output index `index`
    pub fn name(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Output index of class `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|probe| probe.as_str().cmp(name))
            .ok()
    }

    /// Iterate class names in index order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// Class names in index order
    pub fn as_slice(&self) -> &[String] {
        &self.classes
    }
}

impl TryFrom<Vec<String>> for LabelSpace {
    type Error = PlantDocError;

    /// Accepts only a non-empty, strictly sorted list
    fn try_from(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(PlantDocError::MissingDataset(
                "label space has no classes".to_string(),
            ));
        }
        if let Some(pair) = classes.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(PlantDocError::Dataset(format!(
                "label space is not strictly sorted: '{}' precedes '{}'",
                pair[0], pair[1]
            )));
        }
        Ok(Self { classes })
    }
}

impl From<LabelSpace> for Vec<String> {
    fn from(space: LabelSpace) -> Self {
        space.classes
    }
}

impl fmt::Display for LabelSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.classes.join(", "))
    }
}
