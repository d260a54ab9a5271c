//! Discovery of the folders that hold the meshes referenced by a urdf.

use std::path::{Path, PathBuf};

use crate::{error::Result, xml::Document};

/// Distinct mesh folders in the order they are first referenced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MeshFolders(Vec<PathBuf>);

impl MeshFolders {
    /// Add `folder` unless it is already present, returns whether it was added.
    pub fn insert(&mut self, folder: impl Into<PathBuf>) -> bool {
        let folder = folder.into();
        if self.0.contains(&folder) {
            return false;
        }

        self.0.push(folder);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Directory part of a mesh reference, `None` for bare file names.
fn mesh_folder(filename: &str) -> Option<&Path> {
    Path::new(filename)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty() && *parent != Path::new("."))
}

/// Collect the folders of all `<mesh filename="...">` references in document order.
#[must_use]
pub fn locate_mesh_folders(document: &Document) -> MeshFolders {
    let mut folders = MeshFolders::default();

    for folder in document
        .root
        .find_all("mesh")
        .filter_map(|mesh| mesh.attr("filename"))
        .filter_map(mesh_folder)
    {
        folders.insert(folder);
    }

    folders
}

/// Read the urdf at `path` and collect its mesh folders.
pub fn read_mesh_folders(path: impl AsRef<Path>) -> Result<MeshFolders> {
    Document::read(path).map(|document| locate_mesh_folders(&document))
}
