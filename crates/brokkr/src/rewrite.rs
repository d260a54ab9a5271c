//! Reversible renaming of mesh references.
//!
//! Meshes from several folders are flattened into a single staging folder, so files from
//! non-canonical folders get the folder name as prefix. The substitutions are recorded here so the
//! references in the converted scene can be pointed back at the original files.
//!
//! Only the file attributes of `<mesh>` elements are rewritten, other text that happens to contain
//! a renamed file name is left alone.

use std::path::Path;

use crate::xml::{Document, Element};

/// Attributes holding the mesh path, `filename` in urdf and `file` in mjcf.
const MESH_PATH_ATTRIBUTES: [&str; 2] = ["filename", "file"];

/// One renamed mesh file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSubstitution {
    /// Reference as written in the source urdf, e.g. `../meshes/left/hand.stl`.
    pub original: String,
    /// Reference to the staged file, e.g. `../meshes/left_hand.stl`.
    pub staged: String,
    /// File name of the staged file, e.g. `left_hand.stl`.
    pub renamed: String,
}

impl PathSubstitution {
    /// Substitution for the file `file_name` inside the mesh folder `folder`.
    #[must_use]
    pub fn for_mesh(folder: &Path, file_name: &str) -> Self {
        // last component rather than `file_name`, so `..` still names its folder
        let folder_name = folder
            .components()
            .next_back()
            .map(|component| component.as_os_str().to_string_lossy())
            .unwrap_or_default();
        let renamed = format!("{folder_name}_{file_name}");
        let parent = folder.parent().unwrap_or(Path::new(""));

        Self {
            original: folder.join(file_name).display().to_string(),
            staged: parent.join(&renamed).display().to_string(),
            renamed,
        }
    }

    fn is_original(&self, reference: &str) -> bool {
        Path::new(reference) == Path::new(&self.original)
    }

    fn is_staged(&self, reference: &str) -> bool {
        let reference = Path::new(reference);
        reference == Path::new(&self.staged)
            || reference
                .file_name()
                .is_some_and(|name| name == self.renamed.as_str())
    }
}

/// Append-only list of [`PathSubstitution`]s, in the order they were recorded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathSubstitutions(Vec<PathSubstitution>);

impl PathSubstitutions {
    /// Record `substitution` unless one for the same original reference already exists.
    pub fn record(&mut self, substitution: PathSubstitution) -> bool {
        if self
            .0
            .iter()
            .any(|existing| existing.original == substitution.original)
        {
            return false;
        }

        self.0.push(substitution);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathSubstitution> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Point mesh references at the staged files. Returns the number of rewritten references.
    pub fn apply(&self, document: &mut Document) -> usize {
        self.rewrite(document, |substitution, reference| {
            substitution
                .is_original(reference)
                .then(|| substitution.staged.clone())
        })
    }

    /// Point mesh references back at the original files. Returns the number of rewritten references.
    ///
    /// A reference is restored when it equals the staged path or ends in the renamed file name,
    /// the mjcf exporter only keeps the file name of each mesh.
    pub fn revert(&self, document: &mut Document) -> usize {
        self.rewrite(document, |substitution, reference| {
            substitution
                .is_staged(reference)
                .then(|| substitution.original.clone())
        })
    }

    /// Literal inverse substitution over the whole text, for documents that cannot be parsed.
    #[must_use]
    pub fn revert_text(&self, text: &str) -> String {
        self.0
            .iter()
            .fold(text.to_string(), |text, substitution| {
                text.replace(&substitution.renamed, &substitution.original)
            })
    }

    fn rewrite(
        &self,
        document: &mut Document,
        substitute: impl Fn(&PathSubstitution, &str) -> Option<String>,
    ) -> usize {
        if self.is_empty() {
            return 0;
        }

        let mut rewritten = 0;
        document.root.for_each_descendant_mut(&mut |element: &mut Element| {
            if element.name != "mesh" {
                return;
            }

            for attribute in MESH_PATH_ATTRIBUTES {
                let replacement = element.attr(attribute).and_then(|reference| {
                    self.0
                        .iter()
                        .find_map(|substitution| substitute(substitution, reference))
                });

                if let Some(replacement) = replacement {
                    element.set_attr(attribute, replacement);
                    rewritten += 1;
                }
            }
        });

        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URDF: &str = r#"<robot>
  <link name="left_hand"><visual><geometry><mesh filename="../meshes/left/hand.stl"/></geometry></visual></link>
  <link name="right_hand"><visual><geometry><mesh filename="../meshes/right/hand.stl"/></geometry></visual></link>
  <link name="base"><visual><geometry><mesh filename="../meshes/base.stl"/></geometry></visual></link>
</robot>"#;

    fn substitutions() -> PathSubstitutions {
        let mut substitutions = PathSubstitutions::default();
        substitutions.record(PathSubstitution::for_mesh(Path::new("../meshes/left"), "hand.stl"));
        substitutions.record(PathSubstitution::for_mesh(Path::new("../meshes/right"), "hand.stl"));
        substitutions
    }

    fn mesh_references(document: &Document, attribute: &str) -> Vec<String> {
        document
            .root
            .find_all("mesh")
            .filter_map(|mesh| mesh.attr(attribute))
            .map(ToOwned::to_owned)
            .collect()
    }

    #[test]
    fn substitution_prefixes_folder_name() {
        let substitution = PathSubstitution::for_mesh(Path::new("../meshes/left"), "hand.stl");

        assert_eq!(substitution.original, "../meshes/left/hand.stl");
        assert_eq!(substitution.staged, "../meshes/left_hand.stl");
        assert_eq!(substitution.renamed, "left_hand.stl");
    }

    #[test]
    fn parent_folder_reference_keeps_its_name() {
        let substitution = PathSubstitution::for_mesh(Path::new(".."), "base.stl");

        assert_eq!(substitution.original, "../base.stl");
        assert_eq!(substitution.renamed, ".._base.stl");
        assert_eq!(substitution.staged, ".._base.stl");
    }

    #[test]
    fn records_are_keyed_by_first_occurrence() {
        let mut substitutions = substitutions();

        assert!(!substitutions.record(PathSubstitution::for_mesh(
            Path::new("../meshes/left"),
            "hand.stl"
        )));
        assert_eq!(substitutions.len(), 2);
    }

    #[test]
    fn apply_points_at_staged_files() {
        let mut document = Document::parse(URDF).unwrap();

        assert_eq!(substitutions().apply(&mut document), 2);
        assert_eq!(
            mesh_references(&document, "filename"),
            [
                "../meshes/left_hand.stl",
                "../meshes/right_hand.stl",
                "../meshes/base.stl"
            ]
        );
    }

    #[test]
    fn apply_then_revert_restores_original_references() {
        let original = Document::parse(URDF).unwrap();
        let mut document = original.clone();
        let substitutions = substitutions();

        substitutions.apply(&mut document);
        assert_eq!(substitutions.revert(&mut document), 2);

        assert_eq!(document, original);
    }

    #[test]
    fn revert_restores_mjcf_file_names() {
        let mut document = Document::parse(
            r#"<mujoco><asset>
                <mesh name="left_hand" file="left_hand.stl"/>
                <mesh name="right_hand" file="right_hand.stl"/>
                <mesh name="base" file="base.stl"/>
            </asset></mujoco>"#,
        )
        .unwrap();

        substitutions().revert(&mut document);

        assert_eq!(
            mesh_references(&document, "file"),
            ["../meshes/left/hand.stl", "../meshes/right/hand.stl", "base.stl"]
        );
        assert_eq!(
            mesh_references(&document, "name"),
            ["left_hand", "right_hand", "base"]
        );
    }

    #[test]
    fn revert_leaves_unrelated_text_alone() {
        let mut document = Document::parse(
            r#"<mujoco><!-- built from left_hand.stl --><body name="left_hand.stl"/></mujoco>"#,
        )
        .unwrap();
        let before = document.clone();

        assert_eq!(substitutions().revert(&mut document), 0);
        assert_eq!(document, before);
    }

    #[test]
    fn revert_text_replaces_every_occurrence() {
        let text = r#"<mesh file="left_hand.stl"/><mesh file="right_hand.stl"/>"#;

        assert_eq!(
            substitutions().revert_text(text),
            r#"<mesh file="../meshes/left/hand.stl"/><mesh file="../meshes/right/hand.stl"/>"#
        );
    }
}
