//! Per-joint friction loss and armature annotation.

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::{config::JointDefaults, xml::Document};

/// Friction loss and armature for a joint, either value may be left unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct JointParams {
    pub friction_loss: Option<f64>,
    pub armature: Option<f64>,
}

impl JointParams {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.friction_loss.is_none() && self.armature.is_none()
    }
}

/// A single row of the friction and armature table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JointParamEntry {
    /// Exact joint name, or a regular expression matched at the start of the joint name.
    pub matcher: String,
    #[serde(flatten)]
    pub params: JointParams,
}

impl JointParamEntry {
    #[must_use]
    pub fn new(
        matcher: impl Into<String>,
        friction_loss: Option<f64>,
        armature: Option<f64>,
    ) -> Self {
        Self {
            matcher: matcher.into(),
            params: JointParams {
                friction_loss,
                armature,
            },
        }
    }
}

/// Friction and armature table with its patterns compiled.
#[derive(Debug)]
pub struct JointParamTable {
    entries: Vec<(JointParamEntry, Option<Regex>)>,
    defaults: JointDefaults,
}

impl JointParamTable {
    /// Compile the patterns of `entries`.
    ///
    /// Entries whose matcher is not a valid regular expression are still used for exact matches.
    pub fn new(
        entries: impl IntoIterator<Item = JointParamEntry>,
        defaults: JointDefaults,
    ) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| match Regex::new(&entry.matcher) {
                Ok(regex) => (entry, Some(regex)),
                Err(error) => {
                    warn!(
                        "Pattern `{}` is not a valid regex, skipping it: {error}",
                        entry.matcher
                    );
                    (entry, None)
                }
            })
            .collect();

        Self { entries, defaults }
    }

    /// Matchers that failed to compile.
    pub fn invalid_patterns(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, regex)| regex.is_none())
            .map(|(entry, _)| entry.matcher.as_str())
    }

    #[must_use]
    pub fn defaults(&self) -> JointDefaults {
        self.defaults
    }

    /// Find the parameters for `joint_name`.
    ///
    /// Exact matches take priority over patterns, patterns are tried in declaration order.
    #[must_use]
    pub fn resolve(&self, joint_name: &str) -> Option<&JointParams> {
        if let Some((entry, _)) = self
            .entries
            .iter()
            .find(|(entry, _)| entry.matcher == joint_name)
        {
            return Some(&entry.params);
        }

        self.entries
            .iter()
            .find(|(_, regex)| {
                regex
                    .as_ref()
                    .and_then(|regex| regex.find(joint_name))
                    .is_some_and(|found| found.start() == 0)
            })
            .map(|(entry, _)| &entry.params)
    }
}

/// Summary of an [`annotate`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Joints that received parameters from the table.
    pub matched: Vec<String>,
    /// Joints that fell back to the defaults.
    pub unmatched: Vec<String>,
}

/// Set `frictionloss` and `armature` on every named `<joint>` in the document.
pub fn annotate(document: &mut Document, table: &JointParamTable) -> Annotation {
    let mut annotation = Annotation::default();
    let defaults = JointParams::from(table.defaults());

    document.root.for_each_descendant_mut(&mut |element| {
        if element.name != "joint" {
            return;
        }
        let Some(name) = element
            .attr("name")
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
        else {
            return;
        };

        let params = match table.resolve(&name) {
            Some(params) if !params.is_empty() => {
                annotation.matched.push(name);
                params
            }
            _ => {
                warn!("Joint `{name}` not in config, using default friction loss and armature");
                annotation.unmatched.push(name);
                &defaults
            }
        };

        if let Some(friction_loss) = params.friction_loss {
            element.set_attr("frictionloss", friction_loss.to_string());
        }
        if let Some(armature) = params.armature {
            element.set_attr("armature", armature.to_string());
        }
    });

    annotation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: Vec<JointParamEntry>) -> JointParamTable {
        JointParamTable::new(entries, JointDefaults::default())
    }

    fn joint<'a>(document: &'a Document, name: &str) -> &'a crate::xml::Element {
        document
            .root
            .find_all("joint")
            .find(|joint| joint.attr("name") == Some(name))
            .unwrap()
    }

    #[test]
    fn exact_match_beats_patterns() {
        let table = table(vec![
            JointParamEntry::new("left_.*", Some(1.0), Some(1.0)),
            JointParamEntry::new("left_knee_pitch", Some(2.0), Some(2.0)),
        ]);

        assert_eq!(table.resolve("left_knee_pitch").unwrap().friction_loss, Some(2.0));
        assert_eq!(table.resolve("left_hip_roll").unwrap().friction_loss, Some(1.0));
    }

    #[test]
    fn patterns_resolve_in_declaration_order() {
        let table = table(vec![
            JointParamEntry::new("right_.*", Some(1.0), None),
            JointParamEntry::new("(left|right)_hip_.*", Some(2.0), None),
            JointParamEntry::new("left_.*", Some(3.0), None),
        ]);

        assert_eq!(table.resolve("right_hip_yaw").unwrap().friction_loss, Some(1.0));
        assert_eq!(table.resolve("left_hip_yaw").unwrap().friction_loss, Some(2.0));
        assert_eq!(table.resolve("left_knee").unwrap().friction_loss, Some(3.0));
    }

    #[test]
    fn values_use_shortest_float_formatting() {
        let mut document = Document::parse(
            r#"<mujoco><joint name="waist_yaw"/><joint name="neck_yaw"/></mujoco>"#,
        )
        .unwrap();
        let table = table(vec![
            JointParamEntry::new("waist_yaw", Some(1.0), Some(0.25)),
            JointParamEntry::new("neck_yaw", Some(0.1), Some(0.01)),
        ]);

        annotate(&mut document, &table);

        assert_eq!(joint(&document, "waist_yaw").attr("frictionloss"), Some("1"));
        assert_eq!(joint(&document, "waist_yaw").attr("armature"), Some("0.25"));
        assert_eq!(joint(&document, "neck_yaw").attr("frictionloss"), Some("0.1"));
        assert_eq!(joint(&document, "neck_yaw").attr("armature"), Some("0.01"));
    }

    #[test]
    fn patterns_match_at_start_only() {
        let table = table(vec![JointParamEntry::new("shoulder", Some(1.0), None)]);

        assert!(table.resolve("shoulder_pitch").is_some());
        assert!(table.resolve("left_shoulder").is_none());
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let table = table(vec![
            JointParamEntry::new("(left", Some(1.0), None),
            JointParamEntry::new("left.*", Some(2.0), None),
        ]);

        assert_eq!(table.invalid_patterns().collect::<Vec<_>>(), ["(left"]);
        assert_eq!(table.resolve("left_knee").unwrap().friction_loss, Some(2.0));
        assert_eq!(table.resolve("(left").unwrap().friction_loss, Some(1.0));
    }

    #[test]
    fn matched_joint_gets_table_values() {
        let mut document = Document::parse(
            r#"<mujoco><worldbody><body>
                <joint name="left_shoulder_roll" actuatorfrcrange="-1 1"/>
                <joint name="camera_mount"/>
            </body></worldbody></mujoco>"#,
        )
        .unwrap();
        let table = table(vec![JointParamEntry::new(
            "(left|right)_shoulder_(roll|pitch|yaw)",
            Some(0.1),
            Some(0.01),
        )]);

        let annotation = annotate(&mut document, &table);

        let shoulder = joint(&document, "left_shoulder_roll");
        assert_eq!(shoulder.attr("frictionloss"), Some("0.1"));
        assert_eq!(shoulder.attr("armature"), Some("0.01"));
        assert_eq!(annotation.matched, ["left_shoulder_roll"]);
        assert_eq!(annotation.unmatched, ["camera_mount"]);
    }

    #[test]
    fn unmatched_joint_gets_defaults() {
        let mut document =
            Document::parse(r#"<mujoco><joint name="unknown_joint" actuatorfrcrange="-1 1"/></mujoco>"#)
                .unwrap();

        let annotation = annotate(&mut document, &table(Vec::new()));

        let unknown = joint(&document, "unknown_joint");
        assert_eq!(unknown.attr("frictionloss"), Some("0.05"));
        assert_eq!(unknown.attr("armature"), Some("0.001"));
        assert_eq!(annotation.unmatched, ["unknown_joint"]);
    }

    #[test]
    fn partial_entries_only_set_their_values() {
        let mut document = Document::parse(
            r#"<mujoco><joint name="neck_yaw" armature="0.3"/><joint name="neck_pitch"/></mujoco>"#,
        )
        .unwrap();
        let table = table(vec![
            JointParamEntry::new("neck_yaw", Some(0.2), None),
            JointParamEntry::new("neck_pitch", None, None),
        ]);

        let annotation = annotate(&mut document, &table);

        let yaw = joint(&document, "neck_yaw");
        assert_eq!(yaw.attr("frictionloss"), Some("0.2"));
        assert_eq!(yaw.attr("armature"), Some("0.3"));

        // an entry without any values counts as unmatched
        let pitch = joint(&document, "neck_pitch");
        assert_eq!(pitch.attr("frictionloss"), Some("0.05"));
        assert_eq!(annotation.unmatched, ["neck_pitch"]);
    }

    #[test]
    fn unnamed_joints_are_ignored() {
        let mut document =
            Document::parse(r#"<mujoco><joint type="free"/><joint name="" type="ball"/></mujoco>"#)
                .unwrap();

        let annotation = annotate(&mut document, &table(Vec::new()));

        assert_eq!(annotation, Annotation::default());
        assert!(
            document
                .root
                .find_all("joint")
                .all(|joint| joint.attr("frictionloss").is_none() && joint.attr("armature").is_none())
        );
    }
}
