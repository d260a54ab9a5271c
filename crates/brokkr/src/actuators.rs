//! Motor and sensor synthesis for actuated joints.

use tracing::warn;

use crate::{
    config::ActuatorConfig,
    xml::{Document, Element},
};

/// A joint that declares an `actuatorfrcrange`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatedJoint {
    pub name: String,
    pub force_range: String,
}

/// Summary of a [`synthesize`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// The joints that received a motor and sensors, in document order.
    pub joints: Vec<ActuatedJoint>,
}

impl Synthesis {
    #[must_use]
    pub fn motors(&self) -> usize {
        self.joints.len()
    }

    /// One position and one velocity sensor per joint.
    #[must_use]
    pub fn sensors(&self) -> usize {
        self.joints.len() * 2
    }
}

/// All named joints with a non-empty `actuatorfrcrange`, in document order.
#[must_use]
pub fn actuated_joints(document: &Document) -> Vec<ActuatedJoint> {
    document
        .root
        .find_all("joint")
        .filter_map(|joint| {
            let name = joint.attr("name").filter(|name| !name.is_empty())?;
            let force_range = joint.attr("actuatorfrcrange").filter(|range| !range.is_empty())?;

            Some(ActuatedJoint {
                name: name.to_string(),
                force_range: force_range.to_string(),
            })
        })
        .collect()
}

/// Replace the top level element with the same name as `section`.
///
/// If there is none, `section` is inserted before the first top level element named in `before`,
/// or appended to the root when none of those exist either.
fn replace_section(root: &mut Element, section: Element, before: &[&str]) {
    if let Some(existing) = root.child_mut(&section.name) {
        *existing = section;
        return;
    }

    let index = before
        .iter()
        .find_map(|name| root.child_index(name))
        .unwrap_or(root.children.len());
    root.insert(index, section);
}

/// Add a motor, a position sensor and a velocity sensor for every actuated joint.
///
/// The `<actuator>` and `<sensor>` sections are replaced entirely. If no joint is actuated the
/// document is left untouched.
pub fn synthesize(document: &mut Document, config: &ActuatorConfig) -> Synthesis {
    let joints = actuated_joints(document);
    if joints.is_empty() {
        warn!("No joints with actuatorfrcrange found in the scene");
        return Synthesis::default();
    }

    let force_range = config.force_range_attr();

    let mut actuator = Element::new("actuator");
    for joint in &joints {
        actuator.push(
            Element::new("motor")
                .with_attr("name", &joint.name)
                .with_attr("joint", &joint.name)
                .with_attr("forcerange", &force_range),
        );
    }

    let mut sensor = Element::new("sensor");
    for joint in &joints {
        sensor.push(
            Element::new("jointpos")
                .with_attr("name", format!("{}_pos", joint.name))
                .with_attr("joint", &joint.name),
        );
    }
    for joint in &joints {
        sensor.push(
            Element::new("jointvel")
                .with_attr("name", format!("{}_vel", joint.name))
                .with_attr("joint", &joint.name),
        );
    }

    replace_section(&mut document.root, actuator, &["sensor", "equality"]);
    replace_section(&mut document.root, sensor, &["equality"]);

    Synthesis { joints }
}
