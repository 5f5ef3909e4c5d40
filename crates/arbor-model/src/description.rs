//! Name-based model descriptions, as produced by a URDF/SDF front end.
//!
//! A [`ModelDescription`] lists links and joints in any order and refers to
//! links by name. [`ModelDescription::build`] validates it and turns it into a
//! topologically ordered [`Model`].

use crate::{Error, Joint, JointLimits, JointType, Model, ModelBuilder, Result};
use arbor_math::{GRAVITY, SpatialInertia, SpatialTransform, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

fn default_gravity() -> Vec3 {
    Vec3::new(0.0, 0.0, -GRAVITY)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDescription {
    pub name: String,
    pub inertia: SpatialInertia,
    #[serde(default)]
    pub collision_points: Vec<Vec3>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescription {
    pub name: String,
    pub joint_type: JointType,
    pub parent: String,
    pub child: String,
    /// Parent link frame → joint frame.
    pub origin: SpatialTransform,
    #[serde(default)]
    pub axis: Vec3,
    #[serde(default)]
    pub damping: f64,
    #[serde(default)]
    pub limits: Option<JointLimits>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub name: String,
    pub links: Vec<LinkDescription>,
    pub joints: Vec<JointDescription>,
    pub base_link: String,
    /// Attach the base to the world through a free joint instead of a fixed one.
    #[serde(default)]
    pub floating_base: bool,
    #[serde(default = "default_gravity")]
    pub gravity: Vec3,
}

impl ModelDescription {
    /// Validate the description and build a [`Model`], ordering links
    /// breadth-first from the base.
    pub fn build(&self) -> Result<Model> {
        let links: HashMap<&str, &LinkDescription> =
            self.links.iter().map(|l| (l.name.as_str(), l)).collect();
        if links.len() != self.links.len() {
            return Err(Error::InvalidModel("duplicate link names".into()));
        }
        if !links.contains_key(self.base_link.as_str()) {
            return Err(Error::InvalidModel(format!(
                "base link '{}' is not defined",
                self.base_link
            )));
        }

        let mut children: HashMap<&str, Vec<&JointDescription>> = HashMap::new();
        let mut has_parent: HashSet<&str> = HashSet::new();
        for joint in &self.joints {
            for end in [&joint.parent, &joint.child] {
                if !links.contains_key(end.as_str()) {
                    return Err(Error::InvalidModel(format!(
                        "joint '{}' refers to unknown link '{end}'",
                        joint.name
                    )));
                }
            }
            if joint.child == self.base_link {
                return Err(Error::InvalidModel(format!(
                    "joint '{}' makes the base link a child",
                    joint.name
                )));
            }
            if !has_parent.insert(joint.child.as_str()) {
                return Err(Error::InvalidModel(format!(
                    "link '{}' has more than one parent joint",
                    joint.child
                )));
            }
            children.entry(joint.parent.as_str()).or_default().push(joint);
        }

        let base = links[self.base_link.as_str()];
        let root_joint = if self.floating_base {
            Joint::free(SpatialTransform::identity())
        } else {
            Joint::fixed(SpatialTransform::identity())
        };
        let mut builder = ModelBuilder::new()
            .name(&self.name)
            .gravity(self.gravity)
            .add_link(&base.name, None, root_joint.named("world_joint"), base.inertia)
            .collision_points(base.collision_points.clone());

        let mut index: HashMap<&str, usize> = HashMap::from([(base.name.as_str(), 0)]);
        let mut queue = VecDeque::from([base.name.as_str()]);
        while let Some(parent) = queue.pop_front() {
            for jd in children.get(parent).into_iter().flatten() {
                let child = links[jd.child.as_str()];
                let joint = Joint {
                    name: jd.name.clone(),
                    joint_type: jd.joint_type,
                    parent_to_joint: jd.origin,
                    axis: jd.axis,
                    damping: jd.damping,
                    limits: jd.limits,
                };
                builder = builder
                    .add_link(&child.name, Some(index[parent]), joint, child.inertia)
                    .collision_points(child.collision_points.clone());
                index.insert(child.name.as_str(), index.len());
                queue.push_back(child.name.as_str());
            }
        }

        if index.len() != self.links.len() {
            let mut orphans: Vec<&str> = links
                .keys()
                .copied()
                .filter(|name| !index.contains_key(name))
                .collect();
            orphans.sort_unstable();
            return Err(Error::InvalidModel(format!(
                "links not reachable from base '{}': {}",
                self.base_link,
                orphans.join(", ")
            )));
        }

        builder.build()
    }

    /// Merge every link attached through a fixed joint into its parent.
    ///
    /// The child's inertia and collision points are re-expressed in the
    /// parent frame, and joints hanging from the child are re-rooted on the
    /// parent with their origins composed through the fixed transform.
    pub fn lump_fixed_joints(&self) -> ModelDescription {
        let mut desc = self.clone();
        while let Some(pos) = desc
            .joints
            .iter()
            .position(|j| j.joint_type == JointType::Fixed)
        {
            let fixed = desc.joints.remove(pos);
            let Some(child_idx) = desc.links.iter().position(|l| l.name == fixed.child) else {
                continue;
            };
            let child = desc.links.remove(child_idx);
            let x = fixed.origin;

            if let Some(parent) = desc.links.iter_mut().find(|l| l.name == fixed.parent) {
                parent.inertia = parent.inertia.combine(&child.inertia.to_parent_frame(&x));
                parent
                    .collision_points
                    .extend(child.collision_points.iter().map(|p| x.point_to_parent(p)));
            }
            for joint in desc.joints.iter_mut().filter(|j| j.parent == child.name) {
                joint.parent = fixed.parent.clone();
                joint.origin = joint.origin.compose(&x);
            }
            debug!(child = %child.name, parent = %fixed.parent, "lumped fixed joint");
        }
        desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn link(name: &str, mass: f64) -> LinkDescription {
        LinkDescription {
            name: name.into(),
            inertia: SpatialInertia::sphere(mass, 0.1),
            collision_points: vec![],
        }
    }

    fn joint(
        name: &str,
        kind: JointType,
        parent: &str,
        child: &str,
        origin: Vec3,
    ) -> JointDescription {
        JointDescription {
            name: name.into(),
            joint_type: kind,
            parent: parent.into(),
            child: child.into(),
            origin: SpatialTransform::from_translation(origin),
            axis: Vec3::z(),
            damping: 0.0,
            limits: None,
        }
    }

    fn arm() -> ModelDescription {
        ModelDescription {
            name: "arm".into(),
            // Deliberately out of order.
            links: vec![
                link("forearm", 1.0),
                link("base", 5.0),
                link("hand", 0.5),
                link("upper", 2.0),
            ],
            joints: vec![
                joint("wrist", JointType::Fixed, "forearm", "hand", Vec3::new(0.0, 0.0, 0.3)),
                joint("shoulder", JointType::Revolute, "base", "upper", Vec3::new(0.0, 0.0, 0.1)),
                joint("elbow", JointType::Revolute, "upper", "forearm", Vec3::new(0.0, 0.0, 0.5)),
            ],
            base_link: "base".into(),
            floating_base: false,
            gravity: default_gravity(),
        }
    }

    #[test]
    fn test_build_orders_parents_first() {
        let model = arm().build().unwrap();
        let names: Vec<_> = model.links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["base", "upper", "forearm", "hand"]);
        assert_eq!(model.links[3].parent, Some(2));
        assert_eq!(model.nv, 2);
        assert_eq!(model.joints[0].joint_type, JointType::Fixed);
    }

    #[test]
    fn test_floating_base() {
        let mut d = arm();
        d.floating_base = true;
        let model = d.build().unwrap();
        assert_eq!(model.joints[0].joint_type, JointType::Free);
        assert_eq!(model.nq, 7 + 2);
        assert_eq!(model.nv, 6 + 2);
    }

    #[test]
    fn test_invalid_descriptions() {
        let mut d = arm();
        d.base_link = "nowhere".into();
        assert!(matches!(d.build(), Err(Error::InvalidModel(_))));

        let mut d = arm();
        d.joints.push(joint("loop", JointType::Revolute, "hand", "upper", Vec3::zeros()));
        assert!(matches!(d.build(), Err(Error::InvalidModel(_))));

        let mut d = arm();
        d.links.push(link("orphan", 1.0));
        let err = d.build().unwrap_err();
        assert!(err.to_string().contains("orphan"));

        // A cycle detached from the base: every link still has one parent.
        let mut d = arm();
        d.links.push(link("a", 1.0));
        d.links.push(link("b", 1.0));
        d.joints.push(joint("ab", JointType::Revolute, "a", "b", Vec3::zeros()));
        d.joints.push(joint("ba", JointType::Revolute, "b", "a", Vec3::zeros()));
        assert!(matches!(d.build(), Err(Error::InvalidModel(_))));

        let mut d = arm();
        d.joints[1].axis = Vec3::zeros();
        assert!(matches!(d.build(), Err(Error::InvalidModel(_))));
    }

    #[test]
    fn test_lump_fixed_joints() {
        let mut d = arm();
        d.links[2].collision_points = vec![Vec3::new(0.0, 0.0, 0.05)];
        let lumped = d.lump_fixed_joints();
        assert_eq!(lumped.links.len(), 3);
        assert!(lumped.joints.iter().all(|j| j.joint_type != JointType::Fixed));

        let forearm = lumped.links.iter().find(|l| l.name == "forearm").unwrap();
        assert_relative_eq!(forearm.inertia.mass, 1.5, epsilon = 1e-12);
        // CoM shifts towards the hand: (1.0 * 0 + 0.5 * 0.3) / 1.5
        assert_relative_eq!(forearm.inertia.com.z, 0.1, epsilon = 1e-12);
        assert_relative_eq!(
            forearm.collision_points[0],
            Vec3::new(0.0, 0.0, 0.35),
            epsilon = 1e-12
        );

        let model = lumped.build().unwrap();
        assert_eq!(model.nlinks(), 3);
        assert_relative_eq!(
            model.total_mass(),
            arm().build().unwrap().total_mass(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_lump_reroots_grandchildren() {
        let mut d = arm();
        d.links.push(link("finger", 0.1));
        d.joints.push(joint(
            "knuckle",
            JointType::Revolute,
            "hand",
            "finger",
            Vec3::new(0.0, 0.0, 0.1),
        ));
        let lumped = d.lump_fixed_joints();
        let knuckle = lumped.joints.iter().find(|j| j.name == "knuckle").unwrap();
        assert_eq!(knuckle.parent, "forearm");
        assert_relative_eq!(knuckle.origin.pos, Vec3::new(0.0, 0.0, 0.4), epsilon = 1e-12);
    }

    #[test]
    fn test_json_roundtrip() {
        let d = arm();
        let json = serde_json::to_string(&d).unwrap();
        let back: ModelDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
