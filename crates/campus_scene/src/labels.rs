use glam::{Vec2, Vec3};

use crate::graph::NodeId;

/// Building labels float this far above the top of the mesh.
pub const LABEL_LIFT: f32 = 0.2;

#[derive(Clone, Debug, PartialEq)]
pub struct LabelAnchor {
    pub node: NodeId,
    /// Upper-cased node name, e.g. `AR07_BLOCK`.
    pub title: String,
    pub name: Option<String>,
    pub position: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelKind {
    Building,
    Room,
    Notice,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScreenLabel {
    pub text: String,
    pub screen: Vec2,
    pub kind: LabelKind,
}

/// Projects anchors to screen space. `project` returns `None` for points the
/// camera cannot see, and those labels are skipped.
pub fn project_building_labels<F>(
    anchors: &[LabelAnchor],
    visible: bool,
    debug: bool,
    project: F,
) -> Vec<ScreenLabel>
where
    F: Fn(Vec3) -> Option<Vec2>,
{
    if !visible {
        return Vec::new();
    }
    anchors
        .iter()
        .filter_map(|anchor| {
            let screen = project(anchor.position + Vec3::Y * LABEL_LIFT)?;
            let text = if debug {
                format!("{}\n{}", anchor.title, anchor.name.as_deref().unwrap_or("-"))
            } else {
                anchor.title.clone()
            };
            Some(ScreenLabel {
                text,
                screen,
                kind: LabelKind::Building,
            })
        })
        .collect()
}

pub fn project_point<F>(text: String, position: Vec3, kind: LabelKind, project: F) -> Option<ScreenLabel>
where
    F: Fn(Vec3) -> Option<Vec2>,
{
    project(position).map(|screen| ScreenLabel { text, screen, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(title: &str, name: Option<&str>, z: f32) -> LabelAnchor {
        LabelAnchor {
            node: crate::graph::SceneGraph::new().add_group(None, title, glam::Affine3A::IDENTITY),
            title: title.to_string(),
            name: name.map(str::to_string),
            position: Vec3::new(0.0, 0.0, z),
        }
    }

    fn front_only(point: Vec3) -> Option<Vec2> {
        (point.z >= 0.0).then(|| Vec2::new(point.x, point.y))
    }

    #[test]
    fn hidden_labels_produce_nothing() {
        let anchors = vec![anchor("AR1", None, 1.0)];
        assert!(project_building_labels(&anchors, false, false, front_only).is_empty());
    }

    #[test]
    fn anchors_behind_camera_are_skipped() {
        let anchors = vec![anchor("AR1", None, 1.0), anchor("AR2", None, -1.0)];
        let labels = project_building_labels(&anchors, true, false, front_only);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "AR1");
        assert!((labels[0].screen.y - LABEL_LIFT).abs() < 1e-6);
    }

    #[test]
    fn debug_adds_metadata_name() {
        let anchors = vec![anchor("AR7", Some("Library"), 1.0)];
        let labels = project_building_labels(&anchors, true, true, front_only);
        assert_eq!(labels[0].text, "AR7\nLibrary");
    }

    #[test]
    fn debug_marks_missing_metadata_name() {
        let anchors = vec![anchor("AR07_BLOCK", None, 1.0)];
        let labels = project_building_labels(&anchors, true, true, front_only);
        assert_eq!(labels[0].text, "AR07_BLOCK\n-");
        let labels = project_building_labels(&anchors, true, false, front_only);
        assert_eq!(labels[0].text, "AR07_BLOCK");
    }
}
