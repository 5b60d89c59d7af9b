//! The loaded scene graph as seen through the host adapter.

use serde::{Deserialize, Serialize};

use crate::reflect::Reflect;

/// Runtime type name used to recognise door components.
pub const DOOR_TYPE_NAME: &str = "Door";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// One node of a scene hierarchy. `position` is in world space.
pub struct GameObject {
    pub name: String,
    pub active: bool,
    pub position: Vec3,
    pub components: Vec<Box<dyn Reflect>>,
    pub children: Vec<GameObject>,
}

impl GameObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            position: Vec3::default(),
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_component(mut self, component: impl Reflect + 'static) -> Self {
        self.components.push(Box::new(component));
        self
    }

    pub fn with_child(mut self, child: GameObject) -> Self {
        self.children.push(child);
        self
    }
}

pub struct Scene {
    pub name: String,
    pub valid: bool,
    pub roots: Vec<GameObject>,
}

impl Scene {
    pub fn new(name: impl Into<String>, roots: Vec<GameObject>) -> Self {
        Self {
            name: name.into(),
            valid: true,
            roots,
        }
    }
}

/// Where the scanner and the override applier look scenes up by name.
pub trait SceneSource {
    fn scene_by_name(&mut self, name: &str) -> Option<&mut Scene>;
}

/// Plain list of scenes, first match by name wins.
#[derive(Default)]
pub struct SceneSet {
    scenes: Vec<Scene>,
}

impl SceneSet {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    /// Adds `scene`, replacing any scene with the same name in place.
    pub fn insert(&mut self, scene: Scene) -> Option<Scene> {
        match self.scenes.iter_mut().find(|s| s.name == scene.name) {
            Some(existing) => Some(std::mem::replace(existing, scene)),
            None => {
                self.scenes.push(scene);
                None
            }
        }
    }

    pub fn into_scenes(self) -> Vec<Scene> {
        self.scenes
    }

    pub fn scene_names(&self) -> Vec<String> {
        self.scenes.iter().map(|s| s.name.clone()).collect()
    }
}

impl SceneSource for SceneSet {
    fn scene_by_name(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.name == name)
    }
}

/// Where a visited component lives in the hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct ComponentSite<'a> {
    pub owner: &'a str,
    pub position: Vec3,
    pub active_in_hierarchy: bool,
}

/// Depth-first walk over `root` and all of its descendants, handing every
/// attached component to `visit`. Inactive subtrees are skipped unless
/// `include_inactive` is set.
pub fn visit_components(
    root: &mut GameObject,
    include_inactive: bool,
    visit: &mut dyn FnMut(ComponentSite<'_>, &mut dyn Reflect),
) {
    walk(root, true, include_inactive, visit);
}

fn walk(
    node: &mut GameObject,
    parent_active: bool,
    include_inactive: bool,
    visit: &mut dyn FnMut(ComponentSite<'_>, &mut dyn Reflect),
) {
    let active = parent_active && node.active;
    if !active && !include_inactive {
        return;
    }

    let GameObject {
        name,
        position,
        components,
        children,
        ..
    } = node;

    for component in components.iter_mut() {
        let site = ComponentSite {
            owner: name.as_str(),
            position: *position,
            active_in_hierarchy: active,
        };
        visit(site, component.as_mut());
    }

    for child in children.iter_mut() {
        walk(child, active, include_inactive, visit);
    }
}

pub fn is_door(component: &dyn Reflect) -> bool {
    component.type_info().name() == DOOR_TYPE_NAME
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{DynComponent, TypeInfo};
    use std::sync::Arc;

    fn component(type_name: &str) -> DynComponent {
        DynComponent::new(Arc::new(TypeInfo::new(type_name)))
    }

    fn tree() -> GameObject {
        GameObject::new("Root")
            .with_component(component("Transform"))
            .with_child(
                GameObject::new("Hidden")
                    .inactive()
                    .with_child(GameObject::new("DeepDoor").with_component(component("Door"))),
            )
            .with_child(GameObject::new("Door_A").with_component(component("Door")))
    }

    #[test]
    fn walk_reaches_inactive_descendants_when_asked() {
        let mut root = tree();
        let mut seen = Vec::new();
        visit_components(&mut root, true, &mut |site, c| {
            seen.push((site.owner.to_string(), c.type_info().name().to_string(), site.active_in_hierarchy));
        });

        assert_eq!(
            seen,
            vec![
                ("Root".to_string(), "Transform".to_string(), true),
                ("DeepDoor".to_string(), "Door".to_string(), false),
                ("Door_A".to_string(), "Door".to_string(), true),
            ]
        );
    }

    #[test]
    fn walk_skips_inactive_subtrees_by_default() {
        let mut root = tree();
        let mut doors = 0;
        visit_components(&mut root, false, &mut |_, c| {
            if is_door(c) {
                doors += 1;
            }
        });
        assert_eq!(doors, 1);
    }

    #[test]
    fn scene_set_looks_up_by_name() {
        let mut set = SceneSet::new(vec![Scene::new("Hub", vec![tree()])]);
        assert!(set.scene_by_name("Hub").is_some());
        assert!(set.scene_by_name("Valley").is_none());
        assert_eq!(set.scene_names(), ["Hub"]);
    }
}
