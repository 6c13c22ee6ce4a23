//! Name to factory lookup for scene-data driven component creation

use super::{
    AabbGizmo, Billboard, Camera, Character, Component, ComponentError, ComponentResult, Gizmo,
    Mesh, Model, PointLight, RigidBody, Spin, StaticBody,
};
use crate::assets::DataNode;
use std::collections::BTreeMap;

/// Builds a component from its scene data fields
pub type ComponentFactory = fn(&DataNode) -> ComponentResult<Box<dyn Component>>;

/// Component factories keyed by the `type` field in scene data
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    factories: BTreeMap<String, ComponentFactory>,
}

impl ComponentRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in component type
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtin: [(&str, ComponentFactory); 11] = [
            ("camera", |d| Ok(Box::new(Camera::from_data(d)?))),
            ("character", |d| Ok(Box::new(Character::from_data(d)?))),
            ("static_body", |d| Ok(Box::new(StaticBody::from_data(d)?))),
            ("rigid_body", |d| Ok(Box::new(RigidBody::from_data(d)?))),
            ("mesh", |d| Ok(Box::new(Mesh::from_data(d)?))),
            ("model", |d| Ok(Box::new(Model::from_data(d)?))),
            ("point_light", |d| Ok(Box::new(PointLight::from_data(d)?))),
            ("billboard", |d| Ok(Box::new(Billboard::from_data(d)?))),
            ("aabb_gizmo", |d| Ok(Box::new(AabbGizmo::from_data(d)?))),
            ("gizmo", |d| Ok(Box::new(Gizmo::from_data(d)?))),
            ("spin", |d| Ok(Box::new(Spin::from_data(d)?))),
        ];
        for (name, factory) in builtin {
            if let Err(e) = registry.register(name, factory) {
                log::error!("{}", e);
            }
        }
        registry
    }

    /// Add a factory; names must be unique
    pub fn register(&mut self, name: &str, factory: ComponentFactory) -> ComponentResult<()> {
        if self.factories.contains_key(name) {
            return Err(ComponentError::DuplicateType(name.to_string()));
        }
        self.factories.insert(name.to_string(), factory);
        log::trace!("Registered component type '{}'", name);
        Ok(())
    }

    /// Whether `name` has a factory
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build a component of type `name` from `data`
    pub fn create(&self, name: &str, data: &DataNode) -> ComponentResult<Box<dyn Component>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ComponentError::UnknownType(name.to_string()))?;
        factory(data)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spin_factory(data: &DataNode) -> ComponentResult<Box<dyn Component>> {
        Ok(Box::new(Spin::from_data(data)?))
    }

    #[test]
    fn test_builtin_names() {
        let registry = ComponentRegistry::with_builtin();
        for name in ["camera", "mesh", "model", "rigid_body", "static_body", "aabb_gizmo"] {
            assert!(registry.contains(name), "{name} missing");
        }
        assert_eq!(registry.names().count(), 11);
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let mut registry = ComponentRegistry::with_builtin();
        let err = registry.register("spin", spin_factory).unwrap_err();
        assert!(matches!(err, ComponentError::DuplicateType(name) if name == "spin"));
        registry.register("spinner", spin_factory).unwrap();
    }

    #[test]
    fn test_create_by_name() {
        let registry = ComponentRegistry::with_builtin();
        let data = DataNode::from_ron_str("(axis: (0.0, 0.0, 1.0), degrees_per_second: 45.0)").unwrap();
        let component = registry.create("spin", &data).unwrap();
        assert_eq!(component.type_name(), "spin");
        let spin = component.downcast_ref::<Spin>().unwrap();
        assert_eq!(spin.degrees_per_second, 45.0);

        assert!(matches!(
            registry.create("teleporter", &data),
            Err(ComponentError::UnknownType(_))
        ));
    }

    #[test]
    fn test_bad_field_fails_the_component_only() {
        let registry = ComponentRegistry::with_builtin();
        let data = DataNode::from_ron_str("(degrees_per_second: \"fast\")").unwrap();
        assert!(matches!(registry.create("spin", &data), Err(ComponentError::Data(_))));
    }
}
