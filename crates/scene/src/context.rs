use crate::binding::{BodySpawn, RigidBodyBinding};
use crate::error::SceneError;
use camoscene_assets::ResourceCache;
use camoscene_common::{EntityId, TrackedTransform};
use camoscene_kernel::{ListenerId, Reachability, SceneGraph};
use camoscene_physics::PhysicsWorld;
use camoscene_render::{
    Compositor, DrawItem, DualMaterialObject, GeometryRegistry, Lighting, MaterialRef, Mesh,
    RenderScene,
};
use std::collections::BTreeMap;

/// Everything a per-frame listener may touch.
///
/// Owns the scene graph, the physics world, every rigid-body binding and
/// the camouflage object. Listeners receive it by `&mut` from the update
/// bus; the bus itself lives beside it in [`crate::Scene`].
pub struct SceneContext {
    pub graph: SceneGraph,
    pub physics: PhysicsWorld,
    pub geometries: GeometryRegistry,
    pub resources: ResourceCache,
    pub compositor: Compositor,
    pub lighting: Lighting,
    pub environment: Option<String>,
    pub(crate) bindings: BTreeMap<EntityId, RigidBodyBinding>,
    pub(crate) camouflage: Option<DualMaterialObject>,
    pub(crate) pending_unsubscribe: Vec<ListenerId>,
    camouflage_listener: Option<ListenerId>,
}

impl SceneContext {
    pub fn new(physics: PhysicsWorld, resources: ResourceCache) -> Self {
        Self {
            graph: SceneGraph::new(),
            physics,
            geometries: GeometryRegistry::new(),
            resources,
            compositor: Compositor::new(),
            lighting: Lighting::default(),
            environment: None,
            bindings: BTreeMap::new(),
            camouflage: None,
            pending_unsubscribe: Vec::new(),
            camouflage_listener: None,
        }
    }

    pub fn binding(&self, entity: EntityId) -> Option<&RigidBodyBinding> {
        self.bindings.get(&entity)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &RigidBodyBinding> {
        self.bindings.values()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn camouflage(&self) -> Option<&DualMaterialObject> {
        self.camouflage.as_ref()
    }

    pub fn camouflage_mut(&mut self) -> Option<&mut DualMaterialObject> {
        self.camouflage.as_mut()
    }

    /// Create the binding and its detached graph node. The body joins the
    /// world once the node is attached.
    pub(crate) fn insert_binding(
        &mut self,
        spawn: &BodySpawn,
        listener: ListenerId,
    ) -> Result<EntityId, SceneError> {
        let geometry = self.geometries.register(spawn.geometry);
        let entity = self.graph.create(spawn.name.clone());
        let mut binding = RigidBodyBinding::new(entity, spawn, geometry, listener);
        binding.flush(&mut self.physics)?;
        tracing::debug!(
            entity = %entity.short(),
            kind = ?spawn.kind,
            mass = spawn.mass,
            "rigid body bound"
        );
        self.bindings.insert(entity, binding);
        Ok(entity)
    }

    pub(crate) fn insert_camouflage(
        &mut self,
        object: DualMaterialObject,
        listener: ListenerId,
    ) -> Result<(), SceneError> {
        if self.camouflage.is_some() {
            return Err(SceneError::CamouflageExists);
        }
        self.camouflage = Some(object);
        self.camouflage_listener = Some(listener);
        Ok(())
    }

    /// Parent `child` under `parent`, adding bodies for whatever became
    /// reachable.
    pub fn attach(&mut self, child: EntityId, parent: EntityId) -> Result<(), SceneError> {
        let delta = self.graph.attach(child, parent)?;
        self.apply_reachability(&delta)
    }

    pub fn add_to_root(&mut self, child: EntityId) -> Result<(), SceneError> {
        let delta = self.graph.add_to_root(child)?;
        self.apply_reachability(&delta)
    }

    /// Unparent `child`, removing bodies for whatever became unreachable.
    pub fn detach(&mut self, child: EntityId) -> Result<(), SceneError> {
        let delta = self.graph.detach(child)?;
        self.apply_reachability(&delta)
    }

    fn apply_reachability(&mut self, delta: &[Reachability]) -> Result<(), SceneError> {
        for change in delta {
            let Some(binding) = self.bindings.get_mut(&change.entity()) else {
                continue;
            };
            match change {
                Reachability::Attached(_) => {
                    binding.on_attach(&mut self.physics);
                }
                Reachability::Detached(_) => {
                    binding.on_detach(&mut self.physics)?;
                }
            }
        }
        Ok(())
    }

    /// Edit a binding's transform. Changes reach the physics body before
    /// this returns.
    pub fn edit_transform<R>(
        &mut self,
        entity: EntityId,
        edit: impl FnOnce(&mut TrackedTransform) -> R,
    ) -> Result<R, SceneError> {
        let binding = self
            .bindings
            .get_mut(&entity)
            .ok_or(SceneError::UnknownEntity(entity))?;
        let out = edit(binding.transform_mut());
        binding.flush(&mut self.physics)?;
        Ok(out)
    }

    /// Pull a dynamic body's pose into its transform.
    pub fn sync_from_physics(&mut self, entity: EntityId) -> Result<bool, SceneError> {
        let binding = self
            .bindings
            .get_mut(&entity)
            .ok_or(SceneError::UnknownEntity(entity))?;
        Ok(binding.pull_from_body(&self.physics)?)
    }

    /// Tear down a binding and its descendants' bindings. Their bus
    /// listeners are queued for removal. A second call returns `false`.
    pub fn dispose(&mut self, entity: EntityId) -> Result<bool, SceneError> {
        if !self.bindings.contains_key(&entity) {
            return Ok(false);
        }
        let subtree = self.graph.subtree(entity);
        if self.graph.contains(entity) {
            let delta = self.graph.destroy(entity)?;
            self.apply_reachability(&delta)?;
        }
        for id in subtree {
            if let Some(mut binding) = self.bindings.remove(&id) {
                binding.on_detach(&mut self.physics)?;
                self.pending_unsubscribe.push(binding.listener());
                tracing::debug!(entity = %id.short(), "rigid body disposed");
            }
        }
        Ok(true)
    }

    /// Remove the camouflage object. Returns `false` if there was none.
    pub fn dispose_camouflage(&mut self) -> Result<bool, SceneError> {
        let Some(object) = self.camouflage.take() else {
            return Ok(false);
        };
        if self.graph.contains(object.entity()) {
            let delta = self.graph.destroy(object.entity())?;
            self.apply_reachability(&delta)?;
        }
        if let Some(id) = self.camouflage_listener.take() {
            self.pending_unsubscribe.push(id);
        }
        Ok(true)
    }

    /// Snapshot of everything reachable, in the shape renderers consume.
    pub fn render_scene(&self) -> RenderScene {
        let mut items = Vec::new();
        for binding in self.bindings.values() {
            if !self.graph.is_reachable(binding.entity()) {
                continue;
            }
            items.push(DrawItem {
                entity: binding.entity(),
                mesh: Mesh {
                    geometry: binding.geometry(),
                    material: MaterialRef::Standard(binding.material().clone()),
                    render_order: DualMaterialObject::STANDARD_ORDER,
                },
                model: binding.transform().snapshot().matrix(),
            });
        }

        let mut camouflage = Default::default();
        if let Some(object) = &self.camouflage {
            if self.graph.is_reachable(object.entity()) {
                items.extend(object.draw_items());
            }
            camouflage = *object.camouflage();
        }

        RenderScene {
            items,
            lighting: self.lighting,
            environment: self.environment.clone(),
            camouflage,
        }
    }
}
