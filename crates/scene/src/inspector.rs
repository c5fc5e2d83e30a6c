use crate::context::SceneContext;
use crate::scene::Scene;
use camoscene_common::{EntityId, Transform};
use camoscene_physics::CollisionShape;

/// Read-only queries against a scene, for the CLI and debug panels.
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary(scene: &Scene) -> SceneSummary {
        let ctx = scene.context();
        SceneSummary {
            frames: scene.frames(),
            physics_steps: ctx.physics.steps(),
            nodes: ctx.graph.node_count(),
            bodies: ctx.physics.body_count(),
            bindings: ctx.binding_count(),
            listeners: scene.bus().len(),
            camouflage: ctx.camouflage().map(|object| CamouflageSummary {
                strength: object.camouflage_strength,
                standard_opacity: object.standard_opacity(),
                time: object.camouflage().time,
                captured: object.camouflage().screen_texture.is_some(),
            }),
        }
    }

    /// Details for a rigid body object or the camouflage object.
    pub fn inspect_entity(ctx: &SceneContext, id: EntityId) -> Option<EntityInfo> {
        let name = ctx
            .graph
            .get(id)
            .map(|node| node.name.clone())
            .unwrap_or_default();
        let attached = ctx.graph.is_reachable(id);

        if let Some(binding) = ctx.binding(id) {
            return Some(EntityInfo {
                id,
                name,
                transform: binding.transform().snapshot(),
                shape: Some(binding.shape()),
                attached,
            });
        }
        ctx.camouflage()
            .filter(|object| object.entity() == id)
            .map(|object| EntityInfo {
                id,
                name,
                transform: object.transform,
                shape: None,
                attached,
            })
    }

    /// Every object the scene owns, bodies first.
    pub fn list_entities(ctx: &SceneContext) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = ctx.bindings().map(|b| b.entity()).collect();
        ids.extend(ctx.camouflage().map(|object| object.entity()));
        ids
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CamouflageSummary {
    pub strength: f32,
    pub standard_opacity: f32,
    pub time: f32,
    pub captured: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSummary {
    pub frames: u64,
    pub physics_steps: u64,
    pub nodes: usize,
    pub bodies: usize,
    pub bindings: usize,
    pub listeners: usize,
    pub camouflage: Option<CamouflageSummary>,
}

impl std::fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scene: frames={} physics_steps={} nodes={} bodies={} bindings={} listeners={}",
            self.frames, self.physics_steps, self.nodes, self.bodies, self.bindings, self.listeners
        )?;
        if let Some(camo) = &self.camouflage {
            write!(
                f,
                " camouflage(strength={:.2} opacity={:.2} time={:.2} captured={})",
                camo.strength, camo.standard_opacity, camo.time, camo.captured
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub name: String,
    pub transform: Transform,
    /// `None` for objects without a rigid body.
    pub shape: Option<CollisionShape>,
    pub attached: bool,
}

impl std::fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p = self.transform.position;
        let s = self.transform.scale;
        write!(
            f,
            "Entity [{}] {} pos=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2})",
            self.id.short(),
            self.name,
            p.x,
            p.y,
            p.z,
            s.x,
            s.y,
            s.z,
        )?;
        match self.shape {
            Some(shape) => write!(f, " shape={shape:?}")?,
            None => write!(f, " shape=none")?,
        }
        if !self.attached {
            write!(f, " (detached)")?;
        }
        Ok(())
    }
}
