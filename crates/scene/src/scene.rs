use crate::binding::BodySpawn;
use crate::context::SceneContext;
use crate::error::SceneError;
use crate::settings::SceneSettings;
use camoscene_assets::ResourceCache;
use camoscene_common::EntityId;
use camoscene_kernel::{FixedStepClock, ListenerId, UpdateBus};
use camoscene_physics::PhysicsWorld;
use camoscene_render::{
    CamouflageParams, DualMaterialObject, Geometry, OffscreenRenderer, RenderError, RenderView,
    ScreenTexture,
};

/// Outcome of one [`Scene::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Fixed physics steps taken this tick.
    pub physics_steps: u32,
    /// Listeners notified.
    pub listeners: usize,
}

/// A scene context plus the bus and clock that drive it.
///
/// Per tick: physics steps, then every listener runs with the frame delta,
/// then listener removals queued during the broadcast are applied.
pub struct Scene {
    ctx: SceneContext,
    bus: UpdateBus<SceneContext, SceneError>,
    clock: FixedStepClock,
    frames: u64,
}

impl Scene {
    pub fn new(settings: &SceneSettings, resources: ResourceCache) -> Self {
        let physics = PhysicsWorld::with_timestep(settings.gravity, settings.fixed_timestep as f32);
        let mut ctx = SceneContext::new(physics, resources);
        ctx.environment = settings.environment.clone();
        Self {
            ctx,
            bus: UpdateBus::new(),
            clock: FixedStepClock::new(settings.fixed_timestep, settings.max_substeps),
            frames: 0,
        }
    }

    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    pub fn bus(&self) -> &UpdateBus<SceneContext, SceneError> {
        &self.bus
    }

    pub fn clock(&self) -> &FixedStepClock {
        &self.clock
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Subscribe an extra per-frame listener.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&mut SceneContext, f32) -> Result<(), SceneError> + 'static,
    ) -> ListenerId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Build a rigid body object, add it under the root and subscribe its
    /// pose sync.
    pub fn spawn_body(&mut self, spawn: &BodySpawn) -> Result<EntityId, SceneError> {
        let listener = self.bus.reserve_id();
        let entity = self.ctx.insert_binding(spawn, listener)?;
        self.ctx.add_to_root(entity)?;
        self.bus.subscribe_keyed(listener, move |ctx: &mut SceneContext, _dt| {
            ctx.sync_from_physics(entity).map(|_| ())
        });
        Ok(entity)
    }

    /// Build the dual-material camouflage object, add it under the root and
    /// subscribe its per-frame update. At most one per scene.
    pub fn spawn_camouflage(
        &mut self,
        geometry: Geometry,
        params: CamouflageParams,
        texture_set: &str,
    ) -> Result<EntityId, SceneError> {
        if self.ctx.camouflage.is_some() {
            return Err(SceneError::CamouflageExists);
        }
        // Resolve before touching the graph or the registry so a bad name
        // leaves nothing behind.
        self.ctx
            .resources
            .texture_set(texture_set)
            .map_err(RenderError::from)?;
        let handle = self.ctx.geometries.register(geometry);
        let entity = self.ctx.graph.create("camouflage");
        let object =
            DualMaterialObject::new(entity, handle, params, texture_set, &self.ctx.resources)?;
        self.ctx.add_to_root(entity)?;

        let listener = self.bus.subscribe(|ctx: &mut SceneContext, dt| {
            if let Some(object) = ctx.camouflage.as_mut() {
                object.update(dt);
            }
            Ok(())
        });
        self.ctx.insert_camouflage(object, listener)?;
        tracing::info!(entity = %entity.short(), texture_set, "camouflage object spawned");
        Ok(entity)
    }

    /// Dispose a rigid body object. A second call is a no-op returning
    /// `false`.
    pub fn dispose(&mut self, entity: EntityId) -> Result<bool, SceneError> {
        let disposed = self.ctx.dispose(entity)?;
        self.apply_pending_unsubscribes();
        Ok(disposed)
    }

    pub fn dispose_camouflage(&mut self) -> Result<bool, SceneError> {
        let disposed = self.ctx.dispose_camouflage()?;
        self.apply_pending_unsubscribes();
        Ok(disposed)
    }

    /// Advance one frame by `delta` seconds.
    pub fn tick(&mut self, delta: f32) -> Result<TickReport, SceneError> {
        let physics_steps = self.clock.advance(f64::from(delta));
        for _ in 0..physics_steps {
            self.ctx.physics.fixed_step();
        }

        let listeners = self.bus.len();
        let result = self.bus.invoke(&mut self.ctx, delta);
        self.apply_pending_unsubscribes();
        result?;

        self.frames += 1;
        Ok(TickReport {
            physics_steps,
            listeners,
        })
    }

    /// Match the viewport and capture the scene offscreen for the
    /// camouflage shader. Returns `None` without a camouflage object.
    pub fn capture<R: OffscreenRenderer + ?Sized>(
        &mut self,
        backend: &mut R,
        viewport: (u32, u32),
        view: &RenderView,
    ) -> Result<Option<ScreenTexture>, SceneError> {
        let ctx = &mut self.ctx;
        let Some(object) = ctx.camouflage.as_mut() else {
            return Ok(None);
        };
        ctx.compositor.prepare(viewport, object.camouflage_mut());

        let scene = ctx.render_scene();
        let Some(object) = ctx.camouflage.as_mut() else {
            return Ok(None);
        };
        let texture = ctx
            .compositor
            .capture(backend, &scene, view, object.camouflage_mut())?;
        Ok(Some(texture))
    }

    fn apply_pending_unsubscribes(&mut self) {
        for id in self.ctx.pending_unsubscribe.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camoscene_common::Vec3Op;
    use camoscene_physics::CollisionShape;
    use camoscene_render::{HeadlessTarget, StandardMaterial};
    use glam::{Quat, Vec2, Vec3};

    fn scene() -> Scene {
        Scene::new(&SceneSettings::default(), ResourceCache::builtin())
    }

    fn crate_spawn(mass: f32) -> BodySpawn {
        BodySpawn::cuboid(
            StandardMaterial::new("sapphire"),
            Vec3::new(0.0, 2.0, 0.0),
            Quat::IDENTITY,
            Vec3::ONE,
            mass,
        )
    }

    #[test]
    fn spawn_adds_body_and_listener() {
        let mut s = scene();
        let id = s.spawn_body(&crate_spawn(1.0)).unwrap();
        assert_eq!(s.context().physics.body_count(), 1);
        assert!(s.context().graph.is_reachable(id));
        assert_eq!(s.bus().len(), 1);
    }

    #[test]
    fn alternating_attach_detach_keeps_body_count() {
        let mut s = scene();
        let id = s.spawn_body(&crate_spawn(0.0)).unwrap();
        let before = s.context().physics.body_count();
        for i in 0..10 {
            if i % 2 == 0 {
                s.context_mut().detach(id).unwrap();
                assert_eq!(s.context().physics.body_count(), before - 1);
            } else {
                s.context_mut().add_to_root(id).unwrap();
                assert_eq!(s.context().physics.body_count(), before);
            }
        }
        assert_eq!(s.context().physics.body_count(), before);
    }

    #[test]
    fn redundant_attach_adds_nothing() {
        let mut s = scene();
        let id = s.spawn_body(&crate_spawn(0.0)).unwrap();
        s.context_mut().add_to_root(id).unwrap();
        s.context_mut().add_to_root(id).unwrap();
        assert_eq!(s.context().physics.body_count(), 1);
    }

    #[test]
    fn subtree_bodies_follow_group() {
        let mut s = scene();
        let a = s.spawn_body(&crate_spawn(0.0)).unwrap();
        let b = s.spawn_body(&crate_spawn(0.0)).unwrap();
        s.context_mut().attach(b, a).unwrap();
        assert_eq!(s.context().physics.body_count(), 2);

        s.context_mut().detach(a).unwrap();
        assert_eq!(s.context().physics.body_count(), 0);
        s.context_mut().add_to_root(a).unwrap();
        assert_eq!(s.context().physics.body_count(), 2);
    }

    #[test]
    fn scale_edit_replaces_shape() {
        let mut s = scene();
        let id = s.spawn_body(&crate_spawn(0.0)).unwrap();
        s.context_mut()
            .edit_transform(id, |t| t.scale.mutate(Vec3Op::Set(Vec3::new(2.0, 4.0, 6.0))))
            .unwrap();
        let body = s.context().binding(id).unwrap().body().unwrap();
        assert_eq!(
            s.context().physics.shape(body).unwrap(),
            CollisionShape::Box {
                half_extents: Vec3::new(1.0, 2.0, 3.0)
            }
        );
    }

    #[test]
    fn dispose_twice_is_a_noop() {
        let mut s = scene();
        let id = s.spawn_body(&crate_spawn(1.0)).unwrap();
        assert!(s.dispose(id).unwrap());
        assert_eq!(s.context().physics.body_count(), 0);
        assert!(s.bus().is_empty());
        assert!(!s.context().graph.contains(id));

        assert!(!s.dispose(id).unwrap());
        assert!(s.bus().is_empty());
    }

    #[test]
    fn listener_can_dispose_during_tick() {
        let mut s = scene();
        let id = s.spawn_body(&crate_spawn(1.0)).unwrap();
        s.subscribe(move |ctx, _| ctx.dispose(id).map(|_| ()));
        s.tick(1.0 / 60.0).unwrap();
        assert_eq!(s.context().binding_count(), 0);
        // Only the disposing listener itself remains.
        assert_eq!(s.bus().len(), 1);
    }

    #[test]
    fn dynamic_bodies_fall_and_sync() {
        let mut s = scene();
        let id = s.spawn_body(&crate_spawn(1.0)).unwrap();
        for _ in 0..30 {
            s.tick(1.0 / 60.0).unwrap();
        }
        let y = s.context().binding(id).unwrap().transform().position.get().y;
        assert!(y < 2.0);
        assert!(s.context().physics.steps() >= 29);
    }

    #[test]
    fn physics_step_follows_settings_timestep() {
        let settings = SceneSettings {
            fixed_timestep: 1.0 / 120.0,
            ..SceneSettings::default()
        };
        let mut s = Scene::new(&settings, ResourceCache::builtin());
        assert!((s.context().physics.timestep() - 1.0 / 120.0).abs() < 1e-9);
        let id = s
            .spawn_body(&BodySpawn::cuboid(
                StandardMaterial::new("sapphire"),
                Vec3::new(0.0, 100.0, 0.0),
                Quat::IDENTITY,
                Vec3::ONE,
                1.0,
            ))
            .unwrap();

        // One wall-clock second at 60 fps.
        for _ in 0..60 {
            s.tick(1.0 / 60.0).unwrap();
        }
        let steps = s.context().physics.steps();
        assert!((119..=121).contains(&steps), "steps={steps}");
        let drop = 100.0 - s.context().binding(id).unwrap().transform().position.get().y;
        assert!((4.5..5.5).contains(&drop), "dropped {drop}");
    }

    #[test]
    fn tick_errors_halt_the_frame() {
        let mut s = scene();
        let ghost = EntityId::new();
        s.subscribe(move |ctx, _| ctx.sync_from_physics(ghost).map(|_| ()));
        assert!(matches!(
            s.tick(0.016),
            Err(SceneError::UnknownEntity(id)) if id == ghost
        ));
        assert_eq!(s.frames(), 0);
    }

    #[test]
    fn camouflage_blend_follows_strength() {
        let mut s = scene();
        s.spawn_camouflage(Geometry::sphere(1.0), CamouflageParams::default(), "sapphire")
            .unwrap();
        for (strength, opacity) in [(0.0, 1.0), (1.0, 0.0), (0.3, 0.7)] {
            s.context_mut().camouflage_mut().unwrap().camouflage_strength = strength;
            s.tick(0.016).unwrap();
            let obj = s.context().camouflage().unwrap();
            assert!((obj.standard_opacity() - opacity).abs() < 1e-6);
            assert_eq!(obj.camouflage().strength, strength);
        }
        assert!(s.context().camouflage().unwrap().camouflage().time > 0.0);
    }

    #[test]
    fn second_camouflage_is_rejected() {
        let mut s = scene();
        s.spawn_camouflage(Geometry::sphere(1.0), CamouflageParams::default(), "sapphire")
            .unwrap();
        assert!(matches!(
            s.spawn_camouflage(Geometry::sphere(1.0), CamouflageParams::default(), "sapphire"),
            Err(SceneError::CamouflageExists)
        ));
    }

    #[test]
    fn unknown_texture_set_fails_spawn() {
        let mut s = scene();
        let err = s
            .spawn_camouflage(Geometry::sphere(1.0), CamouflageParams::default(), "granite")
            .unwrap_err();
        assert!(matches!(err, SceneError::Render(_)));
        assert!(s.context().camouflage().is_none());
        assert_eq!(s.context().graph.node_count(), 1);
        assert!(s.context().geometries.is_empty());
    }

    #[test]
    fn capture_tracks_viewport() {
        let mut s = scene();
        s.spawn_camouflage(Geometry::sphere(1.0), CamouflageParams::default(), "sapphire")
            .unwrap();
        let mut target = HeadlessTarget::new();
        let view = RenderView::default();

        s.tick(0.016).unwrap();
        s.capture(&mut target, (800, 600), &view).unwrap();
        s.tick(0.016).unwrap();
        let tex = s.capture(&mut target, (1920, 1080), &view).unwrap().unwrap();

        let params = s.context().camouflage().unwrap().camouflage();
        assert_eq!(params.screen_size, Vec2::new(1920.0, 1080.0));
        assert_eq!(params.screen_texture, Some(tex));
        assert_eq!(target.size(), (1920, 1080));
        // Standard and camouflage meshes both drawn into the capture.
        assert_eq!(target.draws(), 4);
    }

    #[test]
    fn render_scene_orders_overlay_last() {
        let mut s = scene();
        s.spawn_body(&crate_spawn(0.0)).unwrap();
        s.spawn_camouflage(Geometry::sphere(1.0), CamouflageParams::default(), "sapphire")
            .unwrap();
        let scene = s.context().render_scene();
        let ordered = scene.ordered();
        assert_eq!(ordered.len(), 3);
        assert_eq!(
            ordered.last().unwrap().mesh.render_order,
            DualMaterialObject::CAMOUFLAGE_ORDER
        );
    }
}
