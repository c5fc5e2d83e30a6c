use std::hint::black_box;
use std::time::Instant;

use camoscene_assets::ResourceCache;
use camoscene_common::Vec3Op;
use camoscene_render::{CamouflageParams, Geometry, HeadlessTarget, RenderView, StandardMaterial};
use camoscene_scene::{BodySpawn, Scene, SceneSettings};
use glam::{Quat, Vec3};

fn make_scene(body_count: usize) -> (Scene, Vec<camoscene_common::EntityId>) {
    let mut scene = Scene::new(&SceneSettings::default(), ResourceCache::builtin());
    let side = (body_count as f32).sqrt().ceil() as usize;
    let mut ids = Vec::with_capacity(body_count);
    for i in 0..body_count {
        let x = (i % side.max(1)) as f32 * 1.5;
        let z = (i / side.max(1)) as f32 * 1.5;
        let id = scene
            .spawn_body(&BodySpawn::cuboid(
                StandardMaterial::new("sapphire"),
                Vec3::new(x, 2.0, z),
                Quat::IDENTITY,
                Vec3::ONE,
                1.0,
            ))
            .unwrap();
        ids.push(id);
    }
    scene
        .spawn_camouflage(Geometry::sphere(1.0), CamouflageParams::default(), "sapphire")
        .unwrap();
    (scene, ids)
}

fn bench_tick(body_count: usize, iterations: usize) {
    let (mut scene, _) = make_scene(body_count);
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(scene.tick(black_box(1.0 / 60.0)).unwrap());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  tick ({body_count} bodies, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_rescale(body_count: usize, iterations: usize) {
    let (mut scene, ids) = make_scene(body_count);
    let start = Instant::now();
    for i in 0..iterations {
        let s = 1.0 + (i % 4) as f32 * 0.25;
        for &id in &ids {
            scene
                .context_mut()
                .edit_transform(id, |t| t.scale.mutate(Vec3Op::SetScalar(s)))
                .unwrap();
        }
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  rescale all ({body_count} bodies, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_capture(iterations: usize) {
    let (mut scene, _) = make_scene(0);
    let mut target = HeadlessTarget::new();
    let view = RenderView::default();
    let start = Instant::now();
    for i in 0..iterations {
        // Alternate sizes to exercise the resize path.
        let viewport = if i % 2 == 0 { (1280, 720) } else { (1920, 1080) };
        let _ = black_box(scene.capture(&mut target, viewport, &view).unwrap());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  capture ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn main() {
    println!("=== Scene Benchmarks ===\n");

    println!("Tick (physics + bus):");
    bench_tick(10, 1000);
    bench_tick(100, 100);
    bench_tick(1000, 10);

    println!("\nShape rebuild from scale:");
    bench_rescale(10, 1000);
    bench_rescale(100, 100);

    println!("\nCompositor capture:");
    bench_capture(10000);

    println!("\n=== Done ===");
}
