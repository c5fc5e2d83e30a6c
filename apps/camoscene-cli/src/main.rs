use anyhow::{Context as _, Result};
use camoscene_assets::{Manifest, ResourceCache};
use camoscene_render::shading::{self, FragmentInput, SolidSampler};
use camoscene_render::{
    BASE_COLOR_LABEL, CamouflageParams, DebugTextRenderer, Geometry, HeadlessTarget, RenderView,
    Renderer, ScreenTexture, StandardMaterial, TUNABLES, Tunable,
};
use camoscene_scene::{BodySpawn, Scene, SceneInspector, SceneSettings};
use clap::{Parser, Subcommand};
use glam::{Quat, Vec2, Vec3, Vec4};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "camoscene-cli", about = "Headless tools for the camouflage demo")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the built-in resources
    Info,
    /// List the shader parameters exposed in the desktop panel
    Tunables,
    /// Run the demo scene headless and dump the final frame
    Simulate {
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        ticks: u32,
        /// Frame delta in seconds
        #[arg(long, default_value = "0.016666668")]
        dt: f32,
        /// Camouflage strength, nominally 0..=1
        #[arg(short, long, default_value = "0.5")]
        strength: f32,
        /// Viewport width for the offscreen capture
        #[arg(long, default_value = "1280")]
        width: u32,
        /// Viewport height for the offscreen capture
        #[arg(long, default_value = "720")]
        height: u32,
        /// Also drop a box onto a ground plane
        #[arg(long)]
        bodies: bool,
        /// Scene settings file (JSON)
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Evaluate the camouflage shader over the demo sphere and print its coverage
    Shade {
        #[arg(short, long, default_value = "0.5")]
        strength: f32,
        /// Seconds of accumulated shader time
        #[arg(long, default_value = "0.0")]
        time: f32,
        #[arg(long, default_value = "48")]
        columns: u32,
        #[arg(long, default_value = "24")]
        rows: u32,
    },
    /// Write the demo asset manifest
    Manifest {
        /// Output path
        #[arg(default_value = "assets.json")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => info(),
        Commands::Tunables => tunables(),
        Commands::Simulate {
            ticks,
            dt,
            strength,
            width,
            height,
            bodies,
            settings,
        } => {
            let settings = match settings {
                Some(path) => SceneSettings::load(&path)
                    .with_context(|| format!("reading settings {}", path.display()))?,
                None => SceneSettings::default(),
            };
            simulate(&settings, ticks, dt, strength, (width, height), bodies)?;
        }
        Commands::Shade {
            strength,
            time,
            columns,
            rows,
        } => shade(strength, time, columns.max(1), rows.max(1)),
        Commands::Manifest { path } => {
            Manifest::demo().save(&path)?;
            println!("wrote {}", path.display());
        }
    }

    Ok(())
}

fn info() {
    println!("camoscene-cli v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "kernel: fixed step {:.4}s",
        camoscene_kernel::FixedStepClock::sixty_hz().step()
    );
    println!(
        "physics: rapier, min extent {}",
        camoscene_physics::MIN_EXTENT
    );
    println!("render: {}", camoscene_render::crate_info());
    println!("scene: {}", camoscene_scene::crate_info());

    let resources = ResourceCache::builtin();
    let sets: Vec<&str> = resources.texture_set_names().collect();
    let envs: Vec<&str> = resources.environment_names().collect();
    println!("texture sets: {}", sets.join(", "));
    println!("environments: {}", envs.join(", "));
}

fn tunables() {
    let defaults = CamouflageParams::default();
    let [r, g, b] = defaults.base_color_rgb();
    println!("{BASE_COLOR_LABEL:<20} ({r:.2}, {g:.2}, {b:.2})  rgb in [0.00, 1.00]");
    for tunable in TUNABLES {
        let (min, max) = tunable.range();
        let current = match tunable {
            Tunable::CamouflageStrength => camoscene_render::DualMaterialObject::DEFAULT_STRENGTH,
            _ => tunable.get(&defaults).unwrap_or_default(),
        };
        println!(
            "{:<20} {:>6.2}  [{min:.2}, {max:.2}] step {:.2}",
            tunable.label(),
            current,
            tunable.step()
        );
    }
}

fn simulate(
    settings: &SceneSettings,
    ticks: u32,
    dt: f32,
    strength: f32,
    viewport: (u32, u32),
    bodies: bool,
) -> Result<()> {
    let mut scene = Scene::new(settings, ResourceCache::builtin());
    scene.spawn_camouflage(
        Geometry::sphere(1.0),
        CamouflageParams::default(),
        &settings.texture_set,
    )?;
    if let Some(object) = scene.context_mut().camouflage_mut() {
        object.camouflage_strength = strength;
    }

    if bodies {
        let material = StandardMaterial::new(settings.texture_set.clone());
        scene.spawn_body(
            &BodySpawn::plane(
                material.clone(),
                Vec3::new(0.0, -1.0, 0.0),
                Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
                Vec2::new(10.0, 10.0),
                0.0,
            )
            .named("ground"),
        )?;
        scene.spawn_body(
            &BodySpawn::cuboid(
                material,
                Vec3::new(2.0, 3.0, 0.0),
                Quat::IDENTITY,
                Vec3::splat(0.5),
                1.0,
            )
            .named("crate"),
        )?;
    }

    let view = settings.render_view();
    let mut target = HeadlessTarget::new();
    for _ in 0..ticks {
        scene.tick(dt)?;
        scene.capture(&mut target, viewport, &view)?;
    }

    let frame = DebugTextRenderer::new().render(&scene.context().render_scene(), &view);
    println!("{frame}");
    println!("{}", SceneInspector::summary(&scene));
    for id in SceneInspector::list_entities(scene.context()) {
        if let Some(entity) = SceneInspector::inspect_entity(scene.context(), id) {
            println!("  {entity}");
        }
    }
    println!(
        "captures: {} at {}x{}",
        target.requests().len(),
        target.size().0,
        target.size().1
    );
    Ok(())
}

/// Ray-cast the unit sphere from the default camera and run the fragment
/// program on every hit.
fn shade(strength: f32, time: f32, columns: u32, rows: u32) {
    const RAMP: &[u8] = b" .:-=+*#%@";

    let view = RenderView::default();
    let view_matrix = view.view_matrix();
    let aspect = columns as f32 / rows as f32;
    let inverse = (view.projection_matrix(aspect) * view_matrix).inverse();

    let params = CamouflageParams {
        strength,
        time,
        screen_size: Vec2::new(columns as f32, rows as f32),
        screen_texture: Some(ScreenTexture {
            slot: 0,
            generation: 1,
            width: columns,
            height: rows,
        }),
        ..CamouflageParams::default()
    };
    let backdrop = SolidSampler(Vec4::new(0.2, 0.4, 0.8, 1.0));

    let (mut hits, mut total) = (0u32, 0.0f32);
    for row in 0..rows {
        let mut line = String::with_capacity(columns as usize);
        for col in 0..columns {
            let ndc = Vec2::new(
                (col as f32 + 0.5) / columns as f32 * 2.0 - 1.0,
                1.0 - (row as f32 + 0.5) / rows as f32 * 2.0,
            );
            let near = inverse.project_point3(ndc.extend(0.0));
            let far = inverse.project_point3(ndc.extend(1.0));
            let Some(world) = hit_unit_sphere(near, (far - near).normalize()) else {
                line.push(' ');
                continue;
            };

            let input = FragmentInput {
                frag_coord: Vec2::new(col as f32 + 0.5, row as f32 + 0.5),
                view_normal: view_matrix.transform_vector3(world).normalize(),
                view_position: view_matrix.transform_point3(world),
                world_position: world,
            };
            let alpha = shading::shade(&input, &params, Some(&backdrop)).w;
            hits += 1;
            total += alpha;

            let level = (alpha.clamp(0.0, 1.0) * (RAMP.len() - 1) as f32).round() as usize;
            line.push(char::from(RAMP[level.min(RAMP.len() - 1)]));
        }
        println!("{}", line.trim_end());
    }
    let mean = if hits > 0 { total / hits as f32 } else { 0.0 };
    println!("strength={strength:.2} time={time:.2} fragments={hits} mean_alpha={mean:.3}");
}

fn hit_unit_sphere(origin: Vec3, dir: Vec3) -> Option<Vec3> {
    let b = origin.dot(dir);
    let c = origin.length_squared() - 1.0;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    (t > 0.0).then(|| origin + dir * t)
}
