//! CPU evaluation of the camouflage fragment program.
//!
//! Each function matches a WGSL function of the same name in the GPU
//! backend. Tests and the CLI `shade` command go through here.

use crate::params::CamouflageParams;
use glam::{Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

/// Varyings reaching one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentInput {
    /// Window-space pixel coordinate.
    pub frag_coord: Vec2,
    /// View-space unit normal.
    pub view_normal: Vec3,
    /// View-space surface position. The camera sits at the origin.
    pub view_position: Vec3,
    pub world_position: Vec3,
}

/// Something the shader can read the previous capture from.
pub trait ScreenSampler {
    /// RGBA at normalized coordinates. Implementations choose wrapping.
    fn sample(&self, uv: Vec2) -> Vec4;
}

/// Uniform color everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidSampler(pub Vec4);

impl ScreenSampler for SolidSampler {
    fn sample(&self, _uv: Vec2) -> Vec4 {
        self.0
    }
}

/// Nearest-texel lookup into an RGBA8 buffer, clamped to the edge.
#[derive(Debug, Clone, Copy)]
pub struct PixelSampler<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

impl ScreenSampler for PixelSampler<'_> {
    fn sample(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 {
            return Vec4::ZERO;
        }
        let uv = uv.clamp(Vec2::ZERO, Vec2::ONE);
        let x = ((uv.x * self.width as f32) as u32).min(self.width - 1);
        let y = ((uv.y * self.height as f32) as u32).min(self.height - 1);
        let i = ((y * self.width + x) * 4) as usize;
        match self.pixels.get(i..i + 4) {
            Some(px) => Vec4::new(
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
                px[3] as f32 / 255.0,
            ),
            None => Vec4::ZERO,
        }
    }
}

/// Hermite smoothstep, `t * t * (3 - 2t)` per component.
pub fn fade(t: Vec2) -> Vec2 {
    t * t * (Vec2::splat(3.0) - 2.0 * t)
}

/// Pseudo-random gradient at lattice point `p`, dotted with `offset`.
pub fn grad(p: Vec2, offset: Vec2) -> f32 {
    let g = Vec2::new(
        p.dot(Vec2::new(127.1, 311.7)).sin(),
        p.dot(Vec2::new(269.5, 183.3)).cos(),
    );
    offset.dot(g)
}

/// Gradient noise. Continuous everywhere, roughly in [-1, 1].
pub fn perlin(p: Vec2) -> f32 {
    let i = p.floor();
    let f = p - i;

    let a = grad(i, f);
    let b = grad(i + Vec2::X, f - Vec2::X);
    let c = grad(i + Vec2::Y, f - Vec2::Y);
    let d = grad(i + Vec2::ONE, f - Vec2::ONE);

    let u = fade(f);
    let ab = a + (b - a) * u.x;
    let cd = c + (d - c) * u.x;
    ab + (cd - ab) * u.y
}

/// Edge factor: 1 at grazing angles, 0 facing the camera.
pub fn fresnel(view_normal: Vec3, view_position: Vec3, edge_falloff: f32) -> f32 {
    let v = (-view_position).normalize_or_zero();
    let facing = view_normal.normalize_or_zero().dot(v).max(0.0);
    (1.0 - facing).powf(edge_falloff)
}

/// Noise lookup coordinate for a world position at the params' time.
pub fn noise_coord(world_position: Vec3, params: &CamouflageParams) -> Vec2 {
    world_position.xy() * params.scale + params.scroll_offset()
}

/// Overlay amount. Not clamped.
pub fn composite_amount(edge: f32, distortion: f32, strength: f32) -> f32 {
    edge * strength + distortion * strength
}

/// Where the overlay reads the previous capture.
pub fn screen_uv(input: &FragmentInput, params: &CamouflageParams) -> Vec2 {
    input.frag_coord / params.screen_size + input.view_normal.xy() * params.ior
}

/// Full fragment program. `screen` is ignored while the params hold no
/// capture; an unset capture reads as transparent black.
pub fn shade(
    input: &FragmentInput,
    params: &CamouflageParams,
    screen: Option<&dyn ScreenSampler>,
) -> Vec4 {
    let edge = fresnel(input.view_normal, input.view_position, params.edge_falloff);
    let n = perlin(noise_coord(input.world_position, params));
    let d = n * 2.0 * params.distortion;
    let amount = composite_amount(edge, d, params.strength);

    let scene = match (params.screen_texture, screen) {
        (Some(_), Some(sampler)) => sampler.sample(screen_uv(input, params)),
        _ => Vec4::ZERO,
    };

    let camo = Vec3::ZERO.lerp(params.base_color, amount);
    let color = scene.xyz().lerp(camo, amount);
    color.extend(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::ScreenTexture;

    fn input_at(world: Vec3) -> FragmentInput {
        FragmentInput {
            frag_coord: Vec2::new(400.0, 300.0),
            view_normal: Vec3::new(0.6, 0.0, 0.8),
            view_position: Vec3::new(0.0, 0.0, -5.0),
            world_position: world,
        }
    }

    #[test]
    fn fade_endpoints() {
        assert_eq!(fade(Vec2::ZERO), Vec2::ZERO);
        assert_eq!(fade(Vec2::ONE), Vec2::ONE);
        assert_eq!(fade(Vec2::splat(0.5)), Vec2::splat(0.5));
    }

    #[test]
    fn noise_is_zero_on_lattice_points() {
        for x in -3..3 {
            for y in -3..3 {
                assert_eq!(perlin(Vec2::new(x as f32, y as f32)), 0.0);
            }
        }
    }

    #[test]
    fn noise_is_continuous_across_cells() {
        let eps = 1e-4;
        for i in -4..4 {
            for j in 0..20 {
                let edge = i as f32;
                let along = j as f32 * 0.05 + 0.013;
                // Crossing a vertical lattice line.
                let l = perlin(Vec2::new(edge - eps, along));
                let r = perlin(Vec2::new(edge + eps, along));
                assert!((l - r).abs() < 1e-2, "x jump at {edge},{along}: {l} vs {r}");
                // Crossing a horizontal one.
                let b = perlin(Vec2::new(along, edge - eps));
                let t = perlin(Vec2::new(along, edge + eps));
                assert!((b - t).abs() < 1e-2, "y jump at {along},{edge}: {b} vs {t}");
            }
        }
    }

    #[test]
    fn noise_is_deterministic() {
        let p = Vec2::new(3.7, -1.2);
        assert_eq!(perlin(p), perlin(p));
    }

    #[test]
    fn fresnel_faces_and_grazes() {
        let pos = Vec3::new(0.0, 0.0, -5.0);
        assert_eq!(fresnel(Vec3::Z, pos, 2.5), 0.0);
        assert_eq!(fresnel(Vec3::X, pos, 2.5), 1.0);
        // Back-facing normals clamp to the grazing value.
        assert_eq!(fresnel(-Vec3::Z, pos, 2.5), 1.0);
    }

    #[test]
    fn amount_is_monotonic_in_strength() {
        for e in 0..=10 {
            for d in 0..=10 {
                let edge = e as f32 / 10.0;
                let dist = d as f32 / 10.0;
                let mut prev = f32::NEG_INFINITY;
                for s in 0..=20 {
                    let a = composite_amount(edge, dist, s as f32 / 20.0);
                    assert!(a >= prev);
                    prev = a;
                }
            }
        }
    }

    #[test]
    fn zero_strength_is_fully_transparent() {
        let params = CamouflageParams {
            strength: 0.0,
            ..CamouflageParams::default()
        };
        let out = shade(&input_at(Vec3::new(0.3, 0.4, 0.0)), &params, None);
        assert_eq!(out.w, 0.0);
    }

    #[test]
    fn unset_capture_reads_transparent_black() {
        let params = CamouflageParams::default();
        let red = SolidSampler(Vec4::new(1.0, 0.0, 0.0, 1.0));
        let input = input_at(Vec3::new(0.25, 0.75, 0.0));
        let with = shade(&input, &params, Some(&red));
        let without = shade(&input, &params, None);
        assert_eq!(with, without);
    }

    #[test]
    fn capture_tints_output() {
        let params = CamouflageParams {
            strength: 0.5,
            distortion: 0.0,
            screen_texture: Some(ScreenTexture {
                slot: 0,
                generation: 1,
                width: 800,
                height: 600,
            }),
            ..CamouflageParams::default()
        };
        let red = SolidSampler(Vec4::new(1.0, 0.0, 0.0, 1.0));
        let out = shade(&input_at(Vec3::ZERO), &params, Some(&red));
        let black = shade(&input_at(Vec3::ZERO), &params, Some(&SolidSampler(Vec4::ZERO)));
        assert!(out.x > black.x);
        assert_eq!(out.w, black.w);
    }

    #[test]
    fn screen_uv_is_offset_by_normal() {
        let params = CamouflageParams {
            screen_size: Vec2::new(800.0, 600.0),
            ior: 0.1,
            ..CamouflageParams::default()
        };
        let uv = screen_uv(&input_at(Vec3::ZERO), &params);
        assert!((uv - Vec2::new(0.5 + 0.06, 0.5)).length() < 1e-6);
    }

    #[test]
    fn pixel_sampler_clamps() {
        let pixels = [255, 0, 0, 255, 0, 255, 0, 255];
        let s = PixelSampler {
            width: 2,
            height: 1,
            pixels: &pixels,
        };
        assert_eq!(s.sample(Vec2::new(-1.0, 0.0)), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(s.sample(Vec2::new(2.0, 0.0)), Vec4::new(0.0, 1.0, 0.0, 1.0));
    }
}
