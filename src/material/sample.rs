//! Sampling helpers shared by BSDF implementations.

use std::f32::consts::{FRAC_1_PI, TAU};

use glam::Vec3;

/// Mirror reflection of `wo` about the unit normal `n`.
#[inline]
pub fn reflect_dir(n: Vec3, wo: Vec3) -> Vec3 {
    2.0 * n.dot(wo) * n - wo
}

/// Cosine-weighted hemisphere sample around `n` using the tangent frame
/// `(nu, nv)` and two uniform variates.
#[inline]
pub fn cos_hemisphere(n: Vec3, nu: Vec3, nv: Vec3, s1: f32, s2: f32) -> Vec3 {
    let z1 = s1;
    let z2 = s2 * TAU;
    let r = (1.0 - z1).sqrt();
    (nu * z2.cos() + nv * z2.sin()) * r + n * z1.sqrt()
}

/// Pdf of [`cos_hemisphere`] for a direction with `cos θ = cos_n`.
#[inline]
pub fn cos_hemisphere_pdf(cos_n: f32) -> f32 {
    cos_n.abs() * FRAC_1_PI
}

/// Dielectric Fresnel reflectance for incident direction `wo` against normal
/// `n` with relative IOR squared `ior_squared`.
///
/// Approximate unpolarized dielectric form, kept for reference parity: it
/// reaches 1 at grazing incidence but sits below the textbook
/// `((η−1)/(η+1))²` at normal incidence. `n` is flipped to the incident side
/// internally so callers can pass the shading normal as-is.
#[inline]
pub fn fresnel_dielectric(wo: Vec3, n: Vec3, ior_squared: f32) -> f32 {
    let n = if wo.dot(n) < 0.0 { -n } else { n };
    let c = wo.dot(n);
    let g = (ior_squared + c * c - 1.0).max(0.0).sqrt();
    let aux = c * (g + c);
    ((0.5 * (g - c) * (g - c)) / ((g + c) * (g + c)))
        * (1.0 + ((aux - 1.0) * (aux - 1.0)) / ((aux + 1.0) * (aux + 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn reflect_preserves_angle() {
        let n = Vec3::Z;
        let wo = vec3(0.3, 0.1, 0.9).normalize();
        let wi = reflect_dir(n, wo);
        assert!((wi.dot(n) - wo.dot(n)).abs() < 1e-6);
        assert!((wi.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cos_hemisphere_stays_above() {
        let n = Vec3::Z;
        let (nu, nv) = crate::geometry::create_cs(n);
        for i in 0..32 {
            let s1 = (i as f32 + 0.5) / 32.0;
            let s2 = ((i * 7) % 32) as f32 / 32.0;
            let d = cos_hemisphere(n, nu, nv, s1, s2);
            assert!(d.dot(n) >= 0.0);
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn fresnel_grazing_limit() {
        let n = Vec3::Z;
        let wo = vec3(1.0, 0.0, 1e-4).normalize();
        let kr = fresnel_dielectric(wo, n, 1.33 * 1.33);
        assert!(kr > 0.98);
    }

    #[test]
    fn fresnel_normal_incidence() {
        // At c = 1 the formula gives g = eta and
        // 0.5·(g−1)²/(g+1)² · (1 + g²/(g+2)²); for eta = 1.5 that is
        // 0.02 · (1 + 2.25/12.25) ≈ 0.023673, below the 0.04 of the exact
        // form.
        let eta: f32 = 1.5;
        let kr = fresnel_dielectric(Vec3::Z, Vec3::Z, eta * eta);
        assert!((kr - 0.023_673).abs() < 1e-4);
    }
}
