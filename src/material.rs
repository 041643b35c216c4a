use rand::RngCore;
use rand_distr::{Distribution as _, UnitSphere};

use crate::{
    geometry::{Colour, FloatType, HitRecord, Ray, WorldVector},
    texture::Texture,
};

/// Surface response consumed by the shading phase. Implementations decide
/// whether a path continues; returning `None` from [`Material::scatter`]
/// freezes the sample (absorbers and light sources).
pub trait Material: Send + Sync {
    /// Per-channel reflectance of the surface at the hit point.
    fn attenuation(&self, _hit: &HitRecord) -> Colour {
        Colour::zeros()
    }

    /// Self-emitted radiance at the hit point.
    fn emittance(&self, _hit: &HitRecord) -> Colour {
        Colour::zeros()
    }

    /// Builds the scatter ray leaving the hit point. The returned ray starts
    /// at `hit.p` with a unit direction; the caller applies the
    /// origin push.
    fn scatter(&self, hit: &HitRecord, rng: &mut dyn RngCore) -> Option<Ray>;
}

/// Uniform sample of the unit sphere surface.
fn random_unit_vector(rng: &mut dyn RngCore) -> WorldVector {
    let v: [FloatType; 3] = UnitSphere.sample(rng);
    WorldVector::from(v)
}

fn reflect(v: &WorldVector, n: &WorldVector) -> WorldVector {
    let dt = v.dot(n);
    v - (dt + dt) * n
}

/// Perfectly diffuse surface scattering into the hemisphere around the
/// normal.
pub struct Lambertian {
    albedo: Box<dyn Texture>,
}

impl Lambertian {
    pub fn new(albedo: impl Texture + 'static) -> Lambertian {
        Lambertian {
            albedo: Box::new(albedo),
        }
    }
}

impl Material for Lambertian {
    fn attenuation(&self, hit: &HitRecord) -> Colour {
        self.albedo.colour(&hit.p)
    }

    fn scatter(&self, hit: &HitRecord, rng: &mut dyn RngCore) -> Option<Ray> {
        let mut direction = hit.n + random_unit_vector(rng);
        if direction.norm_squared() < 1e-8 {
            // The sample landed opposite the normal.
            direction = hit.n;
        }
        Some(Ray::new(hit.p, direction))
    }
}

/// Mirror reflection, optionally perturbed by a fuzz term.
pub struct Metallic {
    albedo: Box<dyn Texture>,
    fuzz: FloatType,
}

impl Metallic {
    pub fn new(albedo: impl Texture + 'static, fuzz: FloatType) -> Metallic {
        Metallic {
            albedo: Box::new(albedo),
            fuzz,
        }
    }
}

impl Material for Metallic {
    fn attenuation(&self, hit: &HitRecord) -> Colour {
        self.albedo.colour(&hit.p)
    }

    fn scatter(&self, hit: &HitRecord, rng: &mut dyn RngCore) -> Option<Ray> {
        let mut direction = reflect(&hit.v, &hit.n);
        if self.fuzz > 0.0 {
            direction += self.fuzz * random_unit_vector(rng);
        }
        Some(Ray::new(hit.p, direction))
    }
}

/// Transparent surface refracting the incident ray, falling back to
/// reflection at total internal reflection.
pub struct Dielectric {
    albedo: Box<dyn Texture>,
    index: FloatType,
}

impl Dielectric {
    pub fn new(albedo: impl Texture + 'static, index: FloatType) -> Dielectric {
        Dielectric {
            albedo: Box::new(albedo),
            index,
        }
    }
}

impl Material for Dielectric {
    fn attenuation(&self, hit: &HitRecord) -> Colour {
        self.albedo.colour(&hit.p)
    }

    fn scatter(&self, hit: &HitRecord, _rng: &mut dyn RngCore) -> Option<Ray> {
        let mut dt = hit.v.dot(&hit.n);
        // v along the normal means the ray leaves the medium.
        let face_in = dt > 0.0;

        let nr = if face_in { self.index } else { 1.0 / self.index };
        let out_n = if face_in { -hit.n } else { hit.n };

        let discriminant = 1.0 - nr * nr * (1.0 - dt * dt);
        let direction = if discriminant > 0.0 {
            if face_in {
                dt = -dt;
            }
            nr * (hit.v - out_n * dt) - out_n * discriminant.sqrt()
        } else {
            // Total internal reflection.
            reflect(&hit.v, &hit.n)
        };

        Some(Ray::new(hit.p, direction))
    }
}

/// Emits and absorbs; light sources never generate secondary rays.
pub struct Light {
    emit: Box<dyn Texture>,
}

impl Light {
    pub fn new(emit: impl Texture + 'static) -> Light {
        Light {
            emit: Box::new(emit),
        }
    }
}

impl Material for Light {
    fn emittance(&self, hit: &HitRecord) -> Colour {
        self.emit.colour(&hit.p)
    }

    fn scatter(&self, _hit: &HitRecord, _rng: &mut dyn RngCore) -> Option<Ray> {
        None
    }
}

/// Shows the surface normal at the hit point as a colour.
pub struct NormalColour;

impl Material for NormalColour {
    fn emittance(&self, hit: &HitRecord) -> Colour {
        0.5 * (hit.n + Colour::repeat(1.0))
    }

    fn scatter(&self, _hit: &HitRecord, _rng: &mut dyn RngCore) -> Option<Ray> {
        None
    }
}

/// Shows the hit distance as a grey value.
pub struct DepthColour {
    pub min_dist: FloatType,
    pub max_dist: FloatType,
}

impl Material for DepthColour {
    fn emittance(&self, hit: &HitRecord) -> Colour {
        Colour::repeat((hit.t - self.min_dist) / self.max_dist)
    }

    fn scatter(&self, _hit: &HitRecord, _rng: &mut dyn RngCore) -> Option<Ray> {
        None
    }
}

/// Shows the cosine between the incident ray and the surface normal as a
/// grey value, remapped into `[0, 1]`.
pub struct CosineColour;

impl Material for CosineColour {
    fn emittance(&self, hit: &HitRecord) -> Colour {
        Colour::repeat((0.5 * (1.0 + hit.v.dot(&hit.n))).clamp(0.0, 1.0))
    }

    fn scatter(&self, _hit: &HitRecord, _rng: &mut dyn RngCore) -> Option<Ray> {
        None
    }
}
