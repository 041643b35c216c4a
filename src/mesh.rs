use std::{fs, path::Path};

use thiserror::Error;

use crate::{
    geometry::{FloatType, MaterialId, WorldPoint, WorldVector},
    scene::{Primitive, Triangle},
};

/// Triangle soup plus the transform helpers scene assembly needs. Meshes
/// are consumed into the scene's primitive list before the render starts.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    triangles: Vec<Triangle>,
}

#[derive(Debug, Error)]
pub enum ObjOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),
}

impl Mesh {
    pub fn new() -> Mesh {
        Mesh::default()
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn with_obj(path: impl AsRef<Path>, material: MaterialId) -> Result<Mesh, ObjOpenError> {
        let content = fs::read_to_string(path)?;
        Mesh::from_obj_source(&content, material)
    }

    pub fn from_obj_source(source: &str, material: MaterialId) -> Result<Mesh, ObjOpenError> {
        let parsed = wavefront_obj::obj::parse(source.to_owned())?;

        let mut mesh = Mesh::new();
        for object in parsed.objects {
            for geometry in object.geometry {
                for shape in geometry.shapes {
                    let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                        continue;
                    };

                    let vertex = |(index, _tex, _normal): (usize, Option<usize>, Option<usize>)| {
                        let v = &object.vertices[index];
                        WorldPoint::new(v.x as FloatType, v.y as FloatType, v.z as FloatType)
                    };

                    mesh.triangles
                        .push(Triangle::new(vertex(a), vertex(b), vertex(c), material));
                }
            }
        }
        Ok(mesh)
    }

    pub fn push(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    /// Appends the quad `(a, b, c, d)` as two triangles.
    pub fn push_quad(
        &mut self,
        a: WorldPoint,
        b: WorldPoint,
        c: WorldPoint,
        d: WorldPoint,
        material: MaterialId,
    ) {
        self.triangles.push(Triangle::new(a, b, c, material));
        self.triangles.push(Triangle::new(a, c, d, material));
    }

    pub fn extend(&mut self, other: Mesh) {
        self.triangles.extend(other.triangles);
    }

    pub fn into_primitives(self) -> Vec<Primitive> {
        self.triangles.into_iter().map(Primitive::from).collect()
    }

    fn apply_to_vertices(mut self, mut f: impl FnMut(&mut WorldPoint)) -> Mesh {
        for triangle in &mut self.triangles {
            f(&mut triangle.a);
            f(&mut triangle.b);
            f(&mut triangle.c);
        }
        self
    }

    pub fn translate(self, offset: WorldVector) -> Mesh {
        self.apply_to_vertices(|p| *p += offset)
    }

    pub fn scale(self, factor: FloatType) -> Mesh {
        self.apply_to_vertices(|p| p.coords *= factor)
    }

    pub fn swap_axes(self, i: usize, j: usize) -> Mesh {
        self.apply_to_vertices(|p| p.coords.swap_rows(i, j))
    }

    pub fn mirror(self, axis: usize) -> Mesh {
        self.apply_to_vertices(|p| p.coords[axis] = -p.coords[axis])
    }

    /// Centers the mesh in the box spanned by `a` and `b` and scales it
    /// uniformly until its longest extent fills the box along that axis.
    pub fn fit_box(self, a: WorldPoint, b: WorldPoint) -> Mesh {
        let Some(first) = self.triangles.first().map(|t| t.a) else {
            return self;
        };

        let mut mean = WorldVector::zeros();
        let (mut low, mut high) = (first, first);
        for v in self.triangles.iter().flat_map(|t| [t.a, t.b, t.c]) {
            mean += v.coords;
            low = low.inf(&v);
            high = high.sup(&v);
        }
        let mean = mean / (self.triangles.len() * 3) as FloatType;

        let span = high - low;
        let mut axis = 0;
        for candidate in 1..3 {
            if span[candidate] > span[axis] {
                axis = candidate;
            }
        }

        let box_span = a.sup(&b) - a.inf(&b);
        let factor = box_span[axis] / span[axis];
        let box_center = nalgebra::center(&a, &b);

        self.translate(-mean)
            .scale(factor)
            .translate(box_center.coords)
    }

    /// The walled test room: coloured side walls, white floor, ceiling and
    /// back, and an emissive patch just below the ceiling. Spans
    /// `[0, 1] x [0, 1] x [0, -1]`, open toward `+z`.
    pub fn cornell_box(
        white: MaterialId,
        red: MaterialId,
        blue: MaterialId,
        light: MaterialId,
    ) -> Mesh {
        let mut mesh = Mesh::new();

        // Windings put every normal on the room side.

        // Floor, ceiling, back wall.
        mesh.push_quad(
            [0.0, 0.0, 0.0].into(),
            [1.0, 0.0, 0.0].into(),
            [1.0, 0.0, -1.0].into(),
            [0.0, 0.0, -1.0].into(),
            white,
        );
        mesh.push_quad(
            [0.0, 1.0, 0.0].into(),
            [0.0, 1.0, -1.0].into(),
            [1.0, 1.0, -1.0].into(),
            [1.0, 1.0, 0.0].into(),
            white,
        );
        mesh.push_quad(
            [0.0, 0.0, -1.0].into(),
            [1.0, 0.0, -1.0].into(),
            [1.0, 1.0, -1.0].into(),
            [0.0, 1.0, -1.0].into(),
            white,
        );

        // Coloured side walls.
        mesh.push_quad(
            [0.0, 0.0, 0.0].into(),
            [0.0, 0.0, -1.0].into(),
            [0.0, 1.0, -1.0].into(),
            [0.0, 1.0, 0.0].into(),
            red,
        );
        mesh.push_quad(
            [1.0, 0.0, 0.0].into(),
            [1.0, 1.0, 0.0].into(),
            [1.0, 1.0, -1.0].into(),
            [1.0, 0.0, -1.0].into(),
            blue,
        );

        // Ceiling light patch, facing the floor.
        mesh.push_quad(
            [0.3, 0.999, -0.3].into(),
            [0.3, 0.999, -0.7].into(),
            [0.7, 0.999, -0.7].into(),
            [0.7, 0.999, -0.3].into(),
            light,
        );

        mesh
    }

    /// Box spanned by the three edges from `a` to `b`, `c` and `d`.
    pub fn parallelepiped(
        a: WorldPoint,
        b: WorldPoint,
        c: WorldPoint,
        d: WorldPoint,
        material: MaterialId,
    ) -> Mesh {
        let u = b - a;
        let v = c - a;
        let w = d - a;

        let mut mesh = Mesh::new();
        // Windings face away from the box for the left-handed edge triples
        // the scene assembly uses.
        mesh.push_quad(a, a + u, a + u + v, a + v, material);
        mesh.push_quad(a + w, a + v + w, a + u + v + w, a + u + w, material);
        mesh.push_quad(a, a + w, a + u + w, a + u, material);
        mesh.push_quad(a + v, a + u + v, a + u + v + w, a + v + w, material);
        mesh.push_quad(a, a + v, a + v + w, a + w, material);
        mesh.push_quad(a + u, a + u + w, a + u + v + w, a + u + v, material);

        mesh
    }
}
