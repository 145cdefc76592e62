//! LOD terrain tessellation with seam-free chunk borders.
//!
//! Each chunk's sample grid carries two extra vertex rings beyond its
//! rendered footprint:
//!
//! - **Out-of-mesh** (outermost ring): only contributes to normals at
//!   the mesh boundary, never rendered.
//! - **Mesh-edge** (second ring): the rendered boundary, present at
//!   full resolution for every LOD.
//! - **Main** vertices: interior samples at the LOD's skip stride.
//! - **Edge-connection** vertices: interior ring samples skipped by
//!   the stride but kept with their height interpolated between the
//!   flanking main vertices, so the boundary strip forms a consistent
//!   slope whatever LOD the neighbor runs at. This is what prevents
//!   cracks between chunks of different detail levels without the
//!   chunks coordinating.

use bytemuck::{Pod, Zeroable};
use engine_core::SettingsError;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::heightmap::HeightMap;

/// LOD indices run 0 (full detail) to `MAX_LOD_COUNT - 1`.
pub const MAX_LOD_COUNT: u32 = 5;

/// Rendered chunk extents (in quads at LOD 0) that every supported LOD
/// stride divides evenly.
pub const SUPPORTED_CHUNK_SIZES: [usize; 9] = [48, 72, 96, 120, 144, 168, 192, 216, 240];

/// Flat shading triples the vertex count, so only the small sizes are
/// allowed with it.
pub const NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES: usize = 3;

/// Sampling stride between rendered main vertices at a given LOD.
#[inline]
pub fn skip_increment(lod: u32) -> usize {
    if lod == 0 {
        1
    } else {
        2 * lod as usize
    }
}

/// Mesh shape settings shared by every chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshSettings {
    /// Index into [`SUPPORTED_CHUNK_SIZES`].
    pub chunk_size_index: usize,
    /// Index into the flat-shaded prefix of [`SUPPORTED_CHUNK_SIZES`].
    pub flat_shaded_chunk_size_index: usize,
    pub use_flat_shading: bool,
    /// World units per grid step.
    pub mesh_scale: f32,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            chunk_size_index: 0,
            flat_shaded_chunk_size_index: 0,
            use_flat_shading: false,
            mesh_scale: 2.5,
        }
    }
}

impl MeshSettings {
    /// Vertices per grid line, including the two border rings on each
    /// side (hence the +5: one step for the fencepost, four for the
    /// rings).
    pub fn vertices_per_line(&self) -> usize {
        let index = if self.use_flat_shading {
            self.flat_shaded_chunk_size_index
        } else {
            self.chunk_size_index
        };
        SUPPORTED_CHUNK_SIZES[index] + 5
    }

    /// World-space size of the rendered footprint. One step for the
    /// fencepost and two for the border rings fall away.
    pub fn mesh_world_size(&self) -> f32 {
        (self.vertices_per_line() - 3) as f32 * self.mesh_scale
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunk_size_index >= SUPPORTED_CHUNK_SIZES.len() {
            return Err(SettingsError::ChunkSizeIndexOutOfRange {
                index: self.chunk_size_index,
                max: SUPPORTED_CHUNK_SIZES.len() - 1,
            });
        }
        if self.use_flat_shading
            && self.flat_shaded_chunk_size_index >= NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES
        {
            return Err(SettingsError::ChunkSizeIndexOutOfRange {
                index: self.flat_shaded_chunk_size_index,
                max: NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES - 1,
            });
        }
        // Every LOD stride must tile the interior exactly, or the main
        // grid would not meet the edge-connection ring.
        let interior = self.vertices_per_line() - 5;
        for lod in 1..MAX_LOD_COUNT {
            let stride = skip_increment(lod);
            if interior % stride != 0 {
                return Err(SettingsError::UnsupportedStride { stride, interior });
            }
        }
        Ok(())
    }
}

/// Vertex layout handed to the rendering collaborator.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Discriminated vertex index: rendered vertices and the out-of-mesh
/// border ring live in separate arrays, each indexed from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSlot {
    Mesh(u32),
    OutOfMesh(u32),
}

/// A tessellated chunk mesh.
///
/// `vertices`/`uvs`/`normals`/`triangles` hold the rendered surface;
/// the out-of-mesh buffers exist only so boundary normals incorporate
/// faces that belong to neighboring chunks.
#[derive(Debug, Clone)]
pub struct MeshData {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<u32>,
    normals: Vec<Vec3>,
    out_of_mesh_vertices: Vec<Vec3>,
    out_of_mesh_triangles: Vec<[VertexSlot; 3]>,
    use_flat_shading: bool,
}

impl MeshData {
    fn new(num_verts_per_line: usize, skip: usize, use_flat_shading: bool) -> Self {
        let n = num_verts_per_line;
        let num_mesh_edge_vertices = (n - 2) * 4 - 4;
        let num_edge_connection_vertices = (skip - 1) * (n - 5) / skip * 4;
        let num_main_vertices_per_line = (n - 5) / skip + 1;
        let num_main_vertices = num_main_vertices_per_line * num_main_vertices_per_line;
        let num_vertices =
            num_mesh_edge_vertices + num_edge_connection_vertices + num_main_vertices;

        let num_mesh_edge_triangles = ((n - 3) * 4 - 4) * 2;
        let num_main_triangles =
            (num_main_vertices_per_line - 1) * (num_main_vertices_per_line - 1) * 2;

        Self {
            vertices: Vec::with_capacity(num_vertices),
            uvs: Vec::with_capacity(num_vertices),
            triangles: Vec::with_capacity((num_mesh_edge_triangles + num_main_triangles) * 3),
            normals: Vec::new(),
            out_of_mesh_vertices: Vec::with_capacity(n * 4 - 4),
            out_of_mesh_triangles: Vec::with_capacity(((n - 1) * 4 - 4) * 2),
            use_flat_shading,
        }
    }

    fn add_vertex(&mut self, position: Vec3, uv: Vec2, slot: VertexSlot) {
        match slot {
            VertexSlot::Mesh(index) => {
                // Slots are assigned in the same row-major order the
                // grid walk pushes vertices.
                debug_assert_eq!(self.vertices.len(), index as usize);
                self.vertices.push(position);
                self.uvs.push(uv);
            }
            VertexSlot::OutOfMesh(index) => {
                debug_assert_eq!(self.out_of_mesh_vertices.len(), index as usize);
                self.out_of_mesh_vertices.push(position);
            }
        }
    }

    fn add_triangle(&mut self, a: VertexSlot, b: VertexSlot, c: VertexSlot) {
        match (a, b, c) {
            (VertexSlot::Mesh(a), VertexSlot::Mesh(b), VertexSlot::Mesh(c)) => {
                self.triangles.extend([a, b, c]);
            }
            // Any corner on the outer ring: normals-only triangle.
            _ => self.out_of_mesh_triangles.push([a, b, c]),
        }
    }

    #[inline]
    fn point(&self, slot: VertexSlot) -> Vec3 {
        match slot {
            VertexSlot::Mesh(index) => self.vertices[index as usize],
            VertexSlot::OutOfMesh(index) => self.out_of_mesh_vertices[index as usize],
        }
    }

    /// Face-averaged vertex normals over both triangle buffers, so
    /// boundary vertices pick up contributions from faces outside the
    /// chunk and lighting stays continuous across chunk borders.
    fn calculate_normals(&self) -> Vec<Vec3> {
        let mut vertex_normals = vec![Vec3::ZERO; self.vertices.len()];

        for tri in self.triangles.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let normal = face_normal(self.vertices[a], self.vertices[b], self.vertices[c]);
            vertex_normals[a] += normal;
            vertex_normals[b] += normal;
            vertex_normals[c] += normal;
        }

        for tri in &self.out_of_mesh_triangles {
            let normal = face_normal(self.point(tri[0]), self.point(tri[1]), self.point(tri[2]));
            for slot in tri {
                if let VertexSlot::Mesh(index) = slot {
                    vertex_normals[*index as usize] += normal;
                }
            }
        }

        for normal in &mut vertex_normals {
            *normal = normal.normalize_or_zero();
        }
        vertex_normals
    }

    /// Give every triangle its own three vertices so per-face normals
    /// are independent of the neighbors.
    fn flat_shade(&mut self) {
        let mut flat_vertices = Vec::with_capacity(self.triangles.len());
        let mut flat_uvs = Vec::with_capacity(self.triangles.len());
        for &index in &self.triangles {
            flat_vertices.push(self.vertices[index as usize]);
            flat_uvs.push(self.uvs[index as usize]);
        }
        self.triangles = (0..flat_vertices.len() as u32).collect();
        self.vertices = flat_vertices;
        self.uvs = flat_uvs;

        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for i in (0..self.vertices.len()).step_by(3) {
            let normal = face_normal(
                self.vertices[i],
                self.vertices[i + 1],
                self.vertices[i + 2],
            );
            normals[i] = normal;
            normals[i + 1] = normal;
            normals[i + 2] = normal;
        }
        self.normals = normals;
    }

    fn finish(&mut self) {
        if self.use_flat_shading {
            self.flat_shade();
        } else {
            self.normals = self.calculate_normals();
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn is_flat_shaded(&self) -> bool {
        self.use_flat_shading
    }

    /// Interleave into the buffer layout the renderer uploads.
    pub fn vertex_buffer(&self) -> Vec<TerrainVertex> {
        self.vertices
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((position, normal), uv)| TerrainVertex {
                position: (*position).into(),
                normal: (*normal).into(),
                uv: (*uv).into(),
            })
            .collect()
    }
}

#[inline]
fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

#[inline]
fn is_skipped(x: usize, y: usize, n: usize, skip: usize) -> bool {
    x > 2 && x < n - 3 && y > 2 && y < n - 3 && ((x - 2) % skip != 0 || (y - 2) % skip != 0)
}

/// Tessellate a height map at the given LOD.
///
/// Precondition (enforced by [`MeshSettings::validate`]): the LOD
/// stride divides the interior extent, and the height map was sampled
/// at `vertices_per_line` squared.
pub fn generate_terrain_mesh(
    height_map: &HeightMap,
    settings: &MeshSettings,
    lod: u32,
) -> MeshData {
    let skip = skip_increment(lod);
    let n = settings.vertices_per_line();
    debug_assert_eq!(height_map.values.width(), n);
    debug_assert_eq!(height_map.values.height(), n);
    debug_assert_eq!((n - 5) % skip, 0, "stride must tile the interior extent");

    let world_size = settings.mesh_world_size();
    let top_left = Vec2::new(-1.0, 1.0) * world_size / 2.0;

    let mut mesh = MeshData::new(n, skip, settings.use_flat_shading);

    // First pass: assign every retained grid cell a slot. Rendered and
    // out-of-mesh vertices are numbered independently, both in
    // row-major order.
    let mut slots: Vec<Option<VertexSlot>> = vec![None; n * n];
    let mut mesh_index = 0_u32;
    let mut out_of_mesh_index = 0_u32;
    for y in 0..n {
        for x in 0..n {
            let out_of_mesh = y == 0 || y == n - 1 || x == 0 || x == n - 1;
            if out_of_mesh {
                slots[y * n + x] = Some(VertexSlot::OutOfMesh(out_of_mesh_index));
                out_of_mesh_index += 1;
            } else if !is_skipped(x, y, n, skip) {
                slots[y * n + x] = Some(VertexSlot::Mesh(mesh_index));
                mesh_index += 1;
            }
        }
    }
    let slot_at = |x: usize, y: usize| -> VertexSlot {
        slots[y * n + x].expect("quad corners always land on retained vertices")
    };

    // Second pass: place vertices and build quads.
    for y in 0..n {
        for x in 0..n {
            if is_skipped(x, y, n, skip) {
                continue;
            }

            let out_of_mesh = y == 0 || y == n - 1 || x == 0 || x == n - 1;
            let mesh_edge = (y == 1 || y == n - 2 || x == 1 || x == n - 2) && !out_of_mesh;
            let main = !out_of_mesh
                && !mesh_edge
                && (x - 2) % skip == 0
                && (y - 2) % skip == 0;
            let edge_connection = (y == 2 || y == n - 3 || x == 2 || x == n - 3)
                && !out_of_mesh
                && !mesh_edge
                && !main;

            // UV as the fraction of the rendered footprint covered.
            let percent = Vec2::new(x as f32 - 1.0, y as f32 - 1.0) / (n as f32 - 3.0);
            let position_2d = top_left + Vec2::new(percent.x, -percent.y) * world_size;

            let mut height = height_map.values.get(x, y);

            // Edge-connection vertices sit on cells the stride skips;
            // pin their height onto the segment between the flanking
            // main vertices so the boundary strip slopes consistently
            // at any LOD.
            if edge_connection {
                let vertical = x == 2 || x == n - 3;
                let along = if vertical { y } else { x };
                let distance_to_a = (along - 2) % skip;
                let distance_to_b = skip - distance_to_a;
                let t = distance_to_a as f32 / skip as f32;

                let height_a = if vertical {
                    height_map.values.get(x, y - distance_to_a)
                } else {
                    height_map.values.get(x - distance_to_a, y)
                };
                let height_b = if vertical {
                    height_map.values.get(x, y + distance_to_b)
                } else {
                    height_map.values.get(x + distance_to_b, y)
                };

                height = height_a * (1.0 - t) + height_b * t;
            }

            mesh.add_vertex(
                Vec3::new(position_2d.x, height, position_2d.y),
                percent,
                slot_at(x, y),
            );

            // Edge-connection cells on the top/left connection ring do
            // not own a quad; their quad belongs to the main vertex
            // before them.
            let create_triangle =
                x < n - 1 && y < n - 1 && (!edge_connection || (x != 2 && y != 2));

            if create_triangle {
                // Main-to-main quads span the full stride; quads that
                // touch the connection ring shrink to a single step so
                // stride transitions tile.
                let increment = if main && x != n - 3 && y != n - 3 {
                    skip
                } else {
                    1
                };

                let a = slot_at(x, y);
                let b = slot_at(x + increment, y);
                let c = slot_at(x, y + increment);
                let d = slot_at(x + increment, y + increment);
                mesh.add_triangle(a, d, c);
                mesh.add_triangle(d, a, b);
            }
        }
    }

    mesh.finish();
    log::trace!(
        "tessellated lod {lod}: {} vertices, {} triangles",
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    mesh
}
