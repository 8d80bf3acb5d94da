//! Procedural triangle-list meshes for feeding the software device.
//!
//! Every generator produces separate position/normal/texcoord channels plus
//! a `u32` index list, matching the device's per-semantic vertex buffer
//! binding. Channels convert to [`Bytes`] so a host can hand them straight
//! to the input assembler.

use std::f32::consts::PI;

use bytemuck::cast_slice;
use bytes::Bytes;
use glam::{Vec2, Vec3};

/// Separate-channel triangle-list mesh data.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(cast_slice(&self.positions))
    }

    pub fn normal_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(cast_slice(&self.normals))
    }

    pub fn texcoord_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(cast_slice(&self.texcoords))
    }

    pub fn index_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(cast_slice(&self.indices))
    }

    /// Replaces the normal channel with smooth per-vertex normals: each
    /// vertex averages the unit normals of the faces that reference it.
    pub fn compute_smooth_normals(&mut self) {
        let mut sums = vec![Vec3::ZERO; self.positions.len()];
        let mut counts = vec![0u32; self.positions.len()];

        for triangle in self.indices.chunks_exact(3) {
            let [ia, ib, ic] = [
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            ];

            let ab = self.positions[ib] - self.positions[ia];
            let bc = self.positions[ic] - self.positions[ib];
            let normal = ab.cross(bc).normalize_or_zero();

            for index in [ia, ib, ic] {
                sums[index] += normal;
                counts[index] += 1;
            }
        }

        self.normals = sums
            .iter()
            .zip(&counts)
            .map(|(&sum, &count)| {
                if count == 0 {
                    Vec3::ZERO
                } else {
                    (sum / count as f32).normalize_or_zero()
                }
            })
            .collect();
    }
}

/// A single CCW triangle spanning the NDC box, normal facing +z.
#[derive(Copy, Clone, Debug, Default)]
pub struct Triangle;

impl From<Triangle> for MeshData {
    fn from(_: Triangle) -> Self {
        MeshData {
            positions: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            normals: vec![Vec3::Z; 3],
            texcoords: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.5, 1.0),
            ],
            indices: vec![0, 1, 2],
        }
    }
}

/// An axis-aligned cuboid centred on the origin, four vertices per face so
/// normals stay flat.
#[derive(Copy, Clone, Debug)]
pub struct Cuboid {
    pub size: Vec3,
}

impl Cuboid {
    pub fn new(wx: f32, wy: f32, wz: f32) -> Self {
        Self {
            size: Vec3::new(wx, wy, wz),
        }
    }
}

impl Default for Cuboid {
    fn default() -> Self {
        Self { size: Vec3::ONE }
    }
}

impl From<Cuboid> for MeshData {
    fn from(cuboid: Cuboid) -> Self {
        let half = cuboid.size / 2.0;
        let (lx, ly, lz) = (half.x, half.y, half.z);

        let faces: [([Vec3; 4], Vec3); 6] = [
            // Front
            (
                [
                    Vec3::new(-lx, -ly, lz),
                    Vec3::new(lx, -ly, lz),
                    Vec3::new(lx, ly, lz),
                    Vec3::new(-lx, ly, lz),
                ],
                Vec3::Z,
            ),
            // Back
            (
                [
                    Vec3::new(lx, -ly, -lz),
                    Vec3::new(-lx, -ly, -lz),
                    Vec3::new(-lx, ly, -lz),
                    Vec3::new(lx, ly, -lz),
                ],
                Vec3::NEG_Z,
            ),
            // Left
            (
                [
                    Vec3::new(-lx, -ly, -lz),
                    Vec3::new(-lx, -ly, lz),
                    Vec3::new(-lx, ly, lz),
                    Vec3::new(-lx, ly, -lz),
                ],
                Vec3::NEG_X,
            ),
            // Right
            (
                [
                    Vec3::new(lx, -ly, lz),
                    Vec3::new(lx, -ly, -lz),
                    Vec3::new(lx, ly, -lz),
                    Vec3::new(lx, ly, lz),
                ],
                Vec3::X,
            ),
            // Bottom
            (
                [
                    Vec3::new(-lx, -ly, -lz),
                    Vec3::new(lx, -ly, -lz),
                    Vec3::new(lx, -ly, lz),
                    Vec3::new(-lx, -ly, lz),
                ],
                Vec3::NEG_Y,
            ),
            // Top
            (
                [
                    Vec3::new(-lx, ly, lz),
                    Vec3::new(lx, ly, lz),
                    Vec3::new(lx, ly, -lz),
                    Vec3::new(-lx, ly, -lz),
                ],
                Vec3::Y,
            ),
        ];

        let mut mesh = MeshData::default();
        for (corners, normal) in faces {
            let base = mesh.positions.len() as u32;

            mesh.positions.extend(corners);
            mesh.normals.extend([normal; 4]);
            mesh.texcoords.extend([
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ]);
            mesh.indices
                .extend([base, base + 1, base + 3, base + 3, base + 1, base + 2]);
        }

        mesh
    }
}

/// A UV sphere in the songho parameterisation: stacks sweep from the north
/// pole down, sectors sweep the full circle, and the seam column is
/// duplicated so texture coordinates stay continuous.
#[derive(Copy, Clone, Debug)]
pub struct Sphere {
    pub radius: f32,
    pub sectors: u32,
    pub stacks: u32,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            radius: 1.0,
            sectors: 36,
            stacks: 18,
        }
    }
}

impl From<Sphere> for MeshData {
    fn from(sphere: Sphere) -> Self {
        let mut mesh = MeshData::default();
        let inv_radius = 1.0 / sphere.radius;

        let sector_step = 2.0 * PI / sphere.sectors as f32;
        let stack_step = PI / sphere.stacks as f32;

        for i in 0..=sphere.stacks {
            let stack_angle = PI / 2.0 - i as f32 * stack_step;
            let xy = sphere.radius * stack_angle.cos();
            let z = sphere.radius * stack_angle.sin();

            // One extra vertex per stack: same position as the first, but
            // with texcoord s = 1.
            for j in 0..=sphere.sectors {
                let sector_angle = j as f32 * sector_step;
                let position = Vec3::new(xy * sector_angle.cos(), xy * sector_angle.sin(), z);

                mesh.positions.push(position);
                mesh.normals.push(position * inv_radius);
                mesh.texcoords.push(Vec2::new(
                    j as f32 / sphere.sectors as f32,
                    i as f32 / sphere.stacks as f32,
                ));
            }
        }

        for i in 0..sphere.stacks {
            let mut k1 = i * (sphere.sectors + 1);
            let mut k2 = k1 + sphere.sectors + 1;

            for _ in 0..sphere.sectors {
                // Two triangles per sector, except at the poles.
                if i != 0 {
                    mesh.indices.extend([k1, k2, k1 + 1]);
                }
                if i != sphere.stacks - 1 {
                    mesh.indices.extend([k1 + 1, k2, k2 + 1]);
                }

                k1 += 1;
                k2 += 1;
            }
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{Cuboid, MeshData, Sphere, Triangle};

    #[test]
    fn triangle_is_a_single_ccw_primitive() {
        let mesh = MeshData::from(Triangle);
        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_triangles(), 1);

        let [a, b, c] = [mesh.positions[0], mesh.positions[1], mesh.positions[2]];
        let normal = (b - a).cross(c - a);
        assert!(normal.z > 0.0);
    }

    #[test]
    fn cuboid_has_four_vertices_per_face() {
        let mesh = MeshData::from(Cuboid::new(2.0, 4.0, 6.0));
        assert_eq!(mesh.num_vertices(), 24);
        assert_eq!(mesh.num_triangles(), 12);

        // Flat normals are unit length.
        for normal in &mesh.normals {
            assert!((normal.length() - 1.0).abs() < 1e-6);
        }

        let max = mesh
            .positions
            .iter()
            .fold(Vec3::splat(f32::MIN), |acc, &p| acc.max(p));
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn sphere_counts_match_the_parameterisation() {
        let sphere = Sphere {
            radius: 2.0,
            sectors: 8,
            stacks: 6,
        };
        let mesh = MeshData::from(sphere);

        assert_eq!(mesh.num_vertices(), (8 + 1) * (6 + 1));
        // Two triangles per sector per stack, one at each pole stack.
        assert_eq!(mesh.num_triangles() as u32, 8 * (6 - 1) * 2);

        for (position, normal) in mesh.positions.iter().zip(&mesh.normals) {
            assert!((position.length() - 2.0).abs() < 1e-4);
            assert!((normal.length() - 1.0).abs() < 1e-4);
            assert!(position.normalize().dot(*normal) > 0.999);
        }
    }

    #[test]
    fn smooth_normals_average_incident_faces() {
        let mut mesh = MeshData::from(Triangle);
        mesh.normals.clear();
        mesh.compute_smooth_normals();

        assert_eq!(mesh.normals.len(), 3);
        for normal in &mesh.normals {
            assert!((*normal - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn channel_bytes_are_tightly_packed() {
        let mesh = MeshData::from(Triangle);
        assert_eq!(mesh.position_bytes().len(), 3 * 12);
        assert_eq!(mesh.texcoord_bytes().len(), 3 * 8);
        assert_eq!(mesh.index_bytes().len(), 3 * 4);
    }
}
