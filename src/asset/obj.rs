//! Triangulated OBJ subset: `v`, `vt`, `vn` and three-corner `f` records.
//!
//! Faces are resolved eagerly into unindexed vertex streams, one vertex per
//! triangle corner, ready to be uploaded as-is.

use glam::{Vec2, Vec3};

use crate::asset::AssetError;

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error(transparent)]
    Io(#[from] AssetError),
    #[error(
        "line {line}: face has {corners} corners but only triangles are supported, triangulate the mesh"
    )]
    NonTriangularFace { line: usize, corners: usize },
    #[error("line {line}: face has only {corners} corners")]
    DegenerateFace { line: usize, corners: usize },
    #[error("line {line}: malformed face corner `{corner}`")]
    BadCorner { line: usize, corner: String },
    #[error("line {line}: {kind} index {index} is out of range (have {len})")]
    IndexOutOfRange {
        line: usize,
        kind: &'static str,
        index: usize,
        len: usize,
    },
    #[error("line {line}: expected a number, found `{token}`")]
    BadNumber { line: usize, token: String },
    #[error("geometry is already uploaded")]
    AlreadyLoaded,
}

/// Resolved, unindexed vertex streams.
///
/// `normals` and `uvs` are either empty or exactly as long as `positions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Corner {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Default)]
struct RawData {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    pub fn parse(source: &str) -> Result<Self, GeometryError> {
        let mut raw = RawData::default();
        let mut mesh = MeshData::default();

        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(tag) = tokens.next() else {
                continue;
            };

            match tag {
                "vt" => {
                    let [u] = parse_floats(&mut tokens, line_no)?;
                    let [v] = parse_optional_floats(&mut tokens, line_no)?;
                    raw.uvs.push(Vec2::new(u, v));
                }
                "vn" => {
                    let [x, y, z] = parse_floats(&mut tokens, line_no)?;
                    raw.normals.push(Vec3::new(x, y, z));
                }
                "v" => {
                    let [x, y, z] = parse_floats(&mut tokens, line_no)?;
                    raw.positions.push(Vec3::new(x, y, z));
                }
                "f" => {
                    let corners: Vec<&str> = tokens.collect();
                    if corners.len() > 3 {
                        return Err(GeometryError::NonTriangularFace {
                            line: line_no,
                            corners: corners.len(),
                        });
                    }
                    if corners.len() < 3 {
                        return Err(GeometryError::DegenerateFace {
                            line: line_no,
                            corners: corners.len(),
                        });
                    }
                    for token in corners {
                        let corner = parse_corner(token, line_no)?;
                        mesh.push_corner(&raw, corner, line_no)?;
                    }
                }
                _ => {}
            }
        }

        mesh.drop_partial_streams();
        Ok(mesh)
    }

    fn push_corner(
        &mut self,
        raw: &RawData,
        corner: Corner,
        line: usize,
    ) -> Result<(), GeometryError> {
        self.positions
            .push(lookup(&raw.positions, corner.position, "position", line)?);
        if let Some(texcoord) = corner.texcoord {
            self.uvs.push(lookup(&raw.uvs, texcoord, "texcoord", line)?);
        }
        if let Some(normal) = corner.normal {
            self.normals.push(lookup(&raw.normals, normal, "normal", line)?);
        }
        Ok(())
    }

    fn drop_partial_streams(&mut self) {
        let count = self.positions.len();
        if !self.normals.is_empty() && self.normals.len() != count {
            log::warn!(
                "Only {} of {} corners carry normals, dropping the normal stream",
                self.normals.len(),
                count
            );
            self.normals.clear();
        }
        if !self.uvs.is_empty() && self.uvs.len() != count {
            log::warn!(
                "Only {} of {} corners carry texture coordinates, dropping the uv stream",
                self.uvs.len(),
                count
            );
            self.uvs.clear();
        }
    }
}

fn parse_floats<'a, const N: usize>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<[f32; N], GeometryError> {
    let mut out = [0.0; N];
    for slot in &mut out {
        let token = tokens.next().unwrap_or("");
        *slot = token.parse().map_err(|_| GeometryError::BadNumber {
            line,
            token: token.to_string(),
        })?;
    }
    Ok(out)
}

// Missing trailing components read as 0.
fn parse_optional_floats<'a, const N: usize>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<[f32; N], GeometryError> {
    let mut out = [0.0; N];
    for (slot, token) in out.iter_mut().zip(tokens) {
        *slot = token.parse().map_err(|_| GeometryError::BadNumber {
            line,
            token: token.to_string(),
        })?;
    }
    Ok(out)
}

// Accepts `p`, `p/t`, `p//n` and `p/t/n`.
fn parse_corner(token: &str, line: usize) -> Result<Corner, GeometryError> {
    let bad = || GeometryError::BadCorner {
        line,
        corner: token.to_string(),
    };

    let mut parts = token.split('/');
    let position = parts
        .next()
        .and_then(|p| p.parse::<usize>().ok())
        .ok_or_else(bad)?;

    let mut optional = || -> Result<Option<usize>, GeometryError> {
        match parts.next() {
            None | Some("") => Ok(None),
            Some(part) => part.parse().map(Some).map_err(|_| bad()),
        }
    };
    let texcoord = optional()?;
    let normal = optional()?;

    if parts.next().is_some() {
        return Err(bad());
    }

    Ok(Corner {
        position,
        texcoord,
        normal,
    })
}

fn lookup<T: Copy>(
    items: &[T],
    index: usize,
    kind: &'static str,
    line: usize,
) -> Result<T, GeometryError> {
    index
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .copied()
        .ok_or(GeometryError::IndexOutOfRange {
            line,
            kind,
            index,
            len: items.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn single_triangle_has_positions_only() {
        let mesh = MeshData::parse(TRIANGLE).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert!(!mesh.has_normals());
        assert!(!mesh.has_uvs());
        assert_eq!(mesh.positions[1], Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn vertex_count_is_three_per_face() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
f 1 2 3
f 2 4 3
f 1 2 4
";
        let mesh = MeshData::parse(source).unwrap();
        assert_eq!(mesh.vertex_count(), 9);
    }

    #[test]
    fn single_component_tex_coord_defaults_v_to_zero() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.5\nvt 0.25 0.75\nf 1/1 2/2 3/1\n";
        let mesh = MeshData::parse(source).unwrap();
        assert_eq!(mesh.uvs[0], Vec2::new(0.5, 0.0));
        assert_eq!(mesh.uvs[1], Vec2::new(0.25, 0.75));

        let bad = "v 0 0 0\nvt 0.5 nope\nf 1 1 1\n";
        assert!(matches!(
            MeshData::parse(bad),
            Err(GeometryError::BadNumber { line: 2, .. })
        ));
    }

    #[test]
    fn quad_face_is_rejected() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        match MeshData::parse(source) {
            Err(GeometryError::NonTriangularFace { line, corners }) => {
                assert_eq!(line, 5);
                assert_eq!(corners, 4);
            }
            other => panic!("expected quad rejection, got {other:?}"),
        }
    }

    #[test]
    fn all_corner_encodings_resolve_one_based() {
        let source = "\
v 1 0 0
v 0 2 0
v 0 0 3
vt 0.25 0.5
vt 0.75 1
vn 0 0 1
vn 0 1 0
f 3/2/1 1/1/2 2/2/2
f 1//2 2//1 3//2
f 3 2 1
";
        let mesh = MeshData::parse(source).unwrap();
        assert_eq!(mesh.vertex_count(), 9);
        assert_eq!(mesh.positions[0], Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(mesh.positions[1], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.positions[4], Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(mesh.positions[8], Vec3::new(1.0, 0.0, 0.0));

        // the last face carries neither, so both streams come out incomplete
        assert!(!mesh.has_normals());
        assert!(!mesh.has_uvs());
    }

    #[test]
    fn consistent_streams_are_kept() {
        let source = "\
v 1 0 0
v 0 2 0
v 0 0 3
vt 0.25 0.5
vt 0.75 1
vn 0 0 1
vn 0 1 0
f 3/2/1 1/1/2 2/2/2
";
        let mesh = MeshData::parse(source).unwrap();
        assert_eq!(mesh.uvs, vec![Vec2::new(0.75, 1.0), Vec2::new(0.25, 0.5), Vec2::new(0.75, 1.0)]);
        assert_eq!(mesh.normals, vec![Vec3::Z, Vec3::Y, Vec3::Y]);
    }

    #[test]
    fn partial_streams_are_dropped() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1
f 1 2 3
";
        let mesh = MeshData::parse(source).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert!(!mesh.has_normals());
    }

    #[test]
    fn zero_and_overflowing_indices_are_errors() {
        let zero = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n";
        assert!(matches!(
            MeshData::parse(zero),
            Err(GeometryError::IndexOutOfRange { index: 0, .. })
        ));

        let past_end = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n";
        assert!(matches!(
            MeshData::parse(past_end),
            Err(GeometryError::IndexOutOfRange { index: 4, len: 3, .. })
        ));
    }

    #[test]
    fn garbage_is_reported() {
        assert!(matches!(
            MeshData::parse("v 0 zero 0\n"),
            Err(GeometryError::BadNumber { line: 1, .. })
        ));
        assert!(matches!(
            MeshData::parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/a/1 2 3\n"),
            Err(GeometryError::BadCorner { line: 4, .. })
        ));
        assert!(matches!(
            MeshData::parse("v 0 0 0\nv 1 0 0\nf 1 2\n"),
            Err(GeometryError::DegenerateFace { corners: 2, .. })
        ));
    }

    #[test]
    fn comments_and_unknown_records_are_ignored() {
        let source = "# a triangle\no tri\ns off\nusemtl none\n\n".to_string() + TRIANGLE;
        assert_eq!(MeshData::parse(&source).unwrap().vertex_count(), 3);
    }
}
