//! STL reader and writer for raw triangle batches.
//!
//! ```text
//! UINT8[80]    – Header (ignored on read)
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (written as 0)
//! end
//! ```
//!
//! STL has no shared vertices, so triangles come back as raw point triples.

use std::io::{Read, Write};

use nom::{
    bytes::complete::{tag, take},
    character::complete::{multispace0, multispace1, not_line_ending},
    combinator::opt,
    multi::{count, many0},
    number::complete::{float, le_f32, le_u16, le_u32},
    sequence::preceded,
    IResult,
};
use tracing::debug;

use crate::error::{LnasError, Result};
use crate::geometry::index_count;

/// Binary header size in bytes.
pub const HEADER_SIZE: usize = 80;

/// Size of one triangle record (normal + 3 vertices + attribute).
pub const TRIANGLE_SIZE: usize = 50;

/// Three vertex positions of one triangle
pub type StlTriangle = [[f32; 3]; 3];

/// Triangles and their normals as read from an STL stream
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StlMesh {
    pub triangles: Vec<StlTriangle>,
    pub normals: Vec<[f32; 3]>,
}

/// Read a binary STL from a stream.
pub fn read_stl<R: Read>(reader: &mut R) -> Result<StlMesh> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    parse_binary_stl(&data)
}

/// Parse a binary STL buffer
pub fn parse_binary_stl(data: &[u8]) -> Result<StlMesh> {
    if data.len() < HEADER_SIZE + 4 {
        return Err(LnasError::stl("file too small to be a valid STL"));
    }

    let declared = u32::from_le_bytes([
        data[HEADER_SIZE],
        data[HEADER_SIZE + 1],
        data[HEADER_SIZE + 2],
        data[HEADER_SIZE + 3],
    ]) as usize;
    let available = (data.len() - HEADER_SIZE - 4) / TRIANGLE_SIZE;
    if available < declared {
        return Err(LnasError::stl(format!(
            "unexpected end of file: {declared} triangles declared, {available} present"
        )));
    }

    match binary_stl(data) {
        Ok((_, mesh)) => {
            debug!(triangles = mesh.triangles.len(), "Read binary STL");
            Ok(mesh)
        }
        Err(e) => Err(LnasError::stl(format!("failed to parse binary STL: {e:?}"))),
    }
}

fn binary_stl(input: &[u8]) -> IResult<&[u8], StlMesh> {
    let (input, _) = take(HEADER_SIZE)(input)?;
    let (input, n) = le_u32(input)?;
    let (input, facets) = count(binary_facet, n as usize)(input)?;

    let (normals, triangles) = facets.into_iter().unzip();
    Ok((input, StlMesh { triangles, normals }))
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], ([f32; 3], StlTriangle)> {
    let (input, normal) = le_vector3(input)?;
    let (input, v0) = le_vector3(input)?;
    let (input, v1) = le_vector3(input)?;
    let (input, v2) = le_vector3(input)?;
    // Attribute byte count
    let (input, _) = le_u16(input)?;
    Ok((input, (normal, [v0, v1, v2])))
}

fn le_vector3(input: &[u8]) -> IResult<&[u8], [f32; 3]> {
    let (input, x) = le_f32(input)?;
    let (input, y) = le_f32(input)?;
    let (input, z) = le_f32(input)?;
    Ok((input, [x, y, z]))
}

/// Write triangles as binary STL.
///
/// Missing normals are computed from the winding order; zero-area triangles get
/// a zero normal.
pub fn write_stl<W: Write>(
    writer: &mut W,
    triangles: &[StlTriangle],
    normals: Option<&[[f32; 3]]>,
) -> Result<()> {
    if let Some(normals) = normals {
        if normals.len() != triangles.len() {
            return Err(LnasError::NormalsLengthMismatch {
                triangles: triangles.len(),
                normals: normals.len(),
            });
        }
    }

    let count = index_count("triangles", triangles.len())?;

    let mut header = [b' '; HEADER_SIZE];
    let text = b"Binary STL generated by lnas-core";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;

    writer.write_all(&count.to_le_bytes())?;

    for (i, tri) in triangles.iter().enumerate() {
        let normal = match normals {
            Some(normals) => normals[i],
            None => facet_normal(tri),
        };
        write_vector3(writer, &normal)?;
        for v in tri {
            write_vector3(writer, v)?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }

    debug!(triangles = triangles.len(), "Wrote binary STL");
    Ok(())
}

/// Encode triangles as an in-memory binary STL
pub fn stl_binary(triangles: &[StlTriangle], normals: Option<&[[f32; 3]]>) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(HEADER_SIZE + 4 + triangles.len() * TRIANGLE_SIZE);
    write_stl(&mut buffer, triangles, normals)?;
    Ok(buffer)
}

fn write_vector3<W: Write>(writer: &mut W, v: &[f32; 3]) -> Result<()> {
    for c in v {
        writer.write_all(&c.to_le_bytes())?;
    }
    Ok(())
}

fn facet_normal(tri: &StlTriangle) -> [f32; 3] {
    let e1 = [tri[1][0] - tri[0][0], tri[1][1] - tri[0][1], tri[1][2] - tri[0][2]];
    let e2 = [tri[2][0] - tri[0][0], tri[2][1] - tri[0][1], tri[2][2] - tri[0][2]];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > f32::EPSILON {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<StlMesh> {
    match ascii_stl(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(LnasError::stl(format!("failed to parse ASCII STL: {e:?}"))),
    }
}

fn ascii_stl(input: &str) -> IResult<&str, StlMesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    // Optional name
    let (input, _) = not_line_ending(input)?;
    let (input, facets) = many0(ascii_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _) = opt(not_line_ending)(input)?;

    let (normals, triangles) = facets.into_iter().unzip();
    Ok((input, StlMesh { triangles, normals }))
}

fn ascii_facet(input: &str) -> IResult<&str, ([f32; 3], StlTriangle)> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = ascii_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = ascii_vertex(input)?;
    let (input, v2) = ascii_vertex(input)?;
    let (input, v3) = ascii_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, (normal, [v1, v2, v3])))
}

fn ascii_vertex(input: &str) -> IResult<&str, [f32; 3]> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    ascii_vector3(input)
}

fn ascii_vector3(input: &str) -> IResult<&str, [f32; 3]> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, [x, y, z]))
}

/// Detect and parse STL data (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<StlMesh> {
    // Binary headers may also start with "solid"
    if data.len() > 5 && &data[0..5] == b"solid" {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(mesh) = parse_ascii_stl(text) {
                return Ok(mesh);
            }
        }
    }

    parse_binary_stl(data)
}
