//! ASCII legacy `.vtk` reader and writer.
//!
//! Supports the three grid datasets a [`Mesh`] can hold:
//! `STRUCTURED_POINTS`, `RECTILINEAR_GRID` and `STRUCTURED_GRID`, with
//! `SCALARS`, `VECTORS`, `NORMALS` and `FIELD` attribute arrays. Binary
//! files are rejected.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::{Array1, Array2};

use cf_mesh::{
    Buffer, DataLocation, Extent, Mesh, MeshGeometry, RectilinearGrid, StructuredGrid,
    UniformGrid,
};
use mesh_common::{MeshError, MeshResult};

use crate::format::{MeshFormat, MeshReader};

const HEADER: &str = "# vtk DataFile Version 3.0";
const VALUES_PER_LINE: usize = 9;

/// Reader for ASCII legacy `.vtk` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyVtkReader;

impl MeshReader for LegacyVtkReader {
    fn format(&self) -> MeshFormat {
        MeshFormat::Legacy
    }

    fn read(&self, path: &Path) -> MeshResult<Mesh> {
        let text = std::fs::read_to_string(path)?;
        read_legacy(&text)
    }
}

/// Parse the contents of an ASCII legacy file.
pub fn read_legacy(text: &str) -> MeshResult<Mesh> {
    let mut lines = text.lines();
    let version = lines.next().unwrap_or_default();
    if !version.trim_start().to_lowercase().starts_with("# vtk datafile") {
        return Err(MeshError::malformed_file("missing '# vtk DataFile' header"));
    }
    let _title = lines.next();
    match lines.next().map(|l| l.trim().to_uppercase()).as_deref() {
        Some("ASCII") => {}
        Some("BINARY") => {
            return Err(MeshError::UnsupportedFileFormat(
                "binary legacy .vtk files".to_string(),
            ))
        }
        other => {
            return Err(MeshError::malformed_file(format!(
                "expected ASCII or BINARY, found {:?}",
                other.unwrap_or_default()
            )))
        }
    }

    let body: Vec<&str> = lines.collect();
    let mut tokens = Tokens::new(&body);
    tokens.keyword("DATASET")?;
    let dataset = tokens.word()?.to_uppercase();

    let geometry = match dataset.as_str() {
        "STRUCTURED_POINTS" => read_structured_points(&mut tokens)?,
        "RECTILINEAR_GRID" => read_rectilinear_grid(&mut tokens)?,
        "STRUCTURED_GRID" => read_structured_grid(&mut tokens)?,
        other => {
            return Err(MeshError::UnsupportedFileFormat(format!(
                "legacy dataset type {}",
                other
            )))
        }
    };

    let mut mesh = Mesh::new(geometry, DataLocation::PointData);
    let attributes = read_attributes(&mut tokens, &mesh)?;
    if !attributes.points.is_empty() {
        if !attributes.cells.is_empty() {
            tracing::warn!(
                dropped = ?attributes.cells.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
                "Mesh holds point data; cell data arrays are ignored"
            );
        }
        mesh.fields.extend(attributes.points);
    } else if !attributes.cells.is_empty() {
        mesh.data_location = DataLocation::CellData;
        mesh.fields.extend(attributes.cells);
    }

    tracing::debug!(
        kind = %mesh.kind(),
        dimensions = ?mesh.dimensions(),
        fields = mesh.fields.len(),
        "Parsed legacy mesh"
    );
    Ok(mesh)
}

fn read_structured_points(tokens: &mut Tokens<'_>) -> MeshResult<MeshGeometry> {
    let mut dims = None;
    let mut origin = [0.0; 3];
    let mut spacing = [1.0; 3];
    while let Some(word) = tokens.peek_upper() {
        match word.as_str() {
            "DIMENSIONS" => {
                tokens.advance();
                dims = Some(tokens.triple_usize()?);
            }
            "ORIGIN" => {
                tokens.advance();
                origin = tokens.triple_f64()?;
            }
            "SPACING" | "ASPECT_RATIO" => {
                tokens.advance();
                spacing = tokens.triple_f64()?;
            }
            _ => break,
        }
    }
    let extent = extent_from(dims)?;
    Ok(MeshGeometry::Uniform(UniformGrid {
        origin,
        spacing,
        extent,
    }))
}

fn read_rectilinear_grid(tokens: &mut Tokens<'_>) -> MeshResult<MeshGeometry> {
    let mut dims = None;
    let mut axes: [Option<Array1<f64>>; 3] = [None, None, None];
    while let Some(word) = tokens.peek_upper() {
        let axis = match word.as_str() {
            "DIMENSIONS" => {
                tokens.advance();
                dims = Some(tokens.triple_usize()?);
                continue;
            }
            "X_COORDINATES" => 0,
            "Y_COORDINATES" => 1,
            "Z_COORDINATES" => 2,
            _ => break,
        };
        tokens.advance();
        let n = tokens.usize()?;
        let _data_type = tokens.word()?;
        axes[axis] = Some(Array1::from(tokens.values(n)?));
    }

    let extent = extent_from(dims)?;
    let dimensions = extent.dimensions();
    let [x, y, z] = axes;
    let coordinates = |values: Option<Array1<f64>>, axis: usize| -> MeshResult<Buffer> {
        let label = ["X", "Y", "Z"][axis];
        let values =
            values.ok_or_else(|| MeshError::malformed_file(format!("missing {}_COORDINATES", label)))?;
        if values.len() != dimensions[axis] {
            return Err(MeshError::malformed_file(format!(
                "{} {}_COORDINATES for dimension {}",
                values.len(),
                label,
                dimensions[axis]
            )));
        }
        Ok(Buffer::Owned(values))
    };

    Ok(MeshGeometry::Rectilinear(RectilinearGrid {
        x: coordinates(x, 0)?,
        y: coordinates(y, 1)?,
        z: coordinates(z, 2)?,
        extent,
    }))
}

fn read_structured_grid(tokens: &mut Tokens<'_>) -> MeshResult<MeshGeometry> {
    let mut dims = None;
    let mut points = None;
    while let Some(word) = tokens.peek_upper() {
        match word.as_str() {
            "DIMENSIONS" => {
                tokens.advance();
                dims = Some(tokens.triple_usize()?);
            }
            "POINTS" => {
                tokens.advance();
                let n = tokens.usize()?;
                let _data_type = tokens.word()?;
                let values = tokens.values(product(&[n, 3])?)?;
                points = Some(Array2::from_shape_vec((n, 3), values)?);
            }
            _ => break,
        }
    }

    let extent = extent_from(dims)?;
    let points = points.ok_or_else(|| MeshError::malformed_file("missing POINTS"))?;
    if points.nrows() != extent.point_count() {
        return Err(MeshError::malformed_file(format!(
            "{} points for dimensions {:?}",
            points.nrows(),
            extent.dimensions()
        )));
    }
    Ok(MeshGeometry::Structured(StructuredGrid { points, extent }))
}

fn extent_from(dims: Option<[usize; 3]>) -> MeshResult<Extent> {
    let dims = dims.ok_or_else(|| MeshError::malformed_file("missing DIMENSIONS"))?;
    if dims.contains(&0) {
        return Err(MeshError::malformed_file(format!("empty DIMENSIONS {:?}", dims)));
    }
    product(&dims)?;
    Ok(Extent::from_upper([dims[0] - 1, dims[1] - 1, dims[2] - 1]))
}

/// Product of header counts; overflow means the header is corrupt.
fn product(counts: &[usize]) -> MeshResult<usize> {
    counts
        .iter()
        .try_fold(1usize, |acc, n| acc.checked_mul(*n))
        .ok_or_else(|| MeshError::malformed_file(format!("counts {:?} overflow", counts)))
}

#[derive(Default)]
struct Attributes {
    points: Vec<(String, Buffer)>,
    cells: Vec<(String, Buffer)>,
}

fn read_attributes(tokens: &mut Tokens<'_>, mesh: &Mesh) -> MeshResult<Attributes> {
    let mut attributes = Attributes::default();
    // (location, tuple count) of the current section.
    let mut section: Option<(DataLocation, usize)> = None;

    while let Some(word) = tokens.peek_upper() {
        tokens.advance();
        match word.as_str() {
            "POINT_DATA" | "CELL_DATA" => {
                let count = tokens.usize()?;
                let (location, expected) = if word == "POINT_DATA" {
                    (DataLocation::PointData, mesh.point_count())
                } else {
                    (DataLocation::CellData, mesh.cell_count())
                };
                if count != expected {
                    return Err(MeshError::malformed_file(format!(
                        "{} {} for a mesh with {} {}",
                        word, count, expected, location
                    )));
                }
                section = Some((location, count));
            }
            "SCALARS" => {
                let (location, count) = current(section, &word)?;
                let name = tokens.word()?.to_string();
                let _data_type = tokens.word()?;
                let ncomp = match tokens.peek().and_then(|t| t.parse::<usize>().ok()) {
                    Some(n) => {
                        tokens.advance();
                        n
                    }
                    None => 1,
                };
                if tokens.peek_upper().as_deref() == Some("LOOKUP_TABLE") {
                    tokens.advance();
                    tokens.word()?;
                }
                let values = tokens.values(product(&[count, ncomp])?)?;
                attributes.push(location, name, values);
            }
            "VECTORS" | "NORMALS" => {
                let (location, count) = current(section, &word)?;
                let name = tokens.word()?.to_string();
                let _data_type = tokens.word()?;
                let values = tokens.values(product(&[count, 3])?)?;
                attributes.push(location, name, values);
            }
            "FIELD" => {
                let _field_name = tokens.word()?;
                let arrays = tokens.usize()?;
                for _ in 0..arrays {
                    let name = tokens.word()?.to_string();
                    let ncomp = tokens.usize()?;
                    let ntuples = tokens.usize()?;
                    let _data_type = tokens.word()?;
                    let values = tokens.values(product(&[ncomp, ntuples])?)?;
                    match section {
                        Some((location, count)) if ntuples == count => {
                            attributes.push(location, name, values)
                        }
                        _ => tracing::debug!(array = %name, "Skipping dataset-level field array"),
                    }
                }
            }
            "LOOKUP_TABLE" => {
                let _name = tokens.word()?;
                let size = tokens.usize()?;
                tokens.values(product(&[size, 4])?)?;
            }
            other => {
                return Err(MeshError::malformed_file(format!(
                    "unexpected keyword '{}'",
                    other
                )))
            }
        }
    }
    Ok(attributes)
}

fn current(section: Option<(DataLocation, usize)>, keyword: &str) -> MeshResult<(DataLocation, usize)> {
    section.ok_or_else(|| {
        MeshError::malformed_file(format!("{} before POINT_DATA or CELL_DATA", keyword))
    })
}

impl Attributes {
    fn push(&mut self, location: DataLocation, name: String, values: Vec<f64>) {
        let entry = (name, Buffer::from(values));
        match location {
            DataLocation::PointData => self.points.push(entry),
            DataLocation::CellData => self.cells.push(entry),
        }
    }
}

/// Whitespace-separated tokens across the body lines.
struct Tokens<'a> {
    inner: std::iter::Peekable<Box<dyn Iterator<Item = &'a str> + 'a>>,
}

impl<'a> Tokens<'a> {
    fn new(lines: &[&'a str]) -> Self {
        let lines = lines.to_vec();
        let iter: Box<dyn Iterator<Item = &'a str> + 'a> =
            Box::new(lines.into_iter().flat_map(|line| line.split_whitespace()));
        Self {
            inner: iter.peekable(),
        }
    }

    fn peek(&mut self) -> Option<&'a str> {
        self.inner.peek().copied()
    }

    fn peek_upper(&mut self) -> Option<String> {
        self.peek().map(|t| t.to_uppercase())
    }

    fn advance(&mut self) {
        self.inner.next();
    }

    fn word(&mut self) -> MeshResult<&'a str> {
        self.inner
            .next()
            .ok_or_else(|| MeshError::malformed_file("unexpected end of file"))
    }

    fn keyword(&mut self, expected: &str) -> MeshResult<()> {
        let word = self.word()?;
        if !word.eq_ignore_ascii_case(expected) {
            return Err(MeshError::malformed_file(format!(
                "expected {}, found '{}'",
                expected, word
            )));
        }
        Ok(())
    }

    fn usize(&mut self) -> MeshResult<usize> {
        let word = self.word()?;
        word.parse()
            .map_err(|_| MeshError::malformed_file(format!("expected an integer, found '{}'", word)))
    }

    fn f64(&mut self) -> MeshResult<f64> {
        let word = self.word()?;
        word.parse()
            .map_err(|_| MeshError::malformed_file(format!("expected a number, found '{}'", word)))
    }

    fn triple_usize(&mut self) -> MeshResult<[usize; 3]> {
        Ok([self.usize()?, self.usize()?, self.usize()?])
    }

    fn triple_f64(&mut self) -> MeshResult<[f64; 3]> {
        Ok([self.f64()?, self.f64()?, self.f64()?])
    }

    fn values(&mut self, n: usize) -> MeshResult<Vec<f64>> {
        (0..n).map(|_| self.f64()).collect()
    }
}

/// Write a mesh as an ASCII legacy file.
///
/// Field names have whitespace replaced by underscores. Multi-component
/// fields are written as `SCALARS` with their component count.
pub fn write_legacy<W: Write>(mesh: &Mesh, mut writer: W) -> MeshResult<()> {
    writeln!(writer, "{}", HEADER)?;
    writeln!(writer, "{} mesh", mesh.kind())?;
    writeln!(writer, "ASCII")?;

    let [nx, ny, nz] = mesh.dimensions();
    match &mesh.geometry {
        MeshGeometry::Uniform(grid) => {
            let origin: Vec<f64> = (0..3)
                .map(|a| grid.origin[a] + grid.spacing[a] * grid.extent.0[a * 2] as f64)
                .collect();
            writeln!(writer, "DATASET STRUCTURED_POINTS")?;
            writeln!(writer, "DIMENSIONS {} {} {}", nx, ny, nz)?;
            writeln!(writer, "ORIGIN {} {} {}", origin[0], origin[1], origin[2])?;
            let s = grid.spacing;
            writeln!(writer, "SPACING {} {} {}", s[0], s[1], s[2])?;
        }
        MeshGeometry::Rectilinear(grid) => {
            writeln!(writer, "DATASET RECTILINEAR_GRID")?;
            writeln!(writer, "DIMENSIONS {} {} {}", nx, ny, nz)?;
            for (axis, label) in ["X", "Y", "Z"].into_iter().enumerate() {
                let values = grid.axis(axis).view();
                writeln!(writer, "{}_COORDINATES {} double", label, values.len())?;
                write_values(&mut writer, values.iter().copied())?;
            }
        }
        MeshGeometry::Structured(grid) => {
            writeln!(writer, "DATASET STRUCTURED_GRID")?;
            writeln!(writer, "DIMENSIONS {} {} {}", nx, ny, nz)?;
            writeln!(writer, "POINTS {} double", grid.points.nrows())?;
            for row in grid.points.rows() {
                writeln!(writer, "{} {} {}", row[0], row[1], row[2])?;
            }
        }
    }

    if !mesh.fields.is_empty() {
        let count = mesh.expected_field_len();
        let keyword = match mesh.data_location {
            DataLocation::PointData => "POINT_DATA",
            DataLocation::CellData => "CELL_DATA",
        };
        writeln!(writer, "{} {}", keyword, count)?;
        for (name, buffer) in &mesh.fields {
            if count == 0 || buffer.len() % count != 0 {
                return Err(MeshError::invalid_metadata(format!(
                    "field '{}' has {} values for {} tuples",
                    name,
                    buffer.len(),
                    count
                )));
            }
            let name: String = name
                .chars()
                .map(|c| if c.is_whitespace() { '_' } else { c })
                .collect();
            writeln!(writer, "SCALARS {} double {}", name, buffer.len() / count)?;
            writeln!(writer, "LOOKUP_TABLE default")?;
            write_values(&mut writer, buffer.view().iter().copied())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write a mesh to `path` as an ASCII legacy file.
pub fn write_legacy_file(mesh: &Mesh, path: impl AsRef<Path>) -> MeshResult<()> {
    let file = File::create(path.as_ref())?;
    write_legacy(mesh, BufWriter::new(file))
}

fn write_values<W: Write>(writer: &mut W, values: impl Iterator<Item = f64>) -> MeshResult<()> {
    let mut line = Vec::with_capacity(VALUES_PER_LINE);
    for value in values {
        line.push(value.to_string());
        if line.len() == VALUES_PER_LINE {
            writeln!(writer, "{}", line.join(" "))?;
            line.clear();
        }
    }
    if !line.is_empty() {
        writeln!(writer, "{}", line.join(" "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: &str = "# vtk DataFile Version 3.0
image
ASCII
DATASET STRUCTURED_POINTS
DIMENSIONS 3 2 1
ORIGIN 0 10 0
SPACING 0.5 2 1
POINT_DATA 6
SCALARS temp float
LOOKUP_TABLE default
0 1 2
3 4 5
CELL_DATA 2
SCALARS ignored float 1
LOOKUP_TABLE default
7 8
";

    #[test]
    fn test_read_structured_points() {
        let mesh = read_legacy(IMAGE).unwrap();
        match &mesh.geometry {
            MeshGeometry::Uniform(grid) => {
                assert_eq!(grid.origin, [0.0, 10.0, 0.0]);
                assert_eq!(grid.spacing, [0.5, 2.0, 1.0]);
                assert_eq!(grid.extent.dimensions(), [3, 2, 1]);
            }
            other => panic!("unexpected {}", other.kind()),
        }
        assert_eq!(mesh.data_location, DataLocation::PointData);
        assert_eq!(mesh.field("temp").unwrap().to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(mesh.field("ignored").is_none());
    }

    #[test]
    fn test_read_rectilinear_cell_data() {
        let text = "# vtk DataFile Version 2.0
r
ascii
DATASET RECTILINEAR_GRID
DIMENSIONS 3 2 1
X_COORDINATES 3 double
0 1 4
Y_COORDINATES 2 double
-1 1
Z_COORDINATES 1 double
0
CELL_DATA 2
FIELD FieldData 1
density 1 2 double
0.25 0.75
";
        let mesh = read_legacy(text).unwrap();
        assert_eq!(mesh.kind(), cf_mesh::MeshKind::Rectilinear);
        assert_eq!(mesh.data_location, DataLocation::CellData);
        assert_eq!(mesh.field("density").unwrap().to_vec(), vec![0.25, 0.75]);
    }

    #[test]
    fn test_binary_rejected() {
        let text = "# vtk DataFile Version 3.0\nb\nBINARY\nDATASET STRUCTURED_POINTS\n";
        let err = read_legacy(text).unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedFileFormat(_)));
    }

    #[test]
    fn test_malformed_inputs() {
        assert_eq!(read_legacy("not a vtk file").unwrap_err().code(), "MalformedFile");

        let short = IMAGE.replace("3 4 5", "3 4");
        assert_eq!(read_legacy(&short).unwrap_err().code(), "MalformedFile");

        let wrong_count = IMAGE.replace("POINT_DATA 6", "POINT_DATA 7");
        assert_eq!(read_legacy(&wrong_count).unwrap_err().code(), "MalformedFile");

        let no_dims = "# vtk DataFile Version 3.0\nx\nASCII\nDATASET STRUCTURED_GRID\nPOINTS 1 float\n0 0 0\n";
        assert_eq!(read_legacy(no_dims).unwrap_err().code(), "MalformedFile");
    }

    #[test]
    fn test_oversized_counts_rejected() {
        let huge = usize::MAX / 2;
        let points = format!(
            "# vtk DataFile Version 3.0\nx\nASCII\nDATASET STRUCTURED_GRID\nDIMENSIONS 1 1 1\nPOINTS {} float\n",
            huge
        );
        assert_eq!(read_legacy(&points).unwrap_err().code(), "MalformedFile");

        let dims = format!(
            "# vtk DataFile Version 3.0\nx\nASCII\nDATASET STRUCTURED_POINTS\nDIMENSIONS {} {} 2\n",
            huge, huge
        );
        assert_eq!(read_legacy(&dims).unwrap_err().code(), "MalformedFile");

        let scalars = IMAGE.replace("SCALARS temp float", &format!("SCALARS temp float {}", huge));
        assert_eq!(read_legacy(&scalars).unwrap_err().code(), "MalformedFile");
    }

    #[test]
    fn test_unsupported_dataset_type() {
        let text = "# vtk DataFile Version 3.0\nu\nASCII\nDATASET UNSTRUCTURED_GRID\n";
        assert!(matches!(
            read_legacy(text).unwrap_err(),
            MeshError::UnsupportedFileFormat(_)
        ));
    }

    #[test]
    fn test_write_wraps_values() {
        let mesh = read_legacy(IMAGE).unwrap();
        let mut out = Vec::new();
        write_legacy(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(HEADER));
        assert!(text.contains("DATASET STRUCTURED_POINTS"));
        assert!(text.contains("SCALARS temp double 1"));
        assert!(text.contains("0 1 2 3 4 5\n"));
    }
}
