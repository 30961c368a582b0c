//! Mesh ↔ dataset round trips, grid builders and mesh files.

use std::path::Path;
use std::sync::Arc;

use cf_mesh::{
    generate_mesh, Buffer, DataLocation, Extent, Mesh, MeshConfig, MeshError, MeshGeometry,
    MeshKind, MeshRequest, RectilinearGrid, StructuredGrid, UniformGrid,
};
use mesh_common::{Dataset, MeshResult, Variable};
use mesh_io::{
    image_to_rectilinear, mesh_to_dataset, rectilinear, structured, write_legacy_file, ArrayOrder,
    GridOptions, MeshFormat, MeshReader, ReaderRegistry,
};
use tempfile::TempDir;
use test_utils::{
    assert_slice_approx_eq, curvilinear_ocean, index_ramp, uneven_lat_lon, uniform_4d,
    uniform_lat_lon, AIR, TEMP,
};

fn planar(field: &str) -> MeshRequest {
    MeshRequest::new([field]).with_config(MeshConfig::planar())
}

fn values(dataset: &Dataset, name: &str) -> Vec<f64> {
    dataset.get(name).unwrap().data().iter().copied().collect()
}

fn rect(mesh: &Mesh) -> &RectilinearGrid {
    match &mesh.geometry {
        MeshGeometry::Rectilinear(grid) => grid,
        other => panic!("expected rectilinear grid, got {}", other.kind()),
    }
}

fn points(mesh: &Mesh) -> &StructuredGrid {
    match &mesh.geometry {
        MeshGeometry::Structured(grid) => grid,
        other => panic!("expected structured grid, got {}", other.kind()),
    }
}

/// Point-data image with `v = 0..12` on a 4 x 3 x 1 grid.
fn image_mesh() -> Mesh {
    let grid = UniformGrid {
        origin: [0.0, -1.0, 5.0],
        spacing: [0.5, 2.0, 1.0],
        extent: Extent::from_upper([3, 2, 0]),
    };
    let mut mesh = Mesh::new(MeshGeometry::Uniform(grid), DataLocation::PointData);
    mesh.fields.insert("v".into(), Buffer::from((0..12).map(f64::from).collect::<Vec<_>>()));
    mesh
}

/// `lat(2)`, `lon(3)`, `elev(lat, lon)` and `wind(lat, lon, comp)`.
fn small_grid() -> Dataset {
    let dims = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
    Dataset::new()
        .with_coord(Variable::coordinate("lat", vec![-5.0, 5.0]))
        .unwrap()
        .with_coord(Variable::coordinate("lon", vec![10.0, 20.0, 30.0]))
        .unwrap()
        .with_data_var(Variable::new("elev", dims(&["lat", "lon"]), index_ramp(&[2, 3])).unwrap())
        .unwrap()
        .with_data_var(
            Variable::new("wind", dims(&["lat", "lon", "comp"]), index_ramp(&[2, 3, 2])).unwrap(),
        )
        .unwrap()
}

// =============================================================================
// Mesh → dataset
// =============================================================================

#[test]
fn test_rectilinear_round_trip_shares_memory() {
    let ds = uneven_lat_lon(3, 5);
    let mesh = generate_mesh(&ds, &planar(AIR)).unwrap();
    let out = mesh_to_dataset(&mesh).unwrap();

    let lon_ptr = ds.get("lon").unwrap().data().as_ptr();
    assert_eq!(out.get("x").unwrap().data().as_ptr(), lon_ptr);
    assert_eq!(values(&out, "x"), vec![0.0, 1.0, 3.0, 7.0, 15.0]);
    assert_eq!(values(&out, "y"), vec![-30.0, -10.0, 10.0]);

    let air = out.get(AIR).unwrap();
    assert_eq!(air.dims(), &["z", "y", "x"]);
    assert_eq!(air.shape(), &[1, 3, 5]);
    assert_eq!(air.data().as_ptr(), ds.get(AIR).unwrap().data().as_ptr());
    assert_eq!(out.attrs().get("mesh_kind").and_then(|a| a.as_str()), Some("rectilinear"));

    // Building the mesh back from the converted dataset restores it.
    let options = GridOptions::new().with_x("x").with_y("y").with_z("z");
    let rebuilt = rectilinear(&out, AIR, &options).unwrap();
    let grid = rect(&rebuilt);
    assert_eq!(grid.x.as_ptr(), lon_ptr);
    assert_eq!(grid.x.to_vec(), rect(&mesh).x.to_vec());
    assert_eq!(grid.y.to_vec(), rect(&mesh).y.to_vec());
    assert_eq!(rebuilt.extent(), mesh.extent());
    assert_eq!(rebuilt.field(AIR).unwrap().to_vec(), mesh.field(AIR).unwrap().to_vec());
}

#[test]
fn test_uniform_round_trip_reproduces_axes() {
    let mesh = image_mesh();
    let out = mesh_to_dataset(&mesh).unwrap();
    assert_eq!(values(&out, "x"), vec![0.0, 0.5, 1.0, 1.5]);
    assert_eq!(values(&out, "y"), vec![-1.0, 1.0, 3.0]);
    assert_eq!(values(&out, "z"), vec![5.0]);

    let options = GridOptions::new().with_x("x").with_y("y").with_z("z");
    let rebuilt = rectilinear(&out, "v", &options).unwrap();
    let grid = rect(&rebuilt);
    let MeshGeometry::Uniform(image) = &mesh.geometry else {
        panic!("expected uniform grid");
    };
    for axis in 0..3 {
        assert_slice_approx_eq!(
            grid.axis(axis).to_vec(),
            image.axis_coordinates(axis).to_vec(),
            1e-12
        );
    }
    assert_eq!(rebuilt.field("v").unwrap().to_vec(), mesh.field("v").unwrap().to_vec());
}

#[test]
fn test_cell_data_uses_cell_dimensions() {
    let ds = uniform_lat_lon(3, 4);
    let mesh = generate_mesh(&ds, &planar(AIR)).unwrap();
    assert_eq!(mesh.data_location, DataLocation::CellData);

    let out = mesh_to_dataset(&mesh).unwrap();
    let air = out.get(AIR).unwrap();
    assert_eq!(air.dims(), &["z_cell", "y_cell", "x_cell"]);
    assert_eq!(air.shape(), &[1, 3, 4]);
    assert_eq!(values(&out, "x").len(), 5);
    assert_eq!(out.attrs().get("data_location").and_then(|a| a.as_str()), Some("cell_data"));
}

#[test]
fn test_uniform_cells_round_trip_reproduces_centers() {
    let ds = uniform_lat_lon(3, 4);
    let mesh = generate_mesh(&ds, &planar(AIR)).unwrap();
    assert_eq!(mesh.kind(), MeshKind::Uniform);

    let out = mesh_to_dataset(&mesh).unwrap();
    assert_slice_approx_eq!(values(&out, "x_cell"), values(&ds, "lon"), 1e-9);
    assert_slice_approx_eq!(values(&out, "y_cell"), values(&ds, "lat"), 1e-9);
    assert_eq!(values(&out, "z_cell").len(), 1);
    assert_eq!(out.get(AIR).unwrap().dims(), &["z_cell", "y_cell", "x_cell"]);
}

#[test]
fn test_rectilinear_cells_round_trip_reproduces_centers() {
    let grid = RectilinearGrid::new(
        Buffer::from(vec![0.0, 1.0, 3.0, 7.0]),
        Buffer::from(vec![-2.0, 2.0]),
        Buffer::placeholder(),
    );
    let mut mesh = Mesh::new(MeshGeometry::Rectilinear(grid), DataLocation::CellData);
    mesh.fields.insert("v".into(), Buffer::from(vec![1.0, 2.0, 3.0]));

    let out = mesh_to_dataset(&mesh).unwrap();
    assert_eq!(values(&out, "x_cell"), vec![0.5, 2.0, 5.0]);
    assert_eq!(values(&out, "y_cell"), vec![0.0]);
    assert_eq!(values(&out, "x"), vec![0.0, 1.0, 3.0, 7.0]);
    assert_eq!(out.get("v").unwrap().shape(), &[1, 1, 3]);
}

#[test]
fn test_structured_round_trip_copies_points() {
    let ds = curvilinear_ocean();
    let mesh = generate_mesh(&ds, &planar(TEMP).with_time_index(1)).unwrap();
    let out = mesh_to_dataset(&mesh).unwrap();

    let x = out.get("x").unwrap();
    assert_eq!(x.dims(), &["zi", "yi", "xi"]);
    assert_eq!(x.shape(), &[3, 4, 5]);
    assert_eq!(out.get(TEMP).unwrap().shape(), &[3, 4, 5]);

    let options = GridOptions::new()
        .with_x("x")
        .with_y("y")
        .with_z("z")
        .with_order(ArrayOrder::C);
    let rebuilt = structured(&out, TEMP, &options).unwrap();
    assert_eq!(rebuilt.extent(), mesh.extent());
    assert_eq!(points(&rebuilt).points, points(&mesh).points);
    assert_eq!(rebuilt.field(TEMP).unwrap().to_vec(), mesh.field(TEMP).unwrap().to_vec());
}

// =============================================================================
// Builders
// =============================================================================

#[test]
fn test_rectilinear_requires_an_axis() {
    let ds = uniform_lat_lon(3, 4);
    let err = rectilinear(&ds, AIR, &GridOptions::new()).unwrap_err();
    assert!(err
        .to_string()
        .contains("You must specify at least one dimension as X, Y, or Z."));
}

#[test]
fn test_rectilinear_dimension_mismatch() {
    let ds = uniform_lat_lon(3, 4);
    let err = rectilinear(&ds, AIR, &GridOptions::new().with_x("lon")).unwrap_err();
    assert!(matches!(err, MeshError::TooFewAxes { axes: 1, rank: 2 }));
    assert!(err.to_string().contains("Too few coordinate dimensions"));

    let ds = uniform_4d();
    let options = GridOptions::new().with_x("lon").with_y("lat").with_z("lev");
    let err = rectilinear(&ds, "topo", &options).unwrap_err();
    assert!(matches!(err, MeshError::TooManyAxes { axes: 3, rank: 2 }));
    assert!(err.to_string().contains("Too many coordinate dimensions"));
}

#[test]
fn test_rectilinear_scales_copy_axis() {
    let ds = uniform_lat_lon(3, 4);
    let options = GridOptions::new()
        .with_x("lon")
        .with_y("lat")
        .with_scale("lon", 2.0);
    let mesh = rectilinear(&ds, AIR, &options).unwrap();
    let grid = rect(&mesh);

    assert!(!grid.x.is_shared());
    assert_eq!(grid.x.to_vec(), vec![0.0, 60.0, 120.0, 180.0]);
    assert!(grid.y.is_shared());
    assert_eq!(grid.y.as_ptr(), ds.get("lat").unwrap().data().as_ptr());
    assert_eq!(grid.z.to_vec(), vec![0.0]);

    let air = mesh.field(AIR).unwrap();
    assert!(air.is_shared());
    assert_eq!(air.as_ptr(), ds.get(AIR).unwrap().data().as_ptr());
}

#[test]
fn test_rectilinear_component_field() {
    let ds = small_grid();
    let options = GridOptions::new()
        .with_x("lon")
        .with_y("lat")
        .with_component("comp");
    let mesh = rectilinear(&ds, "wind", &options).unwrap();

    let wind = mesh.field("wind").unwrap();
    assert!(!wind.is_shared());
    assert_eq!(wind.len(), 12);

    let out = mesh_to_dataset(&mesh).unwrap();
    let wind = out.get("wind").unwrap();
    assert_eq!(wind.dims(), &["z", "y", "x", "component"]);
    assert_eq!(wind.shape(), &[1, 2, 3, 2]);
    // lat 1, lon 2, component 1
    assert_eq!(wind.data()[[0, 1, 2, 1]], 11.0);
}

#[test]
fn test_structured_axis_count_messages() {
    let ds = small_grid();
    let err = structured(&ds, "elev", &GridOptions::new()).unwrap_err();
    assert!(err
        .to_string()
        .contains("You must specify at least two dimensions as X, Y, or Z."));

    let err = structured(&ds, "elev", &GridOptions::new().with_x("lon")).unwrap_err();
    assert!(err
        .to_string()
        .contains("One dimensional structured grids should be rectilinear grids."));
}

#[test]
fn test_structured_dimension_mismatch() {
    let ds = small_grid();

    // 2-D coordinates cannot carry a 3-D field unless the extra dim is a component.
    let options = GridOptions::new().with_x("elev").with_y("lat");
    let err = structured(&ds, "wind", &options).unwrap_err();
    assert!(matches!(err, MeshError::TooFewAxes { axes: 2, rank: 3 }));
    assert!(err.to_string().contains("Too few coordinate dimensions"));

    let mesh = structured(&ds, "wind", &options.with_component("comp")).unwrap();
    assert_eq!(mesh.field("wind").unwrap().len(), 12);

    let options = GridOptions::new().with_x("wind").with_y("lat");
    let err = structured(&ds, "elev", &options).unwrap_err();
    assert!(matches!(err, MeshError::TooManyAxes { axes: 3, rank: 2 }));
    assert!(err.to_string().contains("Too many coordinate dimensions"));
}

#[test]
fn test_structured_broadcasts_coordinates() {
    let ds = small_grid();
    let options = GridOptions::new()
        .with_x("lon")
        .with_y("lat")
        .with_z("elev")
        .with_order(ArrayOrder::C);
    let mesh = structured(&ds, "elev", &options).unwrap();
    let grid = points(&mesh);

    assert_eq!(mesh.extent().0, [0, 2, 0, 1, 0, 0]);
    assert_eq!(grid.point(1), [20.0, -5.0, 1.0]);
    assert_eq!(grid.point(5), [30.0, 5.0, 5.0]);

    let elev = mesh.field("elev").unwrap();
    assert!(elev.is_shared());
    assert_eq!(elev.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn test_structured_fortran_order() {
    let ds = small_grid();
    let options = GridOptions::new().with_x("lon").with_y("lat").with_z("elev");
    let mesh = structured(&ds, "elev", &options).unwrap();
    let grid = points(&mesh);

    // First array dimension (lat) varies fastest.
    assert_eq!(mesh.extent().0, [0, 1, 0, 2, 0, 0]);
    assert_eq!(grid.point(1), [10.0, 5.0, 3.0]);
    assert_eq!(mesh.field("elev").unwrap().to_vec(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
}

#[test]
fn test_structured_scale() {
    let ds = small_grid();
    let options = GridOptions::new()
        .with_x("lon")
        .with_y("lat")
        .with_z("elev")
        .with_order(ArrayOrder::C)
        .with_scale("elev", 10.0);
    let mesh = structured(&ds, "elev", &options).unwrap();
    assert_eq!(points(&mesh).point(5), [30.0, 5.0, 50.0]);
}

// =============================================================================
// Image → rectilinear
// =============================================================================

#[test]
fn test_image_to_rectilinear_keeps_fields() {
    let ds = uniform_lat_lon(3, 4);
    let mesh = generate_mesh(&ds, &planar(AIR)).unwrap();
    let out = image_to_rectilinear(&mesh).unwrap();

    assert_eq!(out.kind(), MeshKind::Rectilinear);
    assert_eq!(out.extent(), mesh.extent());
    assert_eq!(out.data_location, DataLocation::CellData);
    assert_eq!(rect(&out).x.to_vec(), vec![-15.0, 15.0, 45.0, 75.0, 105.0]);
    assert_eq!(rect(&out).y.to_vec(), vec![-40.0, -20.0, 0.0, 20.0]);
    assert_eq!(
        out.field(AIR).unwrap().as_ptr(),
        mesh.field(AIR).unwrap().as_ptr()
    );
}

// =============================================================================
// Mesh files
// =============================================================================

struct FixedReader {
    format: MeshFormat,
}

impl MeshReader for FixedReader {
    fn format(&self) -> MeshFormat {
        self.format
    }

    fn read(&self, _path: &Path) -> MeshResult<Mesh> {
        Ok(image_mesh())
    }
}

#[test]
fn test_registry_uses_registered_reader() {
    let mut registry = ReaderRegistry::new();
    assert!(!registry.guess_can_open(Path::new("image.vti")));

    registry.register(Arc::new(FixedReader {
        format: MeshFormat::ImageData,
    }));
    assert!(registry.guess_can_open(Path::new("image.vti")));
    assert_eq!(
        registry.formats(),
        vec![MeshFormat::ImageData, MeshFormat::Legacy]
    );

    let ds = registry.open_dataset(Path::new("image.vti")).unwrap();
    assert_eq!(ds.attrs().get("mesh_kind").and_then(|a| a.as_str()), Some("uniform"));
    assert_eq!(values(&ds, "x"), vec![0.0, 0.5, 1.0, 1.5]);
}

#[test]
fn test_registry_checks_grid_kind() {
    let mut registry = ReaderRegistry::empty();
    registry.register(Arc::new(FixedReader {
        format: MeshFormat::StructuredGrid,
    }));
    let err = registry.read(Path::new("grid.vts")).unwrap_err();
    assert_eq!(err.code(), "MalformedFile");
}

fn legacy_round_trip(mesh: &Mesh) -> Mesh {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mesh.vtk");
    write_legacy_file(mesh, &path).unwrap();
    ReaderRegistry::new().read(&path).unwrap()
}

#[test]
fn test_legacy_uniform_cells() {
    let ds = uniform_lat_lon(3, 4);
    let mesh = generate_mesh(&ds, &planar(AIR)).unwrap();
    let read = legacy_round_trip(&mesh);

    assert_eq!(read.kind(), MeshKind::Uniform);
    assert_eq!(read.extent(), mesh.extent());
    assert_eq!(read.data_location, DataLocation::CellData);
    assert_eq!(read.geometry.bounds(), mesh.geometry.bounds());
    assert_eq!(read.field(AIR).unwrap().to_vec(), mesh.field(AIR).unwrap().to_vec());
}

#[test]
fn test_legacy_rectilinear_points() {
    let ds = uneven_lat_lon(3, 5);
    let mesh = generate_mesh(&ds, &planar(AIR)).unwrap();
    let read = legacy_round_trip(&mesh);

    assert_eq!(read.kind(), MeshKind::Rectilinear);
    assert_eq!(rect(&read).x.to_vec(), rect(&mesh).x.to_vec());
    assert_eq!(rect(&read).y.to_vec(), rect(&mesh).y.to_vec());
    assert_eq!(read.field(AIR).unwrap().to_vec(), mesh.field(AIR).unwrap().to_vec());
}

#[test]
fn test_legacy_structured_points() {
    let ds = curvilinear_ocean();
    let mesh = generate_mesh(&ds, &planar(TEMP)).unwrap();
    let read = legacy_round_trip(&mesh);

    assert_eq!(read.kind(), MeshKind::Structured);
    assert_eq!(read.extent(), mesh.extent());
    assert_eq!(points(&read).points, points(&mesh).points);
    assert_eq!(read.field(TEMP).unwrap().to_vec(), mesh.field(TEMP).unwrap().to_vec());
}

#[test]
fn test_open_dataset_from_legacy_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image.vtk");
    write_legacy_file(&image_mesh(), &path).unwrap();

    assert!(mesh_io::guess_can_open(&path));
    let ds = mesh_io::open_dataset(&path).unwrap();
    assert_eq!(values(&ds, "y"), vec![-1.0, 1.0, 3.0]);
    assert_eq!(ds.get("v").unwrap().shape(), &[1, 3, 4]);
}
