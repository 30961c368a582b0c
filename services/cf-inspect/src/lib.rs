//! Command-line inspection of CF datasets and mesh files.
//!
//! A JSON dataset description is run through role detection, coordinate
//! classification and mesh generation. A mesh file (`.vti`, `.vtr`, `.vts`,
//! `.vtk`) is read through the reader registry instead. Either way the
//! result is a [`Report`] holding a serializable mesh summary.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use cf_mesh::{
    generate_mesh, CoordinateClassification, CoordinateRoles, CoordinateType, MeshConfig,
    MeshContext, MeshRequest, MeshSummary,
};
use mesh_common::{AxisAssignment, AxisRole, Dataset, SliceSpec};
use mesh_io::{write_legacy_file, ReaderRegistry};

#[derive(Parser, Debug, Clone)]
#[command(name = "cf-inspect")]
#[command(about = "Inspect CF coordinates and summarize the generated mesh")]
pub struct Args {
    /// Dataset description (JSON) or mesh file (.vti, .vtr, .vts, .vtk)
    pub input: PathBuf,

    /// Field to attach to the mesh (repeatable; default: first data variable)
    #[arg(short, long = "field")]
    pub fields: Vec<String>,

    /// Index along the time dimension
    #[arg(short, long, default_value_t = 0)]
    pub time_index: usize,

    /// Slices as JSON, e.g. '{"lon": [0, 10, 2], "lev": 3}'
    #[arg(long)]
    pub slices: Option<String>,

    /// Dimension used as x (longitude)
    #[arg(long)]
    pub x: Option<String>,

    /// Dimension used as y (latitude)
    #[arg(long)]
    pub y: Option<String>,

    /// Dimension used as z (vertical)
    #[arg(long)]
    pub z: Option<String>,

    /// Dimension used as time
    #[arg(long)]
    pub t: Option<String>,

    /// Assign axes from the field's dimension order
    #[arg(long)]
    pub auto_axes: bool,

    /// Keep coordinates planar instead of projecting onto a sphere
    #[arg(long)]
    pub planar: bool,

    /// Offset added to vertical positions
    #[arg(long)]
    pub vertical_bias: Option<f64>,

    /// Factor applied to vertical positions
    #[arg(long)]
    pub vertical_scale: Option<f64>,

    /// Fill structured points on a single thread
    #[arg(long)]
    pub sequential: bool,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the mesh as an ASCII legacy .vtk file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Args {
    /// Mesh configuration from the environment, overridden by flags.
    pub fn mesh_config(&self) -> Result<MeshConfig> {
        let mut config = MeshConfig::from_env();
        if self.planar {
            config.spherical = false;
        }
        if let Some(bias) = self.vertical_bias {
            config.vertical_bias = bias;
        }
        if let Some(scale) = self.vertical_scale {
            config.vertical_scale = scale;
        }
        if self.sequential {
            config.parallel = false;
        }
        config
            .validate()
            .map_err(|e| anyhow!("invalid mesh configuration: {}", e))?;
        Ok(config)
    }

    fn explicit_axes(&self) -> AxisAssignment {
        AxisAssignment {
            x: self.x.clone(),
            y: self.y.clone(),
            z: self.z.clone(),
            t: self.t.clone(),
        }
    }
}

/// Result of one inspection.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<CoordinateRoles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<CoordinateClassification>,
    pub mesh: MeshSummary,
}

impl Report {
    /// Human-readable role mapping and classification.
    pub fn describe(&self) -> String {
        let mut text = String::new();
        if let Some(roles) = &self.roles {
            let _ = write!(text, "{}", roles);
        }
        if let Some(classification) = &self.classification {
            let _ = write!(text, "{}", classification);
        }
        if let Some(generator) = &self.generator {
            let _ = writeln!(text, "Generator: {}", generator);
        }
        let _ = writeln!(
            text,
            "Mesh: {} {} ({} points, {} cells, {})",
            self.mesh.kind,
            self.mesh.extent,
            self.mesh.n_points,
            self.mesh.n_cells,
            self.mesh.data_location
        );
        text
    }
}

/// Inspect the input named by `args`.
pub fn run(args: &Args) -> Result<Report> {
    let report = if mesh_io::guess_can_open(&args.input) {
        inspect_mesh_file(args)?
    } else {
        inspect_dataset(args)?
    };

    info!(
        kind = %report.mesh.kind,
        points = report.mesh.n_points,
        cells = report.mesh.n_cells,
        fields = report.mesh.fields.len(),
        "Inspection complete"
    );
    Ok(report)
}

fn inspect_mesh_file(args: &Args) -> Result<Report> {
    let mesh = ReaderRegistry::new()
        .read(&args.input)
        .with_context(|| format!("failed to read mesh file {}", args.input.display()))?;
    if let Some(path) = &args.export {
        export(&mesh, path)?;
    }

    Ok(Report {
        input: args.input.display().to_string(),
        generator: None,
        roles: None,
        classification: None,
        mesh: mesh.summary(),
    })
}

fn inspect_dataset(args: &Args) -> Result<Report> {
    let dataset = Dataset::from_path(&args.input)
        .with_context(|| format!("failed to load dataset {}", args.input.display()))?;
    let detected = CoordinateRoles::detect(&dataset);

    let fields = if args.fields.is_empty() {
        let first = detected
            .field_names()
            .next()
            .ok_or_else(|| anyhow!("dataset has no data variables"))?;
        vec![first.to_string()]
    } else {
        args.fields.clone()
    };

    let slices = match &args.slices {
        Some(json) => SliceSpec::from_json_str(json).context("failed to parse --slices")?,
        None => SliceSpec::new(),
    };

    let mut assignment = if args.auto_axes {
        auto_assignment(&dataset, &fields[0])?
    } else {
        AxisAssignment::default()
    };
    let explicit = args.explicit_axes();
    for role in AxisRole::ALL {
        if let Some(name) = explicit.get(role) {
            assignment.set(role, Some(name.to_string()));
        }
    }

    let request = MeshRequest::new(fields)
        .with_time_index(args.time_index)
        .with_slices(slices)
        .with_assignment(assignment)
        .with_config(args.mesh_config()?);

    let context = MeshContext::new(&dataset, &request)?;
    let generator = context.generator();
    let roles = context.roles.clone();
    let classification = context.classification;
    info!(generator = %generator, dims = ?context.dimensions, "Selected generator");

    let mesh = generate_mesh(&dataset, &request)?;
    if let Some(path) = &args.export {
        export(&mesh, path)?;
    }

    Ok(Report {
        input: args.input.display().to_string(),
        generator: Some(generator.as_str().to_string()),
        roles: Some(roles),
        classification: Some(classification),
        mesh: mesh.summary(),
    })
}

/// Axis roles from the dimension order of `field`.
fn auto_assignment(dataset: &Dataset, field: &str) -> Result<AxisAssignment> {
    let variable = dataset.variable(field)?;
    let outer_is_time = variable
        .dims()
        .first()
        .and_then(|dim| dataset.get(dim))
        .map(|coord| {
            CoordinateType::from_variable(coord) == CoordinateType::Time
                || CoordinateType::can_be_time(coord)
        })
        .unwrap_or(false);
    Ok(AxisAssignment::from_dims(variable.dims(), outer_is_time))
}

fn export(mesh: &cf_mesh::Mesh, path: &Path) -> Result<()> {
    write_legacy_file(mesh, path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Exported mesh");
    Ok(())
}

/// Write the report as pretty JSON to `path`, or to stdout.
pub fn write_report(report: &Report, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match path {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
