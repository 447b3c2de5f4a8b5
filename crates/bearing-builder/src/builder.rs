//! Staged bearing construction and export.
//!
//! Stages run strictly in order: balls → segments → tracks → wheels. Each
//! stage reads the previous stage's solids from the builder state and stores
//! its own; a stage whose output already exists is skipped.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::path::Path;

use bearing_export::{gltf, stl, svg, threemf, ModelPart, PackageMetadata, SvgOptions};
use bearing_kernel::{union_all, Kernel, KernelSolidHandle, RenderMesh, Transform};
use tracing::{debug, info};

use crate::config::{BearingConfig, CENTER_WHEEL_CLEARANCE};
use crate::errors::BuildError;
use crate::part::{BuildStage, Part};

/// Chordal tolerance for tessellation, in millimeters.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Half-width of the track annulus around the ball circle.
const TRACK_HALF_WIDTH: f64 = 1.25;
/// Tracks sit this far above the ball plane before carving.
const TRACK_LIFT: f64 = 1.0;
/// Radial wall thickness of the outer wheel.
const OUTER_WHEEL_WALL: f64 = 2.0;
/// Extra height of the wheels over the tracks.
const WHEEL_EXTRA_HEIGHT: f64 = 2.0;
/// How far annulus cutters reach past each cap of the blank.
const CUTTER_OVERHANG: f64 = 1.0;
/// Offset between parts laid out in the 3MF package.
const PACKAGE_SPACING: f64 = 50.0;

/// Parts written by `export_stl`, one file each.
pub const STL_PARTS: [Part; 4] = [
    Part::OuterWheel,
    Part::CenterWheel,
    Part::TopTrack,
    Part::BottomTrack,
];
/// Parts packed by `export_3mf`, in package order.
pub const PACKAGE_PARTS: [Part; 4] = [
    Part::TopTrack,
    Part::BottomTrack,
    Part::CenterWheel,
    Part::OuterWheel,
];

pub const ASSEMBLY_NAME: &str = "bearing";
pub const GLTF_FILE: &str = "bearing.gltf";
pub const SVG_FILE: &str = "bearing.svg";
pub const PACKAGE_FILE: &str = "example.3mf";

const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));
const METADATA_PREFIX: &str = "bearing";
const METADATA_NAMESPACE: &str = "urn:bearing-builder:metadata";

/// Builds the solids of a bearing with a geometry kernel and exports them.
pub struct BearingBuilder<K: Kernel> {
    config: BearingConfig,
    kernel: K,
    tolerance: f64,
    svg_options: SvgOptions,
    parts: HashMap<Part, KernelSolidHandle>,
}

impl<K: Kernel> BearingBuilder<K> {
    pub fn new(config: BearingConfig, kernel: K) -> Self {
        Self {
            config,
            kernel,
            tolerance: DEFAULT_TOLERANCE,
            svg_options: SvgOptions::default(),
            parts: HashMap::new(),
        }
    }

    /// Tessellation tolerance used by every export.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Camera and styling for `export_svg`.
    pub fn with_svg_options(mut self, options: SvgOptions) -> Self {
        self.svg_options = options;
        self
    }

    pub fn config(&self) -> &BearingConfig {
        &self.config
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn into_kernel(self) -> K {
        self.kernel
    }

    /// Handle of a built part.
    pub fn part(&self, part: Part) -> Option<&KernelSolidHandle> {
        self.parts.get(&part)
    }

    /// The last stage whose parts are all present.
    pub fn stage(&self) -> BuildStage {
        let has = |p: Part| self.parts.contains_key(&p);
        if has(Part::CenterWheel) && has(Part::OuterWheel) {
            BuildStage::WheelsBuilt
        } else if has(Part::TopTrack) && has(Part::BottomTrack) {
            BuildStage::TracksBuilt
        } else if has(Part::BallTrackRing) {
            BuildStage::SegmentsBuilt
        } else if has(Part::Balls) {
            BuildStage::BallsBuilt
        } else {
            BuildStage::Empty
        }
    }

    fn require(&self, part: Part) -> Result<KernelSolidHandle, BuildError> {
        self.parts
            .get(&part)
            .cloned()
            .ok_or(BuildError::MissingPart { part })
    }

    fn already_built(&self, part: Part) -> bool {
        let built = self.parts.contains_key(&part);
        if built {
            debug!(%part, "already built, skipping stage");
        }
        built
    }

    /// Run all four stages in order.
    pub fn build(&mut self) -> Result<&mut Self, BuildError> {
        self.build_balls()?
            .build_segments()?
            .build_tracks()?
            .build_wheels()
    }

    /// One sphere per ball on the ball circle, unioned into `balls`.
    pub fn build_balls(&mut self) -> Result<&mut Self, BuildError> {
        if self.already_built(Part::Balls) {
            return Ok(self);
        }
        let n = self.config.ball_count();
        let radius = self.config.circle_radius();
        let ball_radius = self.config.ball_radius();

        let spheres = (0..n)
            .map(|i| {
                let angle = (i as f64 * self.config.sector_degrees()).to_radians();
                let center = [radius * angle.cos(), radius * angle.sin(), 0.0];
                self.kernel.make_sphere(center, ball_radius)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let balls = union_all(&mut self.kernel, &spheres)?;

        self.parts.insert(Part::Balls, balls);
        info!(ball_count = n, ball_radius, circle_radius = radius, "balls built");
        Ok(self)
    }

    /// Torus segments through every other gap between balls, unioned with the
    /// balls into `ball_track_ring`.
    pub fn build_segments(&mut self) -> Result<&mut Self, BuildError> {
        let balls = self.require(Part::Balls)?;
        if self.already_built(Part::BallTrackRing) {
            return Ok(self);
        }
        let n = self.config.ball_count();
        let sector = self.config.sector_degrees();

        let profile = self.kernel.make_disc(
            [0.0, self.config.circle_radius(), 0.0],
            [0.0, 0.0, 1.0],
            self.config.ball_radius(),
        )?;

        // Only odd sectors get a segment: half the gaps are open track, half bridge
        let mut segments = Vec::new();
        for i in (1..n).step_by(2) {
            let arc = self
                .kernel
                .revolve_face(profile, [0.0; 3], [1.0, 0.0, 0.0], sector.to_radians())?;
            let placement = Transform::rotation_y(FRAC_PI_2)
                .then(&Transform::rotation_z((i as f64 * sector).to_radians()));
            segments.push(self.kernel.transform(&arc, &placement)?);
        }
        let segments = union_all(&mut self.kernel, &segments)?;
        let ring = self.kernel.boolean_union(&segments, &balls)?;

        self.parts.insert(Part::BallTrackRing, ring);
        info!(segment_count = n / 2, sector_degrees = sector, "segments built");
        Ok(self)
    }

    /// Annular tracks with the ball channel carved out; the bottom track is
    /// the top track turned over.
    pub fn build_tracks(&mut self) -> Result<&mut Self, BuildError> {
        let ring = self.require(Part::BallTrackRing)?;
        if self.already_built(Part::TopTrack) && self.already_built(Part::BottomTrack) {
            return Ok(self);
        }
        let radius = self.config.circle_radius();
        let thickness = self.config.thickness();

        let annulus = self.annulus(
            radius + TRACK_HALF_WIDTH,
            radius - TRACK_HALF_WIDTH,
            thickness,
        )?;
        let lifted = self
            .kernel
            .transform(&annulus, &Transform::translation(0.0, 0.0, TRACK_LIFT))?;
        let top = self.kernel.boolean_subtract(&lifted, &ring)?;
        let bottom = self.kernel.transform(&top, &flip())?;

        self.parts.insert(Part::TopTrack, top);
        self.parts.insert(Part::BottomTrack, bottom);
        info!(thickness, "tracks built");
        Ok(self)
    }

    /// Center and outer wheels, each with a full ball groove carved out.
    pub fn build_wheels(&mut self) -> Result<&mut Self, BuildError> {
        self.require(Part::TopTrack)?;
        self.require(Part::BottomTrack)?;
        if self.already_built(Part::CenterWheel) && self.already_built(Part::OuterWheel) {
            return Ok(self);
        }
        let radius = self.config.circle_radius();
        let height = self.config.thickness() + WHEEL_EXTRA_HEIGHT;

        let profile = self.kernel.make_disc(
            [0.0, radius, 0.0],
            [0.0, 0.0, 1.0],
            self.config.ball_radius(),
        )?;
        let donut = self
            .kernel
            .revolve_face(profile, [0.0; 3], [1.0, 0.0, 0.0], TAU)?;
        let donut = self
            .kernel
            .transform(&donut, &Transform::rotation_y(FRAC_PI_2))?;

        let center_blank = self
            .kernel
            .make_cylinder(radius - CENTER_WHEEL_CLEARANCE, height)?;
        let center = self.kernel.boolean_subtract(&center_blank, &donut)?;

        let inner = radius + CENTER_WHEEL_CLEARANCE;
        let outer_blank = self.annulus(inner + OUTER_WHEEL_WALL, inner, height)?;
        let outer = self.kernel.boolean_subtract(&outer_blank, &donut)?;

        self.parts.insert(Part::CenterWheel, center);
        self.parts.insert(Part::OuterWheel, outer);
        info!(height, "wheels built");
        Ok(self)
    }

    fn annulus(
        &mut self,
        outer_radius: f64,
        inner_radius: f64,
        height: f64,
    ) -> Result<KernelSolidHandle, BuildError> {
        let outer = self.kernel.make_cylinder(outer_radius, height)?;
        // Cutter caps must not be coplanar with the blank's
        let inner = self
            .kernel
            .make_cylinder(inner_radius, height + 2.0 * CUTTER_OVERHANG)?;
        Ok(self.kernel.boolean_subtract(&outer, &inner)?)
    }

    fn tessellate(&mut self, solid: &KernelSolidHandle) -> Result<RenderMesh, BuildError> {
        Ok(self.kernel.tessellate(solid, self.tolerance)?)
    }

    /// Union of the four finished parts.
    fn assembly(&mut self) -> Result<KernelSolidHandle, BuildError> {
        let handles = STL_PARTS
            .iter()
            .map(|&p| self.require(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(union_all(&mut self.kernel, &handles)?)
    }

    /// One binary STL per finished part, named `<part>.stl`.
    pub fn export_stl(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self, BuildError> {
        let dir = dir.as_ref();
        for part in STL_PARTS {
            let handle = self.require(part)?;
            let mesh = self.tessellate(&handle)?;
            let path = dir.join(format!("{part}.stl"));
            stl::write_binary_stl(&path, &mesh, part.as_str())?;
        }
        Ok(self)
    }

    /// The assembled bearing as one glTF scene.
    pub fn export_gltf(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self, BuildError> {
        let assembly = self.assembly()?;
        let mesh = self.tessellate(&assembly)?;
        gltf::write_gltf(&dir.as_ref().join(GLTF_FILE), &mesh, ASSEMBLY_NAME)?;
        Ok(self)
    }

    /// Orthographic drawing of the assembly with visible and hidden layers.
    pub fn export_svg(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self, BuildError> {
        let assembly = self.assembly()?;
        let mesh = self.tessellate(&assembly)?;
        let edges = self.kernel.extract_edges(&assembly, self.tolerance)?;
        // Edge samples sit up to one chord tolerance off the tessellated surface
        let options = SvgOptions {
            depth_tolerance: self.svg_options.depth_tolerance.max(2.0 * self.tolerance),
            ..self.svg_options.clone()
        };
        svg::write_svg(&dir.as_ref().join(SVG_FILE), &mesh, &edges, &options)?;
        Ok(self)
    }

    /// The four finished parts, spread apart, in one 3MF package with the
    /// generator and configuration embedded as metadata.
    pub fn export_3mf(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self, BuildError> {
        let mut meshes = Vec::with_capacity(PACKAGE_PARTS.len());
        for part in PACKAGE_PARTS {
            let handle = self.require(part)?;
            let placed = match package_placement(part) {
                Some(t) => self.kernel.transform(&handle, &t)?,
                None => handle,
            };
            meshes.push((part, self.tessellate(&placed)?));
        }
        let parts: Vec<ModelPart<'_>> = meshes
            .iter()
            .map(|(part, mesh)| ModelPart::new(part.as_str(), mesh))
            .collect();

        let metadata = PackageMetadata::new()
            .with_namespace(METADATA_PREFIX, METADATA_NAMESPACE)
            .with_entry("Application", GENERATOR)
            .with_json(format!("{METADATA_PREFIX}:config"), &self.config)?;

        threemf::write_3mf(&dir.as_ref().join(PACKAGE_FILE), &parts, &metadata)?;
        Ok(self)
    }
}

/// 180° about Y, then 180° about Z.
fn flip() -> Transform {
    Transform::rotation_y(PI).then(&Transform::rotation_z(PI))
}

/// Where a part sits in the 3MF package; `None` leaves it in place.
pub fn package_placement(part: Part) -> Option<Transform> {
    match part {
        Part::TopTrack => Some(
            Transform::rotation_y(PI).then(&Transform::translation(0.0, PACKAGE_SPACING, 0.0)),
        ),
        Part::BottomTrack => Some(Transform::translation(PACKAGE_SPACING, 0.0, 0.0)),
        Part::OuterWheel => Some(Transform::translation(PACKAGE_SPACING, PACKAGE_SPACING, 0.0)),
        _ => None,
    }
}
