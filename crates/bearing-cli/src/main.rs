//! Build the default bearing and export every format.
//!
//! Output goes to `$BEARING_OUT_DIR` (default `out`). `$BEARING_KERNEL` picks the
//! geometry kernel: `csg` (default, faceted meshes) or `truck` (exact B-rep).
//! `RUST_LOG` sets the log filter.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use bearing_builder::{BearingBuilder, BearingConfig};
use bearing_kernel::{CsgKernel, Kernel, TruckKernel};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const OUT_DIR_VAR: &str = "BEARING_OUT_DIR";
const DEFAULT_OUT_DIR: &str = "out";
const KERNEL_VAR: &str = "BEARING_KERNEL";

fn out_dir() -> PathBuf {
    std::env::var_os(OUT_DIR_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR))
}

/// Run `step` and log how long it took.
fn timed<T>(label: &str, step: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    let start = Instant::now();
    let value = step()?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "{label} done");
    Ok(value)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dir = out_dir();
    let kernel = std::env::var(KERNEL_VAR).unwrap_or_default();
    match kernel.as_str() {
        "" | "csg" => generate(CsgKernel::new(), &dir),
        "truck" => generate(TruckKernel::new(), &dir),
        other => anyhow::bail!("unknown {KERNEL_VAR} {other:?}, expected csg or truck"),
    }
}

fn generate<K: Kernel>(kernel: K, dir: &Path) -> anyhow::Result<()> {
    let config = BearingConfig::default();
    info!(?config, out_dir = %dir.display(), "generating bearing");

    let mut builder = BearingBuilder::new(config, kernel);
    timed("build", || builder.build().map(|_| ()).context("building bearing"))?;
    timed("stl export", || {
        builder.export_stl(dir).map(|_| ()).context("exporting STL")
    })?;
    timed("gltf export", || {
        builder.export_gltf(dir).map(|_| ()).context("exporting glTF")
    })?;
    timed("svg export", || {
        builder.export_svg(dir).map(|_| ()).context("exporting SVG")
    })?;
    timed("3mf export", || {
        builder.export_3mf(dir).map(|_| ()).context("exporting 3MF")
    })?;

    info!(out_dir = %dir.display(), "bearing written");
    Ok(())
}
