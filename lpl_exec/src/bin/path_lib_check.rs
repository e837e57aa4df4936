//! # Path Library Check
//!
//! Loads the path library named in `path_lib.toml` and logs its statistics, so that a library can
//! be checked against its dimensions without running the planner. Can also write a synthetic fan
//! library for testing without a real dataset.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::PathBuf;

use color_eyre::{eyre::WrapErr, Result};
use log::info;
use structopt::StructOpt;

use lpl_lib::path_lib::{PathLibParams, PathLibrary};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "path_lib_check", about = "Load a path library and report its statistics")]
struct Opt {
    /// Write a synthetic fan library with the configured dimensions into this folder, then load
    /// it back
    #[structopt(long, parse(from_os_str))]
    generate: Option<PathBuf>,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("path_lib_check", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &[], &session).wrap_err("Failed to initialise logging")?;

    info!("Path Library Check\n");

    // ---- LOAD PARAMETERS ----

    let mut params: PathLibParams =
        util::params::load("path_lib.toml").wrap_err("Could not load path_lib params")?;

    if let Some(folder) = opt.generate {
        info!("Generating a synthetic library in {:?}", folder);

        std::fs::create_dir_all(&folder).wrap_err("Could not create the library folder")?;
        PathLibrary::generate_fan(params.dims.clone())
            .wrap_err("Could not generate the library")?
            .write(&folder)
            .wrap_err("Could not write the library")?;

        params.path_folder = folder.to_string_lossy().into_owned();
    }

    // ---- LOAD LIBRARY ----

    let lib = PathLibrary::load(&params).wrap_err("Failed to load the path library")?;

    // ---- STATISTICS ----

    let dims = lib.dims();
    info!("Dimensions: {:#?}", dims);

    let group_sizes = lib.group_sizes();
    let min_group = group_sizes.iter().min().copied().unwrap_or(0);
    let max_group = group_sizes.iter().max().copied().unwrap_or(0);
    info!(
        "{} groups of between {} and {} paths",
        lib.group_num(),
        min_group,
        max_group
    );

    let start_lens: Vec<usize> = (0..lib.group_num()).map(|g| lib.start_path(g).len()).collect();
    info!(
        "Start paths have between {} and {} points",
        start_lens.iter().min().copied().unwrap_or(0),
        start_lens.iter().max().copied().unwrap_or(0)
    );

    let (min_yaw, max_yaw) = lib.metrics().iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), m| (lo.min(m.end_yaw_deg), hi.max(m.end_yaw_deg))
    );
    let (min_pitch, max_pitch) = lib.metrics().iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), m| (lo.min(m.end_pitch_deg), hi.max(m.end_pitch_deg))
    );
    info!("End yaw spans {:.1} to {:.1} deg", min_yaw, max_yaw);
    info!("End pitch spans {:.1} to {:.1} deg", min_pitch, max_pitch);

    let grid = lib.grid();
    info!(
        "Correspondence grid: {} of {} voxels occupied, {} entries ({:.1} per occupied voxel)",
        grid.num_occupied(),
        dims.grid_voxel_count(),
        grid.num_entries(),
        grid.num_entries() as f64 / grid.num_occupied().max(1) as f64
    );

    if lib.has_display_paths() {
        let num: usize = (0..lib.path_num()).map(|i| lib.display_path(i).len()).sum();
        info!("{} display path points", num);
    } else {
        info!("Display paths not loaded");
    }

    session.exit();

    Ok(())
}
