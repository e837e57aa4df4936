//! Main local planner executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Load parameters and the path library
//!     - Initialise the planner and the follower
//!     - Main loop:
//!         - Input acquisition, from the network or a replay script
//!         - Input handling, in order of their timestamps:
//!             - Poses run the follower's control cycle
//!             - Clouds are preprocessed into obstacle clouds
//!             - Goals, operator and speed inputs update both sides
//!         - Planning, if a new obstacle cloud arrived
//!         - Output publishing
//!
//! # Modules
//!
//! All algorithm modules (e.g. `path_sel`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::net::NetParams;
use lpl_lib::{
    data_store::DataStore,
    follower::{FollowerParams, PathFollower},
    input_client::InputClient,
    loc::LocParams,
    operator::OperatorParams,
    output_server::OutputServer,
    params::ExecParams,
    path_lib::{PathLibParams, PathLibrary},
    path_sel::PathSelParams,
    per::PerParams,
    planner::{LocalPlanner, PlannerParams},
    traj_ctrl::{TrajCtrlParams, TrajLog},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Report};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use util::{
    host,
    logger::{logger_init, LevelFilter},
    script_interpreter::{PendingInputs, ScriptInterpreter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Modules whose per-cycle output is controlled by the exec's algorithm log level.
const ALGORITHM_TARGETS: [&str; 3] = [
    "lpl_lib::per",
    "lpl_lib::path_sel",
    "lpl_lib::traj_ctrl",
];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "lpl_exec", about = "Reactive local planner and path follower")]
struct Opt {
    /// Replay script to run instead of listening on the network
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the inputs to the exec.
enum InputSource {
    Remote(InputClient),
    Script(ScriptInterpreter),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Exec parameters are needed to set up logging
    let exec_params: ExecParams =
        util::params::load("exec.toml").wrap_err("Could not load exec params")?;

    // Initialise session
    let session = Session::new("lpl_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let algorithm_level = LevelFilter::from_str(&exec_params.algorithm_log_level)
        .map_err(|e| eyre!(
            "Invalid algorithm log level {:?}: {}", exec_params.algorithm_log_level, e
        ))?;
    let target_levels: Vec<(&'static str, LevelFilter)> = ALGORITHM_TARGETS
        .iter()
        .map(|t| (*t, algorithm_level))
        .collect();
    logger_init(LevelFilter::Trace, &target_levels, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Local Planner Executable\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;
    let loc_params: LocParams =
        util::params::load("loc.toml").wrap_err("Could not load loc params")?;
    let per_params: PerParams =
        util::params::load("per.toml").wrap_err("Could not load per params")?;
    let path_lib_params: PathLibParams =
        util::params::load("path_lib.toml").wrap_err("Could not load path_lib params")?;
    let path_sel_params: PathSelParams =
        util::params::load("path_sel.toml").wrap_err("Could not load path_sel params")?;
    let traj_ctrl_params: TrajCtrlParams =
        util::params::load("traj_ctrl.toml").wrap_err("Could not load traj_ctrl params")?;
    let operator_params: OperatorParams =
        util::params::load("operator.toml").wrap_err("Could not load operator params")?;

    // Keep a copy of the parameters this session ran with
    session.save("params/exec.json", exec_params.clone());
    session.save("params/net.json", net_params.clone());
    session.save("params/loc.json", loc_params.clone());
    session.save("params/per.json", per_params.clone());
    session.save("params/path_lib.json", path_lib_params.clone());
    session.save("params/path_sel.json", path_sel_params.clone());
    session.save("params/traj_ctrl.json", traj_ctrl_params.clone());
    session.save("params/operator.json", operator_params.clone());

    info!("Exec parameters loaded");

    // ---- INITIALISE INPUT SOURCE ----

    let script = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} inputs\n",
                si.get_duration(),
                si.get_num_inputs()
            );

            Some(si)
        }
        None => {
            info!("No script provided, inputs will be recieved from the network\n");
            None
        }
    };

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let lib = Arc::new(
        PathLibrary::load(&path_lib_params).wrap_err("Failed to load the path library")?,
    );

    let planner = LocalPlanner::new(
        PlannerParams {
            loc: loc_params.clone(),
            per: per_params,
            path_sel: path_sel_params,
            operator: operator_params.clone(),
        },
        lib,
    )
    .wrap_err("Failed to initialise the LocalPlanner")?;
    info!("LocalPlanner init complete");

    let traj_log = if traj_ctrl_params.save_trajectory {
        Some(
            TrajLog::from_session(&session, traj_ctrl_params.save_traj_interval_m)
                .wrap_err("Failed to create the trajectory log")?,
        )
    } else {
        None
    };

    let follower = PathFollower::new(
        FollowerParams {
            loc: loc_params,
            traj_ctrl: traj_ctrl_params,
            operator: operator_params,
        },
        traj_log,
    )
    .wrap_err("Failed to initialise the PathFollower")?;
    info!("PathFollower init complete");

    let mut ds = DataStore::new(planner, follower, &exec_params);

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let mut input_source = match script {
        Some(si) => InputSource::Script(si),
        None => {
            let c = InputClient::new(&zmq_ctx, &net_params)
                .wrap_err("Failed to initialise the InputClient")?;
            info!("InputClient initialised");
            InputSource::Remote(c)
        }
    };

    let output_server = {
        let s = OutputServer::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise the OutputServer")?;
        info!("OutputServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- INPUT PROCESSING ----

        match input_source {
            InputSource::Remote(ref client) => match client.recieve_all() {
                Ok(inputs) => {
                    for msg in inputs.iter() {
                        ds.handle(msg);
                    }
                }
                Err(e) => warn!("Error recieving inputs: {}", e),
            },

            InputSource::Script(ref mut si) => {
                match si.get_pending(session::get_elapsed_seconds()) {
                    PendingInputs::None => (),
                    PendingInputs::Some(inputs) => {
                        for msg in inputs.iter() {
                            ds.handle(msg);
                        }
                    }
                    // Exit if end of script reached
                    PendingInputs::EndOfScript => {
                        info!("End of input script reached, stopping");
                        break;
                    }
                }
            }
        }

        // ---- PLANNING ----

        ds.plan_tick();

        // ---- OUTPUTS ----

        for msg in ds.take_outputs() {
            if let Err(e) = output_server.send(&msg) {
                warn!("OutputServer error: {}", e);
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    debug!("{} cycles, {} plans", ds.num_cycles, ds.num_plans);
    info!("End of execution");

    session.exit();

    Ok(())
}
