// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Main application entry point for `drivers`, which brings up SwitchAPI on
//! top of a running BMv2 device model and serves it over RPC until told to
//! stop.

use futures::stream::StreamExt;
use libc::c_int;
use signal_hook::consts::SIGHUP;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGQUIT;
use signal_hook::consts::SIGTERM;
use signal_hook_tokio::Signals;
use slog::info;
use structopt::clap::AppSettings;
use structopt::StructOpt;

use crate::types::{DriversError, DriversResult};

mod config;
mod startup;
mod types;

#[derive(Debug, Default, StructOpt)]
#[structopt(
    name = "drivers",
    about = "SwitchAPI driver for a BMv2 software switch",
    setting = AppSettings::AllowNegativeNumbers
)]
pub(crate) struct Opt {
    #[structopt(
        name = "switchapi-rpc-port",
        help = "port on which to serve the SwitchAPI RPC interface"
    )]
    switchapi_rpc_port: String,

    #[structopt(
        name = "bmv2-thrift-port",
        help = "thrift port of the running BMv2 device model"
    )]
    bmv2_thrift_port: String,

    #[structopt(
        name = "bmv2-ipc-address",
        help = "address on which BMv2 publishes notifications"
    )]
    bmv2_ipc_address: String,

    #[structopt(
        long,
        about = "send log data to the named file rather than stdout"
    )]
    log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        about = "log format",
        help = "format logs for 'human' or 'json' consumption"
    )]
    log_format: Option<common::logging::LogFormat>,

    #[structopt(
        long,
        help = "resource count passed to SwitchAPI at initialization [default: 256]"
    )]
    max_ports: Option<u32>,

    #[cfg(all(feature = "stub-config", not(feature = "bmv2")))]
    #[structopt(long, help = "TOML file with settings for the stub driver")]
    stub_config: Option<String>,
}

// These are the signals which end the daemon.  They are registered before
// startup begins, so one arriving mid-startup is queued rather than killing
// the process outright.
const SIGNALS: &[c_int] = &[SIGTERM, SIGQUIT, SIGINT, SIGHUP];

async fn wait_for_signal(log: &slog::Logger, mut signals: Signals) {
    let log = log.new(slog::o!("unit" => "signal_handler"));
    let handle = signals.handle();
    if let Some(signal) = signals.next().await {
        info!(log, "received signal"; "sig" => signal);
    }
    handle.close();
}

async fn run_drivers(opt: Opt) -> DriversResult<()> {
    let config = config::build_config(&opt)?;

    let log =
        common::logging::init("drivers", &config.log_file, config.log_format)
            .map_err(|e| DriversError::Config(format!("{e:#}")))?;
    info!(log, "drivers config: {config:#?}");

    let signals = Signals::new(SIGNALS).map_err(DriversError::Signal)?;

    let hdl = asic::Handle::new(&log, &config.driver_config)
        .map_err(DriversError::Driver)?;
    startup::start(&log, &hdl, &startup::StartupParams::from(&config))?;

    info!(log, "driver stack is up, waiting for a signal to exit");
    wait_for_signal(&log, signals).await;

    startup::shutdown(&log, &hdl);
    info!(log, "shutting down switch driver");
    hdl.fini();

    info!(log, "done");
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    // Anything other than the three positionals and the known options,
    // including a request for help or the version, is a usage error.
    let opt = match Opt::from_iter_safe(std::env::args_os()) {
        Ok(opt) => opt,
        Err(_) => {
            println!("{}", DriversError::Usage);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_drivers(opt).await {
        println!("{e}");
        std::process::exit(1);
    }
}
