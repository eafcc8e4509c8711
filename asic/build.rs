// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::env;

use anyhow::{Context, Result};

// The PD, PD-fixed and SwitchAPI libraries produced by the BMv2 and switch
// builds, in link order.
const DEFAULT_LIBS: &[&str] = &[
    "switchapi",
    "pd",
    "pdthrift",
    "bmpdfixed",
    "bmpdfixedthrift",
    "thrift",
];

fn bmv2_prep() -> Result<()> {
    println!("cargo:rerun-if-env-changed=BMV2_INSTALL");
    println!("cargo:rerun-if-env-changed=SWITCH_INSTALL");
    println!("cargo:rerun-if-env-changed=BMV2_LINK_LIBS");

    let bmv2_dir = env::var("BMV2_INSTALL")
        .with_context(|| "failed to get BMV2_INSTALL env var")?;
    let switch_dir =
        env::var("SWITCH_INSTALL").unwrap_or_else(|_| bmv2_dir.clone());

    for dir in [&bmv2_dir, &switch_dir] {
        println!("cargo:rustc-link-arg=-Wl,-rpath,{dir}/lib");
        println!("cargo:rustc-link-search={dir}/lib");
        println!("cargo:rustc-link-search={dir}/lib/bmpd/switch");
    }

    let libs: Vec<String> = match env::var("BMV2_LINK_LIBS") {
        Ok(list) => list
            .split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        Err(_) => DEFAULT_LIBS.iter().map(|l| l.to_string()).collect(),
    };
    for lib in libs {
        println!("cargo:rustc-link-lib={lib}");
    }
    println!("cargo:rustc-link-lib=stdc++");

    Ok(())
}

fn main() -> Result<()> {
    if env::var("CARGO_FEATURE_BMV2").is_ok() {
        bmv2_prep()
    } else {
        Ok(())
    }
}
