// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Declarations for the parts of the BMv2 PD, PD-fixed and SwitchAPI
//! libraries that the daemon calls.

#![allow(nonstandard_style)]
#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_uint};

pub type p4_pd_status_t = c_int;
pub type switch_status_t = c_int;
pub type switch_device_t = c_int;

pub const P4_PD_SUCCESS: p4_pd_status_t = 0;

extern "C" {
    // bm/pdfixed/pd_static.h
    pub fn p4_pd_init() -> p4_pd_status_t;
    pub fn p4_pd_cleanup() -> p4_pd_status_t;

    // bmpd/switch/pd/pd.h, generated for the "dc" program
    pub fn p4_pd_dc_init() -> p4_pd_status_t;
    pub fn p4_pd_dc_assign_device(
        dev_id: c_int,
        notifications_addr: *const c_char,
        rpc_port_num: c_int,
    ) -> p4_pd_status_t;
    pub fn p4_pd_dc_remove_device(dev_id: c_int) -> p4_pd_status_t;

    // switchapi/switch_base_types.h
    pub fn switch_api_init(
        device: switch_device_t,
        max_ports: c_uint,
    ) -> switch_status_t;

    // SwitchAPI thrift server.  It listens on whatever `api_rpc_port` holds
    // when it is started.
    pub fn start_switch_api_rpc_server() -> c_int;
    pub static mut api_rpc_port: c_int;
}
