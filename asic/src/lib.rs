// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Backends implementing [`aal::DriverOps`].
//!
//! With the `bmv2` feature, [`Handle`] drives the vendor BMv2 PD and SwitchAPI
//! libraries through FFI.  Without it, [`Handle`] is the in-process stub,
//! which needs nothing outside this workspace.

// The stub is always built, so that the daemon's startup logic can be
// exercised against it regardless of which backend the binary ships with.
pub mod stub;

cfg_if::cfg_if! {
    if #[cfg(feature = "bmv2")] {
        pub mod bmv2;
        mod plat {
            pub use super::bmv2::Bmv2Handle as Handle;
            pub use super::bmv2::DriverConfig;
        }
    } else {
        mod plat {
            pub use super::stub::StubHandle as Handle;
            pub use super::stub::DriverConfig;
        }
    }
}

pub use plat::DriverConfig;
pub use plat::Handle;
