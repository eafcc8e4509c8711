// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use rand::random;
use serde::{Deserialize, Serialize};
use slog::Logger;

use aal::{DriverError, DriverResult};

/// Chaos that happens according to a probability.
#[derive(Default, Debug, Serialize, Deserialize, Copy, Clone, PartialEq)]
#[serde(transparent)]
pub struct Chaos {
    /// A probability between 0.0 and 1.0
    pub value: f64,
}

impl Chaos {
    /// Create a new chaos value.
    pub fn new(value: f64) -> Self {
        let mut c = Self::default();
        c.set(value);
        c
    }

    /// Chaos that always strikes.
    pub fn always() -> Self {
        Self::new(1.0)
    }

    /// Set the chaos value. Panics if value is outside the range [0.0, 1.0].
    pub fn set(&mut self, value: f64) {
        if !Self::in_range(value) {
            panic!("probability out of range");
        }
        self.value = value;
    }

    /// Get the underlying chaos value.
    pub fn get(&self) -> f64 {
        self.value
    }

    pub(crate) fn in_range(value: f64) -> bool {
        (0.0..=1.0).contains(&value)
    }

    /// Return a chaos error according to the underlying probability value.
    pub fn unfurled(&self, log: &Logger, message: &str) -> DriverResult<()> {
        // `random()` is in [0, 1), so a value of 0.0 effectively never fires
        // and 1.0 always does.
        if self.value > 0.0 && self.value >= random() {
            slog::error!(log, "chaos error: {}", message);
            return Err(DriverError::Synthetic(message.into()));
        }
        Ok(())
    }
}

/// Fault probabilities for each stubbed driver operation.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DriverChaos {
    pub pd_init: Chaos,
    pub pd_dc_init: Chaos,
    pub assign_device: Chaos,
    pub switch_api_init: Chaos,
    pub rpc_server_start: Chaos,
}

impl DriverChaos {
    /// Apply the same failure probability to every operation.
    pub fn uniform(v: f64) -> Self {
        Self {
            pd_init: Chaos::new(v),
            pd_dc_init: Chaos::new(v),
            assign_device: Chaos::new(v),
            switch_api_init: Chaos::new(v),
            rpc_server_start: Chaos::new(v),
        }
    }

    /// Ensure every probability is usable, naming the first one that isn't.
    pub fn validate(&self) -> DriverResult<()> {
        let all = [
            ("pd_init", self.pd_init),
            ("pd_dc_init", self.pd_dc_init),
            ("assign_device", self.assign_device),
            ("switch_api_init", self.switch_api_init),
            ("rpc_server_start", self.rpc_server_start),
        ];
        match all.iter().find(|(_, c)| !Chaos::in_range(c.get())) {
            Some((name, c)) => Err(DriverError::InvalidArg(format!(
                "chaos probability for {name} out of range: {}",
                c.get()
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn test_chaos_extremes() {
        let log = logger();
        for _ in 0..100 {
            assert!(Chaos::new(0.0).unfurled(&log, "never").is_ok());
            assert!(matches!(
                Chaos::always().unfurled(&log, "always"),
                Err(DriverError::Synthetic(m)) if m == "always"
            ));
        }
    }

    #[test]
    #[should_panic(expected = "probability out of range")]
    fn test_chaos_out_of_range() {
        let _ = Chaos::new(1.5);
    }

    #[test]
    fn test_validate() {
        assert!(DriverChaos::default().validate().is_ok());
        assert!(DriverChaos::uniform(0.25).validate().is_ok());

        let chaos = DriverChaos {
            switch_api_init: Chaos { value: -0.1 },
            ..Default::default()
        };
        let err = chaos.validate().unwrap_err();
        assert!(err.to_string().contains("switch_api_init"));
    }
}
