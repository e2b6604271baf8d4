// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tunable constants with a canonical default, mirroring the small
//! `common_defs`-style module every deployment of this system carries.

/// Minimum volume, in milliliters, for a completed flow to be posted as a
/// drink. Smaller pours are treated as noise (a bump of the tap, a stray
/// tick) and silently dropped.
pub const MIN_VOLUME_TO_RECORD_ML: f64 = 10.0;

/// Default `max_delta` for a [`crate::FlowMeter`] created without an
/// explicit override.
pub const DEFAULT_MAX_METER_DELTA: u64 = 4400;

/// Valid thermometer range, in degrees Celsius. Readings outside this range
/// are rejected before they ever reach the backend.
pub const THERMO_SENSOR_RANGE: (f64, f64) = (-20.0, 80.0);

/// How often a sensor may be recorded: at most once per this many seconds.
pub const THERMO_RECORD_INTERVAL_SECS: u64 = 60;

/// How long a sensor may go unseen before it is considered stale and
/// forgotten by the rate limiter.
pub const THERMO_MAX_AGE_SECS: u64 = 120;

/// The meter-name alias meaning "every registered tap".
pub const ALIAS_ALL_TAPS: &str = "__all_taps__";

/// Default idle timeout, in seconds, for a flow with no more specific
/// device policy.
pub const DEFAULT_MAX_IDLE_SECS: u64 = 10;

/// Auth device name for the core one-wire reader.
pub const AUTH_DEVICE_ONEWIRE: &str = "core.onewire";

/// Auth device name for the core RFID reader.
pub const AUTH_DEVICE_RFID: &str = "core.rfid";

/// Historical alias for [`AUTH_DEVICE_RFID`], contributed by a third-party
/// module that addressed the same reader hardware under a different name.
pub const AUTH_DEVICE_CONTRIB_PHIDGET_RFID: &str = AUTH_DEVICE_RFID;
