// Copyright 2026 Goldfeed Contributors
// SPDX-License-Identifier: MIT

//! Serving side of goldfeed: JSON REST API, wall-clock refresh scheduler,
//! logging setup and the subcommands behind the `goldfeed` binary.

pub mod commands;
pub mod logging;
pub mod rest;
pub mod scheduler;
