// BgpSim: BGP Network Simulator written in Rust
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Reconciles declarative BGP allow-list intent against a running routing engine.
//!
//! Deployments are declared in a configuration database as `(deployment_id, community) ->
//! (v4 prefixes, v6 prefixes)` tuples. This crate watches that table, and for every change
//! derives the prefix-lists, community-lists and route-map entries needed to let only those
//! prefixes (and their more-specifics) through BGP import policy, pushes the diff to the engine,
//! and triggers a soft inbound reload of affected peers.
//!
//! The reconciler keeps no durable state of its own: the engine's running configuration is
//! authoritative, and every reconciliation re-derives what should be there by reading it back
//! first. See [`reconciler::PolicyReconciler`] for the core apply/retract cycle and
//! [`dispatcher::EventDispatcher`] for how configuration-database events reach it.

pub mod config_view;
pub mod constants;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod model;
pub mod names;
pub mod parser;
pub mod prefix;
pub mod reconciler;
pub mod sequence;

pub use dispatcher::{ConfigDbEvent, EventDispatcher};
pub use engine::{EngineExecutor, InMemoryEngine, VtyshExecutor};
pub use error::ReconcileError;
pub use reconciler::PolicyReconciler;
