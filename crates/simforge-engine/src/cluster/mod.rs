// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster module - execution unit backends.
//!
//! [`KubeCluster`] talks to a real Kubernetes API server; [`MockCluster`]
//! replays scripted observations for tests.

pub mod kube;
pub mod mock;
mod traits;

pub use kube::KubeCluster;
pub use mock::{MockCluster, MockFailure};
pub use traits::*;
