// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request handlers, one module per resource.

pub mod health;
pub mod simulations;
pub mod visualizations;
