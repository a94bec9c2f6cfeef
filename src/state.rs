// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::workflow::TransactionWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub workflow: TransactionWorkflow,
}

impl AppState {
    pub fn new(workflow: TransactionWorkflow) -> Self {
        Self { workflow }
    }
}
