// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use model_gateway::ModelGateway;
use std::sync::Arc;
use tabula::{ColumnProfile, Table};
use uuid::Uuid;

/// Shared handler state. Dataset state is scoped per browser session, so
/// concurrent sessions cannot clobber each other's current dataset; within
/// one session a new upload replaces the previous one.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<DashMap<Uuid, DatasetState>>,
    pub gateway: Arc<dyn ModelGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            gateway,
        }
    }

    pub fn dataset(&self, session: Uuid) -> DatasetState {
        self.sessions
            .get(&session)
            .map(|entry| entry.value().clone())
            .unwrap_or(DatasetState::Empty)
    }

    pub fn store_dataset(&self, session: Uuid, dataset: LoadedDataset) {
        self.sessions
            .insert(session, DatasetState::Loaded(Arc::new(dataset)));
    }
}

/// Tagged dataset state: nothing uploaded yet, or one loaded table with its
/// cached serialization and profiles. Nothing here survives a restart.
#[derive(Clone)]
pub enum DatasetState {
    Empty,
    Loaded(Arc<LoadedDataset>),
}

pub struct LoadedDataset {
    pub table: Table,
    pub serialization: String,
    pub profiles: Vec<ColumnProfile>,
    pub source_name: String,
    pub uploaded_at: DateTime<Utc>,
}
