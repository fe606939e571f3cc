//! Learning Store
//!
//! Per-tool execution history and the scoring profiles derived from it.
//! Each tool has its own lock, so concurrent completions of different tools
//! never contend; completions of the same tool are applied one at a time.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use review_cascade_core::{ExecutionRecord, ScoringProfile};

use crate::config::LearningConfig;
use crate::utils::error::AppResult;

use super::insights::LearningInsights;

/// Current snapshot format.
const SNAPSHOT_VERSION: u32 = 1;

/// Read access to scoring profiles.
pub trait ProfileSource: Send + Sync {
    /// The tool's profile, or the neutral profile if it has no history.
    fn profile(&self, tool_id: &str) -> ScoringProfile;
}

/// Request-level outcome kept for insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutcome {
    pub request_id: String,
    /// Dispatched tools, sorted
    pub tools: Vec<String>,
    pub execution_time_ms: u64,
    pub tool_success_rate: f64,
    pub finding_quality: f64,
    pub category_coverage: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
struct ToolHistory {
    profile: ScoringProfile,
    records: VecDeque<ExecutionRecord>,
}

impl ToolHistory {
    fn new(tool_id: &str) -> Self {
        Self {
            profile: ScoringProfile::neutral(tool_id),
            records: VecDeque::new(),
        }
    }
}

/// Serialized form of the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSnapshot {
    pub version: u32,
    pub profiles: BTreeMap<String, ScoringProfile>,
    pub records: BTreeMap<String, Vec<ExecutionRecord>>,
    #[serde(default)]
    pub requests: Vec<RequestOutcome>,
}

/// In-memory learning store, initialized empty.
pub struct LearningStore {
    smoothing: f64,
    history_limit: usize,
    tools: DashMap<String, Arc<Mutex<ToolHistory>>>,
    requests: Mutex<VecDeque<RequestOutcome>>,
}

impl LearningStore {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            smoothing: config.smoothing,
            history_limit: config.history_limit.max(1),
            tools: DashMap::new(),
            requests: Mutex::new(VecDeque::new()),
        }
    }

    /// Load a store from `path`; a missing file yields an empty store.
    pub fn load(config: &LearningConfig, path: &Path) -> AppResult<Self> {
        let store = Self::new(config);
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let snapshot: LearningSnapshot = serde_json::from_str(&text)?;
            store.restore(snapshot);
            tracing::info!(
                path = %path.display(),
                tools = store.tool_count(),
                "restored learning store"
            );
        }
        Ok(store)
    }

    /// Write the store to `path` as JSON.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "saved learning store");
        Ok(())
    }

    fn slot(&self, tool_id: &str) -> Arc<Mutex<ToolHistory>> {
        self.tools
            .entry(tool_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ToolHistory::new(tool_id))))
            .clone()
    }

    /// Append a record and fold it into the tool's profile.
    ///
    /// Returns the updated profile.
    pub fn record(&self, record: ExecutionRecord) -> ScoringProfile {
        let slot = self.slot(&record.tool_id);
        let mut history = slot.lock().unwrap_or_else(|e| e.into_inner());

        if history.profile.apply(&record, self.smoothing) {
            tracing::debug!(
                tool_id = %record.tool_id,
                state = %record.state,
                executions = history.profile.executions,
                success_rate = history.profile.success_rate,
                "updated scoring profile"
            );
        }

        history.records.push_back(record);
        while history.records.len() > self.history_limit {
            history.records.pop_front();
        }
        history.profile.clone()
    }

    /// Retained records of one tool, oldest first.
    pub fn history(&self, tool_id: &str) -> Vec<ExecutionRecord> {
        match self.tools.get(tool_id) {
            Some(slot) => {
                let history = slot.lock().unwrap_or_else(|e| e.into_inner());
                history.records.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Profiles of every tool with at least one record.
    pub fn profiles(&self) -> BTreeMap<String, ScoringProfile> {
        self.tools
            .iter()
            .map(|entry| {
                let history = entry.value().lock().unwrap_or_else(|e| e.into_inner());
                (entry.key().clone(), history.profile.clone())
            })
            .collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Keep a request-level outcome for insights.
    pub fn record_request(&self, outcome: RequestOutcome) {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.push_back(outcome);
        while requests.len() > self.history_limit {
            requests.pop_front();
        }
    }

    pub fn request_outcomes(&self) -> Vec<RequestOutcome> {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.iter().cloned().collect()
    }

    /// Effectiveness ranking and request-level averages.
    pub fn insights(&self) -> LearningInsights {
        LearningInsights::build(&self.profiles(), &self.request_outcomes())
    }

    pub fn snapshot(&self) -> LearningSnapshot {
        let mut profiles = BTreeMap::new();
        let mut records = BTreeMap::new();
        for entry in self.tools.iter() {
            let history = entry.value().lock().unwrap_or_else(|e| e.into_inner());
            profiles.insert(entry.key().clone(), history.profile.clone());
            records.insert(entry.key().clone(), history.records.iter().cloned().collect());
        }
        LearningSnapshot {
            version: SNAPSHOT_VERSION,
            profiles,
            records,
            requests: self.request_outcomes(),
        }
    }

    /// Replace the store's contents with `snapshot`.
    pub fn restore(&self, snapshot: LearningSnapshot) {
        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                version = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "restoring learning snapshot with a different version"
            );
        }
        self.tools.clear();

        let LearningSnapshot {
            profiles,
            mut records,
            requests,
            ..
        } = snapshot;

        for (tool_id, profile) in profiles {
            let mut kept: VecDeque<ExecutionRecord> =
                records.remove(&tool_id).unwrap_or_default().into();
            while kept.len() > self.history_limit {
                kept.pop_front();
            }
            self.tools.insert(
                tool_id,
                Arc::new(Mutex::new(ToolHistory {
                    profile,
                    records: kept,
                })),
            );
        }
        // Records without a stored profile are replayed.
        for (_, orphaned) in records {
            for record in orphaned {
                self.record(record);
            }
        }

        let mut outcomes = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        *outcomes = requests.into();
        while outcomes.len() > self.history_limit {
            outcomes.pop_front();
        }
    }
}

impl ProfileSource for LearningStore {
    fn profile(&self, tool_id: &str) -> ScoringProfile {
        match self.tools.get(tool_id) {
            Some(slot) => slot
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .profile
                .clone(),
            None => ScoringProfile::neutral(tool_id),
        }
    }
}
