// ============================================================================
// Store State
// ============================================================================
//
// Each asynchronous store operation runs through the same small state
// machine:
//
//   Idle ──begin──> Loading ──succeed──> Succeeded
//                      │
//                      └──fail──> Failed ──reset──> Idle
//
// `begin` is accepted from any state; starting over from Failed is a retry.
//
// ============================================================================

use super::query::PageRequest;
use crate::core::Entity;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

impl OperationStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, OperationStatus::Loading)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Succeeded | OperationStatus::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Idle => write!(f, "idle"),
            OperationStatus::Loading => write!(f, "loading"),
            OperationStatus::Succeeded => write!(f, "succeeded"),
            OperationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status plus last failure message of one operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationState {
    pub status: OperationStatus,
    pub error: Option<String>,
}

impl OperationState {
    pub fn begin(&mut self) {
        self.status = OperationStatus::Loading;
        self.error = None;
    }

    pub fn succeed(&mut self) {
        self.status = OperationStatus::Succeeded;
        self.error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = OperationStatus::Failed;
        self.error = Some(message.into());
    }

    /// Explicit return to Idle; only meaningful after a failure.
    pub fn reset(&mut self) {
        if self.status == OperationStatus::Failed {
            self.status = OperationStatus::Idle;
            self.error = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Fetch,
    Create,
    Update,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOp::Fetch => write!(f, "fetch"),
            StoreOp::Create => write!(f, "create"),
            StoreOp::Update => write!(f, "update"),
            StoreOp::Delete => write!(f, "delete"),
        }
    }
}

/// Independent state of the four store operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationTracker {
    pub fetch: OperationState,
    pub create: OperationState,
    pub update: OperationState,
    pub delete: OperationState,
}

impl OperationTracker {
    pub fn get(&self, op: StoreOp) -> &OperationState {
        match op {
            StoreOp::Fetch => &self.fetch,
            StoreOp::Create => &self.create,
            StoreOp::Update => &self.update,
            StoreOp::Delete => &self.delete,
        }
    }

    pub fn get_mut(&mut self, op: StoreOp) -> &mut OperationState {
        match op {
            StoreOp::Fetch => &mut self.fetch,
            StoreOp::Create => &mut self.create,
            StoreOp::Update => &mut self.update,
            StoreOp::Delete => &mut self.delete,
        }
    }

    pub fn reset_failed(&mut self) {
        for op in [StoreOp::Fetch, StoreOp::Create, StoreOp::Update, StoreOp::Delete] {
            self.get_mut(op).reset();
        }
    }
}

/// The page of one category currently held by the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub items: Vec<Entity>,
    pub total_items: usize,
    /// 1-based
    pub current_page: u32,
    pub page_size: u32,
    pub filter_type: Option<String>,
    pub search_query: String,
    /// Status of the most recent fetch
    pub status: OperationStatus,
    /// Most recent failure of any operation
    pub error: Option<String>,
}

impl PageState {
    pub fn new(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            total_items: 0,
            current_page: 1,
            page_size,
            filter_type: None,
            search_query: String::new(),
            status: OperationStatus::Idle,
            error: None,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.total_items == 0 || self.page_size == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.page_size as usize) as u32
    }

    /// A short page means the server has nothing beyond it.
    pub fn has_next_page(&self) -> bool {
        self.items.len() >= self.page_size as usize
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page > 1
    }
}

/// Sequence-tagged fetch issued by the store
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub(crate) seq: u64,
    pub request: PageRequest,
}

impl FetchTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What happened to a resolved fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer fetch was requested after this one; its reply was dropped.
    Superseded,
}
