use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use reqflow_core::{DepartmentCode, ErrorKind, RequisitionId, UserId};
use reqflow_requisitions::{Priority, RequisitionEvent, RequisitionStatus};

use crate::audit_log::{AuditEntry, AuditLog, AuditLogError, history};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;
pub const DEFAULT_ACTIVITY_LIMIT: usize = 20;
pub const MAX_ACTIVITY_LIMIT: usize = 100;
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 500;

/// One Kanban card: the current state of a requisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequisitionSummary {
    pub id: RequisitionId,
    pub department: DepartmentCode,
    pub requester: UserId,
    pub priority: Priority,
    pub status: RequisitionStatus,
    pub item_count: usize,
    pub total_quantity: u64,
    pub shortage: bool,
    pub vendor: Option<String>,
    pub comment_count: usize,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardStats {
    pub total: usize,
    pub pending: usize,
    pub shortage: usize,
    pub by_status: BTreeMap<RequisitionStatus, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentLoad {
    pub department: DepartmentCode,
    pub total: usize,
    pub pending: usize,
    pub by_priority: BTreeMap<Priority, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCount {
    pub department: DepartmentCode,
    pub pending: usize,
}

/// An urgent requisition waiting on approval longer than the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Escalation {
    pub requisition: RequisitionSummary,
    pub waiting_secs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    pub department: Option<DepartmentCode>,
    pub status: Option<RequisitionStatus>,
    pub priority: Option<Priority>,
}

/// Whether a row of `department` is visible to a caller limited to `scope`.
fn in_scope(scope: Option<&DepartmentCode>, department: &DepartmentCode) -> bool {
    scope.is_none_or(|d| d == department)
}

impl BoardFilter {
    fn matches(&self, row: &RequisitionSummary) -> bool {
        self.department.as_ref().is_none_or(|d| *d == row.department)
            && self.status.is_none_or(|s| s == row.status)
            && self.priority.is_none_or(|p| p == row.priority)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<usize>, per_page: Option<usize>) -> Result<Self, BoardError> {
        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
        if page == 0 {
            return Err(BoardError::InvalidQuery("page starts at 1".into()));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(BoardError::InvalidQuery(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(Self { page, per_page })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("non-monotonic sequence for {id} (last={last}, found={found})")]
    NonMonotonicSequence {
        id: RequisitionId,
        last: u64,
        found: u64,
    },

    #[error("no summary row for {0}; stream does not start with a creation")]
    MissingRow(RequisitionId),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Log(#[from] AuditLogError),

    #[error("board state lock poisoned")]
    Poisoned,
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::InvalidQuery(_) => ErrorKind::ValidationFailed,
            BoardError::Log(e) => e.kind(),
            _ => ErrorKind::StorageUnavailable,
        }
    }
}

type ActivityKey = (DateTime<Utc>, RequisitionId, u64);

#[derive(Debug, Default)]
struct BoardState {
    rows: BTreeMap<RequisitionId, RequisitionSummary>,
    cursors: HashMap<RequisitionId, u64>,
    activity: BTreeMap<ActivityKey, AuditEntry>,
}

/// Read-optimized views over the audit stream: Kanban rows, stats tiles,
/// department chart, activity feed, escalations.
///
/// - One row per requisition, replaced under a single write lock, so a
///   requisition is never visible in two status buckets.
/// - Idempotent per requisition via a sequence cursor; duplicates are
///   ignored and gaps are rejected (`sync_stream` fills them from the log).
/// - Disposable: `rebuild_from` reconstructs everything from entries.
#[derive(Debug)]
pub struct RequisitionBoard {
    state: RwLock<BoardState>,
    activity_capacity: usize,
}

impl Default for RequisitionBoard {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl RequisitionBoard {
    /// `activity_capacity` bounds the feed; older entries fall off.
    pub fn new(activity_capacity: usize) -> Self {
        Self {
            state: RwLock::new(BoardState::default()),
            activity_capacity: activity_capacity.max(1),
        }
    }

    /// Apply one published entry.
    pub fn apply_envelope(&self, entry: &AuditEntry) -> Result<(), BoardError> {
        let mut state = self.state.write().map_err(|_| BoardError::Poisoned)?;
        apply(&mut state, entry, self.activity_capacity)
    }

    /// Apply an entry, reading any skipped ones from the log first.
    pub fn apply_or_catch_up(&self, entry: &AuditEntry, log: &dyn AuditLog) -> Result<(), BoardError> {
        match self.apply_envelope(entry) {
            Err(BoardError::NonMonotonicSequence { id, .. }) => self.sync_stream(log, id),
            other => other,
        }
    }

    /// Bring one requisition up to date with the log.
    pub fn sync_stream(&self, log: &dyn AuditLog, id: RequisitionId) -> Result<(), BoardError> {
        let after = self.cursor(id)?;
        let pending = log.read_page(id, after, usize::MAX)?;
        let mut state = self.state.write().map_err(|_| BoardError::Poisoned)?;
        for entry in &pending {
            apply(&mut state, entry, self.activity_capacity)?;
        }
        Ok(())
    }

    /// Discard everything and replay `entries`.
    pub fn rebuild_from(&self, entries: impl IntoIterator<Item = AuditEntry>) -> Result<(), BoardError> {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by_key(|e| (e.stream_id(), e.sequence_number()));

        let mut fresh = BoardState::default();
        for entry in &entries {
            apply(&mut fresh, entry, self.activity_capacity)?;
        }

        let mut state = self.state.write().map_err(|_| BoardError::Poisoned)?;
        *state = fresh;
        Ok(())
    }

    /// Rebuild from every stream in the log.
    pub fn rebuild_from_log(&self, log: &dyn AuditLog) -> Result<(), BoardError> {
        let mut entries = Vec::new();
        for id in log.stream_ids()? {
            entries.extend(history(log, id).to_vec()?);
        }
        self.rebuild_from(entries)
    }

    pub fn get(&self, id: RequisitionId) -> Result<Option<RequisitionSummary>, BoardError> {
        Ok(self.read()?.rows.get(&id).cloned())
    }

    /// Filtered page, newest first.
    pub fn list(&self, filter: &BoardFilter, page: PageRequest) -> Result<Page<RequisitionSummary>, BoardError> {
        let state = self.read()?;
        let mut matching: Vec<&RequisitionSummary> =
            state.rows.values().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip((page.page - 1).saturating_mul(page.per_page))
            .take(page.per_page)
            .cloned()
            .collect();

        Ok(Page {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
        })
    }

    /// Tiles over every row, or the rows of `scope` only.
    pub fn stats(&self, scope: Option<&DepartmentCode>) -> Result<BoardStats, BoardError> {
        let state = self.read()?;
        let mut by_status: BTreeMap<_, _> = RequisitionStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_priority: BTreeMap<_, _> = Priority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut pending = 0;
        let mut shortage = 0;
        let mut total = 0;

        for row in state.rows.values().filter(|r| in_scope(scope, &r.department)) {
            total += 1;
            *by_status.entry(row.status).or_default() += 1;
            *by_priority.entry(row.priority).or_default() += 1;
            pending += usize::from(row.status.is_pending());
            shortage += usize::from(row.shortage);
        }

        Ok(BoardStats {
            total,
            pending,
            shortage,
            by_status,
            by_priority,
        })
    }

    pub fn by_department(&self, scope: Option<&DepartmentCode>) -> Result<Vec<DepartmentLoad>, BoardError> {
        let state = self.read()?;
        let mut loads: BTreeMap<DepartmentCode, DepartmentLoad> = BTreeMap::new();

        for row in state.rows.values().filter(|r| in_scope(scope, &r.department)) {
            let load = loads
                .entry(row.department.clone())
                .or_insert_with(|| DepartmentLoad {
                    department: row.department.clone(),
                    total: 0,
                    pending: 0,
                    by_priority: Priority::ALL.iter().map(|p| (*p, 0)).collect(),
                });
            load.total += 1;
            load.pending += usize::from(row.status.is_pending());
            *load.by_priority.entry(row.priority).or_default() += 1;
        }

        Ok(loads.into_values().collect())
    }

    /// Departments with requisitions awaiting approval, busiest first.
    pub fn pending_by_department(&self, scope: Option<&DepartmentCode>) -> Result<Vec<PendingCount>, BoardError> {
        let mut counts: Vec<PendingCount> = self
            .by_department(scope)?
            .into_iter()
            .filter(|d| d.pending > 0)
            .map(|d| PendingCount {
                department: d.department,
                pending: d.pending,
            })
            .collect();
        counts.sort_by(|a, b| b.pending.cmp(&a.pending).then(a.department.cmp(&b.department)));
        Ok(counts)
    }

    /// Most recent entries across all requisitions, newest first.
    pub fn recent_activity(
        &self,
        limit: Option<usize>,
        scope: Option<&DepartmentCode>,
    ) -> Result<Vec<AuditEntry>, BoardError> {
        let limit = limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
        if !(1..=MAX_ACTIVITY_LIMIT).contains(&limit) {
            return Err(BoardError::InvalidQuery(format!(
                "limit must be between 1 and {MAX_ACTIVITY_LIMIT}"
            )));
        }
        let state = self.read()?;
        Ok(state
            .activity
            .values()
            .rev()
            .filter(|e| {
                state
                    .rows
                    .get(&e.stream_id())
                    .is_some_and(|r| in_scope(scope, &r.department))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    /// High/Critical requisitions still waiting on approval after `threshold`.
    pub fn escalations(
        &self,
        now: DateTime<Utc>,
        threshold: chrono::Duration,
        scope: Option<&DepartmentCode>,
    ) -> Result<Vec<Escalation>, BoardError> {
        let state = self.read()?;
        let mut overdue: Vec<Escalation> = state
            .rows
            .values()
            .filter(|r| in_scope(scope, &r.department))
            .filter(|r| r.priority.is_urgent() && r.status.is_pending())
            .filter_map(|r| {
                let waiting = now - r.submitted_at.unwrap_or(r.created_at);
                (waiting >= threshold).then(|| Escalation {
                    requisition: r.clone(),
                    waiting_secs: waiting.num_seconds(),
                })
            })
            .collect();
        overdue.sort_by(|a, b| {
            b.requisition
                .priority
                .cmp(&a.requisition.priority)
                .then(b.waiting_secs.cmp(&a.waiting_secs))
        });
        Ok(overdue)
    }

    fn cursor(&self, id: RequisitionId) -> Result<u64, BoardError> {
        Ok(self.read()?.cursors.get(&id).copied().unwrap_or(0))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BoardState>, BoardError> {
        self.state.read().map_err(|_| BoardError::Poisoned)
    }
}

fn apply(state: &mut BoardState, entry: &AuditEntry, capacity: usize) -> Result<(), BoardError> {
    let id = entry.stream_id();
    let seq = entry.sequence_number();
    let last = state.cursors.get(&id).copied().unwrap_or(0);

    if seq != 0 && seq <= last {
        // Duplicate delivery.
        return Ok(());
    }
    if seq != last + 1 {
        return Err(BoardError::NonMonotonicSequence {
            id,
            last,
            found: seq,
        });
    }

    let record = entry.payload();
    let at = record.occurred_at;

    if let RequisitionEvent::Created {
        requester,
        department,
        items,
        priority,
    } = &record.action
    {
        state.rows.insert(
            id,
            RequisitionSummary {
                id,
                department: department.clone(),
                requester: *requester,
                priority: *priority,
                status: record.to_status,
                item_count: items.len(),
                total_quantity: items.iter().map(|i| i.quantity).sum(),
                shortage: false,
                vendor: None,
                comment_count: 0,
                created_at: at,
                submitted_at: None,
                updated_at: at,
                version: seq,
            },
        );
    } else {
        let row = state.rows.get_mut(&id).ok_or(BoardError::MissingRow(id))?;
        row.status = record.to_status;
        row.updated_at = at;
        row.version = seq;

        match &record.action {
            RequisitionEvent::Submitted => row.submitted_at = Some(at),
            RequisitionEvent::ShortageFlagged { .. } => row.shortage = true,
            RequisitionEvent::StockReserved { .. }
            | RequisitionEvent::VendorFulfillmentConfirmed { .. } => row.shortage = false,
            RequisitionEvent::VendorOrderPlaced { vendor } => row.vendor = Some(vendor.clone()),
            RequisitionEvent::PriorityChanged { to, .. } => row.priority = *to,
            RequisitionEvent::CommentAdded { .. } => row.comment_count += 1,
            _ => {}
        }
    }

    state.cursors.insert(id, seq);
    state.activity.insert((at, id, seq), entry.clone());
    while state.activity.len() > capacity {
        state.activity.pop_first();
    }
    Ok(())
}
