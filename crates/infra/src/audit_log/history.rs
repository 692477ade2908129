use std::collections::VecDeque;

use reqflow_core::RequisitionId;

use super::r#trait::{AuditEntry, AuditLog, AuditLogError};

pub const HISTORY_PAGE_SIZE: usize = 64;

/// Ordered history of one requisition.
///
/// Lazy: nothing is read until iteration starts, and entries are fetched a
/// page at a time. Restartable: every call to `iter()` begins again at the
/// first entry. Finite: iteration ends at the version current when the last
/// page was read.
#[derive(Debug)]
pub struct AuditHistory<'a, L: ?Sized> {
    log: &'a L,
    id: RequisitionId,
    page_size: usize,
}

/// History of `id` in `log`, oldest entry first.
pub fn history<L>(log: &L, id: RequisitionId) -> AuditHistory<'_, L>
where
    L: AuditLog + ?Sized,
{
    AuditHistory {
        log,
        id,
        page_size: HISTORY_PAGE_SIZE,
    }
}

impl<'a, L> AuditHistory<'a, L>
where
    L: AuditLog + ?Sized,
{
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn iter(&self) -> HistoryIter<'a, L> {
        HistoryIter {
            log: self.log,
            id: self.id,
            page_size: self.page_size,
            after: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Drain the whole history, stopping at the first storage error.
    pub fn to_vec(&self) -> Result<Vec<AuditEntry>, AuditLogError> {
        self.iter().collect()
    }
}

impl<'a, L> IntoIterator for &AuditHistory<'a, L>
where
    L: AuditLog + ?Sized,
{
    type Item = Result<AuditEntry, AuditLogError>;
    type IntoIter = HistoryIter<'a, L>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct HistoryIter<'a, L: ?Sized> {
    log: &'a L,
    id: RequisitionId,
    page_size: usize,
    after: u64,
    buffer: VecDeque<AuditEntry>,
    exhausted: bool,
}

impl<L> Iterator for HistoryIter<'_, L>
where
    L: AuditLog + ?Sized,
{
    type Item = Result<AuditEntry, AuditLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.buffer.pop_front() {
            return Some(Ok(entry));
        }
        if self.exhausted {
            return None;
        }

        match self.log.read_page(self.id, self.after, self.page_size) {
            Ok(page) => {
                if page.len() < self.page_size {
                    self.exhausted = true;
                }
                if let Some(last) = page.last() {
                    self.after = last.sequence_number();
                }
                self.buffer.extend(page);
                self.buffer.pop_front().map(Ok)
            }
            Err(err) => {
                self.exhausted = true;
                Some(Err(err))
            }
        }
    }
}
