use std::collections::HashMap;
use std::sync::Mutex;

use reqflow_core::RequisitionId;
use reqflow_requisitions::ActorRef;

use super::{TransitionOutcome, WorkflowError};

/// What an idempotency key was first used for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// `None` for creations, which have no id until they succeed.
    pub requisition: Option<RequisitionId>,
    pub actor: ActorRef,
    pub action: &'static str,
}

/// Remembers accepted outcomes by caller-supplied key.
///
/// Only successes are recorded: a request that failed (including with
/// `StorageUnavailable`) can be retried with the same key.
#[derive(Debug, Default)]
pub struct IdempotencyStore {
    entries: Mutex<HashMap<String, (Fingerprint, TransitionOutcome)>>,
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prior outcome for `key`, or `None` if the key is unused.
    pub fn lookup(
        &self,
        key: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<TransitionOutcome>, WorkflowError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| WorkflowError::Unavailable("idempotency store lock poisoned".into()))?;

        match entries.get(key) {
            None => Ok(None),
            Some((seen, outcome)) if matches_fingerprint(seen, fingerprint) => Ok(Some(*outcome)),
            Some(_) => Err(WorkflowError::IdempotencyMismatch(key.to_string())),
        }
    }

    pub fn remember(
        &self,
        key: String,
        fingerprint: Fingerprint,
        outcome: TransitionOutcome,
    ) -> Result<(), WorkflowError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| WorkflowError::Unavailable("idempotency store lock poisoned".into()))?;
        entries.entry(key).or_insert((fingerprint, outcome));
        Ok(())
    }
}

/// A creation replay does not know the id yet; match it on actor and action.
fn matches_fingerprint(seen: &Fingerprint, incoming: &Fingerprint) -> bool {
    seen.actor == incoming.actor
        && seen.action == incoming.action
        && (incoming.requisition.is_none() || seen.requisition == incoming.requisition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_core::{DepartmentCode, UserId};
    use reqflow_requisitions::RequisitionStatus;

    fn fp(n: u64, actor: &ActorRef, action: &'static str) -> Fingerprint {
        Fingerprint {
            requisition: Some(RequisitionId::from_sequence(n).unwrap()),
            actor: actor.clone(),
            action,
        }
    }

    fn outcome(n: u64) -> TransitionOutcome {
        TransitionOutcome {
            id: RequisitionId::from_sequence(n).unwrap(),
            status: RequisitionStatus::Approved,
            version: 4,
        }
    }

    #[test]
    fn replay_returns_the_first_outcome() {
        let store = IdempotencyStore::new();
        let actor = ActorRef::user(UserId::new(), DepartmentCode::new("ICU").unwrap());

        assert_eq!(store.lookup("k1", &fp(1, &actor, "approve")).unwrap(), None);
        store
            .remember("k1".into(), fp(1, &actor, "approve"), outcome(1))
            .unwrap();
        assert_eq!(
            store.lookup("k1", &fp(1, &actor, "approve")).unwrap(),
            Some(outcome(1))
        );
    }

    #[test]
    fn reuse_for_another_request_conflicts() {
        let store = IdempotencyStore::new();
        let actor = ActorRef::user(UserId::new(), DepartmentCode::new("ICU").unwrap());
        let other = ActorRef::user(UserId::new(), DepartmentCode::new("ICU").unwrap());
        store
            .remember("k1".into(), fp(1, &actor, "approve"), outcome(1))
            .unwrap();

        for mismatch in [
            fp(2, &actor, "approve"),
            fp(1, &other, "approve"),
            fp(1, &actor, "reject"),
        ] {
            assert!(matches!(
                store.lookup("k1", &mismatch),
                Err(WorkflowError::IdempotencyMismatch(_))
            ));
        }
    }
}
