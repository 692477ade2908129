/// Execute an aggregate command deterministically (no IO, no async).
///
/// Decides with `handle`, then evolves the aggregate with `apply` for every
/// emitted event. The infra workflow engine does the same, with persistence
/// and publication in between; this helper is for pure, in-memory use.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: reqflow_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
