/// External collaborators (spec §6).
///
/// Every type named in §1's "explicitly out of scope" list is represented
/// here only by the narrow trait contract the core actually needs, plus an
/// in-memory reference implementation so the server is fully runnable
/// standalone. Swapping in a real persistence engine, pub/sub bus, or
/// description-generation backend means implementing the trait, not
/// touching the executor or dispatcher.
pub mod cache;
pub mod persistence;
pub mod pubsub;
