//! Undo journaling for state that must roll back as one unit.
//!
//! Between [`Checkpoint::checkpoint`] and either [`Checkpoint::commit`] or
//! [`Checkpoint::rollback`], an implementor records the prior value of
//! everything it overwrites. Rollback replays those records newest first.
//! The cost of an operation is therefore proportional to what it touches,
//! not to the size of the state.
//!
//! Checkpoints do not nest: opening one while another is open discards the
//! older journal.

/// Transactional state with a single open checkpoint at a time.
pub trait Checkpoint {
    /// Start recording undo information.
    fn checkpoint(&mut self);

    /// Keep every change since [`checkpoint`](Self::checkpoint) and stop
    /// recording.
    fn commit(&mut self);

    /// Undo every change since [`checkpoint`](Self::checkpoint) and stop
    /// recording. A no-op when no checkpoint is open.
    fn rollback(&mut self);
}
