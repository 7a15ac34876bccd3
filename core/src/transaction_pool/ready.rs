#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Superseded by the sender's account state; drop it from the pool.
    Stale,
    /// Fit to enter the next block now.
    Ready,
    /// Waits on a gap in the sender's nonce sequence.
    Future,
}

/// A readiness indicator.
pub trait Ready<T> {
    /// Whether `tx` can go into a new block, given that every previously
    /// reported ready transaction made it in.
    fn is_ready(&mut self, tx: &T) -> Readiness;
}
