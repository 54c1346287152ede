//! Threading helpers shared by the parallel kernels.

/// Helpers for dispatching work over a rayon thread pool.
pub mod thread;
