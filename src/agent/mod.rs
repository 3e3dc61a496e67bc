//! Agent module: the PPO capability interface and a reference implementation.
//!
//! The training loop only talks to [`PpoAgent`]. [`LinearGaussianAgent`] is a
//! small CPU implementation used by the binary and the tests; `KlController`
//! holds the adaptive KL penalty it shares with any agent that wants one.

pub mod kl;
pub mod linear;
pub mod traits;

pub use kl::KlController;
pub use linear::LinearGaussianAgent;
pub use traits::{PolicyLearnStats, PpoAgent};
