//! Optional parallel map over independent build units.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How much of a build pass runs on the rayon pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParallelMode {
    /// Everything runs on the calling thread.
    Disabled,
    /// Static files in parallel, pages sequentially.
    #[default]
    Conservative,
    /// Static files and pages in parallel.
    Aggressive,
}

impl ParallelMode {
    pub fn static_files(self) -> bool {
        self > Self::Disabled
    }

    pub fn pages(self) -> bool {
        self >= Self::Aggressive
    }
}

/// Run `f` over every item, in parallel when `parallel` is set.
///
/// Stops at the first error. Sequential runs keep item order; parallel
/// runs give no ordering guarantee.
pub fn try_for_each<T, E, F>(parallel: bool, items: &[T], f: F) -> Result<(), E>
where
    T: Sync,
    E: Send,
    F: Fn(&T) -> Result<(), E> + Sync + Send,
{
    if parallel {
        items.par_iter().try_for_each(f)
    } else {
        items.iter().try_for_each(f)
    }
}
