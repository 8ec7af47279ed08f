//! Producing many containers at once.

use rayon::prelude::*;

use crate::container::ContainerFormat;
use crate::error::Result;

/// Write every container to its bound path on the rayon pool.
///
/// Archive creation is still capped by the global write limiter, however
/// many pool threads are running. Results are in input order.
pub fn write_all<F>(containers: &mut [F]) -> Vec<Result<()>>
where
    F: ContainerFormat + Send,
{
    containers
        .par_iter_mut()
        .map(|container| container.write(None))
        .collect()
}
