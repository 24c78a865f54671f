use std::fs::File;
use std::path::Path;

use crate::{ExperimentError, ExperimentResult};

pub(crate) fn ensure_not_empty<T>(items: &[T]) -> ExperimentResult<()> {
    if items.is_empty() {
        return Err(ExperimentError::Empty);
    }

    Ok(())
}

pub(crate) fn create_output_file(path: impl AsRef<Path>) -> ExperimentResult<File> {
    let path = path.as_ref();
    File::create(path).map_err(|source| ExperimentError::Io {
        path: path.to_path_buf(),
        source,
    })
}
