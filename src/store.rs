//! Model persistence
//!
//! The core hands fitted models to a store and asks for them back by
//! generation id; what bytes the store writes is its own business. A JSON
//! file store is provided for training runs and the serving layer to share.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::model::ModelHandle;

/// Opaque load/save of fitted models keyed by a model-generation id.
///
/// Implementations do not retry; failures surface as store errors and the
/// caller decides what "no model available" means for it.
pub trait ModelStore {
    fn save(&self, generation: &str, model: &ModelHandle) -> Result<()>;
    fn load(&self, generation: &str) -> Result<ModelHandle>;
}

/// File-backed store writing one JSON document per model generation.
#[derive(Debug, Clone)]
pub struct JsonModelStore {
    root: PathBuf,
}

impl JsonModelStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, generation: &str) -> PathBuf {
        self.root.join(format!("{generation}.json"))
    }
}

impl ModelStore for JsonModelStore {
    fn save(&self, generation: &str, model: &ModelHandle) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(generation);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, model)?;
        info!(generation, path = %path.display(), "saved model");
        Ok(())
    }

    fn load(&self, generation: &str) -> Result<ModelHandle> {
        let path = self.path_for(generation);
        let reader = BufReader::new(File::open(&path)?);
        let model: ModelHandle = serde_json::from_reader(reader)?;
        // a store can hand back anything; reject inconsistent handles here
        model.validate()?;
        info!(generation, path = %path.display(), "loaded model");
        Ok(model)
    }
}

/// Convenience wrapper for stores rooted at a directory path.
pub fn open_json_store<P: AsRef<Path>>(root: P) -> JsonModelStore {
    JsonModelStore::new(root.as_ref().to_path_buf())
}
