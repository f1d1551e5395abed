use crate::convert::ReconstructedScene;
use crate::error::ImportError;

/// Destination that takes ownership of a finished scene.
///
/// A sink receives exactly one call per successful import and never sees a
/// partial scene.
pub trait SceneSink {
    fn commit(&mut self, scene: ReconstructedScene) -> Result<(), ImportError>;
}

/// Keeps committed scenes in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub scenes: Vec<ReconstructedScene>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&ReconstructedScene> {
        self.scenes.last()
    }
}

impl SceneSink for MemorySink {
    fn commit(&mut self, scene: ReconstructedScene) -> Result<(), ImportError> {
        self.scenes.push(scene);
        Ok(())
    }
}
