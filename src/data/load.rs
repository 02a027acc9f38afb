use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;

use crate::{
    data::model::{EventSet, Recording, VectorField},
    foundation::error::{ReelError, ReelResult},
};

/// Default name of the derived flow field drawn as arrows.
pub const DEFAULT_VECTOR_FIELD: &str = "optical_flow";

/// Read and validate a recording from a JSON file.
#[tracing::instrument]
pub fn load_recording(path: &Path) -> ReelResult<Recording> {
    let f = File::open(path).with_context(|| format!("open recording '{}'", path.display()))?;
    let recording: Recording = serde_json::from_reader(BufReader::new(f))
        .map_err(|e| ReelError::serde(format!("parse recording '{}': {e}", path.display())))?;
    recording.validate()?;
    tracing::debug!(
        frames = recording.times.len(),
        image_sequences = recording.image_sequences.len(),
        vector_fields = recording.vector_fields.len(),
        event_sets = recording.events.len(),
        "loaded recording"
    );
    Ok(recording)
}

/// Parse and validate a recording from JSON bytes.
pub fn parse_recording(bytes: &[u8]) -> ReelResult<Recording> {
    let recording: Recording = serde_json::from_slice(bytes)
        .map_err(|e| ReelError::serde(format!("parse recording: {e}")))?;
    recording.validate()?;
    Ok(recording)
}

/// First vector field called `name`, unmodified. `None` means "no arrow overlay".
pub fn extract_vector_field<'a>(fields: &'a [VectorField], name: &str) -> Option<&'a VectorField> {
    let found = fields.iter().find(|f| f.name == name);
    if found.is_none() {
        tracing::debug!(name, "no vector field with this name; arrows disabled");
    }
    found
}

/// First event set called `name`.
pub fn find_event_set<'a>(events: &'a [EventSet], name: &str) -> Option<&'a EventSet> {
    events.iter().find(|e| e.name == name)
}
