use num_complex::Complex64;

use crate::foundation::error::{ReelError, ReelResult};

/// Time unit shared by the recording's timestamps and its events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    S,
    Ms,
    Us,
}

impl TimeUnit {
    pub fn to_seconds(self, v: f64) -> f64 {
        match self {
            TimeUnit::S => v,
            TimeUnit::Ms => v * 1e-3,
            TimeUnit::Us => v * 1e-6,
        }
    }
}

/// Length unit of the spatial scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    M,
    Cm,
    #[default]
    Mm,
    Um,
}

impl LengthUnit {
    pub fn to_millimeters(self, v: f64) -> f64 {
        match self {
            LengthUnit::M => v * 1e3,
            LengthUnit::Cm => v * 10.0,
            LengthUnit::Mm => v,
            LengthUnit::Um => v * 1e-3,
        }
    }
}

/// A named stack of real-valued rasters, stored flat in `(t, x, y)` row-major order.
///
/// `x` is the raster row and `y` the raster column. Missing samples are NaN (`null` in JSON).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageSequence {
    pub name: String,
    /// `[dim_t, dim_x, dim_y]`
    pub shape: [usize; 3],
    #[serde(deserialize_with = "nullable_samples")]
    pub data: Vec<f64>,
}

impl ImageSequence {
    pub fn new(name: impl Into<String>, shape: [usize; 3], data: Vec<f64>) -> ReelResult<Self> {
        let seq = Self {
            name: name.into(),
            shape,
            data,
        };
        seq.validate()?;
        Ok(seq)
    }

    pub fn dim_t(&self) -> usize {
        self.shape[0]
    }

    pub fn dim_x(&self) -> usize {
        self.shape[1]
    }

    pub fn dim_y(&self) -> usize {
        self.shape[2]
    }

    pub fn validate(&self) -> ReelResult<()> {
        validate_shape(&self.name, self.shape, self.data.len())
    }

    /// Raster of one source frame, `dim_x * dim_y` samples, row-major.
    pub fn frame(&self, t: usize) -> ReelResult<Raster<'_>> {
        let (dim_x, dim_y) = (self.dim_x(), self.dim_y());
        let stride = dim_x * dim_y;
        let samples = self
            .data
            .get(t * stride..(t + 1) * stride)
            .ok_or_else(|| {
                ReelError::data(format!(
                    "frame {t} out of range for image sequence '{}' ({} frames)",
                    self.name,
                    self.dim_t()
                ))
            })?;
        Ok(Raster {
            dim_x,
            dim_y,
            samples,
        })
    }
}

/// Borrowed view of one raster frame.
#[derive(Clone, Copy, Debug)]
pub struct Raster<'a> {
    pub dim_x: usize,
    pub dim_y: usize,
    pub samples: &'a [f64],
}

impl Raster<'_> {
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.samples[x * self.dim_y + y]
    }
}

/// A named stack of complex-valued grids (real = horizontal, imaginary = vertical component).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VectorField {
    pub name: String,
    /// `[dim_t, dim_x, dim_y]`
    pub shape: [usize; 3],
    pub data: Vec<Complex64>,
}

impl VectorField {
    pub fn new(
        name: impl Into<String>,
        shape: [usize; 3],
        data: Vec<Complex64>,
    ) -> ReelResult<Self> {
        let field = Self {
            name: name.into(),
            shape,
            data,
        };
        field.validate()?;
        Ok(field)
    }

    pub fn validate(&self) -> ReelResult<()> {
        validate_shape(&self.name, self.shape, self.data.len())
    }

    /// Checked only for the field a movie actually draws.
    pub fn validate_against(&self, base: &ImageSequence) -> ReelResult<()> {
        self.validate()?;
        if self.shape != base.shape {
            return Err(ReelError::data(format!(
                "vector field '{}' shape {:?} does not match image sequence '{}' shape {:?}",
                self.name, self.shape, base.name, base.shape
            )));
        }
        Ok(())
    }

    pub fn frame(&self, t: usize) -> ReelResult<FieldSlice<'_>> {
        let (dim_x, dim_y) = (self.shape[1], self.shape[2]);
        let stride = dim_x * dim_y;
        let vectors = self
            .data
            .get(t * stride..(t + 1) * stride)
            .ok_or_else(|| {
                ReelError::data(format!(
                    "frame {t} out of range for vector field '{}' ({} frames)",
                    self.name, self.shape[0]
                ))
            })?;
        Ok(FieldSlice {
            dim_x,
            dim_y,
            vectors,
        })
    }

    /// Largest finite vector magnitude over every frame, 0 when there is none.
    pub fn max_magnitude(&self) -> f64 {
        self.data
            .iter()
            .map(|v| v.norm())
            .filter(|m| m.is_finite())
            .fold(0.0, f64::max)
    }
}

/// Borrowed view of one vector-field frame.
#[derive(Clone, Copy, Debug)]
pub struct FieldSlice<'a> {
    pub dim_x: usize,
    pub dim_y: usize,
    pub vectors: &'a [Complex64],
}

impl FieldSlice<'_> {
    pub fn get(&self, x: usize, y: usize) -> Complex64 {
        self.vectors[x * self.dim_y + y]
    }
}

/// Named collection of discrete events with integer grid coordinates.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventSet {
    pub name: String,
    pub times: Vec<f64>,
    pub x_coords: Vec<i64>,
    pub y_coords: Vec<i64>,
}

impl EventSet {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.x_coords.len() != self.times.len() || self.y_coords.len() != self.times.len() {
            return Err(ReelError::data(format!(
                "event set '{}' has {} times but {} x_coords and {} y_coords",
                self.name,
                self.times.len(),
                self.x_coords.len(),
                self.y_coords.len()
            )));
        }
        if let Some(t) = self.times.iter().find(|t| !t.is_finite()) {
            return Err(ReelError::data(format!(
                "event set '{}' contains a non-finite time ({t})",
                self.name
            )));
        }
        Ok(())
    }
}

/// In-memory recording: base imaging data plus optional overlays and time metadata.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Recording {
    pub t_start: f64,
    pub t_stop: f64,
    #[serde(default)]
    pub time_unit: TimeUnit,
    pub spatial_scale: f64,
    #[serde(default)]
    pub spatial_unit: LengthUnit,
    /// One timestamp per frame of the base sequence.
    pub times: Vec<f64>,
    pub image_sequences: Vec<ImageSequence>,
    #[serde(default)]
    pub vector_fields: Vec<VectorField>,
    #[serde(default)]
    pub events: Vec<EventSet>,
}

impl Recording {
    /// The first image sequence is the one that gets rendered.
    pub fn base_sequence(&self) -> ReelResult<&ImageSequence> {
        self.image_sequences
            .first()
            .ok_or_else(|| ReelError::data("recording contains no image sequence"))
    }

    pub fn t_start_s(&self) -> f64 {
        self.time_unit.to_seconds(self.t_start)
    }

    pub fn t_stop_s(&self) -> f64 {
        self.time_unit.to_seconds(self.t_stop)
    }

    pub fn spatial_scale_mm(&self) -> f64 {
        self.spatial_unit.to_millimeters(self.spatial_scale)
    }

    /// Structural checks on the base sequence and timestamps. Overlays are checked only when a
    /// movie selects them.
    pub fn validate(&self) -> ReelResult<()> {
        let base = self.base_sequence()?;
        base.validate()?;
        if base.dim_t() == 0 {
            return Err(ReelError::data(format!(
                "image sequence '{}' has zero frames",
                base.name
            )));
        }
        if base.dim_x() == 0 || base.dim_y() == 0 {
            return Err(ReelError::data(format!(
                "image sequence '{}' has an empty spatial shape {:?}",
                base.name, base.shape
            )));
        }
        if self.times.len() != base.dim_t() {
            return Err(ReelError::data(format!(
                "recording has {} timestamps for {} frames",
                self.times.len(),
                base.dim_t()
            )));
        }
        if let Some(t) = self.times.iter().find(|t| !t.is_finite()) {
            return Err(ReelError::data(format!(
                "frame timestamps contain a non-finite value ({t})"
            )));
        }
        if let Some(i) = self.times.windows(2).position(|w| w[1] < w[0]) {
            return Err(ReelError::data(format!(
                "frame timestamps are not monotonic at frame {} ({} after {})",
                i + 1,
                self.times[i + 1],
                self.times[i]
            )));
        }
        if !self.t_start.is_finite() || !self.t_stop.is_finite() {
            return Err(ReelError::data("t_start/t_stop must be finite"));
        }
        if !self.spatial_scale.is_finite() || self.spatial_scale <= 0.0 {
            return Err(ReelError::data(format!(
                "spatial_scale must be positive (got {})",
                self.spatial_scale
            )));
        }
        Ok(())
    }
}

fn validate_shape(name: &str, shape: [usize; 3], len: usize) -> ReelResult<()> {
    let expected = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| ReelError::data(format!("'{name}' shape {shape:?} overflows")))?;
    if expected != len {
        return Err(ReelError::data(format!(
            "'{name}' has {len} samples but shape {shape:?} needs {expected}"
        )));
    }
    Ok(())
}

fn nullable_samples<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize as _;

    let raw = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(times: Vec<f64>) -> Recording {
        let dim_t = times.len();
        Recording {
            t_start: 0.0,
            t_stop: dim_t as f64,
            time_unit: TimeUnit::S,
            spatial_scale: 0.5,
            spatial_unit: LengthUnit::Mm,
            times,
            image_sequences: vec![
                ImageSequence::new("signal", [dim_t, 2, 3], vec![0.0; dim_t * 6]).unwrap(),
            ],
            vector_fields: vec![],
            events: vec![],
        }
    }

    #[test]
    fn frame_views_index_row_major() {
        let data: Vec<f64> = (0..12).map(f64::from).collect();
        let seq = ImageSequence::new("s", [2, 2, 3], data).unwrap();
        let f1 = seq.frame(1).unwrap();
        assert_eq!(f1.get(0, 0), 6.0);
        assert_eq!(f1.get(1, 2), 11.0);
        assert!(seq.frame(2).is_err());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        assert!(ImageSequence::new("s", [2, 2, 2], vec![0.0; 7]).is_err());
    }

    #[test]
    fn valid_recording_passes() {
        recording(vec![0.0, 1.0, 1.0, 2.0]).validate().unwrap();
    }

    #[test]
    fn non_monotonic_times_are_fatal() {
        let err = recording(vec![0.0, 2.0, 1.0]).validate().unwrap_err();
        assert!(matches!(err, ReelError::Data(_)));
        assert!(err.to_string().contains("not monotonic"));
    }

    #[test]
    fn zero_frames_are_fatal() {
        let err = recording(vec![]).validate().unwrap_err();
        assert!(err.to_string().contains("zero frames"));
    }

    #[test]
    fn timestamp_count_must_match_frames() {
        let mut rec = recording(vec![0.0, 1.0]);
        rec.times.push(3.0);
        assert!(rec.validate().is_err());
    }

    #[test]
    fn vector_field_shape_is_checked_against_base() {
        let mut rec = recording(vec![0.0, 1.0]);
        rec.vector_fields.push(
            VectorField::new("optical_flow", [2, 3, 2], vec![Complex64::new(0.0, 0.0); 12])
                .unwrap(),
        );
        // Unused fields do not make the recording invalid.
        rec.validate().unwrap();
        let base = rec.base_sequence().unwrap();
        let err = rec.vector_fields[0].validate_against(base).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn ragged_event_set_fails_its_own_check() {
        let mut rec = recording(vec![0.0, 1.0]);
        rec.events.push(EventSet {
            name: "transitions".to_string(),
            times: vec![0.5, 0.7],
            x_coords: vec![0],
            y_coords: vec![0, 1],
        });
        rec.validate().unwrap();
        assert!(rec.events[0].validate().is_err());
    }

    #[test]
    fn null_samples_deserialize_as_nan() {
        let seq: ImageSequence =
            serde_json::from_str(r#"{"name":"s","shape":[1,1,2],"data":[1.5,null]}"#).unwrap();
        assert_eq!(seq.data[0], 1.5);
        assert!(seq.data[1].is_nan());
    }

    #[test]
    fn units_normalize_to_seconds_and_millimeters() {
        assert_eq!(TimeUnit::Ms.to_seconds(1500.0), 1.5);
        assert_eq!(LengthUnit::Cm.to_millimeters(0.5), 5.0);
        assert!((LengthUnit::Um.to_millimeters(50.0) - 0.05).abs() < 1e-12);
    }
}
