use image::{GrayImage, Luma};
use polar_contour::{BoxRect, ContourError, FloatImage, PolarFrame, Slice, polar::to_polar};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ImageError(#[from] image::ImageError),
    #[error(transparent)]
    ContourError(#[from] ContourError),
    #[error("Polar grid must have at least one row and one column")]
    EmptyGrid,
    #[error("Duplicate slice id '{0}'")]
    DuplicateId(String),
    #[error("Slice '{0}' has a non-positive radius")]
    InvalidRadius(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

fn default_rows() -> u32 {
    128
}

fn default_cols() -> u32 {
    64
}

/// One image slice to trace
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SliceEntry {
    pub id: String,
    /// Grayscale intensity image
    pub image: PathBuf,
    /// Cartesian probability map of the same size as `image`, 0..255
    #[serde(default)]
    pub probability: Option<PathBuf>,
    /// Polar center in pixels; defaults to the image center
    #[serde(default)]
    pub center: Option<[f32; 2]>,
    /// Polar radius in pixels; defaults to half the shorter image side
    #[serde(default)]
    pub radius: Option<f32>,
    /// Region box `[x, y, width, height]` scored against the traced label
    #[serde(default, rename = "box")]
    pub box_hint: Option<[i32; 4]>,
}

/// A batch of slices sharing one polar resolution
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct StudyManifest {
    /// Angular samples
    #[serde(default = "default_rows")]
    pub rows: u32,
    /// Radial samples
    #[serde(default = "default_cols")]
    pub cols: u32,
    /// Intensity level for the built-in threshold detector
    #[serde(default)]
    pub detector_level: Option<f32>,
    pub slices: Vec<SliceEntry>,
}

impl SliceEntry {
    pub fn frame(&self, (width, height): (u32, u32)) -> PolarFrame {
        let [cx, cy] = self
            .center
            .unwrap_or([width as f32 / 2.0, height as f32 / 2.0]);
        let radius = self.radius.unwrap_or(width.min(height) as f32 / 2.0);
        PolarFrame::new(cx, cy, radius)
    }

    /// Load the images and resample them around the slice's frame.
    pub fn load(&self, rows: u32, cols: u32) -> Result<Slice, ManifestError> {
        let image = to_float(&image::open(&self.image)?.to_luma8());
        let mut slice = Slice::new(&self.id, image);
        if let Some([x, y, w, h]) = self.box_hint {
            slice = slice.with_box_hint(BoxRect::new(x, y, w, h));
        }
        let frame = self.frame(slice.canvas());
        slice.update_polar(frame, rows, cols);

        if let Some(path) = &self.probability {
            let prob = to_float(&image::open(path)?.to_luma8());
            if prob.dimensions() != slice.canvas() {
                return Err(ContourError::DimensionMismatch {
                    intensity: slice.canvas(),
                    probability: prob.dimensions(),
                }
                .into());
            }
            slice.set_probability(to_polar(&prob, &frame, rows, cols))?;
        }
        Ok(slice)
    }
}

fn to_float(image: &GrayImage) -> FloatImage {
    FloatImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[0] as f32])
    })
}

impl StudyManifest {
    /// Load manifest from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ManifestError> {
        let manifest: StudyManifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load manifest from JSON string
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let manifest: StudyManifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Auto-detect file format and load the manifest. Relative image paths
    /// are taken relative to the manifest's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path_ref = path.as_ref();
        let mut manifest = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path_ref)?)?,
            Some("json") => Self::from_json(&fs::read_to_string(path_ref)?)?,
            _ => return Err(ManifestError::UnsupportedFileFormat),
        };
        if let Some(base) = path_ref.parent() {
            manifest.resolve_paths(base);
        }
        Ok(manifest)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for entry in &mut self.slices {
            resolve(&mut entry.image);
            if let Some(prob) = entry.probability.as_mut() {
                resolve(prob);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ManifestError::EmptyGrid);
        }
        let mut seen = HashSet::new();
        for entry in &self.slices {
            if !seen.insert(entry.id.as_str()) {
                return Err(ManifestError::DuplicateId(entry.id.clone()));
            }
            if entry.radius.is_some_and(|r| !(r > 0.0)) {
                return Err(ManifestError::InvalidRadius(entry.id.clone()));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Load every slice in manifest order.
    pub fn load_slices(&self) -> Result<Vec<Slice>, ManifestError> {
        self.slices
            .iter()
            .map(|entry| entry.load(self.rows, self.cols))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
cols = 48
detector_level = 150.0

[[slices]]
id = "base"
image = "base.png"
probability = "base_prob.png"

[[slices]]
id = "mid"
image = "/data/mid.png"
center = [40.0, 42.5]
radius = 30.0
box = [10, 12, 40, 38]
"#;

    #[test]
    fn test_parse_toml_manifest() {
        let manifest = StudyManifest::from_toml(MANIFEST).expect("Should parse manifest");
        assert_eq!(manifest.rows, 128);
        assert_eq!(manifest.cols, 48);
        assert_eq!(manifest.detector_level, Some(150.0));
        assert_eq!(manifest.slices.len(), 2);
        assert_eq!(manifest.slices[0].probability, Some(PathBuf::from("base_prob.png")));
        assert_eq!(manifest.slices[1].box_hint, Some([10, 12, 40, 38]));

        let frame = manifest.slices[0].frame((100, 80));
        assert_eq!(frame, PolarFrame::new(50.0, 40.0, 40.0));
        let frame = manifest.slices[1].frame((100, 80));
        assert_eq!(frame, PolarFrame::new(40.0, 42.5, 30.0));
    }

    #[test]
    fn test_resolve_paths() {
        let mut manifest = StudyManifest::from_toml(MANIFEST).expect("Should parse manifest");
        manifest.resolve_paths(Path::new("/study"));
        assert_eq!(manifest.slices[0].image, PathBuf::from("/study/base.png"));
        assert_eq!(
            manifest.slices[0].probability,
            Some(PathBuf::from("/study/base_prob.png"))
        );
        assert_eq!(manifest.slices[1].image, PathBuf::from("/data/mid.png"));
    }

    #[test]
    fn test_json_manifest_roundtrip() {
        let manifest = StudyManifest::from_toml(MANIFEST).expect("Should parse manifest");
        let json = serde_json::to_string(&manifest).expect("Should serialize");
        assert!(json.contains("\"box\""));
        let back = StudyManifest::from_json(&json).expect("Should parse json");
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_invalid_manifests() {
        let dup = r#"
[[slices]]
id = "a"
image = "a.png"
[[slices]]
id = "a"
image = "b.png"
"#;
        assert!(matches!(
            StudyManifest::from_toml(dup),
            Err(ManifestError::DuplicateId(id)) if id == "a"
        ));

        let radius = r#"
[[slices]]
id = "a"
image = "a.png"
radius = 0.0
"#;
        assert!(matches!(
            StudyManifest::from_toml(radius),
            Err(ManifestError::InvalidRadius(_))
        ));

        assert!(matches!(
            StudyManifest::from_toml("rows = 0\nslices = []"),
            Err(ManifestError::EmptyGrid)
        ));
        assert!(matches!(
            StudyManifest::from_file("study.yaml"),
            Err(ManifestError::UnsupportedFileFormat)
        ));
    }

    #[test]
    fn test_load_slice_from_disk() {
        let dir = std::env::temp_dir().join(format!("contour_cli_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("Should create temp dir");
        let image = GrayImage::from_fn(40, 40, |x, y| {
            let d = ((x as f32 - 20.0).powi(2) + (y as f32 - 20.0).powi(2)).sqrt();
            Luma([if d < 8.0 { 200 } else { 60 }])
        });
        image.save(dir.join("disc.png")).expect("Should save image");
        GrayImage::new(20, 20)
            .save(dir.join("small.png"))
            .expect("Should save image");

        let mut entry = SliceEntry {
            id: "disc".into(),
            image: dir.join("disc.png"),
            probability: Some(dir.join("disc.png")),
            center: None,
            radius: None,
            box_hint: Some([10, 10, 20, 20]),
        };
        let slice = entry.load(32, 16).expect("Should load slice");
        assert_eq!(slice.polar_image.dimensions(), (16, 32));
        assert_eq!(slice.box_hint, Some(BoxRect::new(10, 10, 20, 20)));
        let prob = slice.polar_prob.as_ref().expect("Should have probability");
        assert_eq!(prob.get_pixel(0, 0)[0], 200.0);

        entry.probability = Some(dir.join("small.png"));
        assert!(matches!(
            entry.load(32, 16),
            Err(ManifestError::ContourError(ContourError::DimensionMismatch { .. }))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
