#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and sample-script parsing for the dimensioning station.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The sample-script CSV loader enforces headers; it feeds the simulated
//!   volume engine with per-sample estimates for bench runs.
use serde::Deserialize;
use serde::de::Deserializer;

/// Scripted per-sample estimate.
///
/// Expected headers:
/// length_mm,width_mm,height_mm
///
/// Example:
/// length_mm,width_mm,height_mm
/// 400,300,200
/// 401,300,199
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SampleRow {
    pub length_mm: i32,
    pub width_mm: i32,
    pub height_mm: i32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WorkAreaCfg {
    pub floor_depth_mm: i16,
    pub min_object_height_mm: i16,
    pub use_color_mask: bool,
    /// Polygon in relative coordinates. Accepts either:
    /// - array of tuples: [[0.2, 0.2], [0.2, 0.8], ...]
    /// - array of tables: [{ x = 0.2, y = 0.2 }, ...]
    #[serde(deserialize_with = "de_contour")]
    pub color_mask: Vec<(f64, f64)>,
    pub use_depth_mask: bool,
    #[serde(deserialize_with = "de_contour")]
    pub depth_mask: Vec<(f64, f64)>,
    pub enable_dm: bool,
    pub enable_perspective_dm: bool,
    pub enable_rgb: bool,
    /// Added to every range meter reading before use.
    pub range_meter_correction_mm: i32,
}

impl Default for WorkAreaCfg {
    fn default() -> Self {
        Self {
            floor_depth_mm: 1805,
            min_object_height_mm: 15,
            use_color_mask: false,
            color_mask: default_contour(),
            use_depth_mask: true,
            depth_mask: default_contour(),
            enable_dm: true,
            enable_perspective_dm: true,
            enable_rgb: true,
            range_meter_correction_mm: 0,
        }
    }
}

fn default_contour() -> Vec<(f64, f64)> {
    vec![(0.2, 0.2), (0.2, 0.8), (0.8, 0.8), (0.8, 0.2)]
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnits {
    #[default]
    Gr,
    Kg,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AlgorithmCfg {
    /// Number of depth/colour sample pairs per calculation.
    pub sample_count: u8,
    pub require_barcode: bool,
    pub weight_units: WeightUnits,
    /// Start a calculation automatically once barcode and weight are ready.
    pub enable_auto_timer: bool,
    pub time_to_start_ms: u64,
    pub enable_pallet_subtraction: bool,
    pub pallet_weight_gr: f64,
    pub pallet_height_mm: i32,
}

impl Default for AlgorithmCfg {
    fn default() -> Self {
        Self {
            sample_count: 5,
            require_barcode: true,
            weight_units: WeightUnits::Gr,
            enable_auto_timer: true,
            time_to_start_ms: 1000,
            enable_pallet_subtraction: false,
            pallet_weight_gr: 0.0,
            pallet_height_mm: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Per-sample watchdog (ms). Also accepts alias "sample_timeout_ms".
    #[serde(alias = "sample_timeout_ms")]
    pub sample_ms: u64,
    /// Period of the auto-start supervisor (ms).
    pub supervisor_tick_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            sample_ms: 5000,
            supervisor_tick_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct General {
    /// Directory receiving per-calculation debug images.
    pub photos_dir: String,
    /// File holding the monotonically increasing calculation counter.
    pub counter_file: String,
    pub save_debug_images: bool,
    /// Lock file of the result spreadsheet; a calculation refuses to start
    /// while it exists and cannot be removed.
    pub result_lock_file: Option<String>,
}

impl Default for General {
    fn default() -> Self {
        Self {
            photos_dir: "photos".into(),
            counter_file: "counters.txt".into(),
            save_debug_images: true,
            result_lock_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Simulation knobs used when no physical devices are attached.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    pub frame_rate_hz: u32,
    /// Fixed range meter reading; absent means no range meter.
    pub range_meter_mm: Option<i32>,
    /// Weight reported by the simulated scale.
    pub weight_gr: f64,
    /// Object placed in the simulated scene, as [length, width, height] mm.
    pub object_mm: (i32, i32, i32),
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            frame_rate_hz: 15,
            range_meter_mm: None,
            weight_gr: 1250.0,
            object_mm: (400, 300, 200),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub work_area: WorkAreaCfg,
    #[serde(default)]
    pub algorithm: AlgorithmCfg,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub hardware: Hardware,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointToml {
    Tuple((f64, f64)),
    Table { x: f64, y: f64 },
}

fn de_contour<'de, D>(deserializer: D) -> Result<Vec<(f64, f64)>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<PointToml>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(items) = opt {
        for p in items {
            match p {
                PointToml::Tuple((x, y)) => out.push((x, y)),
                PointToml::Table { x, y } => out.push((x, y)),
            }
        }
    }
    Ok(out)
}

pub fn load_sample_script_csv(path: &std::path::Path) -> eyre::Result<Vec<SampleRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open sample script CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["length_mm", "width_mm", "height_mm"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "sample script CSV must have headers 'length_mm,width_mm,height_mm', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<SampleRow>().enumerate() {
        match rec {
            Ok(row) => {
                if row.length_mm < 0 || row.width_mm < 0 || row.height_mm < 0 {
                    eyre::bail!("CSV row {} has a negative dimension", idx + 2);
                }
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("sample script {:?} has no rows", path);
    }

    Ok(rows)
}

fn validate_contour(name: &str, points: &[(f64, f64)]) -> eyre::Result<()> {
    if points.len() < 3 {
        eyre::bail!("{name} needs at least 3 points, got {}", points.len());
    }
    for (x, y) in points {
        if !(0.0..=1.0).contains(x) || !(0.0..=1.0).contains(y) {
            eyre::bail!("{name} coordinates must be in [0.0, 1.0], got ({x}, {y})");
        }
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Work area
        if self.work_area.floor_depth_mm <= 0 {
            eyre::bail!("work_area.floor_depth_mm must be > 0");
        }
        if self.work_area.min_object_height_mm < 0
            || self.work_area.min_object_height_mm >= self.work_area.floor_depth_mm
        {
            eyre::bail!("work_area.min_object_height_mm must be in [0, floor_depth_mm)");
        }
        validate_contour("work_area.color_mask", &self.work_area.color_mask)?;
        validate_contour("work_area.depth_mask", &self.work_area.depth_mask)?;

        // Algorithm
        if self.algorithm.sample_count == 0 {
            eyre::bail!("algorithm.sample_count must be >= 1");
        }
        if self.algorithm.enable_auto_timer && self.algorithm.time_to_start_ms == 0 {
            eyre::bail!("algorithm.time_to_start_ms must be >= 1 when the auto timer is enabled");
        }
        if !self.algorithm.pallet_weight_gr.is_finite() || self.algorithm.pallet_weight_gr < 0.0 {
            eyre::bail!("algorithm.pallet_weight_gr must be >= 0");
        }
        if self.algorithm.pallet_height_mm < 0 {
            eyre::bail!("algorithm.pallet_height_mm must be >= 0");
        }

        // Timeouts
        if self.timeouts.sample_ms == 0 {
            eyre::bail!("timeouts.sample_ms must be >= 1");
        }
        if self.timeouts.supervisor_tick_ms == 0 {
            eyre::bail!("timeouts.supervisor_tick_ms must be >= 1");
        }

        // General
        if self.general.save_debug_images && self.general.photos_dir.trim().is_empty() {
            eyre::bail!("general.photos_dir must be set when save_debug_images is enabled");
        }
        if self.general.counter_file.trim().is_empty() {
            eyre::bail!("general.counter_file must not be empty");
        }

        // Hardware (simulation)
        if self.hardware.frame_rate_hz == 0 {
            eyre::bail!("hardware.frame_rate_hz must be > 0");
        }
        if !self.hardware.weight_gr.is_finite() {
            eyre::bail!("hardware.weight_gr must be finite");
        }

        Ok(())
    }
}
