//! Headset lens calibration: the persisted profile, named presets, the live
//! slider fields, and key-value persistence with throttled autosave.

use std::collections::HashMap;
use std::io;
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use web_time::{Duration, Instant};

pub const CALIBRATION_KEY: &str = "stereo-calibration";
pub const AUTOSAVE_MIN_INTERVAL: Duration = Duration::from_millis(350);
const CALIBRATION_SCHEMA_VERSION: u32 = 1;
#[cfg(not(target_arch = "wasm32"))]
const CONFIG_APP_DIR: &str = "handspace";

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration storage failed: {0}")]
    Storage(#[from] io::Error),
    #[error("calibration data is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("calibration storage is unavailable")]
    Unavailable,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalibrationProfile {
    pub schema_version: u32,
    /// Interpupillary distance in millimetres.
    pub ipd_mm: f32,
    /// Vertical field of view of each eye camera, degrees.
    pub fov_deg: f32,
    /// Lens optical center height in eye-target UV (0 top, 1 bottom).
    pub lens_center_y: f32,
    pub k1: f32,
    pub k2: f32,
    /// Scene units added to both eye cameras along the head's up vector.
    pub vertical_offset: f32,
    pub zoom: f32,
    /// Horizontal lens-center shift per eye, in eye-target UV.
    pub left_shift: f32,
    pub right_shift: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            schema_version: CALIBRATION_SCHEMA_VERSION,
            ipd_mm: 63.0,
            fov_deg: 90.0,
            lens_center_y: 0.5,
            k1: 0.22,
            k2: 0.24,
            vertical_offset: 0.0,
            zoom: 1.0,
            left_shift: 0.0,
            right_shift: 0.0,
        }
    }
}

impl CalibrationProfile {
    /// Clamps every field to its slider range. Non-finite values fall back
    /// to the default.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.schema_version = CALIBRATION_SCHEMA_VERSION;
        for field in CalibrationField::ALL {
            let value = field.get(&self);
            let value = if value.is_finite() { value } else { field.get(&defaults) };
            field.put(&mut self, field.range().clamp(value));
        }
        self
    }

    /// Eye separation in scene units (metres).
    pub fn ipd_scene(&self) -> f32 {
        self.ipd_mm / 1000.0
    }

    pub fn eye_shift(&self, eye: Eye) -> f32 {
        match eye {
            Eye::Left => self.left_shift,
            Eye::Right => self.right_shift,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    /// -1 for the left eye, +1 for the right, along the head's right vector.
    pub fn sign(self) -> f32 {
        match self {
            Eye::Left => -1.0,
            Eye::Right => 1.0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl FieldRange {
    const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// One calibration slider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationField {
    Ipd,
    Fov,
    LensCenterY,
    K1,
    K2,
    VerticalOffset,
    Zoom,
    LeftShift,
    RightShift,
}

impl CalibrationField {
    pub const ALL: [Self; 9] = [
        Self::Ipd,
        Self::Fov,
        Self::LensCenterY,
        Self::K1,
        Self::K2,
        Self::VerticalOffset,
        Self::Zoom,
        Self::LeftShift,
        Self::RightShift,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Ipd => "IPD (mm)",
            Self::Fov => "FOV (deg)",
            Self::LensCenterY => "Lens center Y",
            Self::K1 => "Distortion k1",
            Self::K2 => "Distortion k2",
            Self::VerticalOffset => "Vertical offset",
            Self::Zoom => "Zoom",
            Self::LeftShift => "Left eye shift",
            Self::RightShift => "Right eye shift",
        }
    }

    pub fn range(self) -> FieldRange {
        match self {
            Self::Ipd => FieldRange::new(50.0, 80.0, 0.5),
            Self::Fov => FieldRange::new(60.0, 120.0, 1.0),
            Self::LensCenterY => FieldRange::new(0.3, 0.7, 0.005),
            Self::K1 | Self::K2 => FieldRange::new(-0.5, 1.0, 0.01),
            Self::VerticalOffset => FieldRange::new(-0.1, 0.1, 0.001),
            Self::Zoom => FieldRange::new(0.5, 2.0, 0.01),
            Self::LeftShift | Self::RightShift => FieldRange::new(-0.1, 0.1, 0.001),
        }
    }

    pub fn get(self, profile: &CalibrationProfile) -> f32 {
        match self {
            Self::Ipd => profile.ipd_mm,
            Self::Fov => profile.fov_deg,
            Self::LensCenterY => profile.lens_center_y,
            Self::K1 => profile.k1,
            Self::K2 => profile.k2,
            Self::VerticalOffset => profile.vertical_offset,
            Self::Zoom => profile.zoom,
            Self::LeftShift => profile.left_shift,
            Self::RightShift => profile.right_shift,
        }
    }

    fn put(self, profile: &mut CalibrationProfile, value: f32) {
        let slot = match self {
            Self::Ipd => &mut profile.ipd_mm,
            Self::Fov => &mut profile.fov_deg,
            Self::LensCenterY => &mut profile.lens_center_y,
            Self::K1 => &mut profile.k1,
            Self::K2 => &mut profile.k2,
            Self::VerticalOffset => &mut profile.vertical_offset,
            Self::Zoom => &mut profile.zoom,
            Self::LeftShift => &mut profile.left_shift,
            Self::RightShift => &mut profile.right_shift,
        };
        *slot = value;
    }

    /// Writes a slider value, clamped to the field's range. NaN is ignored.
    pub fn set(self, profile: &mut CalibrationProfile, value: f32) {
        if value.is_nan() {
            return;
        }
        self.put(profile, self.range().clamp(value));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Preset {
    CardboardV1,
    CardboardV2,
    VrBox,
    BoboVrZ4,
    Flat,
}

impl Preset {
    pub const ALL: [Self; 5] = [
        Self::CardboardV1,
        Self::CardboardV2,
        Self::VrBox,
        Self::BoboVrZ4,
        Self::Flat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CardboardV1 => "cardboard-v1",
            Self::CardboardV2 => "cardboard-v2",
            Self::VrBox => "vr-box",
            Self::BoboVrZ4 => "bobovr-z4",
            Self::Flat => "flat",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CardboardV1 => "Cardboard v1",
            Self::CardboardV2 => "Cardboard v2",
            Self::VrBox => "VR Box",
            Self::BoboVrZ4 => "BoboVR Z4",
            Self::Flat => "Flat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| {
                p.as_str().eq_ignore_ascii_case(name) || p.display_name().eq_ignore_ascii_case(name)
            })
    }

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    /// Every field is assigned; nothing from the previous profile survives.
    pub fn profile(self) -> CalibrationProfile {
        let base = CalibrationProfile::default();
        match self {
            Self::CardboardV1 => CalibrationProfile {
                ipd_mm: 60.0,
                fov_deg: 80.0,
                k1: 0.441,
                k2: 0.156,
                ..base
            },
            Self::CardboardV2 => CalibrationProfile {
                ipd_mm: 64.0,
                fov_deg: 100.0,
                k1: 0.34,
                k2: 0.55,
                ..base
            },
            Self::VrBox => base,
            Self::BoboVrZ4 => CalibrationProfile {
                ipd_mm: 62.0,
                fov_deg: 100.0,
                lens_center_y: 0.48,
                k1: 0.28,
                k2: 0.08,
                ..base
            },
            Self::Flat => CalibrationProfile {
                fov_deg: 70.0,
                k1: 0.0,
                k2: 0.0,
                ..base
            },
        }
    }
}

/// Durable byte storage keyed by string.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CalibrationError>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), CalibrationError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CalibrationError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), CalibrationError> {
        (**self).set(key, value)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pub entries: HashMap<String, Vec<u8>>,
    /// Makes every `set` fail; lets callers exercise the retry path.
    pub fail_writes: bool,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CalibrationError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), CalibrationError> {
        if self.fail_writes {
            return Err(CalibrationError::Unavailable);
        }
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `handspace/` under the platform config directory, or `./saves` when
    /// no config directory is known.
    pub fn default_location() -> Self {
        match platform_config_dir() {
            Some(base) => Self::new(base.join(CONFIG_APP_DIR)),
            None => Self::new("saves"),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CalibrationError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), CalibrationError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

#[cfg(all(not(target_arch = "wasm32"), target_os = "windows"))]
fn platform_config_dir() -> Option<PathBuf> {
    std::env::var_os("APPDATA").map(PathBuf::from).or_else(|| {
        std::env::var_os("USERPROFILE")
            .map(PathBuf::from)
            .map(|home| home.join("AppData").join("Roaming"))
    })
}

#[cfg(all(not(target_arch = "wasm32"), target_os = "macos"))]
fn platform_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join("Library").join("Application Support"))
}

#[cfg(all(not(target_arch = "wasm32"), not(any(target_os = "windows", target_os = "macos"))))]
fn platform_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Browser `localStorage`, keys prefixed with `handspace.`.
#[cfg(target_arch = "wasm32")]
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageStore {
    pub fn open() -> Result<Self, CalibrationError> {
        let storage = web_sys::window()
            .and_then(|win| win.local_storage().ok().flatten())
            .ok_or(CalibrationError::Unavailable)?;
        Ok(Self { storage })
    }

    fn item_key(key: &str) -> String {
        format!("handspace.{key}")
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CalibrationError> {
        self.storage
            .get_item(&Self::item_key(key))
            .map(|item| item.map(String::into_bytes))
            .map_err(|_| CalibrationError::Unavailable)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), CalibrationError> {
        let text = String::from_utf8_lossy(value);
        self.storage
            .set_item(&Self::item_key(key), &text)
            .map_err(|_| CalibrationError::Unavailable)
    }
}

pub fn try_load_profile(
    store: &dyn KeyValueStore,
) -> Result<Option<CalibrationProfile>, CalibrationError> {
    let Some(bytes) = store.get(CALIBRATION_KEY)? else {
        return Ok(None);
    };
    let profile: CalibrationProfile = serde_json::from_slice(&bytes)?;
    Ok(Some(profile.sanitized()))
}

/// Stored profile, or defaults when storage is empty, unreadable or corrupt.
pub fn load_profile(store: &dyn KeyValueStore) -> CalibrationProfile {
    match try_load_profile(store) {
        Ok(Some(profile)) => profile,
        Ok(None) => CalibrationProfile::default(),
        Err(error) => {
            log::warn!("{error}; using default calibration");
            CalibrationProfile::default()
        }
    }
}

/// Writes the profile clamped to its slider ranges, the same form a reload
/// produces.
pub fn save_profile(
    store: &mut dyn KeyValueStore,
    profile: &CalibrationProfile,
) -> Result<(), CalibrationError> {
    let bytes = serde_json::to_vec_pretty(&profile.sanitized())?;
    store.set(CALIBRATION_KEY, &bytes)
}

/// The live profile plus its persistence. Edits apply immediately; writes
/// are throttled.
pub struct CalibrationEditor<S: KeyValueStore> {
    profile: CalibrationProfile,
    store: S,
    last_saved: CalibrationProfile,
    last_save_attempt: Option<Instant>,
}

impl<S: KeyValueStore> CalibrationEditor<S> {
    pub fn load(store: S) -> Self {
        let profile = load_profile(&store);
        Self {
            profile,
            store,
            last_saved: profile,
            last_save_attempt: None,
        }
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn set_field(&mut self, field: CalibrationField, value: f32) {
        field.set(&mut self.profile, value);
    }

    /// Moves a slider by `steps` of its step size.
    pub fn nudge(&mut self, field: CalibrationField, steps: f32) {
        let value = field.get(&self.profile) + field.range().step * steps;
        self.set_field(field, value);
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        log::info!("calibration preset: {}", preset.display_name());
        self.profile = preset.profile();
    }

    pub fn reset(&mut self) {
        log::info!("calibration reset to defaults");
        self.profile = CalibrationProfile::default();
    }

    /// Saves when the profile changed since the last successful write and
    /// the autosave interval has passed (or `force`). Returns whether a
    /// write succeeded. A failed write is retried on a later call.
    pub fn persist_if_needed(&mut self, now: Instant, force: bool) -> bool {
        if self.profile == self.last_saved {
            return false;
        }
        if !force {
            if let Some(last) = self.last_save_attempt {
                if now.saturating_duration_since(last) < AUTOSAVE_MIN_INTERVAL {
                    return false;
                }
            }
        }
        self.last_save_attempt = Some(now);
        match save_profile(&mut self.store, &self.profile) {
            Ok(()) => {
                self.last_saved = self.profile;
                true
            }
            Err(error) => {
                log::warn!("failed to save calibration: {error}");
                false
            }
        }
    }
}
