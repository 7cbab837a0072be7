//! Filament preset reference data.
//!
//! Looks up recommended nozzle and bed temperatures by material and brand,
//! and lists known brands and variants for form pre-fill. Data comes from
//! `presets.json`, `brands.json`, and `variants.json` in a directory, with a
//! built-in table for the common materials when none is available.

pub mod error;
pub mod preset;
pub mod table;

pub use error::{PresetError, PresetResult};
pub use preset::{fallback_presets, Preset};
pub use table::{PresetLookup, PresetTable, BRANDS_FILE, PRESETS_FILE, VARIANTS_FILE};
