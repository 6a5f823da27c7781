use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::CodecError;
use crate::handle::Handle;

/// Field entries starting with this marker are literals: written verbatim
/// and skipped when parsing.
pub const LITERAL_MARKER: char = '=';

/// Catalogue of sentence formats
///
/// Maps a lower-case sentence id (`rmc`, `hdm`, ...) to the ordered list of
/// variable names carried by its fields. The catalogue can be loaded from a
/// YAML file of the form:
///
/// ```yaml
/// formats:
///   hdm: [heading_mag, "=M"]
///   dpt: [depth, depth_offset]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentences {
    pub formats: BTreeMap<String, Vec<String>>,
}

impl Sentences {
    /// Load a catalogue from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, CodecError> {
        let mut sentences: Sentences = serde_yaml::from_str(contents)?;
        sentences.formats = sentences
            .formats
            .into_iter()
            .map(|(id, fields)| (id.to_lowercase(), fields))
            .collect();
        Ok(sentences)
    }

    /// Write the catalogue to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CodecError> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Field layout for a sentence id, case insensitive
    pub fn format(&self, sentence: &str) -> Option<&[String]> {
        self.formats
            .get(&sentence.to_lowercase())
            .map(|fields| fields.as_slice())
    }

    /// Create a stateful handle using this catalogue
    pub fn make_handle(&self) -> Handle {
        Handle::new(self.clone())
    }
}

impl Default for Sentences {
    fn default() -> Self {
        let table: &[(&str, &[&str])] = &[
            ("hdm", &["heading_mag", "=M"]),
            ("hdt", &["heading_true", "=T"]),
            ("hdg", &["heading_mag", "deviation", "deviation_ew", "variation", "variation_ew"]),
            (
                "rmc",
                &[
                    "time", "status", "lat", "lat_ns", "long", "long_ew", "sog", "cog", "date",
                    "variation", "variation_ew", "mode",
                ],
            ),
            ("gll", &["lat", "lat_ns", "long", "long_ew", "time", "status", "mode"]),
            (
                "gga",
                &[
                    "time", "lat", "lat_ns", "long", "long_ew", "fix_quality", "satellites",
                    "hdop", "altitude", "=M", "geoid_sep", "=M", "dgps_age", "dgps_station",
                ],
            ),
            ("vtg", &["cog", "=T", "cog_mag", "=M", "sog", "=N", "sog_kmh", "=K", "mode"]),
            ("dpt", &["depth", "depth_offset"]),
            ("dbt", &["depth_feet", "=f", "depth_m", "=M", "depth_fathoms", "=F"]),
            ("mtw", &["water_temp", "=C"]),
            ("mwv", &["wind_angle", "wind_ref", "wind_speed", "wind_speed_units", "wind_status"]),
            ("vhw", &["heading_true", "=T", "heading_mag", "=M", "stw", "=N", "stw_kmh", "=K"]),
            ("zda", &["time", "day", "month", "year", "tz_h", "tz_m"]),
            (
                "apb",
                &[
                    "apb_status_1", "apb_status_2", "xte", "xte_dir", "xte_units",
                    "arrival_circle", "arrival_perp", "bearing_origin", "bearing_origin_ref",
                    "dest_id", "bearing_position", "bearing_position_ref", "heading_to_steer",
                    "heading_to_steer_ref", "mode",
                ],
            ),
            ("xte", &["xte_status_1", "xte_status_2", "xte", "xte_dir", "xte_units", "mode"]),
            ("rsa", &["rudder_stbd", "rudder_stbd_status", "rudder_port", "rudder_port_status"]),
        ];

        let formats = table
            .iter()
            .map(|(id, fields)| {
                (
                    id.to_string(),
                    fields.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect();

        Self { formats }
    }
}
