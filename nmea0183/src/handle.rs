use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::checksum;
use crate::error::CodecError;
use crate::sentences::{LITERAL_MARKER, Sentences};

/// Key under which parsed date and time are combined, prefixed by the tag
pub const DATETIME_KEY: &str = "datetime";

struct Entry {
    value: String,
    updated: Instant,
}

/// Stateful codec handle
///
/// Holds the last known value of every variable seen in parsed sentences.
/// Keys are the catalogue variable names prefixed with the origin tag of the
/// source, so `cp_heading_mag` and `esp_heading_mag` can coexist.
pub struct Handle {
    sentences: Sentences,
    store: HashMap<String, Entry>,
    max_age: Option<Duration>,
    keep_timestamp: bool,
}

impl Handle {
    pub fn new(sentences: Sentences) -> Self {
        Self {
            sentences,
            store: HashMap::new(),
            max_age: None,
            keep_timestamp: false,
        }
    }

    /// Configure retention
    ///
    /// Values older than `max_age` are treated as absent and removed on the
    /// next snapshot. With `keep_timestamp` every snapshot carries a
    /// `timestamp` key holding the UTC time it was taken.
    pub fn preferences(&mut self, max_age: Duration, keep_timestamp: bool) {
        self.max_age = Some(max_age);
        self.keep_timestamp = keep_timestamp;
    }

    /// Parse a `$` sentence into the store under `tag`
    ///
    /// Returns the lower-case sentence id on success.
    pub fn parse(&mut self, sentence: &str, tag: &str) -> Result<String, CodecError> {
        let sentence = sentence.trim();
        let Some(rest) = sentence.strip_prefix('$') else {
            return Err(CodecError::Malformed(format!("no leading $ in <{}>", sentence)));
        };

        let body = match rest.split_once('*') {
            Some((body, sum)) => {
                let sum = sum.trim();
                let expected = u8::from_str_radix(sum.get(..2).unwrap_or(sum), 16)
                    .map_err(|_| CodecError::Malformed(format!("bad checksum field <{}>", sum)))?;
                let actual = checksum(body);
                if expected != actual {
                    return Err(CodecError::Checksum { expected, actual });
                }
                body
            }
            None => rest,
        };

        let mut fields = body.split(',');
        let address = fields.next().unwrap_or_default();
        let id = sentence_id(address)?;
        let format = self
            .sentences
            .format(&id)
            .ok_or_else(|| CodecError::UnknownSentence(id.clone()))?
            .to_vec();

        let now = Instant::now();
        for (variable, value) in format.iter().zip(fields) {
            if variable.starts_with(LITERAL_MARKER) || value.is_empty() {
                continue;
            }
            self.store.insert(
                format!("{}{}", tag, variable),
                Entry {
                    value: value.to_string(),
                    updated: now,
                },
            );
        }

        if let Some(datetime) = self.derive_datetime(&id, tag) {
            self.store.insert(
                format!("{}{}", tag, DATETIME_KEY),
                Entry {
                    value: datetime,
                    updated: now,
                },
            );
        }

        debug!("Parsed {} with tag <{}>", id, tag);
        Ok(id)
    }

    /// Build a sentence from stored values
    ///
    /// Produces `$<prefix><ID>,<fields>*<checksum>` using the variables
    /// stored under `tag`. Fails with [`CodecError::NoData`] when none of the
    /// sentence's variables are present for that tag.
    pub fn write(&self, sentence: &str, prefix: &str, tag: &str) -> Result<String, CodecError> {
        let format = self
            .sentences
            .format(sentence)
            .ok_or_else(|| CodecError::UnknownSentence(sentence.to_string()))?;

        let mut found = false;
        let fields: Vec<&str> = format
            .iter()
            .map(|variable| match variable.strip_prefix(LITERAL_MARKER) {
                Some(literal) => literal,
                None => match self.get(&format!("{}{}", tag, variable)) {
                    Some(value) => {
                        found = true;
                        value
                    }
                    None => "",
                },
            })
            .collect();

        if !found {
            return Err(CodecError::NoData {
                sentence: sentence.to_string(),
                tag: tag.to_string(),
            });
        }

        let body = format!("{}{},{}", prefix, sentence.to_uppercase(), fields.join(","));
        Ok(format!("${}*{:02X}", body, checksum(&body)))
    }

    /// Current value of a fully qualified key, ignoring expired entries
    pub fn get(&self, key: &str) -> Option<&str> {
        let entry = self.store.get(key)?;
        if self.is_expired(entry, Instant::now()) {
            return None;
        }
        Some(entry.value.as_str())
    }

    /// Sorted snapshot of every live value
    pub fn get_map(&mut self) -> BTreeMap<String, String> {
        let now = Instant::now();
        if let Some(max_age) = self.max_age {
            self.store
                .retain(|_, entry| now.saturating_duration_since(entry.updated) <= max_age);
        }

        let mut map: BTreeMap<String, String> = self
            .store
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect();

        if self.keep_timestamp {
            map.insert(
                "timestamp".to_string(),
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            );
        }
        map
    }

    /// Merge externally supplied values into the store
    pub fn update<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let now = Instant::now();
        for (key, value) in values {
            self.store.insert(
                key.into(),
                Entry {
                    value: value.into(),
                    updated: now,
                },
            );
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.max_age
            .is_some_and(|max_age| now.saturating_duration_since(entry.updated) > max_age)
    }

    fn tagged(&self, tag: &str, name: &str) -> Option<&str> {
        self.get(&format!("{}{}", tag, name))
    }

    fn derive_datetime(&self, id: &str, tag: &str) -> Option<String> {
        let date = match id {
            "rmc" => {
                let date = self.tagged(tag, "date")?;
                if date.len() != 6 {
                    return None;
                }
                let day = date.get(0..2)?.parse().ok()?;
                let month = date.get(2..4)?.parse().ok()?;
                let year: i32 = date.get(4..6)?.parse().ok()?;
                let century = if year < 80 { 2000 } else { 1900 };
                NaiveDate::from_ymd_opt(century + year, month, day)?
            }
            "zda" => NaiveDate::from_ymd_opt(
                self.tagged(tag, "year")?.parse().ok()?,
                self.tagged(tag, "month")?.parse().ok()?,
                self.tagged(tag, "day")?.parse().ok()?,
            )?,
            _ => return None,
        };

        let time = parse_time(self.tagged(tag, "time")?)?;
        Some(
            NaiveDateTime::new(date, time)
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
        )
    }
}

fn parse_time(time: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H%M%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H%M%S"))
        .ok()
}

/// Sentence id from the address field
///
/// `GPRMC` -> `rmc`; proprietary addresses (`PGRME`) keep the whole address.
fn sentence_id(address: &str) -> Result<String, CodecError> {
    if address.starts_with('P') && address.len() > 1 {
        return Ok(address.to_lowercase());
    }
    match address.get(2..) {
        Some(id) if address.len() >= 5 && address.is_ascii() => Ok(id.to_lowercase()),
        _ => Err(CodecError::Malformed(format!("bad address <{}>", address))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_checksum(body: &str) -> String {
        format!("${}*{:02X}", body, checksum(body))
    }

    #[test]
    fn test_parse_stores_tagged_fields() {
        let mut handle = Sentences::default().make_handle();
        let id = handle.parse(&with_checksum("HCHDM,238.5,M"), "cp_").unwrap();
        assert_eq!(id, "hdm");
        assert_eq!(handle.get("cp_heading_mag"), Some("238.5"));
        assert_eq!(handle.get("heading_mag"), None);
    }

    #[test]
    fn test_parse_without_checksum() {
        let mut handle = Sentences::default().make_handle();
        handle.parse("$SDDPT,12.3,0.5", "").unwrap();
        assert_eq!(handle.get("depth"), Some("12.3"));
        assert_eq!(handle.get("depth_offset"), Some("0.5"));
    }

    #[test]
    fn test_parse_bad_checksum() {
        let mut handle = Sentences::default().make_handle();
        let result = handle.parse("$HCHDM,238.5,M*00", "");
        assert!(matches!(result, Err(CodecError::Checksum { expected: 0, actual: 0x25 })));
    }

    #[test]
    fn test_parse_unknown_and_malformed() {
        let mut handle = Sentences::default().make_handle();
        assert!(matches!(
            handle.parse("$GPXYZ,1,2", ""),
            Err(CodecError::UnknownSentence(_))
        ));
        assert!(matches!(handle.parse("GPHDM,1,M", ""), Err(CodecError::Malformed(_))));
        assert!(matches!(handle.parse("$GP,1,M", ""), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_write_uses_prefix_and_tag() {
        let mut handle = Sentences::default().make_handle();
        handle.parse("$HCHDM,238.5,M", "cp_").unwrap();
        let sentence = handle.write("hdm", "HF", "cp_").unwrap();
        assert_eq!(sentence, with_checksum("HFHDM,238.5,M"));
    }

    #[test]
    fn test_write_no_data_for_tag() {
        let mut handle = Sentences::default().make_handle();
        handle.parse("$HCHDM,238.5,M", "cp_").unwrap();
        let result = handle.write("hdm", "HF", "esp_");
        assert!(matches!(result, Err(CodecError::NoData { .. })));
    }

    #[test]
    fn test_rmc_derives_datetime() {
        let mut handle = Sentences::default().make_handle();
        handle
            .parse(
                "$GPRMC,225446.00,A,4916.45,N,12311.12,W,000.5,054.7,191194,020.3,E",
                "gm_",
            )
            .unwrap();
        assert_eq!(handle.get("gm_datetime"), Some("1994-11-19T22:54:46"));
    }

    #[test]
    fn test_zda_derives_datetime() {
        let mut handle = Sentences::default().make_handle();
        handle.parse("$GPZDA,201530.00,04,07,2002,00,00", "").unwrap();
        assert_eq!(handle.get("datetime"), Some("2002-07-04T20:15:30"));
    }

    #[test]
    fn test_update_and_snapshot() {
        let mut handle = Sentences::default().make_handle();
        handle.update([("esp_auto", "1"), ("esp_compass_status", "3333")]);
        let map = handle.get_map();
        assert_eq!(map.get("esp_auto").map(String::as_str), Some("1"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_expired_values_are_dropped() {
        let mut handle = Sentences::default().make_handle();
        handle.preferences(Duration::from_millis(20), false);
        handle.update([("depth", "5.0")]);
        assert_eq!(handle.get("depth"), Some("5.0"));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(handle.get("depth"), None);
        assert!(handle.get_map().is_empty());
    }

    #[test]
    fn test_snapshot_timestamp() {
        let mut handle = Sentences::default().make_handle();
        handle.preferences(Duration::from_secs(60), true);
        assert!(handle.get_map().contains_key("timestamp"));
    }
}
