//! Discovery-time filtering of candidate devices.

use crate::infrastructure::bluetooth::protocol;

/// Pure predicate applied to every discovery before it reaches the registry.
///
/// Name matching is a case-insensitive substring test against a keyword
/// allow-list; the RSSI floor is inclusive, so a device exactly at the floor
/// is accepted.
#[derive(Debug, Clone)]
pub struct DeviceFilter {
    keywords: Vec<String>,
    rssi_floor: i16,
}

impl DeviceFilter {
    pub fn new<I, S>(keywords: I, rssi_floor: i16) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
            rssi_floor,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.keywords.iter().any(|k| name.contains(k))
    }

    pub fn accepts_rssi(&self, rssi: i16) -> bool {
        rssi >= self.rssi_floor
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(protocol::DEFAULT_NAME_KEYWORDS, protocol::RSSI_FLOOR_DBM)
    }
}
