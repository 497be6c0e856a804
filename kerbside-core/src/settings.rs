//! Immutable run configuration shared by the importers.
//!
//! Settings are deserialised once (the CLI reads a TOML file) and handed to
//! each component by reference. Components never consult environment state of
//! their own accord.

use std::fmt;

use camino::Utf8PathBuf;
use serde::Deserialize;

/// Ordered, immutable sequence of upstream query-service addresses.
///
/// Endpoints are consulted strictly in order; the position of an entry is a
/// failover priority, not an arbitrary collection order.
///
/// # Examples
/// ```
/// use kerbside_core::EndpointList;
///
/// let endpoints = EndpointList::from(vec![
///     "https://overpass-api.de/api/interpreter".to_owned(),
/// ]);
/// assert_eq!(endpoints.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct EndpointList(Vec<String>);

impl EndpointList {
    /// Number of configured endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Report whether no endpoints are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the endpoints in failover order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for EndpointList {
    fn from(endpoints: Vec<String>) -> Self {
        Self(endpoints)
    }
}

impl<'a> IntoIterator for &'a EndpointList {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().map(String::as_str)
    }
}

/// Geographic bounding box in the upstream query service's
/// `south,west,north,east` notation.
///
/// The value is kept verbatim: it is spliced into a fixed query template and
/// never interpreted locally.
///
/// # Examples
/// ```
/// use kerbside_core::BoundingBox;
///
/// let bbox = BoundingBox::new("48.19,16.35,48.23,16.42");
/// assert_eq!(bbox.as_ref(), "48.19,16.35,48.23,16.42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct BoundingBox(String);

impl BoundingBox {
    /// Construct a bounding box from an owned or borrowed string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Consume the wrapper and return the inner [`String`].
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for BoundingBox {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for BoundingBox {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable configuration consumed by both importers.
///
/// # Examples
/// ```
/// use kerbside_core::GlobalSettings;
///
/// let settings: GlobalSettings = toml::from_str(
///     r#"
///     data_directory = "/var/lib/kerbside"
///     target_srid = 32633
///     "#,
/// )
/// .expect("settings parse");
/// assert_eq!(settings.target_srid, 32633);
/// assert!(!settings.overpass_endpoints.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GlobalSettings {
    /// Directory holding source archives, downloads and derived artifacts.
    pub data_directory: Utf8PathBuf,
    /// SRID that thematic dataset geometries are reprojected into.
    pub target_srid: u32,
    /// File name used for bounding-box downloads inside `data_directory`.
    #[serde(default = "default_osm_download_filename")]
    pub osm_download_filename: String,
    /// Upstream query-service endpoints in failover order.
    #[serde(default = "default_overpass_endpoints")]
    pub overpass_endpoints: EndpointList,
    /// Column style file handed to the OSM bulk loader.
    #[serde(default = "default_osm_style_path")]
    pub osm_style_path: Utf8PathBuf,
}

impl GlobalSettings {
    /// Resolve a file name relative to the data directory.
    #[must_use]
    pub fn data_path(&self, file_name: &str) -> Utf8PathBuf {
        self.data_directory.join(file_name)
    }
}

fn default_osm_download_filename() -> String {
    "osm_download.osm".to_owned()
}

fn default_osm_style_path() -> Utf8PathBuf {
    Utf8PathBuf::from("resources/default.style")
}

fn default_overpass_endpoints() -> EndpointList {
    EndpointList(vec![
        "https://overpass-api.de/api/interpreter".to_owned(),
        "https://overpass.kumi.systems/api/interpreter".to_owned(),
        "https://overpass.osm.ch/api/interpreter".to_owned(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn settings_from(toml: &str) -> GlobalSettings {
        toml::from_str(toml).expect("settings should parse")
    }

    #[rstest]
    fn defaults_fill_optional_fields() {
        let settings = settings_from(
            r#"
            data_directory = "/data"
            target_srid = 32633
            "#,
        );
        assert_eq!(settings.osm_download_filename, "osm_download.osm");
        assert_eq!(settings.overpass_endpoints.len(), 3);
        assert_eq!(
            settings.osm_style_path,
            Utf8PathBuf::from("resources/default.style")
        );
    }

    #[rstest]
    fn explicit_endpoints_preserve_order() {
        let settings = settings_from(
            r#"
            data_directory = "/data"
            target_srid = 31256
            overpass_endpoints = ["https://b.example/api", "https://a.example/api"]
            "#,
        );
        let endpoints: Vec<&str> = settings.overpass_endpoints.iter().collect();
        assert_eq!(endpoints, ["https://b.example/api", "https://a.example/api"]);
    }

    #[rstest]
    fn data_path_joins_below_data_directory() {
        let settings = settings_from(
            r#"
            data_directory = "/var/lib/kerbside"
            target_srid = 32633
            "#,
        );
        assert_eq!(
            settings.data_path("ogd_gip.zip"),
            Utf8PathBuf::from("/var/lib/kerbside/ogd_gip.zip")
        );
    }
}
