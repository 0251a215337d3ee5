//! Geolocation module for annotating exit IPs using a GeoLite2-City MMDB

use crate::error::HarvestError;
use crate::Result;
use maxminddb::{geoip2, Reader};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Marker written for a missing field
const NULL_MARKER: &str = "None";

/// Coarse location of an IP address; every field may be missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GeoRecord {
    /// Country name in English, or the continent name when there is no country
    pub country: Option<String>,
    /// First subdivision name in English
    pub region: Option<String>,
    /// City name in English
    pub city: Option<String>,
}

impl GeoRecord {
    pub fn new(country: Option<String>, region: Option<String>, city: Option<String>) -> Self {
        Self {
            country,
            region,
            city,
        }
    }

    /// Check if the record has any meaningful data
    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.region.is_none() && self.city.is_none()
    }

    /// `host:port` followed by `::country::region::city`
    pub fn annotate(&self, address: &str) -> String {
        format!("{}{}", address, self)
    }
}

impl fmt::Display for GeoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in [&self.country, &self.region, &self.city] {
            write!(f, "::{}", field.as_deref().unwrap_or(NULL_MARKER))?;
        }
        Ok(())
    }
}

/// Point lookups of exit IPs
pub trait GeoLookup: Send + Sync {
    /// Location for `ip`, or `None` when the database knows nothing about it
    fn lookup(&self, ip: &str) -> Option<GeoRecord>;

    /// Like `lookup`, but an unknown IP becomes an all-null record
    fn locate(&self, ip: &str) -> GeoRecord {
        self.lookup(ip).unwrap_or_default()
    }
}

/// GeoLocator for looking up IP addresses in MMDB databases
#[derive(Clone)]
pub struct GeoLocator {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoLocator {
    /// Open an MMDB file; the handle is released when the locator is dropped
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path).map_err(|source| HarvestError::GeoDatabase {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Look up the geolocation for an IpAddr
    pub fn lookup_ip(
        &self,
        ip: IpAddr,
    ) -> std::result::Result<Option<GeoRecord>, maxminddb::MaxMindDbError> {
        let city: Option<geoip2::City> = self.reader.lookup(ip)?.decode()?;
        Ok(city.map(GeoRecord::from))
    }
}

impl From<geoip2::City<'_>> for GeoRecord {
    /// English names only; the continent stands in for a missing country
    fn from(city: geoip2::City<'_>) -> Self {
        let country = city
            .country
            .names
            .english
            .or(city.continent.names.english)
            .map(String::from);
        let region = city
            .subdivisions
            .first()
            .and_then(|subdivision| subdivision.names.english)
            .map(String::from);
        let city_name = city.city.names.english.map(String::from);

        GeoRecord::new(country, region, city_name)
    }
}

impl GeoLookup for GeoLocator {
    fn lookup(&self, ip: &str) -> Option<GeoRecord> {
        let ip: IpAddr = ip.parse().ok()?;
        match self.lookup_ip(ip) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(%ip, "geolocation lookup failed: {}", e);
                None
            }
        }
    }
}
