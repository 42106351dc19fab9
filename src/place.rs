use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type PlaceCode = u32;

/// A region with its own base map and upstream image series.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Place {
    /// Short key used in file names e.g. LEN
    pub id: String,
    pub name: String,
    /// Region code used by the upstream image servers
    pub code: PlaceCode,
}

impl Place {
    pub fn new(id: &str, name: &str, code: PlaceCode) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            code,
        }
    }

    pub fn defaults() -> Vec<Place> {
        vec![
            Place::new("LEN", "Leningrad", 5063),
            Place::new("KAR", "Karelia", 5023),
            Place::new("MUR", "Murmansk", 5069),
        ]
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Look up a place by id or by name, ignoring case.
pub fn find_place<'a>(places: &'a [Place], key: &str) -> Result<&'a Place> {
    places
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(key) || p.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| {
            let known: Vec<&str> = places.iter().map(|p| p.id.as_str()).collect();
            anyhow!("Unknown place {key}. Known places: {}", known.join(", "))
        })
}
