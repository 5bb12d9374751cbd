//! Geography hierarchy metadata and wildcard resolution.
//!
//! A query such as `for=county:*&in=state:*` cannot be sent as is. The
//! resolver finds the ancestor levels the unit requires, enumerates every
//! concrete value of each wildcarded ancestor top-down, and issues one leaf
//! query per combination, concatenating the rows.

use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};

use crate::error::{CensusError, Result};
use crate::query::{GeoFilter, GeoValue};
use crate::table::ResultTable;

/// Hierarchies longer than this are treated as corrupt metadata.
pub const MAX_HIERARCHY_DEPTH: usize = 16;

/// One row of a dataset's geography table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeoLevel {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "geoLevelId", alias = "geoLevelDisplay")]
    pub geo_level_id: Option<String>,
    /// Ancestor levels, outermost first. Empty for top-level geographies.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub requires: Vec<String>,
    /// Ancestors the server itself accepts as `*`. Kept for callers; the
    /// resolver enumerates every wildcarded ancestor regardless.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub wildcard: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Geography tables keyed by identifier scheme (`fips`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct GeographyCatalog {
    schemes: BTreeMap<String, Vec<GeoLevel>>,
}

impl GeographyCatalog {
    pub fn new(schemes: BTreeMap<String, Vec<GeoLevel>>) -> Self {
        Self { schemes }
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.schemes.keys().map(String::as_str)
    }

    pub fn levels(&self, scheme: &str) -> Option<&[GeoLevel]> {
        self.schemes.get(scheme).map(Vec::as_slice)
    }

    /// Finds the ancestor levels required to resolve `unit_level` under a
    /// filter naming `filter_levels`.
    ///
    /// With `geo_level_id` the row is picked by summary level. Otherwise the
    /// row must have `name == unit_level` and a `requires` set equal to the
    /// filter's level set. Anything but exactly one match is an error.
    pub fn find_hierarchy<'a, I>(
        &self,
        scheme: &str,
        unit_level: &str,
        filter_levels: I,
        geo_level_id: Option<&str>,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let rows = self.levels(scheme).ok_or_else(|| {
            CensusError::HierarchyResolution(format!(
                "no geography table for identifier scheme {scheme:?}"
            ))
        })?;

        let matches: Vec<&GeoLevel> = match geo_level_id {
            Some(id) => rows
                .iter()
                .filter(|r| r.geo_level_id.as_deref() == Some(id))
                .collect(),
            None => {
                let wanted: HashSet<&str> = filter_levels.into_iter().collect();
                rows.iter()
                    .filter(|r| r.name == unit_level)
                    .filter(|r| {
                        r.requires.iter().map(String::as_str).collect::<HashSet<_>>() == wanted
                    })
                    .collect()
            }
        };

        match matches.as_slice() {
            [row] => Ok(row.requires.clone()),
            [] => Err(CensusError::HierarchyResolution(format!(
                "no geographic hierarchy matches unit {unit_level:?} with the given filter"
            ))),
            many => Err(CensusError::HierarchyResolution(format!(
                "{} geographic hierarchies match unit {unit_level:?}; pass a geo level id to pick one",
                many.len()
            ))),
        }
    }
}

/// The two kinds of sub-query the resolver issues.
pub trait GeographySource {
    /// Concrete identifiers existing at `level` within `ancestors`.
    fn enumerate(&mut self, level: &str, ancestors: &GeoFilter) -> Result<Vec<String>>;

    /// The real query, run once per fully concrete filter.
    fn fetch(&mut self, filter: &GeoFilter) -> Result<ResultTable>;
}

/// Expands the wildcards in `filter` along `hierarchy` and concatenates the
/// leaf results row-wise.
///
/// Levels pinned in `filter` pass through unchanged. A hierarchy level absent
/// from `filter` is enumerated like a wildcard. Filter levels outside the
/// hierarchy are carried into every leaf query and must not be wildcards.
pub fn resolve<S>(hierarchy: &[String], filter: &GeoFilter, source: &mut S) -> Result<ResultTable>
where
    S: GeographySource + ?Sized,
{
    validate_hierarchy(hierarchy, filter)?;

    let mut walk = Walk {
        hierarchy,
        filter,
        source,
        result: ResultTable::new(),
    };
    walk.descend(0, GeoFilter::new())?;
    Ok(walk.result)
}

fn validate_hierarchy(hierarchy: &[String], filter: &GeoFilter) -> Result<()> {
    if hierarchy.len() > MAX_HIERARCHY_DEPTH {
        return Err(CensusError::HierarchyResolution(format!(
            "hierarchy of {} levels exceeds the limit of {MAX_HIERARCHY_DEPTH}",
            hierarchy.len()
        )));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = hierarchy.iter().find(|l| !seen.insert(l.as_str())) {
        return Err(CensusError::HierarchyResolution(format!(
            "level {dup:?} appears twice in hierarchy {hierarchy:?}"
        )));
    }

    if let Some((level, _)) = filter
        .iter()
        .find(|(level, value)| value.is_wildcard() && !hierarchy.iter().any(|h| h == level))
    {
        return Err(CensusError::HierarchyResolution(format!(
            "wildcard on {level:?}, which is not part of hierarchy {hierarchy:?}"
        )));
    }
    Ok(())
}

struct Walk<'a, S: ?Sized> {
    hierarchy: &'a [String],
    filter: &'a GeoFilter,
    source: &'a mut S,
    result: ResultTable,
}

impl<S: GeographySource + ?Sized> Walk<'_, S> {
    fn descend(&mut self, position: usize, resolved: GeoFilter) -> Result<()> {
        let (hierarchy, filter) = (self.hierarchy, self.filter);
        let Some(level) = hierarchy.get(position) else {
            return self.leaf(resolved);
        };

        let values = match filter.get(level) {
            Some(GeoValue::Exact(v)) => vec![v.clone()],
            Some(GeoValue::Wildcard) | None => {
                let values = self
                    .source
                    .enumerate(level, &resolved)
                    .map_err(|e| CensusError::partial(describe(level, &resolved), e))?;
                tracing::debug!(level = %level, count = values.len(), "enumerated geographies");
                values
            }
        };

        for value in values {
            self.descend(position + 1, resolved.clone().with(level.as_str(), value))?;
        }
        Ok(())
    }

    fn leaf(&mut self, mut resolved: GeoFilter) -> Result<()> {
        let filter = self.filter;
        for (level, value) in filter.iter() {
            if !resolved.contains(level) {
                resolved.set(level, value.clone());
            }
        }

        let context = describe("leaf", &resolved);
        let table = self
            .source
            .fetch(&resolved)
            .map_err(|e| CensusError::partial(&context, e))?;
        self.result
            .append_rows(table)
            .map_err(|e| CensusError::partial(&context, e))
    }
}

fn describe(what: &str, filter: &GeoFilter) -> String {
    if filter.is_empty() {
        return what.to_string();
    }
    let within: Vec<String> = filter.iter().map(|(l, v)| format!("{l}={v}")).collect();
    format!("{what} within {}", within.join(","))
}
