//! Query parameters and the request-string builder.
//!
//! A request looks like
//! `<base>?get=<c1,c2>&for=<level>:<value>&in=<p1>:<v1>+<p2>:<v2>&<k>=<v>&key=<key>`.

use std::fmt;
use std::str::FromStr;

use crate::error::{CensusError, Result};
use crate::util::{plus_spaces, query_separator};

/// Filter value meaning "every instance at this level".
pub const WILDCARD: &str = "*";

const RESERVED_PARAMS: [&str; 4] = ["get", "for", "in", "key"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeoValue {
    Exact(String),
    Wildcard,
}

impl GeoValue {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, GeoValue::Wildcard)
    }

    pub fn as_exact(&self) -> Option<&str> {
        match self {
            GeoValue::Exact(v) => Some(v),
            GeoValue::Wildcard => None,
        }
    }
}

impl From<&str> for GeoValue {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s == WILDCARD {
            GeoValue::Wildcard
        } else {
            GeoValue::Exact(s.to_string())
        }
    }
}

impl From<String> for GeoValue {
    fn from(s: String) -> Self {
        GeoValue::from(s.as_str())
    }
}

impl fmt::Display for GeoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoValue::Exact(v) => f.write_str(v),
            GeoValue::Wildcard => f.write_str(WILDCARD),
        }
    }
}

/// The level (and instance) whose rows a query returns, e.g. `county:*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoUnit {
    pub level: String,
    pub value: GeoValue,
}

impl GeoUnit {
    pub fn new(level: impl Into<String>, value: impl Into<GeoValue>) -> Self {
        Self {
            level: level.into(),
            value: value.into(),
        }
    }

    /// Parses `level:value`.
    pub fn parse(s: &str) -> Result<Self> {
        let (level, value) = s.split_once(':').ok_or_else(|| {
            CensusError::InvalidParameter(format!(
                "geographic unit {s:?} must look like level:value"
            ))
        })?;
        let unit = GeoUnit::new(level.trim(), value);
        unit.validate()?;
        Ok(unit)
    }

    fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(CensusError::InvalidParameter(
                "geographic unit has an empty level".into(),
            ));
        }
        if matches!(&self.value, GeoValue::Exact(v) if v.is_empty()) {
            return Err(CensusError::InvalidParameter(format!(
                "geographic unit {:?} has an empty value",
                self.level
            )));
        }
        Ok(())
    }
}

impl Default for GeoUnit {
    fn default() -> Self {
        GeoUnit::new("us", "00")
    }
}

impl FromStr for GeoUnit {
    type Err = CensusError;

    fn from_str(s: &str) -> Result<Self> {
        GeoUnit::parse(s)
    }
}

impl fmt::Display for GeoUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", plus_spaces(&self.level), self.value)
    }
}

/// Ancestor-level constraints, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoFilter {
    entries: Vec<(String, GeoValue)>,
}

impl GeoFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `level`, replacing an earlier value in place.
    pub fn set(&mut self, level: impl Into<String>, value: impl Into<GeoValue>) {
        let level = level.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(l, _)| *l == level) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((level, value)),
        }
    }

    pub fn with(mut self, level: impl Into<String>, value: impl Into<GeoValue>) -> Self {
        self.set(level, value);
        self
    }

    pub fn get(&self, level: &str) -> Option<&GeoValue> {
        self.entries
            .iter()
            .find(|(l, _)| l == level)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, level: &str) -> bool {
        self.get(level).is_some()
    }

    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GeoValue)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v))
    }

    pub fn has_wildcard(&self) -> bool {
        self.entries.iter().any(|(_, v)| v.is_wildcard())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K, V> FromIterator<(K, V)> for GeoFilter
where
    K: Into<String>,
    V: Into<GeoValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filter = GeoFilter::new();
        for (k, v) in iter {
            filter.set(k, v);
        }
        filter
    }
}

/// Everything needed to issue one logical query against a dataset.
///
/// ```
/// use censusapi::Query;
///
/// let q = Query::new(["NAME", "P001001"])
///     .unit("county:*")?
///     .within("state", "*");
/// assert!(q.geo_filter().has_wildcard());
/// # Ok::<(), censusapi::CensusError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    columns: Vec<String>,
    geo_unit: GeoUnit,
    geo_filter: GeoFilter,
    predicates: Vec<(String, String)>,
    key: Option<String>,
    infer: bool,
    id_scheme: String,
    geo_level_id: Option<String>,
    hierarchy: Option<Vec<String>>,
}

impl Query {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            geo_unit: GeoUnit::default(),
            geo_filter: GeoFilter::new(),
            predicates: Vec::new(),
            key: None,
            infer: true,
            id_scheme: "fips".to_string(),
            geo_level_id: None,
            hierarchy: None,
        }
    }

    /// Sets the geographic unit from `level:value`.
    pub fn unit(mut self, unit: &str) -> Result<Self> {
        self.geo_unit = GeoUnit::parse(unit)?;
        Ok(self)
    }

    pub fn with_unit(mut self, unit: GeoUnit) -> Self {
        self.geo_unit = unit;
        self
    }

    pub fn within(mut self, level: impl Into<String>, value: impl Into<GeoValue>) -> Self {
        self.geo_filter.set(level, value);
        self
    }

    pub fn with_filter(mut self, filter: GeoFilter) -> Self {
        self.geo_filter = filter;
        self
    }

    /// Adds a free-form predicate such as `time=2015`. The builder's own
    /// parameters (`get`, `for`, `in`, `key`) are rejected when the query runs.
    pub fn predicate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push((key.into(), value.into()));
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Whether requested columns are coerced to numbers. Defaults to `true`.
    pub fn infer(mut self, infer: bool) -> Self {
        self.infer = infer;
        self
    }

    /// Identifier scheme used for hierarchy lookup. Defaults to `fips`.
    pub fn id_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.id_scheme = scheme.into();
        self
    }

    /// Picks the hierarchy row by summary level instead of by unit and filter.
    pub fn geo_level_id(mut self, id: impl Into<String>) -> Self {
        self.geo_level_id = Some(id.into());
        self
    }

    /// Skips hierarchy lookup entirely.
    pub fn hierarchy<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hierarchy = Some(levels.into_iter().map(Into::into).collect());
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn geo_unit(&self) -> &GeoUnit {
        &self.geo_unit
    }

    pub fn geo_filter(&self) -> &GeoFilter {
        &self.geo_filter
    }

    pub fn predicates(&self) -> &[(String, String)] {
        &self.predicates
    }

    pub fn api_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn infers(&self) -> bool {
        self.infer
    }

    pub fn scheme(&self) -> &str {
        &self.id_scheme
    }

    pub fn level_id(&self) -> Option<&str> {
        self.geo_level_id.as_deref()
    }

    pub fn explicit_hierarchy(&self) -> Option<&[String]> {
        self.hierarchy.as_deref()
    }

    pub(crate) fn with_columns(&self, columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            ..self.clone()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(CensusError::InvalidParameter(
                "at least one column is required".into(),
            ));
        }
        if let Some(c) = self.columns.iter().find(|c| c.trim().is_empty()) {
            return Err(CensusError::InvalidParameter(format!(
                "column names must not be blank (got {c:?})"
            )));
        }
        self.geo_unit.validate()?;
        for (level, value) in self.geo_filter.iter() {
            if level.trim().is_empty() {
                return Err(CensusError::InvalidParameter(format!(
                    "geographic filter has a blank level ({level:?})"
                )));
            }
            if matches!(value, GeoValue::Exact(v) if v.trim().is_empty()) {
                return Err(CensusError::InvalidParameter(format!(
                    "geographic filter level {level:?} has a blank value"
                )));
            }
        }
        if let Some((k, _)) = self
            .predicates
            .iter()
            .find(|(k, _)| RESERVED_PARAMS.contains(&k.trim()))
        {
            return Err(CensusError::InvalidParameter(format!(
                "{k:?} is set by the query builder and cannot be a predicate"
            )));
        }
        Ok(())
    }

    /// Builds the request string against `base`. A key on the query wins over
    /// `default_key`; an empty key is omitted.
    pub fn to_url(&self, base: &str, default_key: Option<&str>) -> Result<String> {
        self.validate()?;

        let mut url = String::from(base);
        url.push_str(query_separator(base));
        url.push_str("get=");
        url.push_str(&self.columns.join(","));
        url.push_str("&for=");
        url.push_str(&self.geo_unit.to_string());

        if !self.geo_filter.is_empty() {
            let clauses: Vec<String> = self
                .geo_filter
                .iter()
                .map(|(level, value)| format!("{}:{}", plus_spaces(level), value))
                .collect();
            url.push_str("&in=");
            url.push_str(&clauses.join("+"));
        }

        for (k, v) in &self.predicates {
            url.push('&');
            url.push_str(k);
            url.push('=');
            url.push_str(v);
        }

        let key = self.key.as_deref().or(default_key).map(str::trim);
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            url.push_str("&key=");
            url.push_str(key);
        }

        Ok(url)
    }
}
