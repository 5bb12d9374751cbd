use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{CensusError, Result};
use crate::transport::{Transport, fetch_json};
use crate::util::last_path_segment;

/// Links a dataset publishes to its own metadata documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetLinks {
    pub documentation: Option<String>,
    pub variables: Option<String>,
    pub geography: Option<String>,
    pub tags: Option<String>,
    pub examples: Option<String>,
    pub groups: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub identifier: String,
    pub title: String,
    pub description: String,
    pub contact: Option<String>,
    /// Tabular endpoint queries are sent to.
    pub access_url: String,
    pub vintage: Option<String>,
    pub dataset: Vec<String>,
    pub keywords: Vec<String>,
    pub links: DatasetLinks,
}

impl DatasetDescriptor {
    /// Economic-indicator time series use a different query protocol.
    pub fn is_timeseries_eits(&self) -> bool {
        self.identifier.contains("eits") || self.dataset.iter().any(|d| d == "eits")
    }
}

// Both the DCAT index (`{"dataset": [...]}`) and the older bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIndex {
    Dcat { dataset: Vec<RawDataset> },
    Legacy(Vec<RawDataset>),
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    identifier: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "contactPoint")]
    contact_point: Option<RawContact>,
    #[serde(default)]
    mbox: Option<String>,
    #[serde(default, rename = "webService")]
    web_service: Option<String>,
    #[serde(default)]
    distribution: Vec<RawDistribution>,
    #[serde(default)]
    c_vintage: Option<Value>,
    #[serde(default)]
    c_dataset: Vec<String>,
    #[serde(default)]
    keyword: Vec<String>,
    #[serde(default, rename = "c_documentationLink")]
    documentation: Option<String>,
    #[serde(default, rename = "c_variablesLink")]
    variables: Option<String>,
    #[serde(default, rename = "c_geographyLink")]
    geography: Option<String>,
    #[serde(default, rename = "c_tagsLink")]
    tags: Option<String>,
    #[serde(default, rename = "c_examplesLink")]
    examples: Option<String>,
    #[serde(default, rename = "c_groupsLink")]
    groups: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContact {
    #[serde(default, rename = "hasEmail")]
    has_email: Option<String>,
    #[serde(default, rename = "fn")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDistribution {
    #[serde(default, rename = "accessURL")]
    access_url: Option<String>,
}

impl RawDataset {
    fn into_descriptor(self) -> Option<DatasetDescriptor> {
        let access_url = self
            .distribution
            .iter()
            .find_map(|d| d.access_url.clone())
            .or(self.web_service)?;

        let contact = self
            .contact_point
            .and_then(|c| c.has_email.or(c.name))
            .or(self.mbox)
            .map(|c| c.trim_start_matches("mailto:").to_string());

        let vintage = self.c_vintage.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        });

        Some(DatasetDescriptor {
            identifier: self.identifier,
            title: self.title,
            description: self.description,
            contact,
            access_url,
            vintage,
            dataset: self.c_dataset,
            keywords: self.keyword,
            links: DatasetLinks {
                documentation: self.documentation,
                variables: self.variables,
                geography: self.geography,
                tags: self.tags,
                examples: self.examples,
                groups: self.groups,
            },
        })
    }
}

/// Every dataset listed by the metadata index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    datasets: BTreeMap<String, DatasetDescriptor>,
}

impl Catalog {
    pub fn fetch<T: Transport + ?Sized>(transport: &T, url: &str) -> Result<Self> {
        let raw: RawIndex = fetch_json(transport, url)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawIndex =
            serde_json::from_str(text).map_err(|e| CensusError::decode("data.json", e))?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawIndex) -> Self {
        let entries = match raw {
            RawIndex::Dcat { dataset } => dataset,
            RawIndex::Legacy(entries) => entries,
        };

        let mut datasets = BTreeMap::new();
        for entry in entries {
            let id = entry.identifier.clone();
            match entry.into_descriptor() {
                Some(d) => {
                    datasets.insert(id, d);
                }
                None => tracing::warn!(identifier = %id, "skipping dataset without an access URL"),
            }
        }
        Self { datasets }
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Looks a dataset up by full identifier or by its last path segment
    /// (`ACSDT5Y2019` for `https://api.census.gov/data/id/ACSDT5Y2019`).
    pub fn get(&self, identifier: &str) -> Option<&DatasetDescriptor> {
        self.datasets.get(identifier).or_else(|| {
            self.datasets
                .values()
                .find(|d| last_path_segment(&d.identifier) == identifier)
        })
    }

    /// Identifiers the client can connect to.
    pub fn available(&self) -> Vec<&str> {
        self.datasets
            .values()
            .filter(|d| !d.is_timeseries_eits())
            .map(|d| d.identifier.as_str())
            .collect()
    }

    /// Identifier → title, for the same datasets as [`Catalog::available`].
    pub fn titles(&self) -> BTreeMap<&str, &str> {
        self.datasets
            .values()
            .filter(|d| !d.is_timeseries_eits())
            .map(|d| (d.identifier.as_str(), d.title.as_str()))
            .collect()
    }

    /// Title and description of a dataset.
    pub fn explain(&self, identifier: &str) -> Result<(&str, &str)> {
        self.get(identifier)
            .map(|d| (d.title.as_str(), d.description.as_str()))
            .ok_or_else(|| CensusError::UnknownDataset(identifier.to_string()))
    }
}
