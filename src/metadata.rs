use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::catalog::DatasetLinks;
use crate::error::Result;
use crate::geography::GeographyCatalog;
use crate::transport::{Transport, fetch_json};

/// One entry of `variables.json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub concept: Option<String>,
    #[serde(default)]
    pub predicate_type: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub limit: Option<Value>,
    #[serde(default)]
    pub predicate_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct VariablesDocument {
    #[serde(default)]
    variables: BTreeMap<String, Variable>,
}

#[derive(Debug, Deserialize)]
struct TagsDocument {
    #[serde(default)]
    tags: Vec<String>,
}

/// Metadata loaded once per connection and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DatasetMetadata {
    pub variables: BTreeMap<String, Variable>,
    pub geographies: GeographyCatalog,
    pub tags: Vec<String>,
    pub examples: Option<Value>,
}

impl DatasetMetadata {
    /// Fetches every linked document present in `links`.
    pub fn load<T: Transport + ?Sized>(transport: &T, links: &DatasetLinks) -> Result<Self> {
        let mut meta = DatasetMetadata::default();

        if let Some(url) = &links.variables {
            let doc: VariablesDocument = fetch_json(transport, url)?;
            meta.variables = doc.variables;
        }
        if let Some(url) = &links.geography {
            meta.geographies = fetch_json(transport, url)?;
        }
        if let Some(url) = &links.tags {
            let doc: TagsDocument = fetch_json(transport, url)?;
            meta.tags = doc.tags;
        }
        if let Some(url) = &links.examples {
            meta.examples = Some(fetch_json(transport, url)?);
        }

        tracing::debug!(
            variables = meta.variables.len(),
            tags = meta.tags.len(),
            "loaded dataset metadata"
        );
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CensusError;
    use crate::transport::HttpReply;
    use std::cell::RefCell;

    struct Docs(RefCell<Vec<String>>);

    impl Transport for Docs {
        fn get(&self, url: &str) -> Result<HttpReply> {
            self.0.borrow_mut().push(url.to_string());
            let body = match url {
                "v" => r#"{"variables":{"P001001":{"label":"Total","concept":"POPULATION","predicateType":"int","group":"P1","limit":0},
                           "for":{"label":"Census API FIPS 'for' clause","concept":"Census API Geography Specification","predicateType":"fips-for","group":"N/A","limit":0,"predicateOnly":true}}}"#,
                "g" => r#"{"default":[{"isDefault":"true"}],"fips":[{"name":"state","geoLevelDisplay":"040"},{"name":"county","geoLevelDisplay":"050","requires":["state"]}]}"#,
                "t" => r#"{"tags":["population","housing"]}"#,
                _ => return Ok(HttpReply::new(404, "not found")),
            };
            Ok(HttpReply::ok(body))
        }
    }

    #[test]
    fn loads_only_present_links() {
        let docs = Docs(RefCell::new(Vec::new()));
        let links = DatasetLinks {
            variables: Some("v".into()),
            geography: Some("g".into()),
            tags: Some("t".into()),
            ..DatasetLinks::default()
        };
        let meta = DatasetMetadata::load(&docs, &links).unwrap();

        assert_eq!(docs.0.borrow().as_slice(), ["v", "g", "t"]);
        assert_eq!(meta.variables["P001001"].label, "Total");
        assert_eq!(meta.variables["for"].predicate_only, Some(true));
        assert_eq!(meta.tags, ["population", "housing"]);
        assert_eq!(
            meta.geographies.find_hierarchy("fips", "county", ["state"], None).unwrap(),
            ["state"]
        );
        assert!(meta.examples.is_none());
    }

    #[test]
    fn missing_document_is_an_error() {
        let docs = Docs(RefCell::new(Vec::new()));
        let links = DatasetLinks {
            examples: Some("x".into()),
            ..DatasetLinks::default()
        };
        assert!(matches!(
            DatasetMetadata::load(&docs, &links),
            Err(CensusError::MalformedQuery { status: 404, .. })
        ));
    }
}
