use indicatif::ProgressBar;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::{Catalog, DatasetDescriptor, DatasetLinks};
use crate::chunk::{COLUMN_LIMIT, query_chunked};
use crate::config::load_config;
use crate::error::{CensusError, Result};
use crate::geography::{GeographyCatalog, GeographySource, resolve};
use crate::metadata::{DatasetMetadata, Variable};
use crate::query::{GeoFilter, GeoUnit, Query};
use crate::table::{ColumnValues, ResultTable, parse_response};
use crate::transport::{HttpTransport, Transport};
use crate::util::spinner;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Metadata index URL, typically `https://api.census.gov/data.json`.
    pub url: String,
    /// API key appended to every query unless the query carries its own.
    pub key: Option<String>,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

/// A connection to one dataset of the Census data API.
///
/// Dataset metadata (variables, geography hierarchy, tags, examples) is
/// fetched once when the client is created.
pub struct Client<T = HttpTransport> {
    descriptor: DatasetDescriptor,
    metadata: DatasetMetadata,
    key: Option<String>,
    progress: bool,

    transport: T,
}

impl Client<HttpTransport> {
    /// Connects using environment variables and/or `.censusapirc`.
    ///
    /// This is equivalent to `Client::new(identifier, None, None, None)`.
    pub fn from_env(identifier: &str) -> Result<Self> {
        Self::new(identifier, None, None, None)
    }

    /// Connects to `identifier` using (in order of precedence):
    /// - explicit `url`/`key`/`verify` arguments
    /// - environment variables `CENSUSAPI_URL` / `CENSUSAPI_KEY`
    /// - config file from `CENSUSAPI_RC` or `.censusapirc`
    pub fn new(
        identifier: &str,
        url: Option<String>,
        key: Option<String>,
        verify: Option<bool>,
    ) -> Result<Self> {
        let cfg = load_config(url, key, verify)?;
        let transport = HttpTransport::new(cfg.verify)?;
        Self::with_transport(identifier, &cfg, transport)
    }
}

impl<T: Transport> Client<T> {
    /// Fetches the index at `cfg.url` through `transport` and connects to `identifier`.
    pub fn with_transport(identifier: &str, cfg: &ClientConfig, transport: T) -> Result<Self> {
        let catalog = Catalog::fetch(&transport, &cfg.url)?;
        let descriptor = catalog
            .get(identifier)
            .cloned()
            .ok_or_else(|| CensusError::UnknownDataset(identifier.to_string()))?;
        Self::from_descriptor(descriptor, cfg.key.clone(), transport)
    }

    /// Connects to an already resolved dataset.
    pub fn from_descriptor(
        descriptor: DatasetDescriptor,
        key: Option<String>,
        transport: T,
    ) -> Result<Self> {
        if descriptor.is_timeseries_eits() {
            return Err(CensusError::InvalidParameter(format!(
                "{} is an economic indicators time series, which is not supported",
                descriptor.identifier
            )));
        }

        let metadata = DatasetMetadata::load(&transport, &descriptor.links)?;
        tracing::info!(identifier = %descriptor.identifier, "connected to {}", descriptor.title);

        Ok(Self {
            descriptor,
            metadata,
            key,
            progress: false,
            transport,
        })
    }

    /// Shows a spinner on stderr during chunked and hierarchical queries.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.descriptor.identifier
    }

    pub fn title(&self) -> &str {
        &self.descriptor.title
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn contact(&self) -> Option<&str> {
        self.descriptor.contact.as_deref()
    }

    pub fn access_url(&self) -> &str {
        &self.descriptor.access_url
    }

    pub fn links(&self) -> &DatasetLinks {
        &self.descriptor.links
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    pub fn variables(&self) -> &BTreeMap<String, Variable> {
        &self.metadata.variables
    }

    pub fn geographies(&self) -> &GeographyCatalog {
        &self.metadata.geographies
    }

    pub fn tags(&self) -> &[String] {
        &self.metadata.tags
    }

    pub fn examples(&self) -> Option<&Value> {
        self.metadata.examples.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The request string a single, unchunked `query` would send.
    pub fn build_url(&self, query: &Query) -> Result<String> {
        query.to_url(&self.descriptor.access_url, self.key.as_deref())
    }

    /// Runs `query`.
    ///
    /// Wildcards in the geographic filter are expanded through the dataset's
    /// geography hierarchy. More than 49 columns are split across several
    /// requests and merged. Either way the whole query succeeds or fails.
    pub fn query(&self, query: &Query) -> Result<ResultTable> {
        query.validate()?;

        if !query.geo_filter().has_wildcard() {
            return self.query_concrete(query, query.infers());
        }

        let hierarchy = match query.explicit_hierarchy() {
            Some(h) => h.to_vec(),
            None => self.metadata.geographies.find_hierarchy(
                query.scheme(),
                &query.geo_unit().level,
                query.geo_filter().levels(),
                query.level_id(),
            )?,
        };
        tracing::info!(unit = %query.geo_unit(), ?hierarchy, "resolving wildcard geography");

        let mut source = ClientGeography {
            client: self,
            query,
            progress: spinner(self.progress, "resolving geographies"),
        };
        let resolved = resolve(&hierarchy, query.geo_filter(), &mut source);
        if let Some(pb) = &source.progress {
            pb.finish_and_clear();
        }
        let mut table = resolved?;

        if query.infers() {
            table.infer_numeric(query.columns());
        }
        Ok(table)
    }

    fn query_concrete(&self, query: &Query, infer: bool) -> Result<ResultTable> {
        let columns = query.columns();
        let pb = spinner(
            self.progress && columns.len() > COLUMN_LIMIT,
            "querying column chunks",
        );

        let table = query_chunked(columns, |chunk| {
            let table = self.fetch_table(&query.with_columns(chunk), infer);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            table
        });

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        table
    }

    fn fetch_table(&self, query: &Query, infer: bool) -> Result<ResultTable> {
        let url = self.build_url(query)?;
        tracing::debug!(%url, "query");
        let reply = self.transport.get(&url)?;
        parse_response(&reply, &url, query.columns(), infer)
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("identifier", &self.descriptor.identifier)
            .field("access_url", &self.descriptor.access_url)
            .field("has_key", &self.key.is_some())
            .finish()
    }
}

impl<T> fmt::Display for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection to {} (ID: {})",
            self.descriptor.title, self.descriptor.identifier
        )
    }
}

/// Sub-queries of a wildcard query, issued through the owning client.
struct ClientGeography<'a, T> {
    client: &'a Client<T>,
    query: &'a Query,
    progress: Option<ProgressBar>,
}

impl<T: Transport> GeographySource for ClientGeography<'_, T> {
    fn enumerate(&mut self, level: &str, ancestors: &GeoFilter) -> Result<Vec<String>> {
        let mut lookup = Query::new(["NAME"])
            .with_unit(GeoUnit::new(level, "*"))
            .with_filter(ancestors.clone())
            .infer(false);
        if let Some(key) = self.query.api_key() {
            lookup = lookup.key(key);
        }

        let table = self.client.fetch_table(&lookup, false)?;
        match table.column(level) {
            Some(ColumnValues::Text(values)) => Ok(values.iter().flatten().cloned().collect()),
            Some(_) => Err(CensusError::Schema(format!(
                "column {level:?} is not a list of identifiers"
            ))),
            None if table.n_columns() == 0 => Ok(Vec::new()),
            None => Err(CensusError::Schema(format!(
                "enumerating {level:?} returned no {level:?} column"
            ))),
        }
    }

    fn fetch(&mut self, filter: &GeoFilter) -> Result<ResultTable> {
        let leaf = self.query.clone().with_filter(filter.clone());
        let table = self.client.query_concrete(&leaf, false)?;
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        Ok(table)
    }
}
