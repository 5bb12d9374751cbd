//! A small Rust client for the U.S. Census Bureau data API.
//!
//! This crate implements a `cenpy`-style flow:
//! connect to a dataset by identifier, build a query, get a table back.
//! Queries over more than 49 columns are split and merged, and wildcard
//! geography filters (`state:*`) are expanded level by level through the
//! dataset's geography hierarchy.
//!
//! ## Quick start
//! - Optionally configure a key via `CENSUSAPI_KEY` or a `.censusapirc` file
//!   (supported in the current directory and in your home directory).
//! - Call [`Client::query`] with a [`Query`].
//!
//! ```no_run
//! use censusapi::{Client, Query};
//!
//! fn main() -> censusapi::Result<()> {
//!     let client = Client::from_env("ACSDT5Y2019")?;
//!     let query = Query::new(["NAME", "B01001_001E"])
//!         .unit("county:*")?
//!         .within("state", "*");
//!     let table = client.query(&query)?;
//!     println!("{} counties", table.n_rows());
//!     Ok(())
//! }
//! ```
//!
//! Dataset discovery goes through [`Catalog`]:
//!
//! ```no_run
//! use censusapi::{Catalog, HttpTransport};
//!
//! # fn main() -> censusapi::Result<()> {
//! let catalog = Catalog::fetch(&HttpTransport::new(true)?, "https://api.census.gov/data.json")?;
//! for (id, title) in catalog.titles() {
//!     println!("{id}: {title}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod catalog;
mod chunk;
mod client;
mod config;
mod error;
mod geography;
mod metadata;
mod query;
mod table;
mod transport;
mod util;

pub use catalog::{Catalog, DatasetDescriptor, DatasetLinks};
pub use chunk::{COLUMN_LIMIT, chunk_columns, query_chunked};
pub use client::{Client, ClientConfig};
pub use error::{CensusError, Result};
pub use geography::{
    GeoLevel, GeographyCatalog, GeographySource, MAX_HIERARCHY_DEPTH, resolve,
};
pub use metadata::{DatasetMetadata, Variable};
pub use query::{GeoFilter, GeoUnit, GeoValue, Query, WILDCARD};
pub use table::{Column, ColumnValues, ResultTable, parse_response};
pub use transport::{HttpReply, HttpTransport, Transport};
