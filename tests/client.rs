//! End-to-end behaviour of `Client` against an in-memory Census API.

use censusapi::{
    CensusError, Client, ClientConfig, ColumnValues, HttpReply, Query, Result, Transport,
};
use std::cell::RefCell;
use std::collections::HashMap;

const INDEX_URL: &str = "https://fake.census.test/data.json";
const BASE: &str = "https://fake.census.test/data/2019/acs/acs5";

const INDEX: &str = r#"{"dataset":[{
    "identifier": "https://fake.census.test/data/id/ACSDT5Y2019",
    "title": "ACS 5-Year Detailed Tables",
    "description": "Fake ACS",
    "distribution": [{"accessURL": "https://fake.census.test/data/2019/acs/acs5"}],
    "c_variablesLink": "https://fake.census.test/data/2019/acs/acs5/variables.json",
    "c_geographyLink": "https://fake.census.test/data/2019/acs/acs5/geography.json",
    "c_tagsLink": "https://fake.census.test/data/2019/acs/acs5/tags.json"
}]}"#;

const GEOGRAPHY: &str = r#"{"fips":[
    {"name":"us","geoLevelDisplay":"010"},
    {"name":"state","geoLevelDisplay":"040"},
    {"name":"county","geoLevelDisplay":"050","requires":["state"],"wildcard":["state"]},
    {"name":"tract","geoLevelDisplay":"140","requires":["state","county"],"wildcard":["county"]}
]}"#;

const VARIABLES: &str = r#"{"variables":{
    "NAME":{"label":"Geographic Area Name","predicateType":"string","group":"N/A"},
    "B01001_001E":{"label":"Estimate!!Total:","concept":"SEX BY AGE","predicateType":"int","group":"B01001"}
}}"#;

/// Answers metadata requests from fixtures and data requests from a tiny
/// geography: states 01 and 02, with counties 001/003 and 013.
#[derive(Default)]
struct FakeCensus {
    urls: RefCell<Vec<String>>,
}

impl FakeCensus {
    fn data_urls(&self) -> Vec<String> {
        self.urls
            .borrow()
            .iter()
            .filter(|u| u.starts_with(&format!("{BASE}?")))
            .cloned()
            .collect()
    }

    fn answer(&self, url: &str) -> HttpReply {
        let Some(query) = url.strip_prefix(&format!("{BASE}?")) else {
            return HttpReply::new(404, "not found");
        };
        let params: HashMap<&str, &str> =
            query.split('&').filter_map(|p| p.split_once('=')).collect();

        let get: Vec<&str> = params["get"].split(',').collect();
        if get.contains(&"BAD") {
            return HttpReply::new(400, "error: unknown variable 'BAD'\nsee documentation");
        }

        let (level, value) = params["for"].split_once(':').unwrap();
        let within: Vec<(&str, &str)> = params
            .get("in")
            .map(|s| s.split('+').map(|c| c.split_once(':').unwrap()).collect())
            .unwrap_or_default();

        let geo_rows: Vec<Vec<(&str, String)>> = match level {
            "us" => vec![vec![("us", "1".to_string())]],
            "state" => states(value)
                .into_iter()
                .map(|s| vec![("state", s.to_string())])
                .collect(),
            "county" => {
                let state = within
                    .iter()
                    .find(|(l, _)| *l == "state")
                    .map(|(_, v)| *v)
                    .unwrap();
                assert_ne!(state, "*", "wildcards must never reach the server");
                counties(state)
                    .into_iter()
                    .filter(|c| value == "*" || *c == value)
                    .map(|c| vec![("state", state.to_string()), ("county", c.to_string())])
                    .collect()
            }
            _ => return HttpReply::new(204, ""),
        };

        let mut header: Vec<String> = get.iter().map(|c| c.to_string()).collect();
        if let Some(first) = geo_rows.first() {
            header.extend(first.iter().map(|(l, _)| l.to_string()));
        }
        let mut rows = vec![header];
        for geo in geo_rows {
            let id: String = geo.iter().map(|(_, v)| v.as_str()).collect();
            let mut row: Vec<String> = get
                .iter()
                .map(|c| match *c {
                    "NAME" => format!("Area {id}"),
                    other => format!("{}", other.len() * 100 + id.len()),
                })
                .collect();
            row.extend(geo.into_iter().map(|(_, v)| v));
            rows.push(row);
        }
        HttpReply::ok(serde_json::to_string(&rows).unwrap())
    }
}

fn states(value: &str) -> Vec<&str> {
    match value {
        "*" => vec!["01", "02"],
        v => vec![v],
    }
}

fn counties(state: &str) -> Vec<&'static str> {
    match state {
        "01" => vec!["001", "003"],
        "02" => vec!["013"],
        _ => Vec::new(),
    }
}

impl Transport for FakeCensus {
    fn get(&self, url: &str) -> Result<HttpReply> {
        self.urls.borrow_mut().push(url.to_string());
        let fixture = match url {
            INDEX_URL => Some(INDEX),
            u if u.ends_with("/geography.json") => Some(GEOGRAPHY),
            u if u.ends_with("/variables.json") => Some(VARIABLES),
            u if u.ends_with("/tags.json") => Some(r#"{"tags":["age","sex"]}"#),
            _ => None,
        };
        Ok(match fixture {
            Some(body) => HttpReply::ok(body),
            None => self.answer(url),
        })
    }
}

fn connect(key: Option<&str>) -> Client<FakeCensus> {
    let cfg = ClientConfig {
        url: INDEX_URL.to_string(),
        key: key.map(str::to_string),
        verify: true,
    };
    Client::with_transport("ACSDT5Y2019", &cfg, FakeCensus::default()).unwrap()
}

fn names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("B01001_{i:03}E")).collect()
}

#[test]
fn connect_loads_linked_metadata() {
    let client = connect(None);
    assert_eq!(client.title(), "ACS 5-Year Detailed Tables");
    assert_eq!(client.access_url(), BASE);
    assert_eq!(client.tags(), ["age", "sex"]);
    assert_eq!(client.variables()["B01001_001E"].concept.as_deref(), Some("SEX BY AGE"));
    assert!(client.geographies().levels("fips").is_some());
    assert!(client.examples().is_none());
}

#[test]
fn unknown_identifier_fails_to_connect() {
    let cfg = ClientConfig {
        url: INDEX_URL.to_string(),
        key: None,
        verify: true,
    };
    let err = Client::with_transport("NOPE", &cfg, FakeCensus::default()).unwrap_err();
    assert!(matches!(err, CensusError::UnknownDataset(id) if id == "NOPE"));
}

#[test]
fn small_query_is_a_single_request() {
    let client = connect(None);
    let table = client.query(&Query::new(["A", "B", "C"])).unwrap();

    let urls = client_urls(&client);
    assert_eq!(urls.len(), 1);
    assert!(urls[0].ends_with("&for=us:00"));
    assert!(!urls[0].contains("&in="));
    assert_eq!(table.column_names(), ["A", "B", "C", "us"]);
    assert_eq!(table.n_rows(), 1);
}

#[test]
fn key_is_passed_through() {
    let client = connect(Some("cfg-key"));
    client.query(&Query::new(["NAME"])).unwrap();
    client.query(&Query::new(["NAME"]).key("own-key")).unwrap();

    let urls = client_urls(&client);
    assert!(urls[0].ends_with("&key=cfg-key"));
    assert!(urls[1].ends_with("&key=own-key"));
}

#[test]
fn sixty_columns_are_split_in_two() {
    let client = connect(None);
    let cols = names(60);
    let table = client.query(&Query::new(cols.clone()).unit("state:01").unwrap()).unwrap();

    let urls = client_urls(&client);
    assert_eq!(urls.len(), 2);
    let sizes: Vec<usize> = urls
        .iter()
        .map(|u| u.split("get=").nth(1).unwrap().split('&').next().unwrap().split(',').count())
        .collect();
    assert_eq!(sizes, [49, 11]);

    // 60 requested columns plus one shared `state` column.
    assert_eq!(table.n_columns(), 61);
    assert!(cols.iter().all(|c| table.has_column(c)));
    assert!(matches!(table.column("B01001_060E"), Some(ColumnValues::Integer(_))));
}

#[test]
fn chunk_failure_fails_the_whole_query() {
    let client = connect(None);
    let mut cols = names(60);
    cols[55] = "BAD".to_string();
    let err = client.query(&Query::new(cols)).unwrap_err();

    match err {
        CensusError::PartialQuery { context, source } => {
            assert_eq!(context, "column chunk 2/2");
            assert!(matches!(*source, CensusError::MalformedQuery { status: 400, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn no_content_is_an_empty_result() {
    let client = connect(None);
    let q = Query::new(["NAME"]).unit("tract:*").unwrap().within("state", "01").within("county", "001");
    assert!(matches!(client.query(&q), Err(CensusError::EmptyResult { .. })));
}

#[test]
fn bad_request_surfaces_server_text() {
    let client = connect(None);
    match client.query(&Query::new(["BAD"])).unwrap_err() {
        CensusError::MalformedQuery { status, message, url } => {
            assert_eq!(status, 400);
            assert_eq!(message, "error: unknown variable 'BAD'");
            assert!(url.starts_with(BASE));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn wildcard_state_resolves_every_state() {
    let client = connect(None);
    let q = Query::new(["NAME", "B01001_001E"])
        .unit("county:*")
        .unwrap()
        .within("state", "*");
    let table = client.query(&q).unwrap();

    let urls = client_urls(&client);
    assert_eq!(
        urls,
        [
            format!("{BASE}?get=NAME&for=state:*"),
            format!("{BASE}?get=NAME,B01001_001E&for=county:*&in=state:01"),
            format!("{BASE}?get=NAME,B01001_001E&for=county:*&in=state:02"),
        ]
    );

    assert_eq!(table.n_rows(), 3);
    assert_eq!(table.column_names(), ["NAME", "B01001_001E", "state", "county"]);
    let state: Vec<Option<String>> = (0..3).map(|i| table.column("state").unwrap().display(i)).collect();
    assert_eq!(state, [Some("01".to_string()), Some("01".to_string()), Some("02".to_string())]);
    assert!(matches!(table.column("B01001_001E"), Some(ColumnValues::Integer(_))));
    assert!(matches!(table.column("county"), Some(ColumnValues::Text(_))));
}

#[test]
fn wildcard_leaves_are_split_into_column_chunks() {
    let client = connect(None);
    let cols = names(60);
    let q = Query::new(cols.clone()).unit("county:*").unwrap().within("state", "*");
    let table = client.query(&q).unwrap();

    let urls = client_urls(&client);
    assert_eq!(urls.len(), 5);
    assert_eq!(urls[0], format!("{BASE}?get=NAME&for=state:*"));
    let leaves: Vec<(usize, &str)> = urls[1..]
        .iter()
        .map(|u| {
            let get = u.split("get=").nth(1).unwrap().split('&').next().unwrap();
            let within = u.split("&in=").nth(1).unwrap();
            (get.split(',').count(), within)
        })
        .collect();
    assert_eq!(
        leaves,
        [(49, "state:01"), (11, "state:01"), (49, "state:02"), (11, "state:02")]
    );

    // 60 requested columns plus `state` and `county`.
    assert_eq!(table.n_columns(), 62);
    assert_eq!(table.n_rows(), 3);
    let state: Vec<Option<String>> =
        (0..3).map(|i| table.column("state").unwrap().display(i)).collect();
    assert_eq!(state, [Some("01".to_string()), Some("01".to_string()), Some("02".to_string())]);
    assert!(matches!(table.column("B01001_060E"), Some(ColumnValues::Integer(_))));
    assert!(matches!(table.column("county"), Some(ColumnValues::Text(_))));
}

#[test]
fn pinned_ancestors_are_not_enumerated() {
    let client = connect(None);
    let q = Query::new(["NAME"])
        .unit("tract:*")
        .unwrap()
        .within("state", "01")
        .within("county", "*")
        .hierarchy(["state", "county"]);

    // Tracts answer 204 in the fake, so the first leaf aborts the query.
    let err = client.query(&q).unwrap_err();
    assert!(matches!(err, CensusError::PartialQuery { .. }));

    let urls = client_urls(&client);
    assert_eq!(urls[0], format!("{BASE}?get=NAME&for=county:*&in=state:01"));
    assert_eq!(urls.len(), 2);
}

#[test]
fn unmatched_hierarchy_is_reported_before_any_request() {
    let client = connect(None);
    let q = Query::new(["NAME"]).unit("tract:*").unwrap().within("state", "*");
    assert!(matches!(client.query(&q), Err(CensusError::HierarchyResolution(_))));
    assert!(client_urls(&client).is_empty());
}

#[test]
fn empty_columns_are_rejected() {
    let client = connect(None);
    let err = client.query(&Query::new(Vec::<String>::new())).unwrap_err();
    assert!(matches!(err, CensusError::InvalidParameter(_)));
}

fn client_urls(client: &Client<FakeCensus>) -> Vec<String> {
    transport(client).data_urls()
}

fn transport(client: &Client<FakeCensus>) -> &FakeCensus {
    client.transport()
}
