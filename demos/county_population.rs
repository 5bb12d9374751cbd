use censusapi::{Client, ColumnValues, Query};
use tracing_subscriber::EnvFilter;

fn main() -> censusapi::Result<()> {
    // Example program that calls the library API.
    // Set RUST_LOG=censusapi=debug to see every request URL.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("censusapi=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Optionally configure a key via CENSUSAPI_KEY or a `.censusapirc` file.
    let client = Client::from_env("ACSDT5Y2019")?.with_progress(true);
    println!("{client}");

    // Total population of every county in the country, one state at a time.
    let query = Query::new(["NAME", "B01001_001E"])
        .unit("county:*")?
        .within("state", "*");
    let table = client.query(&query)?;

    if let Some(ColumnValues::Integer(pop)) = table.column("B01001_001E") {
        let total: i64 = pop.iter().flatten().sum();
        println!("{} counties, {} people", table.n_rows(), total);
    }
    Ok(())
}
