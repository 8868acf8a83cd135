//! Blocking usage example.
//!
//! Run with: `CLASHROYALE_TOKEN=your-token cargo run --example blocking_lookup`

use clashroyale::{ClientBuilder, Params};

fn main() -> Result<(), clashroyale::Error> {
    let client = ClientBuilder::from_env()?.build_blocking()?;

    println!("API version: {}", client.get_version()?);

    for endpoint in &client.get_endpoints()? {
        println!("  {}", endpoint);
    }

    let top = client
        .get_top_clans("", Params::new().keys(["name", "tag", "score"]).max(5))?
        .into_vec()?;
    for clan in top {
        println!("{:>8} {}", clan.get_i64("score").unwrap_or(0), clan.name().unwrap_or("?"));
    }

    Ok(())
}
