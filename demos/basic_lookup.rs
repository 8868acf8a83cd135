//! Basic lookup example.
//!
//! Fetches a player and their clan, caching responses in a local SQLite file.
//!
//! Run with: `CLASHROYALE_TOKEN=your-token cargo run --example basic_lookup -- 2PP`

use clashroyale::{ClientBuilder, Params};

#[tokio::main]
async fn main() -> Result<(), clashroyale::Error> {
    let tag = std::env::args().nth(1).unwrap_or_else(|| "2PP".to_string());

    // Token (and optionally base URL) come from the environment
    let client = ClientBuilder::from_env()?
        .cache_path("cr-cache.sqlite")
        .build()?;

    let player = client
        .get_player(&[tag.as_str()], Params::new().exclude(["cards"]))
        .await?
        .into_one()?;

    println!(
        "{} ({}) trophies: {:?}{}",
        player.name().unwrap_or("?"),
        player.tag().unwrap_or("?"),
        player.get_i64("trophies"),
        if player.is_cached() { " [cached]" } else { "" }
    );

    // Models keep a handle on the client for follow-up lookups
    if let Some(clan) = player.get_clan().await? {
        println!(
            "Clan: {} with {} members",
            clan.name().unwrap_or("?"),
            clan.member_tags().len()
        );
    }

    client.close();
    Ok(())
}
