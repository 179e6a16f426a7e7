use anyhow::Result;

use korjournal_core::models::{amount_for, route_distance};

use crate::distance::DistanceClient;

/// Look up the driving distance between two addresses without saving anything.
pub(crate) async fn cmd_distance(
    client: &DistanceClient,
    origin: &str,
    destination: &str,
    roundtrip: bool,
    json: bool,
) -> Result<()> {
    let km = client
        .resolve_async(origin.trim(), destination.trim())
        .await?;
    let distance = route_distance(km, roundtrip);

    if json {
        let out = serde_json::json!({
            "origin": origin.trim(),
            "destination": destination.trim(),
            "one_way_km": km,
            "roundtrip": roundtrip,
            "distance": distance,
            "amount": amount_for(distance),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let label = if roundtrip { "round trip" } else { "one way" };
        println!(
            "{} -> {}: {distance:.1} km {label} ({:.2} kr)",
            origin.trim(),
            destination.trim(),
            amount_for(distance)
        );
    }
    Ok(())
}
