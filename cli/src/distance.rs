use anyhow::{Context, Result, bail};
use tracing::debug;

use korjournal_core::distance::{
    DistanceMatrixResponse, DistanceResolver, failure_reason, response_to_km,
};

use crate::config::{Config, DEFAULT_DISTANCE_URL};

/// Query dialect of the configured endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    /// Google Distance Matrix: `origins`/`destinations`, metric, Swedish.
    GoogleMatrix,
    /// A `GET /distance?origin=&destination=` proxy answering with the same JSON.
    Proxy,
}

impl Endpoint {
    fn for_url(url: &str) -> Self {
        if url == DEFAULT_DISTANCE_URL {
            Endpoint::GoogleMatrix
        } else {
            Endpoint::Proxy
        }
    }
}

pub struct DistanceClient {
    client: reqwest::Client,
    url: String,
    endpoint: Endpoint,
    api_key: Option<String>,
    rt: tokio::runtime::Handle,
}

impl DistanceClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "korjournal-cli/{} (mileage log)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        let rt = tokio::runtime::Handle::try_current()
            .context("Distance client needs a running tokio runtime")?;
        Ok(Self {
            client,
            url: config.distance_url.clone(),
            endpoint: Endpoint::for_url(&config.distance_url),
            api_key: config.maps_api_key.clone(),
            rt,
        })
    }

    fn query<'a>(&'a self, origin: &'a str, destination: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut params = match self.endpoint {
            Endpoint::GoogleMatrix => vec![
                ("origins", origin),
                ("destinations", destination),
                ("units", "metric"),
                ("language", "sv"),
            ],
            Endpoint::Proxy => vec![("origin", origin), ("destination", destination)],
        };
        if let Some(key) = &self.api_key {
            params.push(("key", key.as_str()));
        }
        params
    }

    pub async fn resolve_async(&self, origin: &str, destination: &str) -> Result<f64> {
        let resp = self
            .client
            .get(&self.url)
            .query(&self.query(origin, destination))
            .send()
            .await
            .context("Failed to reach distance service")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("Distance service returned {status}");
        }
        let data: DistanceMatrixResponse = resp
            .json()
            .await
            .context("Failed to parse distance response")?;

        match response_to_km(&data) {
            Some(km) => {
                debug!(origin, destination, km, "resolved route distance");
                Ok(km)
            }
            None => bail!(
                "No distance between '{origin}' and '{destination}': {}",
                failure_reason(&data)
            ),
        }
    }
}

impl DistanceResolver for DistanceClient {
    /// Must not be called from a runtime worker thread without `block_in_place`.
    fn resolve(&self, origin: &str, destination: &str) -> Result<f64> {
        self.rt.block_on(self.resolve_async(origin, destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(api_key: Option<&str>) -> Config {
        Config {
            db_path: PathBuf::from(":memory:"),
            data_dir: PathBuf::from("."),
            distance_url: DEFAULT_DISTANCE_URL.to_string(),
            maps_api_key: api_key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_query_includes_key_when_configured() {
        let client = DistanceClient::new(&config(Some("abc"))).unwrap();
        let params = client.query("Göteborg", "Borås");
        assert!(params.contains(&("origins", "Göteborg")));
        assert!(params.contains(&("destinations", "Borås")));
        assert!(params.contains(&("key", "abc")));
    }

    #[tokio::test]
    async fn test_query_without_key() {
        let client = DistanceClient::new(&config(None)).unwrap();
        let params = client.query("A", "B");
        assert!(params.iter().all(|(k, _)| *k != "key"));
    }

    #[tokio::test]
    async fn test_query_for_custom_endpoint_uses_singular_names() {
        let cfg = Config {
            distance_url: "http://localhost:3000/api/distance".to_string(),
            ..config(None)
        };
        let client = DistanceClient::new(&cfg).unwrap();
        let params = client.query("Göteborg", "Borås");
        assert_eq!(params, vec![("origin", "Göteborg"), ("destination", "Borås")]);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(DistanceClient::new(&config(None)).is_err());
    }

    // --- Integration tests (hit the real distance service) ---

    #[tokio::test]
    #[ignore = "hits Google Distance Matrix API"]
    async fn test_resolve_known_route() {
        let cfg = Config {
            maps_api_key: std::env::var("GOOGLE_MAPS_API_KEY").ok(),
            ..config(None)
        };
        let client = DistanceClient::new(&cfg).unwrap();
        let km = client.resolve_async("Göteborg", "Borås").await.unwrap();
        assert!(km > 40.0 && km < 100.0);
    }
}
