use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{AppError, AppResult};

/// Resolves the caller's country, used only to preselect a watch-provider region
#[async_trait::async_trait]
pub trait RegionLocator: Send + Sync {
    /// Two-letter country code
    async fn lookup(&self) -> AppResult<String>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    country_code: Option<String>,
}

/// ipapi.co style `GET {url}` returning `{"country_code": "US", ...}`
#[derive(Clone)]
pub struct IpApiLocator {
    http_client: HttpClient,
    api_url: String,
}

impl IpApiLocator {
    pub fn new(api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
        }
    }
}

#[async_trait::async_trait]
impl RegionLocator for IpApiLocator {
    async fn lookup(&self) -> AppResult<String> {
        let response = self
            .http_client
            .get(&self.api_url)
            .send()
            .await
            .map_err(AppError::from_transport)?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Geolocation API returned status {}",
                response.status()
            )));
        }

        let body: IpApiResponse = response.json().await?;

        body.country_code
            .map(|code| code.trim().to_uppercase())
            .filter(|code| code.len() == 2)
            .ok_or_else(|| AppError::ExternalApi("Geolocation response had no country code".to_string()))
    }

    fn name(&self) -> &'static str {
        "ipapi"
    }
}

/// Looks the region up once per process and remembers the answer
pub struct RegionService {
    locator: Arc<dyn RegionLocator>,
    fallback: String,
    region: OnceCell<String>,
}

impl RegionService {
    pub fn new(locator: Arc<dyn RegionLocator>, fallback: String) -> Self {
        Self {
            locator,
            fallback: fallback.to_uppercase(),
            region: OnceCell::new(),
        }
    }

    /// Never fails; any lookup error yields the fallback region
    pub async fn region(&self) -> String {
        self.region
            .get_or_init(|| async {
                match self.locator.lookup().await {
                    Ok(code) => {
                        tracing::info!(region = %code, locator = self.locator.name(), "Region resolved");
                        code
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, fallback = %self.fallback, "Region lookup failed");
                        self.fallback.clone()
                    }
                }
            })
            .await
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLocator {
        answer: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RegionLocator for CountingLocator {
        async fn lookup(&self) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .map(str::to_string)
                .ok_or_else(|| AppError::Offline("no network".to_string()))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_region_is_memoized() {
        let locator = Arc::new(CountingLocator {
            answer: Some("IN"),
            calls: AtomicUsize::new(0),
        });
        let service = RegionService::new(locator.clone(), "US".to_string());

        assert_eq!(service.region().await, "IN");
        assert_eq!(service.region().await, "IN");
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_uses_fallback() {
        let locator = Arc::new(CountingLocator {
            answer: None,
            calls: AtomicUsize::new(0),
        });
        let service = RegionService::new(locator, "gb".to_string());

        assert_eq!(service.region().await, "GB");
    }

    #[tokio::test]
    async fn test_unreachable_locator_is_offline() {
        let locator = IpApiLocator::new("http://127.0.0.1:1/json/".to_string());
        let err = tokio_test::assert_err!(locator.lookup().await);
        assert!(err.is_offline());
    }

    #[test]
    fn test_response_parsing() {
        let body: IpApiResponse =
            serde_json::from_str(r#"{"ip": "1.2.3.4", "country_code": "DE", "city": "Berlin"}"#)
                .unwrap();
        assert_eq!(body.country_code.as_deref(), Some("DE"));
    }
}
