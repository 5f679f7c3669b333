// File: src/client/address.rs
use crate::cache::Cache;
use crate::client::core::ApiClient;
use crate::error::{ApiError, Result};
use crate::model::AddressEntry;
use std::time::Duration;

/// Pause before the single retry after a 401.
pub const ADDRESS_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Region → province → city → barangay lookups for the patient address form.
#[derive(Debug, Clone)]
pub struct AddressBook {
    client: ApiClient,
    cache: Option<Cache>,
    retry_delay: Duration,
}

impl AddressBook {
    pub fn new(client: ApiClient, cache: Option<Cache>) -> Self {
        Self {
            client,
            cache,
            retry_delay: ADDRESS_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn regions(&self) -> Result<Vec<AddressEntry>> {
        self.lookup("regions".to_string(), "/address/regions".to_string())
            .await
    }

    pub async fn provinces(&self, region_code: &str) -> Result<Vec<AddressEntry>> {
        self.lookup(
            format!("provinces:{}", region_code),
            format!(
                "/address/provinces?region_code={}",
                urlencoding::encode(region_code)
            ),
        )
        .await
    }

    pub async fn cities(&self, province_code: &str) -> Result<Vec<AddressEntry>> {
        self.lookup(
            format!("cities:{}", province_code),
            format!(
                "/address/cities?province_code={}",
                urlencoding::encode(province_code)
            ),
        )
        .await
    }

    pub async fn barangays(&self, city_code: &str) -> Result<Vec<AddressEntry>> {
        self.lookup(
            format!("barangays:{}", city_code),
            format!(
                "/address/barangays?city_code={}",
                urlencoding::encode(city_code)
            ),
        )
        .await
    }

    async fn lookup(&self, key: String, path: String) -> Result<Vec<AddressEntry>> {
        let server = self.client.base_url();
        if let Some(cache) = &self.cache {
            match cache.load(server, &key) {
                Ok(Some(entries)) => return Ok(entries),
                Ok(None) => {}
                Err(e) => log::warn!("address cache unreadable for {}: {}", key, e),
            }
        }

        let entries = self.fetch_with_retry(&path).await?;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.save(server, &key, &entries)
        {
            log::warn!("could not cache address lookup {}: {}", key, e);
        }
        Ok(entries)
    }

    // The address form may mount while the session is still being applied;
    // a 401 with a token present gets one more try.
    async fn fetch_with_retry(&self, path: &str) -> Result<Vec<AddressEntry>> {
        match self.client.get(path).await {
            Err(ApiError::Unauthorized) if self.client.session().has_token() => {
                log::info!("{} returned 401, retrying once", path);
                tokio::time::sleep(self.retry_delay).await;
                self.client.get(path).await
            }
            other => other,
        }
    }
}
