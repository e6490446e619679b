use crate::error::TransportError;
use crate::scrapers::traits::PageTransport;
use crate::scrapers::types::CookieProfile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, COOKIE, PRAGMA,
    REFERER, UPGRADE_INSECURE_REQUESTS,
};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// reqwest-backed transport carrying the portal's browser header profile and cookies
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(cookies: &CookieProfile) -> Result<Self> {
        let client = Client::builder()
            .default_headers(browser_headers(cookies)?)
            .user_agent(USER_AGENT)
            .redirect(Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

fn browser_headers(cookies: &CookieProfile) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,ar;q=0.8"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(REFERER, HeaderValue::from_static("https://duckduckgo.com/"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

    let hints = [
        ("priority", "u=0, i"),
        (
            "sec-ch-ua",
            "\"Chromium\";v=\"142\", \"Google Chrome\";v=\"142\", \"Not_A Brand\";v=\"99\"",
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Linux\""),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "same-origin"),
        ("sec-fetch-user", "?1"),
    ];
    for (name, value) in hints {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }

    let cookie = HeaderValue::from_str(&cookies.header_value())
        .context("Cookie values contain characters not allowed in a header")?;
    headers.insert(COOKIE, cookie);

    Ok(headers)
}

#[async_trait]
impl PageTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, TransportError> {
        debug!(url = %url, timeout_secs = timeout.as_secs(), "GET");

        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(url = %url, status = %status, bytes = body.len(), "Response received");
        Ok(body)
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn cookies() -> CookieProfile {
        CookieProfile {
            req_device_token: "a".into(),
            cf_clearance: "b".into(),
            cf_bm: "c".into(),
        }
    }

    #[tokio::test]
    async fn test_get_sends_cookies_and_returns_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/listings/1")
                    .header("cookie", "req-device-token=a; cf_clearance=b; __cf_bm=c");
                then.status(200).body("<html>cards</html>");
            })
            .await;

        let transport = ReqwestTransport::new(&cookies()).unwrap();
        let body = transport
            .get(&server.url("/listings/1"), Duration::from_secs(5))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body, "<html>cards</html>");
    }

    #[tokio::test]
    async fn test_slow_response_is_a_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/listings/2");
                then.status(200)
                    .body("<html>late</html>")
                    .delay(Duration::from_millis(1500));
            })
            .await;

        let transport = ReqwestTransport::new(&cookies()).unwrap();
        let err = transport
            .get(&server.url("/listings/2"), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Timeout), "got {err:?}");
    }

    #[tokio::test]
    async fn test_redirects_are_followed() {
        let server = MockServer::start_async().await;
        let final_url = server.url("/listings/3/final");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/listings/3");
                then.status(302).header("Location", &final_url);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/listings/3/final");
                then.status(200).body("<html>moved</html>");
            })
            .await;

        let transport = ReqwestTransport::new(&cookies()).unwrap();
        let body = transport
            .get(&server.url("/listings/3"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(body, "<html>moved</html>");
    }

    #[test]
    fn test_browser_headers_carry_cookies() {
        let headers = browser_headers(&cookies()).unwrap();
        assert_eq!(
            headers.get(COOKIE).unwrap(),
            "req-device-token=a; cf_clearance=b; __cf_bm=c"
        );
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
        assert!(headers
            .get(ACCEPT_LANGUAGE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("ar"));
    }

    #[test]
    fn test_invalid_cookie_is_rejected() {
        let cookies = CookieProfile {
            req_device_token: "line\nbreak".into(),
            ..CookieProfile::default()
        };
        assert!(browser_headers(&cookies).is_err());
        assert!(ReqwestTransport::new(&cookies).is_err());
    }
}
