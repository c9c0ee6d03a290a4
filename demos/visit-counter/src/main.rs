use cellar::prelude::*;
use http::header::{COOKIE, SET_COOKIE};
use http::{Request, Response};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const SESSION: &str = "visit";

// ---------------------------------------------------------------------------
// Session contents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Visits {
    count: u64,
    pages: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

type Store = SessionStore<MemoryBackend>;

/// Counts the visit and remembers the page.
async fn visit(store: &Store, request: &Request<()>) -> Result<(Response<()>, Visits), CellarError> {
    let mut session = match store.get(request, SESSION).await {
        Ok(session) => session,
        Err(failure) => {
            tracing::warn!(error = %failure, "starting over");
            failure.into_session()
        }
    };

    let mut visits: Visits = session.get("visits").unwrap_or_default();
    visits.count += 1;
    visits.pages.push(request.uri().path().to_string());
    session.insert("visits", &visits)?;

    let mut response = Response::new(());
    store.save(&mut response, &mut session).await?;
    Ok((response, visits))
}

/// Forgets the visitor.
async fn logout(store: &Store, request: &Request<()>) -> Result<Response<()>, CellarError> {
    let mut response = Response::new(());
    let mut session = store.get(request, SESSION).await?;
    if session.is_new() {
        return Ok(response);
    }
    session.invalidate();
    store.save(&mut response, &mut session).await?;
    Ok(response)
}

// ---------------------------------------------------------------------------
// A one-cookie browser
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Browser {
    cookie: Option<String>,
}

impl Browser {
    fn request(&self, path: &str) -> Request<()> {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(()).unwrap_or_default()
    }

    fn receive(&mut self, response: &Response<()>) {
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(header) = header.to_str() else { continue };
            let pair = header.split(';').next().unwrap_or_default();
            self.cookie = if header.contains("Max-Age=0") {
                None
            } else {
                Some(pair.to_string())
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

fn key_pair(seed: u8) -> KeyPair {
    KeyPair::new(vec![seed; 32], [seed.wrapping_add(1); 32])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let backend = MemoryBackend::new();
    let store = SessionStore::new(backend.clone(), StoreConfig::default(), &[key_pair(1)])?;
    let mut browser = Browser::default();

    for path in ["/", "/about", "/pricing"] {
        let (response, visits) = visit(&store, &browser.request(path)).await?;
        browser.receive(&response);
        tracing::info!(path, count = visits.count, "visited");
    }

    // Rotate: the new key seals, the old one still opens.
    let rotated = SessionStore::new(
        backend.clone(),
        StoreConfig::default(),
        &[key_pair(2), key_pair(1)],
    )?;
    let (response, visits) = visit(&rotated, &browser.request("/after-rotation")).await?;
    browser.receive(&response);
    tracing::info!(count = visits.count, "visited after key rotation");

    let response = logout(&rotated, &browser.request("/logout")).await?;
    browser.receive(&response);
    tracing::info!(stored = backend.len().await, "logged out");

    let (_, visits) = visit(&rotated, &browser.request("/")).await?;
    tracing::info!(count = visits.count, "visited as a stranger");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(backend: &MemoryBackend, pairs: &[KeyPair]) -> Store {
        SessionStore::new(backend.clone(), StoreConfig::default(), pairs).unwrap()
    }

    #[tokio::test]
    async fn test_visits_accumulate_across_requests() {
        let store = store(&MemoryBackend::new(), &[key_pair(1)]);
        let mut browser = Browser::default();

        for path in ["/a", "/b"] {
            let (response, _) = visit(&store, &browser.request(path)).await.unwrap();
            browser.receive(&response);
        }
        let (_, visits) = visit(&store, &browser.request("/c")).await.unwrap();

        assert_eq!(visits.count, 3);
        assert_eq!(visits.pages, ["/a", "/b", "/c"]);
    }

    #[tokio::test]
    async fn test_visits_survive_key_rotation() {
        let backend = MemoryBackend::new();
        let mut browser = Browser::default();
        let (response, _) = visit(&store(&backend, &[key_pair(1)]), &browser.request("/"))
            .await
            .unwrap();
        browser.receive(&response);

        let rotated = store(&backend, &[key_pair(2), key_pair(1)]);
        let (_, visits) = visit(&rotated, &browser.request("/")).await.unwrap();

        assert_eq!(visits.count, 2);
    }

    #[tokio::test]
    async fn test_logout_removes_session_and_cookie() {
        let backend = MemoryBackend::new();
        let store = store(&backend, &[key_pair(1)]);
        let mut browser = Browser::default();
        let (response, _) = visit(&store, &browser.request("/")).await.unwrap();
        browser.receive(&response);

        let response = logout(&store, &browser.request("/logout")).await.unwrap();
        browser.receive(&response);

        assert!(browser.cookie.is_none());
        assert!(backend.is_empty().await);
        let (_, visits) = visit(&store, &browser.request("/")).await.unwrap();
        assert_eq!(visits.count, 1);
    }

    #[tokio::test]
    async fn test_forged_cookie_starts_over() {
        let store = store(&MemoryBackend::new(), &[key_pair(1)]);
        let browser = Browser { cookie: Some(format!("{SESSION}=forged")) };

        let (_, visits) = visit(&store, &browser.request("/")).await.unwrap();

        assert_eq!(visits.count, 1);
    }
}
