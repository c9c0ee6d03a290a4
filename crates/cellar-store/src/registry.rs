//! Per-request session cache.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use cellar_codec::Codec;
use cellar_token::TokenProvider;
use http::{Request, Response};

use crate::{Session, SessionBackend, SessionStore, StoreError};

/// Holds the sessions one request has looked up, by name.
///
/// Middleware and handlers can ask for the same session several times and
/// get the same working copy back; [`save_all`](Self::save_all) writes
/// every one of them at the end of the request.
pub struct Registry<'s, B, T, C> {
    store: &'s SessionStore<B, T, C>,
    sessions: HashMap<String, Session>,
}

impl<'s, B, T, C> Registry<'s, B, T, C>
where
    B: SessionBackend,
    T: TokenProvider,
    C: Codec,
{
    pub fn new(store: &'s SessionStore<B, T, C>) -> Self {
        Self {
            store,
            sessions: HashMap::new(),
        }
    }

    /// Returns the cached session named `name`, loading it on first use.
    ///
    /// # Errors
    /// The first lookup reports a load failure; the fresh session handed
    /// back with it is cached, so later lookups succeed with that session.
    pub async fn get<Rq>(
        &mut self,
        request: &Request<Rq>,
        name: &str,
    ) -> Result<&mut Session, StoreError> {
        match self.sessions.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => match self.store.get(request, name).await {
                Ok(session) => Ok(entry.insert(session)),
                Err(failure) => {
                    let (session, error) = failure.into_parts();
                    entry.insert(session);
                    Err(error)
                }
            },
        }
    }

    /// Saves every cached session.
    ///
    /// # Errors
    /// Every session is attempted; the first failure is returned and the
    /// rest are logged.
    pub async fn save_all<Rs>(
        &mut self,
        response: &mut Response<Rs>,
    ) -> Result<(), StoreError> {
        let mut first_error = None;
        for (name, session) in &mut self.sessions {
            if let Err(e) = self.store.save(response, session).await {
                tracing::warn!(%name, error = %e, "session save failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
