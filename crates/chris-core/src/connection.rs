//! The capability carried by every object able to make further linked requests.

use crate::config::MaxRequests;
use crate::session::Session;

/// A shared session together with the caller's pagination budget.
#[derive(Debug, Clone)]
pub struct Connection {
    session: Session,
    max_search_requests: MaxRequests,
}

impl Connection {
    /// Bundle a session with a pagination budget.
    #[must_use]
    pub const fn new(session: Session, max_search_requests: MaxRequests) -> Self {
        Self {
            session,
            max_search_requests,
        }
    }

    /// The shared session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Maximum number of requests a search may make.
    #[must_use]
    pub const fn max_search_requests(&self) -> MaxRequests {
        self.max_search_requests
    }
}
