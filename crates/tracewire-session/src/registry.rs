use std::collections::HashMap;

use crate::method::ConsumerMethod;

/// Outstanding requests, keyed by request id.
///
/// Replies only carry a request id and opaque bytes; the registry recovers
/// which method they answer. An entry lives until its final reply
/// (`has_more == false`) has been resolved, so a streamed `ReadBuffers`
/// keeps its entry across all of its replies.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    requests: HashMap<u64, ConsumerMethod>,
}

impl RequestRegistry {
    pub fn register(&mut self, request_id: u64, method: ConsumerMethod) {
        self.requests.insert(request_id, method);
    }

    /// Look up the method a reply answers.
    pub fn resolve(&mut self, request_id: u64, has_more: bool) -> Option<ConsumerMethod> {
        if has_more {
            self.requests.get(&request_id).copied()
        } else {
            self.requests.remove(&request_id)
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Abandon every outstanding request.
    pub fn clear(&mut self) {
        self.requests.clear();
    }
}
