//! Per-installation identity: the durable distinct id assigned by the host
//! application, the locally generated anonymous id used before a user is
//! known, and group memberships. Exactly one of distinct/anonymous resolves
//! as a payload's identity, distinct taking precedence.

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
struct Inner {
    distinct_id: Option<String>,
    anonymous_id: String,
    groups: HashMap<String, String>,
}

#[derive(Debug)]
pub struct IdentityState {
    inner: RwLock<Inner>,
}

impl IdentityState {
    pub fn new() -> Self {
        IdentityState {
            inner: RwLock::new(Inner {
                distinct_id: None,
                anonymous_id: nanoid::nanoid!(),
                groups: HashMap::new(),
            }),
        }
    }

    /// The identity payloads are attributed to: distinct id when known,
    /// anonymous id otherwise.
    pub fn resolved_id(&self) -> String {
        let inner = self.inner.read();
        inner.distinct_id.clone().unwrap_or_else(|| inner.anonymous_id.clone())
    }

    pub fn distinct_id(&self) -> Option<String> {
        self.inner.read().distinct_id.clone()
    }

    pub fn anonymous_id(&self) -> String {
        self.inner.read().anonymous_id.clone()
    }

    pub fn groups(&self) -> HashMap<String, String> {
        self.inner.read().groups.clone()
    }

    pub fn set_distinct_id(
        &self,
        distinct_id: &str,
    ) {
        self.inner.write().distinct_id = Some(distinct_id.to_string());
    }

    pub fn set_group(
        &self,
        group_type: &str,
        group_key: &str,
    ) {
        self.inner.write().groups.insert(group_type.to_string(), group_key.to_string());
    }

    /// Forget the user: clears distinct id and groups and rotates the
    /// anonymous id.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.distinct_id = None;
        inner.groups.clear();
        inner.anonymous_id = nanoid::nanoid!();
    }
}

impl Default for IdentityState {
    fn default() -> Self {
        Self::new()
    }
}
