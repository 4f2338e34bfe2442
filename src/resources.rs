//! Resource Lifecycle
//!
//! Every compiled module reaches the sandbox's module loader through a
//! transient, revocable URI. The [`ResourceHost`] creates and revokes those
//! URIs; the [`HandleRegistry`] remembers which ones belong to the current
//! render pass so they can all be revoked when the next pass starts or the
//! preview is torn down.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub const JAVASCRIPT_MIME: &str = "text/javascript";

/// Opaque, revocable reference to loadable content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where transient module content lives while the sandbox loads it.
pub trait ResourceHost {
    fn create(&mut self, content: String, mime: &str) -> ResourceHandle;

    /// Returns false if the handle was unknown or already revoked.
    fn revoke(&mut self, handle: &ResourceHandle) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY HOST
// ═══════════════════════════════════════════════════════════════════════════════

static HOST_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct StoredResource {
    pub mime: String,
    pub content: String,
}

/// Keeps resources in process memory under `blob:preview/<instance>/<seq>`
/// URIs. Sequence numbers are never reused, so two passes never share a URI.
#[derive(Debug)]
pub struct MemoryResourceHost {
    instance: u64,
    next_seq: u64,
    live: HashMap<String, StoredResource>,
}

impl Default for MemoryResourceHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResourceHost {
    pub fn new() -> Self {
        Self {
            instance: HOST_INSTANCE_COUNTER.fetch_add(1, Ordering::SeqCst),
            next_seq: 0,
            live: HashMap::new(),
        }
    }

    pub fn get(&self, uri: &str) -> Option<&StoredResource> {
        self.live.get(uri)
    }

    pub fn is_live(&self, handle: &ResourceHandle) -> bool {
        self.live.contains_key(handle.as_str())
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl ResourceHost for MemoryResourceHost {
    fn create(&mut self, content: String, mime: &str) -> ResourceHandle {
        let uri = format!("blob:preview/{}/{}", self.instance, self.next_seq);
        self.next_seq += 1;
        self.live.insert(
            uri.clone(),
            StoredResource {
                mime: mime.to_string(),
                content,
            },
        );
        ResourceHandle(uri)
    }

    fn revoke(&mut self, handle: &ResourceHandle) -> bool {
        self.live.remove(handle.as_str()).is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Handles owned by one preview instance for its current pass.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: Vec<ResourceHandle>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resource through `host` and take ownership of its handle.
    pub fn allocate<H: ResourceHost + ?Sized>(
        &mut self,
        host: &mut H,
        content: String,
        mime: &str,
    ) -> ResourceHandle {
        let handle = host.create(content, mime);
        self.handles.push(handle.clone());
        handle
    }

    /// Revoke every held handle. Returns how many were revoked.
    pub fn revoke_all<H: ResourceHost + ?Sized>(&mut self, host: &mut H) -> usize {
        let mut revoked = 0;
        for handle in self.handles.drain(..) {
            if host.revoke(&handle) {
                revoked += 1;
            } else {
                tracing::warn!(handle = %handle, "handle was already revoked");
            }
        }
        revoked
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.handles.iter()
    }
}
