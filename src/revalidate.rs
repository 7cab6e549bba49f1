use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::models::{AdminLink, Link};

/// Route path of the user-facing links page.
pub const LINKS_PAGE: &str = "/links";
/// Route path of the admin links management page.
pub const LINKS_ADMIN_PAGE: &str = "/links-update";

/// The fixed set of routes that render link data. Every successful link
/// mutation invalidates exactly these, never a read or a failed mutation.
pub const LINK_PAGES: [&str; 2] = [LINKS_PAGE, LINKS_ADMIN_PAGE];

#[derive(Default)]
struct Inner {
    /// Monotonic generation per route path. A bump marks all cached
    /// payloads stamped with an older generation as stale.
    generations: HashMap<&'static str, u64>,
    /// Cached list-mine payloads, keyed by owner, stamped with the
    /// `/links` generation they were built under.
    my_links: HashMap<Uuid, (u64, Vec<Link>)>,
    /// Cached admin-wide listing, stamped with the `/links-update`
    /// generation.
    all_links: Option<(u64, Vec<AdminLink>)>,
}

/// CacheLookup
///
/// Outcome of a cache lookup. A miss carries the generation observed at
/// lookup time: the caller reads the store and hands that generation back
/// when storing the rebuilt payload, so an invalidation that lands between
/// the lookup and the store leaves the stored payload already stale.
pub enum CacheLookup<T> {
    Hit(T),
    Miss(u64),
}

/// RevalidationHub
///
/// The in-process stand-in for a page cache with explicit invalidation:
/// the single authoritative store lives in Postgres, and read handlers keep
/// per-route cached payloads here that are dropped whenever a mutation
/// signals the route as stale. Invalidation is fire-and-forget; nothing
/// waits on a rebuild.
#[derive(Default)]
pub struct RevalidationHub {
    inner: RwLock<Inner>,
}

impl RevalidationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation for a route path (0 before the first bump).
    pub fn generation(&self, path: &str) -> u64 {
        *self
            .inner
            .read()
            .unwrap()
            .generations
            .get(path)
            .unwrap_or(&0)
    }

    /// Marks cached content for the path as stale.
    pub fn invalidate(&self, path: &'static str) {
        let mut inner = self.inner.write().unwrap();
        let generation = inner.generations.entry(path).or_insert(0);
        *generation += 1;
        tracing::debug!(path = path, generation = *generation, "Page revalidated");
        match path {
            LINKS_PAGE => inner.my_links.clear(),
            LINKS_ADMIN_PAGE => inner.all_links = None,
            _ => {}
        }
    }

    /// Invalidates the fixed set of link-rendering routes. Called after
    /// every successful link mutation.
    pub fn invalidate_link_pages(&self) {
        for path in LINK_PAGES {
            self.invalidate(path);
        }
    }

    /// Returns the cached list-mine payload for the user if it is still
    /// current, or the generation the rebuilt payload must be stamped with.
    pub fn cached_my_links(&self, user_id: Uuid) -> CacheLookup<Vec<Link>> {
        let inner = self.inner.read().unwrap();
        let current = *inner.generations.get(LINKS_PAGE).unwrap_or(&0);
        match inner.my_links.get(&user_id) {
            Some((generation, links)) if *generation == current => {
                CacheLookup::Hit(links.clone())
            }
            _ => CacheLookup::Miss(current),
        }
    }

    /// Stores a rebuilt list-mine payload under the generation observed at
    /// lookup time, never the current one: a bump that raced the rebuild
    /// keeps the stored payload stale.
    pub fn store_my_links(&self, user_id: Uuid, generation: u64, links: Vec<Link>) {
        self.inner
            .write()
            .unwrap()
            .my_links
            .insert(user_id, (generation, links));
    }

    /// Returns the cached admin-wide listing if it is still current, or the
    /// generation the rebuilt payload must be stamped with.
    pub fn cached_all_links(&self) -> CacheLookup<Vec<AdminLink>> {
        let inner = self.inner.read().unwrap();
        let current = *inner.generations.get(LINKS_ADMIN_PAGE).unwrap_or(&0);
        match inner.all_links.as_ref() {
            Some((generation, links)) if *generation == current => {
                CacheLookup::Hit(links.clone())
            }
            _ => CacheLookup::Miss(current),
        }
    }

    pub fn store_all_links(&self, generation: u64, links: Vec<AdminLink>) {
        self.inner.write().unwrap().all_links = Some((generation, links));
    }
}
