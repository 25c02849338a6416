// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deduplicating asynchronous texture loading.
//!
//! [`TextureCache`] sits in front of a host-supplied [`TextureSource`] (the
//! web backend's image loader, or a fake in tests):
//!
//! - Resolved textures are cached until [`clear`](TextureCache::clear).
//! - Concurrent loads of one URL share a single underlying fetch and all
//!   settle together.
//! - A failed fetch is not cached. The next `load` of that URL retries.
//! - An empty URL yields an already-rejected [`TextureLoad`] carrying
//!   [`LoadError::InvalidArgument`].
//!
//! The cache is shared between pages behind an [`Rc`], so every method
//! takes `&self`.

use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString as _};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

use crate::trace::{TextureOutcome, Tracer};

/// Backend identifier of an uploaded texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

/// A texture that is resident on the GPU, with its natural pixel size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    /// Backend identifier.
    pub id: TextureId,
    /// Natural width in pixels.
    pub width: u32,
    /// Natural height in pixels.
    pub height: u32,
}

impl TextureHandle {
    /// Natural width over height, or `1.0` when the height is unknown.
    #[must_use]
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

/// Why a texture load failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// `load` was called without a URL.
    InvalidArgument,
    /// The fetch failed or was abandoned.
    Network(String),
    /// The response could not be decoded as an image.
    Decode(String),
    /// The cache was cleared while the load was in flight.
    Cleared,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => f.write_str("texture load requires a source URL"),
            Self::Network(msg) => write!(f, "texture fetch failed: {msg}"),
            Self::Decode(msg) => write!(f, "texture decode failed: {msg}"),
            Self::Cleared => f.write_str("texture cache was cleared during load"),
        }
    }
}

impl core::error::Error for LoadError {}

/// The host side of texture loading.
pub trait TextureSource {
    /// Starts fetching `url`. The source must eventually call
    /// [`LoadCompletion::resolve`] or [`LoadCompletion::reject`]; dropping
    /// the completion unsettled rejects the load.
    fn fetch(&self, url: &str, completion: LoadCompletion);

    /// Frees the GPU resources behind `texture`.
    fn release(&self, texture: TextureId) {
        _ = texture;
    }
}

type LoadResult = Result<TextureHandle, LoadError>;

#[derive(Default)]
struct Flight {
    result: Option<LoadResult>,
    wakers: Vec<Waker>,
}

impl Flight {
    fn settle(&mut self, result: LoadResult) {
        if self.result.is_none() {
            self.result = Some(result);
            for waker in self.wakers.drain(..) {
                waker.wake();
            }
        }
    }
}

type FlightRef = Rc<RefCell<Flight>>;

enum Entry {
    Loading(FlightRef),
    Ready(TextureHandle),
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
}

/// Handed to [`TextureSource::fetch`]; settles one in-flight load.
pub struct LoadCompletion {
    url: String,
    flight: FlightRef,
    cache: Weak<RefCell<Inner>>,
    source: Weak<dyn TextureSource>,
    tracer: Tracer,
    settled: bool,
}

impl fmt::Debug for LoadCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCompletion")
            .field("url", &self.url)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

impl LoadCompletion {
    /// URL being loaded.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Completes the load successfully.
    pub fn resolve(mut self, texture: TextureHandle) {
        self.settle(Ok(texture));
    }

    /// Fails the load.
    pub fn reject(mut self, error: LoadError) {
        self.settle(Err(error));
    }

    fn settle(&mut self, result: LoadResult) {
        if self.settled {
            return;
        }
        self.settled = true;

        // Only the flight that is still registered for this URL may update
        // the cache; a flight orphaned by `clear` has already been rejected.
        let current = self.cache.upgrade().is_some_and(|cache| {
            let mut inner = cache.borrow_mut();
            let is_current = matches!(
                inner.entries.get(&self.url),
                Some(Entry::Loading(f)) if Rc::ptr_eq(f, &self.flight)
            );
            if is_current {
                match &result {
                    Ok(texture) => {
                        inner.entries.insert(self.url.clone(), Entry::Ready(*texture));
                    }
                    Err(_) => {
                        inner.entries.remove(&self.url);
                    }
                }
            }
            is_current
        });

        match &result {
            Ok(texture) if !current => {
                if let Some(source) = self.source.upgrade() {
                    source.release(texture.id);
                }
            }
            Ok(_) => self.tracer.texture(&self.url, TextureOutcome::Loaded),
            Err(error) => {
                self.tracer.texture(&self.url, TextureOutcome::Failed);
                self.tracer.texture_error(&self.url, error);
            }
        }

        self.flight.borrow_mut().settle(result);
    }
}

impl Drop for LoadCompletion {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(Err(LoadError::Network("load abandoned".to_string())));
        }
    }
}

/// Future returned by [`TextureCache::load`].
#[must_use = "futures do nothing unless polled"]
pub struct TextureLoad {
    state: LoadState,
}

enum LoadState {
    Done(Option<LoadResult>),
    Waiting(FlightRef),
}

impl fmt::Debug for TextureLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            LoadState::Done(_) => "done",
            LoadState::Waiting(_) => "waiting",
        };
        f.debug_struct("TextureLoad").field("state", &state).finish()
    }
}

impl TextureLoad {
    fn done(result: LoadResult) -> Self {
        Self {
            state: LoadState::Done(Some(result)),
        }
    }
}

impl Future for TextureLoad {
    type Output = LoadResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<LoadResult> {
        match &mut self.state {
            LoadState::Done(result) => match result.take() {
                Some(r) => Poll::Ready(r),
                None => panic!("TextureLoad polled after completion"),
            },
            LoadState::Waiting(flight) => {
                let settled = flight.borrow().result.clone();
                if let Some(result) = settled {
                    self.state = LoadState::Done(None);
                    return Poll::Ready(result);
                }
                let mut f = flight.borrow_mut();
                if !f.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    f.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

/// Single-flight, permanently caching texture loader.
pub struct TextureCache {
    inner: Rc<RefCell<Inner>>,
    source: Rc<dyn TextureSource>,
    tracer: Tracer,
}

impl fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let ready = inner
            .entries
            .values()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count();
        f.debug_struct("TextureCache")
            .field("ready", &ready)
            .field("loading", &(inner.entries.len() - ready))
            .finish_non_exhaustive()
    }
}

impl TextureCache {
    /// Creates an empty cache over `source`.
    #[must_use]
    pub fn new(source: Rc<dyn TextureSource>) -> Self {
        Self::with_tracer(source, Tracer::none())
    }

    /// Creates an empty cache that reports to `tracer`.
    #[must_use]
    pub fn with_tracer(source: Rc<dyn TextureSource>, tracer: Tracer) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::default())),
            source,
            tracer,
        }
    }

    /// Loads `url`, joining an in-flight fetch or returning the cached
    /// texture when there is one.
    pub fn load(&self, url: &str) -> TextureLoad {
        if url.is_empty() {
            return TextureLoad::done(Err(LoadError::InvalidArgument));
        }

        let flight = {
            let mut inner = self.inner.borrow_mut();
            match inner.entries.get(url) {
                Some(Entry::Ready(texture)) => {
                    self.tracer.texture(url, TextureOutcome::Deduplicated);
                    return TextureLoad::done(Ok(*texture));
                }
                Some(Entry::Loading(flight)) => {
                    self.tracer.texture(url, TextureOutcome::Deduplicated);
                    return TextureLoad {
                        state: LoadState::Waiting(Rc::clone(flight)),
                    };
                }
                None => {
                    let flight = FlightRef::default();
                    inner
                        .entries
                        .insert(url.to_string(), Entry::Loading(Rc::clone(&flight)));
                    flight
                }
            }
        };

        self.tracer.texture(url, TextureOutcome::Requested);
        let completion = LoadCompletion {
            url: url.to_string(),
            flight: Rc::clone(&flight),
            cache: Rc::downgrade(&self.inner),
            source: Rc::downgrade(&self.source),
            tracer: self.tracer.clone(),
            settled: false,
        };
        // The borrow is released: a source may settle synchronously.
        self.source.fetch(url, completion);

        TextureLoad {
            state: LoadState::Waiting(flight),
        }
    }

    /// Returns the texture for `url` if it has finished loading.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<TextureHandle> {
        match self.inner.borrow().entries.get(url) {
            Some(Entry::Ready(texture)) => Some(*texture),
            _ => None,
        }
    }

    /// Returns `true` if `url` has finished loading.
    #[must_use]
    pub fn has(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// Returns `true` if a fetch for `url` is in flight.
    #[must_use]
    pub fn is_loading(&self, url: &str) -> bool {
        matches!(self.inner.borrow().entries.get(url), Some(Entry::Loading(_)))
    }

    /// Number of resolved textures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .entries
            .values()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count()
    }

    /// Returns `true` if no texture has resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every resolved texture and forgets every entry.
    ///
    /// In-flight loads reject with [`LoadError::Cleared`]; their textures are
    /// released if they arrive later.
    pub fn clear(&self) {
        let entries = core::mem::take(&mut self.inner.borrow_mut().entries);
        for (_, entry) in entries {
            match entry {
                Entry::Ready(texture) => self.source.release(texture.id),
                Entry::Loading(flight) => flight.borrow_mut().settle(Err(LoadError::Cleared)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::task::Wake;
    use alloc::vec;
    use core::cell::Cell;
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct ManualSource {
        fetches: RefCell<Vec<String>>,
        pending: RefCell<Vec<LoadCompletion>>,
        released: RefCell<Vec<TextureId>>,
        next: Cell<u32>,
    }

    impl ManualSource {
        fn finish_ok(&self, width: u32, height: u32) -> TextureHandle {
            let completion = self.pending.borrow_mut().remove(0);
            let id = TextureId(self.next.get());
            self.next.set(id.0 + 1);
            let texture = TextureHandle { id, width, height };
            completion.resolve(texture);
            texture
        }

        fn finish_err(&self, error: LoadError) {
            let completion = self.pending.borrow_mut().remove(0);
            completion.reject(error);
        }
    }

    impl TextureSource for ManualSource {
        fn fetch(&self, url: &str, completion: LoadCompletion) {
            self.fetches.borrow_mut().push(url.to_string());
            self.pending.borrow_mut().push(completion);
        }

        fn release(&self, texture: TextureId) {
            self.released.borrow_mut().push(texture);
        }
    }

    fn setup() -> (Rc<ManualSource>, TextureCache) {
        let source = Rc::new(ManualSource::default());
        let cache = TextureCache::new(source.clone());
        (source, cache)
    }

    fn poll(fut: &mut TextureLoad) -> Poll<LoadResult> {
        let mut cx = Context::from_waker(Waker::noop());
        Pin::new(fut).poll(&mut cx)
    }

    #[test]
    fn empty_url_is_rejected_without_fetching() {
        let (source, cache) = setup();
        let mut fut = cache.load("");
        assert_eq!(poll(&mut fut), Poll::Ready(Err(LoadError::InvalidArgument)));
        assert!(source.fetches.borrow().is_empty(), "no fetch for empty url");
    }

    #[test]
    fn concurrent_loads_share_one_fetch() {
        let (source, cache) = setup();
        let mut a = cache.load("img.jpg");
        let mut b = cache.load("img.jpg");
        let mut c = cache.load("img.jpg");
        assert_eq!(source.fetches.borrow().len(), 1, "single-flight");
        assert!(poll(&mut a).is_pending());
        assert!(cache.is_loading("img.jpg"));

        let texture = source.finish_ok(800, 600);
        for fut in [&mut a, &mut b, &mut c] {
            assert_eq!(poll(fut), Poll::Ready(Ok(texture)));
        }
        assert!(cache.has("img.jpg"));
        assert_eq!(cache.get("img.jpg"), Some(texture));
    }

    #[test]
    fn resolved_entries_are_served_from_cache() {
        let (source, cache) = setup();
        let _first = cache.load("a.png");
        let texture = source.finish_ok(10, 10);
        let mut again = cache.load("a.png");
        assert_eq!(poll(&mut again), Poll::Ready(Ok(texture)));
        assert_eq!(source.fetches.borrow().len(), 1);
    }

    #[test]
    fn failure_rejects_all_waiters_and_allows_retry() {
        let (source, cache) = setup();
        let mut a = cache.load("bad.jpg");
        let mut b = cache.load("bad.jpg");
        source.finish_err(LoadError::Network("404".into()));
        let expected = Poll::Ready(Err(LoadError::Network("404".into())));
        assert_eq!(poll(&mut a), expected);
        assert_eq!(poll(&mut b), expected);
        assert!(!cache.has("bad.jpg") && !cache.is_loading("bad.jpg"));

        let _retry = cache.load("bad.jpg");
        assert_eq!(source.fetches.borrow().len(), 2, "failure must not be cached");
    }

    #[test]
    fn one_failure_does_not_block_other_urls() {
        let (source, cache) = setup();
        let mut bad = cache.load("bad.jpg");
        let mut good = cache.load("good.jpg");
        source.finish_err(LoadError::Decode("truncated".into()));
        let texture = source.finish_ok(4, 2);
        assert!(matches!(poll(&mut bad), Poll::Ready(Err(LoadError::Decode(_)))));
        assert_eq!(poll(&mut good), Poll::Ready(Ok(texture)));
    }

    #[test]
    fn dropped_completion_rejects() {
        let (source, cache) = setup();
        let mut fut = cache.load("x.jpg");
        source.pending.borrow_mut().clear();
        assert!(matches!(poll(&mut fut), Poll::Ready(Err(LoadError::Network(_)))));
        assert!(!cache.is_loading("x.jpg"));
    }

    #[test]
    fn clear_releases_and_rejects_in_flight() {
        let (source, cache) = setup();
        let _a = cache.load("a.jpg");
        let texture = source.finish_ok(1, 1);
        let mut b = cache.load("b.jpg");

        cache.clear();
        assert_eq!(*source.released.borrow(), vec![texture.id]);
        assert_eq!(poll(&mut b), Poll::Ready(Err(LoadError::Cleared)));
        assert!(cache.is_empty());

        // The orphaned fetch arrives late: its texture is released at once.
        let late = source.finish_ok(2, 2);
        assert_eq!(*source.released.borrow(), vec![texture.id, late.id]);
        assert!(!cache.has("b.jpg"), "late result must not repopulate");
    }

    #[test]
    fn synchronous_source_resolves_inside_load() {
        struct Instant;
        impl TextureSource for Instant {
            fn fetch(&self, _url: &str, completion: LoadCompletion) {
                completion.resolve(TextureHandle {
                    id: TextureId(9),
                    width: 3,
                    height: 1,
                });
            }
        }
        let cache = TextureCache::new(Rc::new(Instant));
        let mut fut = cache.load("now.jpg");
        assert!(matches!(poll(&mut fut), Poll::Ready(Ok(t)) if t.id == TextureId(9)));
        assert!(cache.has("now.jpg"));
    }

    #[test]
    fn waiters_are_woken_once_on_settle() {
        struct Counter(AtomicUsize);
        impl Wake for Counter {
            fn wake(self: Arc<Self>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);

        let (source, cache) = setup();
        let mut fut = cache.load("w.jpg");
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        source.finish_ok(1, 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1, "one wake per waker");
    }

    #[test]
    fn aspect_handles_zero_height() {
        let t = TextureHandle {
            id: TextureId(0),
            width: 200,
            height: 100,
        };
        assert_eq!(t.aspect(), 2.0);
        assert_eq!(TextureHandle { height: 0, ..t }.aspect(), 1.0);
    }
}
