use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use encoding_rs::UTF_8;
use forum_core::{
    ExtractMode, Freshness, ListingPage, ObstacleKind, PageData, PageRequest, RequestKind,
    SiteConfig, ThreadPage,
};
use forum_logging::{forum_debug, forum_info, forum_warn};
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::cache::{Clock, ForumCaches, StalenessCache, SystemClock};
use crate::classify::Classifier;
use crate::decode::{CharsetSource, DecodedDocument};
use crate::extract::{rules::strip_img_tags, ForumExtractor, ParseError};
use crate::fetch::ResilientFetcher;
use crate::render::{CommandRenderer, RenderFetcher, RenderGate};
use crate::session::{NoSession, SessionStore, StaticSession};
use crate::snapshot::SnapshotWriter;
use crate::transport::{ReqwestTransport, Transport};
use crate::{EngineError, EngineSettings, FetchOutcome, FetchedDocument, RetrievalError};

/// A page handed to a consumer, and where it came from.
#[derive(Debug)]
pub struct Delivery<T> {
    pub page: Arc<T>,
    pub freshness: Freshness,
}

impl<T> Clone for Delivery<T> {
    fn clone(&self) -> Self {
        Self {
            page: Arc::clone(&self.page),
            freshness: self.freshness,
        }
    }
}

/// Counters for problems that are swallowed rather than reported as errors.
#[derive(Debug, Default)]
pub struct Diagnostics {
    fetches: AtomicU64,
    obstacles: AtomicU64,
    renders: AtomicU64,
    parse_failures: AtomicU64,
    skipped_rows: AtomicU64,
    skipped_posts: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticsSnapshot {
    pub fetches: u64,
    pub obstacles: u64,
    pub renders: u64,
    pub parse_failures: u64,
    pub skipped_rows: u64,
    pub skipped_posts: u64,
}

impl Diagnostics {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            fetches: self.fetches.load(Ordering::Relaxed),
            obstacles: self.obstacles.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            skipped_rows: self.skipped_rows.load(Ordering::Relaxed),
            skipped_posts: self.skipped_posts.load(Ordering::Relaxed),
        }
    }
}

/// The per-kind parts of loading a page.
trait PageKind: Clone + Send + Sync + Sized + 'static {
    const LABEL: &'static str;

    fn cache(caches: &ForumCaches) -> &StalenessCache<Self>;
    fn parse(extractor: &ForumExtractor, html: &str, mode: ExtractMode) -> Result<Self, ParseError>;
    fn record_skips(&self, diagnostics: &Diagnostics);
    /// Fill in what the page itself did not say about the request.
    fn complete(&mut self, request: &PageRequest);
    /// Whether a result parsed in `mode` may enter the parsed cache.
    fn cacheable(mode: ExtractMode) -> bool;
    /// Cached result as seen by a request in `mode`.
    fn view(cached: Arc<Self>, mode: ExtractMode) -> Arc<Self>;
    fn into_data(self) -> PageData;
}

impl PageKind for ListingPage {
    const LABEL: &'static str = "listing";

    fn cache(caches: &ForumCaches) -> &StalenessCache<Self> {
        &caches.listings
    }

    fn parse(extractor: &ForumExtractor, html: &str, _mode: ExtractMode) -> Result<Self, ParseError> {
        extractor.extract_listing(html)
    }

    fn record_skips(&self, diagnostics: &Diagnostics) {
        Diagnostics::bump(&diagnostics.skipped_rows, self.skipped_rows as u64);
    }

    fn complete(&mut self, _request: &PageRequest) {}

    fn cacheable(_mode: ExtractMode) -> bool {
        true
    }

    fn view(cached: Arc<Self>, _mode: ExtractMode) -> Arc<Self> {
        cached
    }

    fn into_data(self) -> PageData {
        PageData::Listing(self)
    }
}

impl PageKind for ThreadPage {
    const LABEL: &'static str = "thread";

    fn cache(caches: &ForumCaches) -> &StalenessCache<Self> {
        &caches.threads
    }

    fn parse(extractor: &ForumExtractor, html: &str, mode: ExtractMode) -> Result<Self, ParseError> {
        extractor.extract_thread(html, mode)
    }

    fn record_skips(&self, diagnostics: &Diagnostics) {
        Diagnostics::bump(&diagnostics.skipped_posts, self.skipped_posts as u64);
    }

    fn complete(&mut self, request: &PageRequest) {
        // The post form is not on every page; the request knows the thread.
        if let RequestKind::Thread { thread_id, .. } = &request.kind {
            if self.thread_id == "0" {
                self.thread_id = thread_id.clone();
                for post in &mut self.posts {
                    post.thread_id = thread_id.clone();
                }
            }
        }
    }

    fn cacheable(mode: ExtractMode) -> bool {
        mode.is_full()
    }

    fn view(cached: Arc<Self>, mode: ExtractMode) -> Arc<Self> {
        let ExtractMode::Quick { limit } = mode else {
            return cached;
        };
        let mut quick = (*cached).clone();
        quick.posts.truncate(limit);
        for post in &mut quick.posts {
            post.rich_content = strip_img_tags(&post.rich_content);
        }
        quick.mode = mode;
        Arc::new(quick)
    }

    fn into_data(self) -> PageData {
        PageData::Thread(self)
    }
}

struct ClientInner {
    site: SiteConfig,
    fetcher: ResilientFetcher,
    extractor: ForumExtractor,
    caches: ForumCaches,
    render: Option<RenderGate>,
    render_on_auth: bool,
    snapshots: Option<SnapshotWriter>,
    diagnostics: Diagnostics,
}

/// Cache-aware access to forum listings and threads.
///
/// Cheap to clone; clones share caches, counters and the render gate.
#[derive(Clone)]
pub struct ForumClient {
    inner: Arc<ClientInner>,
}

pub struct ForumClientBuilder {
    settings: EngineSettings,
    transport: Option<Arc<dyn Transport>>,
    session: Option<Arc<dyn SessionStore>>,
    renderer: Option<Arc<dyn RenderFetcher>>,
    clock: Option<Arc<dyn Clock>>,
    classifier: Option<Classifier>,
}

impl ForumClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn RenderFetcher>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> Result<ForumClient, EngineError> {
        let settings = self.settings;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&settings.transport)?),
        };
        let session: Arc<dyn SessionStore> = match (self.session, &settings.cookie) {
            (Some(session), _) => session,
            (None, Some(cookie)) => Arc::new(StaticSession::new(cookie.clone())),
            (None, None) => Arc::new(NoSession),
        };
        let renderer = self.renderer.or_else(|| {
            let command = settings.render.command.as_deref()?;
            let renderer = CommandRenderer::from_command(command, settings.render.timeout)?;
            Some(Arc::new(renderer) as Arc<dyn RenderFetcher>)
        });
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let fetcher = ResilientFetcher::new(
            transport,
            session,
            self.classifier.unwrap_or_default(),
            settings.decode.clone(),
            settings.fetch.clone(),
        );

        Ok(ForumClient {
            inner: Arc::new(ClientInner {
                extractor: ForumExtractor::new(settings.site.clone(), settings.extract.clone()),
                site: settings.site,
                fetcher,
                caches: ForumCaches::new(&settings.cache, clock),
                render: renderer.map(|renderer| RenderGate::new(renderer, settings.render.slots)),
                render_on_auth: settings.render.render_on_auth,
                snapshots: settings.snapshot_dir.map(SnapshotWriter::new),
                diagnostics: Diagnostics::default(),
            }),
        })
    }
}

enum WatchStep {
    Start,
    Revalidate,
    Done,
}

impl ForumClient {
    pub fn builder(settings: EngineSettings) -> ForumClientBuilder {
        ForumClientBuilder {
            settings,
            transport: None,
            session: None,
            renderer: None,
            clock: None,
            classifier: None,
        }
    }

    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        Self::builder(settings).build()
    }

    pub fn site(&self) -> &SiteConfig {
        &self.inner.site
    }

    pub fn caches(&self) -> &ForumCaches {
        &self.inner.caches
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.inner.diagnostics.snapshot()
    }

    /// A listing page, from cache while it is within its window.
    pub async fn get_listing(
        &self,
        forum_id: &str,
        page: u32,
    ) -> Result<Delivery<ListingPage>, RetrievalError> {
        self.get(&PageRequest::listing(forum_id, page)).await
    }

    /// A thread page, from cache while it is within its window. Quick
    /// requests may be answered from a cached full result.
    pub async fn get_thread(
        &self,
        thread_id: &str,
        page: u32,
        mode: ExtractMode,
    ) -> Result<Delivery<ThreadPage>, RetrievalError> {
        self.get(&PageRequest::thread(thread_id, page, mode)).await
    }

    /// Cached result (possibly stale) first, then a fresh one if it was stale or missing.
    pub fn watch_listing(
        &self,
        forum_id: &str,
        page: u32,
    ) -> BoxStream<'static, Result<Delivery<ListingPage>, RetrievalError>> {
        self.watch(PageRequest::listing(forum_id, page))
    }

    pub fn watch_thread(
        &self,
        thread_id: &str,
        page: u32,
        mode: ExtractMode,
    ) -> BoxStream<'static, Result<Delivery<ThreadPage>, RetrievalError>> {
        self.watch(PageRequest::thread(thread_id, page, mode))
    }

    /// [`Self::watch_listing`] or [`Self::watch_thread`] by request, as owned page data.
    pub fn watch_page(
        &self,
        request: PageRequest,
    ) -> BoxStream<'static, Result<(PageData, Freshness), RetrievalError>> {
        fn owned<P: PageKind>(
            delivered: Result<Delivery<P>, RetrievalError>,
        ) -> Result<(PageData, Freshness), RetrievalError> {
            delivered.map(|d| ((*d.page).clone().into_data(), d.freshness))
        }
        match request.kind {
            RequestKind::Listing { .. } => self.watch::<ListingPage>(request).map(owned).boxed(),
            RequestKind::Thread { .. } => self.watch::<ThreadPage>(request).map(owned).boxed(),
        }
    }

    async fn get<P: PageKind>(&self, request: &PageRequest) -> Result<Delivery<P>, RetrievalError> {
        match self.lookup::<P>(request) {
            Some((page, false)) => Ok(Delivery {
                page,
                freshness: Freshness::Cached,
            }),
            Some((_, true)) => self.load(request, false).await,
            None => self.load(request, true).await,
        }
    }

    fn watch<P: PageKind>(
        &self,
        request: PageRequest,
    ) -> BoxStream<'static, Result<Delivery<P>, RetrievalError>> {
        let client = self.clone();
        stream::unfold(WatchStep::Start, move |step| {
            let client = client.clone();
            let request = request.clone();
            async move {
                match step {
                    WatchStep::Start => match client.lookup::<P>(&request) {
                        Some((page, false)) => Some((
                            Ok(Delivery {
                                page,
                                freshness: Freshness::Cached,
                            }),
                            WatchStep::Done,
                        )),
                        Some((page, true)) => Some((
                            Ok(Delivery {
                                page,
                                freshness: Freshness::Stale,
                            }),
                            WatchStep::Revalidate,
                        )),
                        None => Some((client.load(&request, true).await, WatchStep::Done)),
                    },
                    WatchStep::Revalidate => {
                        Some((client.load(&request, false).await, WatchStep::Done))
                    }
                    WatchStep::Done => None,
                }
            }
        })
        .boxed()
    }

    /// Cached page for `request` and whether it is past its window.
    fn lookup<P: PageKind>(&self, request: &PageRequest) -> Option<(Arc<P>, bool)> {
        let cache = P::cache(&self.inner.caches);
        let entry = cache.get(&request.cache_key(&self.inner.site))?;
        let stale = cache.is_expired(&entry);
        let mode = request.mode().unwrap_or_default();
        Some((P::view(entry.value, mode), stale))
    }

    /// Fetch, parse and cache. `allow_raw` lets a recent raw document stand in for a fetch.
    async fn load<P: PageKind>(
        &self,
        request: &PageRequest,
        allow_raw: bool,
    ) -> Result<Delivery<P>, RetrievalError> {
        let url = request.url(&self.inner.site);
        let key = request.cache_key(&self.inner.site);
        let mode = request.mode().unwrap_or_default();

        let document = self.document(&url, &key, allow_raw).await?;
        let mut page = match self.parse::<P>(&url, document, mode).await {
            Ok(page) => page,
            Err(err) => {
                // A page that will not parse must not stand in for the next fetch.
                self.inner.caches.raw.invalidate(&key);
                return Err(err);
            }
        };
        page.complete(request);
        page.record_skips(&self.inner.diagnostics);

        let page = if P::cacheable(mode) {
            P::cache(&self.inner.caches).put(key, page).value
        } else {
            Arc::new(page)
        };
        Ok(Delivery {
            page,
            freshness: Freshness::Fresh,
        })
    }

    async fn document(
        &self,
        url: &str,
        key: &str,
        allow_raw: bool,
    ) -> Result<Arc<FetchedDocument>, RetrievalError> {
        let raw = &self.inner.caches.raw;
        if allow_raw {
            if let Some(entry) = raw.get(key).filter(|entry| !raw.is_expired(entry)) {
                forum_debug!("reusing raw document for {url}");
                return Ok(entry.value);
            }
        }
        let document = self.retrieve(url).await?;
        Ok(raw.put(key, document).value)
    }

    async fn retrieve(&self, url: &str) -> Result<FetchedDocument, RetrievalError> {
        let inner = &self.inner;
        Diagnostics::bump(&inner.diagnostics.fetches, 1);
        match inner.fetcher.fetch(url).await {
            FetchOutcome::Success(document) => Ok(document),
            FetchOutcome::ObstacleDetected { kind, .. } => {
                Diagnostics::bump(&inner.diagnostics.obstacles, 1);
                match &inner.render {
                    Some(gate) if self.should_render(kind) => self.render_fallback(gate, url).await,
                    _ => Err(RetrievalError::Obstacle {
                        kind,
                        url: url.to_string(),
                    }),
                }
            }
            FetchOutcome::TransientError(failure) => Err(RetrievalError::Transient(failure)),
            FetchOutcome::ClientError(failure) => Err(RetrievalError::Http(failure)),
        }
    }

    fn should_render(&self, kind: ObstacleKind) -> bool {
        match kind {
            ObstacleKind::AntiBotChallenge => true,
            ObstacleKind::AuthenticationRequired => self.inner.render_on_auth,
            ObstacleKind::HumanVerificationRequired | ObstacleKind::PermissionDenied => false,
        }
    }

    async fn render_fallback(
        &self,
        gate: &RenderGate,
        url: &str,
    ) -> Result<FetchedDocument, RetrievalError> {
        Diagnostics::bump(&self.inner.diagnostics.renders, 1);
        let rendered = gate.render(url).await.map_err(|err| RetrievalError::Render {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        // The browser may have landed on the same wall.
        if let Some(kind) = self.inner.fetcher.classifier().classify(&rendered.document) {
            forum_info!("render fallback for {url} still blocked: {kind}");
            return Err(RetrievalError::Obstacle {
                kind,
                url: url.to_string(),
            });
        }

        Ok(FetchedDocument {
            url: url.to_string(),
            final_url: rendered.final_url,
            status: rendered.http_status.unwrap_or(200),
            document: DecodedDocument {
                text: rendered.document,
                encoding: UTF_8,
                source: CharsetSource::Rendered,
                had_replacements: false,
            },
        })
    }

    async fn parse<P: PageKind>(
        &self,
        url: &str,
        document: Arc<FetchedDocument>,
        mode: ExtractMode,
    ) -> Result<P, RetrievalError> {
        let extractor = self.inner.extractor.clone();
        let task_document = Arc::clone(&document);
        let parsed = tokio::task::spawn_blocking(move || {
            P::parse(&extractor, &task_document.document.text, mode)
        })
        .await
        .unwrap_or_else(|err| Err(ParseError::Aborted(err.to_string())));

        parsed.map_err(|source| {
            Diagnostics::bump(&self.inner.diagnostics.parse_failures, 1);
            forum_warn!("failed to parse {} page {url}: {source}", P::LABEL);
            if let Some(writer) = &self.inner.snapshots {
                match writer.write(P::LABEL, url, &document.document.text) {
                    Ok(path) => forum_info!("saved snapshot of {url} to {}", path.display()),
                    Err(err) => forum_warn!("could not save snapshot of {url}: {err}"),
                }
            }
            RetrievalError::Parse {
                url: url.to_string(),
                source,
            }
        })
    }
}
