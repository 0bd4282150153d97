//! # Data Service
//!
//! The one object the application talks to. It owns every cache, the write
//! coordinator and the outbox, and is constructed once by the composition
//! root and handed out by clone.
//!
//! ## Read Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  get_all_villages / pricing / customers / notes                        │
//! │       └─► CollectionCache ──miss──► query ► decode ► dedup ► sort      │
//! │                                                                         │
//! │  get_sales_page / get_notes_page                                        │
//! │       └─► PaginatedCursorCache (page one only) ──► query after cursor  │
//! │                                                                         │
//! │  get_sales_by_date_range / load_dashboard / load_period_report         │
//! │       └─► DateRangeCache (single slot, exact bounds)                   │
//! │                                                                         │
//! │  get_note(id)                                                           │
//! │       └─► EntityLruCache (5 most recently read notes)                  │
//! │                                                                         │
//! │  Store failure on a read: stale cached data if held, else the error.   │
//! │  Undecodable documents are logged and skipped.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Paths
//! Every write validates its input, clears the caches of the kinds it
//! touches before returning, and hands the store operation to the
//! [`SyncCoordinator`]. The returned [`WriteTicket`] is already in the
//! acknowledged state.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use goldtea_sync::{DataServiceBuilder, GoldteaConfig, MemoryStore};
//!
//! # async fn demo() -> goldtea_sync::SyncResult<()> {
//! let service = DataServiceBuilder::new(GoldteaConfig::default())
//!     .with_store(Arc::new(MemoryStore::new()))
//!     .build()?;
//!
//! let villages = service.get_all_villages(false).await?;
//! println!("{} villages", villages.len());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use goldtea_core::identity;
use goldtea_core::report::{dashboard_range, DashboardSummary, PeriodReport, ReportPeriod};
use goldtea_core::validation::{
    validate_name, validate_new_sale, validate_note, validate_page_size, validate_pricing,
    validate_sale,
};
use goldtea_core::{
    Collection, CoreError, Cursor, Customer, Document, DocumentQuery, Filter, Money, NewSale,
    Note, Pricing, Sale, Village, DEFAULT_TEA_TYPE,
};

use crate::cache::{CollectionCache, DateRangeCache, EntityLruCache, Page, PaginatedCursorCache};
use crate::config::GoldteaConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityPollerHandle, TcpProbe};
use crate::coordinator::{Reconcile, SyncCoordinator, WriteOp, WriteTicket};
use crate::entity::{CanonicalEntity, Entity, TimelineEntity};
use crate::error::{SyncError, SyncResult};
use crate::outbox::{MemoryOutbox, OutboxProcessor, OutboxProcessorHandle, OutboxStore};
use crate::store::RemoteStore;

// =============================================================================
// Store Helpers
// =============================================================================

/// Decodes documents, skipping the ones that do not parse.
fn decode_all<T: Entity>(docs: Vec<Document>) -> Vec<(String, T)> {
    docs.into_iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(record) => {
                let record = record.with_document_id(&doc.id);
                Some((doc.id, record))
            }
            Err(e) => {
                warn!(collection = %T::COLLECTION, id = %doc.id, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}

/// Keeps one record per logical key, preferring the one stored under its
/// canonical id, then sorts case-insensitively.
fn dedup_by_logical_key<T: CanonicalEntity>(records: Vec<(String, T)>) -> Vec<T> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<(String, T)> = Vec::with_capacity(records.len());

    for (id, record) in records {
        let key = record.logical_key();
        if key.trim().is_empty() {
            debug!(collection = %T::COLLECTION, id = %id, "Skipping record without a logical key");
            continue;
        }
        match index.get(&key) {
            Some(&slot) => {
                if id == key && kept[slot].0 != key {
                    kept[slot] = (id, record);
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push((id, record));
            }
        }
    }

    let mut records: Vec<T> = kept.into_iter().map(|(_, record)| record).collect();
    records.sort_by_cached_key(|record| record.sort_key());
    records
}

async fn load_canonical<T: CanonicalEntity>(
    store: &dyn RemoteStore,
    filters: Vec<Filter>,
) -> SyncResult<Vec<T>> {
    let query = DocumentQuery::new()
        .filters(filters)
        .order_by(T::listing_order());
    let docs = store.query(T::COLLECTION, &query).await?;
    Ok(dedup_by_logical_key(decode_all::<T>(docs)))
}

async fn load_timeline<T: TimelineEntity>(store: &dyn RemoteStore) -> SyncResult<Vec<T>> {
    let query = DocumentQuery::new().order_by(T::timeline_order());
    let docs = store.query(T::COLLECTION, &query).await?;
    Ok(decode_all::<T>(docs).into_iter().map(|(_, r)| r).collect())
}

async fn fetch_page<T: TimelineEntity>(
    store: &dyn RemoteStore,
    page_size: usize,
    cursor: Option<Cursor>,
) -> SyncResult<Page<T>> {
    let order = T::timeline_order();
    let query = DocumentQuery::new()
        .order_by(order.clone())
        .limit(page_size)
        .start_after(cursor);
    let docs = store.query(T::COLLECTION, &query).await?;

    // Positioned on the last document returned, parsed or not
    let next_cursor = docs.last().map(|doc| Cursor::at(doc, &order));
    let fetched = docs.len();
    let items = decode_all::<T>(docs).into_iter().map(|(_, r)| r).collect();
    Ok(Page {
        items,
        next_cursor,
        fetched,
    })
}

async fn fetch_sales_between(
    store: &dyn RemoteStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> SyncResult<Vec<Sale>> {
    let query = DocumentQuery::new()
        .filter(Filter::gte("date", start.timestamp_millis()))
        .filter(Filter::lte("date", end.timestamp_millis()))
        .order_by(Sale::timeline_order());
    let docs = store.query(Collection::Sales, &query).await?;
    Ok(decode_all::<Sale>(docs).into_iter().map(|(_, r)| r).collect())
}

// =============================================================================
// Service State
// =============================================================================

struct ServiceInner {
    config: GoldteaConfig,
    store: Arc<dyn RemoteStore>,
    outbox: Option<Arc<dyn OutboxStore>>,
    coordinator: SyncCoordinator,
    runtime: Handle,

    villages: CollectionCache<Village>,
    pricing: CollectionCache<Pricing>,
    customers: CollectionCache<Customer>,
    notes: CollectionCache<Note>,
    sales_page: PaginatedCursorCache<Sale>,
    notes_page: PaginatedCursorCache<Note>,
    sales_range: DateRangeCache<Sale>,
    note_by_id: EntityLruCache<Note>,
}

impl ServiceInner {
    /// Clears every cache holding records of `collection`.
    fn invalidate(&self, collection: Collection) {
        match collection {
            Collection::Sales => {
                self.sales_page.invalidate();
                self.sales_range.invalidate();
            }
            Collection::Villages => self.villages.invalidate(),
            Collection::Pricing => self.pricing.invalidate(),
            Collection::Customers => self.customers.invalidate(),
            Collection::Notes => {
                self.notes.invalidate();
                self.notes_page.invalidate();
                self.note_by_id.invalidate_all();
            }
        }
        debug!(collection = %collection, "Invalidated caches");
    }

    fn submit_canonical<T: CanonicalEntity>(&self, record: &T) -> SyncResult<WriteTicket> {
        let data = serde_json::to_value(record)?;
        self.invalidate(T::COLLECTION);
        Ok(self.coordinator.submit(WriteOp::Upsert {
            collection: T::COLLECTION,
            id: record.logical_key(),
            data,
            reconcile: Some(Reconcile {
                filters: record.reconcile_filters(),
            }),
        }))
    }

    fn submit_upsert<T: Entity>(&self, record: &T) -> SyncResult<WriteTicket> {
        let data = serde_json::to_value(record)?;
        self.invalidate(T::COLLECTION);
        Ok(self.coordinator.submit(WriteOp::Upsert {
            collection: T::COLLECTION,
            id: record.document_id(),
            data,
            reconcile: None,
        }))
    }

    fn submit_delete(&self, collection: Collection, id: String) -> WriteTicket {
        self.invalidate(collection);
        self.coordinator.submit(WriteOp::Delete { collection, id })
    }
}

fn require_id(entity: &str, id: &str) -> SyncResult<()> {
    if id.trim().is_empty() {
        return Err(CoreError::MissingId {
            entity: entity.to_string(),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Data Service
// =============================================================================

/// Cached reads and optimistic writes over a [`RemoteStore`].
///
/// Cloning is cheap; every clone shares the same caches.
#[derive(Clone)]
pub struct DataService {
    config: Arc<GoldteaConfig>,
    inner: Option<Arc<ServiceInner>>,
    connectivity: ConnectivityMonitor,
}

impl DataService {
    /// A service with no store behind it.
    ///
    /// Reads return empty results; writes and single-note lookups fail with
    /// [`SyncError::NotInitialized`].
    pub fn detached(config: GoldteaConfig) -> Self {
        DataService {
            config: Arc::new(config),
            inner: None,
            connectivity: ConnectivityMonitor::new(),
        }
    }

    fn inner(&self) -> SyncResult<&Arc<ServiceInner>> {
        self.inner.as_ref().ok_or(SyncError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    pub fn config(&self) -> &GoldteaConfig {
        &self.config
    }

    /// Connectivity status for display. Reads and writes never wait on it.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    // =========================================================================
    // Full Listings
    // =========================================================================

    pub async fn get_all_villages(&self, force_refresh: bool) -> SyncResult<Vec<Village>> {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        let store = inner.store.as_ref();
        inner
            .villages
            .get_or_fetch(force_refresh, || load_canonical::<Village>(store, Vec::new()))
            .await
    }

    pub async fn get_all_pricing(&self, force_refresh: bool) -> SyncResult<Vec<Pricing>> {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        let store = inner.store.as_ref();
        inner
            .pricing
            .get_or_fetch(force_refresh, || load_canonical::<Pricing>(store, Vec::new()))
            .await
    }

    pub async fn get_all_customers(&self, force_refresh: bool) -> SyncResult<Vec<Customer>> {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        let store = inner.store.as_ref();
        inner
            .customers
            .get_or_fetch(force_refresh, || load_canonical::<Customer>(store, Vec::new()))
            .await
    }

    /// Every note, most recently edited first.
    pub async fn get_all_notes(&self, force_refresh: bool) -> SyncResult<Vec<Note>> {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        let store = inner.store.as_ref();
        inner
            .notes
            .get_or_fetch(force_refresh, || load_timeline::<Note>(store))
            .await
    }

    /// Pricing rows for one tea type, read live.
    pub async fn get_pricing_by_tea_type(&self, tea_type: &str) -> SyncResult<Vec<Pricing>> {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        let filters = vec![Filter::eq("tea_type", tea_type.trim())];
        load_canonical::<Pricing>(inner.store.as_ref(), filters).await
    }

    /// Customers of one village, read live.
    pub async fn get_customers_by_village(&self, village: &str) -> SyncResult<Vec<Customer>> {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        let filters = vec![Filter::eq("village", village.trim())];
        load_canonical::<Customer>(inner.store.as_ref(), filters).await
    }

    // =========================================================================
    // Paginated Listings
    // =========================================================================

    /// One page of sales, newest first.
    ///
    /// Pass the previous page's `next_cursor` to continue. A page shorter
    /// than `page_size` is the last one.
    pub async fn get_sales_page(
        &self,
        page_size: usize,
        cursor: Option<Cursor>,
        force_refresh: bool,
    ) -> SyncResult<Page<Sale>> {
        validate_page_size(page_size)?;
        let Some(inner) = &self.inner else {
            return Ok(Page::empty());
        };
        let store = inner.store.as_ref();
        inner
            .sales_page
            .get_page(page_size, cursor, force_refresh, |size, cursor| {
                fetch_page::<Sale>(store, size, cursor)
            })
            .await
    }

    /// One page of notes, most recently edited first.
    pub async fn get_notes_page(
        &self,
        page_size: usize,
        cursor: Option<Cursor>,
        force_refresh: bool,
    ) -> SyncResult<Page<Note>> {
        validate_page_size(page_size)?;
        let Some(inner) = &self.inner else {
            return Ok(Page::empty());
        };
        let store = inner.store.as_ref();
        inner
            .notes_page
            .get_page(page_size, cursor, force_refresh, |size, cursor| {
                fetch_page::<Note>(store, size, cursor)
            })
            .await
    }

    /// Sales dated within `[start, end]`, newest first.
    pub async fn get_sales_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        force_refresh: bool,
    ) -> SyncResult<Vec<Sale>> {
        if start > end {
            return Err(SyncError::InvalidQuery(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        let store = inner.store.as_ref();
        inner
            .sales_range
            .get_or_fetch(start, end, force_refresh, || {
                fetch_sales_between(store, start, end)
            })
            .await
    }

    // =========================================================================
    // Single Note
    // =========================================================================

    pub async fn get_note(&self, id: &str) -> SyncResult<Note> {
        let inner = self.inner()?;
        require_id("Note", id)?;
        let store = inner.store.as_ref();

        inner
            .note_by_id
            .get_or_fetch(id, || async move {
                match store.get_by_id(Collection::Notes, id).await? {
                    Some(doc) => {
                        let note: Note = doc.decode()?;
                        Ok(note.with_document_id(&doc.id))
                    }
                    None => Err(SyncError::not_found(Collection::Notes.as_str(), id)),
                }
            })
            .await
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Month-to-date dashboard figures as of `now`.
    pub async fn load_dashboard<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> SyncResult<DashboardSummary> {
        let (start, end) = dashboard_range(now);
        let sales = self.get_sales_by_date_range(start, end, false).await?;
        Ok(DashboardSummary::from_sales(&sales, now))
    }

    pub async fn load_period_report<Tz: TimeZone>(
        &self,
        period: ReportPeriod,
        now: &DateTime<Tz>,
    ) -> SyncResult<PeriodReport> {
        let (start, end) = period.range(now);
        let sales = self.get_sales_by_date_range(start, end, false).await?;
        Ok(PeriodReport::from_sales(period, &sales, now))
    }

    // =========================================================================
    // Writes: Canonical Records
    // =========================================================================

    /// Adds or updates a village under its trimmed name.
    pub fn add_village(&self, village: &Village) -> SyncResult<WriteTicket> {
        let inner = self.inner()?;
        let village = Village::new(&village.name, &village.day, village.added_on);
        validate_name("name", &village.name)?;
        inner.submit_canonical(&village)
    }

    /// Deletes the village stored under the canonical id for `name`.
    pub fn delete_village(&self, name: &str) -> SyncResult<WriteTicket> {
        let inner = self.inner()?;
        validate_name("name", name)?;
        Ok(inner.submit_delete(Collection::Villages, identity::village_id(name)))
    }

    /// Writes a rate under its `teaType_package` key. An empty tea type is
    /// stored as the default blend.
    pub fn update_pricing(&self, pricing: &Pricing) -> SyncResult<WriteTicket> {
        let inner = self.inner()?;
        let mut pricing = Pricing::new(&pricing.tea_type, &pricing.package, pricing.rate, Utc::now());
        if pricing.tea_type.is_empty() {
            pricing.tea_type = DEFAULT_TEA_TYPE.to_string();
        }
        validate_pricing(&pricing)?;
        inner.submit_canonical(&pricing)
    }

    pub fn delete_pricing(&self, tea_type: &str, package: &str) -> SyncResult<WriteTicket> {
        let inner = self.inner()?;
        validate_name("package", package)?;
        Ok(inner.submit_delete(Collection::Pricing, identity::pricing_key(tea_type, package)))
    }

    pub fn add_customer(&self, customer: &Customer) -> SyncResult<WriteTicket> {
        let inner = self.inner()?;
        let customer = Customer::new(&customer.village, &customer.customer_name, customer.added_on);
        validate_name("village", &customer.village)?;
        validate_name("customer_name", &customer.customer_name)?;
        inner.submit_canonical(&customer)
    }

    pub fn delete_customer(&self, village: &str, customer_name: &str) -> SyncResult<WriteTicket> {
        let inner = self.inner()?;
        validate_name("village", village)?;
        validate_name("customer_name", customer_name)?;
        Ok(inner.submit_delete(
            Collection::Customers,
            identity::customer_id(village, customer_name),
        ))
    }

    // =========================================================================
    // Writes: Sales
    // =========================================================================

    /// Records a new sale and remembers its customer for autocomplete.
    ///
    /// The customer write is best effort; its failure never affects the sale.
    pub fn add_sale(&self, input: NewSale) -> SyncResult<(Sale, WriteTicket)> {
        let inner = self.inner()?;
        validate_new_sale(&input)?;

        let sale = Sale::from_new(input, Utc::now());
        let ticket = inner.submit_upsert(&sale)?;
        info!(id = %sale.id, village = %sale.village, total = %sale.total_amount, "Sale recorded");

        let customer = Customer::new(&sale.village, &sale.customer_name, sale.created_at);
        if let Err(e) = inner.submit_canonical(&customer) {
            debug!(customer = %customer.canonical_id(), error = %e, "Skipped customer side write");
        }

        Ok((sale, ticket))
    }

    /// Saves an edited sale with its balance and status re-derived.
    pub fn update_sale(&self, sale: &Sale) -> SyncResult<(Sale, WriteTicket)> {
        let inner = self.inner()?;
        require_id("Sale", &sale.id)?;

        let mut sale = sale.clone();
        sale.recompute_balance();
        sale.touch(Utc::now());
        validate_sale(&sale)?;

        let ticket = inner.submit_upsert(&sale)?;
        Ok((sale, ticket))
    }

    /// Collects a further payment against a sale's balance.
    pub fn record_payment(&self, sale: &Sale, amount: Money) -> SyncResult<(Sale, WriteTicket)> {
        let inner = self.inner()?;
        require_id("Sale", &sale.id)?;

        let mut sale = sale.clone();
        sale.apply_payment(amount, Utc::now())?;

        let ticket = inner.submit_upsert(&sale)?;
        info!(id = %sale.id, amount = %amount, balance = %sale.balance, "Payment recorded");
        Ok((sale, ticket))
    }

    pub fn delete_sale(&self, id: &str) -> SyncResult<WriteTicket> {
        let inner = self.inner()?;
        require_id("Sale", id)?;
        Ok(inner.submit_delete(Collection::Sales, id.to_string()))
    }

    // =========================================================================
    // Writes: Notes
    // =========================================================================

    pub fn add_note(&self, title: &str, content: &str) -> SyncResult<(Note, WriteTicket)> {
        let inner = self.inner()?;
        let note = Note::new(title, content, Utc::now());
        validate_note(&note)?;
        let ticket = inner.submit_upsert(&note)?;
        Ok((note, ticket))
    }

    pub fn update_note(&self, note: &Note) -> SyncResult<(Note, WriteTicket)> {
        let inner = self.inner()?;
        require_id("Note", &note.id)?;

        let mut note = note.clone();
        note.touch(Utc::now());
        validate_note(&note)?;

        let ticket = inner.submit_upsert(&note)?;
        Ok((note, ticket))
    }

    pub fn delete_note(&self, id: &str) -> SyncResult<WriteTicket> {
        let inner = self.inner()?;
        require_id("Note", id)?;
        Ok(inner.submit_delete(Collection::Notes, id.to_string()))
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    pub fn invalidate_sales_cache(&self) {
        self.invalidate(Collection::Sales);
    }

    pub fn invalidate_villages_cache(&self) {
        self.invalidate(Collection::Villages);
    }

    pub fn invalidate_pricing_cache(&self) {
        self.invalidate(Collection::Pricing);
    }

    pub fn invalidate_customers_cache(&self) {
        self.invalidate(Collection::Customers);
    }

    pub fn invalidate_notes_cache(&self) {
        self.invalidate(Collection::Notes);
    }

    pub fn invalidate_all_caches(&self) {
        for collection in Collection::ALL {
            self.invalidate(collection);
        }
        info!("All caches cleared");
    }

    fn invalidate(&self, collection: Collection) {
        if let Some(inner) = &self.inner {
            inner.invalidate(collection);
        }
    }

    // =========================================================================
    // Background Work
    // =========================================================================

    /// Writes queued for retry, including ones that ran out of attempts.
    pub async fn pending_write_count(&self) -> SyncResult<u64> {
        match self.inner.as_ref().and_then(|inner| inner.outbox.as_ref()) {
            Some(outbox) => outbox.count_pending().await,
            None => Ok(0),
        }
    }

    /// Spawns the outbox processor. Returns `None` when there is no outbox.
    ///
    /// Replayed writes clear the caches of their collection.
    pub fn start_outbox_processor(&self) -> Option<OutboxProcessorHandle> {
        let inner = self.inner.as_ref()?;
        let outbox = inner.outbox.clone()?;

        let weak: Weak<ServiceInner> = Arc::downgrade(inner);
        let (processor, handle) =
            OutboxProcessor::new(Arc::clone(&inner.store), outbox, inner.config.outbox.clone());
        let processor = processor.on_replayed(Arc::new(move |collection| {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate(collection);
            }
        }));

        inner.runtime.spawn(processor.run());
        Some(handle)
    }

    /// Starts probing the configured address and feeding the monitor.
    pub fn start_connectivity_polling(&self) -> ConnectivityPollerHandle {
        let settings = &self.config.connectivity;
        self.connectivity
            .spawn_polling(Arc::new(TcpProbe::from_settings(settings)), settings.poll_interval())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for creating a [`DataService`].
pub struct DataServiceBuilder {
    config: GoldteaConfig,
    store: Option<Arc<dyn RemoteStore>>,
    outbox: Option<Arc<dyn OutboxStore>>,
    connectivity: Option<ConnectivityMonitor>,
}

impl DataServiceBuilder {
    pub fn new(config: GoldteaConfig) -> Self {
        DataServiceBuilder {
            config,
            store: None,
            outbox: None,
            connectivity: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Outbox for failed writes. Defaults to a [`MemoryOutbox`] when the
    /// outbox is enabled in config.
    pub fn with_outbox(mut self, outbox: Arc<dyn OutboxStore>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn with_connectivity(mut self, monitor: ConnectivityMonitor) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    /// Builds the service. Must be called inside a Tokio runtime.
    pub fn build(self) -> SyncResult<DataService> {
        self.config.validate()?;

        let store = self
            .store
            .ok_or_else(|| SyncError::InvalidConfig("Store required".into()))?;
        let runtime = Handle::try_current()
            .map_err(|e| SyncError::Internal(format!("No Tokio runtime: {}", e)))?;

        let outbox = if self.config.is_outbox_enabled() {
            Some(
                self.outbox
                    .unwrap_or_else(|| Arc::new(MemoryOutbox::new()) as Arc<dyn OutboxStore>),
            )
        } else {
            None
        };

        let ttl = self.config.cache_ttl();
        let capacity = self.config.cache.note_cache_capacity;
        info!(
            backend = store.backend(),
            ttl_ms = ttl.as_millis() as u64,
            outbox = outbox.is_some(),
            "Data service ready"
        );

        let inner = ServiceInner {
            coordinator: SyncCoordinator::new(Arc::clone(&store), outbox.clone(), runtime.clone()),
            store,
            outbox,
            runtime,
            villages: CollectionCache::new("villages", ttl),
            pricing: CollectionCache::new("pricing", ttl),
            customers: CollectionCache::new("customers", ttl),
            notes: CollectionCache::new("notes", ttl),
            sales_page: PaginatedCursorCache::new("sales_page", ttl),
            notes_page: PaginatedCursorCache::new("notes_page", ttl),
            sales_range: DateRangeCache::new("sales_range", ttl),
            note_by_id: EntityLruCache::new("note_by_id", capacity, ttl),
            config: self.config.clone(),
        };

        Ok(DataService {
            config: Arc::new(self.config),
            inner: Some(Arc::new(inner)),
            connectivity: self.connectivity.unwrap_or_default(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
