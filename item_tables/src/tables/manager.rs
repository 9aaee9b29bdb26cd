//! Table identity manager with a name to id cache.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use super::{
    config::TablesConfig,
    errors::{TableError, TableResult},
    models::{CategoryId, CategoryTable, Table, TableId, TableInfo},
    store::TableStore,
};

/// Default lifetime of a cache entry
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    id: TableId,
    cached_at: Instant,
}

/// Resolves table names to ids and mediates the identity lifecycle
///
/// The cache is advisory. A hit is only returned after the store confirms the
/// id still belongs to a table with that name, and entries older than the TTL
/// are re-resolved. Any other writer can therefore rename or delete tables
/// without leaving this manager handing out stale ids.
pub struct TableManager {
    /// Record store
    store: Arc<dyn TableStore>,

    /// Name to id cache; one name per id, one id per name
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// Maximum age of a trusted entry
    cache_ttl: Duration,
}

impl TableManager {
    /// Create a new table manager
    ///
    /// # Arguments
    ///
    /// * `store` - Record store the identities live in
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Create a manager using the cache TTL from `config`
    pub fn with_config(store: Arc<dyn TableStore>, config: &TablesConfig) -> Self {
        Self::new(store).with_cache_ttl(config.cache_ttl())
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Resolve `name` to a table id, creating the table if it does not exist
    ///
    /// # Errors
    ///
    /// * `TableError::InvalidName` - name is empty after trimming
    /// * any store error raised while resolving or creating
    pub async fn get_or_create(&self, name: &str, description: &str) -> TableResult<TableId> {
        let candidate = Table::new(name.trim(), description);
        if !candidate.validate() {
            return Err(TableError::InvalidName(
                "Table name cannot be empty".to_string(),
            ));
        }
        let name = candidate.name.as_str();

        if let Some(id) = self.verified_hit(name).await? {
            log::debug!("Name cache hit for '{}' -> {}", name, id);
            return Ok(id);
        }

        if let Some(id) = self.lookup(name).await? {
            return Ok(id);
        }

        match self.store.add_table(name, description).await {
            Ok(id) => {
                log::info!("Created table '{}' with id {}", name, id);
                self.remember(name, id).await;
                Ok(id)
            }
            Err(TableError::DuplicateName(_)) => {
                // Another writer created it between our lookup and insert.
                log::debug!("Table '{}' appeared concurrently, resolving again", name);
                self.lookup(name)
                    .await?
                    .ok_or_else(|| TableError::TableNotFound(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Rename table `id` to `new_name`
    ///
    /// Returns `false` when the id does not resolve to a table or the store
    /// rejects the rename.
    pub async fn rename(&self, id: TableId, new_name: &str) -> bool {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            log::warn!("Refusing to rename table {} to an empty name", id);
            return false;
        }

        let old_name = match self.store.get_table(id).await {
            Ok(Some(table)) => table.name,
            Ok(None) => {
                log::warn!("Cannot rename table {}: not found", id);
                self.invalidate(id).await;
                return false;
            }
            Err(e) => {
                log::error!("Failed to resolve table {} for rename: {}", id, e);
                return false;
            }
        };

        if let Err(e) = self.store.update_table(id, Some(new_name), None).await {
            log::error!("Failed to rename table {} to '{}': {}", id, new_name, e);
            return false;
        }

        {
            let mut cache = self.cache.write().await;
            cache.remove(&old_name);
            Self::insert_entry(&mut cache, new_name, id);
        }

        log::info!("Renamed table {} from '{}' to '{}'", id, old_name, new_name);
        true
    }

    /// Delete table `id` and all of its cells
    ///
    /// The cache entry is dropped whatever the store answers.
    pub async fn delete(&self, id: TableId) -> bool {
        let name = match self.store.get_table(id).await {
            Ok(table) => table.map(|t| t.name),
            Err(e) => {
                log::warn!("Could not resolve name of table {} before delete: {}", id, e);
                None
            }
        };

        let result = self.store.delete_table(id).await;

        {
            let mut cache = self.cache.write().await;
            if let Some(name) = &name {
                cache.remove(name);
            }
            cache.retain(|_, entry| entry.id != id);
        }

        match result {
            Ok(true) => {
                log::info!(
                    "Deleted table {} ('{}')",
                    id,
                    name.as_deref().unwrap_or("unknown")
                );
                true
            }
            Ok(false) => {
                log::warn!("Cannot delete table {}: not found", id);
                false
            }
            Err(e) => {
                log::error!("Failed to delete table {}: {}", id, e);
                false
            }
        }
    }

    /// Drop every cached name pointing at `id`
    pub async fn invalidate(&self, id: TableId) {
        self.cache.write().await.retain(|_, entry| entry.id != id);
    }

    /// Empty the cache
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    /// Cached id for `name`, unverified
    pub async fn cached_id(&self, name: &str) -> Option<TableId> {
        self.cache.read().await.get(name).map(|entry| entry.id)
    }

    /// Number of cached names
    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Table identity plus its cell count
    pub async fn get_table_info(&self, id: TableId) -> TableResult<Option<TableInfo>> {
        let Some(table) = self.store.get_table(id).await? else {
            return Ok(None);
        };
        let items_count = self.store.count_items_in_table(id).await?;
        Ok(Some(TableInfo { table, items_count }))
    }

    /// Table identity plus its cell count, looked up by name
    pub async fn get_table_info_by_name(&self, name: &str) -> TableResult<Option<TableInfo>> {
        let Some(table) = self.store.get_table_by_name(name).await? else {
            return Ok(None);
        };
        let Some(id) = table.id else {
            return Ok(None);
        };

        self.remember(&table.name, id).await;
        let items_count = self.store.count_items_in_table(id).await?;
        Ok(Some(TableInfo { table, items_count }))
    }

    /// Every table, each with its cell count
    pub async fn get_all_tables(&self) -> TableResult<Vec<TableInfo>> {
        let tables = self.store.get_all_tables().await?;
        let mut infos = Vec::with_capacity(tables.len());

        for table in tables {
            let items_count = match table.id {
                Some(id) => self.store.count_items_in_table(id).await?,
                None => 0,
            };
            infos.push(TableInfo { table, items_count });
        }

        Ok(infos)
    }

    /// Tables with cells in `category_id`
    pub async fn get_tables_by_category(
        &self,
        category_id: CategoryId,
    ) -> TableResult<Vec<CategoryTable>> {
        self.store.get_tables_by_category(category_id).await
    }

    /// Cached id for `name` that the store still agrees with
    async fn verified_hit(&self, name: &str) -> TableResult<Option<TableId>> {
        let entry = self.cache.read().await.get(name).copied();
        let Some(entry) = entry else {
            return Ok(None);
        };

        if entry.cached_at.elapsed() > self.cache_ttl {
            log::debug!("Name cache entry for '{}' expired", name);
            self.evict(name, entry.id).await;
            return Ok(None);
        }

        match self.store.get_table(entry.id).await? {
            Some(table) if table.name == name => Ok(Some(entry.id)),
            _ => {
                log::debug!("Name cache entry '{}' -> {} is stale", name, entry.id);
                self.evict(name, entry.id).await;
                Ok(None)
            }
        }
    }

    async fn lookup(&self, name: &str) -> TableResult<Option<TableId>> {
        let id = self
            .store
            .get_table_by_name(name)
            .await?
            .and_then(|table| table.id);

        if let Some(id) = id {
            self.remember(name, id).await;
        }
        Ok(id)
    }

    async fn remember(&self, name: &str, id: TableId) {
        let mut cache = self.cache.write().await;
        Self::insert_entry(&mut cache, name, id);
    }

    /// Remove `name` only if it still points at `id`
    async fn evict(&self, name: &str, id: TableId) {
        let mut cache = self.cache.write().await;
        if cache.get(name).is_some_and(|entry| entry.id == id) {
            cache.remove(name);
        }
    }

    fn insert_entry(cache: &mut HashMap<String, CacheEntry>, name: &str, id: TableId) {
        cache.retain(|cached, entry| entry.id != id || cached == name);
        cache.insert(
            name.to_string(),
            CacheEntry {
                id,
                cached_at: Instant::now(),
            },
        );
    }
}
