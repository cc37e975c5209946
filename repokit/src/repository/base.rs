//! Generic repository over one record type

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, warn};

use super::error::{RepositoryError, RepositoryOperation};
use super::filter::{ColumnMap, FilterValue, Query};
use super::pagination::{PageParam, Paged};
use super::sql::{self, InvalidQuery};
use super::RepositoryResult;
use crate::error::DatabaseError;
use crate::schema::{Record, Schema};
use crate::soft_delete::SoftDelete;
use crate::transaction::{self, run_in_transaction, DbContext, Transactional};

/// Data-access object for records of type `T`
///
/// Cheap to clone; the schema is resolved once at construction.
///
/// Every operation takes a [`DbContext`]. Pass [`DbContext::new()`] to run on
/// the pool or the context handed out by a transaction scope to run inside it.
pub struct BaseRepo<T> {
    pool: MySqlPool,
    schema: Arc<Schema>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for BaseRepo<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            schema: Arc::clone(&self.schema),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for BaseRepo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseRepo")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Pick the only row out of `rows`, or report how many there were
pub(crate) fn at_most_one<T>(mut rows: Vec<T>) -> Result<Option<T>, usize> {
    match rows.len() {
        0 | 1 => Ok(rows.pop()),
        n => Err(n),
    }
}

impl<T: Record> BaseRepo<T> {
    /// Create a repository, resolving `T`'s schema
    pub fn new(pool: MySqlPool) -> Self {
        let schema = Schema::of::<T>();
        if schema.primary_key.is_empty() {
            warn!(
                entity = schema.entity,
                "no primary key resolved, primary-key operations will match no rows"
            );
        }
        Self {
            pool,
            schema: Arc::new(schema),
            _marker: PhantomData,
        }
    }

    /// Underlying pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Resolved schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Entity name used in logs and errors
    pub fn entity_name(&self) -> &'static str {
        self.schema.entity
    }

    /// Primary key column; empty when unresolved
    pub fn primary_key(&self) -> &str {
        &self.schema.primary_key
    }

    fn wrap(
        &self,
        operation: RepositoryOperation,
        err: DatabaseError,
        context: impl fmt::Display,
    ) -> RepositoryError {
        RepositoryError::from(err)
            .with_operation(operation)
            .with_entity(self.schema.entity)
            .with_context(context.to_string())
    }

    fn invalid(&self, operation: RepositoryOperation, err: InvalidQuery) -> RepositoryError {
        RepositoryError::validation_failed(operation, err.0).with_entity(self.schema.entity)
    }

    fn pk_condition(&self, pk: FilterValue) -> ColumnMap {
        ColumnMap::new().with(self.schema.primary_key.clone(), pk)
    }

    /// Record values keyed by column, database-owned and unset columns removed
    fn insert_row(&self, record: &T) -> Vec<(String, FilterValue)> {
        let mut row: Vec<(String, FilterValue)> = Vec::new();
        for (key, value) in record.values() {
            let column = self.schema.column_for(key);
            let skip = match value {
                FilterValue::Null => true,
                ref v if column == self.schema.primary_key => v.is_zero(),
                ref v if self.schema.is_auto_time(&column) => v.is_zero(),
                _ => false,
            };
            if skip {
                continue;
            }
            match row.iter_mut().find(|(c, _)| *c == column) {
                Some(entry) => entry.1 = value,
                None => row.push((column, value)),
            }
        }
        row
    }

    /// Non-zero record values as an equality condition
    fn probe(&self, record: &T) -> ColumnMap {
        let values = record
            .values()
            .into_iter()
            .filter(|(_, v)| !v.is_zero())
            .collect::<ColumnMap>();
        self.schema.resolve(&values)
    }
}

impl<T> BaseRepo<T>
where
    T: Record + for<'r> FromRow<'r, MySqlRow>,
{
    /// Insert one record
    ///
    /// A zero primary key is left for the database to generate and written
    /// back through [`Record::set_last_insert_id`]. Unset time columns and
    /// `NULL` values are left to their column defaults.
    pub async fn insert(&self, ctx: &DbContext, record: &mut T) -> RepositoryResult<()> {
        let op = RepositoryOperation::Insert;
        let row = self.insert_row(record);
        let qb = sql::insert(&self.schema, &row).map_err(|e| self.invalid(op, e))?;

        let result = transaction::execute(&self.pool, ctx, qb)
            .await
            .map_err(|e| self.wrap(op, e, format_args!("param: {:?}", record)))?;

        let id = result.last_insert_id();
        if id != 0 {
            record.set_last_insert_id(id);
        }
        debug!(entity = self.schema.entity, id, "record inserted");
        Ok(())
    }

    /// Insert records in chunks of `batch_size` inside one transaction
    ///
    /// A `batch_size` of 0 sends every record in a single statement. Either
    /// every chunk is written or none is. Returns the number of rows inserted.
    pub async fn batch_insert(
        &self,
        ctx: &DbContext,
        records: &[T],
        batch_size: usize,
    ) -> RepositoryResult<u64> {
        let op = RepositoryOperation::BatchInsert;
        if records.is_empty() {
            return Ok(0);
        }
        let size = if batch_size == 0 {
            records.len()
        } else {
            batch_size
        };

        let rows: Vec<_> = records.iter().map(|r| self.insert_row(r)).collect();
        let statements = rows
            .chunks(size)
            .map(|chunk| sql::insert_many(&self.schema, chunk))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.invalid(op, e))?;

        let pool = &self.pool;
        let inserted = run_in_transaction(pool, ctx, |tx| async move {
            let mut inserted = 0;
            for qb in statements {
                inserted += transaction::execute(pool, &tx, qb).await?.rows_affected();
            }
            Ok::<_, DatabaseError>(inserted)
        })
        .await
        .map_err(|e| {
            self.wrap(
                op,
                e,
                format_args!("batch_size: {}, param: {:?}", batch_size, records),
            )
        })?;

        debug!(
            entity = self.schema.entity,
            inserted,
            batches = rows.len().div_ceil(size),
            "records batch inserted"
        );
        Ok(inserted)
    }

    /// Physically delete the row with the given primary key
    pub async fn delete_by_pk(
        &self,
        ctx: &DbContext,
        pk: impl Into<FilterValue>,
    ) -> RepositoryResult<u64> {
        let condition = self.pk_condition(pk.into());
        self.delete_where(ctx, RepositoryOperation::DeleteByPk, &condition)
            .await
    }

    /// Physically delete every row matching `condition`
    ///
    /// Map keys may be camelCase or snake_case; zero values are real
    /// conditions. An empty condition is rejected.
    pub async fn delete_by_map(
        &self,
        ctx: &DbContext,
        condition: &ColumnMap,
    ) -> RepositoryResult<u64> {
        let condition = self.schema.resolve(condition);
        self.delete_where(ctx, RepositoryOperation::DeleteByMap, &condition)
            .await
    }

    async fn delete_where(
        &self,
        ctx: &DbContext,
        op: RepositoryOperation,
        condition: &ColumnMap,
    ) -> RepositoryResult<u64> {
        let qb = sql::delete(&self.schema, condition).map_err(|e| self.invalid(op, e))?;
        let result = transaction::execute(&self.pool, ctx, qb)
            .await
            .map_err(|e| self.wrap(op, e, format_args!("condition: {:?}", condition)))?;
        debug!(
            entity = self.schema.entity,
            operation = %op,
            rows = result.rows_affected(),
            "rows deleted"
        );
        Ok(result.rows_affected())
    }

    /// Mark the row with the given primary key as soft-deleted
    pub async fn soft_delete_by_pk(
        &self,
        ctx: &DbContext,
        pk: impl Into<FilterValue>,
    ) -> RepositoryResult<u64> {
        let condition = self.pk_condition(pk.into());
        self.set_soft_delete(ctx, RepositoryOperation::SoftDelete, condition, SoftDelete::Deleted)
            .await
    }

    /// Mark every row matching `condition` as soft-deleted
    pub async fn soft_delete_by_map(
        &self,
        ctx: &DbContext,
        condition: &ColumnMap,
    ) -> RepositoryResult<u64> {
        self.set_soft_delete(
            ctx,
            RepositoryOperation::SoftDelete,
            self.schema.resolve(condition),
            SoftDelete::Deleted,
        )
        .await
    }

    /// Make a soft-deleted row visible again
    pub async fn restore_by_pk(
        &self,
        ctx: &DbContext,
        pk: impl Into<FilterValue>,
    ) -> RepositoryResult<u64> {
        let condition = self.pk_condition(pk.into());
        self.set_soft_delete(ctx, RepositoryOperation::Restore, condition, SoftDelete::Normal)
            .await
    }

    async fn set_soft_delete(
        &self,
        ctx: &DbContext,
        op: RepositoryOperation,
        condition: ColumnMap,
        flag: SoftDelete,
    ) -> RepositoryResult<u64> {
        let assignments = ColumnMap::new().with(self.schema.soft_delete_column, flag);
        self.update_where(ctx, op, &condition, &assignments).await
    }

    /// Update the non-zero fields of `record`, matched by its primary key
    ///
    /// The primary key and database-managed time columns are never written.
    /// A record whose primary key is zero is rejected; a record with nothing
    /// to write is a no-op returning 0.
    pub async fn update_by_pk(&self, ctx: &DbContext, record: &T) -> RepositoryResult<u64> {
        let op = RepositoryOperation::UpdateByPk;
        let values = self
            .schema
            .resolve(&record.values().into_iter().collect::<ColumnMap>());

        let pk = values
            .get(&self.schema.primary_key)
            .filter(|v| !v.is_zero())
            .cloned()
            .ok_or_else(|| {
                RepositoryError::validation_failed(op, "primary key value is required")
                    .with_entity(self.schema.entity)
                    .with_context(format!("param: {:?}", record))
            })?;

        let mut assignments = values;
        assignments.retain(|column, value| {
            !value.is_zero()
                && column != self.schema.primary_key
                && !self.schema.is_auto_time(column)
        });

        self.update_where(ctx, op, &self.pk_condition(pk), &assignments)
            .await
    }

    /// Apply `update` to the row with the given primary key
    ///
    /// Zero values in the map are written. Keys naming a database-managed
    /// time field, by field or by column name, are dropped.
    pub async fn update_by_pk_with_map(
        &self,
        ctx: &DbContext,
        pk: impl Into<FilterValue>,
        update: ColumnMap,
    ) -> RepositoryResult<u64> {
        let condition = self.pk_condition(pk.into());
        let assignments = self.strip_auto_time(update);
        self.update_where(ctx, RepositoryOperation::UpdateByPkWithMap, &condition, &assignments)
            .await
    }

    /// Apply `update` to every row matching `condition`
    ///
    /// An empty condition is rejected; an empty update is a no-op returning 0.
    pub async fn update_by_map(
        &self,
        ctx: &DbContext,
        condition: &ColumnMap,
        update: ColumnMap,
    ) -> RepositoryResult<u64> {
        let assignments = self.strip_auto_time(update);
        self.update_where(
            ctx,
            RepositoryOperation::UpdateByMap,
            &self.schema.resolve(condition),
            &assignments,
        )
        .await
    }

    /// Resolve update keys to columns and drop database-managed ones
    fn strip_auto_time(&self, update: ColumnMap) -> ColumnMap {
        let mut assignments = self.schema.resolve(&update);
        assignments.retain(|column, _| !self.schema.is_auto_time(column));
        assignments
    }

    async fn update_where(
        &self,
        ctx: &DbContext,
        op: RepositoryOperation,
        condition: &ColumnMap,
        assignments: &ColumnMap,
    ) -> RepositoryResult<u64> {
        if condition.is_empty() {
            return Err(RepositoryError::validation_failed(op, "update condition is empty")
                .with_entity(self.schema.entity));
        }
        if assignments.is_empty() {
            debug!(entity = self.schema.entity, operation = %op, "nothing to update");
            return Ok(0);
        }

        let qb = sql::update(&self.schema, condition, assignments)
            .map_err(|e| self.invalid(op, e))?;
        let result = transaction::execute(&self.pool, ctx, qb).await.map_err(|e| {
            self.wrap(
                op,
                e,
                format_args!("condition: {:?}, update: {:?}", condition, assignments),
            )
        })?;
        debug!(
            entity = self.schema.entity,
            operation = %op,
            rows = result.rows_affected(),
            "rows updated"
        );
        Ok(result.rows_affected())
    }

    /// Rows matching the non-zero fields of `probe`
    pub async fn select(&self, ctx: &DbContext, probe: &T) -> RepositoryResult<Vec<T>> {
        let query = Query::from(self.probe(probe));
        self.fetch(ctx, RepositoryOperation::Select, &query).await
    }

    /// Every visible row
    pub async fn select_all(&self, ctx: &DbContext) -> RepositoryResult<Vec<T>> {
        self.fetch(ctx, RepositoryOperation::SelectAll, &Query::new())
            .await
    }

    /// The row with the given primary key, if visible
    pub async fn select_one_by_pk(
        &self,
        ctx: &DbContext,
        pk: impl Into<FilterValue>,
    ) -> RepositoryResult<Option<T>> {
        let op = RepositoryOperation::SelectOneByPk;
        let query = Query::from(self.pk_condition(pk.into()));
        let rows = self.fetch(ctx, op, &query).await?;
        self.single(op, rows, &query)
    }

    /// Visible rows whose primary key equals `pks`, or is in it when a list
    pub async fn select_by_pk(
        &self,
        ctx: &DbContext,
        pks: impl Into<FilterValue>,
    ) -> RepositoryResult<Vec<T>> {
        let query = Query::from(self.pk_condition(pks.into()));
        self.fetch(ctx, RepositoryOperation::SelectByPk, &query)
            .await
    }

    /// Rows matching `condition`; zero values are real conditions
    pub async fn select_by_map(
        &self,
        ctx: &DbContext,
        condition: &ColumnMap,
    ) -> RepositoryResult<Vec<T>> {
        let query = Query::from(condition.clone());
        self.fetch(ctx, RepositoryOperation::SelectByMap, &query)
            .await
    }

    /// The single row matching the non-zero fields of `probe`
    ///
    /// `Ok(None)` when nothing matches; an error when several rows do.
    pub async fn select_one(&self, ctx: &DbContext, probe: &T) -> RepositoryResult<Option<T>> {
        let op = RepositoryOperation::SelectOne;
        let query = Query::from(self.probe(probe));
        let rows = self.fetch(ctx, op, &query).await?;
        self.single(op, rows, &query)
    }

    /// The single row matching `condition`
    ///
    /// `Ok(None)` when nothing matches; an error when several rows do.
    pub async fn select_one_by_map(
        &self,
        ctx: &DbContext,
        condition: &ColumnMap,
    ) -> RepositoryResult<Option<T>> {
        let op = RepositoryOperation::SelectOneByMap;
        let query = Query::from(condition.clone());
        let rows = self.fetch(ctx, op, &query).await?;
        self.single(op, rows, &query)
    }

    /// Count the visible rows matching `query`
    pub async fn count(&self, ctx: &DbContext, query: &Query) -> RepositoryResult<u64> {
        let op = RepositoryOperation::Count;
        let qb = sql::count(&self.schema, query).map_err(|e| self.invalid(op, e))?;
        let total = transaction::fetch_count(&self.pool, ctx, qb)
            .await
            .map_err(|e| self.wrap(op, e, format_args!("condition: {:?}", query)))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// Paginated listing with a pre-built query
    ///
    /// With a page the total is counted first, then the page is fetched with
    /// its ordering, limit and offset. Without one every matching row is
    /// returned and the total is the number of rows.
    pub async fn list_page(
        &self,
        ctx: &DbContext,
        query: &Query,
        page: Option<&PageParam>,
    ) -> RepositoryResult<Paged<T>> {
        self.paged(ctx, RepositoryOperation::ListPage, query, page)
            .await
    }

    /// Paginated listing with a raw predicate and `?` arguments
    ///
    /// List arguments expand to `(?, ?, ...)`, so `"id IN ?"` takes a list.
    pub async fn page_select(
        &self,
        ctx: &DbContext,
        page: Option<&PageParam>,
        predicate: &str,
        args: &[FilterValue],
    ) -> RepositoryResult<Paged<T>> {
        let query = Query::new().raw(predicate, args.to_vec());
        self.paged(ctx, RepositoryOperation::PageSelect, &query, page)
            .await
    }

    async fn paged(
        &self,
        ctx: &DbContext,
        op: RepositoryOperation,
        query: &Query,
        page: Option<&PageParam>,
    ) -> RepositoryResult<Paged<T>> {
        if let Some(p) = page {
            if p.page_size == 0 {
                return Err(RepositoryError::validation_failed(op, "page size must be positive")
                    .with_entity(self.schema.entity)
                    .with_context(format!("page: {:?}", p)));
            }
        }

        let mut total = 0;
        if page.is_some() {
            total = self
                .count(ctx, query)
                .await
                .map_err(|e| e.with_operation(op))?;
        }

        let qb = sql::select(&self.schema, query, page).map_err(|e| self.invalid(op, e))?;
        let records = transaction::fetch_all::<T>(&self.pool, ctx, qb)
            .await
            .map_err(|e| {
                self.wrap(op, e, format_args!("condition: {:?}, page: {:?}", query, page))
            })?;

        if total == 0 {
            total = records.len() as u64;
        }
        debug!(
            entity = self.schema.entity,
            operation = %op,
            rows = records.len(),
            total,
            "page fetched"
        );
        Ok(Paged { records, total })
    }

    async fn fetch(
        &self,
        ctx: &DbContext,
        op: RepositoryOperation,
        query: &Query,
    ) -> RepositoryResult<Vec<T>> {
        let qb = sql::select(&self.schema, query, None).map_err(|e| self.invalid(op, e))?;
        let rows = transaction::fetch_all::<T>(&self.pool, ctx, qb)
            .await
            .map_err(|e| self.wrap(op, e, format_args!("condition: {:?}", query)))?;
        debug!(
            entity = self.schema.entity,
            operation = %op,
            rows = rows.len(),
            "rows selected"
        );
        Ok(rows)
    }

    fn single(
        &self,
        op: RepositoryOperation,
        rows: Vec<T>,
        query: &Query,
    ) -> RepositoryResult<Option<T>> {
        at_most_one(rows).map_err(|count| {
            RepositoryError::ambiguous(op, count)
                .with_entity(self.schema.entity)
                .with_context(format!("condition: {:?}", query.equals()))
        })
    }
}

impl<T: Record> Transactional for BaseRepo<T> {
    async fn in_tx<F, Fut, R, E>(&self, ctx: &DbContext, body: F) -> Result<R, E>
    where
        F: FnOnce(DbContext) -> Fut + Send,
        Fut: std::future::Future<Output = Result<R, E>> + Send,
        R: Send,
        E: From<DatabaseError> + Send,
    {
        run_in_transaction(&self.pool, ctx, body).await
    }
}
