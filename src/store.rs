//! The relational-store seam used by the loader.
//!
//! [`MySqlStore`] drives a real server through `sqlx` on a private
//! current-thread runtime, so callers stay synchronous. [`MemoryStore`] keeps
//! tables in process; dry runs and tests use it.

use std::collections::BTreeMap;

use log::debug;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tokio::runtime::{Builder, Runtime};

use crate::{
    connection::ConnectionConfig,
    data::Value,
    error::{ImportError, ImportResult},
    infer::ColumnDef,
    query,
};

pub trait TableStore {
    fn table_exists(&mut self, table: &str) -> ImportResult<bool>;

    fn drop_table(&mut self, table: &str) -> ImportResult<()>;

    fn create_table(&mut self, table: &str, columns: &[ColumnDef]) -> ImportResult<()>;

    /// Inserts `rows` in one transaction and commits it before returning.
    /// On error nothing from this batch is visible.
    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> ImportResult<()>;
}

impl<T: TableStore + ?Sized> TableStore for &mut T {
    fn table_exists(&mut self, table: &str) -> ImportResult<bool> {
        (**self).table_exists(table)
    }

    fn drop_table(&mut self, table: &str) -> ImportResult<()> {
        (**self).drop_table(table)
    }

    fn create_table(&mut self, table: &str, columns: &[ColumnDef]) -> ImportResult<()> {
        (**self).create_table(table, columns)
    }

    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> ImportResult<()> {
        (**self).insert_batch(table, columns, rows)
    }
}

pub struct MySqlStore {
    runtime: Runtime,
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn connect(config: &ConnectionConfig) -> ImportResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ImportError::store("Starting database runtime", e))?;
        let options = config.connect_options()?;
        let pool = runtime
            .block_on(ConnectionConfig::pool_options().connect_with(options))
            .map_err(|e| ImportError::store(format!("Connecting to {}", config.describe()), e))?;
        debug!("Connected to {}", config.describe());
        Ok(Self { runtime, pool })
    }

    async fn execute(&self, sql: &str, context: &str) -> ImportResult<()> {
        debug!("{sql}");
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| ImportError::store(context, e))?;
        Ok(())
    }
}

impl TableStore for MySqlStore {
    fn table_exists(&mut self, table: &str) -> ImportResult<bool> {
        let count = self
            .runtime
            .block_on(
                sqlx::query_scalar::<_, i64>(query::TABLE_EXISTS_SQL)
                    .bind(table)
                    .fetch_one(&self.pool),
            )
            .map_err(|e| ImportError::store(format!("Checking whether '{table}' exists"), e))?;
        Ok(count > 0)
    }

    fn drop_table(&mut self, table: &str) -> ImportResult<()> {
        let sql = query::drop_table_sql(table)?;
        self.runtime
            .block_on(self.execute(&sql, &format!("Dropping table '{table}'")))
    }

    fn create_table(&mut self, table: &str, columns: &[ColumnDef]) -> ImportResult<()> {
        let sql = query::create_table_sql(table, columns)?;
        self.runtime
            .block_on(self.execute(&sql, &format!("Creating table '{table}'")))
    }

    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> ImportResult<()> {
        let prefix = query::insert_prefix(table, columns)?;
        let rows_per_statement = query::rows_per_statement(columns.len());
        let context = format!("Inserting into '{table}'");
        self.runtime.block_on(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| ImportError::store(&context, e))?;
            for chunk in rows.chunks(rows_per_statement) {
                batch_statement(&prefix, chunk)
                    .build()
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ImportError::store(&context, e))?;
            }
            tx.commit()
                .await
                .map_err(|e| ImportError::store(format!("Committing batch into '{table}'"), e))
        })
    }
}

/// One `INSERT … VALUES (…), (…)` carrying every row of `rows` as bound
/// parameters.
fn batch_statement<'q>(prefix: &str, rows: &'q [Vec<Value>]) -> QueryBuilder<'q, MySql> {
    let mut builder = QueryBuilder::new(prefix);
    builder.push_values(rows, |mut tuple, row| {
        for value in row {
            match value {
                Value::Null => tuple.push_bind(None::<String>),
                Value::Integer(i) => tuple.push_bind(*i),
                Value::Real(f) => tuple.push_bind(*f),
                Value::Text(s) => tuple.push_bind(s.as_str()),
                Value::Timestamp(ts) => tuple.push_bind(*ts),
                Value::Boolean(b) => tuple.push_bind(*b),
            };
        }
    });
    builder
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
}

impl MemoryTable {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
    commits: Vec<usize>,
    fail_at_batch: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `n`th insert batch (1-based, counted across the store's
    /// lifetime) fail without committing.
    pub fn failing_at_batch(mut self, n: usize) -> Self {
        self.fail_at_batch = Some(n);
        self
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    /// Row counts of every committed batch, in commit order.
    pub fn commits(&self) -> &[usize] {
        &self.commits
    }
}

impl TableStore for MemoryStore {
    fn table_exists(&mut self, table: &str) -> ImportResult<bool> {
        Ok(self.tables.contains_key(table))
    }

    fn drop_table(&mut self, table: &str) -> ImportResult<()> {
        query::drop_table_sql(table)?;
        self.tables.remove(table);
        Ok(())
    }

    fn create_table(&mut self, table: &str, columns: &[ColumnDef]) -> ImportResult<()> {
        query::create_table_sql(table, columns)?;
        if self.tables.contains_key(table) {
            return Err(ImportError::store(
                format!("Creating table '{table}'"),
                "table already exists",
            ));
        }
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> ImportResult<()> {
        query::insert_prefix(table, columns)?;
        let context = format!("Inserting into '{table}'");
        if self.fail_at_batch == Some(self.commits.len() + 1) {
            return Err(ImportError::store(context, "simulated failure"));
        }
        let target = self
            .tables
            .get_mut(table)
            .ok_or_else(|| ImportError::store(&context, "table does not exist"))?;
        let positions = columns
            .iter()
            .map(|name| {
                target
                    .columns
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| {
                        ImportError::store(&context, format!("unknown column '{name}'"))
                    })
            })
            .collect::<ImportResult<Vec<_>>>()?;

        let width = target.columns.len();
        for row in rows {
            let mut stored = vec![Value::Null; width];
            for (value, &position) in row.iter().zip(&positions) {
                stored[position] = value.clone();
            }
            target.rows.push(stored);
        }
        self.commits.push(rows.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::StorageType;

    fn columns(names: &[&str]) -> Vec<ColumnDef> {
        names
            .iter()
            .map(|name| ColumnDef {
                name: name.to_string(),
                storage: StorageType::Text,
            })
            .collect()
    }

    #[test]
    fn memory_store_maps_columns_by_name() {
        let mut store = MemoryStore::new();
        store.create_table("t", &columns(&["a", "b"])).expect("create");
        assert!(store.table_exists("t").expect("exists"));

        store
            .insert_batch(
                "t",
                &["b".to_string()],
                &[vec![Value::Text("x".to_string())]],
            )
            .expect("insert");
        let table = store.table("t").expect("table");
        assert_eq!(table.rows, vec![vec![Value::Null, Value::Text("x".to_string())]]);
        assert_eq!(store.commits(), &[1]);
    }

    #[test]
    fn memory_store_rejects_unknown_columns_and_tables() {
        let mut store = MemoryStore::new();
        assert!(store.insert_batch("missing", &[], &[]).is_err());
        store.create_table("t", &columns(&["a"])).expect("create");
        assert!(matches!(
            store.insert_batch("t", &["zz".to_string()], &[vec![Value::Null]]),
            Err(ImportError::Store { .. })
        ));
        assert!(store.create_table("t", &columns(&["a"])).is_err());
        store.drop_table("t").expect("drop");
        assert!(!store.table_exists("t").expect("exists"));
    }

    #[test]
    fn simulated_failure_commits_nothing_from_that_batch() {
        let mut store = MemoryStore::new().failing_at_batch(2);
        store.create_table("t", &columns(&["a"])).expect("create");
        let rows = vec![vec![Value::Integer(1)]];
        store.insert_batch("t", &["a".to_string()], &rows).expect("first");
        assert!(store.insert_batch("t", &["a".to_string()], &rows).is_err());
        assert_eq!(store.table("t").expect("table").rows.len(), 1);
    }

    #[test]
    fn batch_statement_sends_all_rows_in_one_insert() {
        let prefix = query::insert_prefix("t", &["a", "b"]).expect("prefix");
        let rows = vec![
            vec![Value::Integer(1), Value::Null],
            vec![Value::Text("x".to_string()), Value::Boolean(true)],
            vec![Value::Real(0.5), Value::Null],
        ];
        let builder = batch_statement(&prefix, &rows);
        assert_eq!(
            builder.sql(),
            "INSERT INTO `t` (`a`, `b`) VALUES (?, ?), (?, ?), (?, ?)"
        );
    }

    #[test]
    fn stores_work_through_mutable_references() {
        fn create<S: TableStore>(mut store: S) {
            store.create_table("t", &columns(&["a"])).expect("create");
        }
        let mut store = MemoryStore::new();
        create(&mut store);
        assert!(store.table("t").is_some());
    }
}
