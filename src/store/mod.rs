pub mod config;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub use config::StoreConfig;

use crate::core::{Result, StoreError, now_utc_string};
use crate::model::{COLUMN_EMAIL, COLUMN_ID, Record, user_schema};
use crate::query::{QueryCompiler, Statement, UserQuery};
use crate::storage::StorageBackend;
use crate::vault::{TokenBatch, TokenPlan, TokenReconciler, TokenVault};

/// Persistence operations for user records.
///
/// The store never retries and never compensates: backend and vault
/// errors are returned as-is. When the vault accepts a batch but the
/// following primary-table write fails, the minted tokens stay in the
/// vault unreferenced and must be collected out of band.
pub struct UserStore {
    config: StoreConfig,
    backend: Option<Arc<dyn StorageBackend>>,
    vault: Option<Arc<dyn TokenVault>>,
    reconciler: TokenReconciler,
    migrated: OnceCell<()>,
}

impl UserStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let reconciler = TokenReconciler::new(&config.sensitive_columns, config.token_prefix.clone());
        Ok(Self {
            config,
            backend: None,
            vault: None,
            reconciler,
            migrated: OnceCell::new(),
        })
    }

    pub fn with_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_vault(mut self, vault: Arc<dyn TokenVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &TokenReconciler {
        &self.reconciler
    }

    /// Create the user table if it does not exist.
    pub async fn auto_migrate(&self) -> Result<()> {
        let backend = self.backend()?;
        let schema = user_schema(&self.config.table_name, &self.config.sensitive_columns);
        let statement = self.config.dialect.create_table(&schema)?;
        self.log_statement(&statement);
        backend.execute(&statement).await?;
        info!(table = %self.config.table_name, "user table ready");
        Ok(())
    }

    /// The SELECT a list call would run, for inspection.
    pub fn compile_select(&self, query: &UserQuery) -> Result<Statement> {
        let plan = QueryCompiler::compile(query, &self.config.table_name, Utc::now())?;
        self.config.dialect.select(&plan)
    }

    pub async fn user_count(&self, query: &UserQuery) -> Result<i64> {
        let backend = self.ready_backend().await?;
        let statement = self.compile_select(&query.clone().count_only(true))?;
        self.log_statement(&statement);

        let rows = backend.query(&statement).await?;
        let Some(row) = rows.first() else {
            return Err(StoreError::storage("count query returned no rows"));
        };

        let raw = row.get("count").map(String::as_str).unwrap_or("");
        raw.parse::<i64>()
            .map_err(|_| StoreError::storage(format!("count query returned non-numeric value '{raw}'")))
    }

    pub async fn user_create(&self, user: &mut Record) -> Result<()> {
        if user.id().is_empty() {
            return Err(StoreError::invalid_argument("user id is empty"));
        }
        let backend = self.ready_backend().await?;

        let now = now_utc_string();
        user.set_created_at(now.clone()).set_updated_at(now);

        let plan = self.tokenize(user).await?;

        let statement = self.config.dialect.insert(&self.config.table_name, user.data())?;
        self.log_statement(&statement);

        if let Err(err) = backend.execute(&statement).await {
            self.report_orphaned_tokens(user.id(), &plan);
            return Err(err);
        }

        user.mark_clean();
        Ok(())
    }

    /// Delete the row, then release the tokens it referenced.
    ///
    /// A missing vault is reported before the row is touched. Once the row
    /// is gone a failed release is only logged: the tokens stay in the vault
    /// unreferenced, the same as after a failed primary write.
    pub async fn user_delete(&self, user: &Record) -> Result<()> {
        let held: Vec<String> = self
            .reconciler
            .sensitive_columns()
            .iter()
            .map(|column| user.get(column))
            .filter(|value| self.reconciler.is_token(value))
            .map(str::to_string)
            .collect();

        let vault = if held.is_empty() {
            None
        } else {
            Some(self.vault()?)
        };

        self.user_delete_by_id(user.id()).await?;

        let Some(vault) = vault else {
            return Ok(());
        };

        let released = held.len();
        let batch = TokenBatch {
            delete: held,
            ..TokenBatch::default()
        };
        if let Err(err) = vault.reconcile(batch).await {
            warn!(
                id = %user.id(),
                tokens = released,
                error = %err,
                "user deleted but token release failed; tokens left unreferenced"
            );
        }
        Ok(())
    }

    pub async fn user_delete_by_id(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(StoreError::invalid_argument("user id is empty"));
        }
        let backend = self.ready_backend().await?;

        let statement = self.config.dialect.delete_by_id(&self.config.table_name, id)?;
        self.log_statement(&statement);
        backend.execute(&statement).await?;
        Ok(())
    }

    /// Look up by email. When email is tokenized the stored column holds a
    /// token reference, so only a token can be matched.
    pub async fn user_find_by_email(&self, email: &str) -> Result<Option<Record>> {
        if email.is_empty() {
            return Err(StoreError::invalid_argument("user email is empty"));
        }
        if self.reconciler.is_sensitive(COLUMN_EMAIL) && !self.reconciler.is_token(email) {
            return Err(StoreError::invalid_argument(
                "email is tokenized; look users up by email token, not raw address",
            ));
        }

        let query = UserQuery::new().email(email).limit(1)?;
        Ok(self.user_list(&query).await?.into_iter().next())
    }

    /// Read-then-write; two concurrent callers may both create. Enforce
    /// uniqueness with a backend constraint if that matters.
    ///
    /// When email is a sensitive column the lookup can only match a token,
    /// so a raw address fails with `InvalidArgument` exactly as
    /// [`Self::user_find_by_email`] does. Pass the address's token instead.
    pub async fn user_find_by_email_or_create(
        &self,
        email: &str,
        create_status: &str,
    ) -> Result<Record> {
        if let Some(existing) = self.user_find_by_email(email).await? {
            return Ok(existing);
        }

        let mut user = Record::new_user();
        user.set_email(email).set_status(create_status);
        self.user_create(&mut user).await?;
        Ok(user)
    }

    pub async fn user_find_by_id(&self, id: &str) -> Result<Option<Record>> {
        if id.is_empty() {
            return Err(StoreError::invalid_argument("user id is empty"));
        }

        let query = UserQuery::new().id(id).limit(1)?;
        Ok(self.user_list(&query).await?.into_iter().next())
    }

    pub async fn user_list(&self, query: &UserQuery) -> Result<Vec<Record>> {
        let backend = self.ready_backend().await?;
        let statement = self.compile_select(query)?;
        self.log_statement(&statement);

        let rows = backend.query(&statement).await?;
        Ok(rows.into_iter().map(Record::from_existing).collect())
    }

    pub async fn user_soft_delete(&self, user: &mut Record) -> Result<()> {
        user.set_soft_deleted_at(now_utc_string());
        self.user_update(user).await
    }

    /// Returns `false` when no visible user has this id.
    pub async fn user_soft_delete_by_id(&self, id: &str) -> Result<bool> {
        let Some(mut user) = self.user_find_by_id(id).await? else {
            return Ok(false);
        };
        self.user_soft_delete(&mut user).await?;
        Ok(true)
    }

    /// Persist the changed columns of `user`, tokenizing sensitive ones
    /// first. A record with no changes issues no write.
    pub async fn user_update(&self, user: &mut Record) -> Result<()> {
        if user.id().is_empty() {
            return Err(StoreError::invalid_argument("user id is empty"));
        }
        let backend = self.ready_backend().await?;

        if !has_updatable_changes(user) {
            return Ok(());
        }

        user.set_updated_at(now_utc_string());

        let plan = self.tokenize(user).await?;

        let mut changed = user.changed_columns();
        changed.remove(COLUMN_ID);
        if changed.is_empty() {
            user.mark_clean();
            return Ok(());
        }

        let statement = self
            .config
            .dialect
            .update_by_id(&self.config.table_name, &changed, user.id())?;
        self.log_statement(&statement);

        match backend.execute(&statement).await {
            Ok(affected) => {
                debug!(id = %user.id(), affected, "user updated");
                user.mark_clean();
                Ok(())
            }
            Err(err) => {
                self.report_orphaned_tokens(user.id(), &plan);
                Err(err)
            }
        }
    }

    /// Apply a set of proposed column values and save them, routing
    /// sensitive ones through the vault.
    pub async fn user_update_columns(
        &self,
        user: &mut Record,
        proposed: &BTreeMap<String, String>,
    ) -> Result<()> {
        if proposed.contains_key(COLUMN_ID) {
            return Err(StoreError::invalid_argument("user id cannot be changed"));
        }

        let (tokenized, regular) = self.reconciler.partition(proposed);
        for (column, value) in regular.into_iter().chain(tokenized) {
            user.set(column, value);
        }

        self.user_update(user).await
    }

    // ---- internals ------------------------------------------------------

    fn backend(&self) -> Result<&Arc<dyn StorageBackend>> {
        self.backend.as_ref().ok_or(StoreError::StorageUnavailable)
    }

    fn vault(&self) -> Result<&Arc<dyn TokenVault>> {
        self.vault
            .as_ref()
            .ok_or_else(|| StoreError::vault("no token vault configured"))
    }

    async fn ready_backend(&self) -> Result<&Arc<dyn StorageBackend>> {
        let backend = self.backend()?;
        if self.config.automigrate {
            self.migrated.get_or_try_init(|| self.auto_migrate()).await?;
        }
        Ok(backend)
    }

    /// Run the vault round for `user`'s pending changes and rewrite its
    /// sensitive columns. Nothing reaches the primary table if this fails.
    async fn tokenize(&self, user: &mut Record) -> Result<TokenPlan> {
        if !self.reconciler.is_enabled() {
            return Ok(TokenPlan::default());
        }

        let plan = self.reconciler.plan(user);
        if plan.batch.is_empty() {
            self.reconciler.apply(user, &plan, &BTreeMap::new())?;
            return Ok(plan);
        }

        let vault = self.vault()?;
        let created = vault.reconcile(plan.batch.clone()).await?;
        debug!(
            id = %user.id(),
            created = created.len(),
            updated = plan.batch.update.len(),
            deleted = plan.batch.delete.len(),
            "vault batch applied"
        );

        self.reconciler.apply(user, &plan, &created)?;
        Ok(plan)
    }

    fn report_orphaned_tokens(&self, id: &str, plan: &TokenPlan) {
        if plan.batch.create.is_empty() && plan.batch.update.is_empty() {
            return;
        }
        warn!(
            id = %id,
            created = plan.batch.create.len(),
            updated = plan.batch.update.len(),
            "primary write failed after vault batch; tokens left unreferenced"
        );
    }

    fn log_statement(&self, statement: &Statement) {
        if self.config.debug {
            debug!(sql = %statement.sql, params = statement.params.len(), "userstore sql");
        }
    }
}

fn has_updatable_changes(user: &Record) -> bool {
    user.changed_columns().keys().any(|column| column != COLUMN_ID)
}
