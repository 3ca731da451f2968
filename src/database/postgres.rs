use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;

use super::manager::DatabaseError;
use super::settings::SettingsStore;
use crate::account::{
    Account, AccountStatus, AccountStore, GrantFetch, GrantSource, Group, GroupStatus,
    PermissionGrant, SubjectKind,
};
use crate::types::{AccountId, PermissionAction};

const STATUS_ACTIVE: i32 = 1;

pub struct PgSettings {
    pool: PgPool,
}

impl PgSettings {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettings {
    async fn get(&self, ids: &[i64]) -> Result<HashMap<i64, String>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT settings_id, settings_content FROM settings WHERE settings_id = ANY($1)",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut values = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("settings_id")?;
            let content: Option<String> = row.try_get("settings_content")?;
            values.insert(id, content.unwrap_or_default());
        }

        Ok(values)
    }
}

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find(&self, id: AccountId) -> Result<Option<Account>, DatabaseError> {
        let row = sqlx::query(
            "SELECT account_id, account_login, account_status FROM account WHERE account_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let status: i32 = row.try_get("account_status")?;
        let mut account = Account::new(row.try_get("account_id")?, row.try_get::<String, _>("account_login")?);
        account.status = if status == STATUS_ACTIVE {
            AccountStatus::Active
        } else {
            AccountStatus::Inactive
        };

        let group_rows = sqlx::query(
            r#"
            SELECT g.group_id, g.group_name, g.group_status
            FROM account_groups ag
            JOIN "group" g ON g.group_id = ag.account_groups_group
            WHERE ag.account_groups_account = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        for group_row in group_rows {
            let status: i32 = group_row.try_get("group_status")?;
            let mut group = Group::new(group_row.try_get("group_id")?, group_row.try_get::<String, _>("group_name")?);
            if status != STATUS_ACTIVE {
                group.status = GroupStatus::Inactive;
            }
            account.groups.insert(group.id, group);
        }

        Ok(Some(account))
    }
}

pub struct PgGrantSource {
    pool: PgPool,
}

impl PgGrantSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn table(kind: SubjectKind) -> (&'static str, &'static str) {
        match kind {
            SubjectKind::Group => ("group_permission", "group_permission"),
            SubjectKind::Account => ("account_permission", "account_permission"),
        }
    }

    fn grant_from_row(row: &PgRow, kind: SubjectKind, prefix: &str) -> Result<PermissionGrant, DatabaseError> {
        let column = |name: &str| format!("{}_{}", prefix, name);
        let subject_column = match kind {
            SubjectKind::Group => column("group"),
            SubjectKind::Account => column("account"),
        };
        let bits: i32 = row.try_get(column("permission").as_str())?;

        Ok(PermissionGrant {
            subject: kind,
            subject_id: row.try_get(subject_column.as_str())?,
            unit: row.try_get(column("unit").as_str())?,
            app: row.try_get(column("app").as_str())?,
            module: row.try_get(column("module").as_str())?,
            from: row.try_get(column("from").as_str())?,
            category: row.try_get(column("type").as_str())?,
            element: row.try_get(column("element").as_str())?,
            component: row.try_get(column("component").as_str())?,
            actions: PermissionAction::from_bits_truncate(bits.clamp(0, u8::MAX as i32) as u8),
        })
    }
}

#[async_trait]
impl GrantSource for PgGrantSource {
    async fn get_for(&self, subject_ids: &[i64], kind: SubjectKind) -> Result<GrantFetch, DatabaseError> {
        let (table, prefix) = Self::table(kind);
        let subject = match kind {
            SubjectKind::Group => "group",
            SubjectKind::Account => "account",
        };

        let query = format!(
            "SELECT * FROM {table} WHERE {prefix}_{subject} = ANY($1)",
            table = table,
            prefix = prefix,
            subject = subject
        );

        let rows = sqlx::query(&query)
            .bind(subject_ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        let grants = rows
            .iter()
            .map(|row| Self::grant_from_row(row, kind, prefix))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GrantFetch::from(grants))
    }
}
