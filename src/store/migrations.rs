use crate::error::app_error::AppError;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::{error, info};

/// One schema revision: an id, a parent pointer (None for the root) and
/// the forward/reverse transforms as raw statements.
#[derive(Debug, Clone, Copy)]
pub struct Revision {
    pub id: &'static str,
    pub parent: Option<&'static str>,
    pub name: &'static str,
    pub up_sql: &'static [&'static str],
    pub down_sql: &'static [&'static str],
}

/// The shipped chain, root first. The registry's builtin shapes describe
/// the head of this chain.
pub const REVISIONS: &[Revision] = &[
    Revision {
        id: "c9f41a7e2d10",
        parent: None,
        name: "01_create_users",
        up_sql: &["CREATE TABLE \"users\" (\
            \"id\" uuid PRIMARY KEY DEFAULT gen_random_uuid(), \
            \"email\" text NOT NULL UNIQUE, \
            \"username\" text NOT NULL UNIQUE, \
            \"full_name\" text, \
            \"hashed_password\" text, \
            \"is_active\" boolean NOT NULL DEFAULT true, \
            \"is_superuser\" boolean NOT NULL DEFAULT false, \
            \"oauth_provider\" text, \
            \"oauth_id\" text, \
            \"created_at\" timestamptz NOT NULL DEFAULT now(), \
            \"updated_at\" timestamptz)"],
        down_sql: &["DROP TABLE \"users\""],
    },
    Revision {
        id: "5b83d0f6a2c4",
        parent: Some("c9f41a7e2d10"),
        name: "02_create_user_sessions",
        up_sql: &["CREATE TABLE \"user_sessions\" (\
            \"id\" uuid PRIMARY KEY DEFAULT gen_random_uuid(), \
            \"user_id\" uuid NOT NULL REFERENCES \"users\" (\"id\") ON DELETE CASCADE, \
            \"is_active\" boolean NOT NULL DEFAULT true, \
            \"created_at\" timestamptz NOT NULL DEFAULT now(), \
            \"expires_at\" timestamptz NOT NULL, \
            \"user_agent\" text, \
            \"ip_address\" text)"],
        down_sql: &["DROP TABLE \"user_sessions\""],
    },
    Revision {
        id: "a1e6b2947f3d",
        parent: Some("5b83d0f6a2c4"),
        name: "03_users_last_login",
        up_sql: &["ALTER TABLE \"users\" ADD COLUMN \"last_login\" timestamptz"],
        down_sql: &["ALTER TABLE \"users\" DROP COLUMN \"last_login\""],
    },
];

/// Sentinel returned when no revision has been applied yet.
pub const NO_REVISION: &str = "none";
/// Sentinel returned when the marker table itself is unreadable.
pub const UNKNOWN_REVISION: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    Upgrade,
    Downgrade,
}

impl FromStr for MigrationDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upgrade" => Ok(MigrationDirection::Upgrade),
            "downgrade" => Ok(MigrationDirection::Downgrade),
            other => Err(AppError::BadRequest(format!("Unknown migration direction: {}", other))),
        }
    }
}

/// Tracks the applied-revision marker and walks the revision chain.
/// A failed step aborts the whole call and leaves the partially-applied
/// state as-is; that class of failure needs operator intervention.
pub struct MigrationCoordinator {
    pool: PgPool,
    chain: &'static [Revision],
}

impl MigrationCoordinator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, chain: REVISIONS }
    }

    #[cfg(test)]
    pub fn with_chain(pool: PgPool, chain: &'static [Revision]) -> Self {
        Self { pool, chain }
    }

    /// Reads the applied-revision marker. `"none"` when no revision is
    /// recorded, `"unknown"` when the marker table cannot be read at all.
    pub async fn current_revision(&self) -> String {
        let result: Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT version_num FROM schema_revision").fetch_optional(&self.pool).await;
        match result {
            Ok(Some((version,))) => version,
            Ok(None) => NO_REVISION.to_string(),
            Err(_) => UNKNOWN_REVISION.to_string(),
        }
    }

    /// Revisions not yet applied, newest first, walked from the head down
    /// to (but not including) the current one. An unrecognized current
    /// yields the entire chain; the chain is finite and acyclic, so the
    /// walk always terminates.
    pub async fn pending_revisions(&self) -> Vec<String> {
        let current = self.current_revision().await;
        pending_between(self.chain, &current)
    }

    /// Applies forward or reverse transforms step by step, advancing the
    /// marker after each step. Returns the new current revision.
    pub async fn migrate(&self, direction: MigrationDirection, target: Option<&str>) -> Result<String, AppError> {
        self.ensure_marker_table().await?;
        let current = self.current_revision().await;

        match direction {
            MigrationDirection::Upgrade => {
                let target = target.unwrap_or(head_id(self.chain));
                let steps = upgrade_steps(self.chain, &current, target)?;
                for revision in steps {
                    self.apply(revision, revision.up_sql).await?;
                    self.set_marker(Some(revision.id)).await?;
                    info!(revision = revision.id, name = revision.name, "migration step applied");
                }
            }
            MigrationDirection::Downgrade => {
                let steps = downgrade_steps(self.chain, &current, target)?;
                for revision in steps {
                    self.apply(revision, revision.down_sql).await?;
                    self.set_marker(revision.parent).await?;
                    info!(revision = revision.id, name = revision.name, "migration step reverted");
                }
            }
        }

        Ok(self.current_revision().await)
    }

    async fn apply(&self, revision: &Revision, statements: &[&str]) -> Result<(), AppError> {
        for sql in statements {
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                error!(revision = revision.id, error = %e, "migration step failed, partial state left in place");
                return Err(AppError::MigrationFailed {
                    revision: revision.id.to_string(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn ensure_marker_table(&self) -> Result<(), AppError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_revision (version_num text NOT NULL)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_marker(&self, revision: Option<&str>) -> Result<(), AppError> {
        sqlx::query("DELETE FROM schema_revision").execute(&self.pool).await?;
        if let Some(id) = revision {
            sqlx::query("INSERT INTO schema_revision (version_num) VALUES ($1)")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

fn head_id(chain: &[Revision]) -> &'static str {
    chain.last().expect("empty revision chain").id
}

fn find(chain: &'static [Revision], id: &str) -> Option<&'static Revision> {
    chain.iter().find(|r| r.id == id)
}

/// Walk head → parent collecting ids until `current` is reached. When
/// `current` is not in the chain (including "none"/"unknown"), the whole
/// chain comes back.
pub fn pending_between(chain: &'static [Revision], current: &str) -> Vec<String> {
    let mut pending = Vec::new();
    let mut cursor = chain.last();
    while let Some(revision) = cursor {
        if revision.id == current {
            break;
        }
        pending.push(revision.id.to_string());
        cursor = revision.parent.and_then(|p| find(chain, p));
    }
    pending
}

/// Forward steps from `current` (exclusive) up to `target` (inclusive),
/// in application order.
fn upgrade_steps(chain: &'static [Revision], current: &str, target: &str) -> Result<Vec<&'static Revision>, AppError> {
    let target_rev = find(chain, target).ok_or_else(|| AppError::BadRequest(format!("Unknown target revision: {}", target)))?;

    let mut steps = Vec::new();
    let mut cursor = Some(target_rev);
    while let Some(revision) = cursor {
        if revision.id == current {
            break;
        }
        steps.push(revision);
        cursor = revision.parent.and_then(|p| find(chain, p));
    }
    steps.reverse();
    if steps.is_empty() && current != target {
        // Target sits below current; that is a downgrade, not an upgrade.
        return Err(AppError::BadRequest(format!("Revision {} is not ahead of {}", target, current)));
    }
    Ok(steps)
}

/// Reverse steps from `current` down to (but not including) `target`, in
/// reversion order. Default target is one step back from current; the
/// special target `"base"` reverts the whole chain.
fn downgrade_steps(chain: &'static [Revision], current: &str, target: Option<&str>) -> Result<Vec<&'static Revision>, AppError> {
    let current_rev =
        find(chain, current).ok_or_else(|| AppError::BadRequest(format!("No applied revision to downgrade from (current: {})", current)))?;

    // `stop` is the revision that remains current after the downgrade;
    // None means revert everything.
    let stop = match target {
        None => current_rev.parent,
        Some("base") => None,
        Some(t) => {
            find(chain, t).ok_or_else(|| AppError::BadRequest(format!("Unknown target revision: {}", t)))?;
            Some(t)
        }
    };

    if stop == Some(current) {
        return Ok(Vec::new());
    }

    let mut steps = Vec::new();
    let mut cursor = Some(current_rev);
    while let Some(revision) = cursor {
        steps.push(revision);
        cursor = match revision.parent {
            Some(parent_id) if stop != Some(parent_id) => find(chain, parent_id),
            _ => None,
        };
    }

    // A known target that was never reached sits above current in the
    // chain; that is an upgrade, not a downgrade.
    if let Some(t) = stop
        && steps.last().and_then(|r| r.parent) != Some(t)
        && steps.last().map(|r| r.parent.is_none()).unwrap_or(false)
    {
        return Err(AppError::BadRequest(format!("Revision {} is not below {}", t, current)));
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_is_acyclic_and_parent_linked() {
        for (i, revision) in REVISIONS.iter().enumerate() {
            if i == 0 {
                assert!(revision.parent.is_none());
            } else {
                assert_eq!(revision.parent, Some(REVISIONS[i - 1].id));
            }
        }
    }

    #[test]
    fn pending_from_none_is_entire_chain() {
        let pending = pending_between(REVISIONS, NO_REVISION);
        assert_eq!(pending.len(), REVISIONS.len());
        assert_eq!(pending[0], REVISIONS.last().unwrap().id);
    }

    #[test]
    fn pending_from_unknown_current_is_entire_chain() {
        let pending = pending_between(REVISIONS, "deadbeef0000");
        assert_eq!(pending.len(), REVISIONS.len());
    }

    #[test]
    fn pending_from_head_is_empty() {
        let pending = pending_between(REVISIONS, REVISIONS.last().unwrap().id);
        assert!(pending.is_empty());
    }

    #[test]
    fn pending_from_middle_excludes_current() {
        let pending = pending_between(REVISIONS, REVISIONS[0].id);
        assert_eq!(pending.len(), REVISIONS.len() - 1);
        assert!(!pending.contains(&REVISIONS[0].id.to_string()));
    }

    #[test]
    fn upgrade_steps_run_root_first() {
        let steps = upgrade_steps(REVISIONS, NO_REVISION, head_id(REVISIONS)).unwrap();
        let ids: Vec<_> = steps.iter().map(|r| r.id).collect();
        assert_eq!(ids, REVISIONS.iter().map(|r| r.id).collect::<Vec<_>>());
    }

    #[test]
    fn upgrade_to_intermediate_target() {
        let steps = upgrade_steps(REVISIONS, REVISIONS[0].id, REVISIONS[1].id).unwrap();
        let ids: Vec<_> = steps.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![REVISIONS[1].id]);
    }

    #[test]
    fn upgrade_to_unknown_target_is_rejected() {
        assert!(upgrade_steps(REVISIONS, NO_REVISION, "deadbeef0000").is_err());
    }

    #[test]
    fn upgrade_when_already_at_target_is_a_no_op() {
        let head = head_id(REVISIONS);
        let steps = upgrade_steps(REVISIONS, head, head).unwrap();
        assert!(steps.is_empty());
    }

    #[test]
    fn default_downgrade_is_one_step_back() {
        let head = head_id(REVISIONS);
        let steps = downgrade_steps(REVISIONS, head, None).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].id, head);
    }

    #[test]
    fn downgrade_to_explicit_target() {
        let head = head_id(REVISIONS);
        let steps = downgrade_steps(REVISIONS, head, Some(REVISIONS[0].id)).unwrap();
        let ids: Vec<_> = steps.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![REVISIONS[2].id, REVISIONS[1].id]);
    }

    #[test]
    fn downgrade_without_applied_revision_is_rejected() {
        assert!(downgrade_steps(REVISIONS, NO_REVISION, None).is_err());
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("Upgrade".parse::<MigrationDirection>().unwrap(), MigrationDirection::Upgrade);
        assert_eq!("downgrade".parse::<MigrationDirection>().unwrap(), MigrationDirection::Downgrade);
        assert!("sideways".parse::<MigrationDirection>().is_err());
    }
}
