use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use parishdesk_core::{AppError, AppResult};
use parishdesk_domain::ExclusiveFlag;

/// Sets `flag` on `key` and clears it on every other row of `owner`.
///
/// The partial unique index backing the flag is checked per statement, so
/// other rows are cleared before the target is set.
pub(crate) async fn designate_exclusive(
    transaction: &mut Transaction<'_, Postgres>,
    flag: ExclusiveFlag,
    owner: Uuid,
    key: Uuid,
) -> AppResult<()> {
    let table = flag.table();
    let owner_column = flag.owner_column();
    let flag_column = flag.flag_column();
    let key_column = flag.key_column();

    let clear = format!(
        "UPDATE {table} SET {flag_column} = false WHERE {owner_column} = $1 AND {key_column} <> $2 AND {flag_column}"
    );
    sqlx::query(clear.as_str())
        .bind(owner)
        .bind(key)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to clear {} for '{owner}': {error}",
                flag.as_str()
            ))
        })?;

    let set = format!(
        "UPDATE {table} SET {flag_column} = true WHERE {owner_column} = $1 AND {key_column} = $2"
    );
    let result = sqlx::query(set.as_str())
        .bind(owner)
        .bind(key)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to designate {} '{key}': {error}",
                flag.as_str()
            ))
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "{} candidate '{key}' does not belong to '{owner}'",
            flag.as_str()
        )));
    }

    Ok(())
}
