use sqlx::{Postgres, QueryBuilder};

use super::*;
use parishdesk_domain::{PageRequest, TrashedFilter};

pub(super) fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: ScopePredicate) {
    match scope {
        ScopePredicate::Unrestricted => {
            builder.push("TRUE");
        }
        ScopePredicate::TenantOwned(tenant_id) => {
            builder.push("tenant_id = ");
            builder.push_bind(tenant_id.as_uuid());
        }
        ScopePredicate::SystemOnly => {
            builder.push("(tenant_id IS NULL AND is_custom = false)");
        }
        ScopePredicate::SystemOrTenantCustom(tenant_id) => {
            builder.push("((tenant_id IS NULL AND is_custom = false) OR (tenant_id = ");
            builder.push_bind(tenant_id.as_uuid());
            builder.push(" AND is_custom = true))");
        }
    }
}

pub(super) fn push_trashed(builder: &mut QueryBuilder<'_, Postgres>, trashed: TrashedFilter) {
    match trashed {
        TrashedFilter::Exclude => {
            builder.push(" AND deleted_at IS NULL");
        }
        TrashedFilter::Include => {}
        TrashedFilter::Only => {
            builder.push(" AND deleted_at IS NOT NULL");
        }
    }
}

pub(super) fn push_active(builder: &mut QueryBuilder<'_, Postgres>, active: Option<bool>) {
    if let Some(active) = active {
        builder.push(" AND active = ");
        builder.push_bind(active);
    }
}

pub(super) fn push_equals(
    builder: &mut QueryBuilder<'_, Postgres>,
    column: &'static str,
    value: Option<&str>,
) {
    if let Some(value) = value {
        builder.push(" AND ");
        builder.push(column);
        builder.push(" = ");
        builder.push_bind(value.to_owned());
    }
}

/// Case-insensitive substring match over any of `columns`.
pub(super) fn push_search(
    builder: &mut QueryBuilder<'_, Postgres>,
    columns: &[&'static str],
    term: Option<&str>,
) {
    let Some(term) = term else {
        return;
    };

    let pattern = format!("%{}%", escape_like(term));
    builder.push(" AND (");
    for (index, column) in columns.iter().enumerate() {
        if index > 0 {
            builder.push(" OR ");
        }
        builder.push("COALESCE(");
        builder.push(*column);
        builder.push(", '') ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\'");
    }
    builder.push(')');
}

pub(super) fn push_window(
    builder: &mut QueryBuilder<'_, Postgres>,
    page: PageRequest,
) -> AppResult<()> {
    let Some((offset, limit)) = page.window() else {
        return Ok(());
    };

    let limit = i64::try_from(limit)
        .map_err(|error| AppError::Validation(format!("invalid page size: {error}")))?;
    let offset = i64::try_from(offset)
        .map_err(|error| AppError::Validation(format!("invalid page offset: {error}")))?;

    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);
    Ok(())
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for character in term.chars() {
        if matches!(character, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(character);
    }

    escaped
}
