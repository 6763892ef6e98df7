//! Statement builders.
//!
//! Identifiers come from compile-time resource metadata, never from input,
//! and are always quoted. Values are always bound. Ids and owner columns are
//! compared as text so non-UUID input is simply "not found" rather than a
//! cast error.

use nomadhub_core::repository::OwnerFilter;
use nomadhub_core::resource::{Resource, ID_FIELD};

/// Quote an identifier.
#[must_use]
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn where_clause(by_id: bool, owner: Option<&OwnerFilter>, first_param: usize) -> String {
    let mut clauses = Vec::new();
    let mut param = first_param;
    if by_id {
        clauses.push(format!("t.{}::text = ${param}", quote(ID_FIELD)));
        param += 1;
    }
    if let Some(filter) = owner {
        clauses.push(format!("t.{}::text = ${param}", quote(filter.column)));
    }
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn from_clause<R: Resource>() -> String {
    let table = quote(R::TABLE);
    match R::JOIN {
        Some(join) => format!(
            "SELECT to_jsonb(t) AS record, \
             CASE WHEN p.{id} IS NULL THEN NULL ELSE to_jsonb(p) END AS parent \
             FROM {table} t LEFT JOIN {parent} p ON p.{id}::text = t.{fk}::text",
            id = quote(ID_FIELD),
            parent = quote(join.table),
            fk = quote(join.foreign_key),
        ),
        None => format!("SELECT to_jsonb(t) AS record, NULL::jsonb AS parent FROM {table} t"),
    }
}

/// All visible rows. Binds: `[owner]`.
#[must_use]
pub fn select_all<R: Resource>(owner: Option<&OwnerFilter>) -> String {
    format!("{}{}", from_clause::<R>(), where_clause(false, owner, 1))
}

/// One visible row. Binds: `id, [owner]`.
#[must_use]
pub fn select_one<R: Resource>(owner: Option<&OwnerFilter>) -> String {
    format!("{}{}", from_clause::<R>(), where_clause(true, owner, 1))
}

/// Columns written on insert: everything but server-managed columns, plus
/// the owner column when one is supplied.
#[must_use]
pub fn insert_columns<R: Resource>(owner: Option<&OwnerFilter>) -> Vec<&'static str> {
    R::COLUMNS
        .iter()
        .copied()
        .filter(|column| {
            !R::GENERATED.contains(column) || owner.is_some_and(|filter| filter.column == *column)
        })
        .collect()
}

/// Columns overwritten on update.
#[must_use]
pub fn update_columns<R: Resource>() -> Vec<&'static str> {
    R::COLUMNS
        .iter()
        .copied()
        .filter(|column| *column != ID_FIELD && !R::GENERATED.contains(column))
        .collect()
}

/// Insert from a JSON record. Binds: `record`.
#[must_use]
pub fn insert<R: Resource>(owner: Option<&OwnerFilter>) -> String {
    let table = quote(R::TABLE);
    let columns = insert_columns::<R>(owner)
        .into_iter()
        .map(quote)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} AS t ({columns}) \
         SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING to_jsonb(t) AS record"
    )
}

/// Overwrite user-supplied columns from a JSON record. Binds: `record, id, [owner]`.
#[must_use]
pub fn update<R: Resource>(owner: Option<&OwnerFilter>) -> String {
    let table = quote(R::TABLE);
    let mut assignments: Vec<String> = update_columns::<R>()
        .into_iter()
        .map(|column| format!("{0} = r.{0}", quote(column)))
        .collect();
    if assignments.is_empty() {
        assignments.push(format!("{0} = t.{0}", quote(ID_FIELD)));
    }
    format!(
        "UPDATE {table} AS t SET {} \
         FROM jsonb_populate_record(NULL::{table}, $1) AS r{} \
         RETURNING to_jsonb(t) AS record",
        assignments.join(", "),
        where_clause(true, owner, 2)
    )
}

/// Delete one visible row. Binds: `id, [owner]`.
#[must_use]
pub fn delete<R: Resource>(owner: Option<&OwnerFilter>) -> String {
    format!(
        "DELETE FROM {} AS t{} RETURNING to_jsonb(t) AS record",
        quote(R::TABLE),
        where_clause(true, owner, 1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomadhub_core::context::Principal;
    use nomadhub_testing::fixtures::{Hub, Region, Review};

    fn owner() -> Option<OwnerFilter> {
        OwnerFilter::for_resource::<Review>(&Principal::new("u1"))
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(quote("hubs"), "\"hubs\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_select_without_join_or_owner() {
        assert_eq!(
            select_all::<Region>(None),
            "SELECT to_jsonb(t) AS record, NULL::jsonb AS parent FROM \"regions\" t"
        );
    }

    #[test]
    fn test_select_with_join_and_owner() {
        let sql = select_one::<Review>(owner().as_ref());
        assert!(sql.contains("LEFT JOIN \"hubs\" p ON p.\"id\"::text = t.\"hub_id\"::text"));
        assert!(sql.ends_with("WHERE t.\"id\"::text = $1 AND t.\"user_id\"::text = $2"));
    }

    #[test]
    fn test_shared_join_has_no_owner_clause() {
        let sql = select_all::<Hub>(None);
        assert!(sql.contains("LEFT JOIN \"regions\" p"));
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_insert_writes_owner_but_not_other_generated_columns() {
        assert_eq!(insert_columns::<Review>(owner().as_ref()), vec!["id", "hub_id", "rating", "comment", "user_id"]);
        assert_eq!(insert_columns::<Review>(None), vec!["id", "hub_id", "rating", "comment"]);
        assert!(insert::<Review>(owner().as_ref()).contains("jsonb_populate_record(NULL::\"reviews\", $1)"));
    }

    #[test]
    fn test_update_never_touches_id_or_owner() {
        assert_eq!(update_columns::<Review>(), vec!["hub_id", "rating", "comment"]);
        let sql = update::<Review>(owner().as_ref());
        assert!(sql.contains("SET \"hub_id\" = r.\"hub_id\", \"rating\" = r.\"rating\", \"comment\" = r.\"comment\""));
        assert!(sql.contains("WHERE t.\"id\"::text = $2 AND t.\"user_id\"::text = $3"));
    }

    #[test]
    fn test_delete_is_scoped() {
        assert_eq!(
            delete::<Review>(owner().as_ref()),
            "DELETE FROM \"reviews\" AS t WHERE t.\"id\"::text = $1 AND t.\"user_id\"::text = $2 RETURNING to_jsonb(t) AS record"
        );
    }
}
