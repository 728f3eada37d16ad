use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use serde_json::Value;

use super::schema::SCHEMA;
use super::{ListFilter, Store, slug, tree};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_json(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid JSON in database: '{}' - {}", s, e);
        Value::Object(serde_json::Map::new())
    })
}

fn parse_data_type(s: &str) -> DataType {
    s.parse().unwrap_or_else(|e| {
        tracing::error!("Invalid data type in database: {}", e);
        DataType::default()
    })
}

const APPLICATION_COLUMNS: &str =
    "id, slug, name, description, properties, parent_id, depth, path, lft, rgt, \
     created_at, updated_at";

const ATTRIBUTE_COLUMNS: &str =
    "id, slug, name, value, data_type, description, is_active, metadata, parent_id, depth, \
     path, lft, rgt, created_at, updated_at";

const ORGANISATION_COLUMNS: &str =
    "id, slug, name, description, code, email, phone, address, website, is_active, metadata, \
     parent_id, depth, path, lft, rgt, created_at, updated_at";

fn application_from_row(row: &Row) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        properties: parse_json(&row.get::<_, String>(4)?),
        tree: TreeFields {
            parent_id: row.get(5)?,
            depth: row.get(6)?,
            path: row.get(7)?,
            lft: row.get(8)?,
            rgt: row.get(9)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        updated_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}

fn attribute_from_row(row: &Row) -> rusqlite::Result<Attribute> {
    Ok(Attribute {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        value: row.get(3)?,
        data_type: parse_data_type(&row.get::<_, String>(4)?),
        description: row.get(5)?,
        is_active: row.get(6)?,
        metadata: parse_json(&row.get::<_, String>(7)?),
        tree: TreeFields {
            parent_id: row.get(8)?,
            depth: row.get(9)?,
            path: row.get(10)?,
            lft: row.get(11)?,
            rgt: row.get(12)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(13)?),
        updated_at: parse_datetime(&row.get::<_, String>(14)?),
    })
}

fn organisation_from_row(row: &Row) -> rusqlite::Result<Organisation> {
    Ok(Organisation {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        code: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        address: row.get(7)?,
        website: row.get(8)?,
        is_active: row.get(9)?,
        metadata: parse_json(&row.get::<_, String>(10)?),
        tree: TreeFields {
            parent_id: row.get(11)?,
            depth: row.get(12)?,
            path: row.get(13)?,
            lft: row.get(14)?,
            rgt: row.get(15)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(16)?),
        updated_at: parse_datetime(&row.get::<_, String>(17)?),
    })
}

fn row_exists(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
        params![id],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

fn load_nodes(conn: &Connection, table: &str) -> Result<Vec<(String, Option<String>)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, parent_id FROM {table} ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Recomputes depth/path/lft/rgt for the whole table. Must run inside the
/// transaction of the structural change that made the rebuild necessary.
fn rebuild_tree(tx: &Transaction, table: &str) -> Result<()> {
    let nodes = load_nodes(tx, table)?;
    let update_sql = format!(
        "UPDATE {table} SET depth = ?1, path = ?2, lft = ?3, rgt = ?4
         WHERE id = ?5 AND (depth != ?1 OR path != ?2 OR lft != ?3 OR rgt != ?4)"
    );

    for row in tree::rebuild(&nodes) {
        tx.execute(&update_sql, params![row.depth, row.path, row.lft, row.rgt, row.id])?;
    }
    Ok(())
}

/// Validates a parent assignment: the parent must exist and must not be the
/// node itself or one of its descendants. Runs before any row is written.
fn check_parent(tx: &Transaction, table: &str, id: &str, parent_id: Option<&str>) -> Result<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };

    if !row_exists(tx, table, parent_id)? {
        return Err(Error::ParentNotFound);
    }

    let nodes = load_nodes(tx, table)?;
    if tree::would_create_cycle(&nodes, id, parent_id) {
        return Err(Error::Cycle);
    }
    Ok(())
}

/// Resolves the slug to persist for a record.
///
/// An explicit slug is kept as-is but rejected on collision; an absent slug
/// is derived from `name` and uniquified with `-1`, `-2`, ... suffixes. The
/// record's own id is excluded so re-saves are idempotent.
fn assign_slug(tx: &Transaction, table: &str, id: &str, explicit: &str, name: &str) -> Result<String> {
    let taken_sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE slug = ?1 AND id != ?2)");
    let mut taken = |candidate: &str| -> Result<bool> {
        tx.query_row(&taken_sql, params![candidate, id], |row| row.get(0))
            .map_err(Error::from)
    };

    if !explicit.is_empty() {
        if taken(explicit)? {
            return Err(Error::Conflict(format!("slug '{explicit}' already exists")));
        }
        return Ok(explicit.to_string());
    }

    let base = slug::slugify(name);
    if base.is_empty() {
        return Err(Error::BadRequest(
            "cannot derive a slug from an empty name".to_string(),
        ));
    }
    slug::uniquify(&base, taken)
}

fn fetch_by_id<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    id: &str,
    map_row: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Option<T>> {
    conn.query_row(
        &format!("SELECT {columns} FROM {table} WHERE id = ?1"),
        params![id],
        map_row,
    )
    .optional()
    .map_err(Error::from)
}

fn fetch_by_slug<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    slug: &str,
    map_row: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Option<T>> {
    conn.query_row(
        &format!("SELECT {columns} FROM {table} WHERE slug = ?1"),
        params![slug],
        map_row,
    )
    .optional()
    .map_err(Error::from)
}

fn interval_of(conn: &Connection, table: &str, id: &str) -> Result<(i64, i64)> {
    conn.query_row(
        &format!("SELECT lft, rgt FROM {table} WHERE id = ?1"),
        params![id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or(Error::NotFound)
}

/// Ancestors in root-first order: nodes whose interval strictly contains the
/// node's interval.
fn entity_ancestors<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    id: &str,
    map_row: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let (lft, rgt) = interval_of(conn, table, id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns} FROM {table} WHERE lft < ?1 AND rgt > ?2 ORDER BY lft"
    ))?;
    let rows = stmt.query_map(params![lft, rgt], map_row)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Descendants in pre-order: nodes whose lft falls strictly inside the node's
/// interval.
fn entity_descendants<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    id: &str,
    map_row: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let (lft, rgt) = interval_of(conn, table, id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns} FROM {table} WHERE lft > ?1 AND lft < ?2 ORDER BY lft"
    ))?;
    let rows = stmt.query_map(params![lft, rgt], map_row)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn entity_children<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    id: &str,
    map_row: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    if !row_exists(conn, table, id)? {
        return Err(Error::NotFound);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns} FROM {table} WHERE parent_id = ?1 ORDER BY path"
    ))?;
    let rows = stmt.query_map(params![id], map_row)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Filtered, keyset-paginated listing. The cursor is the id of the last row
/// of the previous page; rows are ordered by `(sort column, id)`.
fn list_entities<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    search_columns: &[&str],
    filter: &ListFilter,
    map_row: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<rusqlite::types::Value> = Vec::new();

    if let Some(parent_id) = &filter.parent_id {
        values.push(parent_id.clone().into());
        clauses.push(format!("parent_id = ?{}", values.len()));
    }
    if let Some(active) = filter.is_active {
        values.push(active.into());
        clauses.push(format!("is_active = ?{}", values.len()));
    }
    if let Some(after) = &filter.created_after {
        values.push(format_datetime(after).into());
        clauses.push(format!("created_at >= ?{}", values.len()));
    }
    if let Some(before) = &filter.created_before {
        values.push(format_datetime(before).into());
        clauses.push(format!("created_at <= ?{}", values.len()));
    }
    if let Some(q) = filter.search.as_deref().filter(|q| !q.is_empty()) {
        let like = format!("%{q}%");
        let mut matches = Vec::with_capacity(search_columns.len());
        for column in search_columns {
            values.push(like.clone().into());
            matches.push(format!("{column} LIKE ?{}", values.len()));
        }
        clauses.push(format!("({})", matches.join(" OR ")));
    }

    let sort_column = filter.sort.key.column();
    if let Some(cursor_id) = filter.cursor.as_deref().filter(|c| !c.is_empty()) {
        let cursor_value: Option<String> = conn
            .query_row(
                &format!("SELECT {sort_column} FROM {table} WHERE id = ?1"),
                params![cursor_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(value) = cursor_value {
            let op = if filter.sort.descending { "<" } else { ">" };
            values.push(value.clone().into());
            let value_ix = values.len();
            values.push(value.into());
            let tie_ix = values.len();
            values.push(cursor_id.to_string().into());
            let id_ix = values.len();
            clauses.push(format!(
                "({sort_column} {op} ?{value_ix} OR ({sort_column} = ?{tie_ix} AND id > ?{id_ix}))"
            ));
        }
    }

    let mut sql = format!("SELECT {columns} FROM {table}");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    let direction = if filter.sort.descending { "DESC" } else { "ASC" };
    values.push(filter.limit.into());
    sql.push_str(&format!(
        " ORDER BY {sort_column} {direction}, id ASC LIMIT ?{}",
        values.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), map_row)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Application operations

    fn create_application(&self, app: &Application) -> Result<Application> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        check_parent(&tx, "applications", &app.id, app.tree.parent_id.as_deref())?;
        let slug = assign_slug(&tx, "applications", &app.id, &app.slug, &app.name)?;

        tx.execute(
            "INSERT INTO applications (id, slug, name, description, properties, parent_id,
                                       created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                app.id,
                slug,
                app.name,
                app.description,
                app.properties.to_string(),
                app.tree.parent_id,
                format_datetime(&app.created_at),
                format_datetime(&app.updated_at),
            ],
        )?;

        rebuild_tree(&tx, "applications")?;

        let created = fetch_by_id(&tx, "applications", APPLICATION_COLUMNS, &app.id, application_from_row)?
            .ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_application(&self, id: &str) -> Result<Option<Application>> {
        fetch_by_id(&self.conn(), "applications", APPLICATION_COLUMNS, id, application_from_row)
    }

    fn get_application_by_slug(&self, slug: &str) -> Result<Option<Application>> {
        fetch_by_slug(&self.conn(), "applications", APPLICATION_COLUMNS, slug, application_from_row)
    }

    fn list_applications(&self, filter: &ListFilter) -> Result<Vec<Application>> {
        // applications carry no is_active column
        let filter = ListFilter {
            is_active: None,
            ..filter.clone()
        };
        list_entities(
            &self.conn(),
            "applications",
            APPLICATION_COLUMNS,
            &["name", "slug", "description"],
            &filter,
            application_from_row,
        )
    }

    fn update_application(&self, app: &Application) -> Result<Application> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !row_exists(&tx, "applications", &app.id)? {
            return Err(Error::NotFound);
        }
        check_parent(&tx, "applications", &app.id, app.tree.parent_id.as_deref())?;
        let slug = assign_slug(&tx, "applications", &app.id, &app.slug, &app.name)?;

        tx.execute(
            "UPDATE applications
             SET slug = ?1, name = ?2, description = ?3, properties = ?4, parent_id = ?5,
                 updated_at = ?6
             WHERE id = ?7",
            params![
                slug,
                app.name,
                app.description,
                app.properties.to_string(),
                app.tree.parent_id,
                format_datetime(&Utc::now()),
                app.id,
            ],
        )?;

        rebuild_tree(&tx, "applications")?;

        let updated = fetch_by_id(&tx, "applications", APPLICATION_COLUMNS, &app.id, application_from_row)?
            .ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_application(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // the self-referential FK cascades the delete through descendants
        let rows = tx.execute("DELETE FROM applications WHERE id = ?1", params![id])?;
        if rows > 0 {
            rebuild_tree(&tx, "applications")?;
        }
        tx.commit()?;
        Ok(rows > 0)
    }

    fn application_ancestors(&self, id: &str) -> Result<Vec<Application>> {
        entity_ancestors(&self.conn(), "applications", APPLICATION_COLUMNS, id, application_from_row)
    }

    fn application_descendants(&self, id: &str) -> Result<Vec<Application>> {
        entity_descendants(&self.conn(), "applications", APPLICATION_COLUMNS, id, application_from_row)
    }

    fn application_children(&self, id: &str) -> Result<Vec<Application>> {
        entity_children(&self.conn(), "applications", APPLICATION_COLUMNS, id, application_from_row)
    }

    // Attribute operations

    fn create_attribute(&self, attr: &Attribute) -> Result<Attribute> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        check_parent(&tx, "attributes", &attr.id, attr.tree.parent_id.as_deref())?;
        let slug = assign_slug(&tx, "attributes", &attr.id, &attr.slug, &attr.name)?;

        tx.execute(
            "INSERT INTO attributes (id, slug, name, value, data_type, description, is_active,
                                     metadata, parent_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                attr.id,
                slug,
                attr.name,
                attr.value,
                attr.data_type.as_str(),
                attr.description,
                attr.is_active,
                attr.metadata.to_string(),
                attr.tree.parent_id,
                format_datetime(&attr.created_at),
                format_datetime(&attr.updated_at),
            ],
        )?;

        rebuild_tree(&tx, "attributes")?;

        let created = fetch_by_id(&tx, "attributes", ATTRIBUTE_COLUMNS, &attr.id, attribute_from_row)?
            .ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_attribute(&self, id: &str) -> Result<Option<Attribute>> {
        fetch_by_id(&self.conn(), "attributes", ATTRIBUTE_COLUMNS, id, attribute_from_row)
    }

    fn get_attribute_by_slug(&self, slug: &str) -> Result<Option<Attribute>> {
        fetch_by_slug(&self.conn(), "attributes", ATTRIBUTE_COLUMNS, slug, attribute_from_row)
    }

    fn list_attributes(&self, filter: &ListFilter) -> Result<Vec<Attribute>> {
        list_entities(
            &self.conn(),
            "attributes",
            ATTRIBUTE_COLUMNS,
            &["name", "slug", "value", "description"],
            filter,
            attribute_from_row,
        )
    }

    fn update_attribute(&self, attr: &Attribute) -> Result<Attribute> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !row_exists(&tx, "attributes", &attr.id)? {
            return Err(Error::NotFound);
        }
        check_parent(&tx, "attributes", &attr.id, attr.tree.parent_id.as_deref())?;
        let slug = assign_slug(&tx, "attributes", &attr.id, &attr.slug, &attr.name)?;

        tx.execute(
            "UPDATE attributes
             SET slug = ?1, name = ?2, value = ?3, data_type = ?4, description = ?5,
                 is_active = ?6, metadata = ?7, parent_id = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                slug,
                attr.name,
                attr.value,
                attr.data_type.as_str(),
                attr.description,
                attr.is_active,
                attr.metadata.to_string(),
                attr.tree.parent_id,
                format_datetime(&Utc::now()),
                attr.id,
            ],
        )?;

        rebuild_tree(&tx, "attributes")?;

        let updated = fetch_by_id(&tx, "attributes", ATTRIBUTE_COLUMNS, &attr.id, attribute_from_row)?
            .ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_attribute(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute("DELETE FROM attributes WHERE id = ?1", params![id])?;
        if rows > 0 {
            rebuild_tree(&tx, "attributes")?;
        }
        tx.commit()?;
        Ok(rows > 0)
    }

    fn attribute_ancestors(&self, id: &str) -> Result<Vec<Attribute>> {
        entity_ancestors(&self.conn(), "attributes", ATTRIBUTE_COLUMNS, id, attribute_from_row)
    }

    fn attribute_descendants(&self, id: &str) -> Result<Vec<Attribute>> {
        entity_descendants(&self.conn(), "attributes", ATTRIBUTE_COLUMNS, id, attribute_from_row)
    }

    fn attribute_children(&self, id: &str) -> Result<Vec<Attribute>> {
        entity_children(&self.conn(), "attributes", ATTRIBUTE_COLUMNS, id, attribute_from_row)
    }

    // Organisation operations

    fn create_organisation(&self, org: &Organisation) -> Result<Organisation> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        check_parent(&tx, "organisations", &org.id, org.tree.parent_id.as_deref())?;
        let slug = assign_slug(&tx, "organisations", &org.id, &org.slug, &org.name)?;

        tx.execute(
            "INSERT INTO organisations (id, slug, name, description, code, email, phone,
                                        address, website, is_active, metadata, parent_id,
                                        created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                org.id,
                slug,
                org.name,
                org.description,
                org.code,
                org.email,
                org.phone,
                org.address,
                org.website,
                org.is_active,
                org.metadata.to_string(),
                org.tree.parent_id,
                format_datetime(&org.created_at),
                format_datetime(&org.updated_at),
            ],
        )?;

        rebuild_tree(&tx, "organisations")?;

        let created = fetch_by_id(&tx, "organisations", ORGANISATION_COLUMNS, &org.id, organisation_from_row)?
            .ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_organisation(&self, id: &str) -> Result<Option<Organisation>> {
        fetch_by_id(&self.conn(), "organisations", ORGANISATION_COLUMNS, id, organisation_from_row)
    }

    fn get_organisation_by_slug(&self, slug: &str) -> Result<Option<Organisation>> {
        fetch_by_slug(&self.conn(), "organisations", ORGANISATION_COLUMNS, slug, organisation_from_row)
    }

    fn list_organisations(&self, filter: &ListFilter) -> Result<Vec<Organisation>> {
        list_entities(
            &self.conn(),
            "organisations",
            ORGANISATION_COLUMNS,
            &["name", "slug", "description", "code", "email"],
            filter,
            organisation_from_row,
        )
    }

    fn update_organisation(&self, org: &Organisation) -> Result<Organisation> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !row_exists(&tx, "organisations", &org.id)? {
            return Err(Error::NotFound);
        }
        check_parent(&tx, "organisations", &org.id, org.tree.parent_id.as_deref())?;
        let slug = assign_slug(&tx, "organisations", &org.id, &org.slug, &org.name)?;

        tx.execute(
            "UPDATE organisations
             SET slug = ?1, name = ?2, description = ?3, code = ?4, email = ?5, phone = ?6,
                 address = ?7, website = ?8, is_active = ?9, metadata = ?10, parent_id = ?11,
                 updated_at = ?12
             WHERE id = ?13",
            params![
                slug,
                org.name,
                org.description,
                org.code,
                org.email,
                org.phone,
                org.address,
                org.website,
                org.is_active,
                org.metadata.to_string(),
                org.tree.parent_id,
                format_datetime(&Utc::now()),
                org.id,
            ],
        )?;

        rebuild_tree(&tx, "organisations")?;

        let updated = fetch_by_id(&tx, "organisations", ORGANISATION_COLUMNS, &org.id, organisation_from_row)?
            .ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_organisation(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute("DELETE FROM organisations WHERE id = ?1", params![id])?;
        if rows > 0 {
            rebuild_tree(&tx, "organisations")?;
        }
        tx.commit()?;
        Ok(rows > 0)
    }

    fn organisation_ancestors(&self, id: &str) -> Result<Vec<Organisation>> {
        entity_ancestors(&self.conn(), "organisations", ORGANISATION_COLUMNS, id, organisation_from_row)
    }

    fn organisation_descendants(&self, id: &str) -> Result<Vec<Organisation>> {
        entity_descendants(&self.conn(), "organisations", ORGANISATION_COLUMNS, id, organisation_from_row)
    }

    fn organisation_children(&self, id: &str) -> Result<Vec<Organisation>> {
        entity_children(&self.conn(), "organisations", ORGANISATION_COLUMNS, id, organisation_from_row)
    }

    // Application-Attribute M2M operations

    fn set_application_attributes(
        &self,
        application_id: &str,
        attribute_ids: &[String],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !row_exists(&tx, "applications", application_id)? {
            return Err(Error::NotFound);
        }

        tx.execute(
            "DELETE FROM application_attributes WHERE application_id = ?1",
            params![application_id],
        )?;

        for attribute_id in attribute_ids {
            if !row_exists(&tx, "attributes", attribute_id)? {
                return Err(Error::BadRequest(format!(
                    "attribute '{attribute_id}' not found"
                )));
            }
            tx.execute(
                "INSERT OR IGNORE INTO application_attributes (application_id, attribute_id)
                 VALUES (?1, ?2)",
                params![application_id, attribute_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn add_application_attribute(&self, application_id: &str, attribute_id: &str) -> Result<()> {
        let conn = self.conn();
        if !row_exists(&conn, "applications", application_id)? {
            return Err(Error::NotFound);
        }
        if !row_exists(&conn, "attributes", attribute_id)? {
            return Err(Error::BadRequest(format!(
                "attribute '{attribute_id}' not found"
            )));
        }
        conn.execute(
            "INSERT OR IGNORE INTO application_attributes (application_id, attribute_id)
             VALUES (?1, ?2)",
            params![application_id, attribute_id],
        )?;
        Ok(())
    }

    fn remove_application_attribute(
        &self,
        application_id: &str,
        attribute_id: &str,
    ) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM application_attributes WHERE application_id = ?1 AND attribute_id = ?2",
            params![application_id, attribute_id],
        )?;
        Ok(rows > 0)
    }

    fn list_application_attributes(&self, application_id: &str) -> Result<Vec<Attribute>> {
        let conn = self.conn();
        if !row_exists(&conn, "applications", application_id)? {
            return Err(Error::NotFound);
        }
        // pre-order, so pickers can render the tree indented
        let mut stmt = conn.prepare(
            "SELECT a.id, a.slug, a.name, a.value, a.data_type, a.description, a.is_active,
                    a.metadata, a.parent_id, a.depth, a.path, a.lft, a.rgt, a.created_at,
                    a.updated_at
             FROM attributes a
             JOIN application_attributes aa ON a.id = aa.attribute_id
             WHERE aa.application_id = ?1
             ORDER BY a.path",
        )?;
        let rows = stmt.query_map(params![application_id], attribute_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Application-Organisation M2M operations

    fn set_application_organisations(
        &self,
        application_id: &str,
        organisation_ids: &[String],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !row_exists(&tx, "applications", application_id)? {
            return Err(Error::NotFound);
        }

        tx.execute(
            "DELETE FROM application_organisations WHERE application_id = ?1",
            params![application_id],
        )?;

        for organisation_id in organisation_ids {
            if !row_exists(&tx, "organisations", organisation_id)? {
                return Err(Error::BadRequest(format!(
                    "organisation '{organisation_id}' not found"
                )));
            }
            tx.execute(
                "INSERT OR IGNORE INTO application_organisations (application_id, organisation_id)
                 VALUES (?1, ?2)",
                params![application_id, organisation_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn add_application_organisation(
        &self,
        application_id: &str,
        organisation_id: &str,
    ) -> Result<()> {
        let conn = self.conn();
        if !row_exists(&conn, "applications", application_id)? {
            return Err(Error::NotFound);
        }
        if !row_exists(&conn, "organisations", organisation_id)? {
            return Err(Error::BadRequest(format!(
                "organisation '{organisation_id}' not found"
            )));
        }
        conn.execute(
            "INSERT OR IGNORE INTO application_organisations (application_id, organisation_id)
             VALUES (?1, ?2)",
            params![application_id, organisation_id],
        )?;
        Ok(())
    }

    fn remove_application_organisation(
        &self,
        application_id: &str,
        organisation_id: &str,
    ) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM application_organisations
             WHERE application_id = ?1 AND organisation_id = ?2",
            params![application_id, organisation_id],
        )?;
        Ok(rows > 0)
    }

    fn list_application_organisations(&self, application_id: &str) -> Result<Vec<Organisation>> {
        let conn = self.conn();
        if !row_exists(&conn, "applications", application_id)? {
            return Err(Error::NotFound);
        }
        let mut stmt = conn.prepare(
            "SELECT o.id, o.slug, o.name, o.description, o.code, o.email, o.phone, o.address,
                    o.website, o.is_active, o.metadata, o.parent_id, o.depth, o.path, o.lft,
                    o.rgt, o.created_at, o.updated_at
             FROM organisations o
             JOIN application_organisations ao ON o.id = ao.organisation_id
             WHERE ao.application_id = ?1
             ORDER BY o.path",
        )?;
        let rows = stmt.query_map(params![application_id], organisation_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, created_at, expires_at,
                                 last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
                token.last_used_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, created_at, expires_at, last_used_at
             FROM tokens WHERE token_lookup = ?1",
            params![lookup],
            |row| {
                Ok(Token {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    token_lookup: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    expires_at: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
                    last_used_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_tokens(&self) -> Result<Vec<Token>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, token_hash, token_lookup, created_at, expires_at, last_used_at
             FROM tokens ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Token {
                id: row.get(0)?,
                token_hash: row.get(1)?,
                token_lookup: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
                expires_at: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
                last_used_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn has_tokens(&self) -> Result<bool> {
        self.conn()
            .query_row("SELECT EXISTS(SELECT 1 FROM tokens)", [], |row| row.get(0))
            .map_err(Error::from)
    }
}
