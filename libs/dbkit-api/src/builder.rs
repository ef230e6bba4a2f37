//! INSERT / REPLACE / UPDATE / DELETE statement construction.
//!
//! Text values starting with `:` are raw SQL: the remainder is inlined into
//! the statement and never bound. The prefix is stripped, not validated.

use crate::keyed::KeyedData;
use crate::value::Value;

/// SQL identifier quoting convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub quote: char,
}

impl Dialect {
    /// MySQL, SQLite.
    pub const BACKTICK: Dialect = Dialect { quote: '`' };
    /// ANSI SQL, PostgreSQL, SQLite.
    pub const DOUBLE_QUOTE: Dialect = Dialect { quote: '"' };
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::BACKTICK
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatementBuilder {
    dialect: Dialect,
}

impl StatementBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Quote each dot-separated segment, doubling embedded quote characters.
    ///
    /// `schema.table` → `` `schema`.`table` ``. A name that already starts
    /// with the quote character is returned unchanged.
    pub fn quote(&self, name: &str) -> String {
        let q = self.dialect.quote;
        if name.starts_with(q) {
            return name.to_string();
        }
        let doubled = format!("{q}{q}");
        name.split('.')
            .map(|segment| format!("{q}{}{q}", segment.replace(q, &doubled)))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// `insert|replace into <t> (<cols>) values (<placeholders>)` and the bound values.
    pub fn build_insert<D>(&self, table: &str, data: &D, use_replace: bool) -> (String, Vec<Value>)
    where
        D: KeyedData + ?Sized,
    {
        let items = self.extract(data);
        let op = if use_replace { "replace" } else { "insert" };
        let columns = items
            .iter()
            .map(|i| i.column.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let placeholders = items
            .iter()
            .map(|i| i.placeholder.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let values = items.into_iter().filter_map(|i| i.value).collect();
        let sql = format!(
            "{op} into {} ({columns}) values ({placeholders})",
            self.quote(table)
        );
        (sql, values)
    }

    /// `update <t> set <col>=<placeholder>,... [where <clause>]`.
    ///
    /// `where_args` follow the SET values. An empty `where_clause` updates every row.
    pub fn build_update<D>(
        &self,
        table: &str,
        data: &D,
        where_clause: &str,
        where_args: &[Value],
    ) -> (String, Vec<Value>)
    where
        D: KeyedData + ?Sized,
    {
        let items = self.extract(data);
        let assignments = items
            .iter()
            .map(|i| format!("{}={}", i.column, i.placeholder))
            .collect::<Vec<_>>()
            .join(",");
        let mut values: Vec<Value> = items.into_iter().filter_map(|i| i.value).collect();
        values.extend_from_slice(where_args);

        let mut sql = format!("update {} set {assignments}", self.quote(table));
        append_where(&mut sql, where_clause);
        (sql, values)
    }

    /// `delete from <t> [where <clause>]`.
    pub fn build_delete(&self, table: &str, where_clause: &str, args: &[Value]) -> (String, Vec<Value>) {
        let mut sql = format!("delete from {}", self.quote(table));
        append_where(&mut sql, where_clause);
        (sql, args.to_vec())
    }

    fn extract<D>(&self, data: &D) -> Vec<Item>
    where
        D: KeyedData + ?Sized,
    {
        data.keyed_values()
            .into_iter()
            .map(|(key, value)| {
                let column = self.quote(&key);
                match value {
                    Value::Text(s) if s.starts_with(':') => Item {
                        column,
                        placeholder: s[1..].to_string(),
                        value: None,
                    },
                    value => Item {
                        column,
                        placeholder: "?".to_string(),
                        value: Some(value),
                    },
                }
            })
            .collect()
    }
}

struct Item {
    column: String,
    placeholder: String,
    /// `None` for a raw expression.
    value: Option<Value>,
}

fn append_where(sql: &mut String, where_clause: &str) {
    let where_clause = where_clause.trim();
    if !where_clause.is_empty() {
        sql.push_str(" where ");
        sql.push_str(where_clause);
    }
}

/// `(?,?,...)` with `n` placeholders, for `IN` lists.
pub fn in_keys(n: usize) -> String {
    format!("({})", vec!["?"; n].join(","))
}

/// Placeholder group and bound values for an `IN` list, one `?` per item.
///
/// ```ignore
/// let (keys, mut args) = in_values([3, 5, 8]);
/// args.insert(0, Value::from("active"));
/// db.query(&format!("select * from t where state=? and id in {keys}"), &args)?;
/// ```
pub fn in_values<I>(items: I) -> (String, Vec<Value>)
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let values: Vec<Value> = items.into_iter().map(Into::into).collect();
    (in_keys(values.len()), values)
}

/// [`StatementBuilder::build_insert`] with backtick quoting.
pub fn build_insert_sql<D>(table: &str, data: &D, use_replace: bool) -> (String, Vec<Value>)
where
    D: KeyedData + ?Sized,
{
    StatementBuilder::new(Dialect::BACKTICK).build_insert(table, data, use_replace)
}

/// [`StatementBuilder::build_update`] with backtick quoting.
pub fn build_update_sql<D>(
    table: &str,
    data: &D,
    where_clause: &str,
    where_args: &[Value],
) -> (String, Vec<Value>)
where
    D: KeyedData + ?Sized,
{
    StatementBuilder::new(Dialect::BACKTICK).build_update(table, data, where_clause, where_args)
}
