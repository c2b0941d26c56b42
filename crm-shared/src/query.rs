/// Filter, sort, paginate and fuzzy-search for entity listings.
///
/// Every listing endpoint funnels its query string through [`ListQuery`], which
/// emits two parameterized statements: a `COUNT(*)` over the filtered set and
/// the ordered page itself. User input only ever reaches the database as bound
/// parameters. Identifiers (table, columns, sort key) come from the static
/// [`Listing`] descriptor of each entity, and a requested sort field is only
/// honoured when it matches an entry of that descriptor's allow-list.
///
/// # Listing path
///
/// Equality and date filters plus ownership, ordered by the resolved sort
/// column, then `id ASC` as a tie-break.
///
/// # Search path
///
/// When `q` is non-blank the designated text columns must contain `q`
/// (case-insensitive, wildcards escaped), and rows are ranked by
/// `similarity(column, q)` descending for each column in turn before the
/// listing order applies. Filters and ownership still hold. `total` is the full
/// match count, not the page length.
///
/// # Example
///
/// ```
/// use crm_shared::query::{Listing, ListQuery, PageParams, SortPolicy, Filter};
///
/// static NOTES: Listing = Listing {
///     table: "notes",
///     columns: "id, title, owner_id, created_at",
///     sortable: &["id", "title", "created_at"],
///     searchable: &["title"],
/// };
///
/// let params = PageParams { sort_by: Some("title".into()), ..PageParams::default() };
/// let query = ListQuery::new(&NOTES, &params, SortPolicy::Fallback)
///     .unwrap()
///     .owned_by(7)
///     .filter(Filter::Text("title", "groceries".into()));
/// assert_eq!(query.sort_column(), "title");
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;

/// Page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: i64 = 10;

/// Column every listing falls back to and breaks ties on.
const PRIMARY_KEY: &str = "id";

/// Column ownership is scoped on.
const OWNER_COLUMN: &str = "owner_id";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid sort field")]
    InvalidSortField(String),

    #[error("skip must be greater than or equal to 0")]
    NegativeSkip,

    #[error("limit must be greater than or equal to 1")]
    NonPositiveLimit,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Static description of a listable table.
#[derive(Debug)]
pub struct Listing {
    pub table: &'static str,
    /// Select list, in the order the row type expects
    pub columns: &'static str,
    /// Fields a caller may sort by; each must be a real column
    pub sortable: &'static [&'static str],
    /// Text columns matched and ranked on the search path
    pub searchable: &'static [&'static str],
}

impl Listing {
    /// Maps a requested sort field onto an allow-listed column.
    ///
    /// A missing or blank field means the primary key. An unknown field falls
    /// back to the primary key under [`SortPolicy::Fallback`] and is rejected
    /// under [`SortPolicy::Strict`].
    pub fn resolve_sort(
        &self,
        requested: Option<&str>,
        policy: SortPolicy,
    ) -> Result<&'static str, QueryError> {
        let Some(field) = requested.map(str::trim).filter(|f| !f.is_empty()) else {
            return Ok(PRIMARY_KEY);
        };

        if let Some(column) = self.sortable.iter().find(|column| **column == field) {
            return Ok(*column);
        }

        match policy {
            SortPolicy::Fallback => {
                debug!(table = self.table, field, "Unknown sort field, using primary key");
                Ok(PRIMARY_KEY)
            }
            SortPolicy::Strict => Err(QueryError::InvalidSortField(field.to_string())),
        }
    }
}

/// What to do with a sort field outside the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPolicy {
    Fallback,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `"desc"` in any letter case selects descending; anything else ascending.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Pagination, sort and search parameters common to every listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub q: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
            sort_by: None,
            sort_order: None,
            q: None,
        }
    }
}

/// A row predicate. Column names are compile-time constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Text(&'static str, String),
    Int(&'static str, i64),
    /// `created_at >= ts`
    CreatedFrom(DateTime<Utc>),
    /// `created_at <= ts`
    CreatedUntil(DateTime<Utc>),
    /// `created_at` in UTC falls on or before `day`
    CreatedOnOrBefore(NaiveDate),
}

/// One page of results and the size of the whole filtered set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub total: i64,
    pub items: Vec<T>,
}

/// Fully validated listing request for one table.
#[derive(Debug, Clone)]
pub struct ListQuery {
    listing: &'static Listing,
    owner_id: Option<i64>,
    filters: Vec<Filter>,
    sort_column: &'static str,
    order: SortOrder,
    search: Option<String>,
    skip: i64,
    limit: i64,
}

impl ListQuery {
    /// Validates paging and resolves the sort column.
    ///
    /// # Errors
    ///
    /// - [`QueryError::NegativeSkip`] if `skip < 0`
    /// - [`QueryError::NonPositiveLimit`] if `limit < 1`
    /// - [`QueryError::InvalidSortField`] for an unknown field under [`SortPolicy::Strict`]
    pub fn new(
        listing: &'static Listing,
        params: &PageParams,
        policy: SortPolicy,
    ) -> Result<Self, QueryError> {
        if params.skip < 0 {
            return Err(QueryError::NegativeSkip);
        }
        if params.limit < 1 {
            return Err(QueryError::NonPositiveLimit);
        }

        let sort_column = listing.resolve_sort(params.sort_by.as_deref(), policy)?;
        let search = params
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        Ok(Self {
            listing,
            owner_id: None,
            filters: Vec::new(),
            sort_column,
            order: SortOrder::from_param(params.sort_order.as_deref()),
            search,
            skip: params.skip,
            limit: params.limit,
        })
    }

    /// Restricts the listing to rows owned by `owner_id`.
    pub fn owned_by(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds `filter` when present.
    pub fn filter_opt(self, filter: Option<Filter>) -> Self {
        match filter {
            Some(filter) => self.filter(filter),
            None => self,
        }
    }

    pub fn sort_column(&self) -> &'static str {
        self.sort_column
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn push_predicates(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        let mut first = true;
        let mut glue = |qb: &mut QueryBuilder<'static, Postgres>| {
            qb.push(if first { " WHERE " } else { " AND " });
            first = false;
        };

        if let Some(owner_id) = self.owner_id {
            glue(qb);
            qb.push(OWNER_COLUMN).push(" = ").push_bind(owner_id);
        }

        for filter in &self.filters {
            glue(qb);
            match filter {
                Filter::Text(column, value) => {
                    qb.push(*column).push(" = ").push_bind(value.clone());
                }
                Filter::Int(column, value) => {
                    qb.push(*column).push(" = ").push_bind(*value);
                }
                Filter::CreatedFrom(ts) => {
                    qb.push("created_at >= ").push_bind(*ts);
                }
                Filter::CreatedUntil(ts) => {
                    qb.push("created_at <= ").push_bind(*ts);
                }
                Filter::CreatedOnOrBefore(day) => {
                    qb.push("(created_at AT TIME ZONE 'UTC')::date <= ").push_bind(*day);
                }
            }
        }

        if let Some(term) = &self.search {
            if !self.listing.searchable.is_empty() {
                glue(qb);
                let pattern = like_pattern(term);
                qb.push("(");
                for (i, column) in self.listing.searchable.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(*column)
                        .push(" ILIKE ")
                        .push_bind(pattern.clone())
                        .push(" ESCAPE '\\'");
                }
                qb.push(")");
            }
        }
    }

    fn push_ordering(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" ORDER BY ");

        if let Some(term) = &self.search {
            for column in self.listing.searchable {
                qb.push("COALESCE(similarity(")
                    .push(*column)
                    .push(", ")
                    .push_bind(term.clone())
                    .push("), 0) DESC, ");
            }
        }

        qb.push(self.sort_column).push(" ").push(self.order.as_sql());

        if self.sort_column != PRIMARY_KEY {
            qb.push(", ").push(PRIMARY_KEY).push(" ASC");
        }
    }

    /// `SELECT COUNT(*)` over the filtered set.
    pub fn count_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
        qb.push(self.listing.table);
        self.push_predicates(&mut qb);
        qb
    }

    /// The ordered, paginated select.
    pub fn page_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(self.listing.columns)
            .push(" FROM ")
            .push(self.listing.table);
        self.push_predicates(&mut qb);
        self.push_ordering(&mut qb);
        qb.push(" LIMIT ").push_bind(self.limit);
        qb.push(" OFFSET ").push_bind(self.skip);
        qb
    }

    /// Runs the count and the page select.
    pub async fn fetch<T>(&self, pool: &PgPool) -> Result<Page<T>, QueryError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut count = self.count_builder();
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut page = self.page_builder();
        let items = page.build_query_as::<T>().fetch_all(pool).await?;

        debug!(
            table = self.listing.table,
            total,
            returned = items.len(),
            search = self.search.is_some(),
            "Listed rows"
        );

        Ok(Page { total, items })
    }
}

/// Wraps `term` for a literal-substring `ILIKE ... ESCAPE '\'`.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
