use serde::{Deserialize, Serialize};

pub const MAX_LIMIT: i64 = 100;

/// Raw page/limit pair as it arrives on the query string.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Clamps to sane values and returns `(page, limit, offset)`.
    pub fn normalize(self, default_limit: i64) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT);
        (page, limit, (page - 1) * limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

impl PageMeta {
    /// `total_pages` is ceil(total/limit), floored at 1 so an empty result
    /// set still reports page 1 of 1.
    pub fn new(total_count: i64, page: i64, limit: i64) -> Self {
        let total_pages = ((total_count + limit - 1) / limit).max(1);
        Self {
            page,
            limit,
            total_count,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total_count: i64, page: i64, limit: i64) -> Self {
        Self {
            data,
            meta: PageMeta::new(total_count, page, limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    Newest,
    Oldest,
}

impl SortKey {
    /// Unknown or absent keys fall back to newest-first.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("price_asc") => SortKey::PriceAsc,
            Some("price_desc") => SortKey::PriceDesc,
            Some("oldest") => SortKey::Oldest,
            _ => SortKey::Newest,
        }
    }

    pub fn order_clause(self) -> &'static str {
        match self {
            SortKey::PriceAsc => "price ASC, created_at DESC",
            SortKey::PriceDesc => "price DESC, created_at DESC",
            SortKey::Newest => "created_at DESC",
            SortKey::Oldest => "created_at ASC",
        }
    }
}

/// Escapes `%`, `_` and `\` so user input cannot act as LIKE wildcards.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_applies_defaults_and_offset() {
        let (page, limit, offset) = PageParams::default().normalize(20);
        assert_eq!((page, limit, offset), (1, 20, 0));

        let p = PageParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(p.normalize(20), (3, 10, 20));
    }

    #[test]
    fn normalize_clamps_garbage() {
        let p = PageParams {
            page: Some(0),
            limit: Some(-5),
        };
        assert_eq!(p.normalize(20), (1, 1, 0));

        let p = PageParams {
            page: Some(2),
            limit: Some(10_000),
        };
        assert_eq!(p.normalize(20), (2, MAX_LIMIT, MAX_LIMIT));
    }

    #[test]
    fn empty_result_set_reports_one_page() {
        for limit in [1, 10, 20, 100] {
            let meta = PageMeta::new(0, 1, limit);
            assert_eq!(meta.total_pages, 1);
        }
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(PageMeta::new(1, 1, 10).total_pages, 1);
        assert_eq!(PageMeta::new(10, 1, 10).total_pages, 1);
        assert_eq!(PageMeta::new(11, 2, 10).total_pages, 2);
        assert_eq!(PageMeta::new(95, 1, 20).total_pages, 5);
    }

    #[test]
    fn sort_key_defaults_to_newest() {
        assert_eq!(SortKey::parse(None), SortKey::Newest);
        assert_eq!(SortKey::parse(Some("sideways")), SortKey::Newest);
        assert_eq!(SortKey::parse(Some("price_asc")), SortKey::PriceAsc);
        assert_eq!(SortKey::parse(Some("price_desc")), SortKey::PriceDesc);
        assert_eq!(SortKey::parse(Some("oldest")), SortKey::Oldest);
    }

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("dublin"), "dublin");
    }

    #[test]
    fn paginated_serializes_flat_meta() {
        let page = Paginated::new(vec![1, 2, 3], 3, 1, 20);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["total_count"], 3);
        assert_eq!(json["total_pages"], 1);
    }
}
