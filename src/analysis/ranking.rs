//! Sorting and pagination of the project ranking table.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::aggregate::ProjectRankingRow;

/// Column the ranking table is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    ProjectName,
    TransactionCount,
    #[default]
    SaleAmountSum,
    HouseAreaSum,
    WeightedUnitPrice,
    MedianUnitPrice,
    MinUnitPrice,
    MaxUnitPrice,
    MarketShare,
}

impl SortKey {
    fn value(self, row: &ProjectRankingRow) -> Option<f64> {
        match self {
            SortKey::ProjectName => None,
            SortKey::TransactionCount => Some(row.transaction_count as f64),
            SortKey::SaleAmountSum => Some(row.sale_amount_sum),
            SortKey::HouseAreaSum => Some(row.house_area_sum),
            SortKey::WeightedUnitPrice => row.weighted_unit_price,
            SortKey::MedianUnitPrice => row.unit_price.median,
            SortKey::MinUnitPrice => row.unit_price.min,
            SortKey::MaxUnitPrice => row.unit_price.max,
            SortKey::MarketShare => Some(row.market_share),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortSpec {
    /// Header click: the active key flips its order, a new key starts descending.
    pub fn toggle(self, key: SortKey) -> Self {
        if key == self.key {
            Self {
                key,
                order: self.order.reversed(),
            }
        } else {
            Self {
                key,
                order: SortOrder::Desc,
            }
        }
    }
}

/// Stable sort of ranking rows. Equal keys keep their incoming order and rows
/// without a value go last in either direction.
pub fn sort_rows(rows: &mut [ProjectRankingRow], spec: SortSpec) {
    rows.sort_by(|a, b| {
        let ordering = match spec.key {
            SortKey::ProjectName => a.project_name.cmp(&b.project_name),
            key => match (key.value(a), key.value(b)) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => return Ordering::Less,
                (None, Some(_)) => return Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        match spec.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// One page of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, after clamping
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Slice out page `page` (1-based). Out-of-range pages clamp to the nearest valid page;
/// an empty input yields page 1 of 0 with no items.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(items.len());

    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        page,
        page_size,
        total_items: items.len(),
        total_pages,
    }
}

/// Entry of the pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageLink {
    Page(usize),
    Ellipsis,
}

/// Page links around `current`. Up to 9 pages are listed in full. Longer runs show a
/// window near the current page with the first and last page kept reachable, which is
/// at most 10 numbered links plus ellipses.
pub fn page_window(current: usize, total_pages: usize) -> Vec<PageLink> {
    if total_pages == 0 {
        return Vec::new();
    }

    let (start, end) = if total_pages <= 9 {
        (1, total_pages)
    } else if current <= 5 {
        (1, 7)
    } else if current + 4 >= total_pages {
        (total_pages - 8, total_pages)
    } else {
        (current - 4, current + 3)
    };

    let mut links = Vec::new();
    if start > 1 {
        links.push(PageLink::Page(1));
        if start > 2 {
            links.push(PageLink::Ellipsis);
        }
    }
    links.extend((start..=end).map(PageLink::Page));
    if end < total_pages {
        if end < total_pages - 1 {
            links.push(PageLink::Ellipsis);
        }
        links.push(PageLink::Page(total_pages));
    }
    links
}
