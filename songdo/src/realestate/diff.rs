use super::deal::Deal;
use std::collections::HashSet;

/// Drop repeated deals by identifier; the first occurrence wins
pub fn dedupe(deals: Vec<Deal>) -> Vec<Deal> {
    let mut seen = HashSet::with_capacity(deals.len());
    deals.into_iter().filter(|d| seen.insert(d.id())).collect()
}

/// Deals in `newer` whose identifier does not appear in `older`, in `newer` order
pub fn new_deals(older: &[Deal], newer: &[Deal]) -> Vec<Deal> {
    let known: HashSet<String> = older.iter().map(Deal::id).collect();
    dedupe(newer.to_vec())
        .into_iter()
        .filter(|d| !known.contains(&d.id()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(name: &str, price: u64) -> Deal {
        Deal {
            apartment_name: name.into(),
            area: "84.9㎡".into(),
            floor: "10층".into(),
            price: format!("{}만원", price),
            price_numeric: price,
            deal_date: "2025-03-01".into(),
            build_year: "2015".into(),
            location: "송도동".into(),
            price_per_pyeong: "0만원".into(),
        }
    }

    #[test]
    fn test_new_deals_is_set_difference() {
        let x1 = deal("X1", 50_000);
        let x2 = deal("X2", 60_000);
        let x3 = deal("X3", 70_000);

        let found = new_deals(&[x1.clone(), x2], &[x1, x3.clone()]);
        assert_eq!(found, vec![x3]);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut first = deal("A", 50_000);
        first.build_year = "first".into();
        let mut second = deal("A", 50_000);
        second.build_year = "second".into();
        let other = deal("B", 50_000);

        let unique = dedupe(vec![first, other.clone(), second]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].build_year, "first");
        assert_eq!(unique[1], other);
    }

    #[test]
    fn test_duplicates_in_newer_reported_once() {
        let a = deal("A", 1);
        let found = new_deals(&[], &[a.clone(), a.clone()]);
        assert_eq!(found, vec![a]);
    }

    #[test]
    fn test_price_change_counts_as_new() {
        let before = deal("A", 50_000);
        let after = deal("A", 51_000);
        assert_eq!(new_deals(&[before], &[after.clone()]), vec![after]);
    }
}
