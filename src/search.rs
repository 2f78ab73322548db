use crate::catalog::models::ProductView;

/// Case-insensitive substring match on `title`, preserving order.
/// An empty query returns everything.
pub fn filter_products<'a>(products: &'a [ProductView], query: &str) -> Vec<&'a ProductView> {
    let needle = query.to_lowercase();
    products
        .iter()
        .filter(|p| needle.is_empty() || p.title.to_lowercase().contains(&needle))
        .collect()
}
