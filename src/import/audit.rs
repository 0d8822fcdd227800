use crate::import::row::ParsedProduct;
use indexmap::IndexMap;

#[derive(Debug, PartialEq, Eq)]
struct Usage<'a> {
    row: usize,
    title: &'a str,
    color: &'a str,
}

/// One warning per image URL used by more than one (row, color) pair.
/// Informational only; the caller passes the rows that already validated.
pub fn find_duplicate_image_usage(products: &[ParsedProduct]) -> Vec<String> {
    let mut usages: IndexMap<&str, Vec<Usage<'_>>> = IndexMap::new();
    for product in products {
        for (color, data) in &product.images {
            for url in &data.images {
                let usage = Usage {
                    row: product.row,
                    title: &product.title,
                    color,
                };
                let entry = usages.entry(url.as_str()).or_default();
                if !entry.contains(&usage) {
                    entry.push(usage);
                }
            }
        }
    }

    usages
        .into_iter()
        .filter(|(_, places)| places.len() > 1)
        .map(|(url, places)| {
            let listed = places
                .iter()
                .map(|u| format!("\"{}\" ({}, row {})", u.title, u.color, u.row))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Image \"{url}\" is used {} times: {listed}", places.len())
        })
        .collect()
}
