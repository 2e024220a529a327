//! CSV export of gem listings.

use std::borrow::Cow;

use gemvault_core::Gem;

/// Column headers, in output order.
pub const GEM_CSV_HEADERS: [&str; 15] = [
    "Stock ID",
    "Stone Type",
    "Color",
    "Shape",
    "Carat",
    "Clarity",
    "Origin",
    "Treatment",
    "Certificate",
    "Measurements",
    "Price",
    "Available",
    "Images",
    "Videos",
    "Certificates",
];

/// Render gems as RFC 4180 CSV (CRLF line endings, header row first).
#[must_use]
pub fn gems_to_csv(gems: &[Gem]) -> String {
    let mut csv = String::new();
    write_row(&mut csv, GEM_CSV_HEADERS.iter().copied());

    for gem in gems {
        let price = gem.price.map(|p| format!("{p:.2}")).unwrap_or_default();
        let carat = format!("{:.2}", gem.carat);
        let images = gem.images.join(" ");
        let videos = gem.videos.join(" ");
        let certificates = gem.certificates.join(" ");
        write_row(
            &mut csv,
            [
                gem.stock_id.as_str(),
                &gem.stone_type,
                &gem.color,
                &gem.shape,
                &carat,
                gem.clarity.as_deref().unwrap_or(""),
                gem.origin.as_deref().unwrap_or(""),
                gem.treatment.as_deref().unwrap_or(""),
                gem.certificate.as_deref().unwrap_or(""),
                gem.measurements.as_deref().unwrap_or(""),
                &price,
                if gem.availability { "yes" } else { "no" },
                &images,
                &videos,
                &certificates,
            ],
        );
    }
    csv
}

fn write_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field));
    }
    out.push_str("\r\n");
}

/// Quote a field if it contains a delimiter, quote, or line break.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn gem(json: &str) -> Gem {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("Ruby"), "Ruby");
        assert_eq!(escape_field("Oval, modified"), "\"Oval, modified\"");
        assert_eq!(escape_field("7.1\" x 5.2"), "\"7.1\"\" x 5.2\"");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let gems = vec![
            gem(r#"{"_id":"g1","stockId":"RB-1","stoneType":"Ruby","color":"Red","shape":"Oval","carat":2.049,"price":18500,"origin":"Burma, Mogok"}"#),
            gem(r#"{"_id":"g2","stockId":"SP-2","stoneType":"Sapphire","color":"Blue","shape":"Cushion","carat":1,"availability":false}"#),
        ];
        let csv = gems_to_csv(&gems);
        let lines: Vec<&str> = csv.split("\r\n").collect();

        assert_eq!(lines.len(), 4, "header, two rows, trailing empty");
        assert!(lines[0].starts_with("Stock ID,Stone Type,Color"));
        assert_eq!(
            lines[1],
            "RB-1,Ruby,Red,Oval,2.05,,\"Burma, Mogok\",,,,18500.00,yes,,,"
        );
        assert_eq!(lines[2], "SP-2,Sapphire,Blue,Cushion,1.00,,,,,,,no,,,");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn test_empty_listing_is_header_only() {
        assert_eq!(gems_to_csv(&[]).matches("\r\n").count(), 1);
    }
}
