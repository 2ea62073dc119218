//! Country → region lookup.
//!
//! Country codes are ISO 3166-1 alpha-3, as stored on user devices.

/// (alpha-3, region)
const COUNTRIES: &[(&str, &str)] = &[
    // Americas
    ("USA", "Americas"),
    ("CAN", "Americas"),
    ("MEX", "Americas"),
    ("BRA", "Americas"),
    ("ARG", "Americas"),
    ("CHL", "Americas"),
    ("COL", "Americas"),
    ("PER", "Americas"),
    ("URY", "Americas"),
    ("CRI", "Americas"),
    ("PRI", "Americas"),
    // Europe
    ("GBR", "Europe"),
    ("IRL", "Europe"),
    ("FRA", "Europe"),
    ("DEU", "Europe"),
    ("ESP", "Europe"),
    ("PRT", "Europe"),
    ("ITA", "Europe"),
    ("NLD", "Europe"),
    ("BEL", "Europe"),
    ("LUX", "Europe"),
    ("CHE", "Europe"),
    ("AUT", "Europe"),
    ("DNK", "Europe"),
    ("NOR", "Europe"),
    ("SWE", "Europe"),
    ("FIN", "Europe"),
    ("ISL", "Europe"),
    ("POL", "Europe"),
    ("CZE", "Europe"),
    ("SVK", "Europe"),
    ("HUN", "Europe"),
    ("ROU", "Europe"),
    ("BGR", "Europe"),
    ("GRC", "Europe"),
    ("HRV", "Europe"),
    ("SVN", "Europe"),
    ("EST", "Europe"),
    ("LVA", "Europe"),
    ("LTU", "Europe"),
    ("UKR", "Europe"),
    // Asia
    ("JPN", "Asia"),
    ("KOR", "Asia"),
    ("CHN", "Asia"),
    ("TWN", "Asia"),
    ("HKG", "Asia"),
    ("SGP", "Asia"),
    ("IND", "Asia"),
    ("IDN", "Asia"),
    ("MYS", "Asia"),
    ("THA", "Asia"),
    ("VNM", "Asia"),
    ("PHL", "Asia"),
    ("ISR", "Asia"),
    ("ARE", "Asia"),
    ("SAU", "Asia"),
    ("TUR", "Asia"),
    // Oceania
    ("AUS", "Oceania"),
    ("NZL", "Oceania"),
    // Africa
    ("ZAF", "Africa"),
    ("NGA", "Africa"),
    ("KEN", "Africa"),
    ("EGY", "Africa"),
    ("MAR", "Africa"),
];

/// Region for an alpha-3 country code, case-insensitive.
pub fn region_for_country(alpha3: &str) -> Option<&'static str> {
    let code = alpha3.trim();
    COUNTRIES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, region)| *region)
}
