/// Origin information for a green-space polygon. The engine ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GreenSpace {
    /// First identifier found on the source feature (e.g. an OSM id).
    pub source_id: Option<String>,
    /// Matching tag, e.g. "leisure=park".
    pub category: Option<String>,
}
