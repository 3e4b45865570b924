#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLogRow {
    pub seq: i64,
    pub timestamp: String,
    pub level: String,
    pub message: String,
}
