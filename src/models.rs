use std::fmt;

pub const TOKEN_NAME: &str = "Token Name";
pub const FUNDING_RATE: &str = "Funding Rate";
pub const OPEN_INTEREST: &str = "Open Interest (in token)";
pub const PROTOCOL: &str = "Protocol";
pub const TIMESTAMP: &str = "timestamp";

/// Exchange a row was collected from. The display form is what lands in the
/// `Protocol` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Aevo,
    Mango,
    Vertex,
    Hyperliquid,
}

impl Protocol {
    /// Lowercase identifier used in config and log prefixes.
    pub fn id(&self) -> &'static str {
        match self {
            Protocol::Aevo => "aevo",
            Protocol::Mango => "mango",
            Protocol::Vertex => "vertex",
            Protocol::Hyperliquid => "hyperliquid",
        }
    }

    /// Only Hyperliquid reports open interest.
    pub fn has_open_interest(&self) -> bool {
        matches!(self, Protocol::Hyperliquid)
    }

    /// Column layout of this exchange's snapshot table.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec![TOKEN_NAME, FUNDING_RATE];
        if self.has_open_interest() {
            columns.push(OPEN_INTEREST);
        }
        columns.push(PROTOCOL);
        columns.push(TIMESTAMP);
        columns
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "aevo" => Some(Protocol::Aevo),
            "mango" => Some(Protocol::Mango),
            "vertex" => Some(Protocol::Vertex),
            "hyperliquid" | "hl" => Some(Protocol::Hyperliquid),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Aevo => write!(f, "Aevo"),
            Protocol::Mango => write!(f, "Mango"),
            Protocol::Vertex => write!(f, "Vertex"),
            Protocol::Hyperliquid => write!(f, "Hyperliquid"),
        }
    }
}

/// One normalized funding observation.
///
/// `funding_rate` keeps each exchange's native period convention; rates from
/// different protocols are not directly comparable.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingRow {
    pub token_name: String,
    pub funding_rate: f64,
    pub open_interest: Option<f64>,
    pub protocol: Protocol,
}

impl FundingRow {
    pub fn new(token_name: impl Into<String>, funding_rate: f64, protocol: Protocol) -> Self {
        Self {
            token_name: token_name.into(),
            funding_rate,
            open_interest: None,
            protocol,
        }
    }

    pub fn with_open_interest(mut self, open_interest: f64) -> Self {
        self.open_interest = Some(open_interest);
        self
    }

    /// Renders the row as CSV cells in `protocol.columns()` order, stamped
    /// with the run timestamp.
    pub fn to_record(&self, timestamp: i64) -> Vec<String> {
        let mut record = vec![self.token_name.clone(), format_float(self.funding_rate)];
        if self.protocol.has_open_interest() {
            record.push(self.open_interest.map(format_float).unwrap_or_default());
        }
        record.push(self.protocol.to_string());
        record.push(timestamp.to_string());
        record
    }
}

/// Whole numbers keep a trailing `.0` so the column reads as floating point.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
