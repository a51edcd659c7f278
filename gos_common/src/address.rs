use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A Korean-style postal address: postal code, street address, and the detail line
/// (building / unit). Used both for delivery destinations and meet-up points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub postal: String,
    pub street: String,
    pub detail: String,
}

impl Address {
    pub fn new<S1, S2, S3>(postal: S1, street: S2, detail: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self { postal: postal.into(), street: street.into(), detail: detail.into() }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} {}", self.postal, self.street, self.detail)
    }
}

#[cfg(test)]
mod test {
    use super::Address;

    #[test]
    fn display() {
        let addr = Address::new("08826", "1 Gwanak-ro", "Bldg 301");
        assert_eq!(addr.to_string(), "[08826] 1 Gwanak-ro Bldg 301");
    }
}
