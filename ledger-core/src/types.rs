use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    System,
    User,
    Agent,
    Partner,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountPurpose {
    Wallet,
    Liquidity,
    Clearing,
    Fees,
    Escrow,
    Settlement,
    Revenue,
    Contra,
    Commission,
    Investment,
    Savings,
}

/// `account_type` scope in : real money, a demo sandbox, or an
/// internal system account. Named `AccountKind` to avoid colliding with the
/// `account_type` field name itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Real,
    Demo,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DrCr {
    Dr,
    Cr,
}

impl DrCr {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            DrCr::Dr => DrCr::Cr,
            DrCr::Cr => DrCr::Dr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    Platform,
    Network,
    Conversion,
    Withdrawal,
    AgentCommission,
}
