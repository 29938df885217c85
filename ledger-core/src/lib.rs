#![deny(clippy::print_stdout, clippy::print_stderr)]

mod currency;
mod error;
mod ids;
mod money;
mod types;

pub use currency::Currency;
pub use currency::CurrencyRegistry;
pub use currency::InMemoryCurrencyRegistry;
pub use error::LedgerError;
pub use error::LedgerResult;
pub use ids::IdGenerator;
pub use ids::ReceiptCode;
pub use money::parse_decimal_to_minor;
pub use money::round_half_even;
pub use money::scale_factor;
pub use types::AccountKind;
pub use types::AccountPurpose;
pub use types::DrCr;
pub use types::FeeType;
pub use types::OwnerType;
